//! Presence-only records.
//!
//! OBPROJ and EXCEL9FILE carry no payload worth decoding; finding one in a
//! substream is the whole message.

use crate::observer::AttachEvent;
use crate::store::ContainerId;

/// Document properties announced by marker records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DocumentProperty {
    /// An embedded VBA project exists
    MacroProject,
    /// The file was last saved by Excel 2000 or later
    Excel9File,
}

impl DocumentProperty {
    pub fn description(self) -> &'static str {
        match self {
            DocumentProperty::MacroProject => "workbook contains a VBA project",
            DocumentProperty::Excel9File => "workbook was saved by Excel 2000 or later",
        }
    }

    pub(crate) fn event(self, container: ContainerId) -> AttachEvent {
        AttachEvent::Marker {
            container,
            property: self,
        }
    }
}
