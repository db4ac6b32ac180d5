//! Attach-time events.
//!
//! Containers report what happens while records are attached, expanded and
//! released through an injected [`AttachObserver`] instead of logging from
//! inside the decode path.

use crate::kind::Collection;
use crate::marker::DocumentProperty;
use crate::protection::ProtectionAspect;
use crate::store::{ContainerId, RecordHandle};

/// Something a container did with a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachEvent {
    /// A record joined one of the container's named collections
    Registered {
        container: ContainerId,
        handle: RecordHandle,
        type_code: u16,
        collection: Collection,
    },
    /// A record now backs a protection aspect
    Protection {
        container: ContainerId,
        handle: RecordHandle,
        aspect: ProtectionAspect,
    },
    /// A presence-only record was attached
    Marker {
        container: ContainerId,
        property: DocumentProperty,
    },
    /// A compressed run was replaced by its per-cell records
    Expanded {
        container: ContainerId,
        record_type: u16,
        row: u16,
        start_index: u16,
        count: usize,
    },
    /// The container released its records
    Closed { container: ContainerId },
}

/// Receiver for [`AttachEvent`]s
pub trait AttachObserver {
    fn on_event(&mut self, event: &AttachEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl AttachObserver for LogObserver {
    fn on_event(&mut self, event: &AttachEvent) {
        match event {
            AttachEvent::Registered {
                container,
                type_code,
                collection,
                ..
            } => log::debug!("{container}: record 0x{type_code:04X} registered in {collection:?}"),
            AttachEvent::Protection {
                container, aspect, ..
            } => log::debug!("{container}: protection aspect {aspect:?} loaded"),
            AttachEvent::Marker {
                container,
                property,
            } => log::info!("{container}: {}", property.description()),
            AttachEvent::Expanded {
                container,
                record_type,
                row,
                start_index,
                count,
            } => log::debug!(
                "{container}: record 0x{record_type:04X} at row {row} expanded into {count} cells from column {start_index}"
            ),
            AttachEvent::Closed { container } => log::info!("{container}: closed"),
        }
    }
}

/// Keeps every event, in order.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    pub events: Vec<AttachEvent>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> impl Iterator<Item = (ContainerId, DocumentProperty)> + '_ {
        self.events.iter().filter_map(|e| match e {
            AttachEvent::Marker {
                container,
                property,
            } => Some((*container, *property)),
            _ => None,
        })
    }
}

impl AttachObserver for CollectingObserver {
    fn on_event(&mut self, event: &AttachEvent) {
        self.events.push(event.clone());
    }
}

/// Fans one event out to two observers.
pub struct Tee<'a, A: ?Sized, B: ?Sized>(pub &'a mut A, pub &'a mut B);

impl<A: AttachObserver + ?Sized, B: AttachObserver + ?Sized> AttachObserver for Tee<'_, A, B> {
    fn on_event(&mut self, event: &AttachEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}
