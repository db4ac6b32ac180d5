//! Record kinds and their capabilities.
//!
//! Every type code the framework understands maps to one [`RecordKind`]
//! variant; everything else is [`RecordKind::Other`]. Containers never match
//! on type codes directly, they ask the kind what it does on attach: join a
//! named collection, back a protection aspect, announce a document property,
//! or expand into per-cell records.

use crate::biff::records;
use crate::marker::DocumentProperty;
use crate::protection::{ProtectionAspect, ProtectionScope};
use crate::record::FlagField;

/// The closed set of record kinds with known semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    VCenter,
    HCenter,
    PrintGridlines,
    PrintHeaders,
    GridSet,
    WsBool,
    Protect,
    WindowProtect,
    Password,
    ObjProtect,
    ScenProtect,
    Prot4Rev,
    Prot4RevPass,
    ObProj,
    Excel9File,
    Rk,
    Blank,
    MulRk,
    MulBlank,
    /// Any record without attach-time semantics; carried through untouched.
    Other,
}

/// Named, ordered per-container collections that records join on attach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Collection {
    /// Page setup switches consulted by print and export
    PrintSettings,
    /// Every record that backs a protection aspect
    Protection,
}

const LOCKED: &[FlagField] = &[FlagField::new("locked", 0, 0x01)];
const VCENTER_FLAGS: &[FlagField] = &[FlagField::new("vcenter", 0, 0x01)];
const HCENTER_FLAGS: &[FlagField] = &[FlagField::new("hcenter", 0, 0x01)];
const PRINTGRIDLINES_FLAGS: &[FlagField] = &[FlagField::new("print_gridlines", 0, 0x01)];
const PRINTHEADERS_FLAGS: &[FlagField] = &[FlagField::new("print_headers", 0, 0x01)];
const GRIDSET_FLAGS: &[FlagField] = &[FlagField::new("gridset", 0, 0x01)];

const WSBOOL_FLAGS: &[FlagField] = &[
    FlagField::new("show_auto_breaks", 0, 0x01),
    FlagField::new("dialog", 0, 0x10),
    FlagField::new("apply_styles", 0, 0x20),
    FlagField::new("row_sums_below", 0, 0x40),
    FlagField::new("col_sums_right", 0, 0x80),
    FlagField::new("fit_to_page", 1, 0x01),
    FlagField::new("show_row_outline", 1, 0x04),
    FlagField::new("show_col_outline", 1, 0x08),
    FlagField::new("sync_horizontal", 1, 0x10),
    FlagField::new("sync_vertical", 1, 0x20),
    FlagField::new("alt_expr_eval", 1, 0x40),
    FlagField::new("alt_formula_entry", 1, 0x80),
];

impl RecordKind {
    /// Dispatch table from numeric type code to kind.
    pub fn from_type_code(type_code: u16) -> Self {
        match type_code {
            records::VCENTER => RecordKind::VCenter,
            records::HCENTER => RecordKind::HCenter,
            records::PRINTGRIDLINES => RecordKind::PrintGridlines,
            records::PRINTHEADERS => RecordKind::PrintHeaders,
            records::GRIDSET => RecordKind::GridSet,
            records::WSBOOL => RecordKind::WsBool,
            records::PROTECT => RecordKind::Protect,
            records::WINDOWPROTECT => RecordKind::WindowProtect,
            records::PASSWORD => RecordKind::Password,
            records::OBJPROTECT => RecordKind::ObjProtect,
            records::SCENPROTECT => RecordKind::ScenProtect,
            records::PROT4REV => RecordKind::Prot4Rev,
            records::PROT4REVPASS => RecordKind::Prot4RevPass,
            records::OBPROJ => RecordKind::ObProj,
            records::EXCEL9FILE => RecordKind::Excel9File,
            records::RK => RecordKind::Rk,
            records::BLANK => RecordKind::Blank,
            records::MULRK => RecordKind::MulRk,
            records::MULBLANK => RecordKind::MulBlank,
            _ => RecordKind::Other,
        }
    }

    /// Inverse of [`RecordKind::from_type_code`]; `None` for [`RecordKind::Other`].
    pub fn type_code(self) -> Option<u16> {
        let code = match self {
            RecordKind::VCenter => records::VCENTER,
            RecordKind::HCenter => records::HCENTER,
            RecordKind::PrintGridlines => records::PRINTGRIDLINES,
            RecordKind::PrintHeaders => records::PRINTHEADERS,
            RecordKind::GridSet => records::GRIDSET,
            RecordKind::WsBool => records::WSBOOL,
            RecordKind::Protect => records::PROTECT,
            RecordKind::WindowProtect => records::WINDOWPROTECT,
            RecordKind::Password => records::PASSWORD,
            RecordKind::ObjProtect => records::OBJPROTECT,
            RecordKind::ScenProtect => records::SCENPROTECT,
            RecordKind::Prot4Rev => records::PROT4REV,
            RecordKind::Prot4RevPass => records::PROT4REVPASS,
            RecordKind::ObProj => records::OBPROJ,
            RecordKind::Excel9File => records::EXCEL9FILE,
            RecordKind::Rk => records::RK,
            RecordKind::Blank => records::BLANK,
            RecordKind::MulRk => records::MULRK,
            RecordKind::MulBlank => records::MULBLANK,
            RecordKind::Other => return None,
        };
        Some(code)
    }

    /// Record name as used in [MS-XLS].
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::VCenter => "VCENTER",
            RecordKind::HCenter => "HCENTER",
            RecordKind::PrintGridlines => "PRINTGRIDLINES",
            RecordKind::PrintHeaders => "PRINTHEADERS",
            RecordKind::GridSet => "GRIDSET",
            RecordKind::WsBool => "WSBOOL",
            RecordKind::Protect => "PROTECT",
            RecordKind::WindowProtect => "WINDOWPROTECT",
            RecordKind::Password => "PASSWORD",
            RecordKind::ObjProtect => "OBJPROTECT",
            RecordKind::ScenProtect => "SCENPROTECT",
            RecordKind::Prot4Rev => "PROT4REV",
            RecordKind::Prot4RevPass => "PROT4REVPASS",
            RecordKind::ObProj => "OBPROJ",
            RecordKind::Excel9File => "EXCEL9FILE",
            RecordKind::Rk => "RK",
            RecordKind::Blank => "BLANK",
            RecordKind::MulRk => "MULRK",
            RecordKind::MulBlank => "MULBLANK",
            RecordKind::Other => "?",
        }
    }

    /// Print collection the record joins on attach. Protection membership
    /// depends on the container scope (see [`RecordKind::protection_aspect`]).
    pub fn collection(self) -> Option<Collection> {
        match self {
            RecordKind::VCenter
            | RecordKind::HCenter
            | RecordKind::PrintGridlines
            | RecordKind::PrintHeaders
            | RecordKind::GridSet
            | RecordKind::WsBool => Some(Collection::PrintSettings),
            _ => None,
        }
    }

    /// Protection aspect this record backs inside a container of `scope`.
    pub fn protection_aspect(self, scope: ProtectionScope) -> Option<ProtectionAspect> {
        use ProtectionScope::{Book, Sheet};
        match (self, scope) {
            (RecordKind::Protect, Book) => Some(ProtectionAspect::Document),
            (RecordKind::Protect, Sheet) => Some(ProtectionAspect::Sheet),
            (RecordKind::Password, _) => Some(ProtectionAspect::PasswordHash),
            (RecordKind::WindowProtect, Book) => Some(ProtectionAspect::Windows),
            (RecordKind::Prot4Rev, Book) => Some(ProtectionAspect::Revision),
            (RecordKind::Prot4RevPass, Book) => Some(ProtectionAspect::RevisionPassword),
            (RecordKind::ObjProtect, Sheet) => Some(ProtectionAspect::Objects),
            (RecordKind::ScenProtect, Sheet) => Some(ProtectionAspect::Scenarios),
            _ => None,
        }
    }

    /// Document property announced by a presence-only record.
    pub fn marker(self) -> Option<DocumentProperty> {
        match self {
            RecordKind::ObProj => Some(DocumentProperty::MacroProject),
            RecordKind::Excel9File => Some(DocumentProperty::Excel9File),
            _ => None,
        }
    }

    /// Whether the record is a compressed run (MULRK / MULBLANK).
    pub fn is_mul(self) -> bool {
        matches!(self, RecordKind::MulRk | RecordKind::MulBlank)
    }

    /// Named bit-flag fields of this kind's payload.
    pub fn flag_fields(self) -> &'static [FlagField] {
        match self {
            RecordKind::VCenter => VCENTER_FLAGS,
            RecordKind::HCenter => HCENTER_FLAGS,
            RecordKind::PrintGridlines => PRINTGRIDLINES_FLAGS,
            RecordKind::PrintHeaders => PRINTHEADERS_FLAGS,
            RecordKind::GridSet => GRIDSET_FLAGS,
            RecordKind::WsBool => WSBOOL_FLAGS,
            RecordKind::Protect
            | RecordKind::WindowProtect
            | RecordKind::ObjProtect
            | RecordKind::ScenProtect
            | RecordKind::Prot4Rev => LOCKED,
            _ => &[],
        }
    }

    /// Look up a flag field by name.
    pub fn flag_field(self, name: &str) -> Option<FlagField> {
        self.flag_fields().iter().copied().find(|f| f.name == name)
    }
}
