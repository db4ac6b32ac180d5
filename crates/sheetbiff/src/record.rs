//! Records and bit-flag field access.
//!
//! A [`Record`] is one physical BIFF record: a type code plus a payload whose
//! length is the on-disk length and never changes. Flag accessors do a
//! read-modify-write on a single payload byte, so sibling flags that live in
//! the same byte are left alone.

use crate::biff::parser;
use crate::biff::RawRecord;
use crate::error::{BiffError, BiffResult};
use crate::kind::RecordKind;
use crate::store::ContainerId;

/// A named boolean stored in one bit of a payload byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagField {
    pub name: &'static str,
    pub byte_offset: usize,
    pub mask: u8,
}

impl FlagField {
    pub const fn new(name: &'static str, byte_offset: usize, mask: u8) -> Self {
        Self {
            name,
            byte_offset,
            mask,
        }
    }
}

/// Where a record is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Decoded but not yet inserted into a container
    Unattached,
    /// Owned by the container's record sequence
    Attached(ContainerId),
    /// Taken out of the sequence (superseded or container closed). Terminal.
    Removed,
}

/// One physical record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    type_code: u16,
    kind: RecordKind,
    payload: Vec<u8>,
    state: RecordState,
}

impl Record {
    /// Create an unattached record. The payload length is the declared length.
    pub fn new(type_code: u16, payload: Vec<u8>) -> Self {
        Self {
            type_code,
            kind: RecordKind::from_type_code(type_code),
            payload,
            state: RecordState::Unattached,
        }
    }

    /// Create a two-byte flag record (VCENTER, PROTECT, ...) with bit 0 set to `value`.
    pub fn flag_record(type_code: u16, value: bool) -> Self {
        Self::new(type_code, vec![value as u8, 0x00])
    }

    pub fn type_code(&self) -> u16 {
        self.type_code
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Declared payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Owning container, if attached.
    pub fn owner(&self) -> Option<ContainerId> {
        match self.state {
            RecordState::Attached(owner) => Some(owner),
            _ => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.state == RecordState::Removed
    }

    /// Unattached → Attached. Only containers call this.
    pub(crate) fn attach(&mut self, owner: ContainerId) -> BiffResult<()> {
        match self.state {
            RecordState::Unattached => {
                self.state = RecordState::Attached(owner);
                Ok(())
            }
            RecordState::Attached(_) => Err(BiffError::AlreadyAttached {
                record_type: self.type_code,
            }),
            RecordState::Removed => Err(self.detached()),
        }
    }

    /// Any state → Removed.
    pub(crate) fn detach(&mut self) {
        self.state = RecordState::Removed;
    }

    fn detached(&self) -> BiffError {
        BiffError::DetachedRecord {
            record_type: self.type_code,
        }
    }

    fn ensure_live(&self) -> BiffResult<()> {
        if self.is_removed() {
            return Err(self.detached());
        }
        Ok(())
    }

    fn byte(&self, offset: usize) -> BiffResult<u8> {
        self.payload
            .get(offset)
            .copied()
            .ok_or(BiffError::Bounds {
                offset,
                len: self.payload.len(),
                needed: 1,
            })
    }

    /// Read one bit-flag field.
    pub fn get_flag(&self, field: FlagField) -> BiffResult<bool> {
        Ok(self.byte(field.byte_offset)? & field.mask != 0)
    }

    /// Set or clear one bit-flag field, leaving every other bit of the byte intact.
    pub fn set_flag(&mut self, field: FlagField, value: bool) -> BiffResult<()> {
        self.ensure_live()?;
        self.byte(field.byte_offset)?;
        let byte = &mut self.payload[field.byte_offset];
        if value {
            *byte |= field.mask;
        } else {
            *byte &= !field.mask;
        }
        Ok(())
    }

    fn named_field(&self, name: &str) -> BiffResult<FlagField> {
        self.kind.flag_field(name).ok_or_else(|| {
            BiffError::malformed(self.type_code, format!("no flag named `{name}`"))
        })
    }

    /// Read a flag through this kind's flag table.
    pub fn flag(&self, name: &str) -> BiffResult<bool> {
        self.get_flag(self.named_field(name)?)
    }

    /// Write a flag through this kind's flag table.
    pub fn set_flag_by_name(&mut self, name: &str, value: bool) -> BiffResult<()> {
        let field = self.named_field(name)?;
        self.set_flag(field, value)
    }

    /// Little-endian `u16` at `offset`.
    pub fn read_u16(&self, offset: usize) -> BiffResult<u16> {
        let mut off = offset;
        parser::read_u16(&self.payload, &mut off)
    }

    /// Overwrite the little-endian `u16` at `offset`.
    pub fn write_u16(&mut self, offset: usize, value: u16) -> BiffResult<()> {
        self.ensure_live()?;
        parser::write_u16(&mut self.payload, offset, value)
    }

    /// Frame the record for writing.
    pub fn to_raw(&self) -> RawRecord {
        RawRecord::new(self.type_code, self.payload.clone())
    }
}

impl From<RawRecord> for Record {
    fn from(raw: RawRecord) -> Self {
        Record::new(raw.record_type, raw.data)
    }
}

// ── Typed accessors ─────────────────────────────────────────────────────

macro_rules! flag_accessors {
    ($(($kind:ident, $name:literal, $get:ident, $set:ident)),* $(,)?) => {
        impl Record {
            $(
                #[doc = concat!("`", $name, "` flag of a ", stringify!($kind), " record.")]
                pub fn $get(&self) -> BiffResult<bool> {
                    self.expect_kind(RecordKind::$kind)?;
                    self.flag($name)
                }

                #[doc = concat!("Set the `", $name, "` flag of a ", stringify!($kind), " record.")]
                pub fn $set(&mut self, value: bool) -> BiffResult<()> {
                    self.expect_kind(RecordKind::$kind)?;
                    self.set_flag_by_name($name, value)
                }
            )*
        }
    };
}

flag_accessors! {
    (VCenter, "vcenter", vcenter, set_vcenter),
    (HCenter, "hcenter", hcenter, set_hcenter),
    (PrintGridlines, "print_gridlines", print_gridlines, set_print_gridlines),
    (PrintHeaders, "print_headers", print_headers, set_print_headers),
    (WsBool, "show_auto_breaks", show_auto_breaks, set_show_auto_breaks),
    (WsBool, "row_sums_below", row_sums_below, set_row_sums_below),
    (WsBool, "col_sums_right", col_sums_right, set_col_sums_right),
    (WsBool, "fit_to_page", fit_to_page, set_fit_to_page),
}

impl Record {
    fn expect_kind(&self, kind: RecordKind) -> BiffResult<()> {
        if self.kind == kind {
            return Ok(());
        }
        Err(BiffError::WrongRecordType {
            expected: kind.type_code().unwrap_or_default(),
            actual: self.type_code,
        })
    }
}
