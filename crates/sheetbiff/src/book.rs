//! Workbook globals and the sheets they index.

use std::io::Write;
use std::path::Path;

use crate::biff::parser::{read_u32, read_u8};
use crate::biff::strings::{read_short_string, write_short_string};
use crate::biff::{self, records, RawRecord};
use crate::container::ContainerCore;
use crate::error::{BiffError, BiffResult};
use crate::kind::Collection;
use crate::observer::AttachObserver;
use crate::protection::{ProtectionAspect, ProtectionManager, ProtectionScope};
use crate::record::Record;
use crate::sheet::Sheet;
use crate::store::{ContainerId, RecordHandle, RecordStore};

/// Decoded BOUNDSHEET body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSheet {
    /// Absolute byte offset of the sheet's BOF in the Workbook stream.
    pub offset: u32,
    /// 0 = visible, 1 = hidden, 2 = very hidden.
    pub visibility: u8,
    /// 0 = worksheet, 2 = chart, 6 = macro/VBA.
    pub sheet_type: u8,
    pub name: String,
}

impl BoundSheet {
    pub fn worksheet(name: &str) -> Self {
        Self {
            offset: 0,
            visibility: 0,
            sheet_type: 0,
            name: name.to_string(),
        }
    }

    pub fn parse(data: &[u8]) -> BiffResult<Self> {
        let mut offset = 0;
        let abs_offset = read_u32(data, &mut offset)?;
        let visibility = read_u8(data, &mut offset)?;
        let sheet_type = read_u8(data, &mut offset)?;
        let name = read_short_string(data, &mut offset)?;
        Ok(Self {
            offset: abs_offset,
            visibility,
            sheet_type,
            name,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.name.len() * 2);
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.push(self.visibility);
        out.push(self.sheet_type);
        write_short_string(&mut out, &self.name);
        out
    }
}

/// Framed size of one record body, CONTINUE headers included.
fn framed_len(data_len: usize) -> usize {
    let pieces = ((data_len + records::MAX_RECORD_DATA - 1) / records::MAX_RECORD_DATA).max(1);
    data_len + 4 * pieces
}

/// A workbook: the globals substream plus one [`Sheet`] per BOUNDSHEET.
#[derive(Debug)]
pub struct Book {
    core: ContainerCore,
    bof: Vec<u8>,
    sheets: Vec<Sheet>,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    /// An empty BIFF8 workbook with no sheets.
    pub fn new() -> Self {
        Self::with_bof(biff::bof_body(records::BOF_WORKBOOK_GLOBALS))
    }

    pub(crate) fn with_bof(bof: Vec<u8>) -> Self {
        Self {
            core: ContainerCore::new(ContainerId::Book, ProtectionScope::Book),
            bof,
            sheets: Vec::new(),
        }
    }

    /// Globals records in active order.
    pub fn records(&self) -> &RecordStore {
        &self.core.records
    }

    pub fn record(&self, handle: RecordHandle) -> Option<&Record> {
        self.core.records.get(handle)
    }

    pub fn record_mut(&mut self, handle: RecordHandle) -> Option<&mut Record> {
        self.core.records.get_mut(handle)
    }

    /// Attach `record` to the end of the globals substream.
    pub fn insert(
        &mut self,
        record: Record,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<RecordHandle> {
        self.core.insert(record, observer)
    }

    /// Append a worksheet together with its BOUNDSHEET entry.
    pub fn add_sheet(
        &mut self,
        name: &str,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<&mut Sheet> {
        self.core.ensure_open()?;
        let index = u16::try_from(self.sheets.len())
            .map_err(|_| BiffError::InvalidFormat("too many sheets".into()))?;
        let entry = BoundSheet::worksheet(name);
        self.insert(Record::new(records::BOUNDSHEET, entry.to_bytes()), observer)?;
        self.push_sheet(Sheet::new(index, name));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    /// Adopt a sheet. It inherits nothing until the book's protection changes.
    pub(crate) fn push_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Every BOUNDSHEET entry in the globals, in order.
    pub fn bound_sheets(&self) -> BiffResult<Vec<BoundSheet>> {
        self.core
            .records
            .iter()
            .filter(|(_, r)| r.type_code() == records::BOUNDSHEET)
            .map(|(_, r)| BoundSheet::parse(r.payload()))
            .collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheets_mut(&mut self) -> &mut [Sheet] {
        &mut self.sheets
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Globals handles registered in `collection`, in attach order.
    pub fn collection(&self, collection: Collection) -> &[RecordHandle] {
        self.core.collection(collection)
    }

    /// Live globals records registered in `collection`, in attach order.
    pub fn collection_records(&self, collection: Collection) -> impl Iterator<Item = &Record> + '_ {
        self.core.collection_records(collection)
    }

    pub fn protection(&self) -> &ProtectionManager {
        &self.core.protection
    }

    pub fn is_protected(&self, aspect: ProtectionAspect) -> BiffResult<bool> {
        self.core.is_protected(aspect)
    }

    /// Set a book aspect and hand the new value to every open sheet as its
    /// default. Sheets with their own record for the aspect keep answering
    /// from it.
    pub fn set_protected(&mut self, aspect: ProtectionAspect, value: bool) -> BiffResult<()> {
        self.core.set_protected(aspect, value)?;
        self.propagate(aspect, value)
    }

    /// Store the hash of `password` on a book password aspect. Returns the hash.
    pub fn set_password(&mut self, aspect: ProtectionAspect, password: &str) -> BiffResult<u16> {
        let hash = self.core.set_password(aspect, password)?;
        self.propagate(aspect, hash != 0)?;
        Ok(hash)
    }

    fn propagate(&mut self, aspect: ProtectionAspect, value: bool) -> BiffResult<()> {
        let Some(target) = aspect.sheet_default() else {
            return Ok(());
        };
        for sheet in self.sheets.iter_mut().filter(|s| !s.is_closed()) {
            sheet.inherit(target, value)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed
    }

    /// Close the book manager, then every sheet. Idempotent.
    pub fn close(&mut self, observer: &mut dyn AttachObserver) {
        self.core.close(observer);
        for sheet in &mut self.sheets {
            sheet.close(observer);
        }
    }

    /// The whole Workbook stream as framed records.
    ///
    /// BOUNDSHEET offsets are rewritten to where each sheet's BOF lands.
    pub fn to_raw_records(&self) -> Vec<RawRecord> {
        let mut out = Vec::new();
        out.push(RawRecord::new(records::BOF, self.bof.clone()));
        out.extend(self.core.raw_records());
        out.push(RawRecord::new(records::EOF, Vec::new()));

        let mut position: usize = out.iter().map(|r| framed_len(r.data.len())).sum();
        let mut sheet_offsets = Vec::with_capacity(self.sheets.len());
        let mut sheet_records = Vec::new();
        for sheet in &self.sheets {
            sheet_offsets.push(position as u32);
            let raw = sheet.to_raw_records();
            position += raw.iter().map(|r| framed_len(r.data.len())).sum::<usize>();
            sheet_records.extend(raw);
        }

        let mut offsets = sheet_offsets.into_iter();
        for raw in out
            .iter_mut()
            .filter(|r| r.record_type == records::BOUNDSHEET && r.data.len() >= 4)
        {
            let Some(offset) = offsets.next() else {
                break;
            };
            raw.data[..4].copy_from_slice(&offset.to_le_bytes());
        }

        out.extend(sheet_records);
        out
    }

    /// Serialize to Workbook stream bytes.
    pub fn to_stream_bytes(&self) -> Vec<u8> {
        biff::write_records(&self.to_raw_records())
    }

    /// Write a compound file holding a single `Workbook` stream.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> BiffResult<()> {
        let mut comp = cfb::create(path.as_ref())?;
        {
            let mut stream = comp.create_stream("/Workbook")?;
            stream.write_all(&self.to_stream_bytes())?;
        }
        comp.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{AttachEvent, CollectingObserver};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn protected_book(obs: &mut CollectingObserver) -> Book {
        let mut book = Book::new();
        book.insert(Record::flag_record(records::PROTECT, false), obs)
            .unwrap();
        book.insert(Record::new(records::PASSWORD, vec![0, 0]), obs)
            .unwrap();
        book
    }

    #[test]
    fn test_boundsheet_parse() {
        let entry = BoundSheet {
            offset: 0x1234,
            visibility: 1,
            sheet_type: 0,
            name: "Data".into(),
        };
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[..6], &[0x34, 0x12, 0, 0, 1, 0]);
        assert_eq!(BoundSheet::parse(&bytes).unwrap(), entry);
        assert!(matches!(
            BoundSheet::parse(&bytes[..5]),
            Err(BiffError::Bounds { .. })
        ));
    }

    #[test]
    fn test_document_protection_propagates_to_sheets() {
        let mut obs = CollectingObserver::new();
        let mut book = protected_book(&mut obs);
        book.add_sheet("Plain", &mut obs).unwrap();
        let own = book.add_sheet("Own", &mut obs).unwrap();
        own.insert(Record::flag_record(records::PROTECT, false), &mut obs)
            .unwrap();

        // Nothing is handed down before the book changes
        assert!(matches!(
            book.sheet(0).unwrap().is_protected(ProtectionAspect::Sheet),
            Err(BiffError::UnsupportedAspect(ProtectionAspect::Sheet))
        ));

        book.set_protected(ProtectionAspect::Document, true).unwrap();
        assert!(book.is_protected(ProtectionAspect::Document).unwrap());
        assert!(book.sheet(0).unwrap().is_protected(ProtectionAspect::Sheet).unwrap());
        // Own record wins over the inherited default
        assert!(!book.sheet(1).unwrap().is_protected(ProtectionAspect::Sheet).unwrap());

        // Sheets added later wait for the next explicit change
        book.add_sheet("Late", &mut obs).unwrap();
        assert!(matches!(
            book.sheet(2).unwrap().is_protected(ProtectionAspect::Sheet),
            Err(BiffError::UnsupportedAspect(_))
        ));
        assert!(!book
            .sheet(2)
            .unwrap()
            .protection()
            .snapshot(book.sheet(2).unwrap().records())
            .contains_key(&ProtectionAspect::Sheet));
        book.set_protected(ProtectionAspect::Document, true).unwrap();
        assert!(book.sheet(2).unwrap().is_protected(ProtectionAspect::Sheet).unwrap());
    }

    #[test]
    fn test_book_protection_records_join_protection_collection() {
        let mut obs = CollectingObserver::new();
        let mut book = Book::new();
        let mut handles = Vec::new();
        for code in [
            records::PROTECT,
            records::WINDOWPROTECT,
            records::PROT4REV,
            records::PROT4REVPASS,
        ] {
            let record = if code == records::PROT4REVPASS {
                Record::new(code, vec![0, 0])
            } else {
                Record::flag_record(code, true)
            };
            handles.push(book.insert(record, &mut obs).unwrap());
        }
        // Sheet-only aspects back nothing in the globals
        book.insert(Record::flag_record(records::OBJPROTECT, true), &mut obs)
            .unwrap();

        assert_eq!(book.collection(Collection::Protection), handles.as_slice());
        assert_eq!(
            book.collection_records(Collection::Protection)
                .map(Record::type_code)
                .collect::<Vec<_>>(),
            vec![
                records::PROTECT,
                records::WINDOWPROTECT,
                records::PROT4REV,
                records::PROT4REVPASS
            ]
        );
        let registered = obs
            .events
            .iter()
            .filter(|e| matches!(e, AttachEvent::Registered { .. }))
            .count();
        assert_eq!(registered, 4);
    }

    #[test]
    fn test_long_wide_sheet_name_survives_reload() {
        let mut obs = CollectingObserver::new();
        let mut book = Book::new();
        book.add_sheet(&"😀".repeat(128), &mut obs).unwrap();

        let bytes = book.to_stream_bytes();
        let reloaded =
            Book::from_stream_bytes(&bytes, &crate::LoadOptions::default(), &mut obs).unwrap();
        assert_eq!(reloaded.bound_sheets().unwrap()[0].name, "😀".repeat(127));
        assert_eq!(reloaded.sheet(0).unwrap().name(), "😀".repeat(127));
    }

    #[test]
    fn test_password_propagates_presence() {
        let mut obs = CollectingObserver::new();
        let mut book = protected_book(&mut obs);
        book.add_sheet("Sheet1", &mut obs).unwrap();

        assert!(matches!(
            book.set_protected(ProtectionAspect::PasswordHash, true),
            Err(BiffError::PasswordRequired(ProtectionAspect::PasswordHash))
        ));
        assert_eq!(
            book.set_password(ProtectionAspect::PasswordHash, "password").unwrap(),
            0x83AF
        );
        assert!(book
            .sheet(0)
            .unwrap()
            .is_protected(ProtectionAspect::PasswordHash)
            .unwrap());

        book.set_protected(ProtectionAspect::PasswordHash, false).unwrap();
        assert!(!book.is_protected(ProtectionAspect::PasswordHash).unwrap());
        assert!(!book
            .sheet(0)
            .unwrap()
            .is_protected(ProtectionAspect::PasswordHash)
            .unwrap());
    }

    #[test]
    fn test_close_is_idempotent_and_reaches_sheets() {
        let mut obs = CollectingObserver::new();
        let mut book = protected_book(&mut obs);
        book.add_sheet("Sheet1", &mut obs).unwrap();
        book.close(&mut obs);
        let events = obs.events.len();
        book.close(&mut obs);

        assert_eq!(obs.events.len(), events);
        assert!(book.is_closed());
        assert!(book.sheet(0).unwrap().is_closed());
        assert!(!book.is_protected(ProtectionAspect::Document).unwrap());
        assert!(matches!(
            book.set_protected(ProtectionAspect::Document, true),
            Err(BiffError::ClosedManager)
        ));
        assert!(matches!(
            book.add_sheet("Another", &mut obs),
            Err(BiffError::ContainerClosed)
        ));
    }

    #[test]
    fn test_boundsheet_offsets_point_at_sheet_bof() {
        let mut obs = CollectingObserver::new();
        let mut book = Book::new();
        book.add_sheet("First", &mut obs).unwrap();
        let second = book.add_sheet("Second", &mut obs).unwrap();
        // Large enough to need a CONTINUE record
        second
            .insert(Record::new(0x00FC, vec![0xAB; 9000]), &mut obs)
            .unwrap();
        book.add_sheet("Third", &mut obs).unwrap();

        let bytes = book.to_stream_bytes();
        let raw = biff::read_all_records(&mut Cursor::new(&bytes)).unwrap();

        let entries: Vec<BoundSheet> = raw
            .iter()
            .filter(|r| r.record_type == records::BOUNDSHEET)
            .map(|r| BoundSheet::parse(&r.data).unwrap())
            .collect();
        let bofs: Vec<u64> = raw
            .iter()
            .filter(|r| r.record_type == records::BOF)
            .skip(1)
            .map(|r| r.stream_offset)
            .collect();

        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries.iter().map(|e| e.offset as u64).collect::<Vec<_>>(),
            bofs
        );
    }
}
