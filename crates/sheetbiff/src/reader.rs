//! BIFF8 loading.
//!
//! Opens a Compound File Binary (CFB/OLE2) container, reads the `Workbook`
//! stream, frames its records and attaches them to a [`Book`] and its sheets.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::biff::{self, records, RawRecord};
use crate::book::Book;
use crate::error::{BiffError, BiffResult};
use crate::observer::{AttachEvent, AttachObserver, LogObserver};
use crate::record::Record;
use crate::sheet::Sheet;

/// Load-time settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Replace MULRK / MULBLANK runs with per-cell records after loading.
    pub expand_mul_records: bool,
    /// Fail on a malformed run instead of leaving it compressed.
    pub strict: bool,
    /// Report marker records to the observer.
    pub observe_markers: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            expand_mul_records: true,
            strict: true,
            observe_markers: true,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expand_mul_records(mut self, expand: bool) -> Self {
        self.expand_mul_records = expand;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_observe_markers(mut self, observe: bool) -> Self {
        self.observe_markers = observe;
        self
    }
}

/// Drops marker events when the caller opted out of them.
struct LoadObserver<'a> {
    inner: &'a mut dyn AttachObserver,
    markers: bool,
}

impl AttachObserver for LoadObserver<'_> {
    fn on_event(&mut self, event: &AttachEvent) {
        if !self.markers && matches!(event, AttachEvent::Marker { .. }) {
            return;
        }
        self.inner.on_event(event);
    }
}

/// One BOF..EOF substream: its BOF body and the records in between.
struct Substream {
    bof: Vec<u8>,
    records: Vec<RawRecord>,
}

/// Split the records after the globals into top-level substreams.
///
/// Nested BOF..EOF pairs (embedded charts) stay inside their parent as
/// ordinary records.
fn split_substreams(records: Vec<RawRecord>) -> Vec<Substream> {
    let mut groups = Vec::new();
    let mut current: Option<Substream> = None;
    let mut depth = 0usize;

    for rec in records {
        match rec.record_type {
            records::BOF if depth == 0 => {
                current = Some(Substream {
                    bof: rec.data,
                    records: Vec::new(),
                });
                depth = 1;
            }
            records::EOF if depth == 1 => {
                depth = 0;
                if let Some(group) = current.take() {
                    groups.push(group);
                }
            }
            _ => {
                match rec.record_type {
                    records::BOF => depth += 1,
                    records::EOF => depth = depth.saturating_sub(1),
                    _ => {}
                }
                match current.as_mut() {
                    Some(group) => group.records.push(rec),
                    None => log::warn!(
                        "dropping record 0x{:04X} outside any substream at offset {}",
                        rec.record_type,
                        rec.stream_offset
                    ),
                }
            }
        }
    }

    if let Some(group) = current {
        log::warn!("substream without EOF; keeping {} records", group.records.len());
        groups.push(group);
    }
    groups
}

impl Book {
    /// Open an XLS file, reporting attach events through the `log` facade.
    pub fn open<P: AsRef<Path>>(path: P, options: &LoadOptions) -> BiffResult<Book> {
        Self::open_with(path, options, &mut LogObserver)
    }

    /// Open an XLS file, reporting attach events to `observer`.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        options: &LoadOptions,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<Book> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(file, options, observer)
    }

    /// Read an XLS compound file from any `Read + Seek` source.
    pub fn read<R: Read + Seek>(
        reader: R,
        options: &LoadOptions,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<Book> {
        let mut cfb = cfb::CompoundFile::open(reader)?;

        // BIFF5 files name the stream "Book"; the version check below rejects them
        let stream_path = if cfb.exists("/Workbook") {
            "/Workbook"
        } else if cfb.exists("/Book") {
            "/Book"
        } else {
            return Err(BiffError::InvalidFormat(
                "no Workbook or Book stream found in CFB".into(),
            ));
        };

        let mut stream_data = Vec::new();
        {
            let mut stream = cfb.open_stream(stream_path)?;
            stream.read_to_end(&mut stream_data)?;
        }
        Self::from_stream_bytes(&stream_data, options, observer)
    }

    /// Load a bare Workbook stream (no CFB wrapper).
    pub fn from_stream_bytes(
        data: &[u8],
        options: &LoadOptions,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<Book> {
        let all_records = biff::read_all_records(&mut Cursor::new(data))?;
        Self::from_raw_records(all_records, options, observer)
    }

    /// Build a book from framed records: the globals substream first, then
    /// one sheet per following BOF..EOF substream.
    pub fn from_raw_records(
        raw: Vec<RawRecord>,
        options: &LoadOptions,
        observer: &mut dyn AttachObserver,
    ) -> BiffResult<Book> {
        let mut observer = LoadObserver {
            inner: observer,
            markers: options.observe_markers,
        };
        let mut iter = raw.into_iter();

        let first = iter
            .next()
            .ok_or_else(|| BiffError::InvalidFormat("empty Workbook stream".into()))?;
        if first.record_type != records::BOF {
            return Err(BiffError::InvalidFormat(format!(
                "stream starts with record 0x{:04X}, expected BOF",
                first.record_type
            )));
        }
        let (version, dt) = biff::parse_bof(&first.data)?;
        if version != records::BIFF8_VERSION {
            return Err(BiffError::UnsupportedVersion(format!(
                "BIFF version 0x{version:04X} (only BIFF8 0x0600 is supported)"
            )));
        }
        if dt != records::BOF_WORKBOOK_GLOBALS {
            return Err(BiffError::InvalidFormat(format!(
                "first substream has type 0x{dt:04X}, expected workbook globals"
            )));
        }

        // Phase 1: workbook globals
        let mut book = Book::with_bof(first.data);
        let mut depth = 1usize;
        for rec in iter.by_ref() {
            match rec.record_type {
                records::BOF => depth += 1,
                records::EOF => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                break;
            }
            book.insert(Record::from(rec), &mut observer)?;
        }
        let rest: Vec<RawRecord> = iter.collect();

        // Phase 2: sheets, matched to BOUNDSHEET entries by position
        let entries = book.bound_sheets()?;
        let substreams = split_substreams(rest);
        if substreams.len() != entries.len() {
            log::warn!(
                "{} BOUNDSHEET entries but {} substreams",
                entries.len(),
                substreams.len()
            );
        }

        for (i, sub) in substreams.into_iter().enumerate() {
            let index = u16::try_from(i)
                .map_err(|_| BiffError::InvalidFormat("too many substreams".into()))?;
            let name = entries
                .get(i)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| format!("Sheet{}", i + 1));

            let mut sheet = Sheet::with_bof(index, &name, sub.bof);
            for rec in sub.records {
                sheet.insert(Record::from(rec), &mut observer)?;
            }
            if options.expand_mul_records {
                if options.strict {
                    sheet.expand_mul_records(&mut observer)?;
                } else {
                    sheet.expand_valid_mul_records(&mut observer)?;
                }
            }
            book.push_sheet(sheet);
        }

        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Collection;
    use crate::marker::DocumentProperty;
    use crate::observer::CollectingObserver;
    use crate::protection::ProtectionAspect;
    use crate::store::ContainerId;
    use pretty_assertions::assert_eq;

    fn raw(record_type: u16, data: Vec<u8>) -> RawRecord {
        RawRecord::new(record_type, data)
    }

    fn bof(dt: u16) -> RawRecord {
        raw(records::BOF, biff::bof_body(dt))
    }

    fn eof() -> RawRecord {
        raw(records::EOF, Vec::new())
    }

    fn boundsheet(name: &str) -> RawRecord {
        raw(
            records::BOUNDSHEET,
            crate::book::BoundSheet::worksheet(name).to_bytes(),
        )
    }

    /// Globals with PROTECT on and a VBA marker, one sheet with a MULBLANK run.
    fn sample() -> Vec<RawRecord> {
        vec![
            bof(records::BOF_WORKBOOK_GLOBALS),
            raw(records::OBPROJ, Vec::new()),
            raw(records::PROTECT, vec![1, 0]),
            boundsheet("Data"),
            eof(),
            bof(records::BOF_WORKSHEET),
            raw(records::VCENTER, vec![0, 0]),
            // row 5, cols 1..=3
            raw(records::MULBLANK, vec![5, 0, 1, 0, 15, 0, 16, 0, 17, 0, 3, 0]),
            eof(),
        ]
    }

    #[test]
    fn test_load_sample() {
        let mut obs = CollectingObserver::new();
        let book = Book::from_raw_records(sample(), &LoadOptions::default(), &mut obs).unwrap();

        assert_eq!(book.sheet_count(), 1);
        let sheet = book.sheet_by_name("Data").unwrap();
        assert_eq!(sheet.index(), 0);
        assert_eq!(sheet.collection(Collection::PrintSettings).len(), 1);
        assert_eq!(
            sheet
                .records()
                .iter()
                .map(|(_, r)| r.type_code())
                .collect::<Vec<_>>(),
            vec![records::VCENTER, records::BLANK, records::BLANK, records::BLANK]
        );
        assert_eq!(sheet.retired_groups().len(), 1);

        assert!(book.is_protected(ProtectionAspect::Document).unwrap());
        // Loading hands nothing down to sheets without their own PROTECT
        assert!(matches!(
            sheet.is_protected(ProtectionAspect::Sheet),
            Err(BiffError::UnsupportedAspect(ProtectionAspect::Sheet))
        ));
        assert!(sheet.protection().snapshot(sheet.records()).is_empty());
        assert_eq!(
            obs.markers().collect::<Vec<_>>(),
            vec![(ContainerId::Book, DocumentProperty::MacroProject)]
        );
    }

    #[test]
    fn test_options_turn_off_expansion_and_markers() {
        let mut obs = CollectingObserver::new();
        let options = LoadOptions::new()
            .with_expand_mul_records(false)
            .with_observe_markers(false);
        let book = Book::from_raw_records(sample(), &options, &mut obs).unwrap();

        let sheet = book.sheet(0).unwrap();
        assert_eq!(sheet.records().len(), 2);
        assert!(sheet.retired_groups().is_empty());
        assert_eq!(obs.markers().count(), 0);
    }

    #[test]
    fn test_strict_and_lenient_malformed_run() {
        let mut recs = sample();
        // last_col < first_col
        recs.insert(7, raw(records::MULBLANK, vec![0, 0, 9, 0, 2, 0]));

        let mut obs = CollectingObserver::new();
        let err = Book::from_raw_records(recs.clone(), &LoadOptions::default(), &mut obs)
            .unwrap_err();
        assert!(matches!(err, BiffError::MalformedRecord { .. }));

        let lenient = LoadOptions::new().with_strict(false);
        let book = Book::from_raw_records(recs, &lenient, &mut obs).unwrap();
        let types: Vec<u16> = book
            .sheet(0)
            .unwrap()
            .records()
            .iter()
            .map(|(_, r)| r.type_code())
            .collect();
        assert_eq!(
            types,
            vec![
                records::VCENTER,
                records::MULBLANK,
                records::BLANK,
                records::BLANK,
                records::BLANK
            ]
        );
    }

    #[test]
    fn test_rejects_non_biff8() {
        let mut obs = CollectingObserver::new();
        let mut old = biff::bof_body(records::BOF_WORKBOOK_GLOBALS);
        old[0..2].copy_from_slice(&0x0500u16.to_le_bytes());
        let err = Book::from_raw_records(vec![raw(records::BOF, old), eof()], &LoadOptions::default(), &mut obs)
            .unwrap_err();
        assert!(matches!(err, BiffError::UnsupportedVersion(_)));

        let err = Book::from_raw_records(Vec::new(), &LoadOptions::default(), &mut obs).unwrap_err();
        assert!(matches!(err, BiffError::InvalidFormat(_)));
    }

    #[test]
    fn test_nested_substream_stays_in_parent() {
        let mut recs = sample();
        recs.insert(6, bof(records::BOF_CHART));
        recs.insert(7, eof());
        let mut obs = CollectingObserver::new();
        let options = LoadOptions::new().with_expand_mul_records(false);
        let book = Book::from_raw_records(recs, &options, &mut obs).unwrap();

        assert_eq!(book.sheet_count(), 1);
        assert_eq!(book.sheet(0).unwrap().records().len(), 4);
    }

    #[test]
    fn test_stream_bytes_round_trip() {
        let mut obs = CollectingObserver::new();
        let book = Book::from_raw_records(sample(), &LoadOptions::default(), &mut obs).unwrap();
        let bytes = book.to_stream_bytes();
        let again = Book::from_stream_bytes(&bytes, &LoadOptions::default(), &mut obs).unwrap();

        assert_eq!(again.to_stream_bytes(), bytes);
        assert_eq!(again.bound_sheets().unwrap()[0].name, "Data");
    }
}
