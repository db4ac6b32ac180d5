//! Compressed multi-cell records (MULRK, MULBLANK).
//!
//! One physical record stands for a run of cells in a single row:
//!
//! ```text
//! MULRK:    row(2) first_col(2) [xf(2) rk(4)]*  last_col(2)
//! MULBLANK: row(2) first_col(2) [xf(2)]*        last_col(2)
//! ```
//!
//! The row is shared by every cell; each entry slice carries the per-cell
//! part. Expansion turns the run into one RK or BLANK record per column,
//! in ascending column order.

use crate::biff::parser::{decode_rk, encode_rk_integer, read_u16, read_u32};
use crate::biff::records;
use crate::error::{BiffError, BiffResult};
use crate::kind::RecordKind;
use crate::record::Record;

/// Capability of records that stand for several logical records.
///
/// Only compressed-run types implement this; containers find it through
/// [`RecordKind::is_mul`] and [`MulGroup::decode`].
pub trait MulRecord {
    /// True once the physical record has been replaced by its expansion.
    fn removed(&self) -> bool;

    /// The per-cell records, ordered by ascending column.
    ///
    /// Computed on first use and cached; the cache survives [`MulGroup::mark_removed`].
    fn expanded_records(&mut self) -> BiffResult<&[Record]>;
}

/// One entry of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MulCell {
    pub col: u16,
    pub xf: u16,
    /// Raw RK value; `None` for blanks.
    pub rk: Option<u32>,
}

impl MulCell {
    pub fn blank(col: u16, xf: u16) -> Self {
        Self { col, xf, rk: None }
    }

    /// An integer cell, or `None` when `value` needs more than 30 bits.
    pub fn integer(col: u16, xf: u16, value: i32) -> Option<Self> {
        encode_rk_integer(value).map(|rk| Self {
            col,
            xf,
            rk: Some(rk),
        })
    }

    /// Decoded number of an RK cell.
    pub fn number(&self) -> Option<f64> {
        self.rk.map(decode_rk)
    }
}

/// A decoded MULRK / MULBLANK record
#[derive(Debug, Clone)]
pub struct MulGroup {
    record_type: u16,
    row: u16,
    start_index: u16,
    cells: Vec<MulCell>,
    expanded: Option<Vec<Record>>,
    removed: bool,
}

fn entry_size(kind: RecordKind) -> usize {
    match kind {
        RecordKind::MulRk => 6,
        _ => 2,
    }
}

impl MulGroup {
    /// Decode and validate a compressed run.
    ///
    /// Fails with `MalformedRecord` for an empty or inconsistent run and with
    /// `AlreadyExpanded` when the record was already retired from its container.
    pub fn decode(record: &Record) -> BiffResult<Self> {
        let record_type = record.type_code();
        let kind = record.kind();
        if !kind.is_mul() {
            return Err(BiffError::WrongRecordType {
                expected: records::MULRK,
                actual: record_type,
            });
        }
        if record.is_removed() {
            return Err(BiffError::AlreadyExpanded { record_type });
        }

        let data = record.payload();
        if data.len() < 6 {
            return Err(BiffError::malformed(
                record_type,
                format!("{} bytes is shorter than the 6-byte frame", data.len()),
            ));
        }
        let mut off = 0;
        let row = read_u16(data, &mut off)?;
        let first_col = read_u16(data, &mut off)?;
        let last_col = u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]]);

        if last_col < first_col {
            return Err(BiffError::malformed(
                record_type,
                format!("zero count (first_col {first_col}, last_col {last_col})"),
            ));
        }
        let count = (last_col - first_col) as usize + 1;
        let size = entry_size(kind);
        let entry_bytes = data.len() - 6;
        if entry_bytes != count * size {
            return Err(BiffError::malformed(
                record_type,
                format!(
                    "{count} entries of {size} bytes need {} bytes, found {entry_bytes}",
                    count * size
                ),
            ));
        }

        let mut cells = Vec::with_capacity(count);
        for i in 0..count {
            let xf = read_u16(data, &mut off)?;
            let rk = match kind {
                RecordKind::MulRk => Some(read_u32(data, &mut off)?),
                _ => None,
            };
            cells.push(MulCell {
                col: first_col + i as u16,
                xf,
                rk,
            });
        }

        Ok(Self {
            record_type,
            row,
            start_index: first_col,
            cells,
            expanded: None,
            removed: false,
        })
    }

    /// Build the physical MULRK (if every cell has an RK value) or MULBLANK
    /// record for a run of consecutive cells.
    pub fn compress(row: u16, cells: &[MulCell]) -> BiffResult<Record> {
        let (first, last) = match (cells.first(), cells.last()) {
            (Some(f), Some(l)) => (f.col, l.col),
            _ => return Err(BiffError::malformed(records::MULBLANK, "zero count")),
        };
        let is_rk = cells.iter().all(|c| c.rk.is_some());
        let record_type = if is_rk {
            records::MULRK
        } else {
            records::MULBLANK
        };
        if cells
            .iter()
            .enumerate()
            .any(|(i, c)| c.col as usize != first as usize + i)
        {
            return Err(BiffError::malformed(
                record_type,
                "cells are not a contiguous ascending run",
            ));
        }

        let size = if is_rk { 6 } else { 2 };
        let mut data = Vec::with_capacity(6 + cells.len() * size);
        data.extend_from_slice(&row.to_le_bytes());
        data.extend_from_slice(&first.to_le_bytes());
        for cell in cells {
            data.extend_from_slice(&cell.xf.to_le_bytes());
            if let (true, Some(rk)) = (is_rk, cell.rk) {
                data.extend_from_slice(&rk.to_le_bytes());
            }
        }
        data.extend_from_slice(&last.to_le_bytes());
        Ok(Record::new(record_type, data))
    }

    pub fn record_type(&self) -> u16 {
        self.record_type
    }

    pub fn row(&self) -> u16 {
        self.row
    }

    /// Column of the first cell.
    pub fn start_index(&self) -> u16 {
        self.start_index
    }

    /// Number of cells; never zero.
    pub fn count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[MulCell] {
        &self.cells
    }

    /// Record that the container has replaced the physical record.
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    fn expand(&self) -> Vec<Record> {
        self.cells
            .iter()
            .map(|cell| {
                let mut data = Vec::with_capacity(10);
                data.extend_from_slice(&self.row.to_le_bytes());
                data.extend_from_slice(&cell.col.to_le_bytes());
                data.extend_from_slice(&cell.xf.to_le_bytes());
                match cell.rk {
                    Some(rk) => {
                        data.extend_from_slice(&rk.to_le_bytes());
                        Record::new(records::RK, data)
                    }
                    None => Record::new(records::BLANK, data),
                }
            })
            .collect()
    }
}

impl MulRecord for MulGroup {
    fn removed(&self) -> bool {
        self.removed
    }

    fn expanded_records(&mut self) -> BiffResult<&[Record]> {
        if self.expanded.is_none() {
            if self.removed {
                return Err(BiffError::AlreadyExpanded {
                    record_type: self.record_type,
                });
            }
            self.expanded = Some(self.expand());
        }
        Ok(self.expanded.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::parser::decode_rk;
    use pretty_assertions::assert_eq;

    fn mulblank(row: u16, first: u16, last: u16, xfs: &[u16]) -> Record {
        let mut data = Vec::new();
        data.extend_from_slice(&row.to_le_bytes());
        data.extend_from_slice(&first.to_le_bytes());
        for xf in xfs {
            data.extend_from_slice(&xf.to_le_bytes());
        }
        data.extend_from_slice(&last.to_le_bytes());
        Record::new(records::MULBLANK, data)
    }

    fn col_of(rec: &Record) -> u16 {
        rec.read_u16(2).unwrap()
    }

    #[test]
    fn test_run_of_four_from_column_three() {
        let rec = mulblank(7, 3, 6, &[15, 16, 17, 18]);
        let mut group = MulGroup::decode(&rec).unwrap();
        assert_eq!(group.start_index(), 3);
        assert_eq!(group.count(), 4);
        assert!(!group.removed());

        let expanded = group.expanded_records().unwrap();
        let cols: Vec<u16> = expanded.iter().map(col_of).collect();
        assert_eq!(cols, vec![3, 4, 5, 6]);
        for (i, r) in expanded.iter().enumerate() {
            assert_eq!(r.type_code(), records::BLANK);
            assert_eq!(r.read_u16(0).unwrap(), 7);
            assert_eq!(r.read_u16(4).unwrap(), 15 + i as u16);
            assert_eq!(r.len(), 6);
        }
    }

    #[test]
    fn test_mulrk_expands_to_rk_records() {
        let cells = [
            MulCell {
                col: 1,
                xf: 0,
                rk: Some(0x000000AA),
            },
            MulCell {
                col: 2,
                xf: 21,
                rk: Some(0x000004EB),
            },
        ];
        let rec = MulGroup::compress(4, &cells).unwrap();
        assert_eq!(rec.type_code(), records::MULRK);
        assert_eq!(rec.len(), 6 + 2 * 6);

        let mut group = MulGroup::decode(&rec).unwrap();
        assert_eq!(group.cells(), &cells);
        let expanded = group.expanded_records().unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].type_code(), records::RK);
        let mut off = 6;
        let rk = read_u32(expanded[1].payload(), &mut off).unwrap();
        assert!((decode_rk(rk) - 3.14).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_count_is_malformed() {
        let rec = mulblank(0, 5, 4, &[]);
        assert!(matches!(
            MulGroup::decode(&rec),
            Err(BiffError::MalformedRecord {
                record_type: records::MULBLANK,
                ..
            })
        ));
        assert!(MulGroup::compress(0, &[]).is_err());
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        // Declares 3 cells but carries 2 entries
        let rec = mulblank(0, 0, 2, &[1, 2]);
        assert!(matches!(
            MulGroup::decode(&rec),
            Err(BiffError::MalformedRecord { .. })
        ));
        let short = Record::new(records::MULRK, vec![0, 0, 0]);
        assert!(matches!(
            MulGroup::decode(&short),
            Err(BiffError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_cache_survives_removal() {
        let rec = mulblank(0, 0, 1, &[1, 2]);
        let mut group = MulGroup::decode(&rec).unwrap();
        let first: Vec<Record> = group.expanded_records().unwrap().to_vec();
        group.mark_removed();
        assert!(group.removed());
        assert_eq!(group.expanded_records().unwrap(), first.as_slice());
    }

    #[test]
    fn test_retired_without_expansion_fails() {
        let rec = mulblank(0, 0, 1, &[1, 2]);
        let mut group = MulGroup::decode(&rec).unwrap();
        group.mark_removed();
        assert!(matches!(
            group.expanded_records(),
            Err(BiffError::AlreadyExpanded { .. })
        ));
    }

    #[test]
    fn test_removed_record_cannot_be_decoded() {
        let mut rec = mulblank(0, 0, 0, &[1]);
        rec.detach();
        assert!(matches!(
            MulGroup::decode(&rec),
            Err(BiffError::AlreadyExpanded { .. })
        ));
    }

    #[test]
    fn test_non_contiguous_run_is_rejected() {
        let cells = [
            MulCell {
                col: 1,
                xf: 0,
                rk: None,
            },
            MulCell {
                col: 3,
                xf: 0,
                rk: None,
            },
        ];
        assert!(MulGroup::compress(0, &cells).is_err());
    }
}
