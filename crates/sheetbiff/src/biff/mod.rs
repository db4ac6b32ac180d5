//! BIFF8 (Binary Interchange File Format) stream framing.
//!
//! A BIFF8 stream is a sequence of records, each with a 4-byte header
//! (2 bytes record type + 2 bytes body length) followed by the body.
//!
//! CONTINUE records (type 0x003C) extend the body of the preceding record
//! beyond the 8224-byte per-record limit.

pub mod parser;
pub mod records;
pub mod strings;

use crate::error::{BiffError, BiffResult};
use std::io::{Read, Seek};

/// A single framed BIFF8 record (with CONTINUE bodies already merged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Record type ID (e.g. `records::MULRK`, `records::VCENTER`).
    pub record_type: u16,
    /// Record body bytes (CONTINUE records have been concatenated).
    pub data: Vec<u8>,
    /// Byte offset of this record's header in the stream (for debugging).
    pub stream_offset: u64,
}

impl RawRecord {
    /// A record that has not been read from a stream.
    pub fn new(record_type: u16, data: Vec<u8>) -> Self {
        Self {
            record_type,
            data,
            stream_offset: 0,
        }
    }
}

/// Reads all BIFF8 records from a byte stream, merging CONTINUE records
/// into their parent.
///
/// Returns the records in order. Each record's `data` field contains the
/// full body (including any CONTINUE extensions).
pub fn read_all_records<R: Read + Seek>(stream: &mut R) -> BiffResult<Vec<RawRecord>> {
    let mut out: Vec<RawRecord> = Vec::new();
    let mut header_buf = [0u8; 4];

    loop {
        let stream_offset = stream.stream_position()?;

        match stream.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(BiffError::Io(e)),
        }

        let record_type = u16::from_le_bytes([header_buf[0], header_buf[1]]);
        let body_len = u16::from_le_bytes([header_buf[2], header_buf[3]]) as usize;

        let mut body = vec![0u8; body_len];
        if body_len > 0 {
            stream.read_exact(&mut body)?;
        }

        if record_type == records::CONTINUE {
            if let Some(prev) = out.last_mut() {
                prev.data.extend_from_slice(&body);
            } else {
                log::warn!("dropping orphaned CONTINUE record at offset {stream_offset}");
            }
        } else {
            out.push(RawRecord {
                record_type,
                data: body,
                stream_offset,
            });
        }
    }

    Ok(out)
}

/// Frames records back into a BIFF8 byte stream.
///
/// Bodies longer than [`records::MAX_RECORD_DATA`] are split, with the tail
/// carried by CONTINUE records.
pub fn write_records(recs: &[RawRecord]) -> Vec<u8> {
    let total: usize = recs.iter().map(|r| r.data.len() + 4).sum();
    let mut out = Vec::with_capacity(total);

    for rec in recs {
        let mut chunks = rec.data.chunks(records::MAX_RECORD_DATA);
        let first = chunks.next().unwrap_or(&[]);
        push_record(&mut out, rec.record_type, first);
        for chunk in chunks {
            push_record(&mut out, records::CONTINUE, chunk);
        }
    }

    out
}

fn push_record(out: &mut Vec<u8>, record_type: u16, body: &[u8]) {
    out.extend_from_slice(&record_type.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

/// Extract the BOF record fields from a record body.
///
/// Returns `(version, substream_type)`.
/// - `version` should be `0x0600` for BIFF8
/// - `substream_type`: 0x0005 = workbook globals, 0x0010 = worksheet, etc.
pub fn parse_bof(data: &[u8]) -> BiffResult<(u16, u16)> {
    if data.len() < 4 {
        return Err(BiffError::InvalidFormat("BOF record too short".into()));
    }
    let version = u16::from_le_bytes([data[0], data[1]]);
    let dt = u16::from_le_bytes([data[2], data[3]]);
    Ok((version, dt))
}

/// Build a minimal BIFF8 BOF body for `substream_type`.
pub fn bof_body(substream_type: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(16);
    body.extend_from_slice(&records::BIFF8_VERSION.to_le_bytes());
    body.extend_from_slice(&substream_type.to_le_bytes());
    body.resize(16, 0);
    body
}
