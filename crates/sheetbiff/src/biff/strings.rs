//! BIFF8 short string decoding and encoding.
//!
//! Short strings (BOUNDSHEET sheet names) carry a 1-byte character count,
//! then a flags byte, then the characters:
//! - Flags bit 0 (`fHighByte`): 0 = compressed Latin-1, 1 = uncompressed UTF-16LE

use super::parser::read_u8;
use crate::error::{BiffError, BiffResult};

/// Read a BIFF8 "short" string (1-byte length prefix, used in BOUNDSHEET etc.).
pub fn read_short_string(data: &[u8], offset: &mut usize) -> BiffResult<String> {
    let char_count = read_u8(data, offset)? as usize;
    let flags = read_u8(data, offset)?;
    let is_wide = (flags & 0x01) != 0;

    let byte_len = if is_wide { char_count * 2 } else { char_count };
    if *offset + byte_len > data.len() {
        return Err(BiffError::Bounds {
            offset: *offset,
            len: data.len(),
            needed: byte_len,
        });
    }
    let bytes = &data[*offset..*offset + byte_len];
    *offset += byte_len;

    if is_wide {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units)
            .map_err(|e| BiffError::InvalidFormat(format!("invalid UTF-16 string: {e}")))
    } else {
        Ok(bytes.iter().map(|&b| b as char).collect())
    }
}

/// Encode a short string. Latin-1 text is stored compressed, anything else as UTF-16LE.
///
/// Names longer than 255 UTF-16 units are truncated (Excel caps sheet names at 31).
pub fn write_short_string(out: &mut Vec<u8>, text: &str) {
    // At most 255 UTF-16 units, cut on a char boundary
    let mut units = Vec::with_capacity(u8::MAX as usize);
    for ch in text.chars() {
        let mut buf = [0u16; 2];
        let encoded = ch.encode_utf16(&mut buf);
        if units.len() + encoded.len() > u8::MAX as usize {
            break;
        }
        units.extend_from_slice(encoded);
    }
    out.push(units.len() as u8);
    if units.iter().all(|&u| u <= 0xFF) {
        out.push(0x00);
        out.extend(units.iter().map(|&u| u as u8));
    } else {
        out.push(0x01);
        for u in units {
            out.extend_from_slice(&u.to_le_bytes());
        }
    }
}
