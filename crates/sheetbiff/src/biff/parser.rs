//! Low-level binary parsing helpers for BIFF8 records.
//!
//! All multi-byte integers in BIFF8 are little-endian. Every helper checks
//! the remaining length first and reports a [`BiffError::Bounds`] instead of
//! reading past the payload.

use crate::error::{BiffError, BiffResult};

#[inline]
fn check(data: &[u8], offset: usize, needed: usize) -> BiffResult<()> {
    if offset.checked_add(needed).map_or(true, |end| end > data.len()) {
        return Err(BiffError::Bounds {
            offset,
            len: data.len(),
            needed,
        });
    }
    Ok(())
}

/// Read a `u8` from a byte slice at `offset`, advancing `offset`.
#[inline]
pub fn read_u8(data: &[u8], offset: &mut usize) -> BiffResult<u8> {
    check(data, *offset, 1)?;
    let v = data[*offset];
    *offset += 1;
    Ok(v)
}

/// Read a `u16` (little-endian) from a byte slice at `offset`, advancing `offset`.
#[inline]
pub fn read_u16(data: &[u8], offset: &mut usize) -> BiffResult<u16> {
    check(data, *offset, 2)?;
    let v = u16::from_le_bytes([data[*offset], data[*offset + 1]]);
    *offset += 2;
    Ok(v)
}

/// Read a `u32` (little-endian) from a byte slice at `offset`, advancing `offset`.
#[inline]
pub fn read_u32(data: &[u8], offset: &mut usize) -> BiffResult<u32> {
    check(data, *offset, 4)?;
    let v = u32::from_le_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]);
    *offset += 4;
    Ok(v)
}

/// Write a `u16` (little-endian) in place. The slice is never grown.
#[inline]
pub fn write_u16(data: &mut [u8], offset: usize, value: u16) -> BiffResult<()> {
    check(data, offset, 2)?;
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Decode an RK-encoded number.
///
/// RK encoding (4 bytes):
/// - Bit 0: if 1, the decoded number should be divided by 100
/// - Bit 1: if 1, value is an integer (bits 2..31 as signed 30-bit int)
///           if 0, value is an IEEE 754 double (bits 2..31 are the upper 30 bits,
///           lower 34 bits of the double are zero)
#[inline]
pub fn decode_rk(rk: u32) -> f64 {
    let div100 = (rk & 0x01) != 0;
    let is_integer = (rk & 0x02) != 0;

    let value = if is_integer {
        ((rk as i32) >> 2) as f64
    } else {
        let upper = (rk & 0xFFFF_FFFC) as u64;
        f64::from_bits(upper << 32)
    };

    if div100 {
        value / 100.0
    } else {
        value
    }
}

/// Encode a small integer as an RK value, if it fits in 30 signed bits.
#[inline]
pub fn encode_rk_integer(value: i32) -> Option<u32> {
    const MIN: i32 = -(1 << 29);
    const MAX: i32 = (1 << 29) - 1;
    (MIN..=MAX)
        .contains(&value)
        .then(|| ((value << 2) as u32) | 0x02)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rk_integer() {
        let rk = (42u32 << 2) | 0x02;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_integer_negative() {
        let rk = ((-5i32 << 2) as u32) | 0x02;
        assert_eq!(decode_rk(rk), -5.0);
    }

    #[test]
    fn test_decode_rk_float() {
        let bits = 42.0_f64.to_bits();
        let rk = ((bits >> 32) as u32) & 0xFFFF_FFFC;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_real_values() {
        // Values seen in real MULRK records
        assert_eq!(decode_rk(0x000000AA), 42.0);
        assert!((decode_rk(0x000004EB) - 3.14).abs() < f64::EPSILON);
        assert_eq!(decode_rk(0xFFFFFE72), -100.0);
        assert_eq!(decode_rk(0x00000002), 0.0);
    }

    #[test]
    fn test_encode_rk_integer() {
        assert_eq!(encode_rk_integer(42), Some(0x000000AA));
        assert_eq!(encode_rk_integer(-100), Some(0xFFFFFE72));
        assert_eq!(encode_rk_integer(1 << 29), None);
        let rk = encode_rk_integer(-(1 << 29)).unwrap();
        assert_eq!(decode_rk(rk), -(1i64 << 29) as f64);
    }

    #[test]
    fn test_read_u16() {
        let data = [0x34, 0x12];
        let mut off = 0;
        assert_eq!(read_u16(&data, &mut off).unwrap(), 0x1234);
        assert_eq!(off, 2);
    }

    #[test]
    fn test_short_reads_are_bounds_errors() {
        let data = [0x01, 0x02, 0x03];
        let mut off = 2;
        match read_u16(&data, &mut off) {
            Err(BiffError::Bounds {
                offset,
                len,
                needed,
            }) => {
                assert_eq!((offset, len, needed), (2, 3, 2));
            }
            other => panic!("expected bounds error, got {other:?}"),
        }
        // Offset is not advanced on failure
        assert_eq!(off, 2);

        let mut buf = [0u8; 3];
        assert!(write_u16(&mut buf, 2, 0xFFFF).is_err());
        assert_eq!(buf, [0, 0, 0]);
    }
}
