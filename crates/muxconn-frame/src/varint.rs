//! Unsigned LEB128 varints, the integer encoding used for frame headers.
//!
//! Seven value bits per byte, least significant group first, high bit set on
//! every byte except the last. Only the minimal encoding of a value is
//! accepted, so every integer has exactly one wire form.

use bytes::BufMut;

use crate::error::VarintError;

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the encoding of `value` to `dst`.
pub fn put_uvarint(dst: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        dst.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes `put_uvarint` writes for `value`.
pub fn uvarint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a varint from the front of `src` without consuming it.
///
/// Returns `Ok(None)` if `src` ends before the varint does, or the value and
/// the number of bytes it occupies.
pub fn peek_uvarint(src: &[u8]) -> Result<Option<(u64, usize)>, VarintError> {
    let mut value = 0u64;
    for (i, &byte) in src.iter().take(MAX_VARINT_LEN).enumerate() {
        // The tenth byte carries bit 63 only.
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(VarintError::Overflow);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if i > 0 && byte == 0 {
                return Err(VarintError::NonCanonical);
            }
            return Ok(Some((value, i + 1)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_uvarint(&mut buf, value);
        buf.to_vec()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(1), [0x01]);
        assert_eq!(encode(127), [0x7f]);
        assert_eq!(encode(128), [0x80, 0x01]);
        assert_eq!(encode(300), [0xac, 0x02]);
        assert_eq!(encode(4096), [0x80, 0x20]);
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn lengths_match_encoder() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            assert_eq!(uvarint_len(value), encode(value).len(), "value {value}");
        }
    }

    #[test]
    fn peek_reports_consumed_bytes() {
        let mut bytes = encode(300);
        bytes.extend_from_slice(b"tail");
        assert_eq!(peek_uvarint(&bytes).unwrap(), Some((300, 2)));
        assert_eq!(peek_uvarint(&encode(u64::MAX)).unwrap(), Some((u64::MAX, 10)));
    }

    #[test]
    fn incomplete_input() {
        assert_eq!(peek_uvarint(&[]).unwrap(), None);
        assert_eq!(peek_uvarint(&[0x80]).unwrap(), None);
        assert_eq!(peek_uvarint(&[0xff, 0xff, 0xff]).unwrap(), None);
    }

    #[test]
    fn rejects_non_minimal() {
        assert_eq!(peek_uvarint(&[0x80, 0x00]), Err(VarintError::NonCanonical));
        assert_eq!(peek_uvarint(&[0x81, 0x80, 0x00]), Err(VarintError::NonCanonical));
    }

    #[test]
    fn rejects_overflow() {
        let mut too_big = vec![0xff; 9];
        too_big.push(0x02);
        assert_eq!(peek_uvarint(&too_big), Err(VarintError::Overflow));

        let too_long = vec![0x80; 11];
        assert_eq!(peek_uvarint(&too_long), Err(VarintError::Overflow));
    }
}
