//! Integer helpers for the value encoding.
//!
//! Two families live here:
//! - *uvarints*: base-128, least-significant group first, MSB set on every
//!   byte except the last. Used for element tags, type-value lengths and
//!   stream framing, where the reader does not know the length in advance.
//! - *counted* integers: the minimal little-endian byte string of the value
//!   (zig-zag mapped for signed values). Used for primitive bodies, whose
//!   length is already carried by the enclosing tag. Zero encodes as the empty
//!   body, which is distinct from null.

/// Append `value` to `buf` as a uvarint and return the number of bytes written.
pub fn append_uvarint(buf: &mut Vec<u8>, mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
        size += 1;
    }
    buf.push(value as u8);
    size
}

/// Decode one uvarint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed, or [`None`] if the
/// slice ends before the terminating byte or the value overflows 64 bits.
pub fn read_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 || (shift == 63 && byte > 1) {
            return None;
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

/// Encoded size in bytes of `value` as a uvarint.
pub fn uvarint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Append the minimal little-endian representation of `value`.
pub fn append_counted_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value != 0 {
        buf.push(value as u8);
        value >>= 8;
    }
}

/// Inverse of [`append_counted_uvarint`]. Bytes past the eighth are ignored.
pub fn decode_counted_uvarint(body: &[u8]) -> u64 {
    body.iter()
        .take(8)
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | ((b as u64) << (8 * i)))
}

pub fn append_counted_varint(buf: &mut Vec<u8>, value: i64) {
    append_counted_uvarint(buf, zigzag(value))
}

pub fn decode_counted_varint(body: &[u8]) -> i64 {
    unzigzag(decode_counted_uvarint(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uvarint_edges() {
        for &v in &[0u64, 1, 127, 128, 300, 16383, 16384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            let n = append_uvarint(&mut buf, v);
            assert_eq!(n, buf.len());
            assert_eq!(n, uvarint_len(v), "uvarint_len mismatch for {v}");
            assert_eq!(read_uvarint(&buf), Some((v, n)));
        }
    }

    #[test]
    fn uvarint_truncated() {
        assert_eq!(read_uvarint(&[0x80, 0x80]), None);
        assert_eq!(read_uvarint(&[]), None);
    }

    #[test]
    fn counted_zero_is_empty() {
        let mut buf = Vec::new();
        append_counted_varint(&mut buf, 0);
        assert!(buf.is_empty());
        assert_eq!(decode_counted_varint(&buf), 0);
    }

    #[test]
    fn counted_signed_extremes() {
        for &v in &[i64::MIN, -1, 1, i64::MAX, -300] {
            let mut buf = Vec::new();
            append_counted_varint(&mut buf, v);
            assert!(buf.len() <= 8);
            assert_eq!(decode_counted_varint(&buf), v);
        }
        let mut buf = Vec::new();
        append_counted_varint(&mut buf, -1);
        assert_eq!(buf, vec![1], "-1 zig-zags to 1");
    }
}
