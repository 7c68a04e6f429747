//! Encoded bytes
//!
//! The binary body of a value. Every element inside a container is prefixed by
//! a uvarint *tag*:
//!
//! - `0` marks a null element (no body follows).
//! - Otherwise `tag = ((len + 1) << 1) | container`, so even tags carry
//!   primitive bodies and odd tags carry container bodies. Offsetting the
//!   length by one keeps the empty primitive (e.g. the integer zero or `""`)
//!   distinct from null.
//!
//! A container body is the plain concatenation of its tagged elements, so a
//! record body is a sequence of tagged field bodies in field order. Top-level
//! value bodies are untagged; the type tells the reader how to interpret them.
//!
//! # Role
//! [`Builder`] produces container bodies, [`Iter`] walks them without copying,
//! and [`normalize`] holds the set/map canonicalization run when a container
//! closes.
pub mod builder;
pub mod integer;
pub mod iter;
pub mod normalize;

pub use builder::Builder;
pub use iter::{Elem, Iter};

use crate::error::{ZedError, ZedResult};

/// Append one tagged element (`None` is null) to `buf`.
pub fn append_tagged(buf: &mut Vec<u8>, body: Option<&[u8]>, container: bool) {
    match body {
        None => buf.push(0),
        Some(body) => {
            let tag = ((body.len() as u64 + 1) << 1) | container as u64;
            integer::append_uvarint(buf, tag);
            buf.extend_from_slice(body);
        }
    }
}

/// Decode the tagged element at the front of `buf`.
///
/// Returns the element and the total number of bytes it occupies (tag
/// included).
pub fn read_tagged(buf: &[u8]) -> ZedResult<(Elem<'_>, usize)> {
    let (tag, n) =
        integer::read_uvarint(buf).ok_or(ZedError::MalformedBytes("truncated element tag"))?;
    if tag == 0 {
        return Ok((
            Elem {
                body: None,
                container: false,
            },
            n,
        ));
    }
    let len = (tag >> 1)
        .checked_sub(1)
        .ok_or(ZedError::MalformedBytes("invalid element tag"))? as usize;
    let end = n
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or(ZedError::MalformedBytes("element body extends past container"))?;
    Ok((
        Elem {
            body: Some(&buf[n..end]),
            container: tag & 1 == 1,
        },
        end,
    ))
}

/// Size of `body` once tagged.
pub fn tagged_len(body: Option<&[u8]>) -> usize {
    match body {
        None => 1,
        Some(b) => integer::uvarint_len(((b.len() as u64) + 1) << 1) + b.len(),
    }
}

/// Count the elements of a container body.
pub fn count(body: &[u8]) -> ZedResult<usize> {
    let mut n = 0;
    for elem in Iter::new(body) {
        elem?;
        n += 1;
    }
    Ok(n)
}

/// Return the `n`-th element of a container body, if present.
pub fn nth(body: &[u8], n: usize) -> ZedResult<Option<Elem<'_>>> {
    Iter::new(body).nth(n).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_empty_are_distinct() {
        let mut buf = Vec::new();
        append_tagged(&mut buf, None, false);
        append_tagged(&mut buf, Some(&[]), false);
        assert_eq!(buf, vec![0, 2]);

        let (first, n) = read_tagged(&buf).unwrap();
        assert_eq!(first.body, None);
        let (second, _) = read_tagged(&buf[n..]).unwrap();
        assert_eq!(second.body, Some(&[][..]));
    }

    #[test]
    fn container_bit_roundtrips() {
        let mut buf = Vec::new();
        append_tagged(&mut buf, Some(b"abc"), true);
        assert_eq!(buf[0] & 1, 1, "odd tag marks a container");
        assert_eq!(tagged_len(Some(b"abc")), buf.len());
        let (elem, n) = read_tagged(&buf).unwrap();
        assert!(elem.container);
        assert_eq!(elem.body, Some(&b"abc"[..]));
        assert_eq!(n, 4);
    }

    #[test]
    fn body_past_end_is_rejected() {
        // tag for a 5 byte primitive followed by only 2 bytes
        let buf = vec![12, 1, 2];
        assert!(read_tagged(&buf).is_err());
        assert!(read_tagged(&[1]).is_err(), "tag 1 encodes length -1");
    }
}
