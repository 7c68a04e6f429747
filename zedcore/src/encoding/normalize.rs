//! Canonical ordering of set and map bodies.
//!
//! Both sort by the *tagged* encoding of the element (or key) so that the
//! order is a pure function of the bytes. Sets keep the first of equal
//! elements; maps keep the last-written value for a repeated key.
use crate::{
    encoding::read_tagged,
    error::{ZedError, ZedResult},
};

fn raw_elements(mut body: &[u8]) -> ZedResult<Vec<&[u8]>> {
    let mut out = Vec::new();
    while !body.is_empty() {
        let (_, n) = read_tagged(body)?;
        out.push(&body[..n]);
        body = &body[n..];
    }
    Ok(out)
}

/// Sort a set body and drop duplicate elements.
pub fn normalize_set(body: &[u8]) -> ZedResult<Vec<u8>> {
    let mut elems = raw_elements(body)?;
    elems.sort();
    elems.dedup();
    Ok(elems.concat())
}

/// Sort a map body (alternating key and value elements) by key and keep the
/// last value written for each key.
pub fn normalize_map(body: &[u8]) -> ZedResult<Vec<u8>> {
    let elems = raw_elements(body)?;
    if elems.len() % 2 != 0 {
        return Err(ZedError::MalformedBytes("map body has a key without a value"));
    }
    let mut entries: Vec<(&[u8], &[u8])> = elems.chunks(2).map(|kv| (kv[0], kv[1])).collect();
    // Stable, so entries with equal keys stay in write order.
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut out: Vec<(&[u8], &[u8])> = Vec::with_capacity(entries.len());
    for (key, val) in entries {
        match out.last_mut() {
            Some(last) if last.0 == key => last.1 = val,
            _ => out.push((key, val)),
        }
    }
    let mut bytes = Vec::with_capacity(body.len());
    for (key, val) in out {
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(val);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Iter, append_tagged};

    fn body_of(elems: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        for e in elems {
            append_tagged(&mut buf, Some(e), false);
        }
        buf
    }

    fn bodies(buf: &[u8]) -> Vec<Vec<u8>> {
        Iter::new(buf)
            .map(|e| e.unwrap().body.unwrap().to_vec())
            .collect()
    }

    #[test]
    fn set_is_sorted_and_unique() {
        let body = body_of(&[b"c", b"a", b"c", b"b", b"a"]);
        let out = normalize_set(&body).unwrap();
        assert_eq!(bodies(&out), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        let again = normalize_set(&out).unwrap();
        assert_eq!(out, again, "normalization is idempotent");
    }

    #[test]
    fn map_keeps_last_value() {
        let body = body_of(&[b"k2", b"first", b"k1", b"v1", b"k2", b"second"]);
        let out = normalize_map(&body).unwrap();
        assert_eq!(
            bodies(&out),
            vec![
                b"k1".to_vec(),
                b"v1".to_vec(),
                b"k2".to_vec(),
                b"second".to_vec()
            ]
        );
    }

    #[test]
    fn odd_map_body_fails() {
        let body = body_of(&[b"k"]);
        assert!(normalize_map(&body).is_err());
    }
}
