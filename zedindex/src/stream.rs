//! Framed value stream.
//!
//! A stream is a sequence of frames. A frame defines every type before the
//! first value that uses it and ends with an end-of-frame marker, after which
//! type numbering starts over, so a reader may start at any frame boundary.
//!
//! Messages, each introduced by a one-byte code:
//! - `0x00`: end of frame.
//! - `0x01 len tv`: the next local type, as a `len`-byte type value.
//! - `0x02 id n body`: a value of local type `id`; `n` is 0 for null and the
//!   body length plus one otherwise.
//!
//! Integers are uvarints.
use std::{
    collections::HashMap,
    io::{BufRead, Read, Write},
    sync::Arc,
};

use zedcore::{
    encoding::integer::append_uvarint,
    magic::MAX_FRAME_THRESH,
    types::{Type, TypeContext, tv},
    value::Value,
};

use crate::error::{IndexError, IndexResult};

const END_OF_FRAME: u8 = 0x00;
const TYPE_DEF: u8 = 0x01;
const VALUE: u8 = 0x02;

pub struct StreamWriter<W: Write> {
    inner: W,
    position: u64,
    frame_start: u64,
    types: HashMap<Type, u64>,
    buf: Vec<u8>,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            frame_start: 0,
            types: HashMap::new(),
            buf: Vec::new(),
        }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes written since the current frame began.
    pub fn frame_size(&self) -> u64 {
        self.position - self.frame_start
    }

    pub fn write(&mut self, v: &Value) -> IndexResult<()> {
        self.buf.clear();
        let id = match self.types.get(v.ty()) {
            Some(id) => *id,
            None => {
                let tv = tv::encode(v.ty());
                self.buf.push(TYPE_DEF);
                append_uvarint(&mut self.buf, tv.len() as u64);
                self.buf.extend_from_slice(&tv);
                let id = self.types.len() as u64;
                self.types.insert(v.ty().clone(), id);
                id
            }
        };
        self.buf.push(VALUE);
        append_uvarint(&mut self.buf, id);
        match v.bytes() {
            None => {
                append_uvarint(&mut self.buf, 0);
            }
            Some(body) => {
                if body.len() > MAX_FRAME_THRESH {
                    return Err(IndexError::FrameTooLarge {
                        size: body.len(),
                        max: MAX_FRAME_THRESH,
                    });
                }
                append_uvarint(&mut self.buf, body.len() as u64 + 1);
                self.buf.extend_from_slice(body);
            }
        }
        self.inner.write_all(&self.buf)?;
        self.position += self.buf.len() as u64;
        Ok(())
    }

    /// Close the current frame; the next value starts a new one.
    pub fn end_frame(&mut self) -> IndexResult<()> {
        self.inner.write_all(&[END_OF_FRAME])?;
        self.position += 1;
        self.frame_start = self.position;
        self.types.clear();
        Ok(())
    }

    pub fn flush(&mut self) -> IndexResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> IndexResult<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

/// Reads the values of a framed stream, interning their types in a shared
/// context.
pub struct StreamReader<R: BufRead> {
    inner: R,
    zctx: Arc<TypeContext>,
    types: Vec<Type>,
    max_frame: usize,
}

impl<R: BufRead> StreamReader<R> {
    pub fn new(inner: R, zctx: Arc<TypeContext>) -> Self {
        Self {
            inner,
            zctx,
            types: Vec::new(),
            max_frame: MAX_FRAME_THRESH,
        }
    }

    /// Reject value bodies and type values larger than `max` bytes.
    pub fn with_max_frame(mut self, max: usize) -> Self {
        self.max_frame = max;
        self
    }

    fn read_byte(&mut self) -> IndexResult<Option<u8>> {
        let buf = self.inner.fill_buf()?;
        let Some(&b) = buf.first() else {
            return Ok(None);
        };
        self.inner.consume(1);
        Ok(Some(b))
    }

    fn read_uvarint(&mut self) -> IndexResult<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let b = self
                .read_byte()?
                .ok_or_else(|| IndexError::Malformed("truncated integer".into()))?;
            value |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(IndexError::Malformed("integer overflows 64 bits".into()))
    }

    fn read_body(&mut self, len: u64) -> IndexResult<Vec<u8>> {
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        if len > self.max_frame {
            return Err(IndexError::FrameTooLarge {
                size: len,
                max: self.max_frame,
            });
        }
        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body)?;
        Ok(body)
    }

    /// The next value, or `None` at the end of the input.
    pub fn read(&mut self) -> IndexResult<Option<Value>> {
        loop {
            let Some(code) = self.read_byte()? else {
                return Ok(None);
            };
            match code {
                END_OF_FRAME => self.types.clear(),
                TYPE_DEF => {
                    let len = self.read_uvarint()?;
                    let tv = self.read_body(len)?;
                    let ty = self.zctx.lookup_by_value(&tv)?;
                    self.types.push(ty);
                }
                VALUE => {
                    let id = self.read_uvarint()?;
                    let ty = usize::try_from(id)
                        .ok()
                        .and_then(|id| self.types.get(id))
                        .cloned()
                        .ok_or_else(|| IndexError::Malformed(format!("undefined type {id}")))?;
                    let body = match self.read_uvarint()? {
                        0 => None,
                        n => Some(self.read_body(n - 1)?),
                    };
                    return Ok(Some(Value::new(ty, body)));
                }
                other => {
                    return Err(IndexError::Malformed(format!(
                        "unknown message code {other:#04x}"
                    )));
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for StreamReader<R> {
    type Item = IndexResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

#[cfg(test)]
mod tests {
    use zedcore::zson;

    use super::*;

    fn values(zctx: &TypeContext, srcs: &[&str]) -> Vec<Value> {
        srcs.iter().map(|s| zson::parse_value(zctx, s).unwrap()).collect()
    }

    #[test]
    fn frames_are_self_contained() {
        let zctx = Arc::new(TypeContext::new());
        let vals = values(&zctx, &[r#"{a:1,s:"x"}"#, "{a:2,s:null(string)}", "[1,2]"]);
        let mut w = StreamWriter::new(Vec::new());
        w.write(&vals[0]).unwrap();
        w.end_frame().unwrap();
        let second = w.position();
        w.write(&vals[1]).unwrap();
        w.write(&vals[2]).unwrap();
        assert_eq!(w.frame_size(), w.position() - second);
        w.end_frame().unwrap();
        let bytes = w.into_inner().unwrap();

        let all: Vec<Value> = StreamReader::new(&bytes[..], zctx.clone())
            .collect::<IndexResult<_>>()
            .unwrap();
        assert_eq!(all, vals);

        let fresh = Arc::new(TypeContext::new());
        let tail: Vec<Value> = StreamReader::new(&bytes[second as usize..], fresh)
            .collect::<IndexResult<_>>()
            .unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(zson::format_value(&tail[0]), "{a:2,s:null(string)}");
    }

    #[test]
    fn oversized_and_garbage_input() {
        let zctx = Arc::new(TypeContext::new());
        let mut w = StreamWriter::new(Vec::new());
        w.write(&Value::string("hello world")).unwrap();
        let bytes = w.into_inner().unwrap();
        let err = StreamReader::new(&bytes[..], zctx.clone())
            .with_max_frame(4)
            .read()
            .unwrap_err();
        assert!(err.is_frame_too_large(), "{err}");

        let err = StreamReader::new(&[0x7f_u8][..], zctx).read().unwrap_err();
        assert!(err.is_malformed(), "{err}");
    }
}
