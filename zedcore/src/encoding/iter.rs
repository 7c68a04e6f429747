use crate::{encoding::read_tagged, error::ZedResult};

/// One element of a container body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elem<'a> {
    /// `None` for a null element.
    pub body: Option<&'a [u8]>,
    pub container: bool,
}

/// Zero-copy iterator over the tagged elements of a container body.
///
/// Malformed input yields a single `Err` and then ends the iteration.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    buf: &'a [u8],
}

impl<'a> Iter<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self { buf: body }
    }

    pub fn done(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes not consumed yet.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = ZedResult<Elem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        match read_tagged(self.buf) {
            Ok((elem, n)) => {
                self.buf = &self.buf[n..];
                Some(Ok(elem))
            }
            Err(err) => {
                self.buf = &[];
                Some(Err(err))
            }
        }
    }
}
