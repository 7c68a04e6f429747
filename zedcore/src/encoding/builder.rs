use crate::{
    encoding::{append_tagged, read_tagged},
    error::{ZedError, ZedResult},
};

/// Incremental writer of container bodies.
///
/// Elements are appended in order; nested containers are opened with
/// [`Builder::begin_container`] and closed with [`Builder::end_container`].
/// The accumulated bytes are the body of the outermost (implicit) container,
/// i.e. the concatenation of the top-level tagged elements.
///
/// ```rust
/// # use zedcore::encoding::{Builder, Iter};
/// let mut b = Builder::new();
/// b.append_primitive(Some(b"a"));
/// b.begin_container();
/// b.append_primitive(None);
/// b.end_container().unwrap();
/// let body = b.finish().unwrap();
/// assert_eq!(Iter::new(&body).count(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Builder {
    bytes: Vec<u8>,
    open: Vec<usize>,
    last_closed: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all state so the builder can be reused without reallocating.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.open.clear();
        self.last_closed = None;
    }

    /// Number of containers currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn begin_container(&mut self) {
        self.last_closed = None;
        self.open.push(self.bytes.len());
    }

    /// Close the innermost open container, tagging its body.
    pub fn end_container(&mut self) -> ZedResult<()> {
        let start = self.open.pop().ok_or(ZedError::Unbalanced)?;
        let body = self.bytes.split_off(start);
        append_tagged(&mut self.bytes, Some(&body), true);
        self.last_closed = Some(start);
        Ok(())
    }

    /// Append a primitive element; `None` appends null.
    pub fn append_primitive(&mut self, body: Option<&[u8]>) {
        self.last_closed = None;
        append_tagged(&mut self.bytes, body, false);
    }

    /// Append an already-built container body as one element.
    pub fn append_container(&mut self, body: Option<&[u8]>) {
        self.last_closed = None;
        append_tagged(&mut self.bytes, body, true);
    }

    pub fn append(&mut self, body: Option<&[u8]>, container: bool) {
        if container {
            self.append_container(body)
        } else {
            self.append_primitive(body)
        }
    }

    /// Rewrite the body of the container closed by the last call to
    /// [`Builder::end_container`]. Set and map normalization run through here.
    pub fn transform_container<F>(&mut self, f: F) -> ZedResult<()>
    where
        F: FnOnce(&[u8]) -> ZedResult<Vec<u8>>,
    {
        let start = self.last_closed.ok_or(ZedError::NotContainer)?;
        let (elem, _) = read_tagged(&self.bytes[start..])?;
        let body = elem.body.ok_or(ZedError::NotContainer)?;
        let rewritten = f(body)?;
        self.bytes.truncate(start);
        append_tagged(&mut self.bytes, Some(&rewritten), true);
        Ok(())
    }

    /// Snapshot of the bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the builder. Fails with [`ZedError::Unterminated`] if a
    /// container is still open.
    pub fn finish(self) -> ZedResult<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(ZedError::Unterminated {
                depth: self.open.len(),
            });
        }
        Ok(self.bytes)
    }

    /// Like [`Builder::finish`] but leaves the builder empty and reusable.
    pub fn take(&mut self) -> ZedResult<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(ZedError::Unterminated {
                depth: self.open.len(),
            });
        }
        self.last_closed = None;
        Ok(std::mem::take(&mut self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Iter;

    #[test]
    fn unterminated_is_reported() {
        let mut b = Builder::new();
        b.begin_container();
        b.begin_container();
        b.end_container().unwrap();
        assert!(matches!(
            b.finish(),
            Err(ZedError::Unterminated { depth: 1 })
        ));
    }

    #[test]
    fn unbalanced_close() {
        let mut b = Builder::new();
        assert!(b.end_container().unwrap_err().is_unbalanced());
    }

    #[test]
    fn transform_rewrites_last_container() {
        let mut b = Builder::new();
        b.append_primitive(Some(b"head"));
        b.begin_container();
        b.append_primitive(Some(b"b"));
        b.append_primitive(Some(b"a"));
        b.end_container().unwrap();
        b.transform_container(|body| {
            let mut elems: Vec<_> = Iter::new(body)
                .map(|e| e.map(|e| e.body.unwrap().to_vec()))
                .collect::<ZedResult<_>>()?;
            elems.reverse();
            let mut out = Vec::new();
            for e in elems {
                crate::encoding::append_tagged(&mut out, Some(&e), false);
            }
            Ok(out)
        })
        .unwrap();

        let body = b.finish().unwrap();
        let outer: Vec<_> = Iter::new(&body).map(|e| e.unwrap()).collect();
        let inner: Vec<_> = Iter::new(outer[1].body.unwrap())
            .map(|e| e.unwrap().body.unwrap().to_vec())
            .collect();
        assert_eq!(inner, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn transform_requires_closed_container() {
        let mut b = Builder::new();
        b.append_primitive(Some(b"x"));
        assert!(b.transform_container(|body| Ok(body.to_vec())).is_err());
    }
}
