//! Microindex writer.
//!
//! Values arrive sorted by key. They go to the base section of the
//! destination file in frames of about `frame_thresh` bytes; every closed
//! frame adds an index record (its first key plus its offset under the child
//! field) to the level above, which is framed the same way in a temporary
//! file. On close the levels are appended to the base root first, followed by
//! the trailer.
use std::{
    cmp::Ordering,
    fs::{self, File},
    io::{self, BufWriter, Seek, SeekFrom, Write},
    path::{Path as FsPath, PathBuf},
    sync::Arc,
};

use log::{debug, info};
use zedcore::{
    config::IndexConfig,
    field::Path,
    magic::{MAX_FRAME_THRESH, MAX_LEVELS},
    order::Order,
    record::RecordTree,
    types::TypeContext,
    value::{Value, compare_values},
};

use crate::{
    cancel::CancelToken,
    error::{IndexError, IndexResult},
    stream::StreamWriter,
    trailer::Trailer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub keys: Vec<Path>,
    pub order: Order,
    pub frame_thresh: usize,
    /// Preferred name of the child-offset field of index records.
    pub child_field: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}

impl WriterOptions {
    pub fn from_config(config: &IndexConfig) -> Self {
        Self {
            keys: config.keys.clone(),
            order: config.order,
            frame_thresh: config.frame_thresh,
            child_field: config.child_field.clone(),
        }
    }

    pub fn with_keys(mut self, keys: Vec<Path>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn with_frame_thresh(mut self, frame_thresh: usize) -> Self {
        self.frame_thresh = frame_thresh;
        self
    }
}

struct Level {
    out: StreamWriter<BufWriter<File>>,
    /// Key of the first value of the open frame.
    frame_key: Option<Value>,
    frame_start: u64,
    closed_frames: usize,
}

impl Level {
    fn new(file: File) -> Self {
        Self {
            out: StreamWriter::new(BufWriter::new(file)),
            frame_key: None,
            frame_start: 0,
            closed_frames: 0,
        }
    }
}

pub struct Writer {
    path: PathBuf,
    dir: PathBuf,
    zctx: Arc<TypeContext>,
    opts: WriterOptions,
    child_field: String,
    /// `levels[0]` writes the base section to the destination; the others
    /// write to temporary files.
    levels: Vec<Level>,
    last_key: Option<Value>,
    count: u64,
    cancel: CancelToken,
}

/// A child field name that no top-level key field uses.
fn child_field_for(preferred: &str, keys: &[Path]) -> String {
    let mut name = preferred.to_string();
    while keys.iter().any(|k| k.names().first() == Some(&name)) {
        name.insert(0, '_');
    }
    name
}

impl Writer {
    pub fn new(path: impl AsRef<FsPath>, zctx: Arc<TypeContext>, opts: WriterOptions) -> IndexResult<Self> {
        if opts.keys.is_empty() || opts.keys.iter().any(Path::is_this) {
            return Err(IndexError::BadKey("at least one named key field is required".into()));
        }
        if opts.frame_thresh == 0 || opts.frame_thresh > MAX_FRAME_THRESH {
            return Err(IndexError::FrameTooLarge {
                size: opts.frame_thresh,
                max: MAX_FRAME_THRESH,
            });
        }
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file = File::create(&path)?;
        let child_field = child_field_for(&opts.child_field, &opts.keys);
        Ok(Self {
            path,
            dir,
            zctx,
            opts,
            child_field,
            levels: vec![Level::new(file)],
            last_key: None,
            count: 0,
            cancel: CancelToken::new(),
        })
    }

    /// Checked whenever a frame closes; once fired, writes and `close` fail
    /// with [`IndexError::Cancelled`].
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Name of the child-offset field in index records.
    pub fn child_field(&self) -> &str {
        &self.child_field
    }

    fn key_of(&self, v: &Value) -> IndexResult<Value> {
        if !v.ty().is_record() {
            return Err(IndexError::BadKey(format!("value is not a record: {v}")));
        }
        let mut tree = RecordTree::new();
        for key in &self.opts.keys {
            let k = v.deref_path(key.names()).unwrap_or_else(Value::null);
            tree.insert(key.names(), k, false)?;
        }
        Ok(tree.build(&self.zctx)?)
    }

    fn compare_keys(&self, a: &Value, b: &Value) -> Ordering {
        for key in &self.opts.keys {
            let (x, y) = (a.deref_path(key.names()), b.deref_path(key.names()));
            let ord = match (x, y) {
                (Some(x), Some(y)) => compare_values(&x, &y, true),
                _ => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return self.opts.order.apply(ord);
            }
        }
        Ordering::Equal
    }

    /// Append `v`, which must not sort before the previous value.
    pub fn write(&mut self, v: &Value) -> IndexResult<()> {
        let key = self.key_of(v)?;
        if let Some(last) = &self.last_key
            && self.compare_keys(last, &key) == Ordering::Greater
        {
            return Err(IndexError::BadKey(format!(
                "key {key} is out of {} order",
                self.opts.order
            )));
        }
        self.last_key = Some(key.clone());
        self.count += 1;
        self.write_level(0, v, key)
    }

    fn write_level(&mut self, level: usize, v: &Value, key: Value) -> IndexResult<()> {
        let thresh = self.opts.frame_thresh as u64;
        let l = &mut self.levels[level];
        if l.frame_key.is_none() {
            l.frame_key = Some(key);
            l.frame_start = l.out.position();
        }
        l.out.write(v)?;
        if l.out.frame_size() >= thresh {
            self.close_frame(level)?;
        }
        Ok(())
    }

    /// Close the open frame of `level` and index it in the level above.
    fn close_frame(&mut self, level: usize) -> IndexResult<()> {
        self.cancel.check()?;
        let l = &mut self.levels[level];
        let Some(key) = l.frame_key.take() else {
            return Ok(());
        };
        l.out.end_frame()?;
        l.closed_frames += 1;
        let start = l.frame_start;
        debug!("microindex level {level}: closed frame at offset {start}");

        let mut entry = RecordTree::new();
        for path in &self.opts.keys {
            if let Some(k) = key.deref_path(path.names()) {
                entry.insert(path.names(), k, false)?;
            }
        }
        entry.insert(&[self.child_field.as_str()], Value::int64(start as i64), false)?;
        let entry = entry.build(&self.zctx)?;

        if level + 1 == self.levels.len() {
            if self.levels.len() == MAX_LEVELS {
                return Err(IndexError::TooManyLevels { max: MAX_LEVELS });
            }
            self.levels.push(Level::new(tempfile::tempfile_in(&self.dir)?));
            debug!("microindex level {} opened", level + 1);
        }
        self.write_level(level + 1, &entry, key)
    }

    /// Flush every level and finish the file with its index sections and
    /// trailer.
    pub fn close(mut self) -> IndexResult<()> {
        self.cancel.check()?;
        let mut level = 0;
        while level < self.levels.len() {
            let top = level + 1 == self.levels.len();
            let l = &mut self.levels[level];
            if l.frame_key.is_some() {
                if top && l.closed_frames == 0 {
                    l.frame_key = None;
                    l.out.end_frame()?;
                } else {
                    self.close_frame(level)?;
                }
            }
            level += 1;
        }

        let mut levels = std::mem::take(&mut self.levels).into_iter();
        let Some(base) = levels.next() else {
            return Err(IndexError::Malformed("writer has no base level".into()));
        };
        let base_size = base.out.position();
        let mut dest = base.out.into_inner()?;
        let mut sections = Vec::new();
        if self.count > 0 {
            sections.push(base_size);
        }
        for level in levels.rev() {
            let size = level.out.position();
            let mut file = level.out.into_inner()?.into_inner().map_err(|e| e.into_error())?;
            file.seek(SeekFrom::Start(0))?;
            let copied = io::copy(&mut file, &mut dest)?;
            if copied != size {
                return Err(IndexError::Malformed(format!(
                    "index level of {size} bytes copied as {copied} bytes"
                )));
            }
            sections.push(size);
        }

        let trailer = Trailer {
            order: self.opts.order,
            child_field: self.child_field.clone(),
            frame_thresh: self.opts.frame_thresh,
            keys: self.opts.keys.clone(),
            sections,
        };
        dest.write_all(&trailer.encode(&self.zctx)?)?;
        dest.flush()?;
        info!(
            "microindex {} written: {} values, {} level(s), sections {:?}",
            self.path.display(),
            self.count,
            trailer.levels(),
            trailer.sections
        );
        Ok(())
    }

    /// Discard the partial index: temporaries are dropped and the
    /// destination removed.
    pub fn abort(mut self) -> IndexResult<()> {
        self.levels.clear();
        let removed = fs::remove_file(&self.path);
        info!("microindex {} aborted", self.path.display());
        match removed {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_field_avoids_keys() {
        let keys: Vec<Path> = vec!["_child".parse().unwrap(), "a".parse().unwrap()];
        assert_eq!(child_field_for("_child", &keys), "__child");
        assert_eq!(child_field_for("_child", &keys[1..]), "_child");
    }

    #[test]
    fn options_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let zctx = Arc::new(TypeContext::new());
        let path = dir.path().join("x.zed");
        let err = Writer::new(&path, zctx.clone(), WriterOptions::default().with_keys(vec![])).err();
        assert!(err.is_some_and(|e| e.is_bad_key()));
        let err = Writer::new(&path, zctx, WriterOptions::default().with_frame_thresh(MAX_FRAME_THRESH + 1)).err();
        assert!(err.is_some_and(|e| e.is_frame_too_large()));
    }
}
