//! Keyed lookups over a microindex.
//!
//! A search descends from the root level: in each level it follows the child
//! offset of the last index record whose key sorts before the target (or the
//! first record, if none does), then scans the base section forward from the
//! chosen frame. Scans continue across frame boundaries so runs of equal keys
//! spanning several frames are seen whole.
use std::{cmp::Ordering, path::Path as FsPath, sync::Arc};

use log::trace;
use zedcore::{
    field::Path,
    order::Order,
    record::RecordTree,
    types::{PrimitiveId, TypeContext},
    value::{Value, compare_values},
    zson,
};

use crate::{
    cancel::CancelToken,
    error::{IndexError, IndexResult},
    reader::{Reader, SectionReader},
};

/// Compares records against a target over the index keys the target carries.
#[derive(Debug)]
struct KeyCompare {
    keys: Vec<Path>,
    want: Vec<Value>,
    order: Order,
}

impl KeyCompare {
    /// Uses the leading run of index keys present in `target`.
    fn new(keys: &[Path], order: Order, target: &Value) -> IndexResult<Self> {
        let (keys, want): (Vec<_>, Vec<_>) = keys
            .iter()
            .map_while(|k| target.deref_path(k.names()).map(|v| (k.clone(), v)))
            .unzip();
        if keys.is_empty() {
            return Err(IndexError::BadKey(format!("{target} has none of the index keys")));
        }
        Ok(Self { keys, want, order })
    }

    /// Where `rec` sorts relative to the target in stream order.
    fn cmp(&self, rec: &Value) -> Ordering {
        for (key, want) in self.keys.iter().zip(&self.want) {
            let got = rec.deref_path(key.names()).unwrap_or_else(Value::null);
            let ord = self.order.apply(compare_values(&got, want, true));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

pub struct Finder {
    reader: Reader,
    cancel: CancelToken,
}

impl Finder {
    pub fn new(reader: Reader) -> Self {
        Self {
            reader,
            cancel: CancelToken::new(),
        }
    }

    pub fn open(path: impl AsRef<FsPath>, zctx: Arc<TypeContext>) -> IndexResult<Self> {
        Ok(Self::new(Reader::open(path, zctx)?))
    }

    /// Searches fail with [`IndexError::Cancelled`] once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    pub fn is_empty(&self) -> bool {
        self.reader.trailer().is_empty()
    }

    /// Build a target from ZSON texts, one per leading index key.
    pub fn parse_keys<S: AsRef<str>>(&self, inputs: &[S]) -> IndexResult<Value> {
        let keys = &self.reader.trailer().keys;
        if inputs.is_empty() {
            return Err(IndexError::BadKey("no key values given".into()));
        }
        if inputs.len() > keys.len() {
            return Err(IndexError::BadKey(format!(
                "{} key values given for {} index keys",
                inputs.len(),
                keys.len()
            )));
        }
        let zctx = self.reader.zctx();
        let mut tree = RecordTree::new();
        for (key, input) in keys.iter().zip(inputs) {
            let input = input.as_ref();
            let v = zson::parse_value(zctx, input)
                .map_err(|e| IndexError::BadKey(format!("key {key}: {e}")))?;
            tree.insert(key.names(), v, false)?;
        }
        Ok(tree.build(zctx)?)
    }

    fn key_compare(&self, target: &Value) -> IndexResult<KeyCompare> {
        let trailer = self.reader.trailer();
        KeyCompare::new(&trailer.keys, trailer.order, target)
    }

    /// Child offset chosen in `level`, scanning from `offset`.
    fn descend(&self, level: usize, offset: u64, kc: &KeyCompare) -> IndexResult<u64> {
        let mut first = None;
        let mut chosen = None;
        for entry in self.reader.section_reader(level, offset)? {
            self.cancel.check()?;
            let entry = entry?;
            if first.is_none() {
                first = Some(entry.clone());
            }
            match kc.cmp(&entry) {
                Ordering::Less => chosen = Some(entry),
                Ordering::Equal | Ordering::Greater => break,
            }
        }
        let entry = chosen
            .or(first)
            .ok_or_else(|| IndexError::Malformed(format!("index level {level} is empty")))?;
        let child_field = &self.reader.trailer().child_field;
        let child = entry
            .deref(child_field)
            .filter(|c| !c.is_null() && c.ty().is(PrimitiveId::Int64))
            .and_then(|c| u64::try_from(c.as_int()).ok())
            .ok_or_else(|| IndexError::Malformed(format!("index record {entry} has no valid '{child_field}'")))?;
        trace!("microindex level {level}: descending to offset {child}");
        Ok(child)
    }

    /// Reader over the base section positioned at the frame a search for
    /// `kc` starts in, or `None` for an empty index.
    fn start(&self, kc: &KeyCompare) -> IndexResult<Option<SectionReader>> {
        let levels = self.reader.trailer().levels();
        if levels == 0 {
            return Ok(None);
        }
        let mut offset = 0;
        for level in (1..levels).rev() {
            offset = self.descend(level, offset, kc)?;
        }
        Ok(Some(self.reader.section_reader(0, offset)?))
    }

    /// Feed base records to `visit` from the start frame until it returns
    /// `false` or the section ends.
    fn scan(&self, target: &Value, mut visit: impl FnMut(Ordering, Value) -> bool) -> IndexResult<()> {
        let kc = self.key_compare(target)?;
        let Some(records) = self.start(&kc)? else {
            return Ok(());
        };
        for rec in records {
            self.cancel.check()?;
            let rec = rec?;
            if !visit(kc.cmp(&rec), rec) {
                break;
            }
        }
        Ok(())
    }

    /// The first value whose keys equal the target's.
    pub fn lookup(&self, target: &Value) -> IndexResult<Option<Value>> {
        let mut found = None;
        self.scan(target, |ord, rec| match ord {
            Ordering::Less => true,
            Ordering::Equal => {
                found = Some(rec);
                false
            }
            Ordering::Greater => false,
        })?;
        Ok(found)
    }

    /// Every value whose keys equal the target's, in stream order.
    pub fn lookup_all(&self, target: &Value) -> IndexResult<Vec<Value>> {
        let mut found = Vec::new();
        self.scan(target, |ord, rec| match ord {
            Ordering::Less => true,
            Ordering::Equal => {
                found.push(rec);
                true
            }
            Ordering::Greater => false,
        })?;
        Ok(found)
    }

    fn first_at_or_after(&self, target: &Value) -> IndexResult<Option<Value>> {
        let mut found = None;
        self.scan(target, |ord, rec| {
            if ord == Ordering::Less {
                return true;
            }
            found = Some(rec);
            false
        })?;
        Ok(found)
    }

    fn last_at_or_before(&self, target: &Value) -> IndexResult<Option<Value>> {
        let mut found = None;
        self.scan(target, |ord, rec| {
            if ord == Ordering::Greater {
                return false;
            }
            found = Some(rec);
            true
        })?;
        Ok(found)
    }

    /// The value with the smallest keys greater than or equal to the target.
    pub fn closest_gte(&self, target: &Value) -> IndexResult<Option<Value>> {
        match self.reader.trailer().order {
            Order::Asc => self.first_at_or_after(target),
            Order::Desc => self.last_at_or_before(target),
        }
    }

    /// The value with the largest keys less than or equal to the target.
    pub fn closest_lte(&self, target: &Value) -> IndexResult<Option<Value>> {
        match self.reader.trailer().order {
            Order::Asc => self.last_at_or_before(target),
            Order::Desc => self.first_at_or_after(target),
        }
    }
}
