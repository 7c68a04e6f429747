//! Microindex trailer.
//!
//! The trailer closes the file: a marker followed by a one-frame stream
//! holding a single record,
//!
//! ```text
//! {magic:"ZED Trailer",type:"index",version:4(int32),sections:[int64],
//!  meta:{order:"asc",child_field:"_child",frame_thresh:32768(int32),keys:[string]}}
//! ```
//!
//! `sections` lists section sizes in file order: the base section, then the
//! parent levels starting from the root.
use std::sync::Arc;

use log::debug;
use zedcore::{
    encoding::Builder,
    field::Path,
    magic::{INDEX_TYPE, INDEX_VERSION, MAX_FRAME_THRESH, TRAILER_MAX_SIZE},
    order::Order,
    record::RecordTree,
    types::{PrimitiveId, Type, TypeContext},
    value::{Value, primitive::encode_int},
};

use crate::{
    error::{IndexError, IndexResult},
    stream::{StreamReader, StreamWriter},
};

const MARKER: &[u8] = b"\x00ZEDTRLR";
const TRAILER_MAGIC: &str = "ZED Trailer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub order: Order,
    pub child_field: String,
    pub frame_thresh: usize,
    pub keys: Vec<Path>,
    pub sections: Vec<u64>,
}

fn missing(name: &str) -> IndexError {
    IndexError::NotIndex(format!("trailer has no valid '{name}' field"))
}

fn string_field(rec: &Value, path: &[&str]) -> IndexResult<String> {
    rec.deref_path(path)
        .filter(|v| v.ty().is(PrimitiveId::String) && !v.is_null())
        .map(|v| v.as_str().to_string())
        .ok_or_else(|| missing(&path.join(".")))
}

fn int_field(rec: &Value, path: &[&str]) -> IndexResult<i64> {
    rec.deref_path(path)
        .filter(|v| v.ty().primitive_id().is_some_and(PrimitiveId::is_integer) && !v.is_null())
        .map(|v| v.as_int())
        .ok_or_else(|| missing(&path.join(".")))
}

impl Trailer {
    /// Number of levels, the base section included. Zero for an empty index.
    pub fn levels(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Offset and size of the section holding `level`, where level 0 is the
    /// base and `levels() - 1` the root.
    pub fn section(&self, level: usize) -> Option<(u64, u64)> {
        let n = self.sections.len();
        if level >= n {
            return None;
        }
        let at = if level == 0 { 0 } else { n - level };
        let offset = self.sections[..at].iter().sum();
        Some((offset, self.sections[at]))
    }

    pub fn to_value(&self, zctx: &TypeContext) -> IndexResult<Value> {
        let int32 = Type::primitive(PrimitiveId::Int32);
        let mut sections = Builder::new();
        for size in &self.sections {
            sections.append_primitive(Some(&encode_int(*size as i64)));
        }
        let mut keys = Builder::new();
        for key in &self.keys {
            keys.append_primitive(Some(key.to_string().as_bytes()));
        }
        let mut tree = RecordTree::new();
        tree.insert(&["magic"], Value::string(TRAILER_MAGIC), false)?;
        tree.insert(&["type"], Value::string(INDEX_TYPE), false)?;
        tree.insert(&["version"], Value::int(int32.clone(), INDEX_VERSION), false)?;
        tree.insert(
            &["sections"],
            Value::new(zctx.lookup_type_array(Type::int64()), Some(sections.finish()?)),
            false,
        )?;
        tree.insert(&["meta", "order"], Value::string(&self.order.to_string()), false)?;
        tree.insert(&["meta", "child_field"], Value::string(&self.child_field), false)?;
        tree.insert(
            &["meta", "frame_thresh"],
            Value::int(int32, self.frame_thresh as i64),
            false,
        )?;
        tree.insert(
            &["meta", "keys"],
            Value::new(zctx.lookup_type_array(Type::string()), Some(keys.finish()?)),
            false,
        )?;
        Ok(tree.build(zctx)?)
    }

    /// Parse and validate a trailer record.
    pub fn from_value(rec: &Value) -> IndexResult<Self> {
        let kind = string_field(rec, &["type"])?;
        if kind != INDEX_TYPE {
            return Err(IndexError::NotIndex(format!("trailer type is '{kind}'")));
        }
        let version = int_field(rec, &["version"])?;
        if version != INDEX_VERSION {
            return Err(IndexError::BadVersion {
                found: version,
                expected: INDEX_VERSION,
            });
        }
        let order = string_field(rec, &["meta", "order"])?
            .parse()
            .map_err(|_| missing("meta.order"))?;
        let child_field = string_field(rec, &["meta", "child_field"])?;
        let frame_thresh = int_field(rec, &["meta", "frame_thresh"])?;
        let frame_thresh = usize::try_from(frame_thresh)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| missing("meta.frame_thresh"))?;
        if frame_thresh > MAX_FRAME_THRESH {
            return Err(IndexError::FrameTooLarge {
                size: frame_thresh,
                max: MAX_FRAME_THRESH,
            });
        }
        let keys = rec
            .deref_path(&["meta", "keys"])
            .ok_or_else(|| missing("meta.keys"))?
            .elements()?
            .iter()
            .map(|k| k.as_str().parse::<Path>())
            .collect::<Result<Vec<_>, _>>()?;
        let sections = rec
            .deref_path(&["sections"])
            .ok_or_else(|| missing("sections"))?
            .elements()?
            .iter()
            .map(|s| u64::try_from(s.as_int()).map_err(|_| missing("sections")))
            .collect::<IndexResult<Vec<_>>>()?;
        Ok(Self {
            order,
            child_field,
            frame_thresh,
            keys,
            sections,
        })
    }

    /// The marker and trailer frame to append to an index file.
    pub fn encode(&self, zctx: &TypeContext) -> IndexResult<Vec<u8>> {
        let mut w = StreamWriter::new(MARKER.to_vec());
        w.write(&self.to_value(zctx)?)?;
        w.end_frame()?;
        let bytes = w.into_inner()?;
        if bytes.len() > TRAILER_MAX_SIZE {
            return Err(IndexError::FrameTooLarge {
                size: bytes.len(),
                max: TRAILER_MAX_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Locate the trailer in the last bytes of a file by scanning backwards
    /// for the marker.
    pub fn find(tail: &[u8], zctx: &Arc<TypeContext>) -> IndexResult<Self> {
        let candidates = tail
            .windows(MARKER.len())
            .enumerate()
            .rev()
            .filter(|(_, w)| *w == MARKER)
            .map(|(at, _)| at + MARKER.len());
        for start in candidates {
            let mut reader = StreamReader::new(&tail[start..], zctx.clone());
            let Ok(Some(rec)) = reader.read() else {
                continue;
            };
            if rec.deref("magic").is_some_and(|m| m.ty().is(PrimitiveId::String) && m.as_str() == TRAILER_MAGIC) {
                debug!("microindex trailer found {} bytes from the end", tail.len() - start);
                return Self::from_value(&rec);
            }
        }
        Err(IndexError::TrailerNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trailer(sections: Vec<u64>) -> Trailer {
        Trailer {
            order: Order::Desc,
            child_field: "_child".into(),
            frame_thresh: 1024,
            keys: vec!["ts".parse().unwrap(), "id.src".parse().unwrap()],
            sections,
        }
    }

    #[test]
    fn sections_are_root_first() {
        let t = trailer(vec![100, 5, 20, 40]);
        assert_eq!(t.levels(), 4);
        assert_eq!(t.section(0), Some((0, 100)));
        assert_eq!(t.section(3), Some((100, 5)));
        assert_eq!(t.section(2), Some((105, 20)));
        assert_eq!(t.section(1), Some((125, 40)));
        assert_eq!(t.section(4), None);
        assert!(trailer(vec![]).is_empty());
    }

    #[test]
    fn found_after_other_bytes() {
        let zctx = Arc::new(TypeContext::new());
        let t = trailer(vec![100, 7]);
        let mut file = b"some section bytes \x00ZEDTRLR but not a trailer".to_vec();
        file.extend(t.encode(&zctx).unwrap());
        assert_eq!(Trailer::find(&file, &zctx).unwrap(), t);

        let err = Trailer::find(b"no trailer here", &zctx).unwrap_err();
        assert!(err.is_trailer_not_found());
    }

    #[test]
    fn validates_version_and_type() {
        let zctx = TypeContext::new();
        let good = trailer(vec![1]).to_value(&zctx).unwrap();
        assert!(Trailer::from_value(&good).is_ok());

        let text = zedcore::zson::format_value(&good);
        let old = zedcore::zson::parse_value(&zctx, &text.replace("version:4", "version:3")).unwrap();
        assert!(Trailer::from_value(&old).unwrap_err().is_bad_version());
        let other = zedcore::zson::parse_value(&zctx, &text.replace("\"index\"", "\"other\"")).unwrap();
        assert!(Trailer::from_value(&other).unwrap_err().is_not_index());
    }
}
