//! # zedindex
//!
//! Microindexes: single-file, multi-level indexes over a stream of ZED
//! records sorted by one or more key fields.
//!
//! A file holds the base section (the records themselves, in frames), then
//! one section per index level from the root down, then a trailer describing
//! the layout. [`Writer`] builds a file from sorted records; [`Finder`]
//! answers exact and nearest-key lookups by descending from the root.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use zedcore::{types::TypeContext, zson};
//! use zedindex::{Finder, Writer, WriterOptions};
//!
//! let zctx = Arc::new(TypeContext::new());
//! let mut w = Writer::new("keys.zed", zctx.clone(), WriterOptions::default()).unwrap();
//! for i in 1..=3 {
//!     let rec = zson::parse_value(&zctx, &format!(r#"{{key:"key{i}",value:{i}}}"#)).unwrap();
//!     w.write(&rec).unwrap();
//! }
//! w.close().unwrap();
//!
//! let finder = Finder::open("keys.zed", zctx).unwrap();
//! let target = finder.parse_keys(&[r#""key2""#]).unwrap();
//! assert!(finder.lookup(&target).unwrap().is_some());
//! ```
pub mod cancel;
pub mod error;
pub mod finder;
pub mod reader;
pub mod stream;
pub mod trailer;
pub mod writer;

pub use cancel::CancelToken;
pub use error::{IndexError, IndexResult};
pub use finder::Finder;
pub use reader::Reader;
pub use trailer::Trailer;
pub use writer::{Writer, WriterOptions};
