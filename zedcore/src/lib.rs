//! Zedcore: the ZED data model.
//!
//! ZED values are self-describing: every value carries a [`types::Type`]
//! interned in a [`types::TypeContext`], and its body is a compact binary
//! encoding (see [`encoding`]). This crate provides
//! - the type system ([`types`]) and its binary type-value form ([`types::tv`]);
//! - owned values with accessors, comparison and walking ([`value`]);
//! - numeric coercion shared by expression operators ([`coerce`]);
//! - the ZSON text form, formatting always and parsing behind the default
//!   `chumsky` feature ([`zson`]);
//! - helpers used by the evaluator and the microindex: field paths
//!   ([`field`]), sort layouts ([`order`]), nested record construction
//!   ([`record`]), time units ([`nano`]) and process configuration
//!   ([`config`]).
//!
//! ```
//! use zedcore::{types::TypeContext, zson};
//!
//! let ctx = TypeContext::new();
//! let v = zson::parse_value(&ctx, "{a:1,b:[10.0.0.1]}").unwrap();
//! assert_eq!(v.ty().to_string(), "{a:int64,b:[ip]}");
//! assert_eq!(v.deref("a").unwrap().as_int(), 1);
//! assert_eq!(zson::format_value(&v), "{a:1,b:[10.0.0.1]}");
//! ```

pub mod coerce;
pub mod config;
pub mod encoding;
pub mod error;
pub mod field;
pub mod magic;
pub mod nano;
pub mod order;
pub mod record;
pub mod types;
pub mod value;
pub mod zson;

pub extern crate chrono;
pub extern crate ipnetwork;

pub mod prelude {
    pub use crate::{
        error::{ZedError, ZedResult},
        field::Path,
        order::{Layout, Order},
        types::{Field, Kind, PrimitiveId, Type, TypeContext, TypeDef},
        value::Value,
    };
}
