//! Zedexpr: expression evaluation over ZED values.
//!
//! A compiled expression is a tree of [`Expr`] nodes. Evaluating one against
//! a value (*this*) always yields a value: failures are error values, and
//! quiet values mark results an operator should skip. Assembling the tree is
//! the only step that can fail ([`ExprError`]), e.g. for an unknown function
//! or a bad field list.
//!
//! ```
//! use std::sync::Arc;
//!
//! use zedcore::{types::TypeContext, zson};
//! use zedexpr::{EvalContext, Expr, function};
//!
//! let zctx = Arc::new(TypeContext::new());
//! let mut ectx = EvalContext::new(zctx.clone());
//! let e = function::compile("upper", vec![Expr::Dot(Expr::This.boxed(), "s".into())]).unwrap();
//! let this = zson::parse_value(&zctx, r#"{s:"hi"}"#).unwrap();
//! assert_eq!(zson::format_value(&e.eval(&mut ectx, &this)), r#""HI""#);
//! ```

pub mod cast;
pub mod error;
pub mod expr;
pub mod function;
pub mod record_ops;
pub mod shaper;

pub use cast::Cast;
pub use error::{ExprError, ExprResult};
pub use expr::{EvalContext, Expr, Udf};
pub use record_ops::{Assignment, Cutter, Dropper, Putter, Renamer};
pub use shaper::{Shaper, ShaperFlags};
