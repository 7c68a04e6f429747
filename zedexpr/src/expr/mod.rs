//! Expression evaluators
//!
//! A compiled expression is a tree of [`Expr`] nodes. Evaluating a node
//! against a *this* value always yields a [`Value`]; failures are reported as
//! error values (see [`zedcore::value`]) and flow through enclosing nodes
//! like any other data.
//!
//! Nodes that build records or shape values keep a per-input-type cache of
//! their output plan behind a lock, so a tree can be evaluated through a
//! shared reference.
use strum::{Display, EnumDiscriminants, EnumIs};
use zedcore::{field, value::Value};

pub mod arith;
pub mod call;
pub mod context;
pub mod logic;
pub mod path;
pub mod search;
pub mod values;

pub use arith::ArithOp;
pub use call::Call;
pub use context::{EvalContext, Udf};
pub use logic::CompareOp;
pub use search::Search;
pub use values::{ArrayExpr, Entry, MapExpr, RecordElem, RecordExpr, VectorElem};

use crate::{
    cast::Cast,
    function::flatten::{DottedNester, Flattener, Unflattener},
    record_ops::{Cutter, Dropper, Putter, Renamer},
    shaper::Shaper,
};

/// Node of a compiled expression tree.
#[derive(Debug, EnumIs, EnumDiscriminants)]
#[strum_discriminants(name(ExprKind), derive(Display))]
pub enum Expr {
    /// The value being evaluated.
    This,
    /// Parameter `n` of the innermost user-defined function frame.
    Var(usize),
    Literal(Value),
    /// Field of a record, or of the record type described by a type value.
    Dot(Box<Expr>, String),
    /// `container[index]` over arrays, sets, records and maps.
    Index(Box<Expr>, Box<Expr>),
    /// `container[from:to]` over strings, bytes and arrays.
    Slice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    UnaryMinus(Box<Expr>),
    /// `elem in container`.
    In(Box<Expr>, Box<Expr>),
    RegexpMatch(regex::Regex, Box<Expr>),
    Search(Search),
    /// `predicate ? then : else`.
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Call),
    /// Call of the user-defined function in the given context slot.
    UdfCall(usize, Vec<Expr>),
    Record(RecordExpr),
    Array(ArrayExpr),
    Set(ArrayExpr),
    Map(MapExpr),
    /// Evaluate the second expression with each element of the first as
    /// *this*.
    Apply(Box<Expr>, Box<Expr>),
    Shaper(Shaper),
    Cast(Cast),
    Cut(Cutter),
    Drop(Dropper),
    Rename(Renamer),
    Put(Putter),
    Flatten(Box<Expr>, Flattener),
    Unflatten(Box<Expr>, Unflattener),
    NestDotted(Box<Expr>, DottedNester),
}

impl Expr {
    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        match self {
            Expr::This => this.clone(),
            Expr::Var(slot) => match ectx.vars().get(*slot) {
                Some(v) => v.clone(),
                None => ectx.zctx().missing(),
            },
            Expr::Literal(v) => v.clone(),
            Expr::Dot(container, name) => {
                let container = container.eval(ectx, this);
                path::eval_dot(ectx, &container, name)
            }
            Expr::Index(container, index) => path::eval_index(ectx, this, container, index),
            Expr::Slice(container, from, to) => {
                path::eval_slice(ectx, this, container, from.as_deref(), to.as_deref())
            }
            Expr::Not(e) => logic::eval_not(ectx, this, e),
            Expr::And(lhs, rhs) => logic::eval_and(ectx, this, lhs, rhs),
            Expr::Or(lhs, rhs) => logic::eval_or(ectx, this, lhs, rhs),
            Expr::Compare(op, lhs, rhs) => logic::eval_compare(ectx, this, *op, lhs, rhs),
            Expr::Arith(op, lhs, rhs) => arith::eval_arith(ectx, this, *op, lhs, rhs),
            Expr::UnaryMinus(e) => {
                let v = e.eval(ectx, this);
                arith::negate(ectx, &v)
            }
            Expr::In(elem, container) => logic::eval_in(ectx, this, elem, container),
            Expr::RegexpMatch(re, e) => {
                let v = e.eval(ectx, this).under();
                Value::bool(v.ty().is(zedcore::types::PrimitiveId::String) && re.is_match(v.as_str()))
            }
            Expr::Search(search) => search.eval(ectx, this),
            Expr::Conditional(pred, then, otherwise) => {
                logic::eval_conditional(ectx, this, pred, then, otherwise)
            }
            Expr::Call(call) => call.eval(ectx, this),
            Expr::UdfCall(slot, args) => call::eval_udf(ectx, this, *slot, args),
            Expr::Record(r) => r.eval(ectx, this),
            Expr::Array(a) => a.eval(ectx, this, false),
            Expr::Set(a) => a.eval(ectx, this, true),
            Expr::Map(m) => m.eval(ectx, this),
            Expr::Apply(container, inner) => values::eval_apply(ectx, this, container, inner),
            Expr::Shaper(s) => s.eval(ectx, this),
            Expr::Cast(c) => c.eval(ectx, this),
            Expr::Cut(c) => c.eval(ectx, this),
            Expr::Drop(d) => d.eval(ectx, this),
            Expr::Rename(r) => r.eval(ectx, this),
            Expr::Put(p) => p.eval(ectx, this),
            Expr::Flatten(e, f) => {
                let v = e.eval(ectx, this);
                f.apply(ectx, &v)
            }
            Expr::Unflatten(e, u) => {
                let v = e.eval(ectx, this);
                u.apply(ectx, &v)
            }
            Expr::NestDotted(e, n) => {
                let v = e.eval(ectx, this);
                n.apply(ectx, &v)
            }
        }
    }

    /// Reference to `path` within *this*.
    pub fn path(path: &field::Path) -> Expr {
        path.names()
            .iter()
            .fold(Expr::This, |e, name| Expr::Dot(Box::new(e), name.clone()))
    }

    pub fn literal(v: Value) -> Expr {
        Expr::Literal(v)
    }

    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }
}

/// Evaluate `e` expecting a bool. Errors pass through; other values become
/// an error wrapping them.
pub(crate) fn eval_bool(ectx: &mut EvalContext, this: &Value, e: &Expr) -> Result<bool, Value> {
    let v = e.eval(ectx, this).under();
    if v.ty().is(zedcore::types::PrimitiveId::Bool) && !v.is_null() {
        return Ok(v.as_bool());
    }
    if v.is_error() {
        return Err(v);
    }
    Err(ectx.zctx().wrap_error("not type bool", &v))
}
