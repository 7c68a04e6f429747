use std::{cmp::Ordering, net::IpAddr};

use strum::{Display, EnumString};
use zedcore::{
    coerce::{coerce_pair, compare_numbers},
    error::ZedError,
    types::{PrimitiveId, Type, TypeDef},
    value::{Value, WalkSignal, compare_values},
};

use crate::expr::{EvalContext, Expr, eval_bool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum CompareOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord.is_eq(),
            CompareOp::Ne => ord.is_ne(),
            CompareOp::Lt => ord.is_lt(),
            CompareOp::Le => ord.is_le(),
            CompareOp::Gt => ord.is_gt(),
            CompareOp::Ge => ord.is_ge(),
        }
    }
}

/// Enums compare by symbol index.
fn enum_to_index(v: Value) -> Value {
    match v.ty().def() {
        TypeDef::Enum(_) => {
            let (_, bytes) = v.into_parts();
            Value::shared(Type::uint64(), bytes)
        }
        _ => v,
    }
}

/// Equality under coercion. Values whose types cannot be brought together
/// are unequal, as are a negative signed and an unsigned above `i64::MAX`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    let a = enum_to_index(a.under());
    let b = enum_to_index(b.under());
    match coerce_pair(&a, &b) {
        Ok(pair) => pair.equal(),
        Err(_) => false,
    }
}

pub(crate) fn eval_compare(
    ectx: &mut EvalContext,
    this: &Value,
    op: CompareOp,
    lhs: &Expr,
    rhs: &Expr,
) -> Value {
    let a = lhs.eval(ectx, this);
    if a.is_error() {
        return a;
    }
    let b = rhs.eval(ectx, this);
    if b.is_error() {
        return b;
    }
    match op {
        CompareOp::Eq => Value::bool(values_equal(&a, &b)),
        CompareOp::Ne => Value::bool(!values_equal(&a, &b)),
        _ => match relative(&a, &b) {
            Ok(Some(ord)) => Value::bool(op.holds(ord)),
            Ok(None) => Value::bool(false),
            Err(e) => ectx.zctx().new_error(format!("'{op}': {e}")),
        },
    }
}

/// Order of two values for the relational operators; `None` when the
/// comparison is false regardless of the operator (a null on one side, or
/// NaN).
fn relative(a: &Value, b: &Value) -> Result<Option<Ordering>, ZedError> {
    let a = enum_to_index(a.under());
    let b = enum_to_index(b.under());
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ok(Some(Ordering::Equal)),
        (true, false) | (false, true) => return Ok(None),
        (false, false) => {}
    }
    if a.ty().is_number() && b.ty().is_number() {
        return Ok(compare_numbers(&a, &b));
    }
    if a.ty() != b.ty() {
        return Err(ZedError::IncompatibleTypes {
            lhs: a.ty().to_string(),
            rhs: b.ty().to_string(),
        });
    }
    Ok(Some(match a.ty().primitive_id() {
        Some(PrimitiveId::Bool) => a.as_bool().cmp(&b.as_bool()),
        Some(PrimitiveId::String | PrimitiveId::Bytes) => a.as_bytes().cmp(b.as_bytes()),
        Some(PrimitiveId::Ip) => {
            let ip = |v: &Value| v.as_ip().unwrap_or(IpAddr::from([0, 0, 0, 0]));
            ip(&a).cmp(&ip(&b))
        }
        _ => compare_values(&a, &b, true),
    }))
}

pub(crate) fn eval_not(ectx: &mut EvalContext, this: &Value, e: &Expr) -> Value {
    match eval_bool(ectx, this, e) {
        Ok(b) => Value::bool(!b),
        Err(v) => v,
    }
}

pub(crate) fn eval_and(ectx: &mut EvalContext, this: &Value, lhs: &Expr, rhs: &Expr) -> Value {
    match eval_bool(ectx, this, lhs) {
        Ok(false) => Value::bool(false),
        Ok(true) => match eval_bool(ectx, this, rhs) {
            Ok(b) => Value::bool(b),
            Err(v) => v,
        },
        Err(v) => v,
    }
}

pub(crate) fn eval_or(ectx: &mut EvalContext, this: &Value, lhs: &Expr, rhs: &Expr) -> Value {
    match eval_bool(ectx, this, lhs) {
        Ok(true) => return Value::bool(true),
        Err(v) if !v.is_missing() => return v,
        _ => {}
    }
    match eval_bool(ectx, this, rhs) {
        Ok(b) => Value::bool(b),
        Err(v) => v,
    }
}

pub(crate) fn eval_conditional(
    ectx: &mut EvalContext,
    this: &Value,
    pred: &Expr,
    then: &Expr,
    otherwise: &Expr,
) -> Value {
    let p = pred.eval(ectx, this).under();
    if p.is_error() {
        return p;
    }
    if !p.ty().is(PrimitiveId::Bool) || p.is_null() {
        return ectx.zctx().wrap_error("?-operator: bool predicate required", &p);
    }
    if p.as_bool() {
        then.eval(ectx, this)
    } else {
        otherwise.eval(ectx, this)
    }
}

/// True if any value reachable inside `container` equals `elem`.
pub fn contains(container: &Value, elem: &Value) -> Result<bool, ZedError> {
    let elem = elem.under();
    let mut found = false;
    container.walk(&mut |ty, body| {
        if values_equal(&Value::from_slice(ty.clone(), body), &elem) {
            found = true;
            return Ok(WalkSignal::Stop);
        }
        Ok(WalkSignal::Continue)
    })?;
    Ok(found)
}

pub(crate) fn eval_in(ectx: &mut EvalContext, this: &Value, elem: &Expr, container: &Expr) -> Value {
    let elem = elem.eval(ectx, this);
    if elem.is_error() {
        return elem;
    }
    let container = container.eval(ectx, this);
    if container.is_error() {
        return container;
    }
    match contains(&container, &elem) {
        Ok(found) => Value::bool(found),
        Err(e) => ectx.zctx().new_error(e),
    }
}
