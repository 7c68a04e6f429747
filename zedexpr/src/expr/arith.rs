use strum::{Display, EnumString};
use zedcore::{
    coerce::coerce_pair,
    error::ZedError,
    types::{PrimitiveId, Type, TypeDef},
    value::Value,
};

use crate::expr::{EvalContext, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum ArithOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
}

/// Inclusive range of a signed integer type.
pub(crate) fn signed_bounds(id: PrimitiveId) -> (i64, i64) {
    match id {
        PrimitiveId::Int8 => (i8::MIN as i64, i8::MAX as i64),
        PrimitiveId::Int16 => (i16::MIN as i64, i16::MAX as i64),
        PrimitiveId::Int32 => (i32::MIN as i64, i32::MAX as i64),
        _ => (i64::MIN, i64::MAX),
    }
}

pub(crate) fn unsigned_max(id: PrimitiveId) -> u64 {
    match id {
        PrimitiveId::Uint8 => u8::MAX as u64,
        PrimitiveId::Uint16 => u16::MAX as u64,
        PrimitiveId::Uint32 => u32::MAX as u64,
        _ => u64::MAX,
    }
}

/// Truncate to the width of `id`, the way fixed-width machine arithmetic
/// wraps.
fn wrap_signed(id: PrimitiveId, v: i64) -> i64 {
    match id {
        PrimitiveId::Int8 => v as i8 as i64,
        PrimitiveId::Int16 => v as i16 as i64,
        PrimitiveId::Int32 => v as i32 as i64,
        _ => v,
    }
}

fn wrap_unsigned(id: PrimitiveId, v: u64) -> u64 {
    v & unsigned_max(id)
}

fn enum_to_index(v: Value) -> Value {
    match v.ty().def() {
        TypeDef::Enum(_) => {
            let (_, bytes) = v.into_parts();
            Value::shared(Type::uint64(), bytes)
        }
        _ => v,
    }
}

/// An untyped integer literal takes the integer type of the other operand
/// when its value fits, so `x + 5` keeps the width of `x`.
fn adopt_literal(lit: &Value, other: &Value) -> Option<Value> {
    if !lit.ty().is(PrimitiveId::Int64) || lit.is_null() {
        return None;
    }
    let id = other.ty().primitive_id()?;
    if !id.is_integer() || matches!(id, PrimitiveId::Int64 | PrimitiveId::Duration | PrimitiveId::Time) {
        return None;
    }
    let n = lit.as_int();
    let fits = if id.is_signed() {
        let (lo, hi) = signed_bounds(id);
        (lo..=hi).contains(&n)
    } else {
        n >= 0 && (n as u64) <= unsigned_max(id)
    };
    fits.then(|| {
        if id.is_signed() {
            Value::int(other.ty().clone(), n)
        } else {
            Value::uint(other.ty().clone(), n as u64)
        }
    })
}

fn incompatible(ectx: &EvalContext, ty: &Type, op: ArithOp) -> Value {
    ectx.zctx()
        .new_error(format!("type {ty} incompatible with '{op}' operator"))
}

pub(crate) fn eval_arith(
    ectx: &mut EvalContext,
    this: &Value,
    op: ArithOp,
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
    let mut a = enum_to_index(a.under());
    let mut b = enum_to_index(b.under());
    if lhs.is_literal()
        && let Some(v) = adopt_literal(&a, &b)
    {
        a = v;
    } else if rhs.is_literal()
        && let Some(v) = adopt_literal(&b, &a)
    {
        b = v;
    }
    arith(ectx, op, &a, &b)
}

/// Apply `op` to two operands that are neither named nor unions.
pub fn arith(ectx: &EvalContext, op: ArithOp, a: &Value, b: &Value) -> Value {
    if let Some(v) = time_arith(op, a, b) {
        return v;
    }
    let pair = match coerce_pair(a, b) {
        Ok(pair) => pair,
        Err(ZedError::Overflow) => {
            return ectx.zctx().new_error(format!("'{op}': {}", ZedError::Overflow));
        }
        Err(_) => return incompatible(ectx, a.ty(), op),
    };
    let ty = pair.ty.clone();
    let Some(id) = ty.primitive_id() else {
        return incompatible(ectx, &ty, op);
    };
    if pair.a.is_null() || pair.b.is_null() {
        return if id.is_number() || matches!(id, PrimitiveId::String | PrimitiveId::Bytes) {
            Value::null_of(ty)
        } else {
            incompatible(ectx, &ty, op)
        };
    }
    let divide_by_zero = || ectx.zctx().new_error("divide by zero");
    if id.is_float() {
        let (x, y) = (pair.a.as_float(), pair.b.as_float());
        let r = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div if y == 0.0 => return divide_by_zero(),
            ArithOp::Div => x / y,
            ArithOp::Mod => return incompatible(ectx, &ty, op),
        };
        return Value::float(ty, r);
    }
    if id.is_signed() {
        let (x, y) = (pair.a.as_int(), pair.b.as_int());
        let r = match op {
            ArithOp::Add => x.wrapping_add(y),
            ArithOp::Sub => x.wrapping_sub(y),
            ArithOp::Mul => x.wrapping_mul(y),
            ArithOp::Div | ArithOp::Mod if y == 0 => return divide_by_zero(),
            ArithOp::Div => x.wrapping_div(y),
            ArithOp::Mod => x.wrapping_rem(y),
        };
        return Value::int(ty, wrap_signed(id, r));
    }
    if id.is_unsigned() {
        let (x, y) = (pair.a.as_uint(), pair.b.as_uint());
        let r = match op {
            ArithOp::Add => x.wrapping_add(y),
            ArithOp::Sub => x.wrapping_sub(y),
            ArithOp::Mul => x.wrapping_mul(y),
            ArithOp::Div | ArithOp::Mod if y == 0 => return divide_by_zero(),
            ArithOp::Div => x / y,
            ArithOp::Mod => x % y,
        };
        return Value::uint(ty, wrap_unsigned(id, r));
    }
    match (id, op) {
        (PrimitiveId::String, ArithOp::Add) => {
            let s = [pair.a.as_str(), pair.b.as_str()].concat();
            Value::string(&s)
        }
        (PrimitiveId::Bytes, ArithOp::Add) => {
            let b = [pair.a.as_bytes(), pair.b.as_bytes()].concat();
            Value::bytes_value(&b)
        }
        _ => incompatible(ectx, &ty, op),
    }
}

/// `time - time = duration`; `time ± duration = time`;
/// `duration + time = time`.
fn time_arith(op: ArithOp, a: &Value, b: &Value) -> Option<Value> {
    use PrimitiveId::{Duration, Time};
    let (x, y) = (a.ty().primitive_id()?, b.ty().primitive_id()?);
    if a.is_null() || b.is_null() {
        return match (x, y, op) {
            (Time, Time, ArithOp::Sub) => Some(Value::null_of(Type::duration())),
            (Time, Duration, ArithOp::Add | ArithOp::Sub) | (Duration, Time, ArithOp::Add) => {
                Some(Value::null_of(Type::time()))
            }
            _ => None,
        };
    }
    match (x, y, op) {
        (Time, Time, ArithOp::Sub) => Some(Value::duration(a.as_time().wrapping_sub(b.as_time()))),
        (Time, Duration, ArithOp::Add) => Some(Value::time(a.as_time().wrapping_add(b.as_duration()))),
        (Time, Duration, ArithOp::Sub) => Some(Value::time(a.as_time().wrapping_sub(b.as_duration()))),
        (Duration, Time, ArithOp::Add) => Some(Value::time(b.as_time().wrapping_add(a.as_duration()))),
        _ => None,
    }
}

/// Unary minus.
pub fn negate(ectx: &EvalContext, v: &Value) -> Value {
    if v.is_error() {
        return v.clone();
    }
    let u = v.under();
    let incompatible = || ectx.zctx().wrap_error("type incompatible with unary '-' operator", v);
    let Some(id) = u.ty().primitive_id().filter(|p| p.is_number()) else {
        return incompatible();
    };
    if id.is_float() {
        if u.is_null() {
            return u;
        }
        return Value::float(u.ty().clone(), -u.as_float());
    }
    if id.is_signed() {
        if u.is_null() {
            return u;
        }
        let (min, _) = signed_bounds(id);
        let x = u.as_int();
        if x == min {
            return ectx.zctx().wrap_error("unary '-' underflow", v);
        }
        return Value::int(u.ty().clone(), -x);
    }
    let signed = match id {
        PrimitiveId::Uint8 => PrimitiveId::Int8,
        PrimitiveId::Uint16 => PrimitiveId::Int16,
        PrimitiveId::Uint32 => PrimitiveId::Int32,
        _ => PrimitiveId::Int64,
    };
    let ty = Type::primitive(signed);
    if u.is_null() {
        return Value::null_of(ty);
    }
    let (_, max) = signed_bounds(signed);
    match i64::try_from(u.as_uint()) {
        Ok(x) if x <= max => Value::int(ty, -x),
        _ => ectx.zctx().wrap_error("unary '-' overflow", v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::*;

    fn arith_on(op: ArithOp, lhs: Box<Expr>, rhs: Box<Expr>, this: &str) -> String {
        let mut ectx = ectx();
        run(&mut ectx, &Expr::Arith(op, lhs, rhs), this)
    }

    #[test]
    fn typed_fields_with_literals() {
        let this = r#"{x:10(int32),f:2.5,s:"hello"}"#;
        let l = |src: &str| Box::new(lit(&ectx(), src));
        assert_eq!(arith_on(ArithOp::Add, field("x"), l("5"), this), "15(int32)");
        assert_eq!(arith_on(ArithOp::Add, field("f"), l("1.0"), this), "3.5");
        assert_eq!(
            arith_on(ArithOp::Add, field("s"), l("\" world\""), this),
            "\"hello world\""
        );
        // A literal that does not fit widens instead.
        assert_eq!(arith_on(ArithOp::Add, field("x"), l("5000000000"), this), "5000000010");
    }

    #[test]
    fn division() {
        let this = "{a:7,b:2,z:0,u:7(uint8)}";
        assert_eq!(arith_on(ArithOp::Div, field("a"), field("b"), this), "3");
        assert_eq!(arith_on(ArithOp::Mod, field("a"), field("b"), this), "1");
        assert_eq!(
            arith_on(ArithOp::Div, field("a"), field("z"), this),
            r#"error("divide by zero")"#
        );
        assert_eq!(arith_on(ArithOp::Mod, field("u"), field("b"), this), "1");
    }

    #[test]
    fn time_and_duration() {
        let this = "{t1:2020-01-01T00:00:10Z,t0:2020-01-01T00:00:00Z,d:5s}";
        assert_eq!(arith_on(ArithOp::Sub, field("t1"), field("t0"), this), "10s");
        assert_eq!(
            arith_on(ArithOp::Add, field("t0"), field("d"), this),
            "2020-01-01T00:00:05Z"
        );
        assert_eq!(arith_on(ArithOp::Add, field("d"), field("d"), this), "10s");
    }

    #[test]
    fn incompatible_operands() {
        let out = arith_on(ArithOp::Mul, field("s"), field("n"), r#"{s:"a",n:1}"#);
        assert!(out.starts_with("error("), "{out}");
        let out = arith_on(ArithOp::Mod, field("f"), field("f"), "{f:1.5}");
        assert!(out.starts_with("error("), "{out}");
    }

    #[test]
    fn unary_minus() {
        let ectx = ectx();
        let neg = |src: &str| zedcore::zson::format_value(&negate(&ectx, &val(&ectx, src)));
        assert_eq!(neg("5"), "-5");
        assert_eq!(neg("1.5"), "-1.5");
        assert!(neg("200(uint8)").contains("overflow"));
        assert_eq!(neg("5(uint8)"), "-5(int8)");
        assert!(neg("-128(int8)").contains("underflow"));
        assert!(neg("18446744073709551615(uint64)").contains("overflow"));
        assert!(neg("\"a\"").contains("incompatible"));
    }
}
