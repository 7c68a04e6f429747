//! Numeric coercion
//!
//! [`coerce_pair`] brings two operands to a common type before a binary
//! operation:
//!
//! 1. Operands of the same type ID are returned as-is.
//! 2. `null` paired with `T` takes `T`.
//! 3. Non-numeric operands must both be strings or both be bytes.
//! 4. Numbers: a float on either side widens both to `float64`; equal
//!    signedness widens to the wider integer; mixed signedness promotes the
//!    unsigned side to signed, or, when it does not fit in `int64`, the signed
//!    side to `uint64`. A negative signed value paired with an unsigned value
//!    above `i64::MAX` is an [`ZedError::Overflow`].
//!
//! The single-value conversions (`to_*`) return `None` when the conversion is
//! not defined. Integers convert to durations as seconds; times and integers
//! convert as nanoseconds.
use std::cmp::Ordering;

use crate::{
    error::{ZedError, ZedResult},
    nano,
    types::{PrimitiveId, Type},
    value::Value,
};

/// Two operands converted to a common type.
#[derive(Debug, Clone)]
pub struct Pair {
    pub ty: Type,
    pub a: Value,
    pub b: Value,
}

impl Pair {
    fn same(ty: Type, a: &Value, b: &Value) -> Self {
        Pair {
            ty,
            a: a.clone(),
            b: b.clone(),
        }
    }

    /// Equality of the coerced operands; null equals only null. Floats
    /// compare numerically, so NaN equals nothing and `0.0 == -0.0`.
    pub fn equal(&self) -> bool {
        match (self.a.is_null(), self.b.is_null()) {
            (false, false) if self.ty.primitive_id().is_some_and(PrimitiveId::is_float) => {
                self.a.as_float() == self.b.as_float()
            }
            _ => self.a.bytes() == self.b.bytes(),
        }
    }
}

fn signed_of_rank(rank: u8) -> PrimitiveId {
    match rank {
        0 => PrimitiveId::Int8,
        1 => PrimitiveId::Int16,
        2 => PrimitiveId::Int32,
        _ => PrimitiveId::Int64,
    }
}

/// Common type of a signed and an unsigned integer whose unsigned value fits
/// in `int64`.
pub fn promote_int(signed: PrimitiveId, unsigned: PrimitiveId) -> PrimitiveId {
    if matches!(signed, PrimitiveId::Duration | PrimitiveId::Time) {
        return signed;
    }
    let rank = signed.int_rank().max((unsigned.int_rank() + 1).min(3));
    signed_of_rank(rank)
}

/// Wider of two integers with the same signedness. `time` outranks
/// `duration`, which outranks the plain 64-bit integer.
fn wider(a: PrimitiveId, b: PrimitiveId) -> PrimitiveId {
    let key = |p: PrimitiveId| {
        let special = match p {
            PrimitiveId::Time => 2,
            PrimitiveId::Duration => 1,
            _ => 0,
        };
        (p.int_rank(), special)
    };
    if key(b) > key(a) { b } else { a }
}

fn incompatible(a: &Value, b: &Value) -> ZedError {
    ZedError::IncompatibleTypes {
        lhs: a.ty().to_string(),
        rhs: b.ty().to_string(),
    }
}

pub fn coerce_pair(a: &Value, b: &Value) -> ZedResult<Pair> {
    if a.ty().id() == b.ty().id() {
        return Ok(Pair::same(a.ty().clone(), a, b));
    }
    if a.ty().is_null() {
        return Ok(Pair {
            ty: b.ty().clone(),
            a: Value::null_of(b.ty().clone()),
            b: b.clone(),
        });
    }
    if b.ty().is_null() {
        return Ok(Pair {
            ty: a.ty().clone(),
            a: a.clone(),
            b: Value::null_of(a.ty().clone()),
        });
    }
    let (Some(aid), Some(bid)) = (a.ty().primitive_id(), b.ty().primitive_id()) else {
        return Err(incompatible(a, b));
    };
    if !aid.is_number() || !bid.is_number() {
        return match (aid, bid) {
            (PrimitiveId::String, PrimitiveId::String) | (PrimitiveId::Bytes, PrimitiveId::Bytes) => {
                Ok(Pair::same(Type::primitive(aid), a, b))
            }
            _ => Err(incompatible(a, b)),
        };
    }
    coerce_numbers(a, aid, b, bid)
}

fn convert(v: &Value, id: PrimitiveId) -> Value {
    let ty = Type::primitive(id);
    if v.is_null() {
        return Value::null_of(ty);
    }
    if id.is_float() {
        Value::float(ty, v.as_float())
    } else if id.is_signed() {
        Value::int(ty, v.as_int())
    } else {
        Value::uint(ty, v.as_uint())
    }
}

fn coerce_numbers(a: &Value, aid: PrimitiveId, b: &Value, bid: PrimitiveId) -> ZedResult<Pair> {
    let to = |id: PrimitiveId| Pair {
        ty: Type::primitive(id),
        a: convert(a, id),
        b: convert(b, id),
    };
    if aid.is_float() || bid.is_float() {
        return Ok(to(PrimitiveId::Float64));
    }
    if aid.is_signed() == bid.is_signed() {
        return Ok(to(wider(aid, bid)));
    }
    let (signed, sid, unsigned, uid) = if aid.is_signed() {
        (a, aid, b, bid)
    } else {
        (b, bid, a, aid)
    };
    if unsigned.is_null() || unsigned.as_uint() <= i64::MAX as u64 {
        return Ok(to(promote_int(sid, uid)));
    }
    if signed.is_null() || signed.as_int() >= 0 {
        return Ok(to(PrimitiveId::Uint64));
    }
    Err(ZedError::Overflow)
}

/// Order two numeric values without loss. A negative signed value is less
/// than any unsigned value. Returns `None` for non-numbers, nulls and NaN.
pub fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    let aid = a.ty().primitive_id().filter(|p| p.is_number())?;
    let bid = b.ty().primitive_id().filter(|p| p.is_number())?;
    if a.is_null() || b.is_null() {
        return None;
    }
    if aid.is_float() || bid.is_float() {
        return a.as_float().partial_cmp(&b.as_float());
    }
    match (aid.is_signed(), bid.is_signed()) {
        (true, true) => Some(a.as_int().cmp(&b.as_int())),
        (false, false) => Some(a.as_uint().cmp(&b.as_uint())),
        (true, false) => {
            let s = a.as_int();
            Some(if s < 0 {
                Ordering::Less
            } else {
                (s as u64).cmp(&b.as_uint())
            })
        }
        (false, true) => compare_numbers(b, a).map(Ordering::reverse),
    }
}

fn is_stringy(v: &Value) -> bool {
    matches!(
        v.ty().primitive_id(),
        Some(PrimitiveId::String | PrimitiveId::Bytes)
    )
}

pub fn to_float(v: &Value) -> Option<f64> {
    let id = v.ty().primitive_id()?;
    match id {
        PrimitiveId::Duration => Some(v.as_duration() as f64 / nano::SECOND as f64),
        _ if id.is_number() => Some(v.as_float()),
        _ if is_stringy(v) => v.as_str().trim().parse().ok(),
        _ => None,
    }
}

pub fn to_int(v: &Value) -> Option<i64> {
    let id = v.ty().primitive_id()?;
    match id {
        PrimitiveId::Duration => Some(v.as_duration() / nano::SECOND),
        _ if id.is_float() => {
            let f = v.as_float();
            (f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
        }
        _ if id.is_unsigned() => i64::try_from(v.as_uint()).ok(),
        _ if id.is_signed() => Some(v.as_int()),
        _ if is_stringy(v) => v.as_str().trim().parse().ok(),
        _ => None,
    }
}

pub fn to_uint(v: &Value) -> Option<u64> {
    let id = v.ty().primitive_id()?;
    match id {
        PrimitiveId::Duration => u64::try_from(v.as_duration() / nano::SECOND).ok(),
        _ if id.is_float() => {
            let f = v.as_float();
            (f.is_finite() && f >= 0.0 && f <= u64::MAX as f64).then_some(f as u64)
        }
        _ if id.is_unsigned() => Some(v.as_uint()),
        _ if id.is_signed() => u64::try_from(v.as_int()).ok(),
        _ if is_stringy(v) => v.as_str().trim().parse().ok(),
        _ => None,
    }
}

pub fn to_bool(v: &Value) -> Option<bool> {
    match v.ty().primitive_id()? {
        PrimitiveId::Bool => Some(v.as_bool()),
        _ if is_stringy(v) => match v.as_str().trim() {
            "true" | "t" | "T" | "TRUE" | "True" | "1" => Some(true),
            "false" | "f" | "F" | "FALSE" | "False" | "0" => Some(false),
            _ => None,
        },
        _ => to_int(v).map(|i| i != 0),
    }
}

/// Nanoseconds since the epoch. Floats are taken as seconds.
pub fn to_time(v: &Value) -> Option<i64> {
    let id = v.ty().primitive_id()?;
    match id {
        PrimitiveId::Time => Some(v.as_time()),
        _ if id.is_float() => {
            let ns = v.as_float() * nano::SECOND as f64;
            (ns.is_finite() && ns.abs() <= i64::MAX as f64).then_some(ns as i64)
        }
        _ if id.is_unsigned() => i64::try_from(v.as_uint()).ok(),
        _ if id.is_signed() => Some(v.as_int()),
        PrimitiveId::String => nano::parse_time(v.as_str().trim())
            .ok()
            .or_else(|| v.as_str().trim().parse::<i64>().ok()),
        _ => None,
    }
}

/// Nanoseconds. Integers and floats are taken as seconds; strings use the
/// duration syntax.
pub fn to_duration(v: &Value) -> Option<i64> {
    let id = v.ty().primitive_id()?;
    match id {
        PrimitiveId::Duration => Some(v.as_duration()),
        PrimitiveId::Time => None,
        _ if id.is_float() => {
            let ns = v.as_float() * nano::SECOND as f64;
            (ns.is_finite() && ns.abs() <= i64::MAX as f64).then_some(ns as i64)
        }
        _ if id.is_unsigned() => i64::try_from(v.as_uint())
            .ok()?
            .checked_mul(nano::SECOND),
        _ if id.is_signed() => v.as_int().checked_mul(nano::SECOND),
        PrimitiveId::String => nano::parse_duration(v.as_str().trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(id: PrimitiveId, v: i64) -> Value {
        Value::int(Type::primitive(id), v)
    }

    #[test]
    fn same_type_passthrough() {
        let p = coerce_pair(&Value::int64(1), &Value::int64(2)).unwrap();
        assert_eq!(p.ty, Type::int64());
        assert!(!p.equal());
    }

    #[test]
    fn floats_are_equal_by_value() {
        let nan = coerce_pair(&Value::float64(f64::NAN), &Value::float64(f64::NAN)).unwrap();
        assert!(!nan.equal());
        let zeros = coerce_pair(&Value::float64(0.0), &Value::float64(-0.0)).unwrap();
        assert!(zeros.equal());
        let mixed = coerce_pair(&Value::int64(0), &Value::float64(-0.0)).unwrap();
        assert!(mixed.equal());
        let null = coerce_pair(&Value::null_of(Type::float64()), &Value::float64(0.0)).unwrap();
        assert!(!null.equal());
    }

    #[test]
    fn null_takes_other_type() {
        let p = coerce_pair(&Value::null(), &Value::string("x")).unwrap();
        assert_eq!(p.ty, Type::string());
        assert!(p.a.is_null());
    }

    #[test]
    fn widening() {
        let p = coerce_pair(&typed(PrimitiveId::Int8, 3), &typed(PrimitiveId::Int32, 4)).unwrap();
        assert_eq!(p.ty, Type::primitive(PrimitiveId::Int32));

        let p = coerce_pair(&Value::int64(3), &Value::float64(0.5)).unwrap();
        assert_eq!(p.ty, Type::float64());
        assert_eq!(p.a.as_float(), 3.0);

        let u8 = Value::uint(Type::primitive(PrimitiveId::Uint8), 200);
        let p = coerce_pair(&u8, &typed(PrimitiveId::Int8, -1)).unwrap();
        assert_eq!(p.ty, Type::primitive(PrimitiveId::Int16));
        assert_eq!(p.a.as_int(), 200);
    }

    #[test]
    fn mixed_sign_overflow() {
        let big = Value::uint64(u64::MAX);
        let p = coerce_pair(&Value::int64(5), &big).unwrap();
        assert_eq!(p.ty, Type::uint64());
        assert_eq!(p.a.as_uint(), 5);
        assert!(coerce_pair(&Value::int64(-1), &big).unwrap_err().is_overflow());
    }

    #[test]
    fn incompatible() {
        let err = coerce_pair(&Value::string("a"), &Value::int64(1)).unwrap_err();
        assert!(err.is_incompatible_types());
        assert!(coerce_pair(&Value::string("a"), &Value::bytes_value(b"a")).is_err());
    }

    #[test]
    fn numeric_compare_without_overflow() {
        let big = Value::uint64(u64::MAX);
        assert_eq!(compare_numbers(&Value::int64(-1), &big), Some(Ordering::Less));
        assert_eq!(compare_numbers(&big, &Value::int64(-1)), Some(Ordering::Greater));
        assert_eq!(compare_numbers(&Value::int64(2), &Value::float64(2.0)), Some(Ordering::Equal));
        assert_eq!(compare_numbers(&Value::string("1"), &Value::int64(1)), None);
    }

    #[test]
    fn conversions() {
        assert_eq!(to_int(&Value::string(" 42 ")), Some(42));
        assert_eq!(to_int(&Value::duration(3 * nano::SECOND)), Some(3));
        assert_eq!(to_uint(&Value::int64(-1)), None);
        assert_eq!(to_float(&Value::string("2.5")), Some(2.5));
        assert_eq!(to_bool(&Value::int64(0)), Some(false));
        assert_eq!(to_bool(&Value::string("true")), Some(true));
        assert_eq!(to_duration(&Value::int64(2)), Some(2 * nano::SECOND));
        assert_eq!(to_duration(&Value::string("1m")), Some(nano::MINUTE));
        assert_eq!(to_time(&Value::int64(10)), Some(10));
        assert_eq!(to_time(&Value::float64(1.5)), Some(1_500_000_000));
        assert_eq!(
            to_time(&Value::string("1970-01-01T00:00:01Z")),
            Some(nano::SECOND)
        );
        assert_eq!(to_int(&Value::ip("1.2.3.4".parse().unwrap())), None);
    }
}
