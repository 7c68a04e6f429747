//! Primitive casts.
//!
//! [`cast_primitive`] converts a value to a primitive type, producing an
//! error value wrapping the input when the conversion is undefined or does
//! not fit. Nulls cast to the null of the target; errors pass through.
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use zedcore::{
    coerce::{to_bool, to_duration, to_float, to_int, to_time, to_uint},
    types::{PrimitiveId, Type, TypeContext, TypeDef},
    value::Value,
    zson,
};

use crate::expr::{
    EvalContext, Expr,
    arith::{signed_bounds, unsigned_max},
};

/// `T(expr)` for a primitive type `T`.
#[derive(Debug)]
pub struct Cast {
    to: PrimitiveId,
    expr: Box<Expr>,
}

impl Cast {
    pub fn new(to: PrimitiveId, expr: Expr) -> Self {
        Self {
            to,
            expr: Box::new(expr),
        }
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        let v = self.expr.eval(ectx, this);
        cast_primitive(ectx.zctx(), &v, self.to)
    }
}

/// Enums read as their symbol for strings and as their index otherwise.
fn enum_value(v: Value, to: PrimitiveId) -> Value {
    match v.ty().def() {
        TypeDef::Enum(_) if to == PrimitiveId::String => {
            Value::string(v.as_enum_symbol().unwrap_or_default())
        }
        TypeDef::Enum(_) => {
            let (_, bytes) = v.into_parts();
            Value::shared(Type::uint64(), bytes)
        }
        _ => v,
    }
}

pub fn cast_primitive(zctx: &TypeContext, v: &Value, to: PrimitiveId) -> Value {
    if v.is_error() {
        return v.clone();
    }
    let target = Type::primitive(to);
    let u = enum_value(v.under(), to);
    if u.ty() == &target {
        return u;
    }
    if u.is_null() {
        return Value::null_of(target);
    }
    let fail = || zctx.wrap_error(format!("cannot cast to {to}"), v);
    let stringy = matches!(u.ty().primitive_id(), Some(PrimitiveId::String | PrimitiveId::Bytes));
    match to {
        _ if to.is_signed() && !matches!(to, PrimitiveId::Duration | PrimitiveId::Time) => {
            let (lo, hi) = signed_bounds(to);
            match to_int(&u) {
                Some(n) if (lo..=hi).contains(&n) => Value::int(target, n),
                _ => fail(),
            }
        }
        _ if to.is_unsigned() => match to_uint(&u) {
            Some(n) if n <= unsigned_max(to) => Value::uint(target, n),
            _ => fail(),
        },
        _ if to.is_float() => match to_float(&u) {
            Some(f) if to == PrimitiveId::Float16 => Value::float(target, f as f32 as f64),
            Some(f) => Value::float(target, f),
            None => fail(),
        },
        PrimitiveId::Duration => to_duration(&u).map_or_else(fail, Value::duration),
        PrimitiveId::Time => to_time(&u).map_or_else(fail, Value::time),
        PrimitiveId::Bool => to_bool(&u).map_or_else(fail, Value::bool),
        PrimitiveId::String => match u.ty().primitive_id() {
            Some(PrimitiveId::Bytes) => Value::string(&String::from_utf8_lossy(u.as_bytes())),
            _ => Value::string(&zson::format_bare(&u)),
        },
        PrimitiveId::Bytes => Value::bytes_value(u.as_bytes()),
        PrimitiveId::Ip if stringy => match u.as_str().trim().parse::<IpAddr>() {
            Ok(ip) => Value::ip(ip),
            Err(_) => fail(),
        },
        PrimitiveId::Net if stringy => match u.as_str().trim().parse::<IpNetwork>() {
            Ok(net) => Value::net(net),
            Err(_) => fail(),
        },
        PrimitiveId::Type if stringy => match zson::parse_type(zctx, u.as_str().trim()) {
            Ok(ty) => zctx.lookup_type_value(&ty),
            Err(_) => fail(),
        },
        _ => fail(),
    }
}
