//! Functions about types, errors and missing values.
use std::{cmp::Ordering, collections::HashMap, net::IpAddr};

use ipnetwork::IpNetwork;
use parking_lot::Mutex;
use zedcore::{
    types::{PrimitiveId, Type, TypeDef},
    value::{Value, WalkSignal, compare_values, construct::array_of},
    zson,
};

use crate::{
    expr::EvalContext,
    function::{Function, fail, fail_on, string_arg},
};

/// The type a type value describes, or the type of any other value.
fn described_type(ectx: &EvalContext, v: &Value) -> Option<Type> {
    let u = v.under();
    if u.ty().is(PrimitiveId::Type) {
        return ectx.zctx().lookup_by_value(u.bytes()?).ok();
    }
    Some(v.ty().clone())
}

pub fn len(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let v = args[0].under();
    if v.is_error() {
        return args[0].clone();
    }
    if v.is_null() {
        return Value::int64(0);
    }
    let n = match v.ty().def() {
        TypeDef::Record(_) | TypeDef::Array(_) | TypeDef::Set(_) | TypeDef::Map(_, _) => {
            match v.container_length() {
                Ok(n) => n,
                Err(e) => return fail(ectx, "len", e),
            }
        }
        TypeDef::Primitive(PrimitiveId::String | PrimitiveId::Bytes) => v.as_bytes().len(),
        TypeDef::Primitive(PrimitiveId::Ip) => match v.as_ip() {
            Some(IpAddr::V4(_)) => 4,
            _ => 16,
        },
        TypeDef::Primitive(PrimitiveId::Net) => match v.as_net() {
            Some(IpNetwork::V4(_)) => 8,
            _ => 32,
        },
        TypeDef::Primitive(PrimitiveId::Type) => match described_type(ectx, &v).as_ref().map(|t| t.under().def()) {
            Some(TypeDef::Record(fields)) => fields.len(),
            Some(TypeDef::Union(members)) => members.len(),
            Some(TypeDef::Enum(symbols)) => symbols.len(),
            _ => 1,
        },
        _ => return fail_on(ectx, "len", "bad type", &args[0]),
    };
    Value::int64(n as i64)
}

fn leaf_paths(ty: &Type, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    for f in ty.fields().unwrap_or_default() {
        prefix.push(f.name.clone());
        if f.ty.is_record() {
            leaf_paths(&f.ty, prefix, out);
        } else {
            out.push(prefix.clone());
        }
        prefix.pop();
    }
}

/// Paths of the leaf fields of a record (or record type value) as an array
/// of `[string]`.
pub fn fields(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let Some(ty) = described_type(ectx, &args[0]).filter(Type::is_record) else {
        return ectx.zctx().missing();
    };
    let mut paths = Vec::new();
    leaf_paths(&ty, &mut Vec::new(), &mut paths);
    let zctx = ectx.zctx();
    let elems: Result<Vec<Value>, _> = paths
        .iter()
        .map(|p| array_of(zctx, &p.iter().map(|s| Value::string(s)).collect::<Vec<_>>()))
        .collect();
    match elems.and_then(|elems| array_of(zctx, &elems)) {
        Ok(v) => v,
        Err(e) => fail(ectx, "fields", e),
    }
}

pub fn type_of(ectx: &mut EvalContext, args: &[Value]) -> Value {
    ectx.zctx().lookup_type_value(args[0].ty())
}

pub fn type_under(ectx: &mut EvalContext, args: &[Value]) -> Value {
    ectx.zctx().lookup_type_value(args[0].ty().under())
}

pub fn nameof(ectx: &mut EvalContext, args: &[Value]) -> Value {
    match args[0].ty().name() {
        Some(name) => Value::string(name),
        None => ectx.zctx().missing(),
    }
}

/// `typename(name)` looks up a named type; `typename(name, type)` binds it.
pub fn typename(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let Some(Some(name)) = string_arg(&args[0]) else {
        return fail_on(ectx, "typename", "first argument not a string", &args[0]);
    };
    let Some(bind) = args.get(1) else {
        return match ectx.zctx().lookup_by_name(&name) {
            Some(ty) => ectx.zctx().lookup_type_value(&ty),
            None => ectx.zctx().missing(),
        };
    };
    let u = bind.under();
    if !u.ty().is(PrimitiveId::Type) {
        return fail_on(ectx, "typename", "second argument not a type value", bind);
    }
    let named = ectx
        .zctx()
        .lookup_by_value(u.bytes().unwrap_or_default())
        .and_then(|ty| ectx.zctx().lookup_type_named(&name, ty));
    match named {
        Ok(ty) => ectx.zctx().lookup_type_value(&ty),
        Err(e) => fail(ectx, "typename", e),
    }
}

pub fn kind(ectx: &mut EvalContext, args: &[Value]) -> Value {
    match described_type(ectx, &args[0]) {
        Some(ty) => Value::string(&ty.kind().to_string()),
        None => fail_on(ectx, "kind", "malformed type value", &args[0]),
    }
}

/// `is(v, T)`: whether `v` has exactly type `T`, given as a type value or as
/// ZSON type text.
pub fn is(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let (subject, t) = (&args[0], args[1].under());
    let ty = if let Some(Some(src)) = string_arg(&t) {
        zson::parse_type(ectx.zctx(), &src).ok()
    } else if t.ty().is(PrimitiveId::Type) {
        t.bytes().and_then(|tv| ectx.zctx().lookup_by_value(tv).ok())
    } else {
        None
    };
    Value::bool(ty.as_ref() == Some(subject.ty()))
}

pub fn is_error(_: &mut EvalContext, args: &[Value]) -> Value {
    Value::bool(args[0].is_error())
}

/// True when no argument is missing. Other errors are returned as is.
pub fn has(_: &mut EvalContext, args: &[Value]) -> Value {
    for v in args {
        if v.is_missing() || v.is_quiet() {
            return Value::bool(false);
        }
        if v.is_error() {
            return v.clone();
        }
    }
    Value::bool(true)
}

/// True when some argument is missing. Other errors are returned as is.
pub fn missing(_: &mut EvalContext, args: &[Value]) -> Value {
    for v in args {
        if v.is_missing() || v.is_quiet() {
            return Value::bool(true);
        }
        if v.is_error() {
            return v.clone();
        }
    }
    Value::bool(false)
}

pub fn error(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let v = &args[0];
    v.retype(ectx.zctx().lookup_type_error(v.ty().clone()))
}

pub fn quiet(ectx: &mut EvalContext, args: &[Value]) -> Value {
    if args[0].is_missing() {
        return ectx.zctx().quiet();
    }
    args[0].clone()
}

/// Strip named types and unions, unwrap errors, and turn a type value into
/// the value of its underlying type.
pub fn under(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let v = args[0].under();
    if let Some(inner) = v.ty().error_inner() {
        return v.retype(inner.clone());
    }
    if v.ty().is(PrimitiveId::Type)
        && let Some(ty) = described_type(ectx, &v)
    {
        return ectx.zctx().lookup_type_value(ty.under());
    }
    v
}

/// First argument that is neither null nor missing, or null.
pub fn coalesce(_: &mut EvalContext, args: &[Value]) -> Value {
    args.iter()
        .find(|v| !v.is_null() && !v.is_missing() && !v.is_quiet())
        .cloned()
        .unwrap_or_else(Value::null)
}

/// `compare(a, b[, nulls_max])`: -1, 0 or 1 in the total value order.
pub fn compare(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let nulls_max = match args.get(2).map(Value::under) {
        None => true,
        Some(v) if v.ty().is(PrimitiveId::Bool) && !v.is_null() => v.as_bool(),
        Some(v) => return fail_on(ectx, "compare", "nulls_max must be a bool", &v),
    };
    Value::int64(match compare_values(&args[0], &args[1], nulls_max) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Whether any error type can be reached from `ty`.
fn may_hold_error(ty: &Type) -> bool {
    match ty.under().def() {
        TypeDef::Error(_) => true,
        TypeDef::Record(fields) => fields.iter().any(|f| may_hold_error(&f.ty)),
        TypeDef::Array(t) | TypeDef::Set(t) => may_hold_error(t),
        TypeDef::Map(k, v) => may_hold_error(k) || may_hold_error(v),
        TypeDef::Union(members) => members.iter().any(may_hold_error),
        _ => false,
    }
}

/// `has_error(v)`: whether `v` is or contains an error. Types that cannot
/// hold errors are remembered and answered without walking the value.
#[derive(Debug, Default)]
pub struct HasError {
    cache: Mutex<HashMap<Type, bool>>,
}

impl Function for HasError {
    fn call(&self, ectx: &mut EvalContext, args: &[Value]) -> Value {
        let v = &args[0];
        let may = *self
            .cache
            .lock()
            .entry(v.ty().clone())
            .or_insert_with(|| may_hold_error(v.ty()));
        if !may {
            return Value::bool(false);
        }
        let found = v.walk(&mut |ty, _| {
            Ok(if ty.is_error() {
                WalkSignal::Stop
            } else {
                WalkSignal::Continue
            })
        });
        match found {
            Ok(found) => Value::bool(found),
            Err(e) => fail(ectx, "has_error", e),
        }
    }
}
