//! Resolution of ZSON syntax trees into values.
use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::{
    encoding::{
        Builder,
        normalize::{normalize_map, normalize_set},
    },
    error::{ZedError, ZedResult},
    nano,
    types::{Field, PrimitiveId, Type, TypeContext, TypeDef},
    value::{
        Value,
        construct::{array_of, map_of, set_of, wrap_union},
        primitive::*,
    },
    zson::parser::{Ast, TypeAst},
};

fn bad(msg: impl Into<String>) -> ZedError {
    ZedError::ZsonSyntax(msg.into())
}

pub fn resolve_type(ctx: &TypeContext, t: &TypeAst) -> ZedResult<Type> {
    Ok(match t {
        TypeAst::Name(name) => ctx
            .lookup_by_name(name)
            .ok_or_else(|| bad(format!("no type named '{name}'")))?,
        TypeAst::Record(fields) => {
            let fields = fields
                .iter()
                .map(|(name, t)| Ok(Field::new(name.clone(), resolve_type(ctx, t)?)))
                .collect::<ZedResult<Vec<_>>>()?;
            ctx.lookup_type_record(fields)?
        }
        TypeAst::Array(inner) => ctx.lookup_type_array(resolve_type(ctx, inner)?),
        TypeAst::Set(inner) => ctx.lookup_type_set(resolve_type(ctx, inner)?),
        TypeAst::Map(k, v) => ctx.lookup_type_map(resolve_type(ctx, k)?, resolve_type(ctx, v)?),
        TypeAst::Union(members) => ctx.lookup_type_union(
            members
                .iter()
                .map(|m| resolve_type(ctx, m))
                .collect::<ZedResult<_>>()?,
        )?,
        TypeAst::Enum(symbols) => ctx.lookup_type_enum(symbols.clone()),
        TypeAst::Error(inner) => ctx.lookup_type_error(resolve_type(ctx, inner)?),
        TypeAst::Named(name, def) => ctx.lookup_type_named(name, resolve_type(ctx, def)?)?,
    })
}

fn parse_float(w: &str) -> Option<f64> {
    w.parse::<f64>().ok()
}

/// Infer the primitive a bare word spells.
pub fn classify_word(w: &str) -> ZedResult<Value> {
    match w {
        "null" => return Ok(Value::null()),
        "true" => return Ok(Value::bool(true)),
        "false" => return Ok(Value::bool(false)),
        "NaN" | "+Inf" | "-Inf" | "Inf" => {
            return Ok(Value::float64(parse_float(w).unwrap_or(f64::NAN)));
        }
        _ => {}
    }
    if let Some(digits) = w.strip_prefix("0x")
        && let Ok(bytes) = hex::decode(digits)
    {
        return Ok(Value::bytes_value(&bytes));
    }
    if let Ok(i) = w.parse::<i64>() {
        return Ok(Value::int64(i));
    }
    if let Ok(u) = w.parse::<u64>() {
        return Ok(Value::uint64(u));
    }
    if w.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
        && let Some(f) = parse_float(w)
    {
        return Ok(Value::float64(f));
    }
    if let Ok(ns) = nano::parse_time(w) {
        return Ok(Value::time(ns));
    }
    if let Ok(ip) = w.parse::<IpAddr>() {
        return Ok(Value::ip(ip));
    }
    if let Ok(net) = w.parse::<IpNetwork>() {
        return Ok(Value::net(net));
    }
    if let Ok(ns) = nano::parse_duration(w) {
        return Ok(Value::duration(ns));
    }
    Err(bad(format!("unrecognized value '{w}'")))
}

fn out_of_range(w: &str, p: PrimitiveId) -> ZedError {
    bad(format!("'{w}' is not a valid {p}"))
}

/// Read a bare word as primitive `p`.
fn word_as(w: &str, p: PrimitiveId) -> ZedResult<Value> {
    let ty = Type::primitive(p);
    let err = || out_of_range(w, p);
    Ok(match p {
        PrimitiveId::Int8 => Value::int(ty, w.parse::<i8>().map_err(|_| err())? as i64),
        PrimitiveId::Int16 => Value::int(ty, w.parse::<i16>().map_err(|_| err())? as i64),
        PrimitiveId::Int32 => Value::int(ty, w.parse::<i32>().map_err(|_| err())? as i64),
        PrimitiveId::Int64 => Value::int(ty, w.parse::<i64>().map_err(|_| err())?),
        PrimitiveId::Uint8 => Value::uint(ty, w.parse::<u8>().map_err(|_| err())? as u64),
        PrimitiveId::Uint16 => Value::uint(ty, w.parse::<u16>().map_err(|_| err())? as u64),
        PrimitiveId::Uint32 => Value::uint(ty, w.parse::<u32>().map_err(|_| err())? as u64),
        PrimitiveId::Uint64 => Value::uint(ty, w.parse::<u64>().map_err(|_| err())?),
        PrimitiveId::Float16 | PrimitiveId::Float32 | PrimitiveId::Float64 => {
            Value::float(ty, parse_float(w).ok_or_else(err)?)
        }
        PrimitiveId::Duration => Value::duration(nano::parse_duration(w).map_err(|_| err())?),
        PrimitiveId::Time => Value::time(nano::parse_time(w).map_err(|_| err())?),
        PrimitiveId::Bool => match w {
            "true" => Value::bool(true),
            "false" => Value::bool(false),
            _ => return Err(err()),
        },
        PrimitiveId::Bytes => {
            let digits = w.strip_prefix("0x").ok_or_else(err)?;
            Value::bytes_value(&hex::decode(digits).map_err(|_| err())?)
        }
        PrimitiveId::Ip => Value::ip(w.parse().map_err(|_| err())?),
        PrimitiveId::Net => Value::net(w.parse().map_err(|_| err())?),
        PrimitiveId::String | PrimitiveId::Type | PrimitiveId::Null => return Err(err()),
    })
}

/// Build a value, inferring its type from the syntax.
pub fn build(ctx: &TypeContext, ast: &Ast) -> ZedResult<Value> {
    match ast {
        Ast::Word(w) => classify_word(w),
        Ast::Str(s) => Ok(Value::string(s)),
        Ast::TypeVal(t) => Ok(ctx.lookup_type_value(&resolve_type(ctx, t)?)),
        Ast::Enum(sym) => {
            let ty = ctx.lookup_type_enum(vec![sym.clone()]);
            Ok(Value::uint(ty, 0))
        }
        Ast::Record(fields) => {
            let mut types = Vec::with_capacity(fields.len());
            let mut b = Builder::new();
            for (name, ast) in fields {
                let v = build(ctx, ast)?;
                b.append(v.bytes(), v.ty().is_container());
                types.push(Field::new(name.clone(), v.ty().clone()));
            }
            Ok(Value::new(ctx.lookup_type_record(types)?, Some(b.finish()?)))
        }
        Ast::Array(elems) | Ast::Set(elems) => {
            let values = elems
                .iter()
                .map(|e| build(ctx, e))
                .collect::<ZedResult<Vec<_>>>()?;
            if matches!(ast, Ast::Set(_)) {
                set_of(ctx, &values)
            } else {
                array_of(ctx, &values)
            }
        }
        Ast::Map(entries) => {
            let mut keys = Vec::with_capacity(entries.len());
            let mut vals = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                keys.push(build(ctx, k)?);
                vals.push(build(ctx, v)?);
            }
            map_of(ctx, &keys, &vals)
        }
        Ast::Error(inner) => Ok(ctx.error_of(&build(ctx, inner)?)),
        Ast::Decorated(inner, t) => build_as(ctx, inner, &resolve_type(ctx, t)?),
    }
}

fn mismatch(v: &Value, ty: &Type) -> ZedError {
    bad(format!("value {v} cannot be read as {ty}"))
}

/// Build a value of the given type.
pub fn build_as(ctx: &TypeContext, ast: &Ast, ty: &Type) -> ZedResult<Value> {
    if let Ast::Word(w) = ast
        && w == "null"
    {
        return Ok(Value::null_of(ty.clone()));
    }
    if let Ast::Decorated(_, _) = ast {
        let v = build(ctx, ast)?;
        return conform(v, ty);
    }
    match ty.def() {
        TypeDef::Named(_, under) => {
            let v = build_as(ctx, ast, under)?;
            Ok(Value::shared(ty.clone(), v.into_parts().1))
        }
        TypeDef::Union(members) => {
            if let Ok(v) = build(ctx, ast)
                && let Some(tag) = ty.tag_of(v.ty())
            {
                return Ok(wrap_union(ty, tag, &v));
            }
            for (tag, member) in members.iter().enumerate() {
                if let Ok(v) = build_as(ctx, ast, member) {
                    return Ok(wrap_union(ty, tag, &v));
                }
            }
            Err(bad(format!("no member of {ty} matches the value")))
        }
        TypeDef::Primitive(p) => match ast {
            Ast::Word(w) => word_as(w, *p),
            Ast::Str(s) if *p == PrimitiveId::String => Ok(Value::string(s)),
            _ => {
                let v = build(ctx, ast)?;
                conform(v, ty)
            }
        },
        TypeDef::Record(fields) => {
            let Ast::Record(given) = ast else {
                return conform(build(ctx, ast)?, ty);
            };
            if let Some((name, _)) = given.iter().find(|(n, _)| !fields.iter().any(|f| &f.name == n)) {
                return Err(bad(format!("field '{name}' is not in {ty}")));
            }
            let mut b = Builder::new();
            for f in fields {
                let v = match given.iter().find(|(n, _)| n == &f.name) {
                    Some((_, ast)) => build_as(ctx, ast, &f.ty)?,
                    None => Value::null_of(f.ty.clone()),
                };
                b.append(v.bytes(), f.ty.is_container());
            }
            Ok(Value::new(ty.clone(), Some(b.finish()?)))
        }
        TypeDef::Array(inner) | TypeDef::Set(inner) => {
            let elems = match ast {
                Ast::Array(e) | Ast::Set(e) => e,
                _ => return conform(build(ctx, ast)?, ty),
            };
            let mut b = Builder::new();
            for e in elems {
                let v = build_as(ctx, e, inner)?;
                b.append(v.bytes(), inner.is_container());
            }
            let body = b.finish()?;
            let body = if ty.def().is_set() { normalize_set(&body)? } else { body };
            Ok(Value::new(ty.clone(), Some(body)))
        }
        TypeDef::Map(kt, vt) => {
            let Ast::Map(entries) = ast else {
                return conform(build(ctx, ast)?, ty);
            };
            let mut b = Builder::new();
            for (k, v) in entries {
                let k = build_as(ctx, k, kt)?;
                let v = build_as(ctx, v, vt)?;
                b.append(k.bytes(), kt.is_container());
                b.append(v.bytes(), vt.is_container());
            }
            Ok(Value::new(ty.clone(), Some(normalize_map(&b.finish()?)?)))
        }
        TypeDef::Enum(symbols) => {
            let Ast::Enum(sym) = ast else {
                return conform(build(ctx, ast)?, ty);
            };
            let idx = symbols
                .iter()
                .position(|s| s == sym)
                .ok_or_else(|| bad(format!("'{sym}' is not a symbol of {ty}")))?;
            Ok(Value::uint(ty.clone(), idx as u64))
        }
        TypeDef::Error(inner) => {
            let Ast::Error(x) = ast else {
                return conform(build(ctx, ast)?, ty);
            };
            let v = build_as(ctx, x, inner)?;
            Ok(Value::shared(ty.clone(), v.into_parts().1))
        }
    }
}

/// Adjust an already-typed value to `ty` where the text form allows it:
/// identical types, the same underlying type, or union membership.
fn conform(v: Value, ty: &Type) -> ZedResult<Value> {
    if v.ty() == ty {
        return Ok(v);
    }
    if v.is_null() {
        return Ok(Value::null_of(ty.clone()));
    }
    if v.ty().under() == ty.under() {
        return Ok(Value::shared(ty.clone(), v.into_parts().1));
    }
    if let Some(tag) = ty.under().tag_of(v.ty()) {
        return Ok(wrap_union(ty, tag, &v));
    }
    Err(mismatch(&v, ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zson::{format_value, parse_value};

    fn roundtrip(ctx: &TypeContext, src: &str) {
        let v = parse_value(ctx, src).unwrap();
        assert_eq!(format_value(&v), src, "formatting of {src}");
        let again = parse_value(ctx, &format_value(&v)).unwrap();
        assert_eq!(again, v);
    }

    #[test]
    fn words() {
        assert_eq!(classify_word("1").unwrap(), Value::int64(1));
        assert_eq!(classify_word("18446744073709551615").unwrap(), Value::uint64(u64::MAX));
        assert_eq!(classify_word("2.5").unwrap(), Value::float64(2.5));
        assert_eq!(classify_word("1h").unwrap(), Value::duration(nano::HOUR));
        assert_eq!(classify_word("::1").unwrap().ty(), &Type::ip());
        assert_eq!(classify_word("10.0.0.0/8").unwrap().ty(), &Type::net());
        assert_eq!(classify_word("0xff").unwrap(), Value::bytes_value(&[0xff]));
        assert!(classify_word("nonsense").is_err());
    }

    #[test]
    fn roundtrips() {
        let ctx = TypeContext::new();
        for src in [
            r#"{a:1,b:"x",c:[1.5,2.0],d:|[10.0.0.1,10.0.0.2]|}"#,
            r#"{t:2021-01-01T00:00:00Z,d:1h30m,n:null(int64)}"#,
            r#"|{"a":1,"b":2}|"#,
            "[1,\"a\"]([(int64,string)])",
            "80(port=uint16)",
            "%b(enum(a,b))",
            "<{x:[ip]}>",
            r#"error("missing")"#,
            "[]([string])",
            "{x:1(int8),y:200(uint8)}",
        ] {
            roundtrip(&ctx, src);
        }
    }

    #[test]
    fn heterogeneous_array_infers_union() {
        let ctx = TypeContext::new();
        let v = parse_value(&ctx, r#"[1,"a",null]"#).unwrap();
        assert_eq!(v.ty().to_string(), "[(int64,string)]");
        assert_eq!(v.container_length().unwrap(), 3);
    }

    #[test]
    fn sets_and_maps_are_normalized() {
        let ctx = TypeContext::new();
        let v = parse_value(&ctx, "|[3,1,3,2]|").unwrap();
        assert_eq!(format_value(&v), "|[1,2,3]|");
        let m = parse_value(&ctx, r#"|{"b":1,"a":2,"b":3}|"#).unwrap();
        assert_eq!(format_value(&m), r#"|{"a":2,"b":3}|"#);
    }

    #[test]
    fn decorated_records_fill_nulls() {
        let ctx = TypeContext::new();
        let v = parse_value(&ctx, "{a:1}({a:int32,b:string})").unwrap();
        assert_eq!(format_value(&v), "{a:1(int32),b:null(string)}");
        assert!(parse_value(&ctx, "{z:1}({a:int32})").is_err());
        assert!(parse_value(&ctx, "300(uint8)").is_err());
    }
}
