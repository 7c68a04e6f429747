use std::fmt::{self, Write};

use crate::{
    encoding::Iter,
    nano,
    types::{PrimitiveId, Type, TypeContext, TypeDef},
    value::{
        Value,
        primitive::{decode_float, decode_ip, decode_net},
    },
};

/// Whether `name` can be written without quotes as a field name or symbol.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Write `s` as a double-quoted string literal.
pub fn write_quoted<W: Write>(w: &mut W, s: &str) -> fmt::Result {
    w.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => w.write_str("\\\"")?,
            '\\' => w.write_str("\\\\")?,
            '\n' => w.write_str("\\n")?,
            '\r' => w.write_str("\\r")?,
            '\t' => w.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(w, "\\u{:04x}", c as u32)?,
            c => w.write_char(c)?,
        }
    }
    w.write_char('"')
}

pub fn write_name<W: Write>(w: &mut W, name: &str) -> fmt::Result {
    if is_identifier(name) {
        w.write_str(name)
    } else {
        write_quoted(w, name)
    }
}

/// Primitive types whose values are recognizable from their text alone.
fn primitive_implied(p: PrimitiveId) -> bool {
    matches!(
        p,
        PrimitiveId::Int64
            | PrimitiveId::Float64
            | PrimitiveId::Bool
            | PrimitiveId::String
            | PrimitiveId::Bytes
            | PrimitiveId::Ip
            | PrimitiveId::Net
            | PrimitiveId::Duration
            | PrimitiveId::Time
            | PrimitiveId::Type
            | PrimitiveId::Null
    )
}

fn write_float<W: Write>(w: &mut W, id: PrimitiveId, f: f64) -> fmt::Result {
    if f.is_nan() {
        return w.write_str("NaN");
    }
    if f.is_infinite() {
        return w.write_str(if f > 0.0 { "+Inf" } else { "-Inf" });
    }
    // Debug keeps a decimal point or exponent and prints the shortest
    // representation that round-trips at the given width.
    match id {
        PrimitiveId::Float64 => write!(w, "{f:?}"),
        _ => write!(w, "{:?}", f as f32),
    }
}

fn write_primitive<W: Write>(w: &mut W, p: PrimitiveId, body: &[u8]) -> fmt::Result {
    let v = Value::from_slice(Type::primitive(p), Some(body));
    match p {
        _ if p.is_float() => write_float(w, p, decode_float(body)),
        PrimitiveId::Duration => w.write_str(&nano::format_duration(v.as_duration())),
        PrimitiveId::Time => w.write_str(&nano::format_time(v.as_time())),
        _ if p.is_signed() => write!(w, "{}", v.as_int()),
        _ if p.is_unsigned() => write!(w, "{}", v.as_uint()),
        PrimitiveId::Bool => w.write_str(if v.as_bool() { "true" } else { "false" }),
        PrimitiveId::String => write_quoted(w, &String::from_utf8_lossy(body)),
        PrimitiveId::Bytes => write!(w, "0x{}", hex::encode(body)),
        PrimitiveId::Ip => match decode_ip(body) {
            Ok(ip) => write!(w, "{ip}"),
            Err(_) => write!(w, "0x{}", hex::encode(body)),
        },
        PrimitiveId::Net => match decode_net(body) {
            Ok(net) => write!(w, "{net}"),
            Err(_) => write!(w, "0x{}", hex::encode(body)),
        },
        PrimitiveId::Type => {
            let ctx = TypeContext::new();
            match ctx.lookup_by_value(body) {
                Ok(t) => write!(w, "<{t}>"),
                Err(_) => w.write_str("<?>"),
            }
        }
        _ => w.write_str("null"),
    }
}

fn decorate<W: Write>(w: &mut W, ty: &Type) -> fmt::Result {
    write!(w, "({ty})")
}

/// Element types whose values do not reveal the container's element type.
fn needs_container_decoration(inner: &Type) -> bool {
    matches!(inner.def(), TypeDef::Union(_) | TypeDef::Enum(_))
}

fn write_elems<W: Write>(w: &mut W, ty: &Type, body: &[u8], outer: bool) -> fmt::Result {
    for (i, elem) in Iter::new(body).enumerate() {
        if i > 0 {
            w.write_char(',')?;
        }
        let Ok(elem) = elem else {
            return w.write_str("?");
        };
        write_inner(w, &Value::from_slice(ty.clone(), elem.body), outer)?;
    }
    Ok(())
}

/// Write `v`. With `outer` set the enclosing context already determines the
/// type, so no trailing decorator is written for it.
fn write_inner<W: Write>(w: &mut W, v: &Value, outer: bool) -> fmt::Result {
    let ty = v.ty();
    let Some(body) = v.bytes() else {
        w.write_str("null")?;
        if !outer && !ty.is_null() {
            decorate(w, ty)?;
        }
        return Ok(());
    };
    match ty.def() {
        TypeDef::Primitive(p) => {
            write_primitive(w, *p, body)?;
            if !outer && !primitive_implied(*p) {
                decorate(w, ty)?;
            }
        }
        TypeDef::Record(fields) => {
            w.write_char('{')?;
            for (i, (f, elem)) in fields.iter().zip(Iter::new(body)).enumerate() {
                if i > 0 {
                    w.write_char(',')?;
                }
                write_name(w, &f.name)?;
                w.write_char(':')?;
                match elem {
                    Ok(elem) => write_inner(w, &Value::from_slice(f.ty.clone(), elem.body), false)?,
                    Err(_) => w.write_char('?')?,
                }
            }
            w.write_char('}')?;
        }
        TypeDef::Array(inner) | TypeDef::Set(inner) => {
            let set = ty.def().is_set();
            w.write_str(if set { "|[" } else { "[" })?;
            let elems_outer = needs_container_decoration(inner);
            write_elems(w, inner, body, elems_outer)?;
            w.write_str(if set { "]|" } else { "]" })?;
            if !outer && (body.is_empty() || elems_outer) {
                decorate(w, ty)?;
            }
        }
        TypeDef::Map(kt, vt) => {
            w.write_str("|{")?;
            let elems_outer = needs_container_decoration(kt) || needs_container_decoration(vt);
            for (i, elem) in Iter::new(body).enumerate() {
                if i > 0 {
                    w.write_char(if i % 2 == 1 { ':' } else { ',' })?;
                }
                let t = if i % 2 == 0 { kt } else { vt };
                match elem {
                    Ok(elem) => write_inner(w, &Value::from_slice(t.clone(), elem.body), elems_outer)?,
                    Err(_) => w.write_char('?')?,
                }
            }
            w.write_str("}|")?;
            if !outer && (body.is_empty() || elems_outer) {
                decorate(w, ty)?;
            }
        }
        TypeDef::Union(_) => {
            let member = v.under();
            // A null payload inside a non-null union still prints the member.
            write_inner(w, &member, false)?;
            if !outer {
                decorate(w, ty)?;
            }
        }
        TypeDef::Enum(_) => {
            w.write_char('%')?;
            match v.as_enum_symbol() {
                Some(sym) => write_name(w, sym)?,
                None => w.write_char('?')?,
            }
            if !outer {
                decorate(w, ty)?;
            }
        }
        TypeDef::Error(inner) => {
            w.write_str("error(")?;
            write_inner(w, &Value::from_slice(inner.clone(), Some(body)), false)?;
            w.write_char(')')?;
        }
        TypeDef::Named(_, under) => {
            write_inner(w, &Value::from_slice(under.clone(), Some(body)), true)?;
            if !outer {
                decorate(w, ty)?;
            }
        }
    }
    Ok(())
}

/// Write `v` in ZSON, decorating it with its type wherever the text alone
/// would not reproduce that type.
pub fn write_value<W: Write>(w: &mut W, v: &Value) -> fmt::Result {
    write_inner(w, v, false)
}

/// Like [`write_value`] but without a decorator on the outermost value, so
/// `80(uint16)` renders as `80`.
pub fn write_bare<W: Write>(w: &mut W, v: &Value) -> fmt::Result {
    write_inner(w, v, true)
}

pub fn format_bare(v: &Value) -> String {
    let mut s = String::new();
    let _ = write_bare(&mut s, v);
    s
}

pub fn format_value(v: &Value) -> String {
    let mut s = String::new();
    let _ = write_value(&mut s, v);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encoding::Builder,
        types::Field,
        value::{primitive::encode_int, union_body},
    };

    #[test]
    fn primitives() {
        assert_eq!(format_value(&Value::int64(-3)), "-3");
        assert_eq!(format_value(&Value::float64(1.0)), "1.0");
        assert_eq!(format_value(&Value::float64(f64::NEG_INFINITY)), "-Inf");
        assert_eq!(format_value(&Value::string("a\"b\n")), r#""a\"b\n""#);
        assert_eq!(format_value(&Value::bytes_value(&[0xbe, 0xef])), "0xbeef");
        assert_eq!(format_value(&Value::duration(90 * nano::SECOND)), "1m30s");
        assert_eq!(
            format_value(&Value::int(Type::primitive(PrimitiveId::Int32), 7)),
            "7(int32)"
        );
        assert_eq!(format_value(&Value::null_of(Type::int64())), "null(int64)");
        assert_eq!(format_value(&Value::null()), "null");
    }

    #[test]
    fn containers() {
        let ctx = TypeContext::new();
        let rec = ctx
            .lookup_type_record(vec![
                Field::new("a", Type::int64()),
                Field::new("b c", Type::primitive(PrimitiveId::Uint8)),
            ])
            .unwrap();
        let mut b = Builder::new();
        b.append_primitive(Some(&encode_int(1)));
        b.append_primitive(Some(&[2]));
        let v = Value::new(rec, Some(b.finish().unwrap()));
        assert_eq!(format_value(&v), r#"{a:1,"b c":2(uint8)}"#);

        let empty = Value::new(ctx.lookup_type_array(Type::string()), Some(vec![]));
        assert_eq!(format_value(&empty), "[]([string])");
    }

    #[test]
    fn unions_and_named() {
        let ctx = TypeContext::new();
        let u = ctx
            .lookup_type_union(vec![Type::int64(), Type::string()])
            .unwrap();
        let tag = u.tag_of(&Type::string()).unwrap();
        let v = Value::new(u, Some(union_body(tag, Some(b"x"), false)));
        assert_eq!(format_value(&v), r#""x"((int64,string))"#);

        let port = ctx
            .lookup_type_named("port", Type::primitive(PrimitiveId::Uint16))
            .unwrap();
        assert_eq!(format_value(&Value::uint(port, 80)), "80(port=uint16)");

        let tv = ctx.lookup_type_value(&ctx.lookup_type_set(Type::ip()));
        assert_eq!(format_value(&tv), "<|[ip]|>");
        assert_eq!(format_value(&ctx.missing()), r#"error("missing")"#);
    }
}
