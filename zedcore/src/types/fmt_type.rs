//! ZSON rendering of types.
//!
//! | Type | Text |
//! |------|------|
//! | primitive | `int64`, `string`, ... |
//! | record | `{a:int64,"b c":string}` |
//! | array | `[T]` |
//! | set | `\|[T]\|` |
//! | map | `\|{K:V}\|` |
//! | union | `(T1,T2)` |
//! | enum | `enum(a,b)` |
//! | error | `error(T)` |
//! | named | `name=T` |
use std::fmt::{self, Display, Write};

use crate::{
    types::{Type, TypeDef},
    zson::format::write_name,
};

fn write_list<W: Write>(w: &mut W, types: &[Type]) -> fmt::Result {
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            w.write_char(',')?;
        }
        write_type(w, t)?;
    }
    Ok(())
}

pub fn write_type<W: Write>(w: &mut W, ty: &Type) -> fmt::Result {
    match ty.def() {
        TypeDef::Primitive(p) => w.write_str(p.name()),
        TypeDef::Record(fields) => {
            w.write_char('{')?;
            for (i, f) in fields.iter().enumerate() {
                if i > 0 {
                    w.write_char(',')?;
                }
                write_name(w, &f.name)?;
                w.write_char(':')?;
                write_type(w, &f.ty)?;
            }
            w.write_char('}')
        }
        TypeDef::Array(inner) => {
            w.write_char('[')?;
            write_type(w, inner)?;
            w.write_char(']')
        }
        TypeDef::Set(inner) => {
            w.write_str("|[")?;
            write_type(w, inner)?;
            w.write_str("]|")
        }
        TypeDef::Map(k, v) => {
            w.write_str("|{")?;
            write_type(w, k)?;
            w.write_char(':')?;
            write_type(w, v)?;
            w.write_str("}|")
        }
        TypeDef::Union(members) => {
            w.write_char('(')?;
            write_list(w, members)?;
            w.write_char(')')
        }
        TypeDef::Enum(symbols) => {
            w.write_str("enum(")?;
            for (i, s) in symbols.iter().enumerate() {
                if i > 0 {
                    w.write_char(',')?;
                }
                write_name(w, s)?;
            }
            w.write_char(')')
        }
        TypeDef::Error(inner) => {
            w.write_str("error(")?;
            write_type(w, inner)?;
            w.write_char(')')
        }
        TypeDef::Named(name, under) => {
            write_name(w, name)?;
            w.write_char('=')?;
            write_type(w, under)
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{Field, Type, TypeContext};

    #[test]
    fn renders_structures() {
        let ctx = TypeContext::new();
        let rec = ctx
            .lookup_type_record(vec![
                Field::new("a", Type::int64()),
                Field::new("b c", ctx.lookup_type_set(Type::string())),
            ])
            .unwrap();
        assert_eq!(rec.to_string(), r#"{a:int64,"b c":|[string]|}"#);

        let map = ctx.lookup_type_map(Type::string(), ctx.lookup_type_array(Type::ip()));
        assert_eq!(map.to_string(), "|{string:[ip]}|");

        let u = ctx
            .lookup_type_union(vec![Type::string(), Type::int64()])
            .unwrap();
        assert_eq!(u.to_string(), "(int64,string)");

        let e = ctx.lookup_type_enum(vec!["red".into(), "green".into()]);
        assert_eq!(e.to_string(), "enum(red,green)");
        let named = ctx.lookup_type_named("port", Type::uint64()).unwrap();
        assert_eq!(
            ctx.lookup_type_error(named).to_string(),
            "error(port=uint64)"
        );
    }
}
