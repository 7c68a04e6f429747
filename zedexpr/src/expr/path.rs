use zedcore::{
    encoding::Builder,
    types::{PrimitiveId, TypeDef},
    value::Value,
};

use crate::expr::{EvalContext, Expr};

/// Field `name` of a record. Applied to a type value describing a record,
/// yields the type value of that field.
pub(crate) fn eval_dot(ectx: &EvalContext, container: &Value, name: &str) -> Value {
    if container.is_error() {
        return container.clone();
    }
    let v = container.under();
    if v.ty().is(PrimitiveId::Type) {
        let Some(tv) = v.bytes() else {
            return ectx.zctx().missing();
        };
        return match ectx.zctx().lookup_by_value(tv) {
            Ok(ty) => match ty.under().field_type(name) {
                Some(ft) => ectx.zctx().lookup_type_value(ft),
                None => ectx.zctx().missing(),
            },
            Err(e) => ectx.zctx().new_error(e),
        };
    }
    v.deref(name).unwrap_or_else(|| ectx.zctx().missing())
}

/// Integer index, counting from the end when negative.
fn position(index: &Value, len: usize) -> Option<usize> {
    let id = index.ty().primitive_id()?;
    let i = if id.is_unsigned() {
        i64::try_from(index.as_uint()).ok()?
    } else {
        index.as_int()
    };
    let i = if i < 0 { len as i64 + i } else { i };
    (0..len as i64).contains(&i).then_some(i as usize)
}

fn is_integer(v: &Value) -> bool {
    !v.is_null() && v.ty().primitive_id().is_some_and(|p| p.is_integer())
}

pub(crate) fn eval_index(ectx: &mut EvalContext, this: &Value, container: &Expr, index: &Expr) -> Value {
    let c = container.eval(ectx, this);
    if c.is_error() {
        return c;
    }
    let i = index.eval(ectx, this);
    if i.is_error() {
        return i;
    }
    index_value(ectx, &c, &i)
}

/// `c[i]` on evaluated operands.
pub fn index_value(ectx: &EvalContext, c: &Value, i: &Value) -> Value {
    let c = c.under();
    let i = i.under();
    match c.ty().def() {
        TypeDef::Array(_) | TypeDef::Set(_) => {
            if !is_integer(&i) {
                return ectx.zctx().wrap_error("array index is not an integer", &i);
            }
            let elems = match c.elements() {
                Ok(elems) => elems,
                Err(e) => return ectx.zctx().new_error(e),
            };
            match position(&i, elems.len()) {
                Some(n) => elems[n].clone(),
                None => ectx.zctx().missing(),
            }
        }
        TypeDef::Record(_) => {
            if !i.ty().is(PrimitiveId::String) || i.is_null() {
                return ectx.zctx().wrap_error("record index is not a string", &i);
            }
            eval_dot(ectx, &c, i.as_str())
        }
        TypeDef::Map(_, _) => {
            let entries = match c.entries() {
                Ok(entries) => entries,
                Err(e) => return ectx.zctx().new_error(e),
            };
            entries
                .into_iter()
                .find(|(k, _)| {
                    let k = k.under();
                    k.ty() == i.ty() && k.bytes() == i.bytes()
                })
                .map(|(_, v)| v)
                .unwrap_or_else(|| ectx.zctx().missing())
        }
        _ => ectx.zctx().missing(),
    }
}

/// Clamp a slice bound into `[0, len]`; negative bounds count from the end.
fn bound(v: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(v) = v else {
        return default;
    };
    let n = if v.ty().primitive_id().is_some_and(|p| p.is_unsigned()) {
        i64::try_from(v.as_uint()).unwrap_or(i64::MAX)
    } else {
        v.as_int()
    };
    let n = if n < 0 { len as i64 + n } else { n };
    n.clamp(0, len as i64) as usize
}

pub(crate) fn eval_slice(
    ectx: &mut EvalContext,
    this: &Value,
    container: &Expr,
    from: Option<&Expr>,
    to: Option<&Expr>,
) -> Value {
    let c = container.eval(ectx, this);
    if c.is_error() {
        return c;
    }
    let mut bounds = [None, None];
    for (slot, e) in bounds.iter_mut().zip([from, to]) {
        let Some(e) = e else { continue };
        let v = e.eval(ectx, this).under();
        if v.is_error() {
            return v;
        }
        if !v.is_null() {
            if !is_integer(&v) {
                return ectx.zctx().wrap_error("slice index is not an integer", &v);
            }
            *slot = Some(v);
        }
    }
    slice_value(ectx, &c, bounds[0].as_ref(), bounds[1].as_ref())
}

/// `c[from:to]` on evaluated operands. Strings slice by character.
pub fn slice_value(ectx: &EvalContext, c: &Value, from: Option<&Value>, to: Option<&Value>) -> Value {
    let c = c.under();
    if c.is_null() {
        return c;
    }
    let range = |len: usize| {
        let lo = bound(from, len, 0);
        let hi = bound(to, len, len);
        lo..hi.max(lo)
    };
    match c.ty().def() {
        TypeDef::Primitive(PrimitiveId::String) => {
            let s = c.as_str();
            let r = range(s.chars().count());
            let out: String = s.chars().skip(r.start).take(r.len()).collect();
            Value::string(&out)
        }
        TypeDef::Primitive(PrimitiveId::Bytes) => {
            let b = c.as_bytes();
            Value::bytes_value(&b[range(b.len())])
        }
        TypeDef::Array(_) => {
            let elems: Result<Vec<_>, _> = c.iter().collect();
            let elems = match elems {
                Ok(elems) => elems,
                Err(e) => return ectx.zctx().new_error(e),
            };
            let mut b = Builder::new();
            for elem in &elems[range(elems.len())] {
                b.append(elem.body, elem.container);
            }
            Value::new(c.ty().clone(), Some(b.bytes().to_vec()))
        }
        _ => ectx
            .zctx()
            .wrap_error("sliced value is not array, bytes, or string", &c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::*;

    #[test]
    fn dot_and_missing() {
        let mut ectx = ectx();
        let e = Expr::Dot(field("id"), "src".into());
        assert_eq!(run(&mut ectx, &e, r#"{id:{src:"a"}}"#), "\"a\"");
        assert_eq!(run(&mut ectx, &e, "{id:1}"), r#"error("missing")"#);
        assert_eq!(run(&mut ectx, &e, "{x:1}"), r#"error("missing")"#);
    }

    #[test]
    fn dot_on_type_values() {
        let mut ectx = ectx();
        let e = Expr::Dot(Box::new(Expr::This), "b".into());
        assert_eq!(run(&mut ectx, &e, "<{a:int64,b:{c:ip}}>"), "<{c:ip}>");
    }

    #[test]
    fn indexing() {
        let mut ectx = ectx();
        let idx = |i: &str| Expr::Index(field("c"), Box::new(lit(&crate::expr::testing::ectx(), i)));
        assert_eq!(run(&mut ectx, &idx("1"), "{c:[10,20,30]}"), "20");
        assert_eq!(run(&mut ectx, &idx("-1"), "{c:[10,20,30]}"), "30");
        assert_eq!(run(&mut ectx, &idx("3"), "{c:[10,20,30]}"), r#"error("missing")"#);
        assert!(run(&mut ectx, &idx("\"a\""), "{c:[10]}").contains("not an integer"));
        assert_eq!(run(&mut ectx, &idx("\"a\""), "{c:{a:1}}"), "1");
        assert_eq!(run(&mut ectx, &idx("\"k\""), r#"{c:|{"k":1,"j":2}|}"#), "1");
        assert_eq!(run(&mut ectx, &idx("1"), r#"{c:|{"k":1}|}"#), r#"error("missing")"#);
        assert_eq!(run(&mut ectx, &idx("0"), "{c:1}"), r#"error("missing")"#);
    }

    #[test]
    fn slicing() {
        let mut ectx = ectx();
        let sl = |from: Option<&str>, to: Option<&str>| {
            Expr::Slice(
                field("c"),
                from.map(|s| Box::new(lit(&crate::expr::testing::ectx(), s))),
                to.map(|s| Box::new(lit(&crate::expr::testing::ectx(), s))),
            )
        };
        assert_eq!(run(&mut ectx, &sl(Some("1"), Some("3")), r#"{c:"hello"}"#), "\"el\"");
        assert_eq!(run(&mut ectx, &sl(None, Some("-1")), r#"{c:"hello"}"#), "\"hell\"");
        assert_eq!(run(&mut ectx, &sl(Some("3"), Some("1")), r#"{c:"hello"}"#), "\"\"");
        assert_eq!(run(&mut ectx, &sl(Some("1"), Some("100")), "{c:[1,2,3]}"), "[2,3]");
        assert_eq!(run(&mut ectx, &sl(Some("1"), None), "{c:0x010203}"), "0x0203");
        assert!(run(&mut ectx, &sl(Some("1"), None), "{c:1}").starts_with("error("));
    }
}
