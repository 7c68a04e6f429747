//! Containers built from already-typed values.
//!
//! The element type of a container assembled from values is inferred: the
//! single non-null type of its elements, the union of the distinct non-null
//! types, or `null` when there are none. Elements whose type differs from a
//! union element type are wrapped with their member tag.
use crate::{
    encoding::{
        Builder,
        normalize::{normalize_map, normalize_set},
    },
    error::{ZedError, ZedResult},
    types::{Type, TypeContext},
    value::{Value, union_body},
};

/// Element type of a container holding `values`.
pub fn element_type(ctx: &TypeContext, values: &[Value]) -> ZedResult<Type> {
    let mut types: Vec<Type> = Vec::new();
    for v in values {
        if !v.ty().is_null() && !types.contains(v.ty()) {
            types.push(v.ty().clone());
        }
    }
    match types.len() {
        0 => Ok(Type::null()),
        1 => Ok(types.remove(0)),
        _ => ctx.lookup_type_union(types),
    }
}

/// Append `v` as an element of a container whose element type is `inner`.
pub fn append_element(b: &mut Builder, inner: &Type, v: &Value) -> ZedResult<()> {
    if v.is_null() || v.ty() == inner {
        b.append(v.bytes(), inner.is_container());
        return Ok(());
    }
    let tag = inner.tag_of(v.ty()).ok_or_else(|| {
        ZedError::BadValue(format!("{} is not a member of {}", v.ty(), inner))
    })?;
    let body = union_body(tag, v.bytes(), v.ty().is_container());
    b.append_container(Some(&body));
    Ok(())
}

/// `v` as a value of the union `ty`, selecting member `tag`.
pub fn wrap_union(ty: &Type, tag: usize, v: &Value) -> Value {
    if v.is_null() {
        return Value::null_of(ty.clone());
    }
    Value::new(
        ty.clone(),
        Some(union_body(tag, v.bytes(), v.ty().is_container())),
    )
}

fn body_of(inner: &Type, values: &[Value]) -> ZedResult<Vec<u8>> {
    let mut b = Builder::new();
    for v in values {
        append_element(&mut b, inner, v)?;
    }
    b.finish()
}

pub fn array_of(ctx: &TypeContext, values: &[Value]) -> ZedResult<Value> {
    let inner = element_type(ctx, values)?;
    let body = body_of(&inner, values)?;
    Ok(Value::new(ctx.lookup_type_array(inner), Some(body)))
}

/// A set of `values`, sorted and without duplicates.
pub fn set_of(ctx: &TypeContext, values: &[Value]) -> ZedResult<Value> {
    let inner = element_type(ctx, values)?;
    let body = normalize_set(&body_of(&inner, values)?)?;
    Ok(Value::new(ctx.lookup_type_set(inner), Some(body)))
}

/// A map from `keys[i]` to `vals[i]`. Later entries win for repeated keys.
pub fn map_of(ctx: &TypeContext, keys: &[Value], vals: &[Value]) -> ZedResult<Value> {
    let kt = element_type(ctx, keys)?;
    let vt = element_type(ctx, vals)?;
    let mut b = Builder::new();
    for (k, v) in keys.iter().zip(vals) {
        append_element(&mut b, &kt, k)?;
        append_element(&mut b, &vt, v)?;
    }
    let body = normalize_map(&b.finish()?)?;
    Ok(Value::new(ctx.lookup_type_map(kt, vt), Some(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_array_has_null_elements() {
        let ctx = TypeContext::new();
        let v = array_of(&ctx, &[]).unwrap();
        assert_eq!(v.ty().to_string(), "[null]");
        assert_eq!(v.bytes(), Some(&[][..]));
    }

    #[test]
    fn mixed_elements_form_a_union() {
        let ctx = TypeContext::new();
        let v = array_of(&ctx, &[Value::int64(1), Value::null(), Value::string("a")]).unwrap();
        assert_eq!(v.ty().to_string(), "[(int64,string)]");
        let elems = v.elements().unwrap();
        assert_eq!(elems[0].under(), Value::int64(1));
        assert!(elems[1].is_null());
        assert_eq!(elems[2].under().as_str(), "a");
    }

    #[test]
    fn sets_dedup() {
        let ctx = TypeContext::new();
        let v = set_of(&ctx, &[Value::int64(2), Value::int64(1), Value::int64(2)]).unwrap();
        assert_eq!(v.container_length().unwrap(), 2);
        assert_eq!(v.elements().unwrap()[0], Value::int64(1));
    }
}
