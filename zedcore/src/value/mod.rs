//! Values
//!
//! A [`Value`] pairs a [`Type`] with the encoded body of one instance of that
//! type. A body of `None` is null, which is a valid value of every type.
//!
//! # Ownership
//! A body is a window into a reference-counted buffer. Cloning a value or
//! materializing a child (e.g. [`Value::deref`]) shares the parent's buffer
//! without copying, so a field taken from a large batch keeps that batch
//! alive. [`Value::copy`] detaches a value onto a buffer of its own.
//!
//! # Errors as values
//! Evaluation failures are values whose type is `error(T)`. Two error values
//! are distinguished: *missing* (an absent field or element) and *quiet*
//! (dropped by enclosing constructors). Both are `error(string)` and differ
//! only by body.
use std::{fmt, net::IpAddr};

use bytes::Bytes;
use ipnetwork::IpNetwork;

use crate::{
    encoding::{self, Builder, Iter, integer::append_counted_uvarint},
    error::{ZedError, ZedResult},
    types::{PrimitiveId, Type, TypeDef},
};

pub mod compare;
pub mod construct;
pub mod primitive;
pub mod walk;

pub use compare::compare_values;
pub use walk::{WalkSignal, walk};

use primitive::*;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Value {
    ty: Type,
    bytes: Option<Bytes>,
}

/// Body of a union value selecting member `tag`.
pub fn union_body(tag: usize, payload: Option<&[u8]>, container: bool) -> Vec<u8> {
    let mut selector = Vec::new();
    append_counted_uvarint(&mut selector, tag as u64);
    let mut b = Builder::new();
    b.append_primitive(Some(&selector));
    b.append(payload, container);
    b.bytes().to_vec()
}

impl Value {
    pub fn new(ty: Type, bytes: Option<Vec<u8>>) -> Self {
        Self::shared(ty, bytes.map(Bytes::from))
    }

    /// A value over an existing buffer; nothing is copied.
    pub fn shared(ty: Type, bytes: Option<Bytes>) -> Self {
        Self { ty, bytes }
    }

    /// Copies `bytes` into a buffer owned by the new value.
    pub fn from_slice(ty: Type, bytes: Option<&[u8]>) -> Self {
        Self::shared(ty, bytes.map(Bytes::copy_from_slice))
    }

    pub fn null() -> Self {
        Self::new(Type::null(), None)
    }

    pub fn null_of(ty: Type) -> Self {
        Self::new(ty, None)
    }

    pub fn bool(v: bool) -> Self {
        Self::new(Type::bool(), Some(encode_bool(v)))
    }

    pub fn int64(v: i64) -> Self {
        Self::int(Type::int64(), v)
    }

    pub fn uint64(v: u64) -> Self {
        Self::uint(Type::uint64(), v)
    }

    pub fn float64(v: f64) -> Self {
        Self::new(Type::float64(), Some(encode_float(PrimitiveId::Float64, v)))
    }

    pub fn string(s: &str) -> Self {
        Self::new(Type::string(), Some(s.as_bytes().to_vec()))
    }

    pub fn bytes_value(b: &[u8]) -> Self {
        Self::new(Type::bytes(), Some(b.to_vec()))
    }

    pub fn ip(ip: IpAddr) -> Self {
        Self::new(Type::ip(), Some(encode_ip(ip)))
    }

    pub fn net(net: IpNetwork) -> Self {
        Self::new(Type::net(), Some(encode_net(net)))
    }

    pub fn duration(ns: i64) -> Self {
        Self::int(Type::duration(), ns)
    }

    pub fn time(ns: i64) -> Self {
        Self::int(Type::time(), ns)
    }

    /// A signed integer (or duration/time) of type `ty`.
    pub fn int(ty: Type, v: i64) -> Self {
        Self::new(ty, Some(encode_int(v)))
    }

    pub fn uint(ty: Type, v: u64) -> Self {
        Self::new(ty, Some(encode_uint(v)))
    }

    /// A float of type `ty`, encoded at that type's width.
    pub fn float(ty: Type, v: f64) -> Self {
        let id = ty.primitive_id().unwrap_or(PrimitiveId::Float64);
        Self::new(ty, Some(encode_float(id, v)))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    pub fn into_parts(self) -> (Type, Option<Bytes>) {
        (self.ty, self.bytes)
    }

    /// This body under another type.
    pub fn retype(&self, ty: Type) -> Self {
        Self::shared(ty, self.bytes.clone())
    }

    /// A value of type `ty` over `body`, which is normally a slice of this
    /// value's body and then shares its buffer. Any other slice is copied.
    pub fn child(&self, ty: Type, body: Option<&[u8]>) -> Self {
        let bytes = match (&self.bytes, body) {
            (Some(buf), Some(sub)) if contains(buf, sub) => Some(buf.slice_ref(sub)),
            (_, sub) => sub.map(Bytes::copy_from_slice),
        };
        Self::shared(ty, bytes)
    }

    /// Deep copy onto a buffer of its own, releasing whatever larger buffer
    /// this value's body points into.
    pub fn copy(&self) -> Self {
        Self::from_slice(self.ty.clone(), self.bytes())
    }

    /// Whether `other`'s body lives in the same buffer as this one's.
    pub fn shares_body_with(&self, other: &Value) -> bool {
        match (&self.bytes, &other.bytes) {
            (Some(a), Some(b)) if !b.is_empty() => contains(a, b) || contains(b, a),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.ty.is_error()
    }

    fn is_string_error(&self, msg: &str) -> bool {
        self.ty
            .error_inner()
            .is_some_and(|inner| inner.is(PrimitiveId::String))
            && self.bytes() == Some(msg.as_bytes())
    }

    pub fn is_missing(&self) -> bool {
        self.is_string_error("missing")
    }

    pub fn is_quiet(&self) -> bool {
        self.is_string_error("quiet")
    }

    fn body(&self) -> &[u8] {
        self.bytes().unwrap_or_default()
    }

    pub fn as_bool(&self) -> bool {
        decode_bool(self.body())
    }

    /// Signed interpretation of any numeric body.
    pub fn as_int(&self) -> i64 {
        match self.ty.primitive_id() {
            Some(p) if p.is_signed() => decode_int(self.body()),
            Some(p) if p.is_unsigned() => decode_uint(self.body()) as i64,
            Some(p) if p.is_float() => decode_float(self.body()) as i64,
            _ => 0,
        }
    }

    pub fn as_uint(&self) -> u64 {
        match self.ty.primitive_id() {
            Some(p) if p.is_unsigned() => decode_uint(self.body()),
            Some(p) if p.is_signed() => decode_int(self.body()) as u64,
            Some(p) if p.is_float() => decode_float(self.body()) as u64,
            _ => 0,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self.ty.primitive_id() {
            Some(p) if p.is_float() => decode_float(self.body()),
            Some(p) if p.is_signed() => decode_int(self.body()) as f64,
            Some(p) if p.is_unsigned() => decode_uint(self.body()) as f64,
            _ => 0.0,
        }
    }

    /// The body as UTF-8; invalid or absent bodies read as `""`.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.body()).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.body()
    }

    pub fn as_ip(&self) -> Option<IpAddr> {
        decode_ip(self.bytes()?).ok()
    }

    pub fn as_net(&self) -> Option<IpNetwork> {
        decode_net(self.bytes()?).ok()
    }

    pub fn as_duration(&self) -> i64 {
        decode_int(self.body())
    }

    pub fn as_time(&self) -> i64 {
        decode_int(self.body())
    }

    /// Symbol of an enum value.
    pub fn as_enum_symbol(&self) -> Option<&str> {
        let symbols = self.ty.symbols()?;
        let idx = decode_uint(self.bytes()?) as usize;
        symbols.get(idx).map(String::as_str)
    }

    /// Iterator over the elements of a container body (empty when null).
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self.body())
    }

    /// Strip named and union layers, yielding the selected member value.
    pub fn under(&self) -> Value {
        let mut v = self.clone();
        loop {
            match v.ty.def() {
                TypeDef::Named(_, under) => v.ty = under.clone(),
                TypeDef::Union(members) => {
                    let Some(body) = v.bytes() else {
                        return Value::null_of(v.ty.under().clone());
                    };
                    let mut it = Iter::new(body);
                    let tag = match it.next() {
                        Some(Ok(e)) => decode_uint(e.body.unwrap_or_default()) as usize,
                        _ => return v,
                    };
                    let (Some(member), Some(Ok(payload))) = (members.get(tag), it.next()) else {
                        return v;
                    };
                    v = v.child(member.clone(), payload.body);
                }
                _ => return v,
            }
        }
    }

    /// Record field `name`, or `None` if this is not a record or lacks it.
    pub fn deref(&self, name: &str) -> Option<Value> {
        let v = self.under();
        let idx = v.ty.index_of_field(name)?;
        let fields = v.ty.fields()?;
        let Some(body) = v.bytes() else {
            return Some(Value::null_of(fields[idx].ty.clone()));
        };
        let elem = encoding::nth(body, idx).ok()??;
        Some(v.child(fields[idx].ty.clone(), elem.body))
    }

    /// Follow a dotted path of record fields.
    pub fn deref_path<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        let mut v = self.clone();
        for name in path {
            v = v.deref(name.as_ref())?;
        }
        Some(v)
    }

    /// Elements of an array or set.
    pub fn elements(&self) -> ZedResult<Vec<Value>> {
        let v = self.under();
        let inner = v.ty.inner().ok_or(ZedError::NotContainer)?.clone();
        v.iter()
            .map(|e| e.map(|e| v.child(inner.clone(), e.body)))
            .collect()
    }

    /// Key/value pairs of a map.
    pub fn entries(&self) -> ZedResult<Vec<(Value, Value)>> {
        let v = self.under();
        let TypeDef::Map(kt, vt) = v.ty.def() else {
            return Err(ZedError::NotContainer);
        };
        let elems: Vec<_> = v.iter().collect::<ZedResult<_>>()?;
        if elems.len() % 2 != 0 {
            return Err(ZedError::MalformedBytes("map body has a key without a value"));
        }
        Ok(elems
            .chunks(2)
            .map(|kv| {
                (
                    v.child(kt.clone(), kv[0].body),
                    v.child(vt.clone(), kv[1].body),
                )
            })
            .collect())
    }

    /// Record fields paired with their values.
    pub fn fields(&self) -> ZedResult<Vec<(String, Value)>> {
        let v = self.under();
        let fields = v.ty.fields().ok_or(ZedError::NotContainer)?;
        if v.is_null() {
            return Ok(fields
                .iter()
                .map(|f| (f.name.clone(), Value::null_of(f.ty.clone())))
                .collect());
        }
        let mut out = Vec::with_capacity(fields.len());
        let mut it = v.iter();
        for f in fields {
            let body = match it.next() {
                Some(e) => e?.body,
                None => None,
            };
            out.push((f.name.clone(), v.child(f.ty.clone(), body)));
        }
        if !it.done() {
            return Err(ZedError::ExtraField {
                fields: fields.len(),
            });
        }
        Ok(out)
    }

    /// Number of elements of an array or set, entries of a map, or fields of
    /// a record.
    pub fn container_length(&self) -> ZedResult<usize> {
        let v = self.under();
        match v.ty.def() {
            TypeDef::Array(_) | TypeDef::Set(_) => encoding::count(v.body()),
            TypeDef::Map(_, _) => Ok(encoding::count(v.body())? / 2),
            TypeDef::Record(fields) => Ok(fields.len()),
            _ => Err(ZedError::NotContainer),
        }
    }

    /// Depth-first traversal of this value; see [`walk`].
    pub fn walk<F>(&self, visit: &mut F) -> ZedResult<bool>
    where
        F: FnMut(&Type, Option<&[u8]>) -> ZedResult<WalkSignal>,
    {
        walk(&self.ty, self.bytes(), visit)
    }
}

fn contains(buf: &[u8], sub: &[u8]) -> bool {
    let (outer, inner) = (buf.as_ptr_range(), sub.as_ptr_range());
    outer.start <= inner.start && inner.end <= outer.end
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::zson::format::write_value(f, self)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, TypeContext};

    fn record(ctx: &TypeContext) -> Value {
        let ty = ctx
            .lookup_type_record(vec![
                Field::new("a", Type::int64()),
                Field::new("s", Type::string()),
            ])
            .unwrap();
        let mut b = Builder::new();
        b.append_primitive(Some(&encode_int(7)));
        b.append_primitive(None);
        Value::new(ty, Some(b.finish().unwrap()))
    }

    #[test]
    fn deref_fields() {
        let ctx = TypeContext::new();
        let rec = record(&ctx);
        assert_eq!(rec.deref("a").unwrap().as_int(), 7);
        assert!(rec.deref("s").unwrap().is_null());
        assert!(rec.deref("zz").is_none());
        assert_eq!(rec.container_length().unwrap(), 2);
        let names: Vec<_> = rec.fields().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "s"]);
    }

    #[test]
    fn children_share_the_parent_buffer() {
        let ctx = TypeContext::new();
        let rec = record(&ctx);
        let a = rec.deref("a").unwrap();
        assert!(a.shares_body_with(&rec));
        assert!(rec.clone().shares_body_with(&rec));

        let detached = a.copy();
        assert_eq!(detached, a);
        assert!(!detached.shares_body_with(&rec));

        let foreign = rec.child(Type::int64(), Some(encode_int(9).as_slice()));
        assert!(!foreign.shares_body_with(&rec));
        assert_eq!(foreign.as_int(), 9);
    }

    #[test]
    fn union_under() {
        let ctx = TypeContext::new();
        let u = ctx
            .lookup_type_union(vec![Type::int64(), Type::string()])
            .unwrap();
        let tag = u.tag_of(&Type::string()).unwrap();
        let v = Value::new(u, Some(union_body(tag, Some(b"hi"), false)));
        let under = v.under();
        assert_eq!(under.ty(), &Type::string());
        assert_eq!(under.as_str(), "hi");
    }

    #[test]
    fn elements_of_array() {
        let ctx = TypeContext::new();
        let mut b = Builder::new();
        for i in 1..=3 {
            b.append_primitive(Some(&encode_int(i)));
        }
        let arr = Value::new(ctx.lookup_type_array(Type::int64()), Some(b.finish().unwrap()));
        let ints: Vec<_> = arr.elements().unwrap().iter().map(Value::as_int).collect();
        assert_eq!(ints, vec![1, 2, 3]);
        assert_eq!(arr.container_length().unwrap(), 3);
        assert!(Value::int64(1).elements().unwrap_err().is_not_container());
    }

    #[test]
    fn numeric_accessors() {
        assert_eq!(Value::uint64(5).as_int(), 5);
        assert_eq!(Value::float64(2.5).as_float(), 2.5);
        assert_eq!(Value::int64(-3).as_float(), -3.0);
        assert!(Value::bool(true).as_bool());
        assert_eq!(Value::string("x").as_str(), "x");
        assert_eq!(Value::null().as_str(), "");
    }
}
