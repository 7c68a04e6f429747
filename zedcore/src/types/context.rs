use std::{collections::HashMap, fmt::Display};

use log::debug;
use parking_lot::RwLock;

use crate::{
    encoding::Builder,
    error::{ZedError, ZedResult},
    magic::FIRST_STRUCTURAL_ID,
    types::{Field, PrimitiveId, Type, TypeDef, compare_types, tv},
    value::Value,
};

#[derive(Debug, Default)]
struct Inner {
    by_key: HashMap<Vec<u8>, Type>,
    by_id: Vec<Type>,
    named: HashMap<String, Type>,
}

impl Inner {
    /// A known named type whose name currently points at another binding.
    fn needs_rebind(&self, ty: &Type) -> bool {
        match ty.def() {
            TypeDef::Named(name, _) => self.named.get(name) != Some(ty),
            _ => false,
        }
    }
}

/// Interner of structural types.
///
/// Interning is keyed by the canonical type value of the structure (see
/// [`tv`]), so two lookups describing the same shape return the same
/// [`Type`] handle and the same ID. The context is append-only: types are
/// never removed and IDs are never reused.
///
/// ```rust
/// # use zedcore::types::{Field, Type, TypeContext};
/// let ctx = TypeContext::new();
/// let a = ctx.lookup_type_record(vec![Field::new("x", Type::int64())]).unwrap();
/// let b = ctx.lookup_type_record(vec![Field::new("x", Type::int64())]).unwrap();
/// assert_eq!(a, b);
/// assert!(a.id() >= 32);
/// ```
///
/// # A note on concurrency
/// The context is shared between threads. Lookups of already-known shapes
/// only take a read lock; inserting a new shape (or rebinding a name) takes
/// the write lock and looks again, so insertions are serialized while
/// readers proceed concurrently.
#[derive(Debug)]
pub struct TypeContext {
    inner: RwLock<Inner>,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of structural types interned so far (named types excluded).
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn intern(&self, def: TypeDef) -> Type {
        if let TypeDef::Primitive(p) = def {
            return Type::primitive(p);
        }
        let mut key = Vec::new();
        tv::append_def(&mut key, &def);

        {
            let inner = self.inner.read();
            if let Some(ty) = inner.by_key.get(&key)
                && !inner.needs_rebind(ty)
            {
                return ty.clone();
            }
        }

        let mut inner = self.inner.write();
        if let Some(ty) = inner.by_key.get(&key).cloned() {
            if inner.needs_rebind(&ty)
                && let Some(name) = ty.name()
            {
                debug!("Rebinding named type {} to {}", name, ty);
                inner.named.insert(name.to_string(), ty.clone());
            }
            return ty;
        }

        let id = match &def {
            TypeDef::Named(_, under) => under.id(),
            _ => FIRST_STRUCTURAL_ID + inner.by_id.len() as u32,
        };
        let ty = Type::new_structural(id, def);
        match ty.def() {
            TypeDef::Named(name, _) => {
                inner.named.insert(name.clone(), ty.clone());
            }
            _ => inner.by_id.push(ty.clone()),
        }
        debug!("New type encountered {} (id {})", ty, id);
        inner.by_key.insert(key, ty.clone());
        ty
    }

    /// Resolve a numeric ID to its type.
    pub fn lookup_type(&self, id: u32) -> ZedResult<Type> {
        if id < FIRST_STRUCTURAL_ID {
            return Type::lookup_primitive(id).ok_or(ZedError::UnknownTypeId(id));
        }
        self.inner
            .read()
            .by_id
            .get((id - FIRST_STRUCTURAL_ID) as usize)
            .cloned()
            .ok_or(ZedError::UnknownTypeId(id))
    }

    pub fn lookup_primitive_by_id(&self, id: u32) -> Option<Type> {
        Type::lookup_primitive(id)
    }

    /// Intern a record type. Field names must be pairwise distinct.
    pub fn lookup_type_record(&self, fields: Vec<Field>) -> ZedResult<Type> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ZedError::DuplicateField {
                    name: field.name.clone(),
                });
            }
        }
        Ok(self.intern(TypeDef::Record(fields)))
    }

    pub fn lookup_type_array(&self, elem: Type) -> Type {
        self.intern(TypeDef::Array(elem))
    }

    pub fn lookup_type_set(&self, elem: Type) -> Type {
        self.intern(TypeDef::Set(elem))
    }

    pub fn lookup_type_map(&self, key: Type, val: Type) -> Type {
        self.intern(TypeDef::Map(key, val))
    }

    /// Intern a union. Members are sorted into canonical order and
    /// deduplicated first, so member order does not affect identity.
    pub fn lookup_type_union(&self, mut members: Vec<Type>) -> ZedResult<Type> {
        members.sort_by(compare_types);
        members.dedup();
        if members.is_empty() {
            return Err(ZedError::MalformedTypeValue(
                "union type with no members".to_string(),
            ));
        }
        Ok(self.intern(TypeDef::Union(members)))
    }

    pub fn lookup_type_enum(&self, symbols: Vec<String>) -> Type {
        self.intern(TypeDef::Enum(symbols))
    }

    pub fn lookup_type_error(&self, inner: Type) -> Type {
        self.intern(TypeDef::Error(inner))
    }

    /// Bind `name` to `under`. Rebinding a name makes later name lookups
    /// resolve to the new definition; earlier handles stay valid.
    pub fn lookup_type_named(&self, name: &str, under: Type) -> ZedResult<Type> {
        if name.is_empty() || name.parse::<PrimitiveId>().is_ok() {
            return Err(ZedError::BadValue(format!(
                "'{name}' cannot be used as a type name"
            )));
        }
        Ok(self.intern(TypeDef::Named(name.to_string(), under)))
    }

    /// Resolve a primitive type name or the current binding of a named type.
    pub fn lookup_by_name(&self, name: &str) -> Option<Type> {
        if let Ok(p) = name.parse::<PrimitiveId>() {
            return Some(Type::primitive(p));
        }
        self.inner.read().named.get(name).cloned()
    }

    /// Decode a complete type value.
    pub fn lookup_by_value(&self, tv: &[u8]) -> ZedResult<Type> {
        let (ty, rest) = tv::decode(self, tv)?;
        if !rest.is_empty() {
            return Err(ZedError::MalformedTypeValue(format!(
                "{} trailing byte(s) after type value",
                rest.len()
            )));
        }
        Ok(ty)
    }

    /// Decode one type value and return the remaining bytes.
    pub fn decode_type_value<'a>(&self, tv: &'a [u8]) -> ZedResult<(Type, &'a [u8])> {
        tv::decode(self, tv)
    }

    /// A value of the `type` primitive describing `ty`.
    pub fn lookup_type_value(&self, ty: &Type) -> Value {
        Value::new(Type::typ(), Some(tv::encode(ty)))
    }

    /// `error(string)` with the given message.
    pub fn new_error(&self, msg: impl Display) -> Value {
        let ty = self.lookup_type_error(Type::string());
        Value::new(ty, Some(msg.to_string().into_bytes()))
    }

    /// The distinguished error signalling an absent field.
    pub fn missing(&self) -> Value {
        self.new_error("missing")
    }

    /// The distinguished error that enclosing constructors drop silently.
    pub fn quiet(&self) -> Value {
        self.new_error("quiet")
    }

    /// `error({message: string, on: T})` carrying the offending value.
    pub fn wrap_error(&self, msg: impl Display, on: &Value) -> Value {
        let rec = self.lookup_type_record(vec![
            Field::new("message", Type::string()),
            Field::new("on", on.ty().clone()),
        ]);
        let Ok(rec) = rec else {
            return self.new_error(msg);
        };
        let mut b = Builder::new();
        b.append_primitive(Some(msg.to_string().as_bytes()));
        b.append(on.bytes(), on.ty().is_container());
        let body = b.finish().unwrap_or_default();
        Value::new(self.lookup_type_error(rec), Some(body))
    }

    /// Wrap an arbitrary value as an error of its type.
    pub fn error_of(&self, v: &Value) -> Value {
        Value::new(self.lookup_type_error(v.ty().clone()), v.bytes().map(<[u8]>::to_vec))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, thread, time::Duration};

    use super::*;

    #[test]
    fn threads_intern_the_same_type() {
        let ctx = TypeContext::new();
        let fields = || vec![Field::new("a", Type::int64()), Field::new("b", Type::string())];
        let types: Vec<Type> = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| (0..200).map(|_| ctx.lookup_type_record(fields()).unwrap()).last()))
                .collect();
            handles.into_iter().filter_map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(types.len(), 16);
        assert!(types.iter().all(|t| *t == types[0]));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn known_types_resolve_while_the_lock_is_shared() {
        let ctx = TypeContext::new();
        let arr = ctx.lookup_type_array(Type::int64());
        let guard = ctx.inner.upgradable_read();
        let (tx, rx) = mpsc::channel();
        thread::scope(|s| {
            s.spawn(|| tx.send(ctx.lookup_type_array(Type::int64())).unwrap());
            let got = rx.recv_timeout(Duration::from_secs(5));
            drop(guard);
            assert_eq!(got.ok(), Some(arr));
        });
    }

    #[test]
    fn ids_are_stable_and_dense() {
        let ctx = TypeContext::new();
        let a = ctx.lookup_type_array(Type::int64());
        let s = ctx.lookup_type_set(Type::int64());
        assert_eq!(a.id(), 32);
        assert_eq!(s.id(), 33);
        assert_eq!(ctx.lookup_type_array(Type::int64()).id(), 32);
        assert_eq!(ctx.lookup_type(33).unwrap(), s);
        assert!(ctx.lookup_type(99).unwrap_err().is_unknown_type_id());
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let ctx = TypeContext::new();
        let err = ctx
            .lookup_type_record(vec![
                Field::new("a", Type::int64()),
                Field::new("a", Type::string()),
            ])
            .unwrap_err();
        assert!(matches!(err, ZedError::DuplicateField { name } if name == "a"));
    }

    #[test]
    fn union_is_order_independent() {
        let ctx = TypeContext::new();
        let u1 = ctx
            .lookup_type_union(vec![Type::string(), Type::int64()])
            .unwrap();
        let u2 = ctx
            .lookup_type_union(vec![Type::int64(), Type::string(), Type::int64()])
            .unwrap();
        assert_eq!(u1, u2);
        assert_eq!(u1.members().unwrap().len(), 2);
    }

    #[test]
    fn named_types_share_id_but_not_identity() {
        let ctx = TypeContext::new();
        let port = ctx
            .lookup_type_named("port", Type::primitive(PrimitiveId::Uint16))
            .unwrap();
        assert_eq!(port.id(), PrimitiveId::Uint16 as u32);
        assert_ne!(port, Type::primitive(PrimitiveId::Uint16));
        assert_eq!(ctx.lookup_by_name("port"), Some(port.clone()));

        let rebound = ctx.lookup_type_named("port", Type::string()).unwrap();
        assert_eq!(ctx.lookup_by_name("port"), Some(rebound));
        // rebinding back returns the original handle
        let again = ctx
            .lookup_type_named("port", Type::primitive(PrimitiveId::Uint16))
            .unwrap();
        assert_eq!(again, port);
        assert_eq!(ctx.lookup_by_name("port"), Some(port));
    }

    #[test]
    fn primitive_names_cannot_be_bound() {
        let ctx = TypeContext::new();
        assert!(ctx.lookup_type_named("int64", Type::string()).is_err());
    }

    #[test]
    fn type_value_roundtrip() {
        let ctx = TypeContext::new();
        let inner = ctx
            .lookup_type_record(vec![
                Field::new("k", Type::string()),
                Field::new("v", ctx.lookup_type_map(Type::string(), Type::float64())),
            ])
            .unwrap();
        let ty = ctx.lookup_type_union(vec![
            ctx.lookup_type_array(inner),
            ctx.lookup_type_enum(vec!["a".into(), "b".into()]),
            ctx.lookup_type_error(Type::string()),
        ]);
        let ty = ctx.lookup_type_named("thing", ty.unwrap()).unwrap();
        let val = ctx.lookup_type_value(&ty);
        assert_eq!(ctx.lookup_by_value(val.bytes().unwrap()).unwrap(), ty);

        let other = TypeContext::new();
        let copied = other.lookup_by_value(val.bytes().unwrap()).unwrap();
        assert_eq!(copied.to_string(), ty.to_string());
    }

    #[test]
    fn missing_and_quiet() {
        let ctx = TypeContext::new();
        assert!(ctx.missing().is_missing());
        assert!(ctx.quiet().is_quiet());
        assert!(!ctx.quiet().is_missing());
        assert!(ctx.new_error("boom").is_error());
    }

    #[test]
    fn wrap_error_carries_value() {
        let ctx = TypeContext::new();
        let v = Value::int64(7);
        let err = ctx.wrap_error("bad", &v);
        let inner = err.ty().error_inner().unwrap();
        assert_eq!(inner.fields().unwrap()[1].ty, Type::int64());
        assert_eq!(err.to_string(), r#"error({message:"bad",on:7})"#);
    }
}
