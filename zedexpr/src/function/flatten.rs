//! `flatten`, `unflatten` and `nest_dotted`.
//!
//! `flatten` lists the leaves of a record as `{key:[string],value:U}`
//! entries, `U` being the union of the leaf types (or the leaf type itself
//! when there is only one). `unflatten` rebuilds the record from such a
//! list, and `nest_dotted` turns top-level names like `"a.b"` into nested
//! records. All three remember the output type per input type.
use std::collections::HashMap;

use parking_lot::Mutex;
use zedcore::{
    encoding::Builder,
    error::{ZedError, ZedResult},
    record::RecordTree,
    types::{Field, PrimitiveId, Type, TypeContext, TypeDef},
    value::{Value, construct::append_element},
};

use crate::{expr::EvalContext, function::fail_on};

/// Whether `flatten` descends into values of type `ty`. Empty records are
/// leaves.
fn is_branch(ty: &Type) -> bool {
    ty.fields().is_some_and(|f| !f.is_empty())
}

fn leaf_types(ty: &Type, out: &mut Vec<Type>) {
    for f in ty.fields().unwrap_or_default() {
        if is_branch(&f.ty) {
            leaf_types(&f.ty, out);
        } else if !f.ty.is_null() && !out.contains(&f.ty) {
            out.push(f.ty.clone());
        }
    }
}

fn leaves(rec: &Value, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, Value)>) -> ZedResult<()> {
    for (name, v) in rec.fields()? {
        prefix.push(name);
        if is_branch(v.ty()) {
            leaves(&v, prefix, out)?;
        } else {
            out.push((prefix.clone(), v));
        }
        prefix.pop();
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct FlatShape {
    value: Type,
    array: Type,
}

impl FlatShape {
    fn of(zctx: &TypeContext, ty: &Type) -> ZedResult<Self> {
        let mut types = Vec::new();
        leaf_types(ty, &mut types);
        let value = match types.len() {
            0 => Type::null(),
            1 => types.remove(0),
            _ => zctx.lookup_type_union(types)?,
        };
        let entry = zctx.lookup_type_record(vec![
            Field::new("key", zctx.lookup_type_array(Type::string())),
            Field::new("value", value.clone()),
        ])?;
        Ok(Self {
            value,
            array: zctx.lookup_type_array(entry),
        })
    }
}

#[derive(Debug, Default)]
pub struct Flattener {
    shapes: Mutex<HashMap<Type, FlatShape>>,
}

impl Flattener {
    pub fn apply(&self, ectx: &EvalContext, v: &Value) -> Value {
        if v.is_error() {
            return v.clone();
        }
        let rec = v.under();
        if !rec.ty().is_record() {
            return fail_on(ectx, "flatten", "not a record", v);
        }
        self.flatten(ectx.zctx(), &rec)
            .unwrap_or_else(|e| fail_on(ectx, "flatten", e, v))
    }

    fn flatten(&self, zctx: &TypeContext, rec: &Value) -> ZedResult<Value> {
        let cached = self.shapes.lock().get(rec.ty()).cloned();
        let shape = match cached {
            Some(shape) => shape,
            None => {
                let shape = FlatShape::of(zctx, rec.ty())?;
                self.shapes.lock().insert(rec.ty().clone(), shape.clone());
                shape
            }
        };
        let mut found = Vec::new();
        leaves(rec, &mut Vec::new(), &mut found)?;
        let mut b = Builder::new();
        for (path, leaf) in found {
            let mut key = Builder::new();
            for name in &path {
                key.append_primitive(Some(name.as_bytes()));
            }
            let mut entry = Builder::new();
            entry.append_container(Some(&key.finish()?));
            append_element(&mut entry, &shape.value, &leaf)?;
            b.append_container(Some(&entry.finish()?));
        }
        Ok(Value::new(shape.array, Some(b.finish()?)))
    }
}

/// Where the key and value of an `unflatten` entry type live.
#[derive(Debug, Clone, Copy)]
struct EntryLayout {
    key: usize,
    value: usize,
    dotted: bool,
}

impl EntryLayout {
    /// `Ok(None)` for element types that are not entries; these are skipped.
    fn of(ty: &Type) -> Result<Option<Self>, String> {
        let Some(fields) = ty.fields().filter(|f| f.len() == 2) else {
            return Ok(None);
        };
        let (Some(key), Some(value)) = (ty.index_of_field("key"), ty.index_of_field("value")) else {
            return Ok(None);
        };
        let kt = &fields[key].ty;
        let dotted = match kt.under().def() {
            TypeDef::Primitive(PrimitiveId::String) => false,
            TypeDef::Array(inner) if inner.is(PrimitiveId::String) => true,
            _ => {
                return Err(format!(
                    "invalid key type {kt}: expected either string or [string]"
                ));
            }
        };
        Ok(Some(Self { key, value, dotted }))
    }
}

#[derive(Debug, Default)]
pub struct Unflattener {
    layouts: Mutex<HashMap<Type, Result<Option<EntryLayout>, String>>>,
}

impl Unflattener {
    pub fn apply(&self, ectx: &EvalContext, v: &Value) -> Value {
        if !matches!(v.ty().under().def(), TypeDef::Array(_)) || v.is_null() {
            return v.clone();
        }
        let elems = match v.elements() {
            Ok(elems) => elems,
            Err(e) => return fail_on(ectx, "unflatten", e, v),
        };
        let mut tree = RecordTree::new();
        for elem in elems {
            let elem = untag(elem);
            let layout = self
                .layouts
                .lock()
                .entry(elem.ty().clone())
                .or_insert_with(|| EntryLayout::of(elem.ty()))
                .clone();
            let layout = match layout {
                Ok(Some(layout)) => layout,
                Ok(None) => continue,
                Err(msg) => return fail_on(ectx, "unflatten", msg, &elem),
            };
            if let Err(e) = insert_entry(&mut tree, &elem, layout) {
                return fail_on(ectx, "unflatten", e, v);
            }
        }
        tree.build(ectx.zctx())
            .unwrap_or_else(|e| fail_on(ectx, "unflatten", e, v))
    }
}

/// The member value of a union value; other values as they are.
fn untag(v: Value) -> Value {
    if v.ty().def().is_union() { v.under() } else { v }
}

fn insert_entry(tree: &mut RecordTree, elem: &Value, layout: EntryLayout) -> ZedResult<()> {
    let fields = elem.fields()?;
    let (key, value) = (&fields[layout.key].1, &fields[layout.value].1);
    let path: Vec<String> = if layout.dotted {
        key.elements()?
            .iter()
            .map(|k| k.as_str().to_string())
            .collect()
    } else {
        vec![key.as_str().to_string()]
    };
    if path.is_empty() || key.is_null() {
        return Err(ZedError::BadValue("entry key is empty".into()));
    }
    tree.insert(&path, untag(value.clone()), true)
}

/// Nests records along the dots of top-level field names.
#[derive(Debug, Default)]
pub struct DottedNester {
    /// Output type per input type; `None` when no name has a dot.
    shapes: Mutex<HashMap<Type, Option<Type>>>,
}

impl DottedNester {
    pub fn apply(&self, ectx: &EvalContext, v: &Value) -> Value {
        let rec = v.under();
        let Some(fields) = rec.ty().fields() else {
            return v.clone();
        };
        let cached = self.shapes.lock().get(rec.ty()).cloned();
        if matches!(cached, Some(None)) || (cached.is_none() && !fields.iter().any(|f| f.name.contains('.'))) {
            self.shapes.lock().insert(rec.ty().clone(), None);
            return v.clone();
        }
        let tree = match nest(&rec) {
            Ok(tree) => tree,
            Err(e) => return fail_on(ectx, "nest_dotted", e, v),
        };
        let out = match cached.flatten() {
            Some(ty) => tree.body().map(|body| Value::new(ty, Some(body))),
            None => tree.build(ectx.zctx()).inspect(|out| {
                self.shapes.lock().insert(rec.ty().clone(), Some(out.ty().clone()));
            }),
        };
        out.unwrap_or_else(|e| fail_on(ectx, "nest_dotted", e, v))
    }
}

fn nest(rec: &Value) -> ZedResult<RecordTree> {
    let mut tree = RecordTree::new();
    for (name, v) in rec.fields()? {
        let path: Vec<&str> = name.split('.').collect();
        tree.insert(&path, v, false)?;
    }
    Ok(tree)
}
