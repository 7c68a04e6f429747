//! Shaping values to a target type.
//!
//! A [`Shaper`] conforms its input to a target type with any combination of
//! [`ShaperFlags`]. For each (target, input type) pair a [`Step`] plan is
//! computed once and cached; applying a plan to a value only walks its body.
//!
//! Record plans follow these rules:
//! - with `ORDER`, fields appear in target order and input fields unknown to
//!   the target follow in lexicographic order; without it, input order is
//!   kept and filled fields are appended;
//! - `CROP` drops input fields the target does not have;
//! - `FILL` adds target fields the input lacks as nulls;
//! - `CAST` converts leaf values, picking a union member by exact type, then
//!   underlying type, then compatible kind.
//!
//! A cast that fails leaves an error value in place, so the output record
//! type is looked up again for that value.
use std::{collections::HashMap, sync::Arc};

use bitflags::bitflags;
use parking_lot::Mutex;
use zedcore::{
    encoding::{Builder, Iter, integer::decode_counted_uvarint},
    error::ZedResult,
    types::{Field, Kind, PrimitiveId, Type, TypeContext, TypeDef},
    value::{
        Value,
        construct::{array_of, map_of, set_of, wrap_union},
    },
};

use crate::{
    cast::cast_primitive,
    expr::{EvalContext, Expr},
};

bitflags! {
    /// Transformations applied by a [`Shaper`].
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct ShaperFlags: u8 {
        /// Convert values to the target's types.
        const CAST = 1 << 0;

        /// Drop fields absent from the target.
        const CROP = 1 << 1;

        /// Add target fields absent from the input as nulls.
        const FILL = 1 << 2;

        /// Put fields in target order.
        const ORDER = 1 << 3;
    }
}

impl ShaperFlags {
    /// Flags of the shaper function called `name`.
    pub fn of_function(name: &str) -> Option<Self> {
        Some(match name {
            "cast" => Self::CAST,
            "crop" => Self::CROP,
            "fill" => Self::FILL,
            "fit" => Self::CROP | Self::FILL,
            "order" => Self::ORDER,
            "shape" => Self::all(),
            _ => return None,
        })
    }
}

/// Plan converting values of one type to another.
#[derive(Debug)]
enum Step {
    /// Reuse the body under the given type.
    Copy(Type),
    Cast(PrimitiveId, Type),
    Null(Type),
    /// Output fields, each taken from an input field index (or null).
    Record {
        out: Type,
        fields: Vec<(String, Option<usize>, Step)>,
    },
    Array {
        out: Type,
        set: bool,
        elem: Box<Step>,
    },
    Map {
        out: Type,
        key: Box<Step>,
        val: Box<Step>,
    },
    /// Convert to member `tag` of the union `out`.
    ToUnion {
        out: Type,
        tag: usize,
        member: Box<Step>,
    },
    /// One plan per member of the input union.
    FromUnion { out: Type, members: Vec<Step> },
    Fail(Type, String),
}

impl Step {
    fn out(&self) -> &Type {
        match self {
            Step::Copy(t) | Step::Cast(_, t) | Step::Null(t) | Step::Fail(t, _) => t,
            Step::Record { out, .. }
            | Step::Array { out, .. }
            | Step::Map { out, .. }
            | Step::ToUnion { out, .. }
            | Step::FromUnion { out, .. } => out,
        }
    }

    fn exec(&self, zctx: &TypeContext, v: &Value) -> Value {
        match self.try_exec(zctx, v) {
            Ok(v) => v,
            Err(e) => zctx.new_error(e),
        }
    }

    fn try_exec(&self, zctx: &TypeContext, v: &Value) -> ZedResult<Value> {
        if v.is_null() && !matches!(self, Step::Fail(..)) {
            return Ok(Value::null_of(self.out().clone()));
        }
        Ok(match self {
            Step::Copy(out) => v.retype(out.clone()),
            Step::Cast(p, out) => {
                let r = cast_primitive(zctx, v, *p);
                if r.is_error() {
                    r
                } else {
                    Value::shared(out.clone(), r.into_parts().1)
                }
            }
            Step::Null(out) => Value::null_of(out.clone()),
            Step::Record { out, fields } => {
                let input = v.fields()?;
                let values: Vec<(String, Value)> = fields
                    .iter()
                    .map(|(name, idx, step)| {
                        let fv = match idx.and_then(|i| input.get(i)) {
                            Some((_, fv)) => step.exec(zctx, fv),
                            None => Value::null_of(step.out().clone()),
                        };
                        (name.clone(), fv)
                    })
                    .collect();
                record(zctx, out, values)?
            }
            Step::Array { out, set, elem } => {
                let inner = elem.out();
                let values: Vec<Value> = v.elements()?.iter().map(|e| elem.exec(zctx, e)).collect();
                if values.iter().all(|e| e.is_null() || e.ty() == inner) {
                    let mut b = Builder::new();
                    for e in &values {
                        b.append(e.bytes(), inner.is_container());
                    }
                    let body = b.finish()?;
                    let body = if *set {
                        zedcore::encoding::normalize::normalize_set(&body)?
                    } else {
                        body
                    };
                    Value::new(out.clone(), Some(body))
                } else if *set {
                    set_of(zctx, &values)?
                } else {
                    array_of(zctx, &values)?
                }
            }
            Step::Map { out, key, val } => {
                let mut keys = Vec::new();
                let mut vals = Vec::new();
                for (k, v) in v.entries()? {
                    keys.push(key.exec(zctx, &k));
                    vals.push(val.exec(zctx, &v));
                }
                let same = keys.iter().all(|k| k.is_null() || k.ty() == key.out())
                    && vals.iter().all(|v| v.is_null() || v.ty() == val.out());
                if same {
                    let mut b = Builder::new();
                    for (k, v) in keys.iter().zip(&vals) {
                        b.append(k.bytes(), key.out().is_container());
                        b.append(v.bytes(), val.out().is_container());
                    }
                    let body = zedcore::encoding::normalize::normalize_map(&b.finish()?)?;
                    Value::new(out.clone(), Some(body))
                } else {
                    map_of(zctx, &keys, &vals)?
                }
            }
            Step::ToUnion { out, tag, member } => {
                let m = member.exec(zctx, v);
                if m.ty() == member.out() {
                    wrap_union(out, *tag, &m)
                } else {
                    m
                }
            }
            Step::FromUnion { out, members } => {
                let Some((tag, payload)) = union_member(v) else {
                    return Ok(zctx.wrap_error("malformed union value", v));
                };
                let Some(step) = members.get(tag) else {
                    return Ok(zctx.wrap_error("union tag out of range", v));
                };
                let r = step.exec(zctx, &payload);
                match out.tag_of(r.ty()) {
                    Some(t) if r.ty() != out => wrap_union(out, t, &r),
                    _ => r,
                }
            }
            Step::Fail(_, msg) => zctx.wrap_error(msg, v),
        })
    }
}

/// A record of `values`, typed `out` when the field types came out as
/// planned.
fn record(zctx: &TypeContext, out: &Type, values: Vec<(String, Value)>) -> ZedResult<Value> {
    let mut b = Builder::new();
    let mut fields = Vec::with_capacity(values.len());
    for (name, v) in values {
        b.append(v.bytes(), v.ty().is_container());
        fields.push(Field::new(name, v.ty().clone()));
    }
    let planned = out
        .under()
        .fields()
        .is_some_and(|f| f.iter().map(|f| &f.ty).eq(fields.iter().map(|f| &f.ty)));
    let ty = if planned {
        out.clone()
    } else {
        zctx.lookup_type_record(fields)?
    };
    Ok(Value::new(ty, Some(b.finish()?)))
}

/// Selected tag and payload of a non-null union value.
fn union_member(v: &Value) -> Option<(usize, Value)> {
    let members = v.ty().under().members()?;
    let mut it = Iter::new(v.bytes()?);
    let tag = decode_counted_uvarint(it.next()?.ok()?.body?) as usize;
    let payload = it.next()?.ok()?;
    Some((tag, v.child(members.get(tag)?.clone(), payload.body)))
}

fn is_number(t: &Type) -> bool {
    t.primitive_id().is_some_and(|p| p.is_number())
}

/// Member of `union` best matching `ty`: the same type, the same underlying
/// type, or a compatible kind, in that order.
fn best_union_tag(ty: &Type, union: &Type) -> Option<usize> {
    let members = union.members()?;
    if let Some(tag) = members.iter().position(|m| m == ty) {
        return Some(tag);
    }
    if let Some(tag) = members.iter().position(|m| m.under() == ty.under()) {
        return Some(tag);
    }
    let (kind, under) = (ty.kind(), ty.under());
    members.iter().position(|m| {
        let mu = m.under();
        match kind {
            Kind::Primitive => is_number(under) && is_number(mu),
            _ => mu.kind() == kind,
        }
    })
}

fn plan(zctx: &TypeContext, flags: ShaperFlags, input: &Type, target: &Type) -> ZedResult<Step> {
    if input == target {
        return Ok(Step::Copy(target.clone()));
    }
    let cast = flags.contains(ShaperFlags::CAST);
    let (iu, tu) = (input.under(), target.under());
    if iu.is_error() {
        return Ok(Step::Copy(input.clone()));
    }
    if iu.is_null() {
        return Ok(Step::Null(if cast { target } else { input }.clone()));
    }
    match (iu.def(), tu.def()) {
        (TypeDef::Record(inf), TypeDef::Record(tf)) => plan_record(zctx, flags, input, inf, target, tf),
        (TypeDef::Array(a) | TypeDef::Set(a), TypeDef::Array(b) | TypeDef::Set(b)) => {
            let elem = plan(zctx, flags, a, b)?;
            let set = if cast { tu.def().is_set() } else { iu.def().is_set() };
            let out = if cast && elem.out() == b {
                target.clone()
            } else if set {
                zctx.lookup_type_set(elem.out().clone())
            } else {
                zctx.lookup_type_array(elem.out().clone())
            };
            Ok(Step::Array {
                out,
                set,
                elem: Box::new(elem),
            })
        }
        (TypeDef::Map(ik, iv), TypeDef::Map(tk, tv)) => {
            let key = plan(zctx, flags, ik, tk)?;
            let val = plan(zctx, flags, iv, tv)?;
            let out = if key.out() == tk && val.out() == tv {
                target.clone()
            } else {
                zctx.lookup_type_map(key.out().clone(), val.out().clone())
            };
            Ok(Step::Map {
                out,
                key: Box::new(key),
                val: Box::new(val),
            })
        }
        _ if iu == tu => Ok(Step::Copy(if cast { target } else { input }.clone())),
        (TypeDef::Union(members), _) if cast => {
            let members = members
                .iter()
                .map(|m| plan(zctx, flags, m, target))
                .collect::<ZedResult<Vec<_>>>()?;
            let mut outs: Vec<Type> = Vec::new();
            for m in &members {
                if !outs.contains(m.out()) {
                    outs.push(m.out().clone());
                }
            }
            let out = match outs.len() {
                1 => outs.remove(0),
                _ => zctx.lookup_type_union(outs)?,
            };
            Ok(Step::FromUnion { out, members })
        }
        (_, TypeDef::Union(members)) if cast => match best_union_tag(input, tu) {
            Some(tag) => Ok(Step::ToUnion {
                out: target.clone(),
                tag,
                member: Box::new(plan(zctx, flags, input, &members[tag])?),
            }),
            None => Ok(Step::Fail(target.clone(), format!("cannot cast to {target}"))),
        },
        (TypeDef::Primitive(_), TypeDef::Primitive(p)) if cast => Ok(Step::Cast(*p, target.clone())),
        (TypeDef::Enum(_), TypeDef::Primitive(p)) if cast => Ok(Step::Cast(*p, target.clone())),
        _ if cast => Ok(Step::Fail(target.clone(), format!("cannot cast to {target}"))),
        _ => Ok(Step::Copy(input.clone())),
    }
}

fn plan_record(
    zctx: &TypeContext,
    flags: ShaperFlags,
    input: &Type,
    inf: &[Field],
    target: &Type,
    tf: &[Field],
) -> ZedResult<Step> {
    let crop = flags.contains(ShaperFlags::CROP);
    let fill = flags.contains(ShaperFlags::FILL);
    let index_of = |fields: &[Field], name: &str| fields.iter().position(|f| f.name == name);
    let mut fields = Vec::new();
    if flags.contains(ShaperFlags::ORDER) {
        for f in tf {
            match index_of(inf, &f.name) {
                Some(i) => fields.push((f.name.clone(), Some(i), plan(zctx, flags, &inf[i].ty, &f.ty)?)),
                None if fill => fields.push((f.name.clone(), None, Step::Null(f.ty.clone()))),
                None => {}
            }
        }
        if !crop {
            let mut extra: Vec<usize> = (0..inf.len())
                .filter(|&i| index_of(tf, &inf[i].name).is_none())
                .collect();
            extra.sort_by(|&a, &b| inf[a].name.cmp(&inf[b].name));
            for i in extra {
                fields.push((inf[i].name.clone(), Some(i), Step::Copy(inf[i].ty.clone())));
            }
        }
    } else {
        for (i, g) in inf.iter().enumerate() {
            match index_of(tf, &g.name) {
                Some(j) => fields.push((g.name.clone(), Some(i), plan(zctx, flags, &g.ty, &tf[j].ty)?)),
                None if crop => {}
                None => fields.push((g.name.clone(), Some(i), Step::Copy(g.ty.clone()))),
            }
        }
        if fill {
            for f in tf.iter().filter(|f| index_of(inf, &f.name).is_none()) {
                fields.push((f.name.clone(), None, Step::Null(f.ty.clone())));
            }
        }
    }
    let out_fields: Vec<Field> = fields
        .iter()
        .map(|(name, _, step)| Field::new(name.clone(), step.out().clone()))
        .collect();
    let rec = zctx.lookup_type_record(out_fields)?;
    let out = if &rec == target.under() {
        target.clone()
    } else if &rec == input.under() {
        input.clone()
    } else {
        rec
    };
    Ok(Step::Record { out, fields })
}

/// Conform the value of `expr` to the type given by `typ`.
///
/// When `typ` evaluates to a string instead of a type, the value is
/// retyped as the named type of that name.
#[derive(Debug)]
pub struct Shaper {
    flags: ShaperFlags,
    expr: Box<Expr>,
    typ: Box<Expr>,
    steps: Mutex<HashMap<(Type, Type), Arc<Step>>>,
}

impl Shaper {
    pub fn new(expr: Expr, typ: Expr, flags: ShaperFlags) -> Self {
        Self {
            flags,
            expr: Box::new(expr),
            typ: Box::new(typ),
            steps: Mutex::new(HashMap::new()),
        }
    }

    pub fn flags(&self) -> ShaperFlags {
        self.flags
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        let v = self.expr.eval(ectx, this);
        if v.is_error() {
            return v;
        }
        let t = self.typ.eval(ectx, this).under();
        if t.is_error() {
            return t;
        }
        let zctx = ectx.zctx();
        match t.ty().primitive_id() {
            Some(PrimitiveId::String) if !t.is_null() => {
                return match zctx.lookup_type_named(t.as_str(), v.ty().clone()) {
                    Ok(named) => Value::shared(named, v.into_parts().1),
                    Err(e) => zctx.new_error(e),
                };
            }
            Some(PrimitiveId::Type) if !t.is_null() => {}
            _ => return zctx.wrap_error("shaper type argument is not a type", &t),
        }
        let target = match zctx.lookup_by_value(t.as_bytes()) {
            Ok(target) => target,
            Err(e) => return zctx.new_error(e),
        };
        match self.step(zctx, v.ty(), &target) {
            Ok(step) => step.exec(zctx, &v),
            Err(e) => zctx.new_error(e),
        }
    }

    fn step(&self, zctx: &TypeContext, input: &Type, target: &Type) -> ZedResult<Arc<Step>> {
        let key = (target.clone(), input.clone());
        if let Some(step) = self.steps.lock().get(&key) {
            return Ok(step.clone());
        }
        let step = Arc::new(plan(zctx, self.flags, input, target)?);
        self.steps.lock().insert(key, step.clone());
        Ok(step)
    }
}
