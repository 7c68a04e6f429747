use std::collections::HashMap;

use parking_lot::Mutex;
use zedcore::{
    encoding::Builder,
    types::{Field, Type, TypeDef},
    value::{
        Value,
        construct::{array_of, map_of, set_of},
    },
};

use crate::expr::{EvalContext, Expr};

#[derive(Debug)]
pub enum RecordElem {
    Field(String, Expr),
    /// Splice the fields of a record value in place.
    Spread(Expr),
}

/// Record constructor. Later fields replace earlier ones with the same name
/// but keep the earlier position; quiet values are left out.
#[derive(Debug)]
pub struct RecordExpr {
    elems: Vec<RecordElem>,
    types: Mutex<HashMap<Vec<Field>, Type>>,
}

impl RecordExpr {
    pub fn new(elems: Vec<RecordElem>) -> Self {
        Self {
            elems,
            types: Mutex::new(HashMap::new()),
        }
    }

    /// Constructor from plain `(name, expr)` pairs.
    pub fn fields(fields: impl IntoIterator<Item = (String, Expr)>) -> Self {
        Self::new(
            fields
                .into_iter()
                .map(|(name, e)| RecordElem::Field(name, e))
                .collect(),
        )
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        let mut out: Vec<(String, Value)> = Vec::with_capacity(self.elems.len());
        let mut set = |name: String, v: Value| match out.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = v,
            None => out.push((name, v)),
        };
        for elem in &self.elems {
            match elem {
                RecordElem::Field(name, e) => {
                    let v = e.eval(ectx, this);
                    if !v.is_quiet() {
                        set(name.clone(), v);
                    }
                }
                RecordElem::Spread(e) => {
                    let v = e.eval(ectx, this).under();
                    if !v.ty().is_record() || v.is_null() {
                        continue;
                    }
                    match v.fields() {
                        Ok(fields) => fields.into_iter().for_each(|(n, fv)| set(n, fv)),
                        Err(e) => return ectx.zctx().new_error(e),
                    }
                }
            }
        }
        self.build(ectx, out)
    }

    fn build(&self, ectx: &EvalContext, out: Vec<(String, Value)>) -> Value {
        let mut b = Builder::new();
        let mut fields = Vec::with_capacity(out.len());
        for (name, v) in out {
            b.append(v.bytes(), v.ty().is_container());
            fields.push(Field::new(name, v.ty().clone()));
        }
        let ty = {
            let mut types = self.types.lock();
            match types.get(&fields) {
                Some(ty) => ty.clone(),
                None => match ectx.zctx().lookup_type_record(fields.clone()) {
                    Ok(ty) => types.entry(fields).or_insert(ty).clone(),
                    Err(e) => return ectx.zctx().new_error(e),
                },
            }
        };
        match b.finish() {
            Ok(body) => Value::new(ty, Some(body)),
            Err(e) => ectx.zctx().new_error(e),
        }
    }
}

#[derive(Debug)]
pub enum VectorElem {
    Value(Expr),
    /// Splice the elements of an array or set in place.
    Spread(Expr),
}

/// Array or set constructor.
#[derive(Debug)]
pub struct ArrayExpr {
    elems: Vec<VectorElem>,
}

impl ArrayExpr {
    pub fn new(elems: Vec<VectorElem>) -> Self {
        Self { elems }
    }

    pub fn values(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Self::new(exprs.into_iter().map(VectorElem::Value).collect())
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value, is_set: bool) -> Value {
        let mut values = Vec::with_capacity(self.elems.len());
        for elem in &self.elems {
            match elem {
                VectorElem::Value(e) => {
                    let v = e.eval(ectx, this);
                    if !v.is_quiet() {
                        values.push(v);
                    }
                }
                VectorElem::Spread(e) => {
                    let v = e.eval(ectx, this).under();
                    if !matches!(v.ty().def(), TypeDef::Array(_) | TypeDef::Set(_)) {
                        continue;
                    }
                    match v.elements() {
                        Ok(elems) => values.extend(elems.iter().map(Value::under)),
                        Err(e) => return ectx.zctx().new_error(e),
                    }
                }
            }
        }
        collect(ectx, &values, is_set)
    }
}

fn collect(ectx: &EvalContext, values: &[Value], is_set: bool) -> Value {
    let built = if is_set {
        set_of(ectx.zctx(), values)
    } else {
        array_of(ectx.zctx(), values)
    };
    built.unwrap_or_else(|e| ectx.zctx().new_error(e))
}

#[derive(Debug)]
pub struct Entry {
    pub key: Expr,
    pub value: Expr,
}

/// Map constructor; an entry whose key or value is quiet is left out.
#[derive(Debug)]
pub struct MapExpr {
    entries: Vec<Entry>,
}

impl MapExpr {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        let mut keys = Vec::with_capacity(self.entries.len());
        let mut vals = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let k = entry.key.eval(ectx, this);
            let v = entry.value.eval(ectx, this);
            if k.is_quiet() || v.is_quiet() {
                continue;
            }
            keys.push(k);
            vals.push(v);
        }
        map_of(ectx.zctx(), &keys, &vals).unwrap_or_else(|e| ectx.zctx().new_error(e))
    }
}

/// Evaluate `inner` with each element of an array or set as *this*,
/// collecting the results into a container of the same kind.
pub(crate) fn eval_apply(ectx: &mut EvalContext, this: &Value, container: &Expr, inner: &Expr) -> Value {
    let c = container.eval(ectx, this);
    if c.is_error() {
        return c;
    }
    let c = c.under();
    let is_set = match c.ty().def() {
        TypeDef::Array(_) => false,
        TypeDef::Set(_) => true,
        _ => return ectx.zctx().wrap_error("map: value is not an array or set", &c),
    };
    if c.is_null() {
        return c;
    }
    let elems = match c.elements() {
        Ok(elems) => elems,
        Err(e) => return ectx.zctx().new_error(e),
    };
    let mut out = Vec::with_capacity(elems.len());
    for elem in elems {
        let v = inner.eval(ectx, &elem.under());
        if !v.is_quiet() {
            out.push(v);
        }
    }
    collect(ectx, &out, is_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArithOp, testing::*};

    #[test]
    fn record_with_spread_and_override() {
        let mut ectx = ectx();
        let rec = RecordExpr::new(vec![
            RecordElem::Field("a".into(), lit(&ectx, "0")),
            RecordElem::Spread(*field("r")),
            RecordElem::Spread(*field("n")),
            RecordElem::Field("z".into(), lit(&ectx, "true")),
        ]);
        let e = Expr::Record(rec);
        assert_eq!(run(&mut ectx, &e, r#"{r:{b:"x",a:1},n:5}"#), r#"{a:1,b:"x",z:true}"#);
        // Same shape again comes from the cache.
        assert_eq!(run(&mut ectx, &e, r#"{r:{b:"y",a:2},n:5}"#), r#"{a:2,b:"y",z:true}"#);
    }

    #[test]
    fn quiet_fields_are_dropped() {
        let mut ectx = ectx();
        let quiet = Expr::Literal(ectx.zctx().quiet());
        let e = Expr::Record(RecordExpr::fields([
            ("a".to_string(), lit(&ectx, "1")),
            ("q".to_string(), quiet),
        ]));
        assert_eq!(run(&mut ectx, &e, "{}"), "{a:1}");
        let empty = Expr::Record(RecordExpr::new(vec![]));
        assert_eq!(run(&mut ectx, &empty, "{}"), "{}");
    }

    #[test]
    fn arrays_sets_and_maps() {
        let mut ectx = ectx();
        let arr = Expr::Array(ArrayExpr::new(vec![
            VectorElem::Spread(*field("xs")),
            VectorElem::Value(lit(&ectx, "\"s\"")),
        ]));
        assert_eq!(
            run(&mut ectx, &arr, "{xs:[1,2]}"),
            r#"[1,2,"s"]([(int64,string)])"#
        );
        let set = Expr::Set(ArrayExpr::values([lit(&ectx, "2"), lit(&ectx, "1"), lit(&ectx, "2")]));
        assert_eq!(run(&mut ectx, &set, "{}"), "|[1,2]|");
        let empty = Expr::Array(ArrayExpr::new(vec![]));
        assert_eq!(run(&mut ectx, &empty, "{}"), "[]([null])");
        let map = Expr::Map(MapExpr::new(vec![Entry {
            key: lit(&ectx, "\"k\""),
            value: *field("x"),
        }]));
        assert_eq!(run(&mut ectx, &map, "{x:1}"), r#"|{"k":1}|"#);
    }

    #[test]
    fn apply_maps_elements() {
        let mut ectx = ectx();
        let inc = Expr::Arith(ArithOp::Add, Expr::This.boxed(), lit(&ectx, "1").boxed());
        let e = Expr::Apply(field("xs"), inc.boxed());
        assert_eq!(run(&mut ectx, &e, "{xs:[1,2]}"), "[2,3]");
        assert_eq!(run(&mut ectx, &e, "{xs:|[5]|}"), "|[6]|");
        assert!(run(&mut ectx, &e, "{xs:1}").starts_with("error("));
    }
}
