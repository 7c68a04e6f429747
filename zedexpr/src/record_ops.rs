//! Record transformers: `cut`, `drop`, `rename` and `put`.
//!
//! Each transformer rebuilds its output with a [`RecordTree`] and remembers,
//! per output shape, the record type the first value of that shape produced.
//! Later values of the same shape only re-encode their body. The shape is
//! taken from the built tree rather than the input type, since union fields
//! give values of one input type several output shapes.
use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;
use zedcore::{
    field::Path,
    record::{RecordShape, RecordTree},
    types::{Type, TypeContext},
    value::Value,
};

use crate::{
    error::{ExprError, ExprResult},
    expr::{EvalContext, Expr},
};

type ShapeCache = Mutex<HashMap<RecordShape, Type>>;

fn emit(zctx: &TypeContext, shapes: &ShapeCache, tree: &RecordTree) -> Value {
    let key = tree.shape();
    let cached = shapes.lock().get(&key).cloned();
    let out = match cached {
        Some(ty) => tree.body().map(|body| Value::new(ty, Some(body))),
        None => tree.build(zctx).inspect(|v| {
            shapes.lock().insert(key, v.ty().clone());
        }),
    };
    out.unwrap_or_else(|e| zctx.new_error(e))
}

fn check_paths(op: &str, paths: &[Path]) -> ExprResult<()> {
    for (i, p) in paths.iter().enumerate() {
        if p.is_this() {
            return Err(ExprError::BadArgument(format!("{op}: cannot {op} 'this'")));
        }
        if let Some(q) = paths[..i].iter().find(|q| q.overlaps(p)) {
            return Err(ExprError::BadArgument(format!(
                "{op}: overlapping fields {q} and {p}"
            )));
        }
    }
    Ok(())
}

/// Keeps only the listed fields, nested in their original structure.
/// Fields absent from the input are left out; an input with none of them
/// yields quiet.
#[derive(Debug)]
pub struct Cutter {
    fields: Vec<Path>,
    shapes: ShapeCache,
}

impl Cutter {
    pub fn new(fields: Vec<Path>) -> ExprResult<Self> {
        check_paths("cut", &fields)?;
        Ok(Self {
            fields,
            shapes: Mutex::new(HashMap::new()),
        })
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        if this.is_error() {
            return this.clone();
        }
        let rec = this.under();
        if !rec.ty().is_record() {
            return ectx.zctx().quiet();
        }
        let mut tree = RecordTree::new();
        for path in &self.fields {
            let Some(v) = rec.deref_path(path.names()) else {
                continue;
            };
            if let Err(e) = tree.insert(path.names(), v, false) {
                return ectx.zctx().new_error(e);
            }
        }
        if tree.is_empty() {
            return ectx.zctx().quiet();
        }
        emit(ectx.zctx(), &self.shapes, &tree)
    }
}

/// Removes the listed fields. Nested records left without fields disappear,
/// and an input losing every field yields quiet.
#[derive(Debug)]
pub struct Dropper {
    fields: Vec<Path>,
    shapes: ShapeCache,
}

impl Dropper {
    pub fn new(fields: Vec<Path>) -> ExprResult<Self> {
        check_paths("drop", &fields)?;
        Ok(Self {
            fields,
            shapes: Mutex::new(HashMap::new()),
        })
    }

    fn complement(&self, tree: &mut RecordTree, prefix: &Path, rec: &Value) -> zedcore::error::ZedResult<()> {
        for (name, v) in rec.fields()? {
            let path = prefix.child(name);
            if self.fields.contains(&path) {
                continue;
            }
            if v.ty().is_record() && self.fields.iter().any(|f| f.has_prefix(&path)) {
                self.complement(tree, &path, &v)?;
            } else {
                tree.insert(path.names(), v, false)?;
            }
        }
        Ok(())
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        if this.is_error() {
            return this.clone();
        }
        let rec = this.under();
        if !rec.ty().is_record() {
            return this.clone();
        }
        let mut tree = RecordTree::new();
        if let Err(e) = self.complement(&mut tree, &Path::this(), &rec) {
            return ectx.zctx().new_error(e);
        }
        if tree.is_empty() {
            return ectx.zctx().quiet();
        }
        emit(ectx.zctx(), &self.shapes, &tree)
    }
}

/// Renames leaf fields. Only the type changes; bodies are reused as is.
#[derive(Debug)]
pub struct Renamer {
    renames: Vec<(Path, Path)>,
    shapes: Mutex<HashMap<Type, Result<Type, String>>>,
}

impl Renamer {
    /// Each `(src, dst)` pair must name fields under the same parent record.
    pub fn new(renames: Vec<(Path, Path)>) -> ExprResult<Self> {
        for (src, dst) in &renames {
            if src.is_this() || dst.is_this() {
                return Err(ExprError::BadArgument("rename: cannot rename 'this'".into()));
            }
            if src.parent() != dst.parent() {
                return Err(ExprError::BadArgument(format!(
                    "rename: cannot rename {src} to {dst} (differ in {} vs {})",
                    src.parent(),
                    dst.parent()
                )));
            }
        }
        Ok(Self {
            renames,
            shapes: Mutex::new(HashMap::new()),
        })
    }

    fn rename_type(zctx: &TypeContext, ty: &Type, names: &[String], to: &str) -> zedcore::error::ZedResult<Type> {
        let (Some(fields), Some((head, rest))) = (ty.fields(), names.split_first()) else {
            return Ok(ty.clone());
        };
        let Some(i) = fields.iter().position(|f| &f.name == head) else {
            return Ok(ty.clone());
        };
        let mut fields = fields.to_vec();
        if rest.is_empty() {
            fields[i].name = to.to_string();
        } else {
            fields[i].ty = Self::rename_type(zctx, &fields[i].ty, rest, to)?;
        }
        zctx.lookup_type_record(fields)
    }

    fn output_type(&self, zctx: &TypeContext, input: &Type) -> Result<Type, String> {
        let mut ty = input.clone();
        for (src, dst) in &self.renames {
            let to = dst.leaf().unwrap_or_default();
            ty = Self::rename_type(zctx, &ty, src.names(), to).map_err(|e| format!("rename: {e}"))?;
        }
        Ok(ty)
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        if this.is_error() {
            return this.clone();
        }
        let rec = this.under();
        if !rec.ty().is_record() {
            return this.clone();
        }
        let cached = self.shapes.lock().get(rec.ty()).cloned();
        let out = match cached {
            Some(out) => out,
            None => {
                let out = self.output_type(ectx.zctx(), rec.ty());
                self.shapes.lock().insert(rec.ty().clone(), out.clone());
                out
            }
        };
        match out {
            Ok(ty) => ectx.new_value(ty, rec.into_parts().1),
            Err(msg) => ectx.zctx().wrap_error(msg, this),
        }
    }
}

/// `lhs := rhs` inside a [`Putter`].
#[derive(Debug)]
pub struct Assignment {
    pub lhs: Path,
    pub rhs: Expr,
}

/// Replaces or appends fields. A replaced field keeps its position; new
/// fields are appended in clause order. Clauses evaluating to quiet are
/// skipped, while error values are stored like any other value.
#[derive(Debug)]
pub struct Putter {
    clauses: Vec<Assignment>,
    shapes: ShapeCache,
}

impl Putter {
    pub fn new(clauses: Vec<Assignment>) -> ExprResult<Self> {
        for (i, a) in clauses.iter().enumerate() {
            if a.lhs.is_this() {
                return Err(ExprError::BadArgument(
                    "put: left-hand side cannot be 'this'".into(),
                ));
            }
            for b in &clauses[..i] {
                if a.lhs == b.lhs {
                    return Err(ExprError::BadArgument(format!(
                        "put: multiple assignments to {}",
                        a.lhs
                    )));
                }
                if a.lhs.overlaps(&b.lhs) {
                    return Err(ExprError::BadArgument(format!(
                        "put: conflicting nested assignments to {} and {}",
                        b.lhs, a.lhs
                    )));
                }
            }
        }
        debug!("Built put with {} clause(s)", clauses.len());
        Ok(Self {
            clauses,
            shapes: Mutex::new(HashMap::new()),
        })
    }

    /// Copy the input into `tree`, splitting records that an assignment
    /// reaches into so their untouched siblings survive.
    fn expand(&self, tree: &mut RecordTree, prefix: &Path, rec: &Value) -> zedcore::error::ZedResult<()> {
        for (name, v) in rec.fields()? {
            let path = prefix.child(name);
            let nested = self
                .clauses
                .iter()
                .any(|c| c.lhs.len() > path.len() && c.lhs.has_prefix(&path));
            if nested && v.ty().is_record() {
                self.expand(tree, &path, &v)?;
            } else {
                tree.insert(path.names(), v, false)?;
            }
        }
        Ok(())
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        if this.is_error() {
            return this.clone();
        }
        let rec = this.under();
        if !rec.ty().is_record() {
            return ectx.zctx().wrap_error("put: not a record", this);
        }
        let mut puts = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let v = clause.rhs.eval(ectx, this);
            if !v.is_quiet() {
                puts.push((&clause.lhs, v));
            }
        }
        let mut tree = RecordTree::new();
        if let Err(e) = self.expand(&mut tree, &Path::this(), &rec) {
            return ectx.zctx().new_error(e);
        }
        for (lhs, v) in puts {
            if let Err(e) = tree.insert(lhs.names(), v, true) {
                return ectx.zctx().new_error(e);
            }
        }
        emit(ectx.zctx(), &self.shapes, &tree)
    }
}
