use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use zedcore::{
    config::ExprConfig,
    types::{Type, TypeContext},
    value::Value,
};

use crate::expr::Expr;

/// A user-defined function: a named body evaluated with its parameters bound
/// to [`Expr::Var`] slots `0..params.len()`.
#[derive(Debug)]
pub struct Udf {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

/// State threaded through one evaluation.
///
/// The context owns the call frames of user-defined functions and gives
/// evaluators access to the shared [`TypeContext`]. One context drives one
/// expression tree at a time; contexts are cheap, so each thread makes its
/// own.
#[derive(Debug)]
pub struct EvalContext {
    zctx: Arc<TypeContext>,
    udfs: Vec<Arc<Udf>>,
    frames: Vec<Vec<Value>>,
    max_call_depth: usize,
}

impl EvalContext {
    pub fn new(zctx: Arc<TypeContext>) -> Self {
        Self::from_config(zctx, &ExprConfig::default())
    }

    pub fn from_config(zctx: Arc<TypeContext>, config: &ExprConfig) -> Self {
        Self {
            zctx,
            udfs: Vec::new(),
            frames: Vec::new(),
            max_call_depth: config.max_call_depth,
        }
    }

    pub fn zctx(&self) -> &TypeContext {
        &self.zctx
    }

    pub fn shared_zctx(&self) -> Arc<TypeContext> {
        self.zctx.clone()
    }

    /// A value over `bytes`, which may point into an upstream batch. The
    /// batch stays alive as long as the value does.
    pub fn new_value(&self, ty: Type, bytes: Option<Bytes>) -> Value {
        Value::shared(ty, bytes)
    }

    /// A copy of `v` that no longer refers to the buffer `v` points into,
    /// for values kept past the current batch.
    pub fn copy_value(&self, v: &Value) -> Value {
        v.copy()
    }

    /// Register a function and return the slot [`Expr::UdfCall`] refers to.
    pub fn declare_udf(&mut self, udf: Udf) -> usize {
        debug!("Declared function {} with {} parameter(s)", udf.name, udf.params.len());
        self.udfs.push(Arc::new(udf));
        self.udfs.len() - 1
    }

    /// Slot the next [`EvalContext::declare_udf`] will return, for bodies
    /// that call themselves.
    pub fn next_udf_slot(&self) -> usize {
        self.udfs.len()
    }

    pub fn udf(&self, slot: usize) -> Option<Arc<Udf>> {
        self.udfs.get(slot).cloned()
    }

    /// Values bound in the innermost frame.
    pub fn vars(&self) -> &[Value] {
        self.frames.last().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a frame, failing with `None` once the depth limit is reached.
    pub(crate) fn push_frame(&mut self, args: Vec<Value>) -> Option<()> {
        if self.frames.len() >= self.max_call_depth {
            return None;
        }
        self.frames.push(args);
        Some(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Discard all frames, e.g. after an evaluation was abandoned.
    pub fn reset(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use zedcore::zson;

    use super::*;

    #[test]
    fn values_borrow_until_copied() {
        let ectx = EvalContext::new(Arc::new(TypeContext::new()));
        let batch = zson::parse_value(ectx.zctx(), r#"{id:7,name:"flow"}"#).unwrap();
        let name = batch.deref("name").unwrap();

        let (ty, bytes) = name.clone().into_parts();
        let borrowed = ectx.new_value(ty, bytes);
        assert!(borrowed.shares_body_with(&batch));
        assert_eq!(borrowed.as_str(), "flow");

        let kept = ectx.copy_value(&borrowed);
        assert!(!kept.shares_body_with(&batch));
        drop(batch);
        assert_eq!(kept, name);
    }
}
