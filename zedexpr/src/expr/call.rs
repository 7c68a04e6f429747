use smallvec::SmallVec;
use zedcore::value::Value;

use crate::{
    expr::{EvalContext, Expr},
    function::Function,
};

/// Call of a built-in function with evaluated arguments.
#[derive(Debug)]
pub struct Call {
    name: String,
    func: Box<dyn Function>,
    args: Vec<Expr>,
}

impl Call {
    pub fn new(name: impl Into<String>, func: Box<dyn Function>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            func,
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eval(&self, ectx: &mut EvalContext, this: &Value) -> Value {
        let args: SmallVec<Value, 4> = self.args.iter().map(|a| a.eval(ectx, this)).collect();
        self.func.call(ectx, &args)
    }
}

/// Free stack below which a user-defined call moves to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each stack segment allocated for deep recursion.
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Call of the user-defined function in `slot`: bind the evaluated
/// arguments in a new frame, evaluate the body, pop the frame.
///
/// Recursion depth is bounded by the context's frame limit alone; the
/// native stack grows on demand so the limit is reached before the thread
/// stack runs out.
pub(crate) fn eval_udf(ectx: &mut EvalContext, this: &Value, slot: usize, args: &[Expr]) -> Value {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || call_udf(ectx, this, slot, args))
}

fn call_udf(ectx: &mut EvalContext, this: &Value, slot: usize, args: &[Expr]) -> Value {
    let Some(udf) = ectx.udf(slot) else {
        return ectx.zctx().new_error(format!("no function in slot {slot}"));
    };
    let values = args.iter().map(|a| a.eval(ectx, this)).collect();
    if ectx.push_frame(values).is_none() {
        return ectx
            .zctx()
            .new_error(format!("{}: stack overflow", udf.name));
    }
    let out = udf.body.eval(ectx, this);
    ectx.pop_frame();
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use zedcore::{config::ExprConfig, types::TypeContext};

    use super::*;
    use crate::expr::{ArithOp, CompareOp, Udf, testing::*};

    /// `fact(n) = n <= 1 ? 1 : n * fact(n - 1)`
    fn declare_fact(ectx: &mut EvalContext) -> usize {
        let slot = ectx.next_udf_slot();
        let n = || Expr::Var(0).boxed();
        let one = || lit(ectx, "1").boxed();
        let body = Expr::Conditional(
            Expr::Compare(CompareOp::Le, n(), one()).boxed(),
            one(),
            Expr::Arith(
                ArithOp::Mul,
                n(),
                Expr::UdfCall(slot, vec![Expr::Arith(ArithOp::Sub, n(), one())]).boxed(),
            )
            .boxed(),
        );
        ectx.declare_udf(Udf {
            name: "fact".into(),
            params: vec!["n".into()],
            body,
        })
    }

    #[test]
    fn recursion() {
        let mut ectx = ectx();
        let slot = declare_fact(&mut ectx);
        let e = Expr::UdfCall(slot, vec![*field("x")]);
        assert_eq!(run(&mut ectx, &e, "{x:5}"), "120");
        assert_eq!(ectx.depth(), 0);
    }

    /// `count(n) = n <= 0 ? 0 : count(n - 1)`
    fn declare_countdown(ectx: &mut EvalContext) -> usize {
        let slot = ectx.next_udf_slot();
        let n = || Expr::Var(0).boxed();
        let zero = || lit(ectx, "0").boxed();
        let one = lit(ectx, "1").boxed();
        let body = Expr::Conditional(
            Expr::Compare(CompareOp::Le, n(), zero()).boxed(),
            zero(),
            Expr::UdfCall(slot, vec![Expr::Arith(ArithOp::Sub, n(), one)]).boxed(),
        );
        ectx.declare_udf(Udf {
            name: "count".into(),
            params: vec!["n".into()],
            body,
        })
    }

    #[test]
    fn default_depth_limit_yields_an_error_value() {
        let mut ectx = ectx();
        let slot = declare_countdown(&mut ectx);
        let e = Expr::UdfCall(slot, vec![*field("x")]);
        assert_eq!(run(&mut ectx, &e, "{x:9000}"), "0");
        let out = run(&mut ectx, &e, "{x:100000}");
        assert!(out.contains("count: stack overflow"), "{out}");
        assert_eq!(ectx.depth(), 0);
    }

    #[test]
    fn depth_is_capped() {
        let config = ExprConfig { max_call_depth: 50 };
        let mut ectx = EvalContext::from_config(Arc::new(TypeContext::new()), &config);
        let slot = declare_fact(&mut ectx);
        let e = Expr::UdfCall(slot, vec![*field("x")]);
        let out = run(&mut ectx, &e, "{x:100}");
        assert!(out.contains("stack overflow"), "{out}");
        assert_eq!(ectx.depth(), 0);
    }
}
