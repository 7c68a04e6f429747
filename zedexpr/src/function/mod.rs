//! Built-in functions
//!
//! Functions are looked up by name in a fixed registry when an expression is
//! assembled ([`compile`]). The registry records how many arguments each
//! function accepts, so arity mistakes surface as [`ExprError`]s before any
//! value is evaluated. At run time a function only ever returns values;
//! failures become error values.
//!
//! A few names do not compile to an [`Expr::Call`]: primitive type names
//! compile to a [`Cast`], the shaper functions (`cast`, `crop`, `fill`,
//! `fit`, `order`, `shape`) to a [`Shaper`] and `flatten`, `unflatten` and
//! `nest_dotted` to their dedicated nodes.
use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use zedcore::{field::Path, types::PrimitiveId, value::Value};

use crate::{
    cast::Cast,
    error::{ExprError, ExprResult},
    expr::{Call, EvalContext, Expr},
    shaper::{Shaper, ShaperFlags},
};

pub mod bytes;
pub mod flatten;
pub mod grok;
pub mod ids;
pub mod math;
pub mod net;
pub mod string;
pub mod time;
pub mod types;

use flatten::{DottedNester, Flattener, Unflattener};

/// A callable built-in.
pub trait Function: fmt::Debug + Send + Sync {
    fn call(&self, ectx: &mut EvalContext, args: &[Value]) -> Value;
}

type Native = fn(&mut EvalContext, &[Value]) -> Value;

/// A function without state of its own.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    name: &'static str,
    f: Native,
}

impl Builtin {
    pub fn new(name: &'static str, f: Native) -> Self {
        Self { name, f }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Function for Builtin {
    fn call(&self, ectx: &mut EvalContext, args: &[Value]) -> Value {
        (self.f)(ectx, args)
    }
}

struct Entry {
    min: usize,
    /// `None` for variadic functions.
    max: Option<usize>,
    make: fn() -> Box<dyn Function>,
}

macro_rules! native {
    ($name:literal, $f:path) => {
        || Box::new(Builtin::new($name, $f)) as Box<dyn Function>
    };
}

macro_rules! stateful {
    ($t:ty) => {
        || Box::new(<$t>::default()) as Box<dyn Function>
    };
}

static REGISTRY: Lazy<HashMap<&'static str, Entry>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Entry> = HashMap::new();
    let mut add = |name: &'static str, min: usize, max: Option<usize>, make: fn() -> Box<dyn Function>| {
        table.insert(name, Entry { min, max, make });
    };
    add("abs", 1, Some(1), native!("abs", math::abs));
    add("base64", 1, Some(1), native!("base64", bytes::base64));
    add("bucket", 2, Some(2), native!("bucket", time::bucket));
    add("ceil", 1, Some(1), native!("ceil", math::ceil));
    add("cidr_match", 2, Some(2), native!("cidr_match", net::cidr_match));
    add("coalesce", 0, None, native!("coalesce", types::coalesce));
    add("compare", 2, Some(3), native!("compare", types::compare));
    add("error", 1, Some(1), native!("error", types::error));
    add("every", 1, Some(1), native!("every", time::bucket));
    add("fields", 1, Some(1), native!("fields", types::fields));
    add("floor", 1, Some(1), native!("floor", math::floor));
    add("grep", 1, Some(2), stateful!(string::Grep));
    add("grok", 2, Some(3), stateful!(grok::Grok));
    add("has", 1, None, native!("has", types::has));
    add("has_error", 1, Some(1), stateful!(types::HasError));
    add("hex", 1, Some(1), native!("hex", bytes::hex));
    add("is", 1, Some(2), native!("is", types::is));
    add("is_error", 1, Some(1), native!("is_error", types::is_error));
    add("join", 1, Some(2), native!("join", string::join));
    add("kind", 1, Some(1), native!("kind", types::kind));
    add("ksuid", 0, Some(1), native!("ksuid", ids::ksuid));
    add("len", 1, Some(1), native!("len", types::len));
    add("levenshtein", 2, Some(2), native!("levenshtein", string::levenshtein));
    add("log", 1, Some(1), native!("log", math::log));
    add("lower", 1, Some(1), native!("lower", string::lower));
    add("max", 1, None, native!("max", math::max));
    add("min", 1, None, native!("min", math::min));
    add("missing", 1, None, native!("missing", types::missing));
    add("nameof", 1, Some(1), native!("nameof", types::nameof));
    add("network_of", 1, Some(2), native!("network_of", net::network_of));
    add("now", 0, Some(0), native!("now", time::now));
    add("parse_uri", 1, Some(1), native!("parse_uri", ids::parse_uri));
    add("parse_zson", 1, Some(1), native!("parse_zson", ids::parse_zson));
    add("pow", 2, Some(2), native!("pow", math::pow));
    add("quiet", 1, Some(1), native!("quiet", types::quiet));
    add("regexp", 2, Some(2), stateful!(string::Regexp));
    add("regexp_replace", 3, Some(3), stateful!(string::RegexpReplace));
    add("replace", 3, Some(3), native!("replace", string::replace));
    add("round", 1, Some(1), native!("round", math::round));
    add("rune_len", 1, Some(1), native!("rune_len", string::rune_len));
    add("split", 2, Some(2), native!("split", string::split));
    add("sqrt", 1, Some(1), native!("sqrt", math::sqrt));
    add("strftime", 2, Some(2), native!("strftime", time::strftime));
    add("trim", 1, Some(1), native!("trim", string::trim));
    add("typename", 1, Some(2), native!("typename", types::typename));
    add("typeof", 1, Some(1), native!("typeof", types::type_of));
    add("typeunder", 1, Some(1), native!("typeunder", types::type_under));
    add("under", 1, Some(1), native!("under", types::under));
    add("upper", 1, Some(1), native!("upper", string::upper));
    table
});

fn check_arity(name: &str, got: usize, min: usize, max: Option<usize>) -> ExprResult<()> {
    if got < min {
        return Err(ExprError::TooFewArgs {
            name: name.to_string(),
            min,
            got,
        });
    }
    if let Some(max) = max
        && got > max
    {
        return Err(ExprError::TooManyArgs {
            name: name.to_string(),
            max,
            got,
        });
    }
    Ok(())
}

/// Whether `name` is a function [`compile`] accepts.
pub fn exists(name: &str) -> bool {
    REGISTRY.contains_key(name)
        || ShaperFlags::of_function(name).is_some()
        || matches!(name, "flatten" | "unflatten" | "nest_dotted")
        || cast_target(name).is_some()
}

fn cast_target(name: &str) -> Option<PrimitiveId> {
    name.parse::<PrimitiveId>()
        .ok()
        .filter(|id| *id != PrimitiveId::Null)
}

/// Assemble the call of `name` with argument expressions `args`, filling in
/// implied arguments: `every(d)` is `bucket(ts, d)`, `is(T)` tests *this*,
/// `grep(p)` searches *this* and `nest_dotted()` nests *this*.
pub fn compile(name: &str, args: Vec<Expr>) -> ExprResult<Expr> {
    let got = args.len();
    if let Some(to) = cast_target(name) {
        check_arity(name, got, 1, Some(1))?;
        let Some(arg) = args.into_iter().next() else {
            return Err(ExprError::TooFewArgs {
                name: name.to_string(),
                min: 1,
                got,
            });
        };
        return Ok(Expr::Cast(Cast::new(to, arg)));
    }
    if let Some(flags) = ShaperFlags::of_function(name) {
        check_arity(name, got, 1, Some(2))?;
        let mut it = args.into_iter();
        let (expr, typ) = match (it.next(), it.next()) {
            (Some(typ), None) => (Expr::This, typ),
            (Some(expr), Some(typ)) => (expr, typ),
            _ => {
                return Err(ExprError::TooFewArgs {
                    name: name.to_string(),
                    min: 1,
                    got,
                });
            }
        };
        return Ok(Expr::Shaper(Shaper::new(expr, typ, flags)));
    }
    match name {
        "flatten" | "unflatten" | "nest_dotted" => {
            let min = usize::from(name != "nest_dotted");
            check_arity(name, got, min, Some(1))?;
            let arg = args.into_iter().next().unwrap_or(Expr::This).boxed();
            return Ok(match name {
                "flatten" => Expr::Flatten(arg, Flattener::default()),
                "unflatten" => Expr::Unflatten(arg, Unflattener::default()),
                _ => Expr::NestDotted(arg, DottedNester::default()),
            });
        }
        _ => {}
    }
    let entry = REGISTRY
        .get(name)
        .ok_or_else(|| ExprError::NoSuchFunction(name.to_string()))?;
    check_arity(name, got, entry.min, entry.max)?;
    let mut args = args;
    match (name, got) {
        ("every", _) => args.insert(0, Expr::path(&Path::new(["ts"]))),
        ("is", 1) => args.insert(0, Expr::This),
        ("grep", 1) => args.push(Expr::This),
        _ => {}
    }
    Ok(Expr::Call(Call::new(name, (entry.make)(), args)))
}

/// Whether `name` is known to return a bool, making a lone call usable as a
/// filter.
pub fn has_bool_result(name: &str) -> bool {
    matches!(
        name,
        "has" | "has_error" | "is_error" | "is" | "missing" | "cidr_match" | "grep"
    )
}

/// `error("name: msg")`
pub(crate) fn fail(ectx: &EvalContext, name: &str, msg: impl fmt::Display) -> Value {
    ectx.zctx().new_error(format!("{name}: {msg}"))
}

/// `error({message:"name: msg",on:v})`
pub(crate) fn fail_on(ectx: &EvalContext, name: &str, msg: impl fmt::Display, v: &Value) -> Value {
    ectx.zctx().wrap_error(format!("{name}: {msg}"), v)
}

/// The string held by `v` (looking through named types and unions), or
/// `None` if it is not a string. A null string reads as `Some(None)`.
pub(crate) fn string_arg(v: &Value) -> Option<Option<String>> {
    let u = v.under();
    if !u.ty().is(PrimitiveId::String) {
        return None;
    }
    Some((!u.is_null()).then(|| u.as_str().to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::testing::*;

    #[test]
    fn arity_is_checked() {
        let err = compile("abs", vec![]).unwrap_err();
        assert!(err.is_too_few_args(), "{err}");
        let err = compile("now", vec![Expr::This]).unwrap_err();
        assert!(err.is_too_many_args(), "{err}");
        assert!(compile("nope", vec![]).unwrap_err().is_no_such_function());
        assert!(compile("max", vec![Expr::This, Expr::This, Expr::This]).is_ok());
    }

    #[test]
    fn special_forms() {
        assert!(compile("int32", vec![Expr::This]).unwrap().is_cast());
        assert!(compile("shape", vec![Expr::This]).unwrap().is_shaper());
        assert!(compile("nest_dotted", vec![]).unwrap().is_nest_dotted());
        assert!(compile("null", vec![Expr::This]).is_err());
        assert!(exists("fit") && exists("len") && !exists("bogus"));
    }

    #[test]
    fn implied_arguments() {
        let mut ectx = ectx();
        let every = compile("every", vec![lit(&ectx, "1m")]).unwrap();
        assert_eq!(
            run(&mut ectx, &every, "{ts:1970-01-01T00:01:30Z}"),
            "1970-01-01T00:01:00Z"
        );
        let is = compile("is", vec![lit(&ectx, "<int64>")]).unwrap();
        assert_eq!(run(&mut ectx, &is, "1"), "true");
        let grep = compile("grep", vec![lit(&ectx, "\"FOO\"")]).unwrap();
        assert_eq!(run(&mut ectx, &grep, r#"{s:"a foo b"}"#), "true");
    }

    #[test]
    fn bool_results() {
        assert!(has_bool_result("cidr_match"));
        assert!(!has_bool_result("len"));
    }
}
