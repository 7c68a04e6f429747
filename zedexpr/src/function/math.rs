//! Numeric functions.
use zedcore::{
    coerce::{to_float, to_int, to_uint},
    types::{PrimitiveId, Type},
    value::Value,
    zson,
};

use crate::{expr::EvalContext, function::fail_on};

fn float_result(id: PrimitiveId, f: f64) -> Value {
    match id {
        PrimitiveId::Float16 | PrimitiveId::Float32 => {
            Value::float(Type::primitive(id), f as f32 as f64)
        }
        _ => Value::float64(f),
    }
}

/// Apply `op` to a float argument, keeping its width; integers pass through.
fn rounding(ectx: &EvalContext, name: &str, v: &Value, op: fn(f64) -> f64) -> Value {
    let u = v.under();
    match u.ty().primitive_id() {
        Some(id) if id.is_float() => {
            if u.is_null() {
                return u;
            }
            float_result(id, op(u.as_float()))
        }
        Some(id) if id.is_integer() => u,
        _ => fail_on(ectx, name, "not a number", v),
    }
}

pub fn abs(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let u = args[0].under();
    match u.ty().primitive_id() {
        Some(id) if id.is_float() => rounding(ectx, "abs", &u, f64::abs),
        Some(id) if id.is_integer() && id.is_signed() && !u.is_null() => {
            match u.as_int().checked_abs() {
                Some(n) => Value::int(u.ty().clone(), n),
                None => fail_on(ectx, "abs", "overflow", &args[0]),
            }
        }
        Some(id) if id.is_integer() => u,
        _ => fail_on(ectx, "abs", "not a number", &args[0]),
    }
}

pub fn ceil(ectx: &mut EvalContext, args: &[Value]) -> Value {
    rounding(ectx, "ceil", &args[0], f64::ceil)
}

pub fn floor(ectx: &mut EvalContext, args: &[Value]) -> Value {
    rounding(ectx, "floor", &args[0], f64::floor)
}

pub fn round(ectx: &mut EvalContext, args: &[Value]) -> Value {
    rounding(ectx, "round", &args[0], f64::round)
}

pub fn log(ectx: &mut EvalContext, args: &[Value]) -> Value {
    match to_float(&args[0].under()) {
        Some(x) if x > 0.0 => Value::float64(x.ln()),
        Some(_) => fail_on(ectx, "log", "illegal argument", &args[0]),
        None => fail_on(ectx, "log", "numeric argument required", &args[0]),
    }
}

pub fn pow(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let Some(x) = to_float(&args[0].under()) else {
        return fail_on(ectx, "pow", "not a number", &args[0]);
    };
    let Some(y) = to_float(&args[1].under()) else {
        return fail_on(ectx, "pow", "not a number", &args[1]);
    };
    Value::float64(x.powf(y))
}

pub fn sqrt(ectx: &mut EvalContext, args: &[Value]) -> Value {
    match to_float(&args[0].under()) {
        Some(x) => Value::float64(x.sqrt()),
        None => fail_on(ectx, "sqrt", "not a number", &args[0]),
    }
}

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

impl Extreme {
    fn name(self) -> &'static str {
        match self {
            Extreme::Min => "min",
            Extreme::Max => "max",
        }
    }

    fn pick<T: PartialOrd>(self, a: T, b: T) -> T {
        let take_b = match self {
            Extreme::Min => b < a,
            Extreme::Max => b > a,
        };
        if take_b { b } else { a }
    }
}

/// The result takes the kind of the first argument: float64, int64 or
/// uint64; later arguments are coerced to it.
fn reduce(ectx: &EvalContext, which: Extreme, args: &[Value]) -> Value {
    let first = args[0].under();
    let name = which.name();
    let not_a_number = |v: &Value| {
        ectx.zctx()
            .wrap_error(format!("{name}: not a number: {}", zson::format_value(v)), v)
    };
    let Some(id) = first.ty().primitive_id().filter(|id| id.is_number()) else {
        return not_a_number(&args[0]);
    };
    if id.is_float() {
        let mut acc = first.as_float();
        for v in &args[1..] {
            match to_float(&v.under()) {
                Some(f) => acc = which.pick(acc, f),
                None => return not_a_number(v),
            }
        }
        return Value::float64(acc);
    }
    if id.is_signed() {
        let mut acc = first.as_int();
        for v in &args[1..] {
            match to_int(&v.under()) {
                Some(n) => acc = which.pick(acc, n),
                None => return not_a_number(v),
            }
        }
        return Value::int64(acc);
    }
    let mut acc = first.as_uint();
    for v in &args[1..] {
        match to_uint(&v.under()) {
            Some(n) => acc = which.pick(acc, n),
            None => return not_a_number(v),
        }
    }
    Value::uint64(acc)
}

pub fn min(ectx: &mut EvalContext, args: &[Value]) -> Value {
    reduce(ectx, Extreme::Min, args)
}

pub fn max(ectx: &mut EvalContext, args: &[Value]) -> Value {
    reduce(ectx, Extreme::Max, args)
}

#[cfg(test)]
mod tests {
    use crate::{expr::testing::ectx, function::testing::call};

    #[test]
    fn rounding_keeps_width() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "ceil", &["1.2"]), "2.0");
        assert_eq!(call(&mut ectx, "floor", &["-1.2"]), "-2.0");
        assert_eq!(call(&mut ectx, "round", &["2.5(float32)"]), "3.0(float32)");
        assert_eq!(call(&mut ectx, "round", &["7(int8)"]), "7(int8)");
        assert!(call(&mut ectx, "ceil", &["\"x\""]).contains("not a number"));
    }

    #[test]
    fn abs_and_friends() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "abs", &["-3"]), "3");
        assert_eq!(call(&mut ectx, "abs", &["-3(int16)"]), "3(int16)");
        assert_eq!(call(&mut ectx, "abs", &["-2.5"]), "2.5");
        assert_eq!(call(&mut ectx, "sqrt", &["16"]), "4.0");
        assert_eq!(call(&mut ectx, "pow", &["2", "10"]), "1024.0");
        assert_eq!(call(&mut ectx, "log", &["1"]), "0.0");
        assert!(call(&mut ectx, "log", &["0"]).contains("illegal argument"));
    }

    #[test]
    fn min_and_max() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "max", &["1", "5", "3"]), "5");
        assert_eq!(call(&mut ectx, "min", &["2.5", "1"]), "1.0");
        assert_eq!(call(&mut ectx, "min", &["7(uint8)", "3"]), "3(uint64)");
        assert!(call(&mut ectx, "max", &["1", "\"a\""]).starts_with("error("));
    }
}
