//! Time functions.
use chrono::{
    Utc,
    format::{Item, StrftimeItems},
};
use zedcore::{
    coerce::to_duration,
    nano,
    types::{PrimitiveId, Type},
    value::Value,
};

use crate::{
    expr::EvalContext,
    function::{fail_on, string_arg},
};

pub fn now(_: &mut EvalContext, _: &[Value]) -> Value {
    Value::time(Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

/// `bucket(ts, bin)`: truncate a time or duration to a multiple of `bin`.
pub fn bucket(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let (ts, bin) = (args[0].under(), args[1].under());
    let bin = match bin.ty().primitive_id() {
        Some(PrimitiveId::Duration) if !bin.is_null() => bin.as_duration(),
        Some(id) if id.is_integer() && !bin.is_null() => match to_duration(&bin) {
            Some(d) => d,
            None => return fail_on(ectx, "bucket", "second argument is not a duration", &args[1]),
        },
        _ => return fail_on(ectx, "bucket", "second argument is not a duration", &args[1]),
    };
    match ts.ty().primitive_id() {
        Some(PrimitiveId::Time | PrimitiveId::Duration) if ts.is_null() => ts,
        Some(PrimitiveId::Time) => Value::time(nano::truncate(ts.as_time(), bin)),
        Some(PrimitiveId::Duration) => Value::duration(nano::truncate(ts.as_duration(), bin)),
        _ => fail_on(ectx, "bucket", "time arg required", &args[0]),
    }
}

/// `strftime(format, time)` with the usual `%` conversion specifiers.
pub fn strftime(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let Some(Some(format)) = string_arg(&args[0]) else {
        return fail_on(ectx, "strftime", "string value required for format arg", &args[0]);
    };
    let ts = args[1].under();
    if !ts.ty().is(PrimitiveId::Time) {
        return fail_on(ectx, "strftime", "time value required for time arg", &args[1]);
    }
    if ts.is_null() {
        return Value::null_of(Type::string());
    }
    let items: Vec<Item> = StrftimeItems::new(&format).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return fail_on(ectx, "strftime", "invalid format", &args[0]);
    }
    let dt = nano::to_datetime(ts.as_time());
    Value::string(&dt.format_with_items(items.into_iter()).to_string())
}
