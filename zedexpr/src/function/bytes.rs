//! Byte encodings: `base64` and `hex` encode bytes as strings and decode
//! strings back to bytes.
use base64::{Engine, engine::general_purpose::STANDARD};
use zedcore::{
    types::{PrimitiveId, Type},
    value::Value,
};

use crate::{expr::EvalContext, function::fail_on};

fn transcode(
    ectx: &EvalContext,
    name: &str,
    v: &Value,
    encode: fn(&[u8]) -> String,
    decode: fn(&str) -> Option<Vec<u8>>,
) -> Value {
    let u = v.under();
    match u.ty().primitive_id() {
        Some(PrimitiveId::Bytes) if u.is_null() => Value::null_of(Type::string()),
        Some(PrimitiveId::Bytes) => Value::string(&encode(u.as_bytes())),
        Some(PrimitiveId::String) if u.is_null() => Value::null_of(Type::bytes()),
        Some(PrimitiveId::String) => match decode(u.as_str()) {
            Some(b) => Value::bytes_value(&b),
            None => fail_on(ectx, name, format!("string argument is not {name}"), v),
        },
        _ => fail_on(ectx, name, "argument must be a bytes or string type", v),
    }
}

pub fn base64(ectx: &mut EvalContext, args: &[Value]) -> Value {
    transcode(
        ectx,
        "base64",
        &args[0],
        |b| STANDARD.encode(b),
        |s| STANDARD.decode(s).ok(),
    )
}

pub fn hex(ectx: &mut EvalContext, args: &[Value]) -> Value {
    transcode(ectx, "hex", &args[0], |b| hex::encode(b), |s| hex::decode(s).ok())
}

#[cfg(test)]
mod tests {
    use crate::{expr::testing::ectx, function::testing::call};

    #[test]
    fn encode_and_decode() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "base64", &["0x6869"]), "\"aGk=\"");
        assert_eq!(call(&mut ectx, "base64", &["\"aGk=\""]), "0x6869");
        assert_eq!(call(&mut ectx, "hex", &["0x6869"]), "\"6869\"");
        assert_eq!(call(&mut ectx, "hex", &["\"6869\""]), "0x6869");
        assert!(call(&mut ectx, "hex", &["\"zz\""]).contains("not hex"));
        assert!(call(&mut ectx, "base64", &["1"]).starts_with("error("));
    }
}
