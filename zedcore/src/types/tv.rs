//! Type values
//!
//! The canonical byte form of a type, used as the body of values of the `type`
//! primitive and as the interning key of the [`TypeContext`].
//!
//! | Type | Encoding |
//! |------|----------|
//! | primitive | one byte, the primitive ID |
//! | record | `30` uvarint(n) (name type)* |
//! | array | `31` type |
//! | set | `32` type |
//! | map | `33` key-type value-type |
//! | union | `34` uvarint(n) type* |
//! | enum | `35` uvarint(n) name* |
//! | error | `36` type |
//! | named definition | `37` name type |
//! | named reference | `38` name |
//!
//! Names are a uvarint length followed by UTF-8 bytes. The encoder always
//! writes full named definitions; references are accepted when decoding and
//! resolve to the binding currently held by the context.
use crate::{
    encoding::integer::{append_uvarint, read_uvarint},
    error::{ZedError, ZedResult},
    types::{Field, PrimitiveId, Type, TypeContext, TypeDef},
};

pub const TV_RECORD: u8 = 30;
pub const TV_ARRAY: u8 = 31;
pub const TV_SET: u8 = 32;
pub const TV_MAP: u8 = 33;
pub const TV_UNION: u8 = 34;
pub const TV_ENUM: u8 = 35;
pub const TV_ERROR: u8 = 36;
pub const TV_NAME_DEF: u8 = 37;
pub const TV_NAME_REF: u8 = 38;

fn append_name(buf: &mut Vec<u8>, name: &str) {
    append_uvarint(buf, name.len() as u64);
    buf.extend_from_slice(name.as_bytes());
}

/// Append the type value of `ty` to `buf`.
pub fn append_type_value(buf: &mut Vec<u8>, ty: &Type) {
    append_def(buf, ty.def())
}

pub(crate) fn append_def(buf: &mut Vec<u8>, def: &TypeDef) {
    match def {
        TypeDef::Primitive(p) => buf.push(*p as u8),
        TypeDef::Record(fields) => {
            buf.push(TV_RECORD);
            append_uvarint(buf, fields.len() as u64);
            for field in fields {
                append_name(buf, &field.name);
                append_type_value(buf, &field.ty);
            }
        }
        TypeDef::Array(inner) => {
            buf.push(TV_ARRAY);
            append_type_value(buf, inner);
        }
        TypeDef::Set(inner) => {
            buf.push(TV_SET);
            append_type_value(buf, inner);
        }
        TypeDef::Map(key, val) => {
            buf.push(TV_MAP);
            append_type_value(buf, key);
            append_type_value(buf, val);
        }
        TypeDef::Union(types) => {
            buf.push(TV_UNION);
            append_uvarint(buf, types.len() as u64);
            for t in types {
                append_type_value(buf, t);
            }
        }
        TypeDef::Enum(symbols) => {
            buf.push(TV_ENUM);
            append_uvarint(buf, symbols.len() as u64);
            for s in symbols {
                append_name(buf, s);
            }
        }
        TypeDef::Error(inner) => {
            buf.push(TV_ERROR);
            append_type_value(buf, inner);
        }
        TypeDef::Named(name, under) => {
            buf.push(TV_NAME_DEF);
            append_name(buf, name);
            append_type_value(buf, under);
        }
    }
}

pub fn encode(ty: &Type) -> Vec<u8> {
    let mut buf = Vec::new();
    append_type_value(&mut buf, ty);
    buf
}

struct Decoder<'a> {
    ctx: &'a TypeContext,
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn malformed(what: &str) -> ZedError {
        ZedError::MalformedTypeValue(what.to_string())
    }

    fn byte(&mut self) -> ZedResult<u8> {
        let (&b, rest) = self
            .buf
            .split_first()
            .ok_or_else(|| Self::malformed("truncated type value"))?;
        self.buf = rest;
        Ok(b)
    }

    fn uvarint(&mut self) -> ZedResult<usize> {
        let (v, n) = read_uvarint(self.buf).ok_or_else(|| Self::malformed("truncated length"))?;
        self.buf = &self.buf[n..];
        usize::try_from(v).map_err(|_| Self::malformed("length overflow"))
    }

    fn name(&mut self) -> ZedResult<String> {
        let len = self.uvarint()?;
        if len > self.buf.len() {
            return Err(Self::malformed("truncated name"));
        }
        let (name, rest) = self.buf.split_at(len);
        self.buf = rest;
        String::from_utf8(name.to_vec()).map_err(|_| Self::malformed("name is not UTF-8"))
    }

    fn count(&mut self) -> ZedResult<usize> {
        let n = self.uvarint()?;
        // Every element takes at least one byte.
        if n > self.buf.len() {
            return Err(Self::malformed("element count exceeds remaining bytes"));
        }
        Ok(n)
    }

    fn decode(&mut self) -> ZedResult<Type> {
        let tag = self.byte()?;
        match tag {
            TV_RECORD => {
                let n = self.count()?;
                let mut fields = Vec::with_capacity(n);
                for _ in 0..n {
                    let name = self.name()?;
                    let ty = self.decode()?;
                    fields.push(Field::new(name, ty));
                }
                self.ctx.lookup_type_record(fields)
            }
            TV_ARRAY => Ok(self.ctx.lookup_type_array(self.decode()?)),
            TV_SET => Ok(self.ctx.lookup_type_set(self.decode()?)),
            TV_MAP => {
                let key = self.decode()?;
                let val = self.decode()?;
                Ok(self.ctx.lookup_type_map(key, val))
            }
            TV_UNION => {
                let n = self.count()?;
                let mut types = Vec::with_capacity(n);
                for _ in 0..n {
                    types.push(self.decode()?);
                }
                self.ctx.lookup_type_union(types)
            }
            TV_ENUM => {
                let n = self.count()?;
                let mut symbols = Vec::with_capacity(n);
                for _ in 0..n {
                    symbols.push(self.name()?);
                }
                Ok(self.ctx.lookup_type_enum(symbols))
            }
            TV_ERROR => Ok(self.ctx.lookup_type_error(self.decode()?)),
            TV_NAME_DEF => {
                let name = self.name()?;
                let under = self.decode()?;
                self.ctx.lookup_type_named(&name, under)
            }
            TV_NAME_REF => {
                let name = self.name()?;
                self.ctx
                    .lookup_by_name(&name)
                    .ok_or_else(|| Self::malformed(&format!("no type named '{name}'")))
            }
            id => PrimitiveId::from_id(id as u32)
                .map(Type::primitive)
                .ok_or_else(|| Self::malformed(&format!("unknown type tag {id}"))),
        }
    }
}

/// Decode one type value from the front of `buf`, returning the remainder.
pub fn decode<'a>(ctx: &TypeContext, buf: &'a [u8]) -> ZedResult<(Type, &'a [u8])> {
    let mut d = Decoder { ctx, buf };
    let ty = d.decode()?;
    let consumed = buf.len() - d.buf.len();
    Ok((ty, &buf[consumed..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_is_one_byte() {
        assert_eq!(encode(&Type::int64()), vec![9]);
        assert_eq!(encode(&Type::null()), vec![29]);
    }

    #[test]
    fn record_layout() {
        let ctx = TypeContext::new();
        let rec = ctx
            .lookup_type_record(vec![Field::new("a", Type::string())])
            .unwrap();
        assert_eq!(encode(&rec), vec![TV_RECORD, 1, 1, b'a', 25]);
    }

    #[test]
    fn decode_leaves_rest() {
        let ctx = TypeContext::new();
        let arr = ctx.lookup_type_array(Type::bool());
        let mut buf = encode(&arr);
        buf.extend_from_slice(b"tail");
        let (ty, rest) = decode(&ctx, &buf).unwrap();
        assert_eq!(ty, arr);
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn reference_resolves_binding() {
        let ctx = TypeContext::new();
        let port = ctx.lookup_type_named("port", Type::primitive(PrimitiveId::Uint16)).unwrap();
        let buf = vec![TV_NAME_REF, 4, b'p', b'o', b'r', b't'];
        let (ty, _) = decode(&ctx, &buf).unwrap();
        assert_eq!(ty, port);

        let unknown = vec![TV_NAME_REF, 1, b'x'];
        assert!(matches!(
            decode(&ctx, &unknown),
            Err(ZedError::MalformedTypeValue(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let ctx = TypeContext::new();
        assert!(decode(&ctx, &[200]).is_err());
        assert!(decode(&ctx, &[TV_RECORD, 5]).is_err());
        assert!(decode(&ctx, &[]).is_err());
    }
}
