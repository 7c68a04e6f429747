use std::cmp::Ordering;

use crate::{
    coerce::compare_numbers,
    encoding::integer::decode_counted_uvarint,
    types::{PrimitiveId, TypeDef, compare_types},
    value::{
        Value,
        primitive::{decode_ip, decode_net},
    },
};

/// Total order over values, as used by sorting and the `compare` function.
///
/// Numbers compare numerically across widths and signedness. Other values of
/// the same type compare by their natural order (containers element-wise);
/// values of unrelated types are ordered by [`compare_types`]. Nulls sort
/// after every other value when `nulls_max` is set and before otherwise. NaN
/// sorts before all other floats.
pub fn compare_values(a: &Value, b: &Value, nulls_max: bool) -> Ordering {
    let (a, b) = (a.under(), b.under());
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return if nulls_max { Ordering::Greater } else { Ordering::Less },
        (false, true) => return if nulls_max { Ordering::Less } else { Ordering::Greater },
        (false, false) => {}
    }
    if a.ty().is_number() && b.ty().is_number() {
        return compare_numbers(&a, &b).unwrap_or_else(|| {
            let (fa, fb) = (a.as_float(), b.as_float());
            fa.is_nan().cmp(&fb.is_nan()).reverse()
        });
    }
    if a.ty() != b.ty() {
        return compare_types(a.ty(), b.ty());
    }
    let (Some(ab), Some(bb)) = (a.bytes(), b.bytes()) else {
        return Ordering::Equal;
    };
    match a.ty().def() {
        TypeDef::Primitive(PrimitiveId::Bool) => a.as_bool().cmp(&b.as_bool()),
        TypeDef::Primitive(PrimitiveId::Ip) => match (decode_ip(ab), decode_ip(bb)) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => ab.cmp(bb),
        },
        TypeDef::Primitive(PrimitiveId::Net) => match (decode_net(ab), decode_net(bb)) {
            (Ok(x), Ok(y)) => x
                .network()
                .cmp(&y.network())
                .then(x.prefix().cmp(&y.prefix())),
            _ => ab.cmp(bb),
        },
        TypeDef::Enum(_) => decode_counted_uvarint(ab).cmp(&decode_counted_uvarint(bb)),
        TypeDef::Record(_) => match (a.fields(), b.fields()) {
            (Ok(x), Ok(y)) => compare_seq(x.iter().map(|f| &f.1), y.iter().map(|f| &f.1), nulls_max),
            _ => ab.cmp(bb),
        },
        TypeDef::Array(_) | TypeDef::Set(_) => match (a.elements(), b.elements()) {
            (Ok(x), Ok(y)) => compare_seq(x.iter(), y.iter(), nulls_max),
            _ => ab.cmp(bb),
        },
        TypeDef::Map(_, _) => match (a.entries(), b.entries()) {
            (Ok(x), Ok(y)) => {
                let flat = |e: &[(Value, Value)]| -> Vec<Value> {
                    e.iter().flat_map(|(k, v)| [k.clone(), v.clone()]).collect()
                };
                compare_seq(flat(&x).iter(), flat(&y).iter(), nulls_max)
            }
            _ => ab.cmp(bb),
        },
        TypeDef::Error(inner) => compare_values(
            &Value::from_slice(inner.clone(), Some(ab)),
            &Value::from_slice(inner.clone(), Some(bb)),
            nulls_max,
        ),
        _ => ab.cmp(bb),
    }
}

fn compare_seq<'a>(
    a: impl Iterator<Item = &'a Value>,
    b: impl Iterator<Item = &'a Value>,
    nulls_max: bool,
) -> Ordering {
    let mut b = b;
    for x in a {
        let Some(y) = b.next() else {
            return Ordering::Greater;
        };
        let ord = compare_values(x, y, nulls_max);
        if ord.is_ne() {
            return ord;
        }
    }
    if b.next().is_some() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn numbers_across_types() {
        let big = Value::uint64(u64::MAX);
        assert_eq!(compare_values(&Value::int64(-1), &big, false), Ordering::Less);
        assert_eq!(
            compare_values(&Value::float64(1.5), &Value::int64(1), false),
            Ordering::Greater
        );
    }

    #[test]
    fn nulls_placement() {
        let null = Value::null_of(Type::int64());
        assert_eq!(compare_values(&null, &Value::int64(1), true), Ordering::Greater);
        assert_eq!(compare_values(&null, &Value::int64(1), false), Ordering::Less);
        assert_eq!(compare_values(&null, &Value::null(), true), Ordering::Equal);
    }

    #[test]
    fn strings_and_ips() {
        assert_eq!(
            compare_values(&Value::string("a"), &Value::string("b"), false),
            Ordering::Less
        );
        let a = Value::ip("10.0.0.2".parse().unwrap());
        let b = Value::ip("10.0.0.10".parse().unwrap());
        assert_eq!(compare_values(&a, &b, false), Ordering::Less);
    }

    #[test]
    fn mixed_types_are_total() {
        let s = Value::string("a");
        let n = Value::int64(1);
        assert_eq!(
            compare_values(&s, &n, false),
            compare_values(&n, &s, false).reverse()
        );
    }

    #[test]
    fn nan_sorts_first() {
        let nan = Value::float64(f64::NAN);
        assert_eq!(compare_values(&nan, &Value::float64(-1e300), false), Ordering::Less);
    }
}
