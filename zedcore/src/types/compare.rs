use std::cmp::Ordering;

use crate::types::{Kind, Type, tv};

fn kind_rank(ty: &Type) -> u8 {
    match ty.kind() {
        Kind::Primitive => 0,
        Kind::Record => 1,
        Kind::Array => 2,
        Kind::Set => 3,
        Kind::Map => 4,
        Kind::Union => 5,
        Kind::Enum => 6,
        Kind::Error => 7,
    }
}

/// Total order over types: by kind of the underlying type, then by the
/// canonical type value. Used to canonicalize union member lists.
pub fn compare_types(a: &Type, b: &Type) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    kind_rank(a)
        .cmp(&kind_rank(b))
        .then_with(|| tv::encode(a).cmp(&tv::encode(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeContext;

    #[test]
    fn primitives_sort_by_id_before_containers() {
        let ctx = TypeContext::new();
        let arr = ctx.lookup_type_array(Type::uint64());
        assert_eq!(compare_types(&Type::uint64(), &Type::string()), Ordering::Less);
        assert_eq!(compare_types(&arr, &Type::null()), Ordering::Greater);
        assert_eq!(compare_types(&arr, &arr), Ordering::Equal);
    }

    #[test]
    fn named_sorts_with_its_kind() {
        let ctx = TypeContext::new();
        let named = ctx.lookup_type_named("n", Type::int64()).unwrap();
        let rec = ctx.lookup_type_record(vec![]).unwrap();
        assert_eq!(compare_types(&named, &rec), Ordering::Less);
        assert_ne!(compare_types(&named, &Type::int64()), Ordering::Equal);
    }
}
