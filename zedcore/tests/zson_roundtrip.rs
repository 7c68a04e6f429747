use std::cmp::Ordering;

use zedcore::{
    types::TypeContext,
    value::{Value, WalkSignal, compare_values},
    zson::{format_value, parse_value},
};

fn parse(ctx: &TypeContext, src: &str) -> Value {
    parse_value(ctx, src).unwrap_or_else(|e| panic!("parsing {src}: {e}"))
}

#[test]
fn log_record_roundtrip() {
    let ctx = TypeContext::new();
    let src = r#"{ts:2020-04-21T22:40:30.068Z,uid:"C2zK5f13SbCtKcyiW5",id:{orig_h:10.164.94.120,orig_p:39681(port=uint16),resp_h:10.47.3.155,resp_p:3389(port=uint16)},duration:4.3ms,tags:|["a","b"]|,score:0.5}"#;
    let v = parse(&ctx, src);
    assert_eq!(format_value(&v), src);
    assert_eq!(v.deref_path(&["id", "resp_p"]).unwrap().as_uint(), 3389);
    assert_eq!(
        v.deref_path(&["id", "orig_p"]).unwrap().ty(),
        v.deref_path(&["id", "resp_p"]).unwrap().ty()
    );
}

#[test]
fn whitespace_is_ignored() {
    let ctx = TypeContext::new();
    let a = parse(&ctx, "{ a : 1 , b : [ 1 , 2 ] }");
    let b = parse(&ctx, "{a:1,b:[1,2]}");
    assert_eq!(a, b);
}

#[test]
fn syntax_errors_are_reported() {
    let ctx = TypeContext::new();
    for bad in ["{a:1", "[1,2", "{a:1}(", "\"unterminated", "<{a:int64>"] {
        let err = parse_value(&ctx, bad).unwrap_err();
        assert!(err.is_zson_syntax(), "{bad}: {err}");
    }
}

#[test]
fn walk_counts_leaves() {
    let ctx = TypeContext::new();
    let v = parse(&ctx, "{a:1,b:{c:[2,3],d:null(string)}}");
    let mut leaves = 0;
    v.walk(&mut |ty, _| {
        if ty.is_primitive() {
            leaves += 1;
        }
        Ok(WalkSignal::Continue)
    })
    .unwrap();
    assert_eq!(leaves, 4);
}

#[test]
fn ordering_across_types() {
    let ctx = TypeContext::new();
    let one = parse(&ctx, "1");
    let one_u8 = parse(&ctx, "1(uint8)");
    let two = parse(&ctx, "2.0");
    let null = parse(&ctx, "null(int64)");
    assert_eq!(compare_values(&one, &one_u8, true), Ordering::Equal);
    assert_eq!(compare_values(&one, &two, true), Ordering::Less);
    assert_eq!(compare_values(&null, &one, true), Ordering::Greater);
    assert_eq!(compare_values(&null, &one, false), Ordering::Less);
}
