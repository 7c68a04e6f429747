use std::{sync::Arc, thread};

use zedcore::{
    field::Path,
    types::{Type, TypeContext},
    value::Value,
    zson,
};
use zedexpr::{
    Assignment, Cutter, Dropper, EvalContext, Expr, Putter, Renamer, Shaper, ShaperFlags, Udf,
    expr::{ArithOp, CompareOp},
    function,
};

// Helpers
fn setup() -> (Arc<TypeContext>, EvalContext) {
    let zctx = Arc::new(TypeContext::new());
    let ectx = EvalContext::new(zctx.clone());
    (zctx, ectx)
}

fn parse(zctx: &TypeContext, src: &str) -> Value {
    zson::parse_value(zctx, src).unwrap()
}

fn field(name: &str) -> Box<Expr> {
    Expr::Dot(Expr::This.boxed(), name.to_string()).boxed()
}

fn path(p: &str) -> Path {
    p.parse().unwrap()
}

fn eval(ectx: &mut EvalContext, e: &Expr, this: &Value) -> String {
    zson::format_value(&e.eval(ectx, this))
}

#[test]
fn arithmetic_over_record_fields() {
    let (zctx, mut ectx) = setup();
    let this = parse(&zctx, r#"{x:10(int32),f:2.5,s:"hello"}"#);

    let add = |lhs: Box<Expr>, rhs: &str| Expr::Arith(ArithOp::Add, lhs, Expr::Literal(parse(&zctx, rhs)).boxed());
    assert_eq!(eval(&mut ectx, &add(field("x"), "5"), &this), "15(int32)");
    assert_eq!(eval(&mut ectx, &add(field("f"), "1.0"), &this), "3.5");
    assert_eq!(
        eval(&mut ectx, &add(field("s"), r#"" world""#), &this),
        r#""hello world""#
    );
}

#[test]
fn signed_unsigned_comparison() {
    let (zctx, mut ectx) = setup();
    let this = parse(&zctx, "{i:-1,u:18446744073709551615(uint64)}");

    let cmp = |op, lhs: &str, rhs: &str| Expr::Compare(op, field(lhs), field(rhs));
    assert_eq!(eval(&mut ectx, &cmp(CompareOp::Eq, "i", "u"), &this), "false");
    assert_eq!(eval(&mut ectx, &cmp(CompareOp::Lt, "i", "u"), &this), "true");
    assert_eq!(eval(&mut ectx, &cmp(CompareOp::Gt, "u", "i"), &this), "true");
}

#[test]
fn missing_fields_and_coalesce() {
    let (zctx, mut ectx) = setup();
    let this = parse(&zctx, "{a:null,b:3}");

    let seven = Expr::Literal(Value::int64(7));
    let coalesce = function::compile("coalesce", vec![*field("a"), *field("b"), seven]).unwrap();
    assert_eq!(eval(&mut ectx, &coalesce, &this), "3");

    let missing = function::compile("missing", vec![*field("c")]).unwrap();
    assert_eq!(eval(&mut ectx, &missing, &this), "true");

    let has = function::compile("has", vec![*field("b")]).unwrap();
    assert_eq!(eval(&mut ectx, &has, &this), "true");
}

#[test]
fn cut_put_rename() {
    let (zctx, mut ectx) = setup();
    let flow = parse(&zctx, r#"{id:{src:"1.1.1.1",dst:"2.2.2.2"},n:1}"#);

    let cut = Expr::Cut(Cutter::new(vec![path("id.src")]).unwrap());
    assert_eq!(eval(&mut ectx, &cut, &flow), r#"{id:{src:"1.1.1.1"}}"#);

    let put = Expr::Put(
        Putter::new(vec![Assignment {
            lhs: path("m"),
            rhs: Expr::Arith(ArithOp::Add, field("n"), Expr::Literal(Value::int64(1)).boxed()),
        }])
        .unwrap(),
    );
    assert_eq!(
        eval(&mut ectx, &put, &flow),
        r#"{id:{src:"1.1.1.1",dst:"2.2.2.2"},n:1,m:2}"#
    );

    let rename = Expr::Rename(Renamer::new(vec![(path("id.src"), path("id.origin"))]).unwrap());
    assert_eq!(
        eval(&mut ectx, &rename, &flow),
        r#"{id:{origin:"1.1.1.1",dst:"2.2.2.2"},n:1}"#
    );
}

#[test]
fn shaping_with_every_flag() {
    let (zctx, mut ectx) = setup();
    let target = zson::parse_type(&zctx, "{a:int64,c:float64}").unwrap();
    let shaper = Expr::Shaper(Shaper::new(
        Expr::This,
        Expr::Literal(zctx.lookup_type_value(&target)),
        ShaperFlags::FILL | ShaperFlags::CAST | ShaperFlags::ORDER | ShaperFlags::CROP,
    ));
    let this = parse(&zctx, r#"{b:2,a:"1"}"#);
    assert_eq!(eval(&mut ectx, &shaper, &this), "{a:1,c:null(float64)}");

    let by_name = function::compile("shape", vec![Expr::Literal(zctx.lookup_type_value(&target))]).unwrap();
    assert_eq!(eval(&mut ectx, &by_name, &this), "{a:1,c:null(float64)}");
}

#[test]
fn evaluation_leaves_context_reusable() {
    let (zctx, mut ectx) = setup();
    let e = function::compile("len", vec![*field("xs")]).unwrap();
    for (src, want) in [("{xs:[1,2,3]}", "3"), (r#"{xs:["a"]}"#, "1"), ("{xs:[1,2,3]}", "3")] {
        assert_eq!(eval(&mut ectx, &e, &parse(&zctx, src)), want);
    }
    assert_eq!(ectx.depth(), 0);
}

#[test]
fn cut_drop_rename_through_unions() {
    let (zctx, mut ectx) = setup();
    let u = "(({b:int64,x:int64},{b:string,x:int64}))";
    let ints = parse(&zctx, &format!("{{a:{{b:1,x:5}}{u},c:1}}"));
    let strs = parse(&zctx, &format!(r#"{{a:{{b:"s",x:6}}{u},c:2}}"#));
    assert_eq!(ints.ty(), strs.ty());

    let cut = Expr::Cut(Cutter::new(vec![path("a.b"), path("c")]).unwrap());
    assert_eq!(eval(&mut ectx, &cut, &ints), "{a:{b:1},c:1}");
    assert_eq!(eval(&mut ectx, &cut, &strs), r#"{a:{b:"s"},c:2}"#);

    let drop = Expr::Drop(Dropper::new(vec![path("a.b")]).unwrap());
    assert_eq!(eval(&mut ectx, &drop, &strs), "{a:{x:6},c:2}");
    assert_eq!(eval(&mut ectx, &drop, &ints), "{a:{x:5},c:1}");

    // Field names inside a union member are not renamed.
    let rename = Expr::Rename(Renamer::new(vec![(path("a.b"), path("a.y")), (path("c"), path("d"))]).unwrap());
    for this in [&ints, &strs] {
        let out = rename.eval(&mut ectx, this);
        assert!(!out.is_error(), "{out}");
        assert_eq!(out.deref_path(&["a", "b"]), this.deref_path(&["a", "b"]));
        assert_eq!(out.deref("d"), this.deref("c"));
        assert!(out.deref("c").is_none());
    }
}

#[test]
fn threads_share_one_type_context() {
    let zctx = Arc::new(TypeContext::new());
    let cut = Expr::Cut(Cutter::new(vec![path("id.src")]).unwrap());
    let types: Vec<(Type, Type)> = thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|t| {
                let (zctx, cut) = (zctx.clone(), &cut);
                s.spawn(move || {
                    let mut ectx = EvalContext::new(zctx.clone());
                    let put = Expr::Put(
                        Putter::new(vec![Assignment {
                            lhs: path("m"),
                            rhs: Expr::Arith(ArithOp::Add, field("n"), Expr::Literal(Value::int64(1)).boxed()),
                        }])
                        .unwrap(),
                    );
                    let mut last = None;
                    for i in 0..200i64 {
                        let this = parse(&zctx, &format!(r#"{{id:{{src:"10.0.0.{t}",dst:"10.0.1.{t}"}},n:{i}}}"#));
                        let put_out = put.eval(&mut ectx, &this);
                        assert_eq!(put_out.deref("m").map(|m| m.as_int()), Some(i + 1));
                        let cut_out = cut.eval(&mut ectx, &this);
                        assert_eq!(eval(&mut ectx, cut, &this), format!(r#"{{id:{{src:"10.0.0.{t}"}}}}"#));
                        last = Some((put_out.ty().clone(), cut_out.ty().clone()));
                    }
                    last.unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert!(types.windows(2).all(|w| w[0] == w[1]));
    let (put_ty, cut_ty) = &types[0];
    assert_eq!(Some(put_ty.clone()), zson::parse_type(&zctx, "{id:{src:string,dst:string},n:int64,m:int64}").ok());
    assert_eq!(Some(cut_ty.clone()), zson::parse_type(&zctx, "{id:{src:string}}").ok());
}

#[test]
fn recursion_to_the_default_depth_limit() {
    let (zctx, mut ectx) = setup();
    let slot = ectx.next_udf_slot();
    let n = || Expr::Var(0).boxed();
    let zero = || Expr::Literal(Value::int64(0)).boxed();
    let body = Expr::Conditional(
        Expr::Compare(CompareOp::Le, n(), zero()).boxed(),
        zero(),
        Expr::UdfCall(slot, vec![Expr::Arith(ArithOp::Sub, n(), Expr::Literal(Value::int64(1)).boxed())]).boxed(),
    );
    ectx.declare_udf(Udf {
        name: "countdown".into(),
        params: vec!["n".into()],
        body,
    });
    let call = Expr::UdfCall(slot, vec![*field("n")]);

    assert_eq!(eval(&mut ectx, &call, &parse(&zctx, "{n:9000}")), "0");
    let out = call.eval(&mut ectx, &parse(&zctx, "{n:20000}"));
    assert!(out.is_error(), "{out}");
    assert!(zson::format_value(&out).contains("countdown: stack overflow"));
    assert_eq!(ectx.depth(), 0);
    assert_eq!(eval(&mut ectx, &call, &parse(&zctx, "{n:3}")), "0");
}
