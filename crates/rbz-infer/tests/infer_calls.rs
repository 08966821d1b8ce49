//! Call resolution: signature lookup, generics, blocks, safe
//! navigation, splats, and the conversion fallbacks.

mod common;

use common::{classes, has_class, Fixture};
use rbz_syntax::{Arg, BlockArg, Node, ParamDecl, Params};
use rbz_types::{ClassId, MethodSig, Ty, TyExpr};

#[test]
fn arithmetic_resolves_through_the_signature_table() {
    let mut f = Fixture::new();
    // 1 + 2
    let lhs = f.int();
    let rhs = f.int();
    let sum = f.call(Some(lhs), "+", vec![rhs]);
    let root = f.stmts(vec![sum]);

    let ty = f.infer(root, &[root], sum);
    assert_eq!(classes(&ty), vec![ClassId::INTEGER]);
}

#[test]
fn receiver_generics_flow_into_the_return_type() {
    let mut f = Fixture::new();
    f.seed_local("xs", Ty::array_of(Ty::instance(ClassId::INTEGER)));
    // xs.first
    let recv = f.lvar("xs");
    let call = f.call(Some(recv), "first", vec![]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert!(has_class(&ty, ClassId::INTEGER));
    assert!(ty.nillable());
}

#[test]
fn union_receiver_unions_every_shape_response() {
    let mut f = Fixture::new();
    // [1, "a"].first
    let one = f.int();
    let s = f.string();
    let arr = f.node(Node::ArrayLit {
        elements: vec![Arg::Positional(one), Arg::Positional(s)],
    });
    let call = f.call(Some(arr), "first", vec![]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert!(has_class(&ty, ClassId::INTEGER));
    assert!(has_class(&ty, ClassId::STRING));
    assert!(ty.nillable());
}

#[test]
fn block_result_binds_return_position_variables() {
    let mut f = Fixture::new();
    f.seed_local("xs", Ty::array_of(Ty::instance(ClassId::INTEGER)));
    // xs.map { |x| x.to_s }
    let recv = f.lvar("xs");
    let x = f.atom("x");
    let x_read = f.lvar("x");
    let body = f.call(Some(x_read), "to_s", vec![]);
    let name = f.atom("map");
    let call = f.node(Node::Call {
        receiver: Some(recv),
        safe: false,
        name,
        args: Vec::new(),
        kwargs: Vec::new(),
        block: Some(BlockArg::Literal {
            params: Params {
                required: vec![ParamDecl::Name(x)],
                ..Params::default()
            },
            body: Some(body),
        }),
    });
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    let elem = ty.array_element().expect("map returns an array");
    assert_eq!(classes(&elem), vec![ClassId::STRING]);
}

#[test]
fn block_parameters_take_the_yielded_types() {
    let mut f = Fixture::new();
    f.seed_local("xs", Ty::array_of(Ty::instance(ClassId::INTEGER)));
    // xs.each { |x| x }  -- target is the parameter read
    let recv = f.lvar("xs");
    let x = f.atom("x");
    let body = f.lvar("x");
    let name = f.atom("each");
    let call = f.node(Node::Call {
        receiver: Some(recv),
        safe: false,
        name,
        args: Vec::new(),
        kwargs: Vec::new(),
        block: Some(BlockArg::Literal {
            params: Params {
                required: vec![ParamDecl::Name(x)],
                ..Params::default()
            },
            body: Some(body),
        }),
    });
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root, call], body);
    assert_eq!(classes(&ty), vec![ClassId::INTEGER]);
}

#[test]
fn break_inside_a_block_extends_the_call_result() {
    let mut f = Fixture::new();
    f.seed_local("xs", Ty::array_of(Ty::instance(ClassId::INTEGER)));
    // xs.each { break "done" }
    let recv = f.lvar("xs");
    let done = f.string();
    let brk = f.node(Node::Break(Some(done)));
    let name = f.atom("each");
    let call = f.node(Node::Call {
        receiver: Some(recv),
        safe: false,
        name,
        args: Vec::new(),
        kwargs: Vec::new(),
        block: Some(BlockArg::Literal {
            params: Params::default(),
            body: Some(brk),
        }),
    });
    let root = f.stmts(vec![call]);

    // each returns self; break contributes the String
    let ty = f.infer(root, &[root], call);
    assert!(has_class(&ty, ClassId::ARRAY));
    assert!(has_class(&ty, ClassId::STRING));
}

#[test]
fn safe_navigation_on_a_nillable_receiver_keeps_nil() {
    let mut f = Fixture::new();
    f.seed_local(
        "x",
        Ty::union([Ty::instance(ClassId::STRING), Ty::nil()]),
    );
    // x&.upcase
    let recv = f.lvar("x");
    let name = f.atom("upcase");
    let call = f.node(Node::Call {
        receiver: Some(recv),
        safe: true,
        name,
        args: Vec::new(),
        kwargs: Vec::new(),
        block: None,
    });
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert!(has_class(&ty, ClassId::STRING));
    assert!(ty.nillable());
}

#[test]
fn safe_navigation_on_a_plain_receiver_adds_no_nil() {
    let mut f = Fixture::new();
    f.seed_local("x", Ty::instance(ClassId::STRING));
    let recv = f.lvar("x");
    let name = f.atom("upcase");
    let call = f.node(Node::Call {
        receiver: Some(recv),
        safe: true,
        name,
        args: Vec::new(),
        kwargs: Vec::new(),
        block: None,
    });
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert_eq!(classes(&ty), vec![ClassId::STRING]);
}

#[test]
fn safe_navigation_on_nil_is_nil() {
    let mut f = Fixture::new();
    f.seed_local("x", Ty::nil());
    let recv = f.lvar("x");
    let name = f.atom("upcase");
    let call = f.node(Node::Call {
        receiver: Some(recv),
        safe: true,
        name,
        args: Vec::new(),
        kwargs: Vec::new(),
        block: None,
    });
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert!(ty.is_nil());
}

#[test]
fn splatting_an_array_spreads_its_element() {
    let mut f = Fixture::new();
    f.seed_local("xs", Ty::array_of(Ty::instance(ClassId::INTEGER)));
    // [*xs]
    let recv = f.lvar("xs");
    let arr = f.node(Node::ArrayLit {
        elements: vec![Arg::Splat(recv)],
    });
    let root = f.stmts(vec![arr]);

    let ty = f.infer(root, &[root], arr);
    let elem = ty.array_element().expect("literal is an array");
    assert_eq!(classes(&elem), vec![ClassId::INTEGER]);
}

#[test]
fn splatting_a_scalar_keeps_its_own_type() {
    let mut f = Fixture::new();
    f.seed_local("n", Ty::instance(ClassId::INTEGER));
    // [*n] -- Integer declares no array conversion, so it stays Integer
    let recv = f.lvar("n");
    let arr = f.node(Node::ArrayLit {
        elements: vec![Arg::Splat(recv)],
    });
    let root = f.stmts(vec![arr]);

    let ty = f.infer(root, &[root], arr);
    let elem = ty.array_element().expect("literal is an array");
    assert_eq!(classes(&elem), vec![ClassId::INTEGER]);
}

#[test]
fn splatting_a_range_uses_its_conversion() {
    let mut f = Fixture::new();
    f.seed_local(
        "r",
        Ty::instance_with(ClassId::RANGE, vec![Ty::instance(ClassId::INTEGER)]),
    );
    // [*r] -- Range#to_a declares Array[Elem]
    let recv = f.lvar("r");
    let arr = f.node(Node::ArrayLit {
        elements: vec![Arg::Splat(recv)],
    });
    let root = f.stmts(vec![arr]);

    let ty = f.infer(root, &[root], arr);
    let elem = ty.array_element().expect("literal is an array");
    assert_eq!(classes(&elem), vec![ClassId::INTEGER]);
}

#[test]
fn new_on_a_class_object_yields_an_instance() {
    let mut f = Fixture::new();
    // String.new
    let recv = f.const_ref("String");
    let call = f.call(Some(recv), "new", vec![]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert_eq!(classes(&ty), vec![ClassId::STRING]);
}

#[test]
fn conversion_candidates_union_with_declared_signatures() {
    let mut f = Fixture::new();
    f.seed_local(
        "r",
        Ty::instance_with(ClassId::RANGE, vec![Ty::instance(ClassId::INTEGER)]),
    );
    // r.to_a: Range#to_a declares Array[Integer]; the conversion name
    // contributes a plain Array on top of it
    let recv = f.lvar("r");
    let call = f.call(Some(recv), "to_a", vec![]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert!(has_class(&ty, ClassId::ARRAY));
    assert_eq!(ty.shapes().len(), 2);
}

#[test]
fn new_contributes_an_instance_alongside_declared_signatures() {
    let mut f = Fixture::new();
    let new_name = f.atom("new");
    f.table.define_singleton(
        ClassId::STRING,
        new_name,
        MethodSig::simple(vec![], TyExpr::instance(ClassId::SYMBOL)),
    );
    // String.new resolves the declared signature and still yields the
    // instance candidate
    let recv = f.const_ref("String");
    let call = f.call(Some(recv), "new", vec![]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert!(has_class(&ty, ClassId::SYMBOL));
    assert!(has_class(&ty, ClassId::STRING));
}

#[test]
fn conversion_methods_fall_back_by_name() {
    let mut f = Fixture::new();
    f.seed_local("n", Ty::instance(ClassId::INTEGER));
    // n.to_s has no table entry; the conversion protocol answers
    let recv = f.lvar("n");
    let call = f.call(Some(recv), "to_s", vec![]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert_eq!(classes(&ty), vec![ClassId::STRING]);
}

#[test]
fn unresolvable_calls_degrade_to_nil() {
    let mut f = Fixture::new();
    f.seed_local("n", Ty::instance(ClassId::INTEGER));
    let recv = f.lvar("n");
    let call = f.call(Some(recv), "frobnicate", vec![]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    assert!(ty.is_nil());
}

#[test]
fn self_returning_methods_echo_the_receiver() {
    let mut f = Fixture::new();
    f.seed_local("xs", Ty::array_of(Ty::instance(ClassId::INTEGER)));
    // xs.push(3)
    let recv = f.lvar("xs");
    let arg = f.int();
    let call = f.call(Some(recv), "push", vec![arg]);
    let root = f.stmts(vec![call]);

    let ty = f.infer(root, &[root], call);
    let elem = ty.array_element().expect("push returns the array");
    assert_eq!(classes(&elem), vec![ClassId::INTEGER]);
}

#[test]
fn indexing_resolves_as_a_bracket_call() {
    let mut f = Fixture::new();
    f.seed_local("xs", Ty::array_of(Ty::instance(ClassId::STRING)));
    // xs[0]
    let recv = f.lvar("xs");
    let idx = f.int();
    let index = f.node(Node::Index {
        receiver: recv,
        args: vec![Arg::Positional(idx)],
    });
    let root = f.stmts(vec![index]);

    let ty = f.infer(root, &[root], index);
    assert!(has_class(&ty, ClassId::STRING));
    assert!(ty.nillable());
}

#[test]
fn raise_stops_subsequent_bindings() {
    let mut f = Fixture::new();
    // x = 1; raise; x = "s"; <probe>
    let one = f.int();
    let early = f.assign_local("x", one);
    let raise = f.call(None, "raise", vec![]);
    let s = f.string();
    let late = f.assign_local("x", s);
    let probe = f.node(Node::Nil);
    let root = f.stmts(vec![early, raise, late, probe]);

    let x = f.atom("x");
    let snapshot = f.scope_at(root, &[root], probe);
    let ty = snapshot.get(rbz_syntax::VarKind::Local, x).expect("x is bound");
    assert_eq!(classes(ty), vec![ClassId::INTEGER]);
}

#[test]
fn rescue_modifier_unions_body_and_fallback() {
    let mut f = Fixture::new();
    let body = f.int();
    let fallback = f.string();
    let rescued = f.node(Node::RescueMod { body, fallback });
    let root = f.stmts(vec![rescued]);

    let ty = f.infer(root, &[root], rescued);
    assert!(has_class(&ty, ClassId::INTEGER));
    assert!(has_class(&ty, ClassId::STRING));
}
