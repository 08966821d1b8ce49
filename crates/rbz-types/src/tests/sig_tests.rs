use crate::registry::{ClassId, ClassRegistry};
use crate::shape::{Shape, Ty};
use crate::sigs::{
    match_free_vars, receiver_bindings, resolve_ty_expr, MethodSig, MethodTable, TyExpr,
};
use rbz_common::Interner;
use rustc_hash::{FxHashMap, FxHashSet};

fn setup() -> (Interner, ClassRegistry, MethodTable) {
    let mut interner = Interner::new();
    let registry = ClassRegistry::core(&mut interner);
    let table = MethodTable::core(&mut interner, &registry);
    (interner, registry, table)
}

#[test]
fn query_walks_ancestors() {
    let (mut interner, registry, table) = setup();
    // `dup` is declared on Object; a String receiver should find it.
    let receiver = Shape::Instance {
        class: ClassId::STRING,
        args: Vec::new(),
    };
    let dup = interner.intern("dup");
    let sigs = table.query(&registry, &receiver, dup, &[], None, false);
    assert_eq!(sigs.len(), 1);
}

#[test]
fn query_filters_by_arity() {
    let (mut interner, registry, table) = setup();
    let receiver = Shape::Instance {
        class: ClassId::STRING,
        args: Vec::new(),
    };
    let upcase = interner.intern("upcase");
    let too_many = [Ty::instance(ClassId::INTEGER)];
    assert!(table
        .query(&registry, &receiver, upcase, &too_many, None, false)
        .is_empty());
    assert_eq!(
        table
            .query(&registry, &receiver, upcase, &[], None, false)
            .len(),
        1
    );
}

#[test]
fn query_accepts_any_arity_with_splat_arg() {
    let (mut interner, registry, table) = setup();
    let receiver = Shape::Instance {
        class: ClassId::STRING,
        args: Vec::new(),
    };
    let upcase = interner.intern("upcase");
    let splatted = [Ty::splat(Ty::array_of(Ty::instance(ClassId::STRING)))];
    assert_eq!(
        table
            .query(&registry, &receiver, upcase, &splatted, None, false)
            .len(),
        1
    );
}

#[test]
fn zero_matches_is_empty_not_error() {
    let (mut interner, registry, table) = setup();
    let receiver = Shape::Instance {
        class: ClassId::INTEGER,
        args: Vec::new(),
    };
    let nonsense = interner.intern("definitely_not_a_method");
    assert!(table
        .query(&registry, &receiver, nonsense, &[], None, false)
        .is_empty());
}

#[test]
fn receiver_bindings_seed_generics() {
    let (mut interner, registry, _) = setup();
    let elem = interner.intern("Elem");
    let receiver = Shape::Instance {
        class: ClassId::ARRAY,
        args: vec![Ty::instance(ClassId::INTEGER)],
    };
    let vars = receiver_bindings(&registry, &receiver);
    assert_eq!(vars.get(&elem), Some(&Ty::instance(ClassId::INTEGER)));
}

#[test]
fn match_free_vars_binds_structurally() {
    let mut interner = Interner::new();
    let t = interner.intern("T");
    let mut free = FxHashSet::default();
    free.insert(t);
    let mut bound = FxHashMap::default();
    // Declared (Array[T]), given Array[String]
    let params = [TyExpr::array_of(TyExpr::Var(t))];
    let args = [Ty::array_of(Ty::instance(ClassId::STRING))];
    match_free_vars(&free, &params, &args, &mut bound);
    assert_eq!(bound.get(&t), Some(&Ty::instance(ClassId::STRING)));
}

#[test]
fn repeated_binding_unions() {
    let mut interner = Interner::new();
    let t = interner.intern("T");
    let mut free = FxHashSet::default();
    free.insert(t);
    let mut bound = FxHashMap::default();
    let params = [TyExpr::Var(t), TyExpr::Var(t)];
    let args = [Ty::instance(ClassId::INTEGER), Ty::instance(ClassId::STRING)];
    match_free_vars(&free, &params, &args, &mut bound);
    assert_eq!(bound.get(&t).map(|ty| ty.shapes().len()), Some(2));
}

#[test]
fn resolve_substitutes_and_degrades() {
    let mut interner = Interner::new();
    let t = interner.intern("T");
    let u = interner.intern("U");
    let receiver = Shape::Instance {
        class: ClassId::ARRAY,
        args: Vec::new(),
    };
    let mut vars = FxHashMap::default();
    vars.insert(t, Ty::instance(ClassId::INTEGER));
    // Bound variable substitutes.
    let resolved = resolve_ty_expr(&TyExpr::array_of(TyExpr::Var(t)), &receiver, &vars);
    assert_eq!(resolved, Ty::array_of(Ty::instance(ClassId::INTEGER)));
    // Unbound variable degrades to the unconstrained type.
    let unresolved = resolve_ty_expr(&TyExpr::Var(u), &receiver, &vars);
    assert_eq!(unresolved, Ty::object());
    // SelfType resolves to the receiver shape.
    let self_ty = resolve_ty_expr(&TyExpr::SelfType, &receiver, &vars);
    assert_eq!(self_ty, Ty::from_shape(receiver));
}

#[test]
fn default_signature_is_nullary_returning_nil() {
    let sig = MethodSig::default();
    assert!(sig.type_params.is_empty());
    assert!(sig.required.is_empty());
    assert!(sig.block.is_none());
    assert_eq!(sig.ret, TyExpr::nil());
}

#[test]
fn singleton_methods_live_in_their_own_namespace() {
    let (mut interner, registry, mut table) = setup();
    let parse = interner.intern("parse");
    table.define_singleton(
        ClassId::STRING,
        parse,
        MethodSig::simple(vec![], TyExpr::instance(ClassId::STRING)),
    );
    let class_receiver = Shape::Singleton(ClassId::STRING);
    let instance_receiver = Shape::Instance {
        class: ClassId::STRING,
        args: Vec::new(),
    };
    assert_eq!(
        table
            .query(&registry, &class_receiver, parse, &[], None, false)
            .len(),
        1
    );
    assert!(table
        .query(&registry, &instance_receiver, parse, &[], None, false)
        .is_empty());
}
