use crate::registry::{ClassId, ClassRegistry};
use crate::shape::Ty;
use rbz_common::limits::MAX_UNION_SHAPES;
use rbz_common::Interner;

#[test]
fn union_deduplicates() {
    let a = Ty::instance(ClassId::INTEGER);
    let b = Ty::instance(ClassId::INTEGER);
    let union = Ty::union([a, b, Ty::instance(ClassId::STRING)]);
    assert_eq!(union.shapes().len(), 2);
}

#[test]
fn union_flattens_nested() {
    let inner = Ty::union([Ty::instance(ClassId::INTEGER), Ty::nil()]);
    let outer = Ty::union([inner, Ty::instance(ClassId::STRING)]);
    assert_eq!(outer.shapes().len(), 3);
    assert!(outer.nillable());
}

#[test]
fn empty_union_is_never() {
    let empty = Ty::union(std::iter::empty());
    assert!(empty.is_never());
    assert!(!empty.nillable());
}

#[test]
fn nonnillable_strips_nil() {
    let union = Ty::union([Ty::instance(ClassId::STRING), Ty::nil()]);
    assert!(union.nillable());
    let stripped = union.nonnillable();
    assert!(!stripped.nillable());
    assert_eq!(stripped.shapes().len(), 1);
}

#[test]
fn oversized_union_collapses_to_object() {
    let mut interner = Interner::new();
    let mut registry = ClassRegistry::core(&mut interner);
    let mut parts = Vec::new();
    for i in 0..(MAX_UNION_SHAPES + 8) {
        let name = interner.intern(&format!("Generated{i}"));
        let id = registry.define(name, Some(ClassId::OBJECT), Vec::new(), true);
        parts.push(Ty::instance(id));
    }
    let collapsed = Ty::union(parts);
    assert_eq!(collapsed, Ty::object());
}

#[test]
fn array_element_unions_across_candidates() {
    let union = Ty::union([
        Ty::array_of(Ty::instance(ClassId::INTEGER)),
        Ty::array_of(Ty::instance(ClassId::STRING)),
        Ty::instance(ClassId::SYMBOL),
    ]);
    let elem = union.array_element().expect("has array candidates");
    assert_eq!(elem.shapes().len(), 2);
}

#[test]
fn array_element_absent_without_array_shape() {
    assert!(Ty::instance(ClassId::STRING).array_element().is_none());
}

#[test]
fn hash_key_value_unions() {
    let union = Ty::union([
        Ty::hash_of(Ty::instance(ClassId::SYMBOL), Ty::instance(ClassId::INTEGER)),
        Ty::hash_of(Ty::instance(ClassId::STRING), Ty::nil()),
    ]);
    let (k, v) = union.hash_key_value().expect("hash candidates");
    assert_eq!(k.shapes().len(), 2);
    assert!(v.nillable());
}
