//! Method signature database and generic unification.
//!
//! Signatures describe parameter and return types symbolically with
//! [`TyExpr`]; free type variables are resolved per call site by
//! structurally matching declared parameter expressions against the
//! concrete argument types, seeded with the receiver's own generic
//! bindings. This is a one-shot substitution-map discipline: the first
//! structural match binds a variable, repeated matches union into it.

use crate::registry::{ClassId, ClassRegistry};
use crate::shape::{Shape, Ty};
use rbz_common::{Atom, Interner};
use rustc_hash::{FxHashMap, FxHashSet};

/// Symbolic type expression used in method signatures.
#[derive(Clone, Debug, PartialEq)]
pub enum TyExpr {
    /// An instance of a class, possibly with generic arguments.
    Instance { class: ClassId, args: Vec<TyExpr> },
    /// A type variable: either one of the signature's own type
    /// parameters or a generic parameter of the receiver's class.
    Var(Atom),
    Union(Vec<TyExpr>),
    /// The receiver's type.
    SelfType,
}

impl TyExpr {
    pub fn instance(class: ClassId) -> TyExpr {
        TyExpr::Instance {
            class,
            args: Vec::new(),
        }
    }

    pub fn nil() -> TyExpr {
        TyExpr::instance(ClassId::NIL)
    }

    pub fn boolean() -> TyExpr {
        TyExpr::Union(vec![
            TyExpr::instance(ClassId::TRUE),
            TyExpr::instance(ClassId::FALSE),
        ])
    }

    /// `T | nil`
    pub fn nilable(inner: TyExpr) -> TyExpr {
        TyExpr::Union(vec![inner, TyExpr::nil()])
    }

    pub fn array_of(elem: TyExpr) -> TyExpr {
        TyExpr::Instance {
            class: ClassId::ARRAY,
            args: vec![elem],
        }
    }
}

/// Declared block parameter of a signature.
#[derive(Clone, Debug)]
pub struct BlockSpec {
    /// Types of the values yielded to the block.
    pub params: Vec<TyExpr>,
    /// `self` inside the block, when rebound (`instance_eval` style).
    pub self_type: Option<TyExpr>,
    /// Declared block return type; a free variable here is resolved
    /// from the block body's actual result.
    pub ret: TyExpr,
}

/// One method signature.
#[derive(Clone, Debug)]
pub struct MethodSig {
    /// Free/generic variables introduced by this signature.
    pub type_params: Vec<Atom>,
    pub required: Vec<TyExpr>,
    pub optional: Vec<TyExpr>,
    pub rest: Option<TyExpr>,
    pub keywords: Vec<(Atom, TyExpr)>,
    pub block: Option<BlockSpec>,
    pub ret: TyExpr,
}

impl Default for MethodSig {
    /// A nullary signature returning nil.
    fn default() -> MethodSig {
        MethodSig {
            type_params: Vec::new(),
            required: Vec::new(),
            optional: Vec::new(),
            rest: None,
            keywords: Vec::new(),
            block: None,
            ret: TyExpr::nil(),
        }
    }
}

impl MethodSig {
    /// Simple `(required...) -> ret` signature.
    pub fn simple(required: Vec<TyExpr>, ret: TyExpr) -> MethodSig {
        MethodSig {
            required,
            ret,
            ..MethodSig::default()
        }
    }

    /// Positional-arity compatibility. Splat-marked arguments defeat
    /// exact counting, so their presence accepts any declared arity.
    fn accepts_arity(&self, pos_args: &[Ty]) -> bool {
        let has_splat = pos_args
            .iter()
            .any(|a| a.shapes().iter().any(|s| matches!(s, Shape::Splat(_))));
        if has_splat {
            return true;
        }
        let n = pos_args.len();
        let min = self.required.len();
        if n < min {
            return false;
        }
        if self.rest.is_some() {
            return true;
        }
        n <= min + self.optional.len()
    }

    /// Declared parameter expressions aligned against the given
    /// arguments, for unification.
    pub fn aligned_params(&self, pos_args: &[Ty]) -> Vec<TyExpr> {
        let mut params: Vec<TyExpr> = Vec::with_capacity(pos_args.len());
        for i in 0..pos_args.len() {
            if i < self.required.len() {
                params.push(self.required[i].clone());
            } else if i < self.required.len() + self.optional.len() {
                params.push(self.optional[i - self.required.len()].clone());
            } else if let Some(rest) = &self.rest {
                params.push(rest.clone());
            }
        }
        params
    }
}

/// The signature resolver consumed by the call evaluator.
#[derive(Default)]
pub struct MethodTable {
    instance_methods: FxHashMap<(ClassId, Atom), Vec<MethodSig>>,
    singleton_methods: FxHashMap<(ClassId, Atom), Vec<MethodSig>>,
}

impl MethodTable {
    pub fn new() -> Self {
        MethodTable::default()
    }

    pub fn define(&mut self, class: ClassId, name: Atom, sig: MethodSig) {
        self.instance_methods
            .entry((class, name))
            .or_default()
            .push(sig);
    }

    pub fn define_singleton(&mut self, class: ClassId, name: Atom, sig: MethodSig) {
        self.singleton_methods
            .entry((class, name))
            .or_default()
            .push(sig);
    }

    /// Find signatures matching a receiver shape, method name, and
    /// argument profile. The receiver's ancestor chain is searched
    /// nearest-first; the first class that declares the name at all
    /// shadows the rest (Ruby method resolution order, flattened).
    ///
    /// Keyword arguments and block presence do not filter: signatures
    /// never mark a keyword or block as required, so both parameters
    /// are accepted permissively and a supplying/omitting mismatch
    /// still matches.
    ///
    /// Zero matches is an expected outcome, not an error.
    pub fn query(
        &self,
        registry: &ClassRegistry,
        receiver: &Shape,
        name: Atom,
        pos_args: &[Ty],
        _kw_args: Option<&Ty>,
        _has_block: bool,
    ) -> Vec<&MethodSig> {
        let (table, start) = match receiver {
            Shape::Instance { class, .. } => (&self.instance_methods, *class),
            Shape::Singleton(class) => (&self.singleton_methods, *class),
            Shape::Proc => (&self.instance_methods, ClassId::PROC),
            Shape::Splat(_) => return Vec::new(),
        };
        for ancestor in registry.ancestors(start) {
            if let Some(sigs) = table.get(&(ancestor, name)) {
                return sigs.iter().filter(|s| s.accepts_arity(pos_args)).collect();
            }
        }
        Vec::new()
    }
}

/// Seed unification variables from the receiver's generic bindings:
/// an `Array[Integer]` receiver binds `Elem` before the signature's
/// own parameters are considered.
pub fn receiver_bindings(registry: &ClassRegistry, receiver: &Shape) -> FxHashMap<Atom, Ty> {
    let mut vars = FxHashMap::default();
    if let Shape::Instance { class, args } = receiver {
        for (name, arg) in registry.type_params(*class).iter().zip(args.iter()) {
            vars.insert(*name, arg.clone());
        }
    }
    vars
}

/// Structurally match declared parameter expressions against concrete
/// argument types, binding the named free variables. A variable bound
/// more than once accumulates a union.
pub fn match_free_vars(
    free: &FxHashSet<Atom>,
    params: &[TyExpr],
    args: &[Ty],
    bound: &mut FxHashMap<Atom, Ty>,
) {
    for (param, arg) in params.iter().zip(args.iter()) {
        match_one(free, param, arg, bound);
    }
}

fn match_one(free: &FxHashSet<Atom>, param: &TyExpr, arg: &Ty, bound: &mut FxHashMap<Atom, Ty>) {
    match param {
        TyExpr::Var(name) => {
            if free.contains(name) {
                let merged = match bound.get(name) {
                    Some(prev) => prev.or(arg),
                    None => arg.clone(),
                };
                bound.insert(*name, merged);
            }
        }
        TyExpr::Instance { class, args } => {
            for shape_args in arg.instances_of(*class) {
                for (sub_param, sub_arg) in args.iter().zip(shape_args.iter()) {
                    match_one(free, sub_param, sub_arg, bound);
                }
            }
        }
        TyExpr::Union(parts) => {
            for part in parts {
                match_one(free, part, arg, bound);
            }
        }
        TyExpr::SelfType => {}
    }
}

/// Substitute resolved variables into a declared type expression.
/// Unresolved variables degrade to the unconstrained type.
pub fn resolve_ty_expr(expr: &TyExpr, receiver: &Shape, vars: &FxHashMap<Atom, Ty>) -> Ty {
    match expr {
        TyExpr::Var(name) => vars.get(name).cloned().unwrap_or_else(Ty::object),
        TyExpr::Instance { class, args } => {
            let resolved = args
                .iter()
                .map(|a| resolve_ty_expr(a, receiver, vars))
                .collect();
            Ty::instance_with(*class, resolved)
        }
        TyExpr::Union(parts) => Ty::union(
            parts
                .iter()
                .map(|p| resolve_ty_expr(p, receiver, vars))
                .collect::<Vec<_>>(),
        ),
        TyExpr::SelfType => Ty::from_shape(receiver.clone()),
    }
}

impl MethodTable {
    /// A small core-library table: enough of Array/Hash/String/Integer
    /// and the `Object` protocol for the simulator to give useful
    /// answers without an external signature source. Callers with a
    /// real signature database build their own table instead.
    pub fn core(interner: &mut Interner, registry: &ClassRegistry) -> Self {
        let mut table = MethodTable::new();
        let elem = interner.intern("Elem");
        let key = interner.intern("K");
        let value = interner.intern("V");
        let t = interner.intern("T");
        let _ = registry;

        // Array
        let first = MethodSig::simple(vec![], TyExpr::nilable(TyExpr::Var(elem)));
        table.define(ClassId::ARRAY, interner.intern("first"), first.clone());
        table.define(ClassId::ARRAY, interner.intern("last"), first.clone());
        table.define(ClassId::ARRAY, interner.intern("sample"), first);
        table.define(
            ClassId::ARRAY,
            interner.intern("[]"),
            MethodSig::simple(
                vec![TyExpr::instance(ClassId::INTEGER)],
                TyExpr::nilable(TyExpr::Var(elem)),
            ),
        );
        let len = MethodSig::simple(vec![], TyExpr::instance(ClassId::INTEGER));
        table.define(ClassId::ARRAY, interner.intern("size"), len.clone());
        table.define(ClassId::ARRAY, interner.intern("length"), len.clone());
        table.define(
            ClassId::ARRAY,
            interner.intern("map"),
            MethodSig {
                type_params: vec![t],
                block: Some(BlockSpec {
                    params: vec![TyExpr::Var(elem)],
                    self_type: None,
                    ret: TyExpr::Var(t),
                }),
                ret: TyExpr::array_of(TyExpr::Var(t)),
                ..MethodSig::default()
            },
        );
        table.define(
            ClassId::ARRAY,
            interner.intern("each"),
            MethodSig {
                block: Some(BlockSpec {
                    params: vec![TyExpr::Var(elem)],
                    self_type: None,
                    ret: TyExpr::instance(ClassId::OBJECT),
                }),
                ret: TyExpr::SelfType,
                ..MethodSig::default()
            },
        );
        table.define(
            ClassId::ARRAY,
            interner.intern("push"),
            MethodSig {
                required: vec![TyExpr::Var(elem)],
                rest: Some(TyExpr::Var(elem)),
                ret: TyExpr::SelfType,
                ..MethodSig::default()
            },
        );

        // Hash
        table.define(
            ClassId::HASH,
            interner.intern("[]"),
            MethodSig::simple(vec![TyExpr::Var(key)], TyExpr::nilable(TyExpr::Var(value))),
        );
        table.define(
            ClassId::HASH,
            interner.intern("fetch"),
            MethodSig::simple(vec![TyExpr::Var(key)], TyExpr::Var(value)),
        );
        table.define(
            ClassId::HASH,
            interner.intern("keys"),
            MethodSig::simple(vec![], TyExpr::array_of(TyExpr::Var(key))),
        );
        table.define(
            ClassId::HASH,
            interner.intern("values"),
            MethodSig::simple(vec![], TyExpr::array_of(TyExpr::Var(value))),
        );

        // String
        for name in ["upcase", "downcase", "strip", "reverse", "capitalize"] {
            table.define(
                ClassId::STRING,
                interner.intern(name),
                MethodSig::simple(vec![], TyExpr::instance(ClassId::STRING)),
            );
        }
        table.define(ClassId::STRING, interner.intern("size"), len.clone());
        table.define(ClassId::STRING, interner.intern("length"), len.clone());
        table.define(
            ClassId::STRING,
            interner.intern("chars"),
            MethodSig::simple(vec![], TyExpr::array_of(TyExpr::instance(ClassId::STRING))),
        );
        table.define(
            ClassId::STRING,
            interner.intern("split"),
            MethodSig {
                optional: vec![TyExpr::instance(ClassId::STRING)],
                ret: TyExpr::array_of(TyExpr::instance(ClassId::STRING)),
                ..MethodSig::default()
            },
        );
        table.define(
            ClassId::STRING,
            interner.intern("+"),
            MethodSig::simple(
                vec![TyExpr::instance(ClassId::STRING)],
                TyExpr::instance(ClassId::STRING),
            ),
        );

        // Integer / Float arithmetic
        for op in ["+", "-", "*"] {
            table.define(
                ClassId::INTEGER,
                interner.intern(op),
                MethodSig::simple(
                    vec![TyExpr::instance(ClassId::INTEGER)],
                    TyExpr::instance(ClassId::INTEGER),
                ),
            );
            table.define(
                ClassId::FLOAT,
                interner.intern(op),
                MethodSig::simple(
                    vec![TyExpr::Union(vec![
                        TyExpr::instance(ClassId::INTEGER),
                        TyExpr::instance(ClassId::FLOAT),
                    ])],
                    TyExpr::instance(ClassId::FLOAT),
                ),
            );
        }
        table.define(
            ClassId::INTEGER,
            interner.intern("succ"),
            MethodSig::simple(vec![], TyExpr::instance(ClassId::INTEGER)),
        );
        table.define(
            ClassId::INTEGER,
            interner.intern("zero?"),
            MethodSig::simple(vec![], TyExpr::boolean()),
        );
        table.define(
            ClassId::INTEGER,
            interner.intern("times"),
            MethodSig {
                block: Some(BlockSpec {
                    params: vec![TyExpr::instance(ClassId::INTEGER)],
                    self_type: None,
                    ret: TyExpr::instance(ClassId::OBJECT),
                }),
                ret: TyExpr::SelfType,
                ..MethodSig::default()
            },
        );

        // Range
        table.define(
            ClassId::RANGE,
            interner.intern("first"),
            MethodSig::simple(vec![], TyExpr::nilable(TyExpr::Var(elem))),
        );
        table.define(
            ClassId::RANGE,
            interner.intern("to_a"),
            MethodSig::simple(vec![], TyExpr::array_of(TyExpr::Var(elem))),
        );

        // Object protocol available on every receiver
        for name in ["dup", "clone", "itself", "freeze", "tap"] {
            table.define(
                ClassId::OBJECT,
                interner.intern(name),
                MethodSig::simple(vec![], TyExpr::SelfType),
            );
        }
        table.define(
            ClassId::OBJECT,
            interner.intern("inspect"),
            MethodSig::simple(vec![], TyExpr::instance(ClassId::STRING)),
        );
        table.define(
            ClassId::OBJECT,
            interner.intern("nil?"),
            MethodSig::simple(vec![], TyExpr::boolean()),
        );
        table.define(
            ClassId::OBJECT,
            interner.intern("frozen?"),
            MethodSig::simple(vec![], TyExpr::boolean()),
        );

        table
    }
}
