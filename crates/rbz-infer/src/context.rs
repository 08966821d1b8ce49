//! Seeding the root environment from the caller's live context.
//!
//! A REPL knows its binding: local names, instance variables on the
//! current `self`, globals. Callers classify what they can and pass
//! `None` for values they cannot; unclassifiable values degrade to the
//! unconstrained type rather than being dropped, so their names still
//! complete.

use crate::scope::Scope;
use rbz_common::Atom;
use rbz_syntax::VarKind;
use rbz_types::Ty;

/// Pre-existing bindings the evaluation starts from.
#[derive(Default)]
pub struct ContextSeed {
    /// `self` at the top level, when known.
    pub self_type: Option<Ty>,
    /// `(name, classified type)`; `None` types mean "exists, shape
    /// unknown".
    pub locals: Vec<(Atom, Option<Ty>)>,
    pub instance_vars: Vec<(Atom, Option<Ty>)>,
    pub class_vars: Vec<(Atom, Option<Ty>)>,
    pub globals: Vec<(Atom, Option<Ty>)>,
    pub constants: Vec<(Atom, Option<Ty>)>,
}

impl ContextSeed {
    pub fn new() -> ContextSeed {
        ContextSeed::default()
    }
}

/// Build the root scope from a seed.
pub fn scope_from_seed(seed: &ContextSeed) -> Scope {
    let mut scope = Scope::new();
    if let Some(self_type) = &seed.self_type {
        scope.seed_self(self_type.clone());
    }
    let groups = [
        (VarKind::Local, &seed.locals),
        (VarKind::Instance, &seed.instance_vars),
        (VarKind::ClassVar, &seed.class_vars),
        (VarKind::Global, &seed.globals),
        (VarKind::Const, &seed.constants),
    ];
    for (kind, entries) in groups {
        for (name, ty) in entries {
            let ty = ty.clone().unwrap_or_else(Ty::object);
            scope.seed(kind, *name, ty);
        }
    }
    scope
}
