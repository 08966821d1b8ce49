//! Flow-sensitive abstract interpreter over Ruby syntax trees.
//!
//! Given a parsed fragment, the ancestor path to one node, and that
//! node, the engine walks the tree pushing unions of candidate value
//! shapes through a frame-chain environment. When the walk produces
//! the target node's value, it unwinds immediately and reports the
//! union it accumulated; everything else is evaluated only for its
//! effect on the environment.
//!
//! The result is deliberately conservative: both arms of every branch
//! contribute, loops run "once, maybe", blocks are explored whether or
//! not the receiver would call them. Over-approximation only costs a
//! few extra completion candidates; under-approximation loses them.

pub mod context;
pub mod dig;
pub mod eval;
pub mod scope;

mod calls;
mod pattern;

pub use context::{scope_from_seed, ContextSeed};
pub use dig::{DigTarget, EvalResult, Resolution};
pub use eval::Simulator;
pub use scope::{Branches, Catches, FrameSpec, JumpKind, PassKinds, Scope, ScopeSnapshot};

use rbz_common::Interner;
use rbz_syntax::{NodeArena, NodeId};
use rbz_types::{ClassRegistry, MethodTable, Ty};

/// Infer the union of runtime shapes the target node can evaluate to.
///
/// `ancestors` is the root-to-target path (target excluded). A target
/// the walk never reaches degrades to the unconstrained type.
#[allow(clippy::too_many_arguments)]
pub fn infer_type(
    arena: &NodeArena,
    root: NodeId,
    ancestors: &[NodeId],
    target: NodeId,
    seed: &ContextSeed,
    registry: &ClassRegistry,
    table: &MethodTable,
    interner: &mut Interner,
) -> Ty {
    let dig = DigTarget::new(ancestors, target);
    let mut scope = scope_from_seed(seed);
    let mut simulator = Simulator::new(arena, &dig, registry, table, interner);
    match simulator.evaluate(root, &mut scope) {
        Err(resolution) => resolution.ty,
        Ok(_) => {
            tracing::warn!(target = target.index(), "target node never reached");
            Ty::object()
        }
    }
}

/// The bindings visible at the target node, for name completion.
///
/// A target the walk never reaches reports the top-level environment
/// after the whole fragment ran.
#[allow(clippy::too_many_arguments)]
pub fn scope_at(
    arena: &NodeArena,
    root: NodeId,
    ancestors: &[NodeId],
    target: NodeId,
    seed: &ContextSeed,
    registry: &ClassRegistry,
    table: &MethodTable,
    interner: &mut Interner,
) -> ScopeSnapshot {
    let dig = DigTarget::new(ancestors, target);
    let mut scope = scope_from_seed(seed);
    let mut simulator = Simulator::new(arena, &dig, registry, table, interner);
    match simulator.evaluate(root, &mut scope) {
        Err(resolution) => resolution.scope,
        Ok(_) => scope.snapshot(),
    }
}
