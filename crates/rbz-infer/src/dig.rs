//! Target tracking and the one-shot resolution that unwinds the walk.

use crate::scope::ScopeSnapshot;
use rbz_syntax::NodeId;
use rbz_types::Ty;
use rustc_hash::FxHashSet;

/// The node the caller wants answered, plus the ancestor path that
/// reaches it.
///
/// Membership is identity (arena ids), never structure: two
/// textually identical subtrees are different dig entries. The path
/// gates which scoped bodies (method/class/block definitions) the
/// simulator descends into.
pub struct DigTarget {
    path: FxHashSet<NodeId>,
    target: NodeId,
}

impl DigTarget {
    /// `ancestors` runs from the root to the target's parent; the
    /// target itself is tracked separately.
    pub fn new(ancestors: &[NodeId], target: NodeId) -> DigTarget {
        DigTarget {
            path: ancestors.iter().copied().collect(),
            target,
        }
    }

    /// Is this node on the root-to-target path?
    pub fn on_path(&self, node: NodeId) -> bool {
        self.path.contains(&node)
    }

    pub fn is_target(&self, node: NodeId) -> bool {
        self.target == node
    }
}

/// The answer produced when the walk reaches the target: the target's
/// inferred type and the environment at that exact point.
///
/// Carried as the `Err` arm of [`EvalResult`] so `?` unwinds every
/// enclosing evaluation immediately; the target fires at most once.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub ty: Ty,
    pub scope: ScopeSnapshot,
}

/// Every evaluation step returns this: a normal value, or the finished
/// resolution unwinding outward.
pub type EvalResult<T> = Result<T, Resolution>;
