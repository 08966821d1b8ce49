//! Arena-based syntax tree for the rbz inference engine.
//!
//! Nodes live in a [`NodeArena`] and are addressed by [`NodeId`]. Two
//! structurally identical subtrees always have distinct ids, which is
//! what the target locator keys on: the node of interest is *this*
//! occurrence of `x`, not any `x`.
//!
//! [`Node`] is a closed tagged-variant enum covering every syntactic
//! category the simulator evaluates, with an explicit [`Node::Unknown`]
//! catch-all so a producer can hand over constructs the engine has no
//! rule for without breaking the walk. The parser producing this tree
//! is an external collaborator; this crate only defines the shape it
//! fills in.

pub mod node;

pub use node::{
    Arg, AssignTarget, BlockArg, InClause, KwArg, KwKey, MlhsItem, Node, NodeArena, NodeId,
    ParamDecl, Params, Pattern, RescueClause, VarKind, WhenClause,
};
