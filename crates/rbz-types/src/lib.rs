//! Type value algebra and method signature database.
//!
//! This crate owns everything the simulator treats as opaque:
//!
//! - [`Ty`]: an immutable union of candidate runtime [`Shape`]s, with
//!   normalization and deduplication at construction. The engine only
//!   combines (union) and tag-checks these values, never mutates them.
//! - [`ClassRegistry`]: class/module table with superclass chains,
//!   declared generic parameter names, and pre-registered well-known
//!   [`ClassId`]s.
//! - [`MethodTable`]: the signature resolver. Signatures may declare
//!   free type variables, optional/rest/keyword parameters and a block
//!   parameter; queries filter by receiver shape, name, and arity.

pub mod registry;
pub mod shape;
pub mod sigs;

pub use registry::{ClassId, ClassInfo, ClassRegistry};
pub use shape::{Shape, Ty};
pub use sigs::{
    match_free_vars, receiver_bindings, resolve_ty_expr, BlockSpec, MethodSig, MethodTable, TyExpr,
};

#[cfg(test)]
mod tests;
