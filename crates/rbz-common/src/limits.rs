//! Centralized limits and thresholds for the inference engine.
//!
//! Keeping these in one place prevents duplicate definitions with
//! inconsistent values and documents the rationale for each limit.

/// Maximum dispatcher recursion depth.
///
/// The simulator recurses once per nested syntactic construct. Input
/// arrives from an interactive shell and may be pathological (generated
/// code, pasted blobs); at this depth the dispatcher stops descending
/// and yields the unconstrained type instead of overflowing the stack.
pub const MAX_EVAL_DEPTH: u32 = 500;

/// Maximum number of shapes kept in one union.
///
/// Unions grow through branch merges and splat flattening. Past this
/// width a union carries no useful completion signal, so it collapses
/// to the unconstrained `Object` instance, which also keeps merge cost
/// bounded on adversarial input.
pub const MAX_UNION_SHAPES: usize = 64;

/// Maximum positional arguments distributed by a destructuring
/// assignment before the remainder is folded into the rest target.
///
/// Guards against absurd multi-assign target lists; real code stays
/// far below this.
pub const MAX_MASSIGN_TARGETS: usize = 256;
