//! Common types and utilities for the rbz inference engine.
//!
//! This crate provides foundational pieces used across all rbz crates:
//! - String interning (`Atom`, `Interner`)
//! - Centralized limits and thresholds

pub mod interner;
pub use interner::{Atom, Interner};

pub mod limits;
