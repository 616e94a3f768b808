//! # cas-core
//!
//! Core types and invariants for CAS-based concurrent collections.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `CollectionProperties`, the observable state a collection exposes to
//!   the stack and queue checkers
//!
//! It has no dependencies; `cas-collections` and `cas-dst` share its
//! vocabulary for results.

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, StateSnapshot, ThreadAction};
pub use invariants::{check_collection, CollectionProperties, Discipline, History};
pub use property::{PropertyChecker, PropertyResult};
