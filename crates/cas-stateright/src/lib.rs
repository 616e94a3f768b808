//! # cas-stateright
//!
//! Step-level stateright models of the two CAS protocols in
//! `cas-collections`. Every shared read and every CAS is one atomic step,
//! so breadth-first search covers all interleavings of a few threads.
//!
//! ```ignore
//! use cas_stateright::{check_model, QueueModel};
//! let report = check_model(QueueModel::new(2, vec![1, 2]), 4);
//! assert!(report.passed(), "{}", report);
//! ```
//!
//! ## Modules
//!
//! - `treiber_stack`: push / pop retry loops of the Treiber stack
//! - `ms_queue`: add / remove of the Michael-Scott queue, tail helping included
//! - `check`: run a model to completion and summarise the properties

pub mod check;
pub mod ms_queue;
pub mod treiber_stack;

pub use check::{check_model, ModelCheckReport, PropertyKind, PropertyOutcome};
pub use ms_queue::{QueueAction, QueueModel, QueuePc, QueueState};
pub use treiber_stack::{StackAction, StackModel, StackPc, StackState};
