//! Invariants for concurrent collections.
//!
//! Implementations expose their observable state through
//! [`CollectionProperties`]; a checker verifies the invariants against it.
//!
//! - `stack`: NoLostElements, NoDuplicates, NoPhantomElements, LIFO_Order,
//!   EmptyRemoveConsistency
//! - `queue`: NoLostElements, NoDuplicates, NoPhantomElements, FIFO_Order,
//!   EmptyRemoveConsistency
//!
//! Order checks replay the recorded history against a sequential
//! reference, so they are exact only for single-threaded or quiescent
//! histories. Under concurrency the record order can differ from the
//! linearization order; element accounting still applies.

mod common;
pub mod history;
pub mod queue;
pub mod stack;

use std::collections::HashSet;

pub use history::{History, OpKind, Operation};
pub use queue::QueuePropertyChecker;
pub use stack::StackPropertyChecker;

use crate::property::{PropertyChecker, PropertyResult};

/// Removal discipline of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discipline {
    /// First in, first out (queue)
    Fifo,
    /// Last in, first out (stack)
    Lifo,
}

/// Observable state of a collection under test.
pub trait CollectionProperties {
    /// Set of all elements that have been inserted.
    fn inserted_elements(&self) -> HashSet<u64>;

    /// Set of all elements that have been removed.
    fn removed_elements(&self) -> HashSet<u64>;

    /// Current contents in removal order (front first / top first).
    fn current_contents(&self) -> Vec<u64>;

    /// Operation history for order checking.
    /// Returns owned data to avoid lifetime issues with internal mutexes.
    fn history(&self) -> History;
}

/// Run the checker matching `discipline` against `props`.
pub fn check_collection<P: CollectionProperties>(
    discipline: Discipline,
    props: &P,
    seed: Option<u64>,
) -> Vec<PropertyResult> {
    match discipline {
        Discipline::Fifo => {
            let checker = QueuePropertyChecker::new(props);
            match seed {
                Some(seed) => checker.with_seed(seed).check_all(),
                None => checker.check_all(),
            }
        }
        Discipline::Lifo => {
            let checker = StackPropertyChecker::new(props);
            match seed {
                Some(seed) => checker.with_seed(seed).check_all(),
                None => checker.check_all(),
            }
        }
    }
}
