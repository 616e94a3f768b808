//! Stack invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostElements | Every pushed element is in the stack or was popped |
//! | NoDuplicates | No element is held twice or held after being popped |
//! | NoPhantomElements | Every popped element was pushed |
//! | LIFO_Order | Pops return elements in reverse push order |
//! | EmptyRemoveConsistency | `pop` reports empty only when nothing is held |

use crate::invariants::common;
use crate::invariants::history::replay;
use crate::invariants::CollectionProperties;
use crate::property::{PropertyChecker, PropertyResult};

/// Property checker for stack implementations.
pub struct StackPropertyChecker<'a, T: CollectionProperties> {
    stack: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: CollectionProperties> StackPropertyChecker<'a, T> {
    /// Create a new checker for the given stack.
    #[must_use]
    pub fn new(stack: &'a T) -> Self {
        Self {
            stack,
            dst_seed: None,
        }
    }

    /// Set DST seed for counterexample reproduction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.dst_seed = Some(seed);
        self
    }
}

impl<T: CollectionProperties> PropertyChecker for StackPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        let history = self.stack.history();
        // Pops must return the top of a sequential Vec replay.
        let divergences = replay::<Vec<u64>>(&history);
        vec![
            common::check_no_lost_elements(self.stack, self.dst_seed),
            common::check_no_duplicates(self.stack),
            common::check_no_phantom_elements(self.stack),
            common::check_order("LIFO_Order", &history, &divergences, self.dst_seed),
            common::check_empty_remove_consistency(&history, &divergences, self.dst_seed),
        ]
    }
}
