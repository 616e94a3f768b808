//! Queue invariants.
//!
//! - NoLostElements: every added element is in the queue or was removed
//! - NoDuplicates: no element is held twice or held after removal
//! - NoPhantomElements: every removed element was added
//! - FIFO_Order: removals return elements in add order
//! - EmptyRemoveConsistency: `remove` reports empty only when nothing is held

use std::collections::VecDeque;

use crate::invariants::common;
use crate::invariants::history::replay;
use crate::invariants::CollectionProperties;
use crate::property::{PropertyChecker, PropertyResult};

/// Property checker for queue implementations.
pub struct QueuePropertyChecker<'a, T: CollectionProperties> {
    queue: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: CollectionProperties> QueuePropertyChecker<'a, T> {
    #[must_use]
    pub fn new(queue: &'a T) -> Self {
        Self {
            queue,
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

impl<T: CollectionProperties> PropertyChecker for QueuePropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        let history = self.queue.history();
        let divergences = replay::<VecDeque<u64>>(&history);
        vec![
            common::check_no_lost_elements(self.queue, self.dst_seed),
            common::check_no_duplicates(self.queue),
            common::check_no_phantom_elements(self.queue),
            common::check_order("FIFO_Order", &history, &divergences, self.dst_seed),
            common::check_empty_remove_consistency(&history, &divergences, self.dst_seed),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::History;
    use std::collections::HashSet;

    #[derive(Default)]
    struct TestQueue {
        added: HashSet<u64>,
        removed: HashSet<u64>,
        contents: VecDeque<u64>,
        history: History,
    }

    impl TestQueue {
        fn add(&mut self, val: u64, thread_id: u64) {
            self.added.insert(val);
            self.contents.push_back(val);
            let step = self.history.len() as u64 + 1;
            self.history.record_insert(thread_id, val, step);
        }

        fn remove(&mut self, thread_id: u64) -> Option<u64> {
            let val = self.contents.pop_front();
            if let Some(v) = val {
                self.removed.insert(v);
            }
            let step = self.history.len() as u64 + 1;
            self.history.record_remove(thread_id, val, step);
            val
        }
    }

    impl CollectionProperties for TestQueue {
        fn inserted_elements(&self) -> HashSet<u64> {
            self.added.clone()
        }

        fn removed_elements(&self) -> HashSet<u64> {
            self.removed.clone()
        }

        fn current_contents(&self) -> Vec<u64> {
            self.contents.iter().copied().collect()
        }

        fn history(&self) -> History {
            self.history.clone()
        }
    }

    #[test]
    fn test_correct_queue_passes_all() {
        let mut q = TestQueue::default();
        q.add(1, 0);
        q.add(2, 1);
        q.add(3, 0);
        assert_eq!(q.remove(1), Some(1));
        assert_eq!(q.remove(0), Some(2));
        q.add(4, 1);
        assert_eq!(q.remove(1), Some(3));

        let checker = QueuePropertyChecker::new(&q);
        let results = checker.check_all();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[test]
    fn test_empty_remove_on_empty_queue_is_fine() {
        let mut q = TestQueue::default();
        assert_eq!(q.remove(0), None);
        q.add(1, 0);
        assert_eq!(q.remove(0), Some(1));
        assert_eq!(q.remove(0), None);

        assert!(QueuePropertyChecker::new(&q).all_hold());
    }

    #[test]
    fn test_detects_lifo_behaviour_as_fifo_violation() {
        let mut q = TestQueue::default();
        q.add(1, 0);
        q.add(2, 0);
        // The tail element comes out first.
        q.contents.pop_back();
        q.removed.insert(2);
        let step = q.history.len() as u64 + 1;
        q.history.record_remove(1, Some(2), step);

        let checker = QueuePropertyChecker::new(&q).with_seed(7);
        let violations = checker.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].property, "FIFO_Order");
        let message = violations[0].message.as_deref().unwrap_or_default();
        assert!(message.contains("returned 2"));
        assert!(message.contains("expected 1"));
        let ce = violations[0].counterexample.as_ref().expect("counterexample");
        assert_eq!(ce.dst_seed, Some(7));
    }

    #[test]
    fn test_detects_removed_but_still_held() {
        let mut q = TestQueue::default();
        q.add(1, 0);
        q.removed.insert(1);

        let violations = QueuePropertyChecker::new(&q).violations();
        assert!(violations.iter().any(|r| r.property == "NoDuplicates"));
    }

    #[test]
    fn test_detects_lost_element() {
        let mut q = TestQueue::default();
        q.add(1, 0);
        q.add(2, 0);
        q.contents.clear();

        let violations = QueuePropertyChecker::new(&q).violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].property, "NoLostElements");
        assert!(violations[0].to_string().contains("2 element(s) lost"));
    }
}
