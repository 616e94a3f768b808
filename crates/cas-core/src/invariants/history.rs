//! Operation histories and sequential replay.
//!
//! A history is the sequence of completed operations in the order they
//! were recorded. Replaying it against a sequential reference (a `Vec`
//! for a stack, a `VecDeque` for a queue) checks that every removal
//! returned what the sequential structure would have returned.

use std::collections::VecDeque;

/// History of collection operations.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Operations in recorded order
    pub operations: Vec<Operation>,
}

/// A single completed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Thread that performed the operation
    pub thread_id: u64,
    /// Type of operation
    pub kind: OpKind,
    /// Element inserted, or element returned by a removal
    pub element: Option<u64>,
    /// Step number for ordering
    pub step: u64,
}

/// Type of collection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// `add` / `push`
    Insert,
    /// `remove` / `pop` that returned a value
    Remove,
    /// `remove` / `pop` that found the collection empty
    RemoveEmpty,
}

impl History {
    /// Create a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an insertion.
    pub fn record_insert(&mut self, thread_id: u64, element: u64, step: u64) {
        debug_assert!(step > 0, "Step must be positive");
        self.operations.push(Operation {
            thread_id,
            kind: OpKind::Insert,
            element: Some(element),
            step,
        });
    }

    /// Record a removal; `None` records an empty result.
    pub fn record_remove(&mut self, thread_id: u64, element: Option<u64>, step: u64) {
        debug_assert!(step > 0, "Step must be positive");
        self.operations.push(Operation {
            thread_id,
            kind: if element.is_some() {
                OpKind::Remove
            } else {
                OpKind::RemoveEmpty
            },
            element,
            step,
        });
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The last `count` operations up to and including index `end`.
    #[must_use]
    pub fn window(&self, end: usize, count: usize) -> &[Operation] {
        let end = (end + 1).min(self.operations.len());
        let start = end.saturating_sub(count);
        &self.operations[start..end]
    }
}

impl Operation {
    /// Short description such as `insert(4)` or `remove() -> empty`.
    #[must_use]
    pub fn describe(&self) -> String {
        match (self.kind, self.element) {
            (OpKind::Insert, Some(e)) => format!("insert({})", e),
            (OpKind::Remove, Some(e)) => format!("remove() -> {}", e),
            _ => "remove() -> empty".to_string(),
        }
    }
}

/// Sequential reference a history is replayed against.
pub trait ReferenceModel: Default {
    /// Insert an element.
    fn insert(&mut self, element: u64);
    /// Remove the element the discipline dictates.
    fn remove(&mut self) -> Option<u64>;
    /// Number of elements held.
    fn len(&self) -> usize;
}

/// LIFO reference.
impl ReferenceModel for Vec<u64> {
    fn insert(&mut self, element: u64) {
        self.push(element);
    }

    fn remove(&mut self) -> Option<u64> {
        self.pop()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// FIFO reference.
impl ReferenceModel for VecDeque<u64> {
    fn insert(&mut self, element: u64) {
        self.push_back(element);
    }

    fn remove(&mut self) -> Option<u64> {
        self.pop_front()
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }
}

/// A point where the history disagrees with the sequential reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Index into `History::operations`
    pub index: usize,
    /// Step number of the offending operation
    pub step: u64,
    /// What went wrong
    pub kind: DivergenceKind,
}

/// Kinds of replay divergence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DivergenceKind {
    /// A removal returned an element other than the reference's
    WrongElement { returned: u64, expected: u64 },
    /// A removal returned an element while the reference was empty
    RemovedFromEmpty { returned: u64 },
    /// A removal reported empty while the reference held elements
    SpuriousEmpty { held: usize },
}

/// Replay `history` against a fresh `M`, collecting every divergence.
///
/// After a `WrongElement` divergence the reference's element is still
/// consumed so the replay stays aligned for later operations.
pub fn replay<M: ReferenceModel>(history: &History) -> Vec<Divergence> {
    let mut model = M::default();
    let mut divergences = Vec::new();

    for (index, op) in history.operations.iter().enumerate() {
        match (op.kind, op.element) {
            (OpKind::Insert, Some(e)) => model.insert(e),
            (OpKind::Remove, Some(returned)) => match model.remove() {
                Some(expected) if expected == returned => {}
                Some(expected) => divergences.push(Divergence {
                    index,
                    step: op.step,
                    kind: DivergenceKind::WrongElement { returned, expected },
                }),
                None => divergences.push(Divergence {
                    index,
                    step: op.step,
                    kind: DivergenceKind::RemovedFromEmpty { returned },
                }),
            },
            (OpKind::RemoveEmpty, _) => {
                if model.len() > 0 {
                    divergences.push(Divergence {
                        index,
                        step: op.step,
                        kind: DivergenceKind::SpuriousEmpty { held: model.len() },
                    });
                }
            }
            // Inconsistent records (insert without element, etc.) carry nothing to replay.
            _ => {}
        }
    }

    divergences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(ops: &[(OpKind, Option<u64>)]) -> History {
        let mut h = History::new();
        for (i, (kind, element)) in ops.iter().enumerate() {
            let step = i as u64 + 1;
            match kind {
                OpKind::Insert => h.record_insert(0, element.unwrap_or(0), step),
                _ => h.record_remove(0, *element, step),
            }
        }
        h
    }

    #[test]
    fn test_lifo_replay_clean() {
        let h = history(&[
            (OpKind::Insert, Some(1)),
            (OpKind::Insert, Some(2)),
            (OpKind::Remove, Some(2)),
            (OpKind::Remove, Some(1)),
            (OpKind::RemoveEmpty, None),
        ]);
        assert!(replay::<Vec<u64>>(&h).is_empty());
        assert_eq!(replay::<VecDeque<u64>>(&h).len(), 2);
    }

    #[test]
    fn test_fifo_replay_clean() {
        let h = history(&[
            (OpKind::Insert, Some(1)),
            (OpKind::Insert, Some(2)),
            (OpKind::Remove, Some(1)),
            (OpKind::Remove, Some(2)),
        ]);
        assert!(replay::<VecDeque<u64>>(&h).is_empty());
    }

    #[test]
    fn test_replay_reports_each_kind() {
        let h = history(&[
            (OpKind::Remove, Some(9)),
            (OpKind::Insert, Some(1)),
            (OpKind::RemoveEmpty, None),
        ]);
        let divergences = replay::<VecDeque<u64>>(&h);
        assert_eq!(
            divergences[0].kind,
            DivergenceKind::RemovedFromEmpty { returned: 9 }
        );
        assert_eq!(divergences[1].kind, DivergenceKind::SpuriousEmpty { held: 1 });
    }

    #[test]
    fn test_window_clamps() {
        let h = history(&[
            (OpKind::Insert, Some(1)),
            (OpKind::Insert, Some(2)),
            (OpKind::Insert, Some(3)),
        ]);
        assert_eq!(h.window(1, 8).len(), 2);
        assert_eq!(h.window(2, 2)[0].element, Some(2));
        assert_eq!(h.window(10, 1)[0].element, Some(3));
    }
}
