//! Michael-Scott queue protocol as a stateright model.
//!
//! Node 0 is the initial dummy. Each of the `threads_count` threads adds
//! its value and then removes once; `removers` further threads only
//! remove. A remove can only find the tail lagging behind the head when
//! some thread removes without having added first.
//!
//! ```text
//! add:    alloc -> read tail -> read tail.next -> (help tail | CAS next) -> swing tail
//! remove: read head -> read head.next -> help tail -> CAS head
//! ```
//!
//! Helping and swinging `tail` are single CAS steps from the value read
//! earlier. Node ids are never reused.

use std::collections::BTreeSet;

use stateright::{Model, Property};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueNode {
    /// `None` only for the initial dummy
    pub value: Option<u64>,
    pub next: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuePc {
    AddAlloc,
    AddReadTail { node: NodeId },
    AddReadNext { node: NodeId, tail: NodeId },
    AddHelpTail { node: NodeId, tail: NodeId, next: NodeId },
    AddCasNext { node: NodeId, tail: NodeId },
    AddSwingTail { node: NodeId, tail: NodeId },
    RemoveReadHead,
    RemoveReadNext { head: NodeId },
    RemoveHelpTail { head: NodeId, next: NodeId },
    RemoveCasHead { head: NodeId, next: NodeId },
    Done,
}

/// A step of one thread; the thread's pc decides what it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueAction {
    pub thread: usize,
    pub step: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueState {
    pub head: NodeId,
    pub tail: NodeId,
    pub nodes: Vec<QueueNode>,
    pub pcs: Vec<QueuePc>,
    /// Sequential queue updated at each successful CAS, front first
    pub reference: Vec<u64>,
    /// Values in the order their link CAS succeeded
    pub added: Vec<u64>,
    /// Values in the order their head CAS succeeded
    pub removed: Vec<u64>,
    pub diverged: bool,
    pub add_retried: bool,
    pub remove_helped_tail: bool,
}

impl QueueState {
    /// Node ids from `head` to the last node. `None` if the walk loops.
    fn walk(&self) -> Option<Vec<NodeId>> {
        let mut ids = vec![self.head];
        let mut current = self.nodes[self.head].next;
        while let Some(id) = current {
            if ids.len() > self.nodes.len() {
                return None;
            }
            ids.push(id);
            current = self.nodes[id].next;
        }
        Some(ids)
    }

    /// Values linked behind the dummy, front first.
    #[must_use]
    pub fn contents(&self) -> Option<Vec<u64>> {
        self.walk()
            .map(|ids| ids[1..].iter().filter_map(|&id| self.nodes[id].value).collect())
    }

    #[must_use]
    pub fn tail_reachable(&self) -> bool {
        self.walk().map_or(false, |ids| ids.contains(&self.tail))
    }
}

/// Model of `threads_count` threads, thread `i` adding `values[i]`, plus
/// `removers` remove-only threads.
#[derive(Debug, Clone)]
pub struct QueueModel {
    pub threads_count: usize,
    pub values: Vec<u64>,
    pub removers: usize,
}

impl QueueModel {
    /// One remove-only thread by default.
    #[must_use]
    pub fn new(threads_count: usize, values: Vec<u64>) -> Self {
        debug_assert!(threads_count > 0, "Must have at least one thread");
        debug_assert!(values.len() >= threads_count, "One value per thread");
        Self {
            threads_count,
            values,
            removers: 1,
        }
    }

    #[must_use]
    pub fn with_removers(mut self, removers: usize) -> Self {
        self.removers = removers;
        self
    }
}

fn step_name(pc: QueuePc) -> Option<&'static str> {
    Some(match pc {
        QueuePc::AddAlloc => "add: alloc",
        QueuePc::AddReadTail { .. } => "add: read tail",
        QueuePc::AddReadNext { .. } => "add: read next",
        QueuePc::AddHelpTail { .. } => "add: help tail",
        QueuePc::AddCasNext { .. } => "add: CAS next",
        QueuePc::AddSwingTail { .. } => "add: swing tail",
        QueuePc::RemoveReadHead => "remove: read head",
        QueuePc::RemoveReadNext { .. } => "remove: read next",
        QueuePc::RemoveHelpTail { .. } => "remove: help tail",
        QueuePc::RemoveCasHead { .. } => "remove: CAS head",
        QueuePc::Done => return None,
    })
}

impl Model for QueueModel {
    type State = QueueState;
    type Action = QueueAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![QueueState {
            head: 0,
            tail: 0,
            nodes: vec![QueueNode {
                value: None,
                next: None,
            }],
            pcs: std::iter::repeat(QueuePc::AddAlloc)
                .take(self.threads_count)
                .chain(std::iter::repeat(QueuePc::RemoveReadHead).take(self.removers))
                .collect(),
            reference: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
            diverged: false,
            add_retried: false,
            remove_helped_tail: false,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (thread, pc) in state.pcs.iter().enumerate() {
            if let Some(step) = step_name(*pc) {
                actions.push(QueueAction { thread, step });
            }
        }
    }

    fn next_state(&self, last: &Self::State, action: Self::Action) -> Option<Self::State> {
        let t = action.thread;
        let mut state = last.clone();

        let next_pc = match state.pcs[t] {
            QueuePc::AddAlloc => {
                state.nodes.push(QueueNode {
                    value: Some(self.values[t]),
                    next: None,
                });
                QueuePc::AddReadTail {
                    node: state.nodes.len() - 1,
                }
            }
            QueuePc::AddReadTail { node } => QueuePc::AddReadNext {
                node,
                tail: state.tail,
            },
            QueuePc::AddReadNext { node, tail } => match state.nodes[tail].next {
                Some(next) => QueuePc::AddHelpTail { node, tail, next },
                None => QueuePc::AddCasNext { node, tail },
            },
            QueuePc::AddHelpTail { node, tail, next } => {
                if state.tail == tail {
                    state.tail = next;
                }
                state.add_retried = true;
                QueuePc::AddReadTail { node }
            }
            QueuePc::AddCasNext { node, tail } => {
                if state.nodes[tail].next.is_none() {
                    state.nodes[tail].next = Some(node);
                    if let Some(value) = state.nodes[node].value {
                        state.reference.push(value);
                        state.added.push(value);
                    }
                    QueuePc::AddSwingTail { node, tail }
                } else {
                    state.add_retried = true;
                    QueuePc::AddReadTail { node }
                }
            }
            QueuePc::AddSwingTail { node, tail } => {
                if state.tail == tail {
                    state.tail = node;
                }
                QueuePc::RemoveReadHead
            }
            QueuePc::RemoveReadHead => QueuePc::RemoveReadNext { head: state.head },
            QueuePc::RemoveReadNext { head } => match state.nodes[head].next {
                Some(next) => QueuePc::RemoveHelpTail { head, next },
                None => {
                    // `head` is the last node, so it is still the dummy
                    // and the queue is empty right now.
                    if !state.reference.is_empty() {
                        state.diverged = true;
                    }
                    QueuePc::Done
                }
            },
            QueuePc::RemoveHelpTail { head, next } => {
                if state.tail == head {
                    state.tail = next;
                    state.remove_helped_tail = true;
                }
                QueuePc::RemoveCasHead { head, next }
            }
            QueuePc::RemoveCasHead { head, next } => {
                if state.head == head {
                    state.head = next;
                    match state.nodes[next].value {
                        Some(v) if state.reference.first() == Some(&v) => {
                            state.reference.remove(0);
                            state.removed.push(v);
                        }
                        Some(v) => {
                            state.removed.push(v);
                            state.diverged = true;
                        }
                        None => state.diverged = true,
                    }
                    QueuePc::Done
                } else {
                    QueuePc::RemoveReadHead
                }
            }
            QueuePc::Done => return None,
        };

        state.pcs[t] = next_pc;
        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("no lost elements", |_, state: &QueueState| {
                let Some(contents) = state.contents() else {
                    return false;
                };
                state
                    .added
                    .iter()
                    .all(|v| contents.contains(v) || state.removed.contains(v))
            }),
            Property::always("no duplicates", |_, state: &QueueState| {
                let Some(contents) = state.contents() else {
                    return false;
                };
                let mut seen = BTreeSet::new();
                contents
                    .iter()
                    .chain(state.removed.iter())
                    .all(|v| seen.insert(*v))
            }),
            Property::always("tail reachable from head", |_, state: &QueueState| {
                state.tail_reachable()
            }),
            Property::always("removed is a prefix of added", |_, state: &QueueState| {
                state.added.starts_with(&state.removed)
            }),
            Property::always("chain equals reference queue", |_, state: &QueueState| {
                !state.diverged && state.contents().as_ref() == Some(&state.reference)
            }),
            Property::sometimes("add retry", |_, state: &QueueState| state.add_retried),
            Property::sometimes("remove helps tail", |_, state: &QueueState| {
                state.remove_helped_tail
            }),
        ]
    }
}
