//! Treiber stack protocol as a stateright model.
//!
//! Every shared read and every CAS is its own atomic step, so the checker
//! explores all interleavings of the push and pop retry loops. Node ids are
//! never reused, which is the guarantee epoch reclamation gives the real
//! stack: a CAS can only succeed against the node it actually read.
//!
//! Each thread pushes its value and then pops once.
//!
//! # Invariants
//!
//! | Property | Expectation |
//! |----------|-------------|
//! | no lost elements | always |
//! | no duplicates | always |
//! | acyclic chain | always |
//! | chain equals reference stack | always |
//! | CAS retry | sometimes |

use std::collections::BTreeSet;

use stateright::{Model, Property};

/// Index into `StackState::nodes`.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub value: u64,
    pub next: Option<NodeId>,
}

/// Program counter of one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackPc {
    PushAlloc,
    PushRead { node: NodeId },
    PushCas { node: NodeId, expected: Option<NodeId> },
    PopRead,
    PopCas { head: NodeId, next: Option<NodeId> },
    Done,
}

/// One atomic step, named after what the thread does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackAction {
    PushAlloc(usize),
    PushRead(usize),
    PushCas(usize),
    PopRead(usize),
    PopCas(usize),
}

impl StackAction {
    fn thread(self) -> usize {
        match self {
            StackAction::PushAlloc(t)
            | StackAction::PushRead(t)
            | StackAction::PushCas(t)
            | StackAction::PopRead(t)
            | StackAction::PopCas(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackState {
    pub head: Option<NodeId>,
    /// Every node ever allocated; ids are never reused
    pub nodes: Vec<Node>,
    pub pcs: Vec<StackPc>,
    /// Sequential stack updated at each successful CAS
    pub reference: Vec<u64>,
    /// Values whose push CAS succeeded
    pub pushed: Vec<u64>,
    /// Values returned by successful pops
    pub popped: Vec<u64>,
    /// Set when a pop disagreed with the reference stack
    pub diverged: bool,
    /// Set once any CAS has failed
    pub retried: bool,
}

impl StackState {
    /// Values reachable from `head`, top first. `None` if the walk loops.
    #[must_use]
    pub fn chain(&self) -> Option<Vec<u64>> {
        let mut values = Vec::new();
        let mut current = self.head;
        while let Some(id) = current {
            if values.len() > self.nodes.len() {
                return None;
            }
            values.push(self.nodes[id].value);
            current = self.nodes[id].next;
        }
        Some(values)
    }
}

/// Model of `threads_count` threads, thread `i` pushing `values[i]`.
#[derive(Debug, Clone)]
pub struct StackModel {
    pub threads_count: usize,
    pub values: Vec<u64>,
}

impl StackModel {
    #[must_use]
    pub fn new(threads_count: usize, values: Vec<u64>) -> Self {
        debug_assert!(threads_count > 0, "Must have at least one thread");
        debug_assert!(values.len() >= threads_count, "One value per thread");
        debug_assert!(
            values.iter().collect::<BTreeSet<_>>().len() == values.len(),
            "Values must be distinct"
        );
        Self {
            threads_count,
            values,
        }
    }
}

impl Model for StackModel {
    type State = StackState;
    type Action = StackAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![StackState {
            head: None,
            nodes: Vec::new(),
            pcs: vec![StackPc::PushAlloc; self.threads_count],
            reference: Vec::new(),
            pushed: Vec::new(),
            popped: Vec::new(),
            diverged: false,
            retried: false,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (t, pc) in state.pcs.iter().enumerate() {
            let action = match pc {
                StackPc::PushAlloc => StackAction::PushAlloc(t),
                StackPc::PushRead { .. } => StackAction::PushRead(t),
                StackPc::PushCas { .. } => StackAction::PushCas(t),
                StackPc::PopRead => StackAction::PopRead(t),
                StackPc::PopCas { .. } => StackAction::PopCas(t),
                StackPc::Done => continue,
            };
            actions.push(action);
        }
    }

    fn next_state(&self, last: &Self::State, action: Self::Action) -> Option<Self::State> {
        let t = action.thread();
        let mut state = last.clone();

        let next_pc = match state.pcs[t] {
            StackPc::PushAlloc => {
                state.nodes.push(Node {
                    value: self.values[t],
                    next: None,
                });
                StackPc::PushRead {
                    node: state.nodes.len() - 1,
                }
            }
            StackPc::PushRead { node } => {
                // The node is still private, so setting its link is local.
                state.nodes[node].next = state.head;
                StackPc::PushCas {
                    node,
                    expected: state.head,
                }
            }
            StackPc::PushCas { node, expected } => {
                if state.head == expected {
                    state.head = Some(node);
                    state.reference.push(state.nodes[node].value);
                    state.pushed.push(state.nodes[node].value);
                    StackPc::PopRead
                } else {
                    state.retried = true;
                    StackPc::PushRead { node }
                }
            }
            StackPc::PopRead => match state.head {
                None => {
                    // Empty at this instant: the reference must agree.
                    if !state.reference.is_empty() {
                        state.diverged = true;
                    }
                    StackPc::Done
                }
                Some(head) => StackPc::PopCas {
                    head,
                    next: state.nodes[head].next,
                },
            },
            StackPc::PopCas { head, next } => {
                if state.head == Some(head) {
                    state.head = next;
                    let value = state.nodes[head].value;
                    state.popped.push(value);
                    if state.reference.pop() != Some(value) {
                        state.diverged = true;
                    }
                    StackPc::Done
                } else {
                    state.retried = true;
                    StackPc::PopRead
                }
            }
            StackPc::Done => return None,
        };

        state.pcs[t] = next_pc;
        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("no lost elements", |_, state: &StackState| {
                let Some(chain) = state.chain() else {
                    return false;
                };
                state
                    .pushed
                    .iter()
                    .all(|v| chain.contains(v) || state.popped.contains(v))
            }),
            Property::always("no duplicates", |_, state: &StackState| {
                let Some(chain) = state.chain() else {
                    return false;
                };
                let mut seen = BTreeSet::new();
                chain.iter().chain(state.popped.iter()).all(|v| seen.insert(*v))
            }),
            Property::always("acyclic chain", |_, state: &StackState| {
                state.chain().is_some()
            }),
            Property::always("chain equals reference stack", |_, state: &StackState| {
                let Some(mut chain) = state.chain() else {
                    return false;
                };
                chain.reverse();
                !state.diverged && chain == state.reference
            }),
            Property::sometimes("CAS retry", |_, state: &StackState| state.retried),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn test_initial_state() {
        let model = StackModel::new(2, vec![1, 2]);
        let init = model.init_states();
        assert_eq!(init.len(), 1);
        assert_eq!(init[0].chain(), Some(vec![]));
        let mut actions = Vec::new();
        model.actions(&init[0], &mut actions);
        assert_eq!(actions, vec![StackAction::PushAlloc(0), StackAction::PushAlloc(1)]);
    }

    #[test]
    fn test_single_thread_push_pop() {
        let model = StackModel::new(1, vec![7]);
        let mut state = model.init_states().remove(0);
        for action in [
            StackAction::PushAlloc(0),
            StackAction::PushRead(0),
            StackAction::PushCas(0),
        ] {
            state = model.next_state(&state, action).unwrap();
        }
        assert_eq!(state.chain(), Some(vec![7]));
        state = model.next_state(&state, StackAction::PopRead(0)).unwrap();
        state = model.next_state(&state, StackAction::PopCas(0)).unwrap();
        assert_eq!(state.popped, vec![7]);
        assert_eq!(state.pcs[0], StackPc::Done);
        assert!(!state.diverged);
    }

    #[test]
    fn test_stale_push_cas_retries() {
        let model = StackModel::new(2, vec![1, 2]);
        let mut state = model.init_states().remove(0);
        for action in [
            StackAction::PushAlloc(0),
            StackAction::PushRead(0),
            StackAction::PushAlloc(1),
            StackAction::PushRead(1),
            StackAction::PushCas(1),
            StackAction::PushCas(0),
        ] {
            state = model.next_state(&state, action).unwrap();
        }
        assert!(state.retried);
        assert!(matches!(state.pcs[0], StackPc::PushRead { .. }));
        assert_eq!(state.chain(), Some(vec![2]));
    }

    #[test]
    fn test_two_threads_exhaustive() {
        let checker = StackModel::new(2, vec![1, 2])
            .checker()
            .threads(1)
            .spawn_bfs()
            .join();
        checker.assert_properties();
        assert!(checker.is_done());
        assert!(checker.unique_state_count() > 10);
    }
}
