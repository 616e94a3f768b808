//! Michael-Scott lock-free MPMC queue.
//!
//! The queue is a singly linked chain that always starts with a dummy
//! node. `head` points at the dummy; the first real element lives in
//! `head.next`. `tail` points at the last node or lags one step behind
//! it, and every operation that sees it lagging swings it forward.
//!
//! # Invariants
//!
//! | Property | Maintained by |
//! |----------|---------------|
//! | NoLostElements | link CAS on the last node's `next` |
//! | NoDuplicates | only the `head` CAS winner reads a value |
//! | FIFO_Order | elements are linked at the end and unlinked at the front |
//! | Tail reachable from head | `remove` swings `tail` before moving `head` past it |
//!
//! # Memory Safety
//!
//! Unlinked dummies are retired through crossbeam-epoch, so a node is
//! freed only after every thread that could still be reading it has
//! unpinned. Nodes are never reused while reachable, which rules out ABA.

use std::mem::MaybeUninit;
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::CachePadded;

use crate::alloc::try_alloc_node;
use crate::error::AllocError;

/// A lock-free multi-producer multi-consumer FIFO queue.
///
/// `add` and `remove` are linearizable and lock-free: a thread only
/// retries because another thread's CAS succeeded.
pub struct LockFreeQueue<T> {
    /// Dummy node; the front element is `head.next`
    head: CachePadded<Atomic<Node<T>>>,
    /// Last node, or one step behind it
    tail: CachePadded<Atomic<Node<T>>>,
}

struct Node<T> {
    /// Uninitialized in the dummy, and again once the value is moved out.
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Self {
            value: MaybeUninit::new(value),
            next: Atomic::null(),
        }
    }
}

impl<T> LockFreeQueue<T> {
    /// Create a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
        };
        let dummy = Owned::new(Node {
            value: MaybeUninit::uninit(),
            next: Atomic::null(),
        });

        // SAFETY: the queue is not shared yet.
        unsafe {
            let guard = epoch::unprotected();
            let dummy = dummy.into_shared(guard);
            queue.head.store(dummy, Ordering::Relaxed);
            queue.tail.store(dummy, Ordering::Relaxed);
        }
        queue
    }

    /// Whether the queue held no elements at the moment of the check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: head is never null and is protected by the guard.
        let head = unsafe { head.deref() };
        head.next.load(Ordering::Acquire, guard).is_null()
    }

    /// Add a value at the back of the queue.
    ///
    /// Aborts through `handle_alloc_error` if the node cannot be
    /// allocated, like `Box::new`. Use [`LockFreeQueue::try_add`] to get
    /// the value back instead.
    pub fn add(&self, value: T) {
        self.link(Owned::new(Node::new(value)));
    }

    /// Add a value at the back of the queue, returning it on allocation failure.
    pub fn try_add(&self, value: T) -> Result<(), AllocError<T>> {
        let node = try_alloc_node(value, Node::new)?;
        self.link(node);
        Ok(())
    }

    fn link(&self, node: Owned<Node<T>>) {
        let guard = &epoch::pin();
        let node = node.into_shared(guard);

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: tail is never null and never points at a retired node.
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);

            if !next.is_null() {
                // Tail is lagging: help swing it, then re-read.
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                continue;
            }

            if tail_ref
                .next
                .compare_exchange(
                    Shared::null(),
                    node,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                )
                .is_ok()
            {
                // Linked. Failing to swing the tail is fine: whoever
                // beat us already moved it past this node.
                let _ = self.tail.compare_exchange(
                    tail,
                    node,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                return;
            }
        }
    }

    /// Remove the value at the front of the queue.
    ///
    /// Returns `None` if the queue was empty at the linearization point.
    pub fn remove(&self) -> Option<T> {
        self.remove_in(&epoch::pin())
    }

    fn remove_in(&self, guard: &Guard) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            // SAFETY: head is never null and is protected by the guard.
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
            // SAFETY: a linked successor stays allocated while we are pinned.
            let next_ref = unsafe { next.as_ref() }?;

            let tail = self.tail.load(Ordering::Acquire, guard);
            if tail == head {
                // The tail must never point at a node we are about to retire.
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed, guard)
                .is_ok()
            {
                // SAFETY: winning the head CAS makes this thread the only
                // reader of `next`'s value; `next` is the dummy from now on.
                // The old dummy is unreachable and retired through the epoch.
                unsafe {
                    let value = next_ref.value.assume_init_read();
                    guard.defer_destroy(head);
                    return Some(value);
                }
            }
        }
    }

    /// Copy of the values currently linked, front to back.
    ///
    /// Not atomic with respect to concurrent operations; use on a
    /// quiescent queue for an exact answer.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        let guard = &epoch::pin();
        let mut result = Vec::new();
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: head is never null and is protected by the guard.
        let mut current = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);

        // SAFETY: every node reached is protected by the guard and its
        // value bytes were written before it was published. `T: Copy`, so
        // reading bytes that a remover already moved out is harmless.
        while let Some(node) = unsafe { current.as_ref() } {
            result.push(unsafe { node.value.assume_init_read() });
            current = node.next.load(Ordering::Acquire, guard);
        }

        result
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: values move between threads but are never shared.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can hold a reference.
        unsafe {
            let guard = epoch::unprotected();
            while self.remove_in(guard).is_some() {}

            let dummy = self.head.load(Ordering::Relaxed, guard);
            drop(dummy.into_owned());
        }
    }
}


#[cfg(all(test, not(miri)))]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn cases() -> u32 {
        std::env::var("CAS_PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(cases()))]

        /// Any sequential interleaving of adds and removes behaves like a VecDeque.
        #[test]
        fn prop_matches_vecdeque(ops in prop::collection::vec(prop::option::of(any::<u32>()), 0..200)) {
            let queue = LockFreeQueue::new();
            let mut reference = VecDeque::new();

            for op in ops {
                match op {
                    Some(v) => {
                        queue.add(v);
                        reference.push_back(v);
                    }
                    None => prop_assert_eq!(queue.remove(), reference.pop_front()),
                }
                prop_assert_eq!(queue.is_empty(), reference.is_empty());
            }
            prop_assert_eq!(queue.snapshot(), reference.iter().copied().collect::<Vec<_>>());
        }

        /// Draining returns every added element exactly once, in order.
        #[test]
        fn prop_drain_conserves(values in prop::collection::vec(any::<u64>(), 0..300)) {
            let queue = LockFreeQueue::new();
            for &v in &values {
                queue.add(v);
            }
            let drained: Vec<u64> = std::iter::from_fn(|| queue.remove()).collect();
            prop_assert_eq!(drained, values);
            prop_assert_eq!(queue.remove(), None);
        }
    }
}
