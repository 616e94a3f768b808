//! Treiber stack - lock-free LIFO stack.
//!
//! # Invariants
//!
//! | Property | Maintained by |
//! |----------|---------------|
//! | NoLostElements | push CAS publishes the node with `next` = observed head |
//! | NoDuplicates | only the pop CAS winner reads a value |
//! | LIFO_Order | push and pop both act on `head` |
//! | ABA_Safety | epoch GC |
//!
//! # Memory Safety
//!
//! Uses epoch-based garbage collection from crossbeam-epoch to prevent
//! the ABA problem and use-after-free: a popped node is freed only after
//! every thread that might still dereference it has unpinned.

use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Owned};

use crate::alloc::try_alloc_node;
use crate::error::AllocError;

/// A lock-free Treiber stack.
///
/// This is the classic lock-free stack design by R. Kent Treiber (1986).
/// Operations are linearizable and lock-free (at least one thread makes
/// progress in any execution).
pub struct LockFreeStack<T> {
    /// Pointer to top node
    head: Atomic<Node<T>>,
}

/// Node in the stack.
struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        }
    }
}

impl<T> LockFreeStack<T> {
    /// Create a new empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: Atomic::null(),
        }
    }

    /// Check if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    /// Push a value onto the stack.
    ///
    /// This operation is lock-free: it will complete in bounded time
    /// unless preempted infinitely. Aborts through `handle_alloc_error`
    /// if the node cannot be allocated.
    pub fn push(&self, value: T) {
        self.publish(Owned::new(Node::new(value)));
    }

    /// Push a value, handing it back if the node cannot be allocated.
    pub fn try_push(&self, value: T) -> Result<(), AllocError<T>> {
        let node = try_alloc_node(value, Node::new)?;
        self.publish(node);
        Ok(())
    }

    fn publish(&self, mut node: Owned<Node<T>>) {
        let guard = epoch::pin();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);

            // Still private: re-pointing the link is invisible to others.
            node.next.store(head, Ordering::Relaxed);

            match self.head.compare_exchange(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
                &guard,
            ) {
                Ok(_) => return,
                // CAS failed - retry with same node
                Err(e) => node = e.new,
            }
        }
    }

    /// Pop a value from the stack.
    ///
    /// Returns `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        let guard = epoch::pin();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);

            // Safety: a non-null head is protected by the epoch guard
            let head_ref = unsafe { head.as_ref() }?;
            let next = head_ref.next.load(Ordering::Acquire, &guard);

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed, &guard)
                .is_ok()
            {
                // Safety: the CAS winner is the only thread that reads the
                // value; the node is unreachable and freed after the epoch.
                unsafe {
                    let value = ManuallyDrop::into_inner(ptr::read(&head_ref.value));
                    guard.defer_destroy(head);
                    return Some(value);
                }
            }
        }
    }

    /// Get the current contents of the stack, top to bottom.
    ///
    /// Note: This is not atomic with respect to concurrent operations.
    /// Use on a quiescent stack for an exact answer.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        let guard = epoch::pin();
        let mut result = Vec::new();
        let mut current = self.head.load(Ordering::Acquire, &guard);

        // Safety: nodes are protected by the guard; values are `Copy`.
        while let Some(node) = unsafe { current.as_ref() } {
            result.push(*node.value);
            current = node.next.load(Ordering::Acquire, &guard);
        }

        result
    }
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: Stack is thread-safe
unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send> Sync for LockFreeStack<T> {}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        // Safety: `&mut self` excludes every other thread.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);

            while !current.is_null() {
                let mut node = current.into_owned();
                current = node.next.load(Ordering::Relaxed, guard);
                ManuallyDrop::drop(&mut node.value);
            }
        }
    }
}


#[cfg(all(test, not(miri)))]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn cases() -> u32 {
        std::env::var("CAS_PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(cases()))]

        /// Any sequential interleaving of pushes and pops behaves like a Vec.
        #[test]
        fn prop_matches_vec(ops in prop::collection::vec(prop::option::of(any::<u32>()), 0..200)) {
            let stack = LockFreeStack::new();
            let mut reference = Vec::new();

            for op in ops {
                match op {
                    Some(v) => {
                        stack.push(v);
                        reference.push(v);
                    }
                    None => prop_assert_eq!(stack.pop(), reference.pop()),
                }
                prop_assert_eq!(stack.is_empty(), reference.is_empty());
            }
            prop_assert_eq!(stack.snapshot(), reference.iter().rev().copied().collect::<Vec<_>>());
        }

        /// Popping an empty stack any number of times changes nothing.
        #[test]
        fn prop_empty_pop_idempotent(pops in 1_usize..20, value in any::<u64>()) {
            let stack = LockFreeStack::new();
            for _ in 0..pops {
                prop_assert_eq!(stack.pop(), None);
            }
            stack.push(value);
            prop_assert_eq!(stack.pop(), Some(value));
            prop_assert!(stack.is_empty());
        }
    }
}
