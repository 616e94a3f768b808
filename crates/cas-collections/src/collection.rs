//! Common interface over the queue and the stack.

use cas_core::Discipline;

use crate::error::AllocError;
use crate::queue::LockFreeQueue;
use crate::stack::LockFreeStack;

/// A lock-free collection that harnesses can drive without knowing
/// whether it is a queue or a stack.
pub trait ConcurrentCollection<T>: Send + Sync {
    /// Removal order of this collection.
    fn discipline(&self) -> Discipline;

    /// `add` / `push`.
    fn insert(&self, value: T);

    /// `try_add` / `try_push`.
    fn try_insert(&self, value: T) -> Result<(), AllocError<T>>;

    /// `remove` / `pop`.
    fn take(&self) -> Option<T>;

    fn is_empty(&self) -> bool;

    /// Contents in removal order. Exact only when quiescent.
    fn snapshot(&self) -> Vec<T>
    where
        T: Copy;
}

impl<T: Send> ConcurrentCollection<T> for LockFreeQueue<T> {
    fn discipline(&self) -> Discipline {
        Discipline::Fifo
    }

    fn insert(&self, value: T) {
        self.add(value);
    }

    fn try_insert(&self, value: T) -> Result<(), AllocError<T>> {
        self.try_add(value)
    }

    fn take(&self) -> Option<T> {
        self.remove()
    }

    fn is_empty(&self) -> bool {
        LockFreeQueue::is_empty(self)
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        LockFreeQueue::snapshot(self)
    }
}

impl<T: Send> ConcurrentCollection<T> for LockFreeStack<T> {
    fn discipline(&self) -> Discipline {
        Discipline::Lifo
    }

    fn insert(&self, value: T) {
        self.push(value);
    }

    fn try_insert(&self, value: T) -> Result<(), AllocError<T>> {
        self.try_push(value)
    }

    fn take(&self) -> Option<T> {
        self.pop()
    }

    fn is_empty(&self) -> bool {
        LockFreeStack::is_empty(self)
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Copy,
    {
        LockFreeStack::snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_and_drain<C: ConcurrentCollection<u64>>(c: &C) -> Vec<u64> {
        for i in 1..=4 {
            c.insert(i);
        }
        assert!(c.try_insert(5).is_ok());
        assert!(!c.is_empty());
        std::iter::from_fn(|| c.take()).collect()
    }

    #[test]
    fn test_queue_through_trait() {
        let queue = LockFreeQueue::<u64>::new();
        assert_eq!(queue.discipline(), Discipline::Fifo);
        assert_eq!(fill_and_drain(&queue), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_stack_through_trait() {
        let stack = LockFreeStack::<u64>::new();
        assert_eq!(stack.discipline(), Discipline::Lifo);
        assert_eq!(fill_and_drain(&stack), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_trait_object() {
        let collections: Vec<Box<dyn ConcurrentCollection<u64>>> = vec![
            Box::new(LockFreeQueue::new()),
            Box::new(LockFreeStack::new()),
        ];
        for c in &collections {
            c.insert(1);
            c.insert(2);
            assert_eq!(c.snapshot().len(), 2);
        }
        assert_eq!(collections[0].take(), Some(1));
        assert_eq!(collections[1].take(), Some(2));
    }
}
