//! Recording wrapper for invariant checking.
//!
//! `Tracked<C>` forwards every operation to the lock-free collection and,
//! after the operation has taken effect, records it behind a mutex. The
//! recording is outside the lock-free path, so it observes completion
//! order rather than linearization order; order checks over the history
//! are exact only for single-threaded or quiescent use.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cas_core::{CollectionProperties, Discipline, History};

use crate::collection::ConcurrentCollection;
use crate::error::AllocError;

/// A collection of `u64` that records what happens to it.
pub struct Tracked<C> {
    inner: C,
    tracker: Mutex<Tracker>,
}

/// Tracking state for property verification.
#[derive(Default)]
struct Tracker {
    inserted: HashSet<u64>,
    removed: HashSet<u64>,
    history: History,
    step: u64,
}

impl Tracker {
    fn next_step(&mut self) -> u64 {
        self.step += 1;
        self.step
    }
}

impl<C: ConcurrentCollection<u64>> Tracked<C> {
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            tracker: Mutex::new(Tracker::default()),
        }
    }

    /// The wrapped collection.
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Insert on behalf of `thread_id`.
    pub fn insert_by(&self, thread_id: u64, value: u64) {
        self.inner.insert(value);
        self.record_insert(thread_id, value);
    }

    /// Fallible insert on behalf of `thread_id`; nothing is recorded on failure.
    pub fn try_insert_by(&self, thread_id: u64, value: u64) -> Result<(), AllocError<u64>> {
        self.inner.try_insert(value)?;
        self.record_insert(thread_id, value);
        Ok(())
    }

    /// Remove on behalf of `thread_id`.
    pub fn take_by(&self, thread_id: u64) -> Option<u64> {
        let value = self.inner.take();
        let mut tracker = self.lock();
        if let Some(v) = value {
            tracker.removed.insert(v);
        }
        let step = tracker.next_step();
        tracker.history.record_remove(thread_id, value, step);
        value
    }

    fn record_insert(&self, thread_id: u64, value: u64) {
        let mut tracker = self.lock();
        debug_assert!(
            !tracker.inserted.contains(&value),
            "Tracked elements must be distinct"
        );
        tracker.inserted.insert(value);
        let step = tracker.next_step();
        tracker.history.record_insert(thread_id, value, step);
    }

    fn lock(&self) -> MutexGuard<'_, Tracker> {
        // A panicking worker must not hide the state from the checkers.
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: ConcurrentCollection<u64> + Default> Default for Tracked<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: ConcurrentCollection<u64>> ConcurrentCollection<u64> for Tracked<C> {
    fn discipline(&self) -> Discipline {
        self.inner.discipline()
    }

    fn insert(&self, value: u64) {
        self.insert_by(0, value);
    }

    fn try_insert(&self, value: u64) -> Result<(), AllocError<u64>> {
        self.try_insert_by(0, value)
    }

    fn take(&self) -> Option<u64> {
        self.take_by(0)
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn snapshot(&self) -> Vec<u64> {
        self.inner.snapshot()
    }
}

impl<C: ConcurrentCollection<u64>> CollectionProperties for Tracked<C> {
    fn inserted_elements(&self) -> HashSet<u64> {
        self.lock().inserted.clone()
    }

    fn removed_elements(&self) -> HashSet<u64> {
        self.lock().removed.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        self.inner.snapshot()
    }

    fn history(&self) -> History {
        self.lock().history.clone()
    }
}
