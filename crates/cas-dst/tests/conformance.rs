//! Conformance scenarios for the queue and the stack.
//!
//! Each scenario runs against both structures through
//! `ConcurrentCollection`, with expectations that depend only on the
//! removal discipline.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use cas_collections::{ConcurrentCollection, LockFreeQueue, LockFreeStack};
use cas_core::Discipline;
use cas_dst::{init_test_logging, run_stress, StressConfig};

const PRODUCER_SUM: u64 = 10_000 * (10_000 - 1) / 2;

// =============================================================================
// Single-threaded
// =============================================================================

fn simple<C: ConcurrentCollection<u64>>(c: &C) {
    c.insert(1);
    c.insert(2);
    let (first, second) = match c.discipline() {
        Discipline::Fifo => (1, 2),
        Discipline::Lifo => (2, 1),
    };
    assert_eq!(c.take(), Some(first));
    assert_eq!(c.take(), Some(second));
    assert!(c.is_empty());
}

fn empty<C: ConcurrentCollection<u64>>(c: &C) {
    assert!(c.is_empty());
    assert_eq!(c.take(), None);
    assert_eq!(c.take(), None);
    c.insert(1);
    assert!(!c.is_empty());
    assert_eq!(c.take(), Some(1));
    assert_eq!(c.take(), None);
    assert!(c.is_empty());
}

#[test]
fn test_queue_simple() {
    simple(&LockFreeQueue::<u64>::new());
}

#[test]
fn test_stack_simple() {
    simple(&LockFreeStack::<u64>::new());
}

#[test]
fn test_queue_empty() {
    empty(&LockFreeQueue::<u64>::new());
}

#[test]
fn test_stack_empty() {
    empty(&LockFreeStack::<u64>::new());
}

// =============================================================================
// Sequence: removals granted one at a time to a pool of waiting workers
// =============================================================================

#[derive(Default)]
struct Turns {
    /// Removals granted but not yet performed
    granted: usize,
    /// Value returned by the latest removal
    last: Option<u64>,
    done: bool,
}

fn sequence<C: ConcurrentCollection<u64> + 'static>(collection: C) {
    const ITEMS: u64 = 10;
    const WORKERS: usize = 5;

    for i in 0..ITEMS {
        collection.insert(i);
    }
    let collection = Arc::new(collection);
    let turns = Arc::new((Mutex::new(Turns::default()), Condvar::new()));

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let collection = Arc::clone(&collection);
            let turns = Arc::clone(&turns);
            thread::spawn(move || {
                let (lock, cvar) = &*turns;
                let mut state = lock.lock().unwrap();
                loop {
                    while state.granted == 0 && !state.done {
                        state = cvar.wait(state).unwrap();
                    }
                    if state.granted == 0 {
                        return;
                    }
                    state.granted -= 1;
                    state.last = collection.take();
                    cvar.notify_all();
                }
            })
        })
        .collect();

    let expected: Vec<u64> = match collection.discipline() {
        Discipline::Fifo => (0..ITEMS).collect(),
        Discipline::Lifo => (0..ITEMS).rev().collect(),
    };

    let (lock, cvar) = &*turns;
    for want in expected {
        let mut state = lock.lock().unwrap();
        state.granted += 1;
        cvar.notify_all();
        while state.granted > 0 {
            state = cvar.wait(state).unwrap();
        }
        assert_eq!(state.last, Some(want));
    }

    lock.lock().unwrap().done = true;
    cvar.notify_all();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(collection.is_empty());
}

#[test]
fn test_queue_sequence() {
    sequence(LockFreeQueue::<u64>::new());
}

#[test]
fn test_stack_sequence() {
    sequence(LockFreeStack::<u64>::new());
}

// =============================================================================
// Producer / consumer
// =============================================================================

fn assert_drained<C>(collection: Arc<C>, config: &StressConfig, expected_sum: u64)
where
    C: ConcurrentCollection<u64> + 'static,
{
    init_test_logging();
    let report = run_stress(Arc::clone(&collection), config).unwrap();
    assert!(report.is_balanced(), "{}", report.format());
    assert_eq!(report.consumed_sum, expected_sum, "{}", report.format());
    assert!(collection.is_empty());
}

#[test]
fn test_queue_producer_consumer() {
    assert_drained(
        Arc::new(LockFreeQueue::<u64>::new()),
        &StressConfig::producer_consumer(),
        PRODUCER_SUM,
    );
}

#[test]
fn test_stack_producer_consumer() {
    assert_drained(
        Arc::new(LockFreeStack::<u64>::new()),
        &StressConfig::producer_consumer(),
        PRODUCER_SUM,
    );
}

#[test]
fn test_queue_live_lock() {
    assert_drained(
        Arc::new(LockFreeQueue::<u64>::new()),
        &StressConfig::live_lock(),
        PRODUCER_SUM + 1_000_000,
    );
}

#[test]
fn test_stack_live_lock() {
    assert_drained(
        Arc::new(LockFreeStack::<u64>::new()),
        &StressConfig::live_lock(),
        PRODUCER_SUM + 1_000_000,
    );
}

#[test]
fn test_queue_multi_thread() {
    let config = StressConfig::multi_thread().with_preload(1_000_000, 1);
    assert_drained(
        Arc::new(LockFreeQueue::<u64>::new()),
        &config,
        PRODUCER_SUM * 30 + 1_000_000,
    );
}

#[test]
fn test_stack_multi_thread() {
    assert_drained(
        Arc::new(LockFreeStack::<u64>::new()),
        &StressConfig::multi_thread(),
        PRODUCER_SUM * 30,
    );
}

#[test]
fn test_env_overrides_scale_the_run() {
    // Without overrides set this is the producer/consumer preset.
    let config = StressConfig::from_env();
    let expected = config
        .expected_produced_sum()
        .expect("default sizes fit in u64");
    assert_drained(Arc::new(LockFreeQueue::<u64>::new()), &config, expected);
}
