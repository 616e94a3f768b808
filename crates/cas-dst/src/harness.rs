//! Multi-threaded stress harness.
//!
//! Producers insert the values `0..items_per_producer` once per producer
//! task; consumers remove until told to stop and sum what they see. The
//! run is balanced when everything produced (plus the preload) was
//! consumed exactly once, by count and by sum.
//!
//! Shutdown is coordinated: consumers leave only after the main thread
//! has observed the collection empty and raised the stop flag, and every
//! worker is joined before `run_stress` returns, on success or error.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cas_collections::ConcurrentCollection;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Configuration for a stress run.
#[derive(Debug, Clone, Serialize)]
pub struct StressConfig {
    /// Producer tasks; each inserts `0..items_per_producer`
    pub producer_tasks: usize,
    /// Threads the producer tasks are spread over, round-robin
    pub producer_threads: usize,
    /// Consumer threads
    pub consumer_threads: usize,
    /// Items inserted by one producer task
    pub items_per_producer: u64,
    /// Values inserted before any worker starts
    pub preload_count: u64,
    /// Value used for every preloaded element
    pub preload_value: u64,
    /// How often the main thread checks whether the collection drained
    pub poll_interval: Duration,
    /// How long the main thread waits for the drain after producers finish
    pub drain_timeout: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::producer_consumer()
    }
}

impl StressConfig {
    /// One producer of 10000 items, one consumer.
    #[must_use]
    pub fn producer_consumer() -> Self {
        Self {
            producer_tasks: 1,
            producer_threads: 1,
            consumer_threads: 1,
            items_per_producer: 10_000,
            preload_count: 0,
            preload_value: 1,
            poll_interval: Duration::from_millis(10),
            drain_timeout: Duration::from_secs(60),
        }
    }

    /// A million preloaded 1s ahead of one producer and one consumer.
    #[must_use]
    pub fn live_lock() -> Self {
        Self {
            preload_count: 1_000_000,
            ..Self::producer_consumer()
        }
    }

    /// 30 producer tasks over 10 threads against 10 consumers.
    #[must_use]
    pub fn multi_thread() -> Self {
        Self {
            producer_tasks: 30,
            producer_threads: 10,
            consumer_threads: 10,
            drain_timeout: Duration::from_secs(120),
            ..Self::producer_consumer()
        }
    }

    /// Builder: preload `count` copies of `value`.
    #[must_use]
    pub fn with_preload(mut self, count: u64, value: u64) -> Self {
        self.preload_count = count;
        self.preload_value = value;
        self
    }

    /// Defaults with `STRESS_*` environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `STRESS_ITEMS`, `STRESS_PRODUCERS` and `STRESS_CONSUMERS`.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(items) = env_override("STRESS_ITEMS") {
            self.items_per_producer = items;
        }
        if let Some(producers) = env_override("STRESS_PRODUCERS") {
            self.producer_tasks = producers;
            self.producer_threads = self.producer_threads.min(producers).max(1);
        }
        if let Some(consumers) = env_override("STRESS_CONSUMERS") {
            self.consumer_threads = consumers;
        }
        self
    }

    /// Sum of everything the producers will insert, `None` if it overflows.
    #[must_use]
    pub fn expected_produced_sum(&self) -> Option<u64> {
        let n = self.items_per_producer;
        // n * (n - 1) is even, so halve whichever factor is even first.
        let (a, b) = if n % 2 == 0 {
            (n / 2, n.saturating_sub(1))
        } else {
            (n, n.saturating_sub(1) / 2)
        };
        let per_task = a.checked_mul(b)?;
        per_task.checked_mul(u64::try_from(self.producer_tasks).ok()?)
    }

    /// Sum of the preloaded values, `None` if it overflows.
    #[must_use]
    pub fn expected_preloaded_sum(&self) -> Option<u64> {
        self.preload_count.checked_mul(self.preload_value)
    }

    fn validate(&self) -> Result<(), HarnessError> {
        if self.consumer_threads == 0 {
            return Err(HarnessError::InvalidConfig(
                "at least one consumer thread is required".to_string(),
            ));
        }
        if self.producer_tasks > 0 && self.producer_threads == 0 {
            return Err(HarnessError::InvalidConfig(
                "producer tasks need at least one producer thread".to_string(),
            ));
        }
        let total = self
            .expected_produced_sum()
            .zip(self.expected_preloaded_sum())
            .and_then(|(produced, preloaded)| produced.checked_add(preloaded));
        if total.is_none() {
            return Err(HarnessError::InvalidConfig(
                "sum of produced and preloaded values overflows u64".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_override<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, raw = %raw, "ignoring unparseable override");
            None
        }
    }
}

/// Errors from a stress run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid stress config: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker {name}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {name} panicked")]
    WorkerPanicked { name: String },

    #[error("collection not drained within {timeout:?}")]
    DrainTimeout { timeout: Duration },
}

/// Outcome of a stress run.
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    /// `Fifo` or `Lifo`
    pub discipline: String,
    pub produced_count: u64,
    pub produced_sum: u64,
    pub preloaded_count: u64,
    pub preloaded_sum: u64,
    pub consumed_count: u64,
    pub consumed_sum: u64,
    /// Elements consumed by each consumer thread
    pub per_consumer: Vec<u64>,
    pub elapsed_ms: u64,
}

impl StressReport {
    /// Everything inserted was removed exactly once.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.consumed_count == self.produced_count + self.preloaded_count
            && self.consumed_sum == self.produced_sum + self.preloaded_sum
    }

    #[must_use]
    pub fn format(&self) -> String {
        let status = if self.is_balanced() { "PASS" } else { "FAIL" };
        format!(
            "[{}] {} produced={} (sum {}) preloaded={} consumed={} (sum {}) in {}ms",
            status,
            self.discipline,
            self.produced_count,
            self.produced_sum,
            self.preloaded_count,
            self.consumed_count,
            self.consumed_sum,
            self.elapsed_ms
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    count: u64,
    sum: u64,
}

impl Tally {
    fn add(&mut self, value: u64) {
        self.count += 1;
        // Only a broken collection can push the sum past the validated total.
        self.sum = self.sum.saturating_add(value);
    }
}

/// Flags shared with the consumers.
#[derive(Default)]
struct Signals {
    /// Leave once a removal finds the collection empty.
    stop: AtomicBool,
    /// Leave now.
    abort: AtomicBool,
}

/// Spawned workers; dropping the crew aborts and joins whatever is left.
struct Crew {
    signals: Arc<Signals>,
    workers: Vec<(String, JoinHandle<Tally>)>,
}

impl Crew {
    fn new(signals: Arc<Signals>) -> Self {
        Self {
            signals,
            workers: Vec::new(),
        }
    }

    fn spawn<F>(&mut self, name: String, work: F) -> Result<(), HarnessError>
    where
        F: FnOnce() -> Tally + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(work)
            .map_err(|source| HarnessError::Spawn {
                name: name.clone(),
                source,
            })?;
        self.workers.push((name, handle));
        Ok(())
    }

    /// Join every worker, returning the tallies in spawn order.
    fn join(mut self) -> Result<Vec<Tally>, HarnessError> {
        let mut tallies = Vec::with_capacity(self.workers.len());
        let mut first_panic = None;

        for (name, handle) in std::mem::take(&mut self.workers) {
            match handle.join() {
                Ok(tally) => {
                    debug!(worker = %name, count = tally.count, "worker finished");
                    tallies.push(tally);
                }
                Err(_) => {
                    warn!(worker = %name, "worker panicked");
                    first_panic.get_or_insert(name);
                }
            }
        }

        match first_panic {
            Some(name) => Err(HarnessError::WorkerPanicked { name }),
            None => Ok(tallies),
        }
    }
}

impl Drop for Crew {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.signals.abort.store(true, Ordering::Release);
        for (_, handle) in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Run producers and consumers against `collection` until it drains.
pub fn run_stress<C>(collection: Arc<C>, config: &StressConfig) -> Result<StressReport, HarnessError>
where
    C: ConcurrentCollection<u64> + 'static,
{
    config.validate()?;
    let discipline = format!("{:?}", collection.discipline());
    info!(
        discipline = %discipline,
        producer_tasks = config.producer_tasks,
        producer_threads = config.producer_threads,
        consumers = config.consumer_threads,
        items = config.items_per_producer,
        preload = config.preload_count,
        "stress run starting"
    );
    let start = Instant::now();

    for _ in 0..config.preload_count {
        collection.insert(config.preload_value);
    }

    let signals = Arc::new(Signals::default());
    let mut consumers = Crew::new(Arc::clone(&signals));
    for id in 0..config.consumer_threads {
        let collection = Arc::clone(&collection);
        let signals = Arc::clone(&signals);
        consumers.spawn(format!("consumer-{}", id), move || {
            consume(&*collection, &signals)
        })?;
    }

    let mut producers = Crew::new(Arc::clone(&signals));
    for id in 0..config.producer_threads.min(config.producer_tasks) {
        let collection = Arc::clone(&collection);
        let tasks = (id..config.producer_tasks)
            .step_by(config.producer_threads)
            .count();
        let items = config.items_per_producer;
        producers.spawn(format!("producer-{}", id), move || {
            produce(&*collection, tasks, items)
        })?;
    }

    let produced = producers
        .join()?
        .into_iter()
        .fold(Tally::default(), |acc, t| Tally {
            count: acc.count + t.count,
            sum: acc.sum + t.sum,
        });
    debug!(count = produced.count, "producers finished");

    if !wait_for_drain(&*collection, config) {
        warn!(timeout = ?config.drain_timeout, "collection did not drain");
        // Dropping the crew aborts and joins the consumers.
        drop(consumers);
        return Err(HarnessError::DrainTimeout {
            timeout: config.drain_timeout,
        });
    }

    signals.stop.store(true, Ordering::Release);
    let per_consumer = consumers.join()?;

    let report = StressReport {
        discipline,
        produced_count: produced.count,
        produced_sum: produced.sum,
        preloaded_count: config.preload_count,
        preloaded_sum: config.expected_preloaded_sum().unwrap_or(u64::MAX),
        consumed_count: per_consumer.iter().map(|t| t.count).sum(),
        consumed_sum: per_consumer.iter().map(|t| t.sum).sum(),
        per_consumer: per_consumer.iter().map(|t| t.count).collect(),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    info!(
        balanced = report.is_balanced(),
        consumed = report.consumed_count,
        elapsed_ms = report.elapsed_ms,
        "stress run finished"
    );
    Ok(report)
}

fn produce<C: ConcurrentCollection<u64> + ?Sized>(collection: &C, tasks: usize, items: u64) -> Tally {
    let mut tally = Tally::default();
    for _ in 0..tasks {
        for value in 0..items {
            collection.insert(value);
            tally.add(value);
        }
    }
    tally
}

fn consume<C: ConcurrentCollection<u64> + ?Sized>(collection: &C, signals: &Signals) -> Tally {
    let mut tally = Tally::default();
    while !signals.abort.load(Ordering::Acquire) {
        match collection.take() {
            Some(value) => tally.add(value),
            None if signals.stop.load(Ordering::Acquire) => break,
            None => thread::yield_now(),
        }
    }
    tally
}

fn wait_for_drain<C: ConcurrentCollection<u64> + ?Sized>(collection: &C, config: &StressConfig) -> bool {
    let deadline = Instant::now() + config.drain_timeout;
    while !collection.is_empty() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(config.poll_interval);
    }
    true
}
