//! # cas-collections
//!
//! Lock-free collections built on compare-and-swap.
//!
//! - `queue`: Michael-Scott MPMC FIFO queue with a dummy head node
//! - `stack`: Treiber LIFO stack
//!
//! Both reclaim nodes through crossbeam-epoch and implement
//! [`ConcurrentCollection`], so the simulation and stress harnesses can
//! drive either one. [`Tracked`] records operations so the `cas-core`
//! checkers can verify the invariants after a run.

mod alloc;
pub mod collection;
pub mod error;
pub mod queue;
pub mod stack;
pub mod tracked;

pub use collection::ConcurrentCollection;
pub use error::AllocError;
pub use queue::LockFreeQueue;
pub use stack::LockFreeStack;
pub use tracked::Tracked;
