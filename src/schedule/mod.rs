//! Priority scheduling for asynchronous analysis work.
//!
//! Everything that talks to the analysis backend goes through one
//! [`RequestScheduler`]: edits, validations, interactive queries. The
//! scheduler owns a single execution slot, drains three priority queues in
//! strict order, collapses same-key bursts into one surviving unit, and hands
//! every run a [`Checkpoint`] so cancellation stays cooperative.

pub mod checkpoint;
pub mod class;
pub mod scheduler;

pub use checkpoint::Checkpoint;
pub use class::RequestClass;
pub use scheduler::{RequestScheduler, ScheduledRequest};
