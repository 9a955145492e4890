//! Opt-in product telemetry
//!
//! [`Analytics::track`] queues an event in an [`EventQueue`] that is mirrored to the
//! user cache. The queue is delivered as one batch when it reaches the batch size, or
//! after a short delay scheduled by whichever call first takes the flush lock.

pub mod client;
pub mod constants;
pub mod event;
pub mod queue;

pub use client::{Analytics, FlushOutcome};
pub use constants::events;
pub use event::QueuedEvent;
pub use queue::EventQueue;
