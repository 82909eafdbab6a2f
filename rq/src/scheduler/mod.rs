//! Scheduler for queued actions
//!
//! Owns the action queue, per-type cooldowns, and the generators, and turns
//! eligible actions into commands once per tick.

mod config;
mod core;
mod queue;

pub use config::SchedulerConfig;
pub use self::core::Scheduler;
pub use queue::{ActionQueue, SchedulerStats, TickOutcome, TickReport};
