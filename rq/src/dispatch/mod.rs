//! Command dispatch
//!
//! A FIFO of raw command strings drained by one background worker against the
//! RCON connection. Reliable commands hold the head of the queue until they
//! succeed; best-effort commands get a single attempt.

mod command;
mod config;
mod error;
mod worker;

pub use command::{CommandHandle, CommandQueue, CommandResult};
pub use config::DispatchConfig;
pub use error::CommandError;
pub use worker::Dispatcher;
