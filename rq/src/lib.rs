//! rconqueue - rate-limited action scheduling over a Source RCON connection
//!
//! Producers submit actions ("kick this player", "poll the player list") to a
//! tick-driven scheduler that enforces per-type caps and cooldowns. Fired
//! actions write raw commands into a FIFO that a single background worker
//! drains against the RCON endpoint, reconnecting and retrying as needed.
//!
//! # Modules
//!
//! - [`action`] - Action trait, action types and generators
//! - [`scheduler`] - Action queue and tick processor
//! - [`dispatch`] - Command queue, result handles and the dispatch worker
//! - [`rcon`] - Connection trait and Source RCON client
//! - [`manager`] - ActionManager facade over scheduler and dispatcher
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod action;
pub mod cli;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod manager;
pub mod rcon;
pub mod scheduler;
pub mod settings;

pub use action::{Action, ActionType, CommandWriter, GenericCommandAction, IntervalGenerator, TickContext};
pub use config::Config;
pub use console::{ConsoleBuffer, ConsoleOutput};
pub use dispatch::{CommandError, CommandHandle, CommandQueue, CommandResult, Dispatcher};
pub use manager::ActionManager;
pub use rcon::{Connection, ConnectionError, RconClient};
pub use scheduler::{Scheduler, SchedulerStats, TickOutcome, TickReport};
pub use settings::{Settings, SharedSettings};
