//! Actions: units of intent that turn into raw RCON commands
//!
//! An action only declares its type tag, how often its type may fire, and how
//! many instances of its type may wait in the queue at once. What the emitted
//! commands mean is up to the action itself.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod generator;
mod generic;

pub use generator::{ActionGenerator, IntervalGenerator, PeriodicActionGenerator, TickContext};
pub use generic::GenericCommandAction;

/// Rate-limit bucket of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    GenericCommand,
    ChatMessage,
    Kick,
    LobbyUpdate,
    Status,
}

impl ActionType {
    /// All action types, in declaration order
    pub const ALL: [ActionType; 5] = [
        ActionType::GenericCommand,
        ActionType::ChatMessage,
        ActionType::Kick,
        ActionType::LobbyUpdate,
        ActionType::Status,
    ];
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::GenericCommand => "generic-command",
            ActionType::ChatMessage => "chat-message",
            ActionType::Kick => "kick",
            ActionType::LobbyUpdate => "lobby-update",
            ActionType::Status => "status",
        };
        f.write_str(name)
    }
}

/// Sink that actions write their commands into
pub trait CommandWriter {
    /// Write one command. `name` and `args` are joined with a single space.
    fn write(&mut self, name: &str, args: &str);
}

/// A queued unit of intent
///
/// Once submitted, the scheduler owns the action. It is attempted at most once:
/// after `write_commands` runs the action is dropped, whether or not it wrote
/// anything.
pub trait Action: Send + fmt::Debug {
    /// Rate-limit bucket
    fn action_type(&self) -> ActionType;

    /// How many actions of this type may be queued at the same time
    fn max_queued_count(&self) -> usize {
        usize::MAX
    }

    /// Cooldown between two firings of this type. Zero disables the cooldown,
    /// but a type still fires at most once per tick.
    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Emit zero or more commands
    fn write_commands(&self, writer: &mut dyn CommandWriter);
}

/// Join a command name and its arguments into one command line
pub fn join_command(name: &str, args: &str) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, args)
    }
}
