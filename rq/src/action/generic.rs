//! Plain command action

use std::time::Duration;

use super::{Action, ActionType, CommandWriter};

/// Action that writes a single fixed command
///
/// Defaults to [`ActionType::GenericCommand`] with no cooldown and no queue cap.
#[derive(Debug, Clone)]
pub struct GenericCommandAction {
    name: String,
    args: String,
    action_type: ActionType,
    min_interval: Duration,
    max_queued_count: usize,
}

impl GenericCommandAction {
    /// Create an action for `name`, with `args` appended after a space when non-empty
    pub fn new(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
            action_type: ActionType::GenericCommand,
            min_interval: Duration::ZERO,
            max_queued_count: usize::MAX,
        }
    }

    /// Bucket the action under a different type
    pub fn with_type(mut self, action_type: ActionType) -> Self {
        self.action_type = action_type;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_max_queued(mut self, max_queued_count: usize) -> Self {
        self.max_queued_count = max_queued_count;
        self
    }
}

impl Action for GenericCommandAction {
    fn action_type(&self) -> ActionType {
        self.action_type
    }

    fn max_queued_count(&self) -> usize {
        self.max_queued_count
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn write_commands(&self, writer: &mut dyn CommandWriter) {
        writer.write(&self.name, &self.args);
    }
}
