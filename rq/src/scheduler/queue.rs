//! Action queue and tick result types

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::action::{Action, ActionType};

/// Ordered collection of pending actions with per-type admission caps
///
/// Insertion order is priority order.
#[derive(Default)]
pub struct ActionQueue {
    actions: VecDeque<Box<dyn Action>>,
    total_accepted: u64,
    total_rejected: u64,
    peak_depth: usize,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit an action, returns false if its type already has
    /// `max_queued_count` actions waiting. A rejected action is dropped.
    pub fn submit(&mut self, action: Box<dyn Action>) -> bool {
        let action_type = action.action_type();
        let max_queued = action.max_queued_count();

        // Only count when the cap could possibly be reached. A zero cap always rejects.
        if max_queued <= self.actions.len() && self.count_of(action_type) >= max_queued {
            debug!(%action_type, max_queued, ?action, "ActionQueue::submit: cap reached, rejecting");
            self.total_rejected += 1;
            return false;
        }

        debug!(%action_type, ?action, "ActionQueue::submit: accepted");
        self.actions.push_back(action);
        self.total_accepted += 1;
        self.peak_depth = self.peak_depth.max(self.actions.len());
        true
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of queued actions of the given type
    pub fn count_of(&self, action_type: ActionType) -> usize {
        self.actions.iter().filter(|a| a.action_type() == action_type).count()
    }

    /// Types of the queued actions, in queue order
    pub fn types(&self) -> Vec<ActionType> {
        self.actions.iter().map(|a| a.action_type()).collect()
    }

    /// Take every queued action out, leaving the queue empty
    pub(crate) fn take_all(&mut self) -> VecDeque<Box<dyn Action>> {
        std::mem::take(&mut self.actions)
    }

    /// Put back the actions that were not processed, ahead of anything
    /// submitted in the meantime
    pub(crate) fn restore(&mut self, mut kept: VecDeque<Box<dyn Action>>) {
        kept.append(&mut self.actions);
        self.actions = kept;
    }

    pub(crate) fn total_accepted(&self) -> u64 {
        self.total_accepted
    }

    pub(crate) fn total_rejected(&self) -> u64 {
        self.total_rejected
    }

    pub(crate) fn peak_depth(&self) -> usize {
        self.peak_depth
    }
}

impl fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionQueue")
            .field("actions", &self.actions)
            .field("total_accepted", &self.total_accepted)
            .field("total_rejected", &self.total_rejected)
            .finish()
    }
}

/// Result of a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Called before the update interval elapsed, nothing happened
    Skipped,

    /// The tick was processed
    Ran(TickReport),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Skipped => None,
            TickOutcome::Ran(report) => Some(report),
        }
    }
}

/// What a processed tick did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Actions that fired (and were removed) across both passes
    pub fired: usize,

    /// Commands written by those actions
    pub commands_written: usize,

    /// Whether the piggyback generators ran
    pub piggyback_ran: bool,

    /// Actions still queued after the tick
    pub remaining: usize,
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total_ticks: u64,
    pub total_submitted: u64,
    pub total_rejected: u64,
    pub total_fired: u64,
    pub total_commands_written: u64,
    pub peak_queue_depth: usize,
}
