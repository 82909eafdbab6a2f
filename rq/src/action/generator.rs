//! Action generators
//!
//! Generators are how secondary logic feeds the queue without owning a clock.
//! Periodic generators run on every scheduling tick. Piggyback generators run
//! only on ticks where at least one command was actually written, so reactive
//! work ("refresh status after anything ran") rides along with primary traffic.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{Action, ActionType};
use crate::scheduler::ActionQueue;

/// View of the scheduler handed to generators during a tick
pub struct TickContext<'a> {
    now: Instant,
    queue: &'a mut ActionQueue,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(now: Instant, queue: &'a mut ActionQueue) -> Self {
        Self { now, queue }
    }

    /// Time of the tick being processed
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Submit an action; returns false if its type is at its queue cap
    pub fn submit(&mut self, action: Box<dyn Action>) -> bool {
        self.queue.submit(action)
    }

    /// Number of queued actions
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of queued actions of one type
    pub fn queued_of(&self, action_type: ActionType) -> usize {
        self.queue.count_of(action_type)
    }
}

/// Generator invoked at the start of every tick
pub trait PeriodicActionGenerator: Send {
    fn execute(&mut self, ctx: &mut TickContext<'_>);
}

/// Piggyback generator, invoked only after a tick wrote at least one command
pub trait ActionGenerator: Send {
    fn execute(&mut self, ctx: &mut TickContext<'_>);
}

impl<F> PeriodicActionGenerator for F
where
    F: FnMut(&mut TickContext<'_>) + Send,
{
    fn execute(&mut self, ctx: &mut TickContext<'_>) {
        self(ctx)
    }
}

impl<F> ActionGenerator for F
where
    F: FnMut(&mut TickContext<'_>) + Send,
{
    fn execute(&mut self, ctx: &mut TickContext<'_>) {
        self(ctx)
    }
}

/// Periodic generator that runs its inner logic at most once per interval
pub struct IntervalGenerator<F> {
    interval: Duration,
    last_run: Option<Instant>,
    inner: F,
}

impl<F> IntervalGenerator<F>
where
    F: FnMut(&mut TickContext<'_>) + Send,
{
    pub fn new(interval: Duration, inner: F) -> Self {
        debug!(?interval, "IntervalGenerator::new: called");
        Self {
            interval,
            last_run: None,
            inner,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl<F> PeriodicActionGenerator for IntervalGenerator<F>
where
    F: FnMut(&mut TickContext<'_>) + Send,
{
    fn execute(&mut self, ctx: &mut TickContext<'_>) {
        let now = ctx.now();
        let due = self
            .last_run
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return;
        }

        self.last_run = Some(now);
        (self.inner)(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::GenericCommandAction;

    #[test]
    fn test_context_submit_goes_to_queue() {
        let mut queue = ActionQueue::new();
        let mut ctx = TickContext::new(Instant::now(), &mut queue);

        assert!(ctx.submit(Box::new(GenericCommandAction::new("status", ""))));
        assert_eq!(ctx.queued(), 1);
        assert_eq!(ctx.queued_of(ActionType::GenericCommand), 1);
        assert_eq!(ctx.queued_of(ActionType::Kick), 0);
    }

    #[test]
    fn test_interval_generator_runs_once_per_interval() {
        let mut queue = ActionQueue::new();
        let mut generator = IntervalGenerator::new(Duration::from_secs(10), |ctx: &mut TickContext<'_>| {
            ctx.submit(Box::new(GenericCommandAction::new("status", "")));
        });

        let t0 = Instant::now();
        for offset in [0, 3, 9, 10, 15, 20] {
            let mut ctx = TickContext::new(t0 + Duration::from_secs(offset), &mut queue);
            generator.execute(&mut ctx);
        }

        // Runs at 0, 10 and 20
        assert_eq!(queue.len(), 3);
    }
}
