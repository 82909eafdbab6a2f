//! Scheduler implementation

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::action::{Action, ActionGenerator, ActionType, CommandWriter, PeriodicActionGenerator, TickContext, join_command};
use crate::dispatch::CommandQueue;

use super::config::SchedulerConfig;
use super::queue::{ActionQueue, SchedulerStats, TickOutcome, TickReport};

/// Writer handed to actions; forwards every command to the command queue as
/// best-effort
struct QueueWriter<'a> {
    commands: &'a CommandQueue,
    written: usize,
}

impl CommandWriter for QueueWriter<'_> {
    fn write(&mut self, name: &str, args: &str) {
        self.written += 1;
        self.commands.enqueue(join_command(name, args), false);
    }
}

/// Result of one pass over the queue
#[derive(Debug, Default, Clone, Copy)]
struct PassResult {
    fired: usize,
    written: usize,
}

/// The Scheduler turns queued actions into commands, one tick at a time.
///
/// It is driven by an external caller and never clocks itself. Each type fires
/// at most once per tick and no more often than its `min_interval`.
pub struct Scheduler {
    config: SchedulerConfig,

    /// Pending actions
    queue: ActionQueue,

    /// Run at the start of every processed tick
    periodic_generators: Vec<Box<dyn PeriodicActionGenerator>>,

    /// Run after a pass that wrote at least one command
    piggyback_generators: Vec<Box<dyn ActionGenerator>>,

    /// Last time each type fired
    last_trigger: HashMap<ActionType, Instant>,

    /// Last processed tick
    last_tick: Option<Instant>,

    /// Where written commands go
    commands: CommandQueue,

    total_ticks: u64,
    total_fired: u64,
    total_commands_written: u64,
}

impl Scheduler {
    /// Create a new scheduler writing into the given command queue
    pub fn new(config: SchedulerConfig, commands: CommandQueue) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            config,
            queue: ActionQueue::new(),
            periodic_generators: Vec::new(),
            piggyback_generators: Vec::new(),
            last_trigger: HashMap::new(),
            last_tick: None,
            commands,
            total_ticks: 0,
            total_fired: 0,
            total_commands_written: 0,
        }
    }

    /// Queue an action; false if its type is at its cap
    pub fn submit(&mut self, action: Box<dyn Action>) -> bool {
        self.queue.submit(action)
    }

    pub fn add_periodic_generator(&mut self, generator: Box<dyn PeriodicActionGenerator>) {
        debug!("Scheduler::add_periodic_generator: called");
        self.periodic_generators.push(generator);
    }

    pub fn add_piggyback_generator(&mut self, generator: Box<dyn ActionGenerator>) {
        debug!("Scheduler::add_piggyback_generator: called");
        self.piggyback_generators.push(generator);
    }

    /// Process one tick at `now`
    ///
    /// Skipped if called before `update_interval` has passed since the last
    /// processed tick.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if let Some(last_tick) = self.last_tick {
            if now < last_tick + self.config.update_interval() {
                trace!("Scheduler::tick: before update interval, skipping");
                return TickOutcome::Skipped;
            }
        }

        for generator in &mut self.periodic_generators {
            let mut ctx = TickContext::new(now, &mut self.queue);
            generator.execute(&mut ctx);
        }

        let mut report = TickReport::default();

        if !self.queue.is_empty() {
            let mut fired_this_tick = HashSet::new();

            let primary = self.process_actions(now, &mut fired_this_tick);
            report.fired += primary.fired;
            report.commands_written += primary.written;

            if primary.written > 0 {
                debug!(
                    written = primary.written,
                    generators = self.piggyback_generators.len(),
                    "Scheduler::tick: commands written, running piggyback generators"
                );
                for generator in &mut self.piggyback_generators {
                    let mut ctx = TickContext::new(now, &mut self.queue);
                    generator.execute(&mut ctx);
                }
                report.piggyback_ran = true;

                let piggyback = self.process_actions(now, &mut fired_this_tick);
                report.fired += piggyback.fired;
                report.commands_written += piggyback.written;
            }
        }

        report.remaining = self.queue.len();
        self.last_tick = Some(now);
        self.total_ticks += 1;
        self.total_fired += report.fired as u64;
        self.total_commands_written += report.commands_written as u64;

        if report.fired > 0 {
            debug!(?report, "Scheduler::tick: processed");
        }
        TickOutcome::Ran(report)
    }

    /// One pass over the queue in order, firing every action that is not gated
    fn process_actions(&mut self, now: Instant, fired_this_tick: &mut HashSet<ActionType>) -> PassResult {
        let mut writer = QueueWriter {
            commands: &self.commands,
            written: 0,
        };
        let mut result = PassResult::default();
        let mut kept = VecDeque::new();

        for action in self.queue.take_all() {
            let action_type = action.action_type();
            if is_gated(
                &self.last_trigger,
                fired_this_tick,
                action_type,
                action.min_interval(),
                now,
            ) {
                trace!(%action_type, "Scheduler::process_actions: gated, keeping");
                kept.push_back(action);
                continue;
            }

            fired_this_tick.insert(action_type);
            action.write_commands(&mut writer);

            let last = self.last_trigger.entry(action_type).or_insert(now);
            *last = (*last).max(now);

            result.fired += 1;
            debug!(%action_type, ?action, "Scheduler::process_actions: fired");
        }

        result.written = writer.written;
        self.queue.restore(kept);
        result
    }

    /// Number of queued actions
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Read-only view of the action queue
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Last time the given type fired
    pub fn last_trigger(&self, action_type: ActionType) -> Option<Instant> {
        self.last_trigger.get(&action_type).copied()
    }

    /// The command queue this scheduler writes into
    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            total_ticks: self.total_ticks,
            total_submitted: self.queue.total_accepted() + self.queue.total_rejected(),
            total_rejected: self.queue.total_rejected(),
            total_fired: self.total_fired,
            total_commands_written: self.total_commands_written,
            peak_queue_depth: self.queue.peak_depth(),
        }
    }
}

/// An action is held back if its type already fired this tick, or its type
/// fired less than `min_interval` ago
fn is_gated(
    last_trigger: &HashMap<ActionType, Instant>,
    fired_this_tick: &HashSet<ActionType>,
    action_type: ActionType,
    min_interval: Duration,
    now: Instant,
) -> bool {
    if fired_this_tick.contains(&action_type) {
        return true;
    }
    if min_interval.is_zero() {
        return false;
    }
    last_trigger
        .get(&action_type)
        .is_some_and(|last| now.saturating_duration_since(*last) < min_interval)
}
