//! ActionManager - scheduler and dispatcher behind one facade
//!
//! The owner drives [`ActionManager::update`] from its own loop; the dispatcher
//! drains commands in the background on the tokio runtime it was created on.

use std::sync::Arc;
use std::time::Instant;

use eyre::Result;
use tracing::{debug, info};

use crate::action::{Action, ActionGenerator, PeriodicActionGenerator};
use crate::config::Config;
use crate::console::ConsoleOutput;
use crate::dispatch::{CommandHandle, CommandQueue, Dispatcher};
use crate::rcon::Connection;
use crate::scheduler::{Scheduler, SchedulerStats, TickOutcome};
use crate::settings::Settings;

pub struct ActionManager {
    scheduler: Scheduler,
    dispatcher: Dispatcher,
}

impl ActionManager {
    /// Create the manager and start its dispatch worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &Config,
        connection: Box<dyn Connection>,
        settings: Arc<dyn Settings>,
        console: Option<Arc<dyn ConsoleOutput>>,
    ) -> Self {
        debug!("ActionManager::new: called");
        let commands = CommandQueue::new();
        let scheduler = Scheduler::new(config.scheduler.clone(), commands.clone());
        let dispatcher = Dispatcher::spawn(config.dispatch.clone(), commands, connection, settings, console);

        Self { scheduler, dispatcher }
    }

    /// Submit an action; false if its type is already at capacity
    pub fn queue_action(&mut self, action: Box<dyn Action>) -> bool {
        self.scheduler.submit(action)
    }

    pub fn add_periodic_generator(&mut self, generator: Box<dyn PeriodicActionGenerator>) {
        self.scheduler.add_periodic_generator(generator);
    }

    /// Add a generator that runs only in ticks that wrote commands
    pub fn add_piggyback_generator(&mut self, generator: Box<dyn ActionGenerator>) {
        self.scheduler.add_piggyback_generator(generator);
    }

    /// Run a scheduling tick at the current time
    pub fn update(&mut self) -> TickOutcome {
        self.tick(Instant::now())
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        self.scheduler.tick(now)
    }

    /// Queue a raw command, bypassing actions and rate limits
    pub fn run_command_async(&self, text: impl Into<String>, reliable: bool) -> CommandHandle {
        self.dispatcher.enqueue(text, reliable)
    }

    /// Fire-and-forget best-effort command
    ///
    /// Always returns true; the response still reaches the console output.
    pub fn send_command(&self, text: impl Into<String>) -> bool {
        let handle = self.dispatcher.enqueue(text, false);
        debug!(id = handle.id(), "ActionManager::send_command: queued");
        true
    }

    /// Raw commands waiting for the dispatcher
    pub fn pending_commands(&self) -> usize {
        self.dispatcher.commands().len()
    }

    pub fn queued_actions(&self) -> usize {
        self.scheduler.queued()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Stop the dispatcher and abandon what is still queued
    pub async fn shutdown(self) -> Result<usize> {
        info!(
            actions = self.scheduler.queued(),
            commands = self.pending_commands(),
            "Shutting down action manager"
        );
        self.dispatcher.shutdown().await
    }
}
