//! Background worker draining the command queue
//!
//! One tokio task per [`Dispatcher`]. Each drain takes the head of the queue,
//! sends it over the shared connection and completes its handle. Failures never
//! escape the loop: they are logged, the connection is dropped and the worker
//! cools down before the next attempt.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::{Context, Result};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::command::{CommandHandle, CommandQueue, Dispatch};
use super::config::DispatchConfig;
use super::error::CommandError;
use crate::console::ConsoleOutput;
use crate::rcon::Connection;
use crate::settings::Settings;

/// Connection shared between the worker and anything else that needs to send
pub(crate) type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

/// Owner of the dispatch worker task
///
/// Dropping the dispatcher signals the worker to stop but does not wait for it;
/// call [`Dispatcher::shutdown`] to join the task and abandon what is left.
pub struct Dispatcher {
    commands: CommandQueue,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the worker on the current tokio runtime
    pub fn spawn(
        config: DispatchConfig,
        commands: CommandQueue,
        connection: Box<dyn Connection>,
        settings: Arc<dyn Settings>,
        console: Option<Arc<dyn ConsoleOutput>>,
    ) -> Self {
        Self::spawn_shared(config, commands, Arc::new(Mutex::new(connection)), settings, console)
    }

    pub(crate) fn spawn_shared(
        config: DispatchConfig,
        commands: CommandQueue,
        connection: SharedConnection,
        settings: Arc<dyn Settings>,
        console: Option<Arc<dyn ConsoleOutput>>,
    ) -> Self {
        debug!(?config, "Dispatcher::spawn: called");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = DispatchWorker {
            config,
            commands: commands.clone(),
            connection,
            settings,
            console,
            shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        Self {
            commands,
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Queue the worker drains
    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    pub fn enqueue(&self, text: impl Into<String>, reliable: bool) -> CommandHandle {
        self.commands.enqueue(text, reliable)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the worker, wait for it and abandon every command still queued
    ///
    /// An in-flight send is allowed to finish. Returns how many commands were
    /// abandoned.
    pub async fn shutdown(mut self) -> Result<usize> {
        info!(pending = self.commands.len(), "Shutting down dispatcher");
        let _ = self.shutdown_tx.send(true);

        if let Some(task) = self.task.take() {
            task.await.context("Dispatch worker panicked")?;
        }

        let abandoned = self.commands.close();
        info!(abandoned, "Dispatcher shutdown complete");
        Ok(abandoned)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!("Dispatcher::drop: signalling worker");
            let _ = self.shutdown_tx.send(true);
        }
    }
}

struct DispatchWorker {
    config: DispatchConfig,
    commands: CommandQueue,
    connection: SharedConnection,
    settings: Arc<dyn Settings>,
    console: Option<Arc<dyn ConsoleOutput>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DispatchWorker {
    async fn run(mut self) {
        info!("Dispatch worker starting");

        while !self.stop_requested() {
            if !self.pause(self.config.poll_interval()).await {
                break;
            }
            self.drain().await;
        }

        if let Ok(mut conn) = tokio::time::timeout(self.config.lock_timeout(), self.connection.lock()).await {
            conn.disconnect().await;
        }
        info!("Dispatch worker stopped");
    }

    fn stop_requested(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Sleep for `duration`; false if shutdown was requested meanwhile
    async fn pause(&mut self, duration: Duration) -> bool {
        let stop = tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = self.shutdown_rx.changed() => changed.is_err(),
        };
        !stop && !self.stop_requested()
    }

    async fn drain(&mut self) {
        while !self.stop_requested() {
            let Some(dispatch) = self.commands.next_dispatch() else {
                break;
            };

            if let Err(err) = self.process(dispatch).await {
                debug!(%err, "DispatchWorker::drain: cooling down");
                self.force_disconnect().await;
                if !self.pause(self.config.reconnect_cooldown()).await {
                    break;
                }
            }
        }
    }

    /// One attempt at the given command
    async fn process(&mut self, mut dispatch: Dispatch) -> Result<(), CommandError> {
        let started = Instant::now();

        let response = match self.send(&dispatch.text).await {
            Ok(response) => response,
            Err(err) => {
                if dispatch.reliable {
                    warn!(id = dispatch.id, command = %dispatch.text, %err, "Reliable command failed, will retry");
                } else {
                    error!(id = dispatch.id, command = %dispatch.text, %err, "Command failed");
                }
                if let Some(command) = dispatch.command.as_mut() {
                    command.complete(Err(err.clone()));
                }
                return Err(err);
            }
        };

        let mut command = match dispatch.command.take() {
            Some(command) => Some(command),
            None => self.commands.pop_acknowledged(dispatch.id),
        };

        if !response.is_empty() {
            match &self.console {
                Some(console) => {
                    // A panicking receiver must not take the worker down with it
                    let delivered =
                        panic::catch_unwind(AssertUnwindSafe(|| console.add_console_output_chunk(&response)));
                    if delivered.is_err() {
                        error!(command = %dispatch.text, "Console output receiver panicked, chunk dropped");
                    }
                }
                None => error!(command = %dispatch.text, %response, "No console output attached, dropping response"),
            }
        }

        if self.settings.debug_show_commands() {
            info!(
                command = %dispatch.text,
                elapsed_ms = started.elapsed().as_millis() as u64,
                bytes = response.len(),
                "Command processed"
            );
        }

        if let Some(command) = command.as_mut() {
            command.complete(Ok(response));
        }
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<String, CommandError> {
        let lock_timeout = self.config.lock_timeout();
        let mut conn = tokio::time::timeout(lock_timeout, self.connection.lock())
            .await
            .map_err(|_| CommandError::DispatchTimeout(lock_timeout))?;

        if !conn.is_connected() {
            let endpoint = self.settings.endpoint();
            debug!(?endpoint, "DispatchWorker::send: connecting");
            conn.connect(&endpoint.host, &endpoint.password, endpoint.port).await?;
        }

        Ok(conn.send_command(text).await?)
    }

    async fn force_disconnect(&self) {
        match tokio::time::timeout(self.config.lock_timeout(), self.connection.lock()).await {
            Ok(mut conn) => conn.disconnect().await,
            Err(_) => warn!("Connection still busy, skipping disconnect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::console::ConsoleBuffer;
    use crate::rcon::ConnectionError;
    use crate::rcon::mock::ScriptedConnection;
    use crate::settings::SharedSettings;

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            poll_interval_ms: 5,
            reconnect_cooldown_ms: 5,
            lock_timeout_ms: 50,
        }
    }

    fn settings() -> Arc<SharedSettings> {
        let mut config = Config::default();
        config.rcon.password = "secret".to_string();
        Arc::new(SharedSettings::new(config))
    }

    async fn wait_for(handle: &CommandHandle) -> crate::dispatch::CommandResult {
        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("command did not complete in time")
    }

    #[tokio::test]
    async fn test_reliable_command_retried_until_success() {
        let conn = ScriptedConnection::new();
        conn.push_err(ConnectionError::NotConnected)
            .push_err(ConnectionError::Protocol("short packet".to_string()))
            .push_ok("hostname: test");
        let console = Arc::new(ConsoleBuffer::new());

        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", true);
        let dispatcher = Dispatcher::spawn(
            fast_config(),
            queue.clone(),
            Box::new(conn.clone()),
            settings(),
            Some(console.clone()),
        );

        assert_eq!(wait_for(&handle).await, Ok("hostname: test".to_string()));
        assert_eq!(conn.sent(), vec!["status", "status", "status"]);
        assert!(queue.is_empty());
        assert_eq!(console.chunks(), vec!["hostname: test"]);
        assert!(conn.disconnects() >= 2);

        assert_eq!(dispatcher.shutdown().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_best_effort_failure_not_retried() {
        let conn = ScriptedConnection::new();
        conn.push_err(ConnectionError::Timeout(Duration::from_millis(10)));

        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", false);
        let dispatcher = Dispatcher::spawn(fast_config(), queue.clone(), Box::new(conn.clone()), settings(), None);

        let result = wait_for(&handle).await;
        assert!(matches!(result, Err(CommandError::ConnectionFailure(_))));

        // Give the worker a few more polls to prove nothing is resent
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(conn.sent(), vec!["status"]);

        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_sent_in_fifo_order() {
        let conn = ScriptedConnection::new();
        let queue = CommandQueue::new();
        let handles: Vec<_> = ["say one", "say two", "say three"]
            .iter()
            .map(|text| queue.enqueue(*text, false))
            .collect();

        let dispatcher = Dispatcher::spawn(fast_config(), queue, Box::new(conn.clone()), settings(), None);
        for handle in &handles {
            assert_eq!(wait_for(handle).await, Ok(String::new()));
        }

        assert_eq!(conn.sent(), vec!["say one", "say two", "say three"]);
        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reliable_head_blocks_later_commands() {
        let conn = ScriptedConnection::new();
        conn.fail_connects(3);

        let queue = CommandQueue::new();
        let reliable = queue.enqueue("status", true);
        let later = queue.enqueue("say hi", false);

        let dispatcher = Dispatcher::spawn(fast_config(), queue, Box::new(conn.clone()), settings(), None);
        assert_eq!(wait_for(&later).await, Ok(String::new()));

        // The later command only went out after the reliable one succeeded
        assert!(reliable.is_complete());
        assert_eq!(conn.sent(), vec!["status", "say hi"]);
        assert_eq!(conn.connects().len(), 4);

        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_abandons_queued_commands() {
        let conn = ScriptedConnection::new();
        conn.fail_connects(usize::MAX);

        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", true);
        let dispatcher = Dispatcher::spawn(fast_config(), queue.clone(), Box::new(conn), settings(), None);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(dispatcher.is_running());

        assert_eq!(dispatcher.shutdown().await.unwrap(), 1);
        assert_eq!(handle.try_result(), Some(Err(CommandError::Abandoned)));

        let late = queue.enqueue("status", false);
        assert_eq!(late.try_result(), Some(Err(CommandError::Abandoned)));
    }

    #[tokio::test]
    async fn test_lock_timeout_fails_best_effort_command() {
        let conn: Box<dyn Connection> = Box::new(ScriptedConnection::new());
        let shared: SharedConnection = Arc::new(Mutex::new(conn));
        let held = shared.clone().lock_owned().await;

        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", false);
        let dispatcher = Dispatcher::spawn_shared(fast_config(), queue, shared, settings(), None);

        let result = wait_for(&handle).await;
        assert_eq!(result, Err(CommandError::DispatchTimeout(Duration::from_millis(50))));

        drop(held);
        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_settings_change_picked_up_on_reconnect() {
        let conn = ScriptedConnection::new();
        conn.push_err(ConnectionError::NotConnected);
        let settings = settings();

        let queue = CommandQueue::new();
        let dispatcher = Dispatcher::spawn(
            fast_config(),
            queue.clone(),
            Box::new(conn.clone()),
            settings.clone(),
            None,
        );

        assert!(wait_for(&queue.enqueue("status", false)).await.is_err());
        settings.update(|c| {
            c.rcon.port = 27099;
            c.rcon.password = "changed".to_string();
        });
        assert!(wait_for(&queue.enqueue("status", false)).await.is_ok());

        let connects = conn.connects();
        assert_eq!(connects[0], ("127.0.0.1".to_string(), "secret".to_string(), 27015));
        assert_eq!(
            connects.last().unwrap(),
            &("127.0.0.1".to_string(), "changed".to_string(), 27099)
        );

        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reliable_status_reaches_console_once() {
        let conn = ScriptedConnection::new();
        conn.push_err(ConnectionError::NotConnected).push_ok("name: Alice\n");
        let console = Arc::new(ConsoleBuffer::new());

        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", true);
        let dispatcher = Dispatcher::spawn(
            fast_config(),
            queue,
            Box::new(conn),
            settings(),
            Some(console.clone()),
        );

        assert_eq!(wait_for(&handle).await, Ok("name: Alice\n".to_string()));
        dispatcher.shutdown().await.unwrap();

        assert_eq!(console.chunks(), vec!["name: Alice\n"]);
    }

    #[tokio::test]
    async fn test_panicking_console_does_not_stop_worker() {
        let conn = ScriptedConnection::new();
        conn.push_ok("first").push_ok("second");
        let seen = Arc::new(ConsoleBuffer::new());
        let console: Arc<dyn ConsoleOutput> = Arc::new({
            let seen = seen.clone();
            move |chunk: &str| {
                if chunk == "first" {
                    panic!("receiver failed");
                }
                seen.add_console_output_chunk(chunk);
            }
        });

        let queue = CommandQueue::new();
        let first = queue.enqueue("status", true);
        let second = queue.enqueue("users", false);
        let dispatcher = Dispatcher::spawn(fast_config(), queue.clone(), Box::new(conn), settings(), Some(console));

        assert_eq!(wait_for(&first).await, Ok("first".to_string()));
        assert_eq!(wait_for(&second).await, Ok("second".to_string()));
        assert!(dispatcher.is_running());
        assert!(queue.is_empty());
        assert_eq!(seen.chunks(), vec!["second"]);

        assert_eq!(dispatcher.shutdown().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_response_not_forwarded() {
        let conn = ScriptedConnection::new();
        let console = Arc::new(ConsoleBuffer::new());

        let queue = CommandQueue::new();
        let handle = queue.enqueue("say hi", false);
        let dispatcher = Dispatcher::spawn(fast_config(), queue, Box::new(conn), settings(), Some(console.clone()));

        assert_eq!(wait_for(&handle).await, Ok(String::new()));
        dispatcher.shutdown().await.unwrap();
        assert!(console.chunks().is_empty());
    }
}
