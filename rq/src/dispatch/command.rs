//! Pending commands and their result handles

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::Shared;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::error::CommandError;

/// Outcome of a dispatched command
pub type CommandResult = Result<String, CommandError>;

/// Single-assignment handle to a command's response
///
/// Cloneable; every clone observes the same result. Completed exactly once by
/// the dispatch worker. If the dispatcher is torn down first, the handle
/// resolves to [`CommandError::Abandoned`].
#[derive(Clone)]
pub struct CommandHandle {
    id: u64,
    result: Shared<oneshot::Receiver<CommandResult>>,
}

impl CommandHandle {
    fn new(id: u64, rx: oneshot::Receiver<CommandResult>) -> Self {
        Self { id, result: rx.shared() }
    }

    /// Queue-assigned id of the command
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the command to complete
    pub async fn wait(&self) -> CommandResult {
        self.result.clone().await.unwrap_or(Err(CommandError::Abandoned))
    }

    /// Result if the command already completed, without waiting
    pub fn try_result(&self) -> Option<CommandResult> {
        self.result
            .clone()
            .now_or_never()
            .map(|r| r.unwrap_or(Err(CommandError::Abandoned)))
    }

    pub fn is_complete(&self) -> bool {
        self.try_result().is_some()
    }
}

impl fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandle")
            .field("id", &self.id)
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// A command waiting in the queue
pub(crate) struct PendingCommand {
    pub(crate) id: u64,
    pub(crate) text: String,
    pub(crate) reliable: bool,
    completion: Option<oneshot::Sender<CommandResult>>,
}

impl PendingCommand {
    /// Complete the handle. Later calls are no-ops.
    pub(crate) fn complete(&mut self, result: CommandResult) {
        if let Some(tx) = self.completion.take() {
            // Receivers may all be gone, that's fine
            let _ = tx.send(result);
        }
    }
}

/// What the worker takes off the queue for one attempt
///
/// Best-effort commands are moved out of the queue entirely. Reliable commands
/// are copied: `command` is `None` and the queued command stays at the head.
pub(crate) struct Dispatch {
    pub(crate) id: u64,
    pub(crate) text: String,
    pub(crate) reliable: bool,
    pub(crate) command: Option<PendingCommand>,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<PendingCommand>,
    next_id: u64,
    closed: bool,
}

/// FIFO of commands shared between submitters and the dispatch worker
///
/// The lock is held only for the queue operation itself, never across I/O.
#[derive(Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command and return its handle; never blocks on I/O
    pub fn enqueue(&self, text: impl Into<String>, reliable: bool) -> CommandHandle {
        let text = text.into();
        let (tx, rx) = oneshot::channel();
        let mut inner = self.lock();

        let id = inner.next_id;
        inner.next_id += 1;
        let mut command = PendingCommand {
            id,
            text,
            reliable,
            completion: Some(tx),
        };

        if inner.closed {
            warn!(id, command = %command.text, "CommandQueue::enqueue: queue closed, abandoning");
            command.complete(Err(CommandError::Abandoned));
        } else {
            debug!(id, command = %command.text, reliable, "CommandQueue::enqueue: queued");
            inner.pending.push_back(command);
        }

        CommandHandle::new(id, rx)
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Texts of the queued commands, head first
    pub fn pending_texts(&self) -> Vec<String> {
        self.lock().pending.iter().map(|c| c.text.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Take the head for one dispatch attempt
    pub(crate) fn next_dispatch(&self) -> Option<Dispatch> {
        let mut inner = self.lock();
        let front = inner.pending.front()?;

        if front.reliable {
            let dispatch = Dispatch {
                id: front.id,
                text: front.text.clone(),
                reliable: true,
                command: None,
            };
            Some(dispatch)
        } else {
            let command = inner.pending.pop_front()?;
            Some(Dispatch {
                id: command.id,
                text: command.text.clone(),
                reliable: false,
                command: Some(command),
            })
        }
    }

    /// Remove the reliable command `id` from the head once it was acknowledged
    pub(crate) fn pop_acknowledged(&self, id: u64) -> Option<PendingCommand> {
        let mut inner = self.lock();
        match inner.pending.front().map(|c| c.id) {
            Some(head) if head == id => inner.pending.pop_front(),
            Some(head) => {
                warn!(id, head, "CommandQueue::pop_acknowledged: head changed under us");
                None
            }
            None => {
                warn!(id, "CommandQueue::pop_acknowledged: queue empty");
                None
            }
        }
    }

    /// Close the queue and abandon everything still pending
    ///
    /// Returns how many commands were abandoned.
    pub(crate) fn close(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;
        let abandoned = inner.pending.len();
        for mut command in inner.pending.drain(..) {
            command.complete(Err(CommandError::Abandoned));
        }
        if abandoned > 0 {
            warn!(abandoned, "CommandQueue::close: abandoned pending commands");
        }
        abandoned
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("CommandQueue")
            .field("pending", &inner.pending.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_assigns_increasing_ids() {
        let queue = CommandQueue::new();
        let a = queue.enqueue("status", false);
        let b = queue.enqueue("users", true);

        assert!(b.id() > a.id());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_texts(), vec!["status", "users"]);
        assert!(!a.is_complete());
    }

    #[test]
    fn test_best_effort_is_removed_when_taken() {
        let queue = CommandQueue::new();
        queue.enqueue("status", false);

        let dispatch = queue.next_dispatch().unwrap();
        assert!(!dispatch.reliable);
        assert!(dispatch.command.is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reliable_stays_at_head_until_acknowledged() {
        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", true);
        queue.enqueue("users", false);

        let first = queue.next_dispatch().unwrap();
        assert!(first.reliable);
        assert!(first.command.is_none());
        assert_eq!(queue.len(), 2);

        // Taking again yields the same head
        let again = queue.next_dispatch().unwrap();
        assert_eq!(again.id, first.id);

        let mut acked = queue.pop_acknowledged(first.id).unwrap();
        acked.complete(Ok("ok".to_string()));

        assert_eq!(queue.pending_texts(), vec!["users"]);
        assert_eq!(handle.try_result(), Some(Ok("ok".to_string())));
    }

    #[test]
    fn test_pop_acknowledged_ignores_wrong_id() {
        let queue = CommandQueue::new();
        queue.enqueue("status", true);
        assert!(queue.pop_acknowledged(999).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_handle_completes_once_for_all_clones() {
        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", false);
        let other = handle.clone();

        let mut command = queue.next_dispatch().unwrap().command.unwrap();
        command.complete(Ok("first".to_string()));
        command.complete(Ok("second".to_string()));

        assert_eq!(handle.try_result(), Some(Ok("first".to_string())));
        assert_eq!(other.try_result(), Some(Ok("first".to_string())));
    }

    #[test]
    fn test_close_abandons_pending_and_future_commands() {
        let queue = CommandQueue::new();
        let pending = queue.enqueue("status", true);

        assert_eq!(queue.close(), 1);
        assert!(queue.is_closed());
        assert_eq!(pending.try_result(), Some(Err(CommandError::Abandoned)));

        let late = queue.enqueue("status", false);
        assert!(queue.is_empty());
        assert_eq!(late.try_result(), Some(Err(CommandError::Abandoned)));
    }

    #[test]
    fn test_dropped_sender_reads_as_abandoned() {
        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", false);
        drop(queue.next_dispatch());

        assert_eq!(handle.try_result(), Some(Err(CommandError::Abandoned)));
    }

    #[tokio::test]
    async fn test_wait_resolves_after_completion() {
        let queue = CommandQueue::new();
        let handle = queue.enqueue("status", false);
        let mut command = queue.next_dispatch().unwrap().command.unwrap();

        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });
        command.complete(Ok("hostname: test".to_string()));

        assert_eq!(waiter.await.unwrap(), Ok("hostname: test".to_string()));
    }
}
