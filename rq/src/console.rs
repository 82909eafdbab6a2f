//! Receiver for console output produced by commands
//!
//! Every non-empty command response is handed over as one chunk, in dispatch
//! order. What happens to it (parsing, display) is the receiver's business.

use std::sync::{Mutex, PoisonError};

/// Receiver of raw command responses
pub trait ConsoleOutput: Send + Sync {
    fn add_console_output_chunk(&self, chunk: &str);
}

impl<F> ConsoleOutput for F
where
    F: Fn(&str) + Send + Sync,
{
    fn add_console_output_chunk(&self, chunk: &str) {
        self(chunk)
    }
}

/// Collects chunks in memory
#[derive(Debug, Default)]
pub struct ConsoleBuffer {
    chunks: Mutex<Vec<String>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks received so far
    pub fn chunks(&self) -> Vec<String> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remove and return everything received so far
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.chunks.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ConsoleOutput for ConsoleBuffer {
    fn add_console_output_chunk(&self, chunk: &str) {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chunk.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_buffer_collects_and_takes() {
        let buffer = ConsoleBuffer::new();
        buffer.add_console_output_chunk("a");
        buffer.add_console_output_chunk("b");

        assert_eq!(buffer.chunks(), vec!["a", "b"]);
        assert_eq!(buffer.take(), vec!["a", "b"]);
        assert!(buffer.chunks().is_empty());
    }

    #[test]
    fn test_closure_receiver() {
        let bytes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&bytes);
        let receiver: Arc<dyn ConsoleOutput> = Arc::new(move |chunk: &str| {
            counter.fetch_add(chunk.len(), Ordering::SeqCst);
        });

        receiver.add_console_output_chunk("hello");
        assert_eq!(bytes.load(Ordering::SeqCst), 5);
    }
}
