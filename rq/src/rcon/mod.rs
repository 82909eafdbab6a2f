//! Connection to the remote RCON endpoint
//!
//! The dispatch worker only sees the [`Connection`] trait. [`RconClient`]
//! speaks the Source RCON protocol over TCP.

use async_trait::async_trait;

mod client;
mod error;
pub mod packet;

pub use client::{MAX_RESPONSE_LEN, RconClient};
pub use error::ConnectionError;
pub use packet::Packet;

/// One command at a time, one text response per command
#[async_trait]
pub trait Connection: Send {
    fn is_connected(&self) -> bool;

    /// Open and authenticate a connection, replacing any existing one
    async fn connect(&mut self, host: &str, password: &str, port: u16) -> Result<(), ConnectionError>;

    /// Send a command and wait for its full response
    async fn send_command(&mut self, command: &str) -> Result<String, ConnectionError>;

    /// Drop the connection; a no-op when not connected
    async fn disconnect(&mut self);
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tracing::debug;

    #[derive(Default)]
    struct MockState {
        script: VecDeque<Result<String, ConnectionError>>,
        connect_failures: usize,
        connected: bool,
        sent: Vec<String>,
        connects: Vec<(String, String, u16)>,
        disconnects: usize,
    }

    /// Connection that replays scripted send results
    ///
    /// Clones share state, so a test can keep one clone for inspection after
    /// handing another to the dispatcher. An exhausted script answers with an
    /// empty response.
    #[derive(Clone, Default)]
    pub struct ScriptedConnection {
        state: Arc<Mutex<MockState>>,
    }

    impl ScriptedConnection {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_ok(&self, response: &str) -> &Self {
            self.state.lock().unwrap().script.push_back(Ok(response.to_string()));
            self
        }

        pub fn push_err(&self, err: ConnectionError) -> &Self {
            self.state.lock().unwrap().script.push_back(Err(err));
            self
        }

        /// Make the next `count` connect attempts fail
        pub fn fail_connects(&self, count: usize) {
            self.state.lock().unwrap().connect_failures = count;
        }

        pub fn sent(&self) -> Vec<String> {
            self.state.lock().unwrap().sent.clone()
        }

        pub fn connects(&self) -> Vec<(String, String, u16)> {
            self.state.lock().unwrap().connects.clone()
        }

        pub fn disconnects(&self) -> usize {
            self.state.lock().unwrap().disconnects
        }
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        fn is_connected(&self) -> bool {
            self.state.lock().unwrap().connected
        }

        async fn connect(&mut self, host: &str, password: &str, port: u16) -> Result<(), ConnectionError> {
            debug!(%host, port, "ScriptedConnection::connect: called");
            let mut state = self.state.lock().unwrap();
            state.connects.push((host.to_string(), password.to_string(), port));
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                return Err(ConnectionError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            state.connected = true;
            Ok(())
        }

        async fn send_command(&mut self, command: &str) -> Result<String, ConnectionError> {
            debug!(%command, "ScriptedConnection::send_command: called");
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Err(ConnectionError::NotConnected);
            }
            state.sent.push(command.to_string());
            state.script.pop_front().unwrap_or_else(|| Ok(String::new()))
        }

        async fn disconnect(&mut self) {
            let mut state = self.state.lock().unwrap();
            state.connected = false;
            state.disconnects += 1;
        }
    }
}
