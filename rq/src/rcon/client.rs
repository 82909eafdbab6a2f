//! Source RCON client over TCP

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

use super::Connection;
use super::error::ConnectionError;
use super::packet::{
    AUTH_FAILED_ID, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND,
    SERVERDATA_RESPONSE_VALUE,
};

/// Default timeout for connect and each read/write
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest response accepted for one command
pub const MAX_RESPONSE_LEN: usize = 1 << 20;

/// Source RCON client
///
/// Multi-packet responses are collected by following each command with an
/// empty RESPONSE_VALUE packet: the server answers packets in order, so once
/// that sentinel is mirrored back the command's response is complete.
#[derive(Debug)]
pub struct RconClient {
    stream: Option<TcpStream>,
    next_id: i32,
    timeout: Duration,
}

impl Default for RconClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RconClient {
    pub fn new() -> Self {
        Self {
            stream: None,
            next_id: 1,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Next request id; always positive so it can't collide with the auth failure id
    fn next_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if self.next_id == i32::MAX { 1 } else { self.next_id + 1 };
        id
    }

    async fn authenticate(
        stream: &mut TcpStream,
        auth_id: i32,
        password: &str,
        timeout: Duration,
    ) -> Result<(), ConnectionError> {
        with_timeout(timeout, Packet::new(auth_id, SERVERDATA_AUTH, password).write_to(stream)).await?;

        loop {
            let packet = with_timeout(timeout, Packet::read_from(stream)).await?;
            match packet.kind {
                SERVERDATA_AUTH_RESPONSE if packet.id == AUTH_FAILED_ID => {
                    return Err(ConnectionError::AuthRejected);
                }
                SERVERDATA_AUTH_RESPONSE if packet.id == auth_id => return Ok(()),
                _ => {
                    // SRCDS sends an empty RESPONSE_VALUE ahead of the auth response
                    trace!(id = packet.id, kind = packet.kind, "RconClient::authenticate: skipping packet");
                }
            }
        }
    }

    async fn exchange(
        stream: &mut TcpStream,
        command_id: i32,
        sentinel_id: i32,
        command: &str,
        timeout: Duration,
    ) -> Result<String, ConnectionError> {
        with_timeout(timeout, async {
            Packet::new(command_id, SERVERDATA_EXECCOMMAND, command).write_to(stream).await?;
            Packet::new(sentinel_id, SERVERDATA_RESPONSE_VALUE, "").write_to(stream).await
        })
        .await?;

        // Bodies are joined as bytes, a character may straddle two packets
        let mut response = Vec::new();
        loop {
            let packet = with_timeout(timeout, Packet::read_from(stream)).await?;
            if packet.id == sentinel_id {
                return Ok(String::from_utf8_lossy(&response).into_owned());
            }
            if packet.id == command_id && packet.kind == SERVERDATA_RESPONSE_VALUE {
                if response.len() + packet.body.len() > MAX_RESPONSE_LEN {
                    return Err(ConnectionError::Protocol(format!(
                        "response exceeds {} bytes without an end marker",
                        MAX_RESPONSE_LEN
                    )));
                }
                response.extend_from_slice(&packet.body);
            } else {
                // Leftovers from an earlier exchange
                trace!(id = packet.id, kind = packet.kind, "RconClient::exchange: skipping packet");
            }
        }
    }
}

/// Bound a fallible I/O future by `timeout`
async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, ConnectionError>
where
    F: Future<Output = Result<T, ConnectionError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ConnectionError::Timeout(timeout))?
}

#[async_trait]
impl Connection for RconClient {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self, host: &str, password: &str, port: u16) -> Result<(), ConnectionError> {
        debug!(%host, port, "RconClient::connect: called");
        self.disconnect().await;

        let timeout = self.timeout;
        let mut stream = with_timeout(timeout, async {
            TcpStream::connect((host, port)).await.map_err(ConnectionError::from)
        })
        .await?;
        stream.set_nodelay(true)?;

        let auth_id = self.next_id();
        Self::authenticate(&mut stream, auth_id, password, timeout).await?;

        info!(%host, port, "Connected to RCON server");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send_command(&mut self, command: &str) -> Result<String, ConnectionError> {
        debug!(%command, "RconClient::send_command: called");
        let command_id = self.next_id();
        let sentinel_id = self.next_id();
        let timeout = self.timeout;

        let stream = self.stream.as_mut().ok_or(ConnectionError::NotConnected)?;
        let result = Self::exchange(stream, command_id, sentinel_id, command, timeout).await;

        if result.is_err() {
            // The stream may be mid-packet, it can't be reused
            self.stream = None;
        }
        result
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("RconClient::disconnect: closing stream");
            let _ = stream.shutdown().await;
        }
    }
}
