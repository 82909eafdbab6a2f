//! Source RCON packet framing
//!
//! Every packet is `size | id | type | body | \0 | \0`, integers little-endian
//! i32, where `size` counts everything after itself.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::ConnectionError;

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Id the server answers an authentication attempt with when the password is wrong
pub const AUTH_FAILED_ID: i32 = -1;

/// Bytes of `size` not taken by the body: id, type and the two terminators
const OVERHEAD: usize = 10;

/// Largest body the protocol allows in one packet
pub const MAX_BODY_LEN: usize = 4096;

/// One RCON packet
///
/// The body is kept as raw bytes: servers split long responses at byte
/// boundaries, so a single packet may end in the middle of a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Body as text, invalid UTF-8 replaced
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, ConnectionError> {
        let body = self.body.as_slice();
        if body.len() > MAX_BODY_LEN {
            return Err(ConnectionError::Protocol(format!(
                "body of {} bytes exceeds {} byte limit",
                body.len(),
                MAX_BODY_LEN
            )));
        }
        if body.contains(&0) {
            return Err(ConnectionError::Protocol("body contains a NUL byte".to_string()));
        }

        let size = (body.len() + OVERHEAD) as i32;
        let mut buf = Vec::with_capacity(4 + size as usize);
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    /// Parse the bytes following the size field
    pub fn decode(payload: &[u8]) -> Result<Self, ConnectionError> {
        if payload.len() < OVERHEAD {
            return Err(ConnectionError::Protocol(format!(
                "packet of {} bytes is shorter than the {} byte minimum",
                payload.len(),
                OVERHEAD
            )));
        }

        let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let kind = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);

        let mut body = &payload[8..payload.len() - 2];
        while let Some((&0, rest)) = body.split_last() {
            body = rest;
        }

        Ok(Self {
            id,
            kind,
            body: body.to_vec(),
        })
    }

    /// Read one packet
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, ConnectionError>
    where
        R: AsyncRead + Unpin,
    {
        let mut size_buf = [0u8; 4];
        reader.read_exact(&mut size_buf).await?;
        let size = i32::from_le_bytes(size_buf);

        if size < OVERHEAD as i32 || size as usize > MAX_BODY_LEN + OVERHEAD {
            return Err(ConnectionError::Protocol(format!("invalid packet size {}", size)));
        }

        let mut payload = vec![0u8; size as usize];
        reader.read_exact(&mut payload).await?;
        Self::decode(&payload)
    }

    /// Write one packet
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), ConnectionError>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.encode()?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}
