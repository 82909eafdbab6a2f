//! Read-only settings the dispatch worker polls on every connect attempt

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::Config;

/// Where and how to reach the RCON endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl fmt::Debug for EndpointSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings source
pub trait Settings: Send + Sync {
    /// Endpoint to connect to; read on every connect, so changes apply on the next reconnect
    fn endpoint(&self) -> EndpointSettings;

    /// Log every processed command with its timing
    fn debug_show_commands(&self) -> bool;
}

impl Settings for Config {
    fn endpoint(&self) -> EndpointSettings {
        EndpointSettings {
            host: self.rcon.host.clone(),
            port: self.rcon.port,
            password: self.rcon.resolve_password(),
        }
    }

    fn debug_show_commands(&self) -> bool {
        self.debug_show_commands
    }
}

/// Settings that the owner can change while the dispatcher runs
#[derive(Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Config>>,
}

impl SharedSettings {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Modify the settings in place
    pub fn update(&self, f: impl FnOnce(&mut Config)) {
        debug!("SharedSettings::update: called");
        let mut config = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut config);
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> Config {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Settings for SharedSettings {
    fn endpoint(&self) -> EndpointSettings {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).endpoint()
    }

    fn debug_show_commands(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .debug_show_commands
    }
}
