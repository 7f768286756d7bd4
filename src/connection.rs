//! Command connection supervision
//!
//! One mutex owns both the connection state transitions and the live command
//! handle, so connect/disconnect is serialized across the command and
//! telemetry paths and no two commands are ever in flight at once.

use crate::config::ConnectionConfig;
use crate::error::{ArmError, Result};
use crate::rpc::CommandPort;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

/// Factory producing a fresh command handle; injected so tests can supply a
/// scripted port.
pub type Connector = Box<dyn Fn() -> anyhow::Result<Box<dyn CommandPort>> + Send + Sync>;

pub struct CommandLink {
    port: Mutex<Option<Box<dyn CommandPort>>>,
    connector: Connector,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl CommandLink {
    pub fn new(connector: Connector, config: &ConnectionConfig) -> Self {
        Self {
            port: Mutex::new(None),
            connector,
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay(),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.port.lock().await.is_some()
    }

    /// Establish the command connection. A no-op when already connected; on
    /// failure any partial handle is torn down and the link stays
    /// disconnected.
    pub async fn connect(&self) -> bool {
        let mut guard = self.port.lock().await;
        info!("Connecting to arm");

        if guard.is_some() {
            info!("Arm already connected, skipping connection");
            return true;
        }

        match (self.connector)() {
            Ok(port) => {
                *guard = Some(port);
                info!("Arm connected");
                true
            }
            Err(e) => {
                warn!("Failed to connect to arm: {}", e);
                false
            }
        }
    }

    /// Tear down the command connection. A no-op when already disconnected.
    pub async fn disconnect(&self) {
        let mut guard = self.port.lock().await;
        if guard.take().is_some() {
            info!("Disconnected from arm");
        }
    }

    /// Issue one command against the connected handle, reconnecting first if
    /// necessary. Fails with `ConnectionUnavailable` once the retry budget
    /// is spent.
    pub async fn command<T>(&self, op: impl FnOnce(&mut dyn CommandPort) -> T) -> Result<T> {
        self.ensure_connected().await?;

        let mut guard = self.port.lock().await;
        match guard.as_mut() {
            Some(port) => Ok(op(port.as_mut())),
            // Lost between the connectivity check and the lock
            None => Err(ArmError::ConnectionUnavailable),
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.is_connected().await {
            return Ok(());
        }

        for attempt in 0..self.retry_attempts {
            warn!("Arm not connected, trying to reconnect");
            if self.connect().await {
                return Ok(());
            }
            if attempt + 1 < self.retry_attempts {
                sleep(self.retry_delay).await;
            }
        }

        Err(ArmError::ConnectionUnavailable)
    }
}
