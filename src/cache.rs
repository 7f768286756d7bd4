//! Latest-status cache
//!
//! Holds at most one decoded status frame. The telemetry task is the only
//! writer; any number of workers read concurrently. Frames are swapped in
//! wholesale behind a watch channel, so a reader always observes either a
//! complete frame or none at all.

use crate::error::{ArmError, Result};
use crate::state::StatusFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
pub struct StatusCache {
    slot: watch::Sender<Option<Arc<StatusFrame>>>,
    poll_interval: Duration,
}

impl StatusCache {
    pub fn new(poll_interval: Duration) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot,
            poll_interval,
        }
    }

    /// Install a fresh frame, replacing the previous one.
    pub fn set(&self, frame: StatusFrame) {
        self.slot.send_replace(Some(Arc::new(frame)));
    }

    /// Drop the current frame, e.g. when the telemetry stream is lost.
    /// Readers then block until fresh telemetry arrives instead of being
    /// served stale data.
    pub fn clear(&self) {
        self.slot.send_replace(None);
    }

    /// Current frame without waiting.
    pub fn latest(&self) -> Option<Arc<StatusFrame>> {
        self.slot.borrow().clone()
    }

    /// Wait for a frame to be present, polling until `timeout` elapses.
    ///
    /// With `required`, a timeout is an error; otherwise it yields
    /// `Ok(None)` ("status unknown").
    pub async fn get(&self, timeout: Duration, required: bool) -> Result<Option<Arc<StatusFrame>>> {
        if let Some(frame) = self.latest() {
            return Ok(Some(frame));
        }

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            sleep(self.poll_interval).await;
            if let Some(frame) = self.latest() {
                return Ok(Some(frame));
            }
        }

        if required {
            Err(ArmError::StatusUnavailable)
        } else {
            Ok(None)
        }
    }
}
