//! Arm controller
//!
//! The single owning object threaded through every operation: configuration,
//! the status cache, the supervised command link and the side-channel
//! motion-paused / cancellation flags. There are no globals; everything a
//! worker needs lives here behind an `Arc`.

use crate::cache::StatusCache;
use crate::config::ArmConfig;
use crate::connection::{CommandLink, Connector};
use crate::error::{ArmError, Result};
use crate::rpc::TcpCommandPort;
use crate::settings;
use crate::state::{ArmMode, ArmState, CartesianVector, CollisionStrategy, JointVector, StatusFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Torques are reported in device units; display units are ×1000.
const TORQUE_DISPLAY_SCALE: f64 = 1000.0;

pub struct ArmController {
    config: ArmConfig,
    cache: Arc<StatusCache>,
    link: CommandLink,
    motion_paused: AtomicBool,
    cancel_requested: AtomicBool,
}

impl ArmController {
    pub fn new(config: ArmConfig, connector: Connector) -> Self {
        let cache = Arc::new(StatusCache::new(config.timing.status_poll()));
        let link = CommandLink::new(connector, &config.connection);
        Self {
            config,
            cache,
            link,
            motion_paused: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Controller wired to the real TCP command port from the configuration.
    pub fn with_tcp_connector(config: ArmConfig) -> Self {
        let host = config.robot.host.clone();
        let port = config.robot.command_port;
        let connector: Connector = Box::new(move || {
            let client = TcpCommandPort::connect(&host, port)?;
            Ok(Box::new(client) as Box<dyn crate::rpc::CommandPort>)
        });
        Self::new(config, connector)
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    pub fn link(&self) -> &CommandLink {
        &self.link
    }

    // MARK - Status accessors

    /// Latest status frame, waiting up to the configured status timeout for
    /// telemetry to arrive.
    pub async fn status(&self) -> Result<Arc<StatusFrame>> {
        match self
            .cache
            .get(self.config.timing.status_timeout(), true)
            .await?
        {
            Some(frame) => Ok(frame),
            None => Err(ArmError::StatusUnavailable),
        }
    }

    pub async fn joint_state(&self) -> Result<JointVector> {
        Ok(JointVector::from_array(self.status().await?.joint_positions))
    }

    pub async fn cartesian_state(&self) -> Result<CartesianVector> {
        Ok(self.status().await?.cartesian)
    }

    pub async fn torque_state(&self) -> Result<JointVector> {
        Ok(JointVector::from_array(self.status().await?.joint_torques) * TORQUE_DISPLAY_SCALE)
    }

    pub async fn collision_detected(&self) -> Result<bool> {
        Ok(self.status().await?.collision)
    }

    /// Emergency-stop flag, or `None` when no telemetry arrives within the
    /// short emergency-stop timeout. This accessor never fails; "unknown"
    /// is an acceptable answer here.
    pub async fn emergency_stop_detected(&self) -> Option<bool> {
        match self
            .cache
            .get(self.config.timing.estop_timeout(), false)
            .await
        {
            Ok(Some(frame)) => Some(frame.emergency_stop),
            _ => None,
        }
    }

    pub async fn error_detected(&self) -> Result<bool> {
        Ok(self.status().await?.has_error())
    }

    pub async fn motion_done(&self) -> Result<bool> {
        Ok(self.status().await?.motion_done)
    }

    pub async fn arm_state(&self) -> Result<ArmState> {
        Ok(self.status().await?.state)
    }

    pub async fn arm_mode(&self) -> Result<ArmMode> {
        Ok(self.status().await?.mode)
    }

    // MARK - Motion-paused side channel

    /// Whether the last issued pause/resume intent was "paused". Not derived
    /// from telemetry.
    pub fn is_motion_paused(&self) -> bool {
        self.motion_paused.load(Ordering::Relaxed)
    }

    pub(crate) fn set_motion_paused(&self, paused: bool) {
        self.motion_paused.store(paused, Ordering::Relaxed);
    }

    // MARK - Cooperative cancellation

    /// Request generic cancellation of running motion programs (e.g. on
    /// shutdown). Observed at the next blocking-wait gate.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Relaxed);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Relaxed)
    }

    /// Gate consulted before motion and between blocking-wait increments.
    ///
    /// Raises `Cancelled` for an explicit cancellation request and
    /// `CancelledByCollision` when live telemetry reports a collision, so
    /// callers can pattern-match and selectively swallow the latter.
    pub async fn ensure_motion_allowed(&self) -> Result<()> {
        if self.is_cancel_requested() {
            return Err(ArmError::Cancelled);
        }
        if self.collision_detected().await? {
            return Err(ArmError::CancelledByCollision);
        }
        debug!("Motion allowed");
        Ok(())
    }

    // MARK - Lifecycle

    /// Apply the safe-default configuration sequence after connecting.
    pub async fn setup(&self) -> Result<()> {
        info!("Applying arm setup sequence");

        settings::set_realtime_sample_rate(self, self.config.robot.sample_rate_hz).await?;
        settings::clear_errors(self).await?;
        settings::resume_motion(self).await?;
        settings::disable_drag_mode(self).await?;
        settings::stop_custom_collision_detection(self).await?;
        settings::set_collision_strategy(self, CollisionStrategy::ImpactRebound).await?;
        settings::set_collision_level(self, &JointVector::splat(settings::COLLISION_LEVEL_MAX))
            .await?;
        settings::change_tcp(
            self,
            &CartesianVector::from_array(self.config.robot.tcp_offset),
        )
        .await?;
        settings::set_automatic_mode(self).await?;
        settings::start_acceleration_smoothing(self).await?;
        settings::set_global_velocity_and_acceleration(self, 100, 100).await?;

        info!("Arm setup complete");
        Ok(())
    }

    /// Put the arm into a hand-guidable state: errors cleared, drag mode on.
    pub async fn reset(&self) -> Result<()> {
        settings::clear_errors(self).await?;
        settings::enable_drag_mode(self).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::rpc::testing::{Call, CallLog, ScriptedPort};
    use crate::rpc::CommandPort;

    /// Controller backed by a scripted command port; the hook decides each
    /// command's status code and may drive the status cache.
    pub(crate) fn scripted_controller(
        hook: impl FnMut(&Call) -> i32 + Send + 'static,
    ) -> (Arc<ArmController>, CallLog) {
        let (port, log) = ScriptedPort::with_hook(hook);
        let holder = std::sync::Mutex::new(Some(Box::new(port) as Box<dyn CommandPort>));
        let connector: Connector = Box::new(move || {
            holder
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow::anyhow!("scripted port already taken"))
        });
        (Arc::new(ArmController::new(ArmConfig::default(), connector)), log)
    }

    impl ArmController {
        pub(crate) fn shared_cache(&self) -> Arc<StatusCache> {
            self.cache.clone()
        }
    }
}
