//! Configuration loading for the arm driver

use crate::{ArmError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArmConfig {
    pub robot: RobotConfig,
    pub movement: MovementConfig,
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotConfig {
    pub host: String,
    pub command_port: u16,
    pub status_port: u16,
    /// Real-time status sample rate requested from the controller (Hz).
    pub sample_rate_hz: u32,
    /// Tool center point offset [x, y, z, roll, pitch, yaw] applied at setup.
    pub tcp_offset: [f64; 6],
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MovementConfig {
    pub l_velocity: f64,
    pub j_velocity: f64,
    pub l_acceleration: f64,
    pub j_acceleration: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub retry_attempts: u32,
    pub retry_delay_ms: Option<u64>,
    pub reconnect_backoff_secs: Option<u64>,
    pub read_timeout_ms: Option<u64>,
}

/// Poll intervals, debounce windows and timeouts.
///
/// Everything here has a hardware-rate default; tests override these to run
/// against an accelerated clock.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimingConfig {
    pub status_poll_ms: Option<u64>,
    pub status_timeout_secs: Option<u64>,
    pub estop_timeout_secs: Option<u64>,
    pub verify_timeout_ms: Option<u64>,
    pub stabilize_check_ms: Option<u64>,
    pub stable_duration_ms: Option<u64>,
    pub stabilize_timeout_secs: Option<u64>,
    pub settle_step_ms: Option<u64>,
}

impl ArmConfig {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ArmError::Config(format!("Failed to read {}: {}", path, e)))?;

        let config: ArmConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Interval between telemetry samples at the configured rate.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.robot.sample_rate_hz.max(1) as f64)
    }
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            robot: RobotConfig {
                host: "192.168.57.2".to_string(),
                command_port: 20003,
                status_port: 20004,
                sample_rate_hz: 100,
                tcp_offset: [0.0, -88.0, 19.35, 0.0, 0.0, 0.0],
            },
            movement: MovementConfig {
                l_velocity: 100.0,
                j_velocity: 100.0,
                l_acceleration: 100.0,
                j_acceleration: 100.0,
            },
            connection: ConnectionConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: Some(100),
            reconnect_backoff_secs: Some(10),
            read_timeout_ms: Some(250),
        }
    }
}

impl ConnectionConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.unwrap_or(100))
    }

    /// Pause between telemetry reconnect cycles, so an unreachable
    /// controller is not hammered.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs.unwrap_or(10))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.unwrap_or(250))
    }
}

impl TimingConfig {
    /// Interval at which status readers poll for a frame to appear.
    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms.unwrap_or(100))
    }

    /// How long status readers wait for a frame before giving up.
    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs.unwrap_or(10))
    }

    /// Short wait used by the emergency-stop accessor.
    pub fn estop_timeout(&self) -> Duration {
        Duration::from_secs(self.estop_timeout_secs.unwrap_or(1))
    }

    /// Cap on a verify-until-converged command loop.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms.unwrap_or(1000))
    }

    pub fn stabilize_check(&self) -> Duration {
        Duration::from_millis(self.stabilize_check_ms.unwrap_or(10))
    }

    /// How long motion-done must hold continuously before the arm counts as
    /// stable.
    pub fn stable_duration(&self) -> Duration {
        Duration::from_millis(self.stable_duration_ms.unwrap_or(100))
    }

    pub fn stabilize_timeout(&self) -> Duration {
        Duration::from_secs(self.stabilize_timeout_secs.unwrap_or(120))
    }

    /// One increment of the post-torque-check settle pause.
    pub fn settle_step(&self) -> Duration {
        Duration::from_millis(self.settle_step_ms.unwrap_or(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArmConfig::default();
        assert_eq!(config.sample_interval(), Duration::from_millis(10));
        assert_eq!(config.timing.status_poll(), Duration::from_millis(100));
        assert_eq!(config.timing.verify_timeout(), Duration::from_secs(1));
        assert_eq!(config.connection.retry_attempts, 3);
        assert_eq!(config.connection.reconnect_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
robot:
  host: "10.0.0.5"
  command_port: 20003
  status_port: 20004
  sample_rate_hz: 125
  tcp_offset: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
movement:
  l_velocity: 10.0
  j_velocity: 10.0
  l_acceleration: 10.0
  j_acceleration: 10.0
connection:
  retry_attempts: 5
  retry_delay_ms: 50
timing:
  verify_timeout_ms: 250
"#;
        let config: ArmConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.robot.host, "10.0.0.5");
        assert_eq!(config.robot.sample_rate_hz, 125);
        assert_eq!(config.connection.retry_attempts, 5);
        assert_eq!(config.connection.retry_delay(), Duration::from_millis(50));
        assert_eq!(config.timing.verify_timeout(), Duration::from_millis(250));
        // Omitted timing fields fall back to hardware-rate defaults
        assert_eq!(config.timing.stable_duration(), Duration::from_millis(100));
    }
}
