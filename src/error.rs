//! Error types for arm driver operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArmError>;

#[derive(Error, Debug)]
pub enum ArmError {
    #[error("Command connection unavailable after retries")]
    ConnectionUnavailable,

    #[error("Arm error: {0}")]
    HardwareCommand(i32),

    #[error("Timeout waiting for arm to be in the desired state")]
    VerificationTimeout,

    #[error("Arm did not stabilize within timeout")]
    StabilizationTimeout,

    #[error("Arm status not available within timeout")]
    StatusUnavailable,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task cancelled: collision detected")]
    CancelledByCollision,

    #[error("Task cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Wire-level telemetry decode failures.
///
/// A decode error drops the offending frame; it never aborts the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected status payload length: {0}")]
    PayloadLength(usize),

    #[error("invalid robot state code: {0}")]
    RobotState(u8),

    #[error("invalid robot mode code: {0}")]
    RobotMode(u8),
}
