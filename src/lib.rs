//! FRD - FR-series robot arm driver
//!
//! Drives an industrial robot arm over its network link: high-level motion
//! and configuration intents are turned into hardware commands, every
//! command is verified against live telemetry, and a real-time status
//! stream is continuously decoded to track pose, detect collisions and
//! gate further motion.
//!
//! # Architecture
//!
//! - **FrameDecoder**: reassembles framed, checksummed status packets from
//!   the chunked telemetry stream
//! - **StatusCache**: single-slot latest-status cache; one writer, torn-read
//!   free concurrent readers
//! - **CommandLink**: supervised command connection; serialized transitions
//!   and single-writer command issuance
//! - **ArmController**: the owning context object threaded through every
//!   operation; typed status accessors and the cancellation gate
//! - **settings / motion**: verified hardware settings, motion primitives,
//!   the torque-check probe and the stabilization waiter
//! - **monitor**: the long-lived telemetry ingestion task
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use frd::{ArmConfig, ArmController, monitor, motion, state::CartesianVector};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArmConfig::load("config/default_config.yaml")?;
//!     let arm = Arc::new(ArmController::with_tcp_connector(config));
//!
//!     tokio::spawn(monitor::run_status_stream(arm.clone()));
//!     arm.setup().await?;
//!
//!     let home = CartesianVector { x: 200.0, y: 60.0, z: 500.0, roll: -90.0, yaw: -45.0, ..Default::default() };
//!     motion::linear(&arm, &home, Default::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod motion;
pub mod protocol;
pub mod rpc;
pub mod settings;
pub mod state;

// High-level exports for easy usage
pub use cache::StatusCache;
pub use config::{ArmConfig, ConnectionConfig, MovementConfig, RobotConfig, TimingConfig};
pub use connection::{CommandLink, Connector};
pub use controller::ArmController;
pub use error::{ArmError, DecodeError, Result};
pub use motion::MoveOptions;
pub use protocol::FrameDecoder;
pub use rpc::{CommandPort, LinearMove, TcpCommandPort};
pub use state::{
    ArmMode, ArmState, CartesianVector, CollisionStrategy, CoordinateSystem, JointVector,
    StatusFrame,
};
