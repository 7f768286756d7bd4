//! FRD - Robot Arm Daemon
//!
//! Connects to the arm, applies the safe-default setup sequence, keeps the
//! real-time status stream running and reports status until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use frd::{monitor, settings, ArmConfig, ArmController};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "frd")]
#[command(about = "Robot arm daemon - verified command layer with real-time monitoring")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Report status frames as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Seconds between status reports
    #[arg(long, default_value_t = 1)]
    report_interval: u64,
}

impl Args {
    fn get_config_path(&self) -> String {
        self.config
            .clone()
            .or_else(|| std::env::var("FRD_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/default_config.yaml".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.get_config_path();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Robot Arm Daemon");
    info!("{}", "=".repeat(50));
    info!("Using config: {}", config_path);

    let config = ArmConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    info!("Arm: {}", config.robot.host);

    let arm = Arc::new(ArmController::with_tcp_connector(config));

    // The status stream task owns telemetry reconnection for the rest of
    // the process lifetime.
    let stream_task = tokio::spawn(monitor::run_status_stream(arm.clone()));

    // Give the stream a moment to deliver the first frame
    sleep(Duration::from_secs(1)).await;

    match arm.setup().await {
        Ok(_) => info!("Arm ready"),
        Err(e) => {
            error!("Arm setup failed: {}", e);
            error!("Make sure:");
            error!("   - The arm controller is powered and reachable");
            error!("   - Network connectivity is available");
            error!("   - The configuration file is correct");
            stream_task.abort();
            return Err(e.into());
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sleep(Duration::from_secs(args.report_interval)) => {
                report_status(&arm, args.json);
            }
        }
    }

    info!("Shutting down");
    arm.request_cancel();
    if let Err(e) = settings::stop_motion(&arm).await {
        warn!("Best-effort motion stop failed: {}", e);
    }
    arm.link().disconnect().await;
    stream_task.abort();

    info!("Shutdown complete");
    Ok(())
}

fn report_status(arm: &ArmController, json: bool) {
    let Some(frame) = arm.cache().latest() else {
        warn!("No arm status available yet");
        return;
    };

    if json {
        match serde_json::to_string(&*frame) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize status frame: {}", e),
        }
    } else {
        info!(
            "state={:?} mode={:?} motion_done={} collision={} pose=[{:.2}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}]",
            frame.state,
            frame.mode,
            frame.motion_done,
            frame.collision,
            frame.cartesian.x,
            frame.cartesian.y,
            frame.cartesian.z,
            frame.cartesian.roll,
            frame.cartesian.pitch,
            frame.cartesian.yaw,
        );
    }
}
