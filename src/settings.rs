//! Hardware settings
//!
//! Every configuration write goes through one of two actuation disciplines:
//!
//! - [`verify`]: for settings with an observable effect in telemetry. The
//!   command is re-issued until a convergence predicate over the live status
//!   stops holding, failing after one second.
//! - [`apply_repeated`]: for settings with no readable convergence signal.
//!   The command is fired a fixed three times, failing fast on any nonzero
//!   status code.

use crate::controller::ArmController;
use crate::error::{ArmError, Result};
use crate::rpc::CommandPort;
use crate::state::{ArmMode, ArmState, CartesianVector, CollisionStrategy, JointVector, StatusFrame};
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Attempts used when a setting cannot be verified through telemetry.
const SETTING_ATTEMPTS: u32 = 3;

/// Wire sentinel meaning "no limit" for an absent per-joint threshold.
pub const UNBOUNDED_THRESHOLD: f64 = 1e9;

/// Most permissive per-joint collision level.
pub const COLLISION_LEVEL_MAX: f64 = 100.0;

/// Re-issue a command until `pending` stops holding on fresh telemetry.
///
/// Each round issues the command (nonzero status code fails immediately),
/// sleeps one telemetry sample interval and re-reads the predicate. Runs
/// longer than the verify timeout fail with `VerificationTimeout`.
pub(crate) async fn verify(
    ctx: &ArmController,
    what: &str,
    pending: impl Fn(&StatusFrame) -> bool,
    mut action: impl FnMut(&mut dyn CommandPort) -> i32,
) -> Result<()> {
    debug!("{} started", what);
    let started = Instant::now();
    let interval = ctx.config().sample_interval();
    let timeout = ctx.config().timing.verify_timeout();

    let mut issued = 0u32;
    loop {
        let frame = ctx.status().await?;
        if !pending(&frame) {
            break;
        }
        if started.elapsed() > timeout {
            return Err(ArmError::VerificationTimeout);
        }

        let code = ctx.link().command(|port| action(port)).await?;
        if code != 0 {
            return Err(ArmError::HardwareCommand(code));
        }
        issued += 1;
        sleep(interval).await;
    }

    debug!("{} issued {} times in {:?}", what, issued, started.elapsed());
    Ok(())
}

/// Fire a command exactly [`SETTING_ATTEMPTS`] times with a sample-interval
/// gap, failing fast on any nonzero status code.
pub(crate) async fn apply_repeated(
    ctx: &ArmController,
    what: &str,
    mut action: impl FnMut(&mut dyn CommandPort) -> i32,
) -> Result<()> {
    debug!("{} started", what);
    let interval = ctx.config().sample_interval();

    for _ in 0..SETTING_ATTEMPTS {
        let code = ctx.link().command(|port| action(port)).await?;
        if code != 0 {
            return Err(ArmError::HardwareCommand(code));
        }
        sleep(interval).await;
    }

    debug!("{} finished", what);
    Ok(())
}

// MARK - Setters

pub async fn set_realtime_sample_rate(ctx: &ArmController, rate_hz: u32) -> Result<()> {
    let period_ms = 1000.0 / rate_hz.max(1) as f64;
    apply_repeated(ctx, "SetStateSamplePeriod", |p| {
        p.set_sample_period(period_ms)
    })
    .await
}

pub async fn pause_motion(ctx: &ArmController) -> Result<()> {
    verify(
        ctx,
        "PauseMotion",
        |f| !f.motion_done && f.state != ArmState::Suspend,
        |p| p.pause_motion(),
    )
    .await?;

    ctx.set_motion_paused(true);
    Ok(())
}

pub async fn resume_motion(ctx: &ArmController) -> Result<()> {
    verify(
        ctx,
        "ResumeMotion",
        |f| f.state == ArmState::Suspend,
        |p| p.resume_motion(),
    )
    .await?;

    ctx.set_motion_paused(false);
    Ok(())
}

pub async fn stop_motion(ctx: &ArmController) -> Result<()> {
    verify(ctx, "StopMotion", |f| !f.motion_done, |p| p.stop_motion()).await
}

pub async fn change_tcp(ctx: &ArmController, tcp: &CartesianVector) -> Result<()> {
    let tcp = *tcp;
    apply_repeated(ctx, "SetToolCoord", |p| p.set_tool_coord(1, &tcp)).await
}

/// Per-joint collision sensitivity. The hardware expects the level divided
/// by 10, applied under both of its internal configuration slots; joints
/// left unset fall back to the maximum level.
pub async fn set_collision_level(ctx: &ArmController, level: &JointVector) -> Result<()> {
    let scaled = (*level / 10.0).resolve(COLLISION_LEVEL_MAX / 10.0);

    for slot in [0, 1] {
        apply_repeated(ctx, "SetAnticollision", |p| {
            p.set_anticollision(1, &scaled, slot)
        })
        .await?;
    }
    Ok(())
}

pub async fn set_collision_strategy(
    ctx: &ArmController,
    strategy: CollisionStrategy,
) -> Result<()> {
    apply_repeated(ctx, "SetCollisionStrategy", |p| {
        p.set_collision_strategy(strategy.code())
    })
    .await
}

/// Arm custom collision detection with per-joint torque thresholds.
/// `None` entries are transmitted as the unbounded sentinel.
pub async fn start_custom_collision_detection(
    ctx: &ArmController,
    threshold: &JointVector,
) -> Result<()> {
    let joints = threshold.resolve(UNBOUNDED_THRESHOLD);
    let cartesian = [UNBOUNDED_THRESHOLD; 6];

    apply_repeated(ctx, "CustomCollisionDetectionStart", |p| {
        p.custom_collision_start(1, &joints, &cartesian, 0)
    })
    .await
}

pub async fn stop_custom_collision_detection(ctx: &ArmController) -> Result<()> {
    apply_repeated(ctx, "CustomCollisionDetectionEnd", |p| {
        p.custom_collision_end()
    })
    .await
}

/// Set a controller digital output and verify it through the read-back bits.
/// Converged output (read-back already equals the request) issues nothing.
pub async fn set_digital_output(ctx: &ArmController, id: u8, value: u8) -> Result<()> {
    ctx.ensure_motion_allowed().await?;

    verify(
        ctx,
        "SetDO",
        |f| f.digital_output(id) != value,
        |p| p.set_digital_output(id, value),
    )
    .await
}

pub async fn set_tool_digital_output(ctx: &ArmController, id: u8, value: u8) -> Result<()> {
    ctx.ensure_motion_allowed().await?;

    verify(
        ctx,
        "SetToolDO",
        |f| f.tool_digital_output(id) != value,
        |p| p.set_tool_digital_output(id, value),
    )
    .await
}

pub async fn start_acceleration_smoothing(ctx: &ArmController) -> Result<()> {
    apply_repeated(ctx, "AccSmoothStart", |p| p.acc_smooth_start(1)).await
}

pub async fn set_global_velocity_and_acceleration(
    ctx: &ArmController,
    velocity: i32,
    acceleration: i32,
) -> Result<()> {
    apply_repeated(ctx, "SetSpeed", |p| p.set_speed(velocity)).await?;
    apply_repeated(ctx, "SetOaccScale", |p| p.set_acc_scale(acceleration)).await
}

pub async fn clear_errors(ctx: &ArmController) -> Result<()> {
    verify(ctx, "ResetAllError", |f| f.has_error(), |p| p.reset_all_error()).await
}

pub async fn set_automatic_mode(ctx: &ArmController) -> Result<()> {
    verify(
        ctx,
        "Mode(auto)",
        |f| f.mode != ArmMode::Automatic,
        |p| p.set_mode(ArmMode::Automatic.code()),
    )
    .await
}

pub async fn set_manual_mode(ctx: &ArmController) -> Result<()> {
    verify(
        ctx,
        "Mode(manual)",
        |f| f.mode != ArmMode::Manual,
        |p| p.set_mode(ArmMode::Manual.code()),
    )
    .await
}

pub async fn enable_drag_mode(ctx: &ArmController) -> Result<()> {
    verify(
        ctx,
        "DragTeachSwitch(on)",
        |f| f.state != ArmState::Drag,
        |p| p.drag_teach_switch(true),
    )
    .await
}

pub async fn disable_drag_mode(ctx: &ArmController) -> Result<()> {
    verify(
        ctx,
        "DragTeachSwitch(off)",
        |f| f.state == ArmState::Drag,
        |p| p.drag_teach_switch(false),
    )
    .await
}

// MARK - Getters

pub async fn get_digital_output(ctx: &ArmController, id: u8) -> Result<u8> {
    Ok(ctx.status().await?.digital_output(id))
}

pub async fn get_digital_input(ctx: &ArmController, id: u8) -> Result<u8> {
    Ok(ctx.status().await?.digital_input(id))
}

pub async fn get_tool_digital_output(ctx: &ArmController, id: u8) -> Result<u8> {
    Ok(ctx.status().await?.tool_digital_output(id))
}

pub async fn get_tool_digital_input(ctx: &ArmController, id: u8) -> Result<u8> {
    Ok(ctx.status().await?.tool_digital_input(id))
}
