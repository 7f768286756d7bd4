//! Motion primitives
//!
//! Straight-line moves, the guarded torque-check probe and the
//! stabilization waiter. Every entry point consults the cancellation gate
//! before commanding motion.

use crate::controller::ArmController;
use crate::error::{ArmError, Result};
use crate::rpc::LinearMove;
use crate::settings;
use crate::state::{CartesianVector, CollisionStrategy, CoordinateSystem, JointVector};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Probe moves run slow and stiff: minimal velocity, full acceleration.
const TORQUE_CHECK_VELOCITY: f64 = 1.0;
const TORQUE_CHECK_ACCELERATION: f64 = 100.0;

/// Settle pause after a positive torque check: increments of the configured
/// settle step, with the cancellation gate checked in between.
const SETTLE_STEPS: u32 = 10;

/// Optional per-move overrides.
///
/// `radius: None` requests a blocking move: a zero blend radius on the wire
/// plus a stabilize-wait before returning. An explicit radius (zero
/// included) skips the wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOptions {
    pub velocity: Option<f64>,
    pub acceleration: Option<f64>,
    pub radius: Option<f64>,
}

fn clamp_velocity(requested: Option<f64>, cap: f64) -> f64 {
    match requested {
        Some(v) if v < cap => v,
        _ => cap,
    }
}

/// Move the tool center point to an absolute cartesian pose.
pub async fn linear(
    ctx: &ArmController,
    target: &CartesianVector,
    opts: MoveOptions,
) -> Result<()> {
    ctx.ensure_motion_allowed().await?;

    let movement = &ctx.config().movement;
    let mv = LinearMove {
        pose: *target,
        velocity: clamp_velocity(opts.velocity, movement.l_velocity),
        acceleration: opts.acceleration.unwrap_or(movement.l_acceleration),
        blend_radius: opts.radius.unwrap_or(0.0),
        offset: None,
    };

    debug!(
        "Moving linear to {:?} with velocity {}, acceleration {}, radius {:?}",
        target.to_array(),
        mv.velocity,
        mv.acceleration,
        opts.radius
    );
    let code = ctx.link().command(|p| p.move_l(&mv)).await?;
    if code != 0 {
        return Err(ArmError::HardwareCommand(code));
    }

    if opts.radius.is_none() {
        wait_to_stabilize(ctx, Duration::ZERO, ctx.config().timing.stabilize_timeout()).await?;
        debug!("Finished moving linear");
    }

    Ok(())
}

/// Move by a cartesian offset relative to `start` (or the current pose) in
/// the given reference frame.
pub async fn linear_offset(
    ctx: &ArmController,
    offset: &CartesianVector,
    opts: MoveOptions,
    system: CoordinateSystem,
    start: Option<&CartesianVector>,
) -> Result<()> {
    ctx.ensure_motion_allowed().await?;

    let current = match start {
        Some(pose) => *pose,
        None => ctx.cartesian_state().await?,
    };

    let movement = &ctx.config().movement;
    let mv = LinearMove {
        pose: current,
        velocity: clamp_velocity(opts.velocity, movement.l_velocity),
        acceleration: opts.acceleration.unwrap_or(movement.l_acceleration),
        blend_radius: opts.radius.unwrap_or(0.0),
        offset: Some((system, *offset)),
    };

    debug!(
        "Moving linear offset from {:?} by {:?} with velocity {}, acceleration {}, radius {:?}",
        current.to_array(),
        offset.to_array(),
        mv.velocity,
        mv.acceleration,
        opts.radius
    );
    let code = ctx.link().command(|p| p.move_l(&mv)).await?;
    if code != 0 {
        return Err(ArmError::HardwareCommand(code));
    }

    if opts.radius.is_none() {
        wait_to_stabilize(ctx, Duration::ZERO, ctx.config().timing.stabilize_timeout()).await?;
        debug!("Finished moving linear offset");
    }

    Ok(())
}

/// Probe along `direction` for light contact.
///
/// Arms custom collision detection with the per-joint `threshold`, issues a
/// single guarded offset move of magnitude `max_drop`, and polls until the
/// collision flag trips or the tool has displaced `max_drop` from the start
/// pose. Reaching `max_drop` exactly without a collision counts as "nothing
/// found". Safe defaults (ImpactRebound, level 100) are restored on the
/// success path.
///
/// Returns `(collided, displacement at the end of the probe)`.
pub async fn torque_check(
    ctx: &ArmController,
    max_drop: f64,
    direction: &CartesianVector,
    threshold: &JointVector,
    pause_after: bool,
) -> Result<(bool, f64)> {
    settings::set_collision_strategy(ctx, CollisionStrategy::ErrorStop).await?;
    settings::start_custom_collision_detection(ctx, threshold).await?;
    let start_pose = ctx.cartesian_state().await?;

    // Explicit zero radius: the probe must not block on stabilization, the
    // polling loop below is what watches it.
    linear_offset(
        ctx,
        &(*direction * max_drop),
        MoveOptions {
            velocity: Some(TORQUE_CHECK_VELOCITY),
            acceleration: Some(TORQUE_CHECK_ACCELERATION),
            radius: Some(0.0),
        },
        CoordinateSystem::Tool,
        None,
    )
    .await?;

    debug!(
        "Starting torque check with max drop {} in direction {:?} and threshold {:?}",
        max_drop,
        direction.to_array(),
        threshold.to_array()
    );
    let interval = ctx.config().sample_interval();
    let drop;
    loop {
        match ctx.ensure_motion_allowed().await {
            // A collision is the very condition this loop is waiting for
            Err(ArmError::CancelledByCollision) => {}
            other => other?,
        }

        let frame = ctx.status().await?;
        let displacement = start_pose.linear_distance(&frame.cartesian);
        if frame.collision {
            drop = displacement;
            break;
        }
        if displacement >= max_drop {
            warn!("Torque check exceeded max drop");
            settings::stop_motion(ctx).await?;
            return Ok((false, displacement));
        }

        sleep(interval).await;
    }
    debug!("Finished torque check with drop {}", drop);

    settings::clear_errors(ctx).await?;
    settings::stop_custom_collision_detection(ctx).await?;
    settings::set_collision_strategy(ctx, CollisionStrategy::ImpactRebound).await?;
    settings::set_collision_level(ctx, &JointVector::splat(settings::COLLISION_LEVEL_MAX)).await?;

    // Settle pause against phantom vibrations after the impact
    if pause_after {
        for _ in 0..SETTLE_STEPS {
            ctx.ensure_motion_allowed().await?;
            sleep(ctx.config().timing.settle_step()).await;
        }
    }

    Ok((true, drop))
}

/// Wait for motion to be continuously reported done.
///
/// The motion-done flag must hold for the configured stable duration before
/// the arm counts as stabilized; any false reading resets the debounce. On
/// success an additional `extra_time` is slept before returning.
pub async fn wait_to_stabilize(
    ctx: &ArmController,
    extra_time: Duration,
    timeout: Duration,
) -> Result<()> {
    if timeout.is_zero() {
        return Err(ArmError::InvalidArgument(
            "stabilization timeout must be greater than 0".to_string(),
        ));
    }

    let check_interval = ctx.config().timing.stabilize_check();
    let stable_duration = ctx.config().timing.stable_duration();

    debug!("Waiting for arm to stabilize with timeout {:?}", timeout);
    let deadline = Instant::now() + timeout;
    let mut stable_since: Option<Instant> = None;

    while Instant::now() < deadline {
        if ctx.motion_done().await? {
            let now = Instant::now();
            match stable_since {
                None => stable_since = Some(now),
                Some(since) if now.duration_since(since) >= stable_duration => {
                    sleep(extra_time).await;
                    debug!(
                        "Arm stabilized in {:?} + extra time {:?}",
                        now.duration_since(since),
                        extra_time
                    );
                    return Ok(());
                }
                Some(_) => {}
            }
        } else {
            stable_since = None;
        }

        sleep(check_interval).await;
    }

    Err(ArmError::StabilizationTimeout)
}
