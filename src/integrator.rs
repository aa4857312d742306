//! Semi-Implicit Euler Integrator
//!
//! Velocity sub-step (gravity, external force, damping) applied before the
//! constraint solve, and the clamped position update applied after it.
//!
//! Clamping limits the displacement of a single step, not the stored speed:
//! a body moving faster than `max_linear_velocity` has its velocity scaled so
//! that `|v| * dt == max_linear_velocity * dt`. Direction is preserved.

use crate::body::Body;
use crate::math::Vec2;
use crate::solver::{Position, StepContext, Velocity};

/// Velocity after one sub-step of gravity, force and damping.
///
/// Static and kinematic bodies pass through unchanged.
#[must_use]
pub fn integrate_velocity(body: &Body, gravity: Vec2, dt: f32) -> Velocity {
    let mut v = body.linear_velocity;
    let mut w = body.angular_velocity;

    if body.is_dynamic() {
        if body.ignore_gravity {
            v += body.force * body.inv_mass * dt;
        } else {
            v += (gravity + body.force * body.inv_mass) * dt;
        }
        w += body.inv_inertia * body.torque * dt;

        // First-order damping; the clamp keeps it from reversing motion
        v *= (1.0 - dt * body.linear_damping).clamp(0.0, 1.0);
        w *= (1.0 - dt * body.angular_damping).clamp(0.0, 1.0);
    }

    Velocity { v, w }
}

/// Clamp the step displacement, then advance position and angle.
///
/// `velocity` is scaled in place when clamped so the solved velocity matches
/// the applied displacement.
pub fn clamp_and_advance(
    position: &mut Position,
    velocity: &mut Velocity,
    dt: f32,
    max_linear_velocity: f32,
    max_angular_velocity: f32,
) {
    let translation = velocity.v * dt;
    let max_translation = max_linear_velocity * dt;
    let translation_sq = translation.length_squared();
    if translation_sq > max_translation * max_translation {
        velocity.v *= max_translation / translation_sq.sqrt();
    }

    let rotation = velocity.w * dt;
    let max_rotation = max_angular_velocity * dt;
    if rotation * rotation > max_rotation * max_rotation {
        velocity.w *= max_rotation / rotation.abs();
    }

    position.c += velocity.v * dt;
    position.a += velocity.w * dt;
}

#[inline]
pub(crate) fn integrate_position(position: &mut Position, velocity: &mut Velocity, ctx: &StepContext) {
    clamp_and_advance(
        position,
        velocity,
        ctx.dt,
        ctx.config.max_linear_velocity,
        ctx.config.max_angular_velocity,
    );
}

pub(crate) fn integrate_positions(positions: &mut [Position], velocities: &mut [Velocity], ctx: &StepContext) {
    for (p, v) in positions.iter_mut().zip(velocities.iter_mut()) {
        integrate_position(p, v, ctx);
    }
}
