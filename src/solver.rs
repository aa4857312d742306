//! Sequential Impulse Island Solver
//!
//! Solves one island per call: warm-started sequential impulses for the
//! velocity phase, clamped semi-implicit Euler integration, then iterative
//! position correction.
//!
//! # Key Features
//!
//! - Flat per-island scratch arrays indexed by island slot; body records are
//!   only read during the solve
//! - Joints solve on island-owned working copies, so concurrent islands never
//!   share mutable state
//! - **Stabilization**: full Nonlinear Gauss-Seidel position correction by
//!   default, Baumgarte velocity bias as a cheaper alternative (globally or
//!   per joint)
//! - Early exit from the position loop once every constraint is within slop
//!
//! # Phases
//!
//! 1. Velocity sub-step (gravity, force, damping) into scratch velocities
//! 2. Contact constraint setup and warm start, joint setup and warm start
//! 3. Velocity iterations: joints first (with break detection), then contacts
//! 4. Impulse storage for next frame's warm start
//! 5. Position integration with per-step velocity clamps
//! 6. Position iterations until converged or the iteration cap is hit
//! 7. Sleep evaluation (skipped during prediction)

use crate::body::BodySet;
use crate::contact::ContactSet;
use crate::contact_solver;
use crate::error::PhysicsError;
use crate::integrator;
use crate::island::Island;
use crate::joint::{JointBinding, JointSet};
use crate::math::Vec2;
use crate::sleeping::{self, SleepConfig};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// Configuration
// ============================================================================

/// Position error correction strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stabilization {
    /// Correct positions directly, re-deriving the error every iteration
    #[default]
    NonlinearGaussSeidel,
    /// Feed a fraction of the position error into the velocity solve
    Baumgarte,
}

/// Solver configuration, snapshotted at the start of every step
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Gravity acceleration
    pub gravity: Vec2,
    /// Seed constraint impulses from the previous frame
    pub warm_starting: bool,
    /// Velocity iterations per step
    pub velocity_iterations: usize,
    /// Maximum position iterations per step
    pub position_iterations: usize,
    /// Maximum linear speed (m/s); translation per step is clamped to `max * dt`
    pub max_linear_velocity: f32,
    /// Maximum angular speed (rad/s); rotation per step is clamped to `max * dt`
    pub max_angular_velocity: f32,
    /// Maximum linear position correction per iteration
    pub max_linear_correction: f32,
    /// Maximum angular position correction per iteration (radians)
    pub max_angular_correction: f32,
    /// Tolerated penetration / joint separation
    pub linear_slop: f32,
    /// Tolerated angular joint error (radians)
    pub angular_slop: f32,
    /// Fraction of position error resolved per iteration / step
    pub baumgarte: f32,
    /// Approach speed above which restitution applies
    pub velocity_threshold: f32,
    /// Default stabilization for contacts and joints
    pub stabilization: Stabilization,
    /// Clear accumulated forces after each non-prediction step
    pub auto_clear_forces: bool,
    /// Islands reserved in the pool before a step
    pub max_islands: usize,
    /// Sleep scheduler settings
    pub sleep: SleepConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            warm_starting: true,
            velocity_iterations: 8,
            position_iterations: 3,
            max_linear_velocity: 35.0,
            max_angular_velocity: 15.0 * core::f32::consts::TAU,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0_f32.to_radians(),
            linear_slop: 0.005,
            angular_slop: 2.0_f32.to_radians(),
            baumgarte: 0.2,
            velocity_threshold: 0.5,
            stabilization: Stabilization::NonlinearGaussSeidel,
            auto_clear_forces: true,
            max_islands: 64,
            sleep: SleepConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Reject configurations the solver cannot run with.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        let fail = |reason| Err(PhysicsError::InvalidConfiguration { reason });
        if !self.gravity.is_finite() {
            return fail("gravity must be finite");
        }
        if self.velocity_iterations == 0 {
            return fail("velocity_iterations must be > 0");
        }
        if self.position_iterations == 0 {
            return fail("position_iterations must be > 0");
        }
        if !(self.max_linear_velocity > 0.0) {
            return fail("max_linear_velocity must be > 0");
        }
        if !(self.max_angular_velocity > 0.0) {
            return fail("max_angular_velocity must be > 0");
        }
        if !(self.max_linear_correction > 0.0) {
            return fail("max_linear_correction must be > 0");
        }
        if !(self.max_angular_correction > 0.0) {
            return fail("max_angular_correction must be > 0");
        }
        if !(self.linear_slop > 0.0) || !(self.angular_slop > 0.0) {
            return fail("slop tolerances must be > 0");
        }
        if !(self.baumgarte > 0.0 && self.baumgarte <= 1.0) {
            return fail("baumgarte must be in (0, 1]");
        }
        if !(self.velocity_threshold >= 0.0) {
            return fail("velocity_threshold must be >= 0");
        }
        if self.max_islands == 0 {
            return fail("max_islands must be > 0");
        }
        self.sleep.validate()
    }
}

// ============================================================================
// Scratch state
// ============================================================================

/// Center of mass position and angle of one island slot
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// Center of mass in world space
    pub c: Vec2,
    /// Angle in radians
    pub a: f32,
}

/// Linear and angular velocity of one island slot
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Per-step constants shared by every island solve
#[derive(Clone, Copy, Debug)]
pub(crate) struct StepContext {
    pub dt: f32,
    pub inv_dt: f32,
    /// `inv_dt0 * dt`, scales warm-start impulses under a variable step
    pub dt_ratio: f32,
    pub is_prediction: bool,
    pub config: SolverConfig,
}

impl StepContext {
    pub(crate) fn new(dt: f32, inv_dt0: f32, is_prediction: bool, config: SolverConfig) -> Self {
        Self {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: inv_dt0 * dt,
            is_prediction,
            config,
        }
    }

    #[inline]
    pub(crate) fn uses_baumgarte(&self, joint_override: Option<Stabilization>) -> bool {
        joint_override.unwrap_or(self.config.stabilization) == Stabilization::Baumgarte
    }
}

// ============================================================================
// Island solve
// ============================================================================

/// Solve one island in place.
///
/// Reads bodies, contacts and joints; writes only island-owned buffers.
/// `internal_parallel` spreads the per-body loops over the rayon pool.
pub(crate) fn solve_island(
    island: &mut Island,
    bodies: &BodySet,
    contacts: &ContactSet,
    joints: &JointSet,
    ctx: &StepContext,
    internal_parallel: bool,
) {
    let body_count = island.bodies.len();
    init_scratch(island, bodies, ctx, internal_parallel);

    // Contact setup
    contact_solver::reset(
        island.index,
        &island.contacts,
        bodies,
        contacts,
        ctx,
        &mut island.velocity_constraints,
        &mut island.position_constraints,
    );
    contact_solver::initialize_velocity_constraints(
        &mut island.velocity_constraints,
        &island.position_constraints,
        &island.positions,
        &island.velocities,
        ctx,
    );
    if ctx.config.warm_starting {
        contact_solver::warm_start(&island.velocity_constraints, &mut island.velocities);
    }

    // Joint setup on working copies
    island.joint_copies.clear();
    island.joint_errors.clear();
    for &handle in &island.joints {
        let Some(original) = joints.get(handle) else {
            tracing::error!(joint = %handle, island = island.index, "joint missing from joint set");
            continue;
        };
        let mut copy = original.clone();
        match JointBinding::resolve(&copy, island.index, bodies) {
            Some(binding) => {
                copy.binding = binding;
                copy.init_velocity(ctx, &island.positions, &mut island.velocities);
            }
            None => {
                tracing::error!(joint = %handle, island = island.index, "joint bodies missing from island");
                copy.enabled = false;
            }
        }
        island.joint_copies.push((handle, copy));
        island.joint_errors.push(0.0);
    }

    // Velocity iterations
    for _ in 0..ctx.config.velocity_iterations {
        for ((_, joint), max_error) in island.joint_copies.iter_mut().zip(&mut island.joint_errors) {
            if !joint.enabled {
                continue;
            }
            joint.solve_velocity(ctx, &mut island.velocities);
            let error = joint.validate(ctx.inv_dt);
            if error > *max_error {
                *max_error = error;
            }
        }
        contact_solver::solve_velocity_constraints(&mut island.velocity_constraints, &mut island.velocities);
    }

    island.broken_joints.clear();
    for ((handle, _), error) in island.joint_copies.iter().zip(&island.joint_errors) {
        if *error > 0.0 {
            island.broken_joints.push((*handle, error.sqrt()));
        }
    }

    contact_solver::store_impulses(&island.velocity_constraints, &mut island.contact_impulses);

    integrate_scratch(island, ctx, internal_parallel);

    // Position correction
    island.position_solved = false;
    let contacts_use_ngs = !ctx.uses_baumgarte(None);
    for _ in 0..ctx.config.position_iterations {
        let contacts_ok = if contacts_use_ngs {
            contact_solver::solve_position_constraints(&island.position_constraints, &mut island.positions, ctx)
        } else {
            true
        };

        let mut joints_ok = true;
        for (_, joint) in island.joint_copies.iter().filter(|(_, j)| j.enabled) {
            let joint_ok = joint.solve_position(ctx, &mut island.positions);
            joints_ok = joints_ok && joint_ok;
        }

        if contacts_ok && joints_ok {
            island.position_solved = true;
            break;
        }
    }

    // Sleep
    island.sleep_evaluated = false;
    if !ctx.is_prediction {
        sleeping::evaluate_island(island, bodies, &ctx.config.sleep, ctx.dt);
    }

    tracing::trace!(
        island = island.index,
        bodies = body_count,
        contacts = island.contacts.len(),
        joints = island.joints.len(),
        position_solved = island.position_solved,
        "island solved"
    );
}

/// Fill scratch positions and velocities (velocity sub-step included).
fn init_scratch(island: &mut Island, bodies: &BodySet, ctx: &StepContext, internal_parallel: bool) {
    let body_count = island.bodies.len();
    island.positions.clear();
    island.positions.resize(body_count, Position::default());
    island.velocities.clear();
    island.velocities.resize(body_count, Velocity::default());

    let gravity = ctx.config.gravity;
    let dt = ctx.dt;
    let init_slot = |handle, position: &mut Position, velocity: &mut Velocity| {
        if let Some(body) = bodies.get(handle) {
            *position = Position {
                c: body.world_center(),
                a: body.angle,
            };
            *velocity = integrator::integrate_velocity(body, gravity, dt);
        }
    };

    #[cfg(feature = "parallel")]
    {
        if internal_parallel {
            island
                .bodies
                .par_iter()
                .zip(island.positions.par_iter_mut())
                .zip(island.velocities.par_iter_mut())
                .for_each(|((h, p), v)| init_slot(*h, p, v));
            return;
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = internal_parallel;

    for ((h, p), v) in island.bodies.iter().zip(&mut island.positions).zip(&mut island.velocities) {
        init_slot(*h, p, v);
    }
}

fn integrate_scratch(island: &mut Island, ctx: &StepContext, internal_parallel: bool) {
    #[cfg(feature = "parallel")]
    {
        if internal_parallel {
            island
                .positions
                .par_iter_mut()
                .zip(island.velocities.par_iter_mut())
                .for_each(|(p, v)| integrator::integrate_position(p, v, ctx));
            return;
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = internal_parallel;

    integrator::integrate_positions(&mut island.positions, &mut island.velocities, ctx);
}
