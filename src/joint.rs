//! Joint System for Rigid Body Connections
//!
//! Sequential-impulse joints solved alongside contacts in the island solver.
//! The set of joint kinds is closed: [`JointKind`] is matched once per
//! operation, so the hot iteration loop never goes through a vtable.
//!
//! # Joint Types
//!
//! - **Distance**: rigid rod, rope-like range or soft spring
//! - **Revolute**: shared anchor point, optional angle limits and motor
//! - **Prismatic**: translation along an axis, optional limits and motor
//! - **Weld**: no relative motion
//! - **Wheel**: point-on-line suspension with a spring and a rotational motor
//! - **Pulley**: two ropes over ground anchors with a fixed total length
//!
//! # Breaking
//!
//! Every joint carries a break force and break torque (infinite by default).
//! When the reaction force exceeds the threshold during the velocity solve,
//! the island records a break with the violation magnitude. The joint keeps
//! solving for the rest of the step; detaching it is up to the caller.

use core::fmt;

use glam::Mat2;

use crate::arena::Arena;
use crate::body::{BodyHandle, BodySet};
use crate::error::PhysicsError;
use crate::joint_extra::{PrismaticJoint, PulleyJoint, WeldJoint, WheelJoint};
use crate::math::{clamp_length, cross, cross_sv, solve22, sym22, Rot, Vec2};
use crate::solver::{Position, Stabilization, StepContext, Velocity};

/// Identity of a joint inside a [`JointSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointHandle(pub u32);

impl fmt::Display for JointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "joint#{}", self.0)
    }
}

// ============================================================================
// Island binding
// ============================================================================

/// Island slots and mass data of the two bodies, captured at solve time
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct JointBinding {
    pub index_a: usize,
    pub index_b: usize,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
}

impl JointBinding {
    pub(crate) fn resolve(joint: &Joint, island: u32, bodies: &BodySet) -> Option<Self> {
        let body_a = bodies.get(joint.body_a)?;
        let body_b = bodies.get(joint.body_b)?;
        Some(Self {
            index_a: body_a.island_slot(island)? as usize,
            index_b: body_b.island_slot(island)? as usize,
            local_center_a: body_a.local_center,
            local_center_b: body_b.local_center,
            inv_mass_a: body_a.solver_inv_mass(),
            inv_mass_b: body_b.solver_inv_mass(),
            inv_i_a: body_a.solver_inv_inertia(),
            inv_i_b: body_b.solver_inv_inertia(),
        })
    }

    #[inline]
    pub(crate) fn velocities(&self, velocities: &[Velocity]) -> (Velocity, Velocity) {
        (velocities[self.index_a], velocities[self.index_b])
    }

    #[inline]
    pub(crate) fn store_velocities(&self, velocities: &mut [Velocity], a: Velocity, b: Velocity) {
        velocities[self.index_a] = a;
        velocities[self.index_b] = b;
    }

    #[inline]
    pub(crate) fn positions(&self, positions: &[Position]) -> (Position, Position) {
        (positions[self.index_a], positions[self.index_b])
    }

    #[inline]
    pub(crate) fn store_positions(&self, positions: &mut [Position], a: Position, b: Position) {
        positions[self.index_a] = a;
        positions[self.index_b] = b;
    }

    /// Lever arms from the centers of mass to the anchors.
    #[inline]
    pub(crate) fn arms(&self, anchor_a: Vec2, anchor_b: Vec2, angle_a: f32, angle_b: f32) -> (Vec2, Vec2) {
        (
            Rot::new(angle_a).rotate(anchor_a - self.local_center_a),
            Rot::new(angle_b).rotate(anchor_b - self.local_center_b),
        )
    }
}

// ============================================================================
// Distance joint
// ============================================================================

/// Keeps two anchors at a distance, or within a range, optionally springy
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceJoint {
    /// Anchor on body A, relative to its origin
    pub local_anchor_a: Vec2,
    /// Anchor on body B, relative to its origin
    pub local_anchor_b: Vec2,
    /// Spring rest length
    pub length: f32,
    /// Minimum allowed length
    pub min_length: f32,
    /// Maximum allowed length
    pub max_length: f32,
    /// Spring stiffness (N/m); 0 disables the spring
    pub stiffness: f32,
    /// Spring damping (N*s/m)
    pub damping: f32,

    impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    current_length: f32,
    mass: f32,
    soft_mass: f32,
    gamma: f32,
    bias: f32,
    baumgarte_bias: f32,
}

impl DistanceJoint {
    /// Rigid rod of the given length.
    #[must_use]
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, length: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            length,
            min_length: length,
            max_length: length,
            stiffness: 0.0,
            damping: 0.0,
            impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            current_length: 0.0,
            mass: 0.0,
            soft_mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
            baumgarte_bias: 0.0,
        }
    }

    /// Allow the length to vary within `[min, max]`.
    #[must_use]
    pub fn with_range(mut self, min_length: f32, max_length: f32) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    /// Turn the rod into a spring around `length`.
    #[must_use]
    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        if self.min_length >= self.max_length {
            self.min_length = 0.0;
            self.max_length = f32::MAX;
        }
        self
    }

    #[inline]
    fn is_rigid(&self) -> bool {
        self.min_length >= self.max_length
    }

    fn validate_shape(&self) -> Result<(), PhysicsError> {
        if !(self.length >= 0.0) || !(self.min_length >= 0.0) || self.min_length > self.max_length {
            return Err(PhysicsError::InvalidConstraint {
                reason: "distance joint lengths must satisfy 0 <= min <= max",
            });
        }
        Ok(())
    }

    fn init_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, positions: &[Position], velocities: &mut [Velocity], baumgarte: bool) {
        let (pa, pb) = bind.positions(positions);
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        (self.r_a, self.r_b) = bind.arms(self.local_anchor_a, self.local_anchor_b, pa.a, pb.a);
        self.u = pb.c + self.r_b - pa.c - self.r_a;

        // Handle singularity
        self.current_length = self.u.length();
        if self.current_length > ctx.config.linear_slop {
            self.u *= 1.0 / self.current_length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        let cr_au = cross(self.r_a, self.u);
        let cr_bu = cross(self.r_b, self.u);
        let mut inv_mass = m_a + i_a * cr_au * cr_au + m_b + i_b * cr_bu * cr_bu;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.stiffness > 0.0 && !self.is_rigid() {
            // Soft constraint: gamma = 1 / (h * (d + h * k)), extra h because lambda is an impulse
            let c = self.current_length - self.length;
            let h = ctx.dt;
            let gamma = h * (self.damping + h * self.stiffness);
            self.gamma = if gamma != 0.0 { 1.0 / gamma } else { 0.0 };
            self.bias = c * h * self.stiffness * self.gamma;

            inv_mass += self.gamma;
            self.soft_mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
            self.soft_mass = self.mass;
        }

        self.baumgarte_bias = if baumgarte && self.is_rigid() {
            ctx.config.baumgarte * ctx.inv_dt * (self.current_length - self.min_length)
        } else {
            0.0
        };

        if ctx.config.warm_starting {
            self.impulse *= ctx.dt_ratio;
            self.lower_impulse *= ctx.dt_ratio;
            self.upper_impulse *= ctx.dt_ratio;

            let p = (self.impulse + self.lower_impulse - self.upper_impulse) * self.u;
            va.v -= m_a * p;
            va.w -= i_a * cross(self.r_a, p);
            vb.v += m_b * p;
            vb.w += i_b * cross(self.r_b, p);
        } else {
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        bind.store_velocities(velocities, va, vb);
    }

    fn solve_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, velocities: &mut [Velocity]) {
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);
        let (r_a, r_b, u) = (self.r_a, self.r_b, self.u);

        let apply = |va: &mut Velocity, vb: &mut Velocity, p: Vec2| {
            va.v -= m_a * p;
            va.w -= i_a * cross(r_a, p);
            vb.v += m_b * p;
            vb.w += i_b * cross(r_b, p);
        };
        let cdot_of = |va: &Velocity, vb: &Velocity| {
            let vp_a = va.v + cross_sv(va.w, r_a);
            let vp_b = vb.v + cross_sv(vb.w, r_b);
            u.dot(vp_b - vp_a)
        };

        if !self.is_rigid() {
            if self.stiffness > 0.0 {
                let cdot = cdot_of(&va, &vb);
                let impulse = -self.soft_mass * (cdot + self.bias + self.gamma * self.impulse);
                self.impulse += impulse;
                apply(&mut va, &mut vb, impulse * u);
            }

            // Lower
            {
                let c = self.current_length - self.min_length;
                let bias = c.max(0.0) * ctx.inv_dt;
                let cdot = cdot_of(&va, &vb);
                let impulse = -self.mass * (cdot + bias);
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                apply(&mut va, &mut vb, (self.lower_impulse - old) * u);
            }

            // Upper, signs flipped to keep the impulse positive
            {
                let c = self.max_length - self.current_length;
                let bias = c.max(0.0) * ctx.inv_dt;
                let cdot = -cdot_of(&va, &vb);
                let impulse = -self.mass * (cdot + bias);
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                apply(&mut va, &mut vb, -(self.upper_impulse - old) * u);
            }
        } else {
            let cdot = cdot_of(&va, &vb);
            let impulse = -self.mass * (cdot + self.baumgarte_bias);
            self.impulse += impulse;
            apply(&mut va, &mut vb, impulse * u);
        }

        bind.store_velocities(velocities, va, vb);
    }

    fn solve_position(&self, ctx: &StepContext, bind: &JointBinding, positions: &mut [Position]) -> bool {
        let (mut pa, mut pb) = bind.positions(positions);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        let (r_a, r_b) = bind.arms(self.local_anchor_a, self.local_anchor_b, pa.a, pb.a);
        let d = pb.c + r_b - pa.c - r_a;
        let length = d.length();
        let u = d.normalize_or_zero();

        let c = if self.is_rigid() || length < self.min_length {
            length - self.min_length
        } else if self.max_length < length {
            length - self.max_length
        } else {
            return true;
        };

        let max = ctx.config.max_linear_correction;
        let impulse = -self.mass * c.clamp(-max, max);
        let p = impulse * u;

        pa.c -= m_a * p;
        pa.a -= i_a * cross(r_a, p);
        pb.c += m_b * p;
        pb.a += i_b * cross(r_b, p);
        bind.store_positions(positions, pa, pb);

        c.abs() < ctx.config.linear_slop
    }

    fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * (self.impulse + self.lower_impulse - self.upper_impulse) * self.u
    }
}

// ============================================================================
// Revolute joint
// ============================================================================

/// Pins two bodies at a shared anchor, leaving relative rotation free
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevoluteJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// `angle_b - angle_a` in the reference configuration
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub enable_motor: bool,
    /// Target relative angular speed (rad/s)
    pub motor_speed: f32,
    pub max_motor_torque: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    k: Mat2,
    axial_mass: f32,
    angle: f32,
    bias: Vec2,
}

impl RevoluteJoint {
    #[must_use]
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat2::ZERO,
            axial_mass: 0.0,
            angle: 0.0,
            bias: Vec2::ZERO,
        }
    }

    #[must_use]
    pub fn with_reference_angle(mut self, reference_angle: f32) -> Self {
        self.reference_angle = reference_angle;
        self
    }

    /// Limit the relative angle to `[lower, upper]`.
    #[must_use]
    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    /// Drive the relative angular speed towards `speed`.
    #[must_use]
    pub fn with_motor(mut self, speed: f32, max_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }

    fn validate_shape(&self) -> Result<(), PhysicsError> {
        if self.enable_limit && self.lower_angle > self.upper_angle {
            return Err(PhysicsError::InvalidConstraint {
                reason: "revolute lower angle exceeds upper angle",
            });
        }
        Ok(())
    }

    fn init_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, positions: &[Position], velocities: &mut [Velocity], baumgarte: bool) {
        let (pa, pb) = bind.positions(positions);
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        (self.r_a, self.r_b) = bind.arms(self.local_anchor_a, self.local_anchor_b, pa.a, pb.a);
        let (r_a, r_b) = (self.r_a, self.r_b);

        self.k = sym22(
            m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b,
            -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
            m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b,
        );

        self.axial_mass = i_a + i_b;
        let fixed_rotation = self.axial_mass <= 0.0;
        if !fixed_rotation {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        self.angle = pb.a - pa.a - self.reference_angle;
        if !self.enable_limit || fixed_rotation {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        self.bias = if baumgarte {
            ctx.config.baumgarte * ctx.inv_dt * (pb.c + r_b - pa.c - r_a)
        } else {
            Vec2::ZERO
        };

        if ctx.config.warm_starting {
            self.impulse *= ctx.dt_ratio;
            self.motor_impulse *= ctx.dt_ratio;
            self.lower_impulse *= ctx.dt_ratio;
            self.upper_impulse *= ctx.dt_ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;
            va.v -= m_a * p;
            va.w -= i_a * (cross(r_a, p) + axial_impulse);
            vb.v += m_b * p;
            vb.w += i_b * (cross(r_b, p) + axial_impulse);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        bind.store_velocities(velocities, va, vb);
    }

    fn solve_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, velocities: &mut [Velocity], baumgarte: bool) {
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);
        let fixed_rotation = i_a + i_b == 0.0;

        if self.enable_motor && !fixed_rotation {
            let cdot = vb.w - va.w - self.motor_speed;
            let impulse = -self.axial_mass * cdot;
            let old = self.motor_impulse;
            let max_impulse = ctx.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old;
            va.w -= i_a * impulse;
            vb.w += i_b * impulse;
        }

        if self.enable_limit && !fixed_rotation {
            let push = |c: f32| {
                let speculative = c.max(0.0) * ctx.inv_dt;
                if baumgarte {
                    speculative + ctx.config.baumgarte * ctx.inv_dt * c.min(0.0)
                } else {
                    speculative
                }
            };

            // Lower limit
            {
                let c = self.angle - self.lower_angle;
                let cdot = vb.w - va.w;
                let impulse = -self.axial_mass * (cdot + push(c));
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old;
                va.w -= i_a * impulse;
                vb.w += i_b * impulse;
            }

            // Upper limit, signs flipped so C stays positive when satisfied
            {
                let c = self.upper_angle - self.angle;
                let cdot = va.w - vb.w;
                let impulse = -self.axial_mass * (cdot + push(c));
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old;
                va.w += i_a * impulse;
                vb.w -= i_b * impulse;
            }
        }

        // Point to point
        {
            let cdot = vb.v + cross_sv(vb.w, self.r_b) - va.v - cross_sv(va.w, self.r_a);
            let impulse = solve22(self.k, -(cdot + self.bias));
            self.impulse += impulse;

            va.v -= m_a * impulse;
            va.w -= i_a * cross(self.r_a, impulse);
            vb.v += m_b * impulse;
            vb.w += i_b * cross(self.r_b, impulse);
        }

        bind.store_velocities(velocities, va, vb);
    }

    fn solve_position(&self, ctx: &StepContext, bind: &JointBinding, positions: &mut [Position]) -> bool {
        let config = &ctx.config;
        let (mut pa, mut pb) = bind.positions(positions);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        let mut angular_error = 0.0;
        let fixed_rotation = i_a + i_b == 0.0;

        if self.enable_limit && !fixed_rotation {
            let angle = pb.a - pa.a - self.reference_angle;
            let max = config.max_angular_correction;
            let c = if (self.upper_angle - self.lower_angle).abs() < 2.0 * config.angular_slop {
                (angle - self.lower_angle).clamp(-max, max)
            } else if angle <= self.lower_angle {
                (angle - self.lower_angle + config.angular_slop).clamp(-max, 0.0)
            } else if angle >= self.upper_angle {
                (angle - self.upper_angle - config.angular_slop).clamp(0.0, max)
            } else {
                0.0
            };

            let limit_impulse = -self.axial_mass * c;
            pa.a -= i_a * limit_impulse;
            pb.a += i_b * limit_impulse;
            angular_error = c.abs();
        }

        let (r_a, r_b) = bind.arms(self.local_anchor_a, self.local_anchor_b, pa.a, pb.a);
        let c = pb.c + r_b - pa.c - r_a;
        let position_error = c.length();

        let k = sym22(
            m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
            -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
            m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
        );
        let impulse = -solve22(k, clamp_length(c, config.max_linear_correction));

        pa.c -= m_a * impulse;
        pa.a -= i_a * cross(r_a, impulse);
        pb.c += m_b * impulse;
        pb.a += i_b * cross(r_b, impulse);
        bind.store_positions(positions, pa, pb);

        position_error <= config.linear_slop && angular_error <= config.angular_slop
    }

    fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * (self.motor_impulse + self.lower_impulse - self.upper_impulse)
    }
}

// ============================================================================
// Joint kind dispatch
// ============================================================================

/// Closed set of joint kinds
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointKind {
    Distance(DistanceJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
    Pulley(PulleyJoint),
}

impl From<DistanceJoint> for JointKind {
    fn from(joint: DistanceJoint) -> Self {
        Self::Distance(joint)
    }
}

impl From<RevoluteJoint> for JointKind {
    fn from(joint: RevoluteJoint) -> Self {
        Self::Revolute(joint)
    }
}

impl From<PrismaticJoint> for JointKind {
    fn from(joint: PrismaticJoint) -> Self {
        Self::Prismatic(joint)
    }
}

impl From<WeldJoint> for JointKind {
    fn from(joint: WeldJoint) -> Self {
        Self::Weld(joint)
    }
}

impl From<WheelJoint> for JointKind {
    fn from(joint: WheelJoint) -> Self {
        Self::Wheel(joint)
    }
}

impl From<PulleyJoint> for JointKind {
    fn from(joint: PulleyJoint) -> Self {
        Self::Pulley(joint)
    }
}

// ============================================================================
// Joint
// ============================================================================

/// A joint between two bodies
#[derive(Clone, Debug)]
pub struct Joint {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Disabled joints are left out of island building
    pub enabled: bool,
    /// Whether the connected bodies may still collide
    pub collide_connected: bool,
    /// Reaction force that breaks the joint (infinite = unbreakable)
    pub break_force: f32,
    /// Reaction torque that breaks the joint (infinite = unbreakable)
    pub break_torque: f32,
    /// Overrides the solver-wide stabilization for this joint
    pub stabilization: Option<Stabilization>,
    pub kind: JointKind,

    pub(crate) island: bool,
    pub(crate) binding: JointBinding,
}

impl Joint {
    #[must_use]
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, kind: impl Into<JointKind>) -> Self {
        Self {
            body_a,
            body_b,
            enabled: true,
            collide_connected: false,
            break_force: f32::INFINITY,
            break_torque: f32::INFINITY,
            stabilization: None,
            kind: kind.into(),
            island: false,
            binding: JointBinding::default(),
        }
    }

    /// Revolute joint pinned at a world-space anchor, using the current
    /// body poses as reference.
    pub fn revolute_at(bodies: &BodySet, body_a: BodyHandle, body_b: BodyHandle, world_anchor: Vec2) -> Result<Self, PhysicsError> {
        let (a, b) = (bodies.body(body_a)?, bodies.body(body_b)?);
        let kind = RevoluteJoint::new(a.transform().apply_inv(world_anchor), b.transform().apply_inv(world_anchor))
            .with_reference_angle(b.angle - a.angle);
        Ok(Self::new(body_a, body_b, kind))
    }

    /// Rigid distance joint between two world-space anchors.
    pub fn distance_between(
        bodies: &BodySet,
        body_a: BodyHandle,
        body_b: BodyHandle,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Result<Self, PhysicsError> {
        let (a, b) = (bodies.body(body_a)?, bodies.body(body_b)?);
        let kind = DistanceJoint::new(
            a.transform().apply_inv(anchor_a),
            b.transform().apply_inv(anchor_b),
            anchor_a.distance(anchor_b),
        );
        Ok(Self::new(body_a, body_b, kind))
    }

    #[must_use]
    pub fn with_break_force(mut self, break_force: f32) -> Self {
        self.break_force = break_force;
        self
    }

    #[must_use]
    pub fn with_break_torque(mut self, break_torque: f32) -> Self {
        self.break_torque = break_torque;
        self
    }

    #[must_use]
    pub fn with_stabilization(mut self, stabilization: Stabilization) -> Self {
        self.stabilization = Some(stabilization);
        self
    }

    #[must_use]
    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }

    /// Body on the other end from `body`.
    #[inline]
    #[must_use]
    pub fn other_body(&self, body: BodyHandle) -> BodyHandle {
        if self.body_a == body {
            self.body_b
        } else {
            self.body_a
        }
    }

    /// Reaction force on body B at the anchor over the last solve.
    #[must_use]
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.reaction_force(inv_dt),
            JointKind::Revolute(j) => inv_dt * j.impulse,
            JointKind::Prismatic(j) => j.reaction_force(inv_dt),
            JointKind::Weld(j) => j.reaction_force(inv_dt),
            JointKind::Wheel(j) => j.reaction_force(inv_dt),
            JointKind::Pulley(j) => j.reaction_force(inv_dt),
        }
    }

    /// Reaction torque on body B over the last solve.
    #[must_use]
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match &self.kind {
            JointKind::Distance(_) => 0.0,
            JointKind::Revolute(j) => j.reaction_torque(inv_dt),
            JointKind::Prismatic(j) => j.reaction_torque(inv_dt),
            JointKind::Weld(j) => j.reaction_torque(inv_dt),
            JointKind::Wheel(j) => j.reaction_torque(inv_dt),
            JointKind::Pulley(_) => 0.0,
        }
    }

    /// Squared magnitude of the reaction exceeding a break threshold, or 0.
    ///
    /// The force threshold is checked first; the torque threshold only when
    /// the force is within bounds.
    #[must_use]
    pub fn validate(&self, inv_dt: f32) -> f32 {
        if self.break_force.is_finite() {
            let force_sq = self.reaction_force(inv_dt).length_squared();
            if force_sq > self.break_force * self.break_force {
                return force_sq;
            }
        }
        if self.break_torque.is_finite() {
            let torque = self.reaction_torque(inv_dt);
            if torque.abs() > self.break_torque {
                return torque * torque;
            }
        }
        0.0
    }

    fn validate_shape(&self) -> Result<(), PhysicsError> {
        if self.body_a == self.body_b {
            return Err(PhysicsError::InvalidConstraint {
                reason: "joint connects a body to itself",
            });
        }
        if !(self.break_force >= 0.0) || !(self.break_torque >= 0.0) {
            return Err(PhysicsError::InvalidConstraint {
                reason: "break thresholds must be >= 0",
            });
        }
        match &self.kind {
            JointKind::Distance(j) => j.validate_shape(),
            JointKind::Revolute(j) => j.validate_shape(),
            JointKind::Prismatic(j) => j.validate_shape(),
            JointKind::Weld(_) => Ok(()),
            JointKind::Wheel(j) => j.validate_shape(),
            JointKind::Pulley(j) => j.validate_shape(),
        }
    }

    pub(crate) fn init_velocity(&mut self, ctx: &StepContext, positions: &[Position], velocities: &mut [Velocity]) {
        let baumgarte = ctx.uses_baumgarte(self.stabilization);
        let bind = self.binding;
        match &mut self.kind {
            JointKind::Distance(j) => j.init_velocity(ctx, &bind, positions, velocities, baumgarte),
            JointKind::Revolute(j) => j.init_velocity(ctx, &bind, positions, velocities, baumgarte),
            JointKind::Prismatic(j) => j.init_velocity(ctx, &bind, positions, velocities, baumgarte),
            JointKind::Weld(j) => j.init_velocity(ctx, &bind, positions, velocities, baumgarte),
            JointKind::Wheel(j) => j.init_velocity(ctx, &bind, positions, velocities, baumgarte),
            JointKind::Pulley(j) => j.init_velocity(ctx, &bind, positions, velocities, baumgarte),
        }
    }

    pub(crate) fn solve_velocity(&mut self, ctx: &StepContext, velocities: &mut [Velocity]) {
        let baumgarte = ctx.uses_baumgarte(self.stabilization);
        let bind = self.binding;
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_velocity(ctx, &bind, velocities),
            JointKind::Revolute(j) => j.solve_velocity(ctx, &bind, velocities, baumgarte),
            JointKind::Prismatic(j) => j.solve_velocity(ctx, &bind, velocities, baumgarte),
            JointKind::Weld(j) => j.solve_velocity(&bind, velocities),
            JointKind::Wheel(j) => j.solve_velocity(ctx, &bind, velocities),
            JointKind::Pulley(j) => j.solve_velocity(&bind, velocities),
        }
    }

    /// Returns `true` when the joint error is within slop. Joints under
    /// Baumgarte stabilization are corrected in the velocity phase and always
    /// report converged.
    pub(crate) fn solve_position(&self, ctx: &StepContext, positions: &mut [Position]) -> bool {
        if ctx.uses_baumgarte(self.stabilization) {
            return true;
        }
        let bind = &self.binding;
        match &self.kind {
            JointKind::Distance(j) => j.solve_position(ctx, bind, positions),
            JointKind::Revolute(j) => j.solve_position(ctx, bind, positions),
            JointKind::Prismatic(j) => j.solve_position(ctx, bind, positions),
            JointKind::Weld(j) => j.solve_position(ctx, bind, positions),
            JointKind::Wheel(j) => j.solve_position(ctx, bind, positions),
            JointKind::Pulley(j) => j.solve_position(ctx, bind, positions),
        }
    }
}

// ============================================================================
// Joint Set
// ============================================================================

/// Owner of every joint.
#[derive(Clone, Debug, Default)]
pub struct JointSet {
    joints: Arena<Joint>,
}

impl JointSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a joint and register it with both bodies.
    pub fn insert(&mut self, bodies: &mut BodySet, mut joint: Joint) -> Result<JointHandle, PhysicsError> {
        bodies.body(joint.body_a)?;
        bodies.body(joint.body_b)?;
        joint.validate_shape()?;
        joint.island = false;

        let (a, b) = (joint.body_a, joint.body_b);
        let handle = JointHandle(self.joints.insert(joint));
        for body in [a, b] {
            if let Some(body) = bodies.get_mut(body) {
                body.joints.push(handle);
            }
        }
        Ok(handle)
    }

    /// Remove a joint and unregister it from its bodies.
    pub fn remove(&mut self, bodies: &mut BodySet, handle: JointHandle) -> Option<Joint> {
        let joint = self.joints.remove(handle.0)?;
        for body in [joint.body_a, joint.body_b] {
            if let Some(body) = bodies.get_mut(body) {
                body.joints.retain(|j| *j != handle);
            }
        }
        Some(joint)
    }

    #[inline]
    pub fn get(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle.0)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle.0)
    }

    /// Look up a joint, failing on a stale handle.
    pub fn joint(&self, handle: JointHandle) -> Result<&Joint, PhysicsError> {
        self.get(handle)
            .ok_or(PhysicsError::InvalidJointHandle { index: handle.0 })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints.iter().map(|(i, j)| (JointHandle(i), j))
    }
}
