//! Extended Joint Types for Mechanical Linkages
//!
//! Constraints beyond the core set in [`crate::joint`]:
//!
//! - **`PrismaticJoint`**: Translation along one axis with rotation locked,
//!   optional translation limits and a linear motor
//! - **`WeldJoint`**: Rigid weld locking both translation and rotation
//! - **`WheelJoint`**: Point-on-line suspension with a spring along the
//!   axis, free rotation and an optional rotational motor
//! - **`PulleyJoint`**: Two ropes over fixed ground anchors with
//!   `length_a + ratio * length_b` held constant
//!
//! All are sequential-impulse constraints with Nonlinear Gauss-Seidel
//! position correction, dispatched through [`crate::joint::JointKind`].

use glam::{Mat2, Mat3, Vec3};

use crate::body::{BodyHandle, BodySet};
use crate::error::PhysicsError;
use crate::joint::{Joint, JointBinding};
use crate::math::{cross, cross_sv, solve22, solve33, sym22, sym33, Rot, Vec2};
use crate::solver::{Position, StepContext, Velocity};

// ============================================================================
// PrismaticJoint
// ============================================================================

/// Slider joint: body B translates along an axis fixed in body A.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrismaticJoint {
    /// Anchor on body A, relative to its origin
    pub local_anchor_a: Vec2,
    /// Anchor on body B, relative to its origin
    pub local_anchor_b: Vec2,
    /// Unit slide axis in body A's frame
    pub local_axis_a: Vec2,
    /// `angle_b - angle_a` in the reference configuration
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    /// Target relative speed along the axis (m/s)
    pub motor_speed: f32,
    pub max_motor_force: f32,

    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat2,
    translation: f32,
    axial_mass: f32,
    bias: Vec2,
}

/// Geometry shared by the velocity setup and the position pass of the
/// axis-based joints.
struct SliderFrame {
    r_a: Vec2,
    r_b: Vec2,
    d: Vec2,
    axis: Vec2,
    perp: Vec2,
}

impl SliderFrame {
    fn new(bind: &JointBinding, local_anchor_a: Vec2, local_anchor_b: Vec2, local_axis_a: Vec2, pa: &Position, pb: &Position) -> Self {
        let (r_a, r_b) = bind.arms(local_anchor_a, local_anchor_b, pa.a, pb.a);
        let axis = Rot::new(pa.a).rotate(local_axis_a);
        Self {
            r_a,
            r_b,
            d: pb.c - pa.c + r_b - r_a,
            axis,
            perp: axis.perp(),
        }
    }
}

impl PrismaticJoint {
    #[must_use]
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, local_axis_a: Vec2) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            local_axis_a: local_axis_a.normalize_or_zero(),
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat2::ZERO,
            translation: 0.0,
            axial_mass: 0.0,
            bias: Vec2::ZERO,
        }
    }

    #[must_use]
    pub fn with_reference_angle(mut self, reference_angle: f32) -> Self {
        self.reference_angle = reference_angle;
        self
    }

    /// Limit the translation along the axis to `[lower, upper]`.
    #[must_use]
    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    #[must_use]
    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }

    /// Current translation along the axis, as of the last velocity setup.
    #[must_use]
    pub fn translation(&self) -> f32 {
        self.translation
    }

    pub(crate) fn validate_shape(&self) -> Result<(), PhysicsError> {
        if self.local_axis_a == Vec2::ZERO {
            return Err(PhysicsError::InvalidConstraint {
                reason: "prismatic axis must be non-zero",
            });
        }
        if self.enable_limit && self.lower_translation > self.upper_translation {
            return Err(PhysicsError::InvalidConstraint {
                reason: "prismatic lower translation exceeds upper translation",
            });
        }
        Ok(())
    }

    fn frame(&self, bind: &JointBinding, pa: &Position, pb: &Position) -> SliderFrame {
        SliderFrame::new(bind, self.local_anchor_a, self.local_anchor_b, self.local_axis_a, pa, pb)
    }

    pub(crate) fn init_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, positions: &[Position], velocities: &mut [Velocity], baumgarte: bool) {
        let (pa, pb) = bind.positions(positions);
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        let SliderFrame { r_a, r_b, d, axis, perp } = self.frame(bind, &pa, &pb);

        // Motor Jacobian and effective mass
        self.axis = axis;
        self.a1 = cross(d + r_a, axis);
        self.a2 = cross(r_b, axis);
        self.axial_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        // Prismatic constraint
        self.perp = perp;
        self.s1 = cross(d + r_a, perp);
        self.s2 = cross(r_b, perp);

        let k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        let k12 = i_a * self.s1 + i_b * self.s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // Both bodies have fixed rotation
            k22 = 1.0;
        }
        self.k = sym22(k11, k12, k22);

        if self.enable_limit {
            self.translation = axis.dot(d);
        } else {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        self.bias = if baumgarte {
            let c = Vec2::new(perp.dot(d), pb.a - pa.a - self.reference_angle);
            ctx.config.baumgarte * ctx.inv_dt * c
        } else {
            Vec2::ZERO
        };

        if ctx.config.warm_starting {
            self.impulse *= ctx.dt_ratio;
            self.motor_impulse *= ctx.dt_ratio;
            self.lower_impulse *= ctx.dt_ratio;
            self.upper_impulse *= ctx.dt_ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse.x * perp + axial_impulse * axis;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial_impulse * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial_impulse * self.a2;

            va.v -= m_a * p;
            va.w -= i_a * l_a;
            vb.v += m_b * p;
            vb.w += i_b * l_b;
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, velocities: &mut [Velocity], baumgarte: bool) {
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);
        let (axis, a1, a2) = (self.axis, self.a1, self.a2);

        let apply_axial = |va: &mut Velocity, vb: &mut Velocity, impulse: f32| {
            let p = impulse * axis;
            va.v -= m_a * p;
            va.w -= i_a * impulse * a1;
            vb.v += m_b * p;
            vb.w += i_b * impulse * a2;
        };
        let axial_cdot = |va: &Velocity, vb: &Velocity| axis.dot(vb.v - va.v) + a2 * vb.w - a1 * va.w;

        if self.enable_motor {
            let cdot = axial_cdot(&va, &vb);
            let impulse = self.axial_mass * (self.motor_speed - cdot);
            let old = self.motor_impulse;
            let max_impulse = ctx.dt * self.max_motor_force;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            apply_axial(&mut va, &mut vb, self.motor_impulse - old);
        }

        if self.enable_limit {
            let push = |c: f32| {
                let speculative = c.max(0.0) * ctx.inv_dt;
                if baumgarte {
                    speculative + ctx.config.baumgarte * ctx.inv_dt * c.min(0.0)
                } else {
                    speculative
                }
            };

            // Lower
            {
                let c = self.translation - self.lower_translation;
                let impulse = -self.axial_mass * (axial_cdot(&va, &vb) + push(c));
                let old = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                apply_axial(&mut va, &mut vb, self.lower_impulse - old);
            }

            // Upper, signs flipped so the impulse stays positive
            {
                let c = self.upper_translation - self.translation;
                let impulse = -self.axial_mass * (-axial_cdot(&va, &vb) + push(c));
                let old = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                apply_axial(&mut va, &mut vb, -(self.upper_impulse - old));
            }
        }

        // Perpendicular and angular lock
        {
            let cdot = Vec2::new(
                self.perp.dot(vb.v - va.v) + self.s2 * vb.w - self.s1 * va.w,
                vb.w - va.w,
            );
            let df = solve22(self.k, -(cdot + self.bias));
            self.impulse += df;

            let p = df.x * self.perp;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;
            va.v -= m_a * p;
            va.w -= i_a * l_a;
            vb.v += m_b * p;
            vb.w += i_b * l_b;
        }

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_position(&self, ctx: &StepContext, bind: &JointBinding, positions: &mut [Position]) -> bool {
        let config = &ctx.config;
        let (mut pa, mut pb) = bind.positions(positions);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        let SliderFrame { r_a, r_b, d, axis, perp } = self.frame(bind, &pa, &pb);
        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);
        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);

        let c1 = Vec2::new(perp.dot(d), pb.a - pa.a - self.reference_angle);
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * config.linear_slop {
                c2 = translation - self.lower_translation;
                linear_error = linear_error.max(c2.abs());
                active = true;
            } else if translation <= self.lower_translation {
                c2 = (translation - self.lower_translation).min(0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation).max(0.0);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let max_lin = config.max_linear_correction;
        let max_ang = config.max_angular_correction;
        let c1 = Vec2::new(c1.x.clamp(-max_lin, max_lin), c1.y.clamp(-max_ang, max_ang));

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            k22 = 1.0;
        }

        let impulse = if active {
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
            let k = sym33(k11, k12, k13, k22, k23, k33);
            let c = Vec3::new(c1.x, c1.y, c2.clamp(-max_lin, max_lin));
            -solve33(k, c)
        } else {
            let impulse = -solve22(sym22(k11, k12, k22), c1);
            Vec3::new(impulse.x, impulse.y, 0.0)
        };

        let p = impulse.x * perp + impulse.z * axis;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        pa.c -= m_a * p;
        pa.a -= i_a * l_a;
        pb.c += m_b * p;
        pb.a += i_b * l_b;
        bind.store_positions(positions, pa, pb);

        linear_error <= config.linear_slop && angular_error <= config.angular_slop
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * (self.impulse.x * self.perp + (self.motor_impulse + self.lower_impulse - self.upper_impulse) * self.axis)
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.y
    }
}

// ============================================================================
// WeldJoint
// ============================================================================

/// Rigid weld: removes all relative motion between two bodies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeldJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,

    impulse: Vec3,
    r_a: Vec2,
    r_b: Vec2,
    k: Mat3,
    bias: Vec3,
}

impl WeldJoint {
    #[must_use]
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            impulse: Vec3::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat3::ZERO,
            bias: Vec3::ZERO,
        }
    }

    fn effective_mass(bind: &JointBinding, r_a: Vec2, r_b: Vec2) -> Mat3 {
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);
        sym33(
            m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b,
            -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
            -r_a.y * i_a - r_b.y * i_b,
            m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b,
            r_a.x * i_a + r_b.x * i_b,
            i_a + i_b,
        )
    }

    fn apply(bind: &JointBinding, r_a: Vec2, r_b: Vec2, impulse: Vec3, va: &mut Velocity, vb: &mut Velocity) {
        let p = impulse.truncate();
        va.v -= bind.inv_mass_a * p;
        va.w -= bind.inv_i_a * (cross(r_a, p) + impulse.z);
        vb.v += bind.inv_mass_b * p;
        vb.w += bind.inv_i_b * (cross(r_b, p) + impulse.z);
    }

    pub(crate) fn init_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, positions: &[Position], velocities: &mut [Velocity], baumgarte: bool) {
        let (pa, pb) = bind.positions(positions);
        let (mut va, mut vb) = bind.velocities(velocities);

        (self.r_a, self.r_b) = bind.arms(self.local_anchor_a, self.local_anchor_b, pa.a, pb.a);
        self.k = Self::effective_mass(bind, self.r_a, self.r_b);

        self.bias = if baumgarte {
            let c1 = pb.c + self.r_b - pa.c - self.r_a;
            let c2 = pb.a - pa.a - self.reference_angle;
            ctx.config.baumgarte * ctx.inv_dt * c1.extend(c2)
        } else {
            Vec3::ZERO
        };

        if ctx.config.warm_starting {
            self.impulse *= ctx.dt_ratio;
            Self::apply(bind, self.r_a, self.r_b, self.impulse, &mut va, &mut vb);
        } else {
            self.impulse = Vec3::ZERO;
        }

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_velocity(&mut self, bind: &JointBinding, velocities: &mut [Velocity]) {
        let (mut va, mut vb) = bind.velocities(velocities);

        let cdot1 = vb.v + cross_sv(vb.w, self.r_b) - va.v - cross_sv(va.w, self.r_a);
        let cdot2 = vb.w - va.w;
        let impulse = -solve33(self.k, cdot1.extend(cdot2) + self.bias);
        self.impulse += impulse;
        Self::apply(bind, self.r_a, self.r_b, impulse, &mut va, &mut vb);

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_position(&self, ctx: &StepContext, bind: &JointBinding, positions: &mut [Position]) -> bool {
        let config = &ctx.config;
        let (mut pa, mut pb) = bind.positions(positions);

        let (r_a, r_b) = bind.arms(self.local_anchor_a, self.local_anchor_b, pa.a, pb.a);
        let c1 = pb.c + r_b - pa.c - r_a;
        let c2 = pb.a - pa.a - self.reference_angle;
        let position_error = c1.length();
        let angular_error = c2.abs();

        let max_ang = config.max_angular_correction;
        let c = crate::math::clamp_length(c1, config.max_linear_correction).extend(c2.clamp(-max_ang, max_ang));
        let impulse = -solve33(Self::effective_mass(bind, r_a, r_b), c);

        let p = impulse.truncate();
        pa.c -= bind.inv_mass_a * p;
        pa.a -= bind.inv_i_a * (cross(r_a, p) + impulse.z);
        pb.c += bind.inv_mass_b * p;
        pb.a += bind.inv_i_b * (cross(r_b, p) + impulse.z);
        bind.store_positions(positions, pa, pb);

        position_error <= config.linear_slop && angular_error <= config.angular_slop
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse.truncate()
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
    }
}

// ============================================================================
// WheelJoint
// ============================================================================

/// Wheel joint: the anchor on B stays on a line through A's anchor, sprung
/// along that line, while B spins freely.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Unit suspension axis in body A's frame
    pub local_axis_a: Vec2,
    /// Suspension frequency (Hz); 0 leaves the axis unsprung
    pub frequency: f32,
    pub damping_ratio: f32,
    pub enable_motor: bool,
    /// Target angular speed of B relative to A (rad/s)
    pub motor_speed: f32,
    pub max_motor_torque: f32,

    impulse: f32,
    spring_impulse: f32,
    motor_impulse: f32,
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    spring_mass: f32,
    motor_mass: f32,
    bias: f32,
    gamma: f32,
    line_bias: f32,
}

impl WheelJoint {
    #[must_use]
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, local_axis_a: Vec2) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            local_axis_a: local_axis_a.normalize_or_zero(),
            frequency: 2.0,
            damping_ratio: 0.7,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            impulse: 0.0,
            spring_impulse: 0.0,
            motor_impulse: 0.0,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            spring_mass: 0.0,
            motor_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
            line_bias: 0.0,
        }
    }

    /// Suspension spring as a frequency (Hz) and damping ratio.
    #[must_use]
    pub fn with_spring(mut self, frequency: f32, damping_ratio: f32) -> Self {
        self.frequency = frequency;
        self.damping_ratio = damping_ratio;
        self
    }

    #[must_use]
    pub fn with_motor(mut self, speed: f32, max_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }

    pub(crate) fn validate_shape(&self) -> Result<(), PhysicsError> {
        if self.local_axis_a == Vec2::ZERO {
            return Err(PhysicsError::InvalidConstraint {
                reason: "wheel axis must be non-zero",
            });
        }
        if !(self.frequency >= 0.0) || !(self.damping_ratio >= 0.0) {
            return Err(PhysicsError::InvalidConstraint {
                reason: "wheel spring frequency and damping must be >= 0",
            });
        }
        Ok(())
    }

    pub(crate) fn init_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, positions: &[Position], velocities: &mut [Velocity], baumgarte: bool) {
        let (pa, pb) = bind.positions(positions);
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        let SliderFrame { r_a, r_b, d, axis, perp } =
            SliderFrame::new(bind, self.local_anchor_a, self.local_anchor_b, self.local_axis_a, &pa, &pb);

        // Point to line
        self.ay = perp;
        self.s_ay = cross(d + r_a, perp);
        self.s_by = cross(r_b, perp);
        let inv_mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        // Suspension spring
        self.ax = axis;
        self.s_ax = cross(d + r_a, axis);
        self.s_bx = cross(r_b, axis);
        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.frequency > 0.0 {
            let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
            if inv_mass > 0.0 {
                let mass = 1.0 / inv_mass;
                let omega = core::f32::consts::TAU * self.frequency;
                let damping = 2.0 * mass * self.damping_ratio * omega;
                let stiffness = mass * omega * omega;

                let h = ctx.dt;
                let gamma = h * (damping + h * stiffness);
                self.gamma = if gamma > 0.0 { 1.0 / gamma } else { 0.0 };
                self.bias = d.dot(axis) * h * stiffness * self.gamma;

                let soft = inv_mass + self.gamma;
                self.spring_mass = if soft > 0.0 { 1.0 / soft } else { 0.0 };
            }
        } else {
            self.spring_impulse = 0.0;
        }

        // Rotational motor
        if self.enable_motor {
            let inv_motor = i_a + i_b;
            self.motor_mass = if inv_motor > 0.0 { 1.0 / inv_motor } else { 0.0 };
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        self.line_bias = if baumgarte {
            ctx.config.baumgarte * ctx.inv_dt * perp.dot(d)
        } else {
            0.0
        };

        if ctx.config.warm_starting {
            self.impulse *= ctx.dt_ratio;
            self.spring_impulse *= ctx.dt_ratio;
            self.motor_impulse *= ctx.dt_ratio;

            let p = self.impulse * self.ay + self.spring_impulse * self.ax;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx + self.motor_impulse;
            va.v -= m_a * p;
            va.w -= i_a * l_a;
            vb.v += m_b * p;
            vb.w += i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
        }

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, velocities: &mut [Velocity]) {
        let (mut va, mut vb) = bind.velocities(velocities);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        // Spring
        {
            let cdot = self.ax.dot(vb.v - va.v) + self.s_bx * vb.w - self.s_ax * va.w;
            let impulse = -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = impulse * self.ax;
            va.v -= m_a * p;
            va.w -= i_a * impulse * self.s_ax;
            vb.v += m_b * p;
            vb.w += i_b * impulse * self.s_bx;
        }

        // Motor
        {
            let cdot = vb.w - va.w - self.motor_speed;
            let impulse = -self.motor_mass * cdot;
            let old = self.motor_impulse;
            let max_impulse = ctx.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old;
            va.w -= i_a * impulse;
            vb.w += i_b * impulse;
        }

        // Point to line
        {
            let cdot = self.ay.dot(vb.v - va.v) + self.s_by * vb.w - self.s_ay * va.w;
            let impulse = -self.mass * (cdot + self.line_bias);
            self.impulse += impulse;

            let p = impulse * self.ay;
            va.v -= m_a * p;
            va.w -= i_a * impulse * self.s_ay;
            vb.v += m_b * p;
            vb.w += i_b * impulse * self.s_by;
        }

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_position(&self, ctx: &StepContext, bind: &JointBinding, positions: &mut [Position]) -> bool {
        let (mut pa, mut pb) = bind.positions(positions);
        let (m_a, m_b, i_a, i_b) = (bind.inv_mass_a, bind.inv_mass_b, bind.inv_i_a, bind.inv_i_b);

        let SliderFrame { r_a, r_b, d, perp, .. } =
            SliderFrame::new(bind, self.local_anchor_a, self.local_anchor_b, self.local_axis_a, &pa, &pb);
        let s_ay = cross(d + r_a, perp);
        let s_by = cross(r_b, perp);

        let c = perp.dot(d);
        let max = ctx.config.max_linear_correction;
        let k = m_a + m_b + i_a * s_ay * s_ay + i_b * s_by * s_by;
        let impulse = if k != 0.0 { -c.clamp(-max, max) / k } else { 0.0 };

        let p = impulse * perp;
        pa.c -= m_a * p;
        pa.a -= i_a * impulse * s_ay;
        pb.c += m_b * p;
        pb.a += i_b * impulse * s_by;
        bind.store_positions(positions, pa, pb);

        c.abs() <= ctx.config.linear_slop
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * (self.impulse * self.ay + self.spring_impulse * self.ax)
    }

    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }
}

// ============================================================================
// PulleyJoint
// ============================================================================

/// Two bodies hanging from ropes over fixed ground anchors. Pulling one side
/// in lets the other out, scaled by `ratio`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulleyJoint {
    /// World point the rope to A runs over
    pub ground_anchor_a: Vec2,
    /// World point the rope to B runs over
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Rope length on A's side in the reference configuration
    pub length_a: f32,
    /// Rope length on B's side in the reference configuration
    pub length_b: f32,
    /// `length_a + ratio * length_b` is held constant
    pub ratio: f32,

    impulse: f32,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
    bias: f32,
}

/// Rope directions and lengths for the current poses.
struct RopeFrame {
    r_a: Vec2,
    r_b: Vec2,
    u_a: Vec2,
    u_b: Vec2,
    length_a: f32,
    length_b: f32,
}

impl PulleyJoint {
    #[must_use]
    pub fn new(
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        length_a: f32,
        length_b: f32,
        ratio: f32,
    ) -> Self {
        Self {
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a,
            local_anchor_b,
            length_a,
            length_b,
            ratio,
            impulse: 0.0,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
            bias: 0.0,
        }
    }

    /// Total rope length, weighted by the ratio.
    #[inline]
    #[must_use]
    pub fn constant(&self) -> f32 {
        self.length_a + self.ratio * self.length_b
    }

    pub(crate) fn validate_shape(&self) -> Result<(), PhysicsError> {
        if !(self.ratio > f32::EPSILON) {
            return Err(PhysicsError::InvalidConstraint {
                reason: "pulley ratio must be > 0",
            });
        }
        if !(self.length_a >= 0.0) || !(self.length_b >= 0.0) {
            return Err(PhysicsError::InvalidConstraint {
                reason: "pulley rope lengths must be >= 0",
            });
        }
        Ok(())
    }

    fn frame(&self, ctx: &StepContext, bind: &JointBinding, pa: &Position, pb: &Position) -> RopeFrame {
        let (r_a, r_b) = bind.arms(self.local_anchor_a, self.local_anchor_b, pa.a, pb.a);
        let rope_a = pa.c + r_a - self.ground_anchor_a;
        let rope_b = pb.c + r_b - self.ground_anchor_b;
        let (length_a, length_b) = (rope_a.length(), rope_b.length());

        // Ropes shorter than this have no usable direction
        let min_length = 10.0 * ctx.config.linear_slop;
        let u_a = if length_a > min_length { rope_a / length_a } else { Vec2::ZERO };
        let u_b = if length_b > min_length { rope_b / length_b } else { Vec2::ZERO };
        RopeFrame { r_a, r_b, u_a, u_b, length_a, length_b }
    }

    fn effective_mass(&self, bind: &JointBinding, frame: &RopeFrame) -> f32 {
        let ru_a = cross(frame.r_a, frame.u_a);
        let ru_b = cross(frame.r_b, frame.u_b);
        let m_a = bind.inv_mass_a + bind.inv_i_a * ru_a * ru_a;
        let m_b = bind.inv_mass_b + bind.inv_i_b * ru_b * ru_b;
        let inv_mass = m_a + self.ratio * self.ratio * m_b;
        if inv_mass > 0.0 {
            1.0 / inv_mass
        } else {
            0.0
        }
    }

    fn apply(bind: &JointBinding, r_a: Vec2, r_b: Vec2, p_a: Vec2, p_b: Vec2, va: &mut Velocity, vb: &mut Velocity) {
        va.v += bind.inv_mass_a * p_a;
        va.w += bind.inv_i_a * cross(r_a, p_a);
        vb.v += bind.inv_mass_b * p_b;
        vb.w += bind.inv_i_b * cross(r_b, p_b);
    }

    pub(crate) fn init_velocity(&mut self, ctx: &StepContext, bind: &JointBinding, positions: &[Position], velocities: &mut [Velocity], baumgarte: bool) {
        let (pa, pb) = bind.positions(positions);
        let (mut va, mut vb) = bind.velocities(velocities);

        let frame = self.frame(ctx, bind, &pa, &pb);
        self.mass = self.effective_mass(bind, &frame);
        let RopeFrame { r_a, r_b, u_a, u_b, length_a, length_b } = frame;
        (self.r_a, self.r_b, self.u_a, self.u_b) = (r_a, r_b, u_a, u_b);

        self.bias = if baumgarte {
            ctx.config.baumgarte * ctx.inv_dt * (self.constant() - length_a - self.ratio * length_b)
        } else {
            0.0
        };

        if ctx.config.warm_starting {
            self.impulse *= ctx.dt_ratio;
            let p_a = -self.impulse * u_a;
            let p_b = -self.ratio * self.impulse * u_b;
            Self::apply(bind, r_a, r_b, p_a, p_b, &mut va, &mut vb);
        } else {
            self.impulse = 0.0;
        }

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_velocity(&mut self, bind: &JointBinding, velocities: &mut [Velocity]) {
        let (mut va, mut vb) = bind.velocities(velocities);

        let vp_a = va.v + cross_sv(va.w, self.r_a);
        let vp_b = vb.v + cross_sv(vb.w, self.r_b);
        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * (cdot + self.bias);
        self.impulse += impulse;

        let p_a = -impulse * self.u_a;
        let p_b = -self.ratio * impulse * self.u_b;
        Self::apply(bind, self.r_a, self.r_b, p_a, p_b, &mut va, &mut vb);

        bind.store_velocities(velocities, va, vb);
    }

    pub(crate) fn solve_position(&self, ctx: &StepContext, bind: &JointBinding, positions: &mut [Position]) -> bool {
        let (mut pa, mut pb) = bind.positions(positions);

        let frame = self.frame(ctx, bind, &pa, &pb);
        let mass = self.effective_mass(bind, &frame);

        let c = self.constant() - frame.length_a - self.ratio * frame.length_b;
        let max = ctx.config.max_linear_correction;
        let impulse = -mass * c.clamp(-max, max);

        let p_a = -impulse * frame.u_a;
        let p_b = -self.ratio * impulse * frame.u_b;
        pa.c += bind.inv_mass_a * p_a;
        pa.a += bind.inv_i_a * cross(frame.r_a, p_a);
        pb.c += bind.inv_mass_b * p_b;
        pb.a += bind.inv_i_b * cross(frame.r_b, p_b);
        bind.store_positions(positions, pa, pb);

        c.abs() < ctx.config.linear_slop
    }

    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse * self.u_b
    }
}

// ============================================================================
// World-anchor constructors
// ============================================================================

impl Joint {
    /// Weld two bodies at a world-space anchor in their current poses.
    pub fn weld_at(bodies: &BodySet, body_a: BodyHandle, body_b: BodyHandle, world_anchor: Vec2) -> Result<Self, PhysicsError> {
        let (a, b) = (bodies.body(body_a)?, bodies.body(body_b)?);
        let kind = WeldJoint::new(
            a.transform().apply_inv(world_anchor),
            b.transform().apply_inv(world_anchor),
            b.angle - a.angle,
        );
        Ok(Self::new(body_a, body_b, kind))
    }

    /// Slider through a world-space anchor along a world-space axis.
    pub fn prismatic_at(
        bodies: &BodySet,
        body_a: BodyHandle,
        body_b: BodyHandle,
        world_anchor: Vec2,
        world_axis: Vec2,
    ) -> Result<Self, PhysicsError> {
        let (a, b) = (bodies.body(body_a)?, bodies.body(body_b)?);
        let local_axis = Rot::new(a.angle).inv_rotate(world_axis);
        let kind = PrismaticJoint::new(
            a.transform().apply_inv(world_anchor),
            b.transform().apply_inv(world_anchor),
            local_axis,
        )
        .with_reference_angle(b.angle - a.angle);
        Ok(Self::new(body_a, body_b, kind))
    }

    /// Wheel on body B through a world-space anchor, suspended along a
    /// world-space axis fixed in body A.
    pub fn wheel_at(
        bodies: &BodySet,
        body_a: BodyHandle,
        body_b: BodyHandle,
        world_anchor: Vec2,
        world_axis: Vec2,
    ) -> Result<Self, PhysicsError> {
        let (a, b) = (bodies.body(body_a)?, bodies.body(body_b)?);
        let kind = WheelJoint::new(
            a.transform().apply_inv(world_anchor),
            b.transform().apply_inv(world_anchor),
            Rot::new(a.angle).inv_rotate(world_axis),
        );
        Ok(Self::new(body_a, body_b, kind))
    }

    /// Pulley over two ground anchors, with rope lengths taken from the
    /// current world-space body anchors.
    #[allow(clippy::too_many_arguments)]
    pub fn pulley_between(
        bodies: &BodySet,
        body_a: BodyHandle,
        body_b: BodyHandle,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> Result<Self, PhysicsError> {
        let (a, b) = (bodies.body(body_a)?, bodies.body(body_b)?);
        let kind = PulleyJoint::new(
            ground_anchor_a,
            ground_anchor_b,
            a.transform().apply_inv(anchor_a),
            b.transform().apply_inv(anchor_b),
            anchor_a.distance(ground_anchor_a),
            anchor_b.distance(ground_anchor_b),
            ratio,
        );
        Ok(Self::new(body_a, body_b, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::solver::SolverConfig;
    use approx::assert_abs_diff_eq;

    const DT: f32 = 1.0 / 60.0;

    fn ctx() -> StepContext {
        StepContext::new(DT, 1.0 / DT, false, SolverConfig::default())
    }

    fn binding() -> JointBinding {
        JointBinding {
            index_a: 0,
            index_b: 1,
            inv_mass_b: 1.0,
            inv_i_b: 6.0,
            ..JointBinding::default()
        }
    }

    fn state(c: Vec2, v: Vec2, w: f32) -> (Vec<Position>, Vec<Velocity>) {
        (
            vec![Position::default(), Position { c, a: 0.0 }],
            vec![Velocity::default(), Velocity { v, w }],
        )
    }

    #[test]
    fn test_prismatic_allows_axis_motion_only() {
        let ctx = ctx();
        let bind = binding();
        let mut joint = PrismaticJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X);
        let (positions, mut velocities) = state(Vec2::new(1.0, 0.0), Vec2::new(2.0, -3.0), 1.0);
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&ctx, &bind, &mut velocities, false);
        }
        assert_abs_diff_eq!(velocities[1].v.y, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(velocities[1].w, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(velocities[1].v.x, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_prismatic_upper_limit_stops_slide() {
        let ctx = ctx();
        let bind = binding();
        let mut joint = PrismaticJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X).with_limits(-1.0, 1.0);
        let (positions, mut velocities) = state(Vec2::new(1.0, 0.0), Vec2::new(5.0, 0.0), 0.0);
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&ctx, &bind, &mut velocities, false);
        }
        assert!(velocities[1].v.x <= 1e-4);
        assert!(joint.reaction_force(1.0 / DT).x < 0.0);
    }

    #[test]
    fn test_prismatic_motor_drives_speed() {
        let ctx = ctx();
        let bind = binding();
        let mut joint = PrismaticJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X).with_motor(1.5, 1000.0);
        let (positions, mut velocities) = state(Vec2::ZERO, Vec2::ZERO, 0.0);
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&ctx, &bind, &mut velocities, false);
        }
        assert_abs_diff_eq!(velocities[1].v.x, 1.5, epsilon = 1e-3);
    }

    #[test]
    fn test_prismatic_position_removes_drift() {
        let ctx = ctx();
        let bind = binding();
        let joint = PrismaticJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X);
        let (mut positions, _) = state(Vec2::new(0.5, 0.03), Vec2::ZERO, 0.0);
        let solved = (0..10).any(|_| joint.solve_position(&ctx, &bind, &mut positions));
        assert!(solved);
        assert_abs_diff_eq!(positions[1].c.y, 0.0, epsilon = ctx.config.linear_slop);
        assert_abs_diff_eq!(positions[1].c.x, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_weld_stops_relative_motion() {
        let ctx = ctx();
        let bind = binding();
        let mut joint = WeldJoint::new(Vec2::ZERO, Vec2::new(-1.0, 0.0), 0.0);
        let (positions, mut velocities) = state(Vec2::new(1.0, 0.0), Vec2::new(0.5, -2.0), 3.0);
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&bind, &mut velocities);
        }
        assert_abs_diff_eq!(velocities[1].v.length(), 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(velocities[1].w, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_weld_position_corrects_angle() {
        let ctx = ctx();
        let bind = binding();
        let joint = WeldJoint::new(Vec2::ZERO, Vec2::ZERO, 0.0);
        let (mut positions, _) = state(Vec2::ZERO, Vec2::ZERO, 0.0);
        positions[1].a = 0.05;
        let solved = (0..10).any(|_| joint.solve_position(&ctx, &bind, &mut positions));
        assert!(solved);
        assert!(positions[1].a.abs() <= ctx.config.angular_slop);
    }

    #[test]
    fn test_prismatic_at_uses_body_frame() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(Body::new_static(Vec2::ZERO).with_angle(core::f32::consts::FRAC_PI_2));
        let b = bodies.insert(Body::new_dynamic(Vec2::new(0.0, 2.0), 1.0));
        let joint = Joint::prismatic_at(&bodies, a, b, Vec2::new(0.0, 2.0), Vec2::Y).expect("bodies exist");
        let crate::joint::JointKind::Prismatic(p) = joint.kind else {
            panic!("expected prismatic");
        };
        // World +Y is body A's local +X after a quarter turn
        assert_abs_diff_eq!(p.local_axis_a.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.reference_angle, -core::f32::consts::FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_axis_rejected() {
        let joint = PrismaticJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        assert!(joint.validate_shape().is_err());
        let wheel = WheelJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        assert!(wheel.validate_shape().is_err());
    }

    #[test]
    fn test_wheel_keeps_anchor_on_axis() {
        let ctx = ctx();
        let bind = binding();
        let mut joint = WheelJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X).with_spring(0.0, 0.0);
        let (positions, mut velocities) = state(Vec2::new(1.0, 0.0), Vec2::new(2.0, -3.0), 1.0);
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&ctx, &bind, &mut velocities);
        }
        assert_abs_diff_eq!(velocities[1].v.y, 0.0, epsilon = 1e-4);
        // Unsprung axis and free spin
        assert_abs_diff_eq!(velocities[1].v.x, 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(velocities[1].w, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_wheel_spring_pulls_toward_anchor() {
        let ctx = ctx();
        let bind = binding();
        let mut joint = WheelJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X).with_spring(2.0, 0.7);
        let (positions, mut velocities) = state(Vec2::new(0.5, 0.0), Vec2::ZERO, 0.0);
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&ctx, &bind, &mut velocities);
        }
        assert!(velocities[1].v.x < 0.0);
        assert!(joint.reaction_force(1.0 / DT).x < 0.0);
        assert_abs_diff_eq!(joint.reaction_torque(1.0 / DT), 0.0);
    }

    #[test]
    fn test_wheel_motor_drives_spin() {
        let ctx = ctx();
        let bind = binding();
        let mut joint = WheelJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X)
            .with_spring(0.0, 0.0)
            .with_motor(4.0, 1000.0);
        let (positions, mut velocities) = state(Vec2::ZERO, Vec2::ZERO, 0.0);
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&ctx, &bind, &mut velocities);
        }
        assert_abs_diff_eq!(velocities[1].w, 4.0, epsilon = 1e-3);
        assert!(joint.reaction_torque(1.0 / DT) > 0.0);
    }

    #[test]
    fn test_wheel_position_removes_drift() {
        let ctx = ctx();
        let bind = binding();
        let joint = WheelJoint::new(Vec2::ZERO, Vec2::ZERO, Vec2::X);
        let (mut positions, _) = state(Vec2::new(0.5, 0.03), Vec2::ZERO, 0.0);
        let solved = (0..10).any(|_| joint.solve_position(&ctx, &bind, &mut positions));
        assert!(solved);
        assert_abs_diff_eq!(positions[1].c.y, 0.0, epsilon = ctx.config.linear_slop);
        assert_abs_diff_eq!(positions[1].c.x, 0.5, epsilon = 1e-3);
    }

    fn pulley_binding() -> JointBinding {
        JointBinding {
            index_a: 0,
            index_b: 1,
            inv_mass_a: 1.0,
            inv_mass_b: 1.0,
            ..JointBinding::default()
        }
    }

    fn pulley() -> PulleyJoint {
        PulleyJoint::new(Vec2::new(-1.0, 2.0), Vec2::new(1.0, 2.0), Vec2::ZERO, Vec2::ZERO, 2.0, 2.0, 1.0)
    }

    #[test]
    fn test_pulley_trades_rope_between_sides() {
        let ctx = ctx();
        let bind = pulley_binding();
        let mut joint = pulley();
        let positions = vec![Position { c: Vec2::new(-1.0, 0.0), a: 0.0 }, Position { c: Vec2::new(1.0, 0.0), a: 0.0 }];
        let mut velocities = vec![Velocity { v: Vec2::new(0.0, -1.0), w: 0.0 }, Velocity::default()];
        joint.init_velocity(&ctx, &bind, &positions, &mut velocities, false);
        for _ in 0..8 {
            joint.solve_velocity(&bind, &mut velocities);
        }
        // A falls as fast as B rises
        assert_abs_diff_eq!(velocities[0].v.y, -0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(velocities[1].v.y, 0.5, epsilon = 1e-4);
        assert!(joint.reaction_force(1.0 / DT).y < 0.0);
    }

    #[test]
    fn test_pulley_position_restores_rope_length() {
        let ctx = ctx();
        let bind = pulley_binding();
        let joint = pulley();
        let mut positions = vec![Position { c: Vec2::new(-1.0, -0.1), a: 0.0 }, Position { c: Vec2::new(1.0, 0.0), a: 0.0 }];
        let solved = (0..10).any(|_| joint.solve_position(&ctx, &bind, &mut positions));
        assert!(solved);
        let length_a = positions[0].c.distance(joint.ground_anchor_a);
        let length_b = positions[1].c.distance(joint.ground_anchor_b);
        assert_abs_diff_eq!(length_a + length_b, joint.constant(), epsilon = ctx.config.linear_slop);
    }

    #[test]
    fn test_pulley_ratio_must_be_positive() {
        let mut joint = pulley();
        assert!(joint.validate_shape().is_ok());
        joint.ratio = 0.0;
        assert!(joint.validate_shape().is_err());
    }

    #[test]
    fn test_world_anchor_constructors_for_wheel_and_pulley() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(Body::new_static(Vec2::ZERO).with_angle(core::f32::consts::FRAC_PI_2));
        let b = bodies.insert(Body::new_dynamic(Vec2::new(0.0, 2.0), 1.0));

        let wheel = Joint::wheel_at(&bodies, a, b, Vec2::new(0.0, 2.0), Vec2::Y).expect("bodies exist");
        let crate::joint::JointKind::Wheel(w) = wheel.kind else {
            panic!("expected wheel");
        };
        assert_abs_diff_eq!(w.local_axis_a.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(w.local_anchor_b.length(), 0.0, epsilon = 1e-5);

        let ground = Vec2::new(0.0, 5.0);
        let rope = Joint::pulley_between(&bodies, a, b, ground, ground, Vec2::ZERO, Vec2::new(0.0, 2.0), 2.0)
            .expect("bodies exist");
        let crate::joint::JointKind::Pulley(p) = rope.kind else {
            panic!("expected pulley");
        };
        assert_abs_diff_eq!(p.length_a, 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.length_b, 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.constant(), 11.0, epsilon = 1e-5);
    }
}
