//! Contact Constraint Solver
//!
//! Contact half of the island solve. Velocity constraints are built from the
//! manifold in body-local form, re-evaluated against the island's scratch
//! positions, and solved with sequential impulses: friction first, then
//! non-penetration (a 2x2 block solve for two-point manifolds). The position
//! phase pushes bodies apart directly, recomputing separation every pass.
//!
//! Body records are never written here; everything mutable lives in the
//! island's scratch arrays and constraint buffers.

use glam::Mat2;

use crate::body::BodySet;
use crate::contact::{ContactHandle, ContactSet, Manifold, ManifoldType, MAX_MANIFOLD_POINTS};
use crate::math::{cross, cross_sv, cross_vs, sym22, Transform2, Vec2};
use crate::solver::{Position, StepContext, Stabilization, Velocity};

/// Two-point manifolds whose effective-mass matrix is worse conditioned than
/// this are solved as a single point.
const MAX_CONDITION_NUMBER: f32 = 1000.0;

// ============================================================================
// Constraint data
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct VelocityConstraintPoint {
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ContactVelocityConstraint {
    pub points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    pub normal: Vec2,
    pub normal_mass: Mat2,
    pub k: Mat2,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub friction: f32,
    pub restitution: f32,
    pub tangent_speed: f32,
    pub point_count: usize,
    /// Position of the contact in the island's contact list
    pub contact_index: usize,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ContactPositionConstraint {
    pub manifold: Manifold,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub radius_a: f32,
    pub radius_b: f32,
}

/// Impulses to persist into a contact's manifold on write-back
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ContactImpulses {
    pub contact_index: usize,
    pub point_count: usize,
    pub normal: [f32; MAX_MANIFOLD_POINTS],
    pub tangent: [f32; MAX_MANIFOLD_POINTS],
}

// ============================================================================
// World manifold
// ============================================================================

/// Manifold evaluated against current transforms
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct WorldManifold {
    /// Points from A to B
    pub normal: Vec2,
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub(crate) fn new(manifold: &Manifold, xf_a: &Transform2, radius_a: f32, xf_b: &Transform2, radius_b: f32) -> Self {
        let mut out = Self::default();
        if manifold.point_count == 0 {
            return out;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                out.normal = Vec2::X;
                if point_a.distance_squared(point_b) > f32::EPSILON * f32::EPSILON {
                    out.normal = (point_b - point_a).normalize_or_zero();
                }
                let c_a = point_a + radius_a * out.normal;
                let c_b = point_b - radius_b * out.normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(out.normal);
            }
            ManifoldType::FaceA => {
                out.normal = xf_a.q.rotate(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);
                for (i, mp) in manifold.active_points().iter().enumerate() {
                    let clip_point = xf_b.apply(mp.local_point);
                    let c_a = clip_point + (radius_a - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_b = clip_point - radius_b * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(out.normal);
                }
            }
            ManifoldType::FaceB => {
                out.normal = xf_b.q.rotate(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);
                for (i, mp) in manifold.active_points().iter().enumerate() {
                    let clip_point = xf_a.apply(mp.local_point);
                    let c_b = clip_point + (radius_b - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_a = clip_point - radius_a * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(out.normal);
                }
                out.normal = -out.normal;
            }
        }
        out
    }
}

/// Normal, point and separation of one manifold point for the position phase
fn position_manifold(pc: &ContactPositionConstraint, index: usize, xf_a: &Transform2, xf_b: &Transform2) -> (Vec2, Vec2, f32) {
    let m = &pc.manifold;
    match m.manifold_type {
        ManifoldType::Circles => {
            let point_a = xf_a.apply(m.local_point);
            let point_b = xf_b.apply(m.points[0].local_point);
            let normal = (point_b - point_a).normalize_or_zero();
            let point = 0.5 * (point_a + point_b);
            let separation = (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b;
            (normal, point, separation)
        }
        ManifoldType::FaceA => {
            let normal = xf_a.q.rotate(m.local_normal);
            let plane_point = xf_a.apply(m.local_point);
            let clip_point = xf_b.apply(m.points[index].local_point);
            let separation = (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
            (normal, clip_point, separation)
        }
        ManifoldType::FaceB => {
            let normal = xf_b.q.rotate(m.local_normal);
            let plane_point = xf_b.apply(m.local_point);
            let clip_point = xf_a.apply(m.points[index].local_point);
            let separation = (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b;
            (-normal, clip_point, separation)
        }
    }
}

#[inline]
fn transform_of(position: &Position, local_center: Vec2) -> Transform2 {
    Transform2::from_center(position.c, position.a, local_center)
}

// ============================================================================
// Setup
// ============================================================================

/// Build constraints for the island's contacts, seeding warm-start impulses.
pub(crate) fn reset(
    island_index: u32,
    handles: &[ContactHandle],
    bodies: &BodySet,
    contacts: &ContactSet,
    ctx: &StepContext,
    velocity_constraints: &mut Vec<ContactVelocityConstraint>,
    position_constraints: &mut Vec<ContactPositionConstraint>,
) {
    velocity_constraints.clear();
    position_constraints.clear();

    for (contact_index, &handle) in handles.iter().enumerate() {
        let Some(contact) = contacts.get(handle) else {
            continue;
        };
        let (Some(body_a), Some(body_b)) = (bodies.get(contact.body_a()), bodies.get(contact.body_b())) else {
            continue;
        };
        let (Some(index_a), Some(index_b)) = (body_a.island_slot(island_index), body_b.island_slot(island_index)) else {
            continue;
        };
        let mut manifold = contact.manifold;
        manifold.point_count = manifold.active_count();
        debug_assert!(manifold.point_count > 0);

        let (inv_mass_a, inv_mass_b) = (body_a.solver_inv_mass(), body_b.solver_inv_mass());
        let (inv_i_a, inv_i_b) = (body_a.solver_inv_inertia(), body_b.solver_inv_inertia());

        let mut points = [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS];
        for (vcp, mp) in points.iter_mut().zip(manifold.active_points()) {
            if ctx.config.warm_starting {
                vcp.normal_impulse = ctx.dt_ratio * mp.normal_impulse;
                vcp.tangent_impulse = ctx.dt_ratio * mp.tangent_impulse;
            }
        }

        velocity_constraints.push(ContactVelocityConstraint {
            points,
            normal: Vec2::ZERO,
            normal_mass: Mat2::ZERO,
            k: Mat2::ZERO,
            index_a: index_a as usize,
            index_b: index_b as usize,
            inv_mass_a,
            inv_mass_b,
            inv_i_a,
            inv_i_b,
            friction: contact.friction,
            restitution: contact.restitution,
            tangent_speed: contact.tangent_speed,
            point_count: manifold.point_count,
            contact_index,
        });
        position_constraints.push(ContactPositionConstraint {
            manifold,
            index_a: index_a as usize,
            index_b: index_b as usize,
            inv_mass_a,
            inv_mass_b,
            inv_i_a,
            inv_i_b,
            local_center_a: body_a.local_center,
            local_center_b: body_b.local_center,
            radius_a: contact.fixture_a.radius,
            radius_b: contact.fixture_b.radius,
        });
    }
}

/// Compute anchors, effective masses and velocity biases from scratch state.
pub(crate) fn initialize_velocity_constraints(
    velocity_constraints: &mut [ContactVelocityConstraint],
    position_constraints: &[ContactPositionConstraint],
    positions: &[Position],
    velocities: &[Velocity],
    ctx: &StepContext,
) {
    let baumgarte = ctx.config.stabilization == Stabilization::Baumgarte;

    for (vc, pc) in velocity_constraints.iter_mut().zip(position_constraints) {
        let (pos_a, pos_b) = (positions[vc.index_a], positions[vc.index_b]);
        let (vel_a, vel_b) = (velocities[vc.index_a], velocities[vc.index_b]);

        let xf_a = transform_of(&pos_a, pc.local_center_a);
        let xf_b = transform_of(&pos_b, pc.local_center_b);
        let world = WorldManifold::new(&pc.manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

        vc.normal = world.normal;
        let tangent = cross_vs(vc.normal, 1.0);
        let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

        for j in 0..vc.point_count {
            let vcp = &mut vc.points[j];
            vcp.r_a = world.points[j] - pos_a.c;
            vcp.r_b = world.points[j] - pos_b.c;

            let rn_a = cross(vcp.r_a, vc.normal);
            let rn_b = cross(vcp.r_b, vc.normal);
            let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
            vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

            let rt_a = cross(vcp.r_a, tangent);
            let rt_b = cross(vcp.r_b, tangent);
            let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
            vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

            // Restitution bias
            vcp.velocity_bias = 0.0;
            let v_rel = vc.normal.dot(vel_b.v + cross_sv(vel_b.w, vcp.r_b) - vel_a.v - cross_sv(vel_a.w, vcp.r_a));
            if v_rel < -ctx.config.velocity_threshold {
                vcp.velocity_bias = -vc.restitution * v_rel;
            }

            if baumgarte {
                let push = -ctx.config.baumgarte * ctx.inv_dt * (world.separations[j] + ctx.config.linear_slop).min(0.0);
                vcp.velocity_bias = vcp.velocity_bias.max(push);
            }
        }

        // Prepare the block solver
        if vc.point_count == 2 {
            let (p1, p2) = (vc.points[0], vc.points[1]);
            let rn1_a = cross(p1.r_a, vc.normal);
            let rn1_b = cross(p1.r_b, vc.normal);
            let rn2_a = cross(p2.r_a, vc.normal);
            let rn2_b = cross(p2.r_b, vc.normal);

            let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
            let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
            let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

            if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                vc.k = sym22(k11, k12, k22);
                vc.normal_mass = vc.k.inverse();
            } else {
                // Redundant points, keep one
                vc.point_count = 1;
            }
        }
    }
}

/// Apply the seeded impulses to the scratch velocities.
pub(crate) fn warm_start(velocity_constraints: &[ContactVelocityConstraint], velocities: &mut [Velocity]) {
    for vc in velocity_constraints {
        let tangent = cross_vs(vc.normal, 1.0);
        let mut vel_a = velocities[vc.index_a];
        let mut vel_b = velocities[vc.index_b];

        for vcp in &vc.points[..vc.point_count] {
            let p = vcp.normal_impulse * vc.normal + vcp.tangent_impulse * tangent;
            vel_a.w -= vc.inv_i_a * cross(vcp.r_a, p);
            vel_a.v -= vc.inv_mass_a * p;
            vel_b.w += vc.inv_i_b * cross(vcp.r_b, p);
            vel_b.v += vc.inv_mass_b * p;
        }

        velocities[vc.index_a] = vel_a;
        velocities[vc.index_b] = vel_b;
    }
}

// ============================================================================
// Velocity phase
// ============================================================================

/// One sequential-impulse pass over every contact.
pub(crate) fn solve_velocity_constraints(velocity_constraints: &mut [ContactVelocityConstraint], velocities: &mut [Velocity]) {
    for vc in velocity_constraints.iter_mut() {
        let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
        let mut vel_a = velocities[vc.index_a];
        let mut vel_b = velocities[vc.index_b];

        let normal = vc.normal;
        let tangent = cross_vs(normal, 1.0);
        let friction = vc.friction;

        // Tangent first: non-penetration matters more than friction
        for vcp in vc.points[..vc.point_count].iter_mut() {
            let dv = vel_b.v + cross_sv(vel_b.w, vcp.r_b) - vel_a.v - cross_sv(vel_a.w, vcp.r_a);
            let vt = dv.dot(tangent) - vc.tangent_speed;
            let lambda = vcp.tangent_mass * -vt;

            let max_friction = friction * vcp.normal_impulse;
            let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
            let lambda = new_impulse - vcp.tangent_impulse;
            vcp.tangent_impulse = new_impulse;

            let p = lambda * tangent;
            vel_a.v -= m_a * p;
            vel_a.w -= i_a * cross(vcp.r_a, p);
            vel_b.v += m_b * p;
            vel_b.w += i_b * cross(vcp.r_b, p);
        }

        if vc.point_count == 1 {
            let vcp = &mut vc.points[0];
            let dv = vel_b.v + cross_sv(vel_b.w, vcp.r_b) - vel_a.v - cross_sv(vel_a.w, vcp.r_a);
            let vn = dv.dot(normal);
            let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

            let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
            let lambda = new_impulse - vcp.normal_impulse;
            vcp.normal_impulse = new_impulse;

            let p = lambda * normal;
            vel_a.v -= m_a * p;
            vel_a.w -= i_a * cross(vcp.r_a, p);
            vel_b.v += m_b * p;
            vel_b.w += i_b * cross(vcp.r_b, p);
        } else {
            solve_block(vc, &mut vel_a, &mut vel_b);
        }

        velocities[vc.index_a] = vel_a;
        velocities[vc.index_b] = vel_b;
    }
}

/// Two-point normal solve as a mixed LCP, by total enumeration.
///
/// With `a` the accumulated impulse and `x` the new total impulse,
/// `vn = K * x + b'` where `b' = vn0 - bias - K * a`. The first of the four
/// complementary cases with `x >= 0` and `vn >= 0` wins; if none applies the
/// impulses are left unchanged for this pass.
fn solve_block(vc: &mut ContactVelocityConstraint, vel_a: &mut Velocity, vel_b: &mut Velocity) {
    let normal = vc.normal;
    let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
    let (cp1, cp2) = (vc.points[0], vc.points[1]);

    let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
    debug_assert!(a.x >= 0.0 && a.y >= 0.0);

    let dv1 = vel_b.v + cross_sv(vel_b.w, cp1.r_b) - vel_a.v - cross_sv(vel_a.w, cp1.r_a);
    let dv2 = vel_b.v + cross_sv(vel_b.w, cp2.r_b) - vel_a.v - cross_sv(vel_a.w, cp2.r_a);
    let vn1 = dv1.dot(normal);
    let vn2 = dv2.dot(normal);

    let b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias) - vc.k * a;
    let k12 = vc.k.x_axis.y;

    let candidate = {
        // Both points active: vn = 0
        let x = -(vc.normal_mass * b);
        if x.x >= 0.0 && x.y >= 0.0 {
            Some(x)
        } else {
            // Point 1 active, point 2 released
            let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
            let vn2 = k12 * x.x + b.y;
            if x.x >= 0.0 && vn2 >= 0.0 {
                Some(x)
            } else {
                // Point 2 active, point 1 released
                let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
                let vn1 = k12 * x.y + b.x;
                if x.y >= 0.0 && vn1 >= 0.0 {
                    Some(x)
                } else if b.x >= 0.0 && b.y >= 0.0 {
                    // Both released
                    Some(Vec2::ZERO)
                } else {
                    None
                }
            }
        }
    };

    let Some(x) = candidate else {
        return;
    };

    let d = x - a;
    let p1 = d.x * normal;
    let p2 = d.y * normal;
    vel_a.v -= m_a * (p1 + p2);
    vel_a.w -= i_a * (cross(cp1.r_a, p1) + cross(cp2.r_a, p2));
    vel_b.v += m_b * (p1 + p2);
    vel_b.w += i_b * (cross(cp1.r_b, p1) + cross(cp2.r_b, p2));

    vc.points[0].normal_impulse = x.x;
    vc.points[1].normal_impulse = x.y;
}

/// Copy the converged impulses into the island's write-back buffer.
pub(crate) fn store_impulses(velocity_constraints: &[ContactVelocityConstraint], out: &mut Vec<ContactImpulses>) {
    out.clear();
    out.extend(velocity_constraints.iter().map(|vc| {
        let mut impulses = ContactImpulses {
            contact_index: vc.contact_index,
            point_count: vc.point_count,
            ..ContactImpulses::default()
        };
        for (j, vcp) in vc.points[..vc.point_count].iter().enumerate() {
            impulses.normal[j] = vcp.normal_impulse;
            impulses.tangent[j] = vcp.tangent_impulse;
        }
        impulses
    }));
}

// ============================================================================
// Position phase
// ============================================================================

/// One NGS pass over every contact. Returns `true` when the deepest
/// penetration is within `3 * linear_slop`.
pub(crate) fn solve_position_constraints(
    position_constraints: &[ContactPositionConstraint],
    positions: &mut [Position],
    ctx: &StepContext,
) -> bool {
    let config = &ctx.config;
    let mut min_separation = 0.0_f32;

    for pc in position_constraints {
        let (m_a, m_b, i_a, i_b) = (pc.inv_mass_a, pc.inv_mass_b, pc.inv_i_a, pc.inv_i_b);
        let mut pos_a = positions[pc.index_a];
        let mut pos_b = positions[pc.index_b];

        for j in 0..pc.manifold.point_count {
            let xf_a = transform_of(&pos_a, pc.local_center_a);
            let xf_b = transform_of(&pos_b, pc.local_center_b);
            let (normal, point, separation) = position_manifold(pc, j, &xf_a, &xf_b);

            let r_a = point - pos_a.c;
            let r_b = point - pos_b.c;

            min_separation = min_separation.min(separation);

            // Allow slop, cap the single-pass push
            let c = (config.baumgarte * (separation + config.linear_slop)).clamp(-config.max_linear_correction, 0.0);

            let rn_a = cross(r_a, normal);
            let rn_b = cross(r_b, normal);
            let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
            let impulse = if k > 0.0 { -c / k } else { 0.0 };
            let p = impulse * normal;

            let max_angle = config.max_angular_correction;
            pos_a.c -= m_a * p;
            pos_a.a -= (i_a * cross(r_a, p)).clamp(-max_angle, max_angle);
            pos_b.c += m_b * p;
            pos_b.a += (i_b * cross(r_b, p)).clamp(-max_angle, max_angle);
        }

        positions[pc.index_a] = pos_a;
        positions[pc.index_b] = pos_b;
    }

    // Separation is never pushed above -linear_slop, hence the wider bound
    min_separation >= -3.0 * config.linear_slop
}
