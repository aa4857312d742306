//! 2D Math Helpers
//!
//! Thin layer over [`glam::Vec2`] for the planar rigid-body solver: rotations
//! stored as sine/cosine pairs, body transforms, the scalar/vector cross
//! products used by every Jacobian, and small symmetric system solves.

use glam::{Mat2, Mat3, Vec3};

pub use glam::Vec2;

// ============================================================================
// Cross products
// ============================================================================

/// Scalar cross product of two vectors (`a.x * b.y - a.y * b.x`).
#[inline]
#[must_use]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross product of a scalar (angular velocity) with a vector.
#[inline]
#[must_use]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Cross product of a vector with a scalar.
#[inline]
#[must_use]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

// ============================================================================
// Rotation
// ============================================================================

/// Planar rotation stored as sine and cosine of the angle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rot {
    /// Sine of the angle
    pub s: f32,
    /// Cosine of the angle
    pub c: f32,
}

impl Rot {
    /// Zero rotation
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    /// Rotation by `angle` radians.
    #[inline]
    #[must_use]
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    /// Angle in radians, in `(-pi, pi]`.
    #[inline]
    #[must_use]
    pub fn angle(self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Rotate a vector.
    #[inline]
    #[must_use]
    pub fn rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Rotate a vector by the inverse rotation.
    #[inline]
    #[must_use]
    pub fn inv_rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// Transform
// ============================================================================

/// Rigid transform: translation of the body origin plus rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform2 {
    /// Body origin in world space
    pub p: Vec2,
    /// Body rotation
    pub q: Rot,
}

impl Transform2 {
    /// Create a transform from an origin and an angle.
    #[inline]
    #[must_use]
    pub fn new(p: Vec2, angle: f32) -> Self {
        Self { p, q: Rot::new(angle) }
    }

    /// Recover the origin transform from a center of mass position.
    ///
    /// The solver works on centers of mass; manifolds and anchors are stored
    /// relative to the body origin.
    #[inline]
    #[must_use]
    pub fn from_center(center: Vec2, angle: f32, local_center: Vec2) -> Self {
        let q = Rot::new(angle);
        Self {
            p: center - q.rotate(local_center),
            q,
        }
    }

    /// Map a local point into world space.
    #[inline]
    #[must_use]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.rotate(v) + self.p
    }

    /// Map a world point into local space.
    #[inline]
    #[must_use]
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        self.q.inv_rotate(v - self.p)
    }
}

// ============================================================================
// Small linear systems
// ============================================================================

/// Solve `k * x = b` for a 2x2 system. Singular systems yield zero.
#[must_use]
pub fn solve22(k: Mat2, b: Vec2) -> Vec2 {
    let det = k.determinant();
    if det == 0.0 {
        return Vec2::ZERO;
    }
    let inv_det = 1.0 / det;
    let (a11, a21) = (k.x_axis.x, k.x_axis.y);
    let (a12, a22) = (k.y_axis.x, k.y_axis.y);
    Vec2::new(
        inv_det * (a22 * b.x - a12 * b.y),
        inv_det * (a11 * b.y - a21 * b.x),
    )
}

/// Solve `k * x = b` for a 3x3 system. Singular systems yield zero.
#[must_use]
pub fn solve33(k: Mat3, b: Vec3) -> Vec3 {
    let (ex, ey, ez) = (k.x_axis, k.y_axis, k.z_axis);
    let mut det = ex.dot(ey.cross(ez));
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec3::new(
        det * b.dot(ey.cross(ez)),
        det * ex.dot(b.cross(ez)),
        det * ex.dot(ey.cross(b)),
    )
}

/// Build a symmetric 2x2 matrix from its three distinct entries.
#[inline]
#[must_use]
pub fn sym22(k11: f32, k12: f32, k22: f32) -> Mat2 {
    Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22))
}

/// Build a symmetric 3x3 matrix from its six distinct entries.
#[inline]
#[must_use]
pub fn sym33(k11: f32, k12: f32, k13: f32, k22: f32, k23: f32, k33: f32) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(k11, k12, k13),
        Vec3::new(k12, k22, k23),
        Vec3::new(k13, k23, k33),
    )
}

/// Scale `v` down so its length does not exceed `max_length`, keeping direction.
#[inline]
#[must_use]
pub fn clamp_length(v: Vec2, max_length: f32) -> Vec2 {
    let len_sq = v.length_squared();
    if len_sq > max_length * max_length {
        v * (max_length / len_sq.sqrt())
    } else {
        v
    }
}
