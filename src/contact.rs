//! Contacts and Manifolds
//!
//! Contact records handed to the solver by the collision pipeline. A contact
//! links two fixtures (and through them two bodies) and carries the manifold
//! produced by narrow-phase collision, in body-local coordinates, together
//! with the impulses persisted between frames for warm starting.
//!
//! # Manifold types
//!
//! - **Circles**: `local_point` is the center on A, `points[0].local_point`
//!   the center on B
//! - **FaceA**: `local_normal`/`local_point` describe a face of A; points are
//!   clip points on B
//! - **FaceB**: mirror of `FaceA`

use core::fmt;

use crate::arena::Arena;
use crate::body::{BodyHandle, BodySet};
use crate::error::PhysicsError;
use crate::math::Vec2;

/// Maximum number of points in a manifold
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Identity of a contact inside a [`ContactSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactHandle(pub u32);

impl fmt::Display for ContactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contact#{}", self.0)
    }
}

// ============================================================================
// Manifold
// ============================================================================

/// Geometric form of a manifold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// One manifold point with its persisted impulses
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManifoldPoint {
    /// Meaning depends on the manifold type
    pub local_point: Vec2,
    /// Accumulated non-penetration impulse
    pub normal_impulse: f32,
    /// Accumulated friction impulse
    pub tangent_impulse: f32,
    /// Feature key used by the collision pipeline to match points across frames
    pub id: u32,
}

impl ManifoldPoint {
    #[must_use]
    pub fn new(local_point: Vec2) -> Self {
        Self {
            local_point,
            ..Self::default()
        }
    }
}

/// Contact manifold in body-local coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Manifold {
    pub manifold_type: ManifoldType,
    /// Face normal (unused for circles)
    pub local_normal: Vec2,
    /// Face reference point or circle center on A
    pub local_point: Vec2,
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
}

impl Manifold {
    /// Circle-vs-circle manifold between two centers.
    #[must_use]
    pub fn circles(center_a: Vec2, center_b: Vec2) -> Self {
        Self {
            manifold_type: ManifoldType::Circles,
            local_normal: Vec2::ZERO,
            local_point: center_a,
            points: [ManifoldPoint::new(center_b), ManifoldPoint::default()],
            point_count: 1,
        }
    }

    /// Face of A against one or two clip points on B.
    #[must_use]
    pub fn face_a(local_normal: Vec2, local_point: Vec2, clip_points: &[Vec2]) -> Self {
        Self::face(ManifoldType::FaceA, local_normal, local_point, clip_points)
    }

    /// Face of B against one or two clip points on A.
    #[must_use]
    pub fn face_b(local_normal: Vec2, local_point: Vec2, clip_points: &[Vec2]) -> Self {
        Self::face(ManifoldType::FaceB, local_normal, local_point, clip_points)
    }

    fn face(manifold_type: ManifoldType, local_normal: Vec2, local_point: Vec2, clip_points: &[Vec2]) -> Self {
        let mut points = [ManifoldPoint::default(); MAX_MANIFOLD_POINTS];
        let point_count = clip_points.len().min(MAX_MANIFOLD_POINTS);
        for (i, p) in clip_points.iter().take(point_count).enumerate() {
            points[i] = ManifoldPoint {
                local_point: *p,
                id: i as u32,
                ..ManifoldPoint::default()
            };
        }
        Self {
            manifold_type,
            local_normal,
            local_point,
            points,
            point_count,
        }
    }

    /// Number of usable points; a `point_count` past the point array is
    /// clamped.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.point_count.min(MAX_MANIFOLD_POINTS)
    }

    /// Active points.
    #[inline]
    pub fn active_points(&self) -> &[ManifoldPoint] {
        &self.points[..self.active_count()]
    }
}

// ============================================================================
// Contact
// ============================================================================

/// Fixture side of a contact
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactFixture {
    /// Owning body
    pub body: BodyHandle,
    /// Solid fixture; `false` marks a sensor
    pub hard: bool,
    /// Shape radius (skin) used when evaluating the manifold
    pub radius: f32,
}

impl ContactFixture {
    #[must_use]
    pub fn new(body: BodyHandle, radius: f32) -> Self {
        Self {
            body,
            hard: true,
            radius,
        }
    }

    #[must_use]
    pub fn sensor(body: BodyHandle) -> Self {
        Self {
            body,
            hard: false,
            radius: 0.0,
        }
    }
}

/// Contact between two fixtures
#[derive(Clone, Debug)]
pub struct Contact {
    pub fixture_a: ContactFixture,
    pub fixture_b: ContactFixture,
    pub manifold: Manifold,
    /// Mixed friction coefficient
    pub friction: f32,
    /// Mixed restitution coefficient
    pub restitution: f32,
    /// Surface speed along the tangent (conveyor belts)
    pub tangent_speed: f32,
    /// Disabled contacts are ignored for one step
    pub enabled: bool,
    /// Set by the collision pipeline when the manifold has points
    pub touching: bool,

    pub(crate) island: bool,
}

impl Contact {
    /// Touching, enabled contact with default friction.
    #[must_use]
    pub fn new(fixture_a: ContactFixture, fixture_b: ContactFixture, manifold: Manifold) -> Self {
        Self {
            fixture_a,
            fixture_b,
            touching: manifold.point_count > 0,
            manifold,
            friction: 0.2,
            restitution: 0.0,
            tangent_speed: 0.0,
            enabled: true,
            island: false,
        }
    }

    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    #[must_use]
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    #[inline]
    #[must_use]
    pub fn body_a(&self) -> BodyHandle {
        self.fixture_a.body
    }

    #[inline]
    #[must_use]
    pub fn body_b(&self) -> BodyHandle {
        self.fixture_b.body
    }

    /// Either fixture is a sensor.
    #[inline]
    #[must_use]
    pub fn is_sensor(&self) -> bool {
        !self.fixture_a.hard || !self.fixture_b.hard
    }

    /// Body on the other side of `body`.
    #[inline]
    #[must_use]
    pub fn other_body(&self, body: BodyHandle) -> BodyHandle {
        if self.fixture_a.body == body {
            self.fixture_b.body
        } else {
            self.fixture_a.body
        }
    }

    /// Whether the contact takes part in island building.
    #[inline]
    pub(crate) fn is_solid(&self) -> bool {
        self.enabled && self.touching && !self.is_sensor() && self.manifold.point_count > 0
    }
}

// ============================================================================
// Contact Set
// ============================================================================

/// Owner of the current frame's contacts.
#[derive(Clone, Debug, Default)]
pub struct ContactSet {
    contacts: Arena<Contact>,
}

impl ContactSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contact and register it with both bodies.
    pub fn insert(&mut self, bodies: &mut BodySet, mut contact: Contact) -> Result<ContactHandle, PhysicsError> {
        let (a, b) = (contact.body_a(), contact.body_b());
        bodies.body(a)?;
        bodies.body(b)?;
        if a == b {
            return Err(PhysicsError::InvalidConstraint {
                reason: "contact connects a body to itself",
            });
        }
        contact.island = false;
        let handle = ContactHandle(self.contacts.insert(contact));
        for body in [a, b] {
            if let Some(body) = bodies.get_mut(body) {
                body.contacts.push(handle);
            }
        }
        Ok(handle)
    }

    /// Remove a contact and unregister it from its bodies.
    pub fn remove(&mut self, bodies: &mut BodySet, handle: ContactHandle) -> Option<Contact> {
        let contact = self.contacts.remove(handle.0)?;
        for body in [contact.body_a(), contact.body_b()] {
            if let Some(body) = bodies.get_mut(body) {
                body.contacts.retain(|c| *c != handle);
            }
        }
        Some(contact)
    }

    #[inline]
    pub fn get(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contacts.get(handle.0)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: ContactHandle) -> Option<&mut Contact> {
        self.contacts.get_mut(handle.0)
    }

    /// Look up a contact, failing on a stale handle.
    pub fn contact(&self, handle: ContactHandle) -> Result<&Contact, PhysicsError> {
        self.get(handle)
            .ok_or(PhysicsError::InvalidContactHandle { index: handle.0 })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> {
        self.contacts.iter().map(|(i, c)| (ContactHandle(i), c))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ContactHandle, &mut Contact)> {
        self.contacts.iter_mut().map(|(i, c)| (ContactHandle(i), c))
    }
}

// ============================================================================
// Collision collaborator
// ============================================================================

/// Collision pipeline feeding contacts to the step.
///
/// `find_new_contacts` runs every step, prediction included. `collide` runs
/// only on non-prediction steps and refreshes `touching` and manifolds.
pub trait ContactFeed {
    /// Create contacts for newly overlapping fixture pairs.
    fn find_new_contacts(&mut self, bodies: &mut BodySet, contacts: &mut ContactSet);

    /// Update touching state and manifolds of existing contacts.
    fn collide(&mut self, bodies: &mut BodySet, contacts: &mut ContactSet);
}

/// No collision pipeline: contacts are managed by hand.
impl ContactFeed for () {
    fn find_new_contacts(&mut self, _bodies: &mut BodySet, _contacts: &mut ContactSet) {}

    fn collide(&mut self, _bodies: &mut BodySet, _contacts: &mut ContactSet) {}
}
