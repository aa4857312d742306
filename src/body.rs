//! Body Store
//!
//! Per-body physical state consumed by the island solver, plus the
//! [`BodySet`] container that owns every body and tracks which ones are awake.
//!
//! # Conventions
//!
//! - `position` is the body origin; the solver works on the center of mass
//!   (`position + rot(angle) * local_center`) and converts back on write-back.
//! - Static bodies never carry velocity and never sleep or wake.
//! - Only dynamic bodies respond to gravity, forces and impulses; kinematic
//!   bodies move with their velocity and push dynamic bodies.

use core::fmt;

use crate::arena::Arena;
use crate::contact::ContactHandle;
use crate::error::PhysicsError;
use crate::joint::JointHandle;
use crate::math::{Rot, Transform2, Vec2};

// ============================================================================
// Handles
// ============================================================================

/// Identity of a body inside a [`BodySet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyHandle(pub u32);

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

// ============================================================================
// Body Type
// ============================================================================

/// Kind of rigid body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BodyType {
    /// Never moves; terminates island propagation
    Static = 0,
    /// Moved by its velocity only, infinite mass
    Kinematic = 1,
    /// Moved by physics (gravity, forces, constraints)
    Dynamic = 2,
}

// ============================================================================
// Body
// ============================================================================

/// Rigid body state
#[derive(Clone, Debug)]
pub struct Body {
    /// Body kind
    pub body_type: BodyType,
    /// Origin in world space
    pub position: Vec2,
    /// Orientation in radians
    pub angle: f32,
    /// Linear velocity of the center of mass
    pub linear_velocity: Vec2,
    /// Angular velocity (rad/s)
    pub angular_velocity: f32,
    /// Inverse mass (0 = infinite)
    pub inv_mass: f32,
    /// Inverse rotational inertia about the center of mass
    pub inv_inertia: f32,
    /// Center of mass relative to the origin, in body space
    pub local_center: Vec2,
    /// Accumulated force, cleared after each non-prediction step
    pub force: Vec2,
    /// Accumulated torque, cleared after each non-prediction step
    pub torque: f32,
    /// Linear damping coefficient (1/s)
    pub linear_damping: f32,
    /// Angular damping coefficient (1/s)
    pub angular_damping: f32,
    /// Skip gravity for this body
    pub ignore_gravity: bool,
    /// Allow the sleep scheduler to put this body to sleep
    pub sleeping_allowed: bool,
    /// Take part in island building at all
    pub can_collide: bool,
    /// Owning entity is paused
    pub paused: bool,
    /// Simulate even while paused
    pub ignore_paused: bool,
    /// Simulate during prediction steps
    pub predict: bool,

    pub(crate) sleep_time: f32,
    pub(crate) awake: bool,
    /// Position in the awake list while awake
    pub(crate) awake_slot: u32,
    /// Already placed in an island this step
    pub(crate) island: bool,
    /// `(island index, slot)` for every island this body landed in this step
    pub(crate) island_slots: Vec<(u32, u32)>,
    pub(crate) contacts: Vec<ContactHandle>,
    pub(crate) joints: Vec<JointHandle>,
}

impl Body {
    fn with_type(body_type: BodyType, position: Vec2) -> Self {
        Self {
            body_type,
            position,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            local_center: Vec2::ZERO,
            force: Vec2::ZERO,
            torque: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            ignore_gravity: false,
            sleeping_allowed: true,
            can_collide: true,
            paused: false,
            ignore_paused: false,
            predict: false,
            sleep_time: 0.0,
            awake: body_type != BodyType::Static,
            awake_slot: 0,
            island: false,
            island_slots: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
        }
    }

    /// Dynamic body with the given mass.
    ///
    /// Rotational inertia defaults to that of a unit box (`m / 6`); override
    /// with [`Body::with_inertia`].
    #[must_use]
    pub fn new_dynamic(position: Vec2, mass: f32) -> Self {
        let mut body = Self::with_type(BodyType::Dynamic, position);
        if mass > 0.0 {
            body.inv_mass = 1.0 / mass;
            body.inv_inertia = 6.0 / mass;
        }
        body
    }

    /// Immovable body.
    #[must_use]
    pub fn new_static(position: Vec2) -> Self {
        Self::with_type(BodyType::Static, position)
    }

    /// Body moved only by its velocity.
    #[must_use]
    pub fn new_kinematic(position: Vec2) -> Self {
        Self::with_type(BodyType::Kinematic, position)
    }

    /// Set rotational inertia about the center of mass (0 = fixed rotation).
    #[must_use]
    pub fn with_inertia(mut self, inertia: f32) -> Self {
        self.inv_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
        self
    }

    /// Set the initial angle.
    #[must_use]
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    /// Set the initial velocities. Ignored for static bodies.
    #[must_use]
    pub fn with_velocity(mut self, linear: Vec2, angular: f32) -> Self {
        if self.body_type != BodyType::Static {
            self.linear_velocity = linear;
            self.angular_velocity = angular;
        }
        self
    }

    /// Set linear and angular damping.
    #[must_use]
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Set the center of mass in body space.
    #[must_use]
    pub fn with_local_center(mut self, local_center: Vec2) -> Self {
        self.local_center = local_center;
        self
    }

    /// Simulate this body during prediction steps.
    #[must_use]
    pub fn with_predict(mut self, predict: bool) -> Self {
        self.predict = predict;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Whether the body is currently simulated.
    #[inline]
    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Time the body has spent below the sleep tolerances.
    #[inline]
    #[must_use]
    pub fn sleep_time(&self) -> f32 {
        self.sleep_time
    }

    /// Contacts attached to this body.
    #[inline]
    pub fn contacts(&self) -> &[ContactHandle] {
        &self.contacts
    }

    /// Joints attached to this body.
    #[inline]
    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    /// Origin transform.
    #[inline]
    #[must_use]
    pub fn transform(&self) -> Transform2 {
        Transform2::new(self.position, self.angle)
    }

    /// Center of mass in world space.
    #[inline]
    #[must_use]
    pub fn world_center(&self) -> Vec2 {
        self.position + Rot::new(self.angle).rotate(self.local_center)
    }

    /// Inverse mass seen by the solver (zero unless dynamic).
    #[inline]
    #[must_use]
    pub fn solver_inv_mass(&self) -> f32 {
        if self.is_dynamic() {
            self.inv_mass
        } else {
            0.0
        }
    }

    /// Inverse inertia seen by the solver (zero unless dynamic).
    #[inline]
    #[must_use]
    pub fn solver_inv_inertia(&self) -> f32 {
        if self.is_dynamic() {
            self.inv_inertia
        } else {
            0.0
        }
    }

    /// Apply a force at the center of mass.
    pub fn apply_force(&mut self, force: Vec2) {
        if self.is_dynamic() {
            self.force += force;
        }
    }

    /// Apply a torque.
    pub fn apply_torque(&mut self, torque: f32) {
        if self.is_dynamic() {
            self.torque += torque;
        }
    }

    /// Apply an impulse at the center of mass.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2) {
        if self.is_dynamic() {
            self.linear_velocity += impulse * self.inv_mass;
        }
    }

    /// Slot this body occupies in island `island`.
    ///
    /// Islands are handed out in index order, so the records are sorted.
    #[inline]
    pub(crate) fn island_slot(&self, island: u32) -> Option<u32> {
        self.island_slots
            .binary_search_by_key(&island, |(index, _)| *index)
            .ok()
            .map(|i| self.island_slots[i].1)
    }
}

// ============================================================================
// Body Set
// ============================================================================

/// Owner of every body, with the list of awake bodies.
#[derive(Clone, Debug, Default)]
pub struct BodySet {
    bodies: Arena<Body>,
    awake: Vec<BodyHandle>,
}

impl BodySet {
    /// Create an empty body set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body. Non-static bodies start awake.
    pub fn insert(&mut self, mut body: Body) -> BodyHandle {
        body.island = false;
        body.island_slots.clear();
        body.contacts.clear();
        body.joints.clear();
        body.sleep_time = 0.0;
        let awake = body.body_type != BodyType::Static;
        body.awake = awake;
        let handle = BodyHandle(self.bodies.insert(body));
        if awake {
            self.push_awake(handle);
        }
        handle
    }

    /// Remove a body from the store.
    ///
    /// Contacts and joints that still reference it are left in place; use
    /// `PhysicsWorld::remove_body` to detach them as well.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        let body = self.bodies.remove(handle.0)?;
        if body.awake {
            self.swap_remove_awake(body.awake_slot as usize);
        }
        Some(body)
    }

    #[inline]
    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0)
    }

    /// Look up a body, failing on a stale handle.
    pub fn body(&self, handle: BodyHandle) -> Result<&Body, PhysicsError> {
        self.get(handle)
            .ok_or(PhysicsError::InvalidBodyHandle { index: handle.0 })
    }

    /// Mutable variant of [`BodySet::body`].
    pub fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, PhysicsError> {
        self.get_mut(handle)
            .ok_or(PhysicsError::InvalidBodyHandle { index: handle.0 })
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_some()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.len() == 0
    }

    /// Iterate over all bodies.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter().map(|(i, b)| (BodyHandle(i), b))
    }

    /// Handles of awake bodies. Order is stable until a body falls asleep
    /// or is removed.
    #[inline]
    pub fn awake_bodies(&self) -> &[BodyHandle] {
        &self.awake
    }

    /// Wake or sleep a body.
    ///
    /// Waking resets the sleep timer. Putting a body to sleep zeroes its
    /// velocities, accumulated force and torque. Static bodies are left alone.
    pub fn set_awake(&mut self, handle: BodyHandle, awake: bool) -> Result<(), PhysicsError> {
        if awake {
            self.wake(handle, true)
        } else {
            self.sleep(handle)
        }
    }

    /// Wake a body, optionally keeping its accumulated sleep time.
    pub(crate) fn wake(&mut self, handle: BodyHandle, reset_sleep_time: bool) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.is_static() {
            return Ok(());
        }
        if reset_sleep_time {
            body.sleep_time = 0.0;
        }
        if !body.awake {
            body.awake = true;
            self.push_awake(handle);
        }
        Ok(())
    }

    fn sleep(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.is_static() {
            return Ok(());
        }
        body.sleep_time = 0.0;
        body.linear_velocity = Vec2::ZERO;
        body.angular_velocity = 0.0;
        body.force = Vec2::ZERO;
        body.torque = 0.0;
        if body.awake {
            body.awake = false;
            let slot = body.awake_slot as usize;
            self.swap_remove_awake(slot);
        }
        Ok(())
    }

    /// Drop a handle with no backing record from the awake list.
    pub(crate) fn forget_awake(&mut self, handle: BodyHandle) {
        if let Some(slot) = self.awake.iter().position(|h| *h == handle) {
            self.swap_remove_awake(slot);
        }
    }

    fn push_awake(&mut self, handle: BodyHandle) {
        let slot = self.awake.len() as u32;
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.awake_slot = slot;
        }
        self.awake.push(handle);
    }

    fn swap_remove_awake(&mut self, slot: usize) {
        if slot >= self.awake.len() {
            return;
        }
        self.awake.swap_remove(slot);
        if let Some(&moved) = self.awake.get(slot) {
            if let Some(body) = self.bodies.get_mut(moved.0) {
                body.awake_slot = slot as u32;
            }
        }
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut Body)> {
        self.bodies.iter_mut().map(|(i, b)| (BodyHandle(i), b))
    }

    /// Delete the record but leave the awake list untouched.
    #[cfg(test)]
    pub(crate) fn drop_record(&mut self, handle: BodyHandle) {
        self.bodies.remove(handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dynamic_mass() {
        let body = Body::new_dynamic(Vec2::new(1.0, 2.0), 2.0);
        assert_eq!(body.inv_mass, 0.5);
        assert_eq!(body.inv_inertia, 3.0);
        assert!(body.is_dynamic());
        assert_eq!(body.solver_inv_mass(), 0.5);
    }

    #[test]
    fn test_kinematic_has_no_solver_mass() {
        let mut body = Body::new_kinematic(Vec2::ZERO);
        body.inv_mass = 1.0;
        assert_eq!(body.solver_inv_mass(), 0.0);
        assert_eq!(body.solver_inv_inertia(), 0.0);
    }

    #[test]
    fn test_static_ignores_velocity() {
        let body = Body::new_static(Vec2::ZERO).with_velocity(Vec2::X, 1.0);
        assert_eq!(body.linear_velocity, Vec2::ZERO);
        assert_eq!(body.angular_velocity, 0.0);
    }

    #[test]
    fn test_insert_tracks_awake() {
        let mut set = BodySet::new();
        let ground = set.insert(Body::new_static(Vec2::ZERO));
        let ball = set.insert(Body::new_dynamic(Vec2::Y, 1.0));
        assert_eq!(set.awake_bodies(), &[ball]);
        assert!(!set.get(ground).map_or(true, Body::is_awake));
    }

    #[test]
    fn test_sleep_zeroes_state() {
        let mut set = BodySet::new();
        let h = set.insert(Body::new_dynamic(Vec2::ZERO, 1.0).with_velocity(Vec2::X, 2.0));
        if let Some(body) = set.get_mut(h) {
            body.apply_force(Vec2::Y);
        }

        set.set_awake(h, false).expect("live handle");
        let body = set.body(h).expect("live handle");
        assert!(!body.is_awake());
        assert_eq!(body.linear_velocity, Vec2::ZERO);
        assert_eq!(body.angular_velocity, 0.0);
        assert_eq!(body.force, Vec2::ZERO);
        assert!(set.awake_bodies().is_empty());

        set.set_awake(h, true).expect("live handle");
        assert_eq!(set.awake_bodies(), &[h]);
    }

    #[test]
    fn test_wake_preserving_sleep_time() {
        let mut set = BodySet::new();
        let h = set.insert(Body::new_dynamic(Vec2::ZERO, 1.0));
        set.set_awake(h, false).expect("live handle");
        if let Some(body) = set.get_mut(h) {
            body.sleep_time = 0.25;
        }
        set.wake(h, false).expect("live handle");
        assert_eq!(set.body(h).map(Body::sleep_time), Ok(0.25));
    }

    #[test]
    fn test_remove_clears_awake() {
        let mut set = BodySet::new();
        let h = set.insert(Body::new_dynamic(Vec2::ZERO, 1.0));
        assert!(set.remove(h).is_some());
        assert!(set.awake_bodies().is_empty());
        assert_eq!(
            set.body(h).err(),
            Some(PhysicsError::InvalidBodyHandle { index: h.0 })
        );
    }

    #[test]
    fn test_island_slot_lookup() {
        let mut body = Body::new_static(Vec2::ZERO);
        for island in [1, 3, 4, 7, 9] {
            body.island_slots.push((island, island * 2));
        }
        assert_eq!(body.island_slot(3), Some(6));
        assert_eq!(body.island_slot(9), Some(18));
        assert_eq!(body.island_slot(2), None);
    }

    #[test]
    fn test_sleep_keeps_awake_slots_consistent() {
        let mut set = BodySet::new();
        let handles: Vec<BodyHandle> = (0..6)
            .map(|i| set.insert(Body::new_dynamic(Vec2::new(i as f32, 0.0), 1.0)))
            .collect();

        for &h in &[handles[0], handles[3], handles[5]] {
            set.set_awake(h, false).expect("live handle");
        }
        assert!(set.remove(handles[1]).is_some());

        let mut awake = set.awake_bodies().to_vec();
        awake.sort();
        assert_eq!(awake, vec![handles[2], handles[4]]);
        for (slot, &h) in set.awake_bodies().iter().enumerate() {
            assert_eq!(set.body(h).map(|b| b.awake_slot), Ok(slot as u32));
        }

        set.set_awake(handles[0], true).expect("live handle");
        assert_eq!(set.awake_bodies().last(), Some(&handles[0]));
        assert_eq!(set.body(handles[0]).map(|b| b.awake_slot), Ok(2));
    }

    #[test]
    fn test_forget_awake_drops_handle() {
        let mut set = BodySet::new();
        let a = set.insert(Body::new_dynamic(Vec2::ZERO, 1.0));
        let b = set.insert(Body::new_dynamic(Vec2::X, 1.0));
        set.forget_awake(a);
        assert_eq!(set.awake_bodies(), &[b]);
        assert_eq!(set.body(b).map(|b| b.awake_slot), Ok(0));
        // Unknown handles are ignored
        set.forget_awake(BodyHandle(42));
        assert_eq!(set.awake_bodies(), &[b]);
    }
}
