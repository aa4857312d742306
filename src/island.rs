//! Island Building
//!
//! Partitions awake bodies into islands: maximal sets connected through
//! solid contacts or enabled joints. Islands are solved independently, so
//! each one is a unit of parallel work.
//!
//! # Traversal
//!
//! Depth-first over an explicit stack, seeded from the awake list. Static
//! bodies join an island for reference but stop propagation, and have their
//! island flag cleared afterwards so they can join any number of islands.
//!
//! # Lone island
//!
//! A seed that ends up alone, with no contacts and no joints, is appended to
//! the shared lone island (pool slot 0) instead of getting an island of its
//! own.
//!
//! # Pooling
//!
//! Islands live in an [`IslandPool`] that is reused every step. Island
//! buffers keep their capacity across steps; nothing is allocated from the
//! pool during the parallel phase.

use crate::body::{BodyHandle, BodySet};
use crate::contact::{ContactHandle, ContactSet};
use crate::contact_solver::{ContactImpulses, ContactPositionConstraint, ContactVelocityConstraint};
use crate::joint::{Joint, JointHandle, JointSet};
use crate::solver::{Position, Velocity};

/// Pool slot of the lone island.
pub const LONE_ISLAND_INDEX: u32 = 0;

// ============================================================================
// Island
// ============================================================================

/// A connected set of bodies with the contacts and joints between them
#[derive(Clone, Debug, Default)]
pub struct Island {
    pub(crate) index: u32,
    pub(crate) lone: bool,
    pub(crate) bodies: Vec<BodyHandle>,
    pub(crate) contacts: Vec<ContactHandle>,
    pub(crate) joints: Vec<JointHandle>,
    pub(crate) position_solved: bool,
    /// Joints over their break threshold, with the violation magnitude
    pub(crate) broken_joints: Vec<(JointHandle, f32)>,

    // Solver scratch, indexed by island slot
    pub(crate) positions: Vec<Position>,
    pub(crate) velocities: Vec<Velocity>,
    pub(crate) velocity_constraints: Vec<ContactVelocityConstraint>,
    pub(crate) position_constraints: Vec<ContactPositionConstraint>,
    pub(crate) contact_impulses: Vec<ContactImpulses>,
    pub(crate) joint_copies: Vec<(JointHandle, Joint)>,
    pub(crate) joint_errors: Vec<f32>,

    // Sleep results, applied on write-back
    pub(crate) sleep_times: Vec<f32>,
    pub(crate) sleep_flags: Vec<bool>,
    pub(crate) sleep_evaluated: bool,
}

impl Island {
    pub(crate) fn new(index: u32, lone: bool) -> Self {
        Self {
            index,
            lone,
            ..Self::default()
        }
    }

    /// Pool slot of this island.
    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Whether this is the shared lone island.
    #[inline]
    #[must_use]
    pub fn is_lone(&self) -> bool {
        self.lone
    }

    /// Member bodies, in traversal order. Static bodies may appear in more
    /// than one island.
    #[inline]
    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }

    #[inline]
    pub fn contacts(&self) -> &[ContactHandle] {
        &self.contacts
    }

    #[inline]
    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    /// Whether the last position phase converged within slop.
    #[inline]
    #[must_use]
    pub fn position_solved(&self) -> bool {
        self.position_solved
    }

    /// Joints that exceeded their break threshold during the last solve.
    #[inline]
    pub fn broken_joints(&self) -> &[(JointHandle, f32)] {
        &self.broken_joints
    }

    /// Contacts plus joints; the scheduling cost of the island.
    #[inline]
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.contacts.len() + self.joints.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
        self.broken_joints.clear();
        self.contact_impulses.clear();
        self.joint_copies.clear();
        self.joint_errors.clear();
        self.sleep_times.clear();
        self.sleep_flags.clear();
        self.sleep_evaluated = false;
        self.position_solved = false;
    }

    /// Append a body and record its slot on the body.
    fn push_body(&mut self, bodies: &mut BodySet, handle: BodyHandle) {
        let slot = self.bodies.len() as u32;
        if let Some(body) = bodies.get_mut(handle) {
            body.island_slots.push((self.index, slot));
        }
        self.bodies.push(handle);
    }
}

// ============================================================================
// Island pool
// ============================================================================

/// Reusable island storage; slot 0 always holds the lone island.
#[derive(Clone, Debug)]
pub struct IslandPool {
    islands: Vec<Island>,
    /// Islands handed out this step, lone island included
    active: usize,
    reserved: usize,
}

impl Default for IslandPool {
    fn default() -> Self {
        Self::new()
    }
}

impl IslandPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            islands: vec![Island::new(LONE_ISLAND_INDEX, true)],
            active: 1,
            reserved: 1,
        }
    }

    /// Reset for a new step, reserving room for `max_islands`.
    pub fn begin(&mut self, max_islands: usize) {
        if self.islands.len() < max_islands {
            self.islands.reserve(max_islands - self.islands.len());
        }
        self.reserved = max_islands.max(1);
        self.islands[0].clear();
        self.active = 1;
    }

    /// Hand out the next empty island.
    fn acquire(&mut self) -> &mut Island {
        let index = self.active;
        if index == self.islands.len() {
            if index == self.reserved {
                tracing::warn!(reserved = self.reserved, "island pool grew past its reservation");
            }
            self.islands.push(Island::new(index as u32, false));
        }
        self.active += 1;
        let island = &mut self.islands[index];
        island.clear();
        island
    }

    pub fn lone(&self) -> &Island {
        &self.islands[0]
    }

    /// Islands built this step. The lone island is included only when it
    /// holds bodies.
    pub fn islands(&self) -> &[Island] {
        let start = usize::from(self.islands[0].is_empty());
        &self.islands[start..self.active]
    }

    pub(crate) fn islands_mut(&mut self) -> &mut [Island] {
        let start = usize::from(self.islands[0].is_empty());
        &mut self.islands[start..self.active]
    }

    /// Number of islands built this step, lone island included when non-empty.
    #[must_use]
    pub fn len(&self) -> usize {
        self.islands().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.islands().is_empty()
    }

    /// Clear island flags and slot records; islands return to the pool.
    pub fn release(&mut self, bodies: &mut BodySet, contacts: &mut ContactSet, joints: &mut JointSet) {
        for island in &mut self.islands[..self.active] {
            for &handle in &island.bodies {
                if let Some(body) = bodies.get_mut(handle) {
                    body.island = false;
                    body.island_slots.clear();
                }
            }
            for &handle in &island.contacts {
                if let Some(contact) = contacts.get_mut(handle) {
                    contact.island = false;
                }
            }
            for &handle in &island.joints {
                if let Some(joint) = joints.get_mut(handle) {
                    joint.island = false;
                }
            }
        }
    }
}

// ============================================================================
// Island builder
// ============================================================================

/// Depth-first island builder with a reusable stack.
#[derive(Clone, Debug, Default)]
pub struct IslandBuilder {
    stack: Vec<BodyHandle>,
    seeds: Vec<BodyHandle>,
    members: Vec<BodyHandle>,
    contacts: Vec<ContactHandle>,
    joints: Vec<JointHandle>,
    edge_contacts: Vec<ContactHandle>,
    edge_joints: Vec<JointHandle>,
}

/// Whether a body may take part in this step at all.
fn is_simulated(paused: bool, ignore_paused: bool, predict: bool, is_prediction: bool) -> bool {
    !(paused && !ignore_paused) && !(is_prediction && !predict)
}

impl IslandBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition the awake bodies into islands inside `pool`.
    ///
    /// Returns the number of islands built, lone island included when it
    /// holds bodies.
    pub fn build(
        &mut self,
        bodies: &mut BodySet,
        contacts: &mut ContactSet,
        joints: &mut JointSet,
        pool: &mut IslandPool,
        is_prediction: bool,
    ) -> usize {
        self.seeds.clear();
        self.seeds.extend_from_slice(bodies.awake_bodies());

        for i in 0..self.seeds.len() {
            let seed = self.seeds[i];
            let Some(body) = bodies.get(seed) else {
                tracing::error!(body = %seed, "awake body has no record, dropping it from the awake list");
                bodies.forget_awake(seed);
                continue;
            };
            if body.island
                || body.is_static()
                || !body.can_collide
                || !is_simulated(body.paused, body.ignore_paused, body.predict, is_prediction)
            {
                continue;
            }

            self.traverse(seed, bodies, contacts, joints);

            if self.members.len() == 1 && self.contacts.is_empty() && self.joints.is_empty() {
                let lone = &mut pool.islands[0];
                debug_assert!(bodies.get(seed).is_some_and(|b| !b.is_static()));
                lone.push_body(bodies, seed);
            } else {
                let island = pool.acquire();
                for &member in &self.members {
                    island.push_body(bodies, member);
                }
                island.contacts.extend_from_slice(&self.contacts);
                island.joints.extend_from_slice(&self.joints);
            }

            // Static bodies may join other islands
            for &member in &self.members {
                if let Some(body) = bodies.get_mut(member) {
                    if body.is_static() {
                        body.island = false;
                    }
                }
            }
        }

        pool.len()
    }

    fn traverse(
        &mut self,
        seed: BodyHandle,
        bodies: &mut BodySet,
        contacts: &mut ContactSet,
        joints: &mut JointSet,
    ) {
        self.members.clear();
        self.contacts.clear();
        self.joints.clear();
        self.stack.clear();

        if let Some(body) = bodies.get_mut(seed) {
            body.island = true;
        }
        self.stack.push(seed);

        while let Some(handle) = self.stack.pop() {
            let Some(body) = bodies.get(handle) else {
                tracing::error!(body = %handle, "island member has no record, skipping");
                continue;
            };
            self.members.push(handle);

            // Static bodies terminate propagation
            if body.is_static() {
                continue;
            }
            let mut edge_contacts = core::mem::take(&mut self.edge_contacts);
            let mut edge_joints = core::mem::take(&mut self.edge_joints);
            edge_contacts.clear();
            edge_contacts.extend_from_slice(&body.contacts);
            edge_joints.clear();
            edge_joints.extend_from_slice(&body.joints);
            if let Err(err) = bodies.wake(handle, false) {
                tracing::error!(body = %handle, %err, "failed to wake island member");
            }

            for &contact_handle in &edge_contacts {
                let Some(contact) = contacts.get_mut(contact_handle) else {
                    tracing::error!(contact = %contact_handle, body = %handle, "body lists a missing contact");
                    continue;
                };
                if contact.island || !contact.is_solid() {
                    continue;
                }
                let other = contact.other_body(handle);
                let Some(other_body) = bodies.get_mut(other) else {
                    tracing::error!(contact = %contact_handle, body = %other, "contact references a missing body");
                    continue;
                };

                contact.island = true;
                self.contacts.push(contact_handle);

                if !other_body.island {
                    other_body.island = true;
                    self.stack.push(other);
                }
            }

            for &joint_handle in &edge_joints {
                let Some(joint) = joints.get_mut(joint_handle) else {
                    tracing::error!(joint = %joint_handle, body = %handle, "body lists a missing joint");
                    continue;
                };
                if joint.island || !joint.enabled {
                    continue;
                }
                let other = joint.other_body(handle);
                let (Some(this_body), Some(other_body)) = (bodies.get(handle), bodies.get(other)) else {
                    tracing::error!(joint = %joint_handle, body = %other, "joint references a missing body");
                    continue;
                };
                if !this_body.can_collide || !other_body.can_collide {
                    continue;
                }

                joint.island = true;
                self.joints.push(joint_handle);

                if let Some(other_body) = bodies.get_mut(other) {
                    if !other_body.island {
                        other_body.island = true;
                        self.stack.push(other);
                    }
                }
            }

            self.edge_contacts = edge_contacts;
            self.edge_joints = edge_joints;
        }
    }
}
