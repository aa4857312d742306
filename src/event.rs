//! Step Events
//!
//! Joint-break events and island statistics collected during `step()` and
//! returned to the caller in a [`StepReport`], plus the [`StepListener`]
//! hooks fired around the solve.

use crate::body::{BodyHandle, BodySet};
use crate::contact::ContactSet;
use crate::joint::{JointHandle, JointSet};

/// A joint whose reaction exceeded its break threshold this step.
///
/// The joint is not removed; detaching it is up to the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointBreakEvent {
    pub joint: JointHandle,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Largest reaction force (or torque) magnitude seen during the solve
    pub violation: f32,
}

/// Per-island statistics of a step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IslandSummary {
    pub index: u32,
    pub lone: bool,
    pub bodies: usize,
    pub contacts: usize,
    pub joints: usize,
    pub position_solved: bool,
}

/// What happened during one step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    pub frame_time: f32,
    pub is_prediction: bool,
    /// One entry per broken joint, in island order
    pub broken_joints: Vec<JointBreakEvent>,
    /// Islands solved this step, lone island included when it held bodies
    pub islands: Vec<IslandSummary>,
    /// Bodies in the lone island
    pub lone_bodies: usize,
    /// Bodies transitioned to sleep at the end of the step
    pub bodies_put_to_sleep: usize,
}

impl StepReport {
    /// Number of islands solved.
    #[inline]
    #[must_use]
    pub fn island_count(&self) -> usize {
        self.islands.len()
    }

    /// Whether every island's position phase converged.
    #[must_use]
    pub fn all_positions_solved(&self) -> bool {
        self.islands.iter().all(|i| i.position_solved)
    }

    /// Break event for `joint`, if it broke this step.
    #[must_use]
    pub fn broken(&self, joint: JointHandle) -> Option<&JointBreakEvent> {
        self.broken_joints.iter().find(|e| e.joint == joint)
    }
}

/// Hooks fired by `PhysicsWorld::step_with`.
///
/// All methods default to no-ops. `before_solve` runs after contacts were
/// updated and before islands are built; `after_solve` runs after
/// write-back, before forces are cleared.
pub trait StepListener {
    fn before_solve(&mut self, _bodies: &mut BodySet, _contacts: &mut ContactSet, _joints: &mut JointSet, _frame_time: f32, _is_prediction: bool) {}

    /// Called once per broken joint during write-back.
    fn joint_broken(&mut self, _event: &JointBreakEvent) {}

    fn after_solve(&mut self, _bodies: &mut BodySet, _contacts: &mut ContactSet, _joints: &mut JointSet, _report: &StepReport) {}
}

impl StepListener for () {}
