//! Step Scheduler
//!
//! Orders islands by cost, solves them, and writes the results back.
//!
//! # Scheduling
//!
//! Islands are sorted by constraint count, most expensive first. Islands
//! above [`INTERNAL_PARALLEL_THRESHOLD`] constraints are solved one after
//! another with their per-body loops spread over the worker pool; the rest
//! go through a rayon parallel-for, one island per task.
//!
//! Islands share no dynamic body and the solve only reads the body, contact
//! and joint sets, so no synchronization is needed while solving. All
//! writes to shared state happen in [`write_back`], single-threaded, after
//! every island is done.

use core::cmp::Reverse;

use crate::body::BodySet;
use crate::contact::ContactSet;
use crate::error::PhysicsError;
use crate::event::{IslandSummary, JointBreakEvent, StepListener, StepReport};
use crate::island::Island;
use crate::joint::JointSet;
use crate::math::Rot;
use crate::solver::{self, StepContext};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Constraint count above which an island is solved with internal
/// parallelism ahead of the parallel-for.
pub const INTERNAL_PARALLEL_THRESHOLD: usize = 32;

/// Island dispatcher, optionally bound to a fixed-size worker pool
#[derive(Debug, Default)]
pub struct Scheduler {
    #[cfg(feature = "parallel")]
    workers: Option<rayon::ThreadPool>,
}

impl Scheduler {
    /// Scheduler on the global rayon pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler on a dedicated pool of `threads` workers.
    ///
    /// Without the `parallel` feature the thread count is ignored and
    /// islands are solved on the calling thread.
    pub fn with_workers(threads: usize) -> Result<Self, PhysicsError> {
        if threads == 0 {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "worker count must be > 0",
            });
        }

        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("island-solver-{i}"))
                .build()
                .map_err(|e| PhysicsError::WorkerPool { message: e.to_string() })?;
            Ok(Self { workers: Some(pool) })
        }
        #[cfg(not(feature = "parallel"))]
        {
            tracing::debug!(threads, "parallel feature disabled, solving on the calling thread");
            Ok(Self {})
        }
    }

    /// Worker threads available to the parallel phase.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            match &self.workers {
                Some(pool) => pool.current_num_threads(),
                None => rayon::current_num_threads(),
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    /// Solve every island in `islands`.
    pub(crate) fn solve(
        &self,
        islands: &mut [Island],
        bodies: &BodySet,
        contacts: &ContactSet,
        joints: &JointSet,
        ctx: &StepContext,
    ) {
        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = &self.workers {
                pool.install(|| solve_ordered(islands, bodies, contacts, joints, ctx));
                return;
            }
        }
        solve_ordered(islands, bodies, contacts, joints, ctx);
    }
}

/// Islands sorted by descending constraint count. Ties keep pool order.
fn by_cost(islands: &mut [Island]) -> Vec<&mut Island> {
    let mut order: Vec<&mut Island> = islands.iter_mut().collect();
    order.sort_by_key(|island| Reverse(island.constraint_count()));
    order
}

fn solve_ordered(islands: &mut [Island], bodies: &BodySet, contacts: &ContactSet, joints: &JointSet, ctx: &StepContext) {
    let mut order = by_cost(islands);
    let split = order.partition_point(|island| island.constraint_count() > INTERNAL_PARALLEL_THRESHOLD);
    let (large, small) = order.split_at_mut(split);

    for island in large.iter_mut() {
        solver::solve_island(island, bodies, contacts, joints, ctx, true);
    }

    #[cfg(feature = "parallel")]
    small
        .par_iter_mut()
        .for_each(|island| solver::solve_island(island, bodies, contacts, joints, ctx, false));

    #[cfg(not(feature = "parallel"))]
    for island in small.iter_mut() {
        solver::solve_island(island, bodies, contacts, joints, ctx, false);
    }
}

/// Copy solved state from the islands into the body, contact and joint sets.
///
/// Runs in pool order on the calling thread. Break events, island
/// summaries and the sleep count are appended to `report`.
pub(crate) fn write_back<L: StepListener + ?Sized>(
    islands: &[Island],
    bodies: &mut BodySet,
    contacts: &mut ContactSet,
    joints: &mut JointSet,
    listener: &mut L,
    report: &mut StepReport,
) {
    for island in islands {
        // Joint warm-start state
        for (handle, copy) in &island.joint_copies {
            if let Some(joint) = joints.get_mut(*handle) {
                joint.kind = copy.kind;
            }
        }

        for &(handle, violation) in &island.broken_joints {
            let Some(joint) = joints.get(handle) else {
                continue;
            };
            let event = JointBreakEvent {
                joint: handle,
                body_a: joint.body_a,
                body_b: joint.body_b,
                violation,
            };
            tracing::debug!(joint = %handle, violation, "joint break threshold exceeded");
            listener.joint_broken(&event);
            report.broken_joints.push(event);
        }

        // Contact warm-start state
        for impulses in &island.contact_impulses {
            let Some(&handle) = island.contacts.get(impulses.contact_index) else {
                continue;
            };
            if let Some(contact) = contacts.get_mut(handle) {
                let count = impulses.point_count.min(contact.manifold.point_count);
                for (k, point) in contact.manifold.points[..count].iter_mut().enumerate() {
                    point.normal_impulse = impulses.normal[k];
                    point.tangent_impulse = impulses.tangent[k];
                }
            }
        }

        // Body state
        for (slot, &handle) in island.bodies.iter().enumerate() {
            let Some(body) = bodies.get_mut(handle) else {
                continue;
            };
            if body.is_static() {
                continue;
            }
            let (p, v) = (island.positions[slot], island.velocities[slot]);
            if !(p.c.is_finite() && p.a.is_finite() && v.v.is_finite() && v.w.is_finite()) {
                tracing::warn!(body = %handle, island = island.index, "non-finite solver result, body left unchanged");
                continue;
            }
            body.position = p.c - Rot::new(p.a).rotate(body.local_center);
            body.angle = p.a;
            body.linear_velocity = v.v;
            body.angular_velocity = v.w;
        }

        // Sleep
        if island.sleep_evaluated {
            for (slot, &handle) in island.bodies.iter().enumerate() {
                let Some(body) = bodies.get_mut(handle) else {
                    continue;
                };
                if body.is_static() {
                    continue;
                }
                body.sleep_time = island.sleep_times[slot];
                if island.sleep_flags[slot] && bodies.set_awake(handle, false).is_ok() {
                    report.bodies_put_to_sleep += 1;
                }
            }
        }

        if island.lone {
            debug_assert!(island.contacts.is_empty() && island.joints.is_empty());
            report.lone_bodies = island.bodies.len();
        }
        report.islands.push(IslandSummary {
            index: island.index,
            lone: island.lone,
            bodies: island.bodies.len(),
            contacts: island.contacts.len(),
            joints: island.joints.len(),
            position_solved: island.position_solved,
        });
    }
}
