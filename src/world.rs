//! Physics World
//!
//! Owns the body, contact and joint sets together with the reusable island
//! storage, and exposes the per-frame `step` entry point.
//!
//! # Step
//!
//! 1. Contact feed: find new contacts, then update manifolds (skipped when
//!    predicting)
//! 2. `before_solve` hook
//! 3. Build islands from the awake bodies
//! 4. Solve islands (scheduler), then write results back sequentially
//! 5. `after_solve` hook
//! 6. Clear accumulated forces (not when predicting)
//!
//! # Example
//!
//! ```
//! use alice_island_solver::prelude::*;
//!
//! let mut world = PhysicsWorld::new();
//! let ground = world.add_body(Body::new_static(Vec2::ZERO));
//! let ball = world.add_body(Body::new_dynamic(Vec2::new(0.0, 1.0), 1.0));
//!
//! let manifold = Manifold::circles(Vec2::ZERO, Vec2::ZERO);
//! let contact = Contact::new(ContactFixture::new(ground, 0.5), ContactFixture::new(ball, 0.5), manifold);
//! world.add_contact(contact).unwrap();
//!
//! let report = world.step(1.0 / 60.0, false, &SolverConfig::default());
//! assert_eq!(report.island_count(), 1);
//! ```

use crate::body::{Body, BodyHandle, BodySet};
use crate::contact::{Contact, ContactFeed, ContactHandle, ContactSet};
use crate::error::PhysicsError;
use crate::event::{StepListener, StepReport};
use crate::island::{Island, IslandBuilder, IslandPool};
use crate::joint::{Joint, JointHandle, JointSet};
use crate::math::Vec2;
use crate::scheduler::{self, Scheduler};
use crate::solver::{SolverConfig, StepContext};

/// Island-based rigid body world
#[derive(Debug, Default)]
pub struct PhysicsWorld {
    /// All bodies
    pub bodies: BodySet,
    /// Contacts of the current frame
    pub contacts: ContactSet,
    /// All joints
    pub joints: JointSet,
    pool: IslandPool,
    builder: IslandBuilder,
    scheduler: Scheduler,
    /// Inverse frame time of the previous step, for warm-start scaling
    inv_dt0: f32,
}

impl PhysicsWorld {
    /// Empty world solving on the global rayon pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty world with a dedicated pool of `threads` workers.
    pub fn with_workers(threads: usize) -> Result<Self, PhysicsError> {
        Ok(Self {
            scheduler: Scheduler::with_workers(threads)?,
            ..Self::default()
        })
    }

    /// Add a body, returns its handle
    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        self.bodies.insert(body)
    }

    /// Remove a body along with every contact and joint attached to it.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        let body = self.bodies.get(handle)?;
        let contacts = body.contacts().to_vec();
        let joints = body.joints().to_vec();
        for contact in contacts {
            self.contacts.remove(&mut self.bodies, contact);
        }
        for joint in joints {
            self.joints.remove(&mut self.bodies, joint);
        }
        self.bodies.remove(handle)
    }

    /// Add a contact between two existing bodies.
    pub fn add_contact(&mut self, contact: Contact) -> Result<ContactHandle, PhysicsError> {
        self.contacts.insert(&mut self.bodies, contact)
    }

    pub fn remove_contact(&mut self, handle: ContactHandle) -> Option<Contact> {
        self.contacts.remove(&mut self.bodies, handle)
    }

    /// Add a joint between two existing bodies.
    pub fn add_joint(&mut self, joint: Joint) -> Result<JointHandle, PhysicsError> {
        self.joints.insert(&mut self.bodies, joint)
    }

    pub fn remove_joint(&mut self, handle: JointHandle) -> Option<Joint> {
        self.joints.remove(&mut self.bodies, handle)
    }

    /// Look up a body, failing on a stale handle.
    pub fn body(&self, handle: BodyHandle) -> Result<&Body, PhysicsError> {
        self.bodies.body(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, PhysicsError> {
        self.bodies.body_mut(handle)
    }

    pub fn joint(&self, handle: JointHandle) -> Result<&Joint, PhysicsError> {
        self.joints.joint(handle)
    }

    /// Wake or sleep a body.
    pub fn set_awake(&mut self, handle: BodyHandle, awake: bool) -> Result<(), PhysicsError> {
        self.bodies.set_awake(handle, awake)
    }

    /// Islands built by the last step that had a positive frame time.
    pub fn islands(&self) -> &[Island] {
        self.pool.islands()
    }

    /// Worker threads available to the parallel phase.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.scheduler.worker_count()
    }

    /// Advance the simulation by `frame_time` with contacts managed by hand.
    pub fn step(&mut self, frame_time: f32, is_prediction: bool, config: &SolverConfig) -> StepReport {
        self.step_with(frame_time, is_prediction, config, &mut (), &mut ())
    }

    /// Advance the simulation by `frame_time`.
    ///
    /// `feed` supplies new contacts and manifold updates; `listener` receives
    /// the before/after hooks and joint-break notifications. An invalid
    /// `config` is logged and the step does nothing.
    pub fn step_with<F, L>(
        &mut self,
        frame_time: f32,
        is_prediction: bool,
        config: &SolverConfig,
        feed: &mut F,
        listener: &mut L,
    ) -> StepReport
    where
        F: ContactFeed + ?Sized,
        L: StepListener + ?Sized,
    {
        let mut report = StepReport {
            frame_time,
            is_prediction,
            ..StepReport::default()
        };
        let config = *config;
        if let Err(err) = config.validate() {
            tracing::warn!(%err, "step skipped");
            return report;
        }

        feed.find_new_contacts(&mut self.bodies, &mut self.contacts);
        if !is_prediction {
            feed.collide(&mut self.bodies, &mut self.contacts);
        }

        listener.before_solve(&mut self.bodies, &mut self.contacts, &mut self.joints, frame_time, is_prediction);

        if frame_time > 0.0 {
            let ctx = StepContext::new(frame_time, self.inv_dt0, is_prediction, config);

            self.pool.begin(config.max_islands);
            self.builder.build(
                &mut self.bodies,
                &mut self.contacts,
                &mut self.joints,
                &mut self.pool,
                is_prediction,
            );

            self.scheduler
                .solve(self.pool.islands_mut(), &self.bodies, &self.contacts, &self.joints, &ctx);

            scheduler::write_back(
                self.pool.islands(),
                &mut self.bodies,
                &mut self.contacts,
                &mut self.joints,
                listener,
                &mut report,
            );
            self.pool.release(&mut self.bodies, &mut self.contacts, &mut self.joints);

            self.inv_dt0 = ctx.inv_dt;
        }

        listener.after_solve(&mut self.bodies, &mut self.contacts, &mut self.joints, &report);

        if !is_prediction && config.auto_clear_forces {
            self.clear_forces();
        }

        tracing::debug!(
            islands = report.islands.len(),
            lone_bodies = report.lone_bodies,
            broken_joints = report.broken_joints.len(),
            slept = report.bodies_put_to_sleep,
            is_prediction,
            "step finished"
        );
        report
    }

    /// Zero accumulated force and torque on every body.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }
}
