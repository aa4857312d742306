//! # ALICE-Island-Solver
//!
//! **Island-Partitioned 2D Rigid Body Step**
//!
//! The per-frame core of a 2D rigid-body engine: partitions awake bodies into
//! independent islands, solves each island with warm-started sequential
//! impulses, integrates, corrects positions, and puts quiet islands to sleep.
//!
//! ## Features
//!
//! | Stage | Description |
//! |-------|-------------|
//! | **Island Builder** | Explicit-stack DFS over solid contacts and enabled joints, shared lone island |
//! | **Step Scheduler** | Cost-ordered islands, eager large islands, rayon parallel-for, sequential write-back |
//! | **Velocity Solver** | Sequential impulses with friction, restitution, two-point block solver, joint break reporting |
//! | **Integrator** | Semi-implicit Euler with per-step displacement clamps |
//! | **Position Corrector** | Nonlinear Gauss-Seidel with early exit, Baumgarte as an alternative |
//! | **Sleep Scheduler** | Per-body timers in the lone island, collective sleep elsewhere |
//!
//! ## Design Principles
//!
//! - **Disjoint islands**: no dynamic body is shared between islands, so
//!   islands solve in parallel without locks
//! - **Read-only solve**: island solves write only island-owned buffers;
//!   results are copied back on one thread after the parallel phase
//! - **Closed joint set**: joint kinds are a tagged union, matched per operation
//! - **Explicit inputs**: configuration is passed to every step, events are
//!   returned in a [`StepReport`]
//!
//! ## Quick Start
//!
//! ```rust
//! use alice_island_solver::prelude::*;
//!
//! let mut world = PhysicsWorld::new();
//! let ground = world.add_body(Body::new_static(Vec2::ZERO));
//! let boxed = world.add_body(Body::new_dynamic(Vec2::new(0.0, 1.0), 1.0));
//!
//! // Unit box resting on the ground's top face at y = 0.5
//! let manifold = Manifold::face_a(
//!     Vec2::Y,
//!     Vec2::new(0.0, 0.5),
//!     &[Vec2::new(-0.5, -0.5), Vec2::new(0.5, -0.5)],
//! );
//! world
//!     .add_contact(Contact::new(ContactFixture::new(ground, 0.0), ContactFixture::new(boxed, 0.0), manifold))
//!     .unwrap();
//!
//! let config = SolverConfig::default();
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, false, &config);
//! }
//! let body = world.body(boxed).unwrap();
//! assert!((body.position.y - 1.0).abs() < 0.02);
//! ```
//!
//! ## Joints
//!
//! ```rust
//! use alice_island_solver::prelude::*;
//!
//! let mut world = PhysicsWorld::new();
//! let pivot = world.add_body(Body::new_static(Vec2::ZERO));
//! let bob = world.add_body(Body::new_dynamic(Vec2::new(1.0, 0.0), 1.0));
//!
//! let hinge = Joint::revolute_at(&world.bodies, pivot, bob, Vec2::ZERO).unwrap();
//! world.add_joint(hinge).unwrap();
//!
//! let report = world.step(1.0 / 60.0, false, &SolverConfig::default());
//! assert!(report.broken_joints.is_empty());
//! ```

pub(crate) mod arena;
pub mod body;
pub mod contact;
pub(crate) mod contact_solver;
pub mod error;
pub mod event;
pub mod integrator;
pub mod island;
pub mod joint;
pub mod joint_extra;
pub mod math;
pub mod scheduler;
pub mod sleeping;
pub mod solver;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::body::{Body, BodyHandle, BodySet, BodyType};
    pub use crate::contact::{
        Contact, ContactFeed, ContactFixture, ContactHandle, ContactSet, Manifold, ManifoldPoint,
        ManifoldType, MAX_MANIFOLD_POINTS,
    };
    pub use crate::error::PhysicsError;
    pub use crate::event::{IslandSummary, JointBreakEvent, StepListener, StepReport};
    pub use crate::island::{Island, IslandBuilder, IslandPool};
    pub use crate::joint::{DistanceJoint, Joint, JointHandle, JointKind, JointSet, RevoluteJoint};
    pub use crate::joint_extra::{PrismaticJoint, PulleyJoint, WeldJoint, WheelJoint};
    pub use crate::math::{Rot, Transform2, Vec2};
    pub use crate::scheduler::{Scheduler, INTERNAL_PARALLEL_THRESHOLD};
    pub use crate::sleeping::SleepConfig;
    pub use crate::solver::{Position, SolverConfig, Stabilization, Velocity};
    pub use crate::world::PhysicsWorld;
}

// Re-export main types at crate root
pub use prelude::*;
