//! Integration tests for ALICE-Island-Solver
//!
//! End-to-end behaviour of the island step through the public API
//! re-exported from the crate root: partitioning, solving, clamping,
//! joint-break reporting and sleeping.

use std::collections::HashSet;

use alice_island_solver::{
    Body, BodyHandle, BodySet, Contact, ContactFeed, ContactFixture, ContactHandle, ContactSet, Joint, JointHandle,
    Manifold, PhysicsWorld, RevoluteJoint, SleepConfig, SolverConfig, Stabilization, Vec2,
};
use approx::{assert_abs_diff_eq, assert_relative_eq};

const DT: f32 = 1.0 / 60.0;

// ============================================================================
// Helpers
// ============================================================================

/// Route solver logs to the test output, filtered by `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn zero_gravity() -> SolverConfig {
    SolverConfig {
        gravity: Vec2::ZERO,
        ..SolverConfig::default()
    }
}

/// Touching circle contact between two bodies.
fn touch(world: &mut PhysicsWorld, a: BodyHandle, b: BodyHandle) -> ContactHandle {
    let contact = Contact::new(
        ContactFixture::new(a, 0.5),
        ContactFixture::new(b, 0.5),
        Manifold::circles(Vec2::ZERO, Vec2::ZERO),
    );
    world.add_contact(contact).expect("bodies exist")
}

/// Static ground with its top face at y = 0 and a unit box resting on it.
fn resting_box(world: &mut PhysicsWorld) -> (BodyHandle, BodyHandle, ContactHandle) {
    let ground = world.add_body(Body::new_static(Vec2::ZERO));
    let boxed = world.add_body(Body::new_dynamic(Vec2::new(0.0, 0.5), 1.0));
    let manifold = Manifold::face_a(
        Vec2::Y,
        Vec2::ZERO,
        &[Vec2::new(-0.5, -0.5), Vec2::new(0.5, -0.5)],
    );
    let contact = Contact::new(ContactFixture::new(ground, 0.0), ContactFixture::new(boxed, 0.0), manifold);
    let handle = world.add_contact(contact).expect("bodies exist");
    (ground, boxed, handle)
}

// ============================================================================
// Partitioning
// ============================================================================

#[test]
fn test_partition_covers_exactly_the_simulated_bodies() {
    init_tracing();
    let mut world = PhysicsWorld::new();
    let ground = world.add_body(Body::new_static(Vec2::ZERO));

    // Contact group resting on the ground
    let a = world.add_body(Body::new_dynamic(Vec2::new(0.0, 1.0), 1.0));
    let b = world.add_body(Body::new_dynamic(Vec2::new(0.0, 2.0), 1.0));
    touch(&mut world, ground, a);
    touch(&mut world, a, b);

    // Jointed pair
    let c = world.add_body(Body::new_dynamic(Vec2::new(10.0, 0.0), 1.0));
    let d = world.add_body(Body::new_dynamic(Vec2::new(11.0, 0.0), 1.0));
    world
        .add_joint(Joint::new(c, d, RevoluteJoint::new(Vec2::new(0.5, 0.0), Vec2::new(-0.5, 0.0))))
        .expect("valid joint");

    // Loners, one of them paused and one not collidable
    let e = world.add_body(Body::new_dynamic(Vec2::new(20.0, 0.0), 1.0));
    let f = world.add_body(Body::new_dynamic(Vec2::new(30.0, 0.0), 1.0));
    let paused = world.add_body(Body::new_dynamic(Vec2::new(40.0, 0.0), 1.0));
    world.body_mut(paused).expect("body exists").paused = true;
    let ghost = world.add_body(Body::new_dynamic(Vec2::new(50.0, 0.0), 1.0));
    world.body_mut(ghost).expect("body exists").can_collide = false;

    // Second static with its own dynamic neighbour
    let ledge = world.add_body(Body::new_static(Vec2::new(60.0, 0.0)));
    let g = world.add_body(Body::new_dynamic(Vec2::new(60.0, 1.0), 1.0));
    touch(&mut world, ledge, g);

    let expected: HashSet<BodyHandle> = [a, b, c, d, e, f, g].into_iter().collect();

    let report = world.step(DT, false, &SolverConfig::default());
    assert_eq!(report.island_count(), world.islands().len());

    let mut seen = Vec::new();
    for island in world.islands() {
        for &h in island.bodies() {
            if !world.body(h).expect("body exists").is_static() {
                seen.push(h);
            }
        }
    }
    let unique: HashSet<BodyHandle> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "a dynamic body landed in two islands");
    assert_eq!(unique, expected);

    // Lone island holds exactly the unconnected bodies
    let lone = world.islands().iter().find(|i| i.is_lone()).expect("lone island");
    let lone_set: HashSet<BodyHandle> = lone.bodies().iter().copied().collect();
    assert_eq!(lone_set, [e, f].into_iter().collect());
    assert_eq!(report.lone_bodies, 2);
}

#[test]
fn test_contacts_and_joints_are_disjoint_across_islands() {
    let mut world = PhysicsWorld::new();
    let ground = world.add_body(Body::new_static(Vec2::ZERO));
    let mut bodies = Vec::new();
    for i in 0..6 {
        let body = world.add_body(Body::new_dynamic(Vec2::new(i as f32 * 3.0, 1.0), 1.0));
        touch(&mut world, ground, body);
        bodies.push(body);
    }
    // Link pairs with joints: (0,1), (2,3), (4,5)
    for pair in bodies.chunks(2) {
        world
            .add_joint(Joint::new(pair[0], pair[1], RevoluteJoint::new(Vec2::ZERO, Vec2::ZERO)))
            .expect("valid joint");
    }

    world.step(DT, false, &SolverConfig::default());
    // Ground is static, so each jointed pair is its own island
    assert_eq!(world.islands().len(), 3);

    let mut contacts: Vec<ContactHandle> = Vec::new();
    let mut joints: Vec<JointHandle> = Vec::new();
    for island in world.islands() {
        contacts.extend_from_slice(island.contacts());
        joints.extend_from_slice(island.joints());
    }
    let unique_contacts: HashSet<_> = contacts.iter().collect();
    let unique_joints: HashSet<_> = joints.iter().collect();
    assert_eq!(unique_contacts.len(), contacts.len());
    assert_eq!(unique_joints.len(), joints.len());
    assert_eq!(contacts.len(), 6);
    assert_eq!(joints.len(), 3);
}

#[test]
fn test_sensor_contact_never_merges_islands() {
    let mut world = PhysicsWorld::new();
    let a = world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0));
    let b = world.add_body(Body::new_dynamic(Vec2::X, 1.0));
    let sensor = Contact::new(
        ContactFixture::sensor(a),
        ContactFixture::new(b, 0.5),
        Manifold::circles(Vec2::ZERO, Vec2::ZERO),
    );
    let handle = world.add_contact(sensor).expect("bodies exist");

    let report = world.step(DT, false, &zero_gravity());
    assert_eq!(report.island_count(), 1);
    assert_eq!(report.lone_bodies, 2);
    assert!(world.islands().iter().all(|i| !i.contacts().contains(&handle)));
}

// ============================================================================
// Solving
// ============================================================================

#[test]
fn test_normal_impulses_never_negative() {
    let mut world = PhysicsWorld::new();
    let (_, boxed, _) = resting_box(&mut world);
    // Second box stacked on the first
    let top = world.add_body(Body::new_dynamic(Vec2::new(0.0, 1.5), 1.0));
    let manifold = Manifold::face_a(
        Vec2::Y,
        Vec2::new(0.0, 0.5),
        &[Vec2::new(-0.5, -0.5), Vec2::new(0.5, -0.5)],
    );
    world
        .add_contact(Contact::new(ContactFixture::new(boxed, 0.0), ContactFixture::new(top, 0.0), manifold))
        .expect("bodies exist");
    // Pull the top box upwards hard enough to separate
    world.body_mut(top).expect("body exists").linear_velocity = Vec2::new(0.3, 4.0);

    let config = SolverConfig::default();
    for _ in 0..5 {
        world.step(DT, false, &config);
        for (_, contact) in world.contacts.iter() {
            for point in contact.manifold.active_points() {
                assert!(point.normal_impulse >= 0.0, "negative normal impulse {}", point.normal_impulse);
            }
        }
    }
}

#[test]
fn test_resting_box_converges_in_one_step() {
    let mut world = PhysicsWorld::new();
    let (_, boxed, contact) = resting_box(&mut world);

    let report = world.step(DT, false, &SolverConfig::default());
    assert_eq!(report.island_count(), 1);
    assert!(report.all_positions_solved());

    let body = world.body(boxed).expect("body exists");
    assert_abs_diff_eq!(body.position.y, 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(body.linear_velocity.y, 0.0, epsilon = 1e-3);

    // Impulse persisted for warm starting: total supports m * g * dt
    let manifold = world.contacts.get(contact).expect("contact exists").manifold;
    let total: f32 = manifold.active_points().iter().map(|p| p.normal_impulse).sum();
    assert_relative_eq!(total, 10.0 * DT, max_relative = 1e-3);
}

#[test]
fn test_resting_box_with_baumgarte() {
    let mut world = PhysicsWorld::new();
    let (_, boxed, _) = resting_box(&mut world);
    let config = SolverConfig {
        stabilization: Stabilization::Baumgarte,
        ..SolverConfig::default()
    };
    for _ in 0..30 {
        let report = world.step(DT, false, &config);
        assert!(report.all_positions_solved());
    }
    assert_abs_diff_eq!(world.body(boxed).expect("body exists").position.y, 0.5, epsilon = 0.01);
}

#[test]
fn test_large_island_uses_internal_parallel_path() {
    init_tracing();
    let mut world = PhysicsWorld::new();
    let ground = world.add_body(Body::new_static(Vec2::ZERO));
    let mut row = Vec::new();
    for i in 0..40 {
        let ball = world.add_body(Body::new_dynamic(Vec2::new(i as f32, 1.0), 1.0));
        // Ground contact: circle of radius 0.5 on a face at y = 0.5
        let manifold = Manifold::face_a(Vec2::Y, Vec2::new(i as f32, 0.5), &[Vec2::ZERO]);
        world
            .add_contact(Contact::new(ContactFixture::new(ground, 0.0), ContactFixture::new(ball, 0.5), manifold))
            .expect("bodies exist");
        if let Some(&prev) = row.last() {
            touch(&mut world, prev, ball);
        }
        row.push(ball);
    }

    let config = SolverConfig::default();
    for _ in 0..30 {
        world.step(DT, false, &config);
    }
    let island = &world.islands()[0];
    assert!(island.constraint_count() > alice_island_solver::INTERNAL_PARALLEL_THRESHOLD);
    for &ball in &row {
        let y = world.body(ball).expect("body exists").position.y;
        assert_abs_diff_eq!(y, 1.0, epsilon = 0.02);
    }
}

#[test]
fn test_worker_count_does_not_change_results() {
    fn simulate(threads: usize) -> Vec<(Vec2, f32)> {
        let mut world = PhysicsWorld::with_workers(threads).expect("pool builds");
        let ground = world.add_body(Body::new_static(Vec2::ZERO));
        let mut handles = Vec::new();
        for i in 0..12 {
            let x = i as f32 * 4.0;
            let a = world.add_body(Body::new_dynamic(Vec2::new(x, 0.6), 1.0).with_velocity(Vec2::new(0.5, 0.0), 0.1));
            let b = world.add_body(Body::new_dynamic(Vec2::new(x, 1.6), 1.0));
            touch(&mut world, ground, a);
            touch(&mut world, a, b);
            handles.extend([a, b]);
        }
        let config = SolverConfig::default();
        for _ in 0..20 {
            world.step(DT, false, &config);
        }
        handles
            .iter()
            .map(|&h| {
                let body = world.body(h).expect("body exists");
                (body.position, body.angle)
            })
            .collect()
    }

    assert_eq!(simulate(1), simulate(4));
}

// ============================================================================
// Integration limits
// ============================================================================

#[test]
fn test_velocity_clamp_limits_displacement() {
    let mut world = PhysicsWorld::new();
    let config = zero_gravity();
    let fast = world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0).with_velocity(Vec2::new(600.0, 800.0), 0.0));

    world.step(DT, false, &config);
    let body = world.body(fast).expect("body exists");
    assert_relative_eq!(body.position.length(), config.max_linear_velocity * DT, max_relative = 1e-5);
    assert_relative_eq!(body.position.x / body.position.y, 0.75, max_relative = 1e-5);
    assert_relative_eq!(body.linear_velocity.length(), config.max_linear_velocity, max_relative = 1e-5);
}

#[test]
fn test_angular_clamp() {
    let mut world = PhysicsWorld::new();
    let config = zero_gravity();
    let spinner = world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0).with_velocity(Vec2::ZERO, -1000.0));

    world.step(DT, false, &config);
    let body = world.body(spinner).expect("body exists");
    assert_relative_eq!(body.angle, -config.max_angular_velocity * DT, max_relative = 1e-5);
}

// ============================================================================
// Joint breaking
// ============================================================================

#[test]
fn test_overloaded_joint_reported_once() {
    init_tracing();
    let mut world = PhysicsWorld::new();
    let pivot = world.add_body(Body::new_static(Vec2::ZERO));
    let weak_bob = world.add_body(Body::new_dynamic(Vec2::new(0.0, -1.0), 1.0));
    let strong_bob = world.add_body(Body::new_dynamic(Vec2::new(5.0, -1.0), 1.0));
    let strong_pivot = world.add_body(Body::new_static(Vec2::new(5.0, 0.0)));

    let weak = Joint::revolute_at(&world.bodies, pivot, weak_bob, Vec2::ZERO)
        .expect("bodies exist")
        .with_break_force(2.0);
    let weak = world.add_joint(weak).expect("valid joint");
    let strong = Joint::revolute_at(&world.bodies, strong_pivot, strong_bob, Vec2::new(5.0, 0.0))
        .expect("bodies exist")
        .with_break_force(1000.0);
    let strong = world.add_joint(strong).expect("valid joint");

    let report = world.step(DT, false, &SolverConfig::default());
    let breaks: Vec<_> = report.broken_joints.iter().filter(|e| e.joint == weak).collect();
    assert_eq!(breaks.len(), 1);
    assert!(breaks[0].violation > 2.0);
    assert_eq!((breaks[0].body_a, breaks[0].body_b), (pivot, weak_bob));
    assert!(report.broken(strong).is_none());

    // Reported, not removed: the joint still holds the bob
    assert!(world.joint(weak).is_ok());
    let bob = world.body(weak_bob).expect("body exists");
    assert_abs_diff_eq!(bob.position.y, -1.0, epsilon = 1e-3);
}

// ============================================================================
// Sleeping
// ============================================================================

/// Three touching bodies in a row, no gravity.
fn chain(world: &mut PhysicsWorld) -> [BodyHandle; 3] {
    let a = world.add_body(Body::new_dynamic(Vec2::new(0.0, 0.0), 1.0));
    let b = world.add_body(Body::new_dynamic(Vec2::new(1.0, 0.0), 1.0));
    let c = world.add_body(Body::new_dynamic(Vec2::new(2.0, 0.0), 1.0));
    touch(world, a, b);
    touch(world, b, c);
    [a, b, c]
}

fn quick_sleep() -> SolverConfig {
    SolverConfig {
        gravity: Vec2::ZERO,
        sleep: SleepConfig {
            time_to_sleep: 9.5 * DT,
            ..SleepConfig::default()
        },
        ..SolverConfig::default()
    }
}

#[test]
fn test_chain_sleeps_together() {
    let mut world = PhysicsWorld::new();
    let bodies = chain(&mut world);
    let config = quick_sleep();

    for _ in 0..9 {
        world.step(DT, false, &config);
    }
    assert!(bodies.iter().all(|&h| world.body(h).expect("body exists").is_awake()));

    let report = world.step(DT, false, &config);
    assert_eq!(report.bodies_put_to_sleep, 3);
    assert!(bodies.iter().all(|&h| !world.body(h).expect("body exists").is_awake()));
}

#[test]
fn test_fast_member_keeps_chain_awake() {
    let mut world = PhysicsWorld::new();
    let [a, b, c] = chain(&mut world);
    let config = quick_sleep();

    for _ in 0..9 {
        world.step(DT, false, &config);
    }
    // Body A has been quiet all along; B moves on frame 10
    world.body_mut(b).expect("body exists").apply_linear_impulse(Vec2::new(0.0, 1.0));
    let report = world.step(DT, false, &config);

    assert_eq!(report.bodies_put_to_sleep, 0);
    for h in [a, b, c] {
        assert!(world.body(h).expect("body exists").is_awake());
    }
    assert_eq!(world.body(b).expect("body exists").sleep_time(), 0.0);
    assert!(world.body(a).expect("body exists").sleep_time() >= config.sleep.time_to_sleep);
}

#[test]
fn test_lone_bodies_sleep_independently() {
    let mut world = PhysicsWorld::new();
    let config = zero_gravity();
    let resting = world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0));
    let moving = world.add_body(Body::new_dynamic(Vec2::new(10.0, 0.0), 1.0).with_velocity(Vec2::X, 0.0));

    let mut slept_at = None;
    for frame in 0..60 {
        world.step(DT, false, &config);
        if slept_at.is_none() && !world.body(resting).expect("body exists").is_awake() {
            slept_at = Some(frame);
            // Same step: the moving body is still simulated
            assert!(world.body(moving).expect("body exists").is_awake());
        }
    }
    assert!(slept_at.is_some());
    assert!(world.body(moving).expect("body exists").is_awake());
}

#[test]
fn test_prediction_does_not_accumulate_sleep() {
    let mut world = PhysicsWorld::new();
    let config = quick_sleep();
    let body = world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0).with_predict(true));
    let skipped = world.add_body(Body::new_dynamic(Vec2::X * 5.0, 1.0).with_velocity(Vec2::X, 0.0));

    for _ in 0..20 {
        world.step(DT, true, &config);
    }
    let predicted = world.body(body).expect("body exists");
    assert!(predicted.is_awake());
    assert_eq!(predicted.sleep_time(), 0.0);
    // Bodies without the predict flag are not simulated during prediction
    assert_eq!(world.body(skipped).expect("body exists").position, Vec2::X * 5.0);
}

#[test]
fn test_contact_wakes_sleeping_neighbour() {
    let mut world = PhysicsWorld::new();
    let config = zero_gravity();
    let sleeper = world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0));
    let mover = world.add_body(Body::new_dynamic(Vec2::X, 1.0).with_velocity(Vec2::new(-1.0, 0.0), 0.0));
    world.set_awake(sleeper, false).expect("body exists");
    touch(&mut world, mover, sleeper);

    world.step(DT, false, &config);
    let body = world.body(sleeper).expect("body exists");
    assert!(body.is_awake());
    assert!(body.linear_velocity.x < 0.0);
}

// ============================================================================
// Warm starting
// ============================================================================

fn never_sleep() -> SolverConfig {
    SolverConfig {
        sleep: SleepConfig {
            enabled: false,
            ..SleepConfig::default()
        },
        ..SolverConfig::default()
    }
}

/// Two unit boxes stacked on the ground, settled at 1/60 s.
fn settled_tower(world: &mut PhysicsWorld) -> (ContactHandle, [BodyHandle; 2]) {
    let (_, lower, ground_contact) = resting_box(world);
    let upper = world.add_body(Body::new_dynamic(Vec2::new(0.0, 1.5), 1.0));
    let manifold = Manifold::face_a(
        Vec2::Y,
        Vec2::new(0.0, 0.5),
        &[Vec2::new(-0.5, -0.5), Vec2::new(0.5, -0.5)],
    );
    world
        .add_contact(Contact::new(ContactFixture::new(lower, 0.0), ContactFixture::new(upper, 0.0), manifold))
        .expect("bodies exist");
    let config = never_sleep();
    for _ in 0..60 {
        world.step(DT, false, &config);
    }
    (ground_contact, [lower, upper])
}

fn max_vertical_speed(world: &PhysicsWorld, bodies: &[BodyHandle]) -> f32 {
    bodies
        .iter()
        .map(|&h| world.body(h).expect("body exists").linear_velocity.y.abs())
        .fold(0.0, f32::max)
}

#[test]
fn test_warm_start_carries_tower_through_single_iteration() {
    let single = |warm_starting| SolverConfig {
        velocity_iterations: 1,
        warm_starting,
        ..never_sleep()
    };

    let mut warm = PhysicsWorld::new();
    let (_, tower) = settled_tower(&mut warm);
    warm.step(DT, false, &single(true));
    assert!(max_vertical_speed(&warm, &tower) < 0.01);

    // Cold: one Gauss-Seidel pass cannot balance both contacts
    let mut cold = PhysicsWorld::new();
    let (_, tower) = settled_tower(&mut cold);
    cold.step(DT, false, &single(false));
    assert!(max_vertical_speed(&cold, &tower) > 0.05);
}

#[test]
fn test_warm_start_scales_with_frame_time_change() {
    let mut world = PhysicsWorld::new();
    let (ground_contact, tower) = settled_tower(&mut world);
    let config = SolverConfig {
        velocity_iterations: 1,
        ..never_sleep()
    };

    // Doubling the frame time doubles the seeded impulses, which balance
    // gravity over the longer step on their own
    let dt = 2.0 * DT;
    world.step(dt, false, &config);
    assert!(max_vertical_speed(&world, &tower) < 0.01);

    let manifold = world.contacts.get(ground_contact).expect("contact exists").manifold;
    let total: f32 = manifold.active_points().iter().map(|p| p.normal_impulse).sum();
    assert_relative_eq!(total, 2.0 * 10.0 * dt, max_relative = 2e-2);
}

#[test]
fn test_oversized_manifold_count_is_clamped() {
    let mut world = PhysicsWorld::new();
    let (_, boxed, contact) = resting_box(&mut world);
    world.contacts.get_mut(contact).expect("contact exists").manifold.point_count = 7;

    let report = world.step(DT, false, &SolverConfig::default());
    assert!(report.all_positions_solved());
    assert_abs_diff_eq!(world.body(boxed).expect("body exists").position.y, 0.5, epsilon = 1e-3);
}

// ============================================================================
// Collision feed
// ============================================================================

#[derive(Default)]
struct CountingFeed {
    searches: usize,
    narrowphase: usize,
}

impl ContactFeed for CountingFeed {
    fn find_new_contacts(&mut self, _bodies: &mut BodySet, _contacts: &mut ContactSet) {
        self.searches += 1;
    }

    fn collide(&mut self, _bodies: &mut BodySet, _contacts: &mut ContactSet) {
        self.narrowphase += 1;
    }
}

#[test]
fn test_prediction_searches_but_skips_narrowphase() {
    let mut world = PhysicsWorld::new();
    world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0).with_predict(true));
    let config = SolverConfig::default();
    let mut feed = CountingFeed::default();

    for _ in 0..3 {
        world.step_with(DT, true, &config, &mut feed, &mut ());
    }
    assert_eq!(feed.searches, 3);
    assert_eq!(feed.narrowphase, 0);

    world.step_with(DT, false, &config, &mut feed, &mut ());
    assert_eq!(feed.searches, 4);
    assert_eq!(feed.narrowphase, 1);
}

// ============================================================================
// Joint reach
// ============================================================================

#[test]
fn test_paused_body_still_holds_its_hinge() {
    let mut world = PhysicsWorld::new();
    let config = zero_gravity();
    let anchor = world.add_body(Body::new_dynamic(Vec2::ZERO, 1.0));
    world.body_mut(anchor).expect("body exists").paused = true;
    let swinging = world.add_body(Body::new_dynamic(Vec2::X, 1.0).with_velocity(Vec2::new(0.0, -2.0), 0.0));
    let hinge = Joint::revolute_at(&world.bodies, anchor, swinging, Vec2::ZERO).expect("bodies exist");
    world.add_joint(hinge).expect("valid joint");

    for _ in 0..30 {
        world.step(DT, false, &config);
        let island = world.islands().iter().find(|i| !i.is_lone()).expect("jointed island");
        assert!(island.bodies().contains(&anchor) && island.bodies().contains(&swinging));
    }

    let a = world.body(anchor).expect("body exists");
    let b = world.body(swinging).expect("body exists");
    let pin_a = a.transform().apply(Vec2::ZERO);
    let pin_b = b.transform().apply(Vec2::new(-1.0, 0.0));
    assert_abs_diff_eq!(pin_a.distance(pin_b), 0.0, epsilon = 0.01);
}
