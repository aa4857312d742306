#![no_main]
use alice_island_solver::{Body, Contact, ContactFixture, Joint, Manifold, PhysicsWorld, RevoluteJoint, SolverConfig, Vec2};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Body positions (i16 to keep values reasonable)
    positions: Vec<(i16, i16)>,
    /// Mass numerator, 0 makes the body static
    masses: Vec<u8>,
    /// Circle contacts between body indices
    contacts: Vec<(u8, u8)>,
    /// Revolute joints between body indices
    joints: Vec<(u8, u8)>,
    /// Joint break thresholds
    break_forces: Vec<u16>,
    /// Frame time in milliseconds, 0 skips the solve
    frame_ms: u8,
    /// Number of simulation steps (capped)
    step_count: u8,
    predict: bool,
}

// Build a random scene and step it.
// Must never panic regardless of input.
fuzz_target!(|input: FuzzInput| {
    let mut world = PhysicsWorld::new();

    let mut handles = Vec::new();
    for (i, &(x, y)) in input.positions.iter().take(32).enumerate() {
        let position = Vec2::new(f32::from(x) * 0.1, f32::from(y) * 0.1);
        let mass = input.masses.get(i).copied().unwrap_or(1);
        let body = if mass == 0 {
            Body::new_static(position)
        } else {
            Body::new_dynamic(position, f32::from(mass)).with_predict(input.predict)
        };
        handles.push(world.add_body(body));
    }
    if handles.is_empty() {
        return;
    }
    let pick = |i: u8| handles[usize::from(i) % handles.len()];

    for &(a, b) in input.contacts.iter().take(64) {
        let contact = Contact::new(
            ContactFixture::new(pick(a), 0.5),
            ContactFixture::new(pick(b), 0.5),
            Manifold::circles(Vec2::ZERO, Vec2::ZERO),
        );
        let _ = world.add_contact(contact);
    }
    for (k, &(a, b)) in input.joints.iter().take(32).enumerate() {
        let mut joint = Joint::new(pick(a), pick(b), RevoluteJoint::new(Vec2::ZERO, Vec2::ZERO));
        if let Some(&force) = input.break_forces.get(k) {
            joint = joint.with_break_force(f32::from(force));
        }
        // Self-joints and static pairs are rejected
        let _ = world.add_joint(joint);
    }

    let config = SolverConfig::default();
    let dt = f32::from(input.frame_ms) / 1000.0;
    let steps = usize::from(input.step_count).min(32);
    for _ in 0..steps {
        let report = world.step(dt, input.predict, &config);
        assert!(report.broken_joints.len() <= world.joints.len());
    }
});
