//! Sleep Scheduler
//!
//! Puts low-energy bodies to sleep after the island solve.
//!
//! # Sleeping
//!
//! A body is idle while its solved velocities stay under both tolerances.
//! Idle time accumulates per body and resets whenever the body moves again
//! or is not allowed to sleep.
//!
//! # Islands
//!
//! Bodies in the lone island share no constraints, so each one sleeps on its
//! own timer. Bodies in a connected island sleep together: the island sleeps
//! only when its least-idle non-static body has been idle for
//! `time_to_sleep`. Either way, an island whose position correction did not
//! converge this step stays awake.

use crate::body::BodySet;
use crate::error::PhysicsError;
use crate::island::Island;

/// Configuration for the sleep scheduler
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SleepConfig {
    /// Master switch; when off, sleep timers are left untouched
    pub enabled: bool,
    /// Linear speed below which a body counts as idle (m/s)
    pub linear_tolerance: f32,
    /// Angular speed below which a body counts as idle (rad/s)
    pub angular_tolerance: f32,
    /// Idle time before a body (or island) is put to sleep (s)
    pub time_to_sleep: f32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            linear_tolerance: 0.01,
            angular_tolerance: 2.0_f32.to_radians(),
            time_to_sleep: 0.5,
        }
    }
}

impl SleepConfig {
    /// Reject negative tolerances and a non-positive sleep delay.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.linear_tolerance >= 0.0) || !(self.angular_tolerance >= 0.0) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "sleep tolerances must be >= 0",
            });
        }
        if !(self.time_to_sleep > 0.0) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "time_to_sleep must be > 0",
            });
        }
        Ok(())
    }

    #[inline]
    fn is_idle(&self, linear_speed_sq: f32, angular_speed: f32) -> bool {
        linear_speed_sq <= self.linear_tolerance * self.linear_tolerance
            && angular_speed * angular_speed <= self.angular_tolerance * self.angular_tolerance
    }
}

/// Update sleep timers for a solved island and flag bodies to put to sleep.
///
/// Results land in `island.sleep_times` / `island.sleep_flags`, one entry per
/// island slot; bodies are only touched during write-back.
pub(crate) fn evaluate_island(island: &mut Island, bodies: &BodySet, config: &SleepConfig, dt: f32) {
    let count = island.bodies.len();
    island.sleep_times.clear();
    island.sleep_times.resize(count, 0.0);
    island.sleep_flags.clear();
    island.sleep_flags.resize(count, false);

    if !config.enabled {
        return;
    }

    let mut min_sleep_time = f32::MAX;
    for (slot, &handle) in island.bodies.iter().enumerate() {
        let Some(body) = bodies.get(handle) else {
            continue;
        };
        island.sleep_times[slot] = body.sleep_time;
        if body.is_static() {
            continue;
        }

        let velocity = island.velocities[slot];
        let sleep_time = if !body.sleeping_allowed || !config.is_idle(velocity.v.length_squared(), velocity.w) {
            0.0
        } else {
            body.sleep_time + dt
        };
        island.sleep_times[slot] = sleep_time;

        if island.lone {
            island.sleep_flags[slot] = island.position_solved && sleep_time >= config.time_to_sleep;
        } else {
            min_sleep_time = min_sleep_time.min(sleep_time);
        }
    }

    if !island.lone && island.position_solved && min_sleep_time >= config.time_to_sleep {
        for (slot, &handle) in island.bodies.iter().enumerate() {
            island.sleep_flags[slot] = bodies.get(handle).is_some_and(|b| !b.is_static());
        }
    }

    island.sleep_evaluated = true;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::math::Vec2;
    use crate::solver::Velocity;

    const DT: f32 = 0.1;

    fn island_of(bodies: &mut BodySet, specs: &[(Body, Velocity)], lone: bool) -> Island {
        let mut island = Island::new(if lone { 0 } else { 1 }, lone);
        for (body, velocity) in specs {
            let handle = bodies.insert(body.clone());
            island.bodies.push(handle);
            island.velocities.push(*velocity);
        }
        island.position_solved = true;
        island
    }

    fn still() -> Velocity {
        Velocity::default()
    }

    fn moving() -> Velocity {
        Velocity {
            v: Vec2::new(1.0, 0.0),
            w: 0.0,
        }
    }

    #[test]
    fn test_default_config_valid() {
        assert!(SleepConfig::default().validate().is_ok());
        let bad = SleepConfig {
            time_to_sleep: 0.0,
            ..SleepConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_lone_bodies_sleep_independently() {
        let mut bodies = BodySet::new();
        let mut island = island_of(
            &mut bodies,
            &[
                (Body::new_dynamic(Vec2::ZERO, 1.0), still()),
                (Body::new_dynamic(Vec2::X, 1.0), moving()),
            ],
            true,
        );
        if let Some(body) = bodies.get_mut(island.bodies[0]) {
            body.sleep_time = 0.45;
        }

        evaluate_island(&mut island, &bodies, &SleepConfig::default(), DT);
        assert!(island.sleep_evaluated);
        assert_eq!(island.sleep_flags, vec![true, false]);
        assert!((island.sleep_times[0] - 0.55).abs() < 1e-6);
        assert_eq!(island.sleep_times[1], 0.0);
    }

    #[test]
    fn test_island_sleeps_on_minimum() {
        let mut bodies = BodySet::new();
        let mut island = island_of(
            &mut bodies,
            &[
                (Body::new_dynamic(Vec2::ZERO, 1.0), still()),
                (Body::new_dynamic(Vec2::X, 1.0), still()),
            ],
            false,
        );
        let config = SleepConfig::default();
        if let Some(body) = bodies.get_mut(island.bodies[0]) {
            body.sleep_time = 0.45;
        }
        evaluate_island(&mut island, &bodies, &config, DT);
        // Second body has only 0.1s idle
        assert_eq!(island.sleep_flags, vec![false, false]);

        for handle in island.bodies.clone() {
            if let Some(body) = bodies.get_mut(handle) {
                body.sleep_time = 0.45;
            }
        }
        evaluate_island(&mut island, &bodies, &config, DT);
        assert_eq!(island.sleep_flags, vec![true, true]);
    }

    #[test]
    fn test_fast_body_keeps_island_awake() {
        let mut bodies = BodySet::new();
        let mut island = island_of(
            &mut bodies,
            &[
                (Body::new_dynamic(Vec2::ZERO, 1.0), still()),
                (Body::new_dynamic(Vec2::X, 1.0), moving()),
            ],
            false,
        );
        for handle in island.bodies.clone() {
            if let Some(body) = bodies.get_mut(handle) {
                body.sleep_time = 10.0;
            }
        }
        evaluate_island(&mut island, &bodies, &SleepConfig::default(), DT);
        assert_eq!(island.sleep_flags, vec![false, false]);
        assert_eq!(island.sleep_times[1], 0.0);
    }

    #[test]
    fn test_static_bodies_ignored() {
        let mut bodies = BodySet::new();
        let mut island = island_of(
            &mut bodies,
            &[
                (Body::new_static(Vec2::ZERO), still()),
                (Body::new_dynamic(Vec2::Y, 1.0), still()),
            ],
            false,
        );
        if let Some(body) = bodies.get_mut(island.bodies[1]) {
            body.sleep_time = 0.5;
        }
        evaluate_island(&mut island, &bodies, &SleepConfig::default(), DT);
        assert_eq!(island.sleep_flags, vec![false, true]);
    }

    #[test]
    fn test_unsolved_positions_block_sleep() {
        let mut bodies = BodySet::new();
        let mut island = island_of(&mut bodies, &[(Body::new_dynamic(Vec2::ZERO, 1.0), still())], true);
        island.position_solved = false;
        if let Some(body) = bodies.get_mut(island.bodies[0]) {
            body.sleep_time = 5.0;
        }
        evaluate_island(&mut island, &bodies, &SleepConfig::default(), DT);
        assert_eq!(island.sleep_flags, vec![false]);
        // Timer still advances
        assert!((island.sleep_times[0] - 5.1).abs() < 1e-5);
    }

    #[test]
    fn test_sleeping_disallowed_resets_timer() {
        let mut bodies = BodySet::new();
        let mut body = Body::new_dynamic(Vec2::ZERO, 1.0);
        body.sleeping_allowed = false;
        let mut island = island_of(&mut bodies, &[(body, still())], true);
        if let Some(body) = bodies.get_mut(island.bodies[0]) {
            body.sleep_time = 5.0;
        }
        evaluate_island(&mut island, &bodies, &SleepConfig::default(), DT);
        assert_eq!(island.sleep_times, vec![0.0]);
        assert_eq!(island.sleep_flags, vec![false]);
    }

    #[test]
    fn test_disabled_leaves_timers() {
        let mut bodies = BodySet::new();
        let mut island = island_of(&mut bodies, &[(Body::new_dynamic(Vec2::ZERO, 1.0), still())], true);
        let config = SleepConfig {
            enabled: false,
            ..SleepConfig::default()
        };
        evaluate_island(&mut island, &bodies, &config, DT);
        assert!(!island.sleep_evaluated);
        assert_eq!(island.sleep_flags, vec![false]);
    }
}
