//! Combat reach and aim.
//!
//! ```text
//!            look ray
//!   eye ●─────────────────────►  ┌──────┐
//!        ╲                       │target│ + margin
//!         ╲  to_target           │  ●   │
//!          ╲─────────────────────┤center│
//!                                └──────┘
//! ```
//!
//! Three penalties add up: distance past the ping-compensated reach, aim
//! alignment below the dot threshold, and a look ray that misses the
//! expanded hitbox.

use warden_core::math::look_direction;
use warden_core::Aabb;

use super::{record, CheckContext, CheckId, Verdict};
use crate::config::ReachConfig;
use crate::entity::EntityState;
use crate::sample::CombatSample;

/// Eye-to-target distances below this are not evaluated.
const MIN_DISTANCE: f32 = 0.05;

/// Extra reach per millisecond of ping.
const PING_ALLOWANCE: f32 = 0.002;

/// How far past the allowed reach the look ray is traced.
const RAY_SLACK: f32 = 0.3;

/// Penalty for a look ray that misses the hitbox.
const MISS_PENALTY: f32 = 0.15;

/// Flags interactions that are too far away or not aimed at the target.
#[derive(Clone, Debug)]
pub struct ReachCheck {
    pub(super) enabled: bool,
    max_reach: f32,
    hitbox_margin: f32,
    aim_dot_threshold: f32,
}

impl ReachCheck {
    /// Builds the check from its section.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_config(config: &ReachConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_reach: config.max_reach as f32,
            hitbox_margin: config.hitbox_margin as f32,
            aim_dot_threshold: config.aim_dot_threshold as f32,
        }
    }

    /// Deviation for one interaction, or `None` when the eye sits on the
    /// target center. Returns `(excess, distance, dot, hit)`.
    #[must_use]
    pub fn evaluate(&self, sample: &CombatSample) -> Option<(f32, f32, f32, bool)> {
        let to_target = sample.target_center() - sample.eye;
        let distance = to_target.length();
        if distance < MIN_DISTANCE {
            return None;
        }

        let look = look_direction(sample.yaw, sample.pitch);
        let dot = look.dot(to_target * (1.0 / distance));

        #[allow(clippy::cast_precision_loss)]
        let max_reach = self.max_reach + sample.ping as f32 * PING_ALLOWANCE;
        let hitbox = Aabb::from_feet(sample.target_position, sample.target_width, sample.target_height)
            .expanded(self.hitbox_margin);
        let hit = hitbox.intersects_ray(sample.eye, look, max_reach + RAY_SLACK);

        let mut excess = (distance - max_reach).max(0.0);
        if dot < self.aim_dot_threshold {
            excess += self.aim_dot_threshold - dot;
        }
        if !hit {
            excess += MISS_PENALTY;
        }

        Some((excess, distance, dot, hit))
    }

    pub(super) fn handle(
        &self,
        sample: &CombatSample,
        state: &EntityState,
        ctx: &mut CheckContext<'_>,
    ) -> Verdict {
        let Some((excess, distance, dot, hit)) = self.evaluate(sample) else {
            return Verdict::Skipped;
        };

        let mut evidence = ctx.worker.vectors.acquire();
        evidence.extend_from_slice(&[distance, dot, if hit { 1.0 } else { 0.0 }]);

        record(CheckId::Reach, f64::from(excess), evidence, state, ctx)
    }
}

#[cfg(test)]
mod tests {
    use warden_core::Vec3;

    use super::*;
    use crate::checks::test_support::{quick_state, RecordingHook};
    use crate::worker::WorkerContext;

    fn check() -> ReachCheck {
        ReachCheck::from_config(&ReachConfig::default())
    }

    /// Attacker at the origin looking along +Z at a target `distance` away.
    fn swing(distance: f32) -> CombatSample {
        CombatSample {
            target_position: Vec3::new(0.0, 0.62, distance),
            target_width: 0.6,
            target_height: 2.0,
            eye: Vec3::new(0.0, 1.62, 0.0),
            ..CombatSample::default()
        }
    }

    #[test]
    fn test_legit_hit_has_no_excess() {
        let (excess, distance, dot, hit) = check().evaluate(&swing(3.0)).unwrap();
        assert!(excess.abs() < 1e-6);
        assert!((distance - 3.0).abs() < 1e-5);
        assert!((dot - 1.0).abs() < 1e-5);
        assert!(hit);
    }

    #[test]
    fn test_long_reach() {
        // Target center 5 blocks away: 1.6 past reach, ray misses
        let (excess, _, _, hit) = check().evaluate(&swing(5.0)).unwrap();
        assert!(!hit);
        assert!((excess - (1.6 + 0.15)).abs() < 1e-4, "got {excess}");
    }

    #[test]
    fn test_ping_compensation() {
        let mut sample = swing(3.9);
        sample.ping = 250;
        let (excess, _, _, hit) = check().evaluate(&sample).unwrap();
        assert!(hit);
        assert!(excess.abs() < 1e-6);
    }

    #[test]
    fn test_looking_away() {
        let mut sample = swing(2.0);
        sample.yaw = 180.0;
        let (excess, _, dot, hit) = check().evaluate(&sample).unwrap();
        assert!(!hit);
        assert!((dot + 1.0).abs() < 1e-5);
        assert!((excess - (0.6 + 1.0 + 0.15)).abs() < 1e-4, "got {excess}");
    }

    #[test]
    fn test_zero_distance_is_skipped() {
        let check = check();
        let state = quick_state();
        let hook = RecordingHook::default();
        let mut worker = WorkerContext::default();
        let mut ctx = CheckContext {
            worker: &mut worker,
            hook: &hook,
            verbose: false,
        };

        let mut sample = swing(0.0);
        sample.eye = sample.target_center();
        assert!(check.evaluate(&sample).is_none());
        assert_eq!(check.handle(&sample, &state, &mut ctx), Verdict::Skipped);
        assert_eq!(state.buffer_count(CheckId::Reach), 0);
    }

    #[test]
    fn test_feeds_buffer() {
        let check = check();
        let state = quick_state();
        let hook = RecordingHook::default();
        let mut worker = WorkerContext::default();
        let mut ctx = CheckContext {
            worker: &mut worker,
            hook: &hook,
            verbose: false,
        };

        assert_eq!(check.handle(&swing(3.0), &state, &mut ctx), Verdict::Clean);
        assert_eq!(state.buffer_count(CheckId::Reach), 1);
    }
}
