//! # Movement Predictor
//!
//! Deterministic, tick-stepped horizontal kinematics used as the allowed
//! upper bound for the speed check.
//!
//! ## Per Tick
//!
//! ```text
//! v = v * friction
//! v = v + direction * accel        (ground or air)
//! |v| > cap ? v = v * cap / |v|    (cap = base, or base * sprint)
//! distance += |v|
//! ```
//!
//! The result over-approximates what the real physics allows, so legitimate
//! input noise stays under it.

use warden_core::math::facing_direction;
use warden_core::Vec3;

use crate::entity::MAX_TICK_GAP;
use crate::sample::MovementSample;

/// Horizontal deltas shorter than this do not define a direction.
const DIRECTION_EPSILON: f32 = 1.0e-4;

/// Physics constants for one prediction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredictorParams {
    /// Speed cap per tick while walking.
    pub max_base_speed: f32,
    /// Cap multiplier while sprinting.
    pub sprint_multiplier: f32,
    /// Acceleration per tick on the ground.
    pub ground_accel: f32,
    /// Acceleration per tick in the air.
    pub air_accel: f32,
    /// Velocity retained per tick.
    pub friction: f32,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            max_base_speed: 0.45,
            sprint_multiplier: 1.30,
            ground_accel: 0.10,
            air_accel: 0.02,
            friction: 0.91,
        }
    }
}

/// Stateless movement simulator.
#[derive(Clone, Copy, Debug, Default)]
pub struct MovementPredictor;

impl MovementPredictor {
    /// Predicted horizontal distance for `sample`, starting from
    /// `previous_velocity`.
    #[must_use]
    pub fn predict(
        &self,
        sample: &MovementSample,
        previous_velocity: Vec3,
        params: &PredictorParams,
    ) -> f32 {
        self.simulate(sample, previous_velocity, params, |_| {})
    }

    /// Same as [`predict`](Self::predict), also pushing each simulated
    /// tick's speed onto `trace`.
    pub fn predict_traced(
        &self,
        sample: &MovementSample,
        previous_velocity: Vec3,
        params: &PredictorParams,
        trace: &mut Vec<f32>,
    ) -> f32 {
        self.simulate(sample, previous_velocity, params, |speed| trace.push(speed))
    }

    fn simulate(
        &self,
        sample: &MovementSample,
        previous_velocity: Vec3,
        params: &PredictorParams,
        mut on_tick: impl FnMut(f32),
    ) -> f32 {
        let steps = sample.dt_ticks.clamp(1, MAX_TICK_GAP);
        let direction = Self::direction(sample);
        let accel = if sample.on_ground {
            params.ground_accel
        } else {
            params.air_accel
        };
        let cap = if sample.sprinting {
            params.max_base_speed * params.sprint_multiplier
        } else {
            params.max_base_speed
        };

        let mut vx = previous_velocity.x;
        let mut vz = previous_velocity.z;
        let mut distance = 0.0;

        for _ in 0..steps {
            vx = vx * params.friction + direction.x * accel;
            vz = vz * params.friction + direction.z * accel;

            let mut speed = vx.hypot(vz);
            if speed > cap {
                let scale = cap / speed;
                vx *= scale;
                vz *= scale;
                speed = cap;
            }

            distance += speed;
            on_tick(speed);
        }

        distance
    }

    fn direction(sample: &MovementSample) -> Vec3 {
        let horizontal = Vec3::new(sample.delta.x, 0.0, sample.delta.z);
        if horizontal.length() > DIRECTION_EPSILON {
            horizontal.normalized()
        } else {
            facing_direction(sample.yaw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walking_params() -> PredictorParams {
        PredictorParams {
            max_base_speed: 0.45,
            sprint_multiplier: 1.3,
            ground_accel: 0.1,
            air_accel: 0.02,
            friction: 0.91,
        }
    }

    fn sample_along_z(dt_ticks: i32, distance: f32) -> MovementSample {
        MovementSample {
            dt_ticks,
            delta: Vec3::new(0.0, 0.0, distance),
            on_ground: true,
            ..MovementSample::default()
        }
    }

    #[test]
    fn test_single_tick_from_rest() {
        let predicted = MovementPredictor.predict(
            &sample_along_z(1, 0.1),
            Vec3::ZERO,
            &walking_params(),
        );
        assert!((predicted - 0.1).abs() < 1e-6, "got {predicted}");
    }

    #[test]
    fn test_is_pure() {
        let sample = MovementSample {
            dt_ticks: 4,
            delta: Vec3::new(0.3, 0.1, -0.2),
            yaw: 37.0,
            sprinting: true,
            ..MovementSample::default()
        };
        let velocity = Vec3::new(0.2, 0.0, 0.1);
        let a = MovementPredictor.predict(&sample, velocity, &walking_params());
        let b = MovementPredictor.predict(&sample, velocity, &walking_params());
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_clamps_to_cap() {
        let predicted = MovementPredictor.predict(
            &sample_along_z(1, 5.0),
            Vec3::new(0.0, 0.0, 0.45),
            &walking_params(),
        );
        assert!((predicted - 0.45).abs() < 1e-6, "got {predicted}");
    }

    #[test]
    fn test_sprint_raises_cap() {
        let mut sample = sample_along_z(1, 5.0);
        sample.sprinting = true;
        let predicted =
            MovementPredictor.predict(&sample, Vec3::new(0.0, 0.0, 0.6), &walking_params());
        assert!((predicted - 0.45 * 1.3).abs() < 1e-6, "got {predicted}");
    }

    #[test]
    fn test_steps_are_clamped() {
        let params = walking_params();
        let max = MovementPredictor.predict(&sample_along_z(10, 1.0), Vec3::ZERO, &params);
        let over = MovementPredictor.predict(&sample_along_z(400, 1.0), Vec3::ZERO, &params);
        let zero = MovementPredictor.predict(&sample_along_z(0, 1.0), Vec3::ZERO, &params);
        let one = MovementPredictor.predict(&sample_along_z(1, 1.0), Vec3::ZERO, &params);

        assert_eq!(max.to_bits(), over.to_bits());
        assert_eq!(zero.to_bits(), one.to_bits());
    }

    #[test]
    fn test_uses_yaw_without_displacement() {
        let sample = MovementSample {
            dt_ticks: 1,
            yaw: 90.0,
            on_ground: true,
            ..MovementSample::default()
        };
        let mut trace = Vec::new();
        let predicted =
            MovementPredictor.predict_traced(&sample, Vec3::ZERO, &walking_params(), &mut trace);
        assert!((predicted - 0.1).abs() < 1e-6);
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn test_air_accel() {
        let mut sample = sample_along_z(3, 0.1);
        sample.on_ground = false;
        let mut trace = Vec::new();
        let predicted =
            MovementPredictor.predict_traced(&sample, Vec3::ZERO, &walking_params(), &mut trace);

        assert_eq!(trace.len(), 3);
        let sum: f32 = trace.iter().sum();
        assert!((sum - predicted).abs() < 1e-6);
        assert!((trace[0] - 0.02).abs() < 1e-6);
    }
}
