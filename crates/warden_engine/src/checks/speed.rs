//! Horizontal speed against the movement predictor.

use super::{record, CheckContext, CheckId, Verdict};
use crate::config::SpeedConfig;
use crate::entity::EntityState;
use crate::predictor::{MovementPredictor, PredictorParams};
use crate::sample::MovementSample;

/// Allowance per millisecond of ping.
const PING_ALLOWANCE: f32 = 0.0006;

/// Flat allowance for rounding in client positions.
const EPSILON_ALLOWANCE: f32 = 0.02;

/// Flags movement that covers more ground than the predictor allows.
#[derive(Clone, Debug)]
pub struct SpeedCheck {
    pub(super) enabled: bool,
    params: PredictorParams,
    predictor: MovementPredictor,
}

impl SpeedCheck {
    /// Builds the check from its section.
    #[must_use]
    pub fn from_config(config: &SpeedConfig) -> Self {
        Self {
            enabled: config.enabled,
            params: config.predictor_params(),
            predictor: MovementPredictor,
        }
    }

    /// Physics used for the bound.
    #[must_use]
    pub const fn params(&self) -> &PredictorParams {
        &self.params
    }

    pub(super) fn handle(
        &self,
        sample: &MovementSample,
        state: &EntityState,
        ctx: &mut CheckContext<'_>,
    ) -> Verdict {
        if sample.dt_ticks <= 0 || sample.flying {
            return Verdict::Skipped;
        }

        let previous_velocity = state.snapshot_velocity();
        let mut trace = ctx.worker.vectors.acquire();
        let predicted =
            self.predictor
                .predict_traced(sample, previous_velocity, &self.params, &mut trace);

        #[allow(clippy::cast_precision_loss)]
        let allowed = predicted + sample.ping as f32 * PING_ALLOWANCE + EPSILON_ALLOWANCE;
        let excess = (sample.horizontal_distance() - allowed).max(0.0);

        record(CheckId::Speed, f64::from(excess), trace, state, ctx)
    }
}

#[cfg(test)]
mod tests {
    use warden_core::Vec3;

    use super::*;
    use crate::checks::test_support::{quick_state, RecordingHook};
    use crate::worker::WorkerContext;

    fn walk(distance: f32) -> MovementSample {
        MovementSample {
            dt_ticks: 1,
            delta: Vec3::new(0.0, 0.0, distance),
            on_ground: true,
            ..MovementSample::default()
        }
    }

    #[test]
    fn test_skips_flying_and_bad_dt() {
        let check = SpeedCheck::from_config(&SpeedConfig::default());
        let state = quick_state();
        let hook = RecordingHook::default();
        let mut worker = WorkerContext::default();
        let mut ctx = CheckContext {
            worker: &mut worker,
            hook: &hook,
            verbose: false,
        };

        let mut flying = walk(10.0);
        flying.flying = true;
        assert_eq!(check.handle(&flying, &state, &mut ctx), Verdict::Skipped);

        let mut stale = walk(10.0);
        stale.dt_ticks = 0;
        assert_eq!(check.handle(&stale, &state, &mut ctx), Verdict::Skipped);

        assert_eq!(state.buffer_count(CheckId::Speed), 0);
    }

    #[test]
    fn test_flags_sustained_speed() {
        let check = SpeedCheck::from_config(&SpeedConfig::default());
        let state = quick_state();
        let hook = RecordingHook::default();
        let mut worker = WorkerContext::default();
        let mut ctx = CheckContext {
            worker: &mut worker,
            hook: &hook,
            verbose: false,
        };
        state.update_velocity(Vec3::new(0.0, 0.0, 0.45));

        for _ in 0..100 {
            assert_eq!(check.handle(&walk(0.45), &state, &mut ctx), Verdict::Clean);
        }

        let verdicts: Vec<Verdict> = (0..5)
            .map(|_| check.handle(&walk(5.0), &state, &mut ctx))
            .collect();
        assert!(verdicts[..4].iter().all(|v| *v == Verdict::Clean));
        assert_eq!(verdicts[4], Verdict::Flagged { total: 1 });
        assert_eq!(state.violations(CheckId::Speed), 1);
    }

    #[test]
    fn test_ping_widens_bound() {
        let check = SpeedCheck::from_config(&SpeedConfig::default());
        let state = quick_state();
        let hook = RecordingHook::default();
        let mut worker = WorkerContext::default();
        let mut ctx = CheckContext {
            worker: &mut worker,
            hook: &hook,
            verbose: false,
        };
        state.update_velocity(Vec3::new(0.0, 0.0, 0.45));

        for _ in 0..10 {
            check.handle(&walk(0.45), &state, &mut ctx);
        }
        // 1000 ms of ping allows an extra 0.6 blocks
        let mut laggy = walk(1.0);
        laggy.ping = 1000;
        for _ in 0..10 {
            assert_eq!(check.handle(&laggy, &state, &mut ctx), Verdict::Clean);
        }
        assert!(state.buffer_level(CheckId::Speed) < f64::EPSILON);
    }
}
