//! Vertical motion while airborne.

use super::{record, CheckContext, CheckId, Verdict};
use crate::config::{FlyConfig, SpeedConfig};
use crate::entity::EntityState;
use crate::sample::MovementSample;

/// Flags airborne entities rising faster than gravity and drag allow.
#[derive(Clone, Debug)]
pub struct FlyCheck {
    pub(super) enabled: bool,
    tolerance: f32,
    gravity: f32,
    drag: f32,
}

impl FlyCheck {
    /// Builds the check. Gravity and drag come from the shared movement
    /// physics in the speed section.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_config(config: &FlyConfig, physics: &SpeedConfig) -> Self {
        Self {
            enabled: config.enabled,
            tolerance: config.vertical_tolerance as f32,
            gravity: physics.gravity as f32,
            drag: physics.drag as f32,
        }
    }

    /// Expected vertical velocity one tick after `previous`.
    #[inline]
    #[must_use]
    pub fn expected_rate(&self, previous: f32) -> f32 {
        (previous - self.gravity) * self.drag
    }

    pub(super) fn handle(
        &self,
        sample: &MovementSample,
        state: &EntityState,
        ctx: &mut CheckContext<'_>,
    ) -> Verdict {
        if sample.dt_ticks <= 0 || sample.on_ground || sample.flying || sample.gliding {
            return Verdict::Skipped;
        }

        #[allow(clippy::cast_precision_loss)]
        let actual = sample.delta.y / sample.dt_ticks as f32;
        let expected = self.expected_rate(state.snapshot_velocity().y);
        let excess = (actual - expected - self.tolerance).max(0.0);

        let mut evidence = ctx.worker.vectors.acquire();
        evidence.extend_from_slice(&[actual, expected]);

        record(CheckId::Fly, f64::from(excess), evidence, state, ctx)
    }
}
