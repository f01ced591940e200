//! Packet cadence and protocol state.

use super::{record, CheckContext, CheckId, Verdict};
use crate::config::BadPacketsConfig;
use crate::entity::EntityState;
use crate::sample::PacketSample;

/// Flags packet floods and interactions that are invalid while sleeping.
#[derive(Clone, Debug)]
pub struct PacketCheck {
    pub(super) enabled: bool,
    max_packets_per_second: u32,
    sleep_interact_grace: u32,
}

impl PacketCheck {
    /// Builds the check from its section.
    #[must_use]
    pub fn from_config(config: &BadPacketsConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_packets_per_second: config.max_packets_per_second,
            sleep_interact_grace: config.sleep_interact_grace,
        }
    }

    /// Configured packet rate cap.
    #[inline]
    #[must_use]
    pub const fn max_packets_per_second(&self) -> u32 {
        self.max_packets_per_second
    }

    /// Deviation for one observation.
    #[must_use]
    pub fn deviation(&self, sample: &PacketSample) -> f64 {
        let mut value = f64::from(sample.packets_per_second.saturating_sub(self.max_packets_per_second));
        if sample.action_while_sleeping {
            value += f64::from(self.sleep_interact_grace);
        }
        value
    }

    pub(super) fn handle(
        &self,
        sample: &PacketSample,
        state: &EntityState,
        ctx: &mut CheckContext<'_>,
    ) -> Verdict {
        let deviation = self.deviation(sample);

        #[allow(clippy::cast_precision_loss)]
        let rate = sample.packets_per_second as f32;
        let mut evidence = ctx.worker.vectors.acquire();
        evidence.extend_from_slice(&[rate, if sample.action_while_sleeping { 1.0 } else { 0.0 }]);

        record(CheckId::BadPackets, deviation, evidence, state, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{quick_state, RecordingHook};
    use crate::worker::WorkerContext;

    #[test]
    fn test_deviation() {
        let check = PacketCheck::from_config(&BadPacketsConfig::default());

        let calm = PacketSample {
            packets_per_second: 40,
            action_while_sleeping: false,
        };
        assert!(check.deviation(&calm).abs() < f64::EPSILON);

        let flood = PacketSample {
            packets_per_second: 150,
            action_while_sleeping: false,
        };
        assert!((check.deviation(&flood) - 30.0).abs() < f64::EPSILON);

        let sleepy = PacketSample {
            packets_per_second: 150,
            action_while_sleeping: true,
        };
        assert!((check.deviation(&sleepy) - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sleep_interactions_flag() {
        let check = PacketCheck::from_config(&BadPacketsConfig::default());
        let state = quick_state();
        let hook = RecordingHook::default();
        let mut worker = WorkerContext::default();
        let mut ctx = CheckContext {
            worker: &mut worker,
            hook: &hook,
            verbose: false,
        };

        for _ in 0..100 {
            assert_eq!(check.handle(&PacketSample::default(), &state, &mut ctx), Verdict::Clean);
        }

        let sleepy = PacketSample {
            packets_per_second: 0,
            action_while_sleeping: true,
        };
        let mut last = Verdict::Skipped;
        for _ in 0..5 {
            last = check.handle(&sleepy, &state, &mut ctx);
        }
        assert_eq!(last, Verdict::Flagged { total: 1 });
    }
}
