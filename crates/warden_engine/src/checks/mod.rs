//! # Cheat Detection Checks
//!
//! Four checks, each turning one sample into one deviation value for the
//! entity's matching anomaly buffer.
//!
//! ## Detection Methods
//!
//! - **Speed**: horizontal distance beyond the predictor's bound
//! - **Fly**: vertical rate beyond gravity and drag while airborne
//! - **Reach**: distance, aim alignment and hitbox ray test on interactions
//! - **Bad packets**: packet rate over the cap, interactions while sleeping
//!
//! ## Routing
//!
//! ```text
//! Movement ──► Speed ──► Fly
//! Combat   ──► Reach
//! Packet   ──► BadPackets
//! ```
//!
//! A flagged buffer adds one to the entity's ledger. Every fifth violation
//! of a check is handed to the escalation hook.

mod fly;
mod packet;
mod reach;
mod speed;

pub use fly::FlyCheck;
pub use packet::PacketCheck;
pub use reach::ReachCheck;
pub use speed::SpeedCheck;

use tracing::debug;

use crate::config::EngineConfig;
use crate::entity::EntityState;
use crate::escalation::{is_escalation_point, EscalationHook};
use crate::sample::Sample;
use crate::worker::WorkerContext;

/// Check categories. Each owns one anomaly buffer and one ledger entry per
/// entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CheckId {
    /// Horizontal speed.
    #[default]
    Speed = 0,
    /// Vertical motion.
    Fly = 1,
    /// Combat reach and aim.
    Reach = 2,
    /// Packet cadence and protocol state.
    BadPackets = 3,
}

impl CheckId {
    /// Number of categories.
    pub const COUNT: usize = 4;

    /// Every category, in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Speed, Self::Fly, Self::Reach, Self::BadPackets];

    /// Slot in per-entity arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Ledger name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Fly => "fly",
            Self::Reach => "reach",
            Self::BadPackets => "bad_packets",
        }
    }
}

/// Outcome of one check on one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verdict {
    /// The check did not apply (disabled, wrong sample kind, guard failed).
    #[default]
    Skipped,
    /// A value was fed and the buffer did not flag.
    Clean,
    /// The buffer flagged; the ledger now holds `total`.
    Flagged {
        /// New cumulative total for the check.
        total: u32,
    },
}

impl Verdict {
    /// Whether the buffer flagged.
    #[inline]
    #[must_use]
    pub const fn is_flagged(self) -> bool {
        matches!(self, Self::Flagged { .. })
    }
}

/// Everything a check may touch besides the entity.
pub struct CheckContext<'a> {
    /// Calling worker's pools.
    pub worker: &'a mut WorkerContext,
    /// Escalation receiver.
    pub hook: &'a dyn EscalationHook,
    /// Log every evaluated sample.
    pub verbose: bool,
}

/// One configured check.
#[derive(Clone, Debug)]
pub enum Check {
    /// Horizontal speed.
    Speed(SpeedCheck),
    /// Vertical motion.
    Fly(FlyCheck),
    /// Combat reach.
    Reach(ReachCheck),
    /// Packet cadence.
    BadPackets(PacketCheck),
}

impl Check {
    /// Category.
    #[must_use]
    pub const fn id(&self) -> CheckId {
        match self {
            Self::Speed(_) => CheckId::Speed,
            Self::Fly(_) => CheckId::Fly,
            Self::Reach(_) => CheckId::Reach,
            Self::BadPackets(_) => CheckId::BadPackets,
        }
    }

    /// Whether the check runs at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        match self {
            Self::Speed(c) => c.enabled,
            Self::Fly(c) => c.enabled,
            Self::Reach(c) => c.enabled,
            Self::BadPackets(c) => c.enabled,
        }
    }

    /// Evaluates `sample` if this check consumes its kind.
    ///
    /// A disabled check returns before reading or writing any state.
    pub fn handle(&self, sample: &Sample, state: &EntityState, ctx: &mut CheckContext<'_>) -> Verdict {
        if !self.is_enabled() {
            return Verdict::Skipped;
        }
        match (self, sample) {
            (Self::Speed(check), Sample::Movement(movement)) => check.handle(movement, state, ctx),
            (Self::Fly(check), Sample::Movement(movement)) => check.handle(movement, state, ctx),
            (Self::Reach(check), Sample::Combat(combat)) => check.handle(combat, state, ctx),
            (Self::BadPackets(check), Sample::Packet(packet)) => check.handle(packet, state, ctx),
            _ => Verdict::Skipped,
        }
    }
}

/// The four checks, in [`CheckId`] order.
#[derive(Clone, Debug)]
pub struct CheckSet {
    checks: [Check; CheckId::COUNT],
}

impl CheckSet {
    /// Builds every check from configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            checks: [
                Check::Speed(SpeedCheck::from_config(&config.checks.speed)),
                Check::Fly(FlyCheck::from_config(&config.checks.fly, &config.checks.speed)),
                Check::Reach(ReachCheck::from_config(&config.checks.reach)),
                Check::BadPackets(PacketCheck::from_config(&config.checks.bad_packets)),
            ],
        }
    }

    /// Check for one category.
    #[must_use]
    pub fn get(&self, id: CheckId) -> &Check {
        &self.checks[id.index()]
    }

    /// Runs every check against `sample`. Speed runs before Fly.
    pub fn run(
        &self,
        sample: &Sample,
        state: &EntityState,
        ctx: &mut CheckContext<'_>,
    ) -> [Verdict; CheckId::COUNT] {
        let mut verdicts = [Verdict::Skipped; CheckId::COUNT];
        for (verdict, check) in verdicts.iter_mut().zip(&self.checks) {
            *verdict = check.handle(sample, state, ctx);
        }
        verdicts
    }
}

impl Default for CheckSet {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Feeds `deviation` into the entity's buffer for `check` and handles a
/// flag. `evidence` is returned to the worker's pool either way.
pub(crate) fn record(
    check: CheckId,
    deviation: f64,
    evidence: Vec<f32>,
    state: &EntityState,
    ctx: &mut CheckContext<'_>,
) -> Verdict {
    let flagged = state.sample_buffer(check, deviation);

    if ctx.verbose {
        debug!(
            entity = %state.key(),
            check = check.as_str(),
            deviation,
            level = state.buffer_level(check),
            flagged,
            "check evaluated"
        );
    }

    if !flagged {
        ctx.worker.vectors.release(evidence);
        return Verdict::Clean;
    }

    let total = state.add_violation(check, 1);
    debug!(
        entity = %state.key(),
        check = check.as_str(),
        deviation,
        level = state.buffer_level(check),
        total,
        "check flagged"
    );

    if is_escalation_point(total) {
        let mut report = ctx.worker.reports.acquire();
        report.key = state.key();
        report.check = check;
        report.total = total;
        report.deviation = deviation;
        report.evidence.extend_from_slice(&evidence);

        ctx.hook.on_escalation(&report);
        ctx.worker.reports.release(report);
    }

    ctx.worker.vectors.release(evidence);
    Verdict::Flagged { total }
}
