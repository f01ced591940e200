//! # Escalation
//!
//! Boundary to the external mitigation policy.
//!
//! Every fifth cumulative violation of a check produces a
//! [`ViolationReport`] that is handed to an [`EscalationHook`]. The engine
//! itself never kicks, bans or otherwise acts on an entity.

use tracing::warn;
use warden_core::Poolable;

use crate::checks::CheckId;
use crate::config::PunishmentConfig;
use crate::entity::EntityKey;

/// Violations between two escalations of the same check.
pub const ESCALATION_INTERVAL: u32 = 5;

/// What the hook is told about a violation.
///
/// Reports are pooled per worker. The hook sees a borrow that is only valid
/// for the duration of the call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViolationReport {
    /// Offending entity.
    pub key: EntityKey,
    /// Check that flagged.
    pub check: CheckId,
    /// New cumulative total for the check.
    pub total: u32,
    /// Deviation value that triggered the flag.
    pub deviation: f64,
    /// Check-specific detail.
    ///
    /// - speed: predicted speed per simulated tick
    /// - fly: actual rate, expected rate
    /// - reach: distance, aim dot, box hit (1 or 0)
    /// - bad packets: packets per second, sleeping (1 or 0)
    pub evidence: Vec<f32>,
}

impl Poolable for ViolationReport {
    fn reset(&mut self) {
        self.key = EntityKey::default();
        self.check = CheckId::default();
        self.total = 0;
        self.deviation = 0.0;
        self.evidence.clear();
    }
}

/// Receives escalations. Called from worker threads.
pub trait EscalationHook: Send + Sync {
    /// Called on every [`ESCALATION_INTERVAL`]th violation of a check.
    fn on_escalation(&self, report: &ViolationReport);
}

/// Returns whether a ledger total lands on an escalation point.
#[inline]
#[must_use]
pub const fn is_escalation_point(total: u32) -> bool {
    total > 0 && total % ESCALATION_INTERVAL == 0
}

/// Default hook: logs and takes no action.
#[derive(Clone, Debug, Default)]
pub struct LogEscalation {
    policy: PunishmentConfig,
}

impl LogEscalation {
    /// Creates a hook that reports the configured policy alongside each
    /// escalation.
    #[must_use]
    pub fn new(policy: PunishmentConfig) -> Self {
        Self { policy }
    }
}

impl EscalationHook for LogEscalation {
    fn on_escalation(&self, report: &ViolationReport) {
        warn!(
            entity = %report.key,
            check = report.check.as_str(),
            total = report.total,
            deviation = report.deviation,
            alert = report.total >= self.policy.alert_level,
            over_limit = report.total >= self.policy.max_vl,
            action = %self.policy.action,
            "violation escalated"
        );
    }
}
