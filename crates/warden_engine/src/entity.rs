//! # Per-Entity State
//!
//! Everything the engine knows about one connected entity.
//!
//! ## Concurrency
//!
//! Striping already serializes every hot-path mutation of one entity onto a
//! single stripe. The guards here are fine-grained and per field:
//!
//! ```text
//! position  ── Mutex   (read-modify-write as one step, no torn reads)
//! velocity  ── Mutex
//! rotation  ── Mutex
//! flags     ── AtomicU8 bitset
//! ledger    ── [AtomicU32; 4]
//! buffers   ── [Mutex<AnomalyBuffer>; 4]
//! ```
//!
//! They exist for the ingestion threads (which update position and flags
//! before a sample reaches its stripe) and for out-of-band snapshot reads.

use std::fmt;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use siphasher::sip128::{Hasher128, SipHasher24};
use warden_core::{AnomalyBuffer, BufferSettings, RateTracker, Vec3};

use crate::checks::CheckId;

/// Longest gap between movement samples the engine will simulate.
pub const MAX_TICK_GAP: i32 = 10;

/// Stable 128-bit entity key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(pub u128);

impl EntityKey {
    /// Folds the key to 64 bits (XOR of the high and low halves).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn fold(self) -> u64 {
        ((self.0 >> 64) as u64) ^ (self.0 as u64)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// What the interception layer knows about who an entity is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityIdentity {
    /// Primary account id, when the session has one.
    pub account: Option<u128>,
    /// Secondary platform id (for example an Xbox user id).
    pub platform_id: Option<String>,
    /// Display name.
    pub display_name: String,
}

impl EntityIdentity {
    /// Identity with only a display name.
    #[must_use]
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            account: None,
            platform_id: None,
            display_name: display_name.into(),
        }
    }

    /// Derives the stable key.
    ///
    /// Priority: account id, then a hash of the platform id, then a hash of
    /// the display name. The hashes are unkeyed SipHash-2-4 so the same
    /// identity maps to the same key in every process.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        if let Some(account) = self.account {
            return EntityKey(account);
        }
        match self.platform_id.as_deref() {
            Some(id) if !id.is_empty() => hash_key("xuid:", id),
            _ => hash_key("name:", &self.display_name),
        }
    }
}

fn hash_key(namespace: &str, value: &str) -> EntityKey {
    let mut hasher = SipHasher24::new();
    hasher.write(namespace.as_bytes());
    hasher.write(value.as_bytes());
    let hash = hasher.finish128();
    EntityKey((u128::from(hash.h1) << 64) | u128::from(hash.h2))
}

/// Protocol-level state changes reported by the interception layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityAction {
    /// Entered a bed.
    StartSleep,
    /// Left a bed.
    StopSleep,
    /// Started sprinting.
    StartSprint,
    /// Stopped sprinting.
    StopSprint,
    /// Started sneaking.
    StartSneak,
    /// Stopped sneaking.
    StopSneak,
    /// Started ability flight.
    StartFlying,
    /// Stopped ability flight.
    StopFlying,
}

const ON_GROUND: u8 = 1 << 0;
const SLEEPING: u8 = 1 << 1;
const FLYING: u8 = 1 << 2;
const SPRINTING: u8 = 1 << 3;
const SNEAKING: u8 = 1 << 4;

/// Per-check cumulative violation counts. Never decreases.
#[derive(Debug, Default)]
pub struct ViolationLedger {
    counts: [AtomicU32; CheckId::COUNT],
}

impl ViolationLedger {
    /// Adds `amount` and returns the new total (saturating).
    pub fn add(&self, check: CheckId, amount: u32) -> u32 {
        let slot = &self.counts[check.index()];
        let previous = slot
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(amount))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_add(amount)
    }

    /// Current total for one check.
    #[inline]
    #[must_use]
    pub fn get(&self, check: CheckId) -> u32 {
        self.counts[check.index()].load(Ordering::Acquire)
    }

    /// All totals, indexed by [`CheckId::index`].
    #[must_use]
    pub fn totals(&self) -> [u32; CheckId::COUNT] {
        std::array::from_fn(|i| self.counts[i].load(Ordering::Acquire))
    }
}

/// Mutable state for one entity.
#[derive(Debug)]
pub struct EntityState {
    key: EntityKey,
    identity: EntityIdentity,
    /// None until the first movement.
    position: Mutex<Option<Vec3>>,
    /// Velocity estimate per tick.
    velocity: Mutex<Vec3>,
    /// (yaw, pitch) in degrees.
    rotation: Mutex<(f32, f32)>,
    flags: AtomicU8,
    ping: AtomicU32,
    last_tick: AtomicU64,
    packet_rate: Mutex<RateTracker>,
    ledger: ViolationLedger,
    buffers: [Mutex<AnomalyBuffer>; CheckId::COUNT],
}

impl EntityState {
    /// Creates state for a newly seen entity.
    #[must_use]
    pub fn new(
        key: EntityKey,
        identity: EntityIdentity,
        settings: &[BufferSettings; CheckId::COUNT],
    ) -> Self {
        Self {
            key,
            identity,
            position: Mutex::new(None),
            velocity: Mutex::new(Vec3::ZERO),
            rotation: Mutex::new((0.0, 0.0)),
            flags: AtomicU8::new(0),
            ping: AtomicU32::new(0),
            last_tick: AtomicU64::new(0),
            packet_rate: Mutex::new(RateTracker::new(Duration::from_secs(1), Instant::now())),
            ledger: ViolationLedger::default(),
            buffers: std::array::from_fn(|i| Mutex::new(AnomalyBuffer::new(settings[i]))),
        }
    }

    /// Stable key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> EntityKey {
        self.key
    }

    /// Identity the entity connected with.
    #[inline]
    #[must_use]
    pub const fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    // =========================================================================
    // Kinematics
    // =========================================================================

    /// Stores a new position and returns the displacement from the previous
    /// one. The first position yields a zero displacement.
    pub fn update_position(&self, position: Vec3) -> Vec3 {
        let mut slot = self.position.lock();
        let delta = slot.map_or(Vec3::ZERO, |previous| position - previous);
        *slot = Some(position);
        delta
    }

    /// Last known position.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        *self.position.lock()
    }

    /// Current velocity estimate.
    #[must_use]
    pub fn snapshot_velocity(&self) -> Vec3 {
        *self.velocity.lock()
    }

    /// Replaces the velocity estimate.
    pub fn update_velocity(&self, velocity: Vec3) {
        *self.velocity.lock() = velocity;
    }

    /// Stores the current look angles.
    pub fn set_rotation(&self, yaw: f32, pitch: f32) {
        *self.rotation.lock() = (yaw, pitch);
    }

    /// Current (yaw, pitch).
    #[must_use]
    pub fn rotation(&self) -> (f32, f32) {
        *self.rotation.lock()
    }

    /// Records `tick` as the latest and returns the gap to the previous one.
    ///
    /// First contact and non-increasing ticks count as one tick. Gaps are
    /// capped at [`MAX_TICK_GAP`].
    pub fn advance_tick(&self, tick: u64) -> i32 {
        let last = self.last_tick.swap(tick, Ordering::AcqRel);
        if last == 0 || tick <= last {
            return 1;
        }
        i32::try_from(tick - last).map_or(MAX_TICK_GAP, |gap| gap.min(MAX_TICK_GAP))
    }

    /// Latest tick seen.
    #[inline]
    #[must_use]
    pub fn last_tick(&self) -> u64 {
        self.last_tick.load(Ordering::Acquire)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    fn set_flag(&self, bit: u8, on: bool) {
        if on {
            self.flags.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.flags.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    fn flag(&self, bit: u8) -> bool {
        self.flags.load(Ordering::Acquire) & bit != 0
    }

    /// Applies a protocol state change.
    pub fn apply_action(&self, action: EntityAction) {
        match action {
            EntityAction::StartSleep => self.set_flag(SLEEPING, true),
            EntityAction::StopSleep => self.set_flag(SLEEPING, false),
            EntityAction::StartSprint => self.set_flag(SPRINTING, true),
            EntityAction::StopSprint => self.set_flag(SPRINTING, false),
            EntityAction::StartSneak => self.set_flag(SNEAKING, true),
            EntityAction::StopSneak => self.set_flag(SNEAKING, false),
            EntityAction::StartFlying => self.set_flag(FLYING, true),
            EntityAction::StopFlying => self.set_flag(FLYING, false),
        }
    }

    /// Refreshes the flags a movement packet carries.
    ///
    /// Flight is left alone: it only changes through [`EntityAction`].
    pub fn set_movement_flags(&self, on_ground: bool, sprinting: bool, sneaking: bool) {
        self.set_flag(ON_GROUND, on_ground);
        self.set_flag(SPRINTING, sprinting);
        self.set_flag(SNEAKING, sneaking);
    }

    /// Standing on a block.
    #[must_use]
    pub fn is_on_ground(&self) -> bool {
        self.flag(ON_GROUND)
    }

    /// In a bed.
    #[must_use]
    pub fn is_sleeping(&self) -> bool {
        self.flag(SLEEPING)
    }

    /// Ability flight.
    #[must_use]
    pub fn is_flying(&self) -> bool {
        self.flag(FLYING)
    }

    /// Sprinting.
    #[must_use]
    pub fn is_sprinting(&self) -> bool {
        self.flag(SPRINTING)
    }

    /// Sneaking.
    #[must_use]
    pub fn is_sneaking(&self) -> bool {
        self.flag(SNEAKING)
    }

    /// Stores the latest round-trip latency in milliseconds.
    pub fn set_ping(&self, ping: u32) {
        self.ping.store(ping, Ordering::Release);
    }

    /// Latest round-trip latency in milliseconds.
    #[inline]
    #[must_use]
    pub fn ping(&self) -> u32 {
        self.ping.load(Ordering::Acquire)
    }

    /// Counts one inbound packet and returns the count in the current
    /// one-second window.
    pub fn hit_packet_rate(&self, now: Instant) -> u32 {
        self.packet_rate.lock().hit(now)
    }

    // =========================================================================
    // Detection state
    // =========================================================================

    /// Feeds one deviation into the check's anomaly buffer.
    pub fn sample_buffer(&self, check: CheckId, value: f64) -> bool {
        self.buffers[check.index()].lock().sample(value)
    }

    /// Current bucket level of the check's anomaly buffer.
    #[must_use]
    pub fn buffer_level(&self, check: CheckId) -> f64 {
        self.buffers[check.index()].lock().level()
    }

    /// Values folded into the check's baseline so far.
    #[must_use]
    pub fn buffer_count(&self, check: CheckId) -> u64 {
        self.buffers[check.index()].lock().count()
    }

    /// Discards every learned baseline.
    pub fn reset_baselines(&self) {
        for buffer in &self.buffers {
            buffer.lock().reset();
        }
    }

    /// Adds to the violation ledger and returns the new total.
    pub fn add_violation(&self, check: CheckId, amount: u32) -> u32 {
        self.ledger.add(check, amount)
    }

    /// Cumulative violations for one check.
    #[must_use]
    pub fn violations(&self, check: CheckId) -> u32 {
        self.ledger.get(check)
    }

    /// Point-in-time copy for reporting.
    #[must_use]
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            key: self.key,
            display_name: self.identity.display_name.clone(),
            position: self.position(),
            velocity: self.snapshot_velocity(),
            violations: self.ledger.totals(),
        }
    }
}

/// Out-of-band view of one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySnapshot {
    /// Stable key.
    pub key: EntityKey,
    /// Display name.
    pub display_name: String,
    /// Last known position.
    pub position: Option<Vec3>,
    /// Velocity estimate.
    pub velocity: Vec3,
    /// Ledger totals, indexed by [`CheckId::index`].
    pub violations: [u32; CheckId::COUNT],
}

impl EntitySnapshot {
    /// Ledger total for one check.
    #[must_use]
    pub fn violations(&self, check: CheckId) -> u32 {
        self.violations[check.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> EntityState {
        let settings = [BufferSettings::new(3.0, 5.0, 0.25, 5); CheckId::COUNT];
        let identity = EntityIdentity::named("Steve");
        EntityState::new(identity.key(), identity, &settings)
    }

    #[test]
    fn test_key_priority() {
        let mut identity = EntityIdentity::named("Steve");
        let by_name = identity.key();

        identity.platform_id = Some("2535405290".to_owned());
        let by_platform = identity.key();
        assert_ne!(by_name, by_platform);

        identity.account = Some(42);
        assert_eq!(identity.key(), EntityKey(42));
    }

    #[test]
    fn test_key_is_stable() {
        let a = EntityIdentity::named("Alex");
        let b = EntityIdentity::named("Alex");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), EntityIdentity::named("Alexa").key());
    }

    #[test]
    fn test_empty_platform_id_falls_back_to_name() {
        let mut identity = EntityIdentity::named("Steve");
        let by_name = identity.key();
        identity.platform_id = Some(String::new());
        assert_eq!(identity.key(), by_name);
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let name = EntityIdentity::named("123");
        let platform = EntityIdentity {
            platform_id: Some("123".to_owned()),
            ..EntityIdentity::default()
        };
        assert_ne!(name.key(), platform.key());
    }

    #[test]
    fn test_fold() {
        let key = EntityKey((0xFFFF_0000_u128 << 64) | 0x0000_FFFF);
        assert_eq!(key.fold(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_update_position() {
        let state = state();
        assert_eq!(state.update_position(Vec3::new(1.0, 2.0, 3.0)), Vec3::ZERO);

        let delta = state.update_position(Vec3::new(1.5, 2.0, 5.0));
        assert_eq!(delta, Vec3::new(0.5, 0.0, 2.0));
        assert_eq!(state.position(), Some(Vec3::new(1.5, 2.0, 5.0)));
    }

    #[test]
    fn test_advance_tick() {
        let state = state();
        assert_eq!(state.advance_tick(100), 1);
        assert_eq!(state.advance_tick(103), 3);
        assert_eq!(state.advance_tick(103), 1);
        assert_eq!(state.advance_tick(500), MAX_TICK_GAP);
    }

    #[test]
    fn test_flags() {
        let state = state();
        state.apply_action(EntityAction::StartSleep);
        state.apply_action(EntityAction::StartSneak);
        assert!(state.is_sleeping());
        assert!(state.is_sneaking());
        assert!(!state.is_flying());

        state.apply_action(EntityAction::StopSleep);
        assert!(!state.is_sleeping());
        assert!(state.is_sneaking());

        state.set_movement_flags(true, true, false);
        assert!(state.is_on_ground());
        assert!(state.is_sprinting());
        assert!(!state.is_sneaking());
    }

    #[test]
    fn test_ledger_is_monotonic() {
        let state = state();
        assert_eq!(state.add_violation(CheckId::Speed, 1), 1);
        assert_eq!(state.add_violation(CheckId::Speed, 2), 3);
        assert_eq!(state.add_violation(CheckId::Reach, 1), 1);
        assert_eq!(state.violations(CheckId::Speed), 3);
        assert_eq!(state.violations(CheckId::Fly), 0);

        let ledger = ViolationLedger::default();
        ledger.add(CheckId::Fly, u32::MAX);
        assert_eq!(ledger.add(CheckId::Fly, 7), u32::MAX);
    }

    #[test]
    fn test_ledger_concurrent_adds() {
        let state = std::sync::Arc::new(state());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = std::sync::Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        state.add_violation(CheckId::BadPackets, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.violations(CheckId::BadPackets), 8000);
    }

    #[test]
    fn test_reset_baselines() {
        let state = state();
        for _ in 0..10 {
            state.sample_buffer(CheckId::Fly, 1.0);
        }
        assert_eq!(state.buffer_count(CheckId::Fly), 10);

        state.reset_baselines();
        assert_eq!(state.buffer_count(CheckId::Fly), 0);
    }

    #[test]
    fn test_snapshot() {
        let state = state();
        state.update_position(Vec3::new(1.0, 2.0, 3.0));
        state.update_velocity(Vec3::new(0.1, 0.0, 0.0));
        state.add_violation(CheckId::Reach, 2);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.display_name, "Steve");
        assert_eq!(snapshot.position, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(snapshot.violations(CheckId::Reach), 2);
    }
}
