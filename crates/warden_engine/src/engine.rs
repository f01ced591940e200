//! # Detection Engine
//!
//! The facade the interception layer calls into.
//!
//! ## Data Flow
//!
//! ```text
//! record_movement / record_interaction / record_packet / submit
//!        │   (ingestion thread: tick delta, displacement, flags)
//!        ▼
//! StripedScheduler ── stripe(key) ──► Pipeline::process
//!                                         │
//!                                         ├─ registry lookup (unknown: drop)
//!                                         ├─ CheckSet::run
//!                                         └─ velocity = delta / dt
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{info, trace, warn};
use warden_core::Vec3;

use crate::checks::{Check, CheckContext, CheckId, CheckSet, Verdict};
use crate::config::{EngineConfig, PerformanceConfig};
use crate::entity::{EntityAction, EntityIdentity, EntityKey, EntitySnapshot, EntityState};
use crate::error::{EngineError, EngineResult};
use crate::escalation::{EscalationHook, LogEscalation};
use crate::registry::{buffer_settings, EntityRegistry};
use crate::sample::{CombatSample, MovementInput, MovementSample, PacketSample, Sample, TargetGeometry};
use crate::scheduler::{SchedulerStats, StripeHandler, StripedScheduler};
use crate::worker::WorkerContext;

/// Eye height above the feet while standing.
pub const EYE_HEIGHT: f32 = 1.62;

/// Eye height above the feet while sneaking.
pub const SNEAK_EYE_HEIGHT: f32 = 1.54;

/// One sample routed to one entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleTask {
    /// Target entity.
    pub key: EntityKey,
    /// Observation.
    pub sample: Sample,
}

/// Runs samples against entity state. One per engine, shared by all
/// workers.
pub struct Pipeline {
    registry: Arc<EntityRegistry>,
    checks: RwLock<Arc<CheckSet>>,
    hook: Arc<dyn EscalationHook>,
    verbose: AtomicBool,
    performance: PerformanceConfig,
}

impl Pipeline {
    /// Creates a pipeline over `registry`.
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        registry: Arc<EntityRegistry>,
        hook: Arc<dyn EscalationHook>,
    ) -> Self {
        Self {
            registry,
            checks: RwLock::new(Arc::new(CheckSet::from_config(config))),
            hook,
            verbose: AtomicBool::new(config.debug),
            performance: config.performance.clone(),
        }
    }

    /// Current checks.
    #[must_use]
    pub fn checks(&self) -> Arc<CheckSet> {
        Arc::clone(&self.checks.read())
    }

    /// Processes one sample. Returns `None` when the entity is unknown.
    pub fn process(
        &self,
        worker: &mut WorkerContext,
        key: EntityKey,
        sample: &Sample,
    ) -> Option<[Verdict; CheckId::COUNT]> {
        let Some(state) = self.registry.get(key) else {
            trace!(entity = %key, "sample for unknown entity dropped");
            return None;
        };

        let checks = self.checks();
        let mut ctx = CheckContext {
            worker,
            hook: &*self.hook,
            verbose: self.verbose.load(Ordering::Relaxed),
        };
        let verdicts = checks.run(sample, &state, &mut ctx);

        if let Sample::Movement(movement) = sample {
            if movement.dt_ticks > 0 {
                #[allow(clippy::cast_precision_loss)]
                let dt = movement.dt_ticks as f32;
                state.update_velocity(movement.delta * (1.0 / dt));
            }
        }

        Some(verdicts)
    }

    fn reload(&self, config: &EngineConfig) {
        *self.checks.write() = Arc::new(CheckSet::from_config(config));
        self.verbose.store(config.debug, Ordering::Relaxed);
    }
}

impl StripeHandler for Pipeline {
    type Task = SampleTask;
    type Context = WorkerContext;

    fn create_context(&self) -> WorkerContext {
        WorkerContext::from_config(&self.performance)
    }

    fn handle(&self, context: &mut WorkerContext, task: SampleTask) {
        self.process(context, task.key, &task.sample);
    }
}

/// Behavioral anomaly detection engine.
///
/// # Example
///
/// ```rust
/// use warden_engine::{Engine, EngineConfig, EntityIdentity, CheckId};
///
/// let engine = Engine::new(EngineConfig::default()).unwrap();
/// let key = engine.connect(&EntityIdentity::named("Steve"));
///
/// assert_eq!(engine.violations(key, CheckId::Speed).unwrap(), 0);
/// engine.shutdown();
/// ```
pub struct Engine {
    registry: Arc<EntityRegistry>,
    scheduler: StripedScheduler<Pipeline>,
    config: RwLock<EngineConfig>,
}

impl Engine {
    /// Starts an engine that logs escalations.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if worker threads cannot start.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let hook = Arc::new(LogEscalation::new(config.punishments.clone()));
        Self::with_hook(config, hook)
    }

    /// Starts an engine that hands escalations to `hook`.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if worker threads cannot start.
    pub fn with_hook(config: EngineConfig, hook: Arc<dyn EscalationHook>) -> EngineResult<Self> {
        config.validate()?;

        let registry = Arc::new(EntityRegistry::from_config(&config));
        let pipeline = Pipeline::new(&config, Arc::clone(&registry), hook);
        let scheduler = StripedScheduler::new(
            pipeline,
            config.performance.workers(),
            config.stripe_count(),
            config.performance.queue_capacity(),
        )?;

        Ok(Self {
            registry,
            scheduler,
            config: RwLock::new(config),
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Registers an entity on first contact. Returns its key.
    pub fn connect(&self, identity: &EntityIdentity) -> EntityKey {
        self.registry.get_or_create(identity).key()
    }

    /// Forgets an entity. Samples still queued for it are dropped.
    pub fn disconnect(&self, key: EntityKey) -> bool {
        self.registry.remove(key).is_some()
    }

    /// Applies new check configuration.
    ///
    /// Existing entities keep their state and baselines. Performance
    /// settings only take effect on restart.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn reload(&self, config: EngineConfig) -> EngineResult<()> {
        config.validate()?;

        let mut current = self.config.write();
        if current.performance != config.performance {
            warn!("performance settings changed, restart to apply them");
        }
        self.scheduler.handler().reload(&config);
        self.registry.set_buffer_settings(buffer_settings(&config));
        info!(entities = self.registry.len(), debug = config.debug, "configuration reloaded");
        *current = config;
        Ok(())
    }

    /// Stops the workers. Queued samples are abandoned.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Queues a decoded sample for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SchedulerShutdown`] after shutdown.
    pub fn submit(&self, key: EntityKey, sample: impl Into<Sample>) -> EngineResult<()> {
        let task = SampleTask {
            key,
            sample: sample.into(),
        };
        self.scheduler.submit(key.fold(), task)
    }

    /// Builds a movement sample from an absolute position and queues it.
    ///
    /// The tick delta and displacement come from the entity's previous
    /// movement.
    ///
    /// # Errors
    ///
    /// Fails for unknown entities and after shutdown.
    pub fn record_movement(&self, key: EntityKey, input: MovementInput) -> EngineResult<()> {
        let state = self.state(key)?;

        let dt_ticks = state.advance_tick(input.tick);
        let delta = state.update_position(input.position);
        state.set_rotation(input.yaw, input.pitch);
        state.set_movement_flags(input.on_ground, input.sprinting, input.sneaking);

        let sample = MovementSample {
            tick: input.tick,
            dt_ticks,
            ping: state.ping(),
            position: input.position,
            delta,
            yaw: input.yaw,
            pitch: input.pitch,
            on_ground: input.on_ground,
            sprinting: input.sprinting,
            jumping: input.jumping,
            flying: input.flying || state.is_flying(),
            gliding: input.gliding,
            sneaking: input.sneaking,
        };
        self.submit(key, sample)
    }

    /// Queues an interaction with another entity.
    ///
    /// Interactions while sleeping are protocol-invalid and go to the
    /// packet check instead of the reach check. Interactions before the
    /// first movement are ignored.
    ///
    /// # Errors
    ///
    /// Fails for unknown entities and after shutdown.
    pub fn record_interaction(&self, key: EntityKey, target: TargetGeometry) -> EngineResult<()> {
        let state = self.state(key)?;

        if state.is_sleeping() {
            let sample = PacketSample {
                packets_per_second: 0,
                action_while_sleeping: true,
            };
            return self.submit(key, sample);
        }

        let Some(feet) = state.position() else {
            trace!(entity = %key, "interaction before first movement ignored");
            return Ok(());
        };
        let eye_height = if state.is_sneaking() {
            SNEAK_EYE_HEIGHT
        } else {
            EYE_HEIGHT
        };
        let (yaw, pitch) = state.rotation();

        let sample = CombatSample {
            tick: state.last_tick(),
            ping: state.ping(),
            target_id: target.id,
            target_position: target.position,
            target_width: target.width,
            target_height: target.height,
            eye: feet + Vec3::new(0.0, eye_height, 0.0),
            yaw,
            pitch,
        };
        self.submit(key, sample)
    }

    /// Counts one inbound packet. When the one-second count exceeds the
    /// configured cap, queues a packet cadence sample.
    ///
    /// Returns the count in the current window.
    ///
    /// # Errors
    ///
    /// Fails for unknown entities and after shutdown.
    pub fn record_packet(&self, key: EntityKey, now: Instant) -> EngineResult<u32> {
        let state = self.state(key)?;
        let rate = state.hit_packet_rate(now);

        let cap = match self.scheduler.handler().checks().get(CheckId::BadPackets) {
            Check::BadPackets(check) => check.max_packets_per_second(),
            _ => u32::MAX,
        };
        if rate > cap {
            let sample = PacketSample {
                packets_per_second: rate,
                action_while_sleeping: false,
            };
            self.submit(key, sample)?;
        }
        Ok(rate)
    }

    /// Applies a protocol state change immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`].
    pub fn apply_action(&self, key: EntityKey, action: EntityAction) -> EngineResult<()> {
        self.state(key)?.apply_action(action);
        Ok(())
    }

    /// Stores the entity's latest round-trip latency.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`].
    pub fn set_ping(&self, key: EntityKey, ping: u32) -> EngineResult<()> {
        self.state(key)?.set_ping(ping);
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Cumulative violations of one check.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`].
    pub fn violations(&self, key: EntityKey, check: CheckId) -> EngineResult<u32> {
        Ok(self.state(key)?.violations(check))
    }

    /// Discards every learned baseline of one entity.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`].
    pub fn reset_baselines(&self, key: EntityKey) -> EngineResult<()> {
        self.state(key)?.reset_baselines();
        Ok(())
    }

    /// Point-in-time view of every entity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        self.registry.states().iter().map(|s| s.snapshot()).collect()
    }

    /// Entity state store.
    #[must_use]
    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Scheduler counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Waits until every queued sample has been processed.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    fn state(&self, key: EntityKey) -> EngineResult<Arc<EntityState>> {
        self.registry.get(key).ok_or(EngineError::UnknownEntity(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut config = EngineConfig::default();
        config.performance.worker_threads = 2;
        Engine::new(config).unwrap()
    }

    #[test]
    fn test_unknown_entity() {
        let engine = engine();
        let key = EntityKey(1234);
        assert_eq!(
            engine.violations(key, CheckId::Fly),
            Err(EngineError::UnknownEntity(key))
        );
        assert!(engine.record_movement(key, MovementInput::default()).is_err());
        // Direct submissions for unknown entities are dropped by the pipeline
        assert!(engine.submit(key, PacketSample::default()).is_ok());
        assert!(engine.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_process_drops_unknown() {
        let engine = engine();
        let mut worker = WorkerContext::default();
        let pipeline = engine.scheduler.handler();
        let sample = Sample::Packet(PacketSample::default());
        assert!(pipeline.process(&mut worker, EntityKey(5), &sample).is_none());
    }

    #[test]
    fn test_record_movement_updates_state() {
        let engine = engine();
        let key = engine.connect(&EntityIdentity::named("Steve"));

        let mut input = MovementInput {
            tick: 10,
            position: Vec3::new(0.0, 64.0, 0.0),
            on_ground: true,
            ..MovementInput::default()
        };
        engine.record_movement(key, input).unwrap();

        input.tick = 12;
        input.position = Vec3::new(0.0, 64.0, 0.5);
        engine.record_movement(key, input).unwrap();
        assert!(engine.wait_idle(Duration::from_secs(5)));

        let state = engine.registry().get(key).unwrap();
        assert_eq!(state.last_tick(), 12);
        assert!(state.is_on_ground());
        let velocity = state.snapshot_velocity();
        assert!((velocity.z - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_sleeping_interaction_is_packet_sample() {
        let engine = engine();
        let key = engine.connect(&EntityIdentity::named("Sleepy"));
        engine.apply_action(key, EntityAction::StartSleep).unwrap();

        engine
            .record_interaction(key, TargetGeometry::default())
            .unwrap();
        assert!(engine.wait_idle(Duration::from_secs(5)));

        let state = engine.registry().get(key).unwrap();
        assert_eq!(state.buffer_count(CheckId::BadPackets), 1);
        assert_eq!(state.buffer_count(CheckId::Reach), 0);
    }

    #[test]
    fn test_interaction_uses_eye_height() {
        let engine = engine();
        let key = engine.connect(&EntityIdentity::named("Archer"));
        engine
            .record_movement(
                key,
                MovementInput {
                    tick: 1,
                    position: Vec3::new(0.0, 64.0, 0.0),
                    on_ground: true,
                    ..MovementInput::default()
                },
            )
            .unwrap();

        let target = TargetGeometry {
            id: 2,
            position: Vec3::new(0.0, 64.0, 2.5),
            width: 0.6,
            height: 1.8,
        };
        engine.record_interaction(key, target).unwrap();
        assert!(engine.wait_idle(Duration::from_secs(5)));

        let state = engine.registry().get(key).unwrap();
        assert_eq!(state.buffer_count(CheckId::Reach), 1);
    }

    #[test]
    fn test_record_packet_rate() {
        let engine = engine();
        let key = engine.connect(&EntityIdentity::named("Spammer"));
        let now = Instant::now();

        let mut last = 0;
        for _ in 0..130 {
            last = engine.record_packet(key, now).unwrap();
        }
        assert_eq!(last, 130);
        assert!(engine.wait_idle(Duration::from_secs(5)));

        let state = engine.registry().get(key).unwrap();
        assert_eq!(state.buffer_count(CheckId::BadPackets), 10);
    }

    #[test]
    fn test_reload_keeps_entities() {
        let engine = engine();
        let key = engine.connect(&EntityIdentity::named("Steve"));
        let state = engine.registry().get(key).unwrap();
        state.add_violation(CheckId::Reach, 3);

        let mut config = engine.config();
        config.checks.reach.enabled = false;
        config.debug = true;
        engine.reload(config).unwrap();

        assert_eq!(engine.violations(key, CheckId::Reach).unwrap(), 3);
        assert!(!engine.config().checks.reach.enabled);
        assert!(!engine
            .scheduler
            .handler()
            .checks()
            .get(CheckId::Reach)
            .is_enabled());
    }

    #[test]
    fn test_reload_rejects_invalid() {
        let engine = engine();
        let mut config = engine.config();
        config.checks.speed.friction = 0.0;
        assert!(matches!(engine.reload(config), Err(EngineError::Config(_))));
        assert!((engine.config().checks.speed.friction - 0.91).abs() < 1e-12);
    }

    #[test]
    fn test_disconnect_and_snapshot() {
        let engine = engine();
        let a = engine.connect(&EntityIdentity::named("a"));
        let b = engine.connect(&EntityIdentity::named("b"));
        assert_eq!(engine.snapshot().len(), 2);

        assert!(engine.disconnect(a));
        assert!(!engine.disconnect(a));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].key, b);
    }

    #[test]
    fn test_shutdown_rejects_samples() {
        let engine = engine();
        let key = engine.connect(&EntityIdentity::named("late"));
        engine.shutdown();
        assert_eq!(
            engine.submit(key, PacketSample::default()),
            Err(EngineError::SchedulerShutdown)
        );
    }
}
