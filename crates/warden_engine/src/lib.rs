//! # Warden Engine
//!
//! Behavioral anomaly detection for a game network proxy:
//! - Per-entity, per-check baselines that calibrate to each entity
//! - A deterministic movement predictor as the speed oracle
//! - Ordered per entity, parallel across entities
//!
//! ## Architecture Rules
//!
//! 1. **Samples are values** - decoded once, moved into a stripe, consumed once
//! 2. **One stripe per entity** - no two samples of an entity run concurrently
//! 3. **Degenerate input is dropped, never an error** on the hot path
//! 4. **No punitive action** - escalations go to an injected hook
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use warden_engine::{Engine, EngineConfig, EntityIdentity, MovementInput, Vec3};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let key = engine.connect(&EntityIdentity::named("Steve"));
//!
//! engine
//!     .record_movement(
//!         key,
//!         MovementInput {
//!             tick: 1,
//!             position: Vec3::new(0.0, 64.0, 0.0),
//!             on_ground: true,
//!             ..MovementInput::default()
//!         },
//!     )
//!     .unwrap();
//!
//! assert!(engine.wait_idle(Duration::from_secs(5)));
//! engine.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod checks;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod escalation;
pub mod predictor;
pub mod registry;
pub mod sample;
pub mod scheduler;
pub mod worker;

pub use checks::{Check, CheckContext, CheckId, CheckSet, Verdict};
pub use config::{
    BadPacketsConfig, BufferConfig, ChecksConfig, EngineConfig, FlyConfig, PerformanceConfig,
    PunishmentConfig, ReachConfig, SpeedConfig,
};
pub use engine::{Engine, Pipeline, SampleTask};
pub use entity::{EntityAction, EntityIdentity, EntityKey, EntitySnapshot, EntityState};
pub use error::{ConfigError, EngineError, EngineResult};
pub use escalation::{EscalationHook, LogEscalation, ViolationReport, ESCALATION_INTERVAL};
pub use predictor::{MovementPredictor, PredictorParams};
pub use registry::EntityRegistry;
pub use sample::{
    CombatSample, MovementInput, MovementSample, PacketSample, Sample, TargetGeometry,
};
pub use scheduler::{SchedulerStats, StripeHandler, StripedScheduler};
pub use worker::WorkerContext;

pub use warden_core::Vec3;
