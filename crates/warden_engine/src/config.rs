//! # Engine Configuration
//!
//! Typed configuration consumed at construction time and on reload.
//!
//! Reading the file is the host's job. This module only turns an in-memory
//! TOML document into typed values, fills in defaults for anything missing,
//! and rejects values the math cannot survive.
//!
//! ```toml
//! [performance]
//! workerThreads = 6
//!
//! [checks.speed]
//! maxHorizontalBase = 0.45
//!
//! [checks.speed.buffer]
//! max = 5.0
//! decay = 0.25
//! minSamples = 30
//! ```

use serde::Deserialize;
use warden_core::BufferSettings;

use crate::error::ConfigError;
use crate::predictor::PredictorParams;

/// Root configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Threading and pooling.
    pub performance: PerformanceConfig,
    /// Per-check tuning.
    pub checks: ChecksConfig,
    /// Escalation policy parameters, passed through to the escalation hook.
    pub punishments: PunishmentConfig,
    /// Verbose per-sample logging.
    pub debug: bool,
}

impl EngineConfig {
    /// Parses a TOML document. Missing sections and keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value the detection math depends on.
    ///
    /// # Errors
    ///
    /// Returns the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let speed = &self.checks.speed;
        positive("checks.speed.maxHorizontalBase", speed.max_horizontal_base)?;
        at_least("checks.speed.sprintMultiplier", speed.sprint_multiplier, 1.0)?;
        non_negative("checks.speed.airAccel", speed.air_accel)?;
        non_negative("checks.speed.groundAccel", speed.ground_accel)?;
        unit_interval("checks.speed.friction", speed.friction)?;
        non_negative("checks.speed.gravity", speed.gravity)?;
        unit_interval("checks.speed.drag", speed.drag)?;
        speed.buffer.validate("checks.speed.buffer", speed.z_threshold)?;

        let fly = &self.checks.fly;
        non_negative("checks.fly.verticalTolerance", fly.vertical_tolerance)?;
        fly.buffer.validate("checks.fly.buffer", fly.z_threshold)?;

        let reach = &self.checks.reach;
        positive("checks.reach.maxReach", reach.max_reach)?;
        non_negative("checks.reach.hitboxMargin", reach.hitbox_margin)?;
        if !(-1.0..=1.0).contains(&reach.aim_dot_threshold) {
            return Err(ConfigError::Invalid {
                key: "checks.reach.aimDotThreshold",
                reason: format!("{} is outside [-1, 1]", reach.aim_dot_threshold),
            });
        }
        reach.buffer.validate("checks.reach.buffer", reach.z_threshold)?;

        let bad = &self.checks.bad_packets;
        bad.buffer.validate("checks.badPackets.buffer", bad.z_threshold)?;

        Ok(())
    }

    /// Number of scheduler stripes: at least four, at least one per worker,
    /// rounded up to a power of two.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.performance.workers().max(4).next_power_of_two()
    }
}

/// Threading and pooling.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceConfig {
    /// Worker threads in the shared pool.
    pub worker_threads: usize,
    /// Capacity of the shared pool's job queue.
    pub max_queued_tasks: usize,
    /// Violation reports kept per worker for reuse.
    pub pool_event_objects: usize,
    /// Scratch vectors kept per worker for reuse.
    pub pool_vectors: usize,
}

impl PerformanceConfig {
    /// Effective worker count (at least 2).
    #[must_use]
    pub fn workers(&self) -> usize {
        self.worker_threads.max(2)
    }

    /// Effective job queue capacity (at least 1024).
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.max_queued_tasks.max(1024)
    }

    /// Effective report pool capacity (at least 16).
    #[must_use]
    pub fn report_pool_capacity(&self) -> usize {
        self.pool_event_objects.max(16)
    }

    /// Effective scratch vector pool capacity (at least 16).
    #[must_use]
    pub fn vector_pool_capacity(&self) -> usize {
        self.pool_vectors.max(16)
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            worker_threads: 6,
            max_queued_tasks: 8192,
            pool_event_objects: 4096,
            pool_vectors: 8192,
        }
    }
}

/// Leaky bucket tuning shared by every check.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BufferConfig {
    /// Bucket level that flags.
    pub max: f64,
    /// Drain per non-anomalous sample.
    pub decay: f64,
    /// Warm-up length before scoring starts.
    pub min_samples: u32,
}

impl BufferConfig {
    /// Creates a buffer configuration.
    #[must_use]
    pub const fn new(max: f64, decay: f64, min_samples: u32) -> Self {
        Self {
            max,
            decay,
            min_samples,
        }
    }

    /// Combines with a check's z threshold into anomaly buffer settings.
    #[must_use]
    pub fn settings(&self, z_threshold: f64) -> BufferSettings {
        BufferSettings::new(z_threshold, self.max, self.decay, self.min_samples)
    }

    fn validate(&self, key: &'static str, z_threshold: f64) -> Result<(), ConfigError> {
        positive(key, self.max)?;
        non_negative(key, self.decay)?;
        if !z_threshold.is_finite() {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("z threshold {z_threshold} is not finite"),
            });
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new(5.0, 0.25, 30)
    }
}

/// All check sections.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChecksConfig {
    /// Horizontal speed.
    pub speed: SpeedConfig,
    /// Vertical motion while airborne.
    pub fly: FlyConfig,
    /// Combat reach and aim.
    pub reach: ReachConfig,
    /// Packet cadence and protocol state.
    pub bad_packets: BadPacketsConfig,
}

/// Speed check and shared movement physics.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeedConfig {
    /// Whether the check runs.
    pub enabled: bool,
    /// Horizontal speed cap per tick while walking.
    pub max_horizontal_base: f64,
    /// Cap multiplier while sprinting.
    pub sprint_multiplier: f64,
    /// Acceleration per tick while airborne.
    pub air_accel: f64,
    /// Acceleration per tick on the ground.
    pub ground_accel: f64,
    /// Horizontal velocity retained per tick.
    pub friction: f64,
    /// Downward acceleration per tick (also used by the fly check).
    pub gravity: f64,
    /// Vertical velocity retained per tick (also used by the fly check).
    pub drag: f64,
    /// Anomaly threshold.
    pub z_threshold: f64,
    /// Bucket tuning.
    pub buffer: BufferConfig,
}

impl SpeedConfig {
    /// Predictor parameters derived from this section.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn predictor_params(&self) -> PredictorParams {
        PredictorParams {
            max_base_speed: self.max_horizontal_base as f32,
            sprint_multiplier: self.sprint_multiplier as f32,
            ground_accel: self.ground_accel as f32,
            air_accel: self.air_accel as f32,
            friction: self.friction as f32,
        }
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_horizontal_base: 0.45,
            sprint_multiplier: 1.30,
            air_accel: 0.02,
            ground_accel: 0.10,
            friction: 0.91,
            gravity: 0.08,
            drag: 0.98,
            z_threshold: 3.0,
            buffer: BufferConfig::new(5.0, 0.25, 30),
        }
    }
}

/// Fly check.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlyConfig {
    /// Whether the check runs.
    pub enabled: bool,
    /// Allowed excess vertical rate per tick.
    pub vertical_tolerance: f64,
    /// Anomaly threshold.
    pub z_threshold: f64,
    /// Bucket tuning.
    pub buffer: BufferConfig,
}

impl Default for FlyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vertical_tolerance: 0.06,
            z_threshold: 3.0,
            buffer: BufferConfig::new(4.0, 0.25, 30),
        }
    }
}

/// Reach check.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReachConfig {
    /// Whether the check runs.
    pub enabled: bool,
    /// Maximum eye-to-target-center distance before ping compensation.
    pub max_reach: f64,
    /// Hitbox growth on every face, for cross-platform hitbox differences.
    #[serde(alias = "bedrockHitboxExtra")]
    pub hitbox_margin: f64,
    /// Minimum cosine between look direction and target direction.
    pub aim_dot_threshold: f64,
    /// Anomaly threshold.
    pub z_threshold: f64,
    /// Bucket tuning.
    pub buffer: BufferConfig,
}

impl Default for ReachConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_reach: 3.40,
            hitbox_margin: 0.10,
            aim_dot_threshold: 0.60,
            z_threshold: 3.0,
            buffer: BufferConfig::new(4.0, 0.20, 25),
        }
    }
}

/// Packet cadence check.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BadPacketsConfig {
    /// Whether the check runs.
    pub enabled: bool,
    /// Packets per second tolerated.
    pub max_packets_per_second: u32,
    /// Penalty for an interaction while sleeping.
    pub sleep_interact_grace: u32,
    /// Anomaly threshold.
    pub z_threshold: f64,
    /// Bucket tuning.
    pub buffer: BufferConfig,
}

impl Default for BadPacketsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_packets_per_second: 120,
            sleep_interact_grace: 2,
            z_threshold: 3.0,
            buffer: BufferConfig::new(6.0, 0.50, 10),
        }
    }
}

/// Escalation policy parameters.
///
/// The engine never acts on these; they are handed to the escalation hook.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PunishmentConfig {
    /// Violation level at which the policy takes its action.
    pub max_vl: u32,
    /// Violation level at which staff are alerted.
    pub alert_level: u32,
    /// Policy action name.
    pub action: String,
}

impl Default for PunishmentConfig {
    fn default() -> Self {
        Self {
            max_vl: 20,
            alert_level: 5,
            action: "notify".to_owned(),
        }
    }
}

fn positive(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{value} must be a positive number"),
        })
    }
}

fn non_negative(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{value} must be zero or positive"),
        })
    }
}

fn at_least(key: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{value} must be at least {min}"),
        })
    }
}

fn unit_interval(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{value} must be in (0, 1]"),
        })
    }
}
