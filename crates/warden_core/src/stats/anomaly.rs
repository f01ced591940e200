//! # Statistical Anomaly Buffer
//!
//! Self-calibrating outlier detector for one (entity, category) pair.
//!
//! ## How It Works
//!
//! ```text
//! value ──► z = (value - mean) / stddev ──► z > threshold ? level += 1
//!                                                          : level -= decay
//!                                          level >= max  ? FLAG
//! ```
//!
//! Mean and variance come from Welford's algorithm, so the baseline is the
//! entity's own history rather than a fixed absolute limit. The leaky bucket
//! means one spike never flags; only sustained deviation does.
//!
//! Each value is scored against the baseline as it stood *before* that value
//! arrived, then folded in. This deliberately departs from the plain
//! "update mean and variance, then score" order. Under that order the value
//! is already part of its own baseline, which caps the reachable z-score at
//! `(n - 1) / sqrt(n)` (2.04 at `n = 6`), so a short baseline could never
//! pass a threshold of 3.

/// Variance floor. Keeps z finite when the baseline is perfectly flat.
const VARIANCE_FLOOR: f64 = 1.0e-9;

/// Lowest accepted warm-up length.
pub const MIN_WARMUP_SAMPLES: u32 = 5;

/// Tuning for one [`AnomalyBuffer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferSettings {
    /// z-score above which a value counts as anomalous.
    pub z_threshold: f64,
    /// Bucket level at which the buffer flags.
    pub max_buffer: f64,
    /// Amount drained from the bucket by each non-anomalous value.
    pub decay: f64,
    /// Number of values needed before any value is scored.
    pub min_samples: u32,
}

impl BufferSettings {
    /// Creates settings. `min_samples` is raised to [`MIN_WARMUP_SAMPLES`].
    #[must_use]
    pub fn new(z_threshold: f64, max_buffer: f64, decay: f64, min_samples: u32) -> Self {
        Self {
            z_threshold,
            max_buffer,
            decay,
            min_samples: min_samples.max(MIN_WARMUP_SAMPLES),
        }
    }
}

/// Welford running statistics plus a decaying flag accumulator.
///
/// Invariants:
/// - `level` stays within `[0, max_buffer]`
/// - `count` only grows until [`reset`](Self::reset)
#[derive(Clone, Debug)]
pub struct AnomalyBuffer {
    /// Number of values folded into the baseline.
    count: u64,
    /// Running mean.
    mean: f64,
    /// Running sum of squared deviations from the mean.
    m2: f64,
    /// Current bucket level.
    level: f64,
    /// Tuning.
    settings: BufferSettings,
}

impl AnomalyBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new(settings: BufferSettings) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            level: 0.0,
            settings,
        }
    }

    /// Feeds one value and returns whether the buffer is flagging.
    ///
    /// Always returns false until `min_samples` values have been seen.
    /// Non-finite values are dropped without touching any state.
    pub fn sample(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }

        let prior_mean = self.mean;
        let prior_variance = self.variance();

        // Welford update
        self.count += 1;
        let delta = value - self.mean;
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);

        if self.count < u64::from(self.settings.min_samples) {
            return false;
        }

        let std_dev = prior_variance.max(VARIANCE_FLOOR).sqrt();
        let z = (value - prior_mean) / std_dev;

        if z > self.settings.z_threshold {
            self.level = (self.level + 1.0).min(self.settings.max_buffer);
        } else {
            self.level = (self.level - self.settings.decay).max(0.0);
        }

        self.level >= self.settings.max_buffer
    }

    /// Discards the baseline and the bucket.
    pub fn reset(&mut self) {
        self.count = 0;
        self.mean = 0.0;
        self.m2 = 0.0;
        self.level = 0.0;
    }

    /// Sample variance of the baseline (0 with fewer than two values).
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count > 1 {
            #[allow(clippy::cast_precision_loss)]
            let dof = (self.count - 1) as f64;
            self.m2 / dof
        } else {
            0.0
        }
    }

    /// Number of values seen since creation or the last reset.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Running mean.
    #[inline]
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Current bucket level.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> f64 {
        self.level
    }

    /// Whether the warm-up is complete.
    #[inline]
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.count >= u64::from(self.settings.min_samples)
    }

    /// The buffer's tuning.
    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &BufferSettings {
        &self.settings
    }
}
