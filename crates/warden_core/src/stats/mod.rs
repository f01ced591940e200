//! # Online Statistics
//!
//! Streaming estimators that never store the samples they have seen.
//!
//! - [`AnomalyBuffer`]: Welford mean/variance with a z-score leaky bucket
//! - [`RateTracker`]: fixed-window event counter

mod anomaly;
mod rate;

pub use anomaly::{AnomalyBuffer, BufferSettings};
pub use rate::RateTracker;
