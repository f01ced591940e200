//! # Warden Core
//!
//! Leaf primitives shared by the detection engine:
//! - 3D vectors and axis-aligned boxes with slab-method ray tests
//! - Per-worker recycling pools for scratch objects
//! - Online statistics with adaptive thresholds
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - scratch objects are recycled
//! 2. **No shared state** - every type here is owned by exactly one caller
//! 3. **Degenerate input is clamped, never an error**
//!
//! ## Example
//!
//! ```rust
//! use warden_core::{AnomalyBuffer, BufferSettings};
//!
//! let mut buffer = AnomalyBuffer::new(BufferSettings::new(3.0, 5.0, 0.25, 5));
//! for _ in 0..5 {
//!     assert!(!buffer.sample(0.0));
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod math;
pub mod memory;
pub mod stats;

pub use math::{Aabb, Vec3};
pub use memory::{ObjectPool, Poolable};
pub use stats::{AnomalyBuffer, BufferSettings, RateTracker};
