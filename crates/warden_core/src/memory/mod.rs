//! # Memory Management
//!
//! Recycling pools for scratch objects on the detection hot path.
//!
//! ## Design Philosophy
//!
//! Each worker owns its pools outright. There is no thread-local magic and
//! no cross-thread free list:
//! - `acquire` pops a recycled object or builds a fresh one
//! - `release` resets the object and keeps it unless the pool is full
//! - Ownership moves back into the pool on release, so a stale holder
//!   cannot exist

mod pool;

pub use pool::{ObjectPool, Poolable};
