//! # Object Pool
//!
//! Bounded free list for objects that are acquired and released per sample.

/// An object that can be recycled through an [`ObjectPool`].
pub trait Poolable {
    /// Returns the object to its canonical zero state.
    ///
    /// Heap capacity may be kept; observable contents must not.
    fn reset(&mut self);
}

impl<T> Poolable for Vec<T> {
    #[inline]
    fn reset(&mut self) {
        self.clear();
    }
}

/// A bounded recycling pool.
///
/// Objects are handed out by value and handed back by value, so the pool
/// is the only owner of a released object.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Give each worker its own.
///
/// # Example
///
/// ```rust
/// use warden_core::ObjectPool;
///
/// let mut pool: ObjectPool<Vec<f32>> = ObjectPool::new(64, Vec::new);
///
/// let mut scratch = pool.acquire();
/// scratch.push(1.0);
/// pool.release(scratch);
///
/// // Recycled, with prior contents gone
/// assert!(pool.acquire().is_empty());
/// ```
pub struct ObjectPool<T: Poolable> {
    /// Recycled objects ready for reuse.
    free: Vec<T>,
    /// Maximum number of objects kept for reuse.
    capacity: usize,
    /// Builds a new object when the free list is empty.
    factory: fn() -> T,
    /// Number of objects built by the factory.
    created: u64,
}

impl<T: Poolable> ObjectPool<T> {
    /// Creates an empty pool.
    ///
    /// The free list storage for `capacity` objects is reserved up front;
    /// the objects themselves are built lazily.
    #[must_use]
    pub fn new(capacity: usize, factory: fn() -> T) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
            factory,
            created: 0,
        }
    }

    /// Takes an object out of the pool.
    ///
    /// An empty pool is not an error; it falls back to the factory.
    #[inline]
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(obj) => obj,
            None => {
                self.created += 1;
                (self.factory)()
            }
        }
    }

    /// Gives an object back.
    ///
    /// The object is reset before it is stored. If the pool is already at
    /// capacity the object is dropped instead.
    #[inline]
    pub fn release(&mut self, mut obj: T) {
        if self.free.len() < self.capacity {
            obj.reset();
            self.free.push(obj);
        }
    }

    /// Returns the maximum number of recycled objects kept.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of objects waiting for reuse.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Returns how many objects the factory has built so far.
    #[inline]
    #[must_use]
    pub const fn created(&self) -> u64 {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scratch {
        value: u32,
    }

    impl Poolable for Scratch {
        fn reset(&mut self) {
            self.value = 0;
        }
    }

    #[test]
    fn test_pool_acquire_release() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::new(4, Scratch::default);

        let mut a = pool.acquire();
        a.value = 42;
        assert_eq!(pool.created(), 1);

        pool.release(a);
        assert_eq!(pool.available(), 1);

        let b = pool.acquire();
        assert_eq!(b.value, 0); // reset on release
        assert_eq!(pool.created(), 1); // reused, not rebuilt
    }

    #[test]
    fn test_pool_full_discards() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::new(1, Scratch::default);

        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        pool.release(b);

        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_vec_keeps_capacity() {
        let mut pool: ObjectPool<Vec<f32>> = ObjectPool::new(2, Vec::new);

        let mut v = pool.acquire();
        v.extend_from_slice(&[1.0, 2.0, 3.0]);
        let cap = v.capacity();
        pool.release(v);

        let v = pool.acquire();
        assert!(v.is_empty());
        assert_eq!(v.capacity(), cap);
    }
}
