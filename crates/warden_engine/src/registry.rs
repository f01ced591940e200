//! # Entity Registry
//!
//! Keyed store of per-entity state. Injected into the pipeline rather than
//! held in a global.
//!
//! ## Lifecycle
//!
//! ```text
//! Absent ──first contact──► Active ──reload──► Active ──disconnect──► Removed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use warden_core::BufferSettings;

use crate::checks::CheckId;
use crate::config::EngineConfig;
use crate::entity::{EntityIdentity, EntityKey, EntityState};

/// Anomaly buffer settings for newly created entities, in [`CheckId`] order.
#[must_use]
pub fn buffer_settings(config: &EngineConfig) -> [BufferSettings; CheckId::COUNT] {
    let checks = &config.checks;
    [
        checks.speed.buffer.settings(checks.speed.z_threshold),
        checks.fly.buffer.settings(checks.fly.z_threshold),
        checks.reach.buffer.settings(checks.reach.z_threshold),
        checks.bad_packets.buffer.settings(checks.bad_packets.z_threshold),
    ]
}

/// Concurrent map from entity key to state.
#[derive(Debug)]
pub struct EntityRegistry {
    entities: RwLock<HashMap<EntityKey, Arc<EntityState>>>,
    settings: RwLock<[BufferSettings; CheckId::COUNT]>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(settings: [BufferSettings; CheckId::COUNT]) -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            settings: RwLock::new(settings),
        }
    }

    /// Creates an empty registry using the configured buffer tuning.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(buffer_settings(config))
    }

    /// Stable key for an identity.
    #[inline]
    #[must_use]
    pub fn key_for(identity: &EntityIdentity) -> EntityKey {
        identity.key()
    }

    /// Returns the entity's state, creating it on first contact.
    ///
    /// Concurrent first contacts for the same key construct exactly one
    /// state and every caller receives it.
    pub fn get_or_create(&self, identity: &EntityIdentity) -> Arc<EntityState> {
        let key = identity.key();
        if let Some(state) = self.entities.read().get(&key) {
            return Arc::clone(state);
        }

        let mut entities = self.entities.write();
        let state = entities.entry(key).or_insert_with(|| {
            debug!(entity = %key, name = %identity.display_name, "entity registered");
            Arc::new(EntityState::new(key, identity.clone(), &self.settings.read()))
        });
        Arc::clone(state)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, key: EntityKey) -> Option<Arc<EntityState>> {
        self.entities.read().get(&key).cloned()
    }

    /// Removes an entity. Returns its state if it was registered.
    pub fn remove(&self, key: EntityKey) -> Option<Arc<EntityState>> {
        let removed = self.entities.write().remove(&key);
        if removed.is_some() {
            debug!(entity = %key, "entity removed");
        }
        removed
    }

    /// Every registered entity, at one point in time.
    #[must_use]
    pub fn states(&self) -> Vec<Arc<EntityState>> {
        self.entities.read().values().cloned().collect()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Whether no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Replaces the tuning used for entities created from now on.
    ///
    /// Existing entities keep their buffers and baselines.
    pub fn set_buffer_settings(&self, settings: [BufferSettings; CheckId::COUNT]) {
        *self.settings.write() = settings;
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    #[test]
    fn test_get_or_create_reuses_state() {
        let registry = EntityRegistry::default();
        let identity = EntityIdentity::named("Steve");

        let a = registry.get_or_create(&identity);
        let b = registry.get_or_create(&identity);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(EntityRegistry::key_for(&identity), a.key());
    }

    #[test]
    fn test_concurrent_first_contact() {
        const THREADS: usize = 16;

        let registry = Arc::new(EntityRegistry::default());
        let barrier = Arc::new(Barrier::new(THREADS));
        let identity = EntityIdentity::named("Herobrine");

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let identity = identity.clone();
                thread::spawn(move || {
                    barrier.wait();
                    (0..100)
                        .map(|_| registry.get_or_create(&identity))
                        .last()
                        .unwrap()
                })
            })
            .collect();

        let states: Vec<Arc<EntityState>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        for state in &states[1..] {
            assert!(Arc::ptr_eq(&states[0], state));
        }
    }

    #[test]
    fn test_remove() {
        let registry = EntityRegistry::default();
        let key = registry.get_or_create(&EntityIdentity::named("Alex")).key();

        assert!(registry.get(key).is_some());
        assert!(registry.remove(key).is_some());
        assert!(registry.get(key).is_none());
        assert!(registry.remove(key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_settings_apply_to_new_entities_only() {
        let registry = EntityRegistry::default();
        let old = registry.get_or_create(&EntityIdentity::named("old"));

        let quick = [BufferSettings::new(3.0, 1.0, 0.0, 5); CheckId::COUNT];
        registry.set_buffer_settings(quick);
        let new = registry.get_or_create(&EntityIdentity::named("new"));

        for _ in 0..5 {
            old.sample_buffer(CheckId::Speed, 0.0);
            new.sample_buffer(CheckId::Speed, 0.0);
        }
        // Five values are past warm-up only for the new tuning
        assert!(!new.sample_buffer(CheckId::Speed, 0.0));
        assert!(new.sample_buffer(CheckId::Speed, 1.0e6));
        assert!(!old.sample_buffer(CheckId::Speed, 1.0e6));
    }
}
