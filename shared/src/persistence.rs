//! Expiring staging snapshots keyed by instance and product
//!
//! Staging is a convenience cache, not the system of record: read problems
//! degrade to "nothing staged" and write problems are reported to the caller
//! to log, never to the user.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::{SnapshotError, StoreError};
use crate::models::{Interpretation, ProductContext, StagedEntry, StagingState};
use crate::snapshot::{decode_snapshot, encode_snapshot};

/// Default namespace for staging keys
pub const DEFAULT_NAMESPACE: &str = "inventory-staging";

/// Snapshots older than this are discarded on load
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// A string key-value store holding snapshots
pub trait StagingStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, used when no durable storage is available
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl StagingStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// Identifies one staging area: a product within a backend instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingKey {
    pub instance_id: String,
    pub product_id: String,
}

impl StagingKey {
    pub fn new(instance_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            product_id: product_id.into(),
        }
    }
}

/// What a load produced
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A usable snapshot; `dropped` entries failed validation
    Hydrated { state: StagingState, dropped: usize },
    Missing,
    Expired,
    Corrupt,
}

impl LoadOutcome {
    pub fn into_state(self) -> Option<StagingState> {
        match self {
            LoadOutcome::Hydrated { state, .. } => Some(state),
            _ => None,
        }
    }
}

/// Reads and writes staging snapshots through a [`StagingStore`]
#[derive(Debug, Clone)]
pub struct StagingPersistence<S> {
    store: S,
    namespace: String,
    max_age: Duration,
}

impl<S: StagingStore> StagingPersistence<S> {
    pub fn new(store: S, namespace: impl Into<String>, max_age: Duration) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            max_age,
        }
    }

    /// Persistence with the default namespace and 24 hour expiry
    pub fn with_defaults(store: S) -> Self {
        Self::new(store, DEFAULT_NAMESPACE, Duration::hours(DEFAULT_MAX_AGE_HOURS))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Storage key for a staging area
    ///
    /// Separators inside the parts are escaped so two different keys never
    /// collapse onto the same storage entry.
    pub fn storage_key(&self, key: &StagingKey) -> String {
        format!(
            "{}:{}:{}",
            escape_key_part(&self.namespace),
            escape_key_part(&key.instance_id),
            escape_key_part(&key.product_id)
        )
    }

    /// Load a snapshot, dropping it when stale and dropping entries that no
    /// longer fit the product context.
    pub fn load(&mut self, key: &StagingKey, context: &ProductContext, now: DateTime<Utc>) -> LoadOutcome {
        let storage_key = self.storage_key(key);

        let raw = match self.store.read(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadOutcome::Missing,
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "failed to read staging snapshot");
                return LoadOutcome::Missing;
            }
        };

        let decoded = match decode_snapshot(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.discard(&storage_key, &e);
                return LoadOutcome::Corrupt;
            }
        };

        if now - decoded.updated_at > self.max_age {
            tracing::debug!(key = %storage_key, updated_at = %decoded.updated_at, "staging snapshot expired");
            self.remove_quietly(&storage_key);
            return LoadOutcome::Expired;
        }

        let (mut state, mut dropped) = decoded.into_state();
        let before = state.entries.len();
        let interpretation = state.interpretation;
        state
            .entries
            .retain(|entry| fits_context(entry, context, interpretation));
        dropped += before - state.entries.len();

        if dropped > 0 {
            tracing::debug!(key = %storage_key, dropped, "dropped staged entries during hydration");
        }

        LoadOutcome::Hydrated { state, dropped }
    }

    /// Write a snapshot; an empty staging area removes the key instead
    pub fn save(&mut self, key: &StagingKey, state: &StagingState, now: DateTime<Utc>) -> Result<(), StoreError> {
        let storage_key = self.storage_key(key);
        if state.is_empty() {
            return self.store.remove(&storage_key);
        }
        self.store.write(&storage_key, &encode_snapshot(state, now))
    }

    pub fn clear(&mut self, key: &StagingKey) -> Result<(), StoreError> {
        let storage_key = self.storage_key(key);
        self.store.remove(&storage_key)
    }

    fn discard(&mut self, storage_key: &str, error: &SnapshotError) {
        tracing::warn!(key = %storage_key, error = %error, "discarding corrupt staging snapshot");
        self.remove_quietly(storage_key);
    }

    fn remove_quietly(&mut self, storage_key: &str) {
        if let Err(e) = self.store.remove(storage_key) {
            tracing::warn!(key = %storage_key, error = %e, "failed to remove staging snapshot");
        }
    }
}

/// Whether a loaded entry is still meaningful for the product as configured now
fn fits_context(entry: &StagedEntry, context: &ProductContext, interpretation: Interpretation) -> bool {
    match entry {
        StagedEntry::Tare(_) => context.has_tare_weight(),
        StagedEntry::Manual(_) => context.permits_manual(interpretation),
        _ => true,
    }
}

fn escape_key_part(part: &str) -> String {
    part.replace('%', "%25").replace(':', "%3A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeltaDirection, Interpretation, StagingAction};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn tared() -> ProductContext {
        ProductContext {
            tare_weight: Some(dec("50")),
            ..Default::default()
        }
    }

    #[test]
    fn test_storage_key_is_deterministic() {
        let persistence = StagingPersistence::new(MemoryStore::new(), "ns", Duration::hours(1));
        let key = StagingKey::new("home", "42");
        assert_eq!(persistence.storage_key(&key), "ns:home:42");
        assert_eq!(persistence.storage_key(&key), persistence.storage_key(&key.clone()));
    }

    #[test]
    fn test_separators_inside_ids_do_not_collide() {
        let mut persistence = StagingPersistence::new(MemoryStore::new(), "ns", Duration::hours(1));
        let a = StagingKey::new("home:1", "2");
        let b = StagingKey::new("home", "1:2");
        assert_ne!(persistence.storage_key(&a), persistence.storage_key(&b));
        assert_eq!(persistence.storage_key(&a), "ns:home%3A1:2");
        assert_ne!(
            persistence.storage_key(&StagingKey::new("home", "a%3Ab")),
            persistence.storage_key(&StagingKey::new("home", "a:b"))
        );

        let state = StagingState::new().apply(StagingAction::Add(StagedEntry::manual(dec("1")).unwrap()));
        persistence.save(&a, &state, now()).unwrap();
        assert_eq!(persistence.load(&b, &ProductContext::default(), now()), LoadOutcome::Missing);
    }

    #[test]
    fn test_load_missing() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let outcome = persistence.load(&StagingKey::new("a", "b"), &ProductContext::default(), now());
        assert_eq!(outcome, LoadOutcome::Missing);
    }

    #[test]
    fn test_save_then_load() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let key = StagingKey::new("home", "7");
        let state = StagingState::new()
            .apply(StagingAction::Add(StagedEntry::tare(dec("230"), dec("50")).unwrap()))
            .apply(StagingAction::SetInterpretation(Interpretation::Delta))
            .apply(StagingAction::SetDirection(DeltaDirection::Subtract));

        persistence.save(&key, &state, now()).unwrap();
        let loaded = persistence.load(&key, &tared(), now() + Duration::hours(3));
        assert_eq!(loaded, LoadOutcome::Hydrated { state, dropped: 0 });
    }

    #[test]
    fn test_expired_snapshot_is_removed() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let key = StagingKey::new("home", "7");
        let state = StagingState::new().apply(StagingAction::Add(StagedEntry::manual(dec("1")).unwrap()));
        persistence.save(&key, &state, now()).unwrap();

        let later = now() + Duration::hours(24) + Duration::milliseconds(1);
        assert_eq!(persistence.load(&key, &ProductContext::default(), later), LoadOutcome::Expired);
        assert!(persistence.store().is_empty());
    }

    #[test]
    fn test_snapshot_exactly_at_expiry_is_kept() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let key = StagingKey::new("home", "7");
        let state = StagingState::new().apply(StagingAction::Add(StagedEntry::manual(dec("1")).unwrap()));
        persistence.save(&key, &state, now()).unwrap();

        let outcome = persistence.load(&key, &ProductContext::default(), now() + Duration::hours(24));
        assert!(outcome.into_state().is_some());
    }

    #[test]
    fn test_corrupt_snapshot_is_removed() {
        let mut store = MemoryStore::new();
        store.write("inventory-staging:home:7", "{not json").unwrap();
        let mut persistence = StagingPersistence::with_defaults(store);

        let outcome = persistence.load(&StagingKey::new("home", "7"), &ProductContext::default(), now());
        assert_eq!(outcome, LoadOutcome::Corrupt);
        assert!(persistence.store().is_empty());
    }

    #[test]
    fn test_tare_entries_need_tare_weight() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let key = StagingKey::new("home", "7");
        let state = StagingState::new()
            .apply(StagingAction::Add(StagedEntry::tare(dec("230"), dec("50")).unwrap()))
            .apply(StagingAction::Add(StagedEntry::package(dec("1"), dec("100")).unwrap()));
        persistence.save(&key, &state, now()).unwrap();

        match persistence.load(&key, &ProductContext::default(), now()) {
            LoadOutcome::Hydrated { state, dropped } => {
                assert_eq!(dropped, 1);
                assert_eq!(state.entries.len(), 1);
                assert_eq!(state.entries[0].kind().as_str(), "package");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_manual_entries_dropped_for_absolute_tare_count() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let key = StagingKey::new("home", "7");
        let absolute = StagingState::new().apply(StagingAction::Add(StagedEntry::manual(dec("10")).unwrap()));
        persistence.save(&key, &absolute, now()).unwrap();
        let outcome = persistence.load(&key, &tared(), now());
        assert_eq!(
            outcome,
            LoadOutcome::Hydrated {
                state: StagingState::new(),
                dropped: 1
            }
        );

        let delta = absolute.apply(StagingAction::SetInterpretation(Interpretation::Delta));
        persistence.save(&key, &delta, now()).unwrap();
        let restored = persistence.load(&key, &tared(), now()).into_state().unwrap();
        assert_eq!(restored.entries.len(), 1);
    }

    #[test]
    fn test_saving_empty_state_removes_key() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let key = StagingKey::new("home", "7");
        let state = StagingState::new().apply(StagingAction::Add(StagedEntry::manual(dec("1")).unwrap()));
        persistence.save(&key, &state, now()).unwrap();
        assert_eq!(persistence.store().len(), 1);

        persistence.save(&key, &StagingState::new(), now()).unwrap();
        assert!(persistence.store().is_empty());
    }

    #[test]
    fn test_keys_are_isolated() {
        let mut persistence = StagingPersistence::with_defaults(MemoryStore::new());
        let a = StagingKey::new("home", "1");
        let b = StagingKey::new("home", "2");
        let state = StagingState::new().apply(StagingAction::Add(StagedEntry::manual(dec("1")).unwrap()));
        persistence.save(&a, &state, now()).unwrap();

        assert_eq!(persistence.load(&b, &ProductContext::default(), now()), LoadOutcome::Missing);
        persistence.clear(&a).unwrap();
        assert_eq!(persistence.load(&a, &ProductContext::default(), now()), LoadOutcome::Missing);
    }
}
