//! # Context
//!
//! Shared handles passed to every component: the store, the clock and the
//! injected configuration, plus typed record helpers over the raw
//! [`KvStore`] interface.

use crate::formats::{decode, encode};
use crate::primitives::MAX_CAS_RETRIES;
use crate::storage::{Key, KvStore, Query, Table};
use crate::{Clock, CoreConfig, ScooterError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a read-modify-write step.
pub(crate) enum Change<T> {
    /// Leave the item as it is.
    Keep,
    /// Replace (or create) the item.
    Put(T),
    /// Delete the item.
    Remove,
}

/// Store, clock and configuration shared by the components.
#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) store: Arc<dyn KvStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: Arc<CoreConfig>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub(crate) fn load<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &Key,
    ) -> Result<Option<T>, ScooterError> {
        self.store
            .get(table, key)?
            .as_deref()
            .map(decode)
            .transpose()
    }

    pub(crate) fn load_many<T: DeserializeOwned>(
        &self,
        table: Table,
        keys: &[Key],
    ) -> Result<Vec<Option<T>>, ScooterError> {
        self.store
            .get_many(table, keys)?
            .into_iter()
            .map(|raw| raw.as_deref().map(decode).transpose())
            .collect()
    }

    pub(crate) fn save<T: Serialize>(
        &self,
        table: Table,
        key: &Key,
        record: &T,
    ) -> Result<(), ScooterError> {
        self.store.put(table, key, &encode(record)?)
    }

    /// Conditional insert. Returns whether this call created the item.
    pub(crate) fn create<T: Serialize>(
        &self,
        table: Table,
        key: &Key,
        record: &T,
    ) -> Result<bool, ScooterError> {
        self.store.insert_if_absent(table, key, &encode(record)?)
    }

    pub(crate) fn remove(&self, table: Table, key: &Key) -> Result<bool, ScooterError> {
        self.store.delete(table, key)
    }

    /// Range query decoding every value.
    pub(crate) fn query<T: DeserializeOwned>(
        &self,
        table: Table,
        partition: &str,
        query: &Query,
    ) -> Result<Vec<(Key, T)>, ScooterError> {
        self.store
            .query(table, partition, query)?
            .into_iter()
            .map(|item| Ok((item.key, decode(&item.value)?)))
            .collect()
    }

    /// Bounded compare-and-swap loop over one item.
    ///
    /// `step` sees the current record (or `None`) and decides the change. It
    /// may run several times. Returns the record left in place.
    pub(crate) fn update<T, F>(
        &self,
        table: Table,
        key: &Key,
        mut step: F,
    ) -> Result<Option<T>, ScooterError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(Option<T>) -> Result<Change<T>, ScooterError>,
    {
        for attempt in 0..MAX_CAS_RETRIES {
            let raw = self.store.get(table, key)?;
            let current = raw.as_deref().map(decode::<T>).transpose()?;

            let (bytes, next) = match step(current)? {
                Change::Keep => return raw.as_deref().map(decode).transpose(),
                Change::Put(next) => (Some(encode(&next)?), Some(next)),
                Change::Remove => (None, None),
            };

            if self
                .store
                .compare_and_swap(table, key, raw.as_deref(), bytes.as_deref())?
            {
                return Ok(next);
            }
            debug!(
                table = table.name(),
                partition = %key.partition,
                attempt,
                "compare-and-swap lost, retrying"
            );
        }

        Err(ScooterError::Contention(format!(
            "{}/{}/{}",
            table.name(),
            key.partition,
            key.sort
        )))
    }

    /// Add `delta` to a counter item, creating it at zero. Returns the new value.
    pub(crate) fn adjust_counter(
        &self,
        table: Table,
        key: &Key,
        delta: i64,
    ) -> Result<i64, ScooterError> {
        let value = self.update::<i64, _>(table, key, |current| {
            Ok(Change::Put(current.unwrap_or(0).saturating_add(delta)))
        })?;
        Ok(value.unwrap_or(0))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{ManualClock, MemoryStore};

    pub(crate) fn memory_context(config: CoreConfig) -> Context {
        Context {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::default()),
            config: Arc::new(config),
        }
    }

    #[test]
    fn counter_adjusts_from_zero() {
        let ctx = memory_context(CoreConfig::default());
        let key = Key::new("p1", "COUNT#x");
        assert_eq!(ctx.adjust_counter(Table::Reactions, &key, 1).expect("inc"), 1);
        assert_eq!(ctx.adjust_counter(Table::Reactions, &key, 1).expect("inc"), 2);
        assert_eq!(ctx.adjust_counter(Table::Reactions, &key, -3).expect("dec"), -1);
    }

    #[test]
    fn update_keep_returns_current() {
        let ctx = memory_context(CoreConfig::default());
        let key = Key::single("x");
        ctx.save(Table::Users, &key, &7_i64).expect("save");
        let kept = ctx
            .update::<i64, _>(Table::Users, &key, |_| Ok(Change::Keep))
            .expect("update");
        assert_eq!(kept, Some(7));

        let removed = ctx
            .update::<i64, _>(Table::Users, &key, |_| Ok(Change::Remove))
            .expect("remove");
        assert_eq!(removed, None);
        assert!(ctx.load::<i64>(Table::Users, &key).expect("load").is_none());
    }

    #[test]
    fn update_gives_up_under_constant_interference() {
        let ctx = memory_context(CoreConfig::default());
        let key = Key::single("hot");
        let store = Arc::clone(&ctx.store);
        let mut n = 0_i64;

        let err = ctx
            .update::<i64, _>(Table::Users, &key, |_| {
                // A competing writer sneaks in before every swap.
                n += 1;
                store.put(Table::Users, &key, &encode(&n)?)?;
                Ok(Change::Put(0))
            })
            .expect_err("contention");
        assert!(matches!(err, ScooterError::Contention(_)));
    }
}
