//! # In-Memory Store
//!
//! A volatile [`KvStore`] over ordered maps. Used by tests and by
//! `scooter server --memory`.
//!
//! One `RwLock` guards all tables, so every single-item operation is
//! linearizable. A poisoned lock is reported as a storage error.

use super::{Item, Key, KvStore, Query, Table};
use crate::ScooterError;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Rows = BTreeMap<(String, String), Vec<u8>>;

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<Table, Rows>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Table, Rows>>, ScooterError> {
        self.tables
            .read()
            .map_err(|e| ScooterError::StorageError(format!("memory store poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Table, Rows>>, ScooterError> {
        self.tables
            .write()
            .map_err(|e| ScooterError::StorageError(format!("memory store poisoned: {e}")))
    }
}

fn row_key(key: &Key) -> (String, String) {
    (key.partition.clone(), key.sort.clone())
}

fn item((partition, sort): &(String, String), value: &[u8]) -> Item {
    Item {
        key: Key::new(partition.clone(), sort.clone()),
        value: value.to_vec(),
    }
}

impl KvStore for MemoryStore {
    fn get(&self, table: Table, key: &Key) -> Result<Option<Vec<u8>>, ScooterError> {
        let tables = self.read()?;
        Ok(tables
            .get(&table)
            .and_then(|rows| rows.get(&row_key(key)))
            .cloned())
    }

    fn put(&self, table: Table, key: &Key, value: &[u8]) -> Result<(), ScooterError> {
        let mut tables = self.write()?;
        tables
            .entry(table)
            .or_default()
            .insert(row_key(key), value.to_vec());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        table: Table,
        key: &Key,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, ScooterError> {
        let mut tables = self.write()?;
        let rows = tables.entry(table).or_default();
        let row = row_key(key);

        if rows.get(&row).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        match new {
            Some(value) => {
                rows.insert(row, value.to_vec());
            }
            None => {
                rows.remove(&row);
            }
        }
        Ok(true)
    }

    fn delete(&self, table: Table, key: &Key) -> Result<bool, ScooterError> {
        let mut tables = self.write()?;
        Ok(tables
            .get_mut(&table)
            .and_then(|rows| rows.remove(&row_key(key)))
            .is_some())
    }

    fn query(
        &self,
        table: Table,
        partition: &str,
        query: &Query,
    ) -> Result<Vec<Item>, ScooterError> {
        let Some((lower, upper)) = query.sort_bounds() else {
            return Ok(Vec::new());
        };
        let tables = self.read()?;
        let Some(rows) = tables.get(&table) else {
            return Ok(Vec::new());
        };

        let lower = lower.map(|sort| (partition.to_string(), sort));
        let upper = upper.map(|sort| (partition.to_string(), sort));
        let limit = query.limit.unwrap_or(usize::MAX);
        let range = rows.range((lower, upper));

        let items = if query.descending {
            range
                .rev()
                .take(limit)
                .map(|(k, v)| item(k, v))
                .collect()
        } else {
            range.take(limit).map(|(k, v)| item(k, v)).collect()
        };
        Ok(items)
    }

    fn scan(&self, table: Table, limit: Option<usize>) -> Result<Vec<Item>, ScooterError> {
        let tables = self.read()?;
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|(k, v)| item(k, v))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count(&self, table: Table) -> Result<usize, ScooterError> {
        let tables = self.read()?;
        Ok(tables.get(&table).map_or(0, BTreeMap::len))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sorts(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.key.sort.as_str()).collect()
    }

    #[test]
    fn cas_insert_if_absent_arbitrates() {
        let store = MemoryStore::new();
        let key = Key::new("HANDLE", "alice");

        assert!(store.insert_if_absent(Table::Handles, &key, b"u1").expect("first"));
        assert!(!store.insert_if_absent(Table::Handles, &key, b"u2").expect("second"));
        assert_eq!(
            store.get(Table::Handles, &key).expect("get"),
            Some(b"u1".to_vec())
        );
    }

    #[test]
    fn cas_requires_exact_bytes() {
        let store = MemoryStore::new();
        let key = Key::single("p1");
        store.put(Table::Posts, &key, b"v1").expect("put");

        assert!(!store
            .compare_and_swap(Table::Posts, &key, Some(b"other"), Some(b"v2"))
            .expect("cas"));
        assert!(store
            .compare_and_swap(Table::Posts, &key, Some(b"v1"), None)
            .expect("cas delete"));
        assert!(store.get(Table::Posts, &key).expect("get").is_none());
    }

    #[test]
    fn query_stays_inside_partition_and_prefix() {
        let store = MemoryStore::new();
        for (p, s) in [("a", "COUNT#x"), ("a", "USER#1"), ("a", "USER#2"), ("b", "USER#3")] {
            store.put(Table::Reactions, &Key::new(p, s), b"1").expect("put");
        }

        let users = store
            .query(Table::Reactions, "a", &Query::prefix("USER#"))
            .expect("query");
        assert_eq!(sorts(&users), vec!["USER#1", "USER#2"]);

        let newest = store
            .query(Table::Reactions, "a", &Query::all().descending().limit(1))
            .expect("query");
        assert_eq!(sorts(&newest), vec!["USER#2"]);
    }

    #[test]
    fn query_pages_with_cursor() {
        let store = MemoryStore::new();
        for s in ["1", "2", "3", "4"] {
            store.put(Table::Comments, &Key::new("p", s), b"c").expect("put");
        }

        let page = store
            .query(
                Table::Comments,
                "p",
                &Query::all().after(Some("2".to_string())).limit(1),
            )
            .expect("query");
        assert_eq!(sorts(&page), vec!["3"]);

        let back = store
            .query(
                Table::Comments,
                "p",
                &Query::all().descending().after(Some("2".to_string())),
            )
            .expect("query");
        assert_eq!(sorts(&back), vec!["1"]);
    }

    #[test]
    fn delete_and_count() {
        let store = MemoryStore::new();
        let key = Key::new("a", "b");
        store.put(Table::Follows, &key, b"e").expect("put");
        assert_eq!(store.count(Table::Follows).expect("count"), 1);
        assert!(store.delete(Table::Follows, &key).expect("delete"));
        assert!(!store.delete(Table::Follows, &key).expect("delete again"));
        assert_eq!(store.count(Table::Follows).expect("count"), 0);
    }
}
