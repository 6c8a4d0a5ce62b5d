//! # redb-backed Store
//!
//! A disk-backed [`KvStore`] using the redb embedded database.
//!
//! Every logical table is one redb table keyed by `(partition, sort)` string
//! tuples, so a partition is a contiguous key range and prefix queries are
//! plain range scans.
//!
//! Each trait call runs in its own transaction, which gives:
//! - Single-item atomicity (compare-and-swap reads and writes in one write txn)
//! - Crash safety (copy-on-write B-trees)
//! - Strongly consistent reads (MVCC, readers see the last commit)

use super::{Item, Key, KvStore, Query, Table};
use crate::ScooterError;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

type ItemTable = TableDefinition<'static, (&'static str, &'static str), &'static [u8]>;

/// redb table backing a logical table.
const fn definition(table: Table) -> ItemTable {
    TableDefinition::new(table.name())
}

fn storage_err(e: impl std::fmt::Display) -> ScooterError {
    ScooterError::StorageError(e.to_string())
}

/// A disk-backed key-value store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScooterError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            for table in Table::ALL {
                let _ = write_txn
                    .open_table(definition(table))
                    .map_err(storage_err)?;
            }
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, table: Table, key: &Key) -> Result<Option<Vec<u8>>, ScooterError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let t = read_txn.open_table(definition(table)).map_err(storage_err)?;
        Ok(t.get((key.partition.as_str(), key.sort.as_str()))
            .map_err(storage_err)?
            .map(|v| v.value().to_vec()))
    }

    fn put(&self, table: Table, key: &Key, value: &[u8]) -> Result<(), ScooterError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut t = write_txn
                .open_table(definition(table))
                .map_err(storage_err)?;
            t.insert((key.partition.as_str(), key.sort.as_str()), value)
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)
    }

    fn compare_and_swap(
        &self,
        table: Table,
        key: &Key,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, ScooterError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let swapped = {
            let mut t = write_txn
                .open_table(definition(table))
                .map_err(storage_err)?;
            let id = (key.partition.as_str(), key.sort.as_str());
            let current = t
                .get(id)
                .map_err(storage_err)?
                .map(|v| v.value().to_vec());

            if current.as_deref() != expected {
                false
            } else {
                match new {
                    Some(value) => {
                        t.insert(id, value).map_err(storage_err)?;
                    }
                    None => {
                        t.remove(id).map_err(storage_err)?;
                    }
                }
                true
            }
        };

        if swapped {
            write_txn.commit().map_err(storage_err)?;
        } else {
            write_txn.abort().map_err(storage_err)?;
        }
        Ok(swapped)
    }

    fn delete(&self, table: Table, key: &Key) -> Result<bool, ScooterError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let existed = {
            let mut t = write_txn
                .open_table(definition(table))
                .map_err(storage_err)?;
            t.remove((key.partition.as_str(), key.sort.as_str()))
                .map_err(storage_err)?
                .is_some()
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(existed)
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
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let t = read_txn.open_table(definition(table)).map_err(storage_err)?;

        let lower = lower.as_ref().map(|sort| (partition, sort.as_str()));
        let upper = upper.as_ref().map(|sort| (partition, sort.as_str()));
        let range = t
            .range::<(&str, &str)>((lower, upper))
            .map_err(storage_err)?;
        let limit = query.limit.unwrap_or(usize::MAX);

        let entries: Box<dyn Iterator<Item = _>> = if query.descending {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };

        let mut items = Vec::new();
        for entry in entries.take(limit) {
            let (k, v) = entry.map_err(storage_err)?;
            let (p, s) = k.value();
            items.push(Item {
                key: Key::new(p, s),
                value: v.value().to_vec(),
            });
        }
        Ok(items)
    }

    fn scan(&self, table: Table, limit: Option<usize>) -> Result<Vec<Item>, ScooterError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let t = read_txn.open_table(definition(table)).map_err(storage_err)?;

        let mut items = Vec::new();
        for entry in t
            .iter()
            .map_err(storage_err)?
            .take(limit.unwrap_or(usize::MAX))
        {
            let (k, v) = entry.map_err(storage_err)?;
            let (p, s) = k.value();
            items.push(Item {
                key: Key::new(p, s),
                value: v.value().to_vec(),
            });
        }
        Ok(items)
    }

    fn count(&self, table: Table) -> Result<usize, ScooterError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let t = read_txn.open_table(definition(table)).map_err(storage_err)?;
        Ok(t.len().map_err(storage_err)? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open() -> (tempfile::TempDir, RedbStore) {
        let dir = tempdir().expect("create temp dir");
        let store = RedbStore::open(dir.path().join("scooter.redb")).expect("open redb");
        (dir, store)
    }

    #[test]
    fn put_get_delete() {
        let (_dir, store) = open();
        let key = Key::single("u1");
        store.put(Table::Users, &key, b"profile").expect("put");
        assert_eq!(
            store.get(Table::Users, &key).expect("get"),
            Some(b"profile".to_vec())
        );
        assert!(store.delete(Table::Users, &key).expect("delete"));
        assert!(store.get(Table::Users, &key).expect("get").is_none());
    }

    #[test]
    fn conditional_insert_arbitrates() {
        let (_dir, store) = open();
        let key = Key::new("HANDLE", "bob");
        assert!(store.insert_if_absent(Table::Handles, &key, b"u1").expect("first"));
        assert!(!store.insert_if_absent(Table::Handles, &key, b"u2").expect("second"));
        assert!(!store
            .compare_and_swap(Table::Handles, &key, Some(b"u2"), None)
            .expect("stale cas"));
        assert!(store
            .compare_and_swap(Table::Handles, &key, Some(b"u1"), None)
            .expect("cas delete"));
    }

    #[test]
    fn range_query_descending_with_limit() {
        let (_dir, store) = open();
        for (p, s) in [("u", "001#a"), ("u", "002#b"), ("u", "003#c"), ("v", "004#d")] {
            store.put(Table::AuthorPosts, &Key::new(p, s), b"x").expect("put");
        }

        let items = store
            .query(Table::AuthorPosts, "u", &Query::all().descending().limit(2))
            .expect("query");
        let sorts: Vec<_> = items.iter().map(|i| i.key.sort.as_str()).collect();
        assert_eq!(sorts, vec!["003#c", "002#b"]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("scooter.redb");
        {
            let store = RedbStore::open(&path).expect("open");
            store
                .put(Table::Follows, &Key::new("a", "b"), b"edge")
                .expect("put");
        }
        let store = RedbStore::open(&path).expect("reopen");
        assert_eq!(store.count(Table::Follows).expect("count"), 1);
        assert_eq!(store.scan(Table::Follows, None).expect("scan").len(), 1);
    }
}
