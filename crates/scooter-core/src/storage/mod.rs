//! # Storage
//!
//! The single-item-atomic key-value abstraction every component is written
//! against, and its two backends.
//!
//! Items live in named tables and are addressed by a (partition, sort) pair of
//! strings. The store offers:
//! - point get / put / delete
//! - conditional put (compare-and-swap on the raw bytes, `None` meaning absent)
//! - ordered range queries within one partition by sort-key prefix
//! - bounded scans of a whole table
//!
//! Nothing spans more than one item. Multi-item mutations are ordered
//! sequences of these calls.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::ScooterError;
use std::ops::Bound;
use std::path::Path;

// =============================================================================
// TABLES
// =============================================================================

/// Logical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Users,
    Handles,
    Posts,
    AuthorPosts,
    Feed,
    Follows,
    Comments,
    Reactions,
    Notifications,
    NotificationIndex,
    Invites,
}

impl Table {
    /// Every table, in creation order.
    pub const ALL: [Self; 11] = [
        Self::Users,
        Self::Handles,
        Self::Posts,
        Self::AuthorPosts,
        Self::Feed,
        Self::Follows,
        Self::Comments,
        Self::Reactions,
        Self::Notifications,
        Self::NotificationIndex,
        Self::Invites,
    ];

    /// Stable table name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Handles => "handles",
            Self::Posts => "posts",
            Self::AuthorPosts => "author_posts",
            Self::Feed => "feed",
            Self::Follows => "follows",
            Self::Comments => "comments",
            Self::Reactions => "reactions",
            Self::Notifications => "notifications",
            Self::NotificationIndex => "notification_index",
            Self::Invites => "invites",
        }
    }
}

// =============================================================================
// KEYS AND QUERIES
// =============================================================================

/// Item address within a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub partition: String,
    pub sort: String,
}

impl Key {
    #[must_use]
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Key of a table that has one item per partition.
    #[must_use]
    pub fn single(partition: impl Into<String>) -> Self {
        Self::new(partition, "")
    }
}

/// A stored item returned by queries and scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: Key,
    pub value: Vec<u8>,
}

/// Range query within one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Only sort keys starting with this prefix are returned.
    pub prefix: String,
    /// Resume strictly after this sort key (in query direction).
    pub start_after: Option<String>,
    /// Maximum items returned.
    pub limit: Option<usize>,
    /// Newest (greatest sort key) first.
    pub descending: bool,
}

impl Query {
    /// Every item of the partition, ascending.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Items whose sort key starts with `prefix`.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    #[must_use]
    pub fn after(mut self, sort: Option<String>) -> Self {
        self.start_after = sort;
        self
    }

    /// Sort-key bounds of this query, or `None` when the range is empty.
    ///
    /// The returned range is always well-formed (start below end), which
    /// both backends rely on.
    pub(crate) fn sort_bounds(&self) -> Option<(Bound<String>, Bound<String>)> {
        let end = prefix_upper_bound(&self.prefix);
        let mut lower = Bound::Included(self.prefix.clone());
        let mut upper = Bound::Excluded(end.clone());

        if let Some(after) = &self.start_after {
            if self.descending {
                if after.as_str() <= self.prefix.as_str() {
                    return None;
                }
                if after.as_str() < end.as_str() {
                    upper = Bound::Excluded(after.clone());
                }
            } else {
                if after.as_str() >= end.as_str() {
                    return None;
                }
                if after.as_str() >= self.prefix.as_str() {
                    lower = Bound::Excluded(after.clone());
                }
            }
        }

        Some((lower, upper))
    }
}

/// Smallest string greater than every string starting with `prefix`
/// that the key scheme can produce.
fn prefix_upper_bound(prefix: &str) -> String {
    let mut end = String::with_capacity(prefix.len() + 4);
    end.push_str(prefix);
    end.push(char::MAX);
    end
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Single-item-atomic key-value store.
///
/// Implementations must be linearizable per item: a `compare_and_swap` that
/// returns `true` observed exactly the expected bytes and replaced them
/// without any interleaving write to the same key.
pub trait KvStore: Send + Sync {
    /// Read one item.
    fn get(&self, table: Table, key: &Key) -> Result<Option<Vec<u8>>, ScooterError>;

    /// Unconditionally write one item.
    fn put(&self, table: Table, key: &Key, value: &[u8]) -> Result<(), ScooterError>;

    /// Conditionally replace one item.
    ///
    /// `expected = None` requires the item to be absent; `new = None` deletes
    /// it. Returns `false` (and writes nothing) when the current value does
    /// not match.
    fn compare_and_swap(
        &self,
        table: Table,
        key: &Key,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, ScooterError>;

    /// Delete one item. Returns whether it existed.
    fn delete(&self, table: Table, key: &Key) -> Result<bool, ScooterError>;

    /// Ordered range query within one partition.
    fn query(&self, table: Table, partition: &str, query: &Query)
    -> Result<Vec<Item>, ScooterError>;

    /// Scan a whole table in key order.
    fn scan(&self, table: Table, limit: Option<usize>) -> Result<Vec<Item>, ScooterError>;

    /// Number of items in a table.
    fn count(&self, table: Table) -> Result<usize, ScooterError>;

    /// Insert only if absent. Returns whether this call created the item.
    fn insert_if_absent(&self, table: Table, key: &Key, value: &[u8]) -> Result<bool, ScooterError> {
        self.compare_and_swap(table, key, None, Some(value))
    }

    /// Read several items of one table, preserving order.
    fn get_many(&self, table: Table, keys: &[Key]) -> Result<Vec<Option<Vec<u8>>>, ScooterError> {
        keys.iter().map(|key| self.get(table, key)).collect()
    }
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend selection.
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile in-memory store.
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open or create a redb database at the given path.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, ScooterError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn store(&self) -> &dyn KvStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

impl KvStore for StorageBackend {
    fn get(&self, table: Table, key: &Key) -> Result<Option<Vec<u8>>, ScooterError> {
        self.store().get(table, key)
    }

    fn put(&self, table: Table, key: &Key, value: &[u8]) -> Result<(), ScooterError> {
        self.store().put(table, key, value)
    }

    fn compare_and_swap(
        &self,
        table: Table,
        key: &Key,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, ScooterError> {
        self.store().compare_and_swap(table, key, expected, new)
    }

    fn delete(&self, table: Table, key: &Key) -> Result<bool, ScooterError> {
        self.store().delete(table, key)
    }

    fn query(
        &self,
        table: Table,
        partition: &str,
        query: &Query,
    ) -> Result<Vec<Item>, ScooterError> {
        self.store().query(table, partition, query)
    }

    fn scan(&self, table: Table, limit: Option<usize>) -> Result<Vec<Item>, ScooterError> {
        self.store().scan(table, limit)
    }

    fn count(&self, table: Table) -> Result<usize, ScooterError> {
        self.store().count(table)
    }
}

// =============================================================================
// SORT KEYS
// =============================================================================

/// Time-ordered sort key: zero-padded millis, then a tie-breaking id.
///
/// Lexicographic order of these keys equals (time, id) order for every
/// non-negative timestamp below 10^13.
#[must_use]
pub fn time_key(millis: i64, id: &str) -> String {
    format!("{:013}#{}", millis.max(0), id)
}

// =============================================================================
// TESTS
// =============================================================================
