//! In-memory tables and per-record locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::entities::{ImageRecord, Record};
use crate::error::RecordError;

// =============================================================================
// Stored Rows
// =============================================================================

/// A record together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: u64,
    #[serde(flatten)]
    pub record: T,
}

/// Serializable contents of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot<T> {
    pub next_id: u64,
    pub rows: Vec<Stored<T>>,
}

impl<T> Default for TableSnapshot<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// A table of records keyed by id.
///
/// Ids start at 1, increase monotonically and are never reused.
pub struct Table<T> {
    name: &'static str,
    rows: RwLock<BTreeMap<u64, T>>,
    next_id: AtomicU64,
}

impl<T: Record> Table<T> {
    /// Create an empty table.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Rebuild a table from a snapshot.
    ///
    /// `next_id` is raised past every stored id so ids are never reassigned.
    pub fn from_snapshot(name: &'static str, snapshot: TableSnapshot<T>) -> Self {
        let max_id = snapshot.rows.iter().map(|row| row.id).max().unwrap_or(0);
        let next_id = snapshot.next_id.max(max_id + 1);
        let rows = snapshot
            .rows
            .into_iter()
            .map(|row| (row.id, row.record))
            .collect();

        Self {
            name,
            rows: RwLock::new(rows),
            next_id: AtomicU64::new(next_id),
        }
    }

    /// Table name, used in errors and lock keys.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert a new record and assign it an id.
    pub async fn insert(&self, record: T) -> Result<Stored<T>, RecordError> {
        let mut rows = self.rows.write().await;
        self.check_unique(&rows, None, &record)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rows.insert(id, record.clone());
        Ok(Stored { id, record })
    }

    /// Overwrite every field of an existing record.
    pub async fn replace(&self, id: u64, record: T) -> Result<Stored<T>, RecordError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&id) {
            return Err(self.not_found(id));
        }
        self.check_unique(&rows, Some(id), &record)?;

        rows.insert(id, record.clone());
        Ok(Stored { id, record })
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: u64) -> Option<Stored<T>> {
        self.rows.read().await.get(&id).map(|record| Stored {
            id,
            record: record.clone(),
        })
    }

    /// Fetch a record by id, or `RecordError::NotFound`.
    pub async fn require(&self, id: u64) -> Result<Stored<T>, RecordError> {
        self.get(id).await.ok_or_else(|| self.not_found(id))
    }

    /// All records in id order.
    pub async fn list(&self) -> Vec<Stored<T>> {
        self.rows
            .read()
            .await
            .iter()
            .map(|(id, record)| Stored {
                id: *id,
                record: record.clone(),
            })
            .collect()
    }

    /// Remove a record.
    pub async fn remove(&self, id: u64) -> Result<Stored<T>, RecordError> {
        self.rows
            .write()
            .await
            .remove(&id)
            .map(|record| Stored { id, record })
            .ok_or_else(|| self.not_found(id))
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns true if the table has no records.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Copy the table contents for persistence.
    pub async fn snapshot(&self) -> TableSnapshot<T> {
        TableSnapshot {
            next_id: self.next_id.load(Ordering::SeqCst),
            rows: self.list().await,
        }
    }

    fn check_unique(
        &self,
        rows: &BTreeMap<u64, T>,
        own_id: Option<u64>,
        record: &T,
    ) -> Result<(), RecordError> {
        let Some(name) = record.unique_name() else {
            return Ok(());
        };

        let taken = rows
            .iter()
            .any(|(id, other)| Some(*id) != own_id && other.unique_name() == Some(name));

        if taken {
            return Err(RecordError::Duplicate {
                table: self.name,
                field: T::UNIQUE_FIELD,
                value: name.to_string(),
            });
        }
        Ok(())
    }

    fn not_found(&self, id: u64) -> RecordError {
        RecordError::NotFound {
            table: self.name,
            id,
        }
    }
}

impl<T: ImageRecord> Table<T> {
    /// Partial write: update only the image reference of a record.
    pub async fn set_image_ref(&self, id: u64, image_ref: &str) -> Result<Stored<T>, RecordError> {
        let mut rows = self.rows.write().await;
        let record = rows.get_mut(&id).ok_or_else(|| self.not_found(id))?;
        record.set_image_ref(image_ref.to_string());
        Ok(Stored {
            id,
            record: record.clone(),
        })
    }
}

// =============================================================================
// Keyed Locks
// =============================================================================

/// Registry of per-record async mutexes.
///
/// Serializes the read-previous-image / write / normalize sequence for one
/// record while leaving different records fully parallel. Entries are removed
/// once the last holder or waiter is gone.
#[derive(Default)]
pub struct KeyedLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Exclusive hold on one key. Released on drop.
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: impl Into<String>) -> KeyedGuard<'_> {
        let key = key.into();
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let guard = mutex.lock_owned().await;
        KeyedGuard {
            owner: self,
            key,
            _guard: guard,
        }
    }

    /// Lock key for a record in a table.
    pub fn record_key(table: &str, id: u64) -> String {
        format!("{}:{}", table, id)
    }

    /// Number of keys currently held or awaited.
    pub fn active(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        // The map and this guard hold the only references: nobody is waiting
        let idle = locks
            .get(&self.key)
            .map(|mutex| Arc::strong_count(mutex) <= 2)
            .unwrap_or(false);
        if idle {
            locks.remove(&self.key);
        }
    }
}
