//! Persistent cache for pairwise contradiction scores.
//!
//! The cache key is (question, unordered book pair): lookups and writes
//! normalize the pair by sorting, so (q, A, B) and (q, B, A) always resolve
//! to the same entry. Writes are upserts — last-write-wins is acceptable for
//! concurrent duplicate checks.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::record::BookId;

/// Contradiction scores keyed by bincode-encoded (low id, high id, question).
const CONSISTENCY_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("consistency");

/// Normalized cache key: the book pair is stored sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    question: String,
    low: BookId,
    high: BookId,
}

impl CacheKey {
    /// Build a key for a question and a book pair, in either order.
    pub fn new(question: impl Into<String>, a: BookId, b: BookId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            question: question.into(),
            low,
            high,
        }
    }

    /// The question text.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The smaller book id of the pair.
    pub fn low(&self) -> BookId {
        self.low
    }

    /// The larger book id of the pair.
    pub fn high(&self) -> BookId {
        self.high
    }

    fn encode(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(&(self.low.get(), self.high.get(), &self.question)).map_err(|e| {
            StoreError::Serialization {
                message: format!("failed to serialize cache key: {e}"),
            }
        })
    }
}

/// A cached contradiction verdict for one (question, book pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Contradiction percentage in 0–100.
    pub contradiction: u8,
    pub book1_answer: String,
    pub book2_answer: String,
    /// Seconds since UNIX epoch at write time.
    pub checked_at: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        contradiction: u8,
        book1_answer: impl Into<String>,
        book2_answer: impl Into<String>,
    ) -> Self {
        Self {
            contradiction: contradiction.min(100),
            book1_answer: book1_answer.into(),
            book2_answer: book2_answer.into(),
            checked_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

/// Injected cache dependency for the consistency check.
///
/// `put_many` writes a whole analyzer batch as one atomic unit: either every
/// entry lands or none does, so a failed request never leaves partial state.
pub trait ConsistencyCache: Send + Sync {
    /// Look up a normalized key.
    fn get(&self, key: &CacheKey) -> StoreResult<Option<CacheEntry>>;

    /// Upsert a batch of entries atomically.
    fn put_many(&self, entries: &[(CacheKey, CacheEntry)]) -> StoreResult<()>;

    /// Number of cached verdicts.
    fn len(&self) -> StoreResult<usize>;

    /// Whether the cache holds no verdicts.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory cache for tests and memory-only engines.
#[derive(Debug, Default)]
pub struct MemCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl MemCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsistencyCache for MemCache {
    fn get(&self, key: &CacheKey) -> StoreResult<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn put_many(&self, entries: &[(CacheKey, CacheEntry)]) -> StoreResult<()> {
        for (key, entry) in entries {
            self.entries.insert(key.clone(), entry.clone());
        }
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.len())
    }
}

/// Durable cache backed by redb; batches commit in one write transaction.
pub struct DurableCache {
    db: Arc<Database>,
}

impl DurableCache {
    /// Open or create the cache database in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("consistency.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        let txn = db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        txn.open_table(CONSISTENCY_TABLE)
            .map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl ConsistencyCache for DurableCache {
    fn get(&self, key: &CacheKey) -> StoreResult<Option<CacheEntry>> {
        let encoded = key.encode()?;
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn
            .open_table(CONSISTENCY_TABLE)
            .map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
        let value = table
            .get(encoded.as_slice())
            .map_err(|e| StoreError::Redb {
                message: format!("get failed: {e}"),
            })?;
        value
            .map(|guard| {
                bincode::deserialize(guard.value()).map_err(|e| StoreError::Serialization {
                    message: format!("failed to deserialize cache entry: {e}"),
                })
            })
            .transpose()
    }

    fn put_many(&self, entries: &[(CacheKey, CacheEntry)]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        {
            let mut table = txn
                .open_table(CONSISTENCY_TABLE)
                .map_err(|e| StoreError::Redb {
                    message: format!("open_table failed: {e}"),
                })?;
            for (key, entry) in entries {
                let encoded_key = key.encode()?;
                let encoded_entry =
                    bincode::serialize(entry).map_err(|e| StoreError::Serialization {
                        message: format!("failed to serialize cache entry: {e}"),
                    })?;
                table
                    .insert(encoded_key.as_slice(), encoded_entry.as_slice())
                    .map_err(|e| StoreError::Redb {
                        message: format!("insert failed: {e}"),
                    })?;
            }
        }
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn
            .open_table(CONSISTENCY_TABLE)
            .map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
        let len = table.len().map_err(|e| StoreError::Redb {
            message: format!("len failed: {e}"),
        })?;
        Ok(len as usize)
    }
}

impl std::fmt::Debug for DurableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCache").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn key_is_symmetric_under_pair_order() {
        let a = CacheKey::new("Q", BookId(2), BookId(9));
        let b = CacheKey::new("Q", BookId(9), BookId(2));
        assert_eq!(a, b);
        assert_eq!(a.low(), BookId(2));
        assert_eq!(a.high(), BookId(9));
    }

    #[test]
    fn mem_cache_upsert_replaces() {
        let cache = MemCache::new();
        let key = CacheKey::new("Q", BookId(1), BookId(2));
        cache
            .put_many(&[(key.clone(), CacheEntry::new(40, "a", "b"))])
            .unwrap();
        cache
            .put_many(&[(key.clone(), CacheEntry::new(70, "a", "b"))])
            .unwrap();
        assert_eq!(cache.get(&key).unwrap().unwrap().contradiction, 70);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn lookup_with_swapped_pair_hits() {
        let cache = MemCache::new();
        cache
            .put_many(&[(
                CacheKey::new("Q", BookId(5), BookId(3)),
                CacheEntry::new(25, "a", "b"),
            )])
            .unwrap();
        let hit = cache
            .get(&CacheKey::new("Q", BookId(3), BookId(5)))
            .unwrap();
        assert_eq!(hit.unwrap().contradiction, 25);
    }

    #[test]
    fn entry_clamps_percentage() {
        assert_eq!(CacheEntry::new(150, "a", "b").contradiction, 100);
    }

    #[test]
    fn durable_cache_persists_across_reopens() {
        let dir = TempDir::new().unwrap();
        let key = CacheKey::new("Q", BookId(1), BookId(2));
        {
            let cache = DurableCache::open(dir.path()).unwrap();
            cache
                .put_many(&[(key.clone(), CacheEntry::new(60, "a", "b"))])
                .unwrap();
        }
        let cache = DurableCache::open(dir.path()).unwrap();
        assert_eq!(cache.get(&key).unwrap().unwrap().contradiction, 60);
        assert_eq!(cache.len().unwrap(), 1);
        assert!(!cache.is_empty().unwrap());
    }

    #[test]
    fn durable_batch_is_atomic_unit() {
        let dir = TempDir::new().unwrap();
        let cache = DurableCache::open(dir.path()).unwrap();
        let batch: Vec<_> = (0..10u64)
            .map(|i| {
                (
                    CacheKey::new(format!("Q{i}"), BookId(1), BookId(2)),
                    CacheEntry::new(i as u8, "a", "b"),
                )
            })
            .collect();
        cache.put_many(&batch).unwrap();
        assert_eq!(cache.len().unwrap(), 10);
    }
}
