//! ACID-durable record store backed by redb.
//!
//! Books and their records survive crashes; all writes go through
//! transactions and reads use MVCC snapshots.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use crate::error::{StoreError, StoreResult};
use crate::record::{Book, BookId, KnowledgeRecord, RecordFilter};

use super::RecordStore;

/// Book metadata, keyed by book id (bincode-encoded [`Book`]).
const BOOKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("books");

/// Per-book record lists, keyed by book id (bincode-encoded `Vec<KnowledgeRecord>`).
const RECORDS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Durable record store using redb.
pub struct DurableRecords {
    db: Arc<Database>,
}

impl DurableRecords {
    /// Open or create a durable record store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("library.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create the tables up front so reads never race table creation.
        let txn = db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        {
            txn.open_table(BOOKS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
        }
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Number of registered books.
    pub fn book_count(&self) -> StoreResult<usize> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(BOOKS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let len = table.len().map_err(|e| StoreError::Redb {
            message: format!("len failed: {e}"),
        })?;
        Ok(len as usize)
    }

    fn all_books(&self) -> StoreResult<Vec<Book>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(BOOKS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let iter = table.iter().map_err(|e| StoreError::Redb {
            message: format!("iter failed: {e}"),
        })?;

        let mut books = Vec::new();
        for entry in iter {
            let (_, value) = entry.map_err(|e| StoreError::Redb {
                message: format!("iter failed: {e}"),
            })?;
            books.push(decode_book(value.value())?);
        }
        Ok(books)
    }

    fn records_blob(&self, book: BookId) -> StoreResult<Option<Vec<KnowledgeRecord>>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let value = table.get(book.get()).map_err(|e| StoreError::Redb {
            message: format!("get failed: {e}"),
        })?;
        value.map(|guard| decode_records(guard.value())).transpose()
    }
}

fn decode_book(bytes: &[u8]) -> StoreResult<Book> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to deserialize book: {e}"),
    })
}

fn decode_records(bytes: &[u8]) -> StoreResult<Vec<KnowledgeRecord>> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to deserialize records: {e}"),
    })
}

fn encode<T: serde::Serialize>(value: &T, what: &str) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization {
        message: format!("failed to serialize {what}: {e}"),
    })
}

impl RecordStore for DurableRecords {
    fn add_book(&self, book: &Book) -> StoreResult<()> {
        let encoded = encode(book, "book")?;
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        {
            let mut table = txn.open_table(BOOKS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            table
                .insert(book.id.get(), encoded.as_slice())
                .map_err(|e| StoreError::Redb {
                    message: format!("insert failed: {e}"),
                })?;
        }
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(())
    }

    fn add_record(&self, record: &KnowledgeRecord) -> StoreResult<()> {
        if self.book(record.book)?.is_none() {
            return Err(StoreError::BookNotFound {
                book_id: record.book.get(),
            });
        }

        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        {
            let mut table = txn.open_table(RECORDS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            let mut records = match table.get(record.book.get()).map_err(|e| StoreError::Redb {
                message: format!("get failed: {e}"),
            })? {
                Some(guard) => decode_records(guard.value())?,
                None => Vec::new(),
            };
            records.push(record.clone());
            let encoded = encode(&records, "records")?;
            table
                .insert(record.book.get(), encoded.as_slice())
                .map_err(|e| StoreError::Redb {
                    message: format!("insert failed: {e}"),
                })?;
        }
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(())
    }

    fn book(&self, id: BookId) -> StoreResult<Option<Book>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(BOOKS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let value = table.get(id.get()).map_err(|e| StoreError::Redb {
            message: format!("get failed: {e}"),
        })?;
        value.map(|guard| decode_book(guard.value())).transpose()
    }

    fn books(&self, filter: &RecordFilter) -> StoreResult<Vec<Book>> {
        // Iteration is already in key order; filtering preserves it.
        Ok(self
            .all_books()?
            .into_iter()
            .filter(|b| filter.matches(b))
            .collect())
    }

    fn books_with_question(
        &self,
        question: &str,
        filter: &RecordFilter,
    ) -> StoreResult<Vec<Book>> {
        let mut books = Vec::new();
        for book in self.books(filter)? {
            let contains = self
                .records_blob(book.id)?
                .is_some_and(|rs| rs.iter().any(|r| r.question == question));
            if contains {
                books.push(book);
            }
        }
        Ok(books)
    }

    fn questions_of(&self, book: BookId) -> StoreResult<Vec<String>> {
        let Some(records) = self.records_blob(book)? else {
            return Ok(vec![]);
        };
        let mut seen = std::collections::HashSet::new();
        let mut questions = Vec::new();
        for record in records {
            if seen.insert(record.question.clone()) {
                questions.push(record.question);
            }
        }
        Ok(questions)
    }

    fn answer_for(&self, book: BookId, question: &str) -> StoreResult<Option<String>> {
        Ok(self.records_blob(book)?.and_then(|rs| {
            rs.iter()
                .rev()
                .find(|r| r.question == question)
                .map(|r| r.answer.clone())
        }))
    }

    fn records_of(&self, book: BookId) -> StoreResult<Vec<KnowledgeRecord>> {
        Ok(self.records_blob(book)?.unwrap_or_default())
    }

    fn allocate_book_id(&self) -> StoreResult<BookId> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(BOOKS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let last = table
            .iter()
            .map_err(|e| StoreError::Redb {
                message: format!("iter failed: {e}"),
            })?
            .next_back()
            .transpose()
            .map_err(|e| StoreError::Redb {
                message: format!("iter failed: {e}"),
            })?;
        Ok(BookId(last.map(|(k, _)| k.value()).unwrap_or(0) + 1))
    }
}

impl std::fmt::Debug for DurableRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableRecords").finish()
    }
}
