//! In-memory record store backed by DashMap.
//!
//! The default backend for tests and memory-only engines. All data is lost
//! on process exit.

use dashmap::DashMap;

use crate::error::{StoreError, StoreResult};
use crate::record::{Book, BookId, KnowledgeRecord, RecordFilter};

use super::RecordStore;

/// Concurrent in-memory record store using sharded hashmaps.
#[derive(Debug)]
pub struct MemRecords {
    books: DashMap<BookId, Book>,
    records: DashMap<BookId, Vec<KnowledgeRecord>>,
}

impl MemRecords {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            records: DashMap::new(),
        }
    }

    /// Number of registered books.
    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Total number of records across all books.
    pub fn record_count(&self) -> usize {
        self.records.iter().map(|e| e.value().len()).sum()
    }
}

impl Default for MemRecords {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemRecords {
    fn add_book(&self, book: &Book) -> StoreResult<()> {
        self.books.insert(book.id, book.clone());
        self.records.entry(book.id).or_default();
        Ok(())
    }

    fn add_record(&self, record: &KnowledgeRecord) -> StoreResult<()> {
        if !self.books.contains_key(&record.book) {
            return Err(StoreError::BookNotFound {
                book_id: record.book.get(),
            });
        }
        self.records
            .entry(record.book)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn book(&self, id: BookId) -> StoreResult<Option<Book>> {
        Ok(self.books.get(&id).map(|b| b.value().clone()))
    }

    fn books(&self, filter: &RecordFilter) -> StoreResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .books
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        books.sort_by_key(|b| b.id);
        Ok(books)
    }

    fn books_with_question(
        &self,
        question: &str,
        filter: &RecordFilter,
    ) -> StoreResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .books
            .iter()
            .filter(|e| filter.matches(e.value()))
            .filter(|e| {
                self.records
                    .get(e.key())
                    .is_some_and(|rs| rs.value().iter().any(|r| r.question == question))
            })
            .map(|e| e.value().clone())
            .collect();
        books.sort_by_key(|b| b.id);
        Ok(books)
    }

    fn questions_of(&self, book: BookId) -> StoreResult<Vec<String>> {
        let Some(records) = self.records.get(&book) else {
            return Ok(vec![]);
        };
        let mut seen = std::collections::HashSet::new();
        let mut questions = Vec::new();
        for record in records.value() {
            if seen.insert(record.question.clone()) {
                questions.push(record.question.clone());
            }
        }
        Ok(questions)
    }

    fn answer_for(&self, book: BookId, question: &str) -> StoreResult<Option<String>> {
        Ok(self.records.get(&book).and_then(|rs| {
            rs.value()
                .iter()
                .rev()
                .find(|r| r.question == question)
                .map(|r| r.answer.clone())
        }))
    }

    fn records_of(&self, book: BookId) -> StoreResult<Vec<KnowledgeRecord>> {
        Ok(self
            .records
            .get(&book)
            .map(|rs| rs.value().clone())
            .unwrap_or_default())
    }

    fn allocate_book_id(&self) -> StoreResult<BookId> {
        let max = self.books.iter().map(|e| e.key().0).max().unwrap_or(0);
        Ok(BookId(max + 1))
    }
}
