//! Record storage for silsila.
//!
//! The engine treats the record store as an injected collaborator behind the
//! [`RecordStore`] trait. Two implementations are provided:
//!
//! - [`MemRecords`] — concurrent hashmaps (DashMap), used for tests and
//!   memory-only engines
//! - [`DurableRecords`] — ACID transactions (redb) for persistent libraries
//!
//! Knowledge ingestion from the extraction pipeline's JSON output also lives
//! here, since it is a store-side concern.

pub mod durable;
pub mod mem;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::record::{Book, BookId, KnowledgeRecord, RecordFilter};

pub use durable::DurableRecords;
pub use mem::MemRecords;

/// Read/write interface to the (book, keyword, question, answer) records.
///
/// All read methods return deterministic orderings: books sorted by id,
/// questions in first-insertion order. Within one book, duplicate questions
/// resolve last-wins on lookup.
pub trait RecordStore: Send + Sync {
    /// Register a book. Re-registering the same id replaces the metadata.
    fn add_book(&self, book: &Book) -> StoreResult<()>;

    /// Append one knowledge record. The book must exist.
    fn add_record(&self, record: &KnowledgeRecord) -> StoreResult<()>;

    /// Fetch a book by id.
    fn book(&self, id: BookId) -> StoreResult<Option<Book>>;

    /// All books passing the filter, sorted by id. Books with zero records
    /// are included — they become isolated nodes in the book graph.
    fn books(&self, filter: &RecordFilter) -> StoreResult<Vec<Book>>;

    /// All books passing the filter that contain the exact question text,
    /// sorted by id.
    fn books_with_question(&self, question: &str, filter: &RecordFilter)
    -> StoreResult<Vec<Book>>;

    /// Distinct question texts of one book, in first-insertion order.
    fn questions_of(&self, book: BookId) -> StoreResult<Vec<String>>;

    /// The answer a book gives to a question (last-wins on duplicates).
    fn answer_for(&self, book: BookId, question: &str) -> StoreResult<Option<String>>;

    /// All records of one book, in insertion order.
    fn records_of(&self, book: BookId) -> StoreResult<Vec<KnowledgeRecord>>;

    /// The next unused book id (max existing id + 1).
    fn allocate_book_id(&self) -> StoreResult<BookId>;
}

/// Parse the extraction pipeline's knowledge JSON into records for `book`.
///
/// Two shapes are accepted, mirroring the pipeline's historical output:
///
/// - nested: `{keyword: {question: {answer: proof}}}` (proof may be null)
/// - flat:   `{keyword: {question: answer}}`
///
/// Non-object values under a keyword are skipped. Returns the number of
/// records added.
pub fn ingest_knowledge_json(
    store: &dyn RecordStore,
    book: BookId,
    json: &Value,
) -> StoreResult<usize> {
    let root = json.as_object().ok_or_else(|| StoreError::Ingest {
        message: "top level must be a JSON object keyed by keyword".into(),
    })?;

    let mut added = 0;
    for (keyword, questions) in root {
        let Some(questions) = questions.as_object() else {
            tracing::debug!(keyword, "skipping non-object value for keyword");
            continue;
        };

        for (question, answer_or_nested) in questions {
            match answer_or_nested {
                Value::Object(answers) => {
                    // Nested shape: {answer: proof}.
                    for (answer, proof) in answers {
                        let mut record =
                            KnowledgeRecord::new(book, keyword.clone(), question.clone(), answer);
                        if let Some(proof) = proof.as_str() {
                            record = record.with_proof(proof);
                        }
                        store.add_record(&record)?;
                        added += 1;
                    }
                }
                other => {
                    // Flat shape: the value is the answer text.
                    let answer = match other {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        v => v.to_string(),
                    };
                    store.add_record(&KnowledgeRecord::new(
                        book,
                        keyword.clone(),
                        question.clone(),
                        answer,
                    ))?;
                    added += 1;
                }
            }
        }
    }

    tracing::info!(book = %book, added, "ingested knowledge records");
    Ok(added)
}
