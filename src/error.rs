//! Rich diagnostic error types for the silsila engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the silsila engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SilsilaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

impl SilsilaError {
    /// HTTP status an embedding transport should surface for this error.
    ///
    /// Invalid input maps to 400, quota exhaustion to 429, analyzer network
    /// failures to 503, analyzer timeouts to 504, everything else to 500.
    pub fn status_code(&self) -> u16 {
        match self {
            SilsilaError::Search(e) => e.status_code(),
            SilsilaError::Consistency(e) => e.status_code(),
            SilsilaError::Analyzer(e) => e.status_code(),
            SilsilaError::Quota(_) => 429,
            SilsilaError::Store(_) | SilsilaError::Engine(_) => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(silsila::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(silsila::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption — try running with a fresh data directory. \
             If the problem persists, file a bug report."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(silsila::store::serde),
        help(
            "Failed to serialize or deserialize stored data. \
             This usually means the stored data format has changed between versions. \
             Try re-ingesting your library."
        )
    )]
    Serialization { message: String },

    #[error("book not found: {book_id}")]
    #[diagnostic(
        code(silsila::store::book_not_found),
        help("The book id does not exist in the record store. List books with `silsila books`.")
    )]
    BookNotFound { book_id: u64 },

    #[error("malformed knowledge JSON: {message}")]
    #[diagnostic(
        code(silsila::store::ingest),
        help(
            "Knowledge files must be a JSON object keyed by keyword, either \
             {{keyword: {{question: {{answer: proof}}}}}} or {{keyword: {{question: answer}}}}."
        )
    )]
    Ingest { message: String },
}

// ---------------------------------------------------------------------------
// Path search errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("both start and end questions are required")]
    #[diagnostic(
        code(silsila::search::empty_question),
        help("Provide non-empty text for both the start and the end question.")
    )]
    EmptyQuestion,

    #[error("start and end questions cannot be the same")]
    #[diagnostic(
        code(silsila::search::same_question),
        help("Pick two different questions — a question is trivially connected to itself.")
    )]
    SameQuestion,

    #[error("path reconstruction exceeded the maximum of {max_paths} paths")]
    #[diagnostic(
        code(silsila::search::path_overflow),
        help(
            "The book graph is dense enough that the number of tied-shortest paths \
             exploded. Narrow the search with a category or doctrine filter."
        )
    )]
    PathOverflow { max_paths: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

impl SearchError {
    /// HTTP status an embedding transport should surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            SearchError::EmptyQuestion | SearchError::SameQuestion => 400,
            SearchError::PathOverflow { .. } | SearchError::Store(_) => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Consistency-check errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConsistencyError {
    #[error("invalid path index {index}: only {count} path(s) available")]
    #[diagnostic(
        code(silsila::consistency::invalid_path_index),
        help("Pass a path index between 0 and path_count - 1 from the path report.")
    )]
    InvalidPathIndex { index: usize, count: usize },

    #[error("path has only {count} book(s), need at least 2")]
    #[diagnostic(
        code(silsila::consistency::too_few_books),
        help(
            "Consistency is checked between consecutive books. A direct connection \
             (single book) has no book pair to compare."
        )
    )]
    TooFewBooks { count: usize },

    #[error("no shared questions found between consecutive books in the path")]
    #[diagnostic(
        code(silsila::consistency::no_shared_questions),
        help(
            "The path's books share no questions with recorded answers on both sides. \
             Re-run the path search — the library may have changed."
        )
    )]
    NoSharedQuestions,

    #[error("no consistency analyzer is configured")]
    #[diagnostic(
        code(silsila::consistency::no_analyzer),
        help("Construct the engine with `Engine::with_analyzer` before checking consistency.")
    )]
    NoAnalyzer,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Quota(#[from] QuotaError),
}

impl ConsistencyError {
    /// HTTP status an embedding transport should surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ConsistencyError::InvalidPathIndex { .. }
            | ConsistencyError::TooFewBooks { .. }
            | ConsistencyError::NoSharedQuestions => 400,
            ConsistencyError::Quota(_) => 429,
            ConsistencyError::Analyzer(e) => e.status_code(),
            ConsistencyError::NoAnalyzer | ConsistencyError::Store(_) => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AnalyzerError {
    #[error("analyzer returned status {code}")]
    #[diagnostic(
        code(silsila::analyzer::status),
        help("The analysis service rejected the request. Check the API key and model name.")
    )]
    Status { code: u16 },

    #[error("analyzer request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(silsila::analyzer::timeout),
        help("The analysis service did not answer in time. Try again later.")
    )]
    Timeout { timeout_secs: u64 },

    #[error("network error calling analyzer: {message}")]
    #[diagnostic(
        code(silsila::analyzer::network),
        help("Check your connection and that the analyzer base URL is reachable.")
    )]
    Network { message: String },

    #[error("failed to parse analyzer response: {message}")]
    #[diagnostic(
        code(silsila::analyzer::parse),
        help(
            "The model returned an unexpected response format. \
             Retrying usually helps; cached results are unaffected."
        )
    )]
    Parse { message: String },
}

impl AnalyzerError {
    /// HTTP status an embedding transport should surface for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AnalyzerError::Network { .. } => 503,
            AnalyzerError::Timeout { .. } => 504,
            AnalyzerError::Status { .. } | AnalyzerError::Parse { .. } => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Quota errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QuotaError {
    #[error("API call limit exceeded: used {used}/{limit} today, {needed} more needed")]
    #[diagnostic(
        code(silsila::quota::exhausted),
        help("The daily analyzer budget is spent. Try again tomorrow or raise the limit.")
    )]
    Exhausted { used: u32, limit: u32, needed: u32 },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(silsila::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(silsila::engine::data_dir),
        help(
            "The data directory could not be accessed. \
             Ensure the path exists and has read/write permissions."
        )
    )]
    DataDir { path: String },
}

/// Convenience alias for functions returning silsila results.
pub type SilsilaResult<T> = std::result::Result<T, SilsilaError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_silsila_error() {
        let err = StoreError::BookNotFound { book_id: 3 };
        let top: SilsilaError = err.into();
        assert!(matches!(
            top,
            SilsilaError::Store(StoreError::BookNotFound { .. })
        ));
        assert_eq!(top.status_code(), 500);
    }

    #[test]
    fn consistency_error_wraps_analyzer_error() {
        let err: ConsistencyError = AnalyzerError::Timeout { timeout_secs: 60 }.into();
        assert_eq!(err.status_code(), 504);

        let err: ConsistencyError = AnalyzerError::Network {
            message: "connection refused".into(),
        }
        .into();
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn invalid_input_maps_to_400() {
        assert_eq!(SearchError::SameQuestion.status_code(), 400);
        assert_eq!(
            ConsistencyError::InvalidPathIndex { index: 5, count: 2 }.status_code(),
            400
        );
        assert_eq!(ConsistencyError::TooFewBooks { count: 1 }.status_code(), 400);
    }

    #[test]
    fn quota_maps_to_429() {
        let top: SilsilaError = QuotaError::Exhausted {
            used: 20,
            limit: 20,
            needed: 1,
        }
        .into();
        assert_eq!(top.status_code(), 429);
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = QuotaError::Exhausted {
            used: 19,
            limit: 20,
            needed: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains("19/20"));
        assert!(msg.contains('2'));
    }
}
