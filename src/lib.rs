// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # silsila
//!
//! A knowledge-network engine: books contribute questions, books sharing a
//! question are connected, and silsila discovers how two arbitrary questions
//! are linked through a chain of books.
//!
//! ## Architecture
//!
//! - **Records** (`record`, `store`): (book, keyword, question, answer) units
//!   behind an injectable store trait, in-memory or durable (redb)
//! - **Graph core** (`graph`): per-request book graph, all-shortest-paths BFS,
//!   per-hop shared-question annotation
//! - **Consistency** (`consistency`, `analyzer`, `quota`): cached pairwise
//!   contradiction analysis via an external collaborator
//! - **Boundary** (`report`, `export`): wire-shaped JSON responses and
//!   visualization node/edge lists
//!
//! ## Library usage
//!
//! ```no_run
//! use silsila::engine::{Engine, EngineConfig};
//! use silsila::record::{Book, BookId, KnowledgeRecord, OwnerId, RecordFilter};
//! use silsila::store::RecordStore;
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let owner = OwnerId(1);
//! let book = BookId(1);
//! engine.store().add_book(&Book::new(book, owner, "kitab.pdf")).unwrap();
//! engine
//!     .store()
//!     .add_record(&KnowledgeRecord::new(book, "prayer", "Is wudu required?", "Yes."))
//!     .unwrap();
//! let report = engine
//!     .find_question_path(&RecordFilter::for_owner(owner), "Is wudu required?", "What breaks it?")
//!     .unwrap();
//! println!("{}", report.message);
//! ```

pub mod analyzer;
pub mod consistency;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod quota;
pub mod record;
pub mod report;
pub mod store;
