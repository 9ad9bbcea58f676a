//! Path annotation: the questions each book contributes to a path.
//!
//! A raw path is just a book sequence. The detailer decorates every book
//! with the questions worth highlighting: the boundary query questions on
//! the first and last book, plus every question shared with the adjacent
//! books. Purely additive — path selection is never affected.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::record::{Book, BookId};
use crate::store::RecordStore;

use super::paths::BookPath;

/// One book in a detailed path with its highlighted questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedBook {
    pub book_id: BookId,
    pub book_title: String,
    pub questions: Vec<String>,
}

/// A path with per-book question annotations, as consumed by presentation
/// layers and the consistency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedPath {
    pub path_id: usize,
    pub books: Vec<DetailedBook>,
}

impl DetailedPath {
    /// The detailed form of a direct connection: one book highlighting
    /// exactly the two query questions.
    pub fn direct(path_id: usize, book: &Book, start_question: &str, end_question: &str) -> Self {
        Self {
            path_id,
            books: vec![DetailedBook {
                book_id: book.id,
                book_title: book.display_title().to_string(),
                questions: vec![start_question.to_string(), end_question.to_string()],
            }],
        }
    }
}

/// Annotate every path with per-book question highlights.
///
/// For the book at position i the highlight list contains, in discovery
/// order and deduplicated: the start question (i = 0, when present), the
/// end question (i = last, when present), every question shared with book
/// i−1, and every question shared with book i+1.
pub fn detail_paths(
    store: &dyn RecordStore,
    paths: &[BookPath],
    start_question: &str,
    end_question: &str,
) -> StoreResult<Vec<DetailedPath>> {
    let mut detailed = Vec::with_capacity(paths.len());

    for (path_id, path) in paths.iter().enumerate() {
        let mut books = Vec::with_capacity(path.len());

        for (idx, step) in path.iter().enumerate() {
            let all_questions = store.questions_of(step.book_id)?;
            let mut highlights: Vec<String> = Vec::new();
            let push_unique = |q: &str, highlights: &mut Vec<String>| {
                if !highlights.iter().any(|h| h == q) {
                    highlights.push(q.to_string());
                }
            };

            if idx == 0 && all_questions.iter().any(|q| q == start_question) {
                push_unique(start_question, &mut highlights);
            }
            if idx == path.len() - 1 && all_questions.iter().any(|q| q == end_question) {
                push_unique(end_question, &mut highlights);
            }

            if idx > 0 {
                let prev: HashSet<String> =
                    store.questions_of(path[idx - 1].book_id)?.into_iter().collect();
                for q in &all_questions {
                    if prev.contains(q) {
                        push_unique(q, &mut highlights);
                    }
                }
            }
            if idx + 1 < path.len() {
                let next: HashSet<String> =
                    store.questions_of(path[idx + 1].book_id)?.into_iter().collect();
                for q in &all_questions {
                    if next.contains(q) {
                        push_unique(q, &mut highlights);
                    }
                }
            }

            books.push(DetailedBook {
                book_id: step.book_id,
                book_title: step.book_title.clone(),
                questions: highlights,
            });
        }

        detailed.push(DetailedPath { path_id, books });
    }

    Ok(detailed)
}
