//! Cross-book consistency analysis over a discovered path.
//!
//! Given a detailed path, every question shared between consecutive books is
//! compared: how much do the two books' answers contradict each other? The
//! expensive pairwise verdicts come from an external analyzer and are cached
//! under a normalized (question, book pair) key, so identical comparisons
//! are never recomputed.

pub mod cache;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConsistencyError, StoreResult};
use crate::graph::detail::DetailedPath;
use crate::record::BookId;
use crate::store::RecordStore;

pub use cache::{CacheEntry, CacheKey, ConsistencyCache, DurableCache, MemCache};

/// A question shared by two consecutive books, with both answers.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionQuestion {
    pub question: String,
    pub book1_id: BookId,
    pub book2_id: BookId,
    pub book1_title: String,
    pub book2_title: String,
    pub book1_answer: String,
    pub book2_answer: String,
}

/// One scored comparison in the consistency report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionComparison {
    pub question: String,
    pub book1_id: BookId,
    pub book2_id: BookId,
    pub book1_title: String,
    pub book2_title: String,
    pub book1_answer: String,
    pub book2_answer: String,
    pub contradiction_percentage: u8,
    pub from_cache: bool,
}

impl QuestionComparison {
    fn from_intersection(item: IntersectionQuestion, score: u8, from_cache: bool) -> Self {
        Self {
            question: item.question,
            book1_id: item.book1_id,
            book2_id: item.book2_id,
            book1_title: item.book1_title,
            book2_title: item.book2_title,
            book1_answer: item.book1_answer,
            book2_answer: item.book2_answer,
            contradiction_percentage: score,
            from_cache,
        }
    }
}

/// Enumerate the FULL shared-question set of every consecutive book pair.
///
/// This deliberately re-queries the store instead of reusing the path's
/// highlight lists: an edge records one representative question, while the
/// consistency check must compare every shared one. Questions missing an
/// answer on either side are skipped. Errors when no comparable question
/// exists in the whole path.
pub fn collect_intersections(
    store: &dyn RecordStore,
    path: &DetailedPath,
) -> Result<Vec<IntersectionQuestion>, ConsistencyError> {
    if path.books.len() < 2 {
        return Err(ConsistencyError::TooFewBooks {
            count: path.books.len(),
        });
    }

    let mut intersections = Vec::new();
    for pair in path.books.windows(2) {
        let (book1, book2) = (&pair[0], &pair[1]);
        let book1_questions = store.questions_of(book1.book_id)?;
        let book2_questions: HashSet<String> =
            store.questions_of(book2.book_id)?.into_iter().collect();

        let mut shared = 0;
        for question in &book1_questions {
            if !book2_questions.contains(question) {
                continue;
            }
            shared += 1;
            let answer1 = store.answer_for(book1.book_id, question)?;
            let answer2 = store.answer_for(book2.book_id, question)?;
            if let (Some(book1_answer), Some(book2_answer)) = (answer1, answer2) {
                intersections.push(IntersectionQuestion {
                    question: question.clone(),
                    book1_id: book1.book_id,
                    book2_id: book2.book_id,
                    book1_title: book1.book_title.clone(),
                    book2_title: book2.book_title.clone(),
                    book1_answer,
                    book2_answer,
                });
            }
        }
        tracing::debug!(
            book1 = %book1.book_id,
            book2 = %book2.book_id,
            shared,
            "collected intersection questions"
        );
    }

    if intersections.is_empty() {
        return Err(ConsistencyError::NoSharedQuestions);
    }
    Ok(intersections)
}

/// Split intersection questions into cache hits and misses.
///
/// Hits become finished comparisons; misses are returned for analysis.
pub fn partition_cached(
    cache: &dyn ConsistencyCache,
    items: Vec<IntersectionQuestion>,
) -> StoreResult<(Vec<QuestionComparison>, Vec<IntersectionQuestion>)> {
    let mut hits = Vec::new();
    let mut misses = Vec::new();

    for item in items {
        let key = CacheKey::new(&item.question, item.book1_id, item.book2_id);
        match cache.get(&key)? {
            Some(entry) => {
                tracing::debug!(question = %item.question, low = %key.low(), high = %key.high(), "cache hit");
                hits.push(QuestionComparison::from_intersection(
                    item,
                    entry.contradiction,
                    true,
                ));
            }
            None => {
                tracing::debug!(question = %item.question, low = %key.low(), high = %key.high(), "cache miss");
                misses.push(item);
            }
        }
    }

    Ok((hits, misses))
}

/// Group cache misses by question text for one batched analyzer request.
///
/// A question shared by several book pairs pools all its answers under one
/// key; the analyzer's single score for that question then applies to every
/// pair. BTreeMap keeps the request deterministic.
pub fn group_for_analysis(misses: &[IntersectionQuestion]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in misses {
        let answers = grouped.entry(item.question.clone()).or_default();
        answers.push(item.book1_answer.clone());
        answers.push(item.book2_answer.clone());
    }
    grouped
}

/// Score for a question the analyzer did not answer: maximally uncertain.
pub const DEFAULT_CONTRADICTION: u8 = 50;

/// Apply analyzer scores to the misses.
///
/// Returns the cache entries to upsert (one atomic batch) and the finished
/// comparisons. A question absent from the score map defaults to
/// [`DEFAULT_CONTRADICTION`].
pub fn apply_scores(
    misses: Vec<IntersectionQuestion>,
    scores: &HashMap<String, u8>,
) -> (Vec<(CacheKey, CacheEntry)>, Vec<QuestionComparison>) {
    let mut entries = Vec::with_capacity(misses.len());
    let mut comparisons = Vec::with_capacity(misses.len());

    for item in misses {
        let score = scores
            .get(&item.question)
            .copied()
            .unwrap_or(DEFAULT_CONTRADICTION);
        entries.push((
            CacheKey::new(&item.question, item.book1_id, item.book2_id),
            CacheEntry::new(score, &item.book1_answer, &item.book2_answer),
        ));
        comparisons.push(QuestionComparison::from_intersection(item, score, false));
    }

    (entries, comparisons)
}

/// Simple mean of the contradiction percentages, rounded to one decimal.
/// Empty input yields 0.
pub fn average_contradiction(results: &[QuestionComparison]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let sum: u64 = results
        .iter()
        .map(|r| r.contradiction_percentage as u64)
        .sum();
    let mean = sum as f64 / results.len() as f64;
    (mean * 10.0).round() / 10.0
}
