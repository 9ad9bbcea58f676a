//! Wire-shaped response types for embedding transports.
//!
//! These serialize to the JSON contract consumed by front-ends: a path
//! report, a consistency report, and a narrative report. Field names are
//! part of the contract — change them and every consumer breaks.

use serde::{Deserialize, Serialize};

use crate::consistency::QuestionComparison;
use crate::graph::detail::DetailedPath;
use crate::graph::paths::BookPath;

/// Outcome of a path-discovery request.
///
/// A miss ("not found") is a structured result, not an error: `found` is
/// false and only `message` is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathReport {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_length: Option<usize>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<BookPath>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_paths: Option<Vec<DetailedPath>>,
}

impl PathReport {
    /// A successful report. Counts are derived from the paths; all returned
    /// paths share the same length by construction.
    pub fn found(
        start_question: &str,
        end_question: &str,
        message: String,
        paths: Vec<BookPath>,
        detailed_paths: Vec<DetailedPath>,
    ) -> Self {
        let path_length = paths.first().map(Vec::len).unwrap_or(0);
        Self {
            found: true,
            path_count: Some(paths.len()),
            path_length: Some(path_length),
            message,
            start_question: Some(start_question.to_string()),
            end_question: Some(end_question.to_string()),
            paths: Some(paths),
            detailed_paths: Some(detailed_paths),
        }
    }

    /// A structured miss with a descriptive reason.
    pub fn not_found(message: String) -> Self {
        Self {
            found: false,
            path_count: None,
            path_length: None,
            message,
            start_question: None,
            end_question: None,
            paths: None,
            detailed_paths: None,
        }
    }
}

/// Outcome of a consistency check over one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub intersection_question_results: Vec<QuestionComparison>,
    pub total_questions: usize,
    pub cached_count: usize,
    pub new_count: usize,
    pub average_contradiction: f64,
}

impl ConsistencyReport {
    /// Merge cache hits and fresh results into one report.
    pub fn merge(hits: Vec<QuestionComparison>, fresh: Vec<QuestionComparison>) -> Self {
        let cached_count = hits.len();
        let new_count = fresh.len();
        let mut results = hits;
        results.extend(fresh);
        let average_contradiction = crate::consistency::average_contradiction(&results);
        Self {
            total_questions: results.len(),
            intersection_question_results: results,
            cached_count,
            new_count,
            average_contradiction,
        }
    }
}

/// Short descriptor of the path a narrative covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub books_count: usize,
    pub start_question: String,
    pub end_question: String,
    pub path_index: usize,
}

/// Outcome of a narrative analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeReport {
    pub narrative: String,
    pub path_summary: PathSummary,
}
