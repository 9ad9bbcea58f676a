//! Engine facade: top-level API for the silsila system.
//!
//! The `Engine` owns the record store, the consistency cache, and the
//! injected analyzer/quota collaborators, and exposes the request-scoped
//! operations: path discovery, consistency checking, narrative analysis,
//! and visualization export. Every operation is synchronous and runs to
//! completion inside the caller's request.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::analyzer::ConsistencyAnalyzer;
use crate::consistency::{
    ConsistencyCache, DurableCache, MemCache, apply_scores, collect_intersections,
    group_for_analysis, partition_cached,
};
use crate::error::{ConsistencyError, EngineError, SearchError, SilsilaResult, StoreError};
use crate::export::{self, NetworkData};
use crate::graph::BookGraph;
use crate::graph::detail::{DetailedPath, detail_paths};
use crate::graph::paths::{BookPath, PathStep, all_shortest_paths};
use crate::quota::{QuotaGate, Unlimited};
use crate::record::{Book, BookId, OwnerId, RecordFilter};
use crate::report::{ConsistencyReport, NarrativeReport, PathReport, PathSummary};
use crate::store::{DurableRecords, MemRecords, RecordStore};

/// Configuration for the silsila engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Data directory for persistence. `None` for memory-only mode.
    pub data_dir: Option<PathBuf>,
}

/// The silsila knowledge-network engine.
pub struct Engine {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn ConsistencyCache>,
    analyzer: Option<Arc<dyn ConsistencyAnalyzer>>,
    quota: Arc<dyn QuotaGate>,
}

impl Engine {
    /// Create a new engine with the given configuration.
    ///
    /// With a data directory the record store and consistency cache are
    /// durable (redb); without one everything lives in memory.
    pub fn new(config: EngineConfig) -> SilsilaResult<Self> {
        let (store, cache): (Arc<dyn RecordStore>, Arc<dyn ConsistencyCache>) =
            match &config.data_dir {
                Some(dir) => {
                    std::fs::create_dir_all(dir).map_err(|_| EngineError::DataDir {
                        path: dir.display().to_string(),
                    })?;
                    (
                        Arc::new(DurableRecords::open(dir)?),
                        Arc::new(DurableCache::open(dir)?),
                    )
                }
                None => (Arc::new(MemRecords::new()), Arc::new(MemCache::new())),
            };

        tracing::info!(
            persistent = config.data_dir.is_some(),
            "initializing silsila engine"
        );

        Ok(Self {
            store,
            cache,
            analyzer: None,
            quota: Arc::new(Unlimited),
        })
    }

    /// Attach the consistency analyzer collaborator.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ConsistencyAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Replace the quota gate (default: unlimited).
    pub fn with_quota(mut self, quota: Arc<dyn QuotaGate>) -> Self {
        self.quota = quota;
        self
    }

    /// The record store.
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// The consistency cache.
    pub fn cache(&self) -> &dyn ConsistencyCache {
        self.cache.as_ref()
    }

    /// Find all shortest paths between two questions through books that
    /// share questions.
    ///
    /// Short-circuits: equal or empty questions are invalid input; a
    /// question contained in no book under the active filters is a
    /// structured miss; a book containing both questions is a direct
    /// connection reported without any graph search.
    pub fn find_question_path(
        &self,
        filter: &RecordFilter,
        start_question: &str,
        end_question: &str,
    ) -> SilsilaResult<PathReport> {
        tracing::info!(owner = %filter.owner, "question path request");

        if start_question.is_empty() || end_question.is_empty() {
            return Err(SearchError::EmptyQuestion.into());
        }
        if start_question == end_question {
            return Err(SearchError::SameQuestion.into());
        }

        let start_books = self.store.books_with_question(start_question, filter)?;
        let end_books = self.store.books_with_question(end_question, filter)?;
        tracing::info!(
            start_books = start_books.len(),
            end_books = end_books.len(),
            "resolved question books"
        );

        let filter_msg = filter.describe();
        if start_books.is_empty() {
            return Ok(PathReport::not_found(format!(
                "No books found containing the start question{filter_msg}."
            )));
        }
        if end_books.is_empty() {
            return Ok(PathReport::not_found(format!(
                "No books found containing the end question{filter_msg}."
            )));
        }

        let start_ids: HashSet<BookId> = start_books.iter().map(|b| b.id).collect();
        let end_ids: HashSet<BookId> = end_books.iter().map(|b| b.id).collect();

        // Already sorted by id, so direct paths come out in id order.
        let shared: Vec<&Book> = start_books
            .iter()
            .filter(|b| end_ids.contains(&b.id))
            .collect();
        if !shared.is_empty() {
            tracing::info!(books = shared.len(), "direct connection found");
            return Ok(direct_connection(&shared, start_question, end_question));
        }

        let graph = BookGraph::build(self.store.as_ref(), filter)?;
        let paths = all_shortest_paths(&graph, &start_ids, &end_ids)?;

        if paths.is_empty() {
            tracing::warn!("no path found between start and end questions");
            return Ok(PathReport::not_found(format!(
                "No path found between the two questions{filter_msg}. \
                 The questions are in disconnected parts of the knowledge network."
            )));
        }

        let detailed = detail_paths(self.store.as_ref(), &paths, start_question, end_question)?;
        let message = format!(
            "Found {} path{} of length {} book(s).",
            paths.len(),
            if paths.len() > 1 { "s" } else { "" },
            paths[0].len()
        );
        tracing::info!(
            path_count = paths.len(),
            path_length = paths[0].len(),
            "path finding complete"
        );
        Ok(PathReport::found(
            start_question,
            end_question,
            message,
            paths,
            detailed,
        ))
    }

    /// Check answer consistency across the books of one discovered path.
    ///
    /// Every question shared between consecutive books is scored; cached
    /// verdicts short-circuit, the rest go to the analyzer in one batch.
    /// An analyzer failure aborts the whole batch with no cache writes, so
    /// a retry only re-queries the still-missing items.
    pub fn check_consistency(
        &self,
        detailed_paths: &[DetailedPath],
        path_index: usize,
        start_question: &str,
        end_question: &str,
    ) -> SilsilaResult<ConsistencyReport> {
        tracing::info!(
            path_index,
            start = start_question,
            end = end_question,
            "consistency check request"
        );

        let path = detailed_paths
            .get(path_index)
            .ok_or(ConsistencyError::InvalidPathIndex {
                index: path_index,
                count: detailed_paths.len(),
            })?;

        let items = collect_intersections(self.store.as_ref(), path)?;
        tracing::info!(total = items.len(), "intersection questions collected");

        let (hits, misses) = partition_cached(self.cache.as_ref(), items)
            .map_err(ConsistencyError::from)?;
        tracing::info!(cached = hits.len(), need_analysis = misses.len(), "cache partition");

        let fresh = if misses.is_empty() {
            Vec::new()
        } else {
            let analyzer = self
                .analyzer
                .as_ref()
                .ok_or(ConsistencyError::NoAnalyzer)?;
            self.quota.check(1).map_err(ConsistencyError::from)?;

            let grouped = group_for_analysis(&misses);
            let scores = analyzer
                .analyze(&grouped)
                .map_err(ConsistencyError::from)?;

            let (entries, comparisons) = apply_scores(misses, &scores);
            self.cache
                .put_many(&entries)
                .map_err(ConsistencyError::from)?;
            self.quota.record(1);
            tracing::info!(new = comparisons.len(), "analyzer results cached");
            comparisons
        };

        Ok(ConsistencyReport::merge(hits, fresh))
    }

    /// Generate a narrative analysis of one discovered path.
    pub fn narrative_analysis(
        &self,
        detailed_paths: &[DetailedPath],
        path_index: usize,
        start_question: &str,
        end_question: &str,
    ) -> SilsilaResult<NarrativeReport> {
        let path = detailed_paths
            .get(path_index)
            .ok_or(ConsistencyError::InvalidPathIndex {
                index: path_index,
                count: detailed_paths.len(),
            })?;

        let analyzer = self
            .analyzer
            .as_ref()
            .ok_or(ConsistencyError::NoAnalyzer)?;
        self.quota.check(1).map_err(ConsistencyError::from)?;

        let narrative = analyzer
            .narrate(path, start_question, end_question)
            .map_err(ConsistencyError::from)?;
        self.quota.record(1);

        Ok(NarrativeReport {
            narrative,
            path_summary: PathSummary {
                books_count: path.books.len(),
                start_question: start_question.to_string(),
                end_question: end_question.to_string(),
                path_index,
            },
        })
    }

    /// Per-book visualization data. The book must belong to the owner.
    pub fn book_network(&self, owner: OwnerId, book_id: BookId) -> SilsilaResult<NetworkData> {
        let book = self
            .store
            .book(book_id)?
            .filter(|b| b.owner == owner)
            .ok_or(StoreError::BookNotFound {
                book_id: book_id.get(),
            })?;
        Ok(export::book_network(self.store.as_ref(), &book)?)
    }

    /// Global visualization data across the filtered library.
    pub fn global_network(&self, filter: &RecordFilter) -> SilsilaResult<NetworkData> {
        Ok(export::global_network(self.store.as_ref(), filter)?)
    }
}

/// Build the report for books containing both query questions: one
/// length-1 path per shared book, no search.
fn direct_connection(books: &[&Book], start_question: &str, end_question: &str) -> PathReport {
    let paths: Vec<BookPath> = books
        .iter()
        .map(|book| {
            vec![PathStep {
                book_id: book.id,
                book_title: book.display_title().to_string(),
                shared_question: None,
            }]
        })
        .collect();
    let detailed = books
        .iter()
        .enumerate()
        .map(|(i, book)| DetailedPath::direct(i, book, start_question, end_question))
        .collect();

    PathReport::found(
        start_question,
        end_question,
        "Direct connection found! Both questions exist in the same book.".into(),
        paths,
        detailed,
    )
}
