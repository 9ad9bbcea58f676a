//! Persistence tests: the durable library and consistency cache must
//! survive engine restarts, and a reopened engine must serve consistency
//! checks entirely from cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use silsila::analyzer::ConsistencyAnalyzer;
use silsila::consistency::ConsistencyCache;
use silsila::engine::{Engine, EngineConfig};
use silsila::error::AnalyzerError;
use silsila::graph::detail::DetailedPath;
use silsila::record::{Book, BookId, KnowledgeRecord, OwnerId, RecordFilter};
use silsila::store::RecordStore;

/// Analyzer that scores everything 25, or refuses every call.
struct FixedAnalyzer {
    refuse: bool,
}

impl ConsistencyAnalyzer for FixedAnalyzer {
    fn analyze(
        &self,
        questions: &BTreeMap<String, Vec<String>>,
    ) -> Result<HashMap<String, u8>, AnalyzerError> {
        if self.refuse {
            return Err(AnalyzerError::Network {
                message: "analyzer must not be called".into(),
            });
        }
        Ok(questions.keys().map(|q| (q.clone(), 25)).collect())
    }

    fn narrate(
        &self,
        _path: &DetailedPath,
        _start_question: &str,
        _end_question: &str,
    ) -> Result<String, AnalyzerError> {
        Err(AnalyzerError::Network {
            message: "narration unsupported in this fake".into(),
        })
    }
}

fn persistent_engine(dir: &std::path::Path, refuse_analysis: bool) -> Engine {
    Engine::new(EngineConfig {
        data_dir: Some(dir.to_path_buf()),
    })
    .unwrap()
    .with_analyzer(Arc::new(FixedAnalyzer {
        refuse: refuse_analysis,
    }))
}

fn seed_chain(engine: &Engine) {
    for (id, records) in [
        (1u64, [("A", "a1"), ("B", "b1")]),
        (2, [("B", "b2"), ("C", "c2")]),
        (3, [("C", "c3"), ("D", "d3")]),
    ] {
        engine
            .store()
            .add_book(&Book::new(BookId(id), OwnerId(1), format!("book{id}.pdf")))
            .unwrap();
        for (question, answer) in records {
            engine
                .store()
                .add_record(&KnowledgeRecord::new(BookId(id), "k", question, answer))
                .unwrap();
        }
    }
}

#[test]
fn library_survives_engine_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let engine = persistent_engine(dir.path(), false);
        seed_chain(&engine);
    }

    let engine = persistent_engine(dir.path(), false);
    let report = engine
        .find_question_path(&RecordFilter::for_owner(OwnerId(1)), "A", "D")
        .unwrap();
    assert!(report.found);
    assert_eq!(report.path_length, Some(3));
}

#[test]
fn consistency_verdicts_survive_engine_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let detailed = {
        let engine = persistent_engine(dir.path(), false);
        seed_chain(&engine);

        let report = engine
            .find_question_path(&RecordFilter::for_owner(OwnerId(1)), "A", "D")
            .unwrap();
        let detailed = report.detailed_paths.unwrap();

        let first = engine.check_consistency(&detailed, 0, "A", "D").unwrap();
        assert_eq!(first.new_count, 2);
        assert_eq!(first.cached_count, 0);
        detailed
    };

    // A fresh engine over the same data directory must answer entirely from
    // cache; the refusing analyzer proves no network call happens.
    let engine = persistent_engine(dir.path(), true);
    let report = engine.check_consistency(&detailed, 0, "A", "D").unwrap();
    assert_eq!(report.cached_count, 2);
    assert_eq!(report.new_count, 0);
    assert_eq!(report.average_contradiction, 25.0);
    assert!(
        report
            .intersection_question_results
            .iter()
            .all(|r| r.from_cache)
    );
}

#[test]
fn cache_entries_accumulate_across_restarts() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let engine = persistent_engine(dir.path(), false);
        seed_chain(&engine);
        let report = engine
            .find_question_path(&RecordFilter::for_owner(OwnerId(1)), "A", "C")
            .unwrap();
        let detailed = report.detailed_paths.unwrap();
        engine.check_consistency(&detailed, 0, "A", "C").unwrap();
        assert_eq!(engine.cache().len().unwrap(), 1); // pair (1,2) on "B"
    }

    let engine = persistent_engine(dir.path(), false);
    assert_eq!(engine.cache().len().unwrap(), 1);

    // Extending the search to D adds only the still-missing pair.
    let report = engine
        .find_question_path(&RecordFilter::for_owner(OwnerId(1)), "A", "D")
        .unwrap();
    let detailed = report.detailed_paths.unwrap();
    let check = engine.check_consistency(&detailed, 0, "A", "D").unwrap();
    assert_eq!(check.cached_count, 1);
    assert_eq!(check.new_count, 1);
    assert_eq!(engine.cache().len().unwrap(), 2);
}
