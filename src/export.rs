//! Visualization export: node/edge lists for a front-end graph renderer.
//!
//! Two fixed hierarchies are emitted, with constant colors and sizes per
//! node type:
//!
//! - per-book: keyword → question → answer → proof
//! - global:   category → keyword → question → book
//!
//! Question node ids in the global view are truncated sha-256 content
//! hashes, stable across process restarts. Layout and rendering are the
//! front-end's concern.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreResult;
use crate::record::{Book, RecordFilter};
use crate::store::RecordStore;

const COLOR_CATEGORY: &str = "#FF5722";
const COLOR_KEYWORD: &str = "#4CAF50";
const COLOR_QUESTION: &str = "#2196F3";
const COLOR_ANSWER: &str = "#FF9800";
const COLOR_PROOF: &str = "#F44336";
const COLOR_BOOK: &str = "#9C27B0";

const EDGE_CATEGORY_KEYWORD: &str = "#FF8A65";
const EDGE_KEYWORD_QUESTION: &str = "#81C784";
const EDGE_QUESTION_BOOK: &str = "#64B5F6";
const EDGE_QUESTION_ANSWER: &str = "#EF9A9A";
const EDGE_ANSWER_PROOF: &str = "#EF5350";
const EDGE_DEFAULT: &str = "#999";

/// One renderable node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VizNode {
    pub id: String,
    pub label: String,
    pub size: f32,
    pub color: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctrine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<u64>,
}

impl VizNode {
    fn new(id: String, label: String, size: f32, color: &str, kind: &str) -> Self {
        Self {
            id,
            label,
            size,
            color: color.to_string(),
            kind: kind.to_string(),
            ..Self::default()
        }
    }
}

/// One renderable edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub size: f32,
    pub color: String,
}

impl VizEdge {
    fn new(source: &str, target: &str, size: f32, color: &str) -> Self {
        Self {
            id: format!("e_{source}_{target}"),
            source: source.to_string(),
            target: target.to_string(),
            size,
            color: color.to_string(),
        }
    }
}

/// A complete node/edge list for one render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkData {
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

/// Stable node id for a question: truncated sha-256 of the exact text.
///
/// Content-addressed so the id survives process restarts; a language
/// runtime's hash would not.
pub fn stable_question_id(question: &str) -> String {
    let digest = Sha256::digest(question.as_bytes());
    let mut id = String::with_capacity(14);
    id.push_str("q_");
    for byte in &digest[..6] {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

/// Truncate a label to `max` characters, appending an ellipsis.
/// Splits on character boundaries, never mid-codepoint.
fn truncate_label(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max).collect();
    format!("{truncated}...")
}

fn sanitize(text: &str) -> String {
    text.replace(' ', "_")
}

/// Per-book network: keyword → question → answer → proof.
pub fn book_network(store: &dyn RecordStore, book: &Book) -> StoreResult<NetworkData> {
    let records = store.records_of(book.id)?;
    let mut data = NetworkData::default();
    let mut node_ids: HashSet<String> = HashSet::new();

    for (idx, record) in records.iter().enumerate() {
        let keyword_id = format!("k_{}", sanitize(&record.keyword));
        if node_ids.insert(keyword_id.clone()) {
            data.nodes.push(VizNode::new(
                keyword_id.clone(),
                record.keyword.clone(),
                15.0,
                COLOR_KEYWORD,
                "keyword",
            ));
        }

        let question_id = format!("q_{idx}");
        data.nodes.push(VizNode {
            full_question: Some(record.question.clone()),
            answer: Some(record.answer.clone()),
            proof: record.proof.clone(),
            ..VizNode::new(
                question_id.clone(),
                truncate_label(&record.question, 50),
                10.0,
                COLOR_QUESTION,
                "question",
            )
        });
        data.edges
            .push(VizEdge::new(&keyword_id, &question_id, 2.0, EDGE_DEFAULT));

        if !record.answer.trim().is_empty() {
            let answer_id = format!("a_{idx}");
            data.nodes.push(VizNode {
                answer_text: Some(record.answer.clone()),
                ..VizNode::new(
                    answer_id.clone(),
                    truncate_label(&record.answer, 80),
                    8.0,
                    COLOR_ANSWER,
                    "answer",
                )
            });
            data.edges.push(VizEdge::new(
                &question_id,
                &answer_id,
                1.5,
                EDGE_QUESTION_ANSWER,
            ));

            if let Some(proof) = record.proof.as_deref().filter(|p| !p.trim().is_empty()) {
                let proof_id = format!("p_{idx}");
                data.nodes.push(VizNode {
                    proof_text: Some(proof.to_string()),
                    ..VizNode::new(
                        proof_id.clone(),
                        truncate_label(proof, 80),
                        6.0,
                        COLOR_PROOF,
                        "proof",
                    )
                });
                data.edges
                    .push(VizEdge::new(&answer_id, &proof_id, 1.0, EDGE_ANSWER_PROOF));
            }
        }
    }

    tracing::info!(
        book = %book.id,
        nodes = data.nodes.len(),
        edges = data.edges.len(),
        "generated book network data"
    );
    Ok(data)
}

/// Global network across the filtered library:
/// category → keyword → question → book.
///
/// Books appear only once they contribute at least one record. Question
/// nodes are shared across books via their stable content-hash id.
pub fn global_network(store: &dyn RecordStore, filter: &RecordFilter) -> StoreResult<NetworkData> {
    let mut data = NetworkData::default();
    let mut node_ids: HashSet<String> = HashSet::new();
    let mut edge_ids: HashSet<String> = HashSet::new();

    for book in store.books(filter)? {
        let book_node_id = format!("book_{}", book.id.get());
        let book_label = book.display_title().to_string();
        let book_category = book.category.clone().unwrap_or_else(|| "Uncategorized".into());
        let book_doctrine = book.doctrine.clone().unwrap_or_else(|| "Uncategorized".into());

        for record in store.records_of(book.id)? {
            if node_ids.insert(book_node_id.clone()) {
                data.nodes.push(VizNode {
                    full_title: Some(book_label.clone()),
                    category: Some(book_category.clone()),
                    doctrine: Some(book_doctrine.clone()),
                    document_id: Some(book.id.get()),
                    ..VizNode::new(
                        book_node_id.clone(),
                        truncate_label(&book_label, 50),
                        12.0,
                        COLOR_BOOK,
                        "book",
                    )
                });
            }

            let category_id = format!("cat_{}", sanitize(&book_category));
            if node_ids.insert(category_id.clone()) {
                data.nodes.push(VizNode {
                    category: Some(book_category.clone()),
                    ..VizNode::new(
                        category_id.clone(),
                        book_category.clone(),
                        20.0,
                        COLOR_CATEGORY,
                        "category",
                    )
                });
            }

            let keyword_id = format!("kw_{}_{}", sanitize(&record.keyword), category_id);
            if node_ids.insert(keyword_id.clone()) {
                data.nodes.push(VizNode {
                    category: Some(book_category.clone()),
                    ..VizNode::new(
                        keyword_id.clone(),
                        record.keyword.clone(),
                        16.0,
                        COLOR_KEYWORD,
                        "keyword",
                    )
                });
                data.edges.push(VizEdge::new(
                    &category_id,
                    &keyword_id,
                    2.5,
                    EDGE_CATEGORY_KEYWORD,
                ));
            }

            let question_id = stable_question_id(&record.question);
            if node_ids.insert(question_id.clone()) {
                data.nodes.push(VizNode {
                    full_question: Some(record.question.clone()),
                    category: Some(book_category.clone()),
                    ..VizNode::new(
                        question_id.clone(),
                        truncate_label(&record.question, 60),
                        13.0,
                        COLOR_QUESTION,
                        "question",
                    )
                });
                data.edges.push(VizEdge::new(
                    &keyword_id,
                    &question_id,
                    2.0,
                    EDGE_KEYWORD_QUESTION,
                ));
            }

            let edge = VizEdge::new(&question_id, &book_node_id, 1.5, EDGE_QUESTION_BOOK);
            if edge_ids.insert(edge.id.clone()) {
                data.edges.push(edge);
            }
        }
    }

    tracing::info!(
        nodes = data.nodes.len(),
        edges = data.edges.len(),
        "generated global network data"
    );
    Ok(data)
}
