//! Book-connectivity graph.
//!
//! Nodes are books; an undirected edge joins two books that share at least
//! one question. The graph is rebuilt from the filtered record set on every
//! request — connectivity is cheap to recompute at library scale and a
//! persistent graph would have to be invalidated on every ingest.
//!
//! Each edge carries ONE representative shared question. Full shared-question
//! enumeration is a different cost profile and happens later, in the
//! consistency check, by re-querying the store.

pub mod detail;
pub mod paths;

use std::collections::{HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::StoreResult;
use crate::record::{BookId, RecordFilter};
use crate::store::RecordStore;

/// Edge data: one representative question shared by the two endpoint books.
#[derive(Debug, Clone)]
pub struct SharedEdge {
    /// The lexicographically smallest shared question (deterministic pick).
    pub question: String,
}

/// Undirected book graph with an id index for O(1) node lookups.
pub struct BookGraph {
    graph: UnGraph<BookId, SharedEdge>,
    index: HashMap<BookId, NodeIndex>,
    titles: HashMap<BookId, String>,
}

impl BookGraph {
    /// Build the graph from the filtered record set.
    ///
    /// Every book passing the filter becomes a node, even with zero
    /// questions (isolated). For each unordered pair of books the question
    /// sets are intersected; a non-empty intersection adds one edge labeled
    /// with the smallest shared question. O(B²·Q) — the dominant cost of a
    /// path request, acceptable while libraries stay in the low hundreds.
    pub fn build(store: &dyn RecordStore, filter: &RecordFilter) -> StoreResult<Self> {
        let books = store.books(filter)?;
        tracing::debug!(books = books.len(), "building book connectivity graph");

        let mut graph = UnGraph::new_undirected();
        let mut index = HashMap::with_capacity(books.len());
        let mut titles = HashMap::with_capacity(books.len());
        let mut question_sets: Vec<(BookId, HashSet<String>)> = Vec::with_capacity(books.len());

        for book in &books {
            let node = graph.add_node(book.id);
            index.insert(book.id, node);
            titles.insert(book.id, book.display_title().to_string());
            let questions: HashSet<String> = store.questions_of(book.id)?.into_iter().collect();
            question_sets.push((book.id, questions));
        }

        let mut connections = 0;
        for i in 0..question_sets.len() {
            for j in (i + 1)..question_sets.len() {
                let (id_a, set_a) = &question_sets[i];
                let (id_b, set_b) = &question_sets[j];
                if let Some(shared) = set_a.intersection(set_b).min() {
                    graph.add_edge(
                        index[id_a],
                        index[id_b],
                        SharedEdge {
                            question: shared.clone(),
                        },
                    );
                    connections += 1;
                }
            }
        }

        tracing::info!(
            books = books.len(),
            connections,
            "book graph built"
        );

        Ok(Self {
            graph,
            index,
            titles,
        })
    }

    /// Whether the book is a node in this graph.
    pub fn contains(&self, book: BookId) -> bool {
        self.index.contains_key(&book)
    }

    /// Neighbors of a book with the representative shared question of each
    /// edge, sorted by neighbor id for deterministic traversal.
    pub fn neighbors(&self, book: BookId) -> Vec<(BookId, &str)> {
        let Some(&node) = self.index.get(&book) else {
            return vec![];
        };
        let mut neighbors: Vec<(BookId, &str)> = self
            .graph
            .edges(node)
            .map(|e| (self.graph[e.target()], e.weight().question.as_str()))
            .collect();
        neighbors.sort_by_key(|(id, _)| *id);
        neighbors
    }

    /// Display title of a book node. Empty for unknown books.
    pub fn title(&self, book: BookId) -> &str {
        self.titles.get(&book).map(String::as_str).unwrap_or("")
    }

    /// Number of book nodes.
    pub fn book_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of book-to-book connections.
    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl std::fmt::Debug for BookGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookGraph")
            .field("books", &self.graph.node_count())
            .field("connections", &self.graph.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Book, KnowledgeRecord, OwnerId};
    use crate::store::MemRecords;

    fn store_with_questions(sets: &[(u64, &[&str])]) -> MemRecords {
        let store = MemRecords::new();
        for (id, questions) in sets {
            store
                .add_book(&Book::new(BookId(*id), OwnerId(1), format!("book{id}.pdf")))
                .unwrap();
            for q in *questions {
                store
                    .add_record(&KnowledgeRecord::new(BookId(*id), "k", *q, "answer"))
                    .unwrap();
            }
        }
        store
    }

    #[test]
    fn edge_for_each_sharing_pair() {
        let store = store_with_questions(&[
            (1, &["A", "B"]),
            (2, &["B", "C"]),
            (3, &["C", "D"]),
        ]);
        let graph = BookGraph::build(&store, &RecordFilter::for_owner(OwnerId(1))).unwrap();

        assert_eq!(graph.book_count(), 3);
        assert_eq!(graph.connection_count(), 2);
        assert_eq!(graph.neighbors(BookId(2)).len(), 2);
        assert_eq!(graph.neighbors(BookId(1)), vec![(BookId(2), "B")]);
    }

    #[test]
    fn representative_question_is_smallest() {
        let store = store_with_questions(&[(1, &["Z", "B", "M"]), (2, &["M", "Z", "B"])]);
        let graph = BookGraph::build(&store, &RecordFilter::for_owner(OwnerId(1))).unwrap();
        assert_eq!(graph.neighbors(BookId(1)), vec![(BookId(2), "B")]);
    }

    #[test]
    fn zero_question_book_is_isolated_node() {
        let store = store_with_questions(&[(1, &["A"]), (2, &[])]);
        let graph = BookGraph::build(&store, &RecordFilter::for_owner(OwnerId(1))).unwrap();
        assert_eq!(graph.book_count(), 2);
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.contains(BookId(2)));
        assert!(graph.neighbors(BookId(2)).is_empty());
    }

    #[test]
    fn filter_restricts_node_set() {
        let store = MemRecords::new();
        store
            .add_book(&Book::new(BookId(1), OwnerId(1), "a.pdf").with_category("fiqh"))
            .unwrap();
        store
            .add_book(&Book::new(BookId(2), OwnerId(1), "b.pdf").with_category("aqidah"))
            .unwrap();
        store
            .add_record(&KnowledgeRecord::new(BookId(1), "k", "Q", "A"))
            .unwrap();
        store
            .add_record(&KnowledgeRecord::new(BookId(2), "k", "Q", "A"))
            .unwrap();

        let filter = RecordFilter::for_owner(OwnerId(1)).with_category("fiqh");
        let graph = BookGraph::build(&store, &filter).unwrap();
        assert_eq!(graph.book_count(), 1);
        assert!(!graph.contains(BookId(2)));
    }
}
