//! Multi-source, multi-target shortest-path search over the book graph.
//!
//! The search starts from every book containing the start question and stops
//! at every book containing the end question, collecting *all* paths tied for
//! the minimum length. Ties are reconstructed from a parents map in which a
//! node rediscovered at its minimal distance accumulates additional parent
//! edges.
//!
//! Reconstruction is iterative with a hard cap: the Cartesian expansion of
//! parent branches can be exponential in dense graphs, and an unbounded walk
//! would let a single request exhaust memory.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::record::BookId;

use super::BookGraph;

/// Upper bound on the number of reconstructed tied-shortest paths.
pub const MAX_PATHS: usize = 2048;

/// One book in a raw path. `shared_question` is the question this book
/// shares with the *previous* book in the path; `None` for the first book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub book_id: BookId,
    pub book_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_question: Option<String>,
}

/// An ordered sequence of books. Length is the number of books.
pub type BookPath = Vec<PathStep>;

/// Find all shortest paths from any start book to any end book.
///
/// Returns an empty list when no end book is reachable. The start and end
/// book sets must be disjoint — direct connections are short-circuited by
/// the caller before any search runs.
pub fn all_shortest_paths(
    graph: &BookGraph,
    start_books: &HashSet<BookId>,
    end_books: &HashSet<BookId>,
) -> Result<Vec<BookPath>, SearchError> {
    let mut queue: VecDeque<(BookId, usize)> = VecDeque::new();
    let mut visited: HashMap<BookId, usize> = HashMap::new();
    let mut parents: HashMap<BookId, Vec<(BookId, String)>> = HashMap::new();

    let mut seeds: Vec<BookId> = start_books.iter().copied().collect();
    seeds.sort();
    for book in seeds {
        queue.push_back((book, 0));
        visited.insert(book, 0);
        parents.insert(book, Vec::new());
    }

    let mut found_end_books: Vec<BookId> = Vec::new();
    let mut shortest: Option<usize> = None;
    let mut iterations = 0u64;

    while let Some((current, distance)) = queue.pop_front() {
        iterations += 1;

        // Past the shortest known distance — nothing better can follow.
        if shortest.is_some_and(|s| distance > s) {
            continue;
        }

        if end_books.contains(&current) {
            if shortest.is_none() {
                shortest = Some(distance);
                tracing::debug!(book = %current, distance, "reached first end book");
            }
            if shortest == Some(distance) {
                found_end_books.push(current);
            }
            // End books are terminal; paths through them are never shorter.
            continue;
        }

        for (neighbor, question) in graph.neighbors(current) {
            let next = distance + 1;
            match visited.get(&neighbor) {
                None => {
                    visited.insert(neighbor, next);
                    parents
                        .entry(neighbor)
                        .or_default()
                        .push((current, question.to_string()));
                    queue.push_back((neighbor, next));
                }
                Some(&d) if d == next => {
                    // Rediscovered at the same minimal distance: another
                    // tied-shortest route passes through here.
                    parents
                        .entry(neighbor)
                        .or_default()
                        .push((current, question.to_string()));
                }
                _ => {}
            }
        }
    }

    tracing::debug!(
        iterations,
        visited = visited.len(),
        end_books = found_end_books.len(),
        "BFS complete"
    );

    if found_end_books.is_empty() {
        return Ok(vec![]);
    }

    let mut raw_paths: Vec<Vec<(BookId, Option<String>)>> = Vec::new();
    for &end_book in &found_end_books {
        reconstruct_into(end_book, &parents, &mut raw_paths)?;
    }

    Ok(raw_paths
        .into_iter()
        .map(|path| {
            path.into_iter()
                .map(|(book_id, shared_question)| PathStep {
                    book_id,
                    book_title: graph.title(book_id).to_string(),
                    shared_question,
                })
                .collect()
        })
        .collect())
}

/// Expand every parent branch of `end_book` into complete paths.
///
/// Works on an explicit stack of path suffixes held in forward order; the
/// first element of a suffix is the earliest book reached so far, with its
/// incoming edge question still unresolved. A suffix whose head has no
/// parents starts at a start book and is complete.
fn reconstruct_into(
    end_book: BookId,
    parents: &HashMap<BookId, Vec<(BookId, String)>>,
    out: &mut Vec<Vec<(BookId, Option<String>)>>,
) -> Result<(), SearchError> {
    let mut stack: Vec<Vec<(BookId, Option<String>)>> = vec![vec![(end_book, None)]];

    while let Some(suffix) = stack.pop() {
        let head = suffix[0].0;
        let head_parents = parents.get(&head).map(Vec::as_slice).unwrap_or(&[]);

        if head_parents.is_empty() {
            out.push(suffix);
            if out.len() > MAX_PATHS {
                return Err(SearchError::PathOverflow {
                    max_paths: MAX_PATHS,
                });
            }
            continue;
        }

        // Reverse order so the stack expands first-recorded parents first.
        for (parent, question) in head_parents.iter().rev() {
            let mut extended = Vec::with_capacity(suffix.len() + 1);
            extended.push((*parent, None));
            let mut rest = suffix.clone();
            rest[0].1 = Some(question.clone());
            extended.extend(rest);
            stack.push(extended);

            // Every pending suffix yields at least one complete path, so
            // this bound can only undercount the final total.
            if out.len() + stack.len() > MAX_PATHS {
                return Err(SearchError::PathOverflow {
                    max_paths: MAX_PATHS,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Book, KnowledgeRecord, OwnerId, RecordFilter};
    use crate::store::{MemRecords, RecordStore};

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

    fn graph_of(store: &MemRecords) -> BookGraph {
        BookGraph::build(store, &RecordFilter::for_owner(OwnerId(1))).unwrap()
    }

    fn ids(path: &BookPath) -> Vec<u64> {
        path.iter().map(|s| s.book_id.get()).collect()
    }

    #[test]
    fn chain_has_single_shortest_path() {
        let store = store_with_questions(&[
            (1, &["A", "B"]),
            (2, &["B", "C"]),
            (3, &["C", "D"]),
        ]);
        let graph = graph_of(&store);
        let paths = all_shortest_paths(
            &graph,
            &HashSet::from([BookId(1)]),
            &HashSet::from([BookId(3)]),
        )
        .unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0]), vec![1, 2, 3]);
        assert_eq!(paths[0][0].shared_question, None);
        assert_eq!(paths[0][1].shared_question.as_deref(), Some("B"));
        assert_eq!(paths[0][2].shared_question.as_deref(), Some("C"));
    }

    #[test]
    fn diamond_returns_both_tied_paths() {
        // 1 - 2 - 4  and  1 - 3 - 4
        let store = store_with_questions(&[
            (1, &["ab", "ac"]),
            (2, &["ab", "bd"]),
            (3, &["ac", "cd"]),
            (4, &["bd", "cd"]),
        ]);
        let graph = graph_of(&store);
        let paths = all_shortest_paths(
            &graph,
            &HashSet::from([BookId(1)]),
            &HashSet::from([BookId(4)]),
        )
        .unwrap();

        assert_eq!(paths.len(), 2);
        let mut routes: Vec<Vec<u64>> = paths.iter().map(ids).collect();
        routes.sort();
        assert_eq!(routes, vec![vec![1, 2, 4], vec![1, 3, 4]]);
        // Minimality: every returned path has the same length.
        assert!(paths.iter().all(|p| p.len() == 3));
    }

    #[test]
    fn longer_route_is_not_returned() {
        // 1 - 2 - 4 (short)  and  1 - 3 - 5 - 4 (long)
        let store = store_with_questions(&[
            (1, &["ab", "ac"]),
            (2, &["ab", "bd"]),
            (3, &["ac", "ce"]),
            (5, &["ce", "ed"]),
            (4, &["bd", "ed"]),
        ]);
        let graph = graph_of(&store);
        let paths = all_shortest_paths(
            &graph,
            &HashSet::from([BookId(1)]),
            &HashSet::from([BookId(4)]),
        )
        .unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0]), vec![1, 2, 4]);
    }

    #[test]
    fn multi_source_multi_target() {
        // Start books 1 and 10; end books 4 and 40. Book 10 is adjacent to 40.
        let store = store_with_questions(&[
            (1, &["ab"]),
            (2, &["ab", "bc"]),
            (4, &["bc"]),
            (10, &["xy"]),
            (40, &["xy"]),
        ]);
        let graph = graph_of(&store);
        let paths = all_shortest_paths(
            &graph,
            &HashSet::from([BookId(1), BookId(10)]),
            &HashSet::from([BookId(4), BookId(40)]),
        )
        .unwrap();

        // Shortest overall is 10 - 40 (2 books); 1 - 2 - 4 is longer and dropped.
        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0]), vec![10, 40]);
    }

    #[test]
    fn disconnected_returns_empty() {
        let store = store_with_questions(&[(1, &["A"]), (9, &["Z"])]);
        let graph = graph_of(&store);
        let paths = all_shortest_paths(
            &graph,
            &HashSet::from([BookId(1)]),
            &HashSet::from([BookId(9)]),
        )
        .unwrap();
        assert!(paths.is_empty());
    }

    #[test]
    fn reconstruction_cap_is_enforced() {
        // Layered mesh: start - 7 layers of 3 - end gives 3^7 = 2187 tied
        // shortest paths, over the 2048 cap.
        let store = MemRecords::new();
        let owner = OwnerId(1);
        let node = |layer: u64, slot: u64| BookId(100 * layer + slot);

        let add_book = |id: BookId| {
            store
                .add_book(&Book::new(id, owner, format!("b{}.pdf", id.get())))
                .unwrap();
        };
        add_book(BookId(1)); // start
        add_book(BookId(2)); // end
        for layer in 1..=7u64 {
            for slot in 0..3u64 {
                add_book(node(layer, slot));
            }
        }

        let link = |a: BookId, b: BookId| {
            let q = format!("q_{}_{}", a.get(), b.get());
            store
                .add_record(&KnowledgeRecord::new(a, "k", q.clone(), "answer"))
                .unwrap();
            store
                .add_record(&KnowledgeRecord::new(b, "k", q, "answer"))
                .unwrap();
        };
        for slot in 0..3 {
            link(BookId(1), node(1, slot));
            link(node(7, slot), BookId(2));
        }
        for layer in 1..7 {
            for a in 0..3 {
                for b in 0..3 {
                    link(node(layer, a), node(layer + 1, b));
                }
            }
        }

        let graph = graph_of(&store);
        let err = all_shortest_paths(
            &graph,
            &HashSet::from([BookId(1)]),
            &HashSet::from([BookId(2)]),
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::PathOverflow { max_paths } if max_paths == MAX_PATHS));
    }
}
