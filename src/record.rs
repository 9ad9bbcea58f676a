//! Core data model: books, knowledge records, and request-scoped filters.
//!
//! A *book* is a source document contributing questions to the network.
//! A *knowledge record* is one (keyword, question, answer, proof) unit
//! extracted from a book. Question identity is the exact text — no
//! normalization is applied anywhere in the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for a book.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BookId(pub u64);

impl BookId {
    /// The raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the owner all queries are scoped to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A source document contributing questions to the network.
///
/// Immutable during path-finding: every request works on a read-only
/// snapshot taken from the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub owner: OwnerId,
    /// Display title. May be absent — [`Book::display_title`] falls back
    /// to the filename.
    pub title: Option<String>,
    /// Filename of the registered source document.
    pub filename: String,
    pub category: Option<String>,
    pub doctrine: Option<String>,
}

impl Book {
    /// Create a book with no category or doctrine.
    pub fn new(id: BookId, owner: OwnerId, filename: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            title: None,
            filename: filename.into(),
            category: None,
            doctrine: None,
        }
    }

    /// Set the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the doctrine.
    pub fn with_doctrine(mut self, doctrine: impl Into<String>) -> Self {
        self.doctrine = Some(doctrine.into());
        self
    }

    /// The title shown to users: the stored title, or the filename when
    /// no title was registered.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => &self.filename,
        }
    }
}

/// One extracted (keyword, question, answer, proof) unit.
///
/// Multiple records may share the same question across different books.
/// Within one book a question is expected to map to a single answer;
/// duplicates are tolerated and resolve last-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub book: BookId,
    pub keyword: String,
    pub question: String,
    pub answer: String,
    pub proof: Option<String>,
    /// Page the record was extracted from, when known.
    pub page: Option<u32>,
}

impl KnowledgeRecord {
    /// Create a record without proof or page information.
    pub fn new(
        book: BookId,
        keyword: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            book,
            keyword: keyword.into(),
            question: question.into(),
            answer: answer.into(),
            proof: None,
            page: None,
        }
    }

    /// Attach a proof passage.
    pub fn with_proof(mut self, proof: impl Into<String>) -> Self {
        self.proof = Some(proof.into());
        self
    }

    /// Attach a page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Owner scope plus the optional category/doctrine filters applied to
/// every graph build and question lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub owner: OwnerId,
    pub category: Option<String>,
    pub doctrine: Option<String>,
}

impl RecordFilter {
    /// A filter selecting everything the owner can see.
    pub fn for_owner(owner: OwnerId) -> Self {
        Self {
            owner,
            category: None,
            doctrine: None,
        }
    }

    /// Restrict to one category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Restrict to one doctrine.
    pub fn with_doctrine(mut self, doctrine: impl Into<String>) -> Self {
        self.doctrine = Some(doctrine.into());
        self
    }

    /// Whether the book passes the owner scope and both filters.
    pub fn matches(&self, book: &Book) -> bool {
        if book.owner != self.owner {
            return false;
        }
        if let Some(cat) = &self.category {
            if book.category.as_deref() != Some(cat.as_str()) {
                return false;
            }
        }
        if let Some(doc) = &self.doctrine {
            if book.doctrine.as_deref() != Some(doc.as_str()) {
                return false;
            }
        }
        true
    }

    /// Human-readable suffix describing active filters, e.g.
    /// `" (with filters: Category: fiqh, Doctrine: hanafi)"`.
    /// Empty when no filter is active.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(cat) = &self.category {
            parts.push(format!("Category: {cat}"));
        }
        if let Some(doc) = &self.doctrine {
            parts.push(format!("Doctrine: {doc}"));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" (with filters: {})", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_falls_back_to_filename() {
        let book = Book::new(BookId(1), OwnerId(1), "kitab.pdf");
        assert_eq!(book.display_title(), "kitab.pdf");

        let titled = book.clone().with_title("Kitab al-Umm");
        assert_eq!(titled.display_title(), "Kitab al-Umm");

        let mut empty = book;
        empty.title = Some(String::new());
        assert_eq!(empty.display_title(), "kitab.pdf");
    }

    #[test]
    fn filter_matches_owner_and_fields() {
        let book = Book::new(BookId(1), OwnerId(7), "a.pdf")
            .with_category("fiqh")
            .with_doctrine("hanafi");

        assert!(RecordFilter::for_owner(OwnerId(7)).matches(&book));
        assert!(!RecordFilter::for_owner(OwnerId(8)).matches(&book));
        assert!(
            RecordFilter::for_owner(OwnerId(7))
                .with_category("fiqh")
                .matches(&book)
        );
        assert!(
            !RecordFilter::for_owner(OwnerId(7))
                .with_category("aqidah")
                .matches(&book)
        );
        assert!(
            !RecordFilter::for_owner(OwnerId(7))
                .with_doctrine("shafii")
                .matches(&book)
        );
    }

    #[test]
    fn filter_describe_lists_active_filters() {
        let none = RecordFilter::for_owner(OwnerId(1));
        assert_eq!(none.describe(), "");

        let both = RecordFilter::for_owner(OwnerId(1))
            .with_category("fiqh")
            .with_doctrine("maliki");
        assert_eq!(
            both.describe(),
            " (with filters: Category: fiqh, Doctrine: maliki)"
        );
    }
}
