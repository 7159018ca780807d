//! Knowledge-source lookup.
//!
//! The knowledge source is an opaque page store keyed by id, title, or URL.
//! Production deployments back this with a database; tests and small local
//! corpora use [`InMemoryKnowledgeSource`]. Lookups are read-only and safe
//! to call concurrently from mapping workers.

use crate::record::Document;
use std::collections::HashMap;

/// Read-only page lookup by id, title, or URL.
pub trait KnowledgeSource {
    /// Fetches a page by its stable id.
    fn get_page_by_id(&self, id: &str) -> Option<Document>;

    /// Fetches the first page with the given title.
    fn get_page_by_title(&self, title: &str) -> Option<Document>;

    /// Fetches every page with the given title. More than one page per
    /// title is unusual but possible (disambiguation artifacts).
    fn get_pages_by_title(&self, title: &str) -> Vec<Document>;

    /// Fetches a page from an article URL by deriving its title from the
    /// final path segment.
    fn get_page_from_url(&self, url: &str) -> Option<Document> {
        self.get_page_by_title(&title_from_url(url)?)
    }
}

/// Derives a page title from an article URL: the final path segment with
/// underscores restored to spaces, query and fragment stripped.
pub fn title_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        return None;
    }
    Some(segment.replace('_', " "))
}

/// In-memory knowledge source over a fixed document collection.
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeSource {
    by_id: HashMap<String, Document>,
    ids_by_title: HashMap<String, Vec<String>>,
}

impl InMemoryKnowledgeSource {
    /// Builds the source from a document collection. Later documents with a
    /// duplicate id replace earlier ones.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut by_id = HashMap::with_capacity(documents.len());
        let mut ids_by_title: HashMap<String, Vec<String>> = HashMap::new();
        for document in documents {
            ids_by_title
                .entry(document.title.clone())
                .or_default()
                .push(document.id.clone());
            by_id.insert(document.id.clone(), document);
        }
        Self { by_id, ids_by_title }
    }

    /// Number of pages held.
    pub fn num_pages(&self) -> usize {
        self.by_id.len()
    }
}

impl KnowledgeSource for InMemoryKnowledgeSource {
    fn get_page_by_id(&self, id: &str) -> Option<Document> {
        self.by_id.get(id).cloned()
    }

    fn get_page_by_title(&self, title: &str) -> Option<Document> {
        self.ids_by_title
            .get(title)
            .and_then(|ids| ids.first())
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }

    fn get_pages_by_title(&self, title: &str) -> Vec<Document> {
        self.ids_by_title
            .get(title)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
