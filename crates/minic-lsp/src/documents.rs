//! Open document store
//!
//! Maps a document URI to its full current text. Content is replaced
//! wholesale on every change.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{LspError, LspResult};

/// In-memory map of open documents
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: HashMap<String, String>,
    max_documents: Option<usize>,
}

impl DocumentStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store refusing to hold more than `max_documents` at once
    pub fn with_limit(max_documents: Option<usize>) -> Self {
        Self {
            documents: HashMap::new(),
            max_documents,
        }
    }

    /// Open a document, replacing the text if the URI is already open
    pub fn open(&mut self, uri: &str, text: String) -> LspResult<()> {
        if let Some(existing) = self.documents.get_mut(uri) {
            *existing = text;
            return Ok(());
        }
        if let Some(max) = self.max_documents {
            if self.documents.len() >= max {
                return Err(LspError::Capacity(format!(
                    "cannot open {}: {} documents already open",
                    uri, max
                )));
            }
        }
        debug!("Document opened: uri={}, size={} bytes", uri, text.len());
        self.documents.insert(uri.to_string(), text);
        Ok(())
    }

    /// Replace the text of an open document
    pub fn update(&mut self, uri: &str, text: String) -> LspResult<()> {
        let existing = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| LspError::NotFound(format!("Document not open: {}", uri)))?;
        *existing = text;
        Ok(())
    }

    /// Current text of an open document
    pub fn get(&self, uri: &str) -> LspResult<&str> {
        self.documents
            .get(uri)
            .map(String::as_str)
            .ok_or_else(|| LspError::NotFound(format!("Document not open: {}", uri)))
    }

    /// Forget a document
    pub fn close(&mut self, uri: &str) -> LspResult<()> {
        self.documents
            .remove(uri)
            .map(|_| debug!("Document closed: uri={}", uri))
            .ok_or_else(|| LspError::NotFound(format!("Document not open: {}", uri)))
    }

    /// Number of open documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no document is open
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
