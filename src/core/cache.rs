// src/core/cache.rs
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use super::call_graph::CallGraph;
use super::parser::IrDocument;

/// A parsed input together with its call graph
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub graph: Rc<CallGraph>,
    /// SHA-256 of the input text
    pub content_hash: String,
    pub from_cache: bool,
}

impl LoadedDocument {
    pub fn document(&self) -> &IrDocument {
        self.graph.document()
    }
}

/// Parsed documents keyed by content hash, shared by the extractions of one process
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: HashMap<String, Rc<CallGraph>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path`, reusing the parse of an identical earlier input
    pub fn load(&mut self, path: &Path) -> Result<LoadedDocument> {
        let text = std::fs::read_to_string(path)?;
        self.load_text(&text)
    }

    pub fn load_text(&mut self, text: &str) -> Result<LoadedDocument> {
        let content_hash = calculate_hash(text);

        if let Some(graph) = self.entries.get(&content_hash) {
            debug!("reusing parsed document {}", &content_hash[..12]);
            return Ok(LoadedDocument {
                graph: Rc::clone(graph),
                content_hash,
                from_cache: true,
            });
        }

        let document = Rc::new(IrDocument::parse(text)?);
        let graph = Rc::new(CallGraph::new(document));
        self.entries.insert(content_hash.clone(), Rc::clone(&graph));

        Ok(LoadedDocument {
            graph,
            content_hash,
            from_cache: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Calculate SHA256 hash of content
pub fn calculate_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "define void @f() {\n  call void @g()\n  ret void\n}\n";

    #[test]
    fn test_identical_text_is_parsed_once() {
        let mut cache = DocumentCache::new();
        let first = cache.load_text(TEXT).unwrap();
        assert!(!first.from_cache);

        // Memoized callees survive across loads of the same content
        first.graph.callees("f");
        let second = cache.load_text(TEXT).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.graph.memoized_count(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(first.content_hash, second.content_hash);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let mut cache = DocumentCache::new();
        assert!(cache.load_text("define void @f() {\n").is_err());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.ll");
        std::fs::write(&path, TEXT).unwrap();

        let mut cache = DocumentCache::new();
        let loaded = cache.load(&path).unwrap();
        assert!(loaded.document().contains("f"));
        assert_eq!(loaded.content_hash.len(), 64);
        assert!(cache.load(&dir.path().join("missing.ll")).is_err());
    }
}
