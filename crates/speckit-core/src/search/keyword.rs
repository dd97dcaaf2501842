//! Keyword Search
//!
//! BM25-ranked FTS5 lookups with query sanitization. FTS5 has its own query
//! grammar (quotes, NEAR, column filters); user queries are reduced to a
//! disjunction of plain quoted tokens so no input can break the parser.

use std::sync::Arc;

use crate::errors::Result;
use crate::storage::MemoryStore;

/// Cap on tokens taken from a query; beyond this, extra tokens add noise
const MAX_QUERY_TOKENS: usize = 12;

/// Reduce arbitrary user text to a safe FTS5 query.
///
/// Tokens are alphanumeric runs (unicode-aware), each wrapped in double
/// quotes and joined with OR. Returns an empty string when nothing survives,
/// which callers must treat as "no keyword results".
pub fn sanitize_fts5_query(query: &str) -> String {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .take(MAX_QUERY_TOKENS)
        .map(|t| format!("\"{t}\""))
        .collect();

    tokens.join(" OR ")
}

/// BM25 keyword search over the store
pub struct KeywordSearcher {
    store: Arc<MemoryStore>,
}

impl KeywordSearcher {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Sanitize and run; results are (memory_id, relevance) descending.
    /// Ordering is deterministic for a fixed corpus (ties break by rowid).
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(i64, f64)>> {
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(vec![]);
        }
        self.store.search_keyword(&sanitized, limit)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryUpsert;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_plain_words() {
        assert_eq!(sanitize_fts5_query("retry backoff"), "\"retry\" OR \"backoff\"");
    }

    #[test]
    fn test_sanitize_strips_operators() {
        let sanitized = sanitize_fts5_query("\"quoted\" AND (grouped) NEAR/3 col:filter");
        assert!(!sanitized.contains('('));
        assert!(!sanitized.contains(':'));
        // The words themselves survive as quoted tokens
        assert!(sanitized.contains("\"quoted\""));
        assert!(sanitized.contains("\"filter\""));
    }

    #[test]
    fn test_sanitize_empty_and_symbols() {
        assert_eq!(sanitize_fts5_query(""), "");
        assert_eq!(sanitize_fts5_query("!!! ???"), "");
    }

    #[test]
    fn test_sanitize_caps_token_count() {
        let long: String = (0..50).map(|i| format!("word{i} ")).collect();
        let sanitized = sanitize_fts5_query(&long);
        assert_eq!(sanitized.matches(" OR ").count(), MAX_QUERY_TOKENS - 1);
    }

    #[test]
    fn test_searcher_end_to_end() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new(Some(dir.path().join("test.db"))).unwrap());
        store
            .upsert_memory(&MemoryUpsert {
                spec_folder: "f".to_string(),
                file_path: "a.md".to_string(),
                title: "Retry policy".to_string(),
                content: "retry requests with exponential backoff".to_string(),
                content_hash: "h1".to_string(),
                ..MemoryUpsert::default()
            })
            .unwrap();

        let searcher = KeywordSearcher::new(store);
        let hits = searcher.search("exponential backoff!", 10).unwrap();
        assert_eq!(hits.len(), 1);

        assert!(searcher.search("???", 10).unwrap().is_empty());
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new(Some(dir.path().join("test.db"))).unwrap());
        for i in 0..5 {
            store
                .upsert_memory(&MemoryUpsert {
                    spec_folder: "f".to_string(),
                    file_path: format!("{i}.md"),
                    title: "note".to_string(),
                    content: "identical content for ranking".to_string(),
                    content_hash: format!("h{i}"),
                    ..MemoryUpsert::default()
                })
                .unwrap();
        }

        let searcher = KeywordSearcher::new(store);
        let first = searcher.search("identical ranking", 10).unwrap();
        let second = searcher.search("identical ranking", 10).unwrap();
        assert_eq!(first, second);
    }
}
