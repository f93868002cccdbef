//! Semantic ranking of fetched documents against a query.
//!
//! The engine owns the embedding provider for the process lifetime. Each
//! call encodes the query and every non-empty document, scores them by
//! cosine similarity (negatives clamped to zero), and returns the full
//! ranked list — the orchestrator decides how many results to use.
//!
//! Vectors are transient: nothing is cached across calls.

use anyhow::Result;

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{Document, SearchResult};

/// Ranks documents by semantic similarity to a query.
pub struct SemanticSearchEngine {
    embedder: Box<dyn Embedder>,
}

impl SemanticSearchEngine {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Rank `documents` against `query_text`, best match first.
    ///
    /// Documents with empty or whitespace-only bodies are skipped before
    /// encoding and never appear in the output. Ties keep the original
    /// fetch order. An empty input yields an empty result, not an error.
    pub async fn rank(&self, query_text: &str, documents: &[Document]) -> Result<Vec<SearchResult>> {
        let candidates: Vec<&Document> = documents
            .iter()
            .filter(|d| !d.body.trim().is_empty())
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut texts: Vec<String> = Vec::with_capacity(candidates.len() + 1);
        texts.push(query_text.to_string());
        texts.extend(candidates.iter().map(|d| embedding_text(d)));

        let vectors = self.embedder.embed(&texts).await?;
        let (query_vec, doc_vecs) = vectors
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let mut scored: Vec<(usize, &Document, f32)> = candidates
            .iter()
            .zip(doc_vecs.iter())
            .enumerate()
            .map(|(i, (doc, vec))| {
                let score = cosine_similarity(query_vec, vec).max(0.0);
                (i, *doc, score)
            })
            .collect();

        // Stable sort: equal scores keep fetch order.
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (_, doc, score))| SearchResult {
                document: doc.clone(),
                score,
                rank,
            })
            .collect())
    }
}

/// Combine a document's text fields into one embedding input.
///
/// Title, body, and extracted resolution steps each contribute, prefixed so
/// structurally different documents with shared words still separate.
fn embedding_text(doc: &Document) -> String {
    let mut parts = Vec::with_capacity(3);
    if !doc.title.trim().is_empty() {
        parts.push(format!("Title: {}", doc.title.trim()));
    }
    parts.push(format!("Content: {}", doc.body.trim()));
    if let Some(resolution) = &doc.resolution {
        if !resolution.trim().is_empty() {
            parts.push(format!("Resolution: {}", resolution.trim()));
        }
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use crate::models::SourceType;

    fn engine() -> SemanticSearchEngine {
        SemanticSearchEngine::new(Box::new(HashedEmbedder::new(384)))
    }

    fn doc(id: &str, title: &str, body: &str) -> Document {
        Document::new(id, title, body, SourceType::Jira)
    }

    #[tokio::test]
    async fn test_empty_input_empty_output() {
        let results = engine().rank("anything", &[]).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_bodies_excluded() {
        let docs = vec![
            doc("A-1", "has body", "database connection pooling settings"),
            doc("A-2", "empty", ""),
            doc("A-3", "whitespace", "   \n\t "),
        ];
        let results = engine().rank("database settings", &docs).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.source_id, "A-1");
    }

    #[tokio::test]
    async fn test_output_never_longer_than_input() {
        let docs = vec![
            doc("A-1", "one", "alpha beta"),
            doc("A-2", "two", "gamma delta"),
        ];
        let results = engine().rank("alpha", &docs).await.unwrap();
        assert!(results.len() <= docs.len());
    }

    #[tokio::test]
    async fn test_sorted_descending_with_ranks() {
        let docs = vec![
            doc("A-1", "off topic", "quarterly revenue spreadsheet totals"),
            doc("A-2", "on topic", "reset your login password from the account page"),
            doc("A-3", "nearby", "password rules for new accounts"),
        ];
        let results = engine()
            .rank("how do I reset my login password", &docs)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.rank, i);
        }
        assert_eq!(results[0].document.source_id, "A-2");
    }

    #[tokio::test]
    async fn test_scores_clamped_to_unit_interval() {
        let docs = vec![
            doc("A-1", "", "completely unrelated festival catering menu"),
            doc("A-2", "", "server outage in production cluster"),
        ];
        let results = engine().rank("production outage", &docs).await.unwrap();
        for r in &results {
            assert!(r.score >= 0.0 && r.score <= 1.0, "score {}", r.score);
        }
    }

    #[tokio::test]
    async fn test_ties_keep_fetch_order() {
        // Identical bodies produce identical scores; fetch order must hold.
        let docs = vec![
            doc("A-1", "", "identical text"),
            doc("A-2", "", "identical text"),
        ];
        let results = engine().rank("identical text", &docs).await.unwrap();
        assert_eq!(results[0].document.source_id, "A-1");
        assert_eq!(results[1].document.source_id, "A-2");
    }

    #[test]
    fn test_embedding_text_includes_resolution() {
        let mut d = doc("A-1", "VPN drops", "tunnel resets every hour");
        d.resolution = Some("increase keepalive interval".to_string());
        let text = embedding_text(&d);
        assert!(text.contains("Title: VPN drops"));
        assert!(text.contains("Resolution: increase keepalive"));
    }
}
