//! RAG query path: embed the question, retrieve the most relevant stored
//! chunks, filename-aware, then answer strictly from that context.

use crate::completion::CompletionService;
use crate::embeddings::EmbeddingService;
use crate::vectorstore::VectorStore;
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, error};

pub const NO_RELATED_FILES_CONTEXT: &str = "No related files found.";

const TOP_K: usize = 5;

fn filename_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\w+(?:\.\w+)?)\b").unwrap())
}

/// Picks the token of the question most likely to name a file: the first
/// dotted token (`deploy.yml`) when one exists, otherwise the first word.
fn candidate_filename(question: &str) -> Option<String> {
    let tokens: Vec<&str> = filename_token_re()
        .find_iter(question)
        .map(|m| m.as_str())
        .collect();
    tokens
        .iter()
        .find(|t| t.contains('.'))
        .or_else(|| tokens.first())
        .map(|t| t.to_lowercase())
}

#[derive(Clone)]
pub struct QueryEngine {
    embeddings: EmbeddingService,
    store: Arc<dyn VectorStore>,
    completion: CompletionService,
}

impl QueryEngine {
    pub fn new(
        embeddings: EmbeddingService,
        store: Arc<dyn VectorStore>,
        completion: CompletionService,
    ) -> Self {
        Self {
            embeddings,
            store,
            completion,
        }
    }

    /// Retrieves context for a question. An exact filename match wins
    /// outright; otherwise filename-substring matches are collected; with
    /// no filename signal at all, the raw nearest neighbors are returned.
    pub async fn retrieve(&self, question: &str) -> Vec<String> {
        let target_filename = candidate_filename(question);

        let embedding = self
            .embeddings
            .embed(&[question.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_default();
        if embedding.is_empty() {
            return vec![NO_RELATED_FILES_CONTEXT.to_string()];
        }

        let hits = match self.store.query(embedding, TOP_K).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Vector query failed: {e}");
                return vec![NO_RELATED_FILES_CONTEXT.to_string()];
            }
        };
        if hits.is_empty() {
            return vec![NO_RELATED_FILES_CONTEXT.to_string()];
        }

        if let Some(target) = &target_filename {
            let mut filtered = Vec::new();
            for hit in &hits {
                let stored = hit
                    .document
                    .metadata
                    .get("filename")
                    .map(|f| f.to_lowercase())
                    .unwrap_or_default();
                if stored.is_empty() {
                    continue;
                }
                if *target == stored {
                    // Exact match takes priority over similarity order.
                    debug!("Exact filename match: {stored}");
                    return vec![hit.document.text.clone()];
                } else if stored.contains(target.as_str()) || target.contains(stored.as_str()) {
                    filtered.push(hit.document.text.clone());
                }
            }
            if !filtered.is_empty() {
                return filtered;
            }
        }

        hits.into_iter().map(|h| h.document.text).collect()
    }

    /// Full question-answer round: retrieve context, then ask the
    /// completion service to answer strictly from it.
    pub async fn ask(&self, question: &str) -> String {
        let context = self.retrieve(question).await;
        self.completion.answer(question, &context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Backend;
    use crate::vectorstore::{MemoryVectorStore, VectorDocument};
    use providers::{
        CompletionProvider, EmbedResponse, EmbeddingProvider, ProviderError,
    };
    use std::collections::HashMap;

    struct UnitProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for UnitProvider {
        async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            Ok(EmbedResponse {
                vectors: texts.iter().map(|_| vec![1.0, 0.0]).collect(),
            })
        }
    }

    struct EchoProvider;

    #[async_trait::async_trait]
    impl CompletionProvider for EchoProvider {
        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            Ok(prompt.to_string())
        }
    }

    fn doc(id: &str, filename: &str, text: &str) -> VectorDocument {
        let mut metadata = HashMap::new();
        metadata.insert("filename".to_string(), filename.to_string());
        VectorDocument {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
        }
    }

    async fn engine_with(
        docs: Vec<(VectorDocument, Vec<f32>)>,
    ) -> QueryEngine {
        let store = Arc::new(MemoryVectorStore::new());
        let (documents, vectors): (Vec<_>, Vec<_>) = docs.into_iter().unzip();
        store.add(documents, vectors).await.unwrap();
        QueryEngine::new(
            EmbeddingService::new(Arc::new(UnitProvider)),
            store,
            CompletionService::new(Arc::new(EchoProvider), Backend::Local),
        )
    }

    #[test]
    fn candidate_filename_prefers_dotted_tokens() {
        assert_eq!(
            candidate_filename("what risks are in deploy.yml today"),
            Some("deploy.yml".to_string())
        );
        assert_eq!(candidate_filename("summarize the scan"), Some("summarize".to_string()));
        assert_eq!(candidate_filename("???"), None);
    }

    #[tokio::test]
    async fn exact_filename_match_wins_over_similarity() {
        // The non-matching doc is more similar to the query vector.
        let engine = engine_with(vec![
            (doc("/a/other.yml", "other.yml", "other text"), vec![1.0, 0.0]),
            (doc("/a/deploy.yml", "deploy.yml", "deploy text"), vec![0.0, 1.0]),
        ])
        .await;
        let context = engine.retrieve("what about deploy.yml here").await;
        assert_eq!(context, vec!["deploy text".to_string()]);
    }

    #[tokio::test]
    async fn substring_matches_are_collected_when_no_exact_match() {
        let engine = engine_with(vec![
            (doc("/a/deploy.yml", "deploy.yml", "deploy text"), vec![1.0, 0.0]),
            (doc("/a/readme.md", "readme.md", "readme text"), vec![0.9, 0.1]),
        ])
        .await;
        // "old_deploy.yml" contains the stored filename as a substring.
        let context = engine.retrieve("check old_deploy.yml please").await;
        assert_eq!(context, vec!["deploy text".to_string()]);
    }

    #[tokio::test]
    async fn falls_back_to_raw_neighbors_without_filename_signal() {
        let engine = engine_with(vec![
            (doc("/a/x.yml", "x.yml", "x text"), vec![1.0, 0.0]),
            (doc("/a/y.yml", "y.yml", "y text"), vec![0.5, 0.5]),
        ])
        .await;
        let context = engine.retrieve("summarize credential risks").await;
        assert_eq!(context.len(), 2);
        assert_eq!(context[0], "x text");
    }

    #[tokio::test]
    async fn empty_store_yields_no_related_files_sentinel() {
        let engine = engine_with(vec![]).await;
        let context = engine.retrieve("anything").await;
        assert_eq!(context, vec![NO_RELATED_FILES_CONTEXT.to_string()]);
        // And the answer path refuses without calling the backend.
        assert_eq!(
            engine.ask("anything").await,
            crate::completion::NO_RELATED_FILES
        );
    }
}
