//! Vector store abstraction: Qdrant-backed and in-memory implementations.

use providers::qdrant::{QdrantClient, QdrantPoint};
use std::collections::HashMap;
use std::sync::Mutex;

/// A stored document: chunk text (or summary text) plus retrieval metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub id: String,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: VectorDocument,
    pub score: f32,
}

/// Contract required by the scan orchestrator and the RAG query path.
/// Single-writer usage only; none of this is designed for concurrent
/// writers.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts documents with their embeddings. `documents` and
    /// `embeddings` are parallel and equal-length.
    async fn add(
        &self,
        documents: Vec<VectorDocument>,
        embeddings: Vec<Vec<f32>>,
    ) -> anyhow::Result<()>;

    async fn delete_by_ids(&self, ids: Vec<String>) -> anyhow::Result<()>;

    async fn list_ids(&self) -> anyhow::Result<Vec<String>>;

    /// Nearest-neighbor query, best match first, documents and metadata
    /// returned together.
    async fn query(&self, embedding: Vec<f32>, n_results: usize)
        -> anyhow::Result<Vec<ScoredDocument>>;

    /// Drops and recreates the collection.
    async fn reset(&self) -> anyhow::Result<()>;
}

const DOCUMENT_PAYLOAD_KEY: &str = "document";

pub struct QdrantVectorStore {
    client: QdrantClient,
}

impl QdrantVectorStore {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantVectorStore {
    async fn add(
        &self,
        documents: Vec<VectorDocument>,
        embeddings: Vec<Vec<f32>>,
    ) -> anyhow::Result<()> {
        let points: Vec<QdrantPoint> = documents
            .into_iter()
            .zip(embeddings)
            .map(|(doc, vector)| {
                let mut payload: HashMap<String, serde_json::Value> = doc
                    .metadata
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                payload.insert(
                    DOCUMENT_PAYLOAD_KEY.to_string(),
                    serde_json::Value::String(doc.text),
                );
                QdrantPoint {
                    id: doc.id,
                    vector,
                    payload,
                }
            })
            .collect();
        self.client.upsert(points).await?;
        Ok(())
    }

    async fn delete_by_ids(&self, ids: Vec<String>) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.client.delete_points(ids).await?;
        Ok(())
    }

    async fn list_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.client.list_ids().await?)
    }

    async fn query(
        &self,
        embedding: Vec<f32>,
        n_results: usize,
    ) -> anyhow::Result<Vec<ScoredDocument>> {
        let resp = self.client.search(embedding, n_results as u64).await?;
        let mut out = Vec::with_capacity(resp.result.len());
        for hit in resp.result {
            let id = match hit.id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            let mut metadata = HashMap::new();
            let mut text = String::new();
            if let Some(serde_json::Value::Object(payload)) = hit.payload {
                for (k, v) in payload {
                    let val = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    if k == DOCUMENT_PAYLOAD_KEY {
                        text = val;
                    } else {
                        metadata.insert(k, val);
                    }
                }
            }
            out.push(ScoredDocument {
                document: VectorDocument { id, text, metadata },
                score: hit.score,
            });
        }
        Ok(out)
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.client.recreate_collection().await?;
        Ok(())
    }
}

/// In-memory cosine-similarity store. The default when no vector DB is
/// configured, and the store the tests run against.
#[derive(Default)]
pub struct MemoryVectorStore {
    entries: Mutex<Vec<(VectorDocument, Vec<f32>)>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[async_trait::async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(
        &self,
        documents: Vec<VectorDocument>,
        embeddings: Vec<Vec<f32>>,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(
            documents.len() == embeddings.len(),
            "documents and embeddings must be parallel"
        );
        let mut entries = self.entries.lock().unwrap();
        for (doc, vec) in documents.into_iter().zip(embeddings) {
            entries.retain(|(existing, _)| existing.id != doc.id);
            entries.push((doc, vec));
        }
        Ok(())
    }

    async fn delete_by_ids(&self, ids: Vec<String>) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(doc, _)| !ids.contains(&doc.id));
        Ok(())
    }

    async fn list_ids(&self) -> anyhow::Result<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().map(|(doc, _)| doc.id.clone()).collect())
    }

    async fn query(
        &self,
        embedding: Vec<f32>,
        n_results: usize,
    ) -> anyhow::Result<Vec<ScoredDocument>> {
        let entries = self.entries.lock().unwrap();
        let mut scored: Vec<ScoredDocument> = entries
            .iter()
            .map(|(doc, vec)| ScoredDocument {
                document: doc.clone(),
                score: cosine(&embedding, vec),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(n_results);
        Ok(scored)
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            text: format!("text for {id}"),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn memory_store_ranks_by_cosine_similarity() {
        let store = MemoryVectorStore::new();
        store
            .add(
                vec![doc("a"), doc("b")],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await
            .unwrap();
        let hits = store.query(vec![0.9, 0.1], 2).await.unwrap();
        assert_eq!(hits[0].document.id, "a");
        assert_eq!(hits[1].document.id, "b");
    }

    #[tokio::test]
    async fn memory_store_add_replaces_same_id() {
        let store = MemoryVectorStore::new();
        store.add(vec![doc("a")], vec![vec![1.0]]).await.unwrap();
        store.add(vec![doc("a")], vec![vec![0.5]]).await.unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn memory_store_deletes_and_resets() {
        let store = MemoryVectorStore::new();
        store
            .add(vec![doc("a"), doc("b")], vec![vec![1.0], vec![2.0]])
            .await
            .unwrap();
        store.delete_by_ids(vec!["a".to_string()]).await.unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["b".to_string()]);
        store.reset().await.unwrap();
        assert!(store.list_ids().await.unwrap().is_empty());
    }
}
