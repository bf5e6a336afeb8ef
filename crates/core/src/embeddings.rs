//! Embedding service: provider call, L2 normalization, graceful degrade.

use providers::EmbeddingProvider;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Returns one vector per input, each scaled to unit L2 norm. A backend
    /// failure never propagates: every input gets an empty vector instead,
    /// and callers treat that as "embedding unavailable".
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        match self.provider.embed(texts).await {
            Ok(resp) => resp.vectors.into_iter().map(|v| normalize(&v)).collect(),
            Err(e) => {
                error!("Embedding generation failed: {e}");
                vec![Vec::new(); texts.len()]
            }
        }
    }
}

/// L2-normalizes a vector; a zero vector passes through unchanged.
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::{EmbedResponse, ProviderError};

    struct FixedProvider(Vec<Vec<f32>>);

    #[async_trait::async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            Ok(EmbedResponse {
                vectors: self.0.clone(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            Err(ProviderError::RequestFailed("backend down".into()))
        }
    }

    #[test]
    fn normalize_produces_unit_norm() {
        let v = normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_passes_zero_vector_through() {
        assert_eq!(normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn embed_normalizes_each_vector() {
        let svc = EmbeddingService::new(std::sync::Arc::new(FixedProvider(vec![
            vec![3.0, 4.0],
            vec![0.0, 0.0],
        ])));
        let out = svc.embed(&["a".into(), "b".into()]).await;
        assert!((out[0][0] - 0.6).abs() < 1e-6);
        assert!((out[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(out[1], vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn embed_degrades_to_empty_vectors_on_failure() {
        let svc = EmbeddingService::new(std::sync::Arc::new(FailingProvider));
        let out = svc.embed(&["a".into(), "b".into(), "c".into()]).await;
        assert_eq!(out, vec![Vec::<f32>::new(); 3]);
    }
}
