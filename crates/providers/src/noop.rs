use crate::{CompletionProvider, EmbedResponse, EmbeddingProvider, ProviderError};

#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for NoopProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: vec![vec![]; texts.len()],
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for NoopProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
