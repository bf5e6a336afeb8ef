//! Wires configuration into concrete providers, stores, and services.
//!
//! All handles are built here and passed down explicitly; nothing in the
//! workspace holds process-global state.

use crate::completion::{Backend, CompletionService};
use crate::config::AppConfig;
use crate::embeddings::EmbeddingService;
use crate::models::RiskCount;
use crate::query::QueryEngine;
use crate::scanner::{ScanSummary, Scanner};
use crate::store::ScanStore;
use crate::vectorstore::{MemoryVectorStore, QdrantVectorStore, VectorStore};
use anyhow::Context;
use providers::gemini::{GeminiConfig, GeminiProvider};
use providers::noop::NoopProvider;
use providers::ollama::{OllamaConfig, OllamaProvider};
use providers::qdrant::{QdrantClient, QdrantConfig};
use providers::ProviderRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let ollama = Arc::new(OllamaProvider::new(OllamaConfig {
        base_url: config.completion.ollama_url.clone(),
        chat_model: config.completion.ollama_model.clone(),
        embedding_model: config.embeddings.model.clone(),
    }));
    let mut reg = ProviderRegistry::new()
        .with_embedding("noop", Arc::new(NoopProvider))
        .with_embedding("ollama", ollama.clone())
        .with_completion("ollama", ollama);

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: key,
            model: config.completion.gemini_model.clone(),
            ..GeminiConfig::new(String::new())
        });
        reg = reg.with_completion("gemini", Arc::new(provider));
    }

    reg.set_preferred_embedding(&config.embeddings.provider)
}

pub fn build_vector_store(config: &AppConfig) -> Arc<dyn VectorStore> {
    if config.vectors.provider == "qdrant" {
        if let Some(url) = &config.vectors.url {
            let client = QdrantClient::new(QdrantConfig {
                url: url.clone(),
                collection: config.vectors.collection.clone(),
                api_key: std::env::var("QDRANT_API_KEY").ok(),
                vector_size: config.vectors.vector_size,
            });
            return Arc::new(QdrantVectorStore::new(client));
        }
    }
    Arc::new(MemoryVectorStore::new())
}

pub fn build_completion(
    config: &AppConfig,
    registry: &ProviderRegistry,
) -> anyhow::Result<CompletionService> {
    let (backend, provider_name) = match config.completion.backend.as_str() {
        "hosted" => (Backend::Hosted, "gemini"),
        _ => (Backend::Local, "ollama"),
    };
    let provider = registry
        .completion(Some(provider_name))
        .with_context(|| format!("completion backend '{provider_name}' not available"))?;
    Ok(CompletionService::new(provider, backend))
}

/// Explicitly owned handles for one process lifetime: opened at startup,
/// dropped at shutdown.
pub struct AppContext {
    pub store: ScanStore,
    pub vector_store: Arc<dyn VectorStore>,
    pub embeddings: EmbeddingService,
    pub completion: CompletionService,
}

impl AppContext {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = storage::connect(&config.database.path)
            .await
            .context("db connect")?;
        storage::init(&pool).await.context("db init")?;

        let registry = build_registry(config);
        let embedding_provider = registry
            .embedding(None)
            .context("embedding provider not available")?;

        Ok(Self {
            store: ScanStore::new(pool),
            vector_store: build_vector_store(config),
            embeddings: EmbeddingService::new(embedding_provider),
            completion: build_completion(config, &registry)?,
        })
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new(
            self.store.clone(),
            self.vector_store.clone(),
            self.embeddings.clone(),
            self.completion.clone(),
        )
    }

    pub fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(
            self.embeddings.clone(),
            self.vector_store.clone(),
            self.completion.clone(),
        )
    }
}

pub async fn run_scan(config: &AppConfig, directory: &Path) -> anyhow::Result<ScanSummary> {
    let ctx = AppContext::init(config).await?;
    ctx.scanner().scan(directory).await
}

pub async fn run_ask(config: &AppConfig, question: &str) -> anyhow::Result<String> {
    let ctx = AppContext::init(config).await?;
    Ok(ctx.query_engine().ask(question).await)
}

pub async fn load_risk_count(config: &AppConfig) -> anyhow::Result<RiskCount> {
    let ctx = AppContext::init(config).await?;
    ctx.store.risk_count().await
}

/// Full reset: drops and recreates both the relational table and the
/// vector collection.
pub async fn run_reset(config: &AppConfig) -> anyhow::Result<()> {
    info!("Resetting databases...");
    let ctx = AppContext::init(config).await?;
    storage::reset(ctx.store.pool()).await?;
    ctx.vector_store.reset().await?;
    info!("Databases reset completed.");
    Ok(())
}
