use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub vectors: VectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "cicd_scan.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Target directory for `scan` when none is given on the command line.
    pub directory: String,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            directory: "./sample_configs".to_string(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// `local` (Ollama) or `hosted` (Gemini).
    pub backend: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub gemini_model: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "jimscard/devopd:latest".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// `memory` or `qdrant`.
    pub provider: String,
    pub url: Option<String>,
    pub collection: String,
    pub vector_size: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            url: None,
            collection: "cicd_docs".to_string(),
            vector_size: 768,
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
