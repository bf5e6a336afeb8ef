use cicd_core::completion::{Backend, CompletionService, RetryPolicy};
use cicd_core::embeddings::EmbeddingService;
use cicd_core::models::Severity;
use cicd_core::query::QueryEngine;
use cicd_core::scanner::Scanner;
use cicd_core::store::ScanStore;
use cicd_core::vectorstore::{MemoryVectorStore, VectorStore};
use providers::{CompletionProvider, EmbedResponse, EmbeddingProvider, ProviderError};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Deterministic embeddings: direction varies with text length so ranking
/// is stable but meaningless, which is all these tests need.
struct StubEmbeddings;

#[async_trait::async_trait]
impl EmbeddingProvider for StubEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0, 0.5])
                .collect(),
        })
    }
}

/// Scripted analyst: flags piped-shell content, reports everything else
/// clean.
struct ShellAnalyst;

#[async_trait::async_trait]
impl CompletionProvider for ShellAnalyst {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        if prompt.starts_with("You are a DevSecOps security expert. Answer the question") {
            return Ok(format!("RAG answer based on: {prompt}"));
        }
        if prompt.contains("curl") && prompt.contains("sh") {
            Ok("### Risk: Unrestricted Shell Execution\n\
                **Severity**: High\n\
                **Reason**: pipes remote script directly into shell\n\
                **Suggestion**: pin and verify script\n"
                .to_string())
        } else {
            Ok("No vulnerabilities detected in the provided configuration.".to_string())
        }
    }
}

struct Harness {
    store: ScanStore,
    vector_store: Arc<MemoryVectorStore>,
    embeddings: EmbeddingService,
    completion: CompletionService,
}

async fn harness() -> Harness {
    let pool = storage_connect().await;
    Harness {
        store: ScanStore::new(pool),
        vector_store: Arc::new(MemoryVectorStore::new()),
        embeddings: EmbeddingService::new(Arc::new(StubEmbeddings)),
        completion: CompletionService::new(Arc::new(ShellAnalyst), Backend::Local).with_retry(
            RetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
            },
        ),
    }
}

async fn storage_connect() -> sqlx::SqlitePool {
    let pool = storage::connect("sqlite::memory:").await.unwrap();
    storage::init(&pool).await.unwrap();
    pool
}

impl Harness {
    fn scanner(&self) -> Scanner {
        Scanner::new(
            self.store.clone(),
            self.vector_store.clone(),
            self.embeddings.clone(),
            self.completion.clone(),
        )
        .with_pacing(Duration::ZERO)
    }

    fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(
            self.embeddings.clone(),
            self.vector_store.clone(),
            self.completion.clone(),
        )
    }
}

#[tokio::test]
async fn scan_flags_piped_shell_and_persists_everywhere() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("pipeline.yml");
    fs::write(&file, "curl http://example.com | sh").unwrap();

    let h = harness().await;
    let summary = h.scanner().scan(temp.path()).await.unwrap();

    assert_eq!(summary.total_files, 1);
    assert_eq!(summary.processed_files, 1);
    assert_eq!(summary.results.len(), 1);

    let record = &summary.results[0];
    assert_eq!(record.risks.len(), 1);
    assert_eq!(record.risks[0].risk_name, "Unrestricted Shell Execution");
    assert_eq!(record.risks[0].severity, Severity::High);

    // Relational store has exactly one record for the file.
    let stored = h.store.load_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].file_path, file.to_string_lossy());

    // The aggregate is reconstructible from the stored rows alone.
    let count = h.store.risk_count().await.unwrap();
    assert_eq!(count.0["Unrestricted Shell Execution"].high, 1);

    // Vector store holds at least one chunk tagged with the file's path.
    let path_str = file.to_string_lossy().replace('\\', "/");
    let ids = h.vector_store.list_ids().await.unwrap();
    assert!(ids.iter().any(|id| id.starts_with(&path_str)));
}

#[tokio::test]
async fn rescanning_a_directory_does_not_accumulate_records() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.yml"), "curl http://one.example | sh").unwrap();
    fs::write(temp.path().join("b.yml"), "curl http://two.example | sh").unwrap();

    let h = harness().await;
    h.scanner().scan(temp.path()).await.unwrap();
    h.scanner().scan(temp.path()).await.unwrap();

    // Exactly one record per file present in the second scan.
    let stored = h.store.load_all().await.unwrap();
    assert_eq!(stored.len(), 2);
    let mut paths: Vec<_> = stored.iter().map(|r| r.file_path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 2);

    // Vector ids were replaced, not duplicated.
    let mut ids = h.vector_store.list_ids().await.unwrap();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before);
}

#[tokio::test]
async fn clean_files_are_skipped_but_progress_advances() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("risky.yml"), "curl http://x.example | sh").unwrap();
    fs::write(temp.path().join("clean.yml"), "name: just a label").unwrap();

    let h = harness().await;
    let summary = h.scanner().scan(temp.path()).await.unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.processed_files, 2);
    assert_eq!(summary.skipped_files, 1);
    assert_eq!(summary.results.len(), 1);
    assert_eq!(h.store.load_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn ask_grounds_the_answer_in_the_scanned_file() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("pipeline.yml"), "curl http://example.com | sh").unwrap();

    let h = harness().await;
    h.scanner().scan(temp.path()).await.unwrap();

    let answer = h
        .query_engine()
        .ask("what was found in pipeline.yml")
        .await;
    assert!(answer.starts_with("RAG answer based on:"));
    assert!(answer.contains("Relevant context"));
}

#[tokio::test]
async fn asking_before_any_scan_refuses() {
    let h = harness().await;
    let answer = h.query_engine().ask("what about pipeline.yml").await;
    assert_eq!(answer, "No related files found in the scan results.");
}
