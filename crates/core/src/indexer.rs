//! Builds and stores the vector documents for one scanned file: overlapping
//! content chunks plus a synthetic per-file summary document.

use crate::embeddings::EmbeddingService;
use crate::models::RiskFinding;
use crate::text::{chunk_text, CHUNK_OVERLAP, CHUNK_SIZE};
use crate::vectorstore::{VectorDocument, VectorStore};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

const CONTENT_TYPE: &str = "cicd_config";
const SUMMARY_CONTENT_CHARS: usize = 2000;
const SUMMARY_ANALYSIS_CHARS: usize = 1000;

/// Replaces a file's documents in the vector store: every id prefixed by the
/// normalized path is deleted first, so a re-scan never leaves a partial
/// overwrite. Returns how many documents were stored; chunks whose
/// embedding came back empty are skipped, not failed.
pub async fn index_file(
    store: &dyn VectorStore,
    embeddings: &EmbeddingService,
    file_path: &str,
    content: &str,
    analysis: &str,
    risks: &[RiskFinding],
) -> anyhow::Result<usize> {
    let normalized_path = file_path.replace('\\', "/");

    let existing = store.list_ids().await?;
    let to_delete: Vec<String> = existing
        .into_iter()
        .filter(|id| id.starts_with(&normalized_path))
        .collect();
    if !to_delete.is_empty() {
        debug!("Deleting stale vector ids: {:?}", to_delete);
        store.delete_by_ids(to_delete).await?;
    }

    let filename = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let directory = Path::new(file_path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut metadata_base = HashMap::new();
    metadata_base.insert("file_path".to_string(), file_path.to_string());
    metadata_base.insert("filename".to_string(), filename.clone());
    metadata_base.insert("directory".to_string(), directory);
    metadata_base.insert("risks".to_string(), serde_json::to_string(risks)?);
    metadata_base.insert("content_type".to_string(), CONTENT_TYPE.to_string());

    let mut documents = Vec::new();
    for (i, chunk) in chunk_text(content, CHUNK_SIZE, CHUNK_OVERLAP)?
        .into_iter()
        .enumerate()
    {
        let mut metadata = metadata_base.clone();
        metadata.insert("chunk_id".to_string(), i.to_string());
        documents.push(VectorDocument {
            id: format!("{normalized_path}_chunk_{i}"),
            text: chunk,
            metadata,
        });
    }

    let summary = format!(
        "[File Path] {}\n[Filename] {}\n[Content Summary] {}\n[Risk Analysis] {}",
        file_path,
        filename,
        content.chars().take(SUMMARY_CONTENT_CHARS).collect::<String>(),
        analysis.chars().take(SUMMARY_ANALYSIS_CHARS).collect::<String>(),
    );
    documents.push(VectorDocument {
        id: normalized_path,
        text: summary,
        metadata: metadata_base,
    });

    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let vectors = embeddings.embed(&texts).await;

    let mut to_store = Vec::new();
    let mut store_vectors = Vec::new();
    for (doc, vector) in documents.into_iter().zip(vectors) {
        if vector.is_empty() {
            warn!("Embedding unavailable, skipping vector storage for {}", doc.id);
            continue;
        }
        to_store.push(doc);
        store_vectors.push(vector);
    }
    let stored = to_store.len();
    if stored > 0 {
        store.add(to_store, store_vectors).await?;
    }
    Ok(stored)
}
