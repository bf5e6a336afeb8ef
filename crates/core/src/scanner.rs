//! Scan orchestrator: walks a directory and runs the per-file
//! analyze -> extract -> persist cycle strictly sequentially.

use crate::completion::CompletionService;
use crate::embeddings::EmbeddingService;
use crate::extractor::extract_risks;
use crate::indexer::index_file;
use crate::models::{RiskCount, ScanRecord};
use crate::store::ScanStore;
use crate::text::preprocess_text;
use crate::vectorstore::VectorStore;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct ScanSummary {
    pub results: Vec<ScanRecord>,
    pub risk_count: RiskCount,
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
}

pub struct Scanner {
    store: ScanStore,
    vector_store: Arc<dyn VectorStore>,
    embeddings: EmbeddingService,
    completion: CompletionService,
    pacing: Duration,
}

impl Scanner {
    pub fn new(
        store: ScanStore,
        vector_store: Arc<dyn VectorStore>,
        embeddings: EmbeddingService,
        completion: CompletionService,
    ) -> Self {
        let pacing = completion.backend().pacing();
        Self {
            store,
            vector_store,
            embeddings,
            completion,
            pacing,
        }
    }

    /// Overrides the per-file pacing delay (rate-limit courtesy to the
    /// backend). Tests run with zero.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Scans every file under `directory`. Existing records for the
    /// directory are invalidated up front; per-file failures are logged and
    /// skipped, never aborting the scan.
    pub async fn scan(&self, directory: &Path) -> anyhow::Result<ScanSummary> {
        let dir_str = directory.to_string_lossy().into_owned();
        let deleted = self.store.delete_prefix(&dir_str).await?;
        if deleted > 0 {
            info!("Invalidated {deleted} stale records under {dir_str}");
        }

        let files = enumerate_files(directory);
        let mut summary = ScanSummary {
            total_files: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            warn!("No files found in: {dir_str}");
            return Ok(summary);
        }

        for file_path in &files {
            let path_str = file_path.to_string_lossy().into_owned();

            let Some(content) = read_file_content(file_path) else {
                summary.processed_files += 1;
                continue;
            };
            if content.is_empty() {
                summary.processed_files += 1;
                continue;
            }

            info!("Analyzing: {path_str}");
            let analysis = self.completion.analyze(&content).await;

            if analysis.contains("Analysis failed")
                || analysis.contains("No vulnerabilities detected")
            {
                warn!("Analysis may have failed for {path_str}");
                summary.processed_files += 1;
                summary.skipped_files += 1;
                continue;
            }

            let risks = extract_risks(&analysis, &content);
            for risk in &risks {
                summary.risk_count.add(risk);
            }

            let record = ScanRecord {
                file_path: path_str.clone(),
                content: content.clone(),
                risks: risks.clone(),
                analysis: analysis.clone(),
                timestamp: Utc::now(),
            };

            let persisted = async {
                self.store.insert(&record).await?;
                index_file(
                    self.vector_store.as_ref(),
                    &self.embeddings,
                    &path_str,
                    &content,
                    &analysis,
                    &risks,
                )
                .await?;
                anyhow::Ok(())
            }
            .await;

            if let Err(e) = persisted {
                error!("Error processing {path_str}: {e}");
                summary.processed_files += 1;
                continue;
            }

            summary.results.push(record);
            summary.processed_files += 1;

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(
            "Scan completed: {}/{} files, {} skipped",
            summary.processed_files, summary.total_files, summary.skipped_files
        );
        Ok(summary)
    }
}

/// Lists every file under the directory, recursively, with no extension
/// filtering. Unreadable entries are tolerated and skipped.
fn enumerate_files(directory: &Path) -> Vec<PathBuf> {
    WalkDir::new(directory)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Reads and decodes a file, then normalizes it for analysis. Decoding
/// tries UTF-8, then BOM-tagged UTF-16, then Latin-1 (which accepts any
/// byte sequence). I/O failures are recoverable: log and return None.
pub fn read_file_content(path: &Path) -> Option<String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Cannot read file {}: {e}", path.display());
            return None;
        }
    };
    Some(preprocess_text(&decode_bytes(&bytes)))
}

fn decode_bytes(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    if let Some(text) = decode_utf16(bytes) {
        return text;
    }
    // Latin-1 maps every byte to a codepoint, so this never fails.
    bytes.iter().map(|&b| b as char).collect()
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (le, payload) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => return None,
    };
    if payload.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            if le {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_prefers_utf8() {
        assert_eq!(decode_bytes("hello".as_bytes()), "hello");
    }

    #[test]
    fn decode_handles_utf16_le_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_bytes(&bytes), "hi");
    }

    #[test]
    fn decode_falls_back_to_latin1_for_arbitrary_bytes() {
        // 0xE9 alone is invalid UTF-8 but is 'é' in Latin-1.
        assert_eq!(decode_bytes(&[0x61, 0xE9]), "a\u{e9}");
    }

    #[test]
    fn read_missing_file_is_recoverable() {
        assert!(read_file_content(Path::new("/nonexistent/file.yml")).is_none());
    }
}
