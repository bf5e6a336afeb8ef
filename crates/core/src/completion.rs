//! Completion service: prompt assembly, retry policy, failure-string
//! semantics over a pluggable LLM backend.

use providers::{CompletionProvider, ProviderError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Which kind of backend is wired in. The local model gets a bounded
/// content prefix and a short per-file pacing delay; the hosted model gets
/// full content and a longer delay to stay under its rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Hosted,
}

impl Backend {
    pub fn pacing(self) -> Duration {
        match self {
            Backend::Local => Duration::from_secs(1),
            Backend::Hosted => Duration::from_secs(3),
        }
    }
}

/// Fixed-backoff retry for transient quota failures. Non-retryable errors
/// return immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    async fn run<F, Fut>(&self, mut call: F) -> Result<String, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<String, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "Quota limit reached. Waiting {:?} before retrying... (Attempt {}/{})",
                        self.backoff, attempt, self.max_attempts
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Prefix length fed to the local model; the hosted model sees full content.
const LOCAL_CONTENT_LIMIT: usize = 3000;

pub const NO_VULNERABILITIES_CONFIG: &str =
    "No vulnerabilities detected in the provided configuration.";
pub const NO_VULNERABILITIES_CODE: &str = "No vulnerabilities detected in the provided code.";
pub const NO_RELATED_FILES: &str = "No related files found in the scan results.";

#[derive(Clone)]
pub struct CompletionService {
    provider: Arc<dyn CompletionProvider>,
    backend: Backend,
    retry: RetryPolicy,
}

impl CompletionService {
    pub fn new(provider: Arc<dyn CompletionProvider>, backend: Backend) -> Self {
        Self {
            provider,
            backend,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Asks the backend for a security analysis of one file. Never returns
    /// an error: backend failures come back as "Analysis failed..." strings
    /// so the scan loop can log them and move on.
    pub async fn analyze(&self, content: &str) -> String {
        let prompt = self.analysis_prompt(content);
        match self.retry.run(|| self.provider.complete(&prompt)).await {
            Ok(text) if text.trim().is_empty() => match self.backend {
                Backend::Local => NO_VULNERABILITIES_CONFIG.to_string(),
                Backend::Hosted => NO_VULNERABILITIES_CODE.to_string(),
            },
            Ok(text) => text,
            Err(e @ ProviderError::QuotaExceeded(_)) => {
                error!(
                    "Quota limit reached after {} attempts. Skipping this file.",
                    self.retry.max_attempts
                );
                format!("Analysis failed due to quota limit: {e}")
            }
            Err(e) => format!("Analysis failed: {e}"),
        }
    }

    /// Answers a question strictly from retrieved context. Empty context or
    /// the no-related-files sentinel short-circuits without a backend call.
    pub async fn answer(&self, question: &str, context: &[String]) -> String {
        if context.is_empty() || context[0] == crate::query::NO_RELATED_FILES_CONTEXT {
            return NO_RELATED_FILES.to_string();
        }
        let prompt = answer_prompt(question, context);
        match self.retry.run(|| self.provider.complete(&prompt)).await {
            Ok(text) => text,
            Err(e @ ProviderError::QuotaExceeded(_)) => {
                error!(
                    "Quota limit reached after {} attempts in RAG response.",
                    self.retry.max_attempts
                );
                format!("Response generation failed due to quota limit: {e}")
            }
            Err(e) => format!("Response generation failed: {e}"),
        }
    }

    fn analysis_prompt(&self, content: &str) -> String {
        let (subject, excerpt, sentinel) = match self.backend {
            Backend::Local => (
                "configuration file",
                truncate_chars(content, LOCAL_CONTENT_LIMIT),
                NO_VULNERABILITIES_CONFIG,
            ),
            Backend::Hosted => ("code", content.to_string(), NO_VULNERABILITIES_CODE),
        };
        format!(
            "You are a DevSecOps security expert. Analyze the following CI/CD {subject} for \
potential security risks by considering the full context of the pipeline. Follow these steps:\n\
1. Thoroughly analyze the {subject} content to identify **specific** security risks. Do not \
assume risks exist unless there is clear evidence in the content.\n\
2. For each identified risk, explain the reason based on the specific content provided, not \
generic assumptions.\n\
3. Provide targeted remediation suggestions that are directly applicable to the identified risk.\n\
4. Assign a severity level (Low, Medium, High) based on the potential impact and likelihood of \
exploitation.\n\
5. If no security risks are found after careful analysis, explicitly state: \"{sentinel}\"\n\n\
Content:\n{excerpt}\n\n\
Output format:\n\
### Risk: [Risk Name]\n\
**Severity**: [Low/Medium/High]\n\
**Reason**: [Specific reason based on the content]\n\
**Suggestion**: [Targeted suggestion]\n\n\
If no risks are found:\n{sentinel}\n"
        )
    }
}

fn answer_prompt(question: &str, context: &[String]) -> String {
    format!(
        "You are a DevSecOps security expert. Answer the question strictly based on the provided \
context. Do not fabricate information if the context is insufficient.\n\n\
User question: {question}\n\n\
Relevant context:\n{}\n\n\
The answer must include:\n\
1. Full file path\n\
2. Specific detected risks (using CICD-SEC numbers)\n\
3. Relevant code snippets\n\
4. Remediation suggestions\n\n\
If the context is empty, insufficient, or does not match the question, you must respond only \
with: No related files found in the scan results",
        context.join("\n---\n")
    )
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
