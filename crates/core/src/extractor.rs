//! Parses structured risk blocks out of free-text LLM analysis output.

use crate::models::{RiskFinding, Severity};
use regex::Regex;
use std::sync::OnceLock;

/// Advisory OWASP CI/CD risk taxonomy. Labels only; extraction never
/// constrains a risk name to this table.
pub const CICD_SEC_RISKS: [(&str, &str); 10] = [
    ("CICD-SEC-1", "Insufficient traffic control mechanisms"),
    ("CICD-SEC-2", "Insufficient identity and access management"),
    ("CICD-SEC-3", "Dependency chain abuse"),
    ("CICD-SEC-4", "Pipeline poisoning execution (PPE)"),
    ("CICD-SEC-5", "Insufficient PBAC (Pipeline-Based Access Controls)"),
    ("CICD-SEC-6", "Poor credential hygiene"),
    ("CICD-SEC-7", "Insecure system configuration"),
    ("CICD-SEC-8", "Uncontrolled use of third-party services"),
    ("CICD-SEC-9", "Improper artifact integrity verification"),
    ("CICD-SEC-10", "Insufficient logging and visibility"),
];

const RISK_DELIMITER: &str = "### Risk:";

fn severity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*Severity\*\*: (Low|Medium|High)").unwrap())
}

fn reason_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\*\*Reason\*\*: (.+?)(?:\n\*\*Suggestion\*\*:|\z)").unwrap())
}

/// Keyword corroboration: a risk category named in the analysis is only
/// trusted when the scanned content carries matching vocabulary. This is a
/// deliberate precision/recall tradeoff: it suppresses hallucinated
/// categories, and may also drop a true positive whose wording avoids the
/// hard-coded vocabulary (e.g. a registry risk described without the word
/// "registry").
fn corroboration_filters() -> &'static [(&'static str, Regex)] {
    static FILTERS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    FILTERS.get_or_init(|| {
        vec![
            ("registry", Regex::new(r"(?i)registry|image").unwrap()),
            ("shell", Regex::new(r"(?i)script|sh\b|bash|command").unwrap()),
            ("network", Regex::new(r"(?i)network|host|bridge|overlay").unwrap()),
            ("gitlab", Regex::new(r"(?i)gitlab|runner|token").unwrap()),
        ]
    })
}

/// Extracts risk findings from an analysis text, corroborated against the
/// original file content. Blocks missing a name, an exact-case severity, or
/// a reason are dropped; surviving findings keep block order and duplicates.
pub fn extract_risks(analysis: &str, content: &str) -> Vec<RiskFinding> {
    let mut detected = Vec::new();
    for block in analysis.split(RISK_DELIMITER).skip(1) {
        let Some(risk_name) = block.lines().next().map(str::trim).filter(|n| !n.is_empty())
        else {
            continue;
        };
        let Some(severity) = severity_re()
            .captures(block)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<Severity>().ok())
        else {
            continue;
        };
        if reason_re()
            .captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|r| !r.is_empty())
            .is_none()
        {
            continue;
        }

        let name_lower = risk_name.to_lowercase();
        let corroborated = corroboration_filters()
            .iter()
            .all(|(keyword, vocab)| !name_lower.contains(keyword) || vocab.is_match(content));
        if !corroborated {
            continue;
        }

        detected.push(RiskFinding {
            risk_name: risk_name.to_string(),
            severity,
        });
    }
    detected
}
