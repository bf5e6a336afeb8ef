use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity levels carried by a risk finding. Serialized with exact-case
/// keywords; parsing rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Severity::Low),
            "Medium" => Ok(Severity::Medium),
            "High" => Ok(Severity::High),
            _ => Err(()),
        }
    }
}

/// One risk detected in a file's analysis. The name is free text; it
/// usually but not necessarily matches a CICD-SEC category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFinding {
    pub risk_name: String,
    pub severity: Severity,
}

/// One scanned file: preprocessed content snapshot, extracted risks, and
/// the raw model output they were derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub file_path: String,
    pub content: String,
    pub risks: Vec<RiskFinding>,
    pub analysis: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTally {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl SeverityTally {
    pub fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
        }
    }
}

/// Aggregate risk_name -> per-severity counts. Always reconstructible by
/// replaying stored findings; no state of its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskCount(pub BTreeMap<String, SeverityTally>);

impl RiskCount {
    pub fn add(&mut self, finding: &RiskFinding) {
        self.0
            .entry(finding.risk_name.clone())
            .or_default()
            .bump(finding.severity);
    }

    pub fn from_findings<'a, I: IntoIterator<Item = &'a RiskFinding>>(findings: I) -> Self {
        let mut count = RiskCount::default();
        for f in findings {
            count.add(f);
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
