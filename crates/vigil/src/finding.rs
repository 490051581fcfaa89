//! Findings proposed by tools.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Base contribution of one finding to the raw risk sum.
    pub fn base_weight(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
            Self::Critical => 4.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Kind of security-relevant observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    Reentrancy,
    AccessControl,
    ProxyRisk,
    IntegerOverflow,
    FlashLoan,
    InitializationRisk,
    ConcentrationRisk,
    DeploymentRisk,
}

impl FindingCategory {
    pub const ALL: [FindingCategory; 8] = [
        Self::Reentrancy,
        Self::AccessControl,
        Self::ProxyRisk,
        Self::IntegerOverflow,
        Self::FlashLoan,
        Self::InitializationRisk,
        Self::ConcentrationRisk,
        Self::DeploymentRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reentrancy => "reentrancy",
            Self::AccessControl => "access-control",
            Self::ProxyRisk => "proxy-risk",
            Self::IntegerOverflow => "integer-overflow",
            Self::FlashLoan => "flash-loan",
            Self::InitializationRisk => "initialization-risk",
            Self::ConcentrationRisk => "concentration-risk",
            Self::DeploymentRisk => "deployment-risk",
        }
    }
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observation proposed by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub category: FindingCategory,
    pub severity: Severity,
    pub source_tool: String,
    pub evidence: String,
    /// Extra multiplier applied on top of the severity and category weights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Finding {
    pub fn new(
        category: FindingCategory,
        severity: Severity,
        source_tool: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            source_tool: source_tool.into(),
            evidence: evidence.into(),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn digest(&self) -> String {
        evidence_digest(&self.evidence)
    }
}

/// Digest of evidence text, insensitive to case and whitespace layout.
pub fn evidence_digest(evidence: &str) -> String {
    let normalized = evidence
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let hash = Sha256::digest(normalized.as_bytes());
    hex::encode(hash)[..16].to_string()
}
