use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::AnalysisConfig;
use crate::finding::FindingCategory;

use super::aggregator::VulnerabilityRecord;

pub const MAX_SCORE: f64 = 10.0;

/// Raw sum at which the score reaches ~63% of the maximum.
const SATURATION_SCALE: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Self::Critical
        } else if score >= 5.0 {
            Self::High
        } else if score >= 2.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Saturated score in `[0, 10]`, rounded to two decimals.
    pub score: f64,
    pub tier: RiskTier,
    /// Unsaturated weighted sum.
    pub raw: f64,
}

impl RiskAssessment {
    pub fn none() -> Self {
        Self {
            score: 0.0,
            tier: RiskTier::Low,
            raw: 0.0,
        }
    }
}

/// Pure function from a deduplicated finding set to a score and tier.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    category_weights: BTreeMap<FindingCategory, f64>,
}

impl RiskScorer {
    pub fn new(category_weights: BTreeMap<FindingCategory, f64>) -> Self {
        Self { category_weights }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.category_weights.clone())
    }

    pub fn category_weight(&self, category: FindingCategory) -> f64 {
        self.category_weights.get(&category).copied().unwrap_or(1.0)
    }

    /// Contribution of one record; corroborating records contribute nothing.
    pub fn contribution(&self, record: &VulnerabilityRecord) -> f64 {
        if !record.is_primary() {
            return 0.0;
        }
        let finding = &record.finding;
        let value = finding.severity.base_weight()
            * self.category_weight(finding.category)
            * finding.weight.unwrap_or(1.0);
        if value.is_finite() {
            value.max(0.0)
        } else {
            0.0
        }
    }

    pub fn score(&self, records: &[VulnerabilityRecord]) -> RiskAssessment {
        let mut contributions: Vec<f64> = records.iter().map(|r| self.contribution(r)).collect();
        // Summation order must not depend on record order.
        contributions.sort_by(|a, b| a.total_cmp(b));
        let raw: f64 = contributions.iter().sum();

        let saturated = MAX_SCORE * (1.0 - (-raw / SATURATION_SCALE).exp());
        let score = ((saturated * 100.0).round() / 100.0).clamp(0.0, MAX_SCORE);
        RiskAssessment {
            score,
            tier: RiskTier::from_score(score),
            raw,
        }
    }
}
