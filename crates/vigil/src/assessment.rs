//! Finding aggregation, risk scoring and the closing assessment.

pub mod aggregator;
pub mod narrative;
pub mod recommendations;
pub mod scorer;

pub use aggregator::{FindingAggregator, VulnerabilityRecord};
pub use narrative::{AssessmentWriter, FinalAssessment};
pub use recommendations::recommendations;
pub use scorer::{RiskAssessment, RiskScorer, RiskTier, MAX_SCORE};
