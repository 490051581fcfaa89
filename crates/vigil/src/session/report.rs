use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::assessment::{FinalAssessment, RiskTier, VulnerabilityRecord};
use crate::contract::ContractRef;
use crate::error::AnalysisResult;
use crate::tools::ToolInvocationRecord;

use super::session::{SessionStatus, TerminationReason};

/// Recommendations printed by the `Display` summary.
const SHOWN_RECOMMENDATIONS: usize = 3;

/// Immutable snapshot of a finished analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub contract: ContractRef,
    pub status: SessionStatus,
    pub iteration_count: usize,
    pub tools_used: Vec<String>,
    /// Ranked by descending severity, then first appearance.
    pub findings: Vec<VulnerabilityRecord>,
    pub risk_score: f64,
    pub risk_tier: RiskTier,
    pub termination_reason: TerminationReason,
    pub recommendations: Vec<String>,
    /// Closing assessment, when a writer was configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_assessment: Option<FinalAssessment>,
    pub invocations: Vec<ToolInvocationRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn to_json(&self) -> AnalysisResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> AnalysisResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Findings that count toward the score.
    pub fn primary_findings(&self) -> impl Iterator<Item = &VulnerabilityRecord> {
        self.findings.iter().filter(|r| r.is_primary())
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Contract {}", self.contract.address())?;
        writeln!(
            f,
            "Risk: {} ({:.2}/10) after {} iteration(s), {}",
            self.risk_tier, self.risk_score, self.iteration_count, self.status
        )?;
        writeln!(f, "Ended: {}", self.termination_reason)?;
        if !self.tools_used.is_empty() {
            writeln!(f, "Tools: {}", self.tools_used.join(", "))?;
        }
        if self.findings.is_empty() {
            writeln!(f, "No findings")?;
        }
        for record in &self.findings {
            let finding = &record.finding;
            write!(
                f,
                "  [{}] {} ({}): {}",
                finding.severity, finding.category, finding.source_tool, finding.evidence
            )?;
            if let Some(primary) = &record.corroborates {
                write!(f, " (corroborates {primary})")?;
            }
            writeln!(f)?;
        }
        for recommendation in self.recommendations.iter().take(SHOWN_RECOMMENDATIONS) {
            writeln!(f, "  - {recommendation}")?;
        }
        let hidden = self
            .recommendations
            .len()
            .saturating_sub(SHOWN_RECOMMENDATIONS);
        if hidden > 0 {
            writeln!(f, "  ... {hidden} more recommendation(s)")?;
        }
        match &self.final_assessment {
            Some(FinalAssessment::Written { text, .. }) => writeln!(f, "Assessment: {text}")?,
            Some(FinalAssessment::Failed { error, .. }) => {
                writeln!(f, "Assessment unavailable: {error}")?
            }
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::assessment::FinalAssessment;
    use crate::contract::ContractRef;
    use crate::session::{AnalysisSession, TerminationReason};

    #[test]
    fn json_round_trip_preserves_report() {
        let mut session = AnalysisSession::new(ContractRef::new("0xfeed").with_deploy_block(10));
        session.finish(TerminationReason::MaxIterations { limit: 5 });
        let report = session.report().unwrap();

        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"stopped-max-iterations\""));
        assert!(json.contains("\"kind\": \"max_iterations\""));
        assert_eq!(super::SessionReport::from_json(&json).unwrap(), report);
    }

    #[test]
    fn display_summarizes_outcome() {
        let mut session = AnalysisSession::new(ContractRef::new("0xfeed"));
        session.finish(TerminationReason::Cancelled);
        let text = session.report().unwrap().to_string();
        assert!(text.contains("Contract 0xfeed"));
        assert!(text.contains("Risk: LOW (0.00/10)"));
        assert!(text.contains("Ended: cancelled"));
        assert!(text.contains("No findings"));
    }

    #[test]
    fn display_counts_hidden_recommendations_and_shows_assessment() {
        let mut session = AnalysisSession::new(ContractRef::new("0xfeed"));
        session.finish(TerminationReason::Cancelled);
        let mut report = session.report().unwrap();
        report.recommendations = (1..=5).map(|i| format!("step {i}")).collect();
        report.final_assessment = Some(FinalAssessment::Written {
            model: "scripted".to_string(),
            text: "Owner keys are the main risk.".to_string(),
        });

        let text = report.to_string();
        assert!(text.contains("  - step 3"));
        assert!(!text.contains("  - step 4"));
        assert!(text.contains("  ... 2 more recommendation(s)"));
        assert!(text.contains("Assessment: Owner keys are the main risk."));

        report.recommendations.truncate(3);
        report.final_assessment = Some(FinalAssessment::Failed {
            model: "scripted".to_string(),
            error: "empty response".to_string(),
        });
        let text = report.to_string();
        assert!(!text.contains("more recommendation"));
        assert!(text.contains("Assessment unavailable: empty response"));
    }

    #[test]
    fn report_without_assessment_omits_the_field() {
        let mut session = AnalysisSession::new(ContractRef::new("0xfeed"));
        session.finish(TerminationReason::Cancelled);
        let json = session.report().unwrap().to_json().unwrap();
        assert!(!json.contains("final_assessment"));
    }
}
