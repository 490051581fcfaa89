use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::assessment::{
    recommendations, FinalAssessment, RiskAssessment, VulnerabilityRecord,
};
use crate::contract::ContractRef;
use crate::error::{AnalysisError, AnalysisResult};
use crate::ledger::EvidenceLedger;
use crate::tools::ToolInvocationRecord;
use crate::utils::time::now_utc;

use super::report::SessionReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    Initializing,
    Running,
    StoppedConverged,
    StoppedMaxIterations,
    StoppedError,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::StoppedConverged | Self::StoppedMaxIterations | Self::StoppedError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::StoppedConverged => "stopped-converged",
            Self::StoppedMaxIterations => "stopped-max-iterations",
            Self::StoppedError => "stopped-error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    PolicyStopped { rationale: String },
    /// The policy failed and the coverage fallback found nothing left to run.
    FallbackStopped { policy_error: String, rationale: String },
    MaxIterations { limit: usize },
    PolicyFailures { last_error: String },
    Cancelled,
    UnknownTool { name: String },
}

impl TerminationReason {
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::PolicyStopped { .. } | Self::FallbackStopped { .. } => {
                SessionStatus::StoppedConverged
            }
            Self::MaxIterations { .. } => SessionStatus::StoppedMaxIterations,
            Self::PolicyFailures { .. } | Self::Cancelled | Self::UnknownTool { .. } => {
                SessionStatus::StoppedError
            }
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyStopped { rationale } if rationale.is_empty() => {
                write!(f, "policy stopped")
            }
            Self::PolicyStopped { rationale } => write!(f, "policy stopped: {rationale}"),
            Self::FallbackStopped {
                policy_error,
                rationale,
            } => write!(f, "stopped by fallback after {policy_error}: {rationale}"),
            Self::MaxIterations { limit } => write!(f, "max iterations reached ({limit})"),
            Self::PolicyFailures { last_error } => {
                write!(f, "policy failed twice in a row: {last_error}")
            }
            Self::Cancelled => write!(f, "cancelled"),
            Self::UnknownTool { name } => write!(f, "unknown tool '{name}'"),
        }
    }
}

/// State of one contract analysis, owned by its controller.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    id: String,
    contract: ContractRef,
    status: SessionStatus,
    termination: Option<TerminationReason>,
    ledger: EvidenceLedger,
    findings: Vec<VulnerabilityRecord>,
    risk: RiskAssessment,
    final_assessment: Option<FinalAssessment>,
    iteration_count: usize,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl AnalysisSession {
    pub fn new(contract: ContractRef) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            contract,
            status: SessionStatus::Initializing,
            termination: None,
            ledger: EvidenceLedger::new(),
            findings: Vec::new(),
            risk: RiskAssessment::none(),
            final_assessment: None,
            iteration_count: 0,
            started_at: now_utc(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn termination(&self) -> Option<&TerminationReason> {
        self.termination.as_ref()
    }

    pub fn ledger(&self) -> &EvidenceLedger {
        &self.ledger
    }

    pub fn findings(&self) -> &[VulnerabilityRecord] {
        &self.findings
    }

    pub fn risk(&self) -> RiskAssessment {
        self.risk
    }

    pub fn final_assessment(&self) -> Option<&FinalAssessment> {
        self.final_assessment.as_ref()
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn tools_used(&self) -> Vec<String> {
        self.ledger.tools_used()
    }

    pub(crate) fn ensure_open(&self) -> AnalysisResult<()> {
        if self.is_terminal() {
            return Err(AnalysisError::SessionClosed(self.id.clone()));
        }
        Ok(())
    }

    pub(crate) fn begin(&mut self) {
        if self.status == SessionStatus::Initializing {
            self.status = SessionStatus::Running;
        }
    }

    /// Append a completed iteration. The ledger and the iteration count move
    /// together.
    pub(crate) fn append_record(&mut self, record: ToolInvocationRecord) -> &ToolInvocationRecord {
        self.iteration_count += 1;
        self.ledger.append(record)
    }

    pub(crate) fn set_assessment(
        &mut self,
        findings: Vec<VulnerabilityRecord>,
        risk: RiskAssessment,
    ) {
        self.findings = findings;
        self.risk = risk;
    }

    pub(crate) fn set_final_assessment(&mut self, assessment: FinalAssessment) {
        self.final_assessment = Some(assessment);
    }

    /// Move to the terminal state implied by `reason`. A terminal session is
    /// left untouched.
    pub(crate) fn finish(&mut self, reason: TerminationReason) {
        if self.is_terminal() {
            return;
        }
        self.status = reason.status();
        self.termination = Some(reason);
        self.finished_at = Some(now_utc());
    }

    /// Snapshot of a finished session.
    pub fn report(&self) -> AnalysisResult<SessionReport> {
        let (Some(termination), Some(finished_at)) = (&self.termination, self.finished_at)
        else {
            return Err(AnalysisError::ReportUnavailable(self.id.clone()));
        };
        Ok(SessionReport {
            session_id: self.id.clone(),
            contract: self.contract.clone(),
            status: self.status,
            iteration_count: self.iteration_count,
            tools_used: self.tools_used(),
            findings: self.findings.clone(),
            risk_score: self.risk.score,
            risk_tier: self.risk.tier,
            termination_reason: termination.clone(),
            recommendations: recommendations(&self.findings),
            final_assessment: self.final_assessment.clone(),
            invocations: self.ledger.records().to_vec(),
            started_at: self.started_at,
            finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::RiskTier;

    #[test]
    fn new_session_is_initializing() {
        let session = AnalysisSession::new(ContractRef::new("0x1"));
        assert_eq!(session.status(), SessionStatus::Initializing);
        assert_eq!(session.iteration_count(), 0);
        assert!(session.ledger().is_empty());
        assert!(session.ensure_open().is_ok());
    }

    #[test]
    fn report_requires_terminal_state() {
        let mut session = AnalysisSession::new(ContractRef::new("0x1"));
        session.begin();
        assert!(matches!(
            session.report(),
            Err(AnalysisError::ReportUnavailable(_))
        ));

        session.finish(TerminationReason::PolicyStopped {
            rationale: "nothing left".to_string(),
        });
        let report = session.report().unwrap();
        assert_eq!(report.status, SessionStatus::StoppedConverged);
        assert_eq!(report.risk_tier, RiskTier::Low);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn terminal_state_is_final() {
        let mut session = AnalysisSession::new(ContractRef::new("0x1"));
        session.finish(TerminationReason::Cancelled);
        session.finish(TerminationReason::MaxIterations { limit: 5 });
        assert_eq!(session.status(), SessionStatus::StoppedError);
        assert_eq!(session.termination(), Some(&TerminationReason::Cancelled));
        assert!(matches!(
            session.ensure_open(),
            Err(AnalysisError::SessionClosed(_))
        ));
    }

    #[test]
    fn reasons_map_to_statuses() {
        assert_eq!(
            TerminationReason::MaxIterations { limit: 5 }.status(),
            SessionStatus::StoppedMaxIterations
        );
        assert_eq!(
            TerminationReason::PolicyFailures {
                last_error: "x".to_string()
            }
            .status(),
            SessionStatus::StoppedError
        );
        let fallback = TerminationReason::FallbackStopped {
            policy_error: "policy unavailable: 503".to_string(),
            rationale: "coverage fallback: all 1 tool categories exercised".to_string(),
        };
        assert_eq!(fallback.status(), SessionStatus::StoppedConverged);
        assert_eq!(
            serde_json::to_value(&fallback).unwrap()["kind"],
            "fallback_stopped"
        );
        assert_eq!(
            TerminationReason::MaxIterations { limit: 5 }.to_string(),
            "max iterations reached (5)"
        );
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&SessionStatus::StoppedMaxIterations).unwrap();
        assert_eq!(json, "\"stopped-max-iterations\"");
    }
}
