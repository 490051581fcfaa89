//! Model-written closing assessment of a finished session.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::policy::CompletionClient;
use crate::session::SessionReport;

const DEFAULT_INSTRUCTIONS: &str = "You are a smart contract security analyst. \
Write a concise security assessment of the contract below from the evidence \
gathered: the most serious issues, how they could be combined, and what to \
fix first.";

/// Outcome of asking a model for the closing assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalAssessment {
    Written { model: String, text: String },
    Failed { model: String, error: String },
}

impl FinalAssessment {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Written { text, .. } => Some(text),
            Self::Failed { .. } => None,
        }
    }
}

/// Summarizes a finished report through a [`CompletionClient`].
///
/// Failures never propagate; they come back as [`FinalAssessment::Failed`].
pub struct AssessmentWriter {
    client: Arc<dyn CompletionClient>,
    instructions: String,
}

impl AssessmentWriter {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn build_prompt(&self, report: &SessionReport) -> String {
        let mut prompt = format!("{}\n\n", self.instructions);
        let _ = writeln!(prompt, "CONTRACT: {}", report.contract.address());
        let _ = writeln!(
            prompt,
            "RISK: {} ({:.2}/10) after {} iteration(s)",
            report.risk_tier, report.risk_score, report.iteration_count
        );
        let _ = writeln!(prompt, "ENDED: {}", report.termination_reason);
        let _ = writeln!(prompt, "TOOLS USED: {}", report.tools_used.join(", "));

        prompt.push_str("\nFINDINGS:\n");
        let mut primary = report.primary_findings().peekable();
        if primary.peek().is_none() {
            prompt.push_str("(none)\n");
        }
        for record in primary {
            let finding = &record.finding;
            let _ = writeln!(
                prompt,
                "- [{}] {} ({}): {}",
                finding.severity, finding.category, finding.source_tool, finding.evidence
            );
        }

        let failures: Vec<_> = report
            .invocations
            .iter()
            .filter_map(|record| record.outcome.error().map(|e| (&record.tool_name, e)))
            .collect();
        if !failures.is_empty() {
            prompt.push_str("\nFAILED TOOL CALLS:\n");
            for (tool, error) in failures {
                let _ = writeln!(prompt, "- {tool}: {error}");
            }
        }
        prompt
    }

    pub async fn write(&self, report: &SessionReport) -> FinalAssessment {
        let model = self.client.model().to_string();
        let prompt = self.build_prompt(report);
        match self.client.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => FinalAssessment::Written {
                model,
                text: text.trim().to_string(),
            },
            Ok(_) => FinalAssessment::Failed {
                model,
                error: "empty response".to_string(),
            },
            Err(error) => {
                tracing::warn!(
                    session_id = %report.session_id,
                    %error,
                    "final assessment failed"
                );
                FinalAssessment::Failed {
                    model,
                    error: error.to_string(),
                }
            }
        }
    }
}
