//! Bounded tool execution.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use crate::contract::ContractRef;
use crate::finding::Finding;
use crate::utils::time::{elapsed_ms, now_utc};

use super::invocation::InvocationOutcome;
use super::tool::{Tool, ToolError};

/// Outcome of one bounded tool call, before it is stamped into a ledger record.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: InvocationOutcome,
    pub findings: Vec<Finding>,
}

/// Run a tool under `timeout`.
///
/// The call is dropped when the timeout elapses and reported as
/// [`ToolError`] of kind `Timeout`. Failures never carry findings. Findings
/// that name a different source tool are re-attributed to the executing tool.
pub async fn execute_tool(
    tool: &dyn Tool,
    contract: &ContractRef,
    evidence_summary: &str,
    timeout: Duration,
) -> ExecutionResult {
    let started_at = now_utc();
    let clock = Instant::now();

    let result = tokio::time::timeout(timeout, tool.execute(contract, evidence_summary)).await;
    let duration_ms = elapsed_ms(clock);

    match result {
        Ok(Ok(output)) => {
            let findings = output
                .findings
                .into_iter()
                .map(|mut finding| {
                    if finding.source_tool != tool.name() {
                        tracing::debug!(
                            tool = tool.name(),
                            claimed = %finding.source_tool,
                            "re-attributing finding to executing tool"
                        );
                        finding.source_tool = tool.name().to_string();
                    }
                    finding
                })
                .collect();
            ExecutionResult {
                started_at,
                duration_ms,
                outcome: InvocationOutcome::Success { raw: output.raw },
                findings,
            }
        }
        Ok(Err(error)) => {
            tracing::warn!(tool = tool.name(), %error, "tool call failed");
            failed(started_at, duration_ms, error)
        }
        Err(_) => {
            let error = ToolError::timeout(format!(
                "'{}' exceeded {}ms",
                tool.name(),
                timeout.as_millis()
            ));
            tracing::warn!(tool = tool.name(), %error, "tool call timed out");
            failed(started_at, duration_ms, error)
        }
    }
}

fn failed(started_at: DateTime<Utc>, duration_ms: u64, error: ToolError) -> ExecutionResult {
    ExecutionResult {
        started_at,
        duration_ms,
        outcome: InvocationOutcome::Failed { error },
        findings: Vec::new(),
    }
}
