//! Tool invocation records capturing execution metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::finding::Finding;
use crate::policy::DecisionOrigin;

use super::tool::{ToolCategory, ToolError};

/// Result payload of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Success { raw: serde_json::Value },
    Failed { error: ToolError },
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error(&self) -> Option<&ToolError> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Success { .. } => None,
        }
    }
}

/// Record of a single iteration's tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    /// 1-based iteration index.
    pub ordinal: usize,
    pub tool_name: String,
    pub category: ToolCategory,
    /// Input parameters handed to the tool.
    pub arguments: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: InvocationOutcome,
    /// Findings derived from this call. Always empty for failed calls.
    pub findings: Vec<Finding>,
    /// Why this tool was chosen, including any guard override.
    pub rationale: String,
    pub origin: DecisionOrigin,
}

impl ToolInvocationRecord {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}
