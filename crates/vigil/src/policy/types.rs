use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::contract::ContractRef;
use crate::tools::{ToolCategory, ToolSpec};

/// What a policy wants the controller to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    ChooseTool { name: String, rationale: String },
    Stop { rationale: String },
}

impl Decision {
    pub fn choose(name: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self::ChooseTool {
            name: name.into(),
            rationale: rationale.into(),
        }
    }

    pub fn stop(rationale: impl Into<String>) -> Self {
        Self::Stop {
            rationale: rationale.into(),
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            Self::ChooseTool { rationale, .. } | Self::Stop { rationale } => rationale,
        }
    }
}

/// Who produced the decision that led to a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOrigin {
    /// The decision policy's own choice.
    Policy,
    /// The deterministic coverage fallback, after a policy failure.
    Fallback,
    /// The selection guard replaced the policy's choice.
    GuardOverride,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PolicyError {
    /// Transport, auth or availability failure of the underlying oracle.
    #[error("policy unavailable: {0}")]
    Unavailable(String),
    /// The oracle answered, but not with a usable decision.
    #[error("malformed policy response: {0}")]
    MalformedResponse(String),
}

/// Everything a policy may look at when choosing the next action.
#[derive(Debug, Clone)]
pub struct PolicyInput {
    pub contract: ContractRef,
    pub ledger_summary: String,
    pub available_tools: Vec<ToolSpec>,
    /// Distinct tools already called, in order of first use.
    pub tools_used: Vec<String>,
    pub category_counts: BTreeMap<ToolCategory, usize>,
    pub finding_count: usize,
    /// 1-based index of the iteration being decided.
    pub iteration: usize,
    pub max_iterations: usize,
}

impl PolicyInput {
    pub fn available_tool_names(&self) -> Vec<&str> {
        self.available_tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.available_tools.iter().find(|t| t.name == name)
    }

    pub fn category_uses(&self, category: ToolCategory) -> usize {
        self.category_counts.get(&category).copied().unwrap_or(0)
    }
}

/// Strategy selecting the next tool, or deciding to stop.
///
/// Implementations may be non-deterministic; the controller validates every
/// answer and never trusts a tool name without checking it.
#[async_trait]
pub trait DecisionPolicy: Send + Sync {
    fn id(&self) -> &str;

    async fn decide(&self, input: &PolicyInput) -> Result<Decision, PolicyError>;

    /// Tool names this policy is built to propose. The controller refuses to
    /// start when any of them is missing from the registry.
    fn expected_tools(&self) -> Vec<String> {
        Vec::new()
    }
}
