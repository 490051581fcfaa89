//! The contract every analysis tool satisfies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::contract::ContractRef;
use crate::finding::Finding;

/// Investigative category a tool belongs to.
///
/// Declaration order is the category index used by the coverage fallback:
/// lower categories are investigated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    SourceCode,
    Initialization,
    Deployment,
    State,
}

impl ToolCategory {
    pub fn index(&self) -> usize {
        match self {
            Self::SourceCode => 0,
            Self::Initialization => 1,
            Self::Deployment => 2,
            Self::State => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceCode => "source-code",
            Self::Initialization => "initialization",
            Self::Deployment => "deployment",
            Self::State => "state",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Timeout,
    InvalidInput,
    Unavailable,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidInput => write!(f, "invalid input"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Failure of a single tool call. Recorded in the ledger, never fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidInput, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Unavailable, message)
    }
}

/// Successful tool result: structured data plus proposed findings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    pub raw: serde_json::Value,
    pub findings: Vec<Finding>,
}

impl ToolOutput {
    pub fn new(raw: serde_json::Value, findings: Vec<Finding>) -> Self {
        Self { raw, findings }
    }
}

/// Tool metadata exposed to decision policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub category: ToolCategory,
    pub description: String,
}

/// An analysis tool.
///
/// Implementations must not keep mutable state across calls: invoking
/// `execute` twice with the same arguments has to be safe.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn category(&self) -> ToolCategory;

    fn description(&self) -> &str {
        ""
    }

    async fn execute(
        &self,
        contract: &ContractRef,
        evidence_summary: &str,
    ) -> Result<ToolOutput, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            category: self.category(),
            description: self.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_index_follows_declaration_order() {
        let mut categories = vec![
            ToolCategory::State,
            ToolCategory::SourceCode,
            ToolCategory::Deployment,
            ToolCategory::Initialization,
        ];
        categories.sort();
        let indices: Vec<usize> = categories.iter().map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn tool_error_display_includes_kind() {
        let error = ToolError::timeout("exceeded 10000ms");
        assert_eq!(error.to_string(), "timeout: exceeded 10000ms");
    }

    #[test]
    fn tool_error_serializes_kind_snake_case() {
        let value = serde_json::to_value(ToolError::invalid_input("no source")).unwrap();
        assert_eq!(value["kind"], "invalid_input");
    }
}
