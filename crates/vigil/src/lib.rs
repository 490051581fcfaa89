//! Iterative tool coordination and risk assessment for smart-contract
//! security analysis.
//!
//! An [`AnalysisController`] drives one session: it asks a guarded
//! [`DecisionPolicy`] for the next tool, runs it under a timeout, appends the
//! result to the [`EvidenceLedger`], re-aggregates findings and re-scores
//! risk, and stops on convergence, the iteration cap, repeated policy
//! failure or cancellation.

pub mod assessment;
pub mod batch;
pub mod builtins;
pub mod chain;
pub mod config;
pub mod contract;
pub mod controller;
pub mod error;
pub mod finding;
pub mod ledger;
pub mod policy;
pub mod session;
pub mod tools;
pub mod utils;

pub use crate::assessment::{
    AssessmentWriter, FinalAssessment, FindingAggregator, RiskAssessment, RiskScorer, RiskTier,
    VulnerabilityRecord,
};
pub use crate::batch::analyze_all;
pub use crate::builtins::BuiltinTool;
pub use crate::chain::{ChainState, StaticChainState};
pub use crate::config::AnalysisConfig;
pub use crate::contract::ContractRef;
pub use crate::controller::{AnalysisController, StepOutcome};
pub use crate::error::{AnalysisError, AnalysisResult};
pub use crate::finding::{Finding, FindingCategory, Severity};
pub use crate::ledger::EvidenceLedger;
pub use crate::policy::{Decision, DecisionOrigin, DecisionPolicy, PolicyError, SelectionGuard};
pub use crate::session::{AnalysisSession, SessionReport, SessionStatus, TerminationReason};
pub use crate::tools::{Tool, ToolCategory, ToolError, ToolOutput, ToolRegistry};
