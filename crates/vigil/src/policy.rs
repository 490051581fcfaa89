//! Decision policies, the coverage fallback and the selection guard.

pub mod fallback;
pub mod guard;
pub mod prompted;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use fallback::{coverage_decision, CoveragePolicy};
pub use guard::{GuardedDecision, SelectionGuard};
pub use prompted::{parse_decision, CompletionClient, PromptedPolicy};
pub use types::{Decision, DecisionOrigin, DecisionPolicy, PolicyError, PolicyInput};
