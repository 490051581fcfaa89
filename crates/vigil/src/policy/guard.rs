//! Selection guard enforcing category diversity over raw policy choices.

use std::sync::Arc;

use super::fallback::first_uncovered;
use super::types::{Decision, DecisionOrigin, DecisionPolicy, PolicyError, PolicyInput};

/// A validated decision and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedDecision {
    pub decision: Decision,
    pub origin: DecisionOrigin,
}

/// Wraps a [`DecisionPolicy`], rejecting unknown tool names and redirecting
/// proposals for over-used categories to an uncovered one.
pub struct SelectionGuard {
    policy: Arc<dyn DecisionPolicy>,
    repeat_threshold: usize,
}

impl SelectionGuard {
    pub fn new(policy: Arc<dyn DecisionPolicy>, repeat_threshold: usize) -> Self {
        Self {
            policy,
            repeat_threshold,
        }
    }

    pub fn policy(&self) -> &Arc<dyn DecisionPolicy> {
        &self.policy
    }

    /// Ask the wrapped policy and validate its answer.
    ///
    /// A tool name outside `input.available_tools` is reported as
    /// [`PolicyError::MalformedResponse`].
    pub async fn propose(&self, input: &PolicyInput) -> Result<GuardedDecision, PolicyError> {
        let decision = self.policy.decide(input).await?;
        match decision {
            Decision::Stop { .. } => Ok(GuardedDecision {
                decision,
                origin: DecisionOrigin::Policy,
            }),
            Decision::ChooseTool { name, rationale } => {
                if input.tool(&name).is_none() {
                    return Err(PolicyError::MalformedResponse(format!(
                        "unknown tool '{name}'; available: {}",
                        input.available_tool_names().join(", ")
                    )));
                }
                Ok(self.enforce_coverage(input, name, rationale))
            }
        }
    }

    /// Apply the repeat rule to an already validated tool choice.
    ///
    /// Once a category has been exercised `repeat_threshold` times, a further
    /// proposal in it is replaced by a tool of an uncovered category, if any.
    pub fn enforce_coverage(
        &self,
        input: &PolicyInput,
        name: String,
        rationale: String,
    ) -> GuardedDecision {
        let Some(category) = input.tool(&name).map(|tool| tool.category) else {
            return GuardedDecision {
                decision: Decision::ChooseTool { name, rationale },
                origin: DecisionOrigin::Policy,
            };
        };

        let uses = input.category_uses(category);
        if uses < self.repeat_threshold {
            return GuardedDecision {
                decision: Decision::ChooseTool { name, rationale },
                origin: DecisionOrigin::Policy,
            };
        }

        match first_uncovered(input) {
            Some(alternative) => {
                tracing::info!(
                    proposed = %name,
                    replacement = %alternative.name,
                    %category,
                    uses,
                    "selection guard override"
                );
                let rationale = format!(
                    "guard override: '{name}' rejected, category {category} already used \
                     {uses} time(s); switched to '{}' to cover category {} \
                     (policy rationale: {rationale})",
                    alternative.name, alternative.category
                );
                GuardedDecision {
                    decision: Decision::ChooseTool {
                        name: alternative.name.clone(),
                        rationale,
                    },
                    origin: DecisionOrigin::GuardOverride,
                }
            }
            None => GuardedDecision {
                decision: Decision::ChooseTool { name, rationale },
                origin: DecisionOrigin::Policy,
            },
        }
    }
}
