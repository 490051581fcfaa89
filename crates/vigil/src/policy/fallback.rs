//! Deterministic coverage fallback.

use async_trait::async_trait;

use crate::tools::ToolSpec;

use super::types::{Decision, DecisionPolicy, PolicyError, PolicyInput};

/// Tool of the lowest-index category that has not been exercised yet.
/// Ties within a category go to the alphabetically first tool.
pub fn first_uncovered(input: &PolicyInput) -> Option<&ToolSpec> {
    input
        .available_tools
        .iter()
        .filter(|tool| input.category_uses(tool.category) == 0)
        .min_by(|a, b| {
            a.category
                .index()
                .cmp(&b.category.index())
                .then_with(|| a.name.cmp(&b.name))
        })
}

/// The decision used when the policy fails or misbehaves: cover the next
/// uncovered category, or stop once every category has been exercised.
pub fn coverage_decision(input: &PolicyInput) -> Decision {
    match first_uncovered(input) {
        Some(tool) => Decision::choose(
            tool.name.clone(),
            format!("coverage fallback: category {} not yet exercised", tool.category),
        ),
        None => Decision::stop(format!(
            "coverage fallback: all {} tool categories exercised",
            input.category_counts.len()
        )),
    }
}

/// Heuristic policy that only ever applies the coverage rule.
pub struct CoveragePolicy;

#[async_trait]
impl DecisionPolicy for CoveragePolicy {
    fn id(&self) -> &str {
        "coverage"
    }

    async fn decide(&self, input: &PolicyInput) -> Result<Decision, PolicyError> {
        Ok(coverage_decision(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractRef;
    use crate::tools::ToolCategory;
    use std::collections::BTreeMap;

    fn spec(name: &str, category: ToolCategory) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            category,
            description: String::new(),
        }
    }

    fn input(counts: &[(ToolCategory, usize)]) -> PolicyInput {
        PolicyInput {
            contract: ContractRef::new("0x1"),
            ledger_summary: String::new(),
            available_tools: vec![
                spec("state_reader", ToolCategory::State),
                spec("source_b", ToolCategory::SourceCode),
                spec("source_a", ToolCategory::SourceCode),
                spec("deployment", ToolCategory::Deployment),
            ],
            tools_used: Vec::new(),
            category_counts: counts.iter().copied().collect::<BTreeMap<_, _>>(),
            finding_count: 0,
            iteration: 1,
            max_iterations: 5,
        }
    }

    #[test]
    fn picks_lowest_category_then_name() {
        let decision = coverage_decision(&input(&[]));
        assert!(matches!(decision, Decision::ChooseTool { ref name, .. } if name == "source_a"));
    }

    #[test]
    fn skips_covered_categories() {
        let decision = coverage_decision(&input(&[(ToolCategory::SourceCode, 1)]));
        assert!(matches!(decision, Decision::ChooseTool { ref name, .. } if name == "deployment"));
    }

    #[test]
    fn stops_when_all_categories_covered() {
        let decision = coverage_decision(&input(&[
            (ToolCategory::SourceCode, 2),
            (ToolCategory::Deployment, 1),
            (ToolCategory::State, 1),
        ]));
        assert!(matches!(decision, Decision::Stop { .. }));
    }

    #[test]
    fn coverage_decision_is_deterministic() {
        let i = input(&[(ToolCategory::SourceCode, 1)]);
        assert_eq!(coverage_decision(&i), coverage_decision(&i));
    }

    #[tokio::test]
    async fn coverage_policy_never_fails() {
        let decision = CoveragePolicy.decide(&input(&[])).await;
        assert!(decision.is_ok());
    }
}
