use std::collections::BTreeSet;

use crate::finding::FindingCategory;

use super::aggregator::VulnerabilityRecord;

const GENERAL: [&str; 4] = [
    "Conduct regular security audits",
    "Implement comprehensive testing including edge cases",
    "Monitor contract interactions for suspicious patterns",
    "Maintain emergency pause mechanisms where appropriate",
];

fn for_category(category: FindingCategory) -> &'static [&'static str] {
    match category {
        FindingCategory::Reentrancy => &[
            "Implement checks-effects-interactions pattern",
            "Consider using ReentrancyGuard modifier",
        ],
        FindingCategory::AccessControl => &[
            "Audit all access control mechanisms",
            "Consider multi-signature requirements for critical functions",
        ],
        FindingCategory::ProxyRisk => &[
            "Implement upgrade timelock mechanisms",
            "Use transparent proxy patterns with proper governance",
        ],
        FindingCategory::IntegerOverflow => &["Review unchecked arithmetic blocks for overflow"],
        FindingCategory::FlashLoan => &[
            "Use time-weighted or multi-source price oracles",
        ],
        FindingCategory::InitializationRisk => &[
            "Verify all privileged addresses are correct",
        ],
        FindingCategory::ConcentrationRisk => &[
            "Monitor token distribution for manipulation risks",
            "Implement governance safeguards against whale attacks",
            "Consider voting power caps or delegation mechanisms",
        ],
        FindingCategory::DeploymentRisk => &[
            "Verify deployment parameters and initial state",
            "Monitor for unusual post-deployment activity",
        ],
    }
}

/// Defensive recommendations for the categories present, deduplicated and
/// sorted. Empty when there are no findings.
pub fn recommendations(records: &[VulnerabilityRecord]) -> Vec<String> {
    if records.is_empty() {
        return Vec::new();
    }
    let mut set: BTreeSet<&'static str> = GENERAL.into_iter().collect();
    for record in records {
        set.extend(for_category(record.finding.category).iter().copied());
    }
    set.into_iter().map(str::to_string).collect()
}
