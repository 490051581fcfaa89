//! Token holder concentration.

use serde_json::json;

use crate::chain::{analysis_block, ChainState, HolderSnapshot, WEI_PER_ETH};
use crate::contract::ContractRef;
use crate::finding::{Finding, FindingCategory, Severity};
use crate::tools::{ToolError, ToolOutput};

pub const NAME: &str = "holder_concentration";
pub const DESCRIPTION: &str =
    "Reads token balances and allowances to measure holder concentration";

const HIGH_SHARE_PCT: f64 = 50.0;
const MEDIUM_SHARE_PCT: f64 = 20.0;
const HIGH_GINI: f64 = 0.8;
const LARGE_ALLOWANCE: u128 = 1_000_000 * WEI_PER_ETH;

pub(super) async fn execute(
    chain: &dyn ChainState,
    contract: &ContractRef,
) -> Result<ToolOutput, ToolError> {
    let block = analysis_block(chain, contract).await?;
    let snapshot = chain.holders(contract.address(), block).await?;
    Ok(analyze(&snapshot))
}

pub fn analyze(snapshot: &HolderSnapshot) -> ToolOutput {
    let mut findings = Vec::new();

    let mut holders: Vec<(&str, f64)> = snapshot
        .balances
        .iter()
        .map(|(holder, amount)| (holder.as_str(), *amount as f64))
        .collect();
    holders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
    let total: f64 = holders.iter().map(|(_, amount)| amount).sum();

    let distribution = if holders.is_empty() {
        json!({ "distribution": "no_balances" })
    } else if total == 0.0 {
        json!({ "distribution": "zero_supply" })
    } else {
        let (top_holder, top_amount) = holders[0];
        let top_pct = top_amount / total * 100.0;
        let top3_pct = if holders.len() >= 3 {
            holders.iter().take(3).map(|(_, a)| a).sum::<f64>() / total * 100.0
        } else {
            100.0
        };
        let amounts: Vec<f64> = holders.iter().map(|(_, a)| *a).collect();
        let gini = gini_coefficient(&amounts);

        if top_pct > HIGH_SHARE_PCT {
            findings.push(finding(
                Severity::High,
                format!("high concentration: {top_pct:.1}% held by {top_holder}"),
            ));
        } else if top_pct > MEDIUM_SHARE_PCT {
            findings.push(finding(
                Severity::Medium,
                format!("medium concentration: {top_pct:.1}% held by {top_holder}"),
            ));
        }
        if gini > HIGH_GINI {
            findings.push(finding(
                Severity::High,
                format!("wealth highly concentrated: gini coefficient {gini:.2}"),
            ));
        }

        json!({
            "distribution": "analyzed",
            "total_holders": holders.len(),
            "top_holder": top_holder,
            "top_holder_percentage": top_pct,
            "top_3_percentage": top3_pct,
            "gini_coefficient": gini,
        })
    };

    for allowance in &snapshot.allowances {
        if allowance.amount > LARGE_ALLOWANCE {
            findings.push(finding(
                Severity::Low,
                format!(
                    "large token allowance: {:.0} tokens from {} to {}",
                    allowance.amount as f64 / WEI_PER_ETH as f64,
                    allowance.owner,
                    allowance.spender
                ),
            ));
        }
    }

    ToolOutput::new(distribution, findings)
}

/// Gini coefficient of non-negative amounts; 0 for fewer than two holders.
pub fn gini_coefficient(amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return 0.0;
    }
    let mut sorted = amounts.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let sum: f64 = sorted.iter().sum();
    if sum == 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, amount)| (2.0 * (i as f64 + 1.0) - n - 1.0) * amount)
        .sum();
    weighted / (n * sum)
}

fn finding(severity: Severity, evidence: String) -> Finding {
    Finding::new(FindingCategory::ConcentrationRisk, severity, NAME, evidence)
}
