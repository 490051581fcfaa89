//! Deployment context: value held and deployment age.

use serde_json::json;

use crate::chain::{analysis_block, ChainState, WEI_PER_ETH};
use crate::contract::ContractRef;
use crate::finding::{Finding, FindingCategory, Severity};
use crate::tools::{ToolError, ToolOutput};

pub const NAME: &str = "deployment_context";
pub const DESCRIPTION: &str =
    "Checks how much value the contract holds and how recently it was deployed";

/// Roughly one day of blocks.
pub const DEFAULT_RECENT_WINDOW: u64 = 7_200;

const HIGH_VALUE_WEI: u128 = 100 * WEI_PER_ETH;

pub(super) async fn execute(
    chain: &dyn ChainState,
    contract: &ContractRef,
    recent_window: u64,
) -> Result<ToolOutput, ToolError> {
    let block = analysis_block(chain, contract).await?;
    let balance = chain.native_balance(contract.address(), block).await?;
    let deploy_block = match contract.deploy_block() {
        Some(block) => Some(block),
        None => match chain.deployment(contract.address()).await {
            Ok(record) => Some(record.block),
            Err(error) => {
                tracing::debug!(address = contract.address(), %error, "deployment block unknown");
                None
            }
        },
    };
    Ok(assess(balance, block, deploy_block, recent_window))
}

/// Findings for a contract holding `balance_wei` as of `block`.
pub fn assess(
    balance_wei: u128,
    block: u64,
    deploy_block: Option<u64>,
    recent_window: u64,
) -> ToolOutput {
    let mut findings = Vec::new();
    let balance_eth = balance_wei as f64 / WEI_PER_ETH as f64;

    if balance_wei > HIGH_VALUE_WEI {
        findings.push(finding(
            Severity::High,
            format!("high value target: {balance_eth:.2} ETH held by the contract"),
        ));
    }

    let age = deploy_block.and_then(|deployed| block.checked_sub(deployed));
    if let Some(age) = age {
        if age <= recent_window {
            findings.push(finding(
                Severity::Medium,
                format!("recently deployed: {age} block(s) before block {block}"),
            ));
        }
    }

    ToolOutput::new(
        json!({
            "balance_wei": balance_wei.to_string(),
            "balance_eth": balance_eth,
            "analysis_block": block,
            "deploy_block": deploy_block,
            "age_blocks": age,
        }),
        findings,
    )
}

fn finding(severity: Severity, evidence: String) -> Finding {
    Finding::new(FindingCategory::DeploymentRisk, severity, NAME, evidence)
}
