//! Constructor parameter analysis.

use serde_json::json;

use crate::chain::{analysis_block, ChainState, DeploymentRecord};
use crate::contract::ContractRef;
use crate::finding::{Finding, FindingCategory, Severity};
use crate::tools::{ToolError, ToolOutput};

pub const NAME: &str = "constructor_params";
pub const DESCRIPTION: &str = "Extracts constructor parameters from the deployment transaction \
and checks privileged and proxy settings";

const PRIVILEGED_KEYS: [&str; 4] = ["admin", "owner", "deployer", "governance"];

/// Digits beyond which an initial numeric value is reported.
const LARGE_VALUE_DIGITS: usize = 15;

pub(super) async fn execute(
    chain: &dyn ChainState,
    contract: &ContractRef,
) -> Result<ToolOutput, ToolError> {
    let block = analysis_block(chain, contract).await?;
    let deployment = chain.deployment(contract.address()).await?;
    if block < deployment.block {
        return Err(ToolError::invalid_input(format!(
            "contract was deployed at block {}, cannot analyse at earlier block {block}",
            deployment.block
        )));
    }
    Ok(analyze(&deployment, block))
}

pub fn analyze(deployment: &DeploymentRecord, block: u64) -> ToolOutput {
    let mut findings = Vec::new();
    let args = &deployment.constructor_args;

    for (key, value) in args {
        let lowered = key.to_lowercase();
        if PRIVILEGED_KEYS.iter().any(|k| lowered.contains(k)) && is_zero_address(value) {
            findings.push(finding(
                FindingCategory::AccessControl,
                Severity::High,
                format!("zero address set for {key}; privileged role is unassigned"),
            ));
        }
        if lowered.contains("implementation") {
            if is_zero_address(value) {
                findings.push(finding(
                    FindingCategory::ProxyRisk,
                    Severity::Critical,
                    "zero implementation address; proxy is broken",
                ));
            } else {
                findings.push(finding(
                    FindingCategory::ProxyRisk,
                    Severity::Medium,
                    format!("upgradeable proxy with implementation {value}"),
                ));
            }
        }
        if value.len() > LARGE_VALUE_DIGITS && value.chars().all(|c| c.is_ascii_digit()) {
            findings.push(finding(
                FindingCategory::InitializationRisk,
                Severity::Low,
                format!("large initial value for {key}: {value}"),
            ));
        }
    }

    ToolOutput::new(
        json!({
            "deployer": deployment.deployer,
            "deployment_block": deployment.block,
            "analysis_block": block,
            "transaction": deployment.transaction,
            "parameters": args,
            "parameter_count": args.len(),
        }),
        findings,
    )
}

fn is_zero_address(value: &str) -> bool {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    trimmed.len() > digits.len() && !digits.is_empty() && digits.chars().all(|c| c == '0')
}

fn finding(category: FindingCategory, severity: Severity, evidence: impl Into<String>) -> Finding {
    Finding::new(category, severity, NAME, evidence)
}
