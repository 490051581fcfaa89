//! Static pattern scan over contract source.

use serde_json::json;

use crate::contract::ContractRef;
use crate::finding::{Finding, FindingCategory, Severity};
use crate::tools::{ToolError, ToolOutput};

pub const NAME: &str = "source_patterns";
pub const DESCRIPTION: &str = "Scans contract source for reentrancy, access-control, proxy, \
unchecked arithmetic and flash-loan patterns";

/// Lines after an external call searched for a balance write.
const STATE_WRITE_WINDOW: usize = 10;

const EXTERNAL_CALLS: [&str; 4] = ["call{value:", ".call(", ".send(", ".transfer("];
const STATE_WRITES: [&str; 4] = ["balances[", "balance =", "amount -=", "balance -="];
const ACCESS_CONTROL: [&str; 3] = ["onlyOwner", "msg.sender ==", "require(msg.sender"];
const UPGRADE_MARKERS: [&str; 4] = [
    "_IMPLEMENTATION_SLOT",
    "_setImplementation",
    "upgradeTo",
    "TransparentUpgradeableProxy",
];
const PRICE_MARKERS: [&str; 3] = ["flashloan", "getprice", "getreserves"];

pub(super) fn execute(contract: &ContractRef) -> Result<ToolOutput, ToolError> {
    let source = contract.source_code().ok_or_else(|| {
        ToolError::invalid_input(format!("no source code cached for {}", contract.address()))
    })?;
    Ok(scan(source))
}

/// Scan source text. Pure; the same text always yields the same output.
pub fn scan(source: &str) -> ToolOutput {
    let lines: Vec<&str> = source.lines().collect();
    let mut findings = reentrancy(source, &lines);

    if ACCESS_CONTROL.iter().any(|p| source.contains(p)) {
        findings.push(finding(
            FindingCategory::AccessControl,
            Severity::High,
            "access control checks (onlyOwner / msg.sender) gate privileged functions; \
             verify every privileged path",
        ));
    }
    if source.contains("delegatecall") {
        findings.push(finding(
            FindingCategory::ProxyRisk,
            Severity::High,
            "delegatecall executes foreign code in this contract's storage context",
        ));
    }
    if UPGRADE_MARKERS.iter().any(|p| source.contains(p)) {
        findings.push(finding(
            FindingCategory::ProxyRisk,
            Severity::High,
            "upgradeable implementation slot; logic can be replaced by the admin",
        ));
    }
    if source.contains("unchecked {") || source.contains("unchecked{") {
        findings.push(finding(
            FindingCategory::IntegerOverflow,
            Severity::Medium,
            "unchecked arithmetic block disables overflow checks",
        ));
    }
    let lowered = source.to_lowercase();
    if PRICE_MARKERS.iter().any(|p| lowered.contains(p)) {
        findings.push(finding(
            FindingCategory::FlashLoan,
            Severity::Medium,
            "spot price or flash-loan entry point may be manipulable within one transaction",
        ));
    }

    let complexity = (findings.len() as f64 * 2.5).min(10.0);
    ToolOutput::new(
        json!({
            "lines": lines.len(),
            "findings": findings.len(),
            "complexity_score": complexity,
        }),
        findings,
    )
}

/// External call followed closely by a balance write. At most one finding per
/// call site.
fn reentrancy(source: &str, lines: &[&str]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (call_idx, line) in lines.iter().enumerate() {
        if !EXTERNAL_CALLS.iter().any(|p| line.contains(p)) {
            continue;
        }
        let end = (call_idx + STATE_WRITE_WINDOW).min(lines.len());
        let write = (call_idx + 1..end)
            .find(|&idx| STATE_WRITES.iter().any(|p| lines[idx].trim().contains(p)));
        if let Some(write_idx) = write {
            findings.push(finding(
                FindingCategory::Reentrancy,
                Severity::Critical,
                format!(
                    "state change on line {} after external call on line {}",
                    write_idx + 1,
                    call_idx + 1
                ),
            ));
        }
    }

    if findings.is_empty() {
        if let (Some(call), Some(write)) = (source.find("call{value:"), source.rfind("balances[")) {
            if write > call {
                findings.push(finding(
                    FindingCategory::Reentrancy,
                    Severity::Critical,
                    "state change after external call",
                ));
            }
        }
    }
    findings
}

fn finding(category: FindingCategory, severity: Severity, evidence: impl Into<String>) -> Finding {
    Finding::new(category, severity, NAME, evidence)
}
