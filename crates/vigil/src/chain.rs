//! Read-only chain data consumed by the built-in tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::contract::ContractRef;
use crate::error::AnalysisResult;
use crate::tools::ToolError;

pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Deployment transaction of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub block: u64,
    pub deployer: String,
    #[serde(default)]
    pub transaction: Option<String>,
    /// Decoded constructor arguments, by parameter name.
    #[serde(default)]
    pub constructor_args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub owner: String,
    pub spender: String,
    pub amount: u128,
}

/// Token balances and allowances of a contract at one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderSnapshot {
    #[serde(default)]
    pub balances: BTreeMap<String, u128>,
    #[serde(default)]
    pub allowances: Vec<Allowance>,
}

/// Read access to chain state. Implementations must be safe to share between
/// concurrent sessions.
#[async_trait]
pub trait ChainState: Send + Sync {
    /// Network this state is read from, when known.
    fn network(&self) -> Option<&str> {
        None
    }

    async fn head_block(&self) -> Result<u64, ToolError>;

    /// Deployment transaction. Independent of the block being analysed.
    async fn deployment(&self, address: &str) -> Result<DeploymentRecord, ToolError>;

    /// Native balance in wei as of `block`.
    async fn native_balance(&self, address: &str, block: u64) -> Result<u128, ToolError>;

    async fn holders(&self, address: &str, block: u64) -> Result<HolderSnapshot, ToolError>;
}

/// Block the built-in tools read `contract` at.
///
/// The requested block when the reference pins one, the chain head
/// otherwise. A block past the head is invalid input; a reference naming a
/// different network than `chain` is unavailable.
pub async fn analysis_block(
    chain: &dyn ChainState,
    contract: &ContractRef,
) -> Result<u64, ToolError> {
    if let (Some(wanted), Some(network)) = (contract.network(), chain.network()) {
        if !wanted.eq_ignore_ascii_case(network) {
            return Err(ToolError::unavailable(format!(
                "no chain data for network '{wanted}', connected to '{network}'"
            )));
        }
    }
    let head = chain.head_block().await?;
    match contract.block() {
        None => Ok(head),
        Some(block) if block > head => Err(ToolError::invalid_input(format!(
            "block {block} is beyond chain head {head}"
        ))),
        Some(block) => Ok(block),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    #[serde(default)]
    pub deployment: Option<DeploymentRecord>,
    #[serde(default)]
    pub native_balance: u128,
    #[serde(default)]
    pub holders: Option<HolderSnapshot>,
    /// Earlier native balances, keyed by the block they took effect.
    #[serde(default)]
    pub balance_history: BTreeMap<u64, u128>,
    /// Earlier holder snapshots, keyed by the block they took effect.
    #[serde(default)]
    pub holder_history: BTreeMap<u64, HolderSnapshot>,
}

impl ContractState {
    fn ensure_deployed(&self, address: &str, block: u64) -> Result<(), ToolError> {
        match &self.deployment {
            Some(deployment) if block < deployment.block => Err(ToolError::unavailable(format!(
                "no state for {address} at block {block}; deployed at block {}",
                deployment.block
            ))),
            _ => Ok(()),
        }
    }
}

/// In-memory chain snapshot, loadable from JSON.
///
/// `native_balance` and `holders` describe the head. Reads at an earlier
/// block use the latest history entry at or before it and fall back to the
/// head values. Addresses are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticChainState {
    #[serde(default)]
    pub network: Option<String>,
    pub head_block: u64,
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractState>,
}

impl StaticChainState {
    pub fn new(head_block: u64) -> Self {
        Self {
            network: None,
            head_block,
            contracts: BTreeMap::new(),
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_contract(mut self, address: &str, state: ContractState) -> Self {
        self.contracts.insert(address.to_ascii_lowercase(), state);
        self
    }

    pub fn from_json(json: &str) -> AnalysisResult<Self> {
        let parsed: Self = serde_json::from_str(json)?;
        Ok(parsed.normalized())
    }

    pub fn load(path: &Path) -> AnalysisResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    fn normalized(mut self) -> Self {
        self.contracts = std::mem::take(&mut self.contracts)
            .into_iter()
            .map(|(address, state)| (address.to_ascii_lowercase(), state))
            .collect();
        self
    }

    fn contract(&self, address: &str) -> Result<&ContractState, ToolError> {
        self.contracts
            .get(&address.to_ascii_lowercase())
            .ok_or_else(|| ToolError::unavailable(format!("no chain data for {address}")))
    }
}

fn latest_at<T>(history: &BTreeMap<u64, T>, block: u64) -> Option<&T> {
    history.range(..=block).next_back().map(|(_, value)| value)
}

#[async_trait]
impl ChainState for StaticChainState {
    fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    async fn head_block(&self) -> Result<u64, ToolError> {
        Ok(self.head_block)
    }

    async fn deployment(&self, address: &str) -> Result<DeploymentRecord, ToolError> {
        self.contract(address)?.deployment.clone().ok_or_else(|| {
            ToolError::unavailable(format!("deployment transaction not found for {address}"))
        })
    }

    async fn native_balance(&self, address: &str, block: u64) -> Result<u128, ToolError> {
        let state = self.contract(address)?;
        state.ensure_deployed(address, block)?;
        if block >= self.head_block {
            return Ok(state.native_balance);
        }
        Ok(latest_at(&state.balance_history, block)
            .copied()
            .unwrap_or(state.native_balance))
    }

    async fn holders(&self, address: &str, block: u64) -> Result<HolderSnapshot, ToolError> {
        let state = self.contract(address)?;
        state.ensure_deployed(address, block)?;
        let historical = if block < self.head_block {
            latest_at(&state.holder_history, block)
        } else {
            None
        };
        historical
            .or(state.holders.as_ref())
            .cloned()
            .ok_or_else(|| ToolError::unavailable(format!("no holder data for {address}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolErrorKind;
    use std::io::Write;

    #[tokio::test]
    async fn lookups_ignore_address_case() {
        let chain = StaticChainState::new(100).with_contract(
            "0xABC",
            ContractState {
                native_balance: 7,
                ..ContractState::default()
            },
        );
        assert_eq!(chain.native_balance("0xabc", 100).await.expect("balance"), 7);
        assert_eq!(chain.head_block().await.expect("head"), 100);
    }

    #[tokio::test]
    async fn unknown_contract_is_unavailable() {
        let chain = StaticChainState::new(1);
        let err = chain.deployment("0x1").await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{
                "head_block": 17900000,
                "contracts": {{
                    "0xPool": {{
                        "deployment": {{
                            "block": 17892345,
                            "deployer": "0x742d",
                            "constructor_args": {{ "admin": "0x0000000000000000000000000000000000000000" }}
                        }},
                        "native_balance": 150000000000000000000
                    }}
                }}
            }}"#
        )
        .expect("write");

        let chain = StaticChainState::load(file.path()).expect("load");
        assert_eq!(chain.network(), None);
        let deployment = chain.deployment("0xpool").await.expect("deployment");
        assert_eq!(deployment.block, 17_892_345);
        assert_eq!(
            chain.native_balance("0xPOOL", 17_900_000).await.expect("balance"),
            150 * WEI_PER_ETH
        );
    }

    fn historical_chain() -> StaticChainState {
        StaticChainState::new(18_100_000)
            .with_network("ethereum")
            .with_contract(
                "0xpool",
                ContractState {
                    deployment: Some(DeploymentRecord {
                        block: 17_892_346,
                        deployer: "0x742d".to_string(),
                        transaction: None,
                        constructor_args: BTreeMap::new(),
                    }),
                    native_balance: 500,
                    holders: Some(HolderSnapshot::default()),
                    balance_history: BTreeMap::from([(17_892_346, 0), (17_950_000, 120)]),
                    holder_history: BTreeMap::new(),
                },
            )
    }

    #[tokio::test]
    async fn balances_follow_history() {
        let chain = historical_chain();
        assert_eq!(chain.native_balance("0xpool", 17_900_000).await.unwrap(), 0);
        assert_eq!(chain.native_balance("0xpool", 18_000_000).await.unwrap(), 120);
        assert_eq!(chain.native_balance("0xpool", 18_100_000).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn reads_before_deployment_are_unavailable() {
        let chain = historical_chain();
        let err = chain.native_balance("0xpool", 17_892_000).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Unavailable);
        let err = chain.holders("0xpool", 17_892_000).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn analysis_block_defaults_to_head() {
        let chain = historical_chain();
        let contract = ContractRef::new("0xpool");
        assert_eq!(analysis_block(&chain, &contract).await.unwrap(), 18_100_000);

        let pinned = contract.clone().at_block(18_000_000);
        assert_eq!(analysis_block(&chain, &pinned).await.unwrap(), 18_000_000);

        let future = contract.at_block(18_200_000);
        let err = analysis_block(&chain, &future).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn other_network_is_unavailable() {
        let chain = historical_chain();
        let contract = ContractRef::new("0xpool").with_network("Polygon");
        let err = analysis_block(&chain, &contract).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Unavailable);

        let same = ContractRef::new("0xpool").with_network("Ethereum");
        assert!(analysis_block(&chain, &same).await.is_ok());
    }
}
