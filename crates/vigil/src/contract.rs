//! Reference to the contract under analysis.

use serde::{Deserialize, Serialize};

/// Identifies the contract a session analyses.
///
/// Fields are private so a reference cannot change once a session owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRef {
    address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deploy_block: Option<u64>,
    /// Network the contract lives on, e.g. `ethereum`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    /// Block to analyse at. `None` means the chain head.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block: Option<u64>,
}

impl ContractRef {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            source_code: None,
            deploy_block: None,
            network: None,
            block: None,
        }
    }

    pub fn with_source(mut self, source_code: impl Into<String>) -> Self {
        self.source_code = Some(source_code.into());
        self
    }

    pub fn with_deploy_block(mut self, block: u64) -> Self {
        self.deploy_block = Some(block);
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Analyse the contract as of `block` instead of the chain head.
    pub fn at_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn source_code(&self) -> Option<&str> {
        self.source_code.as_deref()
    }

    pub fn deploy_block(&self) -> Option<u64> {
        self.deploy_block
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    pub fn block(&self) -> Option<u64> {
        self.block
    }

    /// First `max_chars` characters of the cached source, with an ellipsis
    /// when truncated. Empty when no source is cached.
    pub fn source_preview(&self, max_chars: usize) -> String {
        let Some(source) = self.source_code.as_deref() else {
            return String::new();
        };
        let mut chars = source.chars();
        let preview: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{preview}...")
        } else {
            preview
        }
    }
}
