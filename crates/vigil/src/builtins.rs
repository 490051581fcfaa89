//! Built-in analysis tools.
//!
//! The set is closed: every built-in is a [`BuiltinTool`] variant, and chain
//! access goes through the injected [`ChainState`].

pub mod concentration;
pub mod constructor;
pub mod deployment;
pub mod source_patterns;

use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::ChainState;
use crate::contract::ContractRef;
use crate::error::AnalysisResult;
use crate::tools::{Tool, ToolCategory, ToolError, ToolOutput, ToolRegistry, ToolRegistryBuilder};

#[derive(Clone)]
pub enum BuiltinTool {
    SourcePatterns,
    ConstructorParams {
        chain: Arc<dyn ChainState>,
    },
    DeploymentContext {
        chain: Arc<dyn ChainState>,
        recent_window: u64,
    },
    HolderConcentration {
        chain: Arc<dyn ChainState>,
    },
}

impl BuiltinTool {
    /// One instance of every built-in, sharing `chain`.
    pub fn all(chain: Arc<dyn ChainState>) -> Vec<BuiltinTool> {
        vec![
            Self::SourcePatterns,
            Self::ConstructorParams {
                chain: Arc::clone(&chain),
            },
            Self::DeploymentContext {
                chain: Arc::clone(&chain),
                recent_window: deployment::DEFAULT_RECENT_WINDOW,
            },
            Self::HolderConcentration { chain },
        ]
    }
}

impl std::fmt::Debug for BuiltinTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BuiltinTool").field(&self.name()).finish()
    }
}

#[async_trait]
impl Tool for BuiltinTool {
    fn name(&self) -> &str {
        match self {
            Self::SourcePatterns => source_patterns::NAME,
            Self::ConstructorParams { .. } => constructor::NAME,
            Self::DeploymentContext { .. } => deployment::NAME,
            Self::HolderConcentration { .. } => concentration::NAME,
        }
    }

    fn category(&self) -> ToolCategory {
        match self {
            Self::SourcePatterns => ToolCategory::SourceCode,
            Self::ConstructorParams { .. } => ToolCategory::Initialization,
            Self::DeploymentContext { .. } => ToolCategory::Deployment,
            Self::HolderConcentration { .. } => ToolCategory::State,
        }
    }

    fn description(&self) -> &str {
        match self {
            Self::SourcePatterns => source_patterns::DESCRIPTION,
            Self::ConstructorParams { .. } => constructor::DESCRIPTION,
            Self::DeploymentContext { .. } => deployment::DESCRIPTION,
            Self::HolderConcentration { .. } => concentration::DESCRIPTION,
        }
    }

    async fn execute(
        &self,
        contract: &ContractRef,
        _evidence_summary: &str,
    ) -> Result<ToolOutput, ToolError> {
        match self {
            Self::SourcePatterns => source_patterns::execute(contract),
            Self::ConstructorParams { chain } => {
                constructor::execute(chain.as_ref(), contract).await
            }
            Self::DeploymentContext {
                chain,
                recent_window,
            } => deployment::execute(chain.as_ref(), contract, *recent_window).await,
            Self::HolderConcentration { chain } => {
                concentration::execute(chain.as_ref(), contract).await
            }
        }
    }
}

/// Register every built-in tool on `builder`.
pub fn register_builtins(
    mut builder: ToolRegistryBuilder,
    chain: Arc<dyn ChainState>,
) -> AnalysisResult<ToolRegistryBuilder> {
    for tool in BuiltinTool::all(chain) {
        builder = builder.register(Arc::new(tool))?;
    }
    Ok(builder)
}

impl ToolRegistry {
    /// Registry holding exactly the built-in tools.
    pub fn builtin(chain: Arc<dyn ChainState>) -> AnalysisResult<Self> {
        Ok(register_builtins(ToolRegistry::builder(), chain)?.build())
    }
}
