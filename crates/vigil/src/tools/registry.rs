//! Name-keyed registry of analysis tools.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{AnalysisError, AnalysisResult};

use super::tool::{Tool, ToolCategory, ToolSpec};

/// Read-only set of tools available to sessions.
///
/// Built once through [`ToolRegistryBuilder`]; no method mutates it
/// afterwards, so an `Arc<ToolRegistry>` can be shared across concurrent
/// sessions. Iteration order is by tool name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Look up a tool by name, failing with [`AnalysisError::UnknownTool`].
    pub fn lookup(&self, name: &str) -> AnalysisResult<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| AnalysisError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn category_of(&self, name: &str) -> Option<ToolCategory> {
        self.tools.get(name).map(|tool| tool.category())
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|name| name.as_str()).collect()
    }

    /// Specs for every tool, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Distinct categories represented in the registry, in index order.
    pub fn categories(&self) -> BTreeSet<ToolCategory> {
        self.tools.values().map(|tool| tool.category()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Register a tool. Fails if a tool with the same name is already present.
    pub fn register(mut self, tool: Arc<dyn Tool>) -> AnalysisResult<Self> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AnalysisError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractRef;
    use crate::tools::tool::{ToolError, ToolOutput};
    use async_trait::async_trait;

    struct NamedTool {
        name: &'static str,
        category: ToolCategory,
    }

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn category(&self) -> ToolCategory {
            self.category
        }

        async fn execute(
            &self,
            _contract: &ContractRef,
            _evidence_summary: &str,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::default())
        }
    }

    fn tool(name: &'static str, category: ToolCategory) -> Arc<dyn Tool> {
        Arc::new(NamedTool { name, category })
    }

    #[test]
    fn empty_registry() {
        let reg = ToolRegistry::builder().build();
        assert!(reg.is_empty());
        assert!(reg.names().is_empty());
        assert!(matches!(reg.lookup("any"), Err(AnalysisError::UnknownTool(_))));
    }

    #[test]
    fn register_and_lookup() {
        let reg = ToolRegistry::builder()
            .register(tool("fetcher", ToolCategory::SourceCode))
            .unwrap()
            .build();

        let found = reg.lookup("fetcher").unwrap();
        assert_eq!(found.name(), "fetcher");
        assert_eq!(reg.category_of("fetcher"), Some(ToolCategory::SourceCode));
        assert!(reg.contains("fetcher"));
        assert!(!reg.contains("params"));
    }

    #[test]
    fn names_are_sorted() {
        let reg = ToolRegistry::builder()
            .register(tool("state", ToolCategory::State))
            .unwrap()
            .register(tool("constructor", ToolCategory::Initialization))
            .unwrap()
            .register(tool("analysis", ToolCategory::SourceCode))
            .unwrap()
            .build();

        assert_eq!(reg.names(), vec!["analysis", "constructor", "state"]);
        let spec_names: Vec<String> = reg.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(spec_names, vec!["analysis", "constructor", "state"]);
    }

    #[test]
    fn categories_are_distinct_and_ordered() {
        let reg = ToolRegistry::builder()
            .register(tool("b", ToolCategory::State))
            .unwrap()
            .register(tool("a", ToolCategory::SourceCode))
            .unwrap()
            .register(tool("c", ToolCategory::SourceCode))
            .unwrap()
            .build();

        let categories: Vec<ToolCategory> = reg.categories().into_iter().collect();
        assert_eq!(categories, vec![ToolCategory::SourceCode, ToolCategory::State]);
    }

    #[test]
    fn duplicate_registration_fails() {
        let result = ToolRegistry::builder()
            .register(tool("dup", ToolCategory::SourceCode))
            .unwrap()
            .register(tool("dup", ToolCategory::State));
        assert!(matches!(result, Err(AnalysisError::DuplicateTool(name)) if name == "dup"));
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ToolRegistry>();
    }
}
