//! Tool interface, registry and bounded executor.

pub mod executor;
pub mod invocation;
pub mod registry;
pub mod tool;

pub use executor::{execute_tool, ExecutionResult};
pub use invocation::{InvocationOutcome, ToolInvocationRecord};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use tool::{Tool, ToolCategory, ToolError, ToolErrorKind, ToolOutput, ToolSpec};
