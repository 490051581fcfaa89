use thiserror::Error;

/// Unified error type for the vigil crate.
///
/// Tool and policy failures are not represented here: they are recovered
/// inside a session and recorded as values (see [`crate::tools::ToolError`]
/// and [`crate::policy::PolicyError`]).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A tool name was resolved against a registry that does not hold it.
    #[error("unknown tool: '{0}'")]
    UnknownTool(String),
    /// A loop operation was attempted on a session in a terminal state.
    #[error("session {0} is closed")]
    SessionClosed(String),
    /// A report was requested before the session reached a terminal state.
    #[error("session {0} has not finished; no report is available")]
    ReportUnavailable(String),
    /// The registry was built with two tools under the same name.
    #[error("duplicate tool: '{0}'")]
    DuplicateTool(String),
    /// A controller was constructed over a registry with no tools.
    #[error("tool registry is empty")]
    EmptyRegistry,
    /// The limiter bounding concurrent sessions was closed before a session
    /// could start.
    #[error("session limiter closed")]
    LimiterClosed,
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`AnalysisError`].
pub type AnalysisResult<T> = Result<T, AnalysisError>;
