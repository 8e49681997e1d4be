//! Error Types

use thiserror::Error;

use crate::task::TaskResult;

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;

/// Stable error classification with the wire codes used in logs and API responses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Internal,
    InvalidInput,
    DuplicateName,
    ToolNotFound,
    ProviderNotFound,
    ToolExecutionFailed,
    MalformedCommand,
    Provider,
    Cancelled,
    Bus,
}

impl ErrorKind {
    /// Error code, e.g. `ERR_3000`
    pub const fn code(self) -> &'static str {
        match self {
            Self::Internal => "ERR_1000",
            Self::InvalidInput => "ERR_1002",
            Self::DuplicateName => "ERR_1003",
            Self::Cancelled => "ERR_1004",
            Self::Provider => "ERR_2001",
            Self::ProviderNotFound => "ERR_2002",
            Self::ToolNotFound => "ERR_3000",
            Self::ToolExecutionFailed => "ERR_3001",
            Self::MalformedCommand => "ERR_3003",
            Self::Bus => "ERR_5000",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Kernel error types
#[derive(Error, Debug)]
pub enum KernelError {
    /// Caller supplied an unusable request
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Registration collision
    #[error("tool {0} is already registered")]
    DuplicateName(String),

    /// Tool not present in the registry
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Neither the requested nor the default provider is registered
    #[error("no LLM provider available for '{0}'")]
    ProviderNotFound(String),

    /// The tool ran and signaled failure
    #[error("failed to execute tool {tool}: {source}")]
    ToolExecutionFailed {
        tool: String,
        #[source]
        source: ToolError,
    },

    /// Embedded `TOOL:` command failed to parse
    #[error("malformed tool command: {reason} (got: {raw})")]
    MalformedCommand { reason: String, raw: String },

    /// LLM provider error
    #[error("provider error: {0}")]
    Provider(String),

    /// Kernel is missing a required collaborator
    #[error("internal error: {0}")]
    Internal(String),

    /// Operation cancelled by the caller
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Message bus failure
    #[error("bus error: {0}")]
    Bus(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl KernelError {
    pub(crate) fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedCommand {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Classify the error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::DuplicateName(_) => ErrorKind::DuplicateName,
            Self::ToolNotFound(_) => ErrorKind::ToolNotFound,
            Self::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
            Self::ToolExecutionFailed { .. } => ErrorKind::ToolExecutionFailed,
            Self::MalformedCommand { .. } => ErrorKind::MalformedCommand,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Bus(_) => ErrorKind::Bus,
            Self::Internal(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Error code for this error
    pub const fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Bus(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => format!("Invalid request: {msg}"),
            Self::DuplicateName(name) => format!("A tool named '{name}' already exists."),
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ProviderNotFound(_) => "No AI service is configured for this request.".into(),
            Self::ToolExecutionFailed { source, .. } => format!("Tool error: {}", source.message),
            Self::MalformedCommand { reason, .. } => format!("Could not understand tool command: {reason}"),
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::Cancelled(_) => "The request was cancelled.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for KernelError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Failure signaled by a tool's own execute operation
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,

    /// Whatever the tool produced before failing
    pub partial: Option<TaskResult>,

    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
            source: None,
        }
    }

    /// Arguments did not match what the tool expects
    pub fn invalid_arguments(message: impl std::fmt::Display) -> Self {
        Self::new(format!("invalid arguments: {message}"))
    }

    pub fn with_partial(mut self, partial: TaskResult) -> Self {
        self.partial = Some(partial);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// A failed execution: the always-present failed result plus the error behind it
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ExecutionFailure {
    pub result: TaskResult,
    #[source]
    pub error: KernelError,
}

impl ExecutionFailure {
    pub const fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn into_error(self) -> KernelError {
        self.error
    }
}
