//! Error types for opgraph-hierarchy
//!
//! One error enum covers the parser, the raw-graph stage, the hierarchy
//! builder and the read-only queries. Every variant maps onto a stable
//! [`ErrorKind`] so callers can branch without matching on messages.

use thiserror::Error;

use crate::config::ConfigError;

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedInput,
    EmptyGraph,
    StructuralInvariantViolation,
    Lookup,
    Cancelled,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::EmptyGraph => "empty_graph",
            ErrorKind::StructuralInvariantViolation => "structural_invariant_violation",
            ErrorKind::Lookup => "lookup",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for opgraph-hierarchy operations
#[derive(Debug, Error)]
pub enum HierarchyError {
    /// Unparseable text-format input
    #[error("Malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    /// Graph definition without any nodes
    #[error("The graph is empty. This can happen when TensorFlow could not trace any graph. Please refer to https://github.com/tensorflow/tensorboard/issues/1961 for more information.")]
    EmptyGraph,

    /// Tree shape broken by an upstream naming collision
    #[error("Structural invariant violated: {0}")]
    StructuralInvariantViolation(String),

    /// Name absent from the hierarchy index
    #[error("Could not find '{0}' in the hierarchy")]
    Lookup(String),

    /// Cancellation observed between phases
    #[error("Cancelled before phase '{phase}'")]
    Cancelled { phase: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HierarchyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HierarchyError::MalformedInput { .. } => ErrorKind::MalformedInput,
            HierarchyError::EmptyGraph => ErrorKind::EmptyGraph,
            HierarchyError::StructuralInvariantViolation(_) => {
                ErrorKind::StructuralInvariantViolation
            }
            HierarchyError::Lookup(_) => ErrorKind::Lookup,
            HierarchyError::Cancelled { .. } => ErrorKind::Cancelled,
            HierarchyError::Io(_) => ErrorKind::Io,
            HierarchyError::Config(_) => ErrorKind::Config,
        }
    }

    /// Create a malformed-input error
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        HierarchyError::MalformedInput {
            line,
            reason: reason.into(),
        }
    }

    /// Create a structural-invariant error
    pub fn structural(msg: impl Into<String>) -> Self {
        HierarchyError::StructuralInvariantViolation(msg.into())
    }

    /// Create a lookup error
    pub fn lookup(name: impl Into<String>) -> Self {
        HierarchyError::Lookup(name.into())
    }

    /// Create a cancellation error
    pub fn cancelled(phase: impl Into<String>) -> Self {
        HierarchyError::Cancelled {
            phase: phase.into(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.kind() == ErrorKind::MalformedInput
    }

    pub fn is_lookup(&self) -> bool {
        self.kind() == ErrorKind::Lookup
    }
}

/// Result type alias for opgraph-hierarchy operations
pub type Result<T> = std::result::Result<T, HierarchyError>;
