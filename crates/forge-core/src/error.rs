//! Unified error types for forge

use crate::types::Phase;
use thiserror::Error;

/// Unified error type for all forge operations
///
/// Every dispatcher-level failure is converted into a structured tool result
/// carrying `kind()` and the display message; nothing in this taxonomy is
/// allowed to cross the dispatch boundary as an unhandled fault.
#[derive(Error, Debug)]
pub enum ForgeError {
    // Dispatcher errors
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool '{tool}' is not permitted in phase {phase}")]
    PhaseViolation { tool: String, phase: Phase },

    #[error("Plan approval required before mutating call '{0}'")]
    ApprovalRequired(String),

    // Sandbox errors
    #[error("Sandbox violation: {0}")]
    SandboxViolation(String),

    // Handler errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Cancelled")]
    Cancelled,

    // Transient collaborator errors
    #[error("Reasoning collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// Stable kind identifier used in wire-format tool results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::PhaseViolation { .. } => "phase_violation",
            Self::ApprovalRequired(_) => "approval_required",
            Self::SandboxViolation(_) => "sandbox_violation",
            Self::ToolExecution(_) => "tool_execution_error",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::CollaboratorUnavailable(_) => "collaborator_unavailable",
            Self::PersistenceUnavailable(_) => "persistence_unavailable",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Other(_) => "other",
        }
    }

    /// Transient errors are retried with bounded backoff; everything else is
    /// surfaced to the reasoning collaborator to correct.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CollaboratorUnavailable(_) | Self::PersistenceUnavailable(_)
        )
    }
}

/// Result type alias using ForgeError
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(ForgeError::UnknownTool("x".into()).kind(), "unknown_tool");
        assert_eq!(
            ForgeError::ApprovalRequired("write_file".into()).kind(),
            "approval_required"
        );
        assert_eq!(
            ForgeError::SandboxViolation("escape".into()).kind(),
            "sandbox_violation"
        );
        assert_eq!(ForgeError::Timeout(30).kind(), "timeout");
        assert_eq!(ForgeError::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ForgeError::CollaboratorUnavailable("503".into()).is_transient());
        assert!(ForgeError::PersistenceUnavailable("io".into()).is_transient());
        assert!(!ForgeError::InvalidArguments("bad".into()).is_transient());
        assert!(!ForgeError::SandboxViolation("escape".into()).is_transient());
    }

    #[test]
    fn test_phase_violation_message_names_tool_and_phase() {
        let err = ForgeError::PhaseViolation {
            tool: "write_file".to_string(),
            phase: Phase::Orient,
        };
        let msg = err.to_string();
        assert!(msg.contains("write_file"));
        assert!(msg.contains("orient"));
    }
}
