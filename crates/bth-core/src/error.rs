//! Application error types with rich context
//!
//! These are harness-level failures: config files, task bookkeeping and driver commands.
//! Failures thrown by the objects under test are [`crate::Exception`]s and
//! never travel through this type.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Task Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: u64 },

    #[error("Task {task_id} cannot be closed by the user")]
    TaskPinned { task_id: u64 },

    // ─────────────────────────────────────────────────────────────
    // Command/Driver Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid command: {message}")]
    Command { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn task_not_found(task_id: u64) -> Self {
        Self::TaskNotFound { task_id }
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ChannelClosed)
    }
}
