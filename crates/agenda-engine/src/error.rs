//! Error types for agenda-engine operations.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgendaError {
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Calendar store timed out: {0}")]
    CollaboratorTimeout(String),

    #[error("Calendar store failure: {0}")]
    CollaboratorFailure(String),

    #[error("Failed to write export to {}: {source}", path.display())]
    ExportWriteFailure {
        path: PathBuf,
        /// The formatted export, kept so the caller can still recover it.
        data: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode export: {0}")]
    ExportEncoding(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, AgendaError>;

/// Machine-readable category of an [`AgendaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidDateFormat,
    InvalidTimezone,
    InvalidRequest,
    CalendarNotFound,
    EventNotFound,
    CollaboratorTimeout,
    CollaboratorFailure,
    ExportWriteFailure,
    ExportEncoding,
    Unsupported,
    Cancelled,
}

impl AgendaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgendaError::InvalidDateFormat(_) => ErrorKind::InvalidDateFormat,
            AgendaError::InvalidTimezone(_) => ErrorKind::InvalidTimezone,
            AgendaError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AgendaError::CalendarNotFound(_) => ErrorKind::CalendarNotFound,
            AgendaError::EventNotFound(_) => ErrorKind::EventNotFound,
            AgendaError::CollaboratorTimeout(_) => ErrorKind::CollaboratorTimeout,
            AgendaError::CollaboratorFailure(_) => ErrorKind::CollaboratorFailure,
            AgendaError::ExportWriteFailure { .. } => ErrorKind::ExportWriteFailure,
            AgendaError::ExportEncoding(_) => ErrorKind::ExportEncoding,
            AgendaError::Unsupported(_) => ErrorKind::Unsupported,
            AgendaError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Prefix collaborator errors with the operation that issued the call.
    ///
    /// Errors raised by this crate before reaching the store already name
    /// their subject and are returned unchanged.
    pub fn context(self, operation: &str) -> Self {
        match self {
            AgendaError::CollaboratorTimeout(msg) => {
                AgendaError::CollaboratorTimeout(format!("{operation}: {msg}"))
            }
            AgendaError::CollaboratorFailure(msg) => {
                AgendaError::CollaboratorFailure(format!("{operation}: {msg}"))
            }
            other => other,
        }
    }
}

impl From<csv::Error> for AgendaError {
    fn from(err: csv::Error) -> Self {
        AgendaError::ExportEncoding(err.to_string())
    }
}

/// Structured failure result handed back to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AgendaError> for Failure {
    fn from(err: &AgendaError) -> Self {
        Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
