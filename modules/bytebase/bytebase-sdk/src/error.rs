//! Public error types for the Bytebase SDK.
//!
//! Every operation fails with a [`BytebaseError`]. Callers that only care
//! about the category match on [`BytebaseError::kind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::{Code, Status};

/// Error categories surfaced by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    Cancelled,
    DeadlineExceeded,
    Unavailable,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`crate::BytebaseApi`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BytebaseError {
    /// A resource name could not be parsed.
    #[error("malformed resource name '{name}': {reason}")]
    MalformedName { name: String, reason: String },

    /// Bad id, bad mask path, payload/type mismatch, unknown enum value.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// An expression failed to parse; carries the parser diagnostic.
    #[error("invalid expression: {diagnostic}")]
    InvalidExpression { diagnostic: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("already exists: {message}")]
    AlreadyExists { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// Undelete of an active resource, delete of a resource with
    /// dependents, or a policy on a parent that forbids it.
    #[error("failed precondition: {message}")]
    FailedPrecondition { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The transport could not reach the server. Safe to retry.
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// The server answered with something the client cannot interpret.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BytebaseError {
    pub fn malformed_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_expression(diagnostic: impl Into<String>) -> Self {
        Self::InvalidExpression {
            diagnostic: diagnostic.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The taxonomy category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedName { .. }
            | Self::InvalidArgument { .. }
            | Self::InvalidExpression { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::FailedPrecondition { .. } => ErrorKind::FailedPrecondition,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a caller may retry the same request. The client itself never
    /// retries.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Convert back to a wire status, e.g. for per-entry batch results.
    #[must_use]
    pub fn to_status(&self) -> Status {
        let code = match self.kind() {
            ErrorKind::InvalidArgument => Code::InvalidArgument,
            ErrorKind::NotFound => Code::NotFound,
            ErrorKind::AlreadyExists => Code::AlreadyExists,
            ErrorKind::PermissionDenied => Code::PermissionDenied,
            ErrorKind::FailedPrecondition => Code::FailedPrecondition,
            ErrorKind::Cancelled => Code::Cancelled,
            ErrorKind::DeadlineExceeded => Code::DeadlineExceeded,
            ErrorKind::Unavailable => Code::Unavailable,
            ErrorKind::Internal => Code::Internal,
        };
        Status::new(code, self.status_message())
    }

    /// The message carried on the wire. Variants decoded from a status keep
    /// it without their display prefix so a round trip does not repeat it.
    fn status_message(&self) -> String {
        match self {
            Self::InvalidArgument { message }
            | Self::NotFound { message }
            | Self::AlreadyExists { message }
            | Self::PermissionDenied { message }
            | Self::FailedPrecondition { message }
            | Self::Unavailable { message }
            | Self::Internal { message } => message.clone(),
            Self::MalformedName { .. }
            | Self::InvalidExpression { .. }
            | Self::Cancelled
            | Self::DeadlineExceeded => self.to_string(),
        }
    }
}

/// Translate a transport status into the client taxonomy.
impl From<Status> for BytebaseError {
    fn from(status: Status) -> Self {
        let Status { code, message } = status;
        match code {
            Code::InvalidArgument | Code::OutOfRange => Self::InvalidArgument { message },
            Code::NotFound => Self::NotFound { message },
            Code::AlreadyExists => Self::AlreadyExists { message },
            Code::PermissionDenied | Code::Unauthenticated => Self::PermissionDenied { message },
            Code::FailedPrecondition | Code::Aborted => Self::FailedPrecondition { message },
            Code::Cancelled => Self::Cancelled,
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            Code::Unavailable | Code::ResourceExhausted => Self::Unavailable { message },
            Code::Internal | Code::Unknown | Code::Unimplemented | Code::DataLoss => {
                Self::Internal { message }
            }
        }
    }
}
