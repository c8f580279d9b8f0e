use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from repository operations (used by trait definitions in colloquy-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Bearer credential failures.
///
/// The resolver collapses every verification failure into `InvalidCredential`;
/// the specific reason only reaches the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingCredential,

    #[error("invalid authorization header format")]
    MalformedHeader,

    #[error("invalid or expired token")]
    InvalidCredential,
}

/// Failures reported by a reply generator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponderError {
    /// The backend could not be reached or refused the request.
    #[error("responder unavailable: {0}")]
    Unavailable(String),

    #[error("responder failed: {0}")]
    Failed(String),

    #[error("responder timed out after {0} ms")]
    TimedOut(u64),
}

/// Canonical client-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    ResourceNotFound,
    Server,
}

impl ErrorKind {
    /// Wire code placed in the error body.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorKind::Server => "SERVER_ERROR",
        }
    }

    /// HTTP status code.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::ResourceNotFound => 404,
            ErrorKind::Server => 500,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::Validation => "The request contains invalid parameters",
            ErrorKind::Unauthorized => "Authentication required",
            ErrorKind::Forbidden => "You do not have permission to access this resource",
            ErrorKind::ResourceNotFound => "The requested resource could not be found",
            ErrorKind::Server => "An unexpected error occurred",
        }
    }
}

/// A field/value pair attached to an error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub field: String,
    pub value: String,
}

/// An error in the canonical taxonomy.
///
/// `message` and `details` are shown to the client. `internal` carries
/// diagnostic context for server logs and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", .kind.code(), .message)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub internal: Option<String>,
}

impl ServiceError {
    /// Build an error of `kind`; an empty message selects the kind's default.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            kind.default_message().to_string()
        } else {
            message
        };
        Self {
            kind,
            message,
            details: Vec::new(),
            internal: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceNotFound, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    /// Attach a field/value detail.
    pub fn with_detail(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push(ErrorDetail {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Attach server-side diagnostic context.
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal = Some(internal.into());
        self
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(e: RepositoryError) -> Self {
        ServiceError::server("").with_internal(e.to_string())
    }
}

impl From<ResponderError> for ServiceError {
    fn from(e: ResponderError) -> Self {
        ServiceError::server("Failed to generate AI response").with_internal(e.to_string())
    }
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        let message = match e {
            AuthError::MissingCredential => "Missing authorization header",
            AuthError::MalformedHeader => "Invalid authorization header format",
            AuthError::InvalidCredential => "Invalid or expired token",
        };
        ServiceError::unauthorized(message)
    }
}
