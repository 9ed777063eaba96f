use http::StatusCode;
use std::fmt;

/// Route registration error.
///
/// Returned while building a [`Router`](crate::Router). These describe a
/// broken route table, so startup code is expected to propagate them out of
/// `main` rather than recover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern is syntactically unusable.
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
    /// A `:` or `*` marker with nothing after it.
    UnnamedWildcard { pattern: String },
    /// A catch-all followed by more path.
    CatchAllNotLast { pattern: String },
    /// The new route would make an existing edge ambiguous.
    Conflict { pattern: String, existing: String },
    /// The exact pattern already has a handler.
    DuplicateHandler { pattern: String },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid route pattern '{pattern}': {reason}")
            }
            RouteError::UnnamedWildcard { pattern } => {
                write!(
                    f,
                    "wildcards must be named with a non-empty name in path '{pattern}'"
                )
            }
            RouteError::CatchAllNotLast { pattern } => {
                write!(
                    f,
                    "catch-all routes are only allowed at the end of the path in '{pattern}'"
                )
            }
            RouteError::Conflict { pattern, existing } => {
                write!(
                    f,
                    "route '{pattern}' conflicts with existing children at '{existing}'"
                )
            }
            RouteError::DuplicateHandler { pattern } => {
                write!(f, "a handler is already registered for path '{pattern}'")
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// An error a handler returns to pick the response status.
///
/// The dispatcher downcasts the handler's `anyhow::Error` to this type and
/// answers with `{"error": message}` under `status`. Any other error becomes
/// a `500 Internal Server Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for HttpError {}
