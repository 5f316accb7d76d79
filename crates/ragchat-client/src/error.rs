//! Error taxonomy for remote chat service calls.

use std::fmt;

use reqwest::StatusCode;

/// Coarse failure category, independent of the detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    BadRequest,
    Unreachable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::BadRequest => write!(f, "bad_request"),
            ErrorKind::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Errors from the remote chat service. Exactly one per failed call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Missing, expired or rejected bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Conversation id unknown to the service.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed ask or upload input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Transport failure, server failure or an unreadable response.
    #[error("service unreachable: {0}")]
    Unreachable(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::BadRequest(_) => ErrorKind::BadRequest,
            ServiceError::Unreachable(_) => ErrorKind::Unreachable,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ServiceError::Unauthorized(d)
            | ServiceError::NotFound(d)
            | ServiceError::BadRequest(d)
            | ServiceError::Unreachable(d) => d,
        }
    }

    /// Classify a non-success HTTP response.
    ///
    /// The backend answers 403 for conversations owned by someone else, which
    /// is an authorization problem from the caller's point of view.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = extract_detail(status, body);
        match status.as_u16() {
            401 | 403 => ServiceError::Unauthorized(detail),
            404 => ServiceError::NotFound(detail),
            400..=499 => ServiceError::BadRequest(detail),
            _ => ServiceError::Unreachable(detail),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Unreachable(format!("malformed response: {}", err))
        } else if err.is_builder() {
            ServiceError::BadRequest(err.to_string())
        } else {
            ServiceError::Unreachable(err.to_string())
        }
    }
}

/// Pull FastAPI's `{"detail": ...}` out of an error body, falling back to
/// the raw text and then the canonical reason phrase.
fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
