use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `error` field the backend puts into the body of a missing-record response.
pub const NOT_FOUND_RECORD: &str = "Not found: Record";

#[derive(Debug, Error)]
pub enum MspApiError {
    /// The backend answered with a non-success status.
    #[error("{route} responded with {status}: {}", .error.as_deref().unwrap_or("no error body"))]
    Status {
        route: String,
        status: u16,
        error: Option<String>,
    },

    /// The request never produced a response (refused connection, reset, DNS).
    #[error("request to {route} failed: {message}")]
    Transport { route: String, message: String },

    #[error("unexpected response from {route}: {message}")]
    Decode { route: String, message: String },
}

impl MspApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MspApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn error_field(&self) -> Option<&str> {
        match self {
            MspApiError::Status { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

/// Body shape of backend errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

/// Default "record does not exist yet" classification: a 404 status or the backend's
/// missing-record error body.
pub fn is_not_found(error: &MspApiError) -> bool {
    error.status() == Some(404) || error.error_field() == Some(NOT_FOUND_RECORD)
}

#[cfg(test)]
mod tests {
    use super::{MspApiError, NOT_FOUND_RECORD, is_not_found};

    fn status(status: u16, error: Option<&str>) -> MspApiError {
        MspApiError::Status {
            route: "/buckets/0x01".into(),
            status,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn classifies_missing_records() {
        assert!(is_not_found(&status(404, None)));
        assert!(is_not_found(&status(400, Some(NOT_FOUND_RECORD))));
        assert!(!is_not_found(&status(500, Some("db down"))));
        assert!(!is_not_found(&MspApiError::Transport {
            route: "/buckets/0x01".into(),
            message: "connection refused".into(),
        }));
    }

    #[test]
    fn display_mentions_route_and_status() {
        let rendered = status(503, None).to_string();
        assert!(rendered.contains("/buckets/0x01"));
        assert!(rendered.contains("503"));
    }
}
