use thiserror::Error;

/// Error type for query and mutation operations.
///
/// Errors are `Clone` because a single failed fetch is fanned out to every
/// subscriber of the entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The request never produced a response (connection refused, DNS, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("Request failed with status {status}: {status_text}")]
    Status { status: u16, status_text: String },

    /// The response body could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Any other failure raised by a fetcher.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The query is disabled and was never executed.
    #[error("Query is disabled")]
    Disabled,

    /// The fetch was superseded or its entry was evicted before it settled.
    #[error("Fetch was cancelled")]
    Cancelled,
}

impl QueryError {
    /// Builds a status error from a status code and its reason phrase.
    pub fn status(status: u16, status_text: impl Into<String>) -> Self {
        Self::Status {
            status,
            status_text: status_text.into(),
        }
    }

    /// Returns the HTTP status code carried by this error, if any.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display() {
        let err = QueryError::Fetch("test error".to_string());
        assert_eq!(err.to_string(), "Fetch failed: test error");

        let err = QueryError::Network("network error".to_string());
        assert_eq!(err.to_string(), "Network error: network error");

        let err = QueryError::status(404, "Patient not found");
        assert_eq!(
            err.to_string(),
            "Request failed with status 404: Patient not found"
        );
    }

    #[test]
    fn test_status_code() {
        assert_eq!(QueryError::status(503, "Unavailable").status_code(), Some(503));
        assert_eq!(QueryError::Disabled.status_code(), None);
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(QueryError::from(err), QueryError::Decode(_)));
    }
}
