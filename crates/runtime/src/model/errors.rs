use thiserror::Error;

/// Errors from model endpoint calls.
///
/// None of these are retried; the caller reports them once per query.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The request never got an HTTP response.
    #[error("network: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The endpoint response could not be parsed.
    #[error("invalid endpoint response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// HTTP status of an endpoint rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_carries_status() {
        let err = ModelError::Api {
            status: 401,
            body: r#"{"error":{"message":"Incorrect API key"}}"#.into(),
        };
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().starts_with("endpoint returned 401: "));
        assert_eq!(ModelError::Network("refused".into()).status(), None);
    }
}
