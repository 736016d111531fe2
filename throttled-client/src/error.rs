use admission_gate::AdmissionError;
use admission_gate::QuotaError;
use tower::BoxError;

/// Errors produced by the throttled client.
///
/// Transport failures are not errors: they are folded into a status code by
/// the executor. What remains is cancellation, failures that happen before a
/// slot is requested, and construction problems.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The submission was cancelled while waiting for admission or while the
    /// request was in flight.
    #[error("submission was cancelled")]
    Cancelled,

    /// The document could not be encoded. No admission slot was consumed.
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The quota passed at construction was invalid.
    #[error("invalid quota: {0}")]
    Quota(#[from] QuotaError),

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An unexpected error surfaced from the service stack.
    ///
    /// The string contains the `Display` representation of the inner error.
    #[error("internal service error: {0}")]
    Inner(String),
}

impl From<AdmissionError> for ClientError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Cancelled => ClientError::Cancelled,
        }
    }
}

impl ClientError {
    /// Recovers a `ClientError` from a boxed service error, wrapping anything
    /// else as [`ClientError::Inner`].
    pub(crate) fn from_service(err: BoxError) -> Self {
        match err.downcast::<ClientError>() {
            Ok(err) => *err,
            Err(err) => ClientError::Inner(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_unwraps_boxed_client_errors() {
        let boxed: BoxError = Box::new(ClientError::Cancelled);
        assert!(matches!(
            ClientError::from_service(boxed),
            ClientError::Cancelled
        ));
    }

    #[test]
    fn it_wraps_foreign_errors() {
        let boxed: BoxError = "boom".into();
        match ClientError::from_service(boxed) {
            ClientError::Inner(msg) => assert_eq!(msg, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn admission_cancellation_maps_to_cancelled() {
        assert!(matches!(
            ClientError::from(AdmissionError::Cancelled),
            ClientError::Cancelled
        ));
    }
}
