use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use tower::BoxError;
use tower::Service;

use crate::ClientConfig;
use crate::ClientError;

/// Header carrying the caller's detached signature.
pub const SIGNATURE_HEADER: &str = "Signature";

/// The payload and signature of one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub signature: String,
}

impl Envelope {
    pub fn new(payload: impl Into<Vec<u8>>, signature: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            signature: signature.into(),
        }
    }
}

/// Sends exactly one POST per call and reports the outcome as a status code.
///
/// Upstream statuses are returned verbatim. Failures to get a response are
/// mapped onto gateway-style codes:
///
/// | Failure | Code |
/// |---|---|
/// | connect or send timeout | 504 |
/// | connection refused / unreachable | 502 |
/// | other I/O during send or receive | 503 |
/// | anything else | 500 |
///
/// Nothing is retried. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    inner: Arc<ExecutorInner>,
}

#[derive(Debug)]
struct ExecutorInner {
    client: reqwest::Client,
    endpoint: Url,
    authorization: String,
    content_type: String,
    send_timeout: Duration,
}

impl HttpExecutor {
    /// Builds an executor for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the endpoint is not a valid URL and
    /// [`ClientError::Build`] if the HTTP client cannot be created.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ClientError::Config(format!("endpoint `{}`: {e}", config.endpoint)))?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            inner: Arc::new(ExecutorInner {
                client,
                endpoint,
                authorization: config.authorization.clone(),
                content_type: config.content_type.clone(),
                send_timeout: config.send_timeout,
            }),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Performs the call and returns its status code. Never fails.
    ///
    /// The upstream status is only returned once its body has been read in
    /// full; a body that times out or breaks off yields 504 or 503 instead.
    pub async fn send(&self, envelope: Envelope) -> u16 {
        let inner = &self.inner;
        tracing::debug!(endpoint = %inner.endpoint, "sending request");

        let result = inner
            .client
            .post(inner.endpoint.clone())
            .header(CONTENT_TYPE, inner.content_type.as_str())
            .header(AUTHORIZATION, inner.authorization.as_str())
            .header(SIGNATURE_HEADER, envelope.signature)
            .timeout(inner.send_timeout)
            .body(envelope.payload)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => return failure_status(&err).as_u16(),
        };

        let status = response.status();
        // The send timeout covers reading the body too.
        if let Err(err) = response.bytes().await {
            return failure_status(&err).as_u16();
        }

        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "request succeeded");
        } else {
            tracing::error!(status = status.as_u16(), "request failed");
        }
        status.as_u16()
    }
}

/// Maps a transport failure onto the status code reported to the caller.
pub(crate) fn failure_status(err: &reqwest::Error) -> StatusCode {
    // Connect timeouts are also connect errors; the timeout takes precedence.
    if err.is_timeout() {
        tracing::error!(error = %err, status = 504, "request timed out");
        StatusCode::GATEWAY_TIMEOUT
    } else if err.is_connect() {
        tracing::error!(error = %err, status = 502, "connection failure");
        StatusCode::BAD_GATEWAY
    } else if err.is_request() || err.is_body() || err.is_decode() {
        tracing::error!(error = %err, status = 503, "I/O failure");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        tracing::error!(error = ?err, status = 500, "request failed unexpectedly");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl Service<Envelope> for HttpExecutor {
    type Response = u16;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<u16, BoxError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, envelope: Envelope) -> Self::Future {
        let executor = self.clone();
        Box::pin(async move { Ok(executor.send(envelope).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rejects_invalid_endpoints() {
        let config = ClientConfig::default().with_endpoint("not a url");
        assert!(matches!(
            HttpExecutor::new(&config),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn envelope_keeps_payload_and_signature() {
        let envelope = Envelope::new(b"{}".to_vec(), "sig");
        assert_eq!(envelope.payload, b"{}");
        assert_eq!(envelope.signature, "sig");
    }
}
