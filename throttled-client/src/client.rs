use std::fmt;
use std::sync::Arc;

use admission_gate::FixedWindow;
use admission_gate::Quota;
use admission_gate::SharedWindow;
use admission_gate::TimeUnit;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tower::Service;
use tower::ServiceBuilder;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;

use crate::AdmissionLayer;
use crate::CallOrdering;
use crate::ClientConfig;
use crate::ClientError;
use crate::Envelope;
use crate::HttpExecutor;
use crate::document;
use crate::document::Document;

/// A client whose submissions are paced by a fixed-window quota.
///
/// Each submission waits for an admission slot, then performs exactly one
/// call and yields its status code. Clones share the gate, the connection
/// pool and, in [`CallOrdering::Serialized`] mode, the call lock.
#[derive(Clone)]
pub struct ThrottledClient {
    service: BoxCloneSyncService<Envelope, u16, BoxError>,
    gate: FixedWindow,
    ordering: CallOrdering,
    serial: Arc<Mutex<()>>,
    outcomes: Counter<u64>,
}

impl fmt::Debug for ThrottledClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottledClient")
            .field("gate", &self.gate)
            .field("ordering", &self.ordering)
            .finish_non_exhaustive()
    }
}

impl ThrottledClient {
    /// Creates a client counting against the process-wide window.
    ///
    /// Every client created this way shares one budget, whatever quota each
    /// of them was given.
    pub fn new(quota: Quota, config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_shared_window(quota, SharedWindow::global(), config)
    }

    /// Creates a client allowing `max_requests` per `interval_value` `unit`s.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Quota`] if either number is not positive.
    pub fn with_interval(
        unit: TimeUnit,
        interval_value: i64,
        max_requests: i64,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        Self::new(Quota::new(unit, interval_value, max_requests)?, config)
    }

    /// Creates a client allowing `max_requests` per single `unit`.
    pub fn per_unit(
        unit: TimeUnit,
        max_requests: i64,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        Self::with_interval(unit, 1, max_requests, config)
    }

    /// Creates a client counting against `window`.
    ///
    /// Clients given the same window share one budget; a fresh window gives
    /// the client a budget of its own.
    pub fn with_shared_window(
        quota: Quota,
        window: Arc<SharedWindow>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let executor = HttpExecutor::new(&config)?;
        let gate = FixedWindow::with_shared(quota, window);

        tracing::info!(
            endpoint = %executor.endpoint(),
            window_ms = quota.window().as_millis() as u64,
            max_requests = quota.max_requests().get(),
            ordering = ?config.ordering,
            "throttled client created"
        );

        Ok(Self::from_service(gate, executor, config.ordering))
    }

    /// Wraps any executor service in admission control.
    pub fn from_service<S>(gate: FixedWindow, executor: S, ordering: CallOrdering) -> Self
    where
        S: Service<Envelope, Response = u16, Error = BoxError> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        let service = ServiceBuilder::new()
            .layer(AdmissionLayer::new(gate.clone()))
            .service(executor);

        Self {
            service: BoxCloneSyncService::new(service),
            gate,
            ordering,
            serial: Arc::new(Mutex::new(())),
            outcomes: global::meter("throttled_client")
                .u64_counter("submission_outcome")
                .build(),
        }
    }

    pub fn gate(&self) -> &FixedWindow {
        &self.gate
    }

    pub fn ordering(&self) -> CallOrdering {
        self.ordering
    }

    /// Waits for admission, sends `payload` once and returns the status code.
    ///
    /// Transport failures come back as synthesized codes (504, 502, 503, 500),
    /// never as errors. Identical payloads are not deduplicated: each call
    /// consumes its own slot.
    pub async fn submit(
        &self,
        payload: impl Into<Vec<u8>>,
        signature: impl Into<String>,
    ) -> Result<u16, ClientError> {
        self.dispatch(Envelope::new(payload, signature)).await
    }

    /// Like [`submit`](Self::submit), but abandons the submission as soon as
    /// `token` is cancelled, whether it is still waiting for admission or
    /// already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Cancelled`] if the token fires first.
    pub async fn submit_cancellable(
        &self,
        payload: impl Into<Vec<u8>>,
        signature: impl Into<String>,
        token: &CancellationToken,
    ) -> Result<u16, ClientError> {
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let envelope = Envelope::new(payload, signature);
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::warn!("submission cancelled");
                Err(ClientError::Cancelled)
            }
            result = self.dispatch(envelope) => result,
        }
    }

    /// Serializes `document` and submits it.
    ///
    /// Serialization happens before admission, so a document that cannot be
    /// encoded does not use up a slot.
    pub async fn submit_document(
        &self,
        document: &Document,
        signature: impl Into<String>,
    ) -> Result<u16, ClientError> {
        let payload = document::serialize(document).inspect_err(|e| {
            tracing::error!(error = %e, "document serialization failed, request not sent")
        })?;
        self.submit(payload, signature).await
    }

    async fn dispatch(&self, envelope: Envelope) -> Result<u16, ClientError> {
        let _serial = match self.ordering {
            CallOrdering::Serialized => Some(self.serial.lock().await),
            CallOrdering::Concurrent => None,
        };

        let mut service = self.service.clone();
        let status = service
            .ready()
            .await
            .map_err(ClientError::from_service)?
            .call(envelope)
            .await
            .map_err(ClientError::from_service)?;

        self.outcomes
            .add(1, &[KeyValue::new("status", i64::from(status))]);
        Ok(status)
    }
}
