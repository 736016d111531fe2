use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use admission_gate::FixedWindow;
use admission_gate::Reason;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use tokio::time::Sleep;
use tokio::time::sleep;
use tower::BoxError;
use tower::Service;

#[derive(Clone, Debug)]
struct AdmissionServiceMetrics {
    admission_wait: Counter<u64>,
    early_wake: Counter<u64>,
}

/// Holds every request until the gate grants it a slot.
///
/// `poll_ready` consumes one slot from the [`FixedWindow`], sleeping for the
/// remainder of the window whenever it is full. `call` forwards to the inner
/// service and releases the slot to that one request.
#[derive(Debug)]
pub struct AdmissionService<S> {
    inner: S,
    gate: FixedWindow,
    sleep: Option<Pin<Box<Sleep>>>,
    permit_acquired: bool,
    instruments: AdmissionServiceMetrics,
}

// Manually implement Clone because Pin<Box<Sleep>> cannot be cloned
impl<S> Clone for AdmissionService<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
            // A clone starts without a slot of its own
            sleep: None,
            permit_acquired: false,
            instruments: self.instruments.clone(),
        }
    }
}

impl<S, Req> Service<Req> for AdmissionService<S>
where
    S: Service<Req, Error = BoxError>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // 1. If we are currently sleeping, check if we're done
        if let Some(ref mut fut) = self.sleep {
            match fut.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    self.sleep = None;
                }
                Poll::Pending => {
                    self.instruments.early_wake.add(1, &[]);
                    return Poll::Pending;
                }
            }
        }

        // 2. Check inner service readiness FIRST to avoid over-consuming slots
        match self.inner.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }

        // 3. Ask the gate if we don't have a slot yet
        if !self.permit_acquired {
            match self.gate.try_acquire() {
                ControlFlow::Continue(()) => {
                    self.permit_acquired = true;
                }
                ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                    self.instruments.admission_wait.add(1, &[]);
                    tracing::info!(
                        wait_ms = retry_after.as_millis() as u64,
                        "request quota exhausted, waiting for the next window"
                    );

                    let mut sleep_fut = Box::pin(sleep(retry_after));
                    match sleep_fut.as_mut().poll(cx) {
                        Poll::Pending => {
                            self.sleep = Some(sleep_fut);
                        }
                        Poll::Ready(()) => {
                            // Already due; re-evaluate on the next poll
                            cx.waker().wake_by_ref();
                        }
                    }
                    return Poll::Pending;
                }
            }
        }

        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.permit_acquired = false;
        self.inner.call(req)
    }
}

impl<S> AdmissionService<S> {
    pub fn new(inner: S, gate: FixedWindow) -> Self {
        let meter = global::meter("admission_service");
        let instruments = AdmissionServiceMetrics {
            admission_wait: meter.u64_counter("admission_wait").build(),
            early_wake: meter.u64_counter("early_wake").build(),
        };

        Self {
            inner,
            gate,
            sleep: None,
            permit_acquired: false,
            instruments,
        }
    }

    pub fn gate(&self) -> &FixedWindow {
        &self.gate
    }
}
