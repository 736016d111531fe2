use admission_gate::FixedWindow;
use tower::Layer;

use crate::service::AdmissionService;

/// Applies admission control to requests.
///
/// Every service produced by one layer draws from the same gate.
#[derive(Debug, Clone)]
pub struct AdmissionLayer {
    gate: FixedWindow,
}

impl AdmissionLayer {
    /// Create an AdmissionLayer
    pub fn new(gate: FixedWindow) -> Self {
        AdmissionLayer { gate }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AdmissionService::new(service, self.gate.clone())
    }
}
