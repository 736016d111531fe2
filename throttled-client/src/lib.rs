//! # Throttled Client
//!
//! `throttled-client` submits payloads to a single HTTP endpoint while
//! guaranteeing that no more than a configured number of calls leave the
//! process per window, however many tasks submit at once.
//!
//! ## The Stack
//! A [`ThrottledClient`] is a [Tower](https://github.com/tower-rs/tower)
//! pipeline of two pieces:
//!
//! 1. **Admission**: [`AdmissionLayer`] holds each request in `poll_ready`
//!    until the shared [`admission_gate::FixedWindow`] grants it a slot.
//! 2. **Execution**: [`HttpExecutor`] sends exactly one POST and folds every
//!    outcome into a status code. Upstream codes pass through verbatim;
//!    timeouts become 504, refused connections 502, other I/O failures 503
//!    and anything unclassified 500.
//!
//! Only cancellation surfaces as an error ([`ClientError::Cancelled`]).
//!
//! ## Sharing a Quota
//! Clients built with [`ThrottledClient::new`] all count against the
//! process-wide window. Pass an explicit `Arc<SharedWindow>` to
//! [`ThrottledClient::with_shared_window`] to choose which clients share.
//!
//! ## Call Ordering
//! By default a slot is reserved and the call runs outside any lock, so up to
//! `max_requests` calls can be in flight together. [`CallOrdering::Serialized`]
//! instead keeps one client-wide lock from admission until the response, so
//! calls leave strictly one at a time.

mod client;
mod config;
pub mod document;
mod error;
mod executor;
mod layer;
mod service;


pub use admission_gate::Quota;
pub use admission_gate::SharedWindow;
pub use admission_gate::TimeUnit;
pub use client::ThrottledClient;
pub use config::CallOrdering;
pub use config::ClientConfig;
pub use error::ClientError;
pub use executor::Envelope;
pub use executor::HttpExecutor;
pub use executor::SIGNATURE_HEADER;
pub use layer::AdmissionLayer;
pub use service::AdmissionService;
