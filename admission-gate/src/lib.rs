//! # admission-gate
//!
//! `admission-gate` paces outbound operations so that no more than a fixed
//! number of them start within any one window of time.
//!
//! ## Core Philosophy
//!
//! A single fixed-window counter, guarded by a short `Mutex` critical section,
//! is shared by every caller that must respect the same quota. Callers that
//! find the window full sleep until it elapses and then re-evaluate; the lock
//! is never held across a sleep.
//!
//! ## Key Concepts
//!
//! * **Quota**: an immutable `(window, max_requests)` pair, validated once.
//! * **Shared Window**: the `(window_start, admitted)` state. Gates built on
//!   the same [`SharedWindow`] draw from one budget.
//! * **Lazy Reset**: a window is only reopened by the next caller to look at
//!   it. There is no background timer.
//! * **Cancellation**: a waiter holding a `CancellationToken` stops waiting as
//!   soon as the token fires, without consuming a slot.
//!
//! ## Example
//!
//! ```rust
//! use admission_gate::FixedWindow;
//! use admission_gate::Quota;
//! use admission_gate::TimeUnit;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let quota = Quota::per_unit(TimeUnit::Seconds, 100).unwrap();
//! let gate = FixedWindow::new(quota);
//!
//! if gate.try_acquire().is_continue() {
//!     // Slot granted without waiting
//! }
//!
//! // Or wait for one
//! gate.acquire().await;
//! # }
//! ```

use std::time::Duration;

mod fixed_window;
mod quota;
mod shared;

pub use fixed_window::FixedWindow;
pub use quota::Quota;
pub use quota::QuotaError;
pub use quota::TimeUnit;
pub use shared::SharedWindow;

/// Reasons why a slot could not be granted immediately.
#[derive(Debug, PartialEq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}

/// Errors produced while waiting for admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The wait was cancelled before a slot was granted.
    #[error("admission wait was cancelled")]
    Cancelled,
}
