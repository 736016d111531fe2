use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;

use tokio::time::Instant;

/// Window bookkeeping: when the current window began and how many
/// admissions it has granted so far.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WindowState {
    pub(crate) start: Instant,
    pub(crate) admitted: usize,
}

/// Window state shared between every gate that must honour one quota.
///
/// Hand the same `Arc<SharedWindow>` to each [`FixedWindow`](crate::FixedWindow)
/// that should count against a common budget. The state is only ever touched
/// from inside a gate's critical section.
#[derive(Debug)]
pub struct SharedWindow {
    state: Mutex<WindowState>,
}

static GLOBAL: OnceLock<Arc<SharedWindow>> = OnceLock::new();

impl SharedWindow {
    /// Creates a fresh window starting now with nothing admitted.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WindowState {
                start: Instant::now(),
                admitted: 0,
            }),
        }
    }

    /// The process-wide window.
    ///
    /// Every caller gets the same instance, so gates built on it share one
    /// quota no matter how many clients exist.
    pub fn global() -> Arc<SharedWindow> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SharedWindow::new())))
    }

    // The critical section never panics, so a poisoned lock still holds
    // consistent state.
    pub(crate) fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_starts_empty() {
        let window = SharedWindow::new();
        assert_eq!(window.lock().admitted, 0);
    }

    #[test]
    fn global_is_a_single_instance() {
        let a = SharedWindow::global();
        let b = SharedWindow::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
