use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::AdmissionError;
use super::Quota;
use super::Reason;
use super::SharedWindow;

/// A fixed-window admission gate.
///
/// Time is divided into windows of `quota.window()`. A window opens lazily,
/// at the first evaluation after the previous one elapsed, and admits up to
/// `quota.max_requests()` callers. Up to twice that many admissions can land
/// in a short period spanning two windows.
///
/// Cloning a gate yields another handle on the same window state.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    quota: Quota,
    window: Arc<SharedWindow>,
}

impl FixedWindow {
    /// Creates a gate with its own private window.
    pub fn new(quota: Quota) -> Self {
        Self::with_shared(quota, Arc::new(SharedWindow::new()))
    }

    /// Creates a gate counting against `window`, which may be shared with
    /// other gates.
    pub fn with_shared(quota: Quota, window: Arc<SharedWindow>) -> Self {
        Self { quota, window }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn shared_window(&self) -> &Arc<SharedWindow> {
        &self.window
    }

    /// Evaluates the window once and consumes a slot if one is free.
    ///
    /// Never blocks. On `Break`, `retry_after` is the time left until the
    /// current window elapses.
    pub fn try_acquire(&self) -> ControlFlow<Reason> {
        let window = self.quota.window();
        let mut state = self.window.lock();

        let now = Instant::now();
        let mut elapsed = now.saturating_duration_since(state.start);
        if elapsed >= window {
            state.start = now;
            state.admitted = 0;
            elapsed = Duration::ZERO;
            tracing::debug!("admission window reset");
        }

        if state.admitted < self.quota.max_requests().get() {
            state.admitted += 1;
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(Reason::Overloaded {
                retry_after: window - elapsed,
            })
        }
    }

    /// Waits until a slot is free and consumes it.
    ///
    /// The window lock is released while sleeping. Every wakeup re-evaluates
    /// the window from scratch, so an early wakeup or a window that rolled
    /// over mid-wait is handled by the same loop.
    ///
    /// Dropping the returned future abandons the wait without consuming a slot.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                ControlFlow::Continue(()) => return,
                ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                    log_wait(retry_after);
                    sleep(retry_after).await;
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up as soon as `token` is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Cancelled`] if the token fires before a slot
    /// is granted. A cancelled caller never consumes a slot.
    pub async fn acquire_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<(), AdmissionError> {
        loop {
            if token.is_cancelled() {
                return Err(AdmissionError::Cancelled);
            }
            match self.try_acquire() {
                ControlFlow::Continue(()) => return Ok(()),
                ControlFlow::Break(Reason::Overloaded { retry_after }) => {
                    log_wait(retry_after);
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            tracing::debug!("admission wait cancelled");
                            return Err(AdmissionError::Cancelled);
                        }
                        _ = sleep(retry_after) => {}
                    }
                }
            }
        }
    }
}

fn log_wait(wait: Duration) {
    let secs = wait.as_secs();
    tracing::info!(
        minutes = secs / 60,
        seconds = secs % 60,
        millis = wait.subsec_millis(),
        total_ms = wait.as_millis() as u64,
        "request quota exhausted, waiting for the next window"
    );
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use more_asserts::assert_ge;
    use more_asserts::assert_lt;
    use tokio::task::JoinSet;
    use tokio::time::advance;
    use tokio::time::pause;

    use super::*;
    use crate::TimeUnit;

    fn gate(window: Duration, capacity: usize) -> FixedWindow {
        FixedWindow::new(
            Quota::from_duration(window, NonZeroUsize::new(capacity).unwrap()).unwrap(),
        )
    }

    #[test]
    fn it_enforces_limits() {
        let rl = gate(Duration::from_millis(10), 1);

        assert_eq!(rl.try_acquire(), ControlFlow::Continue(()));
        assert!(matches!(rl.try_acquire(), ControlFlow::Break(..)));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(rl.try_acquire(), ControlFlow::Continue(()));
    }

    #[tokio::test]
    async fn retry_after_is_time_left_in_window() {
        pause();
        let rl = gate(Duration::from_secs(1), 1);

        let _ = rl.try_acquire();
        advance(Duration::from_millis(300)).await;

        assert_eq!(
            rl.try_acquire(),
            ControlFlow::Break(Reason::Overloaded {
                retry_after: Duration::from_millis(700),
            })
        );
    }

    #[tokio::test]
    async fn test_idle_reset() {
        pause();
        let interval = Duration::from_millis(10);
        let rl = gate(interval, 1);

        let _ = rl.try_acquire();
        advance(interval * 5).await;

        // The next caller opens a fresh window rather than catching up.
        assert_eq!(rl.try_acquire(), ControlFlow::Continue(()));
        let state = *rl.window.lock();
        assert_eq!(state.admitted, 1);
        assert_eq!(state.start, Instant::now());
    }

    #[tokio::test]
    async fn test_actual_concurrency() {
        let capacity = 100;
        let rl = Arc::new(gate(Duration::from_secs(60), capacity));

        let mut handles = vec![];
        for _ in 0..capacity + 10 {
            let rl_clone = Arc::clone(&rl);
            handles.push(tokio::spawn(async move { rl_clone.try_acquire() }));
        }

        let results = futures::future::join_all(handles).await;
        let success_count = results
            .into_iter()
            .filter(|r| matches!(r, Ok(ControlFlow::Continue(()))))
            .count();

        assert_eq!(success_count, capacity);
    }

    #[tokio::test]
    async fn test_exact_window_boundary() {
        pause();
        let rl = gate(Duration::from_millis(50), 1);

        let _ = rl.try_acquire();

        advance(Duration::from_millis(49)).await;
        assert!(matches!(rl.try_acquire(), ControlFlow::Break(..)));

        advance(Duration::from_millis(1)).await;
        assert_eq!(rl.try_acquire(), ControlFlow::Continue(()));
    }

    #[tokio::test]
    async fn acquire_does_not_wait_below_capacity() {
        pause();
        let rl = gate(Duration::from_secs(1), 3);
        let start = Instant::now();

        for _ in 0..3 {
            rl.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn paces_six_callers_over_three_windows() {
        pause();
        let rl = gate(Duration::from_secs(1), 2);
        let start = Instant::now();

        let mut tasks = JoinSet::new();
        for _ in 0..6 {
            let rl = rl.clone();
            tasks.spawn(async move {
                rl.acquire().await;
                start.elapsed()
            });
        }

        let mut admitted_at = tasks.join_all().await;
        admitted_at.sort();

        let windows: Vec<u64> = admitted_at.iter().map(|d| d.as_secs()).collect();
        assert_eq!(windows, vec![0, 0, 1, 1, 2, 2]);
        assert_ge!(admitted_at[5], Duration::from_secs(2));
    }

    #[tokio::test]
    async fn boundary_straddle_admits_twice_capacity() {
        pause();
        let rl = gate(Duration::from_secs(1), 2);
        let start = Instant::now();

        // One early admission opens the window, then the rest of its budget
        // is spent just before it closes.
        assert!(rl.try_acquire().is_continue());
        advance(Duration::from_millis(950)).await;
        assert!(rl.try_acquire().is_continue());
        assert!(rl.try_acquire().is_break());

        advance(Duration::from_millis(50)).await;
        assert!(rl.try_acquire().is_continue());
        assert!(rl.try_acquire().is_continue());
        assert!(rl.try_acquire().is_break());

        // Three admissions inside 50ms, four inside a single window length.
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn gates_on_one_window_share_the_quota() {
        pause();
        let window = Arc::new(SharedWindow::new());
        let quota = Quota::per_unit(TimeUnit::Seconds, 2).unwrap();
        let a = FixedWindow::with_shared(quota, Arc::clone(&window));
        let b = FixedWindow::with_shared(quota, Arc::clone(&window));

        assert!(a.try_acquire().is_continue());
        assert!(b.try_acquire().is_continue());
        assert!(a.try_acquire().is_break());
        assert!(b.try_acquire().is_break());

        let independent = FixedWindow::new(quota);
        assert!(independent.try_acquire().is_continue());
    }

    #[tokio::test]
    async fn cancelled_waiter_consumes_nothing() {
        pause();
        let rl = gate(Duration::from_secs(10), 1);
        rl.acquire().await;

        let token = CancellationToken::new();
        let waiter = {
            let rl = rl.clone();
            let token = token.clone();
            tokio::spawn(async move { rl.acquire_cancellable(&token).await })
        };

        sleep(Duration::from_secs(1)).await;
        token.cancel();

        assert_eq!(waiter.await.unwrap(), Err(AdmissionError::Cancelled));
        assert_eq!(rl.window.lock().admitted, 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_is_rejected_immediately() {
        let rl = gate(Duration::from_secs(10), 5);
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(
            rl.acquire_cancellable(&token).await,
            Err(AdmissionError::Cancelled)
        );
        assert_eq!(rl.window.lock().admitted, 0);
    }

    #[tokio::test]
    async fn cancellable_acquire_waits_for_next_window() {
        pause();
        let rl = gate(Duration::from_secs(1), 1);
        let token = CancellationToken::new();
        let start = Instant::now();

        rl.acquire_cancellable(&token).await.unwrap();
        rl.acquire_cancellable(&token).await.unwrap();

        // Sleep deadlines are rounded up to the timer's millisecond tick
        assert_ge!(start.elapsed(), Duration::from_secs(1));
        assert_lt!(start.elapsed(), Duration::from_millis(1050));
    }
}
