use std::num::NonZeroUsize;
use std::time::Duration;

/// Unit in which a window length is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Converts `value` units into a [`Duration`], or `None` on overflow.
    pub fn to_duration(self, value: u64) -> Option<Duration> {
        match self {
            TimeUnit::Nanoseconds => Some(Duration::from_nanos(value)),
            TimeUnit::Microseconds => Some(Duration::from_micros(value)),
            TimeUnit::Milliseconds => Some(Duration::from_millis(value)),
            TimeUnit::Seconds => Some(Duration::from_secs(value)),
            TimeUnit::Minutes => value.checked_mul(60).map(Duration::from_secs),
            TimeUnit::Hours => value.checked_mul(3_600).map(Duration::from_secs),
            TimeUnit::Days => value.checked_mul(86_400).map(Duration::from_secs),
        }
    }
}

/// Reasons a [`Quota`] could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// The interval value or the request limit was zero or negative.
    #[error(
        "interval value and request limit must be positive; got interval value {interval_value}, request limit {max_requests}"
    )]
    NonPositive {
        interval_value: i64,
        max_requests: i64,
    },

    /// The window length resolved to zero.
    #[error("window duration must be non-zero")]
    ZeroWindow,

    /// The window length does not fit in a `Duration`.
    #[error("window of {value} {unit:?} is too large")]
    WindowOverflow { value: i64, unit: TimeUnit },

    /// The request limit does not fit in a `usize` on this platform.
    #[error("request limit {0} is too large")]
    LimitOverflow(i64),
}

/// An immutable `(window, max_requests)` pair.
///
/// At most `max_requests` admissions are granted per window. Both values are
/// strictly positive; every constructor rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    window: Duration,
    max_requests: NonZeroUsize,
}

impl Quota {
    /// Creates a quota of `max_requests` per `interval_value` `unit`s.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::NonPositive`] if either number is `<= 0`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use admission_gate::{Quota, TimeUnit};
    /// use std::time::Duration;
    ///
    /// let quota = Quota::new(TimeUnit::Seconds, 3, 10).unwrap();
    /// assert_eq!(quota.window(), Duration::from_secs(3));
    /// assert_eq!(quota.max_requests().get(), 10);
    ///
    /// assert!(Quota::new(TimeUnit::Seconds, 0, 10).is_err());
    /// ```
    pub fn new(unit: TimeUnit, interval_value: i64, max_requests: i64) -> Result<Self, QuotaError> {
        if interval_value <= 0 || max_requests <= 0 {
            return Err(QuotaError::NonPositive {
                interval_value,
                max_requests,
            });
        }

        let window = unit
            .to_duration(interval_value as u64)
            .ok_or(QuotaError::WindowOverflow {
                value: interval_value,
                unit,
            })?;
        let max_requests = usize::try_from(max_requests)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(QuotaError::LimitOverflow(max_requests))?;

        Ok(Self {
            window,
            max_requests,
        })
    }

    /// `max_requests` per single `unit`.
    pub fn per_unit(unit: TimeUnit, max_requests: i64) -> Result<Self, QuotaError> {
        Self::new(unit, 1, max_requests)
    }

    /// `max_requests` per `seconds` seconds.
    pub fn per_seconds(seconds: i64, max_requests: i64) -> Result<Self, QuotaError> {
        Self::new(TimeUnit::Seconds, seconds, max_requests)
    }

    /// Builds a quota from an already typed window and limit.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::ZeroWindow`] if `window` is zero.
    pub fn from_duration(window: Duration, max_requests: NonZeroUsize) -> Result<Self, QuotaError> {
        if window.is_zero() {
            return Err(QuotaError::ZeroWindow);
        }
        Ok(Self {
            window,
            max_requests,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> NonZeroUsize {
        self.max_requests
    }
}
