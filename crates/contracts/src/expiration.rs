//! ExpirationDate - absolute deadline after which a message is not worth sending

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Milliseconds shaved off a deadline handed to a downstream dependency.
pub const SLIP_TIME_MS: i64 = 50;

/// Absolute wall-clock deadline.
///
/// Immutable value: every adjustment returns a new `ExpirationDate`.
/// Arithmetic saturates at the representable extremes instead of panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExpirationDate(DateTime<Utc>);

impl ExpirationDate {
    /// Deadline `timeout` from now.
    pub fn expires_in(timeout: Duration) -> Self {
        let delta = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        Self::now_plus(delta)
    }

    /// Deadline `timeout_ms` milliseconds from now. Negative values yield an
    /// already expired deadline.
    pub fn expires_in_ms(timeout_ms: i64) -> Self {
        let delta = TimeDelta::try_milliseconds(timeout_ms).unwrap_or(if timeout_ms < 0 {
            TimeDelta::MIN
        } else {
            TimeDelta::MAX
        });
        Self::now_plus(delta)
    }

    /// Deadline at the given instant.
    pub fn expires_at(deadline: DateTime<Utc>) -> Self {
        Self(deadline)
    }

    /// The absolute deadline.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.0
    }

    /// `true` once now >= deadline.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.0
    }

    /// Milliseconds until the deadline; negative once expired.
    pub fn remaining_ms(&self) -> i64 {
        self.0.signed_duration_since(Utc::now()).num_milliseconds()
    }

    /// Time until the deadline, or `None` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        let left = self.0.signed_duration_since(Utc::now());
        if left <= TimeDelta::zero() {
            return None;
        }
        left.to_std().ok()
    }

    /// Deadline moved [`SLIP_TIME_MS`] earlier.
    ///
    /// When A hands work carrying this deadline to B and both watch the same
    /// deadline asynchronously, B must give up first so that A never acts on a
    /// result B has already abandoned. B receives the slipped deadline.
    pub fn deduct_slip_time(&self) -> Self {
        let slip = TimeDelta::milliseconds(SLIP_TIME_MS);
        Self(self.0.checked_sub_signed(slip).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    fn now_plus(delta: TimeDelta) -> Self {
        let now = Utc::now();
        let deadline = now.checked_add_signed(delta).unwrap_or(if delta < TimeDelta::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        Self(deadline)
    }
}

impl From<SystemTime> for ExpirationDate {
    fn from(time: SystemTime) -> Self {
        Self(DateTime::<Utc>::from(time))
    }
}

impl From<DateTime<Utc>> for ExpirationDate {
    fn from(deadline: DateTime<Utc>) -> Self {
        Self(deadline)
    }
}

impl fmt::Display for ExpirationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
