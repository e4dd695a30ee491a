//! Clock trait so that lease expiry, backoff, and monitor-window logic can be
//! driven deterministically from tests instead of sleeping in real time.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Controls this crate's view of time.
///
/// Production code uses [`SystemClock`]. Tests that need to assert on lease
/// expiry, retrain jitter, or backoff sequencing should supply a fake that
/// returns controlled values instead of sleeping. Object-safe so it can be
/// shared as `Arc<dyn Clock>` across detector/dispatcher tasks.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for the given duration, or return immediately in a fake clock
    /// driven by a test harness.
    async fn sleep(&self, duration: Duration);
}

/// The default clock, backed by the system wall clock and `tokio::time`.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

#[cfg(test)]
pub mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// A clock with a manually-advanced `now()` and a no-op sleep, for
    /// deterministic unit tests.
    pub struct FakeClock(Mutex<DateTime<Utc>>);

    impl FakeClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self(Mutex::new(start))
        }

        pub fn advance(&self, duration: Duration) {
            let mut guard = self.0.lock().unwrap();
            *guard += chrono::Duration::from_std(duration).unwrap();
        }
    }

    #[async_trait::async_trait]
    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }

        async fn sleep(&self, _duration: Duration) {}
    }
}
