//! The single cancellation signal a task/series processing loop observes
//! (§4.6, §5). Named for what it does rather than the teacher's
//! `ShutdownFlag`/`ShutdownGuard`, since "shutdown" reads wrong for a
//! per-task signal in a process that otherwise keeps running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Shared {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Idempotent, clonable cancellation signal. Closing it is a one-shot
/// transition; every clone observes the same state.
#[derive(Clone)]
pub struct CancellationHandle(Arc<Shared>);

impl CancellationHandle {
    pub fn new() -> Self {
        Self(Arc::new(Shared {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }))
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }

    /// Resolves immediately if already cancelled; otherwise waits for
    /// `cancel()`. Checks before *and* after subscribing to avoid missing a
    /// `cancel()` that races the check: `enable()` registers this waiter
    /// with `Notify` before the second check runs, so a `notify_waiters()`
    /// landing in between is not lost (the tokio-documented pattern for
    /// `Notify::notified()` used against `notify_waiters`).
    pub async fn wait(&self) {
        if self.is_cancelled() {
            return;
        }

        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_cancelled() {
            return;
        }

        notified.await;
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels its handle on drop unless it was already cancelled, so a task
/// loop that exits via `?` or panic still closes the handle exactly once
/// (§3 invariant: "Cancel is terminal and closes the cancellation handle
/// exactly once").
pub struct CancellationGuard<'a>(&'a CancellationHandle);

impl<'a> CancellationGuard<'a> {
    pub fn new(handle: &'a CancellationHandle) -> Self {
        Self(handle)
    }
}

impl Drop for CancellationGuard<'_> {
    fn drop(&mut self) {
        if !self.0.is_cancelled() {
            tracing::warn!("processing loop exiting without cancellation handle being closed");
        }
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_immediately_if_already_cancelled() {
        let handle = CancellationHandle::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(50), handle.wait())
            .await
            .expect("wait should not block");
    }

    #[tokio::test]
    async fn wait_resolves_once_cancel_is_called_from_elsewhere() {
        let handle = CancellationHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move { waiter.wait().await });
        tokio::task::yield_now().await;
        handle.cancel();

        tokio::time::timeout(Duration::from_millis(200), task)
            .await
            .expect("wait should resolve after cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn guard_closes_handle_on_drop() {
        let handle = CancellationHandle::new();
        {
            let _guard = CancellationGuard::new(&handle);
        }
        assert!(handle.is_cancelled());
    }
}
