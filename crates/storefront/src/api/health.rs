//! Debounced server-availability tracking.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Last known reachability of the backend.
///
/// A health check result is reused for `interval`; callers inside the window get the
/// cached answer without touching the network. Regular requests also feed
/// the flag through [`ServerAvailability::record`].
#[derive(Debug)]
pub struct ServerAvailability {
    interval: Duration,
    state: Mutex<CheckState>,
}

#[derive(Debug)]
struct CheckState {
    available: bool,
    checked_at: Option<Instant>,
}

impl ServerAvailability {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(CheckState {
                available: true,
                checked_at: None,
            }),
        }
    }

    /// Return the cached answer if it is recent, otherwise run `check`.
    ///
    /// The lock is held while checking so concurrent callers share one request.
    pub async fn check_with<F, Fut>(&self, check: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut state = self.state.lock().await;
        if let Some(checked_at) = state.checked_at
            && checked_at.elapsed() < self.interval
        {
            debug!(available = state.available, "Reusing server availability");
            return state.available;
        }

        let available = check().await;
        state.available = available;
        state.checked_at = Some(Instant::now());
        available
    }

    /// Record the outcome of a regular request.
    pub async fn record(&self, available: bool) {
        let mut state = self.state.lock().await;
        state.available = available;
        state.checked_at = Some(Instant::now());
    }

    /// Last known state, without checking.
    pub async fn is_available(&self) -> bool {
        self.state.lock().await.available
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_health_check_is_debounced() {
        let availability = ServerAvailability::new(Duration::from_secs(30));
        let checks = Arc::new(AtomicUsize::new(0));

        let check = || {
            let checks = Arc::clone(&checks);
            async move {
                checks.fetch_add(1, Ordering::SeqCst);
                false
            }
        };

        assert!(!availability.check_with(check).await);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!availability.check_with(check).await);
        assert_eq!(checks.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(!availability.check_with(check).await);
        assert_eq!(checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_refreshes_window() {
        let availability = ServerAvailability::new(Duration::from_secs(30));
        availability.record(false).await;
        assert!(!availability.is_available().await);
        // Recorded outcome counts as a fresh check
        assert!(!availability.check_with(|| async { true }).await);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(availability.check_with(|| async { true }).await);
    }
}
