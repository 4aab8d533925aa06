//! Connection admission control
//!
//! A counting semaphore with a FIFO wait queue. Every remote session is
//! opened under a [`ConnectionLease`]; when the ceiling is reached, callers
//! wait in arrival order and give up after their timeout.

use ferrosync_types::{ConnectionLimit, Error, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Default time a caller waits for a lease
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// A queued caller
struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
    enqueued_at: Instant,
}

#[derive(Default)]
struct AdmissionState {
    active: usize,
    waiters: VecDeque<Waiter>,
}

/// Gate bounding how many remote sessions may be open at once
///
/// The controller is shared through an `Arc`; leases keep it alive until
/// they are released.
pub struct AdmissionController {
    max_connections: usize,
    next_waiter: AtomicU64,
    // Released from `Drop`, so this cannot be an async mutex.
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    /// Create a controller admitting at most `limit` sessions
    pub fn new(limit: ConnectionLimit) -> Self {
        Self {
            max_connections: limit.get(),
            next_waiter: AtomicU64::new(0),
            state: Mutex::new(AdmissionState::default()),
        }
    }

    /// Create a controller ready to be shared between runs
    pub fn shared(limit: ConnectionLimit) -> Arc<Self> {
        Arc::new(Self::new(limit))
    }

    /// Ceiling on concurrently admitted sessions
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of leases currently held
    pub fn active_connections(&self) -> usize {
        self.state().active
    }

    /// Number of callers waiting for a lease
    pub fn queue_length(&self) -> usize {
        self.state().waiters.len()
    }

    /// Obtain a lease, waiting at most `timeout` when the ceiling is reached
    ///
    /// Waiters are served strictly in arrival order. A caller that times out
    /// leaves the queue and gets [`Error::Timeout`].
    pub async fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<ConnectionLease> {
        let (id, mut granted) = {
            let mut state = self.state();
            if state.active < self.max_connections {
                state.active += 1;
                trace!(active = state.active, "Connection admitted");
                return Ok(ConnectionLease::new(Arc::clone(self)));
            }

            let (grant, granted) = oneshot::channel();
            let id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
            state.waiters.push_back(Waiter {
                id,
                grant,
                enqueued_at: Instant::now(),
            });
            debug!(
                active = state.active,
                queued = state.waiters.len(),
                "Connection ceiling reached, waiting for a lease"
            );
            (id, granted)
        };

        match tokio::time::timeout(timeout, &mut granted).await {
            Ok(Ok(())) => Ok(ConnectionLease::new(Arc::clone(self))),
            Ok(Err(_)) => Err(Error::other("admission controller dropped a queued caller")),
            Err(_) => {
                let mut state = self.state();
                if let Some(position) = state.waiters.iter().position(|w| w.id == id) {
                    state.waiters.remove(position);
                    drop(state);
                    warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "Server busy, no connection lease became available"
                    );
                    return Err(Error::timeout("connection lease", timeout));
                }
                drop(state);

                // The grant raced the deadline; it is ours.
                match granted.try_recv() {
                    Ok(()) => Ok(ConnectionLease::new(Arc::clone(self))),
                    Err(_) => Err(Error::timeout("connection lease", timeout)),
                }
            }
        }
    }

    fn release(&self) {
        let mut state = self.state();
        state.active = state.active.saturating_sub(1);

        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.grant.send(()).is_ok() {
                state.active += 1;
                debug!(
                    waited_ms = waiter.enqueued_at.elapsed().as_millis() as u64,
                    queued = state.waiters.len(),
                    "Lease handed to queued caller"
                );
                return;
            }
            trace!("Skipping abandoned waiter");
        }

        trace!(active = state.active, "Connection released");
    }

    fn state(&self) -> MutexGuard<'_, AdmissionState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(ConnectionLimit::default())
    }
}

impl fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("AdmissionController")
            .field("max_connections", &self.max_connections)
            .field("active", &state.active)
            .field("queued", &state.waiters.len())
            .finish()
    }
}

/// Permit for one open remote session
///
/// Released exactly once, when dropped.
#[must_use = "the lease is released as soon as it is dropped"]
pub struct ConnectionLease {
    controller: Arc<AdmissionController>,
}

impl ConnectionLease {
    fn new(controller: Arc<AdmissionController>) -> Self {
        Self { controller }
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.controller.release();
    }
}

impl fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionLease").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrosync_types::ErrorKind;

    fn controller(limit: usize) -> Arc<AdmissionController> {
        AdmissionController::shared(ConnectionLimit::new(limit).unwrap())
    }

    async fn wait_for_queue(controller: &AdmissionController, len: usize) {
        while controller.queue_length() != len {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let controller = controller(2);

        let first = controller.acquire(DEFAULT_ACQUIRE_TIMEOUT).await.unwrap();
        let second = controller.acquire(DEFAULT_ACQUIRE_TIMEOUT).await.unwrap();
        assert_eq!(controller.active_connections(), 2);
        assert_eq!(controller.queue_length(), 0);

        drop(first);
        assert_eq!(controller.active_connections(), 1);
        drop(second);
        assert_eq!(controller.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_waiters_are_granted_in_arrival_order() {
        let controller = controller(1);
        let held = controller.acquire(DEFAULT_ACQUIRE_TIMEOUT).await.unwrap();
        let (order_tx, mut order_rx) = tokio::sync::mpsc::unbounded_channel();

        let mut tasks = Vec::new();
        for name in ["first", "second", "third"] {
            let queued = controller.queue_length();
            let waiter = Arc::clone(&controller);
            let order_tx = order_tx.clone();
            tasks.push(tokio::spawn(async move {
                let lease = waiter.acquire(DEFAULT_ACQUIRE_TIMEOUT).await.unwrap();
                order_tx.send(name).unwrap();
                drop(lease);
            }));
            wait_for_queue(&controller, queued + 1).await;
        }

        drop(held);
        for task in tasks {
            task.await.unwrap();
        }

        let mut order = Vec::new();
        while let Ok(name) = order_rx.try_recv() {
            order.push(name);
        }
        assert_eq!(order, vec!["first", "second", "third"]);
        assert_eq!(controller.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_timeout_leaves_queue() {
        let controller = controller(1);
        let _held = controller.acquire(DEFAULT_ACQUIRE_TIMEOUT).await.unwrap();

        let error = controller
            .acquire(Duration::from_millis(20))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(error.is_fatal());
        assert_eq!(controller.queue_length(), 0);
        assert_eq!(controller.active_connections(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_is_skipped() {
        let controller = controller(1);
        let held = controller.acquire(DEFAULT_ACQUIRE_TIMEOUT).await.unwrap();

        let abandoned = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.acquire(DEFAULT_ACQUIRE_TIMEOUT).await })
        };
        wait_for_queue(&controller, 1).await;
        abandoned.abort();
        let _ = abandoned.await;

        drop(held);
        assert_eq!(controller.queue_length(), 0);
        assert_eq!(controller.active_connections(), 0);

        let _lease = controller.acquire(Duration::from_millis(20)).await.unwrap();
        assert_eq!(controller.active_connections(), 1);
    }

    #[test]
    fn test_release_never_goes_negative() {
        let controller = AdmissionController::default();
        controller.release();
        controller.release();
        assert_eq!(controller.active_connections(), 0);
        assert_eq!(controller.max_connections(), 50);
    }
}
