//! Concurrency testing utilities
//!
//! [`CountingConnector`] wraps another connector and records how many
//! sessions are open at once, so tests can check that a run never exceeds
//! its connection ceiling.

use async_trait::async_trait;
use ferrosync_network::{Connector, Credentials, RemoteEntry, RemoteSession};
use ferrosync_types::Result;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Session counters shared between a connector and its sessions
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Sessions currently open
    pub open: AtomicUsize,
    /// Most sessions ever open at once
    pub peak: AtomicUsize,
    /// Sessions opened in total
    pub total: AtomicUsize,
}

impl SessionMetrics {
    fn opened(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    /// Most sessions ever open at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Sessions currently open
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Sessions opened in total
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Connector counting the sessions it hands out
pub struct CountingConnector<C> {
    inner: C,
    metrics: Arc<SessionMetrics>,
    transfer_delay: Duration,
}

impl<C: Connector> CountingConnector<C> {
    /// Wrap `inner`
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            metrics: Arc::new(SessionMetrics::default()),
            transfer_delay: Duration::ZERO,
        }
    }

    /// Stall every upload and download by `delay`, so sessions overlap
    pub fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = delay;
        self
    }

    /// Counters for this connector's sessions
    pub fn metrics(&self) -> Arc<SessionMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[async_trait]
impl<C: Connector> Connector for CountingConnector<C> {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteSession>> {
        let inner = self.inner.connect(credentials).await?;
        self.metrics.opened();
        Ok(Box::new(CountingSession {
            inner,
            metrics: Arc::clone(&self.metrics),
            transfer_delay: self.transfer_delay,
            open: true,
        }))
    }
}

struct CountingSession {
    inner: Box<dyn RemoteSession>,
    metrics: Arc<SessionMetrics>,
    transfer_delay: Duration,
    open: bool,
}

impl CountingSession {
    /// Owns a copy of the delay so the future stays `Send`
    fn stall(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let delay = self.transfer_delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn release(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            self.metrics.closed();
        }
    }
}

impl Drop for CountingSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl RemoteSession for CountingSession {
    async fn change_directory(&mut self, path: &str) -> Result<()> {
        self.inner.change_directory(path).await
    }

    async fn change_to_parent(&mut self) -> Result<()> {
        self.inner.change_to_parent().await
    }

    fn working_directory(&self) -> &str {
        self.inner.working_directory()
    }

    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.inner.list(path).await
    }

    async fn ensure_directory(&mut self, path: &str) -> Result<()> {
        self.inner.ensure_directory(path).await
    }

    async fn remove_empty_directory(&mut self, path: &str) -> Result<()> {
        self.inner.remove_empty_directory(path).await
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<()> {
        self.stall().await;
        self.inner.upload(local, remote).await
    }

    async fn download(&mut self, local: &Path, remote: &str) -> Result<()> {
        self.stall().await;
        self.inner.download(local, remote).await
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        self.inner.remove(path).await
    }

    async fn set_modified(&mut self, path: &str, modified_at: SystemTime) -> Result<()> {
        self.inner.set_modified(path, modified_at).await
    }

    async fn close(&mut self) -> Result<()> {
        self.release();
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrosync_network::MountedConnector;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_counts_open_and_peak_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let connector = CountingConnector::new(MountedConnector::new(temp_dir.path()));
        let metrics = connector.metrics();
        let credentials = Credentials::default();

        let mut first = connector.connect(&credentials).await.unwrap();
        let second = connector.connect(&credentials).await.unwrap();
        assert_eq!(metrics.open(), 2);

        first.close().await.unwrap();
        drop(second);
        assert_eq!(metrics.open(), 0);
        assert_eq!(metrics.peak(), 2);
        assert_eq!(metrics.total(), 2);
    }
}
