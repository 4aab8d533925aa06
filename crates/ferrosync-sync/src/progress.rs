//! Progress reporting for synchronization runs
//!
//! Every classified unit of work produces one [`ProgressEvent::Status`]. The
//! event is logged through `tracing`, counted in the run's [`SyncReport`] and
//! sent over an unbounded channel to whoever renders it.

use chrono::{DateTime, Utc};
use ferrosync_types::{Direction, Error, TransferStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// Phases of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Run created
    Initializing,
    /// Opening the scan session
    Connecting,
    /// Listing both trees
    Scanning,
    /// Workers are draining the queues
    Transferring,
    /// Run finished
    Completed,
    /// Run aborted on a fatal error
    Failed,
}

/// Outcome counters and timing of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Run identifier
    pub request_id: uuid::Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock time of the run
    pub duration: Duration,
    /// Files found on the source side
    pub source_entries: usize,
    /// Files found on the destination side
    pub destination_entries: usize,
    /// Workers the scheduler ran
    pub workers: usize,
    /// New files written to the destination
    pub uploaded: u64,
    /// Destination files overwritten with a newer source
    pub replaced: u64,
    /// Files already in sync
    pub identical: u64,
    /// Files skipped because the destination is newer
    pub conflicts: u64,
    /// Destination-only files deleted
    pub obsolete: u64,
    /// Sources deleted after a transfer
    pub moved: u64,
    /// Units that failed
    pub errors: u64,
}

impl SyncReport {
    /// Empty report for a run starting now
    pub fn new(request_id: uuid::Uuid) -> Self {
        Self {
            request_id,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            source_entries: 0,
            destination_entries: 0,
            workers: 0,
            uploaded: 0,
            replaced: 0,
            identical: 0,
            conflicts: 0,
            obsolete: 0,
            moved: 0,
            errors: 0,
        }
    }

    /// Files written to the destination
    pub fn transferred(&self) -> u64 {
        self.uploaded + self.replaced
    }

    /// Whether the run changed nothing on either side
    pub fn is_noop(&self) -> bool {
        self.transferred() == 0 && self.obsolete == 0 && self.moved == 0
    }

    fn record(&mut self, status: TransferStatus) {
        match status {
            TransferStatus::Uploaded => self.uploaded += 1,
            TransferStatus::Replaced => self.replaced += 1,
            TransferStatus::Identical => self.identical += 1,
            TransferStatus::Obsolete => self.obsolete += 1,
            TransferStatus::Error => self.errors += 1,
            TransferStatus::Info | TransferStatus::Warn => {}
        }
    }
}

/// Events sent to the progress channel
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Phase changed
    PhaseChanged(SyncPhase),
    /// Both trees have been listed
    Scanned {
        /// Files on the source side
        source: usize,
        /// Files on the destination side
        destination: usize,
    },
    /// One status line
    Status {
        /// Status of the line
        status: TransferStatus,
        /// Direction of the run, picks the symbol
        direction: Direction,
        /// Root-relative path, or a free-form message for info lines
        message: String,
        /// Reply code of a failed remote call
        code: Option<u16>,
    },
    /// Run finished
    Completed(SyncReport),
    /// Run aborted
    Failed(String),
}

/// Progress reporter for one run
///
/// Clones share counters and the channel; only the original can hand out
/// the receiver.
#[derive(Debug)]
pub struct ProgressReporter {
    direction: Direction,
    started: Instant,
    report: Arc<RwLock<SyncReport>>,
    event_tx: mpsc::UnboundedSender<ProgressEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
}

impl ProgressReporter {
    /// Create a reporter for a run in `direction`
    pub fn new(request_id: uuid::Uuid, direction: Direction) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            direction,
            started: Instant::now(),
            report: Arc::new(RwLock::new(SyncReport::new(request_id))),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressEvent>> {
        self.event_rx.take()
    }

    /// Current counters
    pub async fn snapshot(&self) -> SyncReport {
        let mut report = self.report.read().await.clone();
        report.duration = self.started.elapsed();
        report
    }

    /// Enter a new phase
    pub fn set_phase(&self, phase: SyncPhase) {
        debug!("Sync phase changed to: {:?}", phase);
        self.send(ProgressEvent::PhaseChanged(phase));
    }

    /// Record the size of both trees
    pub async fn scanned(&self, source: usize, destination: usize) {
        {
            let mut report = self.report.write().await;
            report.source_entries = source;
            report.destination_entries = destination;
        }
        let verb = match self.direction {
            Direction::Upload => "upload",
            Direction::Download => "download",
        };
        self.info(format!("{source} files to {verb}"));
        self.send(ProgressEvent::Scanned {
            source,
            destination,
        });
    }

    /// Record the worker pool width
    pub async fn workers(&self, workers: usize) {
        self.report.write().await.workers = workers;
    }

    /// A new file reached the destination
    pub async fn uploaded(&self, path: &str) {
        info!(path, "uploaded");
        self.status(TransferStatus::Uploaded, path, None).await;
    }

    /// A newer source overwrote the destination
    pub async fn replaced(&self, path: &str) {
        info!(path, "replaced");
        self.status(TransferStatus::Replaced, path, None).await;
    }

    /// Both sides match
    pub async fn identical(&self, path: &str) {
        debug!(path, "identical");
        self.status(TransferStatus::Identical, path, None).await;
    }

    /// A destination-only file was deleted
    pub async fn obsolete(&self, path: &str) {
        info!(path, "obsolete");
        self.status(TransferStatus::Obsolete, path, None).await;
    }

    /// The destination is newer than the source; nothing was done
    pub async fn conflict(&self, path: &str) {
        warn!(path, "destination is newer than source, skipped");
        self.report.write().await.conflicts += 1;
        self.send_status(TransferStatus::Warn, format!("{path} (destination is newer)"), None);
    }

    /// The source of a transferred file was deleted
    pub async fn moved(&self, path: &str) {
        debug!(path, "source removed after transfer");
        self.report.write().await.moved += 1;
    }

    /// A unit of work failed
    pub async fn error(&self, path: &str, err: &Error) {
        let code = err.protocol_code();
        error!(path, code, "{}", err);
        self.status(TransferStatus::Error, path, code).await;
    }

    /// Informational line
    pub fn info<S: Into<String>>(&self, message: S) {
        let message = message.into();
        info!("{}", message);
        self.send_status(TransferStatus::Info, message, None);
    }

    /// Finish the run and return its report
    pub async fn completed(&self) -> SyncReport {
        self.set_phase(SyncPhase::Completed);
        let report = self.snapshot().await;
        info!(
            request_id = %report.request_id,
            uploaded = report.uploaded,
            replaced = report.replaced,
            identical = report.identical,
            obsolete = report.obsolete,
            errors = report.errors,
            "Sync completed in {:?}",
            report.duration
        );
        self.send(ProgressEvent::Completed(report.clone()));
        report
    }

    /// Abort the run
    pub fn failed(&self, err: &Error) {
        error!("Sync failed: {}", err);
        self.set_phase(SyncPhase::Failed);
        self.send(ProgressEvent::Failed(err.to_string()));
    }

    async fn status(&self, status: TransferStatus, path: &str, code: Option<u16>) {
        self.report.write().await.record(status);
        self.send_status(status, path.to_string(), code);
    }

    fn send_status(&self, status: TransferStatus, message: String, code: Option<u16>) {
        self.send(ProgressEvent::Status {
            status,
            direction: self.direction,
            message,
            code,
        });
    }

    fn send(&self, event: ProgressEvent) {
        // Nobody listening is fine; tracing already has the line.
        let _ = self.event_tx.send(event);
    }
}

impl Clone for ProgressReporter {
    fn clone(&self) -> Self {
        Self {
            direction: self.direction,
            started: self.started,
            report: Arc::clone(&self.report),
            event_tx: self.event_tx.clone(),
            event_rx: None, // Clone doesn't get the receiver
        }
    }
}
