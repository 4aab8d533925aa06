//! Bounded worker pool draining the sync queues

use crate::executor::TransferExecutor;
use crate::planner::{DiffPlanner, SyncQueues, WorkUnit};
use crate::progress::ProgressReporter;
use ferrosync_network::{AdmissionController, Connector, Credentials};
use ferrosync_types::{Error, Result, WorkerCount};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Configuration for the worker pool
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Most workers one run starts
    pub width: WorkerCount,
    /// How long a worker waits for a connection lease
    pub acquire_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            width: WorkerCount::default(),
            acquire_timeout: ferrosync_network::DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

/// Everything a worker shares with its siblings
struct WorkerContext {
    queues: Mutex<SyncQueues>,
    planner: DiffPlanner,
    executor: TransferExecutor,
    reporter: ProgressReporter,
    admission: Arc<AdmissionController>,
    connector: Arc<dyn Connector>,
    credentials: Credentials,
    acquire_timeout: Duration,
    stopped: AtomicBool,
}

/// Runs claimed units of work on a fixed set of workers
pub struct SyncScheduler {
    config: SchedulerConfig,
    admission: Arc<AdmissionController>,
    connector: Arc<dyn Connector>,
    credentials: Credentials,
}

impl SyncScheduler {
    /// Create a scheduler opening sessions through `connector`
    pub fn new(
        config: SchedulerConfig,
        admission: Arc<AdmissionController>,
        connector: Arc<dyn Connector>,
        credentials: Credentials,
    ) -> Self {
        Self {
            config,
            admission,
            connector,
            credentials,
        }
    }

    /// Number of workers started for `queues`
    pub fn worker_count(&self, queues: &SyncQueues) -> usize {
        self.config.width.effective(queues.estimate_units())
    }

    /// Drain `queues`, returning once every worker has exited
    ///
    /// Per-unit failures are reported and absorbed. A worker that cannot get
    /// a connection lease stops the run: the others finish their current
    /// unit, claim nothing more, and the lease error is returned.
    pub async fn run(
        &self,
        queues: SyncQueues,
        executor: TransferExecutor,
        reporter: ProgressReporter,
    ) -> Result<usize> {
        let workers = self.worker_count(&queues);
        info!(
            "Starting {} workers for {} source and {} destination files",
            workers,
            queues.source.len(),
            queues.destination.len()
        );

        let context = Arc::new(WorkerContext {
            queues: Mutex::new(queues),
            planner: DiffPlanner::new(),
            executor,
            reporter,
            admission: Arc::clone(&self.admission),
            connector: Arc::clone(&self.connector),
            credentials: self.credentials.clone(),
            acquire_timeout: self.config.acquire_timeout,
            stopped: AtomicBool::new(false),
        });

        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(worker(id, Arc::clone(&context)));
        }

        let mut fatal = None;
        while let Some(joined) = pool.join_next().await {
            let outcome = joined
                .map_err(|e| Error::sync(format!("Worker task failed: {}", e)))
                .and_then(|result| result);
            if let Err(e) = outcome {
                context.stopped.store(true, Ordering::SeqCst);
                fatal.get_or_insert(e);
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(workers),
        }
    }
}

async fn worker(id: usize, context: Arc<WorkerContext>) -> Result<()> {
    let mut processed = 0usize;

    loop {
        if context.stopped.load(Ordering::SeqCst) {
            debug!(worker = id, processed, "Worker stopped");
            return Ok(());
        }

        let lease = match context.admission.acquire(context.acquire_timeout).await {
            Ok(lease) => lease,
            Err(e) => {
                context.stopped.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };

        let unit = {
            let mut queues = context.queues.lock().await;
            context.planner.claim(&mut queues)
        };
        let Some(unit) = unit else {
            debug!(worker = id, processed, "No work left");
            return Ok(());
        };

        let path = unit.common_path().to_string();
        if let Err(e) = run_unit(&context, unit).await {
            context.reporter.error(&path, &e).await;
        }
        processed += 1;
        drop(lease);
    }
}

/// Open a session, execute one unit and close the session again
async fn run_unit(context: &WorkerContext, unit: WorkUnit) -> Result<()> {
    let mut session = context.connector.connect(&context.credentials).await?;
    let outcome = context.executor.execute(session.as_mut(), unit).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close session: {}", e);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::SyncSide;
    use ferrosync_network::MountedConnector;
    use ferrosync_types::{normalize_path, ConnectionLimit, EntryKind, ErrorKind, FileEntry, SyncOptions};
    use tempfile::TempDir;

    fn scheduler(mount: &std::path::Path, limit: usize, width: usize) -> SyncScheduler {
        SyncScheduler::new(
            SchedulerConfig {
                width: WorkerCount::new(width).unwrap(),
                acquire_timeout: Duration::from_millis(50),
            },
            AdmissionController::shared(ConnectionLimit::new(limit).unwrap()),
            Arc::new(MountedConnector::new(mount)),
            Credentials::default(),
        )
    }

    fn local_files(root: &str, count: usize) -> Vec<FileEntry> {
        (0..count)
            .map(|i| {
                let full = format!("{root}/f{i}.txt");
                std::fs::write(&full, format!("file {i}")).unwrap();
                FileEntry::new(&full, EntryKind::File, None)
            })
            .collect()
    }

    #[test]
    fn test_worker_count_is_bounded_by_width_and_work() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = scheduler(temp_dir.path(), 50, 5);
        let entry = |name: &str| FileEntry::new(name, EntryKind::File, None);

        let small = SyncQueues::new(
            SyncSide::new("/s", vec![entry("/s/a"), entry("/s/b")]),
            SyncSide::new("/d", Vec::new()),
        );
        assert_eq!(scheduler.worker_count(&small), 2);

        let empty = SyncQueues::new(SyncSide::new("/s", Vec::new()), SyncSide::new("/d", Vec::new()));
        assert_eq!(scheduler.worker_count(&empty), 0);

        let large = SyncQueues::new(
            SyncSide::new("/s", (0..20).map(|i| entry(&format!("/s/{i}"))).collect()),
            SyncSide::new("/d", Vec::new()),
        );
        assert_eq!(scheduler.worker_count(&large), 5);
    }

    #[tokio::test]
    async fn test_run_uploads_every_file() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("local");
        let mount = temp_dir.path().join("server");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::create_dir_all(&mount).unwrap();
        let local = normalize_path(&local.to_string_lossy());

        let queues = SyncQueues::new(
            SyncSide::new(&local, local_files(&local, 12)),
            SyncSide::new("/", Vec::new()),
        );
        let reporter = ProgressReporter::new(uuid::Uuid::new_v4(), SyncOptions::push().mode.direction());
        let executor = TransferExecutor::new(SyncOptions::push(), &local, "/", reporter.clone());

        let workers = scheduler(&mount, 50, 5)
            .run(queues, executor, reporter.clone())
            .await
            .unwrap();

        assert_eq!(workers, 5);
        assert_eq!(reporter.snapshot().await.uploaded, 12);
        assert_eq!(std::fs::read_dir(&mount).unwrap().count(), 12);
    }

    #[tokio::test]
    async fn test_unit_errors_are_absorbed() {
        let temp_dir = TempDir::new().unwrap();
        let local = normalize_path(&temp_dir.path().to_string_lossy());
        let mount = temp_dir.path().join("server");
        std::fs::create_dir_all(&mount).unwrap();

        // Source files that vanished between scan and transfer
        let missing = (0..3)
            .map(|i| FileEntry::new(&format!("{local}/gone{i}.txt"), EntryKind::File, None))
            .collect();
        let queues = SyncQueues::new(SyncSide::new(&local, missing), SyncSide::new("/", Vec::new()));
        let reporter = ProgressReporter::new(uuid::Uuid::new_v4(), SyncOptions::push().mode.direction());
        let executor = TransferExecutor::new(SyncOptions::push(), &local, "/", reporter.clone());

        scheduler(&mount, 50, 5)
            .run(queues, executor, reporter.clone())
            .await
            .unwrap();

        let report = reporter.snapshot().await;
        assert_eq!(report.errors, 3);
        assert_eq!(report.uploaded, 0);
    }

    #[tokio::test]
    async fn test_lease_timeout_fails_the_run() {
        let temp_dir = TempDir::new().unwrap();
        let local = normalize_path(&temp_dir.path().to_string_lossy());
        let scheduler = scheduler(temp_dir.path(), 1, 5);
        let _held = scheduler
            .admission
            .acquire(Duration::from_millis(50))
            .await
            .unwrap();

        let queues = SyncQueues::new(
            SyncSide::new(&local, local_files(&local, 2)),
            SyncSide::new("/", Vec::new()),
        );
        let reporter = ProgressReporter::new(uuid::Uuid::new_v4(), SyncOptions::push().mode.direction());
        let executor = TransferExecutor::new(SyncOptions::push(), &local, "/", reporter.clone());

        let error = scheduler.run(queues, executor, reporter).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert_eq!(scheduler.admission.queue_length(), 0);
    }
}
