//! Main synchronization engine

use crate::{
    executor::TransferExecutor,
    planner::{SyncQueues, SyncSide},
    progress::{ProgressReporter, SyncPhase, SyncReport},
    scanner::{IgnoreMatcher, LocalLister, RemoteLister, TreeScanner},
    scheduler::{SchedulerConfig, SyncScheduler},
};
use ferrosync_config::Config;
use ferrosync_network::{AdmissionController, Connector, Credentials, RemoteSession};
use ferrosync_types::{normalize_path, Error, Result, SyncMode, SyncOptions};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Client synchronizing a local tree with a remote one
///
/// The admission controller may be shared between clients so that all of
/// them stay under one connection ceiling.
pub struct SyncClient {
    credentials: Credentials,
    scanner: TreeScanner,
    scheduler_config: SchedulerConfig,
    admission: Arc<AdmissionController>,
    connector: Arc<dyn Connector>,
}

impl SyncClient {
    /// Create a client from `config`, opening sessions through `connector`
    pub fn new(connector: Arc<dyn Connector>, config: &Config) -> Result<Self> {
        config.validate()?;

        let credentials = Credentials::new(
            config.server.host.clone(),
            config.server.user.clone(),
            config.server.pass.clone(),
            config.server.port,
        );
        let scanner = TreeScanner::new(IgnoreMatcher::new(&config.sync.ignore)?);
        let scheduler_config = SchedulerConfig {
            width: config.connections.per_target,
            acquire_timeout: config.connections.acquire_timeout(),
        };

        Ok(Self {
            credentials,
            scanner,
            scheduler_config,
            admission: AdmissionController::shared(config.connections.max_connections),
            connector,
        })
    }

    /// Share `admission` instead of the client's own controller
    pub fn with_admission(mut self, admission: Arc<AdmissionController>) -> Self {
        self.admission = admission;
        self
    }

    /// Controller gating this client's sessions
    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    /// Synchronize `local_root` with `remote_root`
    ///
    /// Per-file failures are counted in the report. Only a scan failure or a
    /// connection lease timeout makes the run fail.
    pub async fn sync(
        &self,
        local_root: &str,
        remote_root: &str,
        options: SyncOptions,
    ) -> Result<SyncReport> {
        let reporter = ProgressReporter::new(uuid::Uuid::new_v4(), options.mode.direction());
        self.sync_with_reporter(local_root, remote_root, options, reporter)
            .await
    }

    /// Like [`Self::sync`], reporting through a caller-supplied reporter
    pub async fn sync_with_reporter(
        &self,
        local_root: &str,
        remote_root: &str,
        options: SyncOptions,
        reporter: ProgressReporter,
    ) -> Result<SyncReport> {
        let local_root = normalize_path(local_root);
        let remote_root = remote_absolute(remote_root);

        match self
            .run(&local_root, &remote_root, options, &reporter)
            .await
        {
            Ok(()) => Ok(reporter.completed().await),
            Err(e) => {
                reporter.failed(&e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        local_root: &str,
        remote_root: &str,
        options: SyncOptions,
        reporter: &ProgressReporter,
    ) -> Result<()> {
        reporter.set_phase(SyncPhase::Initializing);
        info!(
            "Starting {:?} sync: {} <-> {}",
            options.mode, local_root, remote_root
        );

        reporter.set_phase(SyncPhase::Connecting);
        let lease = self
            .admission
            .acquire(self.scheduler_config.acquire_timeout)
            .await?;
        let mut session = self
            .connector
            .connect(&self.credentials)
            .await
            .map_err(|e| Error::scan(remote_root, format!("Failed to connect: {}", e)))?;

        reporter.set_phase(SyncPhase::Scanning);
        reporter.info("Getting file list, this may take a while...");
        let prepared = self
            .prepare_destination(session.as_mut(), local_root, remote_root, options.mode)
            .await;
        let scanned = match prepared {
            Ok(()) => {
                let mut local_lister = LocalLister;
                let mut remote_lister = RemoteLister::new(session);
                let scanned = tokio::try_join!(
                    self.scanner.scan(&mut local_lister, local_root),
                    self.scanner.scan(&mut remote_lister, remote_root),
                );
                session = remote_lister.into_session();
                scanned
            }
            Err(e) => Err(e),
        };

        if let Err(e) = session.close().await {
            warn!("Failed to close scan session: {}", e);
        }
        drop(lease);
        let (local_files, remote_files) = scanned?;

        let local = SyncSide::new(local_root, local_files);
        let remote = SyncSide::new(remote_root, remote_files);
        let queues = match options.mode {
            SyncMode::Push => SyncQueues::new(local, remote),
            SyncMode::Pull => SyncQueues::new(remote, local),
        };

        reporter
            .scanned(queues.source.len(), queues.destination.len())
            .await;
        reporter.info("Starting synchronization...");
        let arrow = match options.mode {
            SyncMode::Push => ">>>",
            SyncMode::Pull => "<<<",
        };
        reporter.info(format!(
            "{} {} {}",
            queues.source.root(),
            arrow,
            queues.destination.root()
        ));

        reporter.set_phase(SyncPhase::Transferring);
        let executor = TransferExecutor::new(options, local_root, remote_root, reporter.clone());
        let scheduler = SyncScheduler::new(
            self.scheduler_config,
            Arc::clone(&self.admission),
            Arc::clone(&self.connector),
            self.credentials.clone(),
        );
        let workers = scheduler.run(queues, executor, reporter.clone()).await?;
        reporter.workers(workers).await;

        Ok(())
    }

    /// Create the destination root when it does not exist yet
    async fn prepare_destination(
        &self,
        session: &mut dyn RemoteSession,
        local_root: &str,
        remote_root: &str,
        mode: SyncMode,
    ) -> Result<()> {
        match mode {
            SyncMode::Push => {
                session
                    .ensure_directory(remote_root)
                    .await
                    .map_err(|e| Error::scan(remote_root, e.to_string()))?;
                session
                    .change_directory("/")
                    .await
                    .map_err(|e| Error::scan(remote_root, e.to_string()))?;
            }
            SyncMode::Pull => {
                fs::create_dir_all(local_root)
                    .await
                    .map_err(|e| Error::scan(local_root, e.to_string()))?;
            }
        }
        debug!("Destination root ready");
        Ok(())
    }
}

/// Remote roots are always absolute
fn remote_absolute(root: &str) -> String {
    let root = normalize_path(root);
    if root.starts_with('/') {
        root
    } else {
        format!("/{root}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrosync_network::MountedConnector;
    use ferrosync_types::ErrorKind;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("www", "/www")]
    #[case("/www/", "/www")]
    #[case("", "/")]
    #[case("/", "/")]
    fn test_remote_absolute(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(remote_absolute(input), expected);
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let mut config = Config::default();
        config.server.port = 0;
        let connector = Arc::new(MountedConnector::new("/"));
        assert!(SyncClient::new(connector, &config).is_err());
    }

    #[tokio::test]
    async fn test_missing_source_root_fails_before_any_transfer() {
        let temp_dir = TempDir::new().unwrap();
        let mount = temp_dir.path().join("server");
        std::fs::create_dir_all(mount.join("www")).unwrap();
        std::fs::write(mount.join("www/keep.txt"), b"keep").unwrap();

        let client = SyncClient::new(Arc::new(MountedConnector::new(&mount)), &Config::default())
            .unwrap();
        let missing = temp_dir.path().join("absent");
        let error = client
            .sync(&missing.to_string_lossy(), "/www", SyncOptions::push())
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Scan);
        assert!(mount.join("www/keep.txt").exists());
        assert_eq!(client.admission().active_connections(), 0);
    }

    #[tokio::test]
    async fn test_push_creates_missing_remote_root() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("local");
        let mount = temp_dir.path().join("server");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::create_dir_all(&mount).unwrap();
        std::fs::write(local.join("index.html"), b"<html>").unwrap();

        let client = SyncClient::new(Arc::new(MountedConnector::new(&mount)), &Config::default())
            .unwrap();
        let report = client
            .sync(&local.to_string_lossy(), "/site/new", SyncOptions::push())
            .await
            .unwrap();

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.workers, 1);
        assert!(mount.join("site/new/index.html").exists());
    }
}
