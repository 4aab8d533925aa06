//! Execution of claimed units of work

use crate::planner::{Classification, WorkUnit};
use crate::progress::ProgressReporter;
use ferrosync_network::{RemoteSession, CODE_NOT_FOUND};
use ferrosync_types::{
    join_path, normalize_path, parent_dir, Error, FileEntry, Result, SyncMode, SyncOptions,
};
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

/// Which tree a path lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Local,
    Remote,
}

/// Performs the file operations of one unit of work
#[derive(Debug, Clone)]
pub struct TransferExecutor {
    options: SyncOptions,
    local_root: String,
    remote_root: String,
    reporter: ProgressReporter,
}

impl TransferExecutor {
    /// Create an executor for a run between `local_root` and `remote_root`
    pub fn new(
        options: SyncOptions,
        local_root: &str,
        remote_root: &str,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            options,
            local_root: normalize_path(local_root),
            remote_root: normalize_path(remote_root),
            reporter,
        }
    }

    /// Carry out `unit` through `session`
    ///
    /// Successful outcomes are reported here; a returned error is for the
    /// caller to report against the unit's path.
    pub async fn execute(&self, session: &mut dyn RemoteSession, unit: WorkUnit) -> Result<()> {
        match unit {
            WorkUnit::New { source } => {
                let common = unit_common(&source);
                let target = join_path(self.root(self.destination_side()), &common);
                self.transfer(session, &source, &target, true).await?;
                self.reporter.uploaded(&common).await;
                self.finish_move(session, &source).await
            }
            WorkUnit::Matched {
                source,
                destination,
                classification,
            } => {
                let common = unit_common(&source);
                match classification {
                    Classification::Identical => {
                        self.reporter.identical(&common).await;
                        Ok(())
                    }
                    Classification::ConflictSkip => {
                        self.reporter.conflict(&common).await;
                        Ok(())
                    }
                    Classification::Replace => {
                        self.transfer(session, &source, destination.path.full(), false)
                            .await?;
                        self.reporter.replaced(&common).await;
                        self.finish_move(session, &source).await
                    }
                }
            }
            WorkUnit::Obsolete { destination } => {
                let side = self.destination_side();
                self.remove_with_parent(session, side, destination.path.full())
                    .await?;
                self.reporter.obsolete(&unit_common(&destination)).await;
                Ok(())
            }
        }
    }

    /// Copy `source` to the destination path `target`
    ///
    /// `create_parents` is set for new files, whose directory may not exist yet.
    async fn transfer(
        &self,
        session: &mut dyn RemoteSession,
        source: &FileEntry,
        target: &str,
        create_parents: bool,
    ) -> Result<()> {
        match self.options.mode {
            SyncMode::Push => {
                if create_parents {
                    session.ensure_directory(parent_dir(target)).await?;
                    // ensure_directory leaves the session inside the new directory
                    session.change_directory("/").await?;
                }
                session.upload(Path::new(source.path.full()), target).await?;

                if let Some(modified_at) = source.modified_at {
                    if let Err(e) = session.set_modified(target, modified_at).await {
                        debug!("Server kept its own timestamp for '{}': {}", target, e);
                    }
                }
            }
            SyncMode::Pull => {
                let local = Path::new(target);
                if create_parents {
                    let parent = parent_dir(target);
                    if !parent.is_empty() {
                        fs::create_dir_all(parent).await.map_err(|e| Error::Io {
                            message: format!("Failed to create directory '{}': {}", parent, e),
                        })?;
                    }
                    fs::File::create(local).await.map_err(|e| Error::Io {
                        message: format!("Failed to create '{}': {}", target, e),
                    })?;
                }

                session.download(local, source.path.full()).await?;

                let modified_at = source.modified_at.unwrap_or_else(SystemTime::now);
                filetime::set_file_mtime(local, filetime::FileTime::from_system_time(modified_at))
                    .map_err(|e| Error::Io {
                        message: format!(
                            "Failed to set modification time for '{}': {}",
                            target, e
                        ),
                    })?;
            }
        }

        debug!("Transferred: {} -> {}", source.path.full(), target);
        Ok(())
    }

    /// Delete the source of a transferred file when moving
    async fn finish_move(&self, session: &mut dyn RemoteSession, source: &FileEntry) -> Result<()> {
        if !self.options.is_move() {
            return Ok(());
        }

        let side = self.source_side();
        self.remove_with_parent(session, side, source.path.full())
            .await?;
        self.reporter.moved(&unit_common(source)).await;
        Ok(())
    }

    /// Delete one file, then its directory if that is now empty
    ///
    /// The root of a side is never removed.
    async fn remove_with_parent(
        &self,
        session: &mut dyn RemoteSession,
        side: Side,
        path: &str,
    ) -> Result<()> {
        let dir = parent_dir(path);
        let root = self.root(side);

        match side {
            Side::Local => {
                fs::remove_file(path).await.map_err(|e| Error::Io {
                    message: format!("Failed to delete file '{}': {}", path, e),
                })?;

                if dir.is_empty() || dir == root {
                    return Ok(());
                }
                prune_local_dir(dir).await?;
            }
            Side::Remote => {
                session.remove(path).await?;

                if dir.is_empty() || dir == root {
                    return Ok(());
                }
                prune_remote_dir(session, dir).await?;
            }
        }

        debug!("Deleted: {}", path);
        Ok(())
    }

    fn source_side(&self) -> Side {
        match self.options.mode {
            SyncMode::Push => Side::Local,
            SyncMode::Pull => Side::Remote,
        }
    }

    fn destination_side(&self) -> Side {
        match self.options.mode {
            SyncMode::Push => Side::Remote,
            SyncMode::Pull => Side::Local,
        }
    }

    fn root(&self, side: Side) -> &str {
        match side {
            Side::Local => &self.local_root,
            Side::Remote => &self.remote_root,
        }
    }
}

/// Remove the local directory `dir` if it is empty
///
/// Sibling units prune the same directories concurrently. A directory that
/// is already gone, or that still holds entries when the removal fails, has
/// been handled by someone else.
async fn prune_local_dir(dir: &str) -> Result<()> {
    match local_dir_is_empty(dir).await {
        Ok(true) => {}
        Ok(false) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::Io {
                message: format!("Failed to read directory '{}': {}", dir, e),
            })
        }
    }

    if let Err(e) = fs::remove_dir(dir).await {
        match local_dir_is_empty(dir).await {
            Err(again) if again.kind() == io::ErrorKind::NotFound => {}
            Ok(false) => {}
            _ => {
                return Err(Error::Io {
                    message: format!("Failed to delete directory '{}': {}", dir, e),
                })
            }
        }
        debug!("Directory '{}' was pruned concurrently", dir);
        return Ok(());
    }

    debug!("Deleted empty directory: {}", dir);
    Ok(())
}

async fn local_dir_is_empty(dir: &str) -> io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

/// Remove the remote directory `dir` if it is empty
///
/// Same rules as [`prune_local_dir`], with 550 standing in for not found.
async fn prune_remote_dir(session: &mut dyn RemoteSession, dir: &str) -> Result<()> {
    match session.list(dir).await {
        Ok(entries) if !entries.is_empty() => return Ok(()),
        Ok(_) => {}
        Err(e) if e.protocol_code() == Some(CODE_NOT_FOUND) => return Ok(()),
        Err(e) => return Err(e),
    }

    if let Err(e) = session.remove_empty_directory(dir).await {
        match session.list(dir).await {
            Err(again) if again.protocol_code() == Some(CODE_NOT_FOUND) => {}
            Ok(entries) if !entries.is_empty() => {}
            _ => return Err(e),
        }
        debug!("Remote directory '{}' was pruned concurrently", dir);
        return Ok(());
    }

    debug!("Deleted empty remote directory: {}", dir);
    Ok(())
}

/// Common path of a claimed entry
fn unit_common(entry: &FileEntry) -> String {
    entry
        .path
        .common()
        .unwrap_or_else(|| entry.path.full())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{DiffPlanner, SyncQueues, SyncSide};
    use ferrosync_network::{Connector, Credentials, MountedConnector};
    use ferrosync_types::EntryKind;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        local: String,
        mount: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("local");
        let mount = temp_dir.path().join("server");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::create_dir_all(mount.join("www")).unwrap();
        Fixture {
            local: normalize_path(&local.to_string_lossy()),
            mount,
            _temp_dir: temp_dir,
        }
    }

    fn stamp(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    async fn session(fixture: &Fixture) -> Box<dyn RemoteSession> {
        MountedConnector::new(&fixture.mount)
            .connect(&Credentials::default())
            .await
            .unwrap()
    }

    fn executor(options: SyncOptions, local: &str) -> TransferExecutor {
        let direction = options.mode.direction();
        TransferExecutor::new(
            options,
            local,
            "/www",
            ProgressReporter::new(uuid::Uuid::new_v4(), direction),
        )
    }

    fn claim_one(source: SyncSide, destination: SyncSide) -> WorkUnit {
        DiffPlanner::new()
            .claim(&mut SyncQueues::new(source, destination))
            .unwrap()
    }

    #[tokio::test]
    async fn test_push_new_creates_remote_directories_and_stamps_mtime() {
        let fixture = fixture();
        let file = format!("{}/css/site.css", fixture.local);
        std::fs::create_dir_all(parent_dir(&file)).unwrap();
        std::fs::write(&file, b"body{}").unwrap();

        let unit = claim_one(
            SyncSide::new(&fixture.local, vec![FileEntry::new(&file, EntryKind::File, Some(stamp(100)))]),
            SyncSide::new("/www", Vec::new()),
        );
        let mut session = session(&fixture).await;
        let executor = executor(SyncOptions::push(), &fixture.local);

        executor.execute(session.as_mut(), unit).await.unwrap();

        let uploaded = fixture.mount.join("www/css/site.css");
        assert_eq!(std::fs::read(&uploaded).unwrap(), b"body{}");
        assert_eq!(
            std::fs::metadata(&uploaded).unwrap().modified().unwrap(),
            stamp(100)
        );
        assert_eq!(session.working_directory(), "/");
        assert_eq!(executor.reporter.snapshot().await.uploaded, 1);
    }

    #[tokio::test]
    async fn test_pull_new_with_move_removes_remote_source_and_empty_parent() {
        let fixture = fixture();
        std::fs::create_dir_all(fixture.mount.join("www/img")).unwrap();
        std::fs::write(fixture.mount.join("www/img/logo.png"), b"png").unwrap();

        let unit = claim_one(
            SyncSide::new(
                "/www",
                vec![FileEntry::new("/www/img/logo.png", EntryKind::File, Some(stamp(300)))],
            ),
            SyncSide::new(&fixture.local, Vec::new()),
        );
        let mut session = session(&fixture).await;
        let executor = executor(SyncOptions::pull().with_move(), &fixture.local);

        executor.execute(session.as_mut(), unit).await.unwrap();

        let local = Path::new(&fixture.local).join("img/logo.png");
        assert_eq!(std::fs::read(&local).unwrap(), b"png");
        assert_eq!(std::fs::metadata(&local).unwrap().modified().unwrap(), stamp(300));
        assert!(!fixture.mount.join("www/img").exists());
        assert!(fixture.mount.join("www").exists());

        let report = executor.reporter.snapshot().await;
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.moved, 1);
    }

    #[tokio::test]
    async fn test_obsolete_keeps_non_empty_parent_and_root() {
        let fixture = fixture();
        std::fs::create_dir_all(fixture.mount.join("www/docs")).unwrap();
        std::fs::write(fixture.mount.join("www/docs/old.md"), b"old").unwrap();
        std::fs::write(fixture.mount.join("www/docs/keep.md"), b"keep").unwrap();
        std::fs::write(fixture.mount.join("www/stale.txt"), b"stale").unwrap();

        let mut session = session(&fixture).await;
        let executor = executor(SyncOptions::push(), &fixture.local);

        for remote in ["/www/docs/old.md", "/www/stale.txt"] {
            let unit = claim_one(
                SyncSide::new(&fixture.local, Vec::new()),
                SyncSide::new("/www", vec![FileEntry::new(remote, EntryKind::File, None)]),
            );
            executor.execute(session.as_mut(), unit).await.unwrap();
        }

        assert!(!fixture.mount.join("www/docs/old.md").exists());
        assert!(fixture.mount.join("www/docs/keep.md").exists());
        assert!(!fixture.mount.join("www/stale.txt").exists());
        assert!(fixture.mount.join("www").exists());
        assert_eq!(executor.reporter.snapshot().await.obsolete, 2);
    }

    #[tokio::test]
    async fn test_conflict_leaves_both_sides_alone() {
        let fixture = fixture();
        let file = format!("{}/a.txt", fixture.local);
        std::fs::write(&file, b"old local").unwrap();
        std::fs::write(fixture.mount.join("www/a.txt"), b"new remote").unwrap();

        let unit = claim_one(
            SyncSide::new(&fixture.local, vec![FileEntry::new(&file, EntryKind::File, Some(stamp(10)))]),
            SyncSide::new(
                "/www",
                vec![FileEntry::new("/www/a.txt", EntryKind::File, Some(stamp(20)))],
            ),
        );
        let mut session = session(&fixture).await;
        let executor = executor(SyncOptions::push().with_move(), &fixture.local);

        executor.execute(session.as_mut(), unit).await.unwrap();

        assert_eq!(std::fs::read(&file).unwrap(), b"old local");
        assert_eq!(
            std::fs::read(fixture.mount.join("www/a.txt")).unwrap(),
            b"new remote"
        );
        let report = executor.reporter.snapshot().await;
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.moved, 0);
    }

    #[tokio::test]
    async fn test_removing_missing_file_is_an_error() {
        let fixture = fixture();
        let unit = claim_one(
            SyncSide::new(&fixture.local, Vec::new()),
            SyncSide::new("/www", vec![FileEntry::new("/www/gone.txt", EntryKind::File, None)]),
        );
        let mut session = session(&fixture).await;
        let executor = executor(SyncOptions::push(), &fixture.local);

        let error = executor.execute(session.as_mut(), unit).await.unwrap_err();
        assert_eq!(error.protocol_code(), Some(550));
        assert!(!error.is_fatal());
        assert_eq!(executor.reporter.snapshot().await.obsolete, 0);
    }

    #[tokio::test]
    async fn test_pruning_tolerates_directories_removed_by_a_sibling() {
        let fixture = fixture();
        let gone = format!("{}/gone", fixture.local);
        let kept = format!("{}/kept", fixture.local);
        std::fs::create_dir_all(&kept).unwrap();
        std::fs::write(format!("{}/other.txt", kept), b"other").unwrap();

        prune_local_dir(&gone).await.unwrap();
        prune_local_dir(&kept).await.unwrap();
        assert!(Path::new(&kept).join("other.txt").exists());

        let mut session = session(&fixture).await;
        std::fs::create_dir_all(fixture.mount.join("www/full")).unwrap();
        std::fs::write(fixture.mount.join("www/full/x.txt"), b"x").unwrap();

        prune_remote_dir(session.as_mut(), "/www/gone").await.unwrap();
        prune_remote_dir(session.as_mut(), "/www/full").await.unwrap();
        assert!(fixture.mount.join("www/full/x.txt").exists());
    }

    #[tokio::test]
    async fn test_concurrent_moves_out_of_one_directory_all_succeed() {
        let fixture = fixture();
        let dir = format!("{}/batch", fixture.local);
        std::fs::create_dir_all(&dir).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let file = format!("{}/f{}.txt", dir, i);
            std::fs::write(&file, b"data").unwrap();

            let unit = claim_one(
                SyncSide::new(&fixture.local, vec![FileEntry::new(&file, EntryKind::File, Some(stamp(1)))]),
                SyncSide::new("/www", Vec::new()),
            );
            let mut session = session(&fixture).await;
            let executor = executor(SyncOptions::push().with_move(), &fixture.local);
            handles.push(tokio::spawn(async move {
                executor.execute(session.as_mut(), unit).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(!Path::new(&dir).exists());
        assert!(Path::new(&fixture.local).exists());
        assert_eq!(std::fs::read_dir(fixture.mount.join("www/batch")).unwrap().count(), 8);
    }
}
