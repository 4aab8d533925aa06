//! Unified test utilities for ferrosync tests and benchmarks
//!
//! A [`SyncFixture`] owns a temporary directory holding a local tree and a
//! mounted "server" tree, plus helpers to seed files with fixed timestamps
//! and read both trees back.

use ferrosync_config::Config;
use ferrosync_network::{Connector, MountedConnector};
use ferrosync_sync::SyncClient;
use ferrosync_types::{normalize_path, EntryKind, FileEntry};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Remote root used by fixtures
pub const REMOTE_ROOT: &str = "/www";

/// Timestamp `secs` seconds after a fixed base
///
/// The base keeps fixture times well away from "now", so a file written
/// during a test never collides with a seeded timestamp.
pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000 + secs)
}

/// Write `content` to `path`, creating parents, and set its mtime
pub fn write_file(path: &Path, content: &str, modified_at: SystemTime) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, content).expect("Failed to write test file");
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(modified_at))
        .expect("Failed to set modification time");
}

/// Every file below `root`, keyed by `/`-separated relative path
pub fn read_tree(root: &Path) -> BTreeMap<String, String> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.expect("Failed to read directory entry").path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .expect("Path outside root")
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = fs::read_to_string(&path).unwrap_or_default();
                files.insert(relative, content);
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files);
    files
}

/// Modification time of `path`
pub fn modified_at(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .expect("Failed to read modification time")
}

/// A local tree and a mounted server tree inside one temporary directory
pub struct SyncFixture {
    temp_dir: TempDir,
}

impl SyncFixture {
    /// Create empty local and remote roots
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join("local")).expect("Failed to create local root");
        fs::create_dir_all(temp_dir.path().join("server").join(REMOTE_ROOT.trim_start_matches('/')))
            .expect("Failed to create remote root");
        Self { temp_dir }
    }

    /// Local root on disk
    pub fn local_dir(&self) -> PathBuf {
        self.temp_dir.path().join("local")
    }

    /// Local root as passed to `SyncClient::sync`
    pub fn local_root(&self) -> String {
        normalize_path(&self.local_dir().to_string_lossy())
    }

    /// Directory standing in for the server root
    pub fn mount(&self) -> PathBuf {
        self.temp_dir.path().join("server")
    }

    /// Remote root on disk
    pub fn remote_dir(&self) -> PathBuf {
        self.mount().join(REMOTE_ROOT.trim_start_matches('/'))
    }

    /// Seed a local file
    pub fn local_file(&self, relative: &str, content: &str, modified_at: SystemTime) {
        write_file(&self.local_dir().join(relative), content, modified_at);
    }

    /// Seed a remote file
    pub fn remote_file(&self, relative: &str, content: &str, modified_at: SystemTime) {
        write_file(&self.remote_dir().join(relative), content, modified_at);
    }

    /// Files currently in the local tree
    pub fn local_tree(&self) -> BTreeMap<String, String> {
        read_tree(&self.local_dir())
    }

    /// Files currently in the remote tree
    pub fn remote_tree(&self) -> BTreeMap<String, String> {
        read_tree(&self.remote_dir())
    }

    /// Connector serving the fixture's mount
    pub fn connector(&self) -> MountedConnector {
        MountedConnector::new(self.mount())
    }

    /// Client over the fixture's mount with `config`
    pub fn client_with(&self, connector: Arc<dyn Connector>, config: &Config) -> SyncClient {
        SyncClient::new(connector, config).expect("Failed to create sync client")
    }

    /// Client over the fixture's mount with the default configuration
    pub fn client(&self) -> SyncClient {
        self.client_with(Arc::new(self.connector()), &Config::default())
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory entries `root/file-<i>` for planner benchmarks
pub fn synthetic_entries(root: &str, count: usize, modified_at: SystemTime) -> Vec<FileEntry> {
    (0..count)
        .map(|i| {
            FileEntry::new(
                &format!("{root}/dir-{}/file-{i}.txt", i % 16),
                EntryKind::File,
                Some(modified_at),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_seeds_both_trees() {
        let fixture = SyncFixture::new();
        fixture.local_file("a/b.txt", "local", at(1));
        fixture.remote_file("c.txt", "remote", at(2));

        assert_eq!(fixture.local_tree().get("a/b.txt").map(String::as_str), Some("local"));
        assert_eq!(fixture.remote_tree().get("c.txt").map(String::as_str), Some("remote"));
        assert_eq!(modified_at(&fixture.remote_dir().join("c.txt")), at(2));
    }

    #[test]
    fn test_synthetic_entries() {
        let entries = synthetic_entries("/src", 40, at(0));
        assert_eq!(entries.len(), 40);
        assert_eq!(entries[17].path.full(), "/src/dir-1/file-17.txt");
    }
}
