//! Tree scanning
//!
//! Both sides of a run are flattened into a list of [`FileEntry`] values by
//! the same [`TreeScanner`]; only the [`DirectoryLister`] differs.

use async_trait::async_trait;
use ferrosync_network::{RemoteEntry, RemoteSession};
use ferrosync_types::{join_path, normalize_path, EntryKind, Error, FileEntry, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::future::Future;
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, info, trace};

/// One child returned by a [`DirectoryLister`]
pub type ListedEntry = RemoteEntry;

/// Lists the direct children of a directory
#[async_trait]
pub trait DirectoryLister: Send {
    /// Children of `dir`, files and directories alike
    async fn list_children(&mut self, dir: &str) -> Result<Vec<ListedEntry>>;
}

/// Lists directories of the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalLister;

#[async_trait]
impl DirectoryLister for LocalLister {
    async fn list_children(&mut self, dir: &str) -> Result<Vec<ListedEntry>> {
        let mut entries = fs::read_dir(dir).await.map_err(|e| Error::Io {
            message: format!("Failed to read directory '{}': {}", dir, e),
        })?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::Io {
            message: format!("Failed to read directory entry in '{}': {}", dir, e),
        })? {
            let metadata = fs::metadata(entry.path()).await.map_err(|e| Error::Io {
                message: format!(
                    "Failed to get metadata for '{}': {}",
                    entry.path().display(),
                    e
                ),
            })?;

            children.push(ListedEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: if metadata.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
                modified_at: metadata.modified().ok(),
            });
        }

        Ok(children)
    }
}

/// Lists directories through a remote session
pub struct RemoteLister {
    session: Box<dyn RemoteSession>,
}

impl RemoteLister {
    /// Wrap an open session
    pub fn new(session: Box<dyn RemoteSession>) -> Self {
        Self { session }
    }

    /// Give the session back once scanning is done
    pub fn into_session(self) -> Box<dyn RemoteSession> {
        self.session
    }
}

#[async_trait]
impl DirectoryLister for RemoteLister {
    async fn list_children(&mut self, dir: &str) -> Result<Vec<ListedEntry>> {
        self.session.list(dir).await
    }
}

/// Name-based ignore rules
///
/// Each pattern is a glob matched against entry names, not full paths. A
/// trailing `/` and a leading `/` are accepted and dropped, so `build/` and
/// `/build` behave like `build`.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreMatcher {
    /// Compile `patterns`
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            let pattern = pattern.trim_end_matches('/').trim_start_matches('/');
            if pattern.is_empty() {
                continue;
            }
            let glob = Glob::new(pattern)
                .map_err(|e| Error::config(format!("Invalid ignore pattern '{}': {}", pattern, e)))?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }

        let set = builder
            .build()
            .map_err(|e| Error::config(format!("Invalid ignore patterns: {}", e)))?;
        Ok(Self {
            patterns: kept,
            set,
        })
    }

    /// Matcher that ignores nothing
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Whether an entry called `name` is skipped
    pub fn is_ignored(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// Compiled patterns
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

/// Flattens a directory tree into its files
#[derive(Debug, Clone, Default)]
pub struct TreeScanner {
    ignore: IgnoreMatcher,
}

impl TreeScanner {
    /// Create a scanner skipping whatever `ignore` matches
    pub fn new(ignore: IgnoreMatcher) -> Self {
        Self { ignore }
    }

    /// Every file below `root`, directories excluded
    ///
    /// Any listing failure fails the whole scan with [`Error::Scan`].
    pub async fn scan<L>(&self, lister: &mut L, root: &str) -> Result<Vec<FileEntry>>
    where
        L: DirectoryLister + ?Sized,
    {
        let root = normalize_path(root);
        let mut files = Vec::new();

        self.scan_recursive(lister, &root, &mut files)
            .await
            .map_err(|e| Error::scan(root.clone(), e.to_string()))?;

        info!("Scanned {} files in '{}'", files.len(), root);
        Ok(files)
    }

    fn scan_recursive<'a, L>(
        &'a self,
        lister: &'a mut L,
        dir: &'a str,
        files: &'a mut Vec<FileEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
    where
        L: DirectoryLister + ?Sized,
    {
        Box::pin(async move {
            let children = lister.list_children(dir).await?;
            trace!(dir, count = children.len(), "Listed directory");

            for child in children {
                if self.ignore.is_ignored(&child.name) {
                    debug!("Ignoring '{}' in '{}'", child.name, dir);
                    continue;
                }

                let full = join_path(dir, &child.name);
                match child.kind {
                    EntryKind::Directory => {
                        self.scan_recursive(&mut *lister, &full, &mut *files).await?;
                    }
                    EntryKind::File => {
                        files.push(FileEntry::new(&full, EntryKind::File, child.modified_at));
                    }
                }
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrosync_network::{Connector, Credentials, MountedConnector};
    use ferrosync_types::ErrorKind;
    use rstest::rstest;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Lister over an in-memory tree keyed by directory
    struct FakeLister {
        tree: HashMap<String, Vec<ListedEntry>>,
    }

    impl FakeLister {
        fn new(dirs: Vec<(&str, Vec<(&str, EntryKind)>)>) -> Self {
            let tree = dirs
                .into_iter()
                .map(|(dir, children)| {
                    let children = children
                        .into_iter()
                        .map(|(name, kind)| ListedEntry {
                            name: name.to_string(),
                            kind,
                            modified_at: None,
                        })
                        .collect();
                    (dir.to_string(), children)
                })
                .collect();
            Self { tree }
        }
    }

    #[async_trait]
    impl DirectoryLister for FakeLister {
        async fn list_children(&mut self, dir: &str) -> Result<Vec<ListedEntry>> {
            self.tree
                .get(dir)
                .cloned()
                .ok_or_else(|| Error::protocol(550, format!("{dir}: no such directory")))
        }
    }

    fn fulls(files: &[FileEntry]) -> Vec<&str> {
        files.iter().map(|f| f.path.full()).collect()
    }

    #[rstest]
    #[case(".git", ".git", true)]
    #[case("node_modules/", "node_modules", true)]
    #[case("/dist", "dist", true)]
    #[case("*.log", "debug.log", true)]
    #[case("*.log", "log.txt", false)]
    #[case(".DS_Store", "DS_Store", false)]
    fn test_ignore_patterns(#[case] pattern: &str, #[case] name: &str, #[case] ignored: bool) {
        let matcher = IgnoreMatcher::new([pattern]).unwrap();
        assert_eq!(matcher.is_ignored(name), ignored);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let error = IgnoreMatcher::new(["a[b"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_scan_flattens_and_skips_ignored_subtrees() {
        let mut lister = FakeLister::new(vec![
            (
                "/site",
                vec![
                    ("index.html", EntryKind::File),
                    ("css", EntryKind::Directory),
                    (".git", EntryKind::Directory),
                ],
            ),
            ("/site/css", vec![("site.css", EntryKind::File)]),
        ]);
        let scanner = TreeScanner::new(IgnoreMatcher::new([".git"]).unwrap());

        let files = scanner.scan(&mut lister, "/site/").await.unwrap();

        assert_eq!(fulls(&files), vec!["/site/index.html", "/site/css/site.css"]);
        assert_eq!(files[1].path.dir(), "/site/css");
        assert!(files.iter().all(|f| !f.is_directory()));
    }

    #[tokio::test]
    async fn test_listing_failure_fails_scan() {
        let mut lister = FakeLister::new(vec![("/site", vec![("missing", EntryKind::Directory)])]);
        let error = TreeScanner::default()
            .scan(&mut lister, "/site")
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Scan);
        assert!(error.is_fatal());
    }

    #[tokio::test]
    async fn test_local_and_remote_agree_on_common_paths() {
        let temp_dir = TempDir::new().unwrap();
        let local_root = temp_dir.path().join("local");
        let mount = temp_dir.path().join("server");
        for root in [&local_root, &mount.join("www")] {
            std::fs::create_dir_all(root.join("img")).unwrap();
            std::fs::write(root.join("a.txt"), b"a").unwrap();
            std::fs::write(root.join("img/logo.png"), b"png").unwrap();
        }

        let scanner = TreeScanner::default();
        let local_root = local_root.to_string_lossy().into_owned();
        let local = scanner.scan(&mut LocalLister, &local_root).await.unwrap();

        let session = MountedConnector::new(&mount)
            .connect(&Credentials::default())
            .await
            .unwrap();
        let mut remote_lister = RemoteLister::new(session);
        let remote = scanner.scan(&mut remote_lister, "/www").await.unwrap();

        let mut local_common: Vec<String> = local
            .iter()
            .map(|f| f.path.resolve_common(&normalize_path(&local_root)).to_string())
            .collect();
        let mut remote_common: Vec<String> = remote
            .iter()
            .map(|f| f.path.resolve_common("/www").to_string())
            .collect();
        local_common.sort();
        remote_common.sort();
        assert_eq!(local_common, vec!["/a.txt", "/img/logo.png"]);
        assert_eq!(local_common, remote_common);
    }
}
