//! Core data types for ferrosync
//!
//! File entries produced by the tree scanners, the options that pick a
//! synchronization direction, and the closed set of statuses every unit of
//! work is reported with.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::SystemTime;

/// Kind of a listed directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory (only seen while scanning)
    Directory,
}

/// Normalize a path to forward slashes without duplicate or trailing separators
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut previous_slash = false;

    for ch in path.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(ch);
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Join a directory and a child name with a single `/`
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        normalize_path(name)
    } else {
        normalize_path(&format!("{dir}/{name}"))
    }
}

/// Parent directory of a normalized path (empty when there is none)
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(index) => &path[..index],
        None => "",
    }
}

/// Paths of one file entry
///
/// `common` is the match key against the opposite tree. It stays unset until
/// the entry is first compared and never changes afterwards.
#[derive(Debug, Clone)]
pub struct EntryPath {
    full: String,
    dir: String,
    common: OnceLock<String>,
}

impl EntryPath {
    /// Create the paths for `full`, normalizing separators
    pub fn new(full: &str) -> Self {
        let full = normalize_path(full);
        let dir = parent_dir(&full).to_string();
        Self {
            full,
            dir,
            common: OnceLock::new(),
        }
    }

    /// Absolute, `/`-separated path
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Parent directory of [`Self::full`]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Root-relative path, if it has been resolved
    pub fn common(&self) -> Option<&str> {
        self.common.get().map(String::as_str)
    }

    /// Resolve the root-relative path against `root`, once
    pub fn resolve_common(&self, root: &str) -> &str {
        self.common.get_or_init(|| {
            let rest = self.full.strip_prefix(root).unwrap_or(&self.full);
            if rest.starts_with('/') {
                rest.to_string()
            } else {
                format!("/{rest}")
            }
        })
    }
}

/// One file found while scanning a tree
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// File name
    pub name: String,
    /// Entry kind
    pub kind: EntryKind,
    /// Last modification time, when the side reports one
    pub modified_at: Option<SystemTime>,
    /// Paths of the entry
    pub path: EntryPath,
}

impl FileEntry {
    /// Create a file entry located at `full`
    pub fn new(full: &str, kind: EntryKind, modified_at: Option<SystemTime>) -> Self {
        let path = EntryPath::new(full);
        let name = path
            .full()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            kind,
            modified_at,
            path,
        }
    }

    /// Whether this entry is a directory
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Synchronization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SyncMode {
    /// Local tree is the source, remote tree the destination
    Push,
    /// Remote tree is the source, local tree the destination
    Pull,
}

impl SyncMode {
    /// Whether the source side is the remote tree
    pub fn source_is_remote(self) -> bool {
        self == Self::Pull
    }

    /// Transfer direction used for status symbols
    pub fn direction(self) -> Direction {
        match self {
            Self::Push => Direction::Upload,
            Self::Pull => Direction::Download,
        }
    }
}

/// What happens to the source after a successful transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SyncOperation {
    /// Keep the source
    #[default]
    Copy,
    /// Delete the source once it has been transferred
    Move,
}

/// Options of one synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncOptions {
    /// Direction of the run
    pub mode: SyncMode,
    /// Copy or move
    pub operation: SyncOperation,
}

impl SyncOptions {
    /// Upload the local tree
    pub fn push() -> Self {
        Self {
            mode: SyncMode::Push,
            operation: SyncOperation::Copy,
        }
    }

    /// Download the remote tree
    pub fn pull() -> Self {
        Self {
            mode: SyncMode::Pull,
            operation: SyncOperation::Copy,
        }
    }

    /// Delete sources after a successful transfer
    pub fn with_move(mut self) -> Self {
        self.operation = SyncOperation::Move;
        self
    }

    /// Whether sources are deleted after transfer
    pub fn is_move(&self) -> bool {
        self.operation == SyncOperation::Move
    }
}

/// Transfer direction, as shown by status symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Files flow to the remote side
    Upload,
    /// Files flow to the local side
    Download,
}

/// Status attached to each reported event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TransferStatus {
    /// A new file was written to the destination
    Uploaded,
    /// An existing destination file was overwritten
    Replaced,
    /// Both sides already match
    Identical,
    /// A destination-only file was deleted
    Obsolete,
    /// The unit of work failed
    Error,
    /// Informational message
    Info,
    /// Warning, including skipped conflicts
    Warn,
}

impl TransferStatus {
    /// All statuses, in display order
    pub const ALL: [Self; 7] = [
        Self::Uploaded,
        Self::Replaced,
        Self::Identical,
        Self::Obsolete,
        Self::Error,
        Self::Info,
        Self::Warn,
    ];

    /// Lowercase status name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Replaced => "replaced",
            Self::Identical => "identical",
            Self::Obsolete => "obsolete",
            Self::Error => "error",
            Self::Info => "info",
            Self::Warn => "warn",
        }
    }

    /// Three-character symbol for this status in the given direction
    pub fn symbol(self, direction: Direction) -> &'static str {
        match (self, direction) {
            (Self::Uploaded, Direction::Upload) => ">>>",
            (Self::Uploaded, Direction::Download) => "<<<",
            (Self::Replaced, Direction::Upload) => "->>",
            (Self::Replaced, Direction::Download) => "<<-",
            (Self::Identical, _) => "===",
            (Self::Obsolete, Direction::Upload) => ">>x",
            (Self::Obsolete, Direction::Download) => "x<<",
            (Self::Error, _) => "xxx",
            (Self::Info, _) => "INF",
            (Self::Warn, _) => "WAR",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("C:\\data\\site", "C:/data/site")]
    #[case("/srv//www/", "/srv/www")]
    #[case("/", "/")]
    #[case("relative/dir", "relative/dir")]
    fn test_normalize_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(input), expected);
    }

    #[rstest]
    #[case("/srv/www/index.html", "/srv/www")]
    #[case("/index.html", "/")]
    #[case("index.html", "")]
    fn test_parent_dir(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parent_dir(input), expected);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/srv/www", "a.txt"), "/srv/www/a.txt");
        assert_eq!(join_path("/", "a.txt"), "/a.txt");
        assert_eq!(join_path("", "a.txt"), "a.txt");
    }

    #[test]
    fn test_common_path_is_lazy_and_stable() {
        let entry = FileEntry::new("/srv/www/css/site.css", EntryKind::File, None);
        assert_eq!(entry.name, "site.css");
        assert_eq!(entry.path.dir(), "/srv/www/css");
        assert_eq!(entry.path.common(), None);

        assert_eq!(entry.path.resolve_common("/srv/www"), "/css/site.css");
        // A later resolution against another root keeps the first value.
        assert_eq!(entry.path.resolve_common("/srv"), "/css/site.css");
        assert_eq!(entry.path.common(), Some("/css/site.css"));
    }

    #[test]
    fn test_common_path_under_filesystem_root() {
        let remote = FileEntry::new("/a.txt", EntryKind::File, None);
        let local = FileEntry::new("./mirror/a.txt", EntryKind::File, None);
        assert_eq!(
            remote.path.resolve_common("/"),
            local.path.resolve_common("./mirror")
        );
    }

    #[test]
    fn test_sync_options() {
        let push = SyncOptions::push();
        assert!(!push.mode.source_is_remote());
        assert!(!push.is_move());

        let pull = SyncOptions::pull().with_move();
        assert!(pull.mode.source_is_remote());
        assert!(pull.is_move());
        assert_eq!(pull.mode.direction(), Direction::Download);
    }

    #[test]
    fn test_status_symbols() {
        assert_eq!(TransferStatus::Uploaded.symbol(Direction::Upload), ">>>");
        assert_eq!(TransferStatus::Uploaded.symbol(Direction::Download), "<<<");
        assert_eq!(TransferStatus::Obsolete.symbol(Direction::Download), "x<<");
        assert_eq!(TransferStatus::Identical.symbol(Direction::Upload), "===");
        for status in TransferStatus::ALL {
            assert_eq!(status.symbol(Direction::Upload).len(), 3);
        }
    }

    proptest! {
        #[test]
        fn test_normalized_paths_have_no_backslashes_or_double_slashes(path in "[a-z/\\\\]{0,24}") {
            let normalized = normalize_path(&path);
            prop_assert!(!normalized.contains('\\'));
            prop_assert!(!normalized.contains("//"));
            prop_assert_eq!(normalize_path(&normalized), normalized.clone());
        }
    }
}
