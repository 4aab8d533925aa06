//! Session backend over a mounted directory
//!
//! [`MountedConnector`] serves a local directory as if it were the remote
//! server's file system: a share mounted from the server, or a scratch tree
//! in tests. Paths are confined to the mount; `..` never climbs above it.

use crate::session::{
    Connector, Credentials, RemoteEntry, RemoteSession, CODE_LOCAL_ERROR, CODE_NOT_ALLOWED,
    CODE_NOT_AVAILABLE, CODE_NOT_FOUND,
};
use async_trait::async_trait;
use ferrosync_types::{EntryKind, Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, trace};

/// Opens [`MountedSession`]s over one directory
#[derive(Debug, Clone)]
pub struct MountedConnector {
    mount: PathBuf,
}

impl MountedConnector {
    /// Serve `mount` as the server root
    pub fn new<P: Into<PathBuf>>(mount: P) -> Self {
        Self {
            mount: mount.into(),
        }
    }

    /// Directory standing in for the server root
    pub fn mount(&self) -> &Path {
        &self.mount
    }
}

#[async_trait]
impl Connector for MountedConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteSession>> {
        let metadata = fs::metadata(&self.mount).await.map_err(|e| {
            Error::protocol(
                CODE_NOT_AVAILABLE,
                format!("{}: mount {} unavailable: {}", credentials.endpoint(), self.mount.display(), e),
            )
        })?;
        if !metadata.is_dir() {
            return Err(Error::protocol(
                CODE_NOT_AVAILABLE,
                format!("{}: mount {} is not a directory", credentials.endpoint(), self.mount.display()),
            ));
        }

        debug!(
            endpoint = %credentials.endpoint(),
            user = %credentials.user,
            mount = %self.mount.display(),
            "Session opened"
        );
        Ok(Box::new(MountedSession::new(self.mount.clone())))
    }
}

/// Session whose server file system is a local directory
#[derive(Debug)]
pub struct MountedSession {
    mount: PathBuf,
    cwd: String,
    closed: bool,
}

impl MountedSession {
    /// Open a session rooted at `mount`, starting in `/`
    pub fn new(mount: PathBuf) -> Self {
        Self {
            mount,
            cwd: "/".to_string(),
            closed: false,
        }
    }

    /// Absolute server path for `path`, with `.` and `..` applied
    fn resolve(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.cwd, path)
        };

        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                part => parts.push(part),
            }
        }
        format!("/{}", parts.join("/"))
    }

    /// Location of a server path inside the mount
    fn host_path(&self, path: &str) -> PathBuf {
        let resolved = self.resolve(path);
        let relative = resolved.trim_start_matches('/');
        if relative.is_empty() {
            self.mount.clone()
        } else {
            self.mount.join(relative)
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::protocol(CODE_NOT_AVAILABLE, "session is closed"))
        } else {
            Ok(())
        }
    }
}

/// Map an I/O failure on `path` to a reply code
fn reply_error(error: &io::Error, path: &str) -> Error {
    let code = match error.kind() {
        io::ErrorKind::NotFound => CODE_NOT_FOUND,
        io::ErrorKind::PermissionDenied => CODE_NOT_ALLOWED,
        _ => CODE_LOCAL_ERROR,
    };
    Error::protocol(code, format!("{path}: {error}"))
}

#[async_trait]
impl RemoteSession for MountedSession {
    async fn change_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(path);
        let metadata = fs::metadata(self.host_path(&target))
            .await
            .map_err(|e| reply_error(&e, &target))?;
        if !metadata.is_dir() {
            return Err(Error::protocol(
                CODE_NOT_FOUND,
                format!("{target}: not a directory"),
            ));
        }
        self.cwd = target;
        Ok(())
    }

    async fn change_to_parent(&mut self) -> Result<()> {
        self.change_directory("..").await
    }

    fn working_directory(&self) -> &str {
        &self.cwd
    }

    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.ensure_open()?;
        let target = self.resolve(path);
        let mut dir = fs::read_dir(self.host_path(&target))
            .await
            .map_err(|e| reply_error(&e, &target))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| reply_error(&e, &target))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = fs::metadata(entry.path())
                .await
                .map_err(|e| reply_error(&e, &format!("{target}/{name}")))?;
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(RemoteEntry {
                name,
                kind,
                modified_at: metadata.modified().ok(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        trace!(path = %target, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn ensure_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(path);
        fs::create_dir_all(self.host_path(&target))
            .await
            .map_err(|e| reply_error(&e, &target))?;
        self.cwd = target;
        Ok(())
    }

    async fn remove_empty_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(path);
        if target == "/" {
            return Err(Error::protocol(
                CODE_NOT_ALLOWED,
                "refusing to remove the server root",
            ));
        }
        fs::remove_dir(self.host_path(&target))
            .await
            .map_err(|e| reply_error(&e, &target))
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(remote);
        fs::copy(local, self.host_path(&target))
            .await
            .map_err(|e| reply_error(&e, &target))?;
        Ok(())
    }

    async fn download(&mut self, local: &Path, remote: &str) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(remote);
        fs::copy(self.host_path(&target), local)
            .await
            .map_err(|e| reply_error(&e, &target))?;
        Ok(())
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(path);
        fs::remove_file(self.host_path(&target))
            .await
            .map_err(|e| reply_error(&e, &target))
    }

    async fn set_modified(&mut self, path: &str, modified_at: SystemTime) -> Result<()> {
        self.ensure_open()?;
        let target = self.resolve(path);
        filetime::set_file_mtime(
            self.host_path(&target),
            filetime::FileTime::from_system_time(modified_at),
        )
        .map_err(|e| reply_error(&e, &target))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
