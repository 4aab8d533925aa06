//! Remote session capability
//!
//! The sync engine never speaks a wire protocol itself. It drives a
//! [`RemoteSession`] opened by a [`Connector`]; failures at this layer are
//! reported as [`Error::Protocol`](ferrosync_types::Error::Protocol) with a
//! three-digit reply code.

use async_trait::async_trait;
use ferrosync_types::{EntryKind, Result};
use std::fmt;
use std::path::Path;
use std::time::SystemTime;

/// Reply code for a missing file or directory
pub const CODE_NOT_FOUND: u16 = 550;
/// Reply code for a name the server refuses to create or write
pub const CODE_NOT_ALLOWED: u16 = 553;
/// Reply code for a local processing error on the server
pub const CODE_LOCAL_ERROR: u16 = 451;
/// Reply code for a service that cannot be reached
pub const CODE_NOT_AVAILABLE: u16 = 421;

/// Login information for a remote server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Host name or address
    pub host: String,
    /// User name
    pub user: String,
    /// Password
    pub pass: String,
    /// Control port
    pub port: u16,
}

impl Credentials {
    /// Create credentials for `user@host:port`
    pub fn new<H, U, P>(host: H, user: U, pass: P, port: u16) -> Self
    where
        H: Into<String>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            host: host.into(),
            user: user.into(),
            pass: pass.into(),
            port,
        }
    }

    /// `host:port` of the server
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("localhost", "anonymous", "", 21)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("pass", &"***")
            .field("port", &self.port)
            .finish()
    }
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name, without its directory
    pub name: String,
    /// File or directory
    pub kind: EntryKind,
    /// Modification time, when the server reports one
    pub modified_at: Option<SystemTime>,
}

/// An open session against a remote file tree
///
/// Paths are `/`-separated. Relative paths resolve against the session's
/// working directory, absolute ones against the server root.
#[async_trait]
pub trait RemoteSession: Send {
    /// Change the working directory
    async fn change_directory(&mut self, path: &str) -> Result<()>;

    /// Move the working directory one level up
    async fn change_to_parent(&mut self) -> Result<()>;

    /// Current working directory
    fn working_directory(&self) -> &str;

    /// List the direct children of `path`
    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Create `path` and any missing parents, then make it the working directory
    async fn ensure_directory(&mut self, path: &str) -> Result<()>;

    /// Remove `path`, which must be an empty directory
    async fn remove_empty_directory(&mut self, path: &str) -> Result<()>;

    /// Store the local file `local` as `remote`, overwriting it
    async fn upload(&mut self, local: &Path, remote: &str) -> Result<()>;

    /// Retrieve `remote` into the local file `local`, overwriting it
    async fn download(&mut self, local: &Path, remote: &str) -> Result<()>;

    /// Delete the file `path`
    async fn remove(&mut self, path: &str) -> Result<()>;

    /// Set the modification time of `path`
    async fn set_modified(&mut self, path: &str, modified_at: SystemTime) -> Result<()>;

    /// End the session
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions against one remote server
#[async_trait]
pub trait Connector: Send + Sync {
    /// Log in and return a ready session
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteSession>>;
}
