//! Error types for sshmoor.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for connection establishment.
///
/// Exhausting retries always yields exactly one of the attributable kinds
/// below (resolution vs. connection vs. authentication), never a bare
/// protocol-library error.
#[derive(Error, Debug)]
pub enum Error {
    /// Name resolution failed and retries are exhausted.
    #[error("unknown host {host}:{port} (after {attempts} attempts): {source}")]
    UnknownHost {
        host: String,
        port: u16,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// Transport connect or protocol handshake failed, retries exhausted.
    #[error("error connecting to {host}:{port} (after {attempts} attempts): {source}")]
    Connection {
        host: String,
        port: u16,
        attempts: u32,
        #[source]
        source: SessionError,
    },

    /// Every applicable authentication method failed, or an explicitly
    /// configured private key failed outright.
    #[error("authentication error for {user}@{host}:{port}: {source}")]
    Authentication {
        host: String,
        port: u16,
        user: String,
        #[source]
        source: AuthError,
    },

    /// Invalid connection configuration (missing user, bad key path).
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Protocol- or transport-level failure inside one attempt.
#[derive(Error, Debug)]
pub enum SessionError {
    /// SSH protocol error from the underlying library.
    #[error("ssh protocol error: {0}")]
    Ssh(#[from] russh::Error),

    /// Socket-level I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The server rejected the credentials for one method.
    #[error("server rejected {method} authentication for user '{user}'")]
    AuthRejected { method: &'static str, user: String },

    /// The key agent was unreachable or unusable.
    #[error("ssh agent error: {0}")]
    Agent(String),
}

/// Outcome of an exhausted or short-circuited authentication chain.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The explicitly configured private key could not be loaded.
    /// Explicit key failures disable all fallback.
    #[error("explicit private key: {0}")]
    ExplicitKeyLoad(#[source] KeyLoadError),

    /// The explicitly configured private key was rejected by the server.
    #[error("explicit private key {path}: {source}")]
    ExplicitKey {
        path: PathBuf,
        #[source]
        source: SessionError,
    },

    /// Agent authentication failed. Only surfaced through logs in the
    /// chain itself; kept as a cause for diagnostics.
    #[error("agent authentication failed: {0}")]
    Agent(#[source] SessionError),

    /// No identity file (and no earlier method) authenticated the user.
    #[error("no authentication methods succeeded")]
    NoMethodsSucceeded,

    /// The terminal password attempt failed.
    #[error("password authentication failed: {0}")]
    Password(#[source] SessionError),
}

/// A candidate private-key file could not be read or parsed.
///
/// Absorbed by the identity-file scan (the next candidate is tried); only
/// an explicitly configured key surfaces it, as the cause of
/// [`AuthError::ExplicitKeyLoad`].
#[derive(Error, Debug)]
pub enum KeyLoadError {
    /// The file could not be read.
    #[error("cannot read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but does not parse as a (decryptable) private key.
    #[error("cannot parse key file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: russh::keys::Error,
    },
}

impl KeyLoadError {
    /// Path of the offending key file.
    pub fn path(&self) -> &std::path::Path {
        match self {
            KeyLoadError::Io { path, .. } | KeyLoadError::Parse { path, .. } => path,
        }
    }
}

/// Result type alias using sshmoor's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
