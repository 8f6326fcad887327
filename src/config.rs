//! Connection configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default number of connect + authenticate attempts.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default delay between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Well-known identity file names under `~/.ssh`, in the order the
/// authentication chain consults them.
const IDENTITY_FILE_NAMES: [&str; 3] = ["id_rsa", "id_dsa", "identity"];

/// Immutable settings for one logical connection.
///
/// Built once via [`ConnectConfig::builder`]; validation (user resolution,
/// private-key path checks) happens in [`ConnectConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Host name or IP to connect to.
    pub host: String,

    /// SSH port (default 22).
    pub port: u16,

    /// User to connect as. Defaults to the invoking OS identity.
    pub user: String,

    /// Password for password authentication; doubles as the passphrase for
    /// identity files.
    pub password: Option<SecretString>,

    /// Explicitly configured private key. When set, it is the only
    /// authentication method tried.
    pub pkey: Option<PathBuf>,

    /// Connection and authentication attempts before giving up.
    pub num_retries: u32,

    /// Delay between attempts.
    pub retry_delay: Duration,

    /// Whether to consult the running SSH agent.
    pub allow_agent: bool,

    /// Bounds the transport-level connect and sets the session's
    /// operational timeout.
    pub timeout: Option<Duration>,

    /// Route private-key file parsing through the runtime's blocking pool.
    pub auth_blocking_pool: bool,

    /// Identity files consulted when no explicit key is configured.
    identity_files: Vec<PathBuf>,
}

impl ConnectConfig {
    /// Start building a configuration for `host`.
    pub fn builder(host: impl Into<String>) -> ConnectConfigBuilder {
        ConnectConfigBuilder::new(host)
    }

    /// Identity files the authentication chain scans, in fixed order.
    pub fn identity_files(&self) -> &[PathBuf] {
        &self.identity_files
    }

    pub(crate) fn password_str(&self) -> Option<&str> {
        self.password.as_ref().map(ExposeSecret::expose_secret)
    }
}

/// Builder for [`ConnectConfig`].
///
/// Deserializable so host entries in surrounding systems' config files can
/// carry connection settings directly; `retry_delay` and `timeout` are
/// expressed in whole seconds there.
///
/// # Example
///
/// ```rust
/// use sshmoor::ConnectConfig;
///
/// let config = ConnectConfig::builder("192.0.2.10")
///     .user("ops")
///     .password("secret")
///     .num_retries(5)
///     .build()?;
/// assert_eq!(config.port, 22);
/// # Ok::<(), sshmoor::Error>(())
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectConfigBuilder {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    password: Option<SecretString>,
    #[serde(default, rename = "private_key")]
    pkey: Option<PathBuf>,
    #[serde(default = "default_retries")]
    num_retries: u32,
    #[serde(default = "default_retry_delay", deserialize_with = "duration_secs")]
    retry_delay: Duration,
    #[serde(default = "default_true")]
    allow_agent: bool,
    #[serde(default, deserialize_with = "opt_duration_secs")]
    timeout: Option<Duration>,
    #[serde(default = "default_true")]
    auth_blocking_pool: bool,
    #[serde(skip)]
    identity_files: Option<Vec<PathBuf>>,
}

impl ConnectConfigBuilder {
    fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: None,
            password: None,
            pkey: None,
            num_retries: default_retries(),
            retry_delay: default_retry_delay(),
            allow_agent: true,
            timeout: None,
            auth_blocking_pool: true,
            identity_files: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the user to connect as.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password (also used as identity-file passphrase).
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set an explicit private key path. Must be absolute or `~/…`.
    pub fn private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.pkey = Some(path.into());
        self
    }

    /// Set the attempt bound (default: 3).
    pub fn num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = num_retries;
        self
    }

    /// Set the delay between attempts (default: 5 s).
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Enable or disable agent authentication (default: enabled).
    pub fn allow_agent(mut self, allow_agent: bool) -> Self {
        self.allow_agent = allow_agent;
        self
    }

    /// Bound the transport connect and the session's operational timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Route key-file parsing through the blocking pool (default: true).
    pub fn auth_blocking_pool(mut self, enabled: bool) -> Self {
        self.auth_blocking_pool = enabled;
        self
    }

    /// Override the identity files scanned when no explicit key is set.
    /// Intended for tests and nonstandard key layouts.
    pub fn identity_files(mut self, files: Vec<PathBuf>) -> Self {
        self.identity_files = Some(files);
        self
    }

    /// Validate and produce the immutable [`ConnectConfig`].
    pub fn build(self) -> Result<ConnectConfig> {
        let user = match self.user {
            Some(user) => user,
            None => default_user().ok_or_else(|| {
                Error::Config(
                    "no user configured and no login name in the environment".to_string(),
                )
            })?,
        };
        let pkey = self.pkey.map(|path| validate_pkey_path(&path)).transpose()?;
        let identity_files = self
            .identity_files
            .unwrap_or_else(default_identity_files);
        Ok(ConnectConfig {
            host: self.host,
            port: self.port,
            user,
            password: self.password,
            pkey,
            num_retries: self.num_retries.max(1),
            retry_delay: self.retry_delay,
            allow_agent: self.allow_agent,
            timeout: self.timeout,
            auth_blocking_pool: self.auth_blocking_pool,
            identity_files,
        })
    }
}

fn default_port() -> u16 {
    22
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_delay() -> Duration {
    RETRY_DELAY
}

fn default_true() -> bool {
    true
}

// Durations deserialize from whole seconds, the shape host files carry.
fn duration_secs<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

fn opt_duration_secs<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = Option::<u64>::deserialize(deserializer)?;
    Ok(secs.map(Duration::from_secs))
}

/// Login name of the invoking OS identity, if the environment carries one.
fn default_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// An explicit key path must be absolute, or `~/…` relative to the home
/// directory. Anything else is rejected before any connection is opened.
fn validate_pkey_path(path: &Path) -> Result<PathBuf> {
    if let Ok(stripped) = path.strip_prefix("~") {
        let home = home_dir().ok_or_else(|| {
            Error::Config(format!(
                "cannot expand private key path {}: no home directory",
                path.display()
            ))
        })?;
        return Ok(home.join(stripped));
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Err(Error::Config(format!(
        "private key path {} must be absolute or start with ~/",
        path.display()
    )))
}

fn default_identity_files() -> Vec<PathBuf> {
    match home_dir() {
        Some(home) => IDENTITY_FILE_NAMES
            .iter()
            .map(|name| home.join(".ssh").join(name))
            .collect(),
        None => Vec::new(),
    }
}
