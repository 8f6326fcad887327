//! Private-key loading.

use std::path::Path;

use async_trait::async_trait;
use log::debug;
use russh::keys::PrivateKey;

use crate::error::KeyLoadError;

/// Loads private keys for the authentication chain.
///
/// A trait so the chain can be exercised without real key material; the
/// production implementation is [`FsKeyLoader`].
#[async_trait]
pub trait KeyLoader: Send + Sync {
    /// Load the key at `path`, decrypting with `passphrase` when given.
    async fn load(
        &self,
        path: &Path,
        passphrase: Option<&str>,
    ) -> Result<PrivateKey, KeyLoadError>;
}

/// Loads OpenSSH/PEM key files from disk.
#[derive(Debug, Clone, Copy)]
pub struct FsKeyLoader {
    /// Parse on the runtime's blocking pool, so slow key material (large
    /// RSA keys, encrypted files) cannot stall the reactor that other
    /// connections' I/O runs on.
    pub use_blocking_pool: bool,
}

#[async_trait]
impl KeyLoader for FsKeyLoader {
    async fn load(
        &self,
        path: &Path,
        passphrase: Option<&str>,
    ) -> Result<PrivateKey, KeyLoadError> {
        if self.use_blocking_pool {
            let path_owned = path.to_path_buf();
            let passphrase_owned = passphrase.map(str::to_owned);
            tokio::task::spawn_blocking(move || {
                load_sync(&path_owned, passphrase_owned.as_deref())
            })
            .await
            .map_err(|join_err| KeyLoadError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(join_err),
            })?
        } else {
            load_sync(path, passphrase)
        }
    }
}

fn load_sync(path: &Path, passphrase: Option<&str>) -> Result<PrivateKey, KeyLoadError> {
    debug!("loading private key {}", path.display());
    russh::keys::load_secret_key(path, passphrase).map_err(|source| KeyLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
