//! Connection handle and lifecycle.

use futures_util::future::BoxFuture;
use log::debug;

use crate::bootstrap;
use crate::config::ConnectConfig;
use crate::error::Result;
use crate::keys::{FsKeyLoader, KeyLoader};
use crate::session::ssh::RusshFactory;
use crate::session::{SessionFactory, SessionOps};

/// An established, authenticated, multiplex-ready SSH connection.
///
/// Owns exactly one session (and through it, one transport). Dropping the
/// handle tears the transport down; [`disconnect`](Connection::disconnect)
/// is the graceful path and is safe to call any number of times.
pub struct Connection {
    config: ConnectConfig,
    session: Option<Box<dyn SessionOps>>,
}

impl Connection {
    /// Connect, handshake and authenticate. Returns only once the session
    /// is ready for multiplexed I/O, or with a typed error after the
    /// configured retries are exhausted.
    pub async fn connect(config: ConnectConfig) -> Result<Self> {
        let keys = FsKeyLoader {
            use_blocking_pool: config.auth_blocking_pool,
        };
        Self::connect_with(config, &RusshFactory::default(), &keys).await
    }

    /// Like [`connect`](Connection::connect), with the session factory and
    /// key loader injected. The seam tests and embedders use to substitute
    /// protocol stand-ins.
    pub async fn connect_with(
        config: ConnectConfig,
        factory: &dyn SessionFactory,
        keys: &dyn KeyLoader,
    ) -> Result<Self> {
        let session = bootstrap::bootstrap(&config, factory, keys).await?;
        Ok(Self {
            config,
            session: Some(session),
        })
    }

    /// Run `body` against a fresh connection, disconnecting on every exit
    /// path: normal return, early return, or error.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use sshmoor::{ConnectConfig, Connection};
    ///
    /// # async fn example() -> sshmoor::Result<()> {
    /// let config = ConnectConfig::builder("192.0.2.10").user("ops").build()?;
    /// Connection::scoped(config, |conn| {
    ///     let connected = conn.is_connected();
    ///     Box::pin(async move {
    ///         assert!(connected);
    ///         Ok(())
    ///     })
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<T, F>(config: ConnectConfig, body: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut Connection) -> BoxFuture<'a, Result<T>>,
    {
        let keys = FsKeyLoader {
            use_blocking_pool: config.auth_blocking_pool,
        };
        Self::scoped_with(config, &RusshFactory::default(), &keys, body).await
    }

    /// [`scoped`](Connection::scoped) with injected factory and key loader.
    pub async fn scoped_with<T, F>(
        config: ConnectConfig,
        factory: &dyn SessionFactory,
        keys: &dyn KeyLoader,
        body: F,
    ) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut Connection) -> BoxFuture<'a, Result<T>>,
    {
        let mut conn = Self::connect_with(config, factory, keys).await?;
        let result = body(&mut conn).await;
        conn.disconnect().await;
        result
    }

    /// Host this connection was established to.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Port this connection was established to.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// User the session authenticated as.
    pub fn user(&self) -> &str {
        &self.config.user
    }

    /// Whether the handle still owns a live session.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The multiplex-ready session, for channel and SFTP collaborators.
    /// `None` once disconnected.
    pub fn session_mut(&mut self) -> Option<&mut (dyn SessionOps + 'static)> {
        self.session.as_deref_mut()
    }

    /// Close the session and its transport. Only the first call performs
    /// the close; later calls are no-ops.
    pub async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if session.is_closed() {
            return;
        }
        if let Err(err) = session.close().await {
            debug!(
                "disconnect from {}:{}: {err}",
                self.config.host, self.config.port
            );
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Dropping the session handle tears down the transport; explicit
        // disconnect beforehand is the graceful path.
        if self.session.is_some() {
            debug!(
                "connection to {}:{} dropped without disconnect",
                self.config.host, self.config.port
            );
        }
    }
}
