//! # sshmoor
//!
//! Resilient async SSH connection bootstrap: one authenticated connection
//! per handle, with bounded whole-sequence retries and a layered,
//! fail-soft authentication chain.
//!
//! The crate covers connect → handshake → authenticate → hand off. Command
//! execution, channels and SFTP are external collaborators that consume the
//! multiplex-ready session a [`Connection`] produces.
//!
//! ## Retry model
//!
//! One attempt counter spans the transport connect, the protocol handshake
//! and authentication. Any failure discards the whole generation (socket
//! and session) and redoes the full sequence after `retry_delay`, up to
//! `num_retries` attempts, then surfaces a single typed error: unknown
//! host, connection, or authentication.
//!
//! ## Authentication chain
//!
//! Explicitly configured private key (exclusive, failure is fatal), then
//! agent (failure swallowed), then the fixed identity files `~/.ssh/id_rsa`,
//! `~/.ssh/id_dsa`, `~/.ssh/identity` (each load or auth failure skips to
//! the next), then password as the terminal fallback.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sshmoor::{ConnectConfig, Connection};
//!
//! #[tokio::main]
//! async fn main() -> sshmoor::Result<()> {
//!     let config = ConnectConfig::builder("192.0.2.10")
//!         .user("ops")
//!         .password("secret")
//!         .build()?;
//!
//!     let mut conn = Connection::connect(config).await?;
//!     // hand conn.session_mut() to channel / SFTP collaborators
//!     conn.disconnect().await;
//!     Ok(())
//! }
//! ```

mod auth;
mod bootstrap;
pub mod config;
pub mod connection;
pub mod error;
pub mod keys;
pub mod session;
mod transport;

// Re-export main types for convenience
pub use config::{ConnectConfig, ConnectConfigBuilder, DEFAULT_RETRIES, RETRY_DELAY};
pub use connection::Connection;
pub use error::{AuthError, Error, KeyLoadError, Result, SessionError};
pub use keys::{FsKeyLoader, KeyLoader};
pub use session::ssh::{HostKeyPolicy, RusshFactory, RusshSession};
pub use session::{SessionFactory, SessionOps};
