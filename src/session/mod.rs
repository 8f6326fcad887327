//! Protocol session seam.
//!
//! The bootstrapper and the authentication chain drive the underlying SSH
//! library only through the traits here, so tests (and embedders with their
//! own transports) can substitute stand-ins for the real protocol stack.

pub mod ssh;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use russh::keys::PrivateKey;
use tokio::net::TcpStream;

use crate::config::ConnectConfig;
use crate::error::SessionError;

/// Operations on one protocol session, bound 1:1 to a transport stream.
///
/// A session is never handed out before its handshake completed; the
/// bootstrapper enforces that by obtaining sessions only through
/// [`SessionFactory::handshake`].
#[async_trait]
pub trait SessionOps: Send + std::fmt::Debug {
    /// Authenticate via the running key agent.
    async fn auth_agent(&mut self, user: &str) -> Result<(), SessionError>;

    /// Authenticate with a loaded private key.
    async fn auth_publickey(&mut self, user: &str, key: PrivateKey) -> Result<(), SessionError>;

    /// Authenticate with a password.
    async fn auth_password(&mut self, user: &str, password: &str) -> Result<(), SessionError>;

    /// Switch the authenticated session into its multiplex-ready state.
    /// Terminal: once active, a session never reverts.
    fn activate(&mut self);

    /// Whether [`activate`](SessionOps::activate) has run.
    fn is_ready(&self) -> bool;

    /// Close the session and its transport.
    async fn close(&mut self) -> Result<(), SessionError>;

    /// Whether the underlying transport is already closed.
    fn is_closed(&self) -> bool;
}

/// Binds fresh protocol sessions to freshly connected transports.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Construct a new session around `stream`, apply the user/host/port
    /// options from `config`, and run the protocol handshake.
    async fn handshake(
        &self,
        stream: TcpStream,
        config: &ConnectConfig,
    ) -> Result<Box<dyn SessionOps>, SessionError>;
}
