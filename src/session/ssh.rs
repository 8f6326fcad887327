//! russh-backed protocol session.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use russh::client::{self, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg, PublicKey};
use tokio::net::TcpStream;

use super::{SessionFactory, SessionOps};
use crate::config::ConnectConfig;
use crate::error::SessionError;

/// Host key acceptance policy, applied during the handshake.
///
/// Verification itself is delegated to the protocol library's known-hosts
/// handling; this only selects what to do with its verdict.
#[derive(Debug, Clone, Default)]
pub enum HostKeyPolicy {
    /// Accept and record unknown keys, reject changed keys.
    #[default]
    AcceptNew,

    /// Reject any key not already in known_hosts.
    Strict,

    /// Accept every key without checking. Testing and lab use only.
    Insecure,
}

/// [`SessionFactory`] producing sessions backed by a russh client handle.
#[derive(Debug, Clone, Default)]
pub struct RusshFactory {
    policy: HostKeyPolicy,
}

impl RusshFactory {
    pub fn new(policy: HostKeyPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl SessionFactory for RusshFactory {
    async fn handshake(
        &self,
        stream: TcpStream,
        config: &ConnectConfig,
    ) -> Result<Box<dyn SessionOps>, SessionError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: config.timeout,
            ..Default::default()
        });
        let handler = HostKeyHandler {
            host: config.host.clone(),
            port: config.port,
            policy: self.policy.clone(),
        };
        debug!("negotiating ssh handshake with {}:{}", config.host, config.port);
        let handle = client::connect_stream(ssh_config, stream, handler).await?;
        Ok(Box::new(RusshSession {
            handle,
            ready: false,
        }))
    }
}

/// One SSH session bound to one transport stream.
pub struct RusshSession {
    handle: Handle<HostKeyHandler>,
    ready: bool,
}

impl std::fmt::Debug for RusshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshSession")
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl RusshSession {
    /// The underlying multiplexing handle, for channel and SFTP
    /// collaborators layered on top of an established connection.
    pub fn handle(&mut self) -> &mut Handle<HostKeyHandler> {
        &mut self.handle
    }
}

#[async_trait]
impl SessionOps for RusshSession {
    async fn auth_agent(&mut self, user: &str) -> Result<(), SessionError> {
        let mut agent = AgentClient::connect_env()
            .await
            .map_err(|err| SessionError::Agent(err.to_string()))?;
        let identities = agent
            .request_identities()
            .await
            .map_err(|err| SessionError::Agent(err.to_string()))?;
        if identities.is_empty() {
            return Err(SessionError::Agent("agent holds no identities".to_string()));
        }
        let hash = self.handle.best_supported_rsa_hash().await?.flatten();
        for identity in identities {
            match self
                .handle
                .authenticate_publickey_with(user, identity, hash, &mut agent)
                .await
            {
                Ok(result) if result.success() => return Ok(()),
                Ok(_) => continue,
                Err(err) => {
                    debug!("agent identity not accepted: {err}");
                    continue;
                }
            }
        }
        Err(SessionError::AuthRejected {
            method: "agent",
            user: user.to_string(),
        })
    }

    async fn auth_publickey(&mut self, user: &str, key: PrivateKey) -> Result<(), SessionError> {
        let hash = self.handle.best_supported_rsa_hash().await?.flatten();
        let result = self
            .handle
            .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash))
            .await?;
        if result.success() {
            Ok(())
        } else {
            Err(SessionError::AuthRejected {
                method: "publickey",
                user: user.to_string(),
            })
        }
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<(), SessionError> {
        let result = self.handle.authenticate_password(user, password).await?;
        if result.success() {
            Ok(())
        } else {
            Err(SessionError::AuthRejected {
                method: "password",
                user: user.to_string(),
            })
        }
    }

    fn activate(&mut self) {
        // The operational timeout was applied as the session's inactivity
        // timeout during the handshake; activation is the one-way switch
        // into multiplex-ready state.
        self.ready = true;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

/// Handler deciding what to do with the server's host key.
pub struct HostKeyHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl client::Handler for HostKeyHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.policy {
            HostKeyPolicy::Insecure => Ok(true),

            HostKeyPolicy::AcceptNew => {
                match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
                    Ok(true) => Ok(true),
                    Ok(false) => {
                        if let Err(err) = russh::keys::known_hosts::learn_known_hosts(
                            &self.host,
                            self.port,
                            server_public_key,
                        ) {
                            warn!(
                                "failed to record host key for {}:{}: {err}",
                                self.host, self.port
                            );
                        }
                        Ok(true)
                    }
                    Err(err) => {
                        warn!("host key for {}:{} rejected: {err}", self.host, self.port);
                        Ok(false)
                    }
                }
            }

            HostKeyPolicy::Strict => {
                match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
                    Ok(matched) => Ok(matched),
                    Err(err) => {
                        warn!("host key for {}:{} rejected: {err}", self.host, self.port);
                        Ok(false)
                    }
                }
            }
        }
    }
}
