//! Whole-sequence establishment: connect, handshake, authenticate.
//!
//! A transient transport failure, a handshake failure and an authentication
//! failure all count against the same bound; each retry redoes the entire
//! sequence on a fresh transport rather than reusing a half-broken one.

use log::{debug, error};
use tokio::time::sleep;

use crate::auth;
use crate::config::ConnectConfig;
use crate::error::Error;
use crate::keys::KeyLoader;
use crate::session::{SessionFactory, SessionOps};
use crate::transport::connect_transport;

/// Attempt counter shared by the transport connector and the bootstrapper
/// for one logical establishment. Created fresh per connection, never
/// reset mid-lifecycle.
#[derive(Debug)]
pub(crate) struct RetryCounter {
    attempt: u32,
    limit: u32,
}

impl RetryCounter {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            attempt: 1,
            limit: limit.max(1),
        }
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn limit(&self) -> u32 {
        self.limit
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.attempt >= self.limit
    }

    pub(crate) fn bump(&mut self) {
        self.attempt += 1;
    }
}

/// Run connect → handshake → authenticate until a session is ready or the
/// attempt bound is exhausted, then hand back the multiplex-ready session.
pub(crate) async fn bootstrap(
    config: &ConnectConfig,
    factory: &dyn SessionFactory,
    keys: &dyn KeyLoader,
) -> Result<Box<dyn SessionOps>, Error> {
    let mut retries = RetryCounter::new(config.num_retries);
    loop {
        let stream = connect_transport(config, &mut retries).await?;

        let mut session = match factory.handshake(stream, config).await {
            Ok(session) => session,
            Err(source) => {
                if retries.exhausted() {
                    error!(
                        "error connecting to {}:{} - {source}",
                        config.host, config.port
                    );
                    return Err(Error::Connection {
                        host: config.host.clone(),
                        port: config.port,
                        attempts: retries.attempt(),
                        source,
                    });
                }
                debug!(
                    "handshake with {}:{} failed (attempt {}/{}): {source}",
                    config.host,
                    config.port,
                    retries.attempt(),
                    retries.limit(),
                );
                retries.bump();
                sleep(config.retry_delay).await;
                continue;
            }
        };

        match auth::authenticate(session.as_mut(), config, keys).await {
            Ok(()) => {
                session.activate();
                debug!(
                    "session to {}:{} ready for multiplexed i/o",
                    config.host, config.port
                );
                return Ok(session);
            }
            Err(source) => {
                // The failed generation's session and transport are
                // discarded before a new transport is opened.
                drop(session);
                if retries.exhausted() {
                    return Err(Error::Authentication {
                        host: config.host.clone(),
                        port: config.port,
                        user: config.user.clone(),
                        source,
                    });
                }
                debug!(
                    "authentication with {}:{} failed (attempt {}/{}): {source}",
                    config.host,
                    config.port,
                    retries.attempt(),
                    retries.limit(),
                );
                retries.bump();
                sleep(config.retry_delay).await;
            }
        }
    }
}
