//! Transport connector: raw TCP with bounded retry.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, warn};
use tokio::net::{TcpStream, lookup_host};
use tokio::time::{sleep, timeout};

use crate::bootstrap::RetryCounter;
use crate::config::ConnectConfig;
use crate::error::{Error, SessionError};

/// Open a TCP stream to the configured host, retrying with the shared
/// attempt counter. Name-resolution failures and socket failures retry the
/// same way but exhaust into distinct error kinds, since they call for
/// different remediation.
pub(crate) async fn connect_transport(
    config: &ConnectConfig,
    retries: &mut RetryCounter,
) -> Result<TcpStream, Error> {
    loop {
        match attempt_connect(config).await {
            Ok(stream) => return Ok(stream),
            Err(failure) => {
                warn!(
                    "connect to {}:{} failed (attempt {}/{}): {failure}",
                    config.host,
                    config.port,
                    retries.attempt(),
                    retries.limit(),
                );
                if retries.exhausted() {
                    return Err(failure.into_error(config, retries.attempt()));
                }
                retries.bump();
                sleep(config.retry_delay).await;
            }
        }
    }
}

/// One connection attempt: resolve, then try each resolved address.
async fn attempt_connect(config: &ConnectConfig) -> Result<TcpStream, ConnectFailure> {
    let addrs: Vec<SocketAddr> = lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(ConnectFailure::Resolution)?
        .collect();
    if addrs.is_empty() {
        return Err(ConnectFailure::Resolution(io::Error::new(
            io::ErrorKind::NotFound,
            "name resolved to no addresses",
        )));
    }
    debug!("connecting to {}:{}", config.host, config.port);
    let mut last_err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses attempted");
    for addr in addrs {
        match connect_addr(addr, config.timeout).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = err,
        }
    }
    Err(ConnectFailure::Socket(last_err))
}

async fn connect_addr(addr: SocketAddr, limit: Option<Duration>) -> io::Result<TcpStream> {
    match limit {
        Some(duration) => timeout(duration, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {addr} timed out after {duration:?}"),
                )
            })?,
        None => TcpStream::connect(addr).await,
    }
}

/// Why a single connect attempt failed. Kept apart so exhaustion surfaces
/// as [`Error::UnknownHost`] vs. [`Error::Connection`].
enum ConnectFailure {
    Resolution(io::Error),
    Socket(io::Error),
}

impl ConnectFailure {
    fn into_error(self, config: &ConnectConfig, attempts: u32) -> Error {
        match self {
            ConnectFailure::Resolution(source) => Error::UnknownHost {
                host: config.host.clone(),
                port: config.port,
                attempts,
                source,
            },
            ConnectFailure::Socket(source) => Error::Connection {
                host: config.host.clone(),
                port: config.port,
                attempts,
                source: SessionError::Io(source),
            },
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectFailure::Resolution(err) => write!(f, "name resolution failed: {err}"),
            ConnectFailure::Socket(err) => write!(f, "socket error: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    fn config(host: &str, port: u16, retries: u32, delay: Duration) -> ConnectConfig {
        ConnectConfig::builder(host)
            .user("test")
            .port(port)
            .num_retries(retries)
            .retry_delay(delay)
            .build()
            .unwrap()
    }

    /// Bind then drop a local listener so the port is free but closed.
    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn unreachable_port_exhausts_into_connection_error() {
        let port = closed_port().await;
        let config = config("127.0.0.1", port, 3, Duration::from_millis(25));
        let mut retries = RetryCounter::new(config.num_retries);

        let started = Instant::now();
        let err = connect_transport(&config, &mut retries).await.unwrap_err();
        let elapsed = started.elapsed();

        match err {
            Error::Connection { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Connection error, got {other:?}"),
        }
        // Three attempts mean exactly two inter-attempt delays.
        assert!(elapsed >= Duration::from_millis(50), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn unresolvable_host_exhausts_into_unknown_host() {
        let config = config(
            "host.that-does-not-resolve.invalid",
            22,
            2,
            Duration::ZERO,
        );
        let mut retries = RetryCounter::new(config.num_retries);

        let err = connect_transport(&config, &mut retries).await.unwrap_err();
        match err {
            Error::UnknownHost { attempts, host, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(host, "host.that-does-not-resolve.invalid");
            }
            other => panic!("expected UnknownHost error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connects_to_live_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let config = config("127.0.0.1", port, 1, Duration::ZERO);
        let mut retries = RetryCounter::new(config.num_retries);
        let stream = connect_transport(&config, &mut retries).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
        assert_eq!(retries.attempt(), 1);
    }

    #[tokio::test]
    async fn shared_counter_continues_across_callers() {
        // A counter already at its bound fails without sleeping.
        let port = closed_port().await;
        let config = config("127.0.0.1", port, 3, Duration::from_secs(60));
        let mut retries = RetryCounter::new(config.num_retries);
        retries.bump();
        retries.bump();
        assert!(retries.exhausted());

        let started = Instant::now();
        let err = connect_transport(&config, &mut retries).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, Error::Connection { attempts: 3, .. }));
    }
}
