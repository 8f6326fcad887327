//! Layered authentication chain.
//!
//! An explicit ordered list of strategies, each carrying its own failure
//! policy. The chain short-circuits on the first success.

use std::path::PathBuf;

use log::debug;
use secrecy::{ExposeSecret, SecretString};

use crate::config::ConnectConfig;
use crate::error::AuthError;
use crate::keys::KeyLoader;
use crate::session::SessionOps;

/// What a strategy's failure means for the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailurePolicy {
    /// Stop the chain and surface the failure.
    Propagate,
    /// Log and continue with the next strategy.
    FallThrough,
}

/// One authentication strategy, tried in plan order.
#[derive(Debug, Clone)]
pub(crate) enum Method {
    ExplicitKey(PathBuf),
    Agent,
    IdentityScan,
    Password(SecretString),
}

impl Method {
    fn name(&self) -> &'static str {
        match self {
            Method::ExplicitKey(_) => "explicit-key",
            Method::Agent => "agent",
            Method::IdentityScan => "identity-scan",
            Method::Password(_) => "password",
        }
    }
}

/// Build the ordered strategy list for `config`.
///
/// An explicit private key is exclusive: the user chose a key, so no
/// fallback is planned at all and its failure is fatal for the attempt.
/// The identity scan propagates its failure unless a password remains to
/// fall through to; the password attempt, when planned, is terminal.
pub(crate) fn plan(config: &ConnectConfig) -> Vec<(Method, FailurePolicy)> {
    if let Some(pkey) = &config.pkey {
        return vec![(Method::ExplicitKey(pkey.clone()), FailurePolicy::Propagate)];
    }
    let mut chain = Vec::new();
    if config.allow_agent {
        chain.push((Method::Agent, FailurePolicy::FallThrough));
    }
    let scan_policy = if config.password.is_some() {
        FailurePolicy::FallThrough
    } else {
        FailurePolicy::Propagate
    };
    chain.push((Method::IdentityScan, scan_policy));
    if let Some(password) = &config.password {
        chain.push((Method::Password(password.clone()), FailurePolicy::Propagate));
    }
    chain
}

/// Run the chain against an established (handshaken) session.
pub(crate) async fn authenticate(
    session: &mut dyn SessionOps,
    config: &ConnectConfig,
    keys: &dyn KeyLoader,
) -> Result<(), AuthError> {
    let mut last = AuthError::NoMethodsSucceeded;
    for (method, policy) in plan(config) {
        let name = method.name();
        match try_method(method, session, config, keys).await {
            Ok(()) => {
                debug!("{name} authentication succeeded for user '{}'", config.user);
                return Ok(());
            }
            Err(err) => match policy {
                FailurePolicy::Propagate => return Err(err),
                FailurePolicy::FallThrough => {
                    debug!("{name} authentication failed ({err}), continuing with other methods");
                    last = err;
                }
            },
        }
    }
    Err(last)
}

async fn try_method(
    method: Method,
    session: &mut dyn SessionOps,
    config: &ConnectConfig,
    keys: &dyn KeyLoader,
) -> Result<(), AuthError> {
    match method {
        Method::ExplicitKey(path) => {
            debug!("proceeding with explicit private key {}", path.display());
            let key = keys
                .load(&path, config.password_str())
                .await
                .map_err(AuthError::ExplicitKeyLoad)?;
            session
                .auth_publickey(&config.user, key)
                .await
                .map_err(|source| AuthError::ExplicitKey { path, source })
        }
        Method::Agent => session
            .auth_agent(&config.user)
            .await
            .map_err(AuthError::Agent),
        Method::IdentityScan => identity_auth(session, config, keys).await,
        Method::Password(password) => session
            .auth_password(&config.user, password.expose_secret())
            .await
            .map_err(AuthError::Password),
    }
}

/// Scan the fixed identity-file list. A load failure or a server rejection
/// both skip to the next candidate; the first file that loads and
/// authenticates wins.
async fn identity_auth(
    session: &mut dyn SessionOps,
    config: &ConnectConfig,
    keys: &dyn KeyLoader,
) -> Result<(), AuthError> {
    for file in config.identity_files() {
        match tokio::fs::metadata(file).await {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }
        debug!("trying identity file {}", file.display());
        let key = match keys.load(file, config.password_str()).await {
            Ok(key) => key,
            Err(err) => {
                debug!("skipping identity file {}: {err}", file.display());
                continue;
            }
        };
        match session.auth_publickey(&config.user, key).await {
            Ok(()) => {
                debug!("authentication succeeded with identity file {}", file.display());
                return Ok(());
            }
            Err(err) => {
                debug!(
                    "identity file {} rejected ({err}), continuing with other identities",
                    file.display()
                );
            }
        }
    }
    Err(AuthError::NoMethodsSucceeded)
}
