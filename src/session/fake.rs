//! Scripted protocol stand-ins for exercising the bootstrapper and the
//! authentication chain without a real SSH peer.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use russh::keys::{Algorithm, PrivateKey, PublicKey};
use tokio::net::TcpStream;

use super::{SessionFactory, SessionOps};
use crate::config::ConnectConfig;
use crate::error::{KeyLoadError, SessionError};
use crate::keys::KeyLoader;

/// Shared record of every operation invoked, across sessions and loaders.
pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub(crate) fn generate_key() -> PrivateKey {
    PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519).unwrap()
}

/// A local listener that accepts and immediately drops connections, so the
/// transport connector has something real to connect to.
pub(crate) async fn accept_loop() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            drop(stream);
        }
    });
    port
}

/// Scripted session: which methods succeed, with every call recorded.
#[derive(Debug)]
pub(crate) struct FakeSession {
    pub log: CallLog,
    pub agent_ok: bool,
    pub accepted_keys: Vec<PublicKey>,
    pub password_ok: bool,
    pub ready: bool,
    pub closed: bool,
    pub close_calls: Arc<AtomicUsize>,
}

impl FakeSession {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            agent_ok: false,
            accepted_keys: Vec::new(),
            password_ok: false,
            ready: false,
            closed: false,
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_agent(mut self) -> Self {
        self.agent_ok = true;
        self
    }

    pub fn with_password(mut self) -> Self {
        self.password_ok = true;
        self
    }

    pub fn accepting(mut self, key: &PrivateKey) -> Self {
        self.accepted_keys.push(key.public_key().clone());
        self
    }

    fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }
}

#[async_trait]
impl SessionOps for FakeSession {
    async fn auth_agent(&mut self, user: &str) -> Result<(), SessionError> {
        self.record(format!("agent:{user}"));
        if self.agent_ok {
            Ok(())
        } else {
            Err(SessionError::Agent("scripted agent failure".to_string()))
        }
    }

    async fn auth_publickey(&mut self, user: &str, key: PrivateKey) -> Result<(), SessionError> {
        self.record(format!("publickey:{user}"));
        if self.accepted_keys.iter().any(|k| k == key.public_key()) {
            Ok(())
        } else {
            Err(SessionError::AuthRejected {
                method: "publickey",
                user: user.to_string(),
            })
        }
    }

    async fn auth_password(&mut self, user: &str, _password: &str) -> Result<(), SessionError> {
        self.record(format!("password:{user}"));
        if self.password_ok {
            Ok(())
        } else {
            Err(SessionError::AuthRejected {
                method: "password",
                user: user.to_string(),
            })
        }
    }

    fn activate(&mut self) {
        self.record("activate");
        self.ready = true;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.record("close");
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// One scripted attempt generation.
pub(crate) enum Generation {
    HandshakeFail,
    Session(FakeSession),
}

/// Factory handing out one scripted [`Generation`] per handshake.
pub(crate) struct FakeFactory {
    script: Mutex<VecDeque<Generation>>,
    pub handshakes: AtomicUsize,
}

impl FakeFactory {
    pub fn new(script: Vec<Generation>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            handshakes: AtomicUsize::new(0),
        }
    }

    pub fn handshake_count(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn handshake(
        &self,
        _stream: TcpStream,
        _config: &ConnectConfig,
    ) -> Result<Box<dyn SessionOps>, SessionError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Generation::Session(session)) => Ok(Box::new(session)),
            Some(Generation::HandshakeFail) => Err(SessionError::Io(io::Error::other(
                "scripted handshake failure",
            ))),
            None => Err(SessionError::Io(io::Error::other("script exhausted"))),
        }
    }
}

/// Key loader scripted per path: mapped paths load, all others fail.
pub(crate) struct FakeKeyLoader {
    keys: HashMap<PathBuf, PrivateKey>,
    pub log: CallLog,
}

impl FakeKeyLoader {
    pub fn empty(log: CallLog) -> Self {
        Self {
            keys: HashMap::new(),
            log,
        }
    }

    pub fn with_key(mut self, path: impl Into<PathBuf>, key: &PrivateKey) -> Self {
        self.keys.insert(path.into(), key.clone());
        self
    }
}

#[async_trait]
impl KeyLoader for FakeKeyLoader {
    async fn load(
        &self,
        path: &Path,
        _passphrase: Option<&str>,
    ) -> Result<PrivateKey, KeyLoadError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("load:{}", path.display()));
        match self.keys.get(path) {
            Some(key) => Ok(key.clone()),
            None => Err(KeyLoadError::Io {
                path: path.to_path_buf(),
                source: io::Error::other("scripted load failure"),
            }),
        }
    }
}
