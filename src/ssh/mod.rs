pub mod session;
pub mod sftp;

use async_trait::async_trait;
use russh::keys::PrivateKey;
use std::path::Path;
use std::sync::Arc;

/// One way of proving who we are to the server.
#[derive(Clone, Debug)]
pub enum AuthMethod {
    Password(String),
    /// Every prompt is answered with this secret.
    KeyboardInteractive(String),
    PublicKey(Arc<PrivateKey>),
}

/// Authentication methods, tried in order until one is accepted.
#[derive(Clone, Debug, Default)]
pub struct AuthChain {
    pub methods: Vec<AuthMethod>,
}

impl AuthChain {
    /// Password, then keyboard-interactive, then the private key at
    /// `key_path` if it can be read and decoded.
    pub fn new(secret: &str, key_path: Option<&Path>) -> Self {
        let mut methods = vec![
            AuthMethod::Password(secret.to_string()),
            AuthMethod::KeyboardInteractive(secret.to_string()),
        ];

        if let Some(key) = key_path.and_then(load_key) {
            methods.push(AuthMethod::PublicKey(Arc::new(key)));
        }

        Self { methods }
    }

    pub fn has_public_key(&self) -> bool {
        self.methods
            .iter()
            .any(|m| matches!(m, AuthMethod::PublicKey(_)))
    }
}

fn load_key(path: &Path) -> Option<PrivateKey> {
    let pem = match std::fs::read_to_string(path) {
        Ok(pem) => pem,
        Err(e) => {
            log::debug!("No private key at {}: {}", path.display(), e);
            return None;
        }
    };

    match russh::keys::decode_secret_key(&pem, None) {
        Ok(key) => Some(key),
        Err(e) => {
            log::debug!("Ignoring private key {}: {}", path.display(), e);
            None
        }
    }
}

/// What a stat on the remote side tells us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteStat {
    pub is_dir: bool,
    pub permissions: Option<u32>,
}

/// File operations on the remote host.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// Create (or truncate) `path` and write `data` to it.
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), anyhow::Error>;

    async fn set_permissions(&self, path: &str, mode: u32) -> Result<(), anyhow::Error>;

    async fn stat(&self, path: &str) -> Result<RemoteStat, anyhow::Error>;

    async fn create_dir(&self, path: &str) -> Result<(), anyhow::Error>;

    async fn remove_file(&self, path: &str) -> Result<(), anyhow::Error>;

    async fn close(&self) -> Result<(), anyhow::Error>;
}

/// How a remote command ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteExit {
    Status(u32),
    Signal(String),
    /// The channel closed without reporting an exit status.
    Unknown,
}

impl RemoteExit {
    pub fn success(&self) -> bool {
        matches!(self, RemoteExit::Status(0))
    }
}

/// A single-use command execution channel.
#[async_trait]
pub trait ExecChannel: Send {
    /// Run `command`, appending stdout and stderr to `output` as they arrive.
    async fn run(&mut self, command: &str, output: &mut Vec<u8>)
        -> Result<RemoteExit, anyhow::Error>;

    async fn close(self) -> Result<(), anyhow::Error>;
}

/// An authenticated connection able to hand out file-transfer and command
/// channels.
#[async_trait]
pub trait Transport: Send + Sync {
    type Fs: RemoteFs;
    type Channel: ExecChannel;

    async fn open_sftp(&self) -> Result<Self::Fs, anyhow::Error>;

    async fn open_exec(&self) -> Result<Self::Channel, anyhow::Error>;

    async fn disconnect(self) -> Result<(), anyhow::Error>;
}
