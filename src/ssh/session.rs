use super::sftp::SftpClient;
use super::{AuthChain, AuthMethod, ExecChannel, RemoteExit, Transport};
use crate::error::Error;
use async_trait::async_trait;
use russh::keys::*;
use russh::*;
use std::sync::Arc;

/// An authenticated SSH connection to the target host.
pub struct SshSession {
    host: String,
    port: u16,
    handle: client::Handle<SshHandler>,
}

/// Minimal SSH client handler.
struct SshHandler;

impl client::Handler for SshHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        log::warn!(
            "Accepting server key {} without verification",
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}

impl SshSession {
    /// Connect to `host:port` and authenticate as `user`, offering each
    /// method of `auth` in turn.
    pub async fn connect(
        host: &str,
        port: u16,
        user: &str,
        auth: &AuthChain,
    ) -> Result<Self, Error> {
        let connect_err = |source: anyhow::Error| Error::Connect {
            host: host.to_string(),
            port,
            source,
        };

        let ssh_config = client::Config::default();
        let mut handle = client::connect(Arc::new(ssh_config), (host, port), SshHandler)
            .await
            .map_err(connect_err)?;

        log::debug!(
            "Offering {} auth methods to {}:{} (public key: {})",
            auth.methods.len(),
            host,
            port,
            auth.has_public_key()
        );
        for method in &auth.methods {
            let accepted = authenticate(&mut handle, user, method)
                .await
                .map_err(connect_err)?;
            if accepted {
                log::info!("SSH connected to {}:{} as {}", host, port, user);
                return Ok(Self {
                    host: host.to_string(),
                    port,
                    handle,
                });
            }
        }

        Err(Error::Auth {
            user: user.to_string(),
            host: host.to_string(),
        })
    }
}

async fn authenticate(
    handle: &mut client::Handle<SshHandler>,
    user: &str,
    method: &AuthMethod,
) -> Result<bool, anyhow::Error> {
    let accepted = match method {
        AuthMethod::Password(password) => {
            log::debug!("Trying password authentication");
            let result = handle.authenticate_password(user, password).await?;
            matches!(result, client::AuthResult::Success)
        }
        AuthMethod::KeyboardInteractive(secret) => {
            log::debug!("Trying keyboard-interactive authentication");
            let mut response = handle
                .authenticate_keyboard_interactive_start(user, None::<String>)
                .await?;
            loop {
                match response {
                    client::KeyboardInteractiveAuthResponse::Success => break true,
                    client::KeyboardInteractiveAuthResponse::Failure { .. } => break false,
                    client::KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                        let answers = vec![secret.clone(); prompts.len()];
                        response = handle
                            .authenticate_keyboard_interactive_respond(answers)
                            .await?;
                    }
                }
            }
        }
        AuthMethod::PublicKey(key) => {
            log::debug!("Trying public key authentication");
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let pk = PrivateKeyWithHashAlg::new(key.clone(), hash_alg);
            let result = handle.authenticate_publickey(user, pk).await?;
            matches!(result, client::AuthResult::Success)
        }
    };
    Ok(accepted)
}

#[async_trait]
impl Transport for SshSession {
    type Fs = SftpClient;
    type Channel = SshExec;

    async fn open_sftp(&self) -> Result<SftpClient, anyhow::Error> {
        let channel = self.handle.channel_open_session().await?;
        SftpClient::init(channel).await
    }

    async fn open_exec(&self) -> Result<SshExec, anyhow::Error> {
        let channel = self.handle.channel_open_session().await?;
        Ok(SshExec { channel })
    }

    async fn disconnect(self) -> Result<(), anyhow::Error> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        log::debug!("SSH disconnected from {}:{}", self.host, self.port);
        Ok(())
    }
}

/// A session channel used for exactly one `exec` request.
pub struct SshExec {
    channel: Channel<client::Msg>,
}

#[async_trait]
impl ExecChannel for SshExec {
    async fn run(
        &mut self,
        command: &str,
        output: &mut Vec<u8>,
    ) -> Result<RemoteExit, anyhow::Error> {
        self.channel.exec(true, command).await?;

        let mut exit = RemoteExit::Unknown;
        while let Some(msg) = self.channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => exit = RemoteExit::Status(exit_status),
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    exit = RemoteExit::Signal(format!("{:?}", signal_name))
                }
                _ => {}
            }
        }
        Ok(exit)
    }

    async fn close(self) -> Result<(), anyhow::Error> {
        self.channel.close().await?;
        Ok(())
    }
}
