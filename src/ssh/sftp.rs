use super::{RemoteFs, RemoteStat};
use async_trait::async_trait;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::FileAttributes;
use tokio::io::AsyncWriteExt;

/// SFTP operations wrapper.
pub struct SftpClient {
    session: SftpSession,
}

impl SftpClient {
    /// Initialize SFTP session from an existing SSH channel.
    pub async fn init(
        channel: russh::Channel<russh::client::Msg>,
    ) -> Result<Self, anyhow::Error> {
        channel.request_subsystem(true, "sftp").await?;
        let session = SftpSession::new(channel.into_stream()).await?;
        Ok(Self { session })
    }
}

#[async_trait]
impl RemoteFs for SftpClient {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), anyhow::Error> {
        let mut file = self.session.create(path).await?;
        file.write_all(data).await?;
        file.shutdown().await?;
        log::debug!("Wrote {} bytes to {}", data.len(), path);
        Ok(())
    }

    async fn set_permissions(&self, path: &str, mode: u32) -> Result<(), anyhow::Error> {
        let attrs = FileAttributes {
            permissions: Some(mode),
            ..FileAttributes::empty()
        };
        self.session.set_metadata(path, attrs).await?;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<RemoteStat, anyhow::Error> {
        let metadata = self.session.metadata(path).await?;
        Ok(RemoteStat {
            is_dir: metadata.is_dir(),
            permissions: metadata.permissions,
        })
    }

    async fn create_dir(&self, path: &str) -> Result<(), anyhow::Error> {
        self.session.create_dir(path).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), anyhow::Error> {
        self.session.remove_file(path).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), anyhow::Error> {
        self.session.close().await?;
        Ok(())
    }
}
