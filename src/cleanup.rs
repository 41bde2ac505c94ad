//! Removal of the uploaded binary after a run.
//!
//! Only a successful run without `-keep` removes it. A failed binary stays on
//! the target so it can be rerun by hand. Nothing here can fail the
//! invocation.

use crate::ssh::{RemoteFs, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cleanup {
    Removed,
    /// `-keep` was given.
    Kept,
    /// The run failed; the binary is left for inspection.
    Retained,
    /// Removal was attempted and did not work.
    Failed,
}

pub fn should_remove(keep: bool, run_succeeded: bool) -> bool {
    !keep && run_succeeded
}

/// Remove `remote` on its own short-lived SFTP channel if the run succeeded
/// and `keep` is not set.
pub async fn cleanup<T>(transport: &T, remote: &str, keep: bool, run_succeeded: bool) -> Cleanup
where
    T: Transport + ?Sized,
{
    if keep {
        log::info!("Keeping {}", remote);
        return Cleanup::Kept;
    }
    if !should_remove(keep, run_succeeded) {
        log::info!("Run failed, leaving {} in place", remote);
        return Cleanup::Retained;
    }

    let sftp = match transport.open_sftp().await {
        Ok(sftp) => sftp,
        Err(e) => {
            log::warn!("Failed to open SFTP channel for cleanup: {:#}", e);
            return Cleanup::Failed;
        }
    };

    let result = match sftp.remove_file(remote).await {
        Ok(()) => {
            log::info!("Removed {}", remote);
            Cleanup::Removed
        }
        Err(e) => {
            log::warn!("Failed to remove {}: {:#}", remote, e);
            Cleanup::Failed
        }
    };

    if let Err(e) = sftp.close().await {
        log::debug!("Closing cleanup SFTP channel: {:#}", e);
    }
    result
}
