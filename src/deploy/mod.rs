//! Upload of the test binary and its fixture directory.

pub mod walk;

use crate::config::remote_join;
use crate::error::{Error, Result};
use crate::ssh::RemoteFs;
use std::path::Path;
use walk::{walk_tree, EntryKind};

/// What a mirror pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub dirs: usize,
    pub files: usize,
    pub skipped: usize,
}

/// Upload a local file, carrying its permission bits over.
pub async fn upload_file<F>(fs: &F, local: &Path, remote: &str) -> Result<()>
where
    F: RemoteFs + ?Sized,
{
    let read_err = |source| Error::LocalRead {
        path: local.to_path_buf(),
        source,
    };
    let metadata = tokio::fs::metadata(local).await.map_err(read_err)?;
    let data = tokio::fs::read(local).await.map_err(read_err)?;
    let mode = local_mode(&metadata);

    let upload_err = |source| Error::Upload {
        path: remote.to_string(),
        source,
    };
    fs.write_file(remote, &data).await.map_err(upload_err)?;
    fs.set_permissions(remote, mode).await.map_err(upload_err)?;

    log::info!(
        "Uploaded {} -> {} ({:o})",
        local.display(),
        remote,
        mode
    );
    Ok(())
}

/// Mirror the directory `local` under `remote_root`. The remote copy keeps
/// the directory's own name, so `testdata/x` lands at `<remote_root>/testdata/x`.
///
/// Does nothing if `local` is not a directory.
pub async fn mirror_dir<F>(fs: &F, local: &Path, remote_root: &str) -> Result<MirrorStats>
where
    F: RemoteFs + ?Sized,
{
    let mut stats = MirrorStats::default();
    if !local.is_dir() {
        log::debug!("No {} to mirror", local.display());
        return Ok(stats);
    }

    create_dir_all(fs, remote_root).await?;

    for entry in walk_tree(local) {
        let entry = entry.map_err(|source| Error::Walk {
            path: local.to_path_buf(),
            source,
        })?;
        let remote = remote_join(remote_root, &entry.relative_path);

        match entry.kind {
            EntryKind::Dir => {
                ensure_dir(fs, &remote).await?;
                stats.dirs += 1;
            }
            EntryKind::File => {
                upload_file(fs, &entry.local_path, &remote).await?;
                stats.files += 1;
            }
            EntryKind::Other => {
                log::debug!("Skipping {}", entry.local_path.display());
                stats.skipped += 1;
            }
        }
    }

    log::info!(
        "Mirrored {} -> {} ({} dirs, {} files)",
        local.display(),
        remote_root,
        stats.dirs,
        stats.files
    );
    Ok(stats)
}

/// Create every missing directory along `path`, starting from its first
/// segment.
pub async fn create_dir_all<F>(fs: &F, path: &str) -> Result<()>
where
    F: RemoteFs + ?Sized,
{
    let mut current = String::new();
    if path.starts_with('/') {
        current.push('/');
    }

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);
        ensure_dir(fs, &current).await?;
    }
    Ok(())
}

/// Create `path` unless it already exists.
async fn ensure_dir<F>(fs: &F, path: &str) -> Result<()>
where
    F: RemoteFs + ?Sized,
{
    if let Ok(stat) = fs.stat(path).await {
        if stat.is_dir {
            return Ok(());
        }
        return Err(Error::Mkdir {
            path: path.to_string(),
            source: anyhow::anyhow!("exists and is not a directory"),
        });
    }

    if let Err(source) = fs.create_dir(path).await {
        // Someone else may have created it in the meantime
        match fs.stat(path).await {
            Ok(stat) if stat.is_dir => {}
            _ => {
                return Err(Error::Mkdir {
                    path: path.to_string(),
                    source,
                })
            }
        }
    }
    log::debug!("Created remote directory {}", path);
    Ok(())
}

#[cfg(unix)]
fn local_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn local_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o555
    } else {
        0o755
    }
}
