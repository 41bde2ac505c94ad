//! Setup and transfer faults.
//!
//! Every variant aborts the invocation. A remote binary that exits non-zero is
//! not an error here; see [`crate::exec::RunOutcome`].

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("usage: esx-exec <binary> [args...]")]
    Usage,

    #[error("invalid options in ${var}: {message}")]
    Options { var: &'static str, message: String },

    #[error("cannot determine the current directory")]
    CurrentDir(#[source] std::io::Error),

    #[error("the current path {cwd:?} is not in either GOROOT({root:?}) or GOPATH({search:?})")]
    OutsideSourceRoots {
        cwd: PathBuf,
        root: Option<PathBuf>,
        search: Vec<PathBuf>,
    },

    #[error("{0:?} has no file name")]
    BinaryName(PathBuf),

    #[error("cannot read {path:?}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path:?}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to connect to {host}:{port}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: anyhow::Error,
    },

    #[error("authentication failed for {user}@{host}")]
    Auth { user: String, host: String },

    #[error("failed to open SFTP channel")]
    Sftp(#[source] anyhow::Error),

    #[error("failed to upload {path}")]
    Upload {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create remote directory {path}")]
    Mkdir {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create session")]
    ExecChannel(#[source] anyhow::Error),

    #[error("failed to start the async runtime")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
