//! Run a locally built test binary on a remote host.
//!
//! The binary and the package's `testdata` directory are copied over SFTP,
//! the binary is run over SSH from inside the mirrored directory, and it is
//! removed again if it passed.

pub mod cleanup;
pub mod config;
pub mod deploy;
pub mod error;
pub mod exec;
pub mod orchestrator;
pub mod ssh;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
