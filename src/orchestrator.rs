//! One deploy, run and cleanup cycle over an open connection.

use crate::cleanup::{self, Cleanup};
use crate::config::Config;
use crate::deploy;
use crate::error::{Error, Result};
use crate::exec::{self, RunOutcome};
use crate::ssh::{RemoteFs, Transport};
use std::future::Future;
use std::path::PathBuf;

/// Process exit code for faults that stop the cycle before the binary ran.
pub const EXIT_SETUP_FAULT: i32 = 2;

/// Local directory mirrored next to the binary, relative to the current
/// directory.
pub const FIXTURE_DIR: &str = "testdata";

/// What to ship and how to call it.
#[derive(Clone, Debug)]
pub struct Job {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub fixtures: PathBuf,
}

impl Job {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
            fixtures: PathBuf::from(FIXTURE_DIR),
        }
    }
}

/// Everything a finished cycle reports back.
#[derive(Debug)]
pub struct Report {
    pub outcome: RunOutcome,
    pub cleanup: Cleanup,
}

impl Report {
    /// 0 when the remote binary succeeded, 1 for any run failure.
    pub fn exit_code(&self) -> i32 {
        if self.outcome.success() {
            0
        } else {
            1
        }
    }
}

/// Exit code for a whole invocation.
pub fn exit_code(result: &Result<Report>) -> i32 {
    match result {
        Ok(report) => report.exit_code(),
        Err(_) => EXIT_SETUP_FAULT,
    }
}

/// Resolve the configuration, connect with it and run one cycle.
///
/// Nothing is connected unless `resolve` succeeds. The connection is
/// dropped again whatever the cycle returns.
pub async fn invoke<R, C, Fut, T>(resolve: R, job: &Job, connect: C) -> Result<Report>
where
    R: FnOnce() -> Result<Config>,
    C: FnOnce(Config) -> Fut,
    Fut: Future<Output = Result<T>>,
    T: Transport,
{
    let config = resolve()?;
    let transport = connect(config.clone()).await?;

    let report = run(&transport, &config, job).await;
    if let Err(e) = transport.disconnect().await {
        log::debug!("Disconnect: {:#}", e);
    }
    let report = report?;

    if let Err(failure) = &report.outcome.result {
        log::warn!("{}: {}", config.remote_binary(), failure);
    }
    Ok(report)
}

/// Upload `job`, run it and clean up after it.
///
/// Deployment faults abort before anything runs. A failed run is reported in
/// the returned [`Report`], not as an error.
pub async fn run<T>(transport: &T, config: &Config, job: &Job) -> Result<Report>
where
    T: Transport + ?Sized,
{
    let remote = config.remote_binary();

    let sftp = transport.open_sftp().await.map_err(Error::Sftp)?;
    let deployed = deploy_job(&sftp, config, job, &remote).await;
    if let Err(e) = sftp.close().await {
        log::debug!("Closing SFTP channel: {:#}", e);
    }
    deployed?;

    let outcome = exec::run_remote(transport, config, &remote, &job.args).await?;
    let cleanup = cleanup::cleanup(transport, &remote, config.keep, outcome.success()).await;

    Ok(Report { outcome, cleanup })
}

async fn deploy_job<F>(sftp: &F, config: &Config, job: &Job, remote: &str) -> Result<()>
where
    F: RemoteFs + ?Sized,
{
    deploy::upload_file(sftp, &job.binary, remote).await?;
    deploy::mirror_dir(sftp, &job.fixtures, &config.test_dir).await?;
    Ok(())
}
