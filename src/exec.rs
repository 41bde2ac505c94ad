//! Running the uploaded binary.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ssh::{ExecChannel, RemoteExit, Transport};

/// Helper on the target that caps the memory of the process it starts.
pub const RESOURCE_WRAPPER: &str = "/usr/lib/vmware/rp/bin/runInRP";

/// Why a remote run did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    #[error("remote process exited with status {0}")]
    Status(u32),

    #[error("remote process killed by signal {0}")]
    Signal(String),

    #[error("remote process ended without an exit status")]
    NoStatus,

    #[error("remote command failed")]
    Transport(#[source] anyhow::Error),
}

fn exit_result(exit: RemoteExit) -> std::result::Result<(), RunFailure> {
    match exit {
        RemoteExit::Status(0) => Ok(()),
        RemoteExit::Status(code) => Err(RunFailure::Status(code)),
        RemoteExit::Signal(name) => Err(RunFailure::Signal(name)),
        RemoteExit::Unknown => Err(RunFailure::NoStatus),
    }
}

/// Result of one remote run.
#[derive(Debug)]
pub struct RunOutcome {
    pub command: String,
    /// Interleaved stdout and stderr of the remote process.
    pub output: Vec<u8>,
    pub result: std::result::Result<(), RunFailure>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Shell command that prepares `test_dir` and runs `program` inside it.
///
/// Arguments are joined with single spaces and not quoted.
pub fn build_command(test_dir: &str, mem: Option<u64>, program: &str, args: &[String]) -> String {
    let wrapper = match mem {
        Some(max) if max != 0 => format!("{} --max {} ", RESOURCE_WRAPPER, max),
        _ => String::new(),
    };

    let mut command = format!(
        "mkdir -p {dir} && cd {dir} && {wrapper}{program}",
        dir = test_dir
    );
    if !args.is_empty() {
        command.push(' ');
        command.push_str(&args.join(" "));
    }
    command
}

/// Run `program` with `args` on the target, in the configured test directory.
///
/// Failing to get a channel at all is an [`Error`]; anything that goes wrong
/// once the command is sent ends up in [`RunOutcome::result`].
pub async fn run_remote<T>(
    transport: &T,
    config: &Config,
    program: &str,
    args: &[String],
) -> Result<RunOutcome>
where
    T: Transport + ?Sized,
{
    let mut channel = transport.open_exec().await.map_err(Error::ExecChannel)?;

    let command = build_command(&config.test_dir, config.mem, program, args);
    log::info!("Running: {}", command);

    let mut output = Vec::new();
    let result = match channel.run(&command, &mut output).await {
        Ok(exit) => exit_result(exit),
        Err(e) => Err(RunFailure::Transport(e)),
    };

    if let Err(e) = channel.close().await {
        log::debug!("Closing exec channel: {:#}", e);
    }

    match &result {
        Ok(()) => log::info!("{} succeeded", program),
        Err(failure) => log::debug!("{} failed: {}", program, failure),
    }

    Ok(RunOutcome {
        command,
        output,
        result,
    })
}
