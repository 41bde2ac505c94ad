use esx_exec::config::Config;
use esx_exec::orchestrator::{self, Job, Report};
use esx_exec::ssh::session::SshSession;
use esx_exec::Error;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let result = run();
    let code = orchestrator::exit_code(&result);
    match result {
        Ok(report) => {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(&report.outcome.output);
            let _ = stdout.flush();
        }
        Err(e) => log::error!("{:#}", anyhow::Error::from(e)),
    }
    std::process::exit(code);
}

fn run() -> Result<Report, Error> {
    let mut args = std::env::args_os().skip(1);
    let binary = PathBuf::from(args.next().ok_or(Error::Usage)?);
    let args: Vec<String> = args.map(|a| a.to_string_lossy().into_owned()).collect();
    let job = Job::new(binary, args);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;

    runtime.block_on(orchestrator::invoke(
        || Config::from_env(&job.binary),
        &job,
        |config| async move {
            SshSession::connect(&config.host, config.port, &config.user, &config.auth_chain())
                .await
        },
    ))
}
