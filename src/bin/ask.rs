use std::env;
use std::io::{self, IsTerminal, Read, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use askcode::cmd::ask::AskCmd;
use askcode::config::{ENV_API_KEY, ENV_CONFIG};
use clap::Parser;
use log::debug;

fn read_piped_stdin() -> Result<Option<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;

    Ok(Some(buffer))
}

fn run(cmd: AskCmd) -> Result<()> {
    let appconfig = cmd.resolve_config(
        env::var_os(ENV_CONFIG).map(Into::into),
        env::var(ENV_API_KEY).ok(),
    );

    let piped = read_piped_stdin()?;
    let question = cmd.question(piped.as_deref());

    debug!("Question has {} bytes", question.len());

    let mut out = io::stdout().lock();
    let mut diag = io::stderr().lock();

    cmd.exec(appconfig, &question, &mut out, &mut diag)
}

// Written straight to stderr, independent of the log filter.
fn report_failure(err: &anyhow::Error, diag: &mut impl Write) {
    let _ = writeln!(diag, "{err:#}");
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cmd = AskCmd::parse();

    match run(cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err, &mut io::stderr().lock());
            ExitCode::FAILURE
        }
    }
}
