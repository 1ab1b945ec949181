use std::io;

use anyhow::Result;
use askcode::cmd::extract::ExtractCmd;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cmd = ExtractCmd::parse();

    let stdin = io::stdin().lock();
    let mut out = io::stdout().lock();

    cmd.exec(stdin, &mut out)
}
