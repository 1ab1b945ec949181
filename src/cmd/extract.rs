use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use crate::fence::{self, ExtractMode};
use crate::output::is_consumer_closed;

#[derive(Parser, Debug)]
#[command(
    name = "extract-code",
    version,
    about = "Extract triple backtick code blocks from stdin. If no code blocks found, output original input.",
    after_help = "Examples:\n  git diff | ask 'generate commit message' | extract-code"
)]
pub struct ExtractCmd {
    #[arg(long, help = "Extract all code blocks (default: first only)")]
    pub all: bool,
}

impl ExtractCmd {
    pub fn mode(&self) -> ExtractMode {
        ExtractMode::from_all_flag(self.all)
    }

    pub fn exec(&self, input: impl BufRead, out: &mut impl Write) -> Result<()> {
        let result = fence::extract_from_reader(input, self.mode(), out)
            .and_then(|summary| out.flush().map(|_| summary));

        match result {
            Ok(summary) => {
                debug!(
                    "{} blocks, {} lines written, passthrough: {}",
                    summary.blocks_opened, summary.lines_emitted, summary.passthrough
                );
                Ok(())
            }
            Err(err) if is_consumer_closed(&err) => {
                debug!("Output closed early");
                Ok(())
            }
            Err(err) => Err(err).context("Failed to extract code blocks"),
        }
    }
}
