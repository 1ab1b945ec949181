use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};

use crate::config::appconfig::{AppConfig, ConfigFile, ConfigOverrides};
use crate::config::appconfig_locator;
use crate::executor::stream_decoder::RenderOutcome;
use crate::executor::{ExecutionOutput, Executor};
use crate::fence::{self, ExtractMode};
use crate::output::is_consumer_closed;

#[derive(Parser, Debug)]
#[command(
    name = "ask",
    version,
    about = "Ask an AI model a question, streaming the answer to stdout",
    after_help = "Examples:\n  ask 'Who are you?'\n  ask Who are you\n  git diff | ask 'generate commit message' | extract-code"
)]
pub struct AskCmd {
    #[arg(required = true, help = "The question to ask, multiple words are joined (piped stdin is prepended)")]
    pub question: Vec<String>,

    #[arg(long, help = "Disable streaming response")]
    pub no_stream: bool,

    #[arg(long, help = "Model to use")]
    pub model: Option<String>,

    #[arg(long, help = "Temperature for generation")]
    pub temperature: Option<f32>,

    #[arg(long, help = "API key, overrides config file and environment")]
    pub api_key: Option<String>,

    #[arg(long, help = "Chat completions endpoint, overrides config file")]
    pub base_url: Option<String>,

    #[arg(long, help = "Path to a TOML or JSON config file")]
    pub config_file: Option<PathBuf>,

    #[arg(long, help = "Print only the first fenced code block of the answer")]
    pub code: bool,

    #[arg(long, requires = "code", help = "With --code, print every fenced code block")]
    pub all: bool,
}

fn load_config_file(path: &Path) -> Option<ConfigFile> {
    debug!("Loading configuration from {}", path.display());

    match ConfigFile::load(path) {
        Ok(file) => Some(file),
        Err(err) => {
            warn!("{err}, using defaults");
            None
        }
    }
}

impl AskCmd {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            stream: self.no_stream.then_some(false),
        }
    }

    /// Defaults, then the config file, then the env api key, then command line flags.
    pub fn resolve_config(&self, env_config: Option<PathBuf>, env_api_key: Option<String>) -> AppConfig {
        let mut appconfig = AppConfig::default();

        if let Some(path) = appconfig_locator::resolve(self.config_file.as_deref(), env_config)
            && let Some(file) = load_config_file(&path) {
            appconfig = appconfig.merge(file);
        }

        appconfig
            .with_fallback_api_key(env_api_key)
            .with_overrides(&self.overrides())
    }

    pub fn question(&self, piped: Option<&str>) -> String {
        let question = self.question.join(" ");

        match piped.map(str::trim) {
            Some(stdin_content) if !stdin_content.is_empty() => format!("{stdin_content}\n\n{question}"),
            _ => question,
        }
    }

    pub fn extract_mode(&self) -> Option<ExtractMode> {
        self.code.then(|| ExtractMode::from_all_flag(self.all))
    }

    pub fn exec(&self, appconfig: AppConfig, question: &str, out: &mut impl Write, diag: &mut impl Write) -> Result<()> {
        debug!("Resolved configuration:\n{appconfig}");

        let executor = Executor::new(appconfig)?;
        let output = executor.execute(question)?;

        self.deliver(output, out, diag)
    }

    pub fn deliver(&self, output: ExecutionOutput, out: &mut impl Write, diag: &mut impl Write) -> Result<()> {
        let answer = match (output, self.extract_mode()) {
            (ExecutionOutput::StreamingOutput(mut streaming), None) => {
                let outcome = streaming.sync_render(out, diag)?;
                if let RenderOutcome::ConsumerClosed { fragments } = outcome {
                    debug!("Output closed early after {fragments} fragments");
                }
                return Ok(());
            }
            (ExecutionOutput::StreamingOutput(mut streaming), Some(_)) => {
                streaming.sync_collect(diag)?
            }
            (ExecutionOutput::ImmediateOutput(text), _) => text,
        };

        let written = match self.extract_mode() {
            Some(mode) => fence::extract(answer.lines(), mode, out).map(|summary| {
                debug!("Extracted {} lines from {} blocks", summary.lines_emitted, summary.blocks_opened);
            }),
            None => writeln!(out, "{answer}"),
        }.and_then(|_| out.flush());

        match written {
            Err(err) if is_consumer_closed(&err) => Ok(()),
            other => other.context("Failed to write answer"),
        }
    }
}
