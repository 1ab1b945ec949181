use std::io;
use std::time::Duration;

use futures::TryStreamExt;
use log::debug;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;

use crate::config::appconfig::AppConfig;
use crate::executor::chat::{ChatCompletion, ChatMessage, ChatRequest};
use crate::executor::streaming_output::{LineSource, StreamingExecutionOutput};

pub mod chat;
pub mod stream_decoder;
pub mod streaming_output;

pub enum ExecutionOutput {
    StreamingOutput(Box<StreamingExecutionOutput>),
    ImmediateOutput(String),
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Error connecting to API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(#[source] io::Error),

    #[error("Error parsing API response: {0}")]
    UnexpectedResponse(String),

    #[error("Error writing output: {0}")]
    Output(#[source] io::Error),

    #[error("Could not start async runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl ExecutorError {
    /// Connection, timeout, status and mid-stream failures. None of them are retried.
    pub fn is_transport(&self) -> bool {
        matches!(self, ExecutorError::Transport(_) | ExecutorError::StreamInterrupted(_))
    }
}

pub struct Executor {
    pub appconfig: AppConfig,
    client: reqwest::Client,
}

impl Executor {
    pub fn new(appconfig: AppConfig) -> Result<Self, ExecutorError> {
        let client = client_builder(&appconfig).build()?;

        Ok(Self { appconfig, client })
    }

    pub fn chat_request(&self, question: &str) -> ChatRequest {
        ChatRequest {
            model: self.appconfig.model.clone(),
            messages: vec![ChatMessage::user(question)],
            temperature: self.appconfig.temperature,
            stream: self.appconfig.stream,
        }
    }

    async fn send(&self, question: &str) -> Result<reqwest::Response, ExecutorError> {
        let body = self.chat_request(question);

        debug!(
            "POST {} model={} temperature={} stream={}",
            self.appconfig.base_url, body.model, body.temperature, body.stream
        );

        let mut request = self.client
            .post(&self.appconfig.base_url)
            .json(&body);

        if let Some(api_key) = self.appconfig.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?.error_for_status()?;

        debug!("Response status: {}", response.status());

        Ok(response)
    }

    pub fn execute(&self, question: &str) -> Result<ExecutionOutput, ExecutorError> {
        let rt = Runtime::new().map_err(ExecutorError::Runtime)?;

        let response = rt.block_on(self.send(question))?;

        if self.appconfig.stream {
            debug!("stream mode");
            let lines = line_source(response);
            return Ok(ExecutionOutput::StreamingOutput(Box::new(
                StreamingExecutionOutput::new(rt, lines)
            )));
        }

        let body = rt.block_on(response.text())?;
        let content = parse_completion(&body)?;

        Ok(ExecutionOutput::ImmediateOutput(content))
    }
}

// Connect and per-read timeouts only, a total timeout would cut long streams short.
fn client_builder(appconfig: &AppConfig) -> reqwest::ClientBuilder {
    let timeout = Duration::from_secs(appconfig.timeout_secs);

    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
}

pub fn parse_completion(body: &str) -> Result<String, ExecutorError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|err| ExecutorError::UnexpectedResponse(err.to_string()))?;

    completion.into_content().ok_or_else(|| {
        ExecutorError::UnexpectedResponse("missing choices[0].message.content".to_string())
    })
}

/// Splits a streaming response body into lines, in arrival order.
pub fn line_source(response: reqwest::Response) -> LineSource {
    let bytes = response.bytes_stream().map_err(io::Error::other);
    let reader = StreamReader::new(bytes);

    Box::pin(LinesStream::new(BufReader::new(reader).lines()))
}
