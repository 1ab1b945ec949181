use std::io::{self, Write};
use std::pin::Pin;
use std::time::Instant;

use futures::Stream;
use log::debug;
use tokio::runtime::Runtime;

use crate::executor::stream_decoder::{RenderOutcome, StreamDecoder};
use crate::executor::ExecutorError;

pub type LineSource = Pin<Box<dyn Stream<Item = io::Result<String>>>>;

pub struct StreamingExecutionOutput {
    // Declared before the runtime so the stream is dropped first.
    decoder: StreamDecoder<LineSource>,
    sync_runtime: Runtime,
    start_time: Instant,
}

impl StreamingExecutionOutput {
    pub fn new(sync_runtime: Runtime, lines: LineSource) -> Self {
        StreamingExecutionOutput {
            decoder: StreamDecoder::new(lines),
            sync_runtime,
            start_time: Instant::now(),
        }
    }

    pub fn sync_render(&mut self, out: &mut impl Write, diag: &mut impl Write) -> Result<RenderOutcome, ExecutorError> {
        let outcome = self.sync_runtime.block_on(self.decoder.render(out, diag));

        debug!("Streaming finished in {}ms: {:?}", self.start_time.elapsed().as_millis(), outcome);

        outcome
    }

    pub fn sync_collect(&mut self, diag: &mut impl Write) -> Result<String, ExecutorError> {
        self.sync_runtime.block_on(self.decoder.collect(diag))
    }
}
