use std::io::{self, BufRead, Write};

use log::debug;

const FENCE: &[u8] = b"```";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    #[default]
    FirstOnly,
    All,
}

impl ExtractMode {
    pub fn from_all_flag(all: bool) -> Self {
        if all { ExtractMode::All } else { ExtractMode::FirstOnly }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CodeBlockState {
    // Buffer is None once a fence has been seen, lines outside blocks are dropped from then on
    Outside { buffer: Option<Vec<Vec<u8>>> },
    InsideBlock,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractSummary {
    pub blocks_opened: usize,
    pub lines_emitted: usize,
    pub passthrough: bool,
}

/// Lines are handled as raw bytes, so input that is not valid UTF-8 still passes through.
pub fn is_fence(line: &[u8]) -> bool {
    line.trim_ascii_start().starts_with(FENCE)
}

fn strip_line_ending(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

fn write_line(out: &mut impl Write, line: &[u8]) -> io::Result<()> {
    out.write_all(line)?;
    out.write_all(b"\n")
}

/// Line scanner that keeps the content of fenced code blocks.
///
/// Lines seen before the first fence are held back; if the input ends
/// without any fence they are written out unchanged instead.
pub struct CodeFenceExtractor {
    mode: ExtractMode,
    state: CodeBlockState,
    summary: ExtractSummary,
}

impl CodeFenceExtractor {
    pub fn new(mode: ExtractMode) -> Self {
        Self {
            mode,
            state: CodeBlockState::Outside { buffer: Some(Vec::new()) },
            summary: ExtractSummary::default(),
        }
    }

    pub fn feed(&mut self, line: &[u8], out: &mut impl Write) -> io::Result<Flow> {
        let line = strip_line_ending(line);

        match &mut self.state {
            CodeBlockState::Outside { buffer } => {
                if is_fence(line) {
                    self.summary.blocks_opened += 1;
                    debug!("Opening fence #{}", self.summary.blocks_opened);
                    self.state = CodeBlockState::InsideBlock;
                } else if let Some(buffer) = buffer {
                    buffer.push(line.to_vec());
                }
                Ok(Flow::Continue)
            }
            CodeBlockState::InsideBlock => {
                if !is_fence(line) {
                    write_line(out, line)?;
                    self.summary.lines_emitted += 1;
                    return Ok(Flow::Continue);
                }

                match self.mode {
                    ExtractMode::FirstOnly => {
                        self.state = CodeBlockState::Terminal;
                        Ok(Flow::Halt)
                    }
                    ExtractMode::All => {
                        self.state = CodeBlockState::Outside { buffer: None };
                        Ok(Flow::Continue)
                    }
                }
            }
            CodeBlockState::Terminal => Ok(Flow::Halt),
        }
    }

    /// Ends the scan. An unterminated block is left as is.
    pub fn finish(self, out: &mut impl Write) -> io::Result<ExtractSummary> {
        let mut summary = self.summary;

        if let CodeBlockState::Outside { buffer: Some(buffer) } = self.state {
            debug!("No fence found, passing {} lines through", buffer.len());
            for line in &buffer {
                write_line(out, line)?;
            }
            summary.lines_emitted = buffer.len();
            summary.passthrough = true;
        }

        Ok(summary)
    }
}

pub fn extract<I, S>(lines: I, mode: ExtractMode, out: &mut impl Write) -> io::Result<ExtractSummary>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut extractor = CodeFenceExtractor::new(mode);

    for line in lines {
        if extractor.feed(line.as_ref(), out)? == Flow::Halt {
            break;
        }
    }

    extractor.finish(out)
}

/// Same as [`extract`], but stops pulling from `reader` as soon as the scan halts.
pub fn extract_from_reader(mut reader: impl BufRead, mode: ExtractMode, out: &mut impl Write) -> io::Result<ExtractSummary> {
    let mut extractor = CodeFenceExtractor::new(mode);

    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if extractor.feed(&line, out)? == Flow::Halt {
            break;
        }
    }

    extractor.finish(out)
}
