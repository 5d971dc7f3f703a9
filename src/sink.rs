//! Paste sinks.
//!
//! The dispatcher hands every selected text to a [`PasteSink`]. Rotation-mode
//! requests also carry how many characters to select backwards after pasting,
//! so that the next rotation replaces the text instead of appending to it.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use tracing::debug;

use crate::config::Mode;
use crate::error::{SnipError, SnipResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteRequest {
    pub text: String,
    /// Characters to select backwards once pasted (rotation mode only)
    pub select_back: Option<usize>,
}

impl PasteRequest {
    pub fn new(text: String, mode: Mode) -> Self {
        let select_back = match mode {
            Mode::Rotation => Some(text.chars().count()),
            Mode::Popup => None,
        };
        Self { text, select_back }
    }
}

pub trait PasteSink {
    fn paste(&mut self, request: &PasteRequest) -> SnipResult<()>;
}

impl<T: PasteSink + ?Sized> PasteSink for Box<T> {
    fn paste(&mut self, request: &PasteRequest) -> SnipResult<()> {
        (**self).paste(request)
    }
}

/// Writes each text followed by a newline, for piping into another tool.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    out: W,
}

pub type StdoutSink = WriterSink<io::Stdout>;

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> PasteSink for WriterSink<W> {
    fn paste(&mut self, request: &PasteRequest) -> SnipResult<()> {
        writeln!(self.out, "{}", request.text)
            .and_then(|_| self.out.flush())
            .map_err(|e| SnipError::PasteFailed(e.to_string()))?;
        debug!(chars = request.text.chars().count(), select_back = ?request.select_back, "Wrote text");
        Ok(())
    }
}

/// Places each text on the system clipboard.
///
/// The clipboard handle is held for the sink's lifetime; on X11 the contents
/// disappear with it.
#[cfg(feature = "clipboard")]
pub struct ClipboardSink {
    clipboard: arboard::Clipboard,
}

#[cfg(feature = "clipboard")]
impl ClipboardSink {
    pub fn new() -> SnipResult<Self> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| SnipError::PasteFailed(e.to_string()))?;
        Ok(Self { clipboard })
    }
}

#[cfg(feature = "clipboard")]
impl PasteSink for ClipboardSink {
    fn paste(&mut self, request: &PasteRequest) -> SnipResult<()> {
        self.clipboard
            .set_text(request.text.clone())
            .map_err(|e| SnipError::PasteFailed(e.to_string()))?;
        debug!(select_back = ?request.select_back, "Copied text to clipboard");
        Ok(())
    }
}

/// Sink selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    #[default]
    Stdout,
    Clipboard,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Stdout => f.write_str("stdout"),
            SinkKind::Clipboard => f.write_str("clipboard"),
        }
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(SinkKind::Stdout),
            "clipboard" => Ok(SinkKind::Clipboard),
            _ => Err(format!("invalid sink: {} (expected stdout or clipboard)", s)),
        }
    }
}

pub fn build_sink(kind: SinkKind) -> SnipResult<Box<dyn PasteSink>> {
    match kind {
        SinkKind::Stdout => Ok(Box::new(StdoutSink::stdout())),
        #[cfg(feature = "clipboard")]
        SinkKind::Clipboard => Ok(Box::new(ClipboardSink::new()?)),
        #[cfg(not(feature = "clipboard"))]
        SinkKind::Clipboard => Err(SnipError::invalid(
            "clipboard support is not compiled in; rebuild with --features clipboard",
        )),
    }
}
