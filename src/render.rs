//! Output rendering for streamed chat replies.
//!
//! This module provides the renderer trait the chat session reports to and a
//! plain-text implementation for terminals.

use std::io::{self, Stdout, Write};

use crate::conversation::Message;
use crate::models::KnownModel;

/// ANSI escape code for dim text (used for status lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the model label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering streaming output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Collecting output in tests
pub trait Renderer: Send {
    /// Called when a request has been sent, before any text arrives.
    fn start_reply(&mut self, model: KnownModel) {
        _ = model;
    }

    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as fragments are decoded from the stream.
    fn print_text(&mut self, text: &str);

    /// Called when the reply stream ends.
    ///
    /// `message` is the assistant message as recorded, error flag included.
    fn finish_reply(&mut self, message: &Message);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
///
/// Writes to stdout unless constructed over another writer.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer over an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            line_start: true,
        }
    }

    /// Consumes the renderer and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    // Terminal output is best effort; a closed stdout must not abort an exchange.
    fn write(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        if let Some(last) = text.chars().last() {
            self.line_start = last == '\n';
        }
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn start_reply(&mut self, model: KnownModel) {
        self.end_line();
        let label = self.styled(ANSI_CYAN, &format!("[{}]", model.info().name));
        self.write(&format!("{label} "));
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn finish_reply(&mut self, message: &Message) {
        self.end_line();
        if message.is_error {
            let note = self.styled(ANSI_RED, "[the model reported an error; /retry to try again]");
            self.write(&format!("{note}\n"));
        } else if message.content.is_empty() {
            let note = self.styled(ANSI_DIM, "[empty reply]");
            self.write(&format!("{note}\n"));
        }
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        let line = self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write(&format!("{line}\n"));
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write(&format!("{info}\n"));
    }
}
