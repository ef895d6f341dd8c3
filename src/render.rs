//! Output rendering for streamed chat responses.
//!
//! The conversation orchestrator reports every applied delta through the
//! [`Renderer`] trait, so the same turn logic can drive a terminal, a test
//! recorder, or any other front end.

use std::io::{self, Stdout, Write};

/// ANSI escape code for dim text (used for reasoning).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for reasoning).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording output in tests
pub trait Renderer: Send {
    /// Print a chunk of regular response text.
    ///
    /// This is called incrementally as fragments are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Print a chunk of reasoning text.
    ///
    /// Reasoning is displayed differently (dim/italic) to distinguish it
    /// from the main response.
    fn print_thinking(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer outputs text directly to stdout with optional
/// ANSI escape codes for styling reasoning and errors.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    in_thinking: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            in_thinking: false,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn reset_thinking(&mut self) {
        if self.in_thinking {
            if self.use_color {
                print!("{ANSI_RESET}");
            }
            println!();
            self.in_thinking = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        self.reset_thinking();
        print!("{text}");
        self.flush();
    }

    fn print_thinking(&mut self, text: &str) {
        if !self.in_thinking {
            if self.use_color {
                print!("{ANSI_DIM}{ANSI_ITALIC}");
            } else {
                print!("[thinking] ");
            }
            self.in_thinking = true;
        }
        print!("{text}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.reset_thinking();
        if self.use_color {
            eprintln!("\n{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("\nError: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.reset_thinking();
        println!("{info}");
    }

    fn finish_response(&mut self) {
        if self.in_thinking && self.use_color {
            print!("{ANSI_RESET}");
        }
        self.in_thinking = false;
        println!();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        if self.in_thinking && self.use_color {
            print!("{ANSI_RESET}");
        }
        self.in_thinking = false;
        println!("\n[interrupted]");
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert!(!renderer.in_thinking);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn thinking_state_resets_after_text() {
        let mut renderer = PlainTextRenderer::with_color(false);
        renderer.print_thinking("hmm");
        assert!(renderer.in_thinking);
        renderer.print_text("answer");
        assert!(!renderer.in_thinking);
        renderer.print_thinking("more");
        renderer.finish_response();
        assert!(!renderer.in_thinking);
    }
}
