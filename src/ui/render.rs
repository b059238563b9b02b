use std::io::Write;

use super::Renderer;
use crate::quote::{Quote, ALL_CATEGORIES};
use crate::util::{strip_control_chars, truncate_to_width};

/// Text shown when the candidate set is empty.
pub const NO_QUOTES_MESSAGE: &str = "No quotes in this category.";

/// Plain-text renderer writing one line per item.
///
/// Quote text may come from the network or an imported file, so it is
/// stripped of control sequences before it reaches the terminal.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    width: usize,
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W, width: usize) -> Self {
        Self {
            out,
            width: width.max(10),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let clean = strip_control_chars(text);
        let fitted = truncate_to_width(&clean, self.width);
        if let Err(e) = writeln!(self.out, "{}", fitted) {
            tracing::debug!(error = %e, "Failed to write to terminal");
        }
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn show_quote(&mut self, quote: Option<&Quote>) {
        match quote {
            Some(q) => self.line(&q.to_string()),
            None => self.line(NO_QUOTES_MESSAGE),
        }
    }

    fn show_categories(&mut self, categories: &[&str], selected: &str) {
        let labels: Vec<String> = std::iter::once(ALL_CATEGORIES)
            .chain(categories.iter().copied())
            .map(|c| {
                if c == selected {
                    format!("[{}]", c)
                } else {
                    c.to_string()
                }
            })
            .collect();
        self.line(&format!("Categories: {}", labels.join(" ")));
    }

    fn show_matches(&mut self, quotes: &[&Quote]) {
        if quotes.is_empty() {
            self.line(NO_QUOTES_MESSAGE);
            return;
        }
        for (i, q) in quotes.iter().enumerate() {
            self.line(&format!("{:>3}. {}", i + 1, q));
        }
    }

    fn notify(&mut self, message: &str) {
        self.line(message);
    }
}
