//! Output side of the app: what gets shown, not how it is decided.

mod render;

pub use render::{TerminalRenderer, NO_QUOTES_MESSAGE};

use crate::quote::Quote;

/// Rendering collaborator driven by the app handlers.
pub trait Renderer: Send {
    /// Show one quote, or the empty state when `None`.
    fn show_quote(&mut self, quote: Option<&Quote>);

    /// Show the selectable categories (the "all" entry is implied) with
    /// `selected` marked.
    fn show_categories(&mut self, categories: &[&str], selected: &str);

    /// Show every quote matching the current filter.
    fn show_matches(&mut self, quotes: &[&Quote]);

    /// Show a user-facing message.
    fn notify(&mut self, message: &str);
}
