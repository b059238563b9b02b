use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filter value meaning "every category".
pub const ALL_CATEGORIES: &str = "all";

// ============================================================================
// Error Types
// ============================================================================

/// User input rejected by [`Quote::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Quote text or category was empty after trimming
    #[error("Please fill in both the quote and category.")]
    Empty,
}

/// A snapshot file that could not be imported. Nothing is appended when
/// either of these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The document parsed but its top-level value is not an array
    #[error("Invalid file format: expected a JSON array of quotes")]
    NotAnArray,

    /// The document is not valid JSON, or an entry is not a quote object
    #[error("Failed to parse quotes file: {0}")]
    ParseFailure(String),
}

// ============================================================================
// Quote
// ============================================================================

/// A text/category pair.
///
/// Missing fields deserialize as empty strings so that imported snapshots
/// are taken as-is; only [`Quote::new`] enforces non-empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Quote {
    pub text: String,
    pub category: String,
}

impl Quote {
    /// Build a quote from user input, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// [`ValidationError::Empty`] if either field is empty after trimming.
    pub fn new(text: &str, category: &str) -> Result<Self, ValidationError> {
        let text = text.trim();
        let category = category.trim();
        if text.is_empty() || category.is_empty() {
            return Err(ValidationError::Empty);
        }
        Ok(Self {
            text: text.to_owned(),
            category: category.to_owned(),
        })
    }

    /// Whether this quote belongs to the candidate set for `filter`.
    ///
    /// `None` and [`ALL_CATEGORIES`] match everything; any other value must
    /// equal the category exactly.
    pub fn matches_filter(&self, filter: Option<&str>) -> bool {
        match filter {
            None | Some(ALL_CATEGORIES) => true,
            Some(category) => self.category == category,
        }
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" — ({})", self.text, self.category)
    }
}

/// Seed collection used when nothing valid has been persisted yet.
pub fn default_quotes() -> Vec<Quote> {
    [
        (
            "The only way to do great work is to love what you do.",
            "Motivation",
        ),
        (
            "Life is what happens when you're busy making other plans.",
            "Life",
        ),
        ("You miss 100% of the shots you don't take.", "Inspiration"),
    ]
    .into_iter()
    .map(|(text, category)| Quote {
        text: text.to_owned(),
        category: category.to_owned(),
    })
    .collect()
}
