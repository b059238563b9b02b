//! Utility functions for common operations.
//!
//! - **Text**: Unicode-aware width, truncation, and control-character
//!   stripping for terminal output
//! - **URL validation**: checks on the configured remote endpoint

mod text;
mod url_validator;

pub use text::{display_width, strip_control_chars, truncate_to_width};
pub use url_validator::{validate_endpoint, UrlValidationError};
