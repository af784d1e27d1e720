//! Validators applied to editor- and upstream-supplied values.

pub mod color;
pub mod html;

pub use color::validate_hex_color;
pub use html::validate_html;

use crate::errors::ValidationError;

/// Validates an optional HTML field, naming the field in the error.
pub fn validate_html_field(field: &str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(html) => validate_html(html).map_err(|e| ValidationError::field(field, e.to_string())),
        None => Ok(()),
    }
}
