//! Validation errors raised by the canonical model.

use thiserror::Error;

/// A value was rejected before it reached the store.
///
/// Validation errors are surfaced to whoever submitted the value and are never
/// retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid HTML: {0}")]
    Html(String),

    #[error("Invalid hex color: {0}")]
    HexColor(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Invalid field {field}: {message}")]
    Field { field: String, message: String },
}

impl ValidationError {
    pub fn html(token: impl Into<String>) -> Self {
        Self::Html(token.into())
    }

    pub fn hex_color(value: impl Into<String>) -> Self {
        Self::HexColor(value.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}
