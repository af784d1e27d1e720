use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::ValidationError;

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
}

/// Accepts a 3- or 6-digit hex color without the leading `#`.
pub fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    if HEX_COLOR.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::hex_color(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_short_and_long_forms() {
        assert!(validate_hex_color("ff0000").is_ok());
        assert!(validate_hex_color("f00").is_ok());
        assert!(validate_hex_color("A1b2C3").is_ok());
    }

    #[test]
    fn test_rejects_malformed_colors() {
        for value in ["#ff0000", "gg0000", "ff00", "", "ff00000"] {
            assert_eq!(
                validate_hex_color(value),
                Err(ValidationError::hex_color(value)),
                "{value} should be rejected"
            );
        }
    }
}
