use error_stack::{bail, ResultExt};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NumberParseError {
    #[error("Malformed number: {0:?}")]
    MalformedNumber(String),
}

/// Parses an amount formatted like `1,234.56`.
///
/// Whitespace anywhere is dropped and every `,` is treated as a thousands
/// separator. An empty amount is `0.0`.
pub fn parse_number(text: &str) -> error_stack::Result<f64, NumberParseError> {
    let compact: String = text.split_whitespace().collect();
    if compact.is_empty() {
        return Ok(0.0);
    }

    let compact = compact.replace(',', "");

    let value = compact
        .parse::<f64>()
        .change_context_lazy(|| NumberParseError::MalformedNumber(text.to_string()))?;

    // `inf` and `nan` parse fine but are not amounts
    if !value.is_finite() {
        bail!(NumberParseError::MalformedNumber(text.to_string()));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_empty() {
        assert_eq!(parse_number("").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_number_only_whitespace() {
        assert_eq!(parse_number(" \t ").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_number_thousands() {
        assert_eq!(parse_number("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_number("12,345,678.90").unwrap(), 12345678.90);
    }

    #[test]
    fn test_parse_number_surrounding_whitespace() {
        assert_eq!(parse_number("  12.30 ").unwrap(), 12.30);
    }

    #[test]
    fn test_parse_number_interior_whitespace() {
        assert_eq!(parse_number("1 234.56").unwrap(), 1234.56);
        assert_eq!(parse_number("1\u{a0}234.56").unwrap(), 1234.56);
    }

    #[test]
    fn test_parse_number_negative() {
        assert_eq!(parse_number("-1,000.01").unwrap(), -1000.01);
    }

    #[test]
    fn test_parse_number_garbage() {
        let report = parse_number("abc").unwrap_err();
        assert!(matches!(
            report.current_context(),
            NumberParseError::MalformedNumber(text) if text == "abc"
        ));
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert!(parse_number("inf").is_err());
        assert!(parse_number("NaN").is_err());
    }

    #[test]
    fn test_parse_number_lone_separator() {
        assert!(parse_number(",").is_err());
    }
}
