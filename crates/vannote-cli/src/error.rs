//! CLI argument errors.

use thiserror::Error;

use vannote_core::media::parse_seek_input;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid time '{0}': expected seconds or a URL with t=<seconds>")]
    InvalidTime(String),

    #[error("Invalid metadata '{0}': expected key=value")]
    InvalidMetadata(String),

    #[error("Import failed: {0}")]
    ImportFailed(String),
}

/// Accepts fractional seconds (`12.5`) or anything [`parse_seek_input`] understands.
pub fn parse_time(input: &str) -> Result<f64, CliError> {
    if let Ok(seconds) = input.trim().parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Ok(seconds);
        }
        return Err(CliError::InvalidTime(input.to_string()));
    }
    parse_seek_input(input)
        .map(|seconds| seconds as f64)
        .ok_or_else(|| CliError::InvalidTime(input.to_string()))
}

/// Splits `key=value` at the first `=`; the key must not be blank.
pub fn parse_key_value(input: &str) -> Result<(String, String), CliError> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidMetadata(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("12.5"), Ok(12.5));
        assert_eq!(parse_time("https://youtu.be/abc?t=90"), Ok(90.0));
        assert!(parse_time("-1").is_err());
        assert!(parse_time("later").is_err());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("location=Paris=FR"),
            Ok(("location".to_string(), "Paris=FR".to_string()))
        );
        assert_eq!(
            parse_key_value("mood="),
            Ok(("mood".to_string(), String::new()))
        );
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }
}
