use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("No numeric value in duration: '{0}'")]
    MissingNumber(String),

    #[error("Invalid number in duration: '{0}'")]
    InvalidNumber(String),

    #[error("Unknown time unit: '{0}'")]
    UnknownUnit(String),
}

/// Parse a human-readable duration as written on a slide.
///
/// Bare numbers are milliseconds. Supports "500ms", "2s", "1.5s", "2m", "1h".
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let input = input.trim();

    if let Ok(ms) = input.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }

    let (number_part, unit_part) = split_number_and_unit(input)?;
    let value: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| DurationError::InvalidNumber(number_part.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(DurationError::InvalidNumber(number_part.to_string()));
    }

    let multiplier = match unit_part.trim().to_ascii_lowercase().as_str() {
        "ms" | "milliseconds" | "millisecond" | "" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        other => return Err(DurationError::UnknownUnit(other.to_string())),
    };

    Ok(Duration::from_millis((value * multiplier) as u64))
}

fn split_number_and_unit(input: &str) -> Result<(&str, &str), DurationError> {
    let split_pos = input
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let number_part = &input[..split_pos];
    if number_part.trim().is_empty() {
        return Err(DurationError::MissingNumber(input.to_string()));
    }

    Ok((number_part, &input[split_pos..]))
}
