use std::time::Duration;

use crate::error::{AppError, AppResult, ValidationError};

pub(crate) fn parse_header(s: &str) -> Result<(String, String), ValidationError> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        Some(_) | None => Err(ValidationError::InvalidHeaderFormat {
            value: s.to_owned(),
        }),
    }
}

/// Parses `250ms`, `10s`, `2m`, `1h`, or a bare number of seconds. Zero is rejected.
pub(crate) fn parse_duration(s: &str) -> Result<Duration, ValidationError> {
    let value = s.trim();
    if value.is_empty() {
        return Err(ValidationError::DurationEmpty);
    }

    let digits_len = value.chars().take_while(char::is_ascii_digit).count();
    if digits_len == 0 {
        return Err(ValidationError::InvalidDurationFormat {
            value: value.to_owned(),
        });
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part
        .parse()
        .map_err(|err| ValidationError::InvalidDurationNumber {
            value: value.to_owned(),
            source: err,
        })?;

    let unit = match unit_part.trim() {
        "" => "s",
        unit => unit,
    };
    let duration = match unit {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => {
            let secs = number
                .checked_mul(60)
                .ok_or(ValidationError::DurationOverflow)?;
            Duration::from_secs(secs)
        }
        "h" => {
            let secs = number
                .checked_mul(60)
                .and_then(|seconds| seconds.checked_mul(60))
                .ok_or(ValidationError::DurationOverflow)?;
            Duration::from_secs(secs)
        }
        _ => {
            return Err(ValidationError::InvalidDurationUnit {
                unit: unit.to_owned(),
            });
        }
    };

    if duration.is_zero() {
        return Err(ValidationError::DurationZero);
    }

    Ok(duration)
}

pub(crate) fn parse_duration_arg(s: &str) -> AppResult<Duration> {
    parse_duration(s).map_err(AppError::validation)
}

pub(crate) fn parse_positive_u64(s: &str) -> AppResult<u64> {
    let value: u64 = s
        .trim()
        .parse()
        .map_err(|err| AppError::validation(ValidationError::InvalidNumber { source: err }))?;
    if value == 0 {
        return Err(AppError::validation(ValidationError::ValueTooSmall { min: 1 }));
    }
    Ok(value)
}

pub(crate) fn parse_positive_usize(s: &str) -> AppResult<usize> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|err| AppError::validation(ValidationError::InvalidNumber { source: err }))?;
    if value == 0 {
        return Err(AppError::validation(ValidationError::ValueTooSmall { min: 1 }));
    }
    Ok(value)
}

/// Parses a percentage with up to two decimals into hundredths of a percent,
/// so `2.5` becomes `250` and `100` becomes `10_000`.
pub(crate) fn parse_percentage_x100(s: &str) -> Result<u64, ValidationError> {
    let value = s.trim().trim_end_matches('%');
    let invalid = || ValidationError::InvalidPercentage {
        value: s.to_owned(),
    };
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty()
        || fraction.len() > 2
        || !whole.chars().all(|ch| ch.is_ascii_digit())
        || !fraction.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(invalid());
    }
    let whole: u64 = whole.parse().map_err(|_overflow| invalid())?;
    let fraction: u64 = match fraction.len() {
        0 => 0,
        1 => fraction
            .parse::<u64>()
            .map_err(|_overflow| invalid())?
            .saturating_mul(10),
        _ => fraction.parse().map_err(|_overflow| invalid())?,
    };
    let scaled = whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(fraction))
        .ok_or_else(invalid)?;
    if scaled > 10_000 {
        return Err(invalid());
    }
    Ok(scaled)
}

pub(crate) fn parse_percentage_arg(s: &str) -> AppResult<u64> {
    parse_percentage_x100(s).map_err(AppError::validation)
}
