// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

pub const MIN_FILTER_YEAR: i32 = 2000;
pub const MAX_FILTER_YEAR: i32 = 2050;

static ABSOLUTE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(?:-(\d{1,2})(?:-(\d{1,2})(?: (\d{1,2})(?::(\d{1,2})(?::(\d{1,2}))?)?)?)?)?$",
    )
    .expect("absolute time pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("expected YYYY[-MM[-DD[ HH[:MM[:SS]]]]] or a signed number of seconds")]
    Syntax,
    #[error("year {0} is outside 2000..=2050")]
    YearOutOfRange(i32),
    #[error("{0:?} is not a real calendar date or time")]
    InvalidDate(String),
}

/// Resolves a filter literal into epoch seconds.
///
/// Absolute values are read in `offset`; a bare integer is an offset in
/// seconds from `now`. Four-digit values are years first, so `2021` is the
/// start of 2021 while `3600` (year out of range) falls back to one hour from
/// now.
pub fn parse_time_value(
    input: &str,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Result<i64, TimeParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Syntax);
    }

    match parse_absolute(trimmed, offset) {
        Some(Ok(seconds)) => return Ok(seconds),
        Some(Err(error)) => {
            if trimmed.parse::<i64>().is_err() {
                return Err(error);
            }
        }
        None => {}
    }

    let delta: i64 = trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .parse()
        .map_err(|_| TimeParseError::Syntax)?;
    let resolved = now
        .unix_timestamp()
        .checked_add(delta)
        .ok_or(TimeParseError::Syntax)?;
    let year = OffsetDateTime::from_unix_timestamp(resolved)
        .map_err(|_| TimeParseError::Syntax)?
        .to_offset(offset)
        .year();
    check_year(year)?;
    Ok(resolved)
}

fn parse_absolute(input: &str, offset: UtcOffset) -> Option<Result<i64, TimeParseError>> {
    let captures = ABSOLUTE_TIME.captures(input)?;
    let part = |index: usize, default: u32| -> u32 {
        captures
            .get(index)
            .and_then(|found| found.as_str().parse().ok())
            .unwrap_or(default)
    };

    let year = part(1, 0) as i32;
    if let Err(error) = check_year(year) {
        return Some(Err(error));
    }

    let resolved = build_timestamp(
        year,
        [part(2, 1), part(3, 1), part(4, 0), part(5, 0), part(6, 0)],
        offset,
    );
    Some(resolved.ok_or_else(|| TimeParseError::InvalidDate(input.to_owned())))
}

fn build_timestamp(year: i32, parts: [u32; 5], offset: UtcOffset) -> Option<i64> {
    let [month, day, hour, minute, second] = parts.map(|part| u8::try_from(part).ok());
    let month = Month::try_from(month?).ok()?;
    let date = Date::from_calendar_date(year, month, day?).ok()?;
    let time = Time::from_hms(hour?, minute?, second?).ok()?;
    Some(
        PrimitiveDateTime::new(date, time)
            .assume_offset(offset)
            .unix_timestamp(),
    )
}

fn check_year(year: i32) -> Result<(), TimeParseError> {
    if (MIN_FILTER_YEAR..=MAX_FILTER_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(TimeParseError::YearOutOfRange(year))
    }
}
