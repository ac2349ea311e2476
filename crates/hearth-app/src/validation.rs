// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime};

use crate::ReminderFrequency;

pub const MAX_TITLE_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvalidMoney,
    NegativeMoney,
    InvalidDate,
    InvalidEmail,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMoney => f.write_str("invalid money value"),
            Self::NegativeMoney => f.write_str("negative money value"),
            Self::InvalidDate => f.write_str("invalid date value"),
            Self::InvalidEmail => f.write_str("invalid email address"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

pub fn parse_required_cents(input: &str) -> ValidationResult<i64> {
    parse_cents(input.trim())
}

pub fn parse_optional_cents(input: &str) -> ValidationResult<Option<i64>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_cents(trimmed).map(Some)
}

pub fn format_cents(cents: i64) -> String {
    let (sign, cents) = normalize_sign(cents);
    format!("{sign}${}.{:02}", group_thousands(cents / 100), cents % 100)
}

/// Short money form for progress bars and cards: `$1.2k`, `$45k`, `$1M`.
pub fn format_compact_cents(cents: i64) -> String {
    let (sign, magnitude) = normalize_sign(cents);
    let dollars = (magnitude as f64) / 100.0;
    if dollars < 1000.0 {
        return format_cents(cents);
    }

    let (value, suffix) = if dollars < 1_000_000.0 {
        (dollars / 1000.0, "k")
    } else {
        (dollars / 1_000_000.0, "M")
    };
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract().abs() < f64::EPSILON {
        format!("{sign}${rounded:.0}{suffix}")
    } else {
        format!("{sign}${rounded:.1}{suffix}")
    }
}

pub fn format_percent(percent: Option<f64>) -> String {
    percent.map_or_else(|| "--".to_owned(), |value| format!("{value:.0}%"))
}

pub fn parse_optional_date(input: &str) -> ValidationResult<Option<Date>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Date::parse(trimmed, &format_description!("[year]-[month]-[day]"))
        .map(Some)
        .map_err(|_| ValidationError::InvalidDate)
}

pub fn format_date(value: Option<Date>) -> String {
    value
        .and_then(|date| {
            date.format(&format_description!("[year]-[month]-[day]"))
                .ok()
        })
        .unwrap_or_default()
}

pub fn validate_email(input: &str) -> ValidationResult<String> {
    let trimmed = input.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || trimmed.chars().any(char::is_whitespace)
    {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(trimmed.to_lowercase())
}

/// Calendar-aware month addition; the day clamps to the target month's end.
pub fn add_months(date: Date, months: i32) -> Option<Date> {
    let total_month = i32::from(date.month() as u8) - 1 + months;
    let year = date.year() + total_month.div_euclid(12);
    let month = Month::try_from((total_month.rem_euclid(12) + 1) as u8).ok()?;
    let day = date.day().min(time::util::days_in_month(month, year));
    Date::from_calendar_date(year, month, day).ok()
}

/// The next firing after `at` for a recurring reminder; `None` for one-offs.
pub fn next_occurrence(frequency: ReminderFrequency, at: OffsetDateTime) -> Option<OffsetDateTime> {
    match frequency {
        ReminderFrequency::Once => None,
        ReminderFrequency::Daily => at.checked_add(Duration::days(1)),
        ReminderFrequency::Weekly => at.checked_add(Duration::weeks(1)),
        ReminderFrequency::Monthly => add_months(at.date(), 1).map(|date| at.replace_date(date)),
    }
}

fn parse_cents(input: &str) -> ValidationResult<i64> {
    let clean = input.replace(',', "");
    if clean.starts_with('-') {
        return Err(ValidationError::NegativeMoney);
    }

    let clean = clean.strip_prefix('$').unwrap_or(&clean);
    if clean.is_empty() {
        return Err(ValidationError::InvalidMoney);
    }

    let (whole, frac) = match clean.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (clean, None),
    };
    let whole = parse_digits(whole, true)?;
    let frac = match frac {
        None => 0,
        Some(frac) if frac.len() > 2 || frac.contains('.') => {
            return Err(ValidationError::InvalidMoney);
        }
        Some(frac) if frac.len() == 1 => parse_digits(frac, false)? * 10,
        Some(frac) => parse_digits(frac, false)?,
    };

    whole
        .checked_mul(100)
        .and_then(|value| value.checked_add(frac))
        .ok_or(ValidationError::InvalidMoney)
}

fn parse_digits(input: &str, allow_empty: bool) -> ValidationResult<i64> {
    if input.is_empty() {
        return if allow_empty {
            Ok(0)
        } else {
            Err(ValidationError::InvalidMoney)
        };
    }
    if !input.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidMoney);
    }
    input
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidMoney)
}

fn group_thousands(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn normalize_sign(cents: i64) -> (&'static str, i64) {
    match cents {
        0.. => ("", cents),
        i64::MIN => ("-", i64::MAX),
        _ => ("-", -cents),
    }
}
