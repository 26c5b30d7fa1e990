//! Display formatting shared by pages: byte sizes, truncated text, dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fmt::Write;

const BYTES_IN_GB: u64 = 1 << 30;
const BYTES_IN_MB: u64 = 1 << 20;
const BYTES_IN_KB: u64 = 1 << 10;

pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// "2.00 MB", "1.50 KB", "512 bytes", "1 byte", "0 bytes".
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= BYTES_IN_GB {
        format!("{} GB", number_format(bytes as f64 / BYTES_IN_GB as f64))
    } else if bytes >= BYTES_IN_MB {
        format!("{} MB", number_format(bytes as f64 / BYTES_IN_MB as f64))
    } else if bytes >= BYTES_IN_KB {
        format!("{} KB", number_format(bytes as f64 / BYTES_IN_KB as f64))
    } else if bytes == 1 {
        "1 byte".to_string()
    } else {
        format!("{} bytes", bytes)
    }
}

/// Two decimals, comma-grouped thousands.
fn number_format(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, d) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*d);
    }
    format!("{}.{}", grouped, frac_part)
}

/// Cut `text` to at most `length` characters, ending with `suffix` when cut.
pub fn truncate(text: &str, length: usize, suffix: &str) -> String {
    if text.chars().count() <= length {
        return text.to_string();
    }
    let keep = length.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

/// Reformat a stored date (`YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or RFC 3339).
/// Input that does not parse, or a bad format string, returns the input unchanged.
pub fn format_date(date: &str, format: &str) -> String {
    let parsed = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(date).ok().map(|d| d.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    let Some(dt) = parsed else {
        return date.to_string();
    };
    let mut out = String::new();
    if write!(out, "{}", dt.format(format)).is_err() {
        return date.to_string();
    }
    out
}
