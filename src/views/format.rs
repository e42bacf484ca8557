//! Display formatting shared by the views.

/// Shown in place of a missing or non-numeric value.
pub const PLACEHOLDER: &str = "N/A";

/// Group the digits of an unsigned integer string with commas.
fn group_digits(digits: &str) -> String {
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Format a count with comma separators: `600000` -> `"600,000"`.
pub fn format_count(n: u64) -> String {
    group_digits(&n.to_string())
}

/// Round to the nearest integer and group digits: `12345.6` -> `"12,346"`.
pub fn format_integer(value: f64) -> String {
    format_decimal(value, 0)
}

/// Fixed decimals with grouped integer part: `20000.5` -> `"20,000.50"`.
pub fn format_decimal(value: f64, places: usize) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let formatted = format!("{:.*}", places, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };
    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{}.{frac}", group_digits(int_part)),
        None => format!("{sign}{}", group_digits(int_part)),
    }
}

/// Format a 0-1 ratio as a percentage: `0.254` -> `"25.4%"`.
pub fn format_percent(ratio: f64) -> String {
    if !ratio.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{}%", format_decimal(ratio * 100.0, 1))
}

/// Format an optional value, falling back to [`PLACEHOLDER`].
pub fn or_placeholder(value: Option<f64>, format: impl Fn(f64) -> String) -> String {
    value.map(format).unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
