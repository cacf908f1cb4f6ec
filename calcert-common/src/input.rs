//! Free-text input normalization
//!
//! Technicians paste balance readings as comma-separated text and type
//! nominal volumes with either `,` or `.` as decimal separator. Everything
//! here is lenient: bad tokens are kept as slots or dropped, never rejected.

/// Maximum number of mass readings per calibration point
pub const MAX_MEASUREMENTS: usize = 10;

/// Split a comma-separated paste into measurement slots
///
/// Tokens are trimmed and kept in paste order. Tokens past the tenth are
/// ignored. Empty or non-numeric tokens stay as slots so the form keeps its
/// shape, but statistics skip them.
///
/// # Examples
///
/// ```
/// use calcert_common::input::parse_measurement_paste;
///
/// let slots = parse_measurement_paste("99.4, 99.5,,abc");
/// assert_eq!(slots, vec!["99.4", "99.5", "", "abc"]);
/// ```
pub fn parse_measurement_paste(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    text.split(',')
        .take(MAX_MEASUREMENTS)
        .map(|token| token.trim().to_string())
        .collect()
}

/// Normalize a typed decimal to use `.` as the only separator
///
/// Every `,` becomes `.`, only the first separator survives, and characters
/// other than ASCII digits are dropped. A `-` is kept only in front of the
/// number so negative entries stay negative.
///
/// # Examples
///
/// ```
/// use calcert_common::input::normalize_decimal_text;
///
/// assert_eq!(normalize_decimal_text("1,5"), "1.5");
/// assert_eq!(normalize_decimal_text("1.000,5"), "1.0005");
/// assert_eq!(normalize_decimal_text(" 200 µL"), "200");
/// assert_eq!(normalize_decimal_text("-100"), "-100");
/// ```
pub fn normalize_decimal_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut seen_separator = false;

    for c in text.chars() {
        match c {
            '0'..='9' => normalized.push(c),
            '-' if normalized.is_empty() => normalized.push(c),
            ',' | '.' if !seen_separator => {
                seen_separator = true;
                normalized.push('.');
            }
            _ => {}
        }
    }

    normalized
}

/// Parse a decimal entry, returning `None` for anything that is not a finite number
pub fn parse_decimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
