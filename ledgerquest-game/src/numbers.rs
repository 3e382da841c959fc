//! Numeric helpers centralizing money formatting and lossy casts.

/// Format a currency amount with thousands separators, e.g. `-17,000`.
#[must_use]
pub fn format_money(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub const fn i64_to_f64(value: i64) -> f64 {
    value as f64
}

/// Ratio of `part` to `whole`, or `0.0` when `whole` is zero.
#[must_use]
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let part = i64::try_from(part).unwrap_or(i64::MAX);
    let whole = i64::try_from(whole).unwrap_or(i64::MAX);
    i64_to_f64(part) / i64_to_f64(whole)
}
