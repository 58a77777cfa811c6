/// Placeholder shown for undefined values (correlations, ratios over zero).
pub const NOT_AVAILABLE: &str = "N/A";

/// Render `value` with comma grouping and exactly `decimals` fraction digits.
///
/// # Examples
///
/// ```
/// use dashboard_core::formatting::format_number;
///
/// assert_eq!(format_number(48_213.75, 1), "48,213.8");
/// assert_eq!(format_number(-9_876.5, 0), "-9,877");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let scale = 10_f64.powi(decimals as i32);
    // 1.005 is stored just below its midpoint; lift it so it rounds up.
    let scaled = value.abs() * scale;
    let rounded = (scaled + scaled * f64::EPSILON).round() / scale;

    let text = format!("{:.*}", decimals as usize, rounded);
    let (digits, fraction) = match text.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (text.as_str(), None),
    };

    let mut out = String::with_capacity(text.len() + 4);
    if value < 0.0 && rounded != 0.0 {
        out.push('-');
    }
    out.push_str(&group_thousands(digits));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Format an integer count with thousands separators.
///
/// ```
/// use dashboard_core::formatting::format_count;
///
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// assert_eq!(format_count(-4_200), "-4,200");
/// ```
pub fn format_count(value: i64) -> String {
    let grouped = group_thousands(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format a delta with an explicit sign: `+1,200`, `-35`, `0`.
pub fn format_signed_count(value: i64) -> String {
    if value > 0 {
        format!("+{}", format_count(value))
    } else {
        format_count(value)
    }
}

/// Format an optional value, `N/A` when absent.
pub fn format_optional(value: Option<f64>, decimals: u32) -> String {
    value
        .filter(|v| v.is_finite())
        .map(|v| format_number(v, decimals))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Format an optional percentage: `12.35%`, or `N/A`.
pub fn format_percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{}%", format_number(v, 2)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Format an optional percent change with a sign: `+12.5%`, `-3.0%`, `N/A`.
pub fn format_signed_percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) if v > 0.0 => format!("+{}%", format_number(v, 1)),
        Some(v) => format!("{}%", format_number(v, 1)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Compact axis label: `950`, `12.3K`, `4.5M`.
pub fn format_compact(value: f64) -> String {
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };
    if abs >= 1_000_000.0 {
        format!("{}{:.1}M", sign, abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{}{:.1}K", sign, abs / 1_000.0)
    } else if abs.fract() == 0.0 {
        format!("{}{}", sign, abs as i64)
    } else {
        format!("{}{:.2}", sign, abs)
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// `"1234567"` → `"1,234,567"`.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
