use serde::{Deserialize, Serialize};
use std::fmt;

// ── Correlation ───────────────────────────────────────────────────────────────

/// Why a correlation could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    /// Fewer than two paired observations.
    TooFewPoints,
    /// One of the series is constant.
    ZeroVariance,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewPoints => f.write_str("fewer than two data points"),
            Self::ZeroVariance => f.write_str("a series has zero variance"),
        }
    }
}

/// Result of a Pearson correlation.
///
/// An undefined correlation is never reported as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Correlation {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(r) => Some(*r),
            Self::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }
}

impl fmt::Display for Correlation {
    /// `0.873` for defined values, `N/A` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(r) => write!(f, "{:.3}", r),
            Self::Undefined(_) => f.write_str("N/A"),
        }
    }
}

/// Pearson correlation of two aligned series.
///
/// Only the first `min(xs.len(), ys.len())` pairs are used; non-finite pairs
/// are skipped.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Correlation {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect();

    if pairs.len() < 2 {
        return Correlation::Undefined(UndefinedReason::TooFewPoints);
    }

    // A constant fractional series leaves rounding noise in its variance.
    let (x0, y0) = pairs[0];
    if pairs.iter().all(|(x, _)| *x == x0) || pairs.iter().all(|(_, y)| *y == y0) {
        return Correlation::Undefined(UndefinedReason::ZeroVariance);
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return Correlation::Undefined(UndefinedReason::ZeroVariance);
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    Correlation::Defined(r.clamp(-1.0, 1.0))
}

// ── Ratios and descriptive statistics ─────────────────────────────────────────

/// `numerator / denominator`, `None` when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Percent change from `previous` to `current`, `None` when `previous` is 0.
pub fn pct_change(previous: f64, current: f64) -> Option<f64> {
    safe_ratio(current - previous, previous).map(|r| r * 100.0)
}

/// `part / whole * 100`, `None` when `whole` is 0.
pub fn rate_percent(part: f64, whole: f64) -> Option<f64> {
    safe_ratio(part, whole).map(|r| r * 100.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1), `None` for fewer than two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places as i32);
    (value * factor).round() / factor
}
