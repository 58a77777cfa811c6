use serde::Serialize;

/// Colour palette of the dashboard page and its SVG charts.
///
/// Every colour is a CSS colour string so it can be emitted both as a CSS
/// custom property and as an SVG attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Theme {
    pub name: &'static str,

    // ── Page ─────────────────────────────────────────────────────────────────
    pub background: &'static str,
    pub surface: &'static str,
    pub border: &'static str,

    // ── Text ─────────────────────────────────────────────────────────────────
    pub text: &'static str,
    pub muted: &'static str,
    pub accent: &'static str,

    // ── Status ───────────────────────────────────────────────────────────────
    pub positive: &'static str,
    pub negative: &'static str,
    pub warning: &'static str,
    pub error: &'static str,

    // ── Charts ───────────────────────────────────────────────────────────────
    pub grid: &'static str,
    /// Series colours, cycled in order.
    pub series: &'static [&'static str],
}

const LIGHT_SERIES: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

const DARK_SERIES: &[&str] = &[
    "#4fa3e0", "#ffa64d", "#5cd65c", "#ff6b6b", "#b59ce6", "#c49c94", "#f7b6d2", "#4dd9e8",
];

impl Theme {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Light page theme (default).
    pub fn light() -> Self {
        Self {
            name: "light",
            background: "#f5f6fa",
            surface: "#ffffff",
            border: "#dcdfe6",
            text: "#1f2430",
            muted: "#6b7280",
            accent: "#fe2c55",
            positive: "#15803d",
            negative: "#b91c1c",
            warning: "#b45309",
            error: "#b91c1c",
            grid: "#e5e7eb",
            series: LIGHT_SERIES,
        }
    }

    /// Dark page theme.
    pub fn dark() -> Self {
        Self {
            name: "dark",
            background: "#0f1117",
            surface: "#1a1d27",
            border: "#2d3140",
            text: "#e5e7eb",
            muted: "#9ca3af",
            accent: "#25f4ee",
            positive: "#4ade80",
            negative: "#f87171",
            warning: "#fbbf24",
            error: "#f87171",
            grid: "#2d3140",
            series: DARK_SERIES,
        }
    }

    /// Construct a theme by name. Unknown names fall back to the light theme.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "dark" => Self::dark(),
            _ => Self::light(),
        }
    }

    // ── Style helpers ────────────────────────────────────────────────────────

    /// Colour of the `index`-th chart series.
    pub fn series_color(&self, index: usize) -> &'static str {
        self.series[index % self.series.len()]
    }

    /// Colour of a signed change: positive, negative or muted for zero and
    /// undefined changes.
    pub fn change_color(&self, change: Option<f64>) -> &'static str {
        match change {
            Some(c) if c > 0.0 => self.positive,
            Some(c) if c < 0.0 => self.negative,
            _ => self.muted,
        }
    }

    /// CSS custom properties for the page `:root` rule.
    pub fn css_variables(&self) -> String {
        [
            ("--bg", self.background),
            ("--surface", self.surface),
            ("--border", self.border),
            ("--text", self.text),
            ("--muted", self.muted),
            ("--accent", self.accent),
            ("--positive", self.positive),
            ("--negative", self.negative),
            ("--warning", self.warning),
            ("--error", self.error),
        ]
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
