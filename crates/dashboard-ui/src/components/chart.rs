//! Inline SVG line and bar charts.
//!
//! Charts are rendered server side to plain SVG strings; the page template
//! embeds them unescaped. Every label passes through [`tera::escape_html`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use chrono::NaiveDate;
use dashboard_core::formatting::format_compact;
use tera::escape_html;

use crate::themes::Theme;

/// Markup shown instead of a chart when the filters leave nothing to plot.
pub const NO_DATA: &str = r#"<div class="no-data">No data for the current filters</div>"#;

const WIDTH: f64 = 820.0;
const HEIGHT: f64 = 300.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 60.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 60.0;
const Y_TICKS: usize = 5;
const MAX_X_LABELS: usize = 10;

// ── Series ────────────────────────────────────────────────────────────────────

/// One line of a [`LineChart`]. `values` is aligned with the chart's x labels;
/// `None` leaves a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
    /// Plot against the right-hand axis.
    pub secondary: bool,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
            secondary: false,
        }
    }

    pub fn on_secondary_axis(mut self) -> Self {
        self.secondary = true;
        self
    }

    fn defined(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().flatten().copied().filter(|v| v.is_finite())
    }
}

/// Align date-keyed values to a shared sorted date axis.
///
/// Returns the axis labels and, per input series, its values on that axis
/// (`None` where a series has no value for a date).
pub fn align_by_date(series: &[BTreeMap<NaiveDate, f64>]) -> (Vec<String>, Vec<Vec<Option<f64>>>) {
    let dates: BTreeSet<NaiveDate> = series.iter().flat_map(|s| s.keys().copied()).collect();
    let labels = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
    let values = series
        .iter()
        .map(|s| dates.iter().map(|d| s.get(d).copied()).collect())
        .collect();
    (labels, values)
}

// ── Scale ─────────────────────────────────────────────────────────────────────

/// Linear mapping from a value range to the plot's vertical pixel range.
#[derive(Debug, Clone, Copy)]
struct Scale {
    min: f64,
    max: f64,
}

impl Scale {
    /// Range covering `values` and zero. `None` when there are no values.
    fn covering(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut min = 0.0_f64;
        let mut max = f64::NEG_INFINITY;
        let mut any = false;
        for v in values {
            any = true;
            min = min.min(v);
            max = max.max(v);
        }
        if !any {
            return None;
        }
        max = max.max(0.0);
        if (max - min).abs() < f64::EPSILON {
            max = min + 1.0;
        }
        Some(Self { min, max })
    }

    fn y(&self, value: f64) -> f64 {
        let plot = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        HEIGHT - MARGIN_BOTTOM - (value - self.min) / (self.max - self.min) * plot
    }

    fn ticks(&self) -> impl Iterator<Item = f64> + '_ {
        (0..=Y_TICKS).map(move |i| self.min + (self.max - self.min) * i as f64 / Y_TICKS as f64)
    }
}

fn x_position(index: usize, count: usize) -> f64 {
    let plot = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    if count <= 1 {
        MARGIN_LEFT + plot / 2.0
    } else {
        MARGIN_LEFT + plot * index as f64 / (count - 1) as f64
    }
}

// ── LineChart ─────────────────────────────────────────────────────────────────

/// Multi-series line chart over categorical x labels, with an optional right
/// axis for series flagged [`Series::secondary`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_labels: Vec<String>,
    pub series: Vec<Series>,
    pub y_label: Option<String>,
    pub secondary_label: Option<String>,
}

impl LineChart {
    pub fn new(title: impl Into<String>, x_labels: Vec<String>) -> Self {
        Self {
            title: title.into(),
            x_labels,
            series: Vec::new(),
            y_label: None,
            secondary_label: None,
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_axis_labels(mut self, primary: impl Into<String>, secondary: Option<String>) -> Self {
        self.y_label = Some(primary.into());
        self.secondary_label = secondary;
        self
    }

    /// `true` when no series has a single plottable point.
    pub fn is_empty(&self) -> bool {
        self.x_labels.is_empty() || self.series.iter().all(|s| s.defined().next().is_none())
    }

    /// SVG markup, or [`NO_DATA`] when empty.
    pub fn render(&self, theme: &Theme) -> String {
        if self.is_empty() {
            return NO_DATA.to_string();
        }

        let primary = Scale::covering(self.series.iter().filter(|s| !s.secondary).flat_map(Series::defined));
        let secondary = Scale::covering(self.series.iter().filter(|s| s.secondary).flat_map(Series::defined));

        let mut svg = open_svg(&self.title, theme);
        if let Some(scale) = primary {
            axis(&mut svg, &scale, MARGIN_LEFT, "end", theme, true);
        }
        if let Some(scale) = secondary {
            axis(&mut svg, &scale, WIDTH - MARGIN_RIGHT, "start", theme, primary.is_none());
        }
        let count = self.x_labels.len();
        x_axis(&mut svg, &self.x_labels, |i| x_position(i, count), theme);
        axis_titles(&mut svg, self.y_label.as_deref(), self.secondary_label.as_deref(), theme);

        for (index, series) in self.series.iter().enumerate() {
            let Some(scale) = (if series.secondary { secondary } else { primary }) else {
                continue;
            };
            let color = theme.series_color(index);
            let dash = if series.secondary { r#" stroke-dasharray="6 3""# } else { "" };

            // One path per run of defined values; gaps break the line.
            let mut path = String::new();
            let mut pen_down = false;
            for (i, value) in series.values.iter().enumerate().take(count) {
                match value.filter(|v| v.is_finite()) {
                    Some(v) => {
                        let cmd = if pen_down { 'L' } else { 'M' };
                        let _ = write!(path, "{}{:.1},{:.1} ", cmd, x_position(i, count), scale.y(v));
                        pen_down = true;
                    }
                    None => pen_down = false,
                }
            }
            let _ = write!(
                svg,
                r#"<path d="{}" fill="none" stroke="{}" stroke-width="2"{}><title>{}</title></path>"#,
                path.trim_end(),
                color,
                dash,
                escape_html(&series.name)
            );
            for (i, value) in series.values.iter().enumerate().take(count) {
                if let Some(v) = value.filter(|v| v.is_finite()) {
                    let _ = write!(
                        svg,
                        r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{}"><title>{}: {} = {}</title></circle>"#,
                        x_position(i, count),
                        scale.y(v),
                        color,
                        escape_html(&series.name),
                        escape_html(&self.x_labels[i]),
                        format_compact(v)
                    );
                }
            }
        }

        svg.push_str("</svg>");
        svg.push_str(&legend(self.series.iter().map(|s| s.name.as_str()), theme));
        svg
    }
}

// ── BarChart ──────────────────────────────────────────────────────────────────

/// Single-series vertical bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<(String, f64)>,
}

impl BarChart {
    pub fn new(title: impl Into<String>, bars: Vec<(String, f64)>) -> Self {
        Self {
            title: title.into(),
            bars,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn render(&self, theme: &Theme) -> String {
        if self.is_empty() {
            return NO_DATA.to_string();
        }
        let Some(scale) = Scale::covering(self.bars.iter().map(|(_, v)| *v)) else {
            return NO_DATA.to_string();
        };

        let mut svg = open_svg(&self.title, theme);
        axis(&mut svg, &scale, MARGIN_LEFT, "end", theme, true);

        let slot = (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) / self.bars.len() as f64;
        let labels: Vec<String> = self.bars.iter().map(|(l, _)| l.clone()).collect();
        x_axis(&mut svg, &labels, |i| MARGIN_LEFT + slot * (i as f64 + 0.5), theme);

        let bar_width = (slot * 0.7).max(1.0);
        let zero = scale.y(0.0);
        for (i, (label, value)) in self.bars.iter().enumerate() {
            let top = scale.y(*value).min(zero);
            let height = (scale.y(*value) - zero).abs();
            let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_width) / 2.0;
            let _ = write!(
                svg,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}: {}</title></rect>"#,
                x,
                top,
                bar_width,
                height,
                theme.series_color(i),
                escape_html(label),
                format_compact(*value)
            );
        }
        svg.push_str("</svg>");
        svg
    }
}

// ── SVG pieces ────────────────────────────────────────────────────────────────

fn open_svg(title: &str, theme: &Theme) -> String {
    format!(
        r#"<svg class="chart" viewBox="0 0 {w} {h}" role="img" aria-label="{t}" xmlns="http://www.w3.org/2000/svg" font-size="11" fill="{fg}">"#,
        w = WIDTH,
        h = HEIGHT,
        t = escape_html(title),
        fg = theme.text,
    )
}

fn axis(svg: &mut String, scale: &Scale, x: f64, anchor: &str, theme: &Theme, grid: bool) {
    let offset = if anchor == "end" { -6.0 } else { 6.0 };
    for tick in scale.ticks() {
        let y = scale.y(tick);
        if grid {
            let _ = write!(
                svg,
                r#"<line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="{}" stroke-width="1"/>"#,
                MARGIN_LEFT,
                WIDTH - MARGIN_RIGHT,
                theme.grid,
            );
        }
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="{}" fill="{}">{}</text>"#,
            x + offset,
            y + 4.0,
            anchor,
            theme.muted,
            format_compact(tick)
        );
    }
}

/// Baseline and rotated x labels; `position` maps a label index to its x.
fn x_axis(svg: &mut String, labels: &[String], position: impl Fn(usize) -> f64, theme: &Theme) {
    let count = labels.len();
    let step = count.div_ceil(MAX_X_LABELS).max(1);
    let baseline = HEIGHT - MARGIN_BOTTOM;
    let _ = write!(
        svg,
        r#"<line x1="{:.1}" y1="{b:.1}" x2="{:.1}" y2="{b:.1}" stroke="{}"/>"#,
        MARGIN_LEFT,
        WIDTH - MARGIN_RIGHT,
        theme.border,
        b = baseline,
    );
    for (i, label) in labels.iter().enumerate().filter(|(i, _)| i % step == 0) {
        let x = position(i);
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{:.1}" text-anchor="end" transform="rotate(-35 {x:.1} {:.1})" fill="{}">{}</text>"#,
            baseline + 14.0,
            baseline + 14.0,
            theme.muted,
            escape_html(label)
        );
    }
}

fn axis_titles(svg: &mut String, primary: Option<&str>, secondary: Option<&str>, theme: &Theme) {
    if let Some(label) = primary {
        let _ = write!(
            svg,
            r#"<text x="12" y="{:.1}" transform="rotate(-90 12 {:.1})" text-anchor="middle" fill="{}">{}</text>"#,
            HEIGHT / 2.0,
            HEIGHT / 2.0,
            theme.muted,
            escape_html(label)
        );
    }
    if let Some(label) = secondary {
        let x = WIDTH - 10.0;
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{:.1}" transform="rotate(90 {x:.1} {:.1})" text-anchor="middle" fill="{}">{}</text>"#,
            HEIGHT / 2.0,
            HEIGHT / 2.0,
            theme.muted,
            escape_html(label)
        );
    }
}

fn legend<'a>(names: impl Iterator<Item = &'a str>, theme: &Theme) -> String {
    let mut html = String::from(r#"<ul class="legend">"#);
    for (i, name) in names.enumerate() {
        let _ = write!(
            html,
            r#"<li><span class="swatch" style="background:{}"></span>{}</li>"#,
            theme.series_color(i),
            escape_html(name)
        );
    }
    html.push_str("</ul>");
    html
}

// ── Tests ─────────────────────────────────────────────────────────────────────
