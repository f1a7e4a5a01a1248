//! Plot Configuration
//! Fonts, color cycles, heatmap palette and figure sizes, plus the
//! per-chart description handed to the renderer.

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

/// Default line/bar color cycle.
pub const DEFAULT_CYCLE: [&str; 20] = [
    "black",
    "grey",
    "darkorange",
    "red",
    "lightcoral",
    "gold",
    "darkred",
    "greenyellow",
    "sandybrown",
    "darkgreen",
    "lightsteelblue",
    "limegreen",
    "turquoise",
    "blue",
    "teal",
    "mediumpurple",
    "fuchsia",
    "deepskyblue",
    "mediumvioletred",
    "darkgoldenrod",
];

/// Greens to blues.
pub const CYCLE_GREEN_BLUE: [&str; 6] = ["#68C469", "#68C497", "#68C3C4", "#6895C4", "#6968C4", "#9768C4"];
/// Purples to reds.
pub const CYCLE_PURPLE_RED: [&str; 6] = ["#B468C4", "#C468BD", "#C468A6", "#C4688F", "#C46878", "#C46F68"];
/// Yellows to greens.
pub const CYCLE_YELLOW_GREEN: [&str; 6] = ["#C8AC4F", "#C6C84F", "#A8C84F", "#89C84F", "#4FC84F", "#4FC86D"];

/// Diverging heatmap stops, dark ends around a light center.
pub const HEATMAP_PALETTE: [&str; 5] = ["#2F1436", "#4C6FB5", "#E2D9E2", "#C0583F", "#3C0F1F"];

const NAMED_COLORS: [(&str, (u8, u8, u8)); 21] = [
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("grey", (128, 128, 128)),
    ("darkorange", (255, 140, 0)),
    ("red", (255, 0, 0)),
    ("lightcoral", (240, 128, 128)),
    ("gold", (255, 215, 0)),
    ("darkred", (139, 0, 0)),
    ("greenyellow", (173, 255, 47)),
    ("sandybrown", (244, 164, 96)),
    ("darkgreen", (0, 100, 0)),
    ("lightsteelblue", (176, 196, 222)),
    ("limegreen", (50, 205, 50)),
    ("turquoise", (64, 224, 208)),
    ("blue", (0, 0, 255)),
    ("teal", (0, 128, 128)),
    ("mediumpurple", (147, 112, 219)),
    ("fuchsia", (255, 0, 255)),
    ("deepskyblue", (0, 191, 255)),
    ("mediumvioletred", (199, 21, 133)),
    ("darkgoldenrod", (184, 134, 11)),
];

/// Parse a color name from the table above or `#RRGGBB`.
pub fn parse_color(value: &str) -> Option<RGBColor> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(RGBColor(channel(0)?, channel(2)?, channel(4)?));
    }
    let lower = value.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, (r, g, b))| RGBColor(*r, *g, *b))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Figure size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureSize {
    pub width: u32,
    pub height: u32,
}

/// Smallest and largest accepted figure side, in pixels.
pub const MIN_FIGURE_SIDE: u32 = 200;
pub const MAX_FIGURE_SIDE: u32 = 10_000;

impl FigureSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(self) -> bool {
        let side = MIN_FIGURE_SIDE..=MAX_FIGURE_SIDE;
        side.contains(&self.width) && side.contains(&self.height)
    }
}

/// Rendering settings shared by every chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub font_family: String,
    pub title_size: u32,
    pub label_size: u32,
    pub tick_size: u32,
    pub legend_size: u32,
    pub color_cycle: Vec<String>,
    pub alt_cycles: Vec<Vec<String>>,
    pub heatmap_palette: Vec<String>,
    /// Opacity of filled bands.
    pub fill_alpha: f64,
    pub heatmap_size: FigureSize,
    pub heatmap_line_size: FigureSize,
    pub line_size: FigureSize,
    pub bar_size: FigureSize,
    pub histogram_size: FigureSize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            title_size: 12,
            label_size: 8,
            tick_size: 8,
            legend_size: 10,
            color_cycle: strings(&DEFAULT_CYCLE),
            alt_cycles: vec![
                strings(&CYCLE_GREEN_BLUE),
                strings(&CYCLE_PURPLE_RED),
                strings(&CYCLE_YELLOW_GREEN),
            ],
            heatmap_palette: strings(&HEATMAP_PALETTE),
            fill_alpha: 0.1,
            heatmap_size: FigureSize::new(1500, 700),
            heatmap_line_size: FigureSize::new(1500, 1000),
            line_size: FigureSize::new(1500, 500),
            bar_size: FigureSize::new(1500, 600),
            histogram_size: FigureSize::new(1000, 500),
        }
    }
}

impl PlotConfig {
    /// Every configured color that does not parse.
    pub fn invalid_colors(&self) -> Vec<String> {
        self.color_cycle
            .iter()
            .chain(self.alt_cycles.iter().flatten())
            .chain(&self.heatmap_palette)
            .filter(|c| parse_color(c).is_none())
            .cloned()
            .collect()
    }

    /// Names of the figure sizes outside the accepted bounds.
    pub fn invalid_sizes(&self) -> Vec<&'static str> {
        [
            ("heatmap_size", self.heatmap_size),
            ("heatmap_line_size", self.heatmap_line_size),
            ("line_size", self.line_size),
            ("bar_size", self.bar_size),
            ("histogram_size", self.histogram_size),
        ]
        .into_iter()
        .filter(|(_, size)| !size.is_valid())
        .map(|(name, _)| name)
        .collect()
    }

    /// Default cycle, or alternative cycle `n - 1` for `n > 0`.
    pub fn cycle(&self, n: usize) -> Vec<RGBColor> {
        let names = match n {
            0 => &self.color_cycle,
            n => self.alt_cycles.get(n - 1).unwrap_or(&self.color_cycle),
        };
        let colors: Vec<RGBColor> = names.iter().filter_map(|c| parse_color(c)).collect();
        if colors.is_empty() {
            vec![RGBColor(0, 0, 0)]
        } else {
            colors
        }
    }

    pub fn palette(&self) -> Palette {
        Palette {
            stops: self
                .heatmap_palette
                .iter()
                .filter_map(|c| parse_color(c))
                .collect(),
        }
    }
}

/// Piecewise-linear color map.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub stops: Vec<RGBColor>,
}

impl Palette {
    /// Color for `value` on `lo..=hi`. With a center, the range is made
    /// symmetric around it so the center maps to the middle of the palette.
    pub fn color_at(&self, value: f64, lo: f64, hi: f64, center: Option<f64>) -> RGBColor {
        let (lo, hi) = match center {
            Some(c) => {
                let half = (hi - c).abs().max((c - lo).abs());
                (c - half, c + half)
            }
            None => (lo, hi),
        };
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.5 };
        self.sample(t)
    }

    /// Color at `t` in `0..=1`.
    pub fn sample(&self, t: f64) -> RGBColor {
        match self.stops.len() {
            0 => RGBColor(255, 255, 255),
            1 => self.stops[0],
            n => {
                let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
                let pos = t * (n - 1) as f64;
                let i = (pos.floor() as usize).min(n - 2);
                let frac = pos - i as f64;
                let (a, b) = (self.stops[i], self.stops[i + 1]);
                let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
                RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
            }
        }
    }
}

/// Numeric annotation format: fixed decimals or a rounded integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Fixed(usize),
    Integer,
}

impl ValueFormat {
    /// Missing values render empty.
    pub fn format(self, value: f64) -> String {
        if !value.is_finite() {
            return String::new();
        }
        match self {
            Self::Fixed(digits) => format!("{:.*}", digits, value),
            Self::Integer => format!("{}", value.round() as i64),
        }
    }
}

/// What one chart shows and where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    /// Second panel title (heatmap + line, line pair).
    pub subtitle: Option<String>,
    /// File name without extension.
    pub file_stem: String,
    pub format: ValueFormat,
    pub annotate: bool,
    pub center: Option<f64>,
    pub stacked: bool,
    /// Values are parts of a whole, shown times 100.
    pub percentage: bool,
    pub x_label: String,
    pub y_label: String,
    /// Index into [`PlotConfig::cycle`].
    pub cycle: usize,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, file_stem: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            file_stem: file_stem.into(),
            format: ValueFormat::Fixed(1),
            annotate: true,
            center: None,
            stacked: false,
            percentage: false,
            x_label: String::new(),
            y_label: String::new(),
            cycle: 0,
        }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    pub fn center(mut self, center: f64) -> Self {
        self.center = Some(center);
        self
    }

    pub fn stacked(mut self) -> Self {
        self.stacked = true;
        self
    }

    pub fn percentage(mut self) -> Self {
        self.percentage = true;
        self
    }

    pub fn labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = x.into();
        self.y_label = y.into();
        self
    }

    pub fn cycle(mut self, cycle: usize) -> Self {
        self.cycle = cycle;
        self
    }
}
