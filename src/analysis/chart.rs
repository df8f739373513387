//! Grouped bar charts and scatter plots
//!
//! Charts are rendered with `plotters` to SVG and PNG, and exported as a
//! PGFPlots `.tex` figure meant to be `\input` into the paper (it needs the
//! `pgfplots` package and the `patterns` TikZ library). PNG text needs the
//! `chart-fonts` feature; without it only the marks are rasterised.

use plotters::coord::combinators::BindKeyPoints;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::FontTransform;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Series colours; the names are `xcolor` names for the `.tex` export
pub const PALETTE: [(&str, RGBColor); 8] = [
    ("orange", RGBColor(255, 165, 0)),
    ("cyan", RGBColor(0, 255, 255)),
    ("green", RGBColor(0, 128, 0)),
    ("red", RGBColor(255, 0, 0)),
    ("purple", RGBColor(128, 0, 128)),
    ("brown", RGBColor(165, 42, 42)),
    ("pink", RGBColor(255, 192, 203)),
    ("blue", RGBColor(0, 0, 255)),
];

/// Bar fill patterns per series in the `.tex` export (`None` = solid)
const PATTERNS: [Option<&str>; 5] = [
    Some("north east lines"),
    None,
    Some("north west lines"),
    Some("horizontal lines"),
    Some("crosshatch"),
];

/// Rendered image size in pixels
pub const CHART_SIZE: (u32, u32) = (1200, 800);

/// Share of each category slot taken by its bars
const GROUP_FILL: f64 = 0.8;

const FONT: &str = "sans-serif";

/// A chart could not be drawn or written
#[derive(Error, Debug)]
#[error("Failed to render chart {path}: {message}")]
pub struct ChartError {
    pub path: PathBuf,
    pub message: String,
}

impl ChartError {
    fn new(path: &Path, error: impl fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}

type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

/// One labelled data series
#[derive(Debug, Clone, PartialEq)]
pub struct Series<T> {
    pub label: String,
    pub values: Vec<T>,
}

impl<T> Series<T> {
    pub fn new(label: impl Into<String>, values: Vec<T>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

fn color_name(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()].0
}

fn color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()].1
}

/// Escape characters that are active in LaTeX text
fn escape_tex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Tick spacing of 1, 2 or 5 times a power of ten giving at most ~10 ticks
pub fn tick_step(max: f64) -> f64 {
    if !max.is_finite() || max <= 0.0 {
        return 1.0;
    }
    let raw = max / 10.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let factor = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    factor * magnitude
}

/// Upper axis bound: a multiple of the tick step strictly above `max`
fn axis_max(max: f64) -> f64 {
    let step = tick_step(max);
    ((max / step).floor() + 1.0) * step
}

/// Comma separated `(x,y)` pairs for `\addplot coordinates`
fn tex_coordinates(points: impl Iterator<Item = (f64, f64)>) -> String {
    points
        .map(|(x, y)| format!("({},{})", x, y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn legend_entry(series: &str) -> String {
    format!("\\addlegendentry{{{}}}\n", escape_tex(series))
}

/// A chart drawable on any `plotters` backend and exportable to PGFPlots
pub trait Plot {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult<DB>;

    fn to_pgfplots(&self) -> String;

    fn write_svg(&self, path: &Path) -> Result<(), ChartError> {
        let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
        self.draw(&root).map_err(|e| ChartError::new(path, e))?;
        root.present().map_err(|e| ChartError::new(path, e))
    }

    fn write_png(&self, path: &Path) -> Result<(), ChartError> {
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        self.draw(&root).map_err(|e| ChartError::new(path, e))?;
        root.present().map_err(|e| ChartError::new(path, e))
    }

    /// Write `<stem>.svg`, `<stem>.png` and `<stem>.tex`
    fn write_all(&self, stem: &Path) -> Result<(), ChartError> {
        self.write_svg(&stem.with_extension("svg"))?;
        self.write_png(&stem.with_extension("png"))?;
        let tex = stem.with_extension("tex");
        std::fs::write(&tex, self.to_pgfplots()).map_err(|e| ChartError::new(&tex, e))
    }
}

/// Grouped bar chart: one group per category, one bar per series
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub categories: Vec<String>,
    pub series: Vec<Series<f64>>,
}

impl BarChart {
    fn value_max(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0, f64::max)
    }

    /// Y axis upper bound, leaving headroom above the tallest bar
    pub fn y_max(&self) -> f64 {
        axis_max(self.value_max() + 5.0)
    }

    /// Left and right x of the bar of `series` in category slot `group`
    fn bar_span(&self, group: usize, series: usize) -> (f64, f64) {
        let width = GROUP_FILL / self.series.len().max(1) as f64;
        let left = group as f64 + (1.0 - GROUP_FILL) / 2.0 + series as f64 * width;
        (left, left + width)
    }
}

impl Plot for BarChart {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult<DB> {
        root.fill(&WHITE)?;

        let groups = self.categories.len().max(1);
        let centers: Vec<f64> = (0..groups).map(|g| g as f64 + 0.5).collect();
        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 28))
            .margin(15)
            .x_label_area_size(180)
            .y_label_area_size(70)
            .build_cartesian_2d((0.0..groups as f64).with_key_points(centers), 0.0..self.y_max())?;

        let category = |x: &f64| {
            self.categories
                .get(x.floor() as usize)
                .cloned()
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(groups)
            .x_label_formatter(&category)
            .x_label_style((FONT, 14).into_font().transform(FontTransform::Rotate90))
            .x_desc(self.x_label.as_str())
            .y_desc(self.y_label.as_str())
            .draw()?;

        for (index, series) in self.series.iter().enumerate() {
            let fill = color(index);
            chart
                .draw_series(series.values.iter().enumerate().map(|(group, &value)| {
                    let (left, right) = self.bar_span(group, index);
                    Rectangle::new([(left, 0.0), (right, value)], fill.filled())
                }))?
                .label(series.label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 12, y + 6)], fill.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.9))
            .border_style(&BLACK)
            .draw()?;
        Ok(())
    }

    fn to_pgfplots(&self) -> String {
        let labels = self
            .categories
            .iter()
            .map(|c| format!("{{{}}}", escape_tex(c)))
            .collect::<Vec<_>>()
            .join(",");
        let ticks = (0..self.categories.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut tex = String::from("\\begin{tikzpicture}\n\\begin{axis}[\n");
        tex.push_str("  width=\\textwidth,\n  height=0.6\\textwidth,\n  ybar,\n");
        tex.push_str(&format!("  bar width={:.3},\n", GROUP_FILL / self.series.len().max(1) as f64));
        tex.push_str(&format!("  title={{{}}},\n", escape_tex(&self.title)));
        tex.push_str(&format!("  xlabel={{{}}},\n", escape_tex(&self.x_label)));
        tex.push_str(&format!("  ylabel={{{}}},\n", escape_tex(&self.y_label)));
        tex.push_str(&format!("  xtick={{{}}},\n", ticks));
        tex.push_str(&format!("  xticklabels={{{}}},\n", labels));
        tex.push_str("  x tick label style={rotate=90,anchor=east},\n");
        tex.push_str(&format!(
            "  ymin=0,\n  ymax={},\n  ytick distance={},\n",
            self.y_max(),
            tick_step(self.y_max())
        ));
        tex.push_str("  legend pos=north east,\n]\n");

        for (index, series) in self.series.iter().enumerate() {
            let pattern = PATTERNS
                .get(index)
                .copied()
                .flatten()
                .map(|p| format!(", postaction={{pattern={}}}", p))
                .unwrap_or_default();
            tex.push_str(&format!(
                "\\addplot[fill={}, draw=black{}] coordinates {{{}}};\n",
                color_name(index),
                pattern,
                tex_coordinates(
                    series
                        .values
                        .iter()
                        .enumerate()
                        .map(|(i, &v)| (i as f64, v))
                )
            ));
            tex.push_str(&legend_entry(&series.label));
        }

        tex.push_str("\\end{axis}\n\\end{tikzpicture}\n");
        tex
    }
}

/// Scatter plot with one marker colour per series
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series<(f64, f64)>>,
}

impl ScatterChart {
    fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.series.iter().flat_map(|s| s.values.iter().copied())
    }

    pub fn x_max(&self) -> f64 {
        axis_max(self.points().map(|(x, _)| x).fold(0.0, f64::max))
    }

    pub fn y_max(&self) -> f64 {
        axis_max(self.points().map(|(_, y)| y).fold(0.0, f64::max))
    }
}

impl Plot for ScatterChart {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult<DB> {
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 28))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(90)
            .build_cartesian_2d(0.0..self.x_max(), 0.0..self.y_max())?;

        chart
            .configure_mesh()
            .x_desc(self.x_label.as_str())
            .y_desc(self.y_label.as_str())
            .draw()?;

        for (index, series) in self.series.iter().enumerate() {
            let fill = color(index);
            chart
                .draw_series(
                    series
                        .values
                        .iter()
                        .map(|&point| Circle::new(point, 6, fill.filled())),
                )?
                .label(series.label.as_str())
                .legend(move |(x, y)| Circle::new((x + 6, y), 6, fill.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.9))
            .border_style(&BLACK)
            .draw()?;
        Ok(())
    }

    fn to_pgfplots(&self) -> String {
        let mut tex = String::from("\\begin{tikzpicture}\n\\begin{axis}[\n");
        tex.push_str("  width=\\textwidth,\n  height=\\textwidth,\n");
        tex.push_str(&format!("  title={{{}}},\n", escape_tex(&self.title)));
        tex.push_str(&format!("  xlabel={{{}}},\n", escape_tex(&self.x_label)));
        tex.push_str(&format!("  ylabel={{{}}},\n", escape_tex(&self.y_label)));
        tex.push_str(&format!(
            "  xmin=0,\n  xmax={},\n  ymin=0,\n  ymax={},\n",
            self.x_max(),
            self.y_max()
        ));
        tex.push_str("  legend pos=north east,\n]\n");

        for (index, series) in self.series.iter().enumerate() {
            tex.push_str(&format!(
                "\\addplot[only marks, mark=*, color={}] coordinates {{{}}};\n",
                color_name(index),
                tex_coordinates(series.values.iter().copied())
            ));
            tex.push_str(&legend_entry(&series.label));
        }

        tex.push_str("\\end{axis}\n\\end{tikzpicture}\n");
        tex
    }
}
