//! Static Chart Renderer
//! Draws report charts into an in-memory RGB buffer with plotters and
//! writes them as PNG.
//!
//! Every chart function writes exactly one file, `<out_dir>/<file_stem>.png`.
//! Matrices are drawn as given: rows are the x axis for line and bar charts
//! and the y axis for heatmaps.

use crate::charts::config::{ChartSpec, FigureSize, PlotConfig};
use crate::stats::{Histogram, LabeledMatrix};
use image::{ImageFormat, RgbImage};
use plotters::coord::ranged1d::SegmentedCoord;
use plotters::coord::types::{RangedCoordf64, RangedCoordi32};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const COLORBAR_WIDTH: u32 = 90;
const LEGEND_SWATCH: i32 = 15;
const MAX_X_LABELS: usize = 60;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{chart}: nothing to draw")]
    Empty { chart: String },
    #[error("{chart}: {reason}")]
    Shape { chart: String, reason: String },
    #[error("drawing failed: {0}")]
    Draw(String),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
/// Row segments on x, values on y.
type LineCoord = Cartesian2d<SegmentedCoord<RangedCoordi32>, RangedCoordf64>;

/// Label of a segment center; edges stay blank.
fn segment_label(value: &SegmentValue<i32>, labels: &[String]) -> String {
    match value {
        SegmentValue::CenterOf(i) => usize::try_from(*i)
            .ok()
            .and_then(|i| labels.get(i))
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Right edge of segment `i` out of `n`.
fn segment_end(i: usize, n: usize) -> SegmentValue<i32> {
    if i + 1 >= n {
        SegmentValue::Last
    } else {
        SegmentValue::Exact(i as i32 + 1)
    }
}

/// Last segment index of an axis with `n` segments; at least two segments
/// so the coordinate never collapses.
fn segment_max(n: usize) -> i32 {
    n.max(2) as i32 - 1
}

/// Finite min/max with padding; a flat range is widened.
fn value_range(values: impl Iterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return (0.0, 1.0);
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (if lo == 0.0 { lo } else { lo - pad }, hi + pad)
}

/// Consecutive finite points, so gaps break the line.
fn finite_runs(values: &[f64]) -> Vec<Vec<(SegmentValue<i32>, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if v.is_finite() {
            current.push((SegmentValue::CenterOf(i as i32), *v));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

pub struct ChartRenderer {
    config: PlotConfig,
    out_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(config: PlotConfig, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn font(&self, size: u32) -> FontDesc<'_> {
        (self.config.font_family.as_str(), size as f64).into_font()
    }

    /// Render into a fresh buffer and write the PNG.
    fn render(
        &self,
        spec: &ChartSpec,
        size: FigureSize,
        draw: impl FnOnce(&Area<'_>) -> Result<(), RenderError>,
    ) -> Result<PathBuf, RenderError> {
        let (w, h) = (size.width, size.height);
        let mut buffer = vec![0u8; w as usize * h as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (w, h)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;
            draw(&root)?;
            root.present().map_err(draw_err)?;
        }

        let image = RgbImage::from_raw(w, h, buffer)
            .ok_or_else(|| RenderError::Draw("buffer size mismatch".to_string()))?;
        let path = self.out_dir.join(format!("{}.png", spec.file_stem));
        image.save_with_format(&path, ImageFormat::Png)?;
        debug!(path = %path.display(), "chart written");
        Ok(path)
    }

    fn check_not_empty(spec: &ChartSpec, matrix: &LabeledMatrix) -> Result<(), RenderError> {
        if matrix.is_empty() {
            return Err(RenderError::Empty {
                chart: spec.file_stem.clone(),
            });
        }
        Ok(())
    }

    /// Annotated heatmap with a color bar.
    pub fn heatmap(&self, matrix: &LabeledMatrix, spec: &ChartSpec) -> Result<PathBuf, RenderError> {
        Self::check_not_empty(spec, matrix)?;
        self.render(spec, self.config.heatmap_size, |root| {
            self.draw_heatmap(root, matrix, spec, &spec.title)
        })
    }

    /// Heatmap over a line panel sharing its columns.
    pub fn heatmap_and_line(
        &self,
        matrix: &LabeledMatrix,
        line: &[f64],
        spec: &ChartSpec,
    ) -> Result<PathBuf, RenderError> {
        Self::check_not_empty(spec, matrix)?;
        if line.len() != matrix.ncols() {
            return Err(RenderError::Shape {
                chart: spec.file_stem.clone(),
                reason: format!("{} line points for {} columns", line.len(), matrix.ncols()),
            });
        }
        let size = self.config.heatmap_line_size;
        self.render(spec, size, |root| {
            let (upper, lower) = root.split_vertically(size.height * 3 / 4);
            self.draw_heatmap(&upper, matrix, spec, &spec.title)?;

            // Same width as the heatmap cells, the color bar column stays empty.
            let (lower, _) = lower.split_horizontally(size.width.saturating_sub(COLORBAR_WIDTH));
            let panel = LabeledMatrix::from_series(matrix.col_labels.clone(), "total", line.to_vec());
            let title = spec.subtitle.as_deref().unwrap_or("");
            self.draw_lines(&lower, &panel, spec, title, false)
        })
    }

    /// One line per matrix column over the row labels.
    pub fn line(&self, matrix: &LabeledMatrix, spec: &ChartSpec) -> Result<PathBuf, RenderError> {
        Self::check_not_empty(spec, matrix)?;
        self.render(spec, self.config.line_size, |root| {
            self.draw_lines(root, matrix, spec, &spec.title, true)
        })
    }

    /// Two line charts side by side.
    pub fn line_pair(
        &self,
        left: &LabeledMatrix,
        right: &LabeledMatrix,
        spec: &ChartSpec,
    ) -> Result<PathBuf, RenderError> {
        Self::check_not_empty(spec, left)?;
        Self::check_not_empty(spec, right)?;
        let size = self.config.line_size;
        self.render(spec, size, |root| {
            let (l, r) = root.split_horizontally(size.width / 2);
            self.draw_lines(&l, left, spec, &spec.title, true)?;
            self.draw_lines(&r, right, spec, spec.subtitle.as_deref().unwrap_or(""), true)
        })
    }

    /// Lines with the area between `lower` and `upper` shaded.
    pub fn line_band(
        &self,
        matrix: &LabeledMatrix,
        lower: &[f64],
        upper: &[f64],
        spec: &ChartSpec,
    ) -> Result<PathBuf, RenderError> {
        Self::check_not_empty(spec, matrix)?;
        if lower.len() != matrix.nrows() || upper.len() != matrix.nrows() {
            return Err(RenderError::Shape {
                chart: spec.file_stem.clone(),
                reason: format!("band bounds do not cover {} rows", matrix.nrows()),
            });
        }
        self.render(spec, self.config.line_size, |root| {
            let colors = self.config.cycle(spec.cycle);
            let (lo, hi) = value_range(
                matrix
                    .values
                    .iter()
                    .flatten()
                    .chain(lower)
                    .chain(upper)
                    .copied(),
                false,
            );
            let mut chart = self.line_chart(root, matrix, spec, &spec.title, (lo, hi))?;

            let fill = colors[0].mix(self.config.fill_alpha);
            let band: Vec<(usize, f64, f64)> = lower
                .iter()
                .zip(upper)
                .enumerate()
                .filter(|(_, (a, b))| a.is_finite() && b.is_finite())
                .map(|(i, (a, b))| (i, *a, *b))
                .collect();
            if band.len() > 1 {
                let mut outline: Vec<(SegmentValue<i32>, f64)> = band
                    .iter()
                    .map(|(i, _, hi)| (SegmentValue::CenterOf(*i as i32), *hi))
                    .collect();
                outline.extend(
                    band.iter()
                        .rev()
                        .map(|(i, lo, _)| (SegmentValue::CenterOf(*i as i32), *lo)),
                );
                chart
                    .draw_series(std::iter::once(Polygon::new(outline, fill.filled())))
                    .map_err(draw_err)?;
            }

            self.draw_line_series(&mut chart, matrix, &colors)?;
            self.draw_legend(&mut chart)
        })
    }

    /// Grouped or stacked bars, one bar group per matrix row.
    pub fn bar(&self, matrix: &LabeledMatrix, spec: &ChartSpec) -> Result<PathBuf, RenderError> {
        Self::check_not_empty(spec, matrix)?;
        let matrix = if spec.percentage {
            matrix.map(|v| v * 100.0)
        } else {
            matrix.clone()
        };
        self.render(spec, self.config.bar_size, |root| {
            self.draw_bars(root, &matrix, spec)
        })
    }

    /// Bars of a per-value histogram.
    pub fn histogram(&self, histogram: &Histogram, spec: &ChartSpec) -> Result<PathBuf, RenderError> {
        if histogram.bins.is_empty() {
            return Err(RenderError::Empty {
                chart: spec.file_stem.clone(),
            });
        }
        let matrix = histogram.to_matrix("count");
        self.render(spec, self.config.histogram_size, |root| {
            self.draw_bars(root, &matrix, spec)
        })
    }

    fn draw_heatmap(
        &self,
        area: &Area<'_>,
        matrix: &LabeledMatrix,
        spec: &ChartSpec,
        title: &str,
    ) -> Result<(), RenderError> {
        let (width, _) = area.dim_in_pixel();
        let (cells_area, bar_area) = area.split_horizontally(width.saturating_sub(COLORBAR_WIDTH));
        let palette = self.config.palette();
        let (lo, hi) = matrix.finite_range().unwrap_or((0.0, 1.0));
        let (nrows, ncols) = (matrix.nrows(), matrix.ncols());

        let mut chart = ChartBuilder::on(&cells_area)
            .caption(title, self.font(self.config.title_size))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(110)
            .build_cartesian_2d(
                (0..segment_max(ncols)).into_segmented(),
                (0..segment_max(nrows)).into_segmented(),
            )
            .map_err(draw_err)?;

        // Row 0 is drawn at the top.
        let row_labels: Vec<String> = matrix.row_labels.iter().rev().cloned().collect();
        let padded_rows = if nrows == 1 {
            vec![String::new(), row_labels[0].clone()]
        } else {
            row_labels
        };
        let flip = |i: usize| segment_max(nrows) as usize - i;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_labels(ncols.min(MAX_X_LABELS))
            .y_labels(nrows.max(2))
            .x_label_formatter(&|v| segment_label(v, &matrix.col_labels))
            .y_label_formatter(&|v| segment_label(v, &padded_rows))
            .label_style(self.font(self.config.tick_size))
            .x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .axis_desc_style(self.font(self.config.label_size))
            .draw()
            .map_err(draw_err)?;

        let palette = &palette;
        let (rows, cols) = (segment_max(nrows) as usize + 1, segment_max(ncols) as usize + 1);
        chart
            .draw_series(matrix.values.iter().enumerate().flat_map(|(i, row)| {
                let y = flip(i);
                row.iter().enumerate().filter(|(_, v)| v.is_finite()).map(move |(j, v)| {
                    let color = palette.color_at(*v, lo, hi, spec.center);
                    Rectangle::new(
                        [
                            (SegmentValue::Exact(j as i32), SegmentValue::Exact(y as i32)),
                            (segment_end(j, cols), segment_end(y, rows)),
                        ],
                        color.filled(),
                    )
                })
            }))
            .map_err(draw_err)?;

        if spec.annotate {
            let style = TextStyle::from(
                self.font(self.config.label_size)
                    .transform(FontTransform::Rotate90),
            )
            .pos(Pos::new(HPos::Center, VPos::Center));
            chart
                .draw_series(matrix.values.iter().enumerate().flat_map(|(i, row)| {
                    let y = flip(i) as i32;
                    let style = style.clone();
                    row.iter().enumerate().filter(|(_, v)| v.is_finite()).map(move |(j, v)| {
                        Text::new(
                            spec.format.format(*v),
                            (SegmentValue::CenterOf(j as i32), SegmentValue::CenterOf(y)),
                            style.clone(),
                        )
                    })
                }))
                .map_err(draw_err)?;
        }

        self.draw_colorbar(&bar_area, lo, hi, spec)
    }

    fn draw_colorbar(
        &self,
        area: &Area<'_>,
        lo: f64,
        hi: f64,
        spec: &ChartSpec,
    ) -> Result<(), RenderError> {
        let (lo, hi) = if lo < hi { (lo, hi) } else { (lo - 1.0, lo + 1.0) };
        let palette = self.config.palette();
        let mut chart = ChartBuilder::on(area)
            .margin_top(40)
            .margin_bottom(40)
            .margin_right(10)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..1.0, lo..hi)
            .map_err(draw_err)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(6)
            .y_label_formatter(&|v| spec.format.format(*v))
            .label_style(self.font(self.config.tick_size))
            .draw()
            .map_err(draw_err)?;

        let steps = 100;
        let step = (hi - lo) / steps as f64;
        chart
            .draw_series((0..steps).map(|k| {
                let y0 = lo + k as f64 * step;
                let color = palette.color_at(y0 + step / 2.0, lo, hi, spec.center);
                Rectangle::new([(0.0, y0), (1.0, y0 + step)], color.filled())
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn line_chart<'a, 'b: 'a>(
        &self,
        area: &'a Area<'b>,
        matrix: &LabeledMatrix,
        spec: &ChartSpec,
        title: &str,
        (lo, hi): (f64, f64),
    ) -> Result<ChartContext<'a, BitMapBackend<'b>, LineCoord>, RenderError> {
        let mut chart = ChartBuilder::on(area)
            .caption(title, self.font(self.config.title_size))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(60)
            .build_cartesian_2d((0..segment_max(matrix.nrows())).into_segmented(), lo..hi)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(matrix.nrows().min(MAX_X_LABELS))
            .x_label_formatter(&|v| segment_label(v, &matrix.row_labels))
            .label_style(self.font(self.config.tick_size))
            .x_desc(spec.x_label.as_str())
            .y_desc(spec.y_label.as_str())
            .axis_desc_style(self.font(self.config.label_size))
            .draw()
            .map_err(draw_err)?;
        Ok(chart)
    }

    fn draw_line_series<'a, 'b: 'a>(
        &self,
        chart: &mut ChartContext<'a, BitMapBackend<'b>, LineCoord>,
        matrix: &LabeledMatrix,
        colors: &[RGBColor],
    ) -> Result<(), RenderError> {
        for (j, name) in matrix.col_labels.iter().enumerate() {
            let color = colors[j % colors.len()];
            let mut labeled = false;
            for run in finite_runs(&matrix.column(j)) {
                let anno = chart
                    .draw_series(LineSeries::new(run, color.stroke_width(2)))
                    .map_err(draw_err)?;
                if !labeled {
                    anno.label(name.as_str()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + LEGEND_SWATCH, y)], color.stroke_width(2))
                    });
                    labeled = true;
                }
            }
        }
        Ok(())
    }

    fn draw_legend<'a, 'b: 'a>(
        &self,
        chart: &mut ChartContext<'a, BitMapBackend<'b>, LineCoord>,
    ) -> Result<(), RenderError> {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(self.font(self.config.legend_size))
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_err)
    }

    fn draw_lines(
        &self,
        area: &Area<'_>,
        matrix: &LabeledMatrix,
        spec: &ChartSpec,
        title: &str,
        legend: bool,
    ) -> Result<(), RenderError> {
        let colors = self.config.cycle(spec.cycle);
        let range = value_range(matrix.values.iter().flatten().copied(), false);
        let mut chart = self.line_chart(area, matrix, spec, title, range)?;
        self.draw_line_series(&mut chart, matrix, &colors)?;
        if legend {
            self.draw_legend(&mut chart)?;
        }
        Ok(())
    }

    fn draw_bars(
        &self,
        area: &Area<'_>,
        matrix: &LabeledMatrix,
        spec: &ChartSpec,
    ) -> Result<(), RenderError> {
        let colors = self.config.cycle(spec.cycle);
        let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
        let range = if spec.stacked {
            value_range(matrix.row_sums().into_iter(), true)
        } else {
            value_range(matrix.values.iter().flatten().copied(), true)
        };

        let mut chart = self.line_chart(area, matrix, spec, &spec.title, range)?;

        let (plot_width, _) = chart.plotting_area().dim_in_pixel();
        let slot = plot_width as f64 / (segment_max(nrows) + 1) as f64;
        let gap = (slot * 0.1).round() as u32;
        let bar = ((slot - 2.0 * gap as f64) / ncols as f64).max(1.0);

        for (j, name) in matrix.col_labels.iter().enumerate() {
            let color = colors[j % colors.len()];
            let bars = (0..nrows).filter_map(|i| {
                let v = matrix.values[i][j];
                if !v.is_finite() {
                    return None;
                }
                let (base, top) = if spec.stacked {
                    let below: f64 = matrix.values[i][..j].iter().filter(|v| v.is_finite()).sum();
                    (below, below + v)
                } else {
                    (0.0, v)
                };
                let mut rect = Rectangle::new(
                    [
                        (SegmentValue::Exact(i as i32), base),
                        (segment_end(i, segment_max(nrows) as usize + 1), top),
                    ],
                    color.filled(),
                );
                if spec.stacked || ncols == 1 {
                    rect.set_margin(0, 0, gap, gap);
                } else {
                    let left = gap + (bar * j as f64).round() as u32;
                    let right = gap + (bar * (ncols - 1 - j) as f64).round() as u32;
                    rect.set_margin(0, 0, left, right);
                }
                Some(rect)
            });
            let anno = chart.draw_series(bars).map_err(draw_err)?;
            if ncols > 1 {
                anno.label(name.as_str()).legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + LEGEND_SWATCH, y + 5)], color.filled())
                });
            }
        }

        if ncols > 1 {
            self.draw_legend(&mut chart)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_include_zero_for_bars() {
        assert_eq!(value_range([2.0, 4.0].into_iter(), true).0, 0.0);
        assert_eq!(value_range([f64::NAN].into_iter(), false), (0.0, 1.0));
        assert_eq!(value_range([3.0, 3.0].into_iter(), false), (2.0, 4.0));
    }

    #[test]
    fn gaps_split_line_runs() {
        let runs = finite_runs(&[1.0, f64::NAN, 2.0, 3.0]);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].len(), 2);
    }

    fn weeks(n: usize) -> Vec<String> {
        (10..10 + n).map(|w| w.to_string()).collect()
    }

    #[test]
    fn band_chart_writes_one_png() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(PlotConfig::default(), dir.path());
        let estimate = LabeledMatrix::from_series(weeks(3), "est_new_cases", vec![1.0, 2.0, 3.0]);

        let path = renderer
            .line_band(
                &estimate,
                &[0.5, f64::NAN, 2.5],
                &[1.5, f64::NAN, 3.5],
                &ChartSpec::new("nowcast", "nowcast_cases"),
            )
            .unwrap();

        assert_eq!(path, dir.path().join("nowcast_cases.png"));
        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (1500, 500));
    }

    #[test]
    fn band_must_cover_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(PlotConfig::default(), dir.path());
        let estimate = LabeledMatrix::from_series(weeks(3), "est", vec![1.0, 2.0, 3.0]);
        let err = renderer
            .line_band(&estimate, &[1.0], &[2.0], &ChartSpec::new("nowcast", "nowcast"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Shape { .. }));
        assert!(!dir.path().join("nowcast.png").exists());
    }

    #[test]
    fn line_pair_with_legend_renders() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChartRenderer::new(PlotConfig::default(), dir.path());
        let left = LabeledMatrix::new(
            weeks(2),
            vec!["age_0".into(), "age_90".into()],
            vec![vec![0.0, 3.0], vec![1.0, 6.0]],
        );
        let right = LabeledMatrix::from_series(weeks(2), "tests_tailback", vec![100.0, 500.0]);
        let spec = ChartSpec::new("deaths", "deaths").subtitle("by sex").cycle(1);

        let path = renderer.line_pair(&left, &right, &spec).unwrap();
        assert!(path.exists());

        let empty = LabeledMatrix::new(weeks(2), Vec::new(), vec![Vec::new(), Vec::new()]);
        let err = renderer.line_pair(&left, &empty, &spec).unwrap_err();
        assert!(matches!(err, RenderError::Empty { .. }));
    }

    #[test]
    fn segment_labels_only_at_centers() {
        let labels = vec!["10".to_string(), "11".to_string()];
        assert_eq!(segment_label(&SegmentValue::CenterOf(1), &labels), "11");
        assert_eq!(segment_label(&SegmentValue::Exact(1), &labels), "");
        assert_eq!(segment_label(&SegmentValue::CenterOf(5), &labels), "");
    }
}
