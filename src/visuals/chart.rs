use log::{debug, info, warn};
use plotters::coord::ranged1d::Ranged;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::parse::{Case, MeasurementRow, Operation};
use crate::reference::ReferenceCurves;

const X_DESC: &str = "Dataset Size (n)";
const Y_DESC: &str = "Number of Comparisons";
const REFERENCE_LABEL: &str = "O(log n)";

type DrawResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot write chart: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot render chart: {0}")]
    InvalidInput(String),
    #[error("drawing failed: {0}")]
    Draw(String),
}

/// How dataset sizes are laid out along the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMode {
    /// Evenly spaced positions, ticks labelled with `n`.
    Indexed,
    /// Logarithmic axis over the actual `n` values.
    Log,
}

impl FromStr for AxisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "indexed" => Ok(AxisMode::Indexed),
            "log" => Ok(AxisMode::Log),
            otherwise => Err(format!("{} is not a valid axis mode.", otherwise)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    pub axis: AxisMode,
    pub markers: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            width_in: 15.0,
            height_in: 6.0,
            dpi: 300,
            axis: AxisMode::Indexed,
            markers: true,
        }
    }
}

impl ChartConfig {
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.width_in * dpi).round() as u32,
            (self.height_in * dpi).round() as u32,
        )
    }

    // Typographic points to pixels at the configured resolution.
    fn pt(&self, points: f64) -> f64 {
        (points * self.dpi as f64 / 72.0).max(1.0)
    }

    fn px(&self, points: f64) -> u32 {
        self.pt(points).round() as u32
    }
}

fn case_color(case: Case) -> RGBColor {
    match case {
        Case::Best => GREEN,
        Case::Average => BLUE,
        Case::Worst => RED,
    }
}

/// Draws the insert and search panels side by side and writes the image to `output`.
pub fn render<P: AsRef<Path>>(
    rows: &[MeasurementRow],
    curves: &ReferenceCurves,
    output: P,
    config: &ChartConfig,
) -> Result<(), RenderError> {
    let _span = flame::start_guard("render");
    let output = output.as_ref();

    if rows.is_empty() {
        return Err(RenderError::InvalidInput("no rows to plot".to_string()));
    }
    if curves.insert.len() != rows.len() || curves.search.len() != rows.len() {
        return Err(RenderError::InvalidInput(format!(
            "reference curves have {}/{} points for {} rows",
            curves.insert.len(),
            curves.search.len(),
            rows.len()
        )));
    }
    if config.axis == AxisMode::Log && rows.iter().any(|row| row.n <= 0) {
        return Err(RenderError::InvalidInput(
            "a logarithmic axis needs positive dataset sizes".to_string(),
        ));
    }

    // Surface an unwritable destination as an I/O error before the backend touches it.
    File::create(output)?;

    debug!("canvas {:?} px at {} dpi", config.pixel_size(), config.dpi);
    if let Err(err) = draw(rows, curves, output, config) {
        // A failed draw must not leave a stub image behind.
        if let Err(cleanup) = fs::remove_file(output) {
            warn!("cannot remove {}: {}", output.display(), cleanup);
        }
        return Err(RenderError::Draw(err.to_string()));
    }

    info!("chart written to {}", output.display());
    Ok(())
}

fn draw(
    rows: &[MeasurementRow],
    curves: &ReferenceCurves,
    output: &Path,
    config: &ChartConfig,
) -> DrawResult {
    let root = BitMapBackend::new(output, config.pixel_size()).into_drawing_area();
    root.fill(&WHITE)?;

    let panels = root.split_evenly((1, 2));
    for (panel, op) in panels.iter().zip([Operation::Insert, Operation::Search]) {
        let reference = curves.for_operation(op);
        match config.axis {
            AxisMode::Indexed => draw_indexed_panel(panel, rows, op, reference, config)?,
            AxisMode::Log => draw_log_panel(panel, rows, op, reference, config)?,
        }
    }

    root.present()?;
    Ok(())
}

fn y_max(rows: &[MeasurementRow], op: Operation, reference: &[f64]) -> f64 {
    let max = rows
        .iter()
        .flat_map(|row| Case::ALL.map(|case| row.comps(op, case)))
        .chain(reference.iter().copied())
        .fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

fn index_label(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

fn draw_indexed_panel(
    panel: &DrawingArea<BitMapBackend<'_>, Shift>,
    rows: &[MeasurementRow],
    op: Operation,
    reference: &[f64],
    config: &ChartConfig,
) -> DrawResult {
    let labels: Vec<String> = rows.iter().map(|row| row.n.to_string()).collect();
    let last = (rows.len() - 1) as f64;

    let mut chart = ChartBuilder::on(panel)
        .caption(op.title(), ("sans-serif", config.pt(12.0)))
        .margin(config.px(8.0))
        .x_label_area_size(config.px(32.0))
        .y_label_area_size(config.px(40.0))
        .build_cartesian_2d(-0.5f64..last + 0.5, 0f64..y_max(rows, op, reference))?;

    chart
        .configure_mesh()
        .x_labels(rows.len())
        .x_label_formatter(&|x| index_label(&labels, *x))
        .label_style(("sans-serif", config.pt(9.0)))
        .axis_desc_style(("sans-serif", config.pt(10.0)))
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .draw()?;

    let xs: Vec<f64> = (0..rows.len()).map(|i| i as f64).collect();
    draw_series(&mut chart, &xs, rows, op, reference, config)
}

fn draw_log_panel(
    panel: &DrawingArea<BitMapBackend<'_>, Shift>,
    rows: &[MeasurementRow],
    op: Operation,
    reference: &[f64],
    config: &ChartConfig,
) -> DrawResult {
    let xs: Vec<f64> = rows.iter().map(|row| row.n as f64).collect();
    let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut chart = ChartBuilder::on(panel)
        .caption(op.title(), ("sans-serif", config.pt(12.0)))
        .margin(config.px(8.0))
        .x_label_area_size(config.px(32.0))
        .y_label_area_size(config.px(40.0))
        .build_cartesian_2d(
            (lo / 1.25..hi * 1.25).log_scale(),
            0f64..y_max(rows, op, reference),
        )?;

    chart
        .configure_mesh()
        .x_label_formatter(&|x| format!("{:.0}", x))
        .label_style(("sans-serif", config.pt(9.0)))
        .axis_desc_style(("sans-serif", config.pt(10.0)))
        .x_desc(X_DESC)
        .y_desc(Y_DESC)
        .draw()?;

    draw_series(&mut chart, &xs, rows, op, reference, config)
}

fn draw_series<'a, X>(
    chart: &mut ChartContext<'a, BitMapBackend<'a>, Cartesian2d<X, RangedCoordf64>>,
    xs: &[f64],
    rows: &[MeasurementRow],
    op: Operation,
    reference: &[f64],
    config: &ChartConfig,
) -> DrawResult
where
    X: Ranged<ValueType = f64>,
{
    let stroke = config.px(1.5);
    let marker = config.px(3.0) as i32;
    let legend_len = config.px(20.0) as i32;

    for case in Case::ALL {
        let color = case_color(case);
        let style = color.stroke_width(stroke);
        let points: Vec<(f64, f64)> = xs
            .iter()
            .zip(rows)
            .map(|(&x, row)| (x, row.comps(op, case)))
            .collect();

        chart
            .draw_series(LineSeries::new(points.iter().copied(), style))?
            .label(case.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_len, y)], style));

        if config.markers {
            let fill = color.filled();
            match case {
                Case::Best => {
                    chart.draw_series(points.iter().map(|&p| Circle::new(p, marker, fill)))?;
                }
                Case::Average => {
                    chart.draw_series(points.iter().map(|&p| {
                        EmptyElement::at(p)
                            + Rectangle::new([(-marker, -marker), (marker, marker)], fill)
                    }))?;
                }
                Case::Worst => {
                    chart.draw_series(
                        points.iter().map(|&p| TriangleMarker::new(p, marker, fill)),
                    )?;
                }
            }
        }
    }

    let dashed = BLACK.stroke_width(stroke);
    chart
        .draw_series(DashedLineSeries::new(
            xs.iter().copied().zip(reference.iter().copied()),
            config.px(6.0),
            config.px(3.0),
            dashed,
        ))?
        .label(REFERENCE_LABEL)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_len, y)], dashed));

    chart
        .configure_series_labels()
        .label_font(("sans-serif", config.pt(9.0)))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    Ok(())
}

#[cfg(test)]
fn sample_rows() -> Vec<MeasurementRow> {
    [(5, 2.2), (50, 5.48), (500, 8.87), (5000, 12.1), (50000, 15.4)]
        .iter()
        .map(|&(n, avg)| MeasurementRow {
            n,
            insert_min_comps: 1.0,
            insert_avg_comps: avg,
            insert_max_comps: avg * 1.4,
            search_min_comps: 1.0,
            search_avg_comps: avg + 0.5,
            search_max_comps: avg * 1.5,
        })
        .collect()
}

#[test]
fn pixel_size_follows_dpi() {
    let config = ChartConfig::default();
    assert_eq!(config.pixel_size(), (4500, 1800));
    let config = ChartConfig {
        dpi: 100,
        ..ChartConfig::default()
    };
    assert_eq!(config.pixel_size(), (1500, 600));
}

#[test]
fn axis_mode_from_str() {
    assert_eq!("indexed".parse::<AxisMode>(), Ok(AxisMode::Indexed));
    assert_eq!("LOG".parse::<AxisMode>(), Ok(AxisMode::Log));
    assert!("linear".parse::<AxisMode>().is_err());
}

#[test]
fn index_labels_only_on_whole_positions() {
    let labels = vec!["5".to_string(), "50".to_string()];
    assert_eq!(index_label(&labels, 0.0), "5");
    assert_eq!(index_label(&labels, 1.0), "50");
    assert_eq!(index_label(&labels, 0.5), "");
    assert_eq!(index_label(&labels, -1.0), "");
    assert_eq!(index_label(&labels, 2.0), "");
}

#[test]
fn renders_indexed_chart() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("avl_performance.png");
    let rows = sample_rows();
    let curves = ReferenceCurves::compute(&rows).unwrap();
    let config = ChartConfig {
        dpi: 50,
        ..ChartConfig::default()
    };
    render(&rows, &curves, &output, &config).unwrap();
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
}

#[test]
fn renders_log_chart_without_markers() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("avl_performance_log.png");
    let rows = sample_rows();
    let curves = ReferenceCurves::compute(&rows).unwrap();
    let config = ChartConfig {
        dpi: 50,
        axis: AxisMode::Log,
        markers: false,
        ..ChartConfig::default()
    };
    render(&rows, &curves, &output, &config).unwrap();
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
}

#[test]
fn unwritable_destination_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("missing").join("chart.png");
    let rows = sample_rows();
    let curves = ReferenceCurves::compute(&rows).unwrap();
    let result = render(&rows, &curves, &output, &ChartConfig::default());
    assert!(matches!(result, Err(RenderError::Io(_))));
}

#[test]
fn mismatched_curves_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let rows = sample_rows();
    let curves = ReferenceCurves {
        insert: vec![1.0],
        search: vec![1.0],
    };
    let result = render(
        &rows,
        &curves,
        dir.path().join("chart.png"),
        &ChartConfig::default(),
    );
    assert!(matches!(result, Err(RenderError::InvalidInput(_))));
}

#[test]
fn failed_draw_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chart.png");
    let rows = sample_rows();
    let curves = ReferenceCurves::compute(&rows).unwrap();
    let config = ChartConfig {
        width_in: 0.0,
        dpi: 50,
        ..ChartConfig::default()
    };
    let result = render(&rows, &curves, &output, &config);
    assert!(matches!(result, Err(RenderError::Draw(_))));
    assert!(!output.exists());
}
