//! Confusion-matrix chart rendering.

use std::fmt::Display;
use std::path::Path;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::error::{Error, Result};
use crate::evaluation::ConfusionMatrix;

/// Draws a confusion matrix into an image file.
pub trait MatrixRenderer: Send + Sync {
    fn render(&self, matrix: &ConfusionMatrix, class_names: &[String], dest: &Path) -> Result<()>;
}

const CELL: u32 = 110;
const LEFT_AREA: u32 = 170;
const BOTTOM_AREA: u32 = 70;
const MARGIN: u32 = 16;
const CAPTION_HEIGHT: u32 = 50;

/// Blue-scale heatmap PNG titled "Confusion Matrix". True classes run down
/// the vertical axis with row 0 on top, predicted classes along the bottom.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeatmapRenderer;

impl MatrixRenderer for HeatmapRenderer {
    fn render(&self, matrix: &ConfusionMatrix, class_names: &[String], dest: &Path) -> Result<()> {
        if class_names.len() != matrix.size() {
            return Err(Error::Render(format!(
                "{} class names for a {}x{} matrix",
                class_names.len(),
                matrix.size(),
                matrix.size()
            )));
        }

        let n = matrix.size() as i32;
        let width = LEFT_AREA + 2 * MARGIN + matrix.size() as u32 * CELL;
        let height = BOTTOM_AREA + CAPTION_HEIGHT + 2 * MARGIN + matrix.size() as u32 * CELL;
        let max = matrix.rows().flat_map(|row| row.iter().copied()).max().unwrap_or(0);

        let root = BitMapBackend::new(dest, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Confusion Matrix", ("sans-serif", 24).into_font())
            .margin(MARGIN)
            .x_label_area_size(BOTTOM_AREA)
            .y_label_area_size(LEFT_AREA)
            .build_cartesian_2d((0..n - 1).into_segmented(), (0..n - 1).into_segmented())
            .map_err(chart_err)?;

        // Plot y grows upwards, so row i sits at y = n - 1 - i.
        let predicted_label = |v: &SegmentValue<i32>| tick_label(class_names, v, |k| k);
        let true_label = |v: &SegmentValue<i32>| tick_label(class_names, v, |k| n - 1 - k);
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(class_names.len())
            .y_labels(class_names.len())
            .x_label_formatter(&predicted_label)
            .y_label_formatter(&true_label)
            .label_style(("sans-serif", 15))
            .axis_desc_style(("sans-serif", 18))
            .x_desc("Predicted")
            .y_desc("True")
            .draw()
            .map_err(chart_err)?;

        let cells: Vec<(i32, i32, u64)> = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .map(|(i, j)| (i, j, matrix.get(i as usize, j as usize)))
            .collect();

        chart
            .draw_series(cells.iter().map(|&(i, j, count)| {
                let y = n - 1 - i;
                Rectangle::new(
                    [(SegmentValue::Exact(j), SegmentValue::Exact(y)), (edge(j + 1, n), edge(y + 1, n))],
                    blues(intensity(count, max)).filled(),
                )
            }))
            .map_err(chart_err)?;

        chart
            .draw_series(cells.iter().map(|&(i, j, count)| {
                let ink = if intensity(count, max) > 0.5 { &WHITE } else { &BLACK };
                let style = ("sans-serif", 20)
                    .into_font()
                    .color(ink)
                    .pos(Pos::new(HPos::Center, VPos::Center));
                Text::new(count.to_string(), (SegmentValue::CenterOf(j), SegmentValue::CenterOf(n - 1 - i)), style)
            }))
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
        Ok(())
    }
}

fn chart_err(e: impl Display) -> Error {
    Error::Render(e.to_string())
}

/// Right or top edge of segment `k - 1`; the last one closes the axis.
fn edge(k: i32, n: i32) -> SegmentValue<i32> {
    if k >= n {
        SegmentValue::Last
    } else {
        SegmentValue::Exact(k)
    }
}

fn tick_label(class_names: &[String], value: &SegmentValue<i32>, index: impl Fn(i32) -> i32) -> String {
    match value {
        SegmentValue::CenterOf(k) => usize::try_from(index(*k))
            .ok()
            .and_then(|k| class_names.get(k))
            .cloned()
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn intensity(count: u64, max: u64) -> f64 {
    if max > 0 {
        count as f64 / max as f64
    } else {
        0.0
    }
}

/// Linear ramp between the light and dark ends of a blue colormap.
fn blues(t: f64) -> RGBColor {
    let light = [247.0, 251.0, 255.0];
    let dark = [8.0, 48.0, 107.0];
    let t = t.clamp(0.0, 1.0);
    let mix = |c: usize| (light[c] + (dark[c] - light[c]) * t).round() as u8;
    RGBColor(mix(0), mix(1), mix(2))
}
