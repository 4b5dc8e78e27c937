//! Vector chart rendering for PDF reports
//!
//! Charts are drawn straight into the PDF layer as lines and polygons; no
//! raster round-trip. The chart form is chosen from the table's shape: a
//! handful of labeled rows reads as a bar chart, a long series as a line,
//! and two numeric columns as a scatter.

use crate::artifacts::ArtifactTable;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{Color, Line, Mm, PdfLayerReference, Point, Polygon, Rgb};

const AXIS_GRAY: (f64, f64, f64) = (0.25, 0.25, 0.25);
const SERIES_BLUE: (f64, f64, f64) = (0.18, 0.38, 0.65);

/// Rows at or below this render as bars
const BAR_ROW_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
}

/// Numeric series extracted from an artifact table
pub struct ChartData {
    pub title: String,
    pub kind: ChartKind,
    pub values: Vec<f64>,
    /// Second series, used by scatter charts as the y axis
    pub values_y: Vec<f64>,
}

impl ChartData {
    /// Choose a chart form from the table shape and pull its series.
    ///
    /// Returns `None` when the table has no usable numeric column.
    pub fn from_table(table: &ArtifactTable) -> Option<Self> {
        let dtypes = table.dtypes();
        let numeric_cols: Vec<usize> = dtypes
            .iter()
            .enumerate()
            .filter(|(_, dt)| **dt == "int" || **dt == "float")
            .map(|(i, _)| i)
            .collect();

        let first = *numeric_cols.first()?;
        let values = table.numeric_column(first);
        if values.is_empty() {
            return None;
        }

        let kind = if numeric_cols.len() >= 2 && table.rows.len() > BAR_ROW_LIMIT {
            ChartKind::Scatter
        } else if table.rows.len() > BAR_ROW_LIMIT {
            ChartKind::Line
        } else {
            ChartKind::Bar
        };

        let values_y = if kind == ChartKind::Scatter {
            table.numeric_column(numeric_cols[1])
        } else {
            Vec::new()
        };

        Some(Self {
            title: table.product_id.clone(),
            kind,
            values,
            values_y,
        })
    }

    /// Draw the chart into a layer; (x, y) is the lower-left corner in mm.
    pub fn draw(&self, layer: &PdfLayerReference, x: f64, y: f64, width: f64, height: f64) {
        draw_axes(layer, x, y, width, height);
        match self.kind {
            ChartKind::Bar => self.draw_bars(layer, x, y, width, height),
            ChartKind::Line => self.draw_line(layer, x, y, width, height),
            ChartKind::Scatter => self.draw_scatter(layer, x, y, width, height),
        }
    }

    fn draw_bars(&self, layer: &PdfLayerReference, x: f64, y: f64, width: f64, height: f64) {
        let max = max_of(&self.values);
        if max <= 0.0 {
            return;
        }

        let n = self.values.len() as f64;
        let slot = width / n;
        let bar_width = slot * 0.7;

        layer.set_fill_color(rgb(SERIES_BLUE));
        for (i, value) in self.values.iter().enumerate() {
            let bar_height = (value / max) * height;
            let left = x + i as f64 * slot + slot * 0.15;
            let ring = vec![
                (point(left, y), false),
                (point(left + bar_width, y), false),
                (point(left + bar_width, y + bar_height), false),
                (point(left, y + bar_height), false),
            ];
            layer.add_polygon(Polygon {
                rings: vec![ring],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
        }
    }

    fn draw_line(&self, layer: &PdfLayerReference, x: f64, y: f64, width: f64, height: f64) {
        let max = max_of(&self.values);
        if max <= 0.0 || self.values.len() < 2 {
            return;
        }

        let step = width / (self.values.len() - 1) as f64;
        let points: Vec<(Point, bool)> = self
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| (point(x + i as f64 * step, y + (value / max) * height), false))
            .collect();

        layer.set_outline_color(rgb(SERIES_BLUE));
        layer.set_outline_thickness(1.0);
        layer.add_line(Line {
            points,
            is_closed: false,
        });
    }

    fn draw_scatter(&self, layer: &PdfLayerReference, x: f64, y: f64, width: f64, height: f64) {
        let max_x = max_of(&self.values);
        let max_y = max_of(&self.values_y);
        if max_x <= 0.0 || max_y <= 0.0 {
            return;
        }

        layer.set_fill_color(rgb(SERIES_BLUE));
        let radius = 0.8;
        for (vx, vy) in self.values.iter().zip(self.values_y.iter()) {
            let cx = x + (vx / max_x) * width;
            let cy = y + (vy / max_y) * height;
            // Small diamond marker; cheap approximation of a dot
            let ring = vec![
                (point(cx - radius, cy), false),
                (point(cx, cy - radius), false),
                (point(cx + radius, cy), false),
                (point(cx, cy + radius), false),
            ];
            layer.add_polygon(Polygon {
                rings: vec![ring],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            });
        }
    }
}

fn draw_axes(layer: &PdfLayerReference, x: f64, y: f64, width: f64, height: f64) {
    layer.set_outline_color(rgb(AXIS_GRAY));
    layer.set_outline_thickness(0.5);
    layer.add_line(Line {
        points: vec![(point(x, y + height), false), (point(x, y), false), (point(x + width, y), false)],
        is_closed: false,
    });
}

fn point(x: f64, y: f64) -> Point {
    Point::new(Mm(x as f32), Mm(y as f32))
}

fn rgb((r, g, b): (f64, f64, f64)) -> Color {
    Color::Rgb(Rgb::new(r as f32, g as f32, b as f32, None))
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().cloned().fold(0.0, f64::max)
}
