//! # Radar Renderer
//!
//! Projects an ordered list of `(label, value)` axes onto a closed polygon in
//! polar coordinates and rasterizes it to a PNG.
//!
//! The radial scale is fixed to `[0, 10]` so charts are comparable across
//! renders. Axes are drawn in the order supplied; nothing is sorted.

mod canvas;
mod geometry;

pub use geometry::{
    Point, ProjectedAxis, RadarGeometry, SCALE_MAX, SCALE_MIN, axis_angle, clamp_value,
};

use crate::aggregate::AggregateVector;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use canvas::{Canvas, HAlign, VAlign, text_width};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

/// Smallest canvas the renderer will produce.
pub const MIN_IMAGE_SIZE: u32 = 64;

/// Largest canvas the renderer will produce.
pub const MAX_IMAGE_SIZE: u32 = 4096;

/// Radial positions of the unlabelled grid rings.
const GRID_RINGS: [f64; 5] = [2.0, 4.0, 6.0, 8.0, 10.0];

/// Only a failing PNG encoder can make rendering fail.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

// =============================================================================
// INPUT
// =============================================================================

/// One labelled spoke of the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarAxis {
    pub label: String,
    pub value: f64,
}

impl RadarAxis {
    #[must_use]
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }

    /// Pair labels with values positionally. Extra entries on either side are dropped.
    #[must_use]
    pub fn zip<S: AsRef<str>>(labels: &[S], values: &[f64]) -> Vec<Self> {
        labels
            .iter()
            .zip(values)
            .map(|(label, value)| Self::new(label.as_ref(), *value))
            .collect()
    }
}

// =============================================================================
// STYLE
// =============================================================================

/// Visual parameters. Colours are RGB.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarStyle {
    /// Width and height of the square image, in pixels.
    pub size: u32,
    pub background: [u8; 3],
    pub grid: [u8; 3],
    pub fill: [u8; 3],
    /// Opacity of the polygon fill.
    pub fill_alpha: f64,
    pub stroke: [u8; 3],
    pub stroke_width: f64,
    pub label: [u8; 3],
    /// Each font pixel becomes a `label_scale`×`label_scale` block.
    pub label_scale: u32,
    /// Labels are word-wrapped to this many characters per line.
    pub label_wrap: usize,
    /// Gap between the outer ring and the labels.
    pub label_padding: f64,
}

impl Default for RadarStyle {
    fn default() -> Self {
        Self {
            // 5in at 150dpi
            size: 750,
            background: [255, 255, 255],
            grid: [204, 204, 204],
            fill: [31, 119, 180],
            fill_alpha: 0.25,
            stroke: [31, 119, 180],
            stroke_width: 2.5,
            label: [51, 51, 51],
            label_scale: 2,
            label_wrap: 10,
            label_padding: 12.0,
        }
    }
}

impl RadarStyle {
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// An encoded chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl RadarImage {
    #[must_use]
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    #[must_use]
    pub fn into_png_bytes(self) -> Vec<u8> {
        self.png
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `data:image/png;base64,...` for direct embedding.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

// =============================================================================
// RENDERER
// =============================================================================

/// Radar chart renderer. Holds only its style, so it is cheap to share.
#[derive(Debug, Clone, Default)]
pub struct RadarRenderer {
    style: RadarStyle,
}

impl RadarRenderer {
    #[must_use]
    pub fn new(style: RadarStyle) -> Self {
        Self { style }
    }

    #[must_use]
    pub fn style(&self) -> &RadarStyle {
        &self.style
    }

    /// Render the axes. `Ok(None)` when there are no axes.
    pub fn render(&self, axes: &[RadarAxis]) -> Result<Option<RadarImage>, RenderError> {
        if axes.is_empty() {
            return Ok(None);
        }

        let style = &self.style;
        let size = self.canvas_size();
        let wrapped: Vec<Vec<&str>> = axes
            .iter()
            .map(|axis| wrap_label(&axis.label, style.label_wrap))
            .collect();
        let geometry = self.geometry_for(&wrapped, size);
        let values: Vec<f64> = axes.iter().map(|axis| axis.value).collect();

        let mut canvas = Canvas::new(size, size, style.background);
        let center = geometry.center();

        for ring in GRID_RINGS {
            canvas.stroke_circle(center, geometry.value_radius(ring), 1.0, style.grid, 1.0);
        }
        for i in 0..axes.len() {
            let end = geometry.point_at(axis_angle(i, axes.len()), geometry.outer_radius());
            canvas.stroke_segment(center, end, 1.0, style.grid, 1.0);
        }

        let polygon = geometry.closed_polygon(&values);
        canvas.fill_polygon(&polygon, style.fill, style.fill_alpha);
        canvas.stroke_polyline(&polygon, style.stroke_width, style.stroke, 1.0);

        for (i, lines) in wrapped.iter().enumerate() {
            let angle = axis_angle(i, axes.len());
            let anchor = geometry.point_at(angle, geometry.outer_radius() + style.label_padding);
            let (halign, valign) = label_alignment(angle);
            canvas.draw_text(lines, anchor, halign, valign, style.label_scale, style.label);
        }

        let image = canvas.into_image();
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        tracing::debug!(axes = axes.len(), size, bytes = png.len(), "rendered radar chart");

        Ok(Some(RadarImage {
            png,
            width: size,
            height: size,
        }))
    }

    /// Render one axis per dimension from an aggregate.
    pub fn render_aggregate(
        &self,
        aggregate: &AggregateVector,
    ) -> Result<Option<RadarImage>, RenderError> {
        self.render(&aggregate.to_axes())
    }

    /// Geometry the renderer would use for these axes.
    #[must_use]
    pub fn geometry(&self, axes: &[RadarAxis]) -> RadarGeometry {
        let wrapped: Vec<Vec<&str>> = axes
            .iter()
            .map(|axis| wrap_label(&axis.label, self.style.label_wrap))
            .collect();
        self.geometry_for(&wrapped, self.canvas_size())
    }

    /// Edge length actually rendered: the configured size bounded to
    /// `[MIN_IMAGE_SIZE, MAX_IMAGE_SIZE]`.
    #[must_use]
    pub fn canvas_size(&self) -> u32 {
        self.style.size.clamp(MIN_IMAGE_SIZE, MAX_IMAGE_SIZE)
    }

    /// Leave room around the plot for the widest label block.
    fn geometry_for(&self, wrapped: &[Vec<&str>], size: u32) -> RadarGeometry {
        let half = f64::from(size) / 2.0;
        let widest = wrapped
            .iter()
            .map(|lines| text_width(lines, self.style.label_scale))
            .max()
            .unwrap_or(0);
        let margin = f64::from(widest) + self.style.label_padding + 4.0;
        // never let labels squeeze the plot below a quarter of the canvas
        let outer = (half - margin).max(half / 4.0);
        RadarGeometry::new(Point::new(half, half), outer)
    }
}

/// Anchor labels away from the plot: labels on the right grow rightwards,
/// labels on top grow upwards, and so on.
fn label_alignment(angle: f64) -> (HAlign, VAlign) {
    const EDGE: f64 = 0.2;
    let (sin, cos) = angle.sin_cos();
    let halign = if cos > EDGE {
        HAlign::Left
    } else if cos < -EDGE {
        HAlign::Right
    } else {
        HAlign::Center
    };
    let valign = if sin > EDGE {
        VAlign::Bottom
    } else if sin < -EDGE {
        VAlign::Top
    } else {
        VAlign::Middle
    };
    (halign, valign)
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap_label(label: &str, width: usize) -> Vec<&str> {
    let label = label.trim();
    if label.is_empty() {
        return Vec::new();
    }
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;

    for (offset, word) in word_spans(label) {
        let word_end = offset + word.len();
        match start {
            None => start = Some(offset),
            Some(s) if label[s..word_end].chars().count() > width => {
                lines.push(&label[s..end]);
                start = Some(offset);
            }
            Some(_) => {}
        }
        end = word_end;
    }
    if let Some(s) = start {
        lines.push(&label[s..end]);
    }
    lines
}

/// Words with their byte offsets.
fn word_spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split(' ')
        .scan(0, |offset, word| {
            let start = *offset;
            *offset += word.len() + 1;
            Some((start, word))
        })
        .filter(|(_, word)| !word.is_empty())
}

// =============================================================================
// TESTS
// =============================================================================
