//! RGBA raster with the handful of primitives the radar chart needs:
//! alpha-blended polygon fill, anti-aliased strokes and bitmap text.

use super::geometry::Point;
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};

/// Glyph cell size of the bitmap font, in unscaled pixels.
pub const GLYPH_SIZE: u32 = 8;

/// Horizontal anchoring of a text line relative to its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Vertical anchoring of a text block relative to its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Opaque canvas filled with `background`.
    #[must_use]
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        let [r, g, b] = background;
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Source-over blend of `color` at `alpha` onto one pixel. Off-canvas is a no-op.
    pub fn blend(&mut self, x: i64, y: i64, color: [u8; 3], alpha: f64) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha == 0.0 {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        for (channel, src) in pixel.0.iter_mut().take(3).zip(color) {
            let dst = f64::from(*channel);
            *channel = (f64::from(src) * alpha + dst * (1.0 - alpha)).round() as u8;
        }
    }

    /// Fill a polygon by even-odd scanline, sampling at pixel centres.
    /// A repeated closing vertex is harmless.
    pub fn fill_polygon(&mut self, points: &[Point], color: [u8; 3], alpha: f64) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let row_start = min_y.floor().max(0.0) as i64;
        let row_end = max_y.ceil().min(f64::from(self.height())) as i64;

        let mut crossings: Vec<f64> = Vec::with_capacity(points.len());
        for row in row_start..row_end {
            let yc = row as f64 + 0.5;
            crossings.clear();
            for (i, a) in points.iter().enumerate() {
                let b = points[(i + 1) % points.len()];
                let spans = (a.y <= yc && yc < b.y) || (b.y <= yc && yc < a.y);
                if spans {
                    crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for span in crossings.chunks_exact(2) {
                let first = (span[0] - 0.5).ceil() as i64;
                let last = (span[1] - 0.5).floor() as i64;
                for x in first..=last {
                    self.blend(x, row, color, alpha);
                }
            }
        }
    }

    /// Anti-aliased line segment of the given width.
    pub fn stroke_segment(&mut self, a: Point, b: Point, width: f64, color: [u8; 3], alpha: f64) {
        let half = width.max(0.5) / 2.0;
        let pad = half + 1.0;
        let (x0, x1) = (a.x.min(b.x) - pad, a.x.max(b.x) + pad);
        let (y0, y1) = (a.y.min(b.y) - pad, a.y.max(b.y) + pad);

        for y in self.rows(y0, y1) {
            for x in self.cols(x0, x1) {
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let coverage = half + 0.5 - segment_distance(p, a, b);
                if coverage > 0.0 {
                    self.blend(x, y, color, alpha * coverage.min(1.0));
                }
            }
        }
    }

    /// Stroke consecutive segments. Pass a closed point list for an outline.
    pub fn stroke_polyline(&mut self, points: &[Point], width: f64, color: [u8; 3], alpha: f64) {
        for pair in points.windows(2) {
            self.stroke_segment(pair[0], pair[1], width, color, alpha);
        }
    }

    /// Anti-aliased circle outline.
    pub fn stroke_circle(
        &mut self,
        center: Point,
        radius: f64,
        width: f64,
        color: [u8; 3],
        alpha: f64,
    ) {
        let half = width.max(0.5) / 2.0;
        let reach = radius + half + 1.0;
        for y in self.rows(center.y - reach, center.y + reach) {
            for x in self.cols(center.x - reach, center.x + reach) {
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let coverage = half + 0.5 - (p.distance(center) - radius).abs();
                if coverage > 0.0 {
                    self.blend(x, y, color, alpha * coverage.min(1.0));
                }
            }
        }
    }

    /// Draw lines of text with the 8x8 bitmap font, each glyph pixel scaled
    /// to a `scale`×`scale` block. Characters without a glyph render as `?`.
    pub fn draw_text(
        &mut self,
        lines: &[&str],
        anchor: Point,
        halign: HAlign,
        valign: VAlign,
        scale: u32,
        color: [u8; 3],
    ) {
        let scale = scale.max(1);
        let cell = i64::from(GLYPH_SIZE * scale);
        let block_height = cell * lines.len() as i64;
        let top = match valign {
            VAlign::Top => anchor.y.round() as i64,
            VAlign::Middle => anchor.y.round() as i64 - block_height / 2,
            VAlign::Bottom => anchor.y.round() as i64 - block_height,
        };

        for (row, line) in lines.iter().enumerate() {
            let line_width = cell * line.chars().count() as i64;
            let left = match halign {
                HAlign::Left => anchor.x.round() as i64,
                HAlign::Center => anchor.x.round() as i64 - line_width / 2,
                HAlign::Right => anchor.x.round() as i64 - line_width,
            };
            let line_top = top + cell * row as i64;
            for (col, ch) in line.chars().enumerate() {
                let glyph = glyph(ch);
                self.draw_glyph(&glyph, left + cell * col as i64, line_top, scale, color);
            }
        }
    }

    fn draw_glyph(&mut self, glyph: &[u8; 8], left: i64, top: i64, scale: u32, color: [u8; 3]) {
        let scale = i64::from(scale);
        for (gy, bits) in glyph.iter().enumerate() {
            for gx in 0..8 {
                if bits & (1 << gx) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        self.blend(
                            left + gx * scale + dx,
                            top + gy as i64 * scale + dy,
                            color,
                            1.0,
                        );
                    }
                }
            }
        }
    }

    fn rows(&self, from: f64, to: f64) -> std::ops::Range<i64> {
        clip_range(from, to, self.height())
    }

    fn cols(&self, from: f64, to: f64) -> std::ops::Range<i64> {
        clip_range(from, to, self.width())
    }
}

/// Pixel width of the longest of `lines` at `scale`.
#[must_use]
pub fn text_width(lines: &[&str], scale: u32) -> u32 {
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    longest as u32 * GLYPH_SIZE * scale.max(1)
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn clip_range(from: f64, to: f64, limit: u32) -> std::ops::Range<i64> {
    let start = from.floor().max(0.0) as i64;
    let end = to.ceil().min(f64::from(limit)) as i64;
    start..end.max(start)
}

/// Distance from `p` to the segment `a`–`b`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 3] = [255, 255, 255];
    const BLACK: [u8; 3] = [0, 0, 0];

    fn rgb(canvas: &Canvas, x: u32, y: u32) -> [u8; 3] {
        let p = canvas.image.get_pixel(x, y).0;
        [p[0], p[1], p[2]]
    }

    #[test]
    fn blend_half_alpha() {
        let mut canvas = Canvas::new(2, 2, WHITE);
        canvas.blend(0, 0, BLACK, 0.5);
        assert_eq!(rgb(&canvas, 0, 0), [128, 128, 128]);
        assert_eq!(rgb(&canvas, 1, 1), WHITE);
    }

    #[test]
    fn blend_off_canvas_is_ignored() {
        let mut canvas = Canvas::new(2, 2, WHITE);
        canvas.blend(-1, 0, BLACK, 1.0);
        canvas.blend(0, 5, BLACK, 1.0);
        assert_eq!(rgb(&canvas, 0, 0), WHITE);
    }

    #[test]
    fn fill_square_covers_interior_only() {
        let mut canvas = Canvas::new(10, 10, WHITE);
        let square = [
            Point::new(2.0, 2.0),
            Point::new(8.0, 2.0),
            Point::new(8.0, 8.0),
            Point::new(2.0, 8.0),
            Point::new(2.0, 2.0),
        ];
        canvas.fill_polygon(&square, BLACK, 1.0);

        assert_eq!(rgb(&canvas, 2, 2), BLACK);
        assert_eq!(rgb(&canvas, 7, 7), BLACK);
        assert_eq!(rgb(&canvas, 8, 8), WHITE);
        assert_eq!(rgb(&canvas, 1, 5), WHITE);
    }

    #[test]
    fn degenerate_polygon_draws_nothing() {
        let mut canvas = Canvas::new(4, 4, WHITE);
        canvas.fill_polygon(&[Point::new(1.0, 1.0), Point::new(3.0, 3.0)], BLACK, 1.0);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(rgb(&canvas, x, y), WHITE);
            }
        }
    }

    #[test]
    fn segment_marks_its_pixels() {
        let mut canvas = Canvas::new(10, 10, WHITE);
        canvas.stroke_segment(Point::new(0.0, 5.5), Point::new(10.0, 5.5), 2.0, BLACK, 1.0);
        assert_eq!(rgb(&canvas, 5, 5), BLACK);
        assert_eq!(rgb(&canvas, 5, 0), WHITE);
    }

    #[test]
    fn text_uses_glyph_bits() {
        let mut canvas = Canvas::new(16, 8, WHITE);
        canvas.draw_text(
            &["I"],
            Point::new(0.0, 0.0),
            HAlign::Left,
            VAlign::Top,
            1,
            BLACK,
        );
        let inked = (0..8)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .filter(|(x, y)| rgb(&canvas, *x, *y) == BLACK)
            .count();
        assert!(inked > 0);
        // second cell untouched
        assert_eq!(rgb(&canvas, 12, 4), WHITE);
    }

    #[test]
    fn text_width_scales() {
        assert_eq!(text_width(&["abc", "de"], 2), 48);
        assert_eq!(text_width(&[], 2), 0);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((segment_distance(Point::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-12);
        assert!((segment_distance(Point::new(13.0, 4.0), a, b) - 5.0).abs() < 1e-12);
        assert!((segment_distance(Point::new(1.0, 1.0), a, a) - 2_f64.sqrt()).abs() < 1e-12);
    }
}
