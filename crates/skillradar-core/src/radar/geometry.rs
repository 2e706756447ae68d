//! Polar projection of radar values onto image coordinates.
//!
//! Axis `i` of `n` sits at `θ = 2πi/n`, starting east and turning
//! counter-clockwise. Image `y` grows downwards, so points are placed at
//! `(cx + r·cosθ, cy − r·sinθ)`.

use std::f64::consts::TAU;

/// Lower bound of the fixed radial scale.
pub const SCALE_MIN: f64 = 0.0;

/// Upper bound of the fixed radial scale.
pub const SCALE_MAX: f64 = 10.0;

/// A point in image space (pixels, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One value mapped onto its axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedAxis {
    pub angle: f64,
    pub radius: f64,
    pub point: Point,
}

/// Clamp a value into the radial scale. NaN reads as the centre.
#[must_use]
pub fn clamp_value(value: f64) -> f64 {
    if value.is_nan() {
        SCALE_MIN
    } else {
        value.clamp(SCALE_MIN, SCALE_MAX)
    }
}

/// Angle of axis `index` out of `count`, in radians.
#[must_use]
pub fn axis_angle(index: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    TAU * index as f64 / count as f64
}

/// Where the chart sits on the canvas and how large it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarGeometry {
    center: Point,
    outer_radius: f64,
}

impl RadarGeometry {
    #[must_use]
    pub fn new(center: Point, outer_radius: f64) -> Self {
        Self {
            center,
            outer_radius: outer_radius.max(0.0),
        }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        self.center
    }

    #[must_use]
    pub fn outer_radius(&self) -> f64 {
        self.outer_radius
    }

    /// Linear map from `[SCALE_MIN, SCALE_MAX]` to `[0, outer_radius]`.
    #[must_use]
    pub fn value_radius(&self, value: f64) -> f64 {
        (clamp_value(value) - SCALE_MIN) / (SCALE_MAX - SCALE_MIN) * self.outer_radius
    }

    #[must_use]
    pub fn point_at(&self, angle: f64, radius: f64) -> Point {
        Point::new(
            self.center.x + radius * angle.cos(),
            self.center.y - radius * angle.sin(),
        )
    }

    /// Project each value onto its axis, in the order given.
    #[must_use]
    pub fn project(&self, values: &[f64]) -> Vec<ProjectedAxis> {
        let count = values.len();
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let angle = axis_angle(i, count);
                let radius = self.value_radius(*value);
                ProjectedAxis {
                    angle,
                    radius,
                    point: self.point_at(angle, radius),
                }
            })
            .collect()
    }

    /// Polygon vertices with the first vertex repeated at the end.
    /// Empty for no values.
    #[must_use]
    pub fn closed_polygon(&self, values: &[f64]) -> Vec<Point> {
        let mut points: Vec<Point> = self.project(values).iter().map(|p| p.point).collect();
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
        points
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn geometry() -> RadarGeometry {
        RadarGeometry::new(Point::new(100.0, 100.0), 80.0)
    }

    #[test]
    fn equal_values_form_regular_polygon() {
        let g = geometry();
        let projected = g.project(&[5.0; 12]);

        assert_eq!(projected.len(), 12);
        for axis in &projected {
            assert!((axis.radius - 40.0).abs() < EPS);
            assert!((axis.point.distance(g.center()) - 40.0).abs() < EPS);
        }
        // consecutive vertices equidistant too
        let side = projected[0].point.distance(projected[1].point);
        for pair in projected.windows(2) {
            assert!((pair[0].point.distance(pair[1].point) - side).abs() < 1e-6);
        }
    }

    #[test]
    fn axes_start_east_and_turn_counter_clockwise() {
        let g = geometry();
        let projected = g.project(&[10.0, 10.0, 10.0, 10.0]);

        assert!((projected[0].point.x - 180.0).abs() < EPS);
        assert!((projected[0].point.y - 100.0).abs() < EPS);
        // second axis points up (smaller y)
        assert!((projected[1].point.x - 100.0).abs() < 1e-6);
        assert!((projected[1].point.y - 20.0).abs() < 1e-6);
        assert!((projected[2].point.x - 20.0).abs() < 1e-6);
    }

    #[test]
    fn scale_is_fixed_not_auto_ranged() {
        let g = geometry();
        assert_eq!(g.value_radius(0.0), 0.0);
        assert!((g.value_radius(10.0) - 80.0).abs() < EPS);
        assert!((g.value_radius(2.5) - 20.0).abs() < EPS);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let g = geometry();
        assert_eq!(g.value_radius(-3.0), 0.0);
        assert!((g.value_radius(42.0) - 80.0).abs() < EPS);
        assert_eq!(g.value_radius(f64::NAN), 0.0);
        assert!((g.value_radius(f64::INFINITY) - 80.0).abs() < EPS);
    }

    #[test]
    fn closed_polygon_repeats_first_vertex() {
        let g = geometry();
        let polygon = g.closed_polygon(&[3.0, 6.0, 9.0]);
        assert_eq!(polygon.len(), 4);
        assert_eq!(polygon.first(), polygon.last());
        assert!(g.closed_polygon(&[]).is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let g = geometry();
        let projected = g.project(&[9.0, 1.0, 5.0]);
        let radii: Vec<f64> = projected.iter().map(|p| p.radius).collect();
        assert!((radii[0] - 72.0).abs() < EPS);
        assert!((radii[1] - 8.0).abs() < EPS);
        assert!((radii[2] - 40.0).abs() < EPS);
    }
}
