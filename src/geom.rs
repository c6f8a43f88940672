//! Plane geometry shared by the layout builder and the shape generator.
//!
//! Angles are expressed in tenth-degrees counterclockwise from the positive
//! x axis, matching the rotation values stored on placed instances.

/// A point in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    /// Rotates this point about the origin by `tenth_degrees`.
    pub fn rotated(self, tenth_degrees: i32) -> Point {
        if tenth_degrees == 0 {
            return self;
        }
        let rad = f64::from(tenth_degrees) * std::f64::consts::PI / 1800.0;
        let (sin, cos) = rad.sin_cos();
        Point {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Angle of the line from `from` to `to` in tenth-degrees, normalized to
/// the range `0..3600`.
pub fn figure_angle(from: Point, to: Point) -> i32 {
    let rad = (to.y - from.y).atan2(to.x - from.x);
    let tenths = (rad * 1800.0 / std::f64::consts::PI).round() as i32;
    (tenths + 3600) % 3600
}

/// Number of vertices used to approximate a full ellipse.
pub const ELLIPSE_POINTS: usize = 30;

/// Base vertex count per curve segment when expanding a spline.
pub const SPLINE_GRAIN: usize = 20;

/// Returns the outline of an elliptical arc centered at `center` with radii
/// `sx` and `sy`. `start_offset` is the starting angle in radians and
/// `end_angle` the angular extent; an extent of zero (or a full circle)
/// produces the complete ellipse with [`ELLIPSE_POINTS`] vertices.
pub fn fill_ellipse(center: Point, sx: f64, sy: f64, start_offset: f64, end_angle: f64) -> Vec<Point> {
    let full = end_angle == 0.0 || end_angle >= std::f64::consts::PI * 2.0;
    let points = if full {
        ELLIPSE_POINTS
    } else {
        let scaled = (end_angle * ELLIPSE_POINTS as f64 / (std::f64::consts::PI * 2.0)) as usize;
        scaled.max(3)
    };

    // Incremental rotation avoids calling sin/cos per vertex.
    let step = if full {
        std::f64::consts::PI * 2.0 / (points - 1) as f64
    } else {
        end_angle / (points - 1) as f64
    };
    let (s1, c1) = step.sin_cos();
    let mut out = Vec::with_capacity(points);
    let (mut s2, mut c2) = start_offset.sin_cos();
    for _ in 0..points {
        out.push(Point::new(center.x + c2 * sx, center.y + s2 * sy));
        let c3 = c2 * c1 - s2 * s1;
        s2 = s2 * c1 + c2 * s1;
        c2 = c3;
    }
    out
}

/// Expands a Catmull-Rom spline through `control` points, translated so
/// that the curve is centered at `(cx, cy)`.
pub fn fill_spline(cx: f64, cy: f64, control: &[Point]) -> Vec<Point> {
    if control.len() < 2 {
        return control
            .iter()
            .map(|p| Point::new(p.x + cx, p.y + cy))
            .collect();
    }

    let steps = SPLINE_GRAIN;
    let mut out = Vec::with_capacity((control.len() - 1) * steps + 1);

    // Phantom endpoints mirror the first and last control points so the
    // curve passes through both ends.
    let at = |i: isize| -> Point {
        if i < 0 {
            let p0 = control[0];
            let p1 = control[1];
            Point::new(2.0 * p0.x - p1.x, 2.0 * p0.y - p1.y)
        } else if i as usize >= control.len() {
            let pn = control[control.len() - 1];
            let pm = control[control.len() - 2];
            Point::new(2.0 * pn.x - pm.x, 2.0 * pn.y - pm.y)
        } else {
            control[i as usize]
        }
    };

    for seg in 0..control.len() - 1 {
        let k = seg as isize;
        let (p0, p1, p2, p3) = (at(k - 1), at(k), at(k + 1), at(k + 2));
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            let tsq = t * t;
            let t4 = t * tsq / 6.0;
            let t3 = (1.0 + 3.0 * t + 3.0 * tsq - 3.0 * t * tsq) / 6.0;
            let t2 = (4.0 - 6.0 * tsq + 3.0 * t * tsq) / 6.0;
            let t1 = (1.0 - 3.0 * t + 3.0 * tsq - t * tsq) / 6.0;
            out.push(Point::new(
                cx + t1 * p0.x + t2 * p1.x + t3 * p2.x + t4 * p3.x,
                cy + t1 * p0.y + t2 * p1.y + t3 * p2.y + t4 * p3.y,
            ));
        }
    }
    let last = control[control.len() - 1];
    out.push(Point::new(cx + last.x, cy + last.y));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_angle_quadrants() {
        let o = Point::default();
        assert_eq!(figure_angle(o, Point::new(5.0, 0.0)), 0);
        assert_eq!(figure_angle(o, Point::new(0.0, 5.0)), 900);
        assert_eq!(figure_angle(o, Point::new(-5.0, 0.0)), 1800);
        assert_eq!(figure_angle(o, Point::new(0.0, -5.0)), 2700);
        assert_eq!(figure_angle(Point::new(1.0, 1.0), Point::new(2.0, 2.0)), 450);
    }

    #[test]
    fn rotation_is_counterclockwise() {
        let p = Point::new(1.0, 0.0).rotated(900);
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn full_ellipse_has_fixed_vertex_count() {
        let pts = fill_ellipse(Point::default(), 2.0, 1.0, 0.0, 0.0);
        assert_eq!(pts.len(), ELLIPSE_POINTS);
        assert!((pts[0].x - 2.0).abs() < 1e-9);
        let last = pts[pts.len() - 1];
        assert!((last.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn partial_arc_has_at_least_three_points() {
        let pts = fill_ellipse(Point::default(), 1.0, 1.0, 0.0, 0.01);
        assert_eq!(pts.len(), 3);
    }

    #[test]
    fn spline_interpolates_endpoints() {
        let ctl = [Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(8.0, 4.0)];
        let pts = fill_spline(1.0, 1.0, &ctl);
        assert_eq!(pts.len(), 2 * SPLINE_GRAIN + 1);
        assert!((pts[0].x - 1.0).abs() < 1e-9);
        assert!((pts[0].y - 1.0).abs() < 1e-9);
        let last = pts[pts.len() - 1];
        assert!((last.x - 9.0).abs() < 1e-9);
        assert!((last.y - 5.0).abs() < 1e-9);
    }
}
