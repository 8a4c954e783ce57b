//! Geometric primitives shared by the mesh pipeline.
//!
//! All predicates work in badge space (millimetres, origin at the badge
//! centre, y up) unless noted otherwise. The point-in-triangle test is also
//! used in UV space by adaptive subdivision.

use nalgebra::{Point2, Point3, Vector2, Vector3};

/// Tolerance for treating a length or area as zero.
pub const EPSILON: f64 = 1e-9;

/// Smallest twice-area a front or back triangle may have.
pub const MIN_ORIENTED_AREA: f64 = 1e-10;

/// Which way a front/back face must point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    /// Normal points toward +z.
    Front,
    /// Normal points toward -z.
    Back,
}

impl Facing {
    /// Z coordinate sign of the face's plane.
    pub fn z_sign(self) -> f64 {
        match self {
            Facing::Front => 1.0,
            Facing::Back => -1.0,
        }
    }
}

/// Even-odd ray casting test against a closed polygon.
///
/// Points exactly on an edge may land on either side.
pub fn point_in_polygon(p: &Point2<f64>, polygon: &[Point2<f64>]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from `p` to the segment `ab`.
pub fn distance_to_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < EPSILON * EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Distance from `p` to the boundary of a closed polygon.
pub fn distance_to_polygon(p: &Point2<f64>, polygon: &[Point2<f64>]) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| distance_to_segment(p, &polygon[i], &polygon[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

/// Signed area of a closed polygon; positive when counter-clockwise.
pub fn signed_area(polygon: &[Point2<f64>]) -> f64 {
    let n = polygon.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = &polygon[i];
            let b = &polygon[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice * 0.5
}

/// Twice the signed area of triangle `abc`; positive when counter-clockwise.
#[inline]
pub fn orient2d(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Unnormalised triangle normal (edge cross product).
#[inline]
pub fn triangle_normal(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Vector3<f64> {
    (b - a).cross(&(c - a))
}

/// Whether the winding of `abc` points the way `facing` requires.
///
/// Front faces need `normal.z > 0`, back faces `normal.z < 0`.
pub fn is_normal_correct(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    facing: Facing,
) -> bool {
    let nz = triangle_normal(a, b, c).z;
    match facing {
        Facing::Front => nz > 0.0,
        Facing::Back => nz < 0.0,
    }
}

/// Barycentric point-in-triangle test, inclusive of the edges.
pub fn point_in_triangle(
    p: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(&v0);
    let dot01 = v0.dot(&v1);
    let dot02 = v0.dot(&v2);
    let dot11 = v1.dot(&v1);
    let dot12 = v1.dot(&v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < EPSILON * EPSILON {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;

    const TOL: f64 = 1e-12;
    u >= -TOL && v >= -TOL && u + v <= 1.0 + TOL
}

/// Whether segments `ab` and `cd` share any point, touching included.
pub fn segments_intersect(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);
    if o1 == 0.0 && o2 == 0.0 {
        // Collinear: overlap along the shared line
        return a.x.min(b.x) <= c.x.max(d.x)
            && c.x.min(d.x) <= a.x.max(b.x)
            && a.y.min(b.y) <= c.y.max(d.y)
            && c.y.min(d.y) <= a.y.max(b.y);
    }
    o1 * o2 <= 0.0 && o3 * o4 <= 0.0
}

/// Whether triangle `abc` overlaps the closed polygon: an edge crosses or
/// touches the polygon outline, or a polygon vertex lies in the triangle.
///
/// A triangle strictly inside the polygon is not detected; callers only
/// test triangles whose corners are known to lie outside it.
pub fn triangle_overlaps_polygon(tri: &[Point2<f64>; 3], polygon: &[Point2<f64>]) -> bool {
    let n = polygon.len();
    if n < 2 {
        return false;
    }
    if polygon
        .iter()
        .any(|p| point_in_triangle(p, &tri[0], &tri[1], &tri[2]))
    {
        return true;
    }
    (0..3).any(|k| {
        let (a, b) = (&tri[k], &tri[(k + 1) % 3]);
        (0..n).any(|i| segments_intersect(a, b, &polygon[i], &polygon[(i + 1) % n]))
    })
}

/// Signed distance from `p` to a centred rounded rectangle (negative inside).
pub fn rounded_rect_distance(
    p: &Point2<f64>,
    center: &Point2<f64>,
    half_width: f64,
    half_height: f64,
    radius: f64,
) -> f64 {
    let r = radius.max(0.0).min(half_width.min(half_height));
    let d = p - center;
    let q = Vector2::new(d.x.abs() - (half_width - r), d.y.abs() - (half_height - r));
    let outside = Vector2::new(q.x.max(0.0), q.y.max(0.0)).norm();
    outside + q.x.max(q.y).min(0.0) - r
}

/// Closed-form description of the hole used for interior classification.
///
/// This is independent of the hole polyline: the polyline is inscribed in
/// this shape, so anything outside the shape is also outside the polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoleParams {
    /// Circular hole.
    Circle {
        /// Centre in badge space.
        center: Point2<f64>,
        /// Radius in mm.
        radius: f64,
    },
    /// Elliptical hole.
    Oval {
        /// Centre in badge space.
        center: Point2<f64>,
        /// Semi-axis along x.
        radius_x: f64,
        /// Semi-axis along y.
        radius_y: f64,
    },
    /// Rounded-rectangle hole.
    Rectangle {
        /// Centre in badge space.
        center: Point2<f64>,
        /// Full width.
        width: f64,
        /// Full height.
        height: f64,
        /// Corner radius.
        border_radius: f64,
    },
}

impl HoleParams {
    /// Centre of the hole.
    pub fn center(&self) -> Point2<f64> {
        match *self {
            HoleParams::Circle { center, .. }
            | HoleParams::Oval { center, .. }
            | HoleParams::Rectangle { center, .. } => center,
        }
    }

    /// Whether `p` lies inside the hole.
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        self.contains_with_margin(p, 0.0)
    }

    /// Whether `p` lies inside the hole grown outward by `margin`.
    pub fn contains_with_margin(&self, p: &Point2<f64>, margin: f64) -> bool {
        match *self {
            HoleParams::Circle { center, radius } => (p - center).norm() <= radius + margin,
            HoleParams::Oval {
                center,
                radius_x,
                radius_y,
            } => {
                let rx = radius_x + margin;
                let ry = radius_y + margin;
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let dx = (p.x - center.x) / rx;
                let dy = (p.y - center.y) / ry;
                dx * dx + dy * dy <= 1.0
            }
            HoleParams::Rectangle {
                center,
                width,
                height,
                border_radius,
            } => {
                rounded_rect_distance(p, &center, width / 2.0, height / 2.0, border_radius)
                    <= margin
            }
        }
    }
}
