//! Silhouette contours, ring extrusion and side walls.
//!
//! The badge outline and the optional hole outline are sampled into closed,
//! counter-clockwise polylines. Each polyline is extruded into a front ring
//! (`z = +thickness / 2`) and a back ring (`z = -thickness / 2`) of vertices
//! with UVs, and the two rings are joined by a wall strip.
//!
//! # Point counts
//!
//! Rounded rectangles always produce `4 * (CORNER_SEGMENTS + 1)` points (or 4
//! for square corners); circles and ovals scale with radius and mesh density,
//! rounded up to a multiple of 4 and clamped to
//! `[MIN_CURVE_POINTS, MAX_CURVE_POINTS]`.

use std::f64::consts::{FRAC_PI_2, TAU};

use nalgebra::{Point2, Point3};

use crate::config::{BadgeDesign, BadgeSettings, ExportConfig, HoleSettings, HoleShape};
use crate::geometry::{self, Facing, HoleParams, EPSILON};
use crate::mesh::{FaceRole, MeshBuilder};

/// Angular steps swept per rounded corner.
pub const CORNER_SEGMENTS: usize = 8;

/// Fewest points on a circle or oval outline.
pub const MIN_CURVE_POINTS: usize = 24;

/// Most points on a circle or oval outline.
pub const MAX_CURVE_POINTS: usize = 256;

/// Corner radii below this produce a sharp 4-point rectangle.
const SHARP_RADIUS: f64 = 1e-3;

/// UV shared by every back-ring vertex of a single-sided badge.
///
/// The rasterizer keeps a blank patch around this coordinate.
pub const BLANK_UV: Point2<f64> = Point2::new(0.0, 0.0);

/// A closed outline shape centred at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outline {
    /// Rectangle with rounded corners.
    RoundedRect {
        /// Full width.
        width: f64,
        /// Full height.
        height: f64,
        /// Corner radius (clamped to the half-extents).
        radius: f64,
    },
    /// Circle.
    Circle {
        /// Radius.
        radius: f64,
    },
    /// Axis-aligned ellipse.
    Oval {
        /// Full width.
        width: f64,
        /// Full height.
        height: f64,
    },
}

/// Number of points for a curved outline of the given radius.
pub fn curve_point_count(radius: f64, density: u32) -> usize {
    let raw = (radius.max(0.0) * density as f64 * 0.5).ceil() as usize;
    let multiple_of_four = raw.div_ceil(4) * 4;
    multiple_of_four.clamp(MIN_CURVE_POINTS, MAX_CURVE_POINTS)
}

/// Sample an outline into a counter-clockwise polyline around `center`.
///
/// Zero-size outlines produce no points.
pub fn outline_points(outline: &Outline, center: Point2<f64>, density: u32) -> Vec<Point2<f64>> {
    match *outline {
        Outline::RoundedRect {
            width,
            height,
            radius,
        } => rounded_rect_points(center, width, height, radius),
        Outline::Circle { radius } => {
            if radius <= EPSILON {
                return Vec::new();
            }
            ellipse_points(center, radius, radius, curve_point_count(radius, density))
        }
        Outline::Oval { width, height } => {
            if width <= EPSILON || height <= EPSILON {
                return Vec::new();
            }
            let (rx, ry) = (width / 2.0, height / 2.0);
            ellipse_points(center, rx, ry, curve_point_count(rx.max(ry), density))
        }
    }
}

fn rounded_rect_points(center: Point2<f64>, width: f64, height: f64, radius: f64) -> Vec<Point2<f64>> {
    if width <= EPSILON || height <= EPSILON {
        return Vec::new();
    }
    let (hw, hh) = (width / 2.0, height / 2.0);

    // Keep a sliver of straight edge so neighbouring corners never share a point.
    let r = radius.max(0.0).min(hw.min(hh) * 0.999);
    if r < SHARP_RADIUS {
        return vec![
            Point2::new(center.x - hw, center.y - hh),
            Point2::new(center.x + hw, center.y - hh),
            Point2::new(center.x + hw, center.y + hh),
            Point2::new(center.x - hw, center.y + hh),
        ];
    }

    // Corner centres in counter-clockwise order with the angle each arc starts at.
    let corners = [
        (hw - r, -(hh - r), -FRAC_PI_2),
        (hw - r, hh - r, 0.0),
        (-(hw - r), hh - r, FRAC_PI_2),
        (-(hw - r), -(hh - r), std::f64::consts::PI),
    ];

    let mut points = Vec::with_capacity(4 * (CORNER_SEGMENTS + 1));
    for (cx, cy, start) in corners {
        for s in 0..=CORNER_SEGMENTS {
            let angle = start + FRAC_PI_2 * s as f64 / CORNER_SEGMENTS as f64;
            points.push(Point2::new(
                center.x + cx + r * angle.cos(),
                center.y + cy + r * angle.sin(),
            ));
        }
    }
    points
}

fn ellipse_points(center: Point2<f64>, rx: f64, ry: f64, count: usize) -> Vec<Point2<f64>> {
    (0..count)
        .map(|k| {
            let angle = TAU * k as f64 / count as f64;
            Point2::new(center.x + rx * angle.cos(), center.y + ry * angle.sin())
        })
        .collect()
}

/// Maps badge-space positions to texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvMapper {
    width: f64,
    height: f64,
    double_sided: bool,
}

impl UvMapper {
    /// Mapper for a badge of the given size.
    pub fn new(width: f64, height: f64, double_sided: bool) -> Self {
        Self {
            width,
            height,
            double_sided,
        }
    }

    /// Front UV: linear in position, `(0, 0)` at the bottom-left corner.
    pub fn front(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            (p.x + self.width / 2.0) / self.width,
            (p.y + self.height / 2.0) / self.height,
        )
    }

    /// Back UV: `u` mirrored when double-sided, collapsed to [`BLANK_UV`] otherwise.
    pub fn back(&self, p: &Point2<f64>) -> Point2<f64> {
        if self.double_sided {
            let front = self.front(p);
            Point2::new(1.0 - front.x, front.y)
        } else {
            BLANK_UV
        }
    }

    /// UV for a face pointing the given way.
    pub fn for_facing(&self, p: &Point2<f64>, facing: Facing) -> Point2<f64> {
        match facing {
            Facing::Front => self.front(p),
            Facing::Back => self.back(p),
        }
    }
}

/// An extruded outline: the 2D polyline plus its front and back vertices.
#[derive(Debug, Clone, Default)]
pub struct Ring {
    /// Counter-clockwise polyline in badge space.
    pub points: Vec<Point2<f64>>,
    /// Front vertex index for each point.
    pub front: Vec<usize>,
    /// Back vertex index for each point.
    pub back: Vec<usize>,
}

impl Ring {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the ring has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Vertex indices on the given side.
    pub fn side(&self, facing: Facing) -> &[usize] {
        match facing {
            Facing::Front => &self.front,
            Facing::Back => &self.back,
        }
    }
}

/// Extrude a polyline into front and back vertex rings.
///
/// Clockwise input is reversed so rings are always counter-clockwise.
pub fn extrude_ring(
    builder: &mut MeshBuilder,
    mut points: Vec<Point2<f64>>,
    uv: &UvMapper,
    thickness: f64,
) -> Ring {
    if geometry::signed_area(&points) < 0.0 {
        points.reverse();
    }

    let half = thickness / 2.0;
    let front = points
        .iter()
        .map(|p| builder.add_vertex(Point3::new(p.x, p.y, half), uv.front(p)))
        .collect();
    let back = points
        .iter()
        .map(|p| builder.add_vertex(Point3::new(p.x, p.y, -half), uv.back(p)))
        .collect();

    Ring {
        points,
        front,
        back,
    }
}

/// Outline of the badge silhouette.
pub fn badge_outline(badge: &BadgeSettings) -> Outline {
    Outline::RoundedRect {
        width: badge.width,
        height: badge.height,
        radius: badge.clamped_radius(),
    }
}

/// Outline of the hole.
pub fn hole_outline(hole: &HoleSettings) -> Outline {
    match hole.shape {
        HoleShape::Circle => Outline::Circle {
            radius: hole.size / 2.0,
        },
        HoleShape::Oval => Outline::Oval {
            width: hole.width,
            height: hole.height,
        },
        HoleShape::Rectangle => Outline::RoundedRect {
            width: hole.width,
            height: hole.height,
            radius: hole.border_radius,
        },
    }
}

/// Centre of the hole in badge space.
///
/// `offset_y` is measured downward from the badge's top edge to the top of
/// the hole; the hole is centred horizontally.
pub fn hole_center(hole: &HoleSettings, badge: &BadgeSettings) -> Point2<f64> {
    let (_, hole_height) = hole.extent();
    Point2::new(0.0, badge.height / 2.0 - hole.offset_y - hole_height / 2.0)
}

/// Closed-form hole description, or `None` when the hole is disabled or empty.
pub fn hole_params(hole: &HoleSettings, badge: &BadgeSettings) -> Option<HoleParams> {
    if !hole.enabled {
        return None;
    }
    let (width, height) = hole.extent();
    if width <= EPSILON || height <= EPSILON {
        return None;
    }

    let center = hole_center(hole, badge);
    Some(match hole.shape {
        HoleShape::Circle => HoleParams::Circle {
            center,
            radius: hole.size / 2.0,
        },
        HoleShape::Oval => HoleParams::Oval {
            center,
            radius_x: width / 2.0,
            radius_y: height / 2.0,
        },
        HoleShape::Rectangle => HoleParams::Rectangle {
            center,
            width,
            height,
            border_radius: hole.border_radius.max(0.0).min(width.min(height) / 2.0),
        },
    })
}

/// Outer and hole rings of one export.
#[derive(Debug, Clone)]
pub struct Contours {
    /// Badge width in mm.
    pub width: f64,
    /// Badge height in mm.
    pub height: f64,
    /// Badge silhouette ring.
    pub outer: Ring,
    /// Hole ring, when a non-empty hole is enabled.
    pub hole: Option<Ring>,
    /// Closed-form hole used for interior classification.
    pub hole_params: Option<HoleParams>,
    /// UV mapping shared by every stage.
    pub uv: UvMapper,
}

/// Build and extrude the outer and hole rings for a design.
pub fn build_contours(
    builder: &mut MeshBuilder,
    design: &BadgeDesign,
    config: &ExportConfig,
) -> Contours {
    let badge = &design.badge;
    let density = config.mesh_density.density;
    let uv = UvMapper::new(badge.width, badge.height, config.double_sided);

    let outer_points = outline_points(&badge_outline(badge), Point2::origin(), density);
    let outer = extrude_ring(builder, outer_points, &uv, config.thickness);

    let hole_params = hole_params(&design.hole, badge);
    let hole = hole_params.and_then(|params| {
        let points = outline_points(&hole_outline(&design.hole), params.center(), density);
        if points.is_empty() {
            None
        } else {
            Some(extrude_ring(builder, points, &uv, config.thickness))
        }
    });

    log::debug!(
        "contours: {} outer points, {} hole points",
        outer.len(),
        hole.as_ref().map_or(0, Ring::len)
    );

    Contours {
        width: badge.width,
        height: badge.height,
        outer,
        hole,
        hole_params,
        uv,
    }
}

/// Which wall a ring bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallKind {
    /// Faces away from the badge (outer silhouette).
    Outer,
    /// Faces into the hole.
    Hole,
}

/// Join a ring's front and back vertices with two triangles per segment.
///
/// Returns the number of faces added.
pub fn add_side_walls(builder: &mut MeshBuilder, ring: &Ring, kind: WallKind) -> usize {
    let n = ring.len();
    if n < 2 {
        return 0;
    }

    let mut added = 0;
    for i in 0..n {
        let j = (i + 1) % n;
        let (f0, f1) = (ring.front[i], ring.front[j]);
        let (b0, b1) = (ring.back[i], ring.back[j]);

        let tris = match kind {
            WallKind::Outer => [[f0, b0, f1], [f1, b0, b1]],
            WallKind::Hole => [[f0, f1, b0], [f1, b1, b0]],
        };
        let role = match kind {
            WallKind::Outer => FaceRole::OuterWall,
            WallKind::Hole => FaceRole::HoleWall,
        };
        for tri in tris {
            if builder.add_face(tri, role, 0) {
                added += 1;
            }
        }
    }
    added
}
