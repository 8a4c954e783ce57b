//! Closing the band between the silhouette rings and the interior grid.
//!
//! The grid's frontier (the boundary of its cell triangles) runs a little
//! inside the silhouette and a little outside the hole. The band in between
//! is closed one of two ways:
//!
//! * **Zipper**: when the frontier is one loop around the grid (plus one loop
//!   around the hole, if any), ring and frontier are walked together starting
//!   from the frontier vertex nearest the ring's first point. Each step emits
//!   one triangle, advancing along whichever loop gives the shorter new edge.
//!   Every ring edge gets exactly one triangle with a grid apex.
//! * **Constrained Delaunay**: any other frontier layout (hole frontier merged
//!   into the outer one, several grid pieces, no grid at all), or a zipper
//!   step with both candidates inverted, falls back to triangulating the band
//!   with every ring and frontier edge as a constraint (see [`cdt`]).
//!
//! Both produce counter-clockwise triangles in badge space that share every
//! ring and frontier edge exactly once with their neighbours. A zipper whose
//! triangles are all counter-clockwise tiles the band exactly: its boundary
//! is the ring minus the frontier, so every point of the band is covered once.
//!
//! [`cdt`]: super::cdt

use nalgebra::Point2;

use super::cdt;
use super::grid::FaceGrid;
use super::spatial_hash::SpatialHash;
use crate::geometry::{self, MIN_ORIENTED_AREA};
use crate::mesh::topology;
use crate::mesh::MeshBuilder;

/// One side (front or back) of an extruded ring.
#[derive(Debug, Clone, Copy)]
pub struct RingSide<'a> {
    /// Vertex ids in counter-clockwise order.
    pub vertices: &'a [usize],
    /// Positions matching `vertices`.
    pub points: &'a [Point2<f64>],
}

/// How the band of a face was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stitching {
    /// Ring and frontier zipped together.
    Zipper,
    /// Band triangulated with the ring and frontier edges as constraints.
    Constrained,
    /// No cell triangles; the whole face triangulated from the rings.
    RingsOnly,
}

/// Triangles closing the band of one face.
#[derive(Debug, Clone)]
pub struct StitchResult {
    /// Counter-clockwise triangles of builder vertex ids.
    pub triangles: Vec<[usize; 3]>,
    /// Strategy that produced them.
    pub strategy: Stitching,
    /// Constraint edges the fallback triangulation could not insert.
    pub rejected_constraints: usize,
}

/// Close the band between `outer`, `hole` and the grid of one face.
pub fn stitch_face(
    builder: &MeshBuilder,
    grid: &FaceGrid,
    outer: RingSide<'_>,
    hole: Option<RingSide<'_>>,
) -> StitchResult {
    let position = |v: usize| builder.position(v).xy();

    if grid.triangles.is_empty() {
        let holes: Vec<Vec<usize>> = hole.iter().map(|h| h.vertices.to_vec()).collect();
        let result = cdt::triangulate(outer.vertices, &holes, position).unwrap_or_default();
        return StitchResult {
            triangles: result.triangles,
            strategy: Stitching::RingsOnly,
            rejected_constraints: result.rejected_constraints,
        };
    }

    let loops: Vec<Vec<usize>> = topology::boundary_loops(&grid.triangles, position)
        .into_iter()
        .filter(|l| l.len() >= 3)
        .collect();
    let (around, inside): (Vec<Vec<usize>>, Vec<Vec<usize>>) =
        loops.into_iter().partition(|l| loop_area(l, &position) > 0.0);

    log::debug!(
        "frontier: {} outer loop(s), {} inner loop(s)",
        around.len(),
        inside.len()
    );

    if let Some(triangles) = try_zipper(grid, outer, hole, &around, &inside, &position) {
        return StitchResult {
            triangles,
            strategy: Stitching::Zipper,
            rejected_constraints: 0,
        };
    }

    log::debug!("zipper not applicable, triangulating the band");
    let result = constrained_band(grid, outer, hole, position);
    StitchResult {
        triangles: result.triangles,
        strategy: Stitching::Constrained,
        rejected_constraints: result.rejected_constraints,
    }
}

fn loop_area<F: Fn(usize) -> Point2<f64>>(vertices: &[usize], position: &F) -> f64 {
    let points: Vec<Point2<f64>> = vertices.iter().map(|&v| position(v)).collect();
    geometry::signed_area(&points)
}

fn try_zipper<F>(
    grid: &FaceGrid,
    outer: RingSide<'_>,
    hole: Option<RingSide<'_>>,
    around: &[Vec<usize>],
    inside: &[Vec<usize>],
    position: &F,
) -> Option<Vec<[usize; 3]>>
where
    F: Fn(usize) -> Point2<f64>,
{
    let [frontier] = around else {
        return None;
    };
    let cell = grid.spec.hash_cell();

    let frontier_points: Vec<Point2<f64>> = frontier.iter().map(|&v| position(v)).collect();
    let seed = SpatialHash::from_points(cell, &frontier_points).nearest(outer.points.first()?)?;
    let mut triangles = zipper(outer.vertices, 0, frontier, seed, position)?;

    match (hole, inside) {
        (None, []) => {}
        (Some(hole), [hole_frontier]) => {
            let hole_frontier_points: Vec<Point2<f64>> =
                hole_frontier.iter().rev().map(|&v| position(v)).collect();
            if !geometry::point_in_polygon(hole.points.first()?, &hole_frontier_points) {
                return None;
            }
            let ccw: Vec<usize> = hole_frontier.iter().rev().copied().collect();
            let seed =
                SpatialHash::from_points(cell, &hole_frontier_points).nearest(hole.points.first()?)?;
            triangles.extend(zipper(&ccw, seed, hole.vertices, 0, position)?);
        }
        _ => return None,
    }
    Some(triangles)
}

/// Zip two counter-clockwise loops, `inner` nested in `outer`.
///
/// Returns `None` when a step has no correctly oriented candidate.
fn zipper<F>(
    outer: &[usize],
    outer_start: usize,
    inner: &[usize],
    inner_start: usize,
    position: &F,
) -> Option<Vec<[usize; 3]>>
where
    F: Fn(usize) -> Point2<f64>,
{
    let (n, m) = (outer.len(), inner.len());
    if n < 2 || m < 2 {
        return None;
    }
    let o = |k: usize| outer[(outer_start + k) % n];
    let p = |k: usize| inner[(inner_start + k) % m];
    let ccw = |a: usize, b: usize, c: usize| {
        geometry::orient2d(&position(a), &position(b), &position(c)) > MIN_ORIENTED_AREA
    };
    let dist = |a: usize, b: usize| (position(a) - position(b)).norm_squared();

    let mut triangles = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        let can_outer = i < n && ccw(o(i), o(i + 1), p(j));
        let can_inner = j < m && ccw(o(i), p(j + 1), p(j));

        let take_outer = match (can_outer, can_inner) {
            (true, true) => dist(o(i + 1), p(j)) <= dist(o(i), p(j + 1)),
            (true, false) => true,
            (false, true) => false,
            (false, false) => return None,
        };

        if take_outer {
            triangles.push([o(i), o(i + 1), p(j)]);
            i += 1;
        } else {
            triangles.push([o(i), p(j + 1), p(j)]);
            j += 1;
        }
    }
    Some(triangles)
}

/// Triangulate the whole band at once.
///
/// The constraints are the silhouette ring, the hole ring and every open
/// edge of the cell triangles, so the even-odd region they enclose is the
/// band, however the frontier is split into loops.
fn constrained_band<F>(
    grid: &FaceGrid,
    outer: RingSide<'_>,
    hole: Option<RingSide<'_>>,
    position: F,
) -> cdt::Triangulation
where
    F: Fn(usize) -> Point2<f64>,
{
    let mut edges = cdt::loop_edges(outer.vertices);
    if let Some(h) = hole {
        edges.extend(cdt::loop_edges(h.vertices));
    }
    edges.extend(topology::audit(&grid.triangles).boundary_edges);
    cdt::triangulate_edges(&edges, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BadgeDesign, BadgeSettings, ExportConfig, HoleSettings};
    use crate::contour::build_contours;
    use crate::geometry::Facing;
    use crate::retopo::grid::{sample_grid, GridSpec};

    fn stitch(design: &BadgeDesign, density: u32) -> (MeshBuilder, Vec<[usize; 3]>, StitchResult, Vec<usize>) {
        let mut builder = MeshBuilder::new();
        let config = ExportConfig::default().with_density(density);
        let contours = build_contours(&mut builder, design, &config);
        let spec = GridSpec::new(design.badge.width, design.badge.height, density);
        let grid = sample_grid(&mut builder, &contours, Facing::Front, spec, 1.0);

        let outer = RingSide {
            vertices: &contours.outer.front,
            points: &contours.outer.points,
        };
        let hole = contours.hole.as_ref().map(|h| RingSide {
            vertices: &h.front,
            points: &h.points,
        });
        let result = stitch_face(&builder, &grid, outer, hole);

        let mut all = grid.triangles.clone();
        all.extend(result.triangles.iter().copied());
        let hole_ring = contours.hole.as_ref().map(|h| h.front.clone()).unwrap_or_default();
        (builder, all, result, hole_ring)
    }

    fn face_area(builder: &MeshBuilder, tris: &[[usize; 3]]) -> f64 {
        tris.iter()
            .map(|t| {
                let p = t.map(|v| builder.position(v).xy());
                geometry::orient2d(&p[0], &p[1], &p[2]) * 0.5
            })
            .sum()
    }

    #[test]
    fn test_zipper_closes_plain_badge() {
        let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0));
        let (builder, all, result, _) = stitch(&design, 20);

        assert_eq!(result.strategy, Stitching::Zipper);
        for t in &result.triangles {
            let p = t.map(|v| builder.position(v).xy());
            assert!(geometry::orient2d(&p[0], &p[1], &p[2]) > 0.0);
        }

        // Only the ring edges stay open
        let audit = topology::audit(&all);
        assert!(audit.non_manifold_edges.is_empty());
        assert_eq!(audit.boundary_edges.len(), 4 * (crate::contour::CORNER_SEGMENTS + 1));

        let expected = 63.0 * 90.0 - (4.0 - std::f64::consts::PI) * 9.0;
        assert!((face_area(&builder, &all) - expected).abs() < 1.0);
    }

    #[test]
    fn test_hole_band_closed() {
        let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0))
            .with_hole(HoleSettings::circle(6.0, 1.0));
        let (builder, all, result, hole_ring) = stitch(&design, 40);

        assert!(matches!(result.strategy, Stitching::Zipper | Stitching::Constrained));
        let audit = topology::audit(&all);
        assert!(audit.non_manifold_edges.is_empty());

        // Every hole ring edge is used by exactly one face triangle
        let counts = topology::edge_use_counts(&all);
        for i in 0..hole_ring.len() {
            let key = topology::edge_key(hole_ring[i], hole_ring[(i + 1) % hole_ring.len()]);
            assert_eq!(counts.get(&key), Some(&1));
        }

        let outer_area = 63.0 * 90.0 - (4.0 - std::f64::consts::PI) * 9.0;
        let hole_area = std::f64::consts::PI * 9.0;
        assert!((face_area(&builder, &all) - (outer_area - hole_area)).abs() < 1.0);
    }

    #[test]
    fn test_centred_hole_band_closed() {
        let design = BadgeDesign::new(BadgeSettings::new(60.0, 60.0))
            .with_hole(HoleSettings::circle(12.0, 24.0));
        let (builder, all, result, _) = stitch(&design, 30);

        assert_ne!(result.strategy, Stitching::RingsOnly);
        let audit = topology::audit(&all);
        assert!(audit.non_manifold_edges.is_empty());
        let expected = 3600.0 - std::f64::consts::PI * 36.0;
        assert!((face_area(&builder, &all) - expected).abs() < 1.0);
    }

    #[test]
    fn test_no_grid_uses_rings() {
        let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0))
            .with_hole(HoleSettings::circle(6.0, 1.0));
        let (builder, all, result, _) = stitch(&design, 1);

        assert_eq!(result.strategy, Stitching::RingsOnly);
        assert!(!all.is_empty());
        let outer_area = 63.0 * 90.0 - (4.0 - std::f64::consts::PI) * 9.0;
        assert!((face_area(&builder, &all) - (outer_area - std::f64::consts::PI * 9.0)).abs() < 1.0);
    }
}
