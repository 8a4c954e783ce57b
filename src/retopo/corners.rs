//! Corner-gap repair.
//!
//! After stitching, the only open edges a face may have are its ring edges,
//! which the side walls close. This pass looks for any other open edge,
//! counts how many sit near the corners of the silhouette or hole bounding
//! boxes (where the grid and the rings diverge the most), and closes every
//! open loop made purely of such edges by constrained Delaunay triangulation.

use std::collections::HashSet;

use nalgebra::Point2;

use super::cdt;
use super::stitch::RingSide;
use crate::mesh::topology;

/// Corner neighbourhood of the silhouette, as a fraction of its smaller side.
pub const OUTER_CORNER_FRACTION: f64 = 0.15;

/// Corner neighbourhood of the hole, as a fraction of its smaller side.
pub const HOLE_CORNER_FRACTION: f64 = 0.20;

/// What [`repair_gaps`] found and did.
#[derive(Debug, Clone, Default)]
pub struct GapReport {
    /// Open edges other than ring edges.
    pub open_edges: usize,
    /// Open edges inside a corner neighbourhood.
    pub corner_open_edges: usize,
    /// Gap loops closed.
    pub closed_loops: usize,
    /// Open loops touching a ring, left as they are.
    pub unresolved_loops: usize,
    /// Counter-clockwise triangles that close the gaps.
    pub triangles: Vec<[usize; 3]>,
}

/// A square-ish neighbourhood around each bounding-box corner of a loop.
#[derive(Debug, Clone)]
struct CornerZones {
    corners: Vec<Point2<f64>>,
    radius: f64,
}

impl CornerZones {
    fn around(points: &[Point2<f64>], fraction: f64) -> Option<Self> {
        let first = points.first()?;
        let (mut min, mut max) = (*first, *first);
        for p in points {
            min = Point2::new(min.x.min(p.x), min.y.min(p.y));
            max = Point2::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some(Self {
            corners: vec![
                min,
                Point2::new(max.x, min.y),
                max,
                Point2::new(min.x, max.y),
            ],
            radius: fraction * (max.x - min.x).min(max.y - min.y),
        })
    }

    fn contains(&self, p: &Point2<f64>) -> bool {
        self.corners.iter().any(|c| (p - c).norm() <= self.radius)
    }
}

/// Find and close open loops in a face's triangles.
///
/// `triangles` must be counter-clockwise in badge space.
pub fn repair_gaps<F>(
    triangles: &[[usize; 3]],
    outer: RingSide<'_>,
    hole: Option<RingSide<'_>>,
    position: F,
) -> GapReport
where
    F: Fn(usize) -> Point2<f64>,
{
    // Ring edges in the direction a closed face leaves them open.
    let mut ring_edges: HashSet<(usize, usize)> = HashSet::new();
    let n = outer.vertices.len();
    for i in 0..n {
        ring_edges.insert((outer.vertices[i], outer.vertices[(i + 1) % n]));
    }
    if let Some(h) = hole {
        let m = h.vertices.len();
        for i in 0..m {
            ring_edges.insert((h.vertices[(i + 1) % m], h.vertices[i]));
        }
    }

    let mut directed: HashSet<(usize, usize)> = HashSet::with_capacity(triangles.len() * 3);
    for t in triangles {
        for i in 0..3 {
            directed.insert((t[i], t[(i + 1) % 3]));
        }
    }

    let zones: Vec<CornerZones> = std::iter::once(CornerZones::around(outer.points, OUTER_CORNER_FRACTION))
        .chain(hole.map(|h| CornerZones::around(h.points, HOLE_CORNER_FRACTION)))
        .flatten()
        .collect();

    let mut report = GapReport::default();
    for t in triangles {
        for i in 0..3 {
            let (a, b) = (t[i], t[(i + 1) % 3]);
            if directed.contains(&(b, a)) || ring_edges.contains(&(a, b)) {
                continue;
            }
            report.open_edges += 1;
            let mid = Point2::from((position(a).coords + position(b).coords) * 0.5);
            if zones.iter().any(|z| z.contains(&mid)) {
                report.corner_open_edges += 1;
            }
        }
    }
    if report.open_edges == 0 {
        return report;
    }

    for gap in topology::boundary_loops(triangles, &position) {
        let k = gap.len();
        let on_ring = (0..k)
            .filter(|&i| ring_edges.contains(&(gap[i], gap[(i + 1) % k])))
            .count();
        if on_ring == k {
            continue;
        }
        if on_ring > 0 {
            // A gap that opened onto a ring.
            report.unresolved_loops += 1;
            continue;
        }
        if let Some(fill) = cdt::triangulate(&gap, &[], &position) {
            report.triangles.extend(fill.triangles);
            report.closed_loops += 1;
        }
    }

    log::warn!(
        "closed {} gap loop(s): {} open edge(s), {} near corners, {} unresolved",
        report.closed_loops,
        report.open_edges,
        report.corner_open_edges,
        report.unresolved_loops
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> Vec<Point2<f64>> {
        let mut points = Vec::new();
        for j in 0..4 {
            for i in 0..4 {
                points.push(Point2::new(i as f64, j as f64));
            }
        }
        points
    }

    fn ring() -> Vec<usize> {
        // Counter-clockwise border of the 4x4 lattice
        vec![0, 1, 2, 3, 7, 11, 15, 14, 13, 12, 8, 4]
    }

    fn cells(skip: &[(usize, usize)]) -> Vec<[usize; 3]> {
        let idx = |i: usize, j: usize| j * 4 + i;
        let mut tris = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                if skip.contains(&(i, j)) {
                    continue;
                }
                tris.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                tris.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        tris
    }

    #[test]
    fn test_closed_face_needs_nothing() {
        let points = lattice();
        let ring = ring();
        let ring_points: Vec<Point2<f64>> = ring.iter().map(|&i| points[i]).collect();
        let outer = RingSide {
            vertices: &ring,
            points: &ring_points,
        };

        let report = repair_gaps(&cells(&[]), outer, None, |i| points[i]);
        assert_eq!(report.open_edges, 0);
        assert!(report.triangles.is_empty());
    }

    #[test]
    fn test_interior_gap_closed() {
        let points = lattice();
        let ring = ring();
        let ring_points: Vec<Point2<f64>> = ring.iter().map(|&i| points[i]).collect();
        let outer = RingSide {
            vertices: &ring,
            points: &ring_points,
        };

        let mut tris = cells(&[(1, 1)]);
        let report = repair_gaps(&tris, outer, None, |i| points[i]);
        assert_eq!(report.open_edges, 4);
        assert_eq!(report.corner_open_edges, 0);
        assert_eq!(report.closed_loops, 1);
        assert_eq!(report.triangles.len(), 2);

        tris.extend(report.triangles);
        let audit = topology::audit(&tris);
        assert_eq!(audit.boundary_edges.len(), ring.len());
    }

    #[test]
    fn test_gap_on_ring_left_unresolved() {
        let points = lattice();
        let ring = ring();
        let ring_points: Vec<Point2<f64>> = ring.iter().map(|&i| points[i]).collect();
        let outer = RingSide {
            vertices: &ring,
            points: &ring_points,
        };

        // Removing a corner cell opens the ring itself
        let tris = cells(&[(0, 0)]);
        let report = repair_gaps(&tris, outer, None, |i| points[i]);
        assert_eq!(report.open_edges, 2);
        assert_eq!(report.corner_open_edges, 0);
        assert_eq!(report.unresolved_loops, 1);
    }
}
