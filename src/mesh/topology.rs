//! Edge-based topology checks.
//!
//! A closed badge surface uses every undirected edge exactly twice. The audit
//! here counts the edges that break this (boundary edges, used once, and
//! non-manifold edges, used three or more times) and extracts boundary loops
//! so gaps can be located and closed.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;

use nalgebra::Point2;

/// Canonical (smaller index first) undirected edge key.
#[inline]
pub fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Result of [`audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeAudit {
    /// Number of distinct vertices referenced by faces.
    pub vertices: usize,
    /// Number of distinct undirected edges.
    pub edges: usize,
    /// Number of faces.
    pub faces: usize,
    /// Edges used by exactly one face, in first-seen order.
    pub boundary_edges: Vec<(usize, usize)>,
    /// Edges used by more than two faces, in first-seen order.
    pub non_manifold_edges: Vec<(usize, usize)>,
}

impl EdgeAudit {
    /// No boundary and no non-manifold edges.
    pub fn is_watertight(&self) -> bool {
        self.boundary_edges.is_empty() && self.non_manifold_edges.is_empty()
    }

    /// `V - E + F` over the referenced vertices.
    pub fn euler_characteristic(&self) -> i64 {
        self.vertices as i64 - self.edges as i64 + self.faces as i64
    }
}

/// Count how many faces use each undirected edge.
pub fn edge_use_counts(triangles: &[[usize; 3]]) -> HashMap<(usize, usize), usize> {
    let mut counts: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 2);
    for tri in triangles {
        for i in 0..3 {
            *counts.entry(edge_key(tri[i], tri[(i + 1) % 3])).or_insert(0) += 1;
        }
    }
    counts
}

/// Audit the edges of a triangle list.
pub fn audit(triangles: &[[usize; 3]]) -> EdgeAudit {
    let counts = edge_use_counts(triangles);

    let mut seen: HashSet<(usize, usize)> = HashSet::with_capacity(counts.len());
    let mut boundary_edges = Vec::new();
    let mut non_manifold_edges = Vec::new();
    let mut vertices: HashSet<usize> = HashSet::new();

    for tri in triangles {
        vertices.extend(tri.iter().copied());
        for i in 0..3 {
            let key = edge_key(tri[i], tri[(i + 1) % 3]);
            if !seen.insert(key) {
                continue;
            }
            match counts[&key] {
                1 => boundary_edges.push(key),
                2 => {}
                _ => non_manifold_edges.push(key),
            }
        }
    }

    EdgeAudit {
        vertices: vertices.len(),
        edges: counts.len(),
        faces: triangles.len(),
        boundary_edges,
        non_manifold_edges,
    }
}

/// Chain the boundary half-edges of a consistently wound triangle set into loops.
///
/// A boundary half-edge is a directed face edge whose reverse is not used by
/// any face. Loops follow the face winding, so for counter-clockwise faces the
/// outer boundary comes out counter-clockwise and inner boundaries clockwise.
/// Where two boundary loops touch at a vertex the walk turns onto the edge
/// that keeps it around the same piece of surface. Chains that cannot be
/// closed are returned open.
pub fn boundary_loops<F>(triangles: &[[usize; 3]], position: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> Point2<f64>,
{
    let mut directed: HashSet<(usize, usize)> = HashSet::with_capacity(triangles.len() * 3);
    for tri in triangles {
        for i in 0..3 {
            directed.insert((tri[i], tri[(i + 1) % 3]));
        }
    }

    let mut boundary: Vec<(usize, usize)> = Vec::new();
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    for tri in triangles {
        for i in 0..3 {
            let (a, b) = (tri[i], tri[(i + 1) % 3]);
            if !directed.contains(&(b, a)) {
                boundary.push((a, b));
                outgoing.entry(a).or_default().push(boundary.len() - 1);
            }
        }
    }

    let mut used = vec![false; boundary.len()];
    let mut loops = Vec::new();

    for start in 0..boundary.len() {
        if used[start] {
            continue;
        }

        let mut chain = Vec::new();
        let mut current = start;
        loop {
            used[current] = true;
            let (a, b) = boundary[current];
            chain.push(a);

            let candidates: Vec<usize> = outgoing
                .get(&b)
                .map(|edges| {
                    edges
                        .iter()
                        .copied()
                        .filter(|&e| !used[e] || e == start)
                        .collect()
                })
                .unwrap_or_default();

            let next = match candidates.len() {
                0 => break,
                1 => candidates[0],
                _ => tightest_turn(&candidates, &boundary, a, b, &position),
            };
            if next == start {
                break;
            }
            current = next;
        }
        loops.push(chain);
    }

    loops
}

/// Pick the outgoing edge reached first when sweeping clockwise from the
/// reversed incoming edge.
fn tightest_turn<F>(
    candidates: &[usize],
    boundary: &[(usize, usize)],
    from: usize,
    at: usize,
    position: &F,
) -> usize
where
    F: Fn(usize) -> Point2<f64>,
{
    let pivot = position(at);
    let back = position(from) - pivot;
    let back_angle = back.y.atan2(back.x);

    let clockwise_angle = |edge: usize| {
        let d = position(boundary[edge].1) - pivot;
        let mut angle = back_angle - d.y.atan2(d.x);
        while angle <= 0.0 {
            angle += TAU;
        }
        while angle > TAU {
            angle -= TAU;
        }
        angle
    };

    let mut best = candidates[0];
    let mut best_angle = clockwise_angle(best);
    for &edge in &candidates[1..] {
        let angle = clockwise_angle(edge);
        if angle < best_angle {
            best = edge;
            best_angle = angle;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_positions() -> Vec<Point2<f64>> {
        // 3x3 lattice, row-major from the bottom-left
        let mut points = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                points.push(Point2::new(i as f64, j as f64));
            }
        }
        points
    }

    fn tetrahedron() -> Vec<[usize; 3]> {
        vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]]
    }

    #[test]
    fn test_closed_tetrahedron() {
        let report = audit(&tetrahedron());
        assert!(report.is_watertight());
        assert_eq!(report.edges, 6);
        assert_eq!(report.euler_characteristic(), 2);
    }

    #[test]
    fn test_open_triangle() {
        let report = audit(&[[0, 1, 2]]);
        assert!(!report.is_watertight());
        assert_eq!(report.boundary_edges.len(), 3);
        assert_eq!(report.euler_characteristic(), 1);
    }

    #[test]
    fn test_non_manifold_edge() {
        let report = audit(&[[0, 1, 2], [1, 0, 3], [0, 1, 4]]);
        assert_eq!(report.non_manifold_edges, vec![(0, 1)]);
    }

    #[test]
    fn test_boundary_loop_of_square() {
        // Two counter-clockwise triangles covering the lower-left unit square
        let points = grid_positions();
        let tris = vec![[0, 1, 4], [0, 4, 3]];
        let loops = boundary_loops(&tris, |i| points[i]);

        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 4);
        let polygon: Vec<Point2<f64>> = loops[0].iter().map(|&i| points[i]).collect();
        assert!(crate::geometry::signed_area(&polygon) > 0.0);
    }

    #[test]
    fn test_boundary_loops_split_at_pinch() {
        // Lower-left and upper-right squares touching only at vertex 4
        let points = grid_positions();
        let tris = vec![[0, 1, 4], [0, 4, 3], [4, 5, 8], [4, 8, 7]];
        let loops = boundary_loops(&tris, |i| points[i]);

        assert_eq!(loops.len(), 2);
        for l in &loops {
            assert_eq!(l.len(), 4);
            assert!(l.contains(&4));
        }
    }

    #[test]
    fn test_boundary_loop_with_hole() {
        // Ring of 8 triangles pairs around the centre cell of a 4x4 lattice
        let mut points = Vec::new();
        for j in 0..4 {
            for i in 0..4 {
                points.push(Point2::new(i as f64, j as f64));
            }
        }
        let idx = |i: usize, j: usize| j * 4 + i;
        let mut tris = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                if i == 1 && j == 1 {
                    continue;
                }
                tris.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                tris.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }

        let loops = boundary_loops(&tris, |i| points[i]);
        assert_eq!(loops.len(), 2);

        let areas: Vec<f64> = loops
            .iter()
            .map(|l| {
                let poly: Vec<Point2<f64>> = l.iter().map(|&i| points[i]).collect();
                crate::geometry::signed_area(&poly)
            })
            .collect();
        assert!(areas.iter().any(|&a| (a - 9.0).abs() < 1e-9));
        assert!(areas.iter().any(|&a| (a + 1.0).abs() < 1e-9));
    }
}
