//! Constrained Delaunay triangulation of regions bounded by closed loops.
//!
//! The region is given as a set of constraint edges that form closed loops
//! (the silhouette ring, the hole ring, the frontier of the grid). Every
//! endpoint becomes a vertex and every edge a constraint, so no input vertex
//! is dropped and no triangle crosses a loop. Triangles are kept by the
//! even-odd rule: a triangle belongs to the region when its centroid is
//! enclosed by an odd number of loops.
//!
//! # Example
//!
//! ```
//! use badge_mesh::retopo::cdt;
//! use nalgebra::Point2;
//!
//! // 4x4 square with a 2x2 square hole
//! let points = [
//!     Point2::new(0.0, 0.0), Point2::new(4.0, 0.0), Point2::new(4.0, 4.0), Point2::new(0.0, 4.0),
//!     Point2::new(1.0, 1.0), Point2::new(3.0, 1.0), Point2::new(3.0, 3.0), Point2::new(1.0, 3.0),
//! ];
//! let result = cdt::triangulate(&[0, 1, 2, 3], &[vec![4, 5, 6, 7]], |i| points[i]).unwrap();
//! assert_eq!(result.triangles.len(), 8);
//! ```

use std::collections::{HashMap, HashSet};

use nalgebra::Point2;
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, HasPosition, Point2 as SitePoint, Triangulation as _};

use crate::geometry;
use crate::mesh::topology;

/// Output of [`triangulate_edges`] and [`triangulate`].
#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    /// Counter-clockwise triangles of input vertex ids.
    pub triangles: Vec<[usize; 3]>,
    /// Constraint edges that could not be inserted (crossing another one, or
    /// an endpoint the triangulation rejected).
    pub rejected_constraints: usize,
}

#[derive(Debug, Clone, Copy)]
struct Site {
    id: usize,
    position: SitePoint<f64>,
}

impl HasPosition for Site {
    type Scalar = f64;

    fn position(&self) -> SitePoint<f64> {
        self.position
    }
}

/// Triangulate the region enclosed by the closed loops that `edges` form.
///
/// Edge direction does not matter and duplicates are ignored.
pub fn triangulate_edges<F>(edges: &[(usize, usize)], position: F) -> Triangulation
where
    F: Fn(usize) -> Point2<f64>,
{
    let mut seen = HashSet::with_capacity(edges.len());
    let constraints: Vec<(usize, usize)> = edges
        .iter()
        .filter(|(a, b)| a != b)
        .map(|&(a, b)| topology::edge_key(a, b))
        .filter(|key| seen.insert(*key))
        .collect();

    let mut result = Triangulation::default();
    let mut cdt: ConstrainedDelaunayTriangulation<Site> = ConstrainedDelaunayTriangulation::new();
    let mut handles: HashMap<usize, FixedVertexHandle> = HashMap::with_capacity(constraints.len());

    for &(a, b) in &constraints {
        for id in [a, b] {
            if handles.contains_key(&id) {
                continue;
            }
            let p = position(id);
            match cdt.insert(Site {
                id,
                position: SitePoint::new(p.x, p.y),
            }) {
                Ok(handle) => {
                    handles.insert(id, handle);
                }
                Err(e) => log::warn!("vertex {id} at ({:.4}, {:.4}) rejected: {e:?}", p.x, p.y),
            }
        }
    }

    for &(a, b) in &constraints {
        let (Some(&from), Some(&to)) = (handles.get(&a), handles.get(&b)) else {
            result.rejected_constraints += 1;
            continue;
        };
        if from == to {
            continue;
        }
        if cdt.can_add_constraint(from, to) {
            cdt.add_constraint(from, to);
        } else {
            result.rejected_constraints += 1;
        }
    }
    if result.rejected_constraints > 0 {
        log::warn!("{} constraint edge(s) could not be inserted", result.rejected_constraints);
    }

    let segments: Vec<(Point2<f64>, Point2<f64>)> =
        constraints.iter().map(|&(a, b)| (position(a), position(b))).collect();

    for face in cdt.inner_faces() {
        let [a, b, c] = face.vertices().map(|v| v.data().id);
        let (pa, pb, pc) = (position(a), position(b), position(c));
        let centroid = Point2::from((pa.coords + pb.coords + pc.coords) / 3.0);
        if !enclosed(&centroid, &segments) {
            continue;
        }
        if geometry::orient2d(&pa, &pb, &pc) > 0.0 {
            result.triangles.push([a, b, c]);
        } else {
            result.triangles.push([a, c, b]);
        }
    }
    result
}

/// Triangulate the region inside `outer` and outside every loop of `holes`.
///
/// Returns `None` when the outer loop has fewer than three vertices.
pub fn triangulate<F>(outer: &[usize], holes: &[Vec<usize>], position: F) -> Option<Triangulation>
where
    F: Fn(usize) -> Point2<f64>,
{
    if outer.len() < 3 {
        return None;
    }
    let mut edges = loop_edges(outer);
    for hole in holes.iter().filter(|h| h.len() >= 3) {
        edges.extend(loop_edges(hole));
    }
    Some(triangulate_edges(&edges, position))
}

/// Edges of a closed loop, including the closing one.
pub fn loop_edges(vertices: &[usize]) -> Vec<(usize, usize)> {
    let n = vertices.len();
    (0..n).map(|i| (vertices[i], vertices[(i + 1) % n])).collect()
}

/// Even-odd crossing test of `p` against an unordered set of segments.
fn enclosed(p: &Point2<f64>, segments: &[(Point2<f64>, Point2<f64>)]) -> bool {
    let mut inside = false;
    for (a, b) in segments {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}
