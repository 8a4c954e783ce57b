//! Regular interior sampling of a badge face.

use nalgebra::{Point2, Point3};

use crate::contour::Contours;
use crate::geometry::{self, Facing};
use crate::mesh::MeshBuilder;

/// Fraction of the smaller cell side a grid node must keep from any boundary.
pub const BOUNDARY_MARGIN: f64 = 0.35;

/// A valid lattice sample that became a face vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshNode {
    /// Vertex (and UV) index in the builder.
    pub vertex: usize,
    /// Position in badge space.
    pub position: Point2<f64>,
    /// Lattice column.
    pub i: usize,
    /// Lattice row.
    pub j: usize,
}

/// Layout of the `(n + 1) x (n + 1)` sample lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Cells per axis.
    pub n: usize,
    /// Bottom-left corner of the lattice.
    pub origin: Point2<f64>,
    /// Cell width.
    pub cell_width: f64,
    /// Cell height.
    pub cell_height: f64,
}

impl GridSpec {
    /// Lattice over a `width` x `height` box centred on the origin.
    pub fn new(width: f64, height: f64, density: u32) -> Self {
        let n = density.max(1) as usize;
        Self {
            n,
            origin: Point2::new(-width / 2.0, -height / 2.0),
            cell_width: width / n as f64,
            cell_height: height / n as f64,
        }
    }

    /// Position of node `(i, j)`.
    pub fn point(&self, i: usize, j: usize) -> Point2<f64> {
        Point2::new(
            self.origin.x + i as f64 * self.cell_width,
            self.origin.y + j as f64 * self.cell_height,
        )
    }

    /// Minimum distance a valid node keeps from the silhouette and the hole.
    pub fn margin(&self) -> f64 {
        BOUNDARY_MARGIN * self.cell_width.min(self.cell_height)
    }

    /// Size of one spatial-hash cell.
    pub fn hash_cell(&self) -> f64 {
        self.cell_width.max(self.cell_height)
    }

    #[inline]
    fn slot(&self, i: usize, j: usize) -> usize {
        j * (self.n + 1) + i
    }
}

/// Interior grid of one face.
#[derive(Debug, Clone)]
pub struct FaceGrid {
    /// Lattice layout.
    pub spec: GridSpec,
    /// Valid grid nodes in row-major order.
    pub nodes: Vec<MeshNode>,
    /// Node index per lattice slot, `None` for invalid samples.
    lookup: Vec<Option<usize>>,
    /// Counter-clockwise (in badge space) cell triangles of builder vertex ids.
    pub triangles: Vec<[usize; 3]>,
    /// Cell triangles left out because they overlap the hole.
    pub blocked_triangles: usize,
}

impl FaceGrid {
    /// Node at lattice position `(i, j)`, if that sample is valid.
    pub fn node(&self, i: usize, j: usize) -> Option<&MeshNode> {
        if i > self.spec.n || j > self.spec.n {
            return None;
        }
        self.lookup[self.spec.slot(i, j)].map(|k| &self.nodes[k])
    }

    /// Number of valid grid nodes.
    pub fn num_grid_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Whether a lattice sample may become a face vertex.
///
/// It must lie inside the silhouette, keep `margin` from it, and stay outside
/// the hole grown by `margin`.
pub fn is_valid_sample(p: &Point2<f64>, contours: &Contours, margin: f64) -> bool {
    let outline = &contours.outer.points;
    if !geometry::point_in_polygon(p, outline) {
        return false;
    }
    if geometry::distance_to_polygon(p, outline) < margin {
        return false;
    }
    match &contours.hole_params {
        Some(hole) => !hole.contains_with_margin(p, margin),
        None => true,
    }
}

/// Sample the lattice for one face, add its vertices and triangulate its cells.
pub fn sample_grid(
    builder: &mut MeshBuilder,
    contours: &Contours,
    facing: Facing,
    spec: GridSpec,
    z: f64,
) -> FaceGrid {
    let n = spec.n;
    let margin = spec.margin();

    let mut nodes = Vec::new();
    let mut lookup = vec![None; (n + 1) * (n + 1)];
    for j in 0..=n {
        for i in 0..=n {
            let p = spec.point(i, j);
            if !is_valid_sample(&p, contours, margin) {
                continue;
            }
            let vertex = builder.add_vertex(
                Point3::new(p.x, p.y, z),
                contours.uv.for_facing(&p, facing),
            );
            lookup[spec.slot(i, j)] = Some(nodes.len());
            nodes.push(MeshNode {
                vertex,
                position: p,
                i,
                j,
            });
        }
    }

    let mut grid = FaceGrid {
        spec,
        nodes,
        lookup,
        triangles: Vec::new(),
        blocked_triangles: 0,
    };
    let hole = contours.hole.as_ref().map(|ring| ring.points.as_slice());
    let (triangles, blocked) = triangulate_cells(&grid, hole);
    if blocked > 0 {
        log::debug!("{blocked} cell triangle(s) overlap the hole");
    }
    grid.triangles = triangles;
    grid.blocked_triangles = blocked;
    grid
}

/// Split each cell into triangles by the shorter-diagonal rule.
///
/// Cells with all four corners valid give two triangles, cells with three
/// give one, anything less gives none. Corners clear of the hole do not keep
/// a triangle clear of it when the hole has sharp corners or is thinner than
/// a cell, so triangles overlapping the hole ring are left to the band.
/// Returns the triangles and how many were left out.
fn triangulate_cells(grid: &FaceGrid, hole: Option<&[Point2<f64>]>) -> (Vec<[usize; 3]>, usize) {
    let n = grid.spec.n;
    let hole_bounds = hole.map(|points| (points, bounds(points)));
    let mut triangles = Vec::new();
    let mut blocked = 0;

    let mut push = |t: [&MeshNode; 3]| {
        if let Some((points, (lo, hi))) = hole_bounds {
            let tri = t.map(|node| node.position);
            let outside_box = tri.iter().all(|p| p.x < lo.x)
                || tri.iter().all(|p| p.x > hi.x)
                || tri.iter().all(|p| p.y < lo.y)
                || tri.iter().all(|p| p.y > hi.y);
            if !outside_box && geometry::triangle_overlaps_polygon(&tri, points) {
                blocked += 1;
                return;
            }
        }
        triangles.push(t.map(|node| node.vertex));
    };

    for j in 0..n {
        for i in 0..n {
            // Counter-clockwise corners: a b
            //                            d c  (rows grow upward)
            let a = grid.node(i, j);
            let b = grid.node(i + 1, j);
            let c = grid.node(i + 1, j + 1);
            let d = grid.node(i, j + 1);

            match (a, b, c, d) {
                (Some(a), Some(b), Some(c), Some(d)) => {
                    let ac = (c.position - a.position).norm_squared();
                    let bd = (d.position - b.position).norm_squared();
                    if ac <= bd {
                        push([a, b, c]);
                        push([a, c, d]);
                    } else {
                        push([a, b, d]);
                        push([b, c, d]);
                    }
                }
                (Some(a), Some(b), Some(c), None) => push([a, b, c]),
                (Some(a), Some(b), None, Some(d)) => push([a, b, d]),
                (Some(a), None, Some(c), Some(d)) => push([a, c, d]),
                (None, Some(b), Some(c), Some(d)) => push([b, c, d]),
                _ => {}
            }
        }
    }
    (triangles, blocked)
}

fn bounds(points: &[Point2<f64>]) -> (Point2<f64>, Point2<f64>) {
    points.iter().fold(
        (
            Point2::new(f64::INFINITY, f64::INFINITY),
            Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(lo, hi), p| {
            (
                Point2::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point2::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        },
    )
}
