//! Texture-driven adaptive subdivision.
//!
//! Front and back faces are split by quadrisection where the texture has
//! high-frequency content, so text and photo edges get small triangles while
//! flat regions keep the base grid.
//!
//! # Decision
//!
//! Each face is scored from the [`EdgeMap`] sampled at its corners, edge
//! midpoints and centroid (plus seven interior points for larger faces):
//!
//! ```text
//! score = 0.45 max + 0.35 (max - min) + 0.20 avg + 0.25 interior + 0.25 area
//! ```
//!
//! where `area` is the face's UV area relative to [`LARGE_FACE_AREA`], capped
//! at 1. A face splits when `score > threshold * (1 + 0.5 * depth)`, when its
//! UV area exceeds [`LARGE_FACE_AREA`], or when it is *forced*: before
//! recursion every face is checked once for a texture pixel above
//! [`FORCE_THRESHOLD`] whose centre lands inside it, and forced faces (and all
//! their children) split down to the maximum depth.
//!
//! # Closure
//!
//! A face that stays whole next to a split neighbour would leave a
//! T-junction. After recursion every such face, walls included, is replaced
//! by a fan around its centroid that runs through all the midpoints on its
//! edges, so the surface stays closed.
//!
//! # Example
//!
//! ```
//! use badge_mesh::config::{BadgeDesign, BadgeSettings, ExportConfig};
//! use badge_mesh::contour::build_contours;
//! use badge_mesh::mesh::MeshBuilder;
//! use badge_mesh::retopo::fill_faces;
//! use badge_mesh::subdivide::{adaptive_subdivide, SubdivideOptions};
//! use badge_mesh::texture::{rasterize, FontBook};
//!
//! let design = BadgeDesign::new(BadgeSettings::new(40.0, 40.0));
//! let config = ExportConfig::default().with_density(8);
//!
//! let mut builder = MeshBuilder::new();
//! let contours = build_contours(&mut builder, &design, &config);
//! fill_faces(&mut builder, &contours, &config);
//! let texture = rasterize(&design, &FontBook::new(), 64).unwrap();
//!
//! let report = adaptive_subdivide(&mut builder, &texture, &SubdivideOptions::new(0.3, 2));
//! assert_eq!(report.forced, 0);
//! ```

use std::collections::HashMap;

use nalgebra::{Point2, Point3};
use rayon::prelude::*;

use crate::config::ExportConfig;
use crate::geometry::{self, Facing};
use crate::mesh::topology::edge_key;
use crate::mesh::{Face, MeshBuilder};
use crate::texture::{EdgeMap, Texture};

/// Edge intensity above which a pixel force-marks the face containing it.
pub const FORCE_THRESHOLD: f32 = 0.05;

/// UV area above which a face always splits.
pub const LARGE_FACE_AREA: f64 = 0.05;

/// UV area above which the interior samples are taken.
pub const INTERIOR_SAMPLE_AREA: f64 = 1e-4;

const MAX_WEIGHT: f64 = 0.45;
const RANGE_WEIGHT: f64 = 0.35;
const AVERAGE_WEIGHT: f64 = 0.20;
const INTERIOR_WEIGHT: f64 = 0.25;
const AREA_WEIGHT: f64 = 0.25;
const DEPTH_FACTOR: f64 = 0.5;

/// Barycentric weights of the stratified interior samples.
const INTERIOR_SAMPLES: [[f64; 3]; 7] = [
    [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
    [2.0 / 3.0, 1.0 / 6.0, 1.0 / 6.0],
    [1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
    [1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
    [1.0 / 6.0, 5.0 / 12.0, 5.0 / 12.0],
    [5.0 / 12.0, 1.0 / 6.0, 5.0 / 12.0],
    [5.0 / 12.0, 5.0 / 12.0, 1.0 / 6.0],
];

/// Options for adaptive subdivision.
#[derive(Debug, Clone)]
pub struct SubdivideOptions {
    /// Base score threshold; lower values subdivide more.
    pub threshold: f64,

    /// Maximum recursion depth.
    pub max_depth: u32,

    /// Whether to compute force marks in parallel (default: true).
    pub parallel: bool,

    /// Whether new vertices get a color sampled from the texture.
    pub bake_colors: bool,
}

impl SubdivideOptions {
    /// Create options with the given threshold and depth.
    pub fn new(threshold: f64, max_depth: u32) -> Self {
        Self {
            threshold,
            max_depth,
            parallel: true,
            bake_colors: false,
        }
    }

    /// Options for an export, or `None` if subdivision is disabled.
    pub fn from_config(config: &ExportConfig) -> Option<Self> {
        config.subdivision_settings().map(|s| Self {
            threshold: s.threshold,
            max_depth: s.max_depth,
            parallel: config.parallel,
            bake_colors: config.for_3d_printing,
        })
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set whether new vertices get baked colors.
    pub fn with_bake_colors(mut self, bake: bool) -> Self {
        self.bake_colors = bake;
        self
    }
}

/// What [`adaptive_subdivide`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubdivisionReport {
    /// Front and back faces considered.
    pub candidates: usize,
    /// Candidates force-marked by a texture pixel.
    pub forced: usize,
    /// Quadrisections performed.
    pub splits: usize,
    /// Vertices created (midpoints and fan centres).
    pub new_vertices: usize,
    /// Faces re-triangulated to close T-junctions.
    pub closed_faces: usize,
    /// Deepest level reached.
    pub max_depth_reached: u32,
}

/// Score of a face from its UV corners; compare against the depth-scaled threshold.
pub fn split_score(uv: &[Point2<f64>; 3], edges: &EdgeMap) -> f64 {
    let [a, b, c] = uv;
    let sample = |p: Point2<f64>| edges.sample(p.x, p.y) as f64;
    let mid = |p: &Point2<f64>, q: &Point2<f64>| Point2::from((p.coords + q.coords) * 0.5);
    let centroid = Point2::from((a.coords + b.coords + c.coords) / 3.0);

    let samples = [
        sample(*a),
        sample(*b),
        sample(*c),
        sample(mid(a, b)),
        sample(mid(b, c)),
        sample(mid(c, a)),
        sample(centroid),
    ];
    let max = samples.iter().copied().fold(0.0, f64::max);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let avg = samples.iter().sum::<f64>() / samples.len() as f64;

    let area = uv_area(uv);
    let interior = if area > INTERIOR_SAMPLE_AREA {
        INTERIOR_SAMPLES
            .iter()
            .map(|w| sample(Point2::from(a.coords * w[0] + b.coords * w[1] + c.coords * w[2])))
            .fold(0.0, f64::max)
    } else {
        0.0
    };
    let area_term = (area / LARGE_FACE_AREA).min(1.0);

    MAX_WEIGHT * max
        + RANGE_WEIGHT * (max - min)
        + AVERAGE_WEIGHT * avg
        + INTERIOR_WEIGHT * interior
        + AREA_WEIGHT * area_term
}

/// Whether a pixel above [`FORCE_THRESHOLD`] has its centre inside the UV triangle.
pub fn contains_hot_pixel(uv: &[Point2<f64>; 3], edges: &EdgeMap) -> bool {
    let (w, h) = (edges.width() as f64, edges.height() as f64);
    let min_u = uv.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_u = uv.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_v = uv.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_v = uv.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    // Pixel x has its centre at u = (x + 0.5) / w; rows run top-down.
    let x0 = (min_u * w - 0.5).ceil().max(0.0) as usize;
    let x1 = (max_u * w - 0.5).floor().min(w - 1.0);
    let y0 = ((1.0 - max_v) * h - 0.5).ceil().max(0.0) as usize;
    let y1 = ((1.0 - min_v) * h - 0.5).floor().min(h - 1.0);
    if x1 < 0.0 || y1 < 0.0 {
        return false;
    }
    let (x1, y1) = (x1 as usize, y1 as usize);

    for y in y0..=y1 {
        for x in x0..=x1 {
            if edges.get(x, y) <= FORCE_THRESHOLD {
                continue;
            }
            let (u, v) = edges.pixel_uv(x, y);
            if geometry::point_in_triangle(&Point2::new(u, v), &uv[0], &uv[1], &uv[2]) {
                return true;
            }
        }
    }
    false
}

fn uv_area(uv: &[Point2<f64>; 3]) -> f64 {
    geometry::orient2d(&uv[0], &uv[1], &uv[2]).abs() * 0.5
}

/// A front/back face that ended recursion.
#[derive(Debug, Clone, Copy)]
struct Leaf {
    vertices: [usize; 3],
    facing: Facing,
    depth: u32,
}

struct Splitter<'a> {
    builder: &'a mut MeshBuilder,
    edges: &'a EdgeMap,
    texture: &'a Texture,
    options: &'a SubdivideOptions,
    midpoints: HashMap<(usize, usize), usize>,
    leaves: Vec<Leaf>,
    report: SubdivisionReport,
}

impl Splitter<'_> {
    fn uvs(&self, vertices: [usize; 3]) -> [Point2<f64>; 3] {
        vertices.map(|i| *self.builder.uv(i))
    }

    fn new_vertex(&mut self, position: Point3<f64>, uv: Point2<f64>) -> usize {
        let index = self.builder.add_vertex(position, uv);
        if self.options.bake_colors {
            self.builder.set_color(index, self.texture.sample_rgb(uv.x, uv.y));
        }
        self.report.new_vertices += 1;
        index
    }

    fn midpoint(&mut self, a: usize, b: usize) -> usize {
        let key = edge_key(a, b);
        if let Some(&m) = self.midpoints.get(&key) {
            return m;
        }
        let position = Point3::from((self.builder.position(a).coords + self.builder.position(b).coords) * 0.5);
        let uv = Point2::from((self.builder.uv(a).coords + self.builder.uv(b).coords) * 0.5);
        let m = self.new_vertex(position, uv);
        self.midpoints.insert(key, m);
        m
    }

    fn should_split(&self, vertices: [usize; 3], depth: u32, forced: bool) -> bool {
        if depth >= self.options.max_depth {
            return false;
        }
        if forced {
            return true;
        }
        let uv = self.uvs(vertices);
        if uv_area(&uv) > LARGE_FACE_AREA {
            return true;
        }
        let threshold = self.options.threshold * (1.0 + DEPTH_FACTOR * depth as f64);
        split_score(&uv, self.edges) > threshold
    }

    fn split(&mut self, vertices: [usize; 3], facing: Facing, depth: u32, forced: bool) {
        if !self.should_split(vertices, depth, forced) {
            self.report.max_depth_reached = self.report.max_depth_reached.max(depth);
            self.leaves.push(Leaf {
                vertices,
                facing,
                depth,
            });
            return;
        }

        self.report.splits += 1;
        let [a, b, c] = vertices;
        let ab = self.midpoint(a, b);
        let bc = self.midpoint(b, c);
        let ca = self.midpoint(c, a);
        for child in [[a, ab, ca], [ab, b, bc], [ca, bc, c], [ab, bc, ca]] {
            self.split(child, facing, depth + 1, forced);
        }
    }

    /// Points inserted along `a -> b` by split neighbours, in order from `a`.
    fn edge_chain(&self, a: usize, b: usize, out: &mut Vec<usize>) {
        if let Some(&m) = self.midpoints.get(&edge_key(a, b)) {
            self.edge_chain(a, m, out);
            out.push(m);
            self.edge_chain(m, b, out);
        }
    }

    /// The face's outline including inserted points, or `None` if it has none.
    fn closure_polygon(&self, vertices: [usize; 3]) -> Option<Vec<usize>> {
        let mut polygon = Vec::with_capacity(6);
        for i in 0..3 {
            let (a, b) = (vertices[i], vertices[(i + 1) % 3]);
            polygon.push(a);
            self.edge_chain(a, b, &mut polygon);
        }
        (polygon.len() > 3).then_some(polygon)
    }

    fn has_split_edge(&self, vertices: [usize; 3]) -> bool {
        (0..3).any(|i| self.midpoints.contains_key(&edge_key(vertices[i], vertices[(i + 1) % 3])))
    }

    /// Fan `polygon` around a new centroid vertex; returns the fan triangles in winding order.
    fn fan(&mut self, vertices: [usize; 3], polygon: &[usize]) -> Vec<[usize; 3]> {
        let position = Point3::from(
            vertices
                .iter()
                .map(|&v| self.builder.position(v).coords)
                .sum::<nalgebra::Vector3<f64>>()
                / 3.0,
        );
        let uv = Point2::from(
            vertices
                .iter()
                .map(|&v| self.builder.uv(v).coords)
                .sum::<nalgebra::Vector2<f64>>()
                / 3.0,
        );
        let center = self.new_vertex(position, uv);
        self.report.closed_faces += 1;

        let n = polygon.len();
        (0..n).map(|i| [center, polygon[i], polygon[(i + 1) % n]]).collect()
    }

    fn emit_leaf(&mut self, leaf: Leaf) {
        match self.closure_polygon(leaf.vertices) {
            None => {
                let [a, b, c] = leaf.vertices;
                self.builder.add_oriented_face_at_depth(a, b, c, leaf.facing, leaf.depth);
            }
            Some(polygon) => {
                for [a, b, c] in self.fan(leaf.vertices, &polygon) {
                    self.builder.add_oriented_face_at_depth(a, b, c, leaf.facing, leaf.depth);
                }
            }
        }
    }

    fn emit_wall(&mut self, face: Face) {
        match self.closure_polygon(face.vertices) {
            None => {
                self.builder.add_face(face.vertices, face.role, face.depth);
            }
            Some(polygon) => {
                for tri in self.fan(face.vertices, &polygon) {
                    self.builder.add_face(tri, face.role, face.depth);
                }
            }
        }
    }
}

/// Refine the front and back faces of `builder` where `texture` has detail.
pub fn adaptive_subdivide(
    builder: &mut MeshBuilder,
    texture: &Texture,
    options: &SubdivideOptions,
) -> SubdivisionReport {
    let edges = texture.edge_map(options.parallel);
    let candidates = builder.take_faces_where(|f| f.role.facing().is_some());

    let corner_uvs: Vec<[Point2<f64>; 3]> = candidates
        .iter()
        .map(|f| f.vertices.map(|i| *builder.uv(i)))
        .collect();
    let forced: Vec<bool> = if options.parallel {
        corner_uvs.par_iter().map(|uv| contains_hot_pixel(uv, edges)).collect()
    } else {
        corner_uvs.iter().map(|uv| contains_hot_pixel(uv, edges)).collect()
    };

    let mut splitter = Splitter {
        builder,
        edges,
        texture,
        options,
        midpoints: HashMap::new(),
        leaves: Vec::with_capacity(candidates.len()),
        report: SubdivisionReport {
            candidates: candidates.len(),
            forced: forced.iter().filter(|&&f| f).count(),
            ..SubdivisionReport::default()
        },
    };

    for (face, &force) in candidates.iter().zip(&forced) {
        // Candidates always have a facing.
        if let Some(facing) = face.role.facing() {
            splitter.split(face.vertices, facing, face.depth, force);
        }
    }

    let walls = if splitter.midpoints.is_empty() {
        Vec::new()
    } else {
        let midpoints = &splitter.midpoints;
        splitter.builder.take_faces_where(|f| {
            (0..3).any(|i| midpoints.contains_key(&edge_key(f.vertices[i], f.vertices[(i + 1) % 3])))
        })
    };
    for face in walls {
        debug_assert!(splitter.has_split_edge(face.vertices));
        splitter.emit_wall(face);
    }

    let leaves = std::mem::take(&mut splitter.leaves);
    for leaf in leaves {
        splitter.emit_leaf(leaf);
    }

    let report = splitter.report;
    log::debug!(
        "subdivision: {} candidates ({} forced), {} splits, {} T-junction fans, depth {}",
        report.candidates,
        report.forced,
        report.splits,
        report.closed_faces,
        report.max_depth_reached
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BadgeDesign, BadgeSettings, Color, HoleSettings};
    use crate::contour::{add_side_walls, build_contours, WallKind};
    use crate::mesh::{topology, BadgeMesh, FaceRole};
    use crate::retopo::fill_faces;
    use image::{Rgba, RgbaImage};

    fn line_texture() -> Texture {
        let image = RgbaImage::from_fn(256, 256, |x, _| {
            if x == 128 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        Texture::from_image(image, Color::WHITE)
    }

    fn flat_texture() -> Texture {
        Texture::from_image(RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255])), Color::WHITE)
    }

    fn base_mesh(design: &BadgeDesign, density: u32) -> MeshBuilder {
        let config = ExportConfig::default().with_density(density);
        let mut builder = MeshBuilder::new();
        let contours = build_contours(&mut builder, design, &config);
        add_side_walls(&mut builder, &contours.outer, WallKind::Outer);
        if let Some(hole) = &contours.hole {
            add_side_walls(&mut builder, hole, WallKind::Hole);
        }
        fill_faces(&mut builder, &contours, &config);
        builder
    }

    fn uv_of(mesh: &BadgeMesh, face: &Face) -> [Point2<f64>; 3] {
        face.uvs.map(|i| mesh.uvs[i])
    }

    #[test]
    fn test_flat_texture_changes_nothing() {
        let design = BadgeDesign::new(BadgeSettings::new(64.0, 64.0).with_border_radius(32.0));
        let mut builder = base_mesh(&design, 15);
        let faces_before = builder.num_faces();
        let vertices_before = builder.num_vertices();

        let report = adaptive_subdivide(&mut builder, &flat_texture(), &SubdivideOptions::new(0.3, 3));
        assert_eq!(report.forced, 0);
        assert_eq!(report.new_vertices, 0);
        assert_eq!(builder.num_faces(), faces_before);
        assert_eq!(builder.num_vertices(), vertices_before);
    }

    #[test]
    fn test_line_refines_only_nearby() {
        let design = BadgeDesign::new(BadgeSettings::new(64.0, 64.0).with_border_radius(32.0));
        let mut builder = base_mesh(&design, 15);
        let texture = line_texture();
        let options = SubdivideOptions::new(0.3, 2).with_parallel(false);

        let report = adaptive_subdivide(&mut builder, &texture, &options);
        assert!(report.forced > 0);
        assert_eq!(report.max_depth_reached, 2);

        let mesh = builder.finish();
        let front: Vec<&Face> = mesh.faces_with_role(FaceRole::Front).collect();

        // Faces covering a hot pixel reached the maximum depth.
        let hot = texture.edge_map(false).hot_pixels(FORCE_THRESHOLD);
        for &(u, v) in hot.iter().filter(|(_, v)| (0.2..0.8).contains(v)).take(8) {
            let p = Point2::new(u, v);
            for face in &front {
                let [a, b, c] = uv_of(&mesh, face);
                if geometry::point_in_triangle(&p, &a, &b, &c) {
                    assert_eq!(face.depth, 2);
                }
            }
        }

        // Interior faces well away from the line are untouched.
        for face in &front {
            let uv = uv_of(&mesh, face);
            let inside = uv.iter().all(|p| (0.15..=0.85).contains(&p.y));
            let left = uv.iter().all(|p| (0.15..=0.3).contains(&p.x));
            let right = uv.iter().all(|p| (0.7..=0.85).contains(&p.x));
            if inside && (left || right) {
                assert_eq!(face.depth, 0);
            }
        }
    }

    #[test]
    fn test_subdivided_mesh_stays_closed() {
        let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0))
            .with_hole(HoleSettings::circle(6.0, 1.0));
        let mut builder = base_mesh(&design, 40);
        assert!(topology::audit(&builder.faces().iter().map(|f| f.vertices).collect::<Vec<_>>()).is_watertight());

        let report = adaptive_subdivide(&mut builder, &line_texture(), &SubdivideOptions::new(0.3, 2));
        assert!(report.splits > 0);
        assert!(report.closed_faces > 0);

        let mesh = builder.finish();
        let audit = topology::audit(&mesh.triangles());
        assert!(audit.is_watertight());
        assert_eq!(audit.euler_characteristic(), 0);

        for face in &mesh.faces {
            if let Some(facing) = face.role.facing() {
                let [a, b, c] = mesh.triangle(face);
                assert!(geometry::is_normal_correct(&a, &b, &c, facing));
            }
        }
    }

    #[test]
    fn test_baked_colors_on_new_vertices() {
        let design = BadgeDesign::new(BadgeSettings::new(64.0, 64.0));
        let mut builder = base_mesh(&design, 10);
        let before = builder.num_vertices();

        let options = SubdivideOptions::new(0.3, 1).with_bake_colors(true);
        let report = adaptive_subdivide(&mut builder, &line_texture(), &options);
        assert!(report.new_vertices > 0);

        let mesh = builder.finish();
        assert!(mesh.vertices[before..].iter().all(|v| v.color.is_some()));
        assert!(mesh.vertices[..before].iter().all(|v| v.color.is_none()));
    }

    #[test]
    fn test_large_faces_split_without_detail() {
        // Density 1 leaves only ring triangulations, all of them large
        let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0));
        let mut builder = base_mesh(&design, 1);

        let report = adaptive_subdivide(&mut builder, &flat_texture(), &SubdivideOptions::new(0.3, 1));
        assert!(report.splits > 0);
        assert_eq!(report.forced, 0);
        assert!(topology::audit(&builder.finish().triangles()).is_watertight());
    }

    #[test]
    fn test_score_of_flat_region() {
        let edges = EdgeMap::from_raw(8, 8, vec![0.0; 64]).unwrap();
        let uv = [Point2::new(0.1, 0.1), Point2::new(0.2, 0.1), Point2::new(0.1, 0.2)];
        let expected = AREA_WEIGHT * (0.005 / LARGE_FACE_AREA);
        assert!((split_score(&uv, &edges) - expected).abs() < 1e-12);
        assert!(!contains_hot_pixel(&uv, &edges));
    }

    #[test]
    fn test_options_from_config() {
        let config = ExportConfig::default();
        assert!(SubdivideOptions::from_config(&config).is_none());

        let config = config
            .with_subdivision(crate::config::SubdivisionConfig::new(0.2, 4))
            .for_printing(true)
            .sequential();
        let options = SubdivideOptions::from_config(&config).unwrap();
        assert_eq!(options.max_depth, 4);
        assert!(options.bake_colors);
        assert!(!options.parallel);
    }
}
