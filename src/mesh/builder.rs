//! Mesh accumulation context.
//!
//! [`MeshBuilder`] owns the vertex, UV and face buffers of one export. Faces
//! that repeat a vertex index, repeat an already emitted triangle, or have
//! zero area are dropped silently: they arise routinely where stitching
//! strategies meet and are not errors.

use std::collections::HashSet;

use nalgebra::{Point2, Point3};

use crate::geometry::{self, Facing, MIN_ORIENTED_AREA};

/// A mesh vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Position in mm, badge-centred.
    pub position: Point3<f64>,
    /// Vertex color in `[0, 1]`, only filled for 3D-print output.
    pub color: Option<[f32; 3]>,
}

/// What part of the badge a face belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceRole {
    /// Printable front face (+z).
    Front,
    /// Back face (-z).
    Back,
    /// Wall around the outer silhouette, facing outward.
    OuterWall,
    /// Wall around the hole, facing into the hole.
    HoleWall,
}

impl FaceRole {
    /// The z-facing of front/back faces; walls have none.
    pub fn facing(self) -> Option<Facing> {
        match self {
            FaceRole::Front => Some(Facing::Front),
            FaceRole::Back => Some(Facing::Back),
            FaceRole::OuterWall | FaceRole::HoleWall => None,
        }
    }

    /// The role of a face that points the given way.
    pub fn from_facing(facing: Facing) -> Self {
        match facing {
            Facing::Front => FaceRole::Front,
            Facing::Back => FaceRole::Back,
        }
    }
}

/// A triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    /// Vertex indices (0-based), pairwise distinct.
    pub vertices: [usize; 3],
    /// UV indices (0-based), pairwise distinct.
    pub uvs: [usize; 3],
    /// Which part of the badge this face belongs to.
    pub role: FaceRole,
    /// Adaptive subdivision level this face was produced at.
    pub depth: u32,
}

/// A finished badge mesh.
#[derive(Debug, Clone, Default)]
pub struct BadgeMesh {
    /// Vertex buffer.
    pub vertices: Vec<Vertex>,
    /// UV buffer, parallel to `vertices`.
    pub uvs: Vec<Point2<f64>>,
    /// Triangles.
    pub faces: Vec<Face>,
}

impl BadgeMesh {
    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Whether every vertex carries a color.
    pub fn has_colors(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.color.is_some())
    }

    /// Iterate the faces with the given role.
    pub fn faces_with_role(&self, role: FaceRole) -> impl Iterator<Item = &Face> + '_ {
        self.faces.iter().filter(move |f| f.role == role)
    }

    /// Corner positions of a face.
    pub fn triangle(&self, face: &Face) -> [Point3<f64>; 3] {
        face.vertices.map(|i| self.vertices[i].position)
    }

    /// Surface area of a face.
    pub fn face_area(&self, face: &Face) -> f64 {
        let [a, b, c] = self.triangle(face);
        geometry::triangle_normal(&a, &b, &c).norm() * 0.5
    }

    /// Total area of the faces with the given role, projected onto the xy plane.
    pub fn projected_area(&self, role: FaceRole) -> f64 {
        self.faces_with_role(role)
            .map(|f| {
                let [a, b, c] = self.triangle(f);
                geometry::triangle_normal(&a, &b, &c).z.abs() * 0.5
            })
            .sum()
    }

    /// Vertex index triples of all faces.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        self.faces.iter().map(|f| f.vertices).collect()
    }
}

/// Accumulates one export's geometry.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<Vertex>,
    uvs: Vec<Point2<f64>>,
    faces: Vec<Face>,
    face_keys: HashSet<[usize; 3]>,
    dropped: usize,
}

impl MeshBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty builder with room for the given element counts.
    pub fn with_capacity(vertices: usize, faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            uvs: Vec::with_capacity(vertices),
            faces: Vec::with_capacity(faces),
            face_keys: HashSet::with_capacity(faces),
            dropped: 0,
        }
    }

    /// Add a vertex and its UV; returns the shared index.
    pub fn add_vertex(&mut self, position: Point3<f64>, uv: Point2<f64>) -> usize {
        let index = self.vertices.len();
        self.vertices.push(Vertex {
            position,
            color: None,
        });
        self.uvs.push(uv);
        index
    }

    /// Number of vertices added so far.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces kept so far.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of faces rejected as degenerate or duplicate.
    pub fn num_dropped(&self) -> usize {
        self.dropped
    }

    /// Position of a vertex.
    #[inline]
    pub fn position(&self, index: usize) -> &Point3<f64> {
        &self.vertices[index].position
    }

    /// UV of a vertex.
    #[inline]
    pub fn uv(&self, index: usize) -> &Point2<f64> {
        &self.uvs[index]
    }

    /// Faces kept so far.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Backfill a vertex color.
    pub fn set_color(&mut self, index: usize, color: [f32; 3]) {
        self.vertices[index].color = Some(color);
    }

    /// Add a face with the given winding.
    ///
    /// Returns `false` (and keeps nothing) when two indices coincide or the
    /// same triangle was already emitted.
    pub fn add_face(&mut self, vertices: [usize; 3], role: FaceRole, depth: u32) -> bool {
        let [a, b, c] = vertices;
        if a == b || b == c || a == c {
            self.dropped += 1;
            return false;
        }

        let mut key = vertices;
        key.sort_unstable();
        if !self.face_keys.insert(key) {
            self.dropped += 1;
            return false;
        }

        self.faces.push(Face {
            vertices,
            uvs: vertices,
            role,
            depth,
        });
        true
    }

    /// Add a front or back face, swapping `b` and `c` if the winding is wrong.
    ///
    /// Faces with (near) zero projected area are dropped.
    pub fn add_oriented_face(&mut self, a: usize, b: usize, c: usize, facing: Facing) -> bool {
        self.add_oriented_face_at_depth(a, b, c, facing, 0)
    }

    pub(crate) fn add_oriented_face_at_depth(
        &mut self,
        a: usize,
        b: usize,
        c: usize,
        facing: Facing,
        depth: u32,
    ) -> bool {
        if a == b || b == c || a == c {
            self.dropped += 1;
            return false;
        }

        let (pa, pb, pc) = (self.position(a), self.position(b), self.position(c));
        let nz = geometry::triangle_normal(pa, pb, pc).z;
        if nz.abs() < MIN_ORIENTED_AREA {
            self.dropped += 1;
            return false;
        }

        let vertices = if geometry::is_normal_correct(pa, pb, pc, facing) {
            [a, b, c]
        } else {
            [a, c, b]
        };
        self.add_face(vertices, FaceRole::from_facing(facing), depth)
    }

    /// Remove and return every face matching `predicate`.
    ///
    /// The removed faces may be re-added afterwards (subdivision does this).
    pub(crate) fn take_faces_where<P>(&mut self, mut predicate: P) -> Vec<Face>
    where
        P: FnMut(&Face) -> bool,
    {
        let (taken, kept): (Vec<Face>, Vec<Face>) =
            std::mem::take(&mut self.faces).into_iter().partition(|f| predicate(f));
        self.faces = kept;
        for face in &taken {
            let mut key = face.vertices;
            key.sort_unstable();
            self.face_keys.remove(&key);
        }
        taken
    }

    /// Freeze the buffers into a mesh.
    pub fn finish(self) -> BadgeMesh {
        BadgeMesh {
            vertices: self.vertices,
            uvs: self.uvs,
            faces: self.faces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_triangle(z: f64) -> (MeshBuilder, [usize; 3]) {
        let mut builder = MeshBuilder::new();
        let a = builder.add_vertex(Point3::new(0.0, 0.0, z), Point2::new(0.0, 0.0));
        let b = builder.add_vertex(Point3::new(1.0, 0.0, z), Point2::new(1.0, 0.0));
        let c = builder.add_vertex(Point3::new(0.0, 1.0, z), Point2::new(0.0, 1.0));
        (builder, [a, b, c])
    }

    #[test]
    fn test_add_vertex_shares_index() {
        let (builder, [a, b, c]) = builder_with_triangle(0.0);
        assert_eq!([a, b, c], [0, 1, 2]);
        assert_eq!(builder.num_vertices(), 3);
        assert_eq!(builder.uv(1), &Point2::new(1.0, 0.0));
    }

    #[test]
    fn test_degenerate_face_dropped() {
        let (mut builder, [a, b, _]) = builder_with_triangle(0.0);
        assert!(!builder.add_face([a, a, b], FaceRole::Front, 0));
        assert_eq!(builder.num_faces(), 0);
        assert_eq!(builder.num_dropped(), 1);
    }

    #[test]
    fn test_duplicate_face_dropped() {
        let (mut builder, [a, b, c]) = builder_with_triangle(0.0);
        assert!(builder.add_face([a, b, c], FaceRole::Front, 0));
        // Same vertex set in another rotation
        assert!(!builder.add_face([b, c, a], FaceRole::Front, 0));
        assert_eq!(builder.num_faces(), 1);
    }

    #[test]
    fn test_oriented_face_flips_for_back() {
        let (mut builder, [a, b, c]) = builder_with_triangle(-1.0);
        assert!(builder.add_oriented_face(a, b, c, Facing::Back));

        let mesh = builder.finish();
        let face = &mesh.faces[0];
        assert_eq!(face.vertices, [a, c, b]);
        assert_eq!(face.uvs, face.vertices);
        assert_eq!(face.role, FaceRole::Back);

        let [pa, pb, pc] = mesh.triangle(face);
        assert!(geometry::is_normal_correct(&pa, &pb, &pc, Facing::Back));
    }

    #[test]
    fn test_zero_area_oriented_face_dropped() {
        let mut builder = MeshBuilder::new();
        let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0), Point2::origin());
        let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0), Point2::origin());
        let c = builder.add_vertex(Point3::new(2.0, 0.0, 0.0), Point2::origin());
        assert!(!builder.add_oriented_face(a, b, c, Facing::Front));
    }

    #[test]
    fn test_take_faces_allows_readding() {
        let (mut builder, [a, b, c]) = builder_with_triangle(0.0);
        builder.add_face([a, b, c], FaceRole::Front, 0);

        let taken = builder.take_faces_where(|f| f.role == FaceRole::Front);
        assert_eq!(taken.len(), 1);
        assert_eq!(builder.num_faces(), 0);
        assert!(builder.add_face([a, b, c], FaceRole::Front, 1));
    }

    #[test]
    fn test_projected_area() {
        let (mut builder, [a, b, c]) = builder_with_triangle(1.0);
        builder.add_oriented_face(a, b, c, Facing::Front);
        let mesh = builder.finish();

        assert!((mesh.projected_area(FaceRole::Front) - 0.5).abs() < 1e-12);
        assert!((mesh.face_area(&mesh.faces[0]) - 0.5).abs() < 1e-12);
        assert_eq!(mesh.projected_area(FaceRole::Back), 0.0);
        assert!(!mesh.has_colors());
    }
}
