//! Core mesh data structures.
//!
//! The pipeline accumulates geometry in a [`MeshBuilder`], an explicit
//! context handed by `&mut` to each stage (contours, retopology,
//! subdivision). When the last stage is done the builder is frozen into a
//! [`BadgeMesh`], which the serializers consume.
//!
//! # Indices
//!
//! Vertex and UV indices are 0-based in memory and written 1-based by the
//! OBJ serializer. Every vertex is created together with its own UV, so a
//! face's UV indices always equal its vertex indices.
//!
//! # Example
//!
//! ```
//! use badge_mesh::geometry::Facing;
//! use badge_mesh::mesh::MeshBuilder;
//! use nalgebra::{Point2, Point3};
//!
//! let mut builder = MeshBuilder::new();
//! let a = builder.add_vertex(Point3::new(0.0, 0.0, 1.0), Point2::new(0.0, 0.0));
//! let b = builder.add_vertex(Point3::new(1.0, 0.0, 1.0), Point2::new(1.0, 0.0));
//! let c = builder.add_vertex(Point3::new(0.0, 1.0, 1.0), Point2::new(0.0, 1.0));
//!
//! // Clockwise input is flipped so the face looks toward +z.
//! assert!(builder.add_oriented_face(a, c, b, Facing::Front));
//! let mesh = builder.finish();
//! assert_eq!(mesh.faces[0].vertices, [a, b, c]);
//! ```

mod builder;
pub mod topology;

pub use builder::{BadgeMesh, Face, FaceRole, MeshBuilder, Vertex};
