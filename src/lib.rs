//! # badge-mesh
//!
//! Turns a flat badge design (size, rounded corners, lanyard hole, photo and
//! text) into a watertight, texturable triangle mesh.
//!
//! The output is a Wavefront OBJ with an MTL material and a PNG texture, or a
//! vertex-colored OBJ for 3D printing.
//!
//! ## Features
//!
//! - **Closed meshes**: front and back faces are filled with a regular grid
//!   and stitched exactly to the silhouette and hole rings, which the side
//!   walls share
//! - **Texture-driven detail**: an edge map of the rasterized design drives
//!   adaptive subdivision, so text and photo edges get small triangles
//! - **Deterministic output**: identical inputs give byte-identical files
//! - **Editor-compatible input**: designs deserialize from the editor's JSON
//!
//! ## Quick Start
//!
//! ```
//! use badge_mesh::prelude::*;
//!
//! let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0))
//!     .with_hole(HoleSettings::circle(6.0, 4.0));
//! let config = ExportConfig::default()
//!     .with_thickness(2.0)
//!     .with_density(20)
//!     .with_texture_resolution(128);
//!
//! let bundle = export_badge(&design, &config, &FontBook::new()).unwrap();
//! assert!(bundle.obj.contains("mtllib badge.mtl"));
//! assert!(bundle.texture_png.is_some());
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! contour ──► retopo ──► subdivide ──► io::obj
//!                           ▲
//! texture ──────────────────┘
//! ```
//!
//! Each stage appends to one [`mesh::MeshBuilder`] owned by the export.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod contour;
pub mod error;
pub mod export;
pub mod geometry;
pub mod io;
pub mod mesh;
pub mod progress;
pub mod retopo;
pub mod subdivide;
pub mod texture;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use badge_mesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{
        BadgeDesign, BadgeSettings, Color, DesignFile, ExportConfig, HoleSettings, HoleShape,
        ImageSettings, MeshDensity, SubdivisionConfig, TextRun,
    };
    pub use crate::error::{BadgeError, Result};
    pub use crate::export::{export_badge, export_badge_with_progress, ExportBundle};
    pub use crate::geometry::Facing;
    pub use crate::mesh::{BadgeMesh, Face, FaceRole, MeshBuilder, Vertex};
    pub use crate::progress::Progress;
    pub use crate::texture::FontBook;
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::mesh::topology;

    #[test]
    fn test_closed_badge() {
        let design = BadgeDesign::new(BadgeSettings::new(54.0, 86.0).with_border_radius(3.5));
        let config = ExportConfig::default()
            .with_density(12)
            .with_texture_resolution(64);

        let bundle = export_badge(&design, &config, &FontBook::new()).unwrap();
        let audit = topology::audit(&bundle.mesh.triangles());

        assert!(audit.is_watertight());
        // A closed surface without holes
        assert_eq!(audit.euler_characteristic(), 2);
    }
}
