//! Retopology: filling the front and back faces.
//!
//! Each face is built in four steps:
//!
//! 1. **Grid**: an `(N+1) x (N+1)` lattice over the badge is sampled; nodes
//!    inside the silhouette, outside the hole and clear of both by a margin
//!    become vertices, and cells are split along their shorter diagonal.
//!    Cell triangles that overlap the hole are left out.
//! 2. **Frontier**: the boundary loops of the cell triangles are extracted.
//! 3. **Stitching**: the band between the rings and the frontier is closed by
//!    zipping or, failing that, by a constrained Delaunay triangulation (see
//!    [`stitch`] and [`cdt`]).
//! 4. **Gap repair**: any open edge that is not a ring edge is found and
//!    closed (see [`corners`]).
//!
//! All triangles are produced counter-clockwise in badge space and routed
//! through [`MeshBuilder::add_oriented_face`], which flips them for the back.
//!
//! # Example
//!
//! ```
//! use badge_mesh::config::{BadgeDesign, BadgeSettings, ExportConfig};
//! use badge_mesh::contour::build_contours;
//! use badge_mesh::mesh::{FaceRole, MeshBuilder};
//! use badge_mesh::retopo::fill_faces;
//!
//! let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0));
//! let config = ExportConfig::default().with_density(10);
//!
//! let mut builder = MeshBuilder::new();
//! let contours = build_contours(&mut builder, &design, &config);
//! let report = fill_faces(&mut builder, &contours, &config);
//!
//! assert!(report.front.grid_nodes > 0);
//! let mesh = builder.finish();
//! assert!(mesh.faces_with_role(FaceRole::Back).count() > 0);
//! ```

pub mod cdt;
pub mod corners;
pub mod grid;
pub mod spatial_hash;
pub mod stitch;

use crate::config::ExportConfig;
use crate::contour::Contours;
use crate::geometry::Facing;
use crate::mesh::MeshBuilder;

pub use grid::{FaceGrid, GridSpec, MeshNode};
pub use spatial_hash::SpatialHash;
pub use stitch::{RingSide, Stitching};

/// What happened while filling one face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceReport {
    /// Which face.
    pub facing: Facing,
    /// Valid grid nodes.
    pub grid_nodes: usize,
    /// Cell triangles.
    pub grid_triangles: usize,
    /// Cell triangles left out because they overlap the hole.
    pub blocked_triangles: usize,
    /// Triangles closing the band.
    pub band_triangles: usize,
    /// How the band was closed.
    pub strategy: Stitching,
    /// Triangles added by gap repair.
    pub repair_triangles: usize,
    /// Triangles rejected by the builder.
    pub dropped: usize,
}

/// Reports for both faces.
#[derive(Debug, Clone, PartialEq)]
pub struct RetopoReport {
    /// The printable front face.
    pub front: FaceReport,
    /// The back face.
    pub back: FaceReport,
}

/// Fill both faces of the badge.
pub fn fill_faces(builder: &mut MeshBuilder, contours: &Contours, config: &ExportConfig) -> RetopoReport {
    RetopoReport {
        front: fill_face(builder, contours, config, Facing::Front),
        back: fill_face(builder, contours, config, Facing::Back),
    }
}

/// Fill one face: grid, stitching, gap repair.
pub fn fill_face(
    builder: &mut MeshBuilder,
    contours: &Contours,
    config: &ExportConfig,
    facing: Facing,
) -> FaceReport {
    let spec = GridSpec::new(contours.width, contours.height, config.mesh_density.density);
    let z = facing.z_sign() * config.thickness / 2.0;

    let grid = grid::sample_grid(builder, contours, facing, spec, z);

    let outer = RingSide {
        vertices: contours.outer.side(facing),
        points: &contours.outer.points,
    };
    let hole = contours.hole.as_ref().map(|ring| RingSide {
        vertices: ring.side(facing),
        points: &ring.points,
    });

    let stitched = stitch::stitch_face(builder, &grid, outer, hole);
    if stitched.rejected_constraints > 0 {
        log::warn!(
            "{:?} face: {} band edge(s) could not be constrained",
            facing,
            stitched.rejected_constraints
        );
    }

    let mut triangles = grid.triangles.clone();
    triangles.extend(stitched.triangles.iter().copied());

    let gaps = corners::repair_gaps(&triangles, outer, hole, |v| builder.position(v).xy());
    triangles.extend(gaps.triangles.iter().copied());

    let before = builder.num_faces();
    for [a, b, c] in triangles {
        builder.add_oriented_face(a, b, c, facing);
    }
    let kept = builder.num_faces() - before;
    let total = grid.triangles.len() + stitched.triangles.len() + gaps.triangles.len();

    let report = FaceReport {
        facing,
        grid_nodes: grid.num_grid_nodes(),
        grid_triangles: grid.triangles.len(),
        blocked_triangles: grid.blocked_triangles,
        band_triangles: stitched.triangles.len(),
        strategy: stitched.strategy,
        repair_triangles: gaps.triangles.len(),
        dropped: total - kept,
    };
    log::debug!(
        "{:?} face: {} nodes, {} grid + {} band ({:?}) + {} repair triangles, {} dropped",
        facing,
        report.grid_nodes,
        report.grid_triangles,
        report.band_triangles,
        report.strategy,
        report.repair_triangles,
        report.dropped
    );
    report
}
