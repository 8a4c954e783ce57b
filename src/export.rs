//! The export pipeline.
//!
//! One call turns a design into the files of one export:
//!
//! 1. validate the design and configuration
//! 2. build the outer and hole rings and their side walls
//! 3. fill the front and back faces
//! 4. rasterize the texture
//! 5. refine the faces where the texture has detail (if enabled)
//! 6. bake vertex colors (print mode)
//! 7. serialize OBJ, MTL and PNG (or a vertex-colored OBJ)
//!
//! Every export owns fresh buffers and a fresh texture, so nothing leaks from
//! one export into the next. Any failure aborts the whole export; nothing is
//! written to disk until [`ExportBundle::write_to_dir`] is called.
//!
//! # Example
//!
//! ```
//! use badge_mesh::config::{BadgeDesign, BadgeSettings, ExportConfig, HoleSettings};
//! use badge_mesh::export::export_badge;
//! use badge_mesh::texture::FontBook;
//!
//! let design = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0))
//!     .with_hole(HoleSettings::circle(6.0, 4.0));
//! let config = ExportConfig::default().with_density(20).with_texture_resolution(128);
//!
//! let bundle = export_badge(&design, &config, &FontBook::new()).unwrap();
//! assert!(bundle.obj.starts_with("# badge-mesh"));
//! assert!(bundle.mtl.is_some());
//! assert!(bundle.report.audit.is_watertight());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{BadgeDesign, ExportConfig};
use crate::contour::{self, WallKind};
use crate::error::Result;
use crate::io::obj::{self, ObjFlavor};
use crate::io::stl;
use crate::mesh::topology::{self, EdgeAudit};
use crate::mesh::{BadgeMesh, MeshBuilder};
use crate::progress::{Progress, Stage};
use crate::retopo::{self, RetopoReport};
use crate::subdivide::{self, SubdivideOptions, SubdivisionReport};
use crate::texture::{self, FontBook, Texture};

/// File name of the OBJ.
pub const OBJ_FILE: &str = "badge.obj";

/// File name of the material library.
pub const MTL_FILE: &str = "badge.mtl";

/// File name of the texture.
pub const TEXTURE_FILE: &str = "badge_texture.png";

/// File name of the optional STL.
pub const STL_FILE: &str = "badge.stl";

/// Counts collected while building the mesh.
#[derive(Debug, Clone)]
pub struct MeshReport {
    /// Points on the outer silhouette ring.
    pub outer_points: usize,
    /// Points on the hole ring (0 without a hole).
    pub hole_points: usize,
    /// Side-wall faces around the silhouette.
    pub outer_wall_faces: usize,
    /// Side-wall faces around the hole.
    pub hole_wall_faces: usize,
    /// Front and back fill.
    pub retopo: RetopoReport,
    /// Adaptive subdivision, if it ran.
    pub subdivision: Option<SubdivisionReport>,
    /// Faces the builder rejected as degenerate or duplicate.
    pub dropped_faces: usize,
    /// Edge audit of the final mesh.
    pub audit: EdgeAudit,
}

/// Everything one export produces.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    /// OBJ text.
    pub obj: String,
    /// MTL text (textured output only).
    pub mtl: Option<String>,
    /// PNG texture (textured output only).
    pub texture_png: Option<Vec<u8>>,
    /// The mesh the OBJ was written from.
    pub mesh: BadgeMesh,
    /// Build statistics.
    pub report: MeshReport,
}

impl ExportBundle {
    /// The files of this export as `(name, contents)`, in writing order.
    pub fn files(&self) -> Vec<(&'static str, &[u8])> {
        let mut files = vec![(OBJ_FILE, self.obj.as_bytes())];
        if let Some(mtl) = &self.mtl {
            files.push((MTL_FILE, mtl.as_bytes()));
        }
        if let Some(png) = &self.texture_png {
            files.push((TEXTURE_FILE, png.as_slice()));
        }
        files
    }

    /// Write the files into `dir`, creating it if needed.
    ///
    /// If any write fails, the files already written by this call are removed
    /// before the error is returned.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for (name, contents) in self.files() {
            let path = dir.join(name);
            if let Err(e) = fs::write(&path, contents) {
                for done in &written {
                    // Best effort; the write error is what gets reported.
                    let _ = fs::remove_file(done);
                }
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
            written.push(path);
        }
        log::info!("wrote {} file(s) to {}", written.len(), dir.display());
        Ok(written)
    }

    /// Write the mesh as binary STL into `dir`.
    pub fn write_stl<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(STL_FILE);
        stl::save(&self.mesh, &path)?;
        Ok(path)
    }
}

/// Build the mesh of a design, sampling `texture` for subdivision and colors.
pub fn build_mesh(
    design: &BadgeDesign,
    config: &ExportConfig,
    texture: &Texture,
) -> Result<(BadgeMesh, MeshReport)> {
    design.validate()?;
    config.validate()?;
    let mut builder = MeshBuilder::new();
    let partial = build_geometry(&mut builder, design, config, &Progress::none());
    Ok(finish_mesh(builder, partial, config, texture, &Progress::none()))
}

/// Export a design.
pub fn export_badge(design: &BadgeDesign, config: &ExportConfig, fonts: &FontBook) -> Result<ExportBundle> {
    export_badge_with_progress(design, config, fonts, &Progress::none())
}

/// Export a design, reporting each stage to `progress`.
pub fn export_badge_with_progress(
    design: &BadgeDesign,
    config: &ExportConfig,
    fonts: &FontBook,
    progress: &Progress,
) -> Result<ExportBundle> {
    progress.stage(Stage::Validate);
    design.validate()?;
    config.validate()?;

    let mut builder = MeshBuilder::new();
    let partial = build_geometry(&mut builder, design, config, progress);

    progress.stage(Stage::Texture);
    let texture = texture::rasterize(design, fonts, config.texture_resolution)?;

    let (mesh, report) = finish_mesh(builder, partial, config, &texture, progress);

    progress.stage(Stage::Serialize);
    let bundle = if config.for_3d_printing {
        ExportBundle {
            obj: obj::obj_string(&mesh, ObjFlavor::VertexColor, MTL_FILE)?,
            mtl: None,
            texture_png: None,
            mesh,
            report,
        }
    } else {
        ExportBundle {
            obj: obj::obj_string(&mesh, ObjFlavor::Textured, MTL_FILE)?,
            mtl: Some(obj::mtl_string(TEXTURE_FILE)),
            texture_png: Some(texture.encode_png()?),
            mesh,
            report,
        }
    };

    log::info!(
        "exported badge: {} vertices, {} faces{}",
        bundle.mesh.num_vertices(),
        bundle.mesh.num_faces(),
        if bundle.report.audit.is_watertight() { ", watertight" } else { "" }
    );
    Ok(bundle)
}

/// Output of the texture-independent stages.
struct Geometry {
    outer_points: usize,
    hole_points: usize,
    outer_wall_faces: usize,
    hole_wall_faces: usize,
    retopo: RetopoReport,
}

fn build_geometry(
    builder: &mut MeshBuilder,
    design: &BadgeDesign,
    config: &ExportConfig,
    progress: &Progress,
) -> Geometry {
    progress.stage(Stage::Contours);
    let contours = contour::build_contours(builder, design, config);
    let outer_wall_faces = contour::add_side_walls(builder, &contours.outer, WallKind::Outer);
    let hole_wall_faces = contours
        .hole
        .as_ref()
        .map(|ring| contour::add_side_walls(builder, ring, WallKind::Hole))
        .unwrap_or(0);

    progress.stage(Stage::Retopology);
    let retopo = retopo::fill_faces(builder, &contours, config);
    log::info!(
        "filled faces: {} + {} triangles",
        retopo.front.grid_triangles + retopo.front.band_triangles + retopo.front.repair_triangles,
        retopo.back.grid_triangles + retopo.back.band_triangles + retopo.back.repair_triangles
    );

    Geometry {
        outer_points: contours.outer.len(),
        hole_points: contours.hole.as_ref().map_or(0, |h| h.len()),
        outer_wall_faces,
        hole_wall_faces,
        retopo,
    }
}

fn finish_mesh(
    mut builder: MeshBuilder,
    geometry: Geometry,
    config: &ExportConfig,
    texture: &Texture,
    progress: &Progress,
) -> (BadgeMesh, MeshReport) {
    progress.stage(Stage::Subdivision);
    let subdivision = SubdivideOptions::from_config(config).map(|options| {
        let report = subdivide::adaptive_subdivide(&mut builder, texture, &options);
        log::info!(
            "subdivided {} face(s), {} forced",
            report.splits,
            report.forced
        );
        report
    });

    progress.stage(Stage::Colors);
    if config.for_3d_printing {
        for i in 0..builder.num_vertices() {
            let uv = *builder.uv(i);
            builder.set_color(i, texture.sample_rgb(uv.x, uv.y));
        }
    }

    let dropped_faces = builder.num_dropped();
    let mesh = builder.finish();
    let audit = topology::audit(&mesh.triangles());
    if !audit.is_watertight() {
        log::warn!(
            "mesh is not watertight: {} boundary edge(s), {} non-manifold edge(s)",
            audit.boundary_edges.len(),
            audit.non_manifold_edges.len()
        );
    }

    let report = MeshReport {
        outer_points: geometry.outer_points,
        hole_points: geometry.hole_points,
        outer_wall_faces: geometry.outer_wall_faces,
        hole_wall_faces: geometry.hole_wall_faces,
        retopo: geometry.retopo,
        subdivision,
        dropped_faces,
        audit,
    };
    (mesh, report)
}
