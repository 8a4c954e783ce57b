//! Mesh file I/O.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ | Textured (with MTL) or vertex-colored |
//! | STL | `.stl` | ✓ | ✓ | Binary output, geometry only |
//!
//! # Usage
//!
//! ```no_run
//! use badge_mesh::io::load;
//! use badge_mesh::mesh::topology;
//!
//! let data = load("out/badge.obj").unwrap();
//! let audit = topology::audit(&data.triangles());
//! println!("watertight: {}", audit.is_watertight());
//! ```

pub mod obj;
pub mod stl;

use std::path::Path;

use crate::error::{BadgeError, Result};

pub use obj::{mtl_string, obj_string, parse_obj, ObjData, ObjFace, ObjFlavor};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ format.
    Obj,
    /// STL (stereolithography) format.
    Stl,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            "stl" => Some(Format::Stl),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

/// Load mesh geometry from a file with automatic format detection.
///
/// The format is determined by the file extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ObjData> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| BadgeError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })?;

    match format {
        Format::Obj => obj::load(path),
        Format::Stl => stl::load(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("a/badge.OBJ"), Some(Format::Obj));
        assert_eq!(Format::from_path("badge.stl"), Some(Format::Stl));
        assert_eq!(Format::from_path("badge.ply"), None);
        assert_eq!(Format::from_path("badge"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load("model.ply").unwrap_err();
        assert!(matches!(err, BadgeError::UnsupportedFormat { ref extension } if extension == "ply"));
    }
}
