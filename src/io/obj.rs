//! Wavefront OBJ and MTL support.
//!
//! Two flavors are written from one [`BadgeMesh`]:
//!
//! - [`ObjFlavor::Textured`]: `mtllib`/`usemtl` header, one `vt` per vertex and
//!   `f v/vt v/vt v/vt` faces, paired with [`mtl_string`] and the PNG texture.
//! - [`ObjFlavor::VertexColor`]: `v x y z r g b` lines and `f v v v` faces, no
//!   UVs and no material, for 3D printing.
//!
//! Indices are written 1-based. Numbers use fixed precision so identical
//! meshes produce byte-identical files.
//!
//! The reader ([`parse_obj`]) understands the subset this crate writes plus
//! the common variations (`v/vt/vn`, `v//vn`, negative indices, polygons,
//! which are fan-triangulated).
//!
//! # Example
//!
//! ```
//! use badge_mesh::io::obj::{obj_string, parse_obj, ObjFlavor};
//! use badge_mesh::mesh::{FaceRole, MeshBuilder};
//! use nalgebra::{Point2, Point3};
//!
//! let mut builder = MeshBuilder::new();
//! let a = builder.add_vertex(Point3::new(0.0, 0.0, 1.0), Point2::new(0.0, 0.0));
//! let b = builder.add_vertex(Point3::new(1.0, 0.0, 1.0), Point2::new(1.0, 0.0));
//! let c = builder.add_vertex(Point3::new(0.0, 1.0, 1.0), Point2::new(0.0, 1.0));
//! builder.add_face([a, b, c], FaceRole::Front, 0);
//!
//! let text = obj_string(&builder.finish(), ObjFlavor::Textured, "badge.mtl").unwrap();
//! assert!(text.contains("f 1/1 2/2 3/3"));
//!
//! let parsed = parse_obj(&text).unwrap();
//! assert_eq!(parsed.faces.len(), 1);
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use nalgebra::{Point2, Point3};

use crate::error::{BadgeError, Result};
use crate::geometry::{self, Facing};
use crate::mesh::BadgeMesh;

/// Name of the single material.
pub const MATERIAL_NAME: &str = "BadgeMaterial";

/// Color written for vertices that have none in vertex-color output.
const FALLBACK_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Which kind of OBJ to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjFlavor {
    /// UVs plus a material referencing the texture.
    Textured,
    /// Per-vertex colors, no UVs or material.
    VertexColor,
}

/// Write `mesh` as OBJ text.
///
/// `mtl_file` is the `mtllib` reference and is ignored for
/// [`ObjFlavor::VertexColor`].
pub fn write_obj<W: Write>(mesh: &BadgeMesh, flavor: ObjFlavor, mtl_file: &str, writer: &mut W) -> Result<()> {
    writeln!(writer, "# badge-mesh")?;
    writeln!(
        writer,
        "# {} vertices, {} faces",
        mesh.num_vertices(),
        mesh.num_faces()
    )?;
    if flavor == ObjFlavor::Textured {
        writeln!(writer, "mtllib {}", mtl_file)?;
    }
    writeln!(writer, "o Badge")?;

    for vertex in &mesh.vertices {
        let p = vertex.position;
        match flavor {
            ObjFlavor::Textured => writeln!(writer, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z)?,
            ObjFlavor::VertexColor => {
                let [r, g, b] = vertex.color.unwrap_or(FALLBACK_COLOR);
                writeln!(
                    writer,
                    "v {:.6} {:.6} {:.6} {:.4} {:.4} {:.4}",
                    p.x, p.y, p.z, r, g, b
                )?;
            }
        }
    }

    if flavor == ObjFlavor::Textured {
        for uv in &mesh.uvs {
            writeln!(writer, "vt {:.6} {:.6}", uv.x, uv.y)?;
        }
        writeln!(writer, "usemtl {}", MATERIAL_NAME)?;
    }

    for face in &mesh.faces {
        let [a, b, c] = face.vertices.map(|i| i + 1);
        match flavor {
            ObjFlavor::Textured => {
                let [ta, tb, tc] = face.uvs.map(|i| i + 1);
                writeln!(writer, "f {}/{} {}/{} {}/{}", a, ta, b, tb, c, tc)?;
            }
            ObjFlavor::VertexColor => writeln!(writer, "f {} {} {}", a, b, c)?,
        }
    }

    Ok(())
}

/// Render `mesh` as an OBJ string.
pub fn obj_string(mesh: &BadgeMesh, flavor: ObjFlavor, mtl_file: &str) -> Result<String> {
    let mut buf = Vec::with_capacity(64 * (mesh.num_vertices() + mesh.num_faces()));
    write_obj(mesh, flavor, mtl_file, &mut buf)?;
    String::from_utf8(buf).map_err(|e| BadgeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// The material file: a plain Lambertian material using `texture_file` as diffuse map.
pub fn mtl_string(texture_file: &str) -> String {
    format!(
        "# badge-mesh\n\
         newmtl {MATERIAL_NAME}\n\
         Ka 1.000000 1.000000 1.000000\n\
         Kd 1.000000 1.000000 1.000000\n\
         Ks 0.000000 0.000000 0.000000\n\
         d 1.0\n\
         illum 1\n\
         map_Kd {texture_file}\n"
    )
}

/// A triangle read from an OBJ file (0-based indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjFace {
    /// Vertex indices.
    pub vertices: [usize; 3],
    /// UV indices, if the face had them.
    pub uvs: Option<[usize; 3]>,
}

/// Geometry read back from an OBJ (or STL) file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjData {
    /// Vertex positions.
    pub positions: Vec<Point3<f64>>,
    /// Vertex colors, parallel to `positions`.
    pub colors: Vec<Option<[f32; 3]>>,
    /// Texture coordinates.
    pub uvs: Vec<Point2<f64>>,
    /// Triangles.
    pub faces: Vec<ObjFace>,
    /// `mtllib` references.
    pub material_libs: Vec<String>,
    /// `usemtl` names.
    pub materials: Vec<String>,
}

impl ObjData {
    /// Whether every vertex has a color.
    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty() && self.colors.iter().all(Option::is_some)
    }

    /// Vertex index triples.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        self.faces.iter().map(|f| f.vertices).collect()
    }

    /// Projected area of the faces lying in the front (`z > 0`) or back
    /// (`z < 0`) plane whose normals point the matching way.
    pub fn facing_area(&self, facing: Facing) -> f64 {
        let sign = facing.z_sign();
        self.faces
            .iter()
            .filter_map(|f| {
                let [a, b, c] = f.vertices.map(|i| self.positions[i]);
                if [a, b, c].iter().any(|p| p.z * sign <= 0.0) {
                    return None;
                }
                let nz = geometry::triangle_normal(&a, &b, &c).z;
                (nz * sign > 0.0).then_some(nz.abs() * 0.5)
            })
            .sum()
    }
}

fn parse_error<M: Into<String>>(line: usize, message: M) -> BadgeError {
    BadgeError::ObjParse {
        line,
        message: message.into(),
    }
}

fn parse_floats<'a, I>(tokens: I, line: usize) -> Result<Vec<f64>>
where
    I: Iterator<Item = &'a str>,
{
    tokens
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| parse_error(line, format!("invalid number {t:?}")))
        })
        .collect()
}

/// Resolve a 1-based (or negative, relative) OBJ index against `count` elements.
fn resolve_index(token: &str, count: usize, what: &str, line: usize) -> Result<usize> {
    let raw: i64 = token
        .parse()
        .map_err(|_| parse_error(line, format!("invalid {what} index {token:?}")))?;
    let index = match raw {
        0 => return Err(parse_error(line, format!("{what} index 0 is not valid"))),
        r if r > 0 => (r - 1) as usize,
        r => {
            let back = r.unsigned_abs() as usize;
            if back > count {
                return Err(parse_error(line, format!("{what} index {r} out of range")));
            }
            count - back
        }
    };
    if index >= count {
        return Err(parse_error(
            line,
            format!("{what} index {raw} out of range ({count} defined)"),
        ));
    }
    Ok(index)
}

/// Parse OBJ text.
pub fn parse_obj(text: &str) -> Result<ObjData> {
    let mut data = ObjData::default();

    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        let mut tokens = content.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let values = parse_floats(tokens, line)?;
                match values.len() {
                    3 | 4 => data.colors.push(None),
                    6 | 7 => data
                        .colors
                        .push(Some([values[3] as f32, values[4] as f32, values[5] as f32])),
                    n => return Err(parse_error(line, format!("vertex has {n} values"))),
                }
                data.positions.push(Point3::new(values[0], values[1], values[2]));
            }
            "vt" => {
                let values = parse_floats(tokens, line)?;
                if values.len() < 2 {
                    return Err(parse_error(line, "texture coordinate needs u and v"));
                }
                data.uvs.push(Point2::new(values[0], values[1]));
            }
            "f" => {
                let mut corners = Vec::with_capacity(3);
                for token in tokens {
                    let mut parts = token.split('/');
                    let v = resolve_index(parts.next().unwrap_or(""), data.positions.len(), "vertex", line)?;
                    let vt = match parts.next() {
                        Some(t) if !t.is_empty() => Some(resolve_index(t, data.uvs.len(), "uv", line)?),
                        _ => None,
                    };
                    corners.push((v, vt));
                }
                if corners.len() < 3 {
                    return Err(parse_error(line, format!("face has {} corners", corners.len())));
                }
                for i in 1..corners.len() - 1 {
                    let tri = [corners[0], corners[i], corners[i + 1]];
                    let uvs = match tri.map(|(_, t)| t) {
                        [Some(a), Some(b), Some(c)] => Some([a, b, c]),
                        _ => None,
                    };
                    data.faces.push(ObjFace {
                        vertices: tri.map(|(v, _)| v),
                        uvs,
                    });
                }
            }
            "mtllib" => data.material_libs.extend(tokens.map(str::to_string)),
            "usemtl" => {
                if let Some(name) = tokens.next() {
                    data.materials.push(name.to_string());
                }
            }
            // Normals, groups, objects and smoothing carry nothing we need.
            _ => {}
        }
    }

    Ok(data)
}

/// Read and parse an OBJ file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ObjData> {
    let text = fs::read_to_string(path)?;
    parse_obj(&text)
}
