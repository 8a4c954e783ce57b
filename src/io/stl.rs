//! STL (stereolithography) format support.
//!
//! Print-mode badges can additionally be written as binary STL for slicers
//! that do not read OBJ. STL has no colors or UVs, so only the geometry is
//! kept.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use nalgebra::{Point2, Point3, Vector3};

use super::obj::{ObjData, ObjFace};
use crate::error::{BadgeError, Result};
use crate::mesh::BadgeMesh;

fn to_triangle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> stl_io::Triangle {
    let n = (b - a)
        .cross(&(c - a))
        .try_normalize(0.0)
        .unwrap_or_else(Vector3::zeros);
    let vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);

    stl_io::Triangle {
        normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
        vertices: [vertex(a), vertex(b), vertex(c)],
    }
}

/// Write `mesh` as binary STL.
pub fn write_stl<W: Write>(mesh: &BadgeMesh, writer: &mut W) -> Result<()> {
    let triangles: Vec<stl_io::Triangle> = mesh
        .faces
        .iter()
        .map(|f| {
            let [a, b, c] = mesh.triangle(f);
            to_triangle(&a, &b, &c)
        })
        .collect();

    stl_io::write_stl(writer, triangles.iter())?;
    Ok(())
}

/// Binary STL bytes of `mesh`.
pub fn stl_bytes(mesh: &BadgeMesh) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::with_capacity(84 + 50 * mesh.num_faces()));
    write_stl(mesh, &mut buf)?;
    Ok(buf.into_inner())
}

/// Save `mesh` to a binary STL file.
pub fn save<P: AsRef<Path>>(mesh: &BadgeMesh, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_stl(mesh, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load an STL file (binary or ASCII) as shared-vertex geometry.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ObjData> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let stl = stl_io::read_stl(&mut file)?;

    let positions: Vec<Point3<f64>> = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
        .collect();
    let faces: Vec<ObjFace> = stl
        .faces
        .iter()
        .map(|t| ObjFace {
            vertices: t.vertices,
            uvs: None,
        })
        .filter(|f| {
            let [a, b, c] = f.vertices;
            a != b && b != c && a != c
        })
        .collect();

    if faces.is_empty() {
        return Err(BadgeError::ObjParse {
            line: 0,
            message: format!("{} contains no valid triangles", path.display()),
        });
    }

    Ok(ObjData {
        colors: vec![None; positions.len()],
        positions,
        uvs: Vec::<Point2<f64>>::new(),
        faces,
        material_libs: Vec::new(),
        materials: Vec::new(),
    })
}
