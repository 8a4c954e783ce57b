//! End-to-end properties of the export pipeline.

use std::collections::HashMap;

use base64::Engine;
use image::{ImageEncoder, Rgba, RgbaImage};
use nalgebra::Point2;

use badge_mesh::config::{
    BadgeDesign, BadgeSettings, ExportConfig, HoleSettings, ImageSettings, SubdivisionConfig, TextRun,
};
use badge_mesh::export::export_badge;
use badge_mesh::geometry::{self, Facing};
use badge_mesh::io::parse_obj;
use badge_mesh::mesh::{topology, FaceRole};
use badge_mesh::subdivide::FORCE_THRESHOLD;
use badge_mesh::texture::{rasterize, FontBook};

fn fixture_fonts() -> FontBook {
    let mut fonts = FontBook::new();
    fonts
        .load("DejaVu Sans Mono", concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSansMono.ttf"))
        .unwrap();
    fonts
}

fn name_badge() -> BadgeDesign {
    BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0))
        .with_text(TextRun::new("Ada Lovelace", 6.0, 31.5, 60.0))
}

fn config(density: u32) -> ExportConfig {
    ExportConfig::default()
        .with_thickness(2.0)
        .with_density(density)
        .with_texture_resolution(128)
}

fn line_image_url(size: u32) -> String {
    let image = RgbaImage::from_fn(size, size, |x, _| {
        if x == size / 2 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(image.as_raw(), size, size, image::ExtendedColorType::Rgba8)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

#[test]
fn scenario_a_plain_badge() {
    let bundle = export_badge(&name_badge(), &config(30), &FontBook::new()).unwrap();

    assert!(bundle.obj.contains("mtllib badge.mtl"));
    assert!(bundle.mesh.num_vertices() > 0);
    let walls = bundle.mesh.faces_with_role(FaceRole::OuterWall).count();
    assert_eq!(walls, 2 * bundle.report.outer_points);
    assert_eq!(bundle.mesh.faces_with_role(FaceRole::HoleWall).count(), 0);
    assert!(bundle.report.audit.is_watertight());
}

#[test]
fn scenario_a_text_is_drawn_where_placed() {
    let design = name_badge();
    let config = config(30);
    let with_text = export_badge(&design, &config, &fixture_fonts()).unwrap();
    let without_text = export_badge(&design, &config, &FontBook::new()).unwrap();

    // Text only changes the texture, never the mesh
    assert_eq!(with_text.obj, without_text.obj);
    assert!(with_text.report.audit.is_watertight());

    let png = with_text.texture_png.as_ref().unwrap();
    let texture = image::load_from_memory(png).unwrap().to_rgba8();
    let (w, h) = (texture.width(), texture.height());
    let (sx, sy) = (w as f64 / 63.0, h as f64 / 90.0);

    let ink: Vec<(u32, u32)> = texture
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[3] == 255 && p.0[0] < 200)
        .map(|(x, y, _)| (x, y))
        .collect();
    assert!(!ink.is_empty());

    let (min_x, max_x) = (ink.iter().map(|p| p.0).min().unwrap(), ink.iter().map(|p| p.0).max().unwrap());
    let (min_y, max_y) = (ink.iter().map(|p| p.1).min().unwrap(), ink.iter().map(|p| p.1).max().unwrap());
    let center_x = (min_x + max_x + 1) as f64 / 2.0;
    let center_y = (min_y + max_y + 1) as f64 / 2.0;
    assert!((center_x - 31.5 * sx).abs() < 3.0, "ink centred at x {center_x}");
    assert!((center_y - 60.0 * sy).abs() < 3.0, "ink centred at y {center_y}");
    // Glyphs stay within one line of the requested size
    assert!(((max_y - min_y + 1) as f64) < 6.0 * 1.2 * sy);
}

#[test]
fn scenario_b_every_hole_edge_is_stitched() {
    let design = name_badge().with_hole(HoleSettings::circle(6.0, 1.0));
    let bundle = export_badge(&design, &config(40), &FontBook::new()).unwrap();
    let mesh = &bundle.mesh;

    let mut front_edges: HashMap<(usize, usize), usize> = HashMap::new();
    for face in mesh.faces_with_role(FaceRole::Front) {
        let v = face.vertices;
        for i in 0..3 {
            *front_edges.entry(topology::edge_key(v[i], v[(i + 1) % 3])).or_insert(0) += 1;
        }
    }

    let mut hole_edges = 0;
    for face in mesh.faces_with_role(FaceRole::HoleWall) {
        let on_front: Vec<usize> = face
            .vertices
            .iter()
            .copied()
            .filter(|&i| mesh.vertices[i].position.z > 0.0)
            .collect();
        if let [a, b] = on_front[..] {
            hole_edges += 1;
            assert_eq!(front_edges.get(&topology::edge_key(a, b)), Some(&1));
        }
    }
    assert_eq!(hole_edges, bundle.report.hole_points);
    assert!(bundle.report.audit.is_watertight());
}

#[test]
fn scenario_c_print_mode() {
    let design = name_badge().with_hole(HoleSettings::circle(6.0, 4.0));
    let bundle = export_badge(&design, &config(20).for_printing(true), &FontBook::new()).unwrap();

    assert!(bundle.mtl.is_none());
    assert!(bundle.texture_png.is_none());
    let mut vertex_lines = 0;
    for line in bundle.obj.lines() {
        assert!(!line.starts_with("vt "));
        assert!(!line.starts_with("usemtl"));
        assert!(!line.starts_with("mtllib"));
        if line.starts_with("v ") {
            assert_eq!(line.split_whitespace().count(), 7, "{line}");
            vertex_lines += 1;
        }
    }
    assert_eq!(vertex_lines, bundle.mesh.num_vertices());
}

#[test]
fn scenario_d_line_refines_locally() {
    let design = BadgeDesign::new(BadgeSettings::new(64.0, 64.0).with_border_radius(32.0)).with_image(
        ImageSettings {
            src: line_image_url(256),
            x: 0.0,
            y: 0.0,
            width: 64.0,
            height: 64.0,
            opacity: 1.0,
        },
    );
    let config = ExportConfig::default()
        .with_density(15)
        .with_texture_resolution(256)
        .with_subdivision(SubdivisionConfig::new(0.3, 2));

    let bundle = export_badge(&design, &config, &FontBook::new()).unwrap();
    let mesh = &bundle.mesh;
    assert!(bundle.report.subdivision.as_ref().unwrap().forced > 0);
    assert!(bundle.report.audit.is_watertight());

    let texture = rasterize(&design, &FontBook::new(), 256).unwrap();
    let edges = texture.edge_map(false);
    let hot: Vec<(f64, f64)> = (0..edges.height())
        .flat_map(|y| (0..edges.width()).map(move |x| (x, y)))
        .filter(|&(x, y)| edges.get(x, y) > FORCE_THRESHOLD)
        .map(|(x, y)| edges.pixel_uv(x, y))
        .collect();
    let uv = |f: &badge_mesh::mesh::Face| f.uvs.map(|i| mesh.uvs[i]);

    // Faces covering the line are refined to depth 2
    let mut covered = 0;
    let on_line = hot
        .iter()
        .filter(|(u, v)| (0.45..0.55).contains(u) && (0.3..0.7).contains(v));
    for &(u, v) in on_line.step_by(7).take(10) {
        let p = Point2::new(u, v);
        for face in mesh.faces_with_role(FaceRole::Front) {
            let [a, b, c] = uv(face);
            if geometry::point_in_triangle(&p, &a, &b, &c) {
                assert_eq!(face.depth, 2);
                covered += 1;
            }
        }
    }
    assert!(covered > 0);

    // Faces far from the line stay at the base level
    for face in mesh.faces_with_role(FaceRole::Front) {
        let corners = uv(face);
        let inside = corners.iter().all(|p| (0.25..=0.75).contains(&p.y));
        let left = corners.iter().all(|p| (0.15..=0.3).contains(&p.x));
        let right = corners.iter().all(|p| (0.7..=0.85).contains(&p.x));
        if inside && (left || right) {
            assert_eq!(face.depth, 0);
        }
    }
}

#[test]
fn export_is_deterministic() {
    let design = name_badge().with_hole(HoleSettings::oval(10.0, 4.0, 3.0));
    let config = config(24).with_subdivision(SubdivisionConfig::new(0.3, 1));

    let first = export_badge(&design, &config, &FontBook::new()).unwrap();
    let second = export_badge(&design, &config, &FontBook::new()).unwrap();
    assert_eq!(first.obj, second.obj);
    assert_eq!(first.texture_png, second.texture_png);

    let sequential = export_badge(&design, &config.clone().sequential(), &FontBook::new()).unwrap();
    assert_eq!(first.obj, sequential.obj);
}

#[test]
fn density_one_still_closed() {
    let design = name_badge().with_hole(HoleSettings::circle(6.0, 4.0));
    let bundle = export_badge(&design, &config(1), &FontBook::new()).unwrap();
    assert!(bundle.report.audit.is_watertight());
    assert!(bundle.mesh.faces_with_role(FaceRole::Front).count() > 0);
}

#[test]
fn disabled_hole_adds_nothing() {
    let mut hole = HoleSettings::circle(6.0, 4.0);
    hole.enabled = false;
    let with_disabled = export_badge(&name_badge().with_hole(hole), &config(20), &FontBook::new()).unwrap();
    let without = export_badge(&name_badge(), &config(20), &FontBook::new()).unwrap();

    assert_eq!(with_disabled.report.hole_points, 0);
    assert_eq!(with_disabled.obj, without.obj);
}

#[test]
fn roundtrip_front_area_matches_design() {
    let design = name_badge().with_hole(HoleSettings::circle(6.0, 4.0));
    let density = 20;
    let bundle = export_badge(&design, &config(density), &FontBook::new()).unwrap();
    let parsed = parse_obj(&bundle.obj).unwrap();

    let r: f64 = 3.0;
    let badge_area = 63.0 * 90.0 - (4.0 - std::f64::consts::PI) * r * r;
    let hole_area = std::f64::consts::PI * 9.0;
    let expected = badge_area - hole_area;
    let tolerance = expected * 0.2 / density as f64;

    let front = parsed.facing_area(Facing::Front);
    let back = parsed.facing_area(Facing::Back);
    assert!((front - expected).abs() < tolerance, "front {front} vs {expected}");
    assert!((back - front).abs() < 1e-3);
}

#[test]
fn faces_are_valid_and_oriented() {
    let design = name_badge().with_hole(HoleSettings::rectangle(14.0, 4.0, 1.5, 4.0));
    for double_sided in [true, false] {
        let config = config(25).with_double_sided(double_sided);
        let bundle = export_badge(&design, &config, &FontBook::new()).unwrap();
        let mesh = &bundle.mesh;

        for face in &mesh.faces {
            let [a, b, c] = face.vertices;
            assert!(a != b && b != c && a != c);
            let [ta, tb, tc] = face.uvs;
            assert!(ta != tb && tb != tc && ta != tc);
            assert!(face.vertices.iter().all(|&i| i < mesh.num_vertices()));
            assert!(face.uvs.iter().all(|&i| i < mesh.uvs.len()));

            if let Some(facing) = face.role.facing() {
                let [pa, pb, pc] = mesh.triangle(face);
                assert!(geometry::is_normal_correct(&pa, &pb, &pc, facing));
            }
        }
        for uv in &mesh.uvs {
            assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
        }
        assert!(bundle.report.audit.is_watertight());
    }
}

#[test]
fn every_hole_shape_closes_across_densities() {
    let plain = BadgeDesign::new(BadgeSettings::new(63.0, 90.0).with_border_radius(3.0));
    let designs = [
        plain.clone().with_hole(HoleSettings::circle(6.0, 4.0)),
        plain.clone().with_hole(HoleSettings::oval(10.0, 4.0, 3.0)),
        plain.clone().with_hole(HoleSettings::rectangle(14.0, 4.0, 1.5, 4.0)),
        plain.with_hole(HoleSettings::rectangle(14.0, 4.0, 0.0, 4.0)),
        BadgeDesign::new(BadgeSettings::new(40.0, 20.0)).with_hole(HoleSettings::rectangle(10.0, 3.0, 0.0, 2.0)),
    ];

    for design in &designs {
        for density in 1..=60 {
            let config = ExportConfig::default()
                .with_density(density)
                .with_texture_resolution(32);
            let bundle = export_badge(design, &config, &FontBook::new()).unwrap();
            let label = format!("{:?} hole at density {density}", design.hole);
            assert!(bundle.report.audit.is_watertight(), "{label}");

            let mesh = &bundle.mesh;
            for face in &mesh.faces {
                if let Some(facing) = face.role.facing() {
                    let [a, b, c] = mesh.triangle(face);
                    assert!(geometry::is_normal_correct(&a, &b, &c, facing), "{label}");
                }
            }
        }
    }
}
