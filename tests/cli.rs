//! Smoke tests for the `badge-mesh` binary.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::tempdir;

const DESIGN: &str = r##"{
    "badge": { "width": 63, "height": 90, "borderRadius": 3, "backgroundColor": "#ffffff" },
    "hole": { "enabled": true, "shape": "circle", "size": 6, "offsetY": 4 },
    "texts": [{ "content": "Grace Hopper", "fontSize": 6, "x": 31.5, "y": 60 }],
    "export": { "meshDensity": { "density": 20 }, "textureResolution": 128 }
}"##;

fn stdout_of(cmd: &mut assert_cmd::Command) -> String {
    let output = cmd.assert().success().get_output().clone();
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn export_writes_bundle() {
    let dir = tempdir().unwrap();
    let design = dir.path().join("design.json");
    fs::write(&design, DESIGN).unwrap();
    let out = dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("badge-mesh");
    cmd.arg("export").arg(&design).arg("-o").arg(&out).arg("--quiet");
    let stdout = stdout_of(&mut cmd);

    assert!(stdout.contains("Topology: Closed (no boundary)"), "{stdout}");
    assert!(out.join("badge.obj").exists());
    assert!(out.join("badge.mtl").exists());
    assert!(out.join("badge_texture.png").exists());

    let obj = fs::read_to_string(out.join("badge.obj")).unwrap();
    assert!(obj.contains("mtllib badge.mtl"));
    let mtl = fs::read_to_string(out.join("badge.mtl")).unwrap();
    assert!(mtl.contains("map_Kd badge_texture.png"));
}

#[test]
fn info_reports_closed_mesh() {
    let dir = tempdir().unwrap();
    let design = dir.path().join("design.json");
    fs::write(&design, DESIGN).unwrap();

    let mut export = cargo_bin_cmd!("badge-mesh");
    export.arg("export").arg(&design).arg("-o").arg(dir.path()).arg("-q");
    export.assert().success();

    let mut info = cargo_bin_cmd!("badge-mesh");
    info.arg("info").arg(dir.path().join("badge.obj"));
    let stdout = stdout_of(&mut info);

    assert!(stdout.contains("Topology: Closed"), "{stdout}");
    assert!(stdout.contains("Vertex colors: no"));
    assert!(stdout.contains("Material libraries: badge.mtl"));
}

#[test]
fn print_mode_with_stl() {
    let dir = tempdir().unwrap();
    let design = dir.path().join("design.json");
    fs::write(&design, DESIGN).unwrap();
    let out = dir.path().join("print");

    let mut cmd = cargo_bin_cmd!("badge-mesh");
    cmd.arg("export")
        .arg(&design)
        .arg("-o")
        .arg(&out)
        .args(["--print", "--stl", "--sequential", "-d", "12", "-q"]);
    cmd.assert().success();

    assert!(out.join("badge.obj").exists());
    assert!(out.join("badge.stl").exists());
    assert!(!out.join("badge.mtl").exists());
    assert!(!out.join("badge_texture.png").exists());

    let mut info = cargo_bin_cmd!("badge-mesh");
    info.arg("info").arg(out.join("badge.stl"));
    let stdout = stdout_of(&mut info);
    assert!(stdout.contains("Vertex colors: no"), "{stdout}");
    assert!(stdout.contains("Texture coordinates: 0"));
}

#[test]
fn invalid_design_fails() {
    let dir = tempdir().unwrap();
    let design = dir.path().join("design.json");
    fs::write(&design, r#"{ "badge": { "width": -5, "height": 90 } }"#).unwrap();

    let mut cmd = cargo_bin_cmd!("badge-mesh");
    cmd.arg("export").arg(&design).arg("-o").arg(dir.path().join("out")).arg("-q");
    cmd.assert().failure();

    let mut missing = cargo_bin_cmd!("badge-mesh");
    missing.arg("info").arg(dir.path().join("nothing.obj"));
    missing.assert().failure();
}
