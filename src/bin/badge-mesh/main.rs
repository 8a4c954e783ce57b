//! badge-mesh CLI - export badge designs as OBJ meshes.
//!
//! Usage: badge-mesh <COMMAND> [OPTIONS]
//!
//! Run `badge-mesh --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use badge_mesh::config::{DesignFile, SubdivisionConfig};
use badge_mesh::export::export_badge_with_progress;
use badge_mesh::geometry::Facing;
use badge_mesh::io;
use badge_mesh::mesh::topology;
use badge_mesh::progress::Progress;
use badge_mesh::texture::FontBook;

#[derive(Parser)]
#[command(name = "badge-mesh")]
#[command(author, version, about = "Badge design to OBJ mesh exporter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a design JSON file to badge.obj / badge.mtl / badge_texture.png
    Export {
        /// Design file (badge, hole, image, texts and optional export settings)
        design: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "out")]
        output: PathBuf,

        /// Write a vertex-colored OBJ for 3D printing
        #[arg(long)]
        print: bool,

        /// Grid cells along each badge axis
        #[arg(short, long)]
        density: Option<u32>,

        /// Badge thickness in mm
        #[arg(short, long)]
        thickness: Option<f64>,

        /// Texture size in pixels along the longer badge side
        #[arg(long)]
        texture_resolution: Option<u32>,

        /// Leave the back face blank
        #[arg(long)]
        single_sided: bool,

        /// Enable adaptive subdivision with this maximum depth
        #[arg(long)]
        subdivide: Option<u32>,

        /// Subdivision threshold (lower subdivides more)
        #[arg(long, default_value = "0.3")]
        threshold: f64,

        /// Register a font as FAMILY=PATH (repeatable; the first one is the fallback)
        #[arg(long = "font", value_name = "FAMILY=PATH")]
        fonts: Vec<String>,

        /// Also write badge.stl
        #[arg(long)]
        stl: bool,

        /// Use single-threaded execution
        #[arg(long)]
        sequential: bool,

        /// Do not draw a progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Display information about an OBJ or STL file
    Info {
        /// Input mesh file
        input: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Export {
            design,
            output,
            print,
            density,
            thickness,
            texture_resolution,
            single_sided,
            subdivide,
            threshold,
            fonts,
            stl,
            sequential,
            quiet,
        } => {
            let mut file = DesignFile::from_json(&std::fs::read_to_string(&design)?)?;
            let config = &mut file.export;
            if print {
                config.for_3d_printing = true;
            }
            if let Some(density) = density {
                config.mesh_density.density = density;
            }
            if let Some(thickness) = thickness {
                config.thickness = thickness;
            }
            if let Some(resolution) = texture_resolution {
                config.texture_resolution = resolution;
            }
            if single_sided {
                config.double_sided = false;
            }
            if let Some(depth) = subdivide {
                config.subdivision = Some(SubdivisionConfig::new(threshold, depth));
            }
            if sequential {
                config.parallel = false;
            }

            let fonts = load_fonts(&fonts)?;
            cmd_export(&file, &fonts, &output, stl, quiet)?;
        }

        Commands::Info { input } => {
            cmd_info(&input)?;
        }
    }

    Ok(())
}

fn load_fonts(specs: &[String]) -> Result<FontBook, Box<dyn std::error::Error>> {
    let mut book = FontBook::new();
    for spec in specs {
        let (family, path) = spec
            .split_once('=')
            .ok_or_else(|| format!("font must be given as FAMILY=PATH, got {spec:?}"))?;
        book.load(family, path)?;
    }
    Ok(book)
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }
        let done = current + 1;
        let bar_width = 30;
        let filled = (done * bar_width) / total;

        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);
        eprint!("\r[{}{}] {}/{} {:<24}", bar, space, done, total, message);
        let _ = std::io::stderr().flush();

        if done >= total {
            eprintln!();
        }
    })
}

fn cmd_export(
    file: &DesignFile,
    fonts: &FontBook,
    output: &Path,
    stl: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let progress = if quiet { Progress::none() } else { create_progress() };
    let bundle = export_badge_with_progress(&file.design, &file.export, fonts, &progress)?;

    let mut written = bundle.write_to_dir(output)?;
    if stl {
        written.push(bundle.write_stl(output)?);
    }

    let report = &bundle.report;
    println!(
        "Mesh: {} vertices, {} faces ({} dropped as degenerate)",
        bundle.mesh.num_vertices(),
        bundle.mesh.num_faces(),
        report.dropped_faces
    );
    println!(
        "Front fill: {:?}, back fill: {:?}",
        report.retopo.front.strategy, report.retopo.back.strategy
    );
    if let Some(sub) = &report.subdivision {
        println!(
            "Subdivision: {} splits ({} forced faces), depth {}",
            sub.splits, sub.forced, sub.max_depth_reached
        );
    }
    if report.audit.is_watertight() {
        println!("Topology: Closed (no boundary)");
    } else {
        println!(
            "Topology: Open ({} boundary edges, {} non-manifold edges)",
            report.audit.boundary_edges.len(),
            report.audit.non_manifold_edges.len()
        );
    }
    for path in &written {
        println!("Saved: {}", path.display());
    }
    println!("Done in {:.2?}", start.elapsed());
    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = io::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", data.positions.len());
    println!("Faces: {}", data.faces.len());
    println!("Texture coordinates: {}", data.uvs.len());
    println!("Vertex colors: {}", if data.has_colors() { "yes" } else { "no" });
    if !data.material_libs.is_empty() {
        println!("Material libraries: {}", data.material_libs.join(", "));
    }

    let mut total_area = 0.0;
    for face in &data.faces {
        let [a, b, c] = face.vertices.map(|i| data.positions[i]);
        total_area += (b - a).cross(&(c - a)).norm() * 0.5;
    }
    println!("Surface area: {:.3} mm^2", total_area);
    println!("Front area: {:.3} mm^2", data.facing_area(Facing::Front));
    println!("Back area: {:.3} mm^2", data.facing_area(Facing::Back));

    if let Some(first) = data.positions.first() {
        let (mut min, mut max) = (*first, *first);
        for p in &data.positions {
            min = min.inf(p);
            max = max.sup(p);
        }
        let diag = max - min;
        println!("Dimensions: {:.3} x {:.3} x {:.3} mm", diag.x, diag.y, diag.z);
    }

    let audit = topology::audit(&data.triangles());
    if audit.is_watertight() {
        println!("Topology: Closed (no boundary)");
    } else {
        println!(
            "Topology: Open ({} boundary edges, {} non-manifold edges)",
            audit.boundary_edges.len(),
            audit.non_manifold_edges.len()
        );
    }
    println!("Euler characteristic: {}", audit.euler_characteristic());

    Ok(())
}
