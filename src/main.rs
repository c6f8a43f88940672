use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use fpga_arch::db::{Context, Design, ACTIVE_PIPS_KEY};
use fpga_arch::shapes::ShapeGenerator;
use fpga_arch::tech::{DisplayLevel, DisplayOptions};
use fpga_arch::{layout, primitive, sexpr};

#[derive(Parser)]
#[command(about = "FPGA architecture file reader and pip-activity evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an architecture file and print its sections.
    Read { file: PathBuf },
    /// Build the primitives and cells and print a summary.
    Build { file: PathBuf },
    /// Generate the drawable polygons of the architecture cell.
    Shapes {
        file: PathBuf,
        /// How much of each primitive's internals to draw.
        #[arg(long, value_enum, default_value = "active")]
        level: Level,
        /// Omit primitive name labels.
        #[arg(long)]
        no_text: bool,
        /// Program an instance, e.g. `t0=xbar.p1 xbar.p2`.
        #[arg(long, value_name = "INSTANCE=PIPS")]
        program: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    None,
    Active,
    Full,
}

impl From<Level> for DisplayLevel {
    fn from(level: Level) -> DisplayLevel {
        match level {
            Level::None => DisplayLevel::Nothing,
            Level::Active => DisplayLevel::ActiveOnly,
            Level::Full => DisplayLevel::Everything,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Read { file } => {
            let top = sexpr::read_path(&file)?;
            for section in top.branches() {
                println!("{}", section);
            }
        }
        Command::Build { file } => {
            let (design, arch) = build(&file)?;
            let cell = design.cell(arch);
            println!(
                "architecture '{}': {} instances, {} wires, {} ports",
                cell.name,
                cell.instances.len(),
                cell.wires.len(),
                cell.exports.len()
            );
        }
        Command::Shapes {
            file,
            level,
            no_text,
            program,
        } => {
            let (mut design, arch) = build(&file)?;
            for spec in &program {
                apply_program(&mut design, arch, spec)?;
            }
            let options = DisplayOptions {
                level: level.into(),
                text: !no_text,
            };
            let shapes = ShapeGenerator::new(&design, options);
            let ctx = Context::top(arch);
            let cell = design.cell(arch);
            for i in 0..cell.instances.len() {
                for poly in shapes.shape_of_node(&ctx, fpga_arch::db::InstId(i)) {
                    print_poly(&poly);
                }
            }
            for w in 0..cell.wires.len() {
                for poly in shapes.shape_of_wire(&ctx, fpga_arch::db::WireId(w)) {
                    print_poly(&poly);
                }
            }
        }
    }
    Ok(())
}

fn build(file: &PathBuf) -> Result<(Design, fpga_arch::db::CellId)> {
    let top = sexpr::read_path(file)?;
    let catalog = primitive::build_primitives(&top)?;
    println!("created {} primitives", catalog.len());
    let mut design = Design::new();
    let arch = layout::build_cells(&top, &catalog, &mut design)?;
    Ok((design, arch))
}

/// Sets `FPGA_activepips` on a named instance of the architecture cell
/// from a `NAME=TOKENS` option.
fn apply_program(design: &mut Design, arch: fpga_arch::db::CellId, spec: &str) -> Result<()> {
    let (name, pips) = spec
        .split_once('=')
        .with_context(|| format!("malformed --program '{}', expected INSTANCE=PIPS", spec))?;
    let inst = match design.cell(arch).find_instance(name) {
        Some(i) => i,
        None => bail!("no instance '{}' in the architecture cell", name),
    };
    design
        .cell_mut(arch)
        .instance_mut(inst)
        .attributes
        .insert(ACTIVE_PIPS_KEY.to_string(), pips.to_string());
    Ok(())
}

fn print_poly(poly: &fpga_arch::shapes::Poly) {
    // Discs come as center plus edge; expand them to an outline here.
    let expanded;
    let points = if poly.style == fpga_arch::shapes::PolyStyle::Disc && poly.points.len() == 2 {
        let center = poly.points[0];
        let edge = poly.points[1];
        let r = ((edge.x - center.x).powi(2) + (edge.y - center.y).powi(2)).sqrt();
        expanded = fpga_arch::geom::fill_ellipse(center, r, r, 0.0, 0.0);
        &expanded
    } else {
        &poly.points
    };
    let pts: Vec<String> = points
        .iter()
        .map(|p| format!("({},{})", p.x, p.y))
        .collect();
    match &poly.text {
        Some(text) => println!(
            "{} {:?} \"{}\" {}",
            poly.layer.name(),
            poly.style,
            text,
            pts.join(" ")
        ),
        None => println!("{} {:?} {}", poly.layer.name(), poly.style, pts.join(" ")),
    }
}
