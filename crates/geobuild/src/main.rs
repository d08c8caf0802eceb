// geobuild - walkability geodata builder
//
// Turns exported map geometry into packed L2J geodata files, and
// inspects existing files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use geobuild::export::{BlockType, MAP_HEIGHT_BLOCKS, MAP_WIDTH_BLOCKS};
use geobuild::serializer::L2jSerializer;
use geobuild::settings::BuilderSettings;
use geobuild::{Builder, mesh};
use geobuild_shared::log::{initialize_logging, map_log_level};
use geobuild_shared::util::ByteBuffer;

#[derive(Parser, Debug)]
#[command(name = "geobuild")]
#[command(about = "Walkability geodata builder")]
#[command(version)]
struct Cli {
    /// Console log level (0=Error, 1=Warn, 2=Info, 3=Debug, 4=Trace)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<i32>,

    /// Also log into this directory (daily rolling file)
    #[arg(long = "logdir")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build geodata files from exported map geometry
    Build(BuildArgs),
    /// Read a geodata file back and report its statistics
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Input mesh files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long = "output", default_value = ".")]
    output_dir: PathBuf,

    /// JSON configuration file with builder settings
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Horizontal voxel size override
    #[arg(long = "cell-size")]
    cell_size: Option<f32>,

    /// Vertical voxel size override
    #[arg(long = "cell-height")]
    cell_height: Option<f32>,

    /// Actor height override
    #[arg(long = "actor-height")]
    actor_height: Option<f32>,

    /// Actor radius override
    #[arg(long = "actor-radius")]
    actor_radius: Option<f32>,

    /// Maximum walkable surface angle override, in degrees
    #[arg(long = "max-walkable-angle")]
    max_walkable_angle: Option<f32>,

    /// Minimum climb override (always climbable)
    #[arg(long = "min-walkable-climb")]
    min_walkable_climb: Option<f32>,

    /// Maximum climb override (never exceeded on flat ground)
    #[arg(long = "max-walkable-climb")]
    max_walkable_climb: Option<f32>,

    /// Number of threads to use
    #[arg(long = "threads")]
    threads: Option<usize>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Geodata file to inspect
    input: PathBuf,
}

fn resolve_threads(threads: Option<usize>) -> usize {
    threads.unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
}

fn resolve_settings(args: &BuildArgs) -> anyhow::Result<BuilderSettings> {
    let mut settings = match &args.config {
        Some(path) => BuilderSettings::from_json_file(path)
            .with_context(|| format!("reading config '{}'", path.display()))?,
        None => BuilderSettings::default(),
    };

    if let Some(v) = args.cell_size {
        settings.cell_size = v;
    }
    if let Some(v) = args.cell_height {
        settings.cell_height = v;
    }
    if let Some(v) = args.actor_height {
        settings.actor_height = v;
    }
    if let Some(v) = args.actor_radius {
        settings.actor_radius = v;
    }
    if let Some(v) = args.max_walkable_angle {
        settings.max_walkable_angle = v;
    }
    if let Some(v) = args.min_walkable_climb {
        settings.min_walkable_climb = v;
    }
    if let Some(v) = args.max_walkable_climb {
        settings.max_walkable_climb = v;
    }

    Ok(settings)
}

fn build_one(input: &Path, output_dir: &Path, settings: &BuilderSettings) -> anyhow::Result<()> {
    let map =
        mesh::load_map(input).with_context(|| format!("loading mesh '{}'", input.display()))?;

    let buffer = Builder::build(&map, settings)
        .with_context(|| format!("building geodata for '{}'", map.name()))?;

    let wire = L2jSerializer.serialize(&buffer);
    let output_path = output_dir.join(format!("{}.l2j", map.name()));
    std::fs::write(&output_path, wire.contents())
        .with_context(|| format!("writing '{}'", output_path.display()))?;

    tracing::info!(
        "Wrote '{}' ({} bytes)",
        output_path.display(),
        wire.size()
    );
    Ok(())
}

fn run_build(args: BuildArgs) -> anyhow::Result<()> {
    let threads = resolve_threads(args.threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("initializing thread pool")?;

    tracing::info!("Build: {} map(s), threads={}", args.inputs.len(), threads);

    let settings = resolve_settings(&args)?;
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating '{}'", args.output_dir.display()))?;

    for input in &args.inputs {
        build_one(input, &args.output_dir, &settings)?;
    }

    Ok(())
}

fn run_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("reading '{}'", args.input.display()))?;

    let mut wire = ByteBuffer::from_vec(bytes);
    let geodata = L2jSerializer
        .deserialize(&mut wire)
        .with_context(|| format!("parsing '{}'", args.input.display()))?;

    let mut by_type = [0u64; 3];
    let mut min_height = i16::MAX;
    let mut max_height = i16::MIN;
    for cell in &geodata.cells {
        by_type[cell.block_type as usize] += 1;
        min_height = min_height.min(cell.z);
        max_height = max_height.max(cell.z);
    }

    tracing::info!(
        "{}: {} blocks, {} cells",
        args.input.display(),
        MAP_WIDTH_BLOCKS * MAP_HEIGHT_BLOCKS,
        geodata.cells.len()
    );
    tracing::info!(
        "Cells by block type: simple={} complex={} multilayer={}",
        by_type[BlockType::Simple as usize],
        by_type[BlockType::Complex as usize],
        by_type[BlockType::Multilayer as usize]
    );
    if !geodata.cells.is_empty() {
        tracing::info!("Height range: {}..{}", min_height, max_height);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    initialize_logging(cli.log_dir.as_deref(), map_log_level(cli.log_level.unwrap_or(2)));

    match cli.command {
        Command::Build(args) => run_build(args),
        Command::Inspect(args) => run_inspect(args),
    }
}
