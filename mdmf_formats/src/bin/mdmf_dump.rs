use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mdmf_formats::{LoaderConfig, MdmfFile};

/// Load an MDMF level and list its sectors, planes and scripts.
#[derive(Parser)]
struct Args {
    /// Path to the `.mdmf` level to inspect
    path: PathBuf,

    /// Skip recoverable syntax slips instead of failing the load
    #[arg(long)]
    lenient: bool,

    /// Print the whole loaded level as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = if args.lenient {
        LoaderConfig::lenient()
    } else {
        LoaderConfig::strict()
    };
    let file = MdmfFile::open(&args.path, &config)
        .with_context(|| format!("loading {}", args.path.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&file).context("serializing level to JSON")?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "level {} (theme {})",
        file.name.as_deref().unwrap_or("<unnamed>"),
        file.theme.as_deref().unwrap_or("<none>")
    );
    println!("sectors: {}", file.level.sectors.len());
    for sector in &file.level.sectors {
        println!(
            "{:>6}  floor {:>7.2}  ceiling {:>7.2}  vertices {:>4}  triangles {:>4}",
            sector.sector_id,
            sector.cell_floor,
            sector.ceiling(),
            sector.boundary.vertices.len(),
            sector.boundary.triangles.len()
        );
    }

    println!("plane defs: {}", file.level.plane_defs.len());
    for plane in file.level.plane_defs.values() {
        let tags: Vec<_> = plane.tags.iter().map(|tag| tag.name()).collect();
        println!(
            "{:>6}  triangles {:>4}  [{}]",
            plane.id,
            plane.triangle_count(),
            tags.join(", ")
        );
    }

    println!("scripts: {}", file.scripts.len());
    for script in file.scripts.values() {
        println!("{:>6}  {} instructions", script.id, script.len());
    }

    Ok(())
}
