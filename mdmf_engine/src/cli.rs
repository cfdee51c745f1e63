use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Load an MDMF level and play its scripts for a number of frames",
    version
)]
pub struct Args {
    /// Path to the `.mdmf` level to load
    #[arg(long)]
    pub level: PathBuf,

    /// Skip recoverable syntax slips instead of failing the load
    #[arg(long)]
    pub lenient: bool,

    /// Script to start before the first frame, as `id[,arg...]` (repeatable)
    #[arg(long = "run", value_name = "ID[,ARG...]")]
    pub run: Vec<String>,

    /// Number of frames to simulate
    #[arg(long, default_value_t = 60)]
    pub frames: u64,

    /// Seconds between frames
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub frame_time: f64,

    /// Path to write the loaded level model as JSON
    #[arg(long)]
    pub level_json: Option<PathBuf>,

    /// Path to write the per-frame script trace as JSON
    #[arg(long)]
    pub trace_json: Option<PathBuf>,

    /// Log loader and scheduler details
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub struct PlaybackArgs {
    pub level: PathBuf,
    pub lenient: bool,
    /// Each entry is a full argument vector; element 0 is the script id.
    pub launches: Vec<Vec<f64>>,
    pub frames: u64,
    pub frame_time: f64,
    pub level_json: Option<PathBuf>,
    pub trace_json: Option<PathBuf>,
}

pub fn parse() -> Result<(PlaybackArgs, bool)> {
    let args = Args::parse();
    let verbose = args.verbose;
    Ok((args.into_playback()?, verbose))
}

impl Args {
    fn into_playback(self) -> Result<PlaybackArgs> {
        if !(self.frame_time > 0.0) {
            bail!("--frame-time must be positive, got {}", self.frame_time);
        }
        let launches = self
            .run
            .iter()
            .map(|spec| parse_launch(spec))
            .collect::<Result<Vec<_>>>()?;

        Ok(PlaybackArgs {
            level: self.level,
            lenient: self.lenient,
            launches,
            frames: self.frames,
            frame_time: self.frame_time,
            level_json: self.level_json,
            trace_json: self.trace_json,
        })
    }
}

/// `7` or `7,1,0.5`: a script id followed by its `$1..` arguments.
pub fn parse_launch(spec: &str) -> Result<Vec<f64>> {
    let values = spec
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.strip_prefix('@')
                .unwrap_or(part)
                .parse::<f64>()
                .with_context(|| format!("--run {spec}: '{part}' is not a number"))
        })
        .collect::<Result<Vec<_>>>()?;
    if values[0].fract() != 0.0 {
        bail!("--run {spec}: script id must be an integer");
    }
    Ok(values)
}
