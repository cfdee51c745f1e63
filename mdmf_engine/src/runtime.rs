use std::fs;

use anyhow::{Context, Result};
use mdmf_engine::{HostCall, RecordingHost, ScriptEngine, StepReport};
use mdmf_formats::{LoaderConfig, MdmfFile};
use serde::Serialize;

use crate::cli::PlaybackArgs;

#[derive(Serialize)]
struct FrameTrace {
    frame: u64,
    #[serde(flatten)]
    report: StepReport,
}

#[derive(Serialize)]
struct PlaybackTrace {
    frames: Vec<FrameTrace>,
    host_calls: Vec<HostCall>,
    still_running: Vec<i32>,
}

pub fn execute(args: PlaybackArgs) -> Result<()> {
    let PlaybackArgs {
        level,
        lenient,
        launches,
        frames,
        frame_time,
        level_json,
        trace_json,
    } = args;

    let config = if lenient {
        LoaderConfig::lenient()
    } else {
        LoaderConfig::strict()
    };
    let file = MdmfFile::open(&level, &config)
        .with_context(|| format!("loading level {}", level.display()))?;
    println!(
        "Loaded {}: {} sectors, {} plane defs, {} scripts",
        file.name.as_deref().unwrap_or("<unnamed level>"),
        file.level.sectors.len(),
        file.level.plane_defs.len(),
        file.scripts.len()
    );

    if let Some(path) = level_json.as_ref() {
        let json =
            serde_json::to_string_pretty(&file).context("serializing level model to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing level model to {}", path.display()))?;
        println!("Saved level model to {}", path.display());
    }

    let mut engine = ScriptEngine::new(file.scripts);
    for launch in &launches {
        engine
            .run(launch)
            .with_context(|| format!("starting script {launch:?}"))?;
    }

    let mut host = RecordingHost::new();
    let mut trace = Vec::new();
    for frame in 0..frames {
        host.set_frame(frame);
        let now = frame as f64 * frame_time;
        let report = engine.step_with_host(now, &mut host);
        for fault in &report.faults {
            log::warn!(
                "frame {frame}: script {} faulted at instruction {}: {}",
                fault.script_id,
                fault.pc,
                fault.message
            );
        }
        if !report.is_idle() {
            println!(
                "frame {frame:>5} t={now:>8.3}s  executed {:>4}  finished {:?}{}",
                report.executed,
                report.finished,
                if report.budget_exhausted {
                    "  (budget exhausted)"
                } else {
                    ""
                }
            );
            trace.push(FrameTrace { frame, report });
        }
    }

    let still_running = engine.running_ids();
    if !still_running.is_empty() {
        println!("Still running after {frames} frames: {still_running:?}");
    }

    if let Some(path) = trace_json.as_ref() {
        let trace = PlaybackTrace {
            frames: trace,
            host_calls: host.into_calls(),
            still_running,
        };
        let json =
            serde_json::to_string_pretty(&trace).context("serializing script trace to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing script trace to {}", path.display()))?;
        println!("Saved script trace to {}", path.display());
    }

    Ok(())
}
