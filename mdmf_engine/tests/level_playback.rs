use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::tempdir;

const HALL: &str = "\
#Format MDMF
#Name Test Hall
#Segment [Defines]
#define DOOR @7 ## the only door
#Segment [Scripts]
@1 begin
OpenDoor $1
Delay 0.5
ScriptRun 2 $1
end
@2 begin
CloseDoor $1
end
#Segment [Lines]
DOOR {: #TriggerOnce :}
#Segment [Sectors]
[Sector]{ SectorId: @1, CellHeight: 3, Boundary: [SectorBoundary]{ Vertices: [Vector3][<0,0,0>, <1,0,0>, <0,1,0>], Triangles: [Autofield][{: %<0,1,2>, DOOR, #NoWall :}] } }
#Segment End
";

#[derive(Debug, Deserialize)]
struct HostCall {
    frame: u64,
    script_id: i32,
    opcode: String,
    operands: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Trace {
    host_calls: Vec<HostCall>,
    still_running: Vec<i32>,
}

fn run_engine(args: &[&str]) -> Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_mdmf_engine"))
        .args(args)
        .output()
        .context("executing mdmf_engine")
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().context("temporary path is not valid UTF-8")
}

#[test]
fn plays_level_scripts_across_frames() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for level")?;
    let level_path = temp_dir.path().join("hall.mdmf");
    let trace_path = temp_dir.path().join("trace.json");
    let level_json_path = temp_dir.path().join("level.json");
    fs::write(&level_path, HALL).context("writing level")?;

    let output = run_engine(&[
        "--level",
        path_str(&level_path)?,
        "--run",
        "1,42",
        "--frames",
        "8",
        "--frame-time",
        "0.25",
        "--trace-json",
        path_str(&trace_path)?,
        "--level-json",
        path_str(&level_json_path)?,
    ])?;
    assert!(
        output.status.success(),
        "mdmf_engine exited with {:?}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Loaded Test Hall: 1 sectors, 1 plane defs, 2 scripts"), "{stdout}");

    let trace: Trace = serde_json::from_str(
        &fs::read_to_string(&trace_path).context("reading trace json")?,
    )
    .context("parsing trace json")?;
    assert_eq!(trace.host_calls.len(), 2, "{:?}", trace.host_calls);

    let open = &trace.host_calls[0];
    assert_eq!((open.frame, open.script_id), (0, 1));
    assert_eq!(open.opcode, "OpenDoor");
    assert_eq!(open.operands, vec!["42"]);

    let close = &trace.host_calls[1];
    assert_eq!((close.frame, close.script_id), (2, 2));
    assert_eq!(close.opcode, "CloseDoor");
    assert_eq!(close.operands, vec!["42"]);
    assert!(trace.still_running.is_empty());

    let level: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(&level_json_path).context("reading level json")?,
    )
    .context("parsing level json")?;
    let door = &level["level"]["plane_defs"]["7"];
    assert_eq!(door["vertices"].as_array().map(Vec::len), Some(3));
    assert_eq!(door["tags"][0], "TriggerOnce");
    assert_eq!(level["name"], "Test Hall");

    Ok(())
}

#[test]
fn missing_sectors_segment_fails_unless_lenient() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for level")?;
    let level_path = temp_dir.path().join("bare.mdmf");
    fs::write(&level_path, "#Format MDMF\n#Segment [Lines]\n#Segment End\n")
        .context("writing level")?;

    let output = run_engine(&["--level", path_str(&level_path)?, "--frames", "1"])?;
    assert!(!output.status.success(), "strict load should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no Sectors segment"), "{stderr}");

    let output = run_engine(&[
        "--level",
        path_str(&level_path)?,
        "--frames",
        "1",
        "--lenient",
    ])?;
    assert!(
        output.status.success(),
        "lenient load failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(())
}

#[test]
fn unknown_launch_script_is_reported() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for level")?;
    let level_path = temp_dir.path().join("hall.mdmf");
    fs::write(&level_path, HALL).context("writing level")?;

    let output = run_engine(&["--level", path_str(&level_path)?, "--run", "9"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("script 9 is not defined"), "{stderr}");
    Ok(())
}
