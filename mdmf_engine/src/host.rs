use std::collections::BTreeSet;

use serde::Serialize;

/// Receives every script instruction the engine does not interpret itself.
/// Returning an error faults the calling script.
pub trait ScriptHost {
    fn handle(&mut self, script_id: i32, instruction: &[String]) -> Result<(), String>;
}

/// Accepts and discards host instructions.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreHost;

impl ScriptHost for IgnoreHost {
    fn handle(&mut self, script_id: i32, instruction: &[String]) -> Result<(), String> {
        log::debug!("script {script_id}: ignoring '{}'", instruction.join(" "));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostCall {
    pub frame: u64,
    pub script_id: i32,
    pub opcode: String,
    pub operands: Vec<String>,
}

/// Host that keeps every call it receives, tagged with the frame it arrived
/// in, so playback can be inspected or written out as JSON.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    calls: Vec<HostCall>,
    frame: u64,
    rejected: BTreeSet<String>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls to `opcode` but report them back as failures.
    pub fn reject(mut self, opcode: impl Into<String>) -> Self {
        self.rejected.insert(opcode.into());
        self
    }

    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<HostCall> {
        self.calls
    }
}

impl ScriptHost for RecordingHost {
    fn handle(&mut self, script_id: i32, instruction: &[String]) -> Result<(), String> {
        let (opcode, operands) = instruction
            .split_first()
            .ok_or_else(|| "empty instruction".to_string())?;
        self.calls.push(HostCall {
            frame: self.frame,
            script_id,
            opcode: opcode.clone(),
            operands: operands.to_vec(),
        });
        if self.rejected.contains(opcode) {
            return Err(format!("'{opcode}' is not supported by this host"));
        }
        Ok(())
    }
}
