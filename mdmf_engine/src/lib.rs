pub mod host;
pub mod scheduler;

pub use host::{HostCall, IgnoreHost, RecordingHost, ScriptHost};
pub use scheduler::{FRAME_INSTRUCTION_BUDGET, ScriptEngine, ScriptError, ScriptFault, StepReport};
