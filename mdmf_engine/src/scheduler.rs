use std::collections::BTreeMap;

use mdmf_formats::{ScriptDef, ScriptTable};
use serde::Serialize;
use thiserror::Error;

use crate::host::{IgnoreHost, ScriptHost};

/// Most instructions a single `step` executes across all scripts.
pub const FRAME_INSTRUCTION_BUDGET: usize = 2048;

const OP_END: &str = "end";
const OP_DONE: &str = "done";
const OP_DELAY: &str = "Delay";
const OP_SCRIPT_RUN: &str = "ScriptRun";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("script {0} is not defined")]
    UnknownScript(i32),
    #[error("script {0} is already running")]
    AlreadyRunning(i32),
    #[error("no script id given")]
    MissingScriptId,
    #[error("script id {0} is not an integer")]
    InvalidScriptId(f64),
    #[error("delay intervals must be positive, got {0}")]
    NonPositiveDelay(f64),
    #[error("malformed instruction '{instruction}': {reason}")]
    MalformedInstruction { instruction: String, reason: String },
    #[error("argument ${index} referenced but the script was started with {count} arguments")]
    ArgumentOutOfRange { index: usize, count: usize },
    #[error("host rejected '{instruction}': {reason}")]
    Host { instruction: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct RunState {
    pc: usize,
    /// `args[0]` is the script's own id; `$N` reads `args[N]`.
    args: Vec<f64>,
    wake_at: f64,
}

#[derive(Debug, Clone)]
struct ScriptSlot {
    def: ScriptDef,
    state: Option<RunState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptFault {
    pub script_id: i32,
    pub pc: usize,
    pub message: String,
}

/// What one call to [`ScriptEngine::step`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepReport {
    pub time: f64,
    pub executed: usize,
    pub passes: usize,
    pub budget_exhausted: bool,
    /// Scripts started by `ScriptRun` during the step.
    pub started: Vec<i32>,
    pub finished: Vec<i32>,
    pub faults: Vec<ScriptFault>,
}

impl StepReport {
    pub fn is_idle(&self) -> bool {
        self.executed == 0 && self.finished.is_empty() && self.faults.is_empty()
    }
}

enum Fetch {
    Instruction {
        pc: usize,
        tokens: Vec<String>,
        args: Vec<f64>,
    },
    PastEnd,
}

/// Cooperative round-robin interpreter for level scripts. At most one
/// instance of each script runs at a time.
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    slots: BTreeMap<i32, ScriptSlot>,
    now: f64,
}

impl ScriptEngine {
    pub fn new(scripts: ScriptTable) -> Self {
        let slots = scripts
            .into_iter()
            .map(|(id, def)| (id, ScriptSlot { def, state: None }))
            .collect();
        Self { slots, now: 0.0 }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Time passed to the most recent `step`.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn script(&self, id: i32) -> Option<&ScriptDef> {
        self.slots.get(&id).map(|slot| &slot.def)
    }

    /// Start the script named by `args[0]`. It becomes ready immediately.
    pub fn run(&mut self, args: &[f64]) -> Result<(), ScriptError> {
        let &first = args.first().ok_or(ScriptError::MissingScriptId)?;
        let id = script_id(first)?;
        let now = self.now;
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(ScriptError::UnknownScript(id))?;
        if slot.state.is_some() {
            return Err(ScriptError::AlreadyRunning(id));
        }
        slot.state = Some(RunState {
            pc: 0,
            args: args.to_vec(),
            wake_at: now,
        });
        log::debug!("script {id} started with {args:?}");
        Ok(())
    }

    pub fn is_running(&self, id: i32) -> bool {
        self.state(id).is_some()
    }

    pub fn program_counter(&self, id: i32) -> Option<usize> {
        self.state(id).map(|state| state.pc)
    }

    pub fn wake_time(&self, id: i32) -> Option<f64> {
        self.state(id).map(|state| state.wake_at)
    }

    pub fn running_ids(&self) -> Vec<i32> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.state.is_some())
            .map(|(&id, _)| id)
            .collect()
    }

    fn state(&self, id: i32) -> Option<&RunState> {
        self.slots.get(&id)?.state.as_ref()
    }

    fn ready_ids(&self, now: f64) -> Vec<i32> {
        self.slots
            .iter()
            .filter(|(_, slot)| {
                slot.state
                    .as_ref()
                    .is_some_and(|state| state.wake_at <= now)
            })
            .map(|(&id, _)| id)
            .collect()
    }

    fn is_ready(&self, id: i32, now: f64) -> bool {
        self.state(id).is_some_and(|state| state.wake_at <= now)
    }

    /// Advance every ready script, discarding host instructions.
    pub fn step(&mut self, now: f64) -> StepReport {
        self.step_with_host(now, &mut IgnoreHost)
    }

    /// Advance every script whose wake time has passed, one instruction per
    /// script per pass in ascending id order, until no script is ready or
    /// the frame budget is spent.
    pub fn step_with_host(&mut self, now: f64, host: &mut dyn ScriptHost) -> StepReport {
        self.now = now;
        let mut report = StepReport {
            time: now,
            ..StepReport::default()
        };

        loop {
            let ready = self.ready_ids(now);
            if ready.is_empty() {
                break;
            }
            if report.executed >= FRAME_INSTRUCTION_BUDGET {
                report.budget_exhausted = true;
                log::warn!(
                    "frame at {now}: instruction budget of {FRAME_INSTRUCTION_BUDGET} spent with {} scripts still ready",
                    ready.len()
                );
                break;
            }
            report.passes += 1;
            for id in ready {
                if report.executed >= FRAME_INSTRUCTION_BUDGET {
                    break;
                }
                if self.is_ready(id, now) {
                    self.tick(id, now, host, &mut report);
                }
            }
        }
        report
    }

    fn fetch(&mut self, id: i32) -> Option<Fetch> {
        let slot = self.slots.get_mut(&id)?;
        let state = slot.state.as_mut()?;
        let Some(instruction) = slot.def.instructions.get(state.pc) else {
            return Some(Fetch::PastEnd);
        };
        let pc = state.pc;
        state.pc += 1;
        Some(Fetch::Instruction {
            pc,
            tokens: instruction.tokens.clone(),
            args: state.args.clone(),
        })
    }

    fn tick(&mut self, id: i32, now: f64, host: &mut dyn ScriptHost, report: &mut StepReport) {
        let (pc, tokens, args) = match self.fetch(id) {
            Some(Fetch::Instruction { pc, tokens, args }) => (pc, tokens, args),
            Some(Fetch::PastEnd) => {
                self.finish(id, report);
                return;
            }
            None => return,
        };
        report.executed += 1;

        let outcome = substitute_arguments(&tokens, &args)
            .and_then(|tokens| self.dispatch(id, &tokens, now, host, report));
        match outcome {
            Ok(()) => {
                // Leaving the last instruction ends the script now, unless it
                // is sleeping off a trailing Delay.
                let at_end = self.slots.get(&id).is_some_and(|slot| {
                    slot.state.as_ref().is_some_and(|state| {
                        state.pc >= slot.def.instructions.len() && state.wake_at <= now
                    })
                });
                if at_end {
                    self.finish(id, report);
                }
            }
            Err(err) => {
                log::debug!("script {id} faulted at instruction {pc}: {err}");
                self.stop(id);
                report.faults.push(ScriptFault {
                    script_id: id,
                    pc,
                    message: err.to_string(),
                });
            }
        }
    }

    fn dispatch(
        &mut self,
        id: i32,
        tokens: &[String],
        now: f64,
        host: &mut dyn ScriptHost,
        report: &mut StepReport,
    ) -> Result<(), ScriptError> {
        let Some((opcode, operands)) = tokens.split_first() else {
            return Err(malformed(tokens, "empty instruction"));
        };
        match opcode.as_str() {
            OP_END | OP_DONE => {
                self.finish(id, report);
                Ok(())
            }
            OP_DELAY => {
                let operand = operands
                    .first()
                    .ok_or_else(|| malformed(tokens, "missing delay interval"))?;
                let seconds = parse_operand(tokens, operand)?;
                if !(seconds > 0.0) {
                    return Err(ScriptError::NonPositiveDelay(seconds));
                }
                if let Some(state) = self.slots.get_mut(&id).and_then(|slot| slot.state.as_mut()) {
                    state.wake_at = now + seconds;
                }
                Ok(())
            }
            OP_SCRIPT_RUN => {
                let args = operands
                    .iter()
                    .map(|operand| parse_operand(tokens, operand))
                    .collect::<Result<Vec<_>, _>>()?;
                self.run(&args)?;
                report.started.push(script_id(args[0])?);
                Ok(())
            }
            _ => host
                .handle(id, tokens)
                .map_err(|reason| ScriptError::Host {
                    instruction: tokens.join(" "),
                    reason,
                }),
        }
    }

    fn finish(&mut self, id: i32, report: &mut StepReport) {
        if self.stop(id) {
            log::debug!("script {id} finished");
            report.finished.push(id);
        }
    }

    fn stop(&mut self, id: i32) -> bool {
        self.slots
            .get_mut(&id)
            .and_then(|slot| slot.state.take())
            .is_some()
    }
}

fn script_id(value: f64) -> Result<i32, ScriptError> {
    let in_range = value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX);
    if value.fract() != 0.0 || !in_range {
        return Err(ScriptError::InvalidScriptId(value));
    }
    Ok(value as i32)
}

fn malformed(tokens: &[String], reason: impl Into<String>) -> ScriptError {
    ScriptError::MalformedInstruction {
        instruction: tokens.join(" "),
        reason: reason.into(),
    }
}

/// Numeric operand, optionally written as an `@` identifier.
fn parse_operand(tokens: &[String], operand: &str) -> Result<f64, ScriptError> {
    let digits = operand.strip_prefix('@').unwrap_or(operand);
    digits
        .parse::<f64>()
        .map_err(|_| malformed(tokens, format!("'{operand}' is not a number")))
}

/// Replace `$N` operands with the N-th run argument. The opcode is never
/// substituted.
fn substitute_arguments(tokens: &[String], args: &[f64]) -> Result<Vec<String>, ScriptError> {
    tokens
        .iter()
        .enumerate()
        .map(|(position, token)| {
            let reference = token
                .strip_prefix('$')
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
            match reference {
                Some(digits) if position > 0 => {
                    let index = digits.parse::<usize>().unwrap_or(usize::MAX);
                    args.get(index)
                        .map(f64::to_string)
                        .ok_or(ScriptError::ArgumentOutOfRange {
                            index,
                            count: args.len(),
                        })
                }
                _ => Ok(token.clone()),
            }
        })
        .collect()
}
