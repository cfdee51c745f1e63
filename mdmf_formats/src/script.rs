use std::collections::BTreeMap;

use serde::Serialize;

/// One raw script line. Tokens are kept as written (after macro expansion)
/// and interpreted only when the engine executes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScriptInstruction {
    pub tokens: Vec<String>,
}

impl ScriptInstruction {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn opcode(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or_default()
    }

    pub fn operands(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptDef {
    pub id: i32,
    pub instructions: Vec<ScriptInstruction>,
}

impl ScriptDef {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            instructions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

pub type ScriptTable = BTreeMap<i32, ScriptDef>;
