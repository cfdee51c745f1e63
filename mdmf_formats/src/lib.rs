pub mod autofield;
pub mod config;
pub mod error;
pub mod level;
pub mod link;
pub mod loader;
pub mod orientation;
pub mod preprocess;
pub mod registry;
pub mod script;
pub mod segments;
pub mod tokenize;
pub mod value;

pub use autofield::{Autofield, FieldTag};
pub use config::{DEFAULT_MAX_IMPORT_DEPTH, LoaderConfig, ParseMode};
pub use error::{LinkError, LoadError};
pub use level::{LevelData, PlaneDef, Sector, SectorBoundary, SectorTransform};
pub use loader::MdmfFile;
pub use preprocess::{preprocess_text, read_lines};
pub use registry::{List, Object, TypeName};
pub use script::{ScriptDef, ScriptInstruction, ScriptTable};
pub use segments::{ImportStats, SegmentIndex, find_segments, resolve_imports};
pub use tokenize::{MacroTable, preprocess_line};
pub use value::{Value, ValueKind, parse_value};
