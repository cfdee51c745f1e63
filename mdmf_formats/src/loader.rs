use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use serde::Serialize;

use crate::autofield::Autofield;
use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};
use crate::level::{LevelData, Sector};
use crate::link::link_planes;
use crate::preprocess::{preprocess_text, read_lines};
use crate::registry::Object;
use crate::script::{ScriptDef, ScriptInstruction, ScriptTable};
use crate::segments::{
    SegmentIndex, find_segments, first_word, is_segment_line, resolve_imports, segment_body,
};
use crate::tokenize::{MacroTable, fuse_argument_refs, preprocess_line};
use crate::value::{Value, parse_value};

pub const FORMAT_DIRECTIVE: &str = "#Format";
pub const FORMAT_NAME: &str = "MDMF";
pub const LEGACY_FORMAT_NAME: &str = "4DGTrack";

pub const DEFINES_SEGMENT: &str = "Defines";
pub const SCRIPTS_SEGMENT: &str = "Scripts";
pub const LINES_SEGMENT: &str = "Lines";
pub const SECTORS_SEGMENT: &str = "Sectors";

const DEFINE_DIRECTIVE: &str = "#define";
const THEME_DIRECTIVE: &str = "#Theme";
const NAME_DIRECTIVE: &str = "#Name";
const SCRIPT_BEGIN: &str = "begin";
const SCRIPT_END: &str = "end";

/// A fully loaded level: metadata, the linked level model, and the script
/// table the engine runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MdmfFile {
    pub theme: Option<String>,
    pub name: Option<String>,
    pub level: LevelData,
    pub scripts: ScriptTable,
}

impl MdmfFile {
    /// Parse level text. Imports resolve against the working directory.
    pub fn parse_str(text: &str, config: &LoaderConfig) -> Result<Self> {
        Self::from_lines(preprocess_text(text), config, None)
    }

    /// Load a level file. Imports resolve against the file's directory.
    pub fn open(path: &Path, config: &LoaderConfig) -> Result<Self> {
        let lines = read_lines(path)?;
        log::info!("loading {} ({} lines)", path.display(), lines.len());
        Self::from_lines(lines, config, path.parent())
    }

    /// Load from an already preprocessed line buffer.
    pub fn from_lines(
        lines: Vec<String>,
        config: &LoaderConfig,
        base_dir: Option<&Path>,
    ) -> Result<Self> {
        LoadContext {
            lines,
            config,
            base_dir,
            macros: MacroTable::new(),
            scripts: ScriptTable::new(),
            line_defs: BTreeMap::new(),
            sectors: Vec::new(),
        }
        .run()
    }

    pub fn script(&self, id: i32) -> Option<&ScriptDef> {
        self.scripts.get(&id)
    }
}

/// Per-load state. Nothing here outlives a single call to `run`.
struct LoadContext<'a> {
    lines: Vec<String>,
    config: &'a LoaderConfig,
    base_dir: Option<&'a Path>,
    macros: MacroTable,
    scripts: ScriptTable,
    line_defs: BTreeMap<i32, Autofield>,
    sectors: Vec<Sector>,
}

impl LoadContext<'_> {
    fn run(mut self) -> Result<MdmfFile> {
        self.check_format()?;
        let (theme, name) = self.read_metadata()?;

        let imports = resolve_imports(&mut self.lines, self.config, self.base_dir)?;
        if imports.splices > 0 {
            log::info!(
                "spliced {} imports over {} passes",
                imports.splices,
                imports.passes
            );
        }

        let segments = find_segments(&self.lines, self.config.mode)?;
        if let Some(body) = self.body(&segments, DEFINES_SEGMENT) {
            self.consume_defines(body)?;
            log::debug!("{} defines", self.macros.len());
        }
        if let Some(body) = self.body(&segments, SCRIPTS_SEGMENT) {
            self.consume_scripts(body)?;
            log::debug!("{} scripts", self.scripts.len());
        }
        if let Some(body) = self.body(&segments, LINES_SEGMENT) {
            self.consume_lines(body)?;
            log::debug!("{} line definitions", self.line_defs.len());
        }
        match self.body(&segments, SECTORS_SEGMENT) {
            Some(body) => self.consume_sectors(body)?,
            None if self.config.mode.is_strict() => {
                return Err(LoadError::structural(
                    self.lines.len(),
                    "level has no Sectors segment",
                ));
            }
            None => log::warn!("level has no Sectors segment; loading it empty"),
        }

        let plane_defs = link_planes(&self.line_defs, &self.sectors)?;
        log::info!(
            "loaded {} sectors, {} plane defs, {} scripts",
            self.sectors.len(),
            plane_defs.len(),
            self.scripts.len()
        );
        Ok(MdmfFile {
            theme,
            name,
            level: LevelData {
                sectors: self.sectors,
                plane_defs,
            },
            scripts: self.scripts,
        })
    }

    fn check_format(&self) -> Result<()> {
        let header = self
            .lines
            .first()
            .ok_or_else(|| LoadError::Format("file is empty".to_string()))?;
        let mut words = header.split(' ');
        if words.next() != Some(FORMAT_DIRECTIVE) {
            return Err(LoadError::Format(format!(
                "expected '{FORMAT_DIRECTIVE} {FORMAT_NAME}' on the first line, found '{header}'"
            )));
        }
        match words.next() {
            Some(FORMAT_NAME) => Ok(()),
            Some(LEGACY_FORMAT_NAME) => Err(LoadError::Format(format!(
                "'{LEGACY_FORMAT_NAME}' is the legacy track format; convert the level to {FORMAT_NAME}"
            ))),
            Some(other) => Err(LoadError::Format(format!("unrecognized format '{other}'"))),
            None => Err(LoadError::Format(format!(
                "'{FORMAT_DIRECTIVE}' names no format"
            ))),
        }
    }

    /// `#Theme` and `#Name` directives between the header and the first
    /// segment. A file must declare at least one segment.
    fn read_metadata(&self) -> Result<(Option<String>, Option<String>)> {
        let mut theme = None;
        let mut name = None;
        for line in self.lines.iter().skip(1) {
            if is_segment_line(line) {
                return Ok((theme, name));
            }
            let word = first_word(line);
            let rest = line[word.len()..].trim();
            match word {
                THEME_DIRECTIVE => theme = Some(rest.to_string()),
                NAME_DIRECTIVE => name = Some(rest.to_string()),
                _ => log::debug!("ignoring header directive '{line}'"),
            }
        }
        Err(LoadError::structural(self.lines.len(), "file has no segments"))
    }

    fn body(&self, segments: &SegmentIndex, name: &str) -> Option<Range<usize>> {
        segments
            .get(name)
            .map(|header| segment_body(&self.lines, header))
    }

    /// Fails in strict mode, logs and carries on in lenient mode.
    fn skip_or_fail(&self, line_no: usize, error: LoadError) -> Result<()> {
        if self.config.mode.is_strict() {
            return Err(error);
        }
        log::warn!("skipping line {line_no}: {error}");
        Ok(())
    }

    fn expect_line_end(&self, tokens: &[String], last: usize, line_no: usize) -> Result<()> {
        match tokens.get(last + 1) {
            None => Ok(()),
            Some(extra) => self.skip_or_fail(
                line_no,
                LoadError::value(line_no, format!("unexpected trailing tokens starting at '{extra}'")),
            ),
        }
    }

    fn consume_defines(&mut self, body: Range<usize>) -> Result<()> {
        for line_no in body {
            let line = &self.lines[line_no];
            if first_word(line) != DEFINE_DIRECTIVE {
                self.skip_or_fail(
                    line_no,
                    LoadError::structural(line_no, format!("expected '#define', found '{line}'")),
                )?;
                continue;
            }
            let raw = preprocess_line(line, &MacroTable::new());
            let Some(name) = raw.get(1) else {
                return Err(LoadError::structural(line_no, "'#define' without a name"));
            };
            if self.macros.contains(name) {
                return Err(LoadError::structural(
                    line_no,
                    format!("macro '{name}' is defined more than once"),
                ));
            }
            let expanded = preprocess_line(line, &self.macros);
            let value = expanded.get(2..).unwrap_or_default().join(" ");
            log::debug!("#define {name} = {value}");
            self.macros.define(name.clone(), value);
        }
        Ok(())
    }

    fn consume_scripts(&mut self, body: Range<usize>) -> Result<()> {
        let mut cursor = body.start;
        while cursor < body.end {
            let header = cursor;
            cursor += 1;
            let tokens = preprocess_line(&self.lines[header], &self.macros);
            let Some(id) = script_header(&tokens, header) else {
                return Err(LoadError::structural(
                    header,
                    format!("expected '@<id> begin', found '{}'", self.lines[header]),
                ));
            };
            if self.scripts.contains_key(&id) {
                return Err(LoadError::structural(
                    header,
                    format!("script @{id} is defined more than once"),
                ));
            }

            let mut def = ScriptDef::new(id);
            loop {
                if cursor >= body.end {
                    let message = if self.lines.get(cursor).is_some_and(|line| is_segment_line(line)) {
                        format!("unexpected segment delimiter inside script @{id}; expected '{SCRIPT_END}'")
                    } else {
                        format!("script @{id} reaches end-of-file before '{SCRIPT_END}'")
                    };
                    return Err(LoadError::structural(cursor, message));
                }
                let tokens = fuse_argument_refs(preprocess_line(&self.lines[cursor], &self.macros));
                let line_no = cursor;
                cursor += 1;
                if tokens.first().map(String::as_str) == Some(SCRIPT_END) {
                    if tokens.len() > 1 {
                        self.skip_or_fail(
                            line_no,
                            LoadError::structural(line_no, format!("unexpected tokens after '{SCRIPT_END}'")),
                        )?;
                    }
                    break;
                }
                def.instructions.push(ScriptInstruction::new(tokens));
            }
            log::debug!("script @{id}: {} instructions", def.len());
            self.scripts.insert(id, def);
        }
        Ok(())
    }

    fn consume_lines(&mut self, body: Range<usize>) -> Result<()> {
        for line_no in body {
            let tokens = preprocess_line(&self.lines[line_no], &self.macros);
            let (key, last) = parse_value(&tokens, 0, line_no)?;
            let id = key.as_integer().ok_or_else(|| {
                LoadError::value(
                    line_no,
                    format!("line key must be an integer id, found a {}", key.kind()),
                )
            })?;
            let (field, last) = parse_value(&tokens, last + 1, line_no)?;
            let field = match field {
                Value::Autofield(field) => field,
                other => {
                    return Err(LoadError::value(
                        line_no,
                        format!("line @{id} expects an autofield, found a {}", other.kind()),
                    ));
                }
            };
            self.expect_line_end(&tokens, last, line_no)?;
            if self.line_defs.contains_key(&id) {
                return Err(LoadError::structural(
                    line_no,
                    format!("line @{id} is defined more than once"),
                ));
            }
            self.line_defs.insert(id, field);
        }
        Ok(())
    }

    fn consume_sectors(&mut self, body: Range<usize>) -> Result<()> {
        for line_no in body {
            let tokens = preprocess_line(&self.lines[line_no], &self.macros);
            let (value, last) = parse_value(&tokens, 0, line_no)?;
            let sector = match value {
                Value::Object(Object::Sector(sector)) => sector,
                other => {
                    return Err(LoadError::value(
                        line_no,
                        format!("expected a [Sector] object, found a {}", other.kind()),
                    ));
                }
            };
            self.expect_line_end(&tokens, last, line_no)?;
            sector.check_triangles().map_err(|(slot, index)| {
                LoadError::value(
                    line_no,
                    format!(
                        "triangle {slot} of sector {} references vertex {index}, but the sector has {} vertices",
                        sector.sector_id,
                        sector.boundary.vertices.len()
                    ),
                )
            })?;
            self.sectors.push(*sector);
        }
        Ok(())
    }
}

/// `@<id> begin`
fn script_header(tokens: &[String], line_no: usize) -> Option<i32> {
    if tokens.len() != 2 || tokens[1] != SCRIPT_BEGIN {
        return None;
    }
    match parse_value(tokens, 0, line_no) {
        Ok((Value::Identifier(id), 0)) => Some(id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autofield::FieldTag;
    use crate::error::LinkError;
    use glam::Vec3;
    use std::fs;

    const SECTOR_LINE: &str = "[Sector]{ SectorId: @1, CellFloor: FLOOR, CellHeight: 4, Boundary: [SectorBoundary]{ Kernel: <0.25,0.25,0>, Vertices: [Vector3][<0,0,0>, <1,0,0>, <0,1,0>], Triangles: [Autofield][{: %<0,1,2>, DOOR, #NoWall :}] } }";

    fn sample_level() -> String {
        format!(
            "#Format MDMF\n\
             #Theme hell\n\
             #Name The Long Hall\n\
             #Segment [Defines]\n\
             #define DOOR @7 // the hall door\n\
             #define FLOOR -1\n\
             #Segment [Scripts]\n\
             @1 begin\n\
             OpenDoor $1\n\
             Delay 0.5\n\
             ScriptRun 2 $1\n\
             end\n\
             @2 begin\n\
             CloseDoor $1\n\
             end\n\
             #Segment [Lines]\n\
             DOOR {{: #TriggerOnce :}}\n\
             #Segment [Sectors]\n\
             {SECTOR_LINE}\n\
             #Segment End\n"
        )
    }

    fn load(text: &str) -> Result<MdmfFile> {
        MdmfFile::parse_str(text, &LoaderConfig::strict())
    }

    #[test]
    fn minimal_level_is_empty() {
        let file = load("#Format MDMF\n#Segment [Sectors]\n#Segment End\n").expect("load");
        assert!(file.level.is_empty());
        assert!(file.scripts.is_empty());
        assert_eq!(file.theme, None);
    }

    #[test]
    fn missing_sectors_segment_is_strict_only() {
        let text = "#Format MDMF\n#Segment [Lines]\n#Segment End\n";
        let err = load(text).unwrap_err();
        assert!(err.to_string().contains("no Sectors segment"), "{err}");
        let file = MdmfFile::parse_str(text, &LoaderConfig::lenient()).expect("lenient load");
        assert!(file.level.is_empty());
    }

    #[test]
    fn format_header_is_checked() {
        for (text, needle) in [
            ("", "empty"),
            ("#Segment [Sectors]\n#Segment End\n", "expected '#Format MDMF'"),
            ("#Format 4DGTrack\n#Segment [Sectors]\n#Segment End\n", "legacy"),
            ("#Format Quake\n#Segment [Sectors]\n#Segment End\n", "unrecognized format 'Quake'"),
        ] {
            let err = load(text).unwrap_err();
            assert!(matches!(err, LoadError::Format(_)), "{err}");
            assert!(err.to_string().contains(needle), "{err}");
        }
    }

    #[test]
    fn loads_the_full_pipeline() {
        let file = load(&sample_level()).expect("load");
        assert_eq!(file.theme.as_deref(), Some("hell"));
        assert_eq!(file.name.as_deref(), Some("The Long Hall"));

        let sector = file.level.sector(1).expect("sector 1");
        assert_eq!(sector.cell_floor, -1.0);
        assert_eq!(sector.boundary.vertices.len(), 3);
        assert!(sector.boundary.triangles[0].has_tag(FieldTag::NoWall));

        let door = &file.level.plane_defs[&7];
        assert_eq!(door.vertices, vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
        assert!(door.tags.contains(&FieldTag::TriggerOnce));

        let opener = file.script(1).expect("script 1");
        let tokens: Vec<_> = opener
            .instructions
            .iter()
            .map(|instruction| instruction.tokens.join(" "))
            .collect();
        assert_eq!(tokens, vec!["OpenDoor $1", "Delay 0.5", "ScriptRun 2 $1"]);
        assert_eq!(file.script(2).map(ScriptDef::len), Some(1));
    }

    #[test]
    fn duplicates_are_structural_errors() {
        let level = sample_level();
        for (from, to) in [
            ("#define FLOOR -1\n", "#define FLOOR -1\n#define FLOOR 2\n"),
            ("@2 begin", "@1 begin"),
            ("DOOR {: #TriggerOnce :}\n", "DOOR {: #TriggerOnce :}\n@7 {: :}\n"),
        ] {
            let text = level.replacen(from, to, 1);
            let err = load(&text).unwrap_err();
            assert!(matches!(err, LoadError::Structural { .. }), "{to}: {err}");
            assert!(err.to_string().contains("more than once"), "{err}");
        }
    }

    #[test]
    fn script_without_end_hits_segment_delimiter() {
        let text = sample_level().replacen("CloseDoor $1\nend\n", "CloseDoor $1\n", 1);
        let err = load(&text).unwrap_err();
        assert!(err.to_string().contains("unexpected segment delimiter"), "{err}");
    }

    #[test]
    fn malformed_script_header_fails_in_both_modes() {
        let text = sample_level().replacen("@1 begin", "@1 start", 1);
        for config in [LoaderConfig::strict(), LoaderConfig::lenient()] {
            let err = MdmfFile::parse_str(&text, &config).unwrap_err();
            assert!(
                matches!(err, LoadError::Structural { line: 7, .. }),
                "{:?}: {err}",
                config.mode
            );
            assert!(err.to_string().contains("'@1 start'"), "{err}");
        }
    }

    #[test]
    fn file_without_segments_is_rejected() {
        for config in [LoaderConfig::strict(), LoaderConfig::lenient()] {
            let err = MdmfFile::parse_str("#Format MDMF\n#Name Empty\n", &config).unwrap_err();
            assert!(matches!(err, LoadError::Structural { .. }), "{err}");
            assert!(err.to_string().contains("no segments"), "{err}");
        }
    }

    #[test]
    fn trailing_tokens_are_skipped_only_when_lenient() {
        let text = sample_level().replacen("#TriggerOnce :}", "#TriggerOnce :} extra", 1);
        let err = load(&text).unwrap_err();
        assert!(err.to_string().contains("trailing tokens"), "{err}");
        let file = MdmfFile::parse_str(&text, &LoaderConfig::lenient()).expect("lenient");
        assert!(file.level.plane_defs.contains_key(&7));
    }

    #[test]
    fn stray_define_lines_depend_on_mode() {
        let text = sample_level().replacen("#define FLOOR -1\n", "#define FLOOR -1\nFLOOR\n", 1);
        assert!(load(&text).is_err());
        assert!(MdmfFile::parse_str(&text, &LoaderConfig::lenient()).is_ok());
    }

    #[test]
    fn triangle_indices_are_bounds_checked() {
        let text = sample_level().replacen("%<0,1,2>", "%<0,1,3>", 1);
        let err = load(&text).unwrap_err();
        assert!(matches!(err, LoadError::Value { line: 18, .. }), "{err}");
        assert!(err.to_string().contains("references vertex 3"), "{err}");
    }

    #[test]
    fn undeclared_plane_is_a_link_error() {
        let text = sample_level().replacen("DOOR {: #TriggerOnce :}", "@8 {: #TriggerOnce :}", 1);
        let err = load(&text).unwrap_err();
        assert!(
            matches!(
                err,
                LoadError::Link(LinkError::UnknownPlane {
                    plane_id: 7,
                    sector_id: 1
                })
            ),
            "{err}"
        );
    }

    #[test]
    fn open_resolves_imports_next_to_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("common.mdmf"),
            "#Format MDMF\n#Segment [Doors]\n#define DOOR @7\n#Segment End\n",
        )
        .expect("write import");
        let level = sample_level().replacen("#define DOOR @7 // the hall door", "#import common.mdmf::Doors", 1);
        let path = dir.path().join("hall.mdmf");
        fs::write(&path, level).expect("write level");

        let file = MdmfFile::open(&path, &LoaderConfig::strict()).expect("open");
        assert!(file.level.plane_defs.contains_key(&7));
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = MdmfFile::open(&dir.path().join("absent.mdmf"), &LoaderConfig::strict())
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }), "{err}");
    }
}
