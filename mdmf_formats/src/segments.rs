//! Segment discovery and `#import` splicing over the cleaned line buffer.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::config::{LoaderConfig, ParseMode};
use crate::error::{LoadError, Result};
use crate::preprocess::read_lines;

pub const SEGMENT_DIRECTIVE: &str = "#Segment";
pub const SEGMENT_END: &str = "End";
pub const IMPORT_DIRECTIVES: [&str; 2] = ["#import", "#include"];

pub fn first_word(line: &str) -> &str {
    line.split(' ').next().unwrap_or_default()
}

pub fn is_segment_line(line: &str) -> bool {
    first_word(line) == SEGMENT_DIRECTIVE
}

fn is_segment_end(line: &str) -> bool {
    let mut words = line.split(' ');
    words.next() == Some(SEGMENT_DIRECTIVE) && words.next() == Some(SEGMENT_END)
}

pub fn is_import_line(line: &str) -> bool {
    IMPORT_DIRECTIVES.contains(&first_word(line))
}

/// Segment aliases in declaration order, each mapped to the index of the
/// `#Segment` line that declared it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentIndex {
    entries: Vec<(String, usize)>,
}

impl SegmentIndex {
    pub fn get(&self, alias: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, index)| *index)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .map(|(name, index)| (name.as_str(), *index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan for `#Segment [a, b, ..]` declarations, starting after the format
/// header and stopping at `#Segment End`.
pub fn find_segments(lines: &[String], mode: ParseMode) -> Result<SegmentIndex> {
    let mut index = SegmentIndex::default();
    for (line_no, line) in lines.iter().enumerate().skip(1) {
        if !is_segment_line(line) {
            continue;
        }
        if is_segment_end(line) {
            log::debug!("found {} segment aliases before line {line_no}", index.len());
            return Ok(index);
        }
        for alias in parse_aliases(line, line_no)? {
            if index.contains(&alias) {
                return Err(LoadError::structural(
                    line_no,
                    format!("segment '{alias}' is declared more than once"),
                ));
            }
            index.entries.push((alias, line_no));
        }
    }

    let message = "expected '#Segment End' or further data, found end-of-file";
    if mode.is_strict() {
        return Err(LoadError::structural(lines.len(), message));
    }
    log::warn!("{message}; continuing in lenient mode");
    Ok(index)
}

fn parse_aliases(line: &str, line_no: usize) -> Result<Vec<String>> {
    let rest = line[SEGMENT_DIRECTIVE.len()..].trim_start();
    if !rest.starts_with('[') {
        return Err(LoadError::structural(
            line_no,
            format!("segment declaration '{line}' must list its names in '[..]'"),
        ));
    }
    let close = rest.find(']').ok_or_else(|| {
        LoadError::structural(line_no, format!("segment declaration '{line}' is missing ']'"))
    })?;
    rest[1..close]
        .split(',')
        .map(str::trim)
        .map(|alias| {
            if alias.is_empty() {
                Err(LoadError::structural(
                    line_no,
                    format!("segment declaration '{line}' has an empty name"),
                ))
            } else {
                Ok(alias.to_string())
            }
        })
        .collect()
}

/// Body of the segment declared at `header`: the lines strictly between
/// that line and the next `#Segment` line, or the end of the buffer.
pub fn segment_body(lines: &[String], header: usize) -> Range<usize> {
    let start = header + 1;
    let end = lines
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, line)| is_segment_line(line))
        .map_or(lines.len(), |(index, _)| index);
    start..end.max(start)
}

/// `path::segment` operand of an import directive. An empty path refers to
/// the buffer being loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTarget {
    pub path: String,
    pub segment: String,
}

impl ImportTarget {
    pub fn parse(spec: &str) -> std::result::Result<Self, String> {
        let (path, segment) = spec
            .split_once("::")
            .ok_or_else(|| format!("import '{spec}' is missing '::'"))?;
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(format!("import '{spec}' names no segment"));
        }
        Ok(Self {
            path: path.trim().to_string(),
            segment: segment.to_string(),
        })
    }

    pub fn is_local(&self) -> bool {
        self.path.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub passes: usize,
    pub splices: usize,
}

/// Splice every `#import`/`#include` directive with the body of the segment
/// it names until none remain. Each pass expands the directives present at
/// its start, last line first, so earlier indices stay valid while splicing.
pub fn resolve_imports(
    lines: &mut Vec<String>,
    config: &LoaderConfig,
    base_dir: Option<&Path>,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    loop {
        let sites: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| is_import_line(line))
            .map(|(index, _)| index)
            .collect();
        let Some(&first) = sites.first() else {
            return Ok(stats);
        };
        if stats.passes == config.max_import_depth {
            return Err(LoadError::structural(
                first,
                format!(
                    "maximum import depth ({}) exceeded",
                    config.max_import_depth
                ),
            ));
        }
        stats.passes += 1;

        for &site in sites.iter().rev() {
            let body = import_body(lines, site, config, base_dir)?;
            log::debug!(
                "import pass {}: '{}' spliced {} lines at line {site}",
                stats.passes,
                lines[site],
                body.len()
            );
            lines.splice(site..=site, body);
            stats.splices += 1;
        }
    }
}

fn import_body(
    lines: &[String],
    site: usize,
    config: &LoaderConfig,
    base_dir: Option<&Path>,
) -> Result<Vec<String>> {
    let directive = &lines[site];
    let spec = directive[first_word(directive).len()..].trim();
    if spec.is_empty() {
        return Err(LoadError::structural(
            site,
            format!("'{directive}' names no import target"),
        ));
    }
    let target = ImportTarget::parse(spec).map_err(|message| LoadError::structural(site, message))?;

    if target.is_local() {
        return segment_lines(lines, &target.segment, config.mode)
            .map_err(|err| wrap_import_error(site, spec, err));
    }

    let path = match base_dir {
        Some(dir) => dir.join(&target.path),
        None => PathBuf::from(&target.path),
    };
    let source = read_lines(&path).map_err(|err| wrap_import_error(site, spec, err))?;
    segment_lines(&source, &target.segment, config.mode)
        .map_err(|err| wrap_import_error(site, spec, err))
}

fn segment_lines(lines: &[String], segment: &str, mode: ParseMode) -> Result<Vec<String>> {
    let index = find_segments(lines, mode)?;
    let header = index.get(segment).ok_or_else(|| {
        LoadError::structural(0, format!("no segment named '{segment}'"))
    })?;
    Ok(lines[segment_body(lines, header)].to_vec())
}

fn wrap_import_error(site: usize, spec: &str, err: LoadError) -> LoadError {
    LoadError::structural(site, format!("importing {spec}: {err}"))
}
