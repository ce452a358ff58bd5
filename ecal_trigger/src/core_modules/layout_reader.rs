// THEORY:
// The layout reader is the bridge between the detector description on disk and
// the in-memory `ModuleTable`. It is deliberately tolerant: a single malformed
// record is reported, logged and skipped, and the rest of the file still
// loads. Only a file that cannot be read at all is fatal.
//
// Record format, one module per line:
//     type cell row col x y ncol
// `type` is the tile size (42, 40 or 38) and `x`, `y` are integer millimetre
// offsets from the detector's center. Lines starting with `#` and blank lines
// are skipped wherever they appear.

use crate::core_modules::module::{Module, ModuleTable, Point, SizeClass};
use crate::error::{InputParseError, LayoutError, ParseIssue};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Where the layout's center origin lands in world coordinates.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub origin_x: f64,
    pub origin_y: f64,
    /// Negate layout y so that +y points up instead of down.
    pub flip_y: bool,
}

impl LayoutConfig {
    /// Layout offsets to a world-space module center.
    pub fn to_world(&self, x: f64, y: f64) -> Point {
        let y = if self.flip_y { -y } else { y };
        Point::new(self.origin_x + x, self.origin_y + y)
    }

    /// Inverse of [`LayoutConfig::to_world`].
    pub fn to_layout(&self, point: Point) -> Point {
        let y = point.y - self.origin_y;
        Point::new(point.x - self.origin_x, if self.flip_y { 0.0 - y } else { y })
    }
}

/// One parsed line of the layout file.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRecord {
    pub size_class: SizeClass,
    pub cell: u32,
    pub row: i64,
    pub col: i64,
    pub x: i64,
    pub y: i64,
    pub ncol: i64,
}

/// Result of loading a layout: the table plus every record that was skipped.
#[derive(Debug, Clone, Default)]
pub struct LayoutLoad {
    pub table: ModuleTable,
    pub skipped: Vec<InputParseError>,
}

/// A set of cell ids to remove from the table, plus skipped tokens.
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    pub cells: BTreeSet<u32>,
    pub skipped: Vec<InputParseError>,
}

fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn parse_field<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    field: &'static str,
    line: usize,
) -> Result<i64, InputParseError> {
    let token = tokens.next().ok_or(InputParseError {
        line,
        issue: ParseIssue::MissingField(field),
    })?;
    token.parse::<i64>().map_err(|_| InputParseError {
        line,
        issue: ParseIssue::InvalidNumber {
            field,
            token: token.to_string(),
        },
    })
}

/// Parses a single `type cell row col x y ncol` record. Extra trailing tokens are ignored.
pub fn parse_record(text: &str, line: usize) -> Result<LayoutRecord, InputParseError> {
    let mut tokens = text.split_whitespace();
    let kind = parse_field(&mut tokens, "type", line)?;
    let cell = parse_field(&mut tokens, "cell", line)?;
    let row = parse_field(&mut tokens, "row", line)?;
    let col = parse_field(&mut tokens, "col", line)?;
    let x = parse_field(&mut tokens, "x", line)?;
    let y = parse_field(&mut tokens, "y", line)?;
    let ncol = parse_field(&mut tokens, "ncol", line)?;

    let size_class = SizeClass::from_type(kind).ok_or(InputParseError {
        line,
        issue: ParseIssue::UnknownSizeClass(kind),
    })?;
    let cell = u32::try_from(cell).map_err(|_| InputParseError {
        line,
        issue: ParseIssue::InvalidNumber {
            field: "cell",
            token: cell.to_string(),
        },
    })?;

    Ok(LayoutRecord {
        size_class,
        cell,
        row,
        col,
        x,
        y,
        ncol,
    })
}

/// Builds a module table from layout text, skipping (and logging) bad records.
pub fn parse_layout(text: &str, config: &LayoutConfig) -> LayoutLoad {
    let mut load = LayoutLoad::default();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if is_ignorable(raw) {
            continue;
        }

        let record = match parse_record(raw, line) {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, "skipping layout record");
                load.skipped.push(err);
                continue;
            }
        };

        let center = config.to_world(record.x as f64, record.y as f64);
        if !load.table.insert(Module::new(record.cell, center, record.size_class)) {
            let err = InputParseError {
                line,
                issue: ParseIssue::DuplicateCell(record.cell),
            };
            warn!(%err, "skipping layout record");
            load.skipped.push(err);
        }
    }

    let counts = load.table.counts();
    info!(
        total = counts.total(),
        s42 = counts.s42,
        s40 = counts.s40,
        s38 = counts.s38,
        skipped = load.skipped.len(),
        "layout loaded"
    );
    load
}

/// Reads and parses a layout file. A missing or unreadable file is fatal.
pub fn load_layout(path: &Path, config: &LayoutConfig) -> Result<LayoutLoad, LayoutError> {
    let text = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_layout(&text, config))
}

/// Parses a whitespace separated list of cell ids; `#` starts a comment.
pub fn parse_exclusions(text: &str) -> ExclusionList {
    let mut list = ExclusionList::default();
    for (index, raw) in text.lines().enumerate() {
        let content = raw.split('#').next().unwrap_or_default();
        for token in content.split_whitespace() {
            match token.parse::<u32>() {
                Ok(cell) => {
                    list.cells.insert(cell);
                }
                Err(_) => {
                    let err = InputParseError {
                        line: index + 1,
                        issue: ParseIssue::InvalidNumber {
                            field: "cell",
                            token: token.to_string(),
                        },
                    };
                    warn!(%err, "skipping exclusion entry");
                    list.skipped.push(err);
                }
            }
        }
    }
    list
}

pub fn load_exclusions(path: &Path) -> Result<ExclusionList, LayoutError> {
    let text = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_exclusions(&text))
}
