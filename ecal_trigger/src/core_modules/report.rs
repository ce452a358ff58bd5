// THEORY:
// The report is the one persistent artifact of a run: the trigger-logic
// mapping, cluster by cluster, in a plain text format that splits cleanly on
// its separator lines.
//
//     # ecal trigger logic report
//     # units: mm
//     # ...header lines...
//     #-- logic 0 node 37 members 64
//          123     -420.0      210.0     42
//     #-- logic 1 node 38 members 64
//     ...
//
// Lines starting with `# ` are header comments. Lines starting with `#--` open
// a cluster section. Every other non-empty line is `cell x y size` with the
// coordinates in the layout file's frame.
//
// The reader is the inverse of the writer. It also answers the question the
// separate report-counting tool used to answer: how many distinct modules
// does the logic cover in total?

use crate::core_modules::layout_reader::LayoutConfig;
use crate::core_modules::logic_cluster::ClusterCollection;
use crate::core_modules::module::{ModuleTable, SizeClass};
use crate::error::ReportError;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

pub const SECTION_MARKER: &str = "#--";

/// Writes the full report: header block, then one section per cluster.
pub fn write_report<W: Write>(
    out: &mut W,
    table: &ModuleTable,
    clusters: &ClusterCollection,
    layout: &LayoutConfig,
) -> io::Result<()> {
    let counts = table.counts();
    writeln!(out, "# ecal trigger logic report")?;
    writeln!(out, "# units: mm")?;
    writeln!(
        out,
        "# coordinates: module center relative to the layout origin, x right, y {}",
        if layout.flip_y { "up" } else { "down" }
    )?;
    writeln!(
        out,
        "# modules: 42mm={} 40mm={} 38mm={} total={}",
        counts.s42,
        counts.s40,
        counts.s38,
        counts.total()
    )?;
    writeln!(out, "# clusters: {}", clusters.len())?;
    writeln!(out, "# columns: cell x y size")?;

    for (index, cluster) in clusters.iter().enumerate() {
        writeln!(
            out,
            "{SECTION_MARKER} logic {index} node {} members {}",
            cluster.anchor_node_index,
            cluster.len()
        )?;
        for module in cluster.members() {
            let relative = layout.to_layout(module.center);
            writeln!(
                out,
                "{:>8} {:>10.1} {:>10.1} {:>6}",
                module.id,
                relative.x,
                relative.y,
                module.size_class.label()
            )?;
        }
    }
    Ok(())
}

pub fn render_report(table: &ModuleTable, clusters: &ClusterCollection, layout: &LayoutConfig) -> io::Result<String> {
    let mut buffer = Vec::new();
    write_report(&mut buffer, table, clusters, layout)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn save_report(
    path: &Path,
    table: &ModuleTable,
    clusters: &ClusterCollection,
    layout: &LayoutConfig,
) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write_report(&mut file, table, clusters, layout)?;
    file.flush()?;
    info!(path = %path.display(), clusters = clusters.len(), "report written");
    Ok(())
}

/// One `cell x y size` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub cell: u32,
    pub x: f64,
    pub y: f64,
    pub size: SizeClass,
}

/// One cluster section.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub logic: usize,
    pub node_index: usize,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReport {
    pub sections: Vec<ReportSection>,
}

impl ParsedReport {
    /// Distinct cells covered by any section.
    pub fn unique_cells(&self) -> BTreeSet<u32> {
        self.sections.iter().flat_map(|s| s.rows.iter().map(|r| r.cell)).collect()
    }

    pub fn total_rows(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> ReportError {
    ReportError::Malformed {
        line,
        reason: reason.into(),
    }
}

/// Parses `logic <i> node <n> members <m>` after the section marker.
fn parse_section_header(text: &str, line: usize) -> Result<(ReportSection, usize), ReportError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [logic_kw, logic, node_kw, node, members_kw, members] = tokens.as_slice() else {
        return Err(malformed(line, "section header must read `logic <i> node <n> members <m>`"));
    };
    if (*logic_kw, *node_kw, *members_kw) != ("logic", "node", "members") {
        return Err(malformed(line, "section header must read `logic <i> node <n> members <m>`"));
    }
    let number = |token: &str| token.parse::<usize>().map_err(|_| malformed(line, format!("not a count: {token:?}")));
    Ok((
        ReportSection {
            logic: number(*logic)?,
            node_index: number(*node)?,
            rows: Vec::new(),
        },
        number(*members)?,
    ))
}

fn parse_row(text: &str, line: usize) -> Result<ReportRow, ReportError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [cell, x, y, size] = tokens.as_slice() else {
        return Err(malformed(line, format!("expected `cell x y size`, found {} fields", tokens.len())));
    };
    let cell = cell.parse::<u32>().map_err(|_| malformed(line, format!("bad cell id {cell:?}")))?;
    let x = x.parse::<f64>().map_err(|_| malformed(line, format!("bad x {x:?}")))?;
    let y = y.parse::<f64>().map_err(|_| malformed(line, format!("bad y {y:?}")))?;
    let size = size
        .parse::<i64>()
        .ok()
        .and_then(SizeClass::from_type)
        .ok_or_else(|| malformed(line, format!("bad size {size:?}")))?;
    Ok(ReportRow { cell, x, y, size })
}

/// Parses report text. Sections must list as many rows as their header declares.
pub fn parse_report(text: &str) -> Result<ParsedReport, ReportError> {
    let mut report = ParsedReport::default();
    let mut open: Option<(ReportSection, usize, usize)> = None;

    let close = |open: Option<(ReportSection, usize, usize)>, report: &mut ParsedReport| -> Result<(), ReportError> {
        if let Some((section, declared, header_line)) = open {
            if section.rows.len() != declared {
                return Err(malformed(
                    header_line,
                    format!("section declares {declared} members but lists {}", section.rows.len()),
                ));
            }
            report.sections.push(section);
        }
        Ok(())
    };

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(SECTION_MARKER) {
            close(open.take(), &mut report)?;
            let (section, declared) = parse_section_header(rest, line)?;
            open = Some((section, declared, line));
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }
        match open.as_mut() {
            Some((section, _, _)) => section.rows.push(parse_row(trimmed, line)?),
            None => return Err(malformed(line, "row before the first section")),
        }
    }
    close(open.take(), &mut report)?;
    Ok(report)
}

pub fn load_report(path: &Path) -> Result<ParsedReport, ReportError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_report(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::logic_cluster::Cluster;
    use crate::core_modules::module::{Module, Point};

    fn fixture() -> (ModuleTable, ClusterCollection) {
        let table: ModuleTable = vec![
            Module::new(10, Point::new(1000.0, 2000.0), SizeClass::S42),
            Module::new(11, Point::new(1042.0, 2000.0), SizeClass::S42),
            Module::new(12, Point::new(1040.0, 2041.0), SizeClass::S40),
            Module::new(13, Point::new(1078.0, 2041.0), SizeClass::S38),
        ]
        .into_iter()
        .collect();
        let pick = |ids: &[u32]| ids.iter().filter_map(|id| table.get(*id).cloned()).collect::<Vec<_>>();
        let clusters: ClusterCollection = vec![
            Cluster::from_members(4, Point::new(1000.0, 2000.0), 32, pick(&[10, 11, 12])),
            Cluster::from_members(9, Point::new(1078.0, 2041.0), 32, pick(&[13, 12])),
        ]
        .into_iter()
        .collect();
        (table, clusters)
    }

    fn layout() -> LayoutConfig {
        LayoutConfig {
            origin_x: 1000.0,
            origin_y: 2000.0,
            flip_y: false,
        }
    }

    #[test]
    fn header_states_units_and_counts() {
        let (table, clusters) = fixture();
        let text = render_report(&table, &clusters, &layout()).expect("render report");
        let header: Vec<&str> = text.lines().take(6).collect();
        assert_eq!(header[1], "# units: mm");
        assert_eq!(header[3], "# modules: 42mm=2 40mm=1 38mm=1 total=4");
        assert_eq!(header[4], "# clusters: 2");
    }

    #[test]
    fn rows_use_fixed_width_relative_columns() {
        let (table, clusters) = fixture();
        let text = render_report(&table, &clusters, &layout()).expect("render report");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[6], "#-- logic 0 node 4 members 3");
        assert_eq!(lines[7], "      10        0.0        0.0     42");
        assert_eq!(lines[9], "      12       40.0       41.0     40");
    }

    #[test]
    fn report_reads_back() {
        let (table, clusters) = fixture();
        let text = render_report(&table, &clusters, &layout()).expect("render report");
        let parsed = parse_report(&text).expect("valid report");
        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[1].node_index, 9);
        let cells: Vec<u32> = parsed.sections[1].rows.iter().map(|r| r.cell).collect();
        assert_eq!(cells, vec![13, 12]);
        assert_eq!(parsed.sections[1].rows[0].x, 78.0);
        assert_eq!(parsed.total_rows(), 5);
        assert_eq!(parsed.unique_cells().len(), 4);
    }

    #[test]
    fn sections_split_on_marker_lines() {
        let (table, clusters) = fixture();
        let text = render_report(&table, &clusters, &layout()).expect("render report");
        let sections: Vec<&str> = text.split(SECTION_MARKER).skip(1).collect();
        assert_eq!(sections.len(), clusters.len());
    }

    #[test]
    fn member_count_mismatch_is_rejected() {
        let text = "#-- logic 0 node 1 members 2\n 5 0.0 0.0 42\n";
        assert!(matches!(parse_report(text), Err(ReportError::Malformed { line: 1, .. })));
    }

    #[test]
    fn bad_rows_report_their_line() {
        let text = "# header\n#-- logic 0 node 1 members 1\n 5 0.0 zero 42\n";
        assert!(matches!(parse_report(text), Err(ReportError::Malformed { line: 3, .. })));
        let orphan = "  5 0.0 0.0 42\n";
        assert!(matches!(parse_report(orphan), Err(ReportError::Malformed { line: 1, .. })));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_reach_the_caller() {
        let (table, clusters) = fixture();
        let error = write_report(&mut FullDisk, &table, &clusters, &layout()).expect_err("writer refuses bytes");
        assert_eq!(error.kind(), io::ErrorKind::StorageFull);
    }

    #[test]
    fn saves_to_disk() {
        let (table, clusters) = fixture();
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("full_logic.txt");
        save_report(&path, &table, &clusters, &layout()).expect("write report");
        let parsed = load_report(&path).expect("read report");
        assert_eq!(parsed.sections.len(), 2);
    }
}
