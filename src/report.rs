//! Plain-text rendering of coverage snapshots.

use std::fmt::Write;

use crate::model::{CoverageSnapshot, FileCoverage, LineStatus};
use crate::repository::{ScanOutcome, ScanStatus};

/// One-paragraph header: status, message, primary report and overall rate.
#[must_use]
pub fn format_outcome(outcome: &ScanOutcome) -> String {
    let mut out = String::new();
    let label = match outcome.status {
        ScanStatus::Ok => "ok",
        ScanStatus::Empty => "no data",
        ScanStatus::Error => "error",
    };
    writeln!(out, "Status:     {label} ({})", outcome.message).unwrap();

    let snapshot = &outcome.snapshot;
    if let (Some(path), Some(format)) = (&snapshot.report_path, snapshot.report_format) {
        writeln!(out, "Report:     {} ({format})", path.display()).unwrap();
    }
    if snapshot.sources.len() > 1 {
        writeln!(out, "Merged:     {} reports", snapshot.sources.len()).unwrap();
    }
    if !snapshot.is_empty() {
        writeln!(
            out,
            "Lines:      {}/{} ({:.1}%)",
            snapshot.covered_lines(),
            snapshot.coverable_lines(),
            snapshot.coverage_percentage()
        )
        .unwrap();
    }
    if let Some(pct) = snapshot.summary_percentage {
        writeln!(out, "Reported:   {pct:.1}%").unwrap();
    }
    out.push_str(&format_notices(snapshot));
    out
}

#[must_use]
pub fn format_notices(snapshot: &CoverageSnapshot) -> String {
    let mut out = String::new();
    for notice in &snapshot.notices {
        writeln!(out, "Note:       {}: {}", notice.path.display(), notice.message).unwrap();
    }
    out
}

/// Per-project table, sorted by name.
#[must_use]
pub fn format_projects(snapshot: &CoverageSnapshot) -> String {
    let mut out = String::new();
    if snapshot.projects.is_empty() {
        return out;
    }
    writeln!(
        out,
        "{:<40} {:>6} {:>8} {:>8} {:>8}",
        "PROJECT", "FILES", "LINES", "COVERED", "RATE"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(74)).unwrap();
    for p in snapshot.projects.values() {
        writeln!(
            out,
            "{:<40} {:>6} {:>8} {:>8} {:>7.1}%",
            p.name,
            p.files,
            p.coverable_lines,
            p.covered_lines,
            p.coverage_percentage()
        )
        .unwrap();
    }
    out
}

/// Per-file table; optionally worst-covered first.
#[must_use]
pub fn format_files(snapshot: &CoverageSnapshot, sort_by_coverage: bool) -> String {
    let mut files: Vec<&FileCoverage> = snapshot.files.values().collect();
    if sort_by_coverage {
        files.sort_by(|a, b| a.coverage_percentage().total_cmp(&b.coverage_percentage()));
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "FILE", "LINES", "COVERED", "RATE"
    )
    .unwrap();
    writeln!(out, "{}", "-".repeat(88)).unwrap();

    for f in files {
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>7.1}%",
            f.path,
            f.coverable_lines(),
            f.covered_lines(),
            f.coverage_percentage()
        )
        .unwrap();
    }
    out
}

/// Line listing for one file, or just the uncovered ranges.
#[must_use]
pub fn format_lines(file: &FileCoverage, uncovered: bool) -> String {
    let mut out = String::new();

    if uncovered {
        let missed = file.lines_with(LineStatus::NotCovered);
        let partial = file.lines_with(LineStatus::PartiallyCovered);
        if missed.is_empty() && partial.is_empty() {
            return format!("All coverable lines are covered in '{}'\n", file.path);
        }

        let all: Vec<u32> = file.lines().keys().copied().collect();
        writeln!(out, "Uncovered lines in '{}':", file.path).unwrap();
        if !missed.is_empty() {
            writeln!(out, "  {}", format_line_ranges(&missed, &all)).unwrap();
            writeln!(out, "  ({} lines)", missed.len()).unwrap();
        }
        if !partial.is_empty() {
            writeln!(out, "Partially covered: {}", format_line_ranges(&partial, &all)).unwrap();
        }
        return out;
    }

    writeln!(out, "{:>6}  STATUS", "LINE").unwrap();
    writeln!(out, "{}", "-".repeat(24)).unwrap();
    for (line_number, status) in file.lines() {
        let marker = match status {
            LineStatus::Covered => "✓ covered",
            LineStatus::PartiallyCovered => "~ partial",
            LineStatus::NotCovered => "✗ not covered",
        };
        writeln!(out, "{line_number:>6}  {marker}").unwrap();
    }
    out
}

/// Maximum number of consecutive non-coverable lines that can be bridged
/// when coalescing uncovered ranges. Gaps of up to this many lines (where none
/// of the gap lines are coverable) are merged into a single range.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging small
/// gaps where every line in the gap is non-coverable.
///
/// A gap between two lines is bridged only when:
/// 1. Every line in the gap is absent from `all_coverable`, AND
/// 2. The gap is at most [`MAX_BRIDGE_GAP`] lines wide.
///
/// Both `lines` and `all_coverable` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32], all_coverable: &[u32]) -> Vec<(u32, u32)> {
    if lines.is_empty() {
        return Vec::new();
    }

    debug_assert!(
        lines.windows(2).all(|w| w[0] < w[1]),
        "coalesce_ranges requires sorted, deduplicated input"
    );

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut start = lines[0];
    let mut end = lines[0];

    for &line in &lines[1..] {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP
            && (end + 1..line).all(|l| all_coverable.binary_search(&l).is_err())
        {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
///
/// The input slice must be sorted in ascending order.
#[must_use]
pub fn format_line_ranges(lines: &[u32], all_coverable: &[u32]) -> String {
    coalesce_ranges(lines, all_coverable)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectSummary;

    fn sample_file() -> FileCoverage {
        let mut file = FileCoverage::new("src/Gear.cs".into());
        file.set_line(1, LineStatus::Covered);
        file.set_line(2, LineStatus::NotCovered);
        file.set_line(3, LineStatus::NotCovered);
        file.set_line(6, LineStatus::NotCovered);
        file.set_line(7, LineStatus::PartiallyCovered);
        file
    }

    #[test]
    fn test_coalesce_ranges_empty() {
        assert_eq!(coalesce_ranges(&[], &[]), Vec::<(u32, u32)>::new());
    }

    #[test]
    fn test_coalesce_ranges_consecutive() {
        assert_eq!(coalesce_ranges(&[1, 2, 3], &[1, 2, 3]), vec![(1, 3)]);
    }

    #[test]
    fn test_coalesce_ranges_bridges_non_coverable_gap() {
        // Lines 4,5 not coverable → bridge
        assert_eq!(coalesce_ranges(&[2, 3, 6], &[1, 2, 3, 6, 7]), vec![(2, 6)]);
    }

    #[test]
    fn test_coalesce_ranges_no_bridge_over_coverable() {
        assert_eq!(coalesce_ranges(&[1, 3], &[1, 2, 3]), vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn test_coalesce_ranges_no_bridge_wide_gap() {
        assert_eq!(coalesce_ranges(&[1, 5], &[1, 5]), vec![(1, 1), (5, 5)]);
    }

    #[test]
    fn test_format_line_ranges() {
        assert_eq!(format_line_ranges(&[1, 2, 3, 8, 10], &[1, 2, 3, 8, 9, 10]), "1-3, 8, 10");
    }

    #[test]
    fn test_format_lines() {
        let out = format_lines(&sample_file(), false);
        assert!(out.contains("LINE"));
        assert!(out.contains("✓ covered"));
        assert!(out.contains("~ partial"));
        assert!(out.contains("✗ not covered"));
    }

    #[test]
    fn test_format_lines_uncovered() {
        let out = format_lines(&sample_file(), true);
        assert!(out.contains("Uncovered lines in 'src/Gear.cs':"));
        assert!(out.contains("  2-6"));
        assert!(out.contains("(3 lines)"));
        assert!(out.contains("Partially covered: 7"));
    }

    #[test]
    fn test_format_lines_all_covered() {
        let mut file = FileCoverage::new("a.cs".into());
        file.set_line(1, LineStatus::Covered);
        assert!(format_lines(&file, true).contains("All coverable lines are covered"));
    }

    #[test]
    fn test_format_files_sorted() {
        let mut snapshot = CoverageSnapshot::empty();
        let mut full = FileCoverage::new("src/Full.cs".into());
        full.set_line(1, LineStatus::Covered);
        snapshot.files.insert("full".into(), full);
        snapshot.files.insert("gear".into(), sample_file());

        let out = format_files(&snapshot, true);
        let gear = out.find("src/Gear.cs").unwrap();
        let full = out.find("src/Full.cs").unwrap();
        assert!(gear < full);
        assert!(out.contains("100.0%"));
        assert!(out.contains("40.0%"));
    }

    #[test]
    fn test_format_projects() {
        let mut snapshot = CoverageSnapshot::empty();
        let mut p = ProjectSummary::new("Widgets".into());
        p.add_file(&sample_file());
        snapshot.projects.insert("Widgets".into(), p);

        let out = format_projects(&snapshot);
        assert!(out.contains("PROJECT"));
        assert!(out.contains("Widgets"));
        assert!(out.contains("40.0%"));
    }
}
