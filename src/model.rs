//! Normalized in-memory representation of coverage data, independent of the
//! report format it was read from. Parsers produce a `ParsedReport`; the
//! repository folds reports into a `CoverageSnapshot`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::detect::Format;

/// Compute a coverage rate, returning 0.0 when the total is zero.
#[must_use]
pub fn rate(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Same as [`rate`], scaled to 0–100.
#[must_use]
pub fn percentage(covered: u64, total: u64) -> f64 {
    rate(covered, total) * 100.0
}

/// Coverage state of a single source line.
///
/// Variants are ordered from weakest to strongest so that merging two
/// observations of the same line can keep the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    NotCovered,
    /// Some, but not all, branches on the line were exercised.
    PartiallyCovered,
    Covered,
}

impl LineStatus {
    #[must_use]
    pub fn from_hits(hits: u64) -> Self {
        if hits > 0 {
            LineStatus::Covered
        } else {
            LineStatus::NotCovered
        }
    }

    /// Partially covered lines count as covered for line statistics.
    #[must_use]
    pub fn is_covered(self) -> bool {
        self != LineStatus::NotCovered
    }
}

/// Coverage for one source file.
///
/// Counts and percentage are always derived from the line map, never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileCoverage {
    /// Path as recorded by the tool that generated the report.
    pub path: String,
    /// Package or module this file was reported under, when the report says.
    pub project: Option<String>,
    lines: BTreeMap<u32, LineStatus>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Record the status of a line. A later call for the same line replaces
    /// the earlier one.
    pub fn set_line(&mut self, line_number: u32, status: LineStatus) {
        self.lines.insert(line_number, status);
    }

    /// Record a line, keeping the stronger of the existing and new status.
    pub fn merge_line(&mut self, line_number: u32, status: LineStatus) {
        let entry = self.lines.entry(line_number).or_insert(status);
        if status > *entry {
            *entry = status;
        }
    }

    /// Fold another record for the same file into this one.
    pub fn merge(&mut self, other: &FileCoverage) {
        for (&line_number, &status) in &other.lines {
            self.merge_line(line_number, status);
        }
        if self.project.is_none() {
            self.project.clone_from(&other.project);
        }
    }

    #[must_use]
    pub fn lines(&self) -> &BTreeMap<u32, LineStatus> {
        &self.lines
    }

    #[must_use]
    pub fn status(&self, line_number: u32) -> Option<LineStatus> {
        self.lines.get(&line_number).copied()
    }

    #[must_use]
    pub fn coverable_lines(&self) -> u64 {
        self.lines.len() as u64
    }

    #[must_use]
    pub fn covered_lines(&self) -> u64 {
        self.lines.values().filter(|s| s.is_covered()).count() as u64
    }

    #[must_use]
    pub fn coverage_percentage(&self) -> f64 {
        percentage(self.covered_lines(), self.coverable_lines())
    }

    /// Line numbers with the given status, ascending.
    #[must_use]
    pub fn lines_with(&self, status: LineStatus) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|(_, &s)| s == status)
            .map(|(&n, _)| n)
            .collect()
    }
}

impl Serialize for FileCoverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FileCoverage", 6)?;
        s.serialize_field("path", &self.path)?;
        s.serialize_field("project", &self.project)?;
        s.serialize_field("coverable_lines", &self.coverable_lines())?;
        s.serialize_field("covered_lines", &self.covered_lines())?;
        s.serialize_field("coverage_percentage", &self.coverage_percentage())?;
        s.serialize_field("lines", &self.lines)?;
        s.end()
    }
}

/// Line totals for one project, summed over its files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSummary {
    pub name: String,
    pub files: usize,
    pub coverable_lines: u64,
    pub covered_lines: u64,
}

impl ProjectSummary {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn add_file(&mut self, file: &FileCoverage) {
        self.files += 1;
        self.coverable_lines += file.coverable_lines();
        self.covered_lines += file.covered_lines();
    }

    /// Sum-of-counts percentage; small files do not outweigh large ones.
    #[must_use]
    pub fn coverage_percentage(&self) -> f64 {
        percentage(self.covered_lines, self.coverable_lines)
    }
}

impl Serialize for ProjectSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ProjectSummary", 5)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("files", &self.files)?;
        s.serialize_field("coverable_lines", &self.coverable_lines)?;
        s.serialize_field("covered_lines", &self.covered_lines)?;
        s.serialize_field("coverage_percentage", &self.coverage_percentage())?;
        s.end()
    }
}

/// The result of parsing a single coverage report.
#[derive(Debug, Clone)]
pub struct ParsedReport {
    pub format: Format,
    /// Package (Cobertura) or module (OpenCover) name of the report.
    pub project_name: Option<String>,
    /// Report-level summary: `line-rate` for Cobertura, visited sequence
    /// points for OpenCover.
    pub summary_percentage: f64,
    pub files: Vec<FileCoverage>,
}

impl ParsedReport {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            project_name: None,
            summary_percentage: 0.0,
            files: Vec::new(),
        }
    }
}

/// Something worth telling the caller that is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub path: PathBuf,
    pub message: String,
}

/// Everything a single scan produced.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageSnapshot {
    /// Normalized path key → file record.
    pub files: BTreeMap<String, FileCoverage>,
    pub projects: BTreeMap<String, ProjectSummary>,
    /// The primary (most recently modified) report used.
    pub report_path: Option<PathBuf>,
    pub report_format: Option<Format>,
    /// Every report whose data made it into the snapshot.
    pub sources: Vec<PathBuf>,
    /// Report-level summary percentage of the primary report.
    pub summary_percentage: Option<f64>,
    pub notices: Vec<Notice>,
    pub scanned_at: DateTime<Utc>,
}

impl Default for CoverageSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl CoverageSnapshot {
    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
            projects: BTreeMap::new(),
            report_path: None,
            report_format: None,
            sources: Vec::new(),
            summary_percentage: None,
            notices: Vec::new(),
            scanned_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn coverable_lines(&self) -> u64 {
        self.files.values().map(FileCoverage::coverable_lines).sum()
    }

    #[must_use]
    pub fn covered_lines(&self) -> u64 {
        self.files.values().map(FileCoverage::covered_lines).sum()
    }

    /// Solution-wide percentage over every file in the snapshot.
    #[must_use]
    pub fn coverage_percentage(&self) -> f64 {
        percentage(self.covered_lines(), self.coverable_lines())
    }

    /// Project name → percentage, for quick display.
    #[must_use]
    pub fn summary_view(&self) -> BTreeMap<String, f64> {
        self.projects
            .iter()
            .map(|(name, p)| (name.clone(), p.coverage_percentage()))
            .collect()
    }

    /// Rebuild project totals from the file map.
    pub fn recompute_projects(&mut self, fallback: &str) {
        let mut projects: BTreeMap<String, ProjectSummary> = BTreeMap::new();
        for file in self.files.values() {
            let name = file.project.as_deref().unwrap_or(fallback);
            projects
                .entry(name.to_string())
                .or_insert_with(|| ProjectSummary::new(name.to_string()))
                .add_file(file);
        }
        self.projects = projects;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file_with(path: &str, coverable: u32, covered: u32) -> FileCoverage {
        let mut file = FileCoverage::new(path.to_string());
        for n in 1..=coverable {
            let status = if n <= covered {
                LineStatus::Covered
            } else {
                LineStatus::NotCovered
            };
            file.set_line(n, status);
        }
        file
    }

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(FileCoverage::new("a.cs".into()).coverage_percentage(), 0.0);
    }

    #[test]
    fn test_partial_counts_as_covered() {
        let mut file = FileCoverage::new("a.cs".into());
        file.set_line(1, LineStatus::Covered);
        file.set_line(2, LineStatus::NotCovered);
        file.set_line(3, LineStatus::PartiallyCovered);
        assert_eq!(file.coverable_lines(), 3);
        assert_eq!(file.covered_lines(), 2);
        assert!((file.coverage_percentage() - 66.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_set_line_last_write_wins() {
        let mut file = FileCoverage::new("a.cs".into());
        file.set_line(4, LineStatus::Covered);
        file.set_line(4, LineStatus::NotCovered);
        assert_eq!(file.status(4), Some(LineStatus::NotCovered));
        assert_eq!(file.coverable_lines(), 1);
    }

    #[test]
    fn test_merge_keeps_strongest() {
        let mut a = FileCoverage::new("a.cs".into());
        a.set_line(1, LineStatus::NotCovered);
        a.set_line(2, LineStatus::Covered);
        let mut b = FileCoverage::new("a.cs".into());
        b.set_line(1, LineStatus::PartiallyCovered);
        b.set_line(2, LineStatus::NotCovered);
        b.set_line(3, LineStatus::NotCovered);
        b.project = Some("Core".into());

        a.merge(&b);
        assert_eq!(a.status(1), Some(LineStatus::PartiallyCovered));
        assert_eq!(a.status(2), Some(LineStatus::Covered));
        assert_eq!(a.status(3), Some(LineStatus::NotCovered));
        assert_eq!(a.project.as_deref(), Some("Core"));
    }

    #[test]
    fn test_project_sums_counts_not_percentages() {
        let mut summary = ProjectSummary::new("Core".into());
        summary.add_file(&file_with("a.cs", 10, 8));
        summary.add_file(&file_with("b.cs", 20, 10));
        assert_eq!(summary.coverable_lines, 30);
        assert_eq!(summary.covered_lines, 18);
        assert!((summary.coverage_percentage() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_recompute_projects_uses_fallback() {
        let mut snapshot = CoverageSnapshot::empty();
        let mut a = file_with("a.cs", 4, 2);
        a.project = Some("Core".into());
        snapshot.files.insert("a.cs".into(), a);
        snapshot.files.insert("b.cs".into(), file_with("b.cs", 2, 2));

        snapshot.recompute_projects("Unknown");
        assert_eq!(snapshot.projects.len(), 2);
        assert_eq!(snapshot.projects["Core"].covered_lines, 2);
        assert_eq!(snapshot.projects["Unknown"].coverable_lines, 2);
        assert!((snapshot.coverage_percentage() - 66.666_666).abs() < 1e-3);

        let view = snapshot.summary_view();
        assert!((view["Core"] - 50.0).abs() < 1e-9);
        assert!((view["Unknown"] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_serialize_file_includes_derived_counts() {
        let json = serde_json::to_value(file_with("a.cs", 2, 1)).unwrap();
        assert_eq!(json["coverable_lines"], 2);
        assert_eq!(json["covered_lines"], 1);
        assert_eq!(json["coverage_percentage"], 50.0);
        assert_eq!(json["lines"]["1"], "covered");
    }

    fn status_strategy() -> impl Strategy<Value = LineStatus> {
        prop_oneof![
            Just(LineStatus::NotCovered),
            Just(LineStatus::PartiallyCovered),
            Just(LineStatus::Covered),
        ]
    }

    proptest! {
        #[test]
        fn prop_covered_never_exceeds_coverable(
            lines in proptest::collection::vec((1u32..500, status_strategy()), 0..200)
        ) {
            let mut file = FileCoverage::new("p.cs".into());
            for (n, s) in lines {
                file.set_line(n, s);
            }
            prop_assert!(file.covered_lines() <= file.coverable_lines());
            let pct = file.coverage_percentage();
            prop_assert!(!pct.is_nan());
            if file.coverable_lines() == 0 {
                prop_assert_eq!(pct, 0.0);
            } else {
                let expected = file.covered_lines() as f64 / file.coverable_lines() as f64 * 100.0;
                prop_assert!((pct - expected).abs() < 1e-9);
            }
        }
    }
}
