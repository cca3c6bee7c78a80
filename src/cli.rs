//! Command handler functions for the covscan CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::path::Path;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::ScanOptions;
use crate::detect::{detect_file, Format};
use crate::model::CoverageSnapshot;
use crate::report;
use crate::repository::{CoverageRepository, ScanOutcome, ScanStatus};

#[derive(Serialize)]
struct OutcomeJson<'a> {
    status: ScanStatus,
    message: &'a str,
    snapshot: &'a CoverageSnapshot,
}

/// Scan, turning an error outcome into an `Err` so the binary exits non-zero.
fn scan(
    repository: &CoverageRepository,
    root: &Path,
    options: &ScanOptions,
) -> Result<ScanOutcome> {
    let outcome = repository.scan(root, options);
    if outcome.status == ScanStatus::Error {
        bail!("{}", outcome.message);
    }
    Ok(outcome)
}

fn to_json(outcome: &ScanOutcome) -> Result<String> {
    let json = serde_json::to_string_pretty(&OutcomeJson {
        status: outcome.status,
        message: &outcome.message,
        snapshot: &outcome.snapshot,
    })?;
    Ok(json + "\n")
}

pub fn cmd_scan(
    repository: &CoverageRepository,
    root: &Path,
    options: &ScanOptions,
    json: bool,
) -> Result<String> {
    let outcome = scan(repository, root, options)?;
    if json {
        return to_json(&outcome);
    }

    let mut out = report::format_outcome(&outcome);
    let projects = report::format_projects(&outcome.snapshot);
    if !projects.is_empty() {
        out.push('\n');
        out.push_str(&projects);
    }
    Ok(out)
}

pub fn cmd_files(
    repository: &CoverageRepository,
    root: &Path,
    options: &ScanOptions,
    sort_by_coverage: bool,
) -> Result<String> {
    let outcome = scan(repository, root, options)?;
    if outcome.status == ScanStatus::Empty {
        return Ok(report::format_outcome(&outcome));
    }
    Ok(report::format_files(&outcome.snapshot, sort_by_coverage))
}

pub fn cmd_lines(
    repository: &CoverageRepository,
    root: &Path,
    options: &ScanOptions,
    source_file: &Path,
    uncovered: bool,
) -> Result<String> {
    scan(repository, root, options)?;
    match repository.file_coverage(source_file) {
        Some(file) => Ok(report::format_lines(&file, uncovered)),
        None => Ok(format!(
            "No coverage data for '{}'\n",
            source_file.display()
        )),
    }
}

pub fn cmd_detect(file: &Path, options: &ScanOptions) -> Result<String> {
    if !file.is_file() {
        bail!("Not a file: {}", file.display());
    }
    let format = detect_file(file, &options.binary_extensions);
    let note = match format {
        Format::VisualStudioBinary => " (recognized, not parseable)",
        Format::Unknown => " (not a coverage report)",
        _ => "",
    };
    Ok(format!("{}: {format}{note}\n", file.display()))
}
