//! Scanning a directory tree for coverage reports and folding them into a
//! [`CoverageSnapshot`].
//!
//! Each scan is a full re-scan: nothing is carried over from the previous
//! run except the cached snapshot used for point lookups, which is swapped
//! as a whole once a scan completes.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crossbeam_channel::{bounded, Receiver};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ScanOptions;
use crate::discover::{find_candidates, Candidate};
use crate::error::{CovscanError, Result};
use crate::model::{CoverageSnapshot, FileCoverage, LineStatus, Notice, ParsedReport};
use crate::parsers::{parse_report, UNKNOWN_PROJECT};
use crate::paths;
use crate::project;

/// Cooperative cancellation flag shared between a caller and a scan.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a scan ended. "No data" is not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// At least one file has coverage.
    Ok,
    /// Nothing to show; `message` says why.
    Empty,
    /// The scan could not run, or was cancelled.
    Error,
}

/// The single terminal value of a scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    pub message: String,
    pub snapshot: Arc<CoverageSnapshot>,
}

impl ScanOutcome {
    fn error(message: String) -> Self {
        Self {
            status: ScanStatus::Error,
            message,
            snapshot: Arc::new(CoverageSnapshot::empty()),
        }
    }
}

/// Owns the most recent snapshot and produces new ones.
#[derive(Debug, Default)]
pub struct CoverageRepository {
    last: RwLock<Option<Arc<CoverageSnapshot>>>,
}

impl CoverageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `root` and replace the cached snapshot. Never panics or returns
    /// an error; failures are reported through the outcome's status.
    pub fn scan(&self, root: &Path, options: &ScanOptions) -> ScanOutcome {
        self.scan_with_cancel(root, options, &CancelToken::new())
    }

    /// As [`scan`](Self::scan), abandoning the work once `cancel` is set.
    /// A cancelled scan leaves the cached snapshot untouched.
    pub fn scan_with_cancel(
        &self,
        root: &Path,
        options: &ScanOptions,
        cancel: &CancelToken,
    ) -> ScanOutcome {
        info!("scanning {} for coverage reports", root.display());

        let (snapshot, message) = match build_snapshot(root, options, cancel) {
            Ok(built) => built,
            Err(CovscanError::Cancelled) => {
                info!("scan of {} cancelled", root.display());
                return ScanOutcome::error("Scan cancelled".to_string());
            }
            Err(e) => {
                warn!("scan of {} failed: {e}", root.display());
                return ScanOutcome::error(format!("Coverage scan failed: {e}"));
            }
        };

        if cancel.is_cancelled() {
            return ScanOutcome::error("Scan cancelled".to_string());
        }

        let snapshot = Arc::new(snapshot);
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        let status = if snapshot.is_empty() {
            ScanStatus::Empty
        } else {
            ScanStatus::Ok
        };
        info!(
            files = snapshot.files.len(),
            projects = snapshot.projects.len(),
            "scan finished: {message}"
        );
        ScanOutcome {
            status,
            message,
            snapshot,
        }
    }

    /// Run a scan on a worker thread. The caller should keep at most one
    /// in flight.
    pub fn spawn_scan(self: &Arc<Self>, root: PathBuf, options: ScanOptions) -> ScanHandle {
        let (sender, receiver) = bounded(1);
        let cancel = CancelToken::new();
        let repository = Arc::clone(self);
        let token = cancel.clone();

        let spawned = std::thread::Builder::new()
            .name("covscan-scan".to_string())
            .spawn(move || {
                let outcome = repository.scan_with_cancel(&root, &options, &token);
                // The handle may have been dropped; nobody is waiting then.
                let _ = sender.send(outcome);
            });

        if let Err(e) = spawned {
            warn!("cannot start scan thread: {e}");
            let (sender, receiver) = bounded(1);
            let _ = sender.send(ScanOutcome::error(format!("Cannot start scan: {e}")));
            return ScanHandle { cancel, receiver };
        }

        ScanHandle { cancel, receiver }
    }

    /// The snapshot from the most recent completed scan.
    #[must_use]
    pub fn last_snapshot(&self) -> Option<Arc<CoverageSnapshot>> {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Coverage for one source file from the last snapshot.
    #[must_use]
    pub fn file_coverage(&self, path: &Path) -> Option<FileCoverage> {
        let snapshot = self.last_snapshot()?;
        snapshot.files.get(&paths::lookup_key(path)).cloned()
    }

    #[must_use]
    pub fn line_status(&self, path: &Path, line_number: u32) -> Option<LineStatus> {
        let snapshot = self.last_snapshot()?;
        snapshot
            .files
            .get(&paths::lookup_key(path))?
            .status(line_number)
    }

    /// Project name → percentage from the last snapshot.
    #[must_use]
    pub fn summary_view(&self) -> BTreeMap<String, f64> {
        self.last_snapshot()
            .map(|s| s.summary_view())
            .unwrap_or_default()
    }
}

/// A scan running on a worker thread.
#[derive(Debug)]
pub struct ScanHandle {
    cancel: CancelToken,
    receiver: Receiver<ScanOutcome>,
}

impl ScanHandle {
    /// Ask the scan to stop at the next file boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the scan finishes.
    pub fn wait(self) -> ScanOutcome {
        self.receiver
            .recv()
            .unwrap_or_else(|_| ScanOutcome::error("Scan worker exited without a result".into()))
    }

    /// The outcome, if the scan has finished.
    #[must_use]
    pub fn try_result(&self) -> Option<ScanOutcome> {
        self.receiver.try_recv().ok()
    }
}

/// Build a snapshot from the reports under `root`, with a caller-facing
/// message describing what was found.
fn build_snapshot(
    root: &Path,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<(CoverageSnapshot, String)> {
    if root.as_os_str().is_empty() {
        return Err(CovscanError::Other("no root directory given".to_string()));
    }

    let mut snapshot = CoverageSnapshot::empty();

    let root = match std::fs::canonicalize(root) {
        Ok(r) if r.is_dir() => r,
        _ => {
            let message = format!("Directory not found: {}", root.display());
            return Ok((snapshot, message));
        }
    };

    let mut candidates = find_candidates(&root, options, cancel)?;

    if options.test_projects_only {
        let projects = project::discover_test_projects(&root, options, cancel)?;
        candidates.retain(|c| project::attributable(&c.path, &root, &projects));
        debug!(
            "{} test project(s), {} attributable report(s)",
            projects.len(),
            candidates.len()
        );
    }

    if candidates.is_empty() {
        let message = format!("No coverage reports found under {}", root.display());
        return Ok((snapshot, message));
    }

    let mut seen_projects: HashSet<String> = HashSet::new();

    for candidate in &candidates {
        if cancel.is_cancelled() {
            return Err(CovscanError::Cancelled);
        }

        let Some(mut report) = read_candidate(candidate, options, &mut snapshot) else {
            continue;
        };

        let project_name = report
            .project_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_PROJECT.to_string());
        if options.merge_all {
            let projects = report_projects(&report, &project_name);
            if projects.is_subset(&seen_projects) {
                debug!(
                    "skipping {}: all its projects are already loaded",
                    candidate.path.display()
                );
                continue;
            }
            report.files.retain(|file| {
                let project = file.project.as_deref().unwrap_or(&project_name);
                !seen_projects.contains(project)
            });
            seen_projects.extend(projects);
        }

        if snapshot.report_path.is_none() {
            snapshot.report_path = Some(candidate.path.clone());
            snapshot.report_format = Some(report.format);
            snapshot.summary_percentage = Some(report.summary_percentage);
        }
        snapshot.sources.push(candidate.path.clone());
        fold_report(&mut snapshot, report, &project_name, &candidate.path, &root);

        if !options.merge_all {
            break;
        }
    }

    snapshot.recompute_projects(UNKNOWN_PROJECT);

    let message = if snapshot.is_empty() {
        format!(
            "No coverage data found in {} candidate report(s)",
            candidates.len()
        )
    } else {
        format!(
            "Loaded coverage for {} file(s) from {} report(s)",
            snapshot.files.len(),
            snapshot.sources.len()
        )
    };
    Ok((snapshot, message))
}

/// Project names a report contributes to, one per file, or the report's
/// own name when it has no files.
fn report_projects(report: &ParsedReport, fallback: &str) -> HashSet<String> {
    let mut projects: HashSet<String> = report
        .files
        .iter()
        .map(|file| file.project.as_deref().unwrap_or(fallback).to_string())
        .collect();
    if projects.is_empty() {
        projects.insert(fallback.to_string());
    }
    projects
}

/// Detect and parse one candidate. Unparseable candidates are logged and
/// noted on the snapshot, never propagated.
fn read_candidate(
    candidate: &Candidate,
    options: &ScanOptions,
    snapshot: &mut CoverageSnapshot,
) -> Option<ParsedReport> {
    let path = &candidate.path;
    match parse_report(path, &options.binary_extensions, &options.project_extensions) {
        Ok(report) => {
            debug!("{} parsed as {}", path.display(), report.format);
            Some(report)
        }
        Err(CovscanError::UnknownFormat) => {
            debug!("{} is not a coverage report", path.display());
            None
        }
        Err(CovscanError::UnsupportedFormat(format)) => {
            debug!("{} detected as {format}", path.display());
            snapshot.notices.push(Notice {
                path: path.clone(),
                message: "Binary .coverage files cannot be read in detail; \
                          collect with the Cobertura or OpenCover output format instead"
                    .to_string(),
            });
            None
        }
        Err(e) => {
            warn!("skipping {}: {e}", path.display());
            snapshot.notices.push(Notice {
                path: path.clone(),
                message: format!("Skipped unreadable report: {e}"),
            });
            None
        }
    }
}

/// Normalize every file path in `report` and merge it into the snapshot.
/// Files that no longer exist under `root` are dropped.
fn fold_report(
    snapshot: &mut CoverageSnapshot,
    report: ParsedReport,
    project_name: &str,
    report_path: &Path,
    root: &Path,
) {
    let report_dir = report_path.parent().unwrap_or(root);

    for mut file in report.files {
        let resolved = paths::resolve_recorded(&file.path, report_dir);
        let Some(canonical) = paths::canonicalize(&resolved).filter(|p| p.starts_with(root))
        else {
            debug!("dropping stale entry {}", file.path);
            continue;
        };

        if file.project.is_none() {
            file.project = Some(project_name.to_string());
        }

        let key = paths::path_key(&canonical);
        match snapshot.files.get_mut(&key) {
            Some(existing) => existing.merge(&file),
            None => {
                snapshot.files.insert(key, file);
            }
        }
    }
}
