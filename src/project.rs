//! .NET project-definition files: locating them, telling which ones are
//! test projects, and naming the project a report belongs to.

use std::path::{Path, PathBuf};

use crate::config::ScanOptions;
use crate::discover::walk_files;
use crate::error::Result;
use crate::repository::CancelToken;

/// A project-definition file whose contents reference a test framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestProject {
    /// File stem of the project file, e.g. `Widgets.Tests`.
    pub name: String,
    /// Directory containing the project file.
    pub dir: PathBuf,
    pub path: PathBuf,
}

/// Does `dir` contain a project file named after the directory itself,
/// e.g. `Widgets.Tests/Widgets.Tests.csproj`?
pub fn find_project_file(dir: &Path, project_extensions: &[String]) -> Option<PathBuf> {
    let dir_name = dir.file_name()?.to_str()?;
    project_extensions
        .iter()
        .map(|ext| dir.join(format!("{dir_name}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Walk upward from `start` to the filesystem root, returning the name of
/// the first directory that holds its own project file.
pub fn resolve_project_name(start: &Path, project_extensions: &[String]) -> Option<String> {
    start.ancestors().find_map(|dir| {
        find_project_file(dir, project_extensions)?;
        dir.file_name()?.to_str().map(str::to_string)
    })
}

/// Whether a project file's contents reference any of the framework markers.
/// Matching is case-insensitive since NuGet package ids are.
#[must_use]
pub fn references_framework(contents: &str, markers: &[String]) -> bool {
    let contents = contents.to_lowercase();
    markers
        .iter()
        .any(|marker| contents.contains(&marker.to_lowercase()))
}

fn is_project_file(path: &Path, project_extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| project_extensions.iter().any(|p| p.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Every project file under `root` that references a configured test
/// framework marker. Unreadable project files are skipped.
pub fn discover_test_projects(
    root: &Path,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<Vec<TestProject>> {
    let mut projects = Vec::new();
    for path in walk_files(root, options, cancel)? {
        if !is_project_file(&path, &options.project_extensions) {
            continue;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("skipping unreadable project {}: {e}", path.display());
                continue;
            }
        };
        if !references_framework(&contents, &options.framework_markers) {
            continue;
        }
        let (Some(name), Some(dir)) = (
            path.file_stem().and_then(|s| s.to_str()).map(str::to_string),
            path.parent().map(Path::to_path_buf),
        ) else {
            continue;
        };
        tracing::debug!("test project {name} at {}", dir.display());
        projects.push(TestProject { name, dir, path });
    }
    projects.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(projects)
}

/// Is the report at `report` attributable to one of `projects`, either by
/// living under the project's directory or by naming it in its path
/// relative to `root`?
#[must_use]
pub fn attributable(report: &Path, root: &Path, projects: &[TestProject]) -> bool {
    let relative = report
        .strip_prefix(root)
        .unwrap_or(report)
        .to_string_lossy()
        .to_lowercase();
    projects.iter().any(|p| {
        report.starts_with(&p.dir) || relative.contains(&p.name.to_lowercase())
    })
}
