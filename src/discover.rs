//! Discovery of candidate coverage reports under a root directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ignore::WalkBuilder;

use crate::config::{ScanOptions, SKIP_DIRECTORIES};
use crate::error::{CovscanError, Result};
use crate::repository::CancelToken;

/// A file that looks like a coverage report by name or location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Every regular file under `root`, skipping [`SKIP_DIRECTORIES`].
///
/// Ignore files are not honoured: test output directories are almost always
/// gitignored. Unreadable entries are logged and skipped.
pub fn walk_files(
    root: &Path,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<Vec<PathBuf>> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .max_depth(options.max_depth)
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !(is_dir
                && entry.depth() > 0
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| SKIP_DIRECTORIES.contains(&name))
                    .unwrap_or(false))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        if cancel.is_cancelled() {
            return Err(CovscanError::Cancelled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("walk error under {}: {e}", root.display());
                continue;
            }
        };
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Does `path` match one of the report name patterns?
#[must_use]
pub fn is_candidate(path: &Path, root: &Path, options: &ScanOptions) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    if options
        .report_file_names
        .iter()
        .any(|name| name.eq_ignore_ascii_case(file_name))
    {
        return true;
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if options
        .binary_extensions
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
    {
        return true;
    }

    extension.eq_ignore_ascii_case("xml") && in_results_dir(path, root, options)
}

/// Is any directory between `root` and `path` a test-results directory?
fn in_results_dir(path: &Path, root: &Path, options: &ScanOptions) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .parent()
        .map(|dir| {
            dir.components().any(|c| {
                c.as_os_str().to_str().is_some_and(|name| {
                    options
                        .results_dir_names
                        .iter()
                        .any(|r| r.eq_ignore_ascii_case(name))
                })
            })
        })
        .unwrap_or(false)
}

/// Candidate reports under `root`, most recently modified first.
pub fn find_candidates(
    root: &Path,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<Vec<Candidate>> {
    let mut candidates: Vec<Candidate> = walk_files(root, options, cancel)?
        .into_iter()
        .filter(|path| is_candidate(path, root, options))
        .map(|path| {
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Candidate { path, modified }
        })
        .collect();

    candidates.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    tracing::debug!("{} candidate report(s) under {}", candidates.len(), root.display());
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_candidate() {
        let root = Path::new("/repo");
        let options = ScanOptions::default();

        assert!(is_candidate(
            Path::new("/repo/Widgets.Tests/coverage.cobertura.xml"),
            root,
            &options
        ));
        assert!(is_candidate(
            Path::new("/repo/COVERAGE.OPENCOVER.XML"),
            root,
            &options
        ));
        assert!(is_candidate(
            Path::new("/repo/Widgets.Tests/TestResults/abc/report.xml"),
            root,
            &options
        ));
        assert!(is_candidate(
            Path::new("/repo/TestResults/run.coverage"),
            root,
            &options
        ));
        assert!(!is_candidate(
            Path::new("/repo/Widgets/Widgets.csproj"),
            root,
            &options
        ));
        assert!(!is_candidate(Path::new("/repo/src/app.config.xml"), root, &options));
    }

    #[test]
    fn test_results_dir_is_relative_to_root() {
        // The root itself living under a TestResults directory does not make
        // every XML file below it a candidate.
        let root = Path::new("/home/TestResults/repo");
        let options = ScanOptions::default();
        assert!(!is_candidate(
            Path::new("/home/TestResults/repo/src/settings.xml"),
            root,
            &options
        ));
    }

    #[test]
    fn test_find_candidates_orders_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let older = dir.path().join("a").join("coverage.cobertura.xml");
        let newer = dir.path().join("b").join("coverage.opencover.xml");
        std::fs::create_dir_all(older.parent().unwrap()).unwrap();
        std::fs::create_dir_all(newer.parent().unwrap()).unwrap();
        std::fs::write(&older, b"<coverage/>").unwrap();
        std::fs::write(&newer, b"<CoverageSession/>").unwrap();
        std::fs::write(dir.path().join("notes.xml"), b"<notes/>").unwrap();

        let now = SystemTime::now();
        std::fs::File::options()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(now - std::time::Duration::from_secs(3600))
            .unwrap();
        std::fs::File::options()
            .write(true)
            .open(&newer)
            .unwrap()
            .set_modified(now)
            .unwrap();

        let found =
            find_candidates(dir.path(), &ScanOptions::default(), &CancelToken::new()).unwrap();
        let paths: Vec<_> = found.iter().map(|c| c.path.clone()).collect();
        assert_eq!(paths, vec![newer, older]);
    }

    #[test]
    fn test_skips_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(".git").join("coverage.cobertura.xml");
        std::fs::create_dir_all(hidden.parent().unwrap()).unwrap();
        std::fs::write(&hidden, b"<coverage/>").unwrap();

        let found =
            find_candidates(dir.path(), &ScanOptions::default(), &CancelToken::new()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_walk_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coverage.cobertura.xml"), b"<coverage/>").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = walk_files(dir.path(), &ScanOptions::default(), &cancel);
        assert!(matches!(result, Err(CovscanError::Cancelled)));
    }
}
