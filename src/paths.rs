//! Turning paths recorded in reports into canonical snapshot keys.

use std::path::{Path, PathBuf};

/// Resolve a path as recorded in a report to a filesystem path. Relative
/// paths are taken relative to the report's own directory.
#[must_use]
pub fn resolve_recorded(recorded: &str, report_dir: &Path) -> PathBuf {
    let recorded = if cfg!(windows) {
        recorded.to_string()
    } else {
        recorded.replace('\\', "/")
    };
    let path = Path::new(&recorded);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        report_dir.join(path)
    }
}

/// Canonical absolute form of `path`, or `None` if it no longer exists.
#[must_use]
pub fn canonicalize(path: &Path) -> Option<PathBuf> {
    std::fs::canonicalize(path).ok().filter(|p| p.is_file())
}

/// Case-insensitive lookup key for a canonical path, with `/` separators.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// Key for a path supplied by a caller: canonicalized when it exists,
/// otherwise made absolute against the current directory.
#[must_use]
pub fn lookup_key(path: &Path) -> String {
    match std::fs::canonicalize(path) {
        Ok(canonical) => path_key(&canonical),
        Err(_) => {
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            path_key(&absolute)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_recorded_relative() {
        let resolved = resolve_recorded("src/A.cs", Path::new("/repo/TestResults"));
        assert_eq!(resolved, PathBuf::from("/repo/TestResults/src/A.cs"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_recorded_absolute_and_backslashes() {
        assert_eq!(
            resolve_recorded("/src/A.cs", Path::new("/repo")),
            PathBuf::from("/src/A.cs")
        );
        assert_eq!(
            resolve_recorded("src\\Sub\\A.cs", Path::new("/repo")),
            PathBuf::from("/repo/src/Sub/A.cs")
        );
    }

    #[test]
    fn test_canonicalize_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(canonicalize(&dir.path().join("gone.cs")), None);
        // Directories are not source files.
        assert_eq!(canonicalize(dir.path()), None);

        let file = dir.path().join("here.cs");
        std::fs::write(&file, b"class A {}").unwrap();
        assert!(canonicalize(&file).is_some());
    }

    #[test]
    fn test_path_key_case_insensitive() {
        assert_eq!(
            path_key(Path::new("/Repo/Src/Gear.CS")),
            path_key(Path::new("/repo/src/gear.cs"))
        );
    }

    #[test]
    fn test_lookup_key_matches_canonical_key() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Gear.cs");
        std::fs::write(&file, b"").unwrap();
        let canonical = canonicalize(&file).unwrap();
        assert_eq!(lookup_key(&file), path_key(&canonical));
    }
}
