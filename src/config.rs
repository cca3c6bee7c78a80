//! Scan configuration. Everything the repository treats as a convention
//! lives here so callers can override it.

/// Default maximum directory depth for report discovery.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default output names of coverlet's Cobertura and OpenCover formats.
pub const DEFAULT_REPORT_FILE_NAMES: &[&str] =
    &["coverage.cobertura.xml", "coverage.opencover.xml"];

/// Directories conventionally used for test-run output. Any `*.xml` inside
/// one of these is a candidate.
pub const DEFAULT_RESULTS_DIR_NAMES: &[&str] = &["TestResults", "coverage"];

pub const DEFAULT_PROJECT_EXTENSIONS: &[&str] = &["csproj", "vbproj", "fsproj"];

/// Strings whose presence in a project file marks it as an MSTest project.
pub const DEFAULT_FRAMEWORK_MARKERS: &[&str] = &[
    "MSTest.TestFramework",
    "MSTest.TestAdapter",
    "MSTest.Sdk",
    "Microsoft.VisualStudio.TestTools.UnitTesting",
    "Microsoft.VisualStudio.QualityTools.UnitTestFramework",
];

/// Directories never descended into.
pub const SKIP_DIRECTORIES: &[&str] = &[".git", ".vs", "node_modules"];

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Exact (case-insensitive) report file names accepted anywhere.
    pub report_file_names: Vec<String>,

    /// Directory names whose `*.xml` contents are all candidates.
    pub results_dir_names: Vec<String>,

    /// Extensions of binary coverage containers (detected, not parsed).
    pub binary_extensions: Vec<String>,

    pub project_extensions: Vec<String>,

    pub framework_markers: Vec<String>,

    /// Only consider reports attributable to a project referencing one of
    /// `framework_markers`.
    pub test_projects_only: bool,

    /// Merge every report found instead of only the most recent one.
    pub merge_all: bool,

    pub max_depth: Option<usize>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            report_file_names: owned(DEFAULT_REPORT_FILE_NAMES),
            results_dir_names: owned(DEFAULT_RESULTS_DIR_NAMES),
            binary_extensions: owned(crate::detect::BINARY_EXTENSIONS),
            project_extensions: owned(DEFAULT_PROJECT_EXTENSIONS),
            framework_markers: owned(DEFAULT_FRAMEWORK_MARKERS),
            test_projects_only: false,
            merge_all: false,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

impl ScanOptions {
    /// Add framework markers on top of the defaults, skipping duplicates.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for marker in markers {
            let marker = marker.into();
            if !self
                .framework_markers
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&marker))
            {
                self.framework_markers.push(marker);
            }
        }
        self
    }
}
