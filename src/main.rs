use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use covscan::cli;
use covscan::config::ScanOptions;
use covscan::repository::CoverageRepository;

/// Find and summarize Cobertura and OpenCover coverage for .NET test projects.
#[derive(Parser)]
#[command(name = "covscan", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that scans a directory.
#[derive(clap::Args)]
struct ScanArgs {
    /// Root directory to search for coverage reports.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Merge every report found instead of only the most recent one.
    #[arg(long, env = "COVSCAN_MERGE_ALL")]
    all: bool,

    /// Only use reports belonging to projects that reference a test framework.
    #[arg(long, env = "COVSCAN_TEST_PROJECTS_ONLY")]
    test_projects_only: bool,

    /// Additional test-framework marker to look for in project files.
    #[arg(long = "marker", value_name = "TEXT")]
    markers: Vec<String>,

    /// Additional directory name whose XML files are treated as reports.
    #[arg(long = "results-dir", value_name = "NAME")]
    results_dirs: Vec<String>,

    /// Maximum directory depth to search.
    #[arg(long, env = "COVSCAN_MAX_DEPTH")]
    max_depth: Option<usize>,
}

impl ScanArgs {
    fn options(&self) -> ScanOptions {
        let mut options = ScanOptions::default().with_markers(self.markers.iter().cloned());
        options.merge_all = self.all;
        options.test_projects_only = self.test_projects_only;
        options
            .results_dir_names
            .extend(self.results_dirs.iter().cloned());
        if self.max_depth.is_some() {
            options.max_depth = self.max_depth;
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory and summarize coverage per project.
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Emit the outcome and snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List per-file coverage.
    Files {
        #[command(flatten)]
        scan: ScanArgs,

        /// Sort by coverage rate ascending (show worst files first).
        #[arg(long)]
        sort_by_coverage: bool,
    },

    /// Show line-level coverage for a source file.
    Lines {
        /// The source file.
        source_file: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Only show uncovered and partially covered lines.
        #[arg(long)]
        uncovered: bool,
    },

    /// Report the detected format of a single file.
    Detect {
        /// Path to the candidate report.
        file: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("COVSCAN_LOG").unwrap_or_else(|_| EnvFilter::new("off"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let repository = CoverageRepository::new();

    let output = match cli.command {
        Commands::Scan { scan, json } => {
            cli::cmd_scan(&repository, &scan.root, &scan.options(), json)
        }
        Commands::Files {
            scan,
            sort_by_coverage,
        } => cli::cmd_files(&repository, &scan.root, &scan.options(), sort_by_coverage),
        Commands::Lines {
            source_file,
            scan,
            uncovered,
        } => cli::cmd_lines(
            &repository,
            &scan.root,
            &scan.options(),
            &source_file,
            uncovered,
        ),
        Commands::Detect { file } => cli::cmd_detect(&file, &ScanOptions::default()),
    }?;

    print!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_only_on_scan() {
        let cli = Cli::try_parse_from(["covscan", "scan", "--json", "."]).unwrap();
        assert!(matches!(cli.command, Commands::Scan { json: true, .. }));

        assert!(Cli::try_parse_from(["covscan", "files", "--json", "."]).is_err());
        assert!(Cli::try_parse_from(["covscan", "--json", "scan"]).is_err());
    }
}
