#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

/// A fresh root directory. The caller must hold onto `TempDir` to keep it alive.
pub fn setup_root() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Create an (empty) source file under `root`, returning its path.
pub fn source_file(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"// source\n").unwrap();
    path
}

/// Write a Cobertura report with one class per `(source, hits)` entry; line
/// numbers start at 1.
pub fn write_cobertura(report: &Path, package: &str, files: &[(&Path, &[u64])]) {
    let classes: String = files
        .iter()
        .map(|(source, hits)| {
            let lines: String = hits
                .iter()
                .enumerate()
                .map(|(i, h)| format!(r#"<line number="{}" hits="{}" branch="false"/>"#, i + 1, h))
                .collect();
            format!(
                r#"<class name="C" filename="{}"><methods/><lines>{lines}</lines></class>"#,
                source.display()
            )
        })
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<coverage line-rate="0" branch-rate="0" version="1.9">
  <sources/>
  <packages>
    <package name="{package}"><classes>{classes}</classes></package>
  </packages>
</coverage>
"#
    );
    std::fs::create_dir_all(report.parent().unwrap()).unwrap();
    std::fs::write(report, xml).unwrap();
}

/// Write an OpenCover report for a single module.
pub fn write_opencover(report: &Path, module: &str, files: &[(&Path, &[u64])]) {
    let file_entries: String = files
        .iter()
        .enumerate()
        .map(|(i, (source, _))| {
            format!(r#"<File uid="{}" fullPath="{}"/>"#, i + 1, source.display())
        })
        .collect();
    let points: String = files
        .iter()
        .enumerate()
        .flat_map(|(i, (_, hits))| {
            hits.iter().enumerate().map(move |(n, vc)| {
                format!(r#"<SequencePoint vc="{vc}" sl="{}" fileid="{}"/>"#, n + 1, i + 1)
            })
        })
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<CoverageSession>
  <Summary numSequencePoints="0" visitedSequencePoints="0"/>
  <Modules>
    <Module hash="X">
      <ModuleName>{module}</ModuleName>
      <Files>{file_entries}</Files>
      <Classes><Class><Methods><Method>
        <SequencePoints>{points}</SequencePoints>
      </Method></Methods></Class></Classes>
    </Module>
  </Modules>
</CoverageSession>
"#
    );
    std::fs::create_dir_all(report.parent().unwrap()).unwrap();
    std::fs::write(report, xml).unwrap();
}

/// Backdate a file's modification time by `secs` seconds.
pub fn age(path: &Path, secs: u64) {
    let when = SystemTime::now() - Duration::from_secs(secs);
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}
