use covscan::detect::{detect_format, Format};
use covscan::parsers::opencover::OpenCoverParser;
use covscan::parsers::CoverageParser;
use std::path::Path;

#[test]
fn detect_and_parse_fixture() {
    let xml = include_bytes!("fixtures/sample_opencover.xml");
    assert_eq!(detect_format(Path::new("coverage.opencover.xml"), xml), Format::OpenCover);

    let report = OpenCoverParser.parse(xml).unwrap();
    assert!((report.summary_percentage - 70.0).abs() < 1e-9);
    for file in &report.files {
        assert!(file.covered_lines() <= file.coverable_lines());
    }
}

#[test]
fn summary_uses_sequence_points() {
    let xml = br#"<?xml version="1.0" encoding="utf-8"?>
<CoverageSession>
  <Summary sequencePoints="10" visitedSequencePoints="7"/>
  <Modules>
    <Module moduleId="/build/out/Widgets.dll">
      <Files><File uid="1" fullPath="/src/A.cs"/></Files>
      <Classes><Class><Methods><Method>
        <Summary sequencePoints="1" visitedSequencePoints="0"/>
        <SequencePoints><SequencePoint vc="0" sl="1" fileid="1"/></SequencePoints>
      </Method></Methods></Class></Classes>
    </Module>
  </Modules>
</CoverageSession>"#;
    let report = OpenCoverParser.parse(xml).unwrap();
    // Computed from the session summary, independently of the lines.
    assert!((report.summary_percentage - 70.0).abs() < 1e-9);
    assert_eq!(report.project_name.as_deref(), Some("Widgets"));
    assert_eq!(report.files[0].covered_lines(), 0);
}
