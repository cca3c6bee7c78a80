/// Parser for OpenCover XML coverage reports, as written by OpenCover and by
/// coverlet's `opencover` output format.
///
/// OpenCover XML structure:
///   <CoverageSession>
///     <Summary numSequencePoints="10" visitedSequencePoints="7" .../>
///     <Modules>
///       <Module hash="..." [skippedDueTo="Filter"]>
///         <ModulePath>/out/Widgets.dll</ModulePath>
///         <ModuleName>Widgets</ModuleName>
///         <Files>
///           <File uid="1" fullPath="/src/Widgets/Gear.cs"/>
///         </Files>
///         <Classes>
///           <Class>
///             <Methods>
///               <Method>
///                 <SequencePoints>
///                   <SequencePoint vc="3" sl="10" fileid="1" bec="2" bev="1"/>
///                 </SequencePoints>
///               </Method>
///             </Methods>
///           </Class>
///         </Classes>
///       </Module>
///     </Modules>
///   </CoverageSession>
///
/// File ids are scoped to their module. When several sequence points land on
/// the same line, the last one read decides the line's status.
use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};

use super::{get_attr, parse_attr, CoverageParser};
use crate::detect::Format;
use crate::error::Result;
use crate::model::*;

/// Line number the compiler assigns to hidden sequence points (0xFEEFEE).
const HIDDEN_LINE: u32 = 0x00FE_EFEE;

/// Assembly extensions stripped from module names given as paths.
const ASSEMBLY_EXTENSIONS: &[&str] = &["dll", "exe", "pdb"];

/// Module attributes tried, in order, for the module name.
const MODULE_NAME_ATTRS: &[&[u8]] = &[b"moduleId", b"name", b"module"];

pub struct OpenCoverParser;

impl CoverageParser for OpenCoverParser {
    fn format(&self) -> Format {
        Format::OpenCover
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedReport> {
        parse_opencover(input)
    }
}

fn parse_opencover(input: &[u8]) -> Result<ParsedReport> {
    let mut xml = super::xml_reader(super::strip_bom(input));
    let mut buf = Vec::new();

    let mut report = ParsedReport::new(Format::OpenCover);
    let mut session_summary: Option<(u64, u64)> = None;

    let mut file_index: HashMap<String, usize> = HashMap::new();
    let mut module_files: HashMap<String, String> = HashMap::new();
    let mut module_name: Option<String> = None;
    let mut in_module = false;
    let mut skip_module = false;
    let mut in_module_name = false;
    let mut depth: usize = 0;

    loop {
        let event = xml.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(super::xml_err(e, &xml)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    // Only the session-level summary; modules, classes and
                    // methods carry their own.
                    b"Summary" if depth == 1 && session_summary.is_none() => {
                        session_summary = Some(summary_counts(e));
                    }
                    b"Module" => {
                        module_files.clear();
                        skip_module = get_attr(e, b"skippedDueTo").is_some();
                        module_name = module_name_from_attrs(e);
                        in_module = is_start_event;
                        if !skip_module && report.project_name.is_none() {
                            report.project_name.clone_from(&module_name);
                        }
                    }
                    b"ModuleName" if in_module && is_start_event => {
                        in_module_name = true;
                    }
                    b"File" if in_module && !skip_module => {
                        if let (Some(uid), Some(path)) =
                            (get_attr(e, b"uid"), get_attr(e, b"fullPath"))
                        {
                            module_files.insert(uid, path);
                        }
                    }
                    b"SequencePoint" if in_module && !skip_module => {
                        // Unresolved file ids and unparseable lines are skipped.
                        if let Some((path, line_number, status)) = sequence_point(e, &module_files)
                        {
                            let idx = *file_index.entry(path.clone()).or_insert_with(|| {
                                let mut file = FileCoverage::new(path);
                                file.project.clone_from(&module_name);
                                report.files.push(file);
                                report.files.len() - 1
                            });
                            report.files[idx].set_line(line_number, status);
                        }
                    }
                    _ => {}
                }
                if is_start_event {
                    depth += 1;
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_module_name {
                    if let Ok(text) = e.unescape() {
                        let name = text.trim();
                        if module_name.is_none() && !name.is_empty() {
                            module_name = Some(module_display_name(name));
                            if !skip_module && report.project_name.is_none() {
                                report.project_name.clone_from(&module_name);
                            }
                        }
                    }
                    in_module_name = false;
                }
            }
            Ok(Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"ModuleName" => in_module_name = false,
                    b"Module" => {
                        in_module = false;
                        skip_module = false;
                        module_name = None;
                        module_files.clear();
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    report.summary_percentage = match session_summary {
        Some((total, visited)) => percentage(visited, total),
        None => {
            let covered = report.files.iter().map(FileCoverage::covered_lines).sum();
            let total = report.files.iter().map(FileCoverage::coverable_lines).sum();
            percentage(covered, total)
        }
    };

    Ok(report)
}

/// `(sequencePoints, visitedSequencePoints)`, accepting OpenCover's
/// `numSequencePoints` spelling. Missing counts read as zero.
fn summary_counts(e: &BytesStart) -> (u64, u64) {
    let total = parse_attr(e, b"sequencePoints")
        .or_else(|| parse_attr(e, b"numSequencePoints"))
        .unwrap_or(0);
    let visited = parse_attr(e, b"visitedSequencePoints").unwrap_or(0);
    (total, visited)
}

fn module_name_from_attrs(e: &BytesStart) -> Option<String> {
    MODULE_NAME_ATTRS
        .iter()
        .filter_map(|attr| get_attr(e, attr))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .map(|v| module_display_name(&v))
}

/// Reduce a module value that looks like a path to its assembly name.
fn module_display_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && ASSEMBLY_EXTENSIONS
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(ext)) =>
        {
            stem.to_string()
        }
        _ => last.to_string(),
    }
}

fn sequence_point(
    e: &BytesStart,
    module_files: &HashMap<String, String>,
) -> Option<(String, u32, LineStatus)> {
    let file_id = get_attr(e, b"fileid")?;
    let path = module_files.get(&file_id)?;
    let line_number: u32 = parse_attr(e, b"sl")?;
    if line_number == 0 || line_number == HIDDEN_LINE {
        return None;
    }
    let visits: u64 = parse_attr(e, b"vc")?;

    let mut status = LineStatus::from_hits(visits);

    // Heuristic: a positive offset chain is taken to mean some branches on
    // the line were not followed. Unconfirmed against the schema.
    let offset_chain: i64 = parse_attr(e, b"offsetchain").unwrap_or(0);
    let branches: u32 = parse_attr(e, b"bec").unwrap_or(0);
    let branches_visited: u32 = parse_attr(e, b"bev").unwrap_or(0);
    if offset_chain > 0 || (branches_visited > 0 && branches_visited < branches) {
        status = LineStatus::PartiallyCovered;
    }

    Some((path.clone(), line_number, status))
}
