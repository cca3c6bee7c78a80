/// Parser for Cobertura XML coverage reports, as written by coverlet and
/// `dotnet-coverage`.
///
/// Cobertura XML structure:
///   <coverage line-rate="0.75" ...>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="Widgets" line-rate="...">
///         <classes>
///           <class name="Widgets.Gear" filename="src/Gear.cs" line-rate="...">
///             <methods>
///               <method name="..." ...>
///                 <lines><line number="..." hits="..."/></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"
///                     condition-coverage="50% (1/2)" />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// Only `class/lines/line` is read; method-level lines duplicate it.
use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use super::{get_attr, parse_attr, CoverageParser};
use crate::detect::Format;
use crate::error::Result;
use crate::model::*;

/// Pre-compiled regex for condition-coverage attributes like "75% (3/4)".
static BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").unwrap());

pub struct CoberturaParser;

impl CoverageParser for CoberturaParser {
    fn format(&self) -> Format {
        Format::Cobertura
    }

    fn parse(&self, input: &[u8]) -> Result<ParsedReport> {
        parse_cobertura(input)
    }
}

fn parse_cobertura(input: &[u8]) -> Result<ParsedReport> {
    let mut xml = super::xml_reader(super::strip_bom(input));
    let mut buf = Vec::new();

    let mut report = ParsedReport::new(Format::Cobertura);
    let mut line_rate: Option<f64> = None;

    // Files are keyed by resolved path; several <class> elements (nested
    // types, compiler-generated state machines) may share one source file.
    let mut file_index: HashMap<String, usize> = HashMap::new();

    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;
    let mut in_packages = false;
    let mut seen_first_package = false;
    let mut current_package: Option<String> = None;
    let mut current_file: Option<usize> = None;
    let mut in_methods = false;

    loop {
        let event = xml.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(super::xml_err(e, &xml)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"coverage" => {
                    line_rate = parse_attr(e, b"line-rate");
                }
                b"source" => {
                    // A self-closing <source/> has no text and no End event.
                    if is_start_event {
                        in_source = true;
                    }
                }
                b"packages" => {
                    in_packages = is_start_event;
                }
                b"package" => {
                    let name = get_attr(e, b"name").filter(|n| !n.trim().is_empty());
                    // Only the first package names the report; an unnamed one
                    // leaves the name to the enclosing project lookup.
                    if in_packages && !seen_first_package {
                        seen_first_package = true;
                        report.project_name.clone_from(&name);
                    }
                    current_package = if is_start_event { name } else { None };
                }
                b"class" => {
                    let idx = get_attr(e, b"filename").map(|filename| {
                        let path = resolve_source_path(&filename, &sources);
                        *file_index.entry(path.clone()).or_insert_with(|| {
                            let mut file = FileCoverage::new(path);
                            file.project.clone_from(&current_package);
                            report.files.push(file);
                            report.files.len() - 1
                        })
                    });
                    // A self-closing class has a record but no lines.
                    current_file = if is_start_event { idx } else { None };
                }
                b"methods" => {
                    in_methods = is_start_event;
                }
                b"line" if !in_methods => {
                    if let Some(idx) = current_file {
                        if let Some((line_number, status)) = line_status(e) {
                            report.files[idx].merge_line(line_number, status);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_source {
                    if let Ok(text) = e.unescape() {
                        sources.push(text.trim().to_string());
                    }
                    in_source = false;
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"source" => in_source = false,
                b"packages" => in_packages = false,
                b"package" => current_package = None,
                b"class" => current_file = None,
                b"methods" => in_methods = false,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    report.summary_percentage = match line_rate {
        Some(rate) => rate * 100.0,
        None => {
            let covered = report.files.iter().map(FileCoverage::covered_lines).sum();
            let total = report.files.iter().map(FileCoverage::coverable_lines).sum();
            percentage(covered, total)
        }
    };

    Ok(report)
}

/// Status for a `<line>` element, or `None` if `number` or `hits` is
/// missing or not an integer.
fn line_status(e: &BytesStart) -> Option<(u32, LineStatus)> {
    let line_number: u32 = parse_attr(e, b"number")?;
    let hits: u64 = parse_attr(e, b"hits")?;

    let mut status = LineStatus::from_hits(hits);

    let is_branch = get_attr(e, b"branch")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if is_branch {
        if let Some((covered, total)) =
            get_attr(e, b"condition-coverage").and_then(|c| condition_counts(&c))
        {
            if covered > 0 && covered < total {
                status = LineStatus::PartiallyCovered;
            }
        }
    }

    Some((line_number, status))
}

/// Extract `(covered, total)` from a condition-coverage value like "50% (1/2)".
fn condition_counts(condition: &str) -> Option<(u32, u32)> {
    let caps = BRANCH_RE.captures(condition)?;
    let covered = caps[1].parse().ok()?;
    let total = caps[2].parse().ok()?;
    Some((covered, total))
}

/// Resolve a filename against the list of `<source>` prefixes.
///
/// - If the filename is already absolute, return it as-is.
/// - Otherwise, prepend the first non-empty source prefix.
/// - If no non-empty sources exist, return the filename unchanged.
fn resolve_source_path(filename: &str, sources: &[String]) -> String {
    if is_absolute(filename) {
        return filename.to_string();
    }
    for source in sources {
        let base = source.trim_end_matches(['/', '\\']);
        if !base.is_empty() {
            let sep = if base.contains('\\') && !base.contains('/') {
                '\\'
            } else {
                '/'
            };
            return format!("{}{}{}", base, sep, filename);
        }
    }
    filename.to_string()
}

/// Absolute on either Unix or Windows, regardless of the host platform.
fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}
