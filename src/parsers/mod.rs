pub mod cobertura;
pub mod opencover;

use std::borrow::Cow;
use std::io::BufRead;
use std::path::Path;

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;

use crate::detect::{detect_file, Format};
use crate::error::{CovscanError, Result};
use crate::model::ParsedReport;
use crate::project;

/// Project name used when neither the report nor the filesystem names one.
pub const UNKNOWN_PROJECT: &str = "Unknown";

/// Every format parser implements this trait.
pub trait CoverageParser {
    fn format(&self) -> Format;

    /// Parse the input bytes into the normalized model.
    fn parse(&self, input: &[u8]) -> Result<ParsedReport>;

    /// Parse a report on disk. When the report does not name its project,
    /// the nearest enclosing project directory is used.
    fn parse_file(&self, path: &Path, project_extensions: &[String]) -> Result<ParsedReport> {
        let content = std::fs::read(path)?;
        let mut report = self.parse(&content)?;
        if report.project_name.is_none() {
            let resolved = path
                .parent()
                .and_then(|dir| project::resolve_project_name(dir, project_extensions));
            report.project_name = Some(resolved.unwrap_or_else(|| UNKNOWN_PROJECT.to_string()));
        }
        Ok(report)
    }
}

/// Parser for a detected format, if it has one.
pub fn parser_for(format: Format) -> Option<&'static dyn CoverageParser> {
    match format {
        Format::Cobertura => Some(&cobertura::CoberturaParser),
        Format::OpenCover => Some(&opencover::OpenCoverParser),
        Format::VisualStudioBinary | Format::Unknown => None,
    }
}

/// Detect the format of a report on disk and parse it. Formats without a
/// parser surface as [`CovscanError::UnsupportedFormat`] or
/// [`CovscanError::UnknownFormat`].
pub fn parse_report(
    path: &Path,
    binary_extensions: &[String],
    project_extensions: &[String],
) -> Result<ParsedReport> {
    let format = detect_file(path, binary_extensions);
    match parser_for(format) {
        Some(parser) => parser.parse_file(path, project_extensions),
        None if format == Format::Unknown => Err(CovscanError::UnknownFormat),
        None => Err(CovscanError::UnsupportedFormat(format)),
    }
}

/// Skip a UTF-8 byte order mark; coverlet and OpenCover both emit one.
pub(crate) fn strip_bom(content: &[u8]) -> &[u8] {
    content.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(content)
}

/// The first few KB of content as text, for cheap format sniffing.
pub(crate) fn sniff_head(content: &[u8]) -> Cow<'_, str> {
    let head_len = content.len().min(4096);
    String::from_utf8_lossy(&content[..head_len])
}

pub(crate) fn xml_reader<R: BufRead>(input: R) -> Reader<R> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    reader
}

pub(crate) fn xml_err<R>(source: quick_xml::Error, reader: &Reader<R>) -> CovscanError {
    CovscanError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

/// Look up a single attribute by local name, unescaped.
pub(crate) fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.local_name().as_ref() == name {
            attr.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Look up an attribute and parse it, treating unparseable values as absent.
pub(crate) fn parse_attr<T: std::str::FromStr>(e: &BytesStart, name: &[u8]) -> Option<T> {
    get_attr(e, name).and_then(|v| v.trim().parse().ok())
}
