/// Classification of candidate coverage files.
///
/// Strategy:
///   1. Known binary coverage extensions are classified without reading
///   2. Sniff the first few KB of text for root-element markers
///   3. Fall back to reading XML events up to the root element
///
/// Detection never fails: unreadable or malformed input is `Unknown`.
use std::path::Path;

use quick_xml::events::Event;
use serde::Serialize;

use crate::error::CovscanError;
use crate::parsers::{sniff_head, strip_bom, xml_reader};

/// File extensions of the binary container written by the Visual Studio
/// collector. Recognized, never parsed.
pub const BINARY_EXTENSIONS: &[&str] = &["coverage"];

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Cobertura,
    OpenCover,
    #[serde(rename = "vs-binary")]
    VisualStudioBinary,
    Unknown,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cobertura => "cobertura",
            Format::OpenCover => "opencover",
            Format::VisualStudioBinary => "vs-binary",
            Format::Unknown => "unknown",
        }
    }

    /// Whether a parser exists for this format.
    #[must_use]
    pub fn is_parseable(&self) -> bool {
        matches!(self, Format::Cobertura | Format::OpenCover)
    }
}

impl std::str::FromStr for Format {
    type Err = CovscanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cobertura" => Ok(Format::Cobertura),
            "opencover" => Ok(Format::OpenCover),
            _ => Err(CovscanError::Parse(format!(
                "Unknown format: '{}'. Supported: cobertura, opencover",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the file at `path`, reading it if the extension is not
/// conclusive.
pub fn detect_file(path: &Path, binary_extensions: &[String]) -> Format {
    if has_binary_extension(path, binary_extensions) {
        return Format::VisualStudioBinary;
    }
    match std::fs::read(path) {
        Ok(content) => detect_format_with(path, &content, binary_extensions),
        Err(e) => {
            tracing::debug!("cannot read {}: {e}", path.display());
            Format::Unknown
        }
    }
}

/// Detect the format from filename and already-loaded content, using the
/// default [`BINARY_EXTENSIONS`].
pub fn detect_format(path: &Path, content: &[u8]) -> Format {
    detect_format_with(path, content, BINARY_EXTENSIONS)
}

/// As [`detect_format`], with a caller-supplied list of binary extensions.
pub fn detect_format_with<S: AsRef<str>>(
    path: &Path,
    content: &[u8],
    binary_extensions: &[S],
) -> Format {
    if has_binary_extension(path, binary_extensions) {
        return Format::VisualStudioBinary;
    }
    detect_content(content)
}

fn has_binary_extension<S: AsRef<str>>(path: &Path, binary_extensions: &[S]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            binary_extensions
                .iter()
                .any(|b| b.as_ref().eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn detect_content(content: &[u8]) -> Format {
    let content = strip_bom(content);
    match detect_by_sniff(content) {
        Format::Unknown => detect_by_root_element(content),
        format => format,
    }
}

fn detect_by_sniff(content: &[u8]) -> Format {
    let head = sniff_head(content);

    if head.contains("<CoverageSession") {
        return Format::OpenCover;
    }
    // Cobertura DTD: http://cobertura.sourceforge.net/xml/coverage-04.dtd
    if head.contains("<coverage") || head.contains("cobertura.sourceforge.net/xml/coverage") {
        return Format::Cobertura;
    }
    Format::Unknown
}

/// Read up to the first element and classify by its local name.
fn detect_by_root_element(content: &[u8]) -> Format {
    let mut reader = xml_reader(content);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                return match e.local_name().as_ref() {
                    b"coverage" => Format::Cobertura,
                    b"CoverageSession" => Format::OpenCover,
                    _ => Format::Unknown,
                };
            }
            Ok(Event::Eof) | Err(_) => return Format::Unknown,
            Ok(Event::Text(ref t)) if !t.iter().all(u8::is_ascii_whitespace) => {
                return Format::Unknown;
            }
            _ => {}
        }
        buf.clear();
    }
}
