use thiserror::Error;

use crate::detect::Format;

#[derive(Error, Debug)]
pub enum CovscanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage format")]
    UnknownFormat,

    #[error("Coverage format '{0}' cannot be parsed in detail")]
    UnsupportedFormat(Format),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CovscanError>;
