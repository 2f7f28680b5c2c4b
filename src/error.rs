use std::path::PathBuf;

use thiserror::Error;

/// S-expression parse errors
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("SExpr {0} not found")]
    MissingChild(String),
    #[error("Value not found")]
    MissingValue(),
    #[error("Invalid number {0}")]
    InvalidNumber(String),
    #[error("Unexpected end of input at {at:?}")]
    UnexpectedEof { at: logos::Span },
    #[error("Expected {expected} but found {found} at {at:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        at: logos::Span,
    },
    #[error("Unknown token {found} at {at:?}")]
    UnknownToken { found: String, at: logos::Span },
}

/// Errors surfaced by the pinout pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot parse {}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },
    #[error("Cannot write spreadsheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("Cannot read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Spreadsheet {} has no header row with {1}", .0.display())]
    MissingHeader(PathBuf, &'static str),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("Cannot parse config: {0}")]
    ConfigSyntax(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Io { path, source }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>) -> impl FnOnce(ParseError) -> Self {
        let path = path.into();
        move |source| Error::Parse { path, source }
    }
}
