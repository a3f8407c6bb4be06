use std::fmt;

use crate::model::StyleKind;

#[derive(Debug)]
pub enum Error {
    InvalidDocx(String),
    EmptyTemplate,
    NoRecords,
    Zip(zip::result::ZipError),
    Xml(roxmltree::Error),
    Csv(csv::Error),
    Io(std::io::Error),
    Conversion(String),
    Assembly(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDocx(reason) => write!(f, "not a valid DOCX file: {reason}"),
            Error::EmptyTemplate => write!(f, "template has no body content"),
            Error::NoRecords => write!(f, "data source contains no records"),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::Xml(e) => write!(f, "XML error: {e}"),
            Error::Csv(e) => write!(f, "CSV error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Conversion(e) => write!(f, "conversion failed: {e}"),
            Error::Assembly(e) => write!(f, "could not assemble merged document: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Zip(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// A single run attribute that could not be applied. Absorbed by the
/// paragraph rebuilder; the run keeps its text and the remaining attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum FormattingError {
    UnsupportedColor(String),
    FontSizeOutOfRange(f32),
    EmptyFontName,
}

impl fmt::Display for FormattingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormattingError::UnsupportedColor(val) => write!(f, "unsupported color value {val:?}"),
            FormattingError::FontSizeOutOfRange(sz) => write!(f, "font size {sz}pt out of range"),
            FormattingError::EmptyFontName => write!(f, "empty font name"),
        }
    }
}

impl std::error::Error for FormattingError {}

/// A block that could not be copied into the combined document with full
/// fidelity. Absorbed by the assembler, which falls back to a plain copy.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendError {
    /// Source and target define the same style id with different kinds.
    StyleKindMismatch {
        id: String,
        expected: StyleKind,
        found: StyleKind,
    },
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    DanglingSection(usize),
}

impl fmt::Display for AppendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendError::StyleKindMismatch { id, expected, found } => {
                write!(f, "style {id:?} is a {found:?} style in the target, {expected:?} in the source")
            }
            AppendError::ShapeMismatch { expected, actual } => write!(
                f,
                "table shape {}x{} does not match source {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            AppendError::DanglingSection(idx) => {
                write!(f, "section break refers to missing section {idx}")
            }
        }
    }
}

impl std::error::Error for AppendError {}
