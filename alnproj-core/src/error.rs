//! Error types for archive reading and writing

use thiserror::Error;

/// Errors raised while reading or writing a project archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container error: {0}")]
    Container(#[from] zip::result::ZipError),

    #[error("XML read error: {0}")]
    XmlRead(#[from] quick_xml::DeError),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),

    #[error("Archive entry not found: {0}")]
    MissingEntry(String),

    #[error("Malformed document '{entry}': {message}")]
    Document { entry: String, message: String },

    #[error("Cannot mix AND and OR conditions in one filter: {0}")]
    MixedConjunction(String),

    #[error("Invalid colour '{0}'")]
    Colour(String),

    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Archive is closed after an earlier failure")]
    Closed,

    #[error("Out of memory: {0}")]
    OutOfMemory(String),
}

impl ArchiveError {
    pub fn document<E: Into<String>, M: Into<String>>(entry: E, message: M) -> Self {
        Self::Document {
            entry: entry.into(),
            message: message.into(),
        }
    }

    pub fn unknown<S: Into<String>>(kind: &'static str, value: S) -> Self {
        Self::UnknownValue {
            kind,
            value: value.into(),
        }
    }

    /// Out-of-memory and closed-container failures end the whole call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory(_) | Self::Io(_) | Self::Closed)
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Single human-readable message accumulated across one save or load call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    message: Option<String>,
}

impl ErrorLog {
    pub fn push<S: AsRef<str>>(&mut self, line: S) {
        match &mut self.message {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(line.as_ref());
            }
            None => self.message = Some(line.as_ref().to_string()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn into_message(self) -> Option<String> {
        self.message
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none()
    }
}
