//! Error handling for the alnproj CLI

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("No entry named {entry} in {archive}")]
    MissingEntry { archive: PathBuf, entry: String },

    #[error("No view titled {title}")]
    ViewNotFound { title: String },

    #[error("Archive error: {message}")]
    Archive { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn missing_entry<S: Into<String>>(archive: PathBuf, entry: S) -> Self {
        Self::MissingEntry {
            archive,
            entry: entry.into(),
        }
    }

    pub fn view_not_found<S: Into<String>>(title: S) -> Self {
        Self::ViewNotFound { title: title.into() }
    }

    pub fn archive<S: Into<String>>(message: S) -> Self {
        Self::Archive { message: message.into() }
    }
}

impl From<alnproj_core::ArchiveError> for CliError {
    fn from(err: alnproj_core::ArchiveError) -> Self {
        Self::archive(err.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

/// Error text with a hint for the cases a user can act on.
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();
    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!("\n\nCheck that the path is correct: {}", path.display()));
        }
        CliError::MissingEntry { archive, .. } => {
            message.push_str(&format!(
                "\n\nRun 'alnproj inspect {}' to list the entries it holds",
                archive.display()
            ));
        }
        CliError::Config { .. } => {
            message.push_str("\n\nCheck your alnproj.toml configuration file");
        }
        _ => {}
    }
    message
}
