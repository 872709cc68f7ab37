//! Error types for staffdrill

use thiserror::Error;

use crate::parser::ParseError;

/// Result type alias for staffdrill operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can surface at the application edges.
///
/// The game engine itself never fails; these cover settings, storage,
/// audio setup and the terminal.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio output could not be opened
    #[error("Audio error: {0}")]
    Audio(String),

    /// Terminal/TUI error
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Bad user-supplied identifier (note, mode, clef)
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Stats blob (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
