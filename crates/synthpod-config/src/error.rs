//! Error types for configuration and bundle I/O operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur loading or saving a bundle or the driver config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bundle referenced a module or connection endpoint that does not
    /// exist in the bundle itself (a malformed §6 persisted-state tuple).
    /// Maps onto §7's *BadType* kind — the field is skipped by the caller,
    /// not treated as fatal.
    #[error("bundle references unknown module index {0}")]
    DanglingModuleRef(usize),
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile { path: path.into(), source }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile { path: path.into(), source }
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir { path: path.into(), source }
    }
}
