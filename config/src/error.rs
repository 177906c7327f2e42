//! # Configuration Errors
//!
//! Error types for every stage of the pipeline. Decode and bind errors are
//! path-free; the file loader wraps them with the originating file.

use std::path::PathBuf;
use thiserror::Error;

/// Markup is syntactically invalid or its root is not a mapping.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct DecodeError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl DecodeError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// The normalized tree does not fit the typed model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("'{path}' has invalid keys: unknown configuration key")]
    UnknownKey { path: String },

    #[error("'{path}' expected type {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{path}' invalid signal {value:?}")]
    InvalidSignal { path: String, value: String },

    #[error("'{path}' {message}")]
    InvalidValue { path: String, message: String },
}

impl BindError {
    /// Dotted key path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            BindError::UnknownKey { path }
            | BindError::TypeMismatch { path, .. }
            | BindError::InvalidSignal { path, .. }
            | BindError::InvalidValue { path, .. } => path,
        }
    }
}

/// Failure of the pure text → config pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("error decoding config: {0}")]
    Decode(#[from] DecodeError),

    #[error("error binding config: {0}")]
    Bind(#[from] BindError),
}

/// Failure of loading configuration from the filesystem.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing file/folder: {path}")]
    NotFound { path: PathBuf },

    #[error("failed stating file: {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed listing dir: {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed reading file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("from file: {path}: error decoding config: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("from file: {path}: error binding config: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: BindError,
    },

    #[error("unknown filetype: {path}: {kind}")]
    UnsupportedType { path: PathBuf, kind: String },
}

impl ConfigError {
    pub(crate) fn from_parse(path: PathBuf, err: ParseError) -> Self {
        match err {
            ParseError::Decode(source) => ConfigError::Decode { path, source },
            ParseError::Bind(source) => ConfigError::Bind { path, source },
        }
    }

    /// Path of the file or directory the error originated from.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ConfigError::NotFound { path }
            | ConfigError::Stat { path, .. }
            | ConfigError::List { path, .. }
            | ConfigError::Read { path, .. }
            | ConfigError::Decode { path, .. }
            | ConfigError::Bind { path, .. }
            | ConfigError::UnsupportedType { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_names_path() {
        let err = BindError::UnknownKey {
            path: "consul.retry.atempts".to_string(),
        };
        assert_eq!(err.path(), "consul.retry.atempts");
        assert!(err.to_string().contains("consul.retry.atempts"));
    }

    #[test]
    fn test_parse_error_wraps_with_path() {
        let err = ConfigError::from_parse(
            PathBuf::from("/etc/cr/a.hcl"),
            ParseError::Decode(DecodeError::new(3, 7, "expected '='")),
        );
        assert!(matches!(err, ConfigError::Decode { .. }));
        assert_eq!(err.path(), std::path::Path::new("/etc/cr/a.hcl"));
        let message = err.to_string();
        assert!(message.contains("/etc/cr/a.hcl"));
        assert!(message.contains("line 3, column 7"));
    }
}
