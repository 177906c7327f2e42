//! # Configuration File Loading
//!
//! Loads configuration from a single file or from every file under a
//! directory, merging them in file name order.
//!
//! The text format is detected from content, not from the extension: text
//! starting with `{` is JSON, anything else is the block markup.

use crate::binder::bind;
use crate::config::Config;
use crate::decoder::decode;
use crate::error::{ConfigError, ParseError};
use crate::normalizer::{Deprecation, normalize};
use crate::precedence::Merge;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Result of parsing one configuration text.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// The bound, not yet finalized, configuration.
    pub config: Config,

    /// Deprecated constructs found in the text, in promotion order.
    pub deprecations: Vec<Deprecation>,
}

/// Parse configuration text: decode, normalize, bind.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Path-free entry point of the pipeline. Does not log; deprecations are
/// returned to the caller.
///
/// ## Usage
/// ```rust
/// use replicate_config::parse;
///
/// let parsed = parse("token = \"abc\"").unwrap();
/// let conn = parsed.config.source_connection.unwrap();
/// assert_eq!(conn.token.as_deref(), Some("abc"));
/// assert_eq!(parsed.deprecations[0].key, "token");
/// ```
///
/// ## Error Handling
/// Returns `ParseError::Decode` for malformed text and `ParseError::Bind`
/// for unknown keys or values of the wrong shape.
pub fn parse(text: &str) -> Result<Parsed, ParseError> {
    let mut root = decode(text)?;
    let deprecations = normalize(&mut root);
    let config = bind(&root)?;
    Ok(Parsed {
        config,
        deprecations,
    })
}

/// Load configuration from one file.
///
/// Each deprecation found is logged at WARN with the file's path.
///
/// ## Error Handling
/// Returns `ConfigError::Read` when the file cannot be read, and
/// `ConfigError::Decode` / `ConfigError::Bind` wrapping parse failures.
pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = parse(&contents).map_err(|e| ConfigError::from_parse(path.to_path_buf(), e))?;
    for deprecation in &parsed.deprecations {
        warn!(
            path = %path.display(),
            key = %deprecation.key,
            "{}",
            deprecation
        );
    }

    debug!(path = %path.display(), "Loaded configuration file");
    Ok(parsed.config)
}

/// Load configuration from a file or a directory tree.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// A regular file is loaded with [`from_file`]. A directory is walked
/// recursively, entries sorted by file name within each directory, and
/// every regular file (or symlink to one) is loaded and merged into the
/// result, later files winning. Symlinks to directories are not followed.
/// An empty directory yields an empty [`Config`].
///
/// ## Usage
/// ```rust,no_run
/// use replicate_config::{Config, from_path};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let loaded = from_path(Path::new("/etc/consul-replicate.d"))?;
///     let config = Config::finalized(&loaded);
///     println!("log level: {}", config.log_level());
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Returns `ConfigError` for:
/// - Missing path (`NotFound`) or unreadable metadata (`Stat`)
/// - Directory listing failures (`List`)
/// - Anything that is neither a file nor a directory (`UnsupportedType`)
/// - The first file that fails to load; no partial result is returned
pub fn from_path(path: &Path) -> Result<Config, ConfigError> {
    let metadata = fs::metadata(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Stat {
            path: path.to_path_buf(),
            source,
        },
    })?;

    if metadata.is_file() {
        return from_file(path);
    }
    if !metadata.is_dir() {
        return Err(ConfigError::UnsupportedType {
            path: path.to_path_buf(),
            kind: describe(&metadata.file_type()),
        });
    }

    let mut config = Config::default();
    let walker = WalkDir::new(path).follow_links(false).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|source| ConfigError::List {
            path: source.path().unwrap_or(path).to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }

        if file_type.is_symlink() {
            let target = fs::metadata(entry.path()).map_err(|source| ConfigError::Stat {
                path: entry.path().to_path_buf(),
                source,
            })?;
            if target.is_dir() {
                debug!(path = %entry.path().display(), "Skipping symlink to directory");
                continue;
            }
            if !target.is_file() {
                return Err(ConfigError::UnsupportedType {
                    path: entry.path().to_path_buf(),
                    kind: describe(&target.file_type()),
                });
            }
        } else if !file_type.is_file() {
            return Err(ConfigError::UnsupportedType {
                path: entry.path().to_path_buf(),
                kind: describe(&file_type),
            });
        }

        config = config.merge(&from_file(entry.path())?);
    }

    Ok(config)
}

#[cfg(unix)]
fn describe(file_type: &fs::FileType) -> String {
    use std::os::unix::fs::FileTypeExt;

    let kind = if file_type.is_fifo() {
        "named pipe"
    } else if file_type.is_socket() {
        "socket"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_char_device() {
        "character device"
    } else {
        "unknown"
    };
    kind.to_string()
}

#[cfg(not(unix))]
fn describe(_file_type: &fs::FileType) -> String {
    "unknown".to_string()
}
