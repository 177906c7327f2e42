//! # Replication Configuration
//!
//! Configuration layer for the KV replication daemon.
//!
//! This crate provides:
//! - A decoder for the block markup (and JSON) into a generic [`Value`] tree
//! - Normalization of repeated blocks and deprecated top-level keys
//! - Strict, rule-driven binding into the typed [`Config`] model
//! - Field-granular merge and default filling for every stanza
//! - Loading from a single file or a whole directory
//!
//! # Pipeline
//!
//! ```text
//! path ─► from_path ─► (per file) decode ─► normalize ─► bind ─► Config
//!                                                                  │
//!                                        merge across files ◄──────┘
//!                                                │
//!                                            finalize
//! ```
//!
//! Finalizing is left to the caller so several sources (files, CLI flags)
//! can be merged first:
//!
//! ```rust,no_run
//! use replicate_config::{Config, from_path};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::finalized(&from_path(Path::new("config.hcl"))?);
//!     for prefix in config.prefixes() {
//!         println!("{:?}", prefix.source);
//!     }
//!     Ok(())
//! }
//! ```

pub mod binder;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod defaults;
pub mod duration;
pub mod error;
pub mod file_loader;
pub mod jobs;
pub mod normalizer;
pub mod precedence;
mod rules;
pub mod signal;
pub mod stanzas;
pub mod value;

pub use config::Config;
pub use connection::{AuthConfig, ConnectionConfig, RetryConfig, SslConfig, TransportConfig};
pub use duration::{InvalidDuration, format_duration, parse_duration};
pub use error::{BindError, ConfigError, DecodeError, ParseError};
pub use file_loader::{Parsed, from_file, from_path, parse};
pub use jobs::{ExcludeConfig, PrefixConfig};
pub use normalizer::Deprecation;
pub use precedence::{Finalize, Merge};
pub use signal::{Signal, UnknownSignal};
pub use stanzas::{SyslogConfig, WaitConfig};
pub use value::{Map, Value};
