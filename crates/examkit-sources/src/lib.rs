//! examkit-sources: Exam acquisition.
//!
//! Implements the `ExamSource` trait over an HTTP exam server and a local
//! directory of exam files, and loads the `examkit.toml` configuration that
//! selects between them.

pub mod config;
pub mod error;
pub mod file;
pub mod http;
pub mod mock;

pub use config::{create_source, load_config, load_config_from, ExamkitConfig, SourceConfig};
pub use error::SourceError;
