//! Configuration and source factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examkit_core::controller::SessionConfig;
use examkit_core::traits::ExamSource;

use crate::file::FileExamSource;
use crate::http::{HttpExamSource, DEFAULT_TIMEOUT_SECS};

/// Where exams come from.
///
/// Note: Custom Debug impl masks the API token to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Http {
        base_url: String,
        #[serde(default)]
        api_token: Option<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
    File {
        #[serde(default = "default_exam_dir")]
        dir: PathBuf,
    },
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceConfig::Http {
                base_url,
                api_token,
                timeout_secs,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_token", &api_token.as_ref().map(|_| "***"))
                .field("timeout_secs", timeout_secs)
                .finish(),
            SourceConfig::File { dir } => f.debug_struct("File").field("dir", dir).finish(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::File {
            dir: default_exam_dir(),
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_exam_dir() -> PathBuf {
    PathBuf::from("./exams")
}

/// `[session]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Violations tolerated before the exam is force-submitted.
    #[serde(default = "default_max_violations")]
    pub max_violations: u32,
    /// Seconds between progress snapshots.
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,
    /// Arm the integrity monitor.
    #[serde(default = "default_true")]
    pub secure_mode: bool,
}

fn default_max_violations() -> u32 {
    3
}
fn default_autosave_interval() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_violations: default_max_violations(),
            autosave_interval_secs: default_autosave_interval(),
            secure_mode: true,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            secure_mode: self.secure_mode,
            max_violations: self.max_violations,
            autosave_interval: Duration::from_secs(self.autosave_interval_secs.max(1)),
            ..SessionConfig::default()
        }
    }
}

/// Top-level examkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamkitConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub session: SessionSettings,
    /// Default student id for `examkit take`.
    #[serde(default)]
    pub student_id: Option<String>,
    /// Directory for in-progress snapshots.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Directory for submission files.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.examkit/cache")
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("./examkit-results")
}

impl Default for ExamkitConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            session: SessionSettings::default(),
            student_id: None,
            cache_dir: default_cache_dir(),
            results_dir: default_results_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_source_config(config: &SourceConfig) -> SourceConfig {
    match config {
        SourceConfig::Http {
            base_url,
            api_token,
            timeout_secs,
        } => SourceConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_token: api_token.as_ref().map(|t| resolve_env_vars(t)),
            timeout_secs: *timeout_secs,
        },
        SourceConfig::File { dir } => SourceConfig::File {
            dir: PathBuf::from(resolve_env_vars(&dir.to_string_lossy())),
        },
    }
}

/// Apply `EXAMKIT_BASE_URL` and `EXAMKIT_API_TOKEN`.
///
/// A base URL switches the source to HTTP. The token only applies to an HTTP
/// source.
fn apply_overrides(config: &mut ExamkitConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("EXAMKIT_BASE_URL") {
        match &mut config.source {
            SourceConfig::Http { base_url, .. } => *base_url = url,
            SourceConfig::File { .. } => {
                config.source = SourceConfig::Http {
                    base_url: url,
                    api_token: None,
                    timeout_secs: default_timeout(),
                }
            }
        }
    }

    if let Some(token) = var("EXAMKIT_API_TOKEN") {
        if let SourceConfig::Http { api_token, .. } = &mut config.source {
            *api_token = Some(token);
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examkit.toml` in the current directory
/// 2. `~/.config/examkit/config.toml`
///
/// Environment variable overrides: `EXAMKIT_BASE_URL`, `EXAMKIT_API_TOKEN`.
pub fn load_config() -> Result<ExamkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamkitConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examkit.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamkitConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamkitConfig::default(),
    };

    apply_overrides(&mut config, |name| std::env::var(name).ok());
    config.source = resolve_source_config(&config.source);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examkit"))
}

/// Create an exam source from its configuration.
pub fn create_source(config: &SourceConfig) -> Result<Box<dyn ExamSource>> {
    match config {
        SourceConfig::Http {
            base_url,
            api_token,
            timeout_secs,
        } => {
            if base_url.is_empty() {
                anyhow::bail!("http source needs a base_url");
            }
            Ok(Box::new(HttpExamSource::with_timeout(
                base_url,
                api_token.clone(),
                *timeout_secs,
            )?))
        }
        SourceConfig::File { dir } => Ok(Box::new(FileExamSource::new(dir.clone()))),
    }
}
