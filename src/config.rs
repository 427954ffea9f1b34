use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use crate::error::SkipReviewError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 80;
pub const DEFAULT_LABEL: &str = "skip-review";
pub const DEFAULT_MAX_DIFF_SIZE: usize = 50_000;
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Project-local config file name, looked up at the project root.
pub const LOCAL_CONFIG_FILE: &str = ".skip-review.toml";

/// Which oracle judges the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// Chat-completions endpoint
    Llm,
    /// Built-in deterministic rule engine
    Rules,
}

/// One TOML layer. Every key is optional; later layers win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub model: Option<String>,
    pub confidence_threshold: Option<u8>,
    pub label: Option<String>,
    pub max_diff_size: Option<usize>,
    pub add_comment: Option<bool>,
    pub api_base: Option<String>,
    pub oracle: Option<OracleKind>,
    pub prompt_dir: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Fields set in `other` replace ours.
    fn merge(self, other: FileConfig) -> FileConfig {
        FileConfig {
            model: other.model.or(self.model),
            confidence_threshold: other.confidence_threshold.or(self.confidence_threshold),
            label: other.label.or(self.label),
            max_diff_size: other.max_diff_size.or(self.max_diff_size),
            add_comment: other.add_comment.or(self.add_comment),
            api_base: other.api_base.or(self.api_base),
            oracle: other.oracle.or(self.oracle),
            prompt_dir: other.prompt_dir.or(self.prompt_dir),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    fn read(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))
                .map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

/// Opaque bearer tokens. Never logged.
#[derive(Clone, Default)]
pub struct Credentials {
    pub oracle_api_key: Option<String>,
    pub hosting_token: Option<String>,
}

impl Credentials {
    fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            oracle_api_key: clean(self.oracle_api_key),
            hosting_token: clean(self.hosting_token),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<redacted>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("oracle_api_key", &redact(&self.oracle_api_key))
            .field("hosting_token", &redact(&self.hosting_token))
            .finish()
    }
}

/// Immutable per-run settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub confidence_threshold: u8,
    pub label_name: String,
    pub max_diff_size: usize,
    pub add_comment: bool,
    pub api_base: String,
    pub oracle: OracleKind,
    pub prompt_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub project_root: PathBuf,
    credentials: Credentials,
}

impl Config {
    /// Load global and project TOML layers, then apply CLI/env overrides.
    ///
    /// `explicit` replaces the project-local file when given; a missing
    /// explicit file is an error, a missing implicit one is not.
    pub fn load(
        explicit: Option<&Path>,
        overrides: FileConfig,
        credentials: Credentials,
    ) -> Result<Self, SkipReviewError> {
        let project_root = find_project_root();
        let mut layers = Vec::new();

        if let Some(path) = global_config_path() {
            if let Some(layer) = FileConfig::read(&path).map_err(config_error)? {
                layers.push(layer);
            }
        }

        match explicit {
            Some(path) => {
                let layer = FileConfig::read(path).map_err(config_error)?.ok_or_else(|| {
                    SkipReviewError::Configuration(format!(
                        "config file {} does not exist",
                        path.display()
                    ))
                })?;
                layers.push(layer);
            }
            None => {
                let path = project_root.join(LOCAL_CONFIG_FILE);
                if let Some(layer) = FileConfig::read(&path).map_err(config_error)? {
                    layers.push(layer);
                }
            }
        }

        layers.push(overrides);
        Self::from_layers(layers, credentials, project_root)
    }

    /// Merge layers (lowest priority first) and validate.
    pub fn from_layers(
        layers: Vec<FileConfig>,
        credentials: Credentials,
        project_root: PathBuf,
    ) -> Result<Self, SkipReviewError> {
        let merged = layers
            .into_iter()
            .fold(FileConfig::default(), FileConfig::merge);

        let confidence_threshold = merged
            .confidence_threshold
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        if confidence_threshold > 100 {
            return Err(SkipReviewError::Configuration(format!(
                "confidence_threshold must be within 0..=100, got {confidence_threshold}"
            )));
        }

        let max_diff_size = merged.max_diff_size.unwrap_or(DEFAULT_MAX_DIFF_SIZE);
        if max_diff_size == 0 {
            return Err(SkipReviewError::Configuration(
                "max_diff_size must be a positive number of characters".to_string(),
            ));
        }

        let label_name = merged.label.unwrap_or_else(|| DEFAULT_LABEL.to_string());
        if label_name.trim().is_empty() {
            return Err(SkipReviewError::Configuration(
                "label must not be empty".to_string(),
            ));
        }

        let prompt_dir = merged.prompt_dir.map(|p| {
            let path = PathBuf::from(p);
            if path.is_absolute() {
                path
            } else {
                project_root.join(path)
            }
        });

        Ok(Self {
            model: merged.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            confidence_threshold,
            label_name,
            max_diff_size,
            add_comment: merged.add_comment.unwrap_or(true),
            api_base: merged
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            oracle: merged.oracle.unwrap_or(OracleKind::Llm),
            prompt_dir,
            timeout_secs: merged.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            project_root,
            credentials: credentials.normalized(),
        })
    }

    /// The oracle bearer token; required only by the LLM oracle.
    pub fn oracle_api_key(&self) -> Result<&str, SkipReviewError> {
        self.credentials.oracle_api_key.as_deref().ok_or_else(|| {
            SkipReviewError::Configuration(
                "OPENAI_API_KEY is required for the llm oracle".to_string(),
            )
        })
    }

    /// The hosting-platform token; required whenever the PR is fetched.
    pub fn hosting_token(&self) -> Result<&str, SkipReviewError> {
        self.credentials.hosting_token.as_deref().ok_or_else(|| {
            SkipReviewError::Configuration("GITHUB_TOKEN (or GH_TOKEN) is required".to_string())
        })
    }

    /// Fail before any network call when a needed credential is absent.
    pub fn require_credentials(&self, needs_hosting: bool) -> Result<(), SkipReviewError> {
        if needs_hosting {
            self.hosting_token()?;
        }
        if self.oracle == OracleKind::Llm {
            self.oracle_api_key()?;
        }
        Ok(())
    }
}

fn config_error(e: anyhow::Error) -> SkipReviewError {
    SkipReviewError::Configuration(format!("{e:#}"))
}

/// ~/.config/skip-review/config.toml
pub fn global_config_path() -> Option<PathBuf> {
    BaseDirectories::with_prefix("skip-review")
        .ok()
        .map(|dirs| dirs.get_config_home().join("config.toml"))
}

/// Nearest ancestor of the current directory containing `.git`, else the
/// current directory itself.
pub fn find_project_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
        .unwrap_or(cwd)
}
