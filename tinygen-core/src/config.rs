//! Settings file and environment overrides.
//!
//! `<home>/.tinygen/config.yaml` is optional; every field has a default.
//! Environment variables are applied on top of the file. An empty variable
//! counts as unset.
//!
//! | Variable                | Setting                          |
//! |-------------------------|----------------------------------|
//! | `TINYGEN_MODEL`         | `backend.model`                  |
//! | `TINYGEN_API_URL`       | `backend.api_url`                |
//! | `TINYGEN_HISTORY_LIMIT` | `conversation.history_limit`     |
//! | `$backend.api_key_env`  | API key (default `OPENAI_API_KEY`) |

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};
use crate::types::{AcceptanceMode, ArtifactFormat, LedgerPolicy};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

const DEFAULT_EXCLUDED_DIRS: &[&str] = &["node_modules", "vendor", ".git", "build", "dist"];

const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".html", ".css", ".java", ".cpp", ".c", ".go", ".rs", ".swift", ".rb",
];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.tinygen/`
pub fn tinygen_root(home: &Path) -> PathBuf {
    home.join(".tinygen")
}

/// `<home>/.tinygen/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    tinygen_root(home).join("config.yaml")
}

/// `<home>/.tinygen/repos/`: local snapshots, one directory per repository id.
pub fn repos_dir_at(home: &Path) -> PathBuf {
    tinygen_root(home).join("repos")
}

/// `<home>/.tinygen/templates/`: optional prompt template overrides.
pub fn templates_dir_at(home: &Path) -> PathBuf {
    tinygen_root(home).join("templates")
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub conversation: ConversationSettings,
    pub snapshot: SnapshotSettings,
    pub synthesis: SynthesisSettings,
    pub ledger: LedgerSettings,
}

/// Chat-completions endpoint used as the generative backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// Maximum number of turns kept in a session's history.
    pub history_limit: usize,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// File eligibility rules. Both sets are exact-match and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Directory names never descended into.
    pub excluded_dirs: BTreeSet<String>,
    /// File extensions, including the leading dot.
    pub source_extensions: BTreeSet<String>,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            source_extensions: DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisSettings {
    pub format: ArtifactFormat,
    pub acceptance: AcceptanceMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LedgerSettings {
    pub policy: LedgerPolicy,
}

impl Settings {
    /// Load `<home>/.tinygen/config.yaml` (defaults if absent) and apply the
    /// process environment.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(home, |var| std::env::var(var).ok())
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&home()?)
    }

    /// Like [`Settings::load_at`] with an injectable environment lookup.
    pub fn load_with_env(
        home: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = config_path_at(home);
        let mut settings = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| config_io(&path, e))?;
            if contents.trim().is_empty() {
                Settings::default()
            } else {
                serde_yaml::from_str(&contents)
                    .map_err(|source| ConfigError::Parse { path, source })?
            }
        } else {
            Settings::default()
        };
        settings.apply_env(|var| non_empty(lookup(var)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(model) = lookup("TINYGEN_MODEL") {
            self.backend.model = model;
        }
        if let Some(url) = lookup("TINYGEN_API_URL") {
            self.backend.api_url = url;
        }
        if let Some(raw) = lookup("TINYGEN_HISTORY_LIMIT") {
            self.conversation.history_limit =
                raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidEnv {
                        var: "TINYGEN_HISTORY_LIMIT",
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                })?;
        }
        Ok(())
    }

    /// A proposal and its reply must fit in the history together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conversation.history_limit < 2 {
            return Err(ConfigError::Invalid {
                key: "conversation.history_limit",
                reason: format!("must be at least 2, got {}", self.conversation.history_limit),
            });
        }
        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "backend.model",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Read the API key from the variable named by `backend.api_key_env`.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        non_empty(std::env::var(&self.backend.api_key_env).ok()).ok_or_else(|| {
            ConfigError::MissingApiKey {
                var: self.backend.api_key_env.clone(),
            }
        })
    }

    /// Atomically write the settings to `<home>/.tinygen/config.yaml` (mode 0600).
    pub fn save_at(&self, home: &Path) -> Result<PathBuf, ConfigError> {
        let path = config_path_at(home);
        let dir = tinygen_root(home);
        std::fs::create_dir_all(&dir).map_err(|e| config_io(&dir, e))?;
        let tmp = path.with_file_name("config.yaml.tmp");
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(&tmp, yaml).map_err(|e| config_io(&tmp, e))?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &path).map_err(|e| config_io(&path, e))?;
        Ok(path)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| config_io(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
