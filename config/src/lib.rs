//! Configuration for tern.
//!
//! The settings file is `~/.tern/config.toml` (or `$TERN_CONFIG_DIR/config.toml`).
//! Reads go through serde into a private raw shape that is resolved into
//! [`tern_types::Settings`]. Writes patch one key at a time with `toml_edit`
//! so comments and formatting survive.

mod paths;
mod settings;
mod skills;

use std::path::PathBuf;

use thiserror::Error;

pub use paths::{
    config_dir, config_path, logs_dir, project_memory_path, sessions_dir, user_memory_path,
};
pub use settings::{
    api_key, expand_env_vars, load_api_key_from, load_settings, load_settings_from,
    parse_settings, persist_setting, persist_setting_at,
};
pub use skills::{load_skills, load_skills_from};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the config directory")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{path} is not valid TOML: {source}")]
    Edit {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::NoConfigDir => None,
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Edit { path, .. }
            | ConfigError::Write { path, .. } => Some(path),
        }
    }
}
