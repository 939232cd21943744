use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tern_types::{PermissionMode, SettingValue, Settings, StatusLineConfig};
use tern_utils::{AtomicWriteOptions, atomic_write_with_options};

use crate::ConfigError;
use crate::paths::config_path;

const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    model: Option<String>,
    fast_mode: Option<bool>,
    theme: Option<String>,
    permission_mode: Option<String>,
    vim_mode: Option<bool>,
    verbose: Option<bool>,
    auto_compact: Option<bool>,
    prompt_suggestions: Option<bool>,
    show_turn_duration: Option<bool>,
    status_line: Option<RawStatusLine>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStatusLine {
    #[serde(rename = "type", default = "default_status_line_type")]
    kind: String,
    #[serde(default)]
    command: String,
}

fn default_status_line_type() -> String {
    "command".to_string()
}

impl RawSettings {
    fn resolve(self) -> Settings {
        let defaults = Settings::default();
        let permission_mode = match self.permission_mode.as_deref().map(PermissionMode::parse) {
            Some(Ok(mode)) => mode,
            Some(Err(err)) => {
                tracing::warn!("{err}; using default");
                defaults.permission_mode
            }
            None => defaults.permission_mode,
        };
        let theme = match self.theme {
            Some(theme) if tern_types::THEMES.contains(&theme.as_str()) => theme,
            Some(theme) => {
                tracing::warn!(theme = %theme, "unknown theme; using default");
                defaults.theme
            }
            None => defaults.theme,
        };
        Settings {
            model: self.model.filter(|m| !m.trim().is_empty()),
            fast_mode: self.fast_mode.unwrap_or(defaults.fast_mode),
            theme,
            permission_mode,
            vim_mode: self.vim_mode.unwrap_or(defaults.vim_mode),
            verbose: self.verbose.unwrap_or(defaults.verbose),
            auto_compact: self.auto_compact.unwrap_or(defaults.auto_compact),
            prompt_suggestions: self.prompt_suggestions.unwrap_or(defaults.prompt_suggestions),
            show_turn_duration: self.show_turn_duration.unwrap_or(defaults.show_turn_duration),
            status_line: self.status_line.map(|raw| StatusLineConfig {
                kind: raw.kind,
                command: raw.command,
            }),
        }
    }
}

pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str::<RawSettings>(content).map(RawSettings::resolve)
}

/// Loads the user settings file. A missing file yields defaults.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    load_settings_from(&path)
}

pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&content).map_err(|source| {
        tracing::warn!(path = %path.display(), "failed to parse settings: {source}");
        ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// `${VAR}` references are replaced with the variable's value (empty if unset).
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            Some(_) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// `ANTHROPIC_API_KEY`, else `api_key` from the settings file.
#[must_use]
pub fn api_key() -> Option<String> {
    if let Some(key) = env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()) {
        return Some(key);
    }
    config_path().and_then(|path| load_api_key_from(&path))
}

#[must_use]
pub fn load_api_key_from(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let raw: RawSettings = toml::from_str(&content).ok()?;
    raw.api_key
        .map(|key| expand_env_vars(&key))
        .filter(|key| !key.trim().is_empty())
}

/// Writes one top-level key into the user settings file.
pub fn persist_setting(key: &str, value: &SettingValue) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    persist_setting_at(&path, key, value)
}

/// Patches `key` in the TOML document at `path`, creating the file if needed.
///
/// Uses `toml_edit` to preserve comments and formatting.
pub fn persist_setting_at(path: &Path, key: &str, value: &SettingValue) -> Result<(), ConfigError> {
    let content = if path.exists() {
        fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|source| ConfigError::Edit {
            path: path.to_path_buf(),
            source,
        })?;

    doc[key] = match value {
        SettingValue::Bool(b) => toml_edit::value(*b),
        SettingValue::Str(s) => toml_edit::value(s.as_str()),
    };

    atomic_write_with_options(path, doc.to_string().as_bytes(), AtomicWriteOptions::default())
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tern_types::{PermissionMode, SettingValue, Settings};

    use super::{expand_env_vars, load_settings_from, parse_settings, persist_setting_at};

    #[test]
    fn parse_empty_config_gives_defaults() {
        assert_eq!(parse_settings("").unwrap(), Settings::default());
    }

    #[test]
    fn parse_full_config() {
        let settings = parse_settings(
            r#"
model = "claude-opus-4-5"
fast_mode = true
theme = "light"
permission_mode = "acceptEdits"
vim_mode = true
prompt_suggestions = false

[status_line]
type = "command"
command = "~/bin/status.sh"
"#,
        )
        .unwrap();
        assert_eq!(settings.model.as_deref(), Some("claude-opus-4-5"));
        assert!(settings.fast_mode);
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.permission_mode, PermissionMode::AcceptEdits);
        assert!(settings.vim_mode);
        assert!(!settings.prompt_suggestions);
        let status = settings.status_line.unwrap();
        assert!(status.is_command());
        assert_eq!(status.command, "~/bin/status.sh");
    }

    #[test]
    fn invalid_enum_values_fall_back() {
        let settings = parse_settings("theme = \"neon\"\npermission_mode = \"yolo\"\n").unwrap();
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.permission_mode, PermissionMode::Default);
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "fast_mode = [").unwrap();
        let err = load_settings_from(&path).unwrap_err();
        assert_eq!(err.path(), Some(&path));
    }

    #[test]
    fn persist_preserves_comments_and_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "# my settings\ntheme = \"light\"\n").unwrap();

        persist_setting_at(&path, "fast_mode", &SettingValue::Bool(true)).unwrap();
        persist_setting_at(&path, "theme", &SettingValue::from("dark")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("# my settings"));
        let settings = load_settings_from(&path).unwrap();
        assert!(settings.fast_mode);
        assert_eq!(settings.theme, "dark");
    }

    #[test]
    fn persist_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        persist_setting_at(&path, "vim_mode", &SettingValue::Bool(true)).unwrap();
        assert!(load_settings_from(&path).unwrap().vim_mode);
    }

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("plain"), "plain");
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        assert_eq!(expand_env_vars("a${TERN_TEST_SURELY_UNSET_VAR}b"), "ab");
    }

    #[test]
    fn expand_env_vars_unclosed_brace_preserved() {
        assert_eq!(expand_env_vars("key-${OOPS"), "key-${OOPS");
    }

    #[test]
    fn expand_env_vars_empty_name_preserved() {
        assert_eq!(expand_env_vars("x${}y"), "x${}y");
    }
}
