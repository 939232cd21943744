//! Write access to the user settings file.

use std::path::PathBuf;
use std::sync::Arc;

use tern_config::{ConfigError, persist_setting_at};
use tern_types::SettingValue;

use crate::effect::Effect;

pub trait SettingsStore: Send + Sync {
    /// Persists one key. `key` is the settings-file name, e.g. `fast_mode`.
    fn persist(&self, key: &str, value: &SettingValue) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsStore for FileSettingsStore {
    fn persist(&self, key: &str, value: &SettingValue) -> Result<(), ConfigError> {
        persist_setting_at(&self.path, key, value)
    }
}

/// Persists `key` on a background call, logging failures.
pub(crate) fn persist_quietly(
    store: &Arc<dyn SettingsStore>,
    key: &'static str,
    value: SettingValue,
) -> Effect {
    let store = Arc::clone(store);
    Effect::call(move || {
        if let Err(err) = store.persist(key, &value) {
            tracing::warn!(key, %err, "failed to persist setting");
        }
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use tern_config::load_settings_from;
    use tern_types::SettingValue;

    use super::{FileSettingsStore, SettingsStore};

    #[test]
    fn persists_into_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = FileSettingsStore::new(&path);
        store.persist("fast_mode", &SettingValue::Bool(true)).unwrap();
        store.persist("theme", &SettingValue::from("light")).unwrap();
        let settings = load_settings_from(&path).unwrap();
        assert!(settings.fast_mode);
        assert_eq!(settings.theme, "light");
    }
}
