use std::env;
use std::path::{Path, PathBuf};

use tern_utils::expand_tilde_path;

const CONFIG_DIR_ENV: &str = "TERN_CONFIG_DIR";
const MEMORY_FILE: &str = "TERN.md";

/// `$TERN_CONFIG_DIR`, else `~/.tern`.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Some(expand_tilde_path(Path::new(&dir)));
    }
    dirs::home_dir().map(|home| home.join(".tern"))
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

#[must_use]
pub fn sessions_dir() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("sessions"))
}

#[must_use]
pub fn logs_dir() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("logs"))
}

#[must_use]
pub fn project_memory_path(cwd: &Path) -> PathBuf {
    cwd.join(MEMORY_FILE)
}

#[must_use]
pub fn user_memory_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(MEMORY_FILE))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::project_memory_path;

    #[test]
    fn project_memory_lives_in_cwd() {
        assert_eq!(
            project_memory_path(Path::new("/work/repo")),
            Path::new("/work/repo/TERN.md")
        );
    }
}
