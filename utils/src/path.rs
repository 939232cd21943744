use std::path::{Path, PathBuf};

/// Replaces a leading `~` (alone or followed by `/`) with the home directory.
///
/// Input without a leading tilde, or when no home directory is known, is
/// returned unchanged.
#[must_use]
pub fn expand_tilde(raw: &str) -> String {
    let Some(rest) = raw.strip_prefix('~') else {
        return raw.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return raw.to_string();
    }
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.display()),
        None => raw.to_string(),
    }
}

#[must_use]
pub fn expand_tilde_path(raw: &Path) -> PathBuf {
    match raw.to_str() {
        Some(s) => PathBuf::from(expand_tilde(s)),
        None => raw.to_path_buf(),
    }
}
