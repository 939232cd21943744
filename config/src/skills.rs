//! Custom slash commands loaded from `commands/*.md`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tern_types::{Skill, truncate_with_ellipsis};

use crate::paths::config_dir;

const DESCRIPTION_MAX: usize = 80;

/// User skills from `~/.tern/commands`, overridden by project skills from
/// `<cwd>/.tern/commands`. Sorted by name.
#[must_use]
pub fn load_skills(cwd: &Path) -> Vec<Skill> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(dir) = config_dir() {
        dirs.push(dir.join("commands"));
    }
    dirs.push(cwd.join(".tern").join("commands"));
    load_skills_from(&dirs)
}

/// Later directories override earlier ones on name collisions.
#[must_use]
pub fn load_skills_from(dirs: &[PathBuf]) -> Vec<Skill> {
    let mut by_name: BTreeMap<String, Skill> = BTreeMap::new();
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(content) => {
                    if let Some(skill) = parse_skill(name, &content) {
                        by_name.insert(skill.name.clone(), skill);
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "failed to read skill: {err}");
                }
            }
        }
    }
    by_name.into_values().collect()
}

fn parse_skill(name: &str, content: &str) -> Option<Skill> {
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    let (front, body) = split_front_matter(content);
    let description = front
        .and_then(|front| {
            front.lines().find_map(|line| {
                line.trim()
                    .strip_prefix("description:")
                    .map(|d| d.trim().trim_matches('"').to_string())
            })
        })
        .filter(|d| !d.is_empty())
        .or_else(|| {
            body.lines()
                .map(|l| l.trim().trim_start_matches('#').trim())
                .find(|l| !l.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let prompt = body.trim().to_string();
    if prompt.is_empty() {
        return None;
    }
    Some(Skill {
        name,
        description: truncate_with_ellipsis(&description, DESCRIPTION_MAX),
        prompt,
    })
}

fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---") else {
        return (None, content);
    };
    let rest = rest.trim_start_matches(['\r', '\n']);
    match rest.find("\n---") {
        Some(end) => {
            let body = &rest[end + 4..];
            (Some(&rest[..end]), body.trim_start_matches(['\r', '\n']))
        }
        None => (None, content),
    }
}
