use std::path::{Path, PathBuf};
use std::env;

use crate::config::APP_NAME;

pub const CONFIG_NAME: &str = "config.toml";

#[cfg(target_os = "linux")]
fn system_config_dir() -> Option<PathBuf> {
    Some(PathBuf::from("/etc"))
}

#[cfg(target_os = "macos")]
fn system_config_dir() -> Option<PathBuf> {
    Some(PathBuf::from("/Library/Application Support"))
}

#[cfg(target_os = "windows")]
fn system_config_dir() -> Option<PathBuf> {
    env::var_os("ProgramData").map(PathBuf::from)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn system_config_dir() -> Option<PathBuf> {
    None
}

/// Candidate config files: the working directory's `config.toml`, then
/// `<dir>/askcode/config.toml` under the user and system config dirs.
pub fn search_paths() -> Vec<PathBuf> {
    let local = env::current_dir().ok().map(|cwd| cwd.join(CONFIG_NAME));
    let app_dirs = [dirs::config_dir(), system_config_dir()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(APP_NAME).join(CONFIG_NAME));

    local.into_iter().chain(app_dirs).collect()
}

pub fn first_existing(paths: &[PathBuf]) -> Option<PathBuf> {
    paths.iter().find(|path| path.is_file()).cloned()
}

pub fn find() -> Option<PathBuf> {
    first_existing(&search_paths())
}

/// An explicitly requested path wins over the env var, which wins over the search paths.
pub fn resolve(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or(from_env)
        .or_else(find)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_directory_comes_first() {
        let cwd = env::current_dir().unwrap();

        assert_eq!(search_paths().first(), Some(&cwd.join(CONFIG_NAME)));
    }

    #[test]
    fn test_search_paths_contains_config_name() {
        for path in search_paths() {
            assert!(
                path.ends_with(CONFIG_NAME),
                "All paths should end with config.toml: {:?}",
                path
            );
        }
    }

    #[test]
    fn test_search_paths_includes_app_name() {
        let has_app_name = search_paths().iter().any(|p| {
            p.to_string_lossy().contains(APP_NAME)
        });

        assert!(has_app_name, "Should include path with app name");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_system_path_included() {
        let has_etc_path = search_paths().iter().any(|p| {
            p.to_string_lossy().contains("/etc/askcode")
        });

        assert!(has_etc_path, "Should include /etc/askcode path on Linux");
    }

    #[test]
    fn test_first_existing_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("present.toml");
        std::fs::write(&present, "model = \"m\"").unwrap();

        assert_eq!(first_existing(&[missing.clone(), present.clone()]), Some(present));
        assert_eq!(first_existing(&[missing]), None);
    }

    #[test]
    fn test_resolve_prefers_explicit_then_env() {
        let explicit = PathBuf::from("/tmp/explicit.json");
        let from_env = PathBuf::from("/tmp/env.toml");

        assert_eq!(
            resolve(Some(explicit.as_path()), Some(from_env.clone())),
            Some(explicit)
        );
        assert_eq!(resolve(None, Some(from_env.clone())), Some(from_env));
    }
}
