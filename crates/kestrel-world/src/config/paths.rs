use std::path::{Path, PathBuf};

/// Application name used for every per-user directory
pub const APP_NAME: &str = "kestrel";

/// Per-user directories for config, data and logs.
///
/// Unix-like systems follow the XDG base directory layout
/// (`$XDG_CONFIG_HOME/kestrel`, `$XDG_DATA_HOME/kestrel`); Windows uses
/// `%APPDATA%\kestrel` for both.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ProjectPaths {
    /// Resolve directories for `name`. Returns `None` when no home directory
    /// can be determined.
    pub fn new(name: &str) -> Option<Self> {
        let home = home_dir()?;
        Some(Self {
            config_dir: config_root(&home).join(name),
            data_dir: data_root(&home).join(name),
        })
    }

    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// `<config_dir>/config.toml`
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// `<data_dir>/logs`
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(not(target_os = "windows"))]
fn config_root(home: &Path) -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".config"))
}

#[cfg(not(target_os = "windows"))]
fn data_root(home: &Path) -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".local").join("share"))
}

#[cfg(target_os = "windows")]
fn config_root(home: &Path) -> PathBuf {
    std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join("AppData").join("Roaming"))
}

#[cfg(target_os = "windows")]
fn data_root(home: &Path) -> PathBuf {
    config_root(home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_contain_app_name() {
        if let Some(paths) = ProjectPaths::new(APP_NAME) {
            assert!(paths.config_dir().to_string_lossy().contains(APP_NAME));
            assert!(paths.data_dir().to_string_lossy().contains(APP_NAME));
        }
    }

    #[test]
    fn test_derived_paths() {
        if let Some(paths) = ProjectPaths::new("test") {
            assert!(paths.config_file().ends_with("test/config.toml"));
            assert!(paths.log_dir().ends_with("test/logs"));
        }
    }
}
