//! Search directories for relative configuration paths.
//!
//! A relative path such as `cfgweave.yaml` is looked up in every tier and each
//! hit is loaded, lowest priority first, so files in higher tiers override
//! files in lower ones when merged.

use std::path::{Path, PathBuf};

/// Environment variable holding extra search directories (path-list syntax).
pub const CONF_DIR_ENV: &str = "CFGWEAVE_CONF_DIR";

/// Search tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SearchTier {
    /// Platform config directory (`~/.config/cfgweave` on Linux)
    Platform = 0,
    /// User directory (`~/.cfgweave`)
    User = 1,
    /// Current working directory
    Working = 2,
    /// Directories from `CFGWEAVE_CONF_DIR` (highest priority)
    Environment = 3,
}

impl std::fmt::Display for SearchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchTier::Platform => write!(f, "platform"),
            SearchTier::User => write!(f, "user"),
            SearchTier::Working => write!(f, "working"),
            SearchTier::Environment => write!(f, "environment"),
        }
    }
}

/// Ordered search directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfPaths {
    dirs: Vec<(SearchTier, PathBuf)>,
}

impl Default for ConfPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfPaths {
    /// Directories from the environment and the platform defaults.
    pub fn discover() -> Self {
        let mut dirs = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            dirs.push((SearchTier::Platform, config_dir.join("cfgweave")));
        }
        if let Some(home) = dirs::home_dir() {
            dirs.push((SearchTier::User, home.join(".cfgweave")));
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        dirs.push((SearchTier::Working, cwd));
        if let Some(list) = std::env::var_os(CONF_DIR_ENV) {
            for dir in std::env::split_paths(&list).filter(|d| !d.as_os_str().is_empty()) {
                dirs.push((SearchTier::Environment, dir));
            }
        }

        Self::with_dirs(dirs)
    }

    /// Explicit directories, ordered by tier (stable within a tier).
    pub fn with_dirs(dirs: impl IntoIterator<Item = (SearchTier, PathBuf)>) -> Self {
        let mut dirs: Vec<_> = dirs.into_iter().collect();
        dirs.sort_by_key(|(tier, _)| *tier);
        Self { dirs }
    }

    pub fn dirs(&self) -> impl Iterator<Item = (SearchTier, &Path)> {
        self.dirs.iter().map(|(tier, dir)| (*tier, dir.as_path()))
    }

    /// Existing files for `path`, lowest priority first.
    ///
    /// An absolute path is returned as-is when it exists.
    pub fn locate(&self, path: &Path) -> Vec<PathBuf> {
        if path.is_absolute() {
            return if path.exists() {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            };
        }

        let mut found: Vec<PathBuf> = Vec::new();
        for (_, dir) in &self.dirs {
            let candidate = dir.join(path);
            if candidate.exists() && !found.contains(&candidate) {
                found.push(candidate);
            }
        }
        found
    }
}
