//! Session configuration.
//!
//! Loaded from `ostinato.toml` in the working directory, falling back to
//! the user config dir. CLI flags override file values; a missing file
//! means defaults, a malformed file is a startup error rather than a
//! silent fallback.

use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Tunables for a live session.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Composition poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Analyser FFT size; time-domain reads return this many samples.
    pub fft_size: usize,
    /// Start playback automatically when the watcher reports a change.
    pub auto_play: bool,
    /// Default composition file for `watch` when none is given.
    pub composition: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            fft_size: 2048,
            auto_play: true,
            composition: None,
        }
    }
}

impl SessionConfig {
    /// Load from an explicit path. A missing file is an error here.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Standard lookup: `./ostinato.toml`, then the user config dir.
    pub fn load() -> Result<Self, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("ostinato.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("ostinato").join("config.toml"));
        }
        paths
    }
}
