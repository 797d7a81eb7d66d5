use std::path::PathBuf;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::assemble::MergeOptions;
use crate::assemble::merge::{DEFAULT_GLOB_CHARS, DEFAULT_SEPARATOR};
use crate::error::Error;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MergeConfig {
    /// Characters the glob matcher treats as wildcards.
    pub glob_chars: String,
    /// Path separator terminating a sandbox prefix.
    pub separator: char,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            glob_chars: DEFAULT_GLOB_CHARS.into(),
            separator: DEFAULT_SEPARATOR,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Terminal log level (`off`, `error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Audit log file for assembled commands. Empty disables it.
    #[serde(default)]
    pub audit_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            audit_log: String::new(),
        }
    }
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    merge: MergeOverlay,
    #[serde(default)]
    logging: LoggingOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct MergeOverlay {
    glob_chars: Option<String>,
    separator: Option<char>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingOverlay {
    level: Option<String>,
    audit_log: Option<String>,
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/argforge/config.toml (if exists)
    ///
    /// Every key set in the overlay replaces the default; omitted keys keep it.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    /// Try to load user overlay from ~/.config/argforge/config.toml.
    fn load_overlay() -> Option<ConfigOverlay> {
        let home = std::env::var_os("HOME")?;
        let path = std::path::Path::new(&home).join(".config/argforge/config.toml");
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                // The logger is configured from this file, so it is not up yet.
                eprintln!("argforge: config parse error: {e}");
                None
            }
        }
    }

    /// Apply an overlay on top of this config.
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let m = overlay.merge;
        if let Some(v) = m.glob_chars {
            self.merge.glob_chars = v;
        }
        if let Some(v) = m.separator {
            self.merge.separator = v;
        }

        let l = overlay.logging;
        if let Some(v) = l.level {
            self.logging.level = v;
        }
        if let Some(v) = l.audit_log {
            self.logging.audit_log = v;
        }
    }

    /// Validated merge options for this configuration.
    pub fn merge_options(&self) -> Result<MergeOptions, Error> {
        Ok(MergeOptions::new(
            &self.merge.glob_chars,
            self.merge.separator,
        )?)
    }

    /// Terminal log level.
    pub fn level_filter(&self) -> Result<LevelFilter, Error> {
        self.logging
            .level
            .parse()
            .map_err(|_| Error::Config {
                reason: format!("unknown log level: {}", self.logging.level),
            })
    }

    /// Audit log location with `~` expanded, or `None` when disabled.
    pub fn audit_log_path(&self) -> Option<PathBuf> {
        let raw = self.logging.audit_log.trim();
        if raw.is_empty() {
            return None;
        }
        Some(PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
