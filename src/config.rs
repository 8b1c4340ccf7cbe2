//! Configuration management for lc3-vmm.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (`LC3_VMM_PC_START`, etc.)
//! 2. Project-local config file (`./lc3-vmm.toml`)
//! 3. User config file (`~/.config/lc3-vmm/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # lc3-vmm.toml
//!
//! # Address of the first fetched instruction
//! pc_start = 0x3000
//!
//! # Log every instruction (needs RUST_LOG=trace)
//! trace = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::device::memory_map::PC_START;
use crate::device::virtio::DEFAULT_POLL_LIMIT;

/// lc3-vmm configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Initial program counter.
    pub pc_start: Option<u16>,

    /// Log each instruction as it retires.
    pub trace: Option<bool>,

    /// Dump the address space to this file when the program stops.
    pub memory_sync: Option<String>,

    /// Completion polls before a host-side block driver gives up.
    pub replay_poll_limit: Option<u32>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `lc3-vmm.toml`
    /// 3. User config `~/.config/lc3-vmm/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::user_config_path().and_then(|p| Self::load_from_file(&p)) {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_from_file(Path::new("lc3-vmm.toml")) {
            config.merge(local_config);
        }

        config.apply_overrides(|key| std::env::var(key).ok());

        log::debug!("Loaded configuration: {:?}", config);
        config
    }

    /// Initial PC, defaulting to 0x3000.
    pub fn pc_start(&self) -> u16 {
        self.pc_start.unwrap_or(PC_START)
    }

    pub fn trace(&self) -> bool {
        self.trace.unwrap_or(false)
    }

    pub fn memory_sync(&self) -> Option<&Path> {
        self.memory_sync.as_deref().map(Path::new)
    }

    pub fn replay_poll_limit(&self) -> u32 {
        self.replay_poll_limit.unwrap_or(DEFAULT_POLL_LIMIT)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    pub fn merge(&mut self, other: Self) {
        if other.pc_start.is_some() {
            self.pc_start = other.pc_start;
        }
        if other.trace.is_some() {
            self.trace = other.trace;
        }
        if other.memory_sync.is_some() {
            self.memory_sync = other.memory_sync;
        }
        if other.replay_poll_limit.is_some() {
            self.replay_poll_limit = other.replay_poll_limit;
        }
    }

    /// Apply overrides from `lookup` (the process environment in [`Config::load`]).
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("LC3_VMM_PC_START") {
            match parse_number(&value).and_then(|v| u16::try_from(v).ok()) {
                Some(pc) => {
                    log::info!("Using LC3_VMM_PC_START from environment: 0x{:04X}", pc);
                    self.pc_start = Some(pc);
                }
                None => log::warn!("Ignoring LC3_VMM_PC_START={:?}", value),
            }
        }
        if let Some(value) = lookup("LC3_VMM_TRACE") {
            match parse_bool(&value) {
                Some(trace) => self.trace = Some(trace),
                None => log::warn!("Ignoring LC3_VMM_TRACE={:?}", value),
            }
        }
        if let Some(path) = lookup("LC3_VMM_MEMORY_SYNC") {
            log::info!("Using LC3_VMM_MEMORY_SYNC from environment: {}", path);
            self.memory_sync = Some(path);
        }
        if let Some(value) = lookup("LC3_VMM_REPLAY_POLL_LIMIT") {
            match parse_number(&value).and_then(|v| u32::try_from(v).ok()) {
                Some(limit) => self.replay_poll_limit = Some(limit),
                None => log::warn!("Ignoring LC3_VMM_REPLAY_POLL_LIMIT={:?}", value),
            }
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lc3-vmm").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# lc3-vmm configuration
# Place this file at ~/.config/lc3-vmm/config.toml or ./lc3-vmm.toml

# Address of the first fetched instruction (default 0x3000)
pc_start = 0x3000

# Log every instruction at trace level (default false)
# trace = true

# Dump the whole address space here when the program stops (optional)
# memory_sync = "memory.img"

# Completion polls before the host-side block driver times out
# replay_poll_limit = 10000
"#
        .to_string()
    }
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_number(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pc_start(), 0x3000);
        assert!(!config.trace());
        assert_eq!(config.memory_sync(), None);
        assert_eq!(config.replay_poll_limit(), DEFAULT_POLL_LIMIT);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config {
            pc_start: Some(0x4000),
            trace: Some(true),
            memory_sync: None,
            replay_poll_limit: None,
        };

        let overlay = Config {
            pc_start: None,
            trace: Some(false),
            memory_sync: Some("dump.img".to_string()),
            replay_poll_limit: None,
        };

        base.merge(overlay);

        // pc_start unchanged (overlay was None)
        assert_eq!(base.pc_start, Some(0x4000));
        assert_eq!(base.trace, Some(false));
        assert_eq!(base.memory_sync(), Some(Path::new("dump.img")));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("LC3_VMM_PC_START", "0x0200"),
            ("LC3_VMM_TRACE", "yes"),
            ("LC3_VMM_REPLAY_POLL_LIMIT", "64"),
        ]));

        assert_eq!(config.pc_start(), 0x0200);
        assert!(config.trace());
        assert_eq!(config.replay_poll_limit(), 64);
    }

    #[test]
    fn test_bad_overrides_ignored() {
        let mut config = Config {
            pc_start: Some(0x3000),
            ..Config::default()
        };
        config.apply_overrides(env(&[
            ("LC3_VMM_PC_START", "0x10000"),
            ("LC3_VMM_TRACE", "maybe"),
        ]));

        assert_eq!(config.pc_start, Some(0x3000));
        assert_eq!(config.trace, None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12288"), Some(12288));
        assert_eq!(parse_number(" 0x3000 "), Some(0x3000));
        assert_eq!(parse_number("0xZZ"), None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lc3-vmm.toml");
        std::fs::write(&path, "pc_start = 0x3100\nmemory_sync = \"out.img\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.pc_start(), 0x3100);
        assert_eq!(config.memory_sync, Some("out.img".to_string()));

        assert!(Config::load_from_file(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn test_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "pc_start = \"high\"\n").unwrap();
        assert!(Config::load_from_file(&path).is_none());
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = Config::sample_config();
        let config = Config::from_toml(&sample).expect("Sample config should parse");
        assert_eq!(config.pc_start(), 0x3000);
    }
}
