//! Runtime configuration: `pacer.toml` parsing with tolerant defaults.
//!
//! The file is optional and every section is optional; unknown fields are
//! ignored so older binaries read newer files. A parse failure falls back
//! to defaults rather than refusing to run.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

const MAX_STACK_DEPTH_CEILING: usize = 128;

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeSection {
    /// Stack depth guard; pushes beyond it fail the pushing frame.
    #[serde(default = "RuntimeSection::default_max_depth")]
    pub max_depth: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
        }
    }
}

impl RuntimeSection {
    const fn default_max_depth() -> usize {
        30
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsSection {
    /// Host tick cadence fed to the engine.
    #[serde(default = "EventsSection::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
        }
    }
}

impl EventsSection {
    const fn default_tick_interval_ms() -> u64 {
        250
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SoundSection {
    #[serde(default = "SoundSection::default_enabled")]
    pub enabled: bool,
    /// Remaining-second marks for countdown cues.
    #[serde(default = "SoundSection::default_countdown_seconds")]
    pub countdown_seconds: Vec<u32>,
}

impl Default for SoundSection {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            countdown_seconds: Self::default_countdown_seconds(),
        }
    }
}

impl SoundSection {
    const fn default_enabled() -> bool {
        true
    }
    fn default_countdown_seconds() -> Vec<u32> {
        vec![3, 2, 1]
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingSection {
    /// Directory for the rolling log file; `None` keeps logs on stderr.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// EnvFilter directive, e.g. `"runtime=debug"`.
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub events: EventsSection,
    #[serde(default)]
    pub sound: SoundSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Best-effort config path: working directory first, then the platform
/// config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("pacer.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("pacer").join("pacer.toml");
    }
    PathBuf::from("pacer.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            Err(e) => {
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Depth guard clamped to a sane ceiling; zero falls back to default.
    pub fn effective_max_depth(&self) -> usize {
        let raw = self.file.runtime.max_depth;
        if raw == 0 {
            RuntimeSection::default_max_depth()
        } else {
            raw.min(MAX_STACK_DEPTH_CEILING)
        }
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.file.events.tick_interval_ms.max(10)
    }
}
