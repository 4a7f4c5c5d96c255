//! Configuration loading.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! defaults so the reader can always start. Several of these values (page
//! size, page cap, minimum unit length) are inherited constants with no
//! documented rationale; they are kept configurable rather than second-guessed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Character count per fallback page when no chapter headings are found.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Hard cap on fallback page count.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Tokenized units at or below this trimmed length are never spoken.
    #[serde(default = "default_min_unit_chars")]
    pub min_unit_chars: usize,
    /// Speech rate multiplier passed to the speech engine.
    #[serde(default = "default_speech_rate")]
    pub speech_rate: f32,
    /// Bound on remote fetches; expired fetches degrade to an empty result.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// External synthesizer command; must accept `-s <wpm> <text>`.
    #[serde(default = "default_speech_command")]
    pub speech_command: String,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            min_unit_chars: default_min_unit_chars(),
            speech_rate: default_speech_rate(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            speech_command: default_speech_command(),
            log_level: default_log_level(),
        }
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            AppConfig::default()
        }
    }
}

fn default_page_size() -> usize {
    5000
}

fn default_max_pages() -> usize {
    50
}

fn default_min_unit_chars() -> usize {
    10
}

fn default_speech_rate() -> f32 {
    0.9
}

fn default_fetch_timeout_secs() -> u64 {
    6
}

fn default_speech_command() -> String {
    "espeak-ng".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: AppConfig = toml::from_str("page_size = 1000").unwrap();
        assert_eq!(cfg.page_size, 1000);
        assert_eq!(cfg.max_pages, 50);
        assert_eq!(cfg.min_unit_chars, 10);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_config(Path::new("conf/definitely-not-here.toml"));
        assert_eq!(cfg.page_size, 5000);
        assert_eq!(cfg.speech_command, "espeak-ng");
    }
}
