use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::clipboard::Backend;
use crate::transform::TransformOptions;

#[derive(Debug, Parser)]
#[command(
    name = "clip-column",
    version,
    about = "Watch the clipboard and turn copied spreadsheet ranges into one value per line"
)]
pub struct Cli {
    /// Path to config file (overrides default location)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How clipboard changes are detected
    #[arg(short, long, value_enum)]
    pub backend: Option<Backend>,

    /// Poll interval in milliseconds for the polling backend
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Keep only cells that contain a digit
    #[arg(long)]
    pub numeric_only: bool,

    /// Also rewrite tab-free multi-line text (a single copied column)
    #[arg(long)]
    pub single_column: bool,

    /// Convert the current clipboard content once and exit
    #[arg(long)]
    pub once: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// "auto" uses native notifications where the platform has them.
    #[serde(default)]
    pub backend: Backend,
    /// Poll interval for the polling backend, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Drop cells that contain no digit.
    #[serde(default)]
    pub numeric_only: bool,
    /// Also rewrite tab-free multi-line text.
    #[serde(default)]
    pub single_column: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of error, warn, info, debug, trace.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path. Empty means stderr.
    #[serde(default)]
    pub file: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    crate::clipboard::poll::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load config from the given path (or the standard path if `None`).
    /// Returns defaults if the file does not exist or cannot be parsed.
    pub fn load(override_path: Option<&Path>) -> Self {
        let path = match override_path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path(),
        };
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        tracing::warn!("failed to parse config at {}: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("failed to read config at {}: {e}", path.display());
                }
            }
        }
        Self::default()
    }

    /// The standard config file path, e.g. %APPDATA%/clip-column/config.toml
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "clip-column")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Write the default config to disk if it doesn't exist.
    pub fn write_default_if_missing(path: &Path) {
        if path.exists() {
            return;
        }
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match toml::to_string_pretty(&Config::default()) {
            Ok(default_toml) => {
                if let Err(e) = std::fs::write(path, default_toml) {
                    tracing::warn!("failed to write default config to {}: {e}", path.display());
                }
            }
            Err(e) => tracing::warn!("failed to serialize default config: {e}"),
        }
    }

    /// Command-line flags win over the file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(backend) = cli.backend {
            self.watcher.backend = backend;
        }
        if let Some(ms) = cli.poll_interval {
            self.watcher.poll_interval_ms = ms;
        }
        self.transform.numeric_only |= cli.numeric_only;
        self.transform.single_column |= cli.single_column;
        match cli.verbose {
            0 => {}
            1 => self.log.level = "debug".to_string(),
            _ => self.log.level = "trace".to_string(),
        }
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            numeric_only: self.transform.numeric_only,
            single_column: self.transform.single_column,
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.watcher.poll_interval_ms)
    }

    /// Configured level, falling back to INFO for unrecognised names.
    pub fn log_level(&self) -> tracing::Level {
        self.log.level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        (!self.log.file.is_empty()).then(|| PathBuf::from(&self.log.file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(Some(&dir.path().join("nope.toml")));
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.watcher.backend, Backend::Auto);
        assert_eq!(cfg.watcher.poll_interval_ms, 250);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transform]\nnumeric_only = true\n").unwrap();

        let cfg = Config::load(Some(&path));
        assert!(cfg.transform.numeric_only);
        assert!(!cfg.transform.single_column);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn unparsable_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[watcher\nbackend = 3").unwrap();
        assert_eq!(Config::load(Some(&path)), Config::default());
    }

    #[test]
    fn default_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default_if_missing(&path);
        assert!(path.exists());
        assert_eq!(Config::load(Some(&path)), Config::default());
    }

    #[test]
    fn cli_flags_override_file() {
        let cli = Cli::parse_from([
            "clip-column",
            "--backend",
            "poll",
            "--poll-interval",
            "50",
            "--numeric-only",
            "-vv",
        ]);
        let mut cfg = Config::default();
        cfg.apply_cli(&cli);

        assert_eq!(cfg.watcher.backend, Backend::Poll);
        assert_eq!(cfg.poll_interval().as_millis(), 50);
        assert!(cfg.transform_options().numeric_only);
        assert_eq!(cfg.log_level(), tracing::Level::TRACE);
    }

    #[test]
    fn bad_log_level_falls_back_to_info() {
        let mut cfg = Config::default();
        cfg.log.level = "chatty".into();
        assert_eq!(cfg.log_level(), tracing::Level::INFO);
        assert_eq!(cfg.log_file(), None);
    }
}
