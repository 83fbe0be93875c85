//! App config (`config.toml`) and user preferences (`prefs.toml`).
//!
//! The two files are split the same way on disk: `config.toml` is static
//! tuning the user edits by hand (player binary, page selector, restart
//! policy), `prefs.toml` is the small mutable document the app rewrites on
//! every station or volume change.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::platform;

pub const DEFAULT_STATION_INDEX: usize = 0;
pub const DEFAULT_VOLUME: u8 = 50;

// ── preferences ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_station_index")]
    pub station_index: usize,
    #[serde(default = "default_volume")]
    pub volume: u8,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            station_index: DEFAULT_STATION_INDEX,
            volume: DEFAULT_VOLUME,
        }
    }
}

/// On-disk wrapper so the document reads `[preferences]` with the two keys
/// under it.
#[derive(Debug, Serialize, Deserialize)]
struct PrefsFile {
    preferences: Preferences,
}

impl Preferences {
    pub fn path() -> PathBuf {
        platform::config_dir().join("prefs.toml")
    }

    /// Load preferences, creating the file with defaults on first run.
    ///
    /// An unreadable or corrupt file is an error; callers fall back to
    /// defaults and surface the failure without aborting.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let prefs = Self::default();
            prefs.save(path)?;
            return Ok(prefs);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let file: PrefsFile = toml::from_str(&content).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(file.preferences.clamped())
    }

    /// Overwrite the preferences file. A write failure is surfaced but is
    /// non-fatal to the running session.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason: e,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let content = toml::to_string_pretty(&PrefsFile {
            preferences: self.clamped(),
        })
        .map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }

    pub fn clamped(self) -> Self {
        Self {
            station_index: self.station_index,
            volume: self.volume.min(100),
        }
    }
}

// ── app config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub now_playing: NowPlayingConfig,
    #[serde(default)]
    pub sounds: SoundsConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// External player binary. Anything that takes `--volume <n> <url>` works.
    #[serde(default = "default_player_binary")]
    pub binary: String,
    /// Flags placed before the volume/url pair.
    #[serde(default = "default_player_args")]
    pub args: Vec<String>,
    /// Seconds to wait for a graceful exit before the forced kill.
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlayingConfig {
    #[serde(default = "default_page_url")]
    pub page_url: String,
    /// CSS selector for the now-playing text node. Brittle by construction —
    /// it tracks the third party's markup, so it lives here and not in code.
    #[serde(default = "default_selector")]
    pub selector: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundsConfig {
    #[serde(default = "default_start_sound")]
    pub start: PathBuf,
    #[serde(default = "default_stop_sound")]
    pub stop: PathBuf,
    #[serde(default = "default_station_change_sound")]
    pub station_change: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Consecutive unexpected-death restarts before giving up.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// A session that survives this long resets the restart counter.
    #[serde(default = "default_quiet_reset_secs")]
    pub quiet_reset_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: default_player_binary(),
            args: default_player_args(),
            stop_grace_secs: default_stop_grace_secs(),
        }
    }
}

impl Default for NowPlayingConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            selector: default_selector(),
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for SoundsConfig {
    fn default() -> Self {
        Self {
            start: default_start_sound(),
            stop: default_stop_sound(),
            station_change: default_station_change_sound(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            quiet_reset_secs: default_quiet_reset_secs(),
        }
    }
}

fn default_station_index() -> usize {
    DEFAULT_STATION_INDEX
}

fn default_volume() -> u8 {
    DEFAULT_VOLUME
}

fn default_player_binary() -> String {
    "vlc".to_string()
}

fn default_player_args() -> Vec<String> {
    vec![
        "--intf".to_string(),
        "dummy".to_string(),
        "--no-video".to_string(),
    ]
}

fn default_stop_grace_secs() -> u64 {
    5
}

fn default_page_url() -> String {
    "https://skyrock.fm".to_string()
}

fn default_selector() -> String {
    "div.now-playing".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_start_sound() -> PathBuf {
    platform::data_dir().join("start_sound.wav")
}

fn default_stop_sound() -> PathBuf {
    platform::data_dir().join("stop_sound.wav")
}

fn default_station_change_sound() -> PathBuf {
    platform::data_dir().join("station_change.wav")
}

fn default_max_restarts() -> u32 {
    5
}

fn default_backoff_base_secs() -> u64 {
    1
}

fn default_backoff_cap_secs() -> u64 {
    30
}

fn default_quiet_reset_secs() -> u64 {
    60
}

impl Config {
    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |e: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason: e,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");

        let prefs = Preferences {
            station_index: 2,
            volume: 73,
        };
        prefs.save(&path).unwrap();

        let loaded = Preferences::load(&path).unwrap();
        assert_eq!(loaded.station_index, 2);
        assert_eq!(loaded.volume, 73);
    }

    #[test]
    fn missing_prefs_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");

        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.station_index, DEFAULT_STATION_INDEX);
        assert_eq!(prefs.volume, DEFAULT_VOLUME);
        // First run must also persist the defaults.
        assert!(path.exists());
        let reloaded = Preferences::load(&path).unwrap();
        assert_eq!(reloaded, prefs);
    }

    #[test]
    fn corrupt_prefs_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "station_index = \"not a number\"").unwrap();

        let err = Preferences::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn volume_is_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "[preferences]\nstation_index = 1\nvolume = 250\n").unwrap();

        let prefs = Preferences::load(&path).unwrap();
        assert_eq!(prefs.volume, 100);
    }

    #[test]
    fn default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.player.binary, "vlc");
        assert_eq!(config.now_playing.poll_interval_secs, 10);
        assert_eq!(config.now_playing.timeout_secs, 10);
        assert_eq!(config.player.stop_grace_secs, 5);
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.now_playing.selector, config.now_playing.selector);
        assert_eq!(reloaded.watchdog.max_restarts, config.watchdog.max_restarts);
    }
}
