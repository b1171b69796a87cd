use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::error::AppError;

pub const CONFIG_PATH_ENV: &str = "ANDROID_EMULATOR_MCP_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AdbSettings {
    /// Empty means "probe PATH and the usual SDK locations".
    pub command_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutSettings {
    pub command_secs: u64,
    pub install_secs: u64,
    pub shell_secs: u64,
    pub probe_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command_secs: 30,
            install_secs: 120,
            shell_secs: 60,
            probe_secs: 5,
        }
    }
}

impl TimeoutSettings {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn install(&self) -> Duration {
        Duration::from_secs(self.install_secs)
    }

    pub fn shell(&self) -> Duration {
        Duration::from_secs(self.shell_secs)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PacingSettings {
    pub tap_settle_ms: u64,
    pub swipe_settle_ms: u64,
    pub key_settle_ms: u64,
    pub launch_settle_ms: u64,
    pub poll_interval_ms: u64,
    pub ui_wait_secs: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            tap_settle_ms: 500,
            swipe_settle_ms: 500,
            key_settle_ms: 300,
            launch_settle_ms: 2000,
            poll_interval_ms: 500,
            ui_wait_secs: 10,
        }
    }
}

impl PacingSettings {
    /// Zero delays, for tests that drive handlers against a fake executor.
    pub fn immediate() -> Self {
        Self {
            tap_settle_ms: 0,
            swipe_settle_ms: 0,
            key_settle_ms: 0,
            launch_settle_ms: 0,
            poll_interval_ms: 0,
            ui_wait_secs: 0,
        }
    }

    pub fn ui_wait(&self) -> Duration {
        Duration::from_secs(self.ui_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub screenshot_remote: String,
    pub ui_dump_remote: String,
    pub certificate_dir: String,
    /// Empty falls back to the system temp dir.
    pub screenshot_local: String,
    pub ui_dump_local: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            screenshot_remote: "/sdcard/screenshot.png".to_string(),
            ui_dump_remote: "/sdcard/window_dump.xml".to_string(),
            certificate_dir: "/sdcard/Download".to_string(),
            screenshot_local: String::new(),
            ui_dump_local: String::new(),
        }
    }
}

impl PathSettings {
    pub fn screenshot_local_path(&self) -> PathBuf {
        local_or_temp(&self.screenshot_local, "android_screenshot.png")
    }

    pub fn ui_dump_local_path(&self) -> PathBuf {
        local_or_temp(&self.ui_dump_local, "ui_hierarchy.xml")
    }

    pub fn certificate_remote_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.certificate_dir.trim_end_matches('/'), file_name)
    }
}

fn local_or_temp(configured: &str, file_name: &str) -> PathBuf {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        std::env::temp_dir().join(file_name)
    } else {
        PathBuf::from(trimmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub pacing: PacingSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".android_emulator_mcp.json")
}

pub fn load_config(trace_id: &str) -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path(), trace_id)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), trace_id))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), trace_id))?;
    Ok(validate_config(config))
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    let defaults = AppConfig::default();
    if config.timeouts.command_secs == 0 {
        config.timeouts.command_secs = defaults.timeouts.command_secs;
    }
    if config.timeouts.install_secs == 0 {
        config.timeouts.install_secs = defaults.timeouts.install_secs;
    }
    if config.timeouts.shell_secs == 0 {
        config.timeouts.shell_secs = defaults.timeouts.shell_secs;
    }
    if config.timeouts.probe_secs == 0 {
        config.timeouts.probe_secs = defaults.timeouts.probe_secs;
    }
    if config.pacing.poll_interval_ms < 50 {
        config.pacing.poll_interval_ms = defaults.pacing.poll_interval_ms;
    }
    if config.paths.screenshot_remote.trim().is_empty() {
        config.paths.screenshot_remote = defaults.paths.screenshot_remote;
    }
    if config.paths.ui_dump_remote.trim().is_empty() {
        config.paths.ui_dump_remote = defaults.paths.ui_dump_remote;
    }
    if config.paths.certificate_dir.trim().is_empty() {
        config.paths.certificate_dir = defaults.paths.certificate_dir;
    }
    if config.logging.level.trim().is_empty() {
        config.logging.level = defaults.logging.level;
    }
    config
}
