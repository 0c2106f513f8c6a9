//! Configuration management for the stickies daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. `<config dir>/config.toml` (platform standard, via `directories`)
//! 2. `~/.config/stickies/config.toml`
//! 3. `./config.toml` (current directory, for development)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use stickies_core::{
    Rect, Size, WindowDefaults, DEFAULT_MAIN_BACKGROUND, DEFAULT_NOTE_BACKGROUND,
    DEFAULT_NOTE_TITLE,
};
use stickies_platform_virtual::PlatformConfig;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the note document lives.
    pub storage: StorageConfig,
    /// Window size limits and colors.
    pub window: WindowConfig,
    /// Virtual screen used for centering.
    pub screen: ScreenConfig,
    /// IPC server settings.
    pub ipc: IpcConfig,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON note document.
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
        }
    }
}

/// Window-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Minimum (and initial) window width in pixels.
    #[serde(default = "default_min_width")]
    pub min_width: u32,

    /// Minimum (and initial) window height in pixels.
    #[serde(default = "default_min_height")]
    pub min_height: u32,

    /// Maximum window width in pixels.
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,

    /// Maximum window height in pixels.
    #[serde(default = "default_max_dimension")]
    pub max_height: u32,

    /// Background of new notes (`#rrggbb`).
    #[serde(default = "default_note_background")]
    pub note_background: String,

    /// Background of the main window (`#rrggbb`).
    #[serde(default = "default_main_background")]
    pub main_background: String,

    /// Title of new notes.
    #[serde(default = "default_note_title")]
    pub note_title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_width: default_min_width(),
            min_height: default_min_height(),
            max_width: default_max_dimension(),
            max_height: default_max_dimension(),
            note_background: default_note_background(),
            main_background: default_main_background(),
            note_title: default_note_title(),
        }
    }
}

/// Screen configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

/// IPC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Loopback address the daemon listens on.
    #[serde(default = "default_address")]
    pub address: String,

    /// Seconds a client has to send its request line.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Seconds a delete confirmation waits for an answer.
    ///
    /// Requests from other windows queue behind an open prompt until it is
    /// answered or times out. Shutdown does not wait for it.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            read_timeout_secs: default_read_timeout(),
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Answer to a delete confirmation when no UI is attached to the main window.
    #[serde(default = "default_false")]
    pub confirm_without_ui: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            confirm_without_ui: false,
        }
    }
}

// Default value functions for serde
fn default_data_file() -> PathBuf {
    match ProjectDirs::from("com", "stickies", "stickies") {
        Some(dirs) => dirs.data_dir().join("noteconfig.json"),
        None => PathBuf::from("noteconfig.json"),
    }
}

fn default_min_width() -> u32 {
    300
}

fn default_min_height() -> u32 {
    320
}

fn default_max_dimension() -> u32 {
    1000
}

fn default_note_background() -> String {
    DEFAULT_NOTE_BACKGROUND.to_string()
}

fn default_main_background() -> String {
    DEFAULT_MAIN_BACKGROUND.to_string()
}

fn default_note_title() -> String {
    DEFAULT_NOTE_TITLE.to_string()
}

fn default_screen_width() -> u32 {
    1920
}

fn default_screen_height() -> u32 {
    1080
}

fn default_address() -> String {
    stickies_ipc::DEFAULT_ADDRESS.to_string()
}

fn default_read_timeout() -> u64 {
    5
}

fn default_confirm_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}

/// A config value that was out of range and has been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Whether `color` is a `#rrggbb` hex color.
pub fn is_hex_color(color: &str) -> bool {
    static HEX_COLOR: OnceLock<Option<Regex>> = OnceLock::new();
    HEX_COLOR
        .get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(color))
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from standard locations.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        let paths = config_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Replace out-of-range values with defaults, reporting each change.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let window = &mut self.window;

        if window.min_width == 0 {
            warnings.push(ConfigWarning::new("window.min_width", "must be positive, using 300"));
            window.min_width = default_min_width();
        }
        if window.min_height == 0 {
            warnings.push(ConfigWarning::new("window.min_height", "must be positive, using 320"));
            window.min_height = default_min_height();
        }
        if window.max_width < window.min_width {
            warnings.push(ConfigWarning::new(
                "window.max_width",
                format!("{} is below min_width, using {}", window.max_width, window.min_width),
            ));
            window.max_width = window.min_width;
        }
        if window.max_height < window.min_height {
            warnings.push(ConfigWarning::new(
                "window.max_height",
                format!("{} is below min_height, using {}", window.max_height, window.min_height),
            ));
            window.max_height = window.min_height;
        }

        if !is_hex_color(&window.note_background) {
            warnings.push(ConfigWarning::new(
                "window.note_background",
                format!("'{}' is not a #rrggbb color", window.note_background),
            ));
            window.note_background = default_note_background();
        }
        if !is_hex_color(&window.main_background) {
            warnings.push(ConfigWarning::new(
                "window.main_background",
                format!("'{}' is not a #rrggbb color", window.main_background),
            ));
            window.main_background = default_main_background();
        }

        if self.screen.width == 0 || self.screen.height == 0 {
            warnings.push(ConfigWarning::new("screen", "dimensions must be positive"));
            self.screen = ScreenConfig::default();
        }

        if self.ipc.read_timeout_secs == 0 {
            warnings.push(ConfigWarning::new("ipc.read_timeout_secs", "must be positive, using 5"));
            self.ipc.read_timeout_secs = default_read_timeout();
        }
        if self.ipc.confirm_timeout_secs == 0 {
            warnings.push(ConfigWarning::new(
                "ipc.confirm_timeout_secs",
                "must be positive, using 60",
            ));
            self.ipc.confirm_timeout_secs = default_confirm_timeout();
        }

        let level = self.behavior.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            warnings.push(ConfigWarning::new(
                "behavior.log_level",
                format!("unknown level '{}', using info", self.behavior.log_level),
            ));
            self.behavior.log_level = default_log_level();
        }

        warnings
    }

    /// Size limits and colors for new windows.
    pub fn window_defaults(&self) -> WindowDefaults {
        WindowDefaults {
            min_size: Size::new(self.window.min_width, self.window.min_height),
            max_size: Size::new(self.window.max_width, self.window.max_height),
            note_background: self.window.note_background.clone(),
            main_background: self.window.main_background.clone(),
            note_title: self.window.note_title.clone(),
        }
    }

    /// Settings for the virtual window host.
    pub fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            screen: Rect::new(0, 0, self.screen.width, self.screen.height),
            confirm_timeout: Duration::from_secs(self.ipc.confirm_timeout_secs),
            confirm_without_ui: self.behavior.confirm_without_ui,
            ..PlatformConfig::default()
        }
    }

    /// How long a client may take to send its request.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.ipc.read_timeout_secs)
    }
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(proj_dirs) = ProjectDirs::from("com", "stickies", "stickies") {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("stickies").join("config.toml"));
    }

    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
