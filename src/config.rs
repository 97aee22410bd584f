//! Application configuration.
//!
//! Loaded from `$XDG_CONFIG_HOME/deckgrd/config.json` (or the path given
//! with `--config <path>`).  Every section is optional; a minimal `{}` file
//! is valid and unknown keys are ignored, so the file can grow new sections
//! without breaking older daemons.
//!
//! # Example
//!
//! ```json
//! {
//!   "device": { "width": 480, "height": 270, "key_size": 90, "columns": 4, "rows": 3 },
//!   "layout": { "background": "#11111b", "grid_lines": true, "overlay_ms": 1500 },
//!   "knobs": { "knobTL": "volume", "knobCL": "workspace", "knobBL": "page" },
//!   "buttons": {
//!     "0": { "page": "home" },
//!     "1": "previous_page",
//!     "2": "next_page",
//!     "3": { "media": "play-pause" },
//!     "4": "mute",
//!     "7": { "command": "kitty" }
//!   },
//!   "system": { "volume_step": 2, "frame_sink": "/run/user/1000/loupedeck.fifo" }
//! }
//! ```

use crate::command::MediaKey;
use crate::compositor::LayoutStyle;
use crate::frame::Color;
use crate::geometry::DeviceInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Screen and key grid dimensions.
    pub device: DeviceInfo,
    pub layout: LayoutConfig,
    /// Knob id → what turning it does.
    pub knobs: BTreeMap<String, KnobBinding>,
    /// Circle button id → what pressing it does.
    pub buttons: BTreeMap<String, ButtonBinding>,
    pub system: SystemConfig,
}

impl Default for Config {
    fn default() -> Self {
        let knobs = [
            ("knobTL", KnobBinding::Volume),
            ("knobCL", KnobBinding::Workspace),
            ("knobBL", KnobBinding::Page),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let buttons = [
            ("0", ButtonBinding::Page("home".into())),
            ("1", ButtonBinding::PreviousPage),
            ("2", ButtonBinding::NextPage),
            ("3", ButtonBinding::Media(MediaKey::PlayPause)),
            ("4", ButtonBinding::Mute),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            device: DeviceInfo::default(),
            layout: LayoutConfig::default(),
            knobs,
            buttons,
            system: SystemConfig::default(),
        }
    }
}

/// What a knob controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnobBinding {
    /// Output volume, `volume_step` percent per detent.
    Volume,
    /// Active workspace, one per detent.
    Workspace,
    /// Current page, wrapping around.
    Page,
    None,
}

/// What a circle button does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonBinding {
    /// Show the page with this id.
    Page(String),
    /// Run a shell command.
    Command(String),
    Media(MediaKey),
    Mute,
    NextPage,
    PreviousPage,
}

/// Rendering and timing.
///
/// All durations are in **milliseconds**.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub background: Color,
    /// Draw 1 px lines between cells.
    pub grid_lines: bool,
    pub grid_color: Color,
    /// Full redraw interval.  `0` disables periodic redraws.
    pub auto_redraw_ms: u64,
    /// How long an overlay stays up after it is triggered.
    pub overlay_ms: u64,
    /// Short vibration whenever a touch is handled.
    pub vibrate_on_touch: bool,
    /// Longest wait for the display before a frame is given up.
    pub display_timeout_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let style = LayoutStyle::default();
        Self {
            background: style.background,
            grid_lines: style.grid_lines,
            grid_color: style.grid_color,
            auto_redraw_ms: 5000,
            overlay_ms: 2000,
            vibrate_on_touch: true,
            display_timeout_ms: 500,
        }
    }
}

impl LayoutConfig {
    pub fn style(&self) -> LayoutStyle {
        LayoutStyle {
            background: self.background,
            grid_lines: self.grid_lines,
            grid_color: self.grid_color,
        }
    }

    pub fn auto_redraw(&self) -> Option<Duration> {
        (self.auto_redraw_ms > 0).then(|| Duration::from_millis(self.auto_redraw_ms))
    }

    pub fn overlay_duration(&self) -> Duration {
        Duration::from_millis(self.overlay_ms)
    }

    pub fn display_timeout(&self) -> Duration {
        Duration::from_millis(self.display_timeout_ms.max(1))
    }
}

/// Paths and external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Volume change per knob detent, in percent.
    pub volume_step: i32,
    /// Media key tool; the key name is appended (`playerctl play-pause`).
    pub media_command: String,
    /// FIFO or file the device driver reads frames from.  Frames are
    /// discarded when unset.
    pub frame_sink: Option<PathBuf>,
    /// Pages file.  Defaults to `pages.json` in the config directory.
    pub pages: Option<PathBuf>,
    /// Command socket.  Defaults to `$XDG_RUNTIME_DIR/deckgrd.sock`.
    pub socket: Option<PathBuf>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            volume_step: 5,
            media_command: "playerctl".into(),
            frame_sink: None,
            pages: None,
            socket: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn pages_path(&self) -> PathBuf {
        self.system
            .pages
            .clone()
            .unwrap_or_else(|| config_dir().join("pages.json"))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.system.socket.clone().unwrap_or_else(|| {
            let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(runtime).join("deckgrd.sock")
        })
    }
}

/// `$XDG_CONFIG_HOME/deckgrd`, falling back to `~/.config/deckgrd`.
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("deckgrd")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// The file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
