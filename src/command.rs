//! Commands and types used throughout deckgrd.
//!
//! This module defines the vocabulary that all components share:
//! [`Command`] describes every request the daemon can handle (device input,
//! page navigation and page editing), [`Reply`] is what a client gets back,
//! and [`Event`] is what the main loop actually receives.
//!
//! Everything here is plain data; the wire format is externally tagged JSON
//! as produced by `serde`:
//!
//! ```json
//! {"TouchStart":{"touches":[{"x":80,"y":10}]}}
//! {"Rotate":{"id":"knobTL","delta":-1}}
//! {"ButtonDown":{"id":"3"}}
//! "NextPage"
//! {"DeletePage":"media"}
//! ```

use crate::geometry::TouchPoint;
use crate::pages::PageSet;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::mpsc;

/// Media transport key sent to the active player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MediaKey {
    PlayPause,
    Next,
    Previous,
    Stop,
}

impl MediaKey {
    /// Argument understood by `playerctl` and compatible tools.
    pub fn as_arg(&self) -> &'static str {
        match self {
            MediaKey::PlayPause => "play-pause",
            MediaKey::Next => "next",
            MediaKey::Previous => "previous",
            MediaKey::Stop => "stop",
        }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Parse a media key (case-insensitive; accepts "play-pause", "PlayPause",
/// "play_pause", "prev", …).
fn parse_media_key(s: &str) -> Option<MediaKey> {
    let normalized: String = s
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect();
    match normalized.as_str() {
        "playpause" | "toggle" => Some(MediaKey::PlayPause),
        "next" => Some(MediaKey::Next),
        "previous" | "prev" => Some(MediaKey::Previous),
        "stop" => Some(MediaKey::Stop),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for MediaKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_media_key(&s).ok_or_else(|| DeError::custom(format!("invalid media key: {:?}", s)))
    }
}

/// Haptic feedback pattern understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vibration {
    Short,
    Medium,
    Long,
}

impl Vibration {
    /// Pattern byte used by Loupedeck firmware.
    pub fn code(&self) -> u8 {
        match self {
            Vibration::Short => 0x01,
            Vibration::Medium => 0x0a,
            Vibration::Long => 0x0f,
        }
    }
}

/// Output volume of the default audio sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeState {
    /// Volume in percent (0–100).
    pub percent: u8,
    pub muted: bool,
}

/// Fields for a new page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPage {
    /// Requested id.  Derived from the title when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Partial update of a page's title and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Every request deckgrd can handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    //  Device input

    /// A circle button or knob was pressed.  `id` is `"0"`–`"7"` for the
    /// circle buttons and the knob id (e.g. `"knobTL"`) for knob presses.
    ButtonDown { id: String },
    ButtonUp { id: String },
    /// A knob was turned by `delta` detents (negative = counter-clockwise).
    Rotate { id: String, delta: i32 },
    /// Fingers touched the screen.  Each point is dispatched in order.
    TouchStart { touches: Vec<TouchPoint> },
    TouchMove { touches: Vec<TouchPoint> },
    TouchEnd { touches: Vec<TouchPoint> },

    //  Navigation

    NextPage,
    PreviousPage,
    /// Show the page with the given id.
    ShowPage(String),

    //  Page editing

    CreatePage(NewPage),
    DeletePage(String),
    UpdatePageMeta(PageMeta),
    /// Replace the whole page set and persist it.
    SaveConfig(PageSet),
    /// Return the current page set.
    GetConfig,

    //  Lifecycle

    /// Re-read the pages file from disk.
    Reload,
    /// Force a full redraw.
    Redraw,
    /// Stop the daemon.
    Shutdown,
}

/// Answer to a [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Ok,
    /// Id of the page that was created or shown.
    Page(String),
    Config(PageSet),
    Error(String),
}

/// What the main loop receives.
#[derive(Debug)]
pub enum Event {
    /// A command, optionally with a channel for the reply.
    Command(Command, Option<mpsc::Sender<Reply>>),
    /// Periodic redraw requested by the auto-redraw ticker.
    Redraw,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_key_parsing() {
        assert_eq!(parse_media_key("play-pause"), Some(MediaKey::PlayPause));
        assert_eq!(parse_media_key("PlayPause"), Some(MediaKey::PlayPause));
        assert_eq!(parse_media_key("play_pause"), Some(MediaKey::PlayPause));
        assert_eq!(parse_media_key("prev"), Some(MediaKey::Previous));
        assert_eq!(parse_media_key("rewind"), None);
    }

    #[test]
    fn media_key_display_matches_arg() {
        assert_eq!(MediaKey::PlayPause.to_string(), "play-pause");
        assert_eq!(MediaKey::Previous.to_string(), "previous");
    }

    #[test]
    fn device_commands_parse() {
        let cmd: Command = serde_json::from_str(r#"{"Rotate":{"id":"knobTL","delta":-2}}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Rotate {
                id: "knobTL".into(),
                delta: -2
            }
        );
        let cmd: Command =
            serde_json::from_str(r#"{"TouchStart":{"touches":[{"x":80,"y":10},{"x":1,"y":2}]}}"#).unwrap();
        match cmd {
            Command::TouchStart { touches } => {
                assert_eq!(touches.len(), 2);
                assert_eq!(touches[0], TouchPoint { x: 80, y: 10 });
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unit_commands_are_plain_strings() {
        let cmd: Command = serde_json::from_str(r#""NextPage""#).unwrap();
        assert_eq!(cmd, Command::NextPage);
        assert_eq!(serde_json::to_string(&Command::Reload).unwrap(), r#""Reload""#);
    }

    #[test]
    fn create_page_defaults() {
        let cmd: Command = serde_json::from_str(r#"{"CreatePage":{"title":"Media"}}"#).unwrap();
        assert_eq!(
            cmd,
            Command::CreatePage(NewPage {
                id: None,
                title: "Media".into(),
                description: String::new(),
            })
        );
    }

    #[test]
    fn reply_encoding() {
        assert_eq!(serde_json::to_string(&Reply::Ok).unwrap(), r#""Ok""#);
        assert_eq!(
            serde_json::to_string(&Reply::Error("nope".into())).unwrap(),
            r#"{"Error":"nope"}"#
        );
    }

    #[test]
    fn vibration_codes_are_distinct() {
        assert_ne!(Vibration::Short.code(), Vibration::Medium.code());
        assert_ne!(Vibration::Medium.code(), Vibration::Long.code());
    }
}
