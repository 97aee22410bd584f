//! Core traits that decouple deckgrd from the hardware driver, the window
//! manager and the audio stack.
//!
//! Every concrete backend (the frame pipe, Hyprland IPC, `wpctl`, a test
//! double, …) implements one of these traits.  The [`Deck`](crate::deck::Deck)
//! only depends on these abstractions.

use crate::command::{Event, Vibration, VolumeState};
use crate::frame::Frame;
use std::sync::mpsc;

/// Where finished frames go: the device screen, in practice.
pub trait DisplaySink {
    /// The error type produced by this sink.
    type Error: std::error::Error + Send + 'static;

    /// Show `frame` on the device.
    fn submit(&mut self, frame: &Frame) -> Result<(), Self::Error>;

    /// Trigger haptic feedback.  Sinks without a motor ignore it.
    fn vibrate(&mut self, _pattern: Vibration) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Push out anything still buffered.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Abstraction over a window manager with numbered workspaces.
pub trait WindowManager {
    /// The error type produced by this window manager.
    type Error: std::error::Error + Send + 'static;

    /// Id of the workspace on the focused monitor.
    fn active_workspace(&self) -> Result<i32, Self::Error>;

    /// Switch the focused monitor to `workspace_id`.
    fn switch_workspace(&self, workspace_id: i32) -> Result<(), Self::Error>;
}

/// Volume control of the default audio output.
pub trait AudioControl {
    /// The error type produced by this backend.
    type Error: std::error::Error + Send + 'static;

    fn volume(&self) -> Result<VolumeState, Self::Error>;

    /// Change the volume by `delta` percent (clamped to 0–100) and return
    /// the new state.
    fn adjust_volume(&self, delta: i32) -> Result<VolumeState, Self::Error>;

    fn toggle_mute(&self) -> Result<VolumeState, Self::Error>;
}

/// Starts external programs without waiting for them.
pub trait Launcher {
    /// The error type produced by this launcher.
    type Error: std::error::Error + Send + 'static;

    /// Run `command` through the shell in the background.
    fn launch(&self, command: &str) -> Result<(), Self::Error>;
}

/// A source of [`Event`]s.
///
/// Implementations listen on some transport (a Unix socket, a device
/// driver bridge, a test harness, …) and forward what they receive into
/// the provided [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](EventSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait EventSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming event into `sink`.
    fn run(&mut self, sink: mpsc::Sender<Event>) -> Result<(), Self::Error>;
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn mock_wm_records_switches() {
        let wm = MockWm::default();
        wm.switch_workspace(4).unwrap();
        assert_eq!(*wm.switch_log.borrow(), vec![4]);
        assert_eq!(wm.active_workspace().unwrap(), 4);
    }

    #[test]
    fn mock_audio_clamps() {
        let audio = MockAudio::default();
        assert_eq!(audio.adjust_volume(-10).unwrap().percent, 0);
        assert_eq!(audio.adjust_volume(150).unwrap().percent, 100);
    }

    #[test]
    fn default_vibrate_and_flush_are_noops() {
        struct Plain;
        impl DisplaySink for Plain {
            type Error = MockError;
            fn submit(&mut self, _: &Frame) -> Result<(), MockError> {
                Ok(())
            }
        }
        let mut s = Plain;
        assert!(s.vibrate(Vibration::Short).is_ok());
        assert!(s.flush().is_ok());
    }
}
