//! Desktop backends that shell out to standard tools.
//!
//! * [`WpctlAudio`] drives the default PipeWire sink through `wpctl`.
//! * [`ShellLauncher`] runs commands through `sh -c` without waiting.
//! * [`NoopWm`] / [`NoopAudio`] stand in for the real backends in
//!   `--dry-run` mode.

use crate::command::{MediaKey, VolumeState};
use crate::traits::{AudioControl, Launcher, WindowManager};
use log::{debug, warn};
use std::cell::Cell;
use std::process::{Command, Stdio};

const DEFAULT_SINK: &str = "@DEFAULT_AUDIO_SINK@";

/// Errors from `wpctl`.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to run wpctl: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("wpctl {args} exited with {status}")]
    Failed { args: String, status: std::process::ExitStatus },
    #[error("unexpected wpctl output: {0:?}")]
    Parse(String),
}

/// Volume control via `wpctl` (WirePlumber).
#[derive(Debug, Default)]
pub struct WpctlAudio;

impl WpctlAudio {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: &[&str]) -> Result<String, AudioError> {
        let output = Command::new("wpctl").args(args).stdin(Stdio::null()).output()?;
        if !output.status.success() {
            return Err(AudioError::Failed {
                args: args.join(" "),
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse `wpctl get-volume` output, e.g. `"Volume: 0.40 [MUTED]"`.
pub fn parse_wpctl_volume(output: &str) -> Result<VolumeState, AudioError> {
    let parse_err = || AudioError::Parse(output.trim().to_string());
    let rest = output.trim().strip_prefix("Volume:").ok_or_else(parse_err)?;
    let mut parts = rest.split_whitespace();
    let level: f32 = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(parse_err)?;
    let muted = parts.any(|p| p == "[MUTED]");
    Ok(VolumeState {
        percent: (level * 100.0).round().clamp(0.0, 100.0) as u8,
        muted,
    })
}

impl AudioControl for WpctlAudio {
    type Error = AudioError;

    fn volume(&self) -> Result<VolumeState, AudioError> {
        parse_wpctl_volume(&self.run(&["get-volume", DEFAULT_SINK])?)
    }

    fn adjust_volume(&self, delta: i32) -> Result<VolumeState, AudioError> {
        let current = self.volume()?;
        let target = (current.percent as i32).saturating_add(delta).clamp(0, 100);
        let level = format!("{:.2}", target as f32 / 100.0);
        self.run(&["set-volume", DEFAULT_SINK, &level])?;
        debug!("volume {}% -> {}%", current.percent, target);
        self.volume()
    }

    fn toggle_mute(&self) -> Result<VolumeState, AudioError> {
        self.run(&["set-mute", DEFAULT_SINK, "toggle"])?;
        self.volume()
    }
}

/// Runs commands through `sh -c` in the background.
///
/// Children are reaped on a detached thread so none are left as zombies.
#[derive(Debug, Default)]
pub struct ShellLauncher;

impl ShellLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for ShellLauncher {
    type Error = std::io::Error;

    fn launch(&self, command: &str) -> Result<(), std::io::Error> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!("launched {:?} (pid {})", command, child.id());
        let command = command.to_string();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => debug!("{:?} exited with {}", command, status),
            Ok(_) => {}
            Err(e) => warn!("failed to wait for {:?}: {}", command, e),
        });
        Ok(())
    }
}

/// Shell command for a media key, e.g. `playerctl play-pause`.
pub fn media_command(tool: &str, key: MediaKey) -> String {
    format!("{} {}", tool, key.as_arg())
}

//  Dry-run backends

#[derive(Debug, thiserror::Error)]
#[error("noop backend")]
pub struct NoopError;

/// Window manager that only remembers the last requested workspace.
#[derive(Debug)]
pub struct NoopWm {
    workspace: Cell<i32>,
}

impl Default for NoopWm {
    fn default() -> Self {
        Self {
            workspace: Cell::new(1),
        }
    }
}

impl WindowManager for NoopWm {
    type Error = NoopError;

    fn active_workspace(&self) -> Result<i32, NoopError> {
        Ok(self.workspace.get())
    }

    fn switch_workspace(&self, workspace_id: i32) -> Result<(), NoopError> {
        debug!("dry-run: switch to workspace {}", workspace_id);
        self.workspace.set(workspace_id);
        Ok(())
    }
}

/// In-memory volume.
#[derive(Debug)]
pub struct NoopAudio {
    state: Cell<VolumeState>,
}

impl Default for NoopAudio {
    fn default() -> Self {
        Self {
            state: Cell::new(VolumeState {
                percent: 50,
                muted: false,
            }),
        }
    }
}

impl AudioControl for NoopAudio {
    type Error = NoopError;

    fn volume(&self) -> Result<VolumeState, NoopError> {
        Ok(self.state.get())
    }

    fn adjust_volume(&self, delta: i32) -> Result<VolumeState, NoopError> {
        let mut s = self.state.get();
        s.percent = (s.percent as i32).saturating_add(delta).clamp(0, 100) as u8;
        self.state.set(s);
        Ok(s)
    }

    fn toggle_mute(&self) -> Result<VolumeState, NoopError> {
        let mut s = self.state.get();
        s.muted = !s.muted;
        self.state.set(s);
        Ok(s)
    }
}

/// Launcher that only logs.
#[derive(Debug, Default)]
pub struct NoopLauncher;

impl Launcher for NoopLauncher {
    type Error = NoopError;

    fn launch(&self, command: &str) -> Result<(), NoopError> {
        debug!("dry-run: launch {:?}", command);
        Ok(())
    }
}
