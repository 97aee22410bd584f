//! [`WindowManager`] implementation backed by Hyprland IPC.
//!
//! Talks to Hyprland directly through its command socket at
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket.sock`; no
//! `hyprctl` process is spawned.

use crate::traits::WindowManager;
use serde::Deserialize;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Hyprland-backed window manager.
///
/// Each call opens a short-lived connection to the command socket.
#[derive(Debug, Default)]
pub struct HyprlandWm;

/// Errors that can occur when talking to Hyprland.
#[derive(Debug, thiserror::Error)]
#[error("hyprland IPC error: {0}")]
pub struct HyprlandWmError(String);

impl HyprlandWm {
    pub fn new() -> Self {
        Self
    }
}

fn socket_path() -> Result<PathBuf, HyprlandWmError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprlandWmError("XDG_RUNTIME_DIR not set".into()))?;
    let his = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| HyprlandWmError("HYPRLAND_INSTANCE_SIGNATURE not set".into()))?;
    Ok(PathBuf::from(runtime_dir).join("hypr").join(his).join(".socket.sock"))
}

/// Send one request and read the whole response.
fn ipc_request(request: &str) -> Result<String, HyprlandWmError> {
    let path = socket_path()?;
    let mut stream = UnixStream::connect(&path)
        .map_err(|e| HyprlandWmError(format!("connect to {}: {}", path.display(), e)))?;
    stream
        .write_all(request.as_bytes())
        .map_err(|e| HyprlandWmError(format!("write: {}", e)))?;
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .map_err(|e| HyprlandWmError(format!("read: {}", e)))?;
    String::from_utf8(response).map_err(|e| HyprlandWmError(format!("utf-8: {}", e)))
}

fn check_dispatch(response: &str) -> Result<(), HyprlandWmError> {
    if response.trim() == "ok" {
        Ok(())
    } else {
        Err(HyprlandWmError(format!("dispatch error: {}", response.trim())))
    }
}

/// The part of `j/activeworkspace` we use.
#[derive(Deserialize)]
struct WorkspaceJson {
    id: i32,
}

fn parse_active_workspace(json: &str) -> Result<i32, HyprlandWmError> {
    serde_json::from_str::<WorkspaceJson>(json)
        .map(|w| w.id)
        .map_err(|e| HyprlandWmError(format!("parse: {}", e)))
}

impl WindowManager for HyprlandWm {
    type Error = HyprlandWmError;

    fn active_workspace(&self) -> Result<i32, HyprlandWmError> {
        parse_active_workspace(&ipc_request("j/activeworkspace")?)
    }

    fn switch_workspace(&self, workspace_id: i32) -> Result<(), HyprlandWmError> {
        check_dispatch(&ipc_request(&format!("/dispatch workspace {}", workspace_id))?)
    }
}
