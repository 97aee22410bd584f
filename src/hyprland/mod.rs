//! Hyprland-specific implementations.
//!
//! Provides the [`WindowManager`](crate::traits::WindowManager) backend used
//! for workspace knobs and buttons.  Nothing outside this module should
//! reference Hyprland directly.

pub mod wm;
