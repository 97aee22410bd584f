//! **deckgrd**: a grid-based Loupedeck control surface daemon.
//!
//! The device screen is split into a `columns × rows` grid of square keys.
//! Each page places components (buttons, text, overlays) on those keys;
//! touches are mapped back to a key and routed to the component there, and
//! every change ends with a full repaint that is handed to the device.
//!
//! # Architecture
//!
//! * [`geometry`]: cell rectangles and touch → cell mapping.
//! * [`component`] / [`registry`]: the components of the active page, in
//!   draw order, with a per-cell touch index.
//! * [`compositor`]: paints frames and routes touches.
//! * [`deck`]: turns [`command::Command`]s into actions, page switches and
//!   redraws.
//!
//! The seams to the outside world are the traits in [`traits`]:
//! [`traits::DisplaySink`] (frames to the device), [`traits::WindowManager`],
//! [`traits::AudioControl`], [`traits::Launcher`] and
//! [`traits::EventSource`].  Concrete implementations live in [`sink`],
//! [`hyprland`], [`system`] and [`ipc`].

pub mod command;
pub mod component;
pub mod compositor;
pub mod config;
pub mod deck;
pub mod frame;
pub mod geometry;
pub mod hyprland;
pub mod ipc;
pub mod pages;
pub mod registry;
pub mod sink;
pub mod system;
pub mod traits;
