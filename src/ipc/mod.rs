//! Command socket.
//!
//! The device bridge, scripts and the page editor connect to the socket and
//! exchange newline-delimited JSON commands and replies.

pub mod listener;
