//! A touchable key with a label.

use super::{draw_centered_lines, inset_rect, Action, Capabilities};
use crate::command::MediaKey;
use crate::frame::Color;
use crate::geometry::{CellRect, GridPosition};
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, RoundedRectangle};
use log::debug;
use serde::{Deserialize, Serialize};

/// Options accepted in a `"button"` descriptor.
///
/// A button does at most one thing.  The descriptor's `command` wins;
/// otherwise `page`, `media` and `workspace` are checked in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonOptions {
    pub label: String,
    pub color: Color,
    pub background: Color,
    /// Page id to show when touched.  `"next"` / `"previous"` step through
    /// the pages.
    pub page: Option<String>,
    pub media: Option<MediaKey>,
    pub workspace: Option<i32>,
}

impl Default for ButtonOptions {
    fn default() -> Self {
        Self {
            label: String::new(),
            color: Color(Rgb565::WHITE),
            background: Color::rgb(0x30, 0x34, 0x46),
            page: None,
            media: None,
            workspace: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Button {
    position: GridPosition,
    options: ButtonOptions,
    command: Option<String>,
}

const INSET: u32 = 4;
const CORNER: u32 = 10;

impl Button {
    pub fn new(position: GridPosition, options: ButtonOptions, command: Option<String>) -> Self {
        Self {
            position,
            options,
            command,
        }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn label(&self) -> &str {
        &self.options.label
    }

    /// The action this button triggers, if any.
    pub fn action(&self) -> Option<Action> {
        if let Some(cmd) = self.command.as_ref().filter(|c| !c.trim().is_empty()) {
            return Some(Action::Exec(cmd.clone()));
        }
        if let Some(page) = &self.options.page {
            return Some(match page.as_str() {
                "next" => Action::NextPage,
                "previous" | "prev" => Action::PreviousPage,
                id => Action::ShowPage(id.to_string()),
            });
        }
        if let Some(key) = self.options.media {
            return Some(Action::Media(key));
        }
        self.options.workspace.map(Action::Workspace)
    }

    /// Buttons without an action are decorative and do not take touches.
    pub fn capabilities(&self) -> Capabilities {
        if self.action().is_some() {
            Capabilities::DRAW | Capabilities::TOUCH
        } else {
            Capabilities::DRAW
        }
    }

    pub fn draw<D>(&self, target: &mut D, rect: CellRect) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        RoundedRectangle::with_equal_corners(inset_rect(rect, INSET), Size::new(CORNER, CORNER))
            .into_styled(PrimitiveStyle::with_fill(self.options.background.0))
            .draw(target)?;
        if !self.options.label.is_empty() {
            draw_centered_lines(target, &self.options.label, rect, &FONT_6X10, self.options.color.0)?;
        }
        Ok(())
    }

    pub fn on_touch(&mut self, pos: GridPosition, actions: &mut Vec<Action>) -> bool {
        match self.action() {
            Some(action) => {
                debug!("button {:?} at {} -> {:?}", self.options.label, pos, action);
                actions.push(action);
                true
            }
            None => false,
        }
    }
}
