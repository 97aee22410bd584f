//! The drawable, touchable things that live on grid cells.
//!
//! The set of component kinds is closed: a [`Component`] is a [`Button`],
//! a static [`Text`] or an [`Overlay`].  Each variant declares what it can
//! do through [`Capabilities`]; the registry routes touches and ticks by
//! looking at those flags, never at the concrete variant.
//!
//! Components are built from the JSON descriptors stored in a page:
//!
//! ```json
//! { "type": "button", "position": {"col": 0, "row": 0},
//!   "options": {"label": "Term", "background": "#303446"},
//!   "command": "kitty" }
//! ```

pub mod button;
pub mod overlay;
pub mod text;

pub use button::Button;
pub use overlay::{Overlay, OverlayKind, OverlayTimer};
pub use text::Text;

use crate::command::{MediaKey, VolumeState};
use crate::geometry::{CellRect, GridPosition};
use crate::pages::ComponentDescriptor;
use bitflags::bitflags;
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Baseline, Text as TextDrawable, TextStyleBuilder};
use std::time::Instant;

bitflags! {
    /// What a component can do besides drawing itself.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const DRAW    = 0b0001;
        const TOUCH   = 0b0010;
        const UPDATE  = 0b0100;
        const OVERLAY = 0b1000;
    }
}

/// Side effect requested by a component's touch handler.
///
/// Handlers only queue actions; the [`Deck`](crate::deck::Deck) runs them
/// once dispatch is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run a shell command in the background.
    Exec(String),
    ShowPage(String),
    NextPage,
    PreviousPage,
    Media(MediaKey),
    ToggleMute,
    Workspace(i32),
}

/// Live state components may render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawContext {
    pub page_index: usize,
    pub page_count: usize,
    pub page_title: String,
    pub volume: Option<VolumeState>,
    pub workspace: Option<i32>,
}

/// A descriptor that could not be turned into a component.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("unknown component type {0:?}")]
    UnknownType(String),
    #[error("invalid options for {kind}: {source}")]
    Options {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One component bound to one grid cell.
#[derive(Debug, Clone)]
pub enum Component {
    Button(Button),
    Text(Text),
    Overlay(Overlay),
}

impl Component {
    /// Build a component from its page descriptor.
    pub fn from_descriptor(desc: &ComponentDescriptor) -> Result<Self, ComponentError> {
        // A missing "options" key means all defaults.
        let options = if desc.options.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            desc.options.clone()
        };
        let parse_err = |source| ComponentError::Options {
            kind: desc.kind.clone(),
            source,
        };
        match desc.kind.as_str() {
            "button" => {
                let opts = serde_json::from_value(options).map_err(parse_err)?;
                Ok(Component::Button(Button::new(desc.position, opts, desc.command.clone())))
            }
            "text" => {
                let opts = serde_json::from_value(options).map_err(parse_err)?;
                Ok(Component::Text(Text::new(desc.position, opts)))
            }
            other => match OverlayKind::from_type(other) {
                Some(kind) => {
                    let opts = serde_json::from_value(options).map_err(parse_err)?;
                    Ok(Component::Overlay(Overlay::new(desc.position, kind, opts)))
                }
                None => Err(ComponentError::UnknownType(other.to_string())),
            },
        }
    }

    pub fn position(&self) -> GridPosition {
        match self {
            Component::Button(b) => b.position(),
            Component::Text(t) => t.position(),
            Component::Overlay(o) => o.position(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Component::Button(b) => b.capabilities(),
            Component::Text(_) => Capabilities::DRAW,
            Component::Overlay(o) => o.capabilities(),
        }
    }

    /// Draw into `rect`.  Hidden overlays draw nothing.
    pub fn draw<D>(&self, target: &mut D, rect: CellRect, ctx: &DrawContext) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        match self {
            Component::Button(b) => b.draw(target, rect),
            Component::Text(t) => t.draw(target, rect),
            Component::Overlay(o) => o.draw(target, rect, ctx),
        }
    }

    /// Handle a touch on this component's cell.  Returns whether the touch
    /// was handled; requested side effects are appended to `actions`.
    pub fn on_touch(&mut self, pos: GridPosition, actions: &mut Vec<Action>) -> bool {
        if !self.capabilities().contains(Capabilities::TOUCH) {
            return false;
        }
        match self {
            Component::Button(b) => b.on_touch(pos, actions),
            Component::Text(_) => false,
            Component::Overlay(o) => o.on_touch(pos, actions),
        }
    }

    /// Advance time-based state.  Returns `true` when the rendered output
    /// changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self {
            Component::Overlay(o) => o.tick(now),
            _ => false,
        }
    }

    pub fn as_overlay_mut(&mut self) -> Option<&mut Overlay> {
        match self {
            Component::Overlay(o) => Some(o),
            _ => None,
        }
    }

    /// Release time-based state before the component is dropped.
    pub fn teardown(&mut self) {
        if let Component::Overlay(o) = self {
            o.teardown();
        }
    }
}

//  Drawing helpers

/// Draw `text` centred on `rect`, one line per `\n`, each line cut to the
/// cell width.
pub(crate) fn draw_centered_lines<D>(
    target: &mut D,
    text: &str,
    rect: CellRect,
    font: &MonoFont<'_>,
    color: Rgb565,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let style = MonoTextStyle::new(font, color);
    let layout = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();

    let char_w = font.character_size.width.max(1);
    let line_h = font.character_size.height as i32 + 2;
    let max_chars = (rect.width.saturating_sub(6) / char_w).max(1) as usize;

    let lines: Vec<String> = text
        .lines()
        .map(|l| l.chars().take(max_chars).collect())
        .collect();
    let n = lines.len() as i32;
    let cx = rect.x + rect.width as i32 / 2;
    let cy = rect.y + rect.height as i32 / 2;
    let first = cy - (n - 1) * line_h / 2;

    for (i, line) in lines.iter().enumerate() {
        let p = Point::new(cx, first + i as i32 * line_h);
        TextDrawable::with_text_style(line, p, style, layout).draw(target)?;
    }
    Ok(())
}

/// `rect` shrunk by `inset` pixels on every side, as an
/// `embedded-graphics` rectangle.
pub(crate) fn inset_rect(rect: CellRect, inset: u32) -> embedded_graphics::primitives::Rectangle {
    embedded_graphics::primitives::Rectangle::new(
        Point::new(rect.x + inset as i32, rect.y + inset as i32),
        Size::new(
            rect.width.saturating_sub(2 * inset),
            rect.height.saturating_sub(2 * inset),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn desc(kind: &str, options: serde_json::Value, command: Option<&str>) -> ComponentDescriptor {
        ComponentDescriptor {
            kind: kind.into(),
            position: GridPosition::new(1, 2),
            options,
            command: command.map(Into::into),
        }
    }

    #[test]
    fn button_from_descriptor() {
        let c = Component::from_descriptor(&desc("button", json!({"label": "Term"}), Some("kitty"))).unwrap();
        assert_eq!(c.position(), GridPosition::new(1, 2));
        assert!(c.capabilities().contains(Capabilities::TOUCH));
        assert!(!c.capabilities().contains(Capabilities::OVERLAY));
    }

    #[test]
    fn text_is_draw_only() {
        let c = Component::from_descriptor(&desc("text", json!({"text": "hi"}), None)).unwrap();
        assert_eq!(c.capabilities(), Capabilities::DRAW);
    }

    #[test]
    fn overlay_kinds_from_type() {
        let c = Component::from_descriptor(&desc("volume", json!({}), None)).unwrap();
        assert!(c.capabilities().contains(Capabilities::OVERLAY | Capabilities::UPDATE));
        let c = Component::from_descriptor(&desc("page", serde_json::Value::Null, None)).unwrap();
        assert!(c.capabilities().contains(Capabilities::OVERLAY));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Component::from_descriptor(&desc("sparkles", json!({}), None)).unwrap_err();
        assert!(matches!(err, ComponentError::UnknownType(t) if t == "sparkles"));
    }

    #[test]
    fn bad_options_are_rejected() {
        let err = Component::from_descriptor(&desc("button", json!({"background": "blue"}), None)).unwrap_err();
        assert!(matches!(err, ComponentError::Options { .. }));
    }

    #[test]
    fn non_touchable_component_ignores_touch() {
        let mut c = Component::from_descriptor(&desc("text", json!({"text": "x"}), None)).unwrap();
        let mut actions = Vec::new();
        assert!(!c.on_touch(GridPosition::new(1, 2), &mut actions));
        assert!(actions.is_empty());
    }
}
