//! Components that appear on top of a base component for a short while.
//!
//! An overlay shares its cell with a regular component and is registered
//! after it, so it draws last.  It stays hidden until something (a knob
//! turn, a page switch) calls [`OverlayTimer::show_temporarily`]; after the
//! configured duration it hides itself again on the next tick.
//!
//! # Visibility state machine
//!
//! ```text
//!            show_temporarily                 tick(now >= until)
//!  Hidden ───────────────────▶ Visible{until} ───────────────────▶ Hidden
//!                                  │  ▲
//!                                  └──┘ show_temporarily (until := now + d)
//! ```
//!
//! The deadline lives inside the component, so there is nothing to fire
//! after the component is gone; [`OverlayTimer::cancel`] hides it
//! immediately.

use super::{draw_centered_lines, inset_rect, Action, Capabilities, DrawContext};
use crate::frame::Color;
use crate::geometry::{CellRect, GridPosition};
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What an overlay shows, and which event brings it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    /// Output volume, shown on volume changes.  Touch toggles mute.
    Volume,
    /// Current page title and number, shown on page switches.
    Page,
    /// Active workspace, shown on workspace switches.
    Workspace,
}

impl OverlayKind {
    /// Map a descriptor `type` to an overlay kind.
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "volume" => Some(OverlayKind::Volume),
            "page" => Some(OverlayKind::Page),
            "workspace" => Some(OverlayKind::Workspace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverlayState {
    Hidden,
    Visible { until: Instant },
}

/// Longest an overlay stays up after one trigger.
pub const MAX_SHOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Show-for-a-while visibility with a single, replaceable deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayTimer {
    state: OverlayState,
}

impl Default for OverlayTimer {
    fn default() -> Self {
        Self {
            state: OverlayState::Hidden,
        }
    }
}

impl OverlayTimer {
    pub fn is_visible(&self) -> bool {
        matches!(self.state, OverlayState::Visible { .. })
    }

    /// When the overlay will hide, if it is showing.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            OverlayState::Visible { until } => Some(until),
            OverlayState::Hidden => None,
        }
    }

    /// Become visible now and hide `duration` after *this* call, capped at
    /// [`MAX_SHOW`].  Any earlier deadline is discarded.
    pub fn show_temporarily(&mut self, now: Instant, duration: Duration) {
        let until = now.checked_add(duration.min(MAX_SHOW)).unwrap_or(now);
        self.state = OverlayState::Visible { until };
    }

    /// Hide once the deadline has passed.  Returns `true` on the
    /// visible → hidden transition.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.state {
            OverlayState::Visible { until } if now >= until => {
                self.state = OverlayState::Hidden;
                true
            }
            _ => false,
        }
    }

    /// Hide immediately and drop the pending deadline.
    pub fn cancel(&mut self) {
        self.state = OverlayState::Hidden;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    pub color: Color,
    pub background: Color,
    pub accent: Color,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            color: Color(Rgb565::WHITE),
            background: Color::rgb(0x11, 0x11, 0x1b),
            accent: Color::rgb(0x89, 0xb4, 0xfa),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Overlay {
    position: GridPosition,
    kind: OverlayKind,
    options: OverlayOptions,
    timer: OverlayTimer,
}

impl Overlay {
    pub fn new(position: GridPosition, kind: OverlayKind, options: OverlayOptions) -> Self {
        Self {
            position,
            kind,
            options,
            timer: OverlayTimer::default(),
        }
    }

    pub fn position(&self) -> GridPosition {
        self.position
    }

    pub fn kind(&self) -> OverlayKind {
        self.kind
    }

    pub fn timer(&self) -> &OverlayTimer {
        &self.timer
    }

    pub fn is_visible(&self) -> bool {
        self.timer.is_visible()
    }

    pub fn capabilities(&self) -> Capabilities {
        let base = Capabilities::DRAW | Capabilities::UPDATE | Capabilities::OVERLAY;
        match self.kind {
            OverlayKind::Volume => base | Capabilities::TOUCH,
            OverlayKind::Page | OverlayKind::Workspace => base,
        }
    }

    pub fn show_temporarily(&mut self, now: Instant, duration: Duration) {
        debug!("overlay {:?} at {} visible for {:?}", self.kind, self.position, duration);
        self.timer.show_temporarily(now, duration);
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.timer.tick(now)
    }

    pub fn teardown(&mut self) {
        self.timer.cancel();
    }

    /// Touches reach the overlay whether or not it is showing.
    pub fn on_touch(&mut self, _pos: GridPosition, actions: &mut Vec<Action>) -> bool {
        match self.kind {
            OverlayKind::Volume => {
                actions.push(Action::ToggleMute);
                true
            }
            OverlayKind::Page | OverlayKind::Workspace => false,
        }
    }

    pub fn draw<D>(&self, target: &mut D, rect: CellRect, ctx: &DrawContext) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        if !self.timer.is_visible() {
            return Ok(());
        }
        Rectangle::new(Point::new(rect.x, rect.y), Size::new(rect.width, rect.height))
            .into_styled(PrimitiveStyle::with_fill(self.options.background.0))
            .draw(target)?;

        let color = self.options.color.0;
        match self.kind {
            OverlayKind::Volume => {
                let (label, percent) = match ctx.volume {
                    Some(v) if v.muted => ("MUTE".to_string(), v.percent),
                    Some(v) => (format!("{}%", v.percent), v.percent),
                    None => ("--".to_string(), 0),
                };
                self.draw_bar(target, rect, percent)?;
                let upper = CellRect {
                    height: rect.height * 2 / 3,
                    ..rect
                };
                draw_centered_lines(target, &label, upper, &FONT_10X20, color)
            }
            OverlayKind::Page => {
                let text = format!(
                    "{}\n{}/{}",
                    ctx.page_title,
                    ctx.page_index + 1,
                    ctx.page_count.max(1)
                );
                draw_centered_lines(target, &text, rect, &FONT_6X10, color)
            }
            OverlayKind::Workspace => {
                let text = match ctx.workspace {
                    Some(id) => format!("WS\n{}", id),
                    None => "WS\n?".to_string(),
                };
                draw_centered_lines(target, &text, rect, &FONT_10X20, color)
            }
        }
    }

    /// Horizontal level bar along the bottom third of the cell.
    fn draw_bar<D>(&self, target: &mut D, rect: CellRect, percent: u8) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let track = inset_rect(
            CellRect {
                y: rect.y + (rect.height * 2 / 3) as i32,
                height: rect.height / 3,
                ..rect
            },
            8,
        );
        track
            .into_styled(PrimitiveStyle::with_stroke(self.options.color.0, 1))
            .draw(target)?;
        let filled = track.size.width * percent.min(100) as u32 / 100;
        if filled > 0 {
            Rectangle::new(track.top_left, Size::new(filled, track.size.height))
                .into_styled(PrimitiveStyle::with_fill(self.options.accent.0))
                .draw(target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::VolumeState;
    use crate::frame::Frame;

    const TWO_SECONDS: Duration = Duration::from_millis(2000);

    #[test]
    fn starts_hidden() {
        let t = OverlayTimer::default();
        assert!(!t.is_visible());
        assert_eq!(t.deadline(), None);
    }

    #[test]
    fn visible_immediately_then_hides_after_duration() {
        let t0 = Instant::now();
        let mut t = OverlayTimer::default();
        t.show_temporarily(t0, TWO_SECONDS);
        assert!(t.is_visible());
        assert!(!t.tick(t0 + Duration::from_millis(1999)));
        assert!(t.is_visible());
        assert!(t.tick(t0 + TWO_SECONDS));
        assert!(!t.is_visible());
    }

    #[test]
    fn huge_duration_is_capped() {
        let t0 = Instant::now();
        let mut t = OverlayTimer::default();
        t.show_temporarily(t0, Duration::MAX);
        assert_eq!(t.deadline(), Some(t0 + MAX_SHOW));
        assert!(!t.tick(t0 + Duration::from_secs(3600)));
        assert!(t.is_visible());
    }

    #[test]
    fn retrigger_extends_from_second_call() {
        let t0 = Instant::now();
        let mut t = OverlayTimer::default();
        t.show_temporarily(t0, TWO_SECONDS);
        let t1 = t0 + Duration::from_millis(1000);
        t.tick(t1);
        t.show_temporarily(t1, TWO_SECONDS);
        assert_eq!(t.deadline(), Some(t1 + TWO_SECONDS));

        // Still visible when the first deadline would have expired.
        assert!(!t.tick(t0 + TWO_SECONDS));
        assert!(!t.tick(t0 + Duration::from_millis(2999)));
        assert!(t.is_visible());
        assert!(t.tick(t1 + TWO_SECONDS));
        assert!(!t.is_visible());
    }

    #[test]
    fn cancel_hides_and_later_ticks_are_noops() {
        let t0 = Instant::now();
        let mut t = OverlayTimer::default();
        t.show_temporarily(t0, TWO_SECONDS);
        t.cancel();
        assert!(!t.is_visible());
        assert!(!t.tick(t0 + Duration::from_secs(10)));
        assert!(!t.is_visible());
    }

    #[test]
    fn hidden_overlay_draws_nothing() {
        let o = Overlay::new(GridPosition::new(0, 0), OverlayKind::Volume, OverlayOptions::default());
        let mut frame = Frame::new(90, 90);
        let rect = CellRect { x: 0, y: 0, width: 90, height: 90 };
        o.draw(&mut frame, rect, &DrawContext::default()).unwrap();
        assert_eq!(frame, Frame::new(90, 90));
    }

    #[test]
    fn visible_volume_overlay_covers_cell() {
        let mut o = Overlay::new(GridPosition::new(0, 0), OverlayKind::Volume, OverlayOptions::default());
        o.show_temporarily(Instant::now(), TWO_SECONDS);
        let mut frame = Frame::new(90, 90);
        let rect = CellRect { x: 0, y: 0, width: 90, height: 90 };
        let ctx = DrawContext {
            volume: Some(VolumeState { percent: 50, muted: false }),
            ..Default::default()
        };
        o.draw(&mut frame, rect, &ctx).unwrap();
        assert_eq!(frame.pixel(1, 1), Some(OverlayOptions::default().background.0));
        // left end of the bar is filled with the accent colour
        assert_eq!(frame.pixel(12, 75), Some(OverlayOptions::default().accent.0));
    }

    #[test]
    fn volume_overlay_touch_toggles_mute_even_when_hidden() {
        let mut o = Overlay::new(GridPosition::new(0, 0), OverlayKind::Volume, OverlayOptions::default());
        let mut actions = Vec::new();
        assert!(o.on_touch(GridPosition::new(0, 0), &mut actions));
        assert_eq!(actions, vec![Action::ToggleMute]);
    }

    #[test]
    fn page_overlay_is_not_touchable() {
        let o = Overlay::new(GridPosition::new(0, 0), OverlayKind::Page, OverlayOptions::default());
        assert!(!o.capabilities().contains(Capabilities::TOUCH));
    }
}
