//! Turns the active registry into frames for the device screen.
//!
//! A redraw is always a full repaint:
//!
//! 1. clear to the background colour
//! 2. optional grid lines between cells
//! 3. every component, in registration order
//! 4. submit the frame to the [`DisplaySink`]
//!
//! The compositor also is the touch entry point: raw pixel coordinates are
//! mapped to a cell and routed through the registry.  It never redraws on
//! its own; the caller decides when a touch or tick warrants one.

use crate::command::Event;
use crate::component::{Action, DrawContext};
use crate::frame::{Color, Frame};
use crate::geometry::{Geometry, TouchPoint};
use crate::registry::ComponentRegistry;
use crate::traits::DisplaySink;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};
use log::{debug, info, warn};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How the area behind components looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutStyle {
    pub background: Color,
    pub grid_lines: bool,
    pub grid_color: Color,
}

impl Default for LayoutStyle {
    fn default() -> Self {
        Self {
            background: Color(Rgb565::BLACK),
            grid_lines: false,
            grid_color: Color::rgb(0x40, 0x40, 0x40),
        }
    }
}

pub struct Compositor<S: DisplaySink> {
    geometry: Geometry,
    style: LayoutStyle,
    registry: ComponentRegistry,
    sink: S,
    frame: Frame,
}

impl<S: DisplaySink> Compositor<S> {
    pub fn new(geometry: Geometry, style: LayoutStyle, sink: S) -> Self {
        let info = geometry.info();
        let frame = Frame::new(info.width, info.height);
        Self {
            geometry,
            style,
            registry: ComponentRegistry::new(),
            sink,
            frame,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Swap in `registry`.  The previous one is torn down so none of its
    /// overlays outlive the swap.
    pub fn replace_registry(&mut self, registry: ComponentRegistry) {
        let mut old = std::mem::replace(&mut self.registry, registry);
        old.teardown();
        debug!(
            "registry replaced ({} -> {} components)",
            old.len(),
            self.registry.len()
        );
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The most recently rendered frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Paint a full frame without submitting it.
    pub fn render(&mut self, ctx: &DrawContext) -> &Frame {
        // Frame's DrawTarget is infallible.
        let _ = self.frame.clear(self.style.background.0);
        if self.style.grid_lines {
            self.draw_grid_lines();
        }
        let _ = self.registry.draw_all(&mut self.frame, &self.geometry, ctx);
        &self.frame
    }

    /// Render and submit.  Returns `false` if the sink rejected the frame;
    /// the next redraw simply tries again.
    pub fn redraw(&mut self, ctx: &DrawContext) -> bool {
        self.render(ctx);
        match self.sink.submit(&self.frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("display update failed: {}", e);
                false
            }
        }
    }

    fn draw_grid_lines(&mut self) {
        let info = *self.geometry.info();
        let style = PrimitiveStyle::with_stroke(self.style.grid_color.0, 1);
        let left = self.geometry.margin_x();
        let right = left + self.geometry.total_width() as i32 - 1;
        let bottom = (info.key_size * info.rows) as i32 - 1;

        for col in 1..info.columns {
            let x = left + (col * info.key_size) as i32;
            let _ = Line::new(Point::new(x, 0), Point::new(x, bottom))
                .into_styled(style)
                .draw(&mut self.frame);
        }
        for row in 1..info.rows {
            let y = (row * info.key_size) as i32;
            let _ = Line::new(Point::new(left, y), Point::new(right, y))
                .into_styled(style)
                .draw(&mut self.frame);
        }
    }

    /// Route a touch at pixel `(x, y)`.  Touches outside the grid and cells
    /// without a touch target are ignored.
    pub fn handle_touch(&mut self, x: i32, y: i32, actions: &mut Vec<Action>) -> bool {
        match self.geometry.map_touch(x, y) {
            Some(pos) => self.registry.dispatch_touch(pos, actions),
            None => false,
        }
    }

    /// Route a batch of touch points in arrival order.  Returns how many of
    /// them were handled.
    pub fn handle_touches(&mut self, points: &[TouchPoint], actions: &mut Vec<Action>) -> usize {
        let positions: Vec<_> = self.geometry.map_touches(points).collect();
        positions
            .into_iter()
            .filter(|&pos| self.registry.dispatch_touch(pos, actions))
            .count()
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.registry.tick(now)
    }

    /// Hide every overlay and leave a blank screen behind.
    pub fn shutdown(&mut self) {
        self.registry.teardown();
        info!("overlays torn down");
        let _ = self.frame.clear(Rgb565::BLACK);
        if let Err(e) = self.sink.submit(&self.frame) {
            warn!("failed to blank display: {}", e);
        }
        if let Err(e) = self.sink.flush() {
            warn!("failed to flush display: {}", e);
        }
        info!("display blanked");
    }
}

/// Periodic [`Event::Redraw`] ticker running on its own thread.
///
/// Stops when [`cancel`](AutoRedraw::cancel) is called, when the handle is
/// dropped, or when the event receiver goes away.
pub struct AutoRedraw {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AutoRedraw {
    pub fn start(interval: Duration, tx: mpsc::Sender<Event>) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if tx.send(Event::Redraw).is_err() {
                        debug!("auto-redraw: receiver gone");
                        return;
                    }
                }
                // cancelled, or the handle was dropped
                _ => return,
            }
        });
        debug!("auto-redraw every {:?}", interval);
        Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Stop the ticker and wait for its thread.  No `Redraw` is sent after
    /// this returns.
    pub fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for AutoRedraw {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::button::ButtonOptions;
    use crate::component::overlay::OverlayOptions;
    use crate::component::{Button, Component, Overlay, OverlayKind};
    use crate::geometry::{DeviceInfo, GridPosition};
    use crate::traits::mock::RecordingSink;

    fn geometry() -> Geometry {
        Geometry::new(DeviceInfo::default()).unwrap()
    }

    fn compositor(style: LayoutStyle) -> Compositor<RecordingSink> {
        Compositor::new(geometry(), style, RecordingSink::default())
    }

    fn red_button(col: u32, row: u32) -> Component {
        Component::Button(Button::new(
            GridPosition::new(col, row),
            ButtonOptions {
                background: Color(Rgb565::RED),
                ..Default::default()
            },
            Some("kitty".into()),
        ))
    }

    #[test]
    fn redraw_is_idempotent() {
        let mut c = compositor(LayoutStyle::default());
        c.registry_mut().register(red_button(1, 1));
        let ctx = DrawContext::default();
        assert!(c.redraw(&ctx));
        assert!(c.redraw(&ctx));
        let frames = &c.sink_mut().frames;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
    }

    #[test]
    fn background_and_grid_lines() {
        let mut c = compositor(LayoutStyle {
            background: Color(Rgb565::BLUE),
            grid_lines: true,
            grid_color: Color(Rgb565::WHITE),
        });
        let frame = c.render(&DrawContext::default()).clone();
        // 480 px screen, 4 * 90 px keys: margin 60, first inner line at x=150
        assert_eq!(frame.pixel(150, 40), Some(Rgb565::WHITE));
        assert_eq!(frame.pixel(100, 90), Some(Rgb565::WHITE));
        assert_eq!(frame.pixel(100, 40), Some(Rgb565::BLUE));
        // margins stay background
        assert_eq!(frame.pixel(10, 90), Some(Rgb565::BLUE));
    }

    #[test]
    fn sink_failure_is_reported_not_fatal() {
        let mut c = compositor(LayoutStyle::default());
        c.sink_mut().fail = true;
        assert!(!c.redraw(&DrawContext::default()));
        c.sink_mut().fail = false;
        assert!(c.redraw(&DrawContext::default()));
    }

    #[test]
    fn touch_maps_then_dispatches() {
        let mut c = compositor(LayoutStyle::default());
        c.registry_mut().register(red_button(0, 0));
        let mut actions = Vec::new();
        assert!(c.handle_touch(80, 10, &mut actions));
        assert_eq!(actions, vec![Action::Exec("kitty".into())]);
        // inside the left margin
        assert!(!c.handle_touch(30, 10, &mut actions));
        assert_eq!(actions.len(), 1);
        // touches never redraw by themselves
        assert!(c.sink_mut().frames.is_empty());
    }

    #[test]
    fn touch_batch_counts_handled_points() {
        let mut c = compositor(LayoutStyle::default());
        c.registry_mut().register(red_button(0, 0));
        c.registry_mut().register(red_button(3, 2));
        let points = [
            TouchPoint { x: 80, y: 10 },
            TouchPoint { x: 5, y: 5 },
            TouchPoint { x: 400, y: 260 },
            TouchPoint { x: 200, y: 100 },
        ];
        let mut actions = Vec::new();
        assert_eq!(c.handle_touches(&points, &mut actions), 2);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn replace_registry_tears_down_old_overlays() {
        let mut c = compositor(LayoutStyle::default());
        c.registry_mut().register(Component::Overlay(Overlay::new(
            GridPosition::new(0, 0),
            OverlayKind::Volume,
            OverlayOptions::default(),
        )));
        let now = Instant::now();
        c.registry_mut().trigger(OverlayKind::Volume, now, Duration::from_secs(5));

        let mut fresh = ComponentRegistry::new();
        fresh.register(red_button(1, 1));
        c.replace_registry(fresh);
        assert_eq!(c.registry().len(), 1);
        assert!(!c.tick(now + Duration::from_secs(10)));
    }

    #[test]
    fn shutdown_blanks_and_flushes() {
        let mut c = compositor(LayoutStyle {
            background: Color(Rgb565::RED),
            ..Default::default()
        });
        c.redraw(&DrawContext::default());
        c.shutdown();
        let sink = c.sink_mut();
        assert_eq!(sink.flushes, 1);
        let last = sink.frames.last().unwrap();
        assert_eq!(last, &Frame::new(480, 270));
    }

    #[test]
    fn auto_redraw_ticks_until_cancelled() {
        let (tx, rx) = mpsc::channel();
        let mut ticker = AutoRedraw::start(Duration::from_millis(10), tx);
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(first, Event::Redraw));
        ticker.cancel();
        assert!(!ticker.is_running());
        // drain whatever was queued before cancel returned
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn auto_redraw_stops_on_drop() {
        let (tx, rx) = mpsc::channel();
        drop(AutoRedraw::start(Duration::from_millis(5), tx));
        while rx.try_recv().is_ok() {}
        // the only sender lived in the joined thread
        assert!(matches!(rx.recv(), Err(mpsc::RecvError)));
    }
}
