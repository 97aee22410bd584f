//! Ordered collection of the components on the active page.
//!
//! Two views over the same components:
//!
//! * **draw order**: every component, in registration order.  Later
//!   registrations paint over earlier ones, which is how overlays sit on top
//!   of the component sharing their cell.
//! * **touch index**: `"{col}_{row}" -> component`, holding the most
//!   recently registered component for each cell.  A component without
//!   [`Capabilities::TOUCH`] still shadows the cell; touches there are
//!   dropped.
//!
//! A registry is built once per page and never mutated while it is being
//! drawn; page switches and reloads build a fresh one and swap it in.

use crate::component::{Action, Capabilities, Component, DrawContext, OverlayKind};
use crate::geometry::{Geometry, GridPosition};
use crate::pages::Page;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use log::{debug, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: Vec<Component>,
    touch_index: HashMap<String, usize>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for `page`.
    ///
    /// Regular components are registered first (in key order), overlays
    /// after them so that they draw on top and take over touches for their
    /// cell.  Descriptors that do not build, or that point outside the grid,
    /// are skipped with a warning.
    pub fn from_page(page: &Page, geometry: &Geometry) -> Self {
        let mut base = Vec::new();
        let mut overlays = Vec::new();
        for (key, desc) in &page.components {
            if !geometry.contains(desc.position) {
                warn!(
                    "page {}: component {} at {} is outside the {}x{} grid, skipped",
                    page.id,
                    key,
                    desc.position,
                    geometry.info().columns,
                    geometry.info().rows
                );
                continue;
            }
            match Component::from_descriptor(desc) {
                Ok(c) if c.capabilities().contains(Capabilities::OVERLAY) => overlays.push(c),
                Ok(c) => base.push(c),
                Err(e) => warn!("page {}: component {} skipped: {}", page.id, key, e),
            }
        }

        let mut registry = Self::new();
        for c in base.into_iter().chain(overlays) {
            registry.register(c);
        }
        debug!("page {}: {} component(s) registered", page.id, registry.len());
        registry
    }

    /// Append `component`.  It becomes the touch target for its cell,
    /// shadowing any earlier one, whether or not it handles touches itself.
    pub fn register(&mut self, component: Component) {
        let idx = self.components.len();
        let key = component.position().key();
        if let Some(prev) = self.touch_index.insert(key.clone(), idx) {
            debug!("touch target {} shadows component #{}", key, prev);
        }
        self.components.push(component);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Components in draw order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The component touches at `pos` are routed to.
    pub fn touch_target(&self, pos: GridPosition) -> Option<&Component> {
        self.touch_index
            .get(&pos.key())
            .and_then(|&i| self.components.get(i))
    }

    /// Route a touch at `pos` to its touch target.  Returns whether it was
    /// handled; a cell with no touch target is a no-op.
    pub fn dispatch_touch(&mut self, pos: GridPosition, actions: &mut Vec<Action>) -> bool {
        let Some(&idx) = self.touch_index.get(&pos.key()) else {
            debug!("no touch target at {}", pos);
            return false;
        };
        match self.components.get_mut(idx) {
            Some(c) => c.on_touch(pos, actions),
            None => false,
        }
    }

    /// Draw every component at its cell, in registration order.
    pub fn draw_all<D>(&self, target: &mut D, geometry: &Geometry, ctx: &DrawContext) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        for c in &self.components {
            c.draw(target, geometry.cell_rect(c.position()), ctx)?;
        }
        Ok(())
    }

    /// Advance every updatable component.  Returns `true` if any of them
    /// changed what it draws.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for c in &mut self.components {
            if c.capabilities().contains(Capabilities::UPDATE) {
                changed |= c.tick(now);
            }
        }
        changed
    }

    /// Show every overlay of `kind` for `duration`.  Returns how many there
    /// were.
    pub fn trigger(&mut self, kind: OverlayKind, now: Instant, duration: Duration) -> usize {
        let mut n = 0;
        for o in self.components.iter_mut().filter_map(Component::as_overlay_mut) {
            if o.kind() == kind {
                o.show_temporarily(now, duration);
                n += 1;
            }
        }
        n
    }

    /// Cancel all pending overlay deadlines.
    pub fn teardown(&mut self) {
        for c in &mut self.components {
            c.teardown();
        }
    }
}
