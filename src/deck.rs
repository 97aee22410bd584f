//! The orchestrator that ties pages, the compositor and the desktop
//! backends together.
//!
//! [`Deck`] owns the [`PageStore`], the index of the page on screen and the
//! [`Compositor`] holding that page's registry.  It reacts to [`Command`]s:
//!
//! * touches are mapped and dispatched through the compositor; the actions
//!   queued by components run afterwards
//! * knob turns and circle buttons go through the configured bindings
//! * page edits update the store, rebuild the registry and swap it in
//!
//! Anything that changes the screen ends with a redraw.  Backend failures
//! (Hyprland, `wpctl`, spawning) are logged and otherwise ignored; only page
//! edits report errors back to the caller.

use crate::command::{Command, MediaKey, Reply, Vibration, VolumeState};
use crate::component::{Action, Component, DrawContext, OverlayKind};
use crate::compositor::Compositor;
use crate::config::{ButtonBinding, Config, KnobBinding};
use crate::pages::{PageError, PageStore};
use crate::registry::ComponentRegistry;
use crate::system::media_command;
use crate::traits::{AudioControl, DisplaySink, Launcher, WindowManager};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Errors reported back to the client that sent the command.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("no page with id {0:?}")]
    UnknownPage(String),
}

/// The parts of [`Config`] the deck consults at runtime.
#[derive(Debug, Clone)]
pub struct DeckSettings {
    pub knobs: BTreeMap<String, KnobBinding>,
    pub buttons: BTreeMap<String, ButtonBinding>,
    pub overlay_duration: Duration,
    pub vibrate_on_touch: bool,
    pub volume_step: i32,
    pub media_command: String,
}

impl From<&Config> for DeckSettings {
    fn from(config: &Config) -> Self {
        Self {
            knobs: config.knobs.clone(),
            buttons: config.buttons.clone(),
            overlay_duration: config.layout.overlay_duration(),
            vibrate_on_touch: config.layout.vibrate_on_touch,
            volume_step: config.system.volume_step,
            media_command: config.system.media_command.clone(),
        }
    }
}

pub struct Deck<S, W, A, L>
where
    S: DisplaySink,
    W: WindowManager,
    A: AudioControl,
    L: Launcher,
{
    compositor: Compositor<S>,
    store: PageStore,
    current: usize,
    wm: W,
    audio: A,
    launcher: L,
    settings: DeckSettings,
    volume: Option<VolumeState>,
    workspace: Option<i32>,
}

impl<S, W, A, L> Deck<S, W, A, L>
where
    S: DisplaySink,
    W: WindowManager,
    A: AudioControl,
    L: Launcher,
{
    /// Build a deck showing the first page.  Nothing is drawn until the
    /// first [`redraw`](Deck::redraw).
    pub fn new(
        compositor: Compositor<S>,
        store: PageStore,
        wm: W,
        audio: A,
        launcher: L,
        settings: DeckSettings,
    ) -> Self {
        let volume = audio
            .volume()
            .map_err(|e| warn!("failed to read volume: {}", e))
            .ok();
        let workspace = wm
            .active_workspace()
            .map_err(|e| warn!("failed to read active workspace: {}", e))
            .ok();
        let mut deck = Self {
            compositor,
            store,
            current: 0,
            wm,
            audio,
            launcher,
            settings,
            volume,
            workspace,
        };
        deck.load_current();
        deck
    }

    pub fn compositor(&self) -> &Compositor<S> {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor<S> {
        &mut self.compositor
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn wm(&self) -> &W {
        &self.wm
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Index of the page on screen.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Id of the page on screen.
    pub fn current_page(&self) -> Option<&str> {
        self.store
            .pages()
            .pages
            .get(self.current)
            .map(|p| p.id.as_str())
    }

    /// Live state handed to components when drawing.
    pub fn context(&self) -> DrawContext {
        let pages = &self.store.pages().pages;
        DrawContext {
            page_index: self.current,
            page_count: pages.len(),
            page_title: pages
                .get(self.current)
                .map(|p| p.title.clone())
                .unwrap_or_default(),
            volume: self.volume,
            workspace: self.workspace,
        }
    }

    pub fn redraw(&mut self) -> bool {
        let ctx = self.context();
        self.compositor.redraw(&ctx)
    }

    /// Advance overlay timers; redraws when one of them hid.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.compositor.tick(now) {
            self.redraw();
            true
        } else {
            false
        }
    }

    /// Earliest pending overlay deadline, for sizing the event loop's wait.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.compositor
            .registry()
            .components()
            .iter()
            .filter_map(|c| match c {
                Component::Overlay(o) => o.timer().deadline(),
                _ => None,
            })
            .min()
    }

    /// Handle one command.  `now` drives overlay deadlines.
    pub fn handle(&mut self, cmd: Command, now: Instant) -> Result<Reply, DeckError> {
        match cmd {
            Command::TouchStart { touches } => {
                let mut actions = Vec::new();
                let handled = self.compositor.handle_touches(&touches, &mut actions);
                if handled > 0 {
                    debug!("{} of {} touch point(s) handled", handled, touches.len());
                    if self.settings.vibrate_on_touch {
                        self.vibrate(Vibration::Short);
                    }
                    for action in actions {
                        self.run_action(action, now);
                    }
                    self.redraw();
                }
            }
            Command::TouchMove { .. } | Command::TouchEnd { .. } => {}

            Command::ButtonDown { id } => match self.settings.buttons.get(&id).cloned() {
                Some(binding) => {
                    info!("button {} -> {:?}", id, binding);
                    self.run_action(binding_action(binding), now);
                    self.redraw();
                }
                None => debug!("button {} is not bound", id),
            },
            Command::ButtonUp { .. } => {}

            Command::Rotate { id, delta } => {
                let binding = self.settings.knobs.get(&id).copied().unwrap_or(KnobBinding::None);
                debug!("knob {} turned {} -> {:?}", id, delta, binding);
                match binding {
                    KnobBinding::Volume => self.adjust_volume(delta, now),
                    KnobBinding::Workspace => self.step_workspace(delta, now),
                    KnobBinding::Page => self.step_page(delta as i64, now),
                    KnobBinding::None => return Ok(Reply::Ok),
                }
                self.redraw();
            }

            Command::NextPage => {
                self.step_page(1, now);
                self.redraw();
                return Ok(self.page_reply());
            }
            Command::PreviousPage => {
                self.step_page(-1, now);
                self.redraw();
                return Ok(self.page_reply());
            }
            Command::ShowPage(id) => {
                self.show_page_id(&id, now)?;
                self.redraw();
                return Ok(self.page_reply());
            }

            Command::CreatePage(new) => {
                let id = self.store.create(new)?;
                // page count changed
                self.redraw();
                return Ok(Reply::Page(id));
            }
            Command::DeletePage(id) => {
                let idx = self
                    .store
                    .pages()
                    .index_of(&id)
                    .ok_or_else(|| DeckError::UnknownPage(id.clone()))?;
                self.store.delete(&id)?;
                if idx < self.current {
                    self.current -= 1;
                } else if idx == self.current {
                    let last = self.store.pages().pages.len().saturating_sub(1);
                    self.current = self.current.min(last);
                    self.load_current();
                }
                self.redraw();
            }
            Command::UpdatePageMeta(meta) => {
                self.store.update_meta(meta)?;
                self.redraw();
            }
            Command::SaveConfig(set) => {
                let keep = self.current_page().map(str::to_string);
                self.store.replace(set)?;
                self.after_pages_changed(keep.as_deref());
            }
            Command::GetConfig => return Ok(Reply::Config(self.store.pages().clone())),

            Command::Reload => {
                let keep = self.current_page().map(str::to_string);
                self.store.reload()?;
                self.after_pages_changed(keep.as_deref());
            }
            Command::Redraw => {
                self.redraw();
            }
            Command::Shutdown => {}
        }
        Ok(Reply::Ok)
    }

    /// Tear down overlays and blank the screen.
    pub fn shutdown(&mut self) {
        self.compositor.shutdown();
    }

    //  Pages

    fn page_reply(&self) -> Reply {
        Reply::Page(self.current_page().unwrap_or_default().to_string())
    }

    /// Rebuild the registry for the current page and swap it in.
    fn load_current(&mut self) {
        let registry = match self.store.pages().pages.get(self.current) {
            Some(page) => ComponentRegistry::from_page(page, self.compositor.geometry()),
            None => ComponentRegistry::new(),
        };
        self.compositor.replace_registry(registry);
    }

    fn show_page(&mut self, index: usize, now: Instant) {
        self.current = index;
        self.load_current();
        info!("showing page {}", self.current_page().unwrap_or("?"));
        self.compositor
            .registry_mut()
            .trigger(OverlayKind::Page, now, self.settings.overlay_duration);
    }

    fn show_page_id(&mut self, id: &str, now: Instant) -> Result<(), DeckError> {
        let index = self
            .store
            .pages()
            .index_of(id)
            .ok_or_else(|| DeckError::UnknownPage(id.to_string()))?;
        self.show_page(index, now);
        Ok(())
    }

    /// Move `delta` pages forward or back, wrapping at both ends.
    fn step_page(&mut self, delta: i64, now: Instant) {
        let count = self.store.pages().pages.len();
        if count == 0 {
            return;
        }
        let index = (self.current as i64 + delta).rem_euclid(count as i64) as usize;
        self.show_page(index, now);
    }

    /// Follow the previously shown page id into a changed page set.
    fn after_pages_changed(&mut self, keep: Option<&str>) {
        let pages = self.store.pages();
        self.current = keep
            .and_then(|id| pages.index_of(id))
            .unwrap_or_else(|| self.current.min(pages.pages.len().saturating_sub(1)));
        self.load_current();
        self.redraw();
    }

    //  Actions

    fn run_action(&mut self, action: Action, now: Instant) {
        debug!("running {:?}", action);
        match action {
            Action::Exec(command) => self.launch(&command),
            Action::ShowPage(id) => {
                if let Err(e) = self.show_page_id(&id, now) {
                    warn!("{}", e);
                }
            }
            Action::NextPage => self.step_page(1, now),
            Action::PreviousPage => self.step_page(-1, now),
            Action::Media(key) => self.media(key),
            Action::ToggleMute => match self.audio.toggle_mute() {
                Ok(state) => {
                    self.volume = Some(state);
                    self.show_overlay(OverlayKind::Volume, now);
                }
                Err(e) => warn!("failed to toggle mute: {}", e),
            },
            Action::Workspace(id) => self.switch_workspace(id, now),
        }
    }

    fn launch(&self, command: &str) {
        if let Err(e) = self.launcher.launch(command) {
            warn!("failed to launch {:?}: {}", command, e);
        }
    }

    fn media(&self, key: MediaKey) {
        self.launch(&media_command(&self.settings.media_command, key));
    }

    fn vibrate(&mut self, pattern: Vibration) {
        if let Err(e) = self.compositor.sink_mut().vibrate(pattern) {
            warn!("vibration failed: {}", e);
        }
    }

    fn show_overlay(&mut self, kind: OverlayKind, now: Instant) {
        self.compositor
            .registry_mut()
            .trigger(kind, now, self.settings.overlay_duration);
    }

    fn adjust_volume(&mut self, delta: i32, now: Instant) {
        match self.audio.adjust_volume(delta.saturating_mul(self.settings.volume_step)) {
            Ok(state) => {
                self.volume = Some(state);
                self.show_overlay(OverlayKind::Volume, now);
            }
            Err(e) => warn!("failed to change volume: {}", e),
        }
    }

    fn step_workspace(&mut self, delta: i32, now: Instant) {
        let current = match self.wm.active_workspace() {
            Ok(id) => id,
            Err(e) => {
                warn!("failed to read active workspace: {}", e);
                return;
            }
        };
        self.switch_workspace(current.saturating_add(delta).max(1), now);
    }

    fn switch_workspace(&mut self, id: i32, now: Instant) {
        match self.wm.switch_workspace(id) {
            Ok(()) => {
                self.workspace = Some(id);
                self.show_overlay(OverlayKind::Workspace, now);
            }
            Err(e) => warn!("failed to switch to workspace {}: {}", id, e),
        }
    }
}

fn binding_action(binding: ButtonBinding) -> Action {
    match binding {
        ButtonBinding::Page(id) => Action::ShowPage(id),
        ButtonBinding::Command(cmd) => Action::Exec(cmd),
        ButtonBinding::Media(key) => Action::Media(key),
        ButtonBinding::Mute => Action::ToggleMute,
        ButtonBinding::NextPage => Action::NextPage,
        ButtonBinding::PreviousPage => Action::PreviousPage,
    }
}
