//! Entry point for the **deckgrd** daemon.
//!
//! Spawns the command socket and the auto-redraw ticker on background
//! threads and processes events on the main thread, one at a time.
//!
//! ```text
//! deckgrd [--config <path>] [--dry-run]
//! ```
//!
//! `--dry-run` replaces Hyprland, `wpctl` and the launcher with in-memory
//! stand-ins, which is handy together with `deckgrd-render` or a fake device
//! bridge.

use deckgrd::command::{Command, Event, Reply};
use deckgrd::compositor::{AutoRedraw, Compositor};
use deckgrd::config::{default_config_path, Config};
use deckgrd::deck::{Deck, DeckSettings};
use deckgrd::geometry::Geometry;
use deckgrd::hyprland::wm::HyprlandWm;
use deckgrd::ipc::listener::UnixSocketListener;
use deckgrd::pages::PageStore;
use deckgrd::sink::{PipeSink, TimedSink};
use deckgrd::system::{NoopAudio, NoopLauncher, NoopWm, ShellLauncher, WpctlAudio};
use deckgrd::traits::{AudioControl, EventSource, Launcher, WindowManager};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Upper bound on how long the loop sleeps between overlay checks.
const TICK: Duration = Duration::from_millis(250);

struct Args {
    config: Option<PathBuf>,
    dry_run: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        dry_run: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--dry-run" => args.dry_run = true,
            "--config" => args.config = it.next().map(PathBuf::from),
            other => warn!("ignoring unknown argument {:?}", other),
        }
    }
    args
}

/// Load the config, falling back to compiled-in defaults.
fn load_config(path: Option<PathBuf>) -> Config {
    let path = path.unwrap_or_else(default_config_path);
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) if e.is_not_found() => {
            info!("no config file at {}, using defaults", path.display());
            Config::default()
        }
        Err(e) => {
            warn!("{}, using defaults", e);
            Config::default()
        }
    }
}

//  Main

fn main() {
    env_logger::init();

    let args = parse_args();
    let config = load_config(args.config);

    if args.dry_run {
        info!("dry run: no workspace, audio or launcher side effects");
        run_daemon(config, NoopWm::default(), NoopAudio::default(), NoopLauncher);
    } else {
        run_daemon(config, HyprlandWm::new(), WpctlAudio::new(), ShellLauncher::new());
    }
}

fn run_daemon<W, A, L>(config: Config, wm: W, audio: A, launcher: L)
where
    W: WindowManager,
    A: AudioControl,
    L: Launcher,
{
    let geometry = match Geometry::new(config.device) {
        Ok(g) => g,
        Err(e) => {
            error!("invalid device geometry: {}", e);
            std::process::exit(1);
        }
    };
    let store = match PageStore::open(config.pages_path()) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to load pages: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "{}x{} screen, {}x{} grid, {} page(s)",
        geometry.info().width,
        geometry.info().height,
        geometry.info().columns,
        geometry.info().rows,
        store.pages().pages.len()
    );

    let sink = TimedSink::spawn(
        PipeSink::new(config.system.frame_sink.clone()),
        config.layout.display_timeout(),
    );
    let compositor = Compositor::new(geometry, config.layout.style(), sink);
    let mut deck = Deck::new(compositor, store, wm, audio, launcher, DeckSettings::from(&config));

    let (tx, rx) = mpsc::channel::<Event>();
    let socket = config.socket_path();
    spawn_socket_listener(socket.clone(), tx.clone());
    let mut auto_redraw = config.layout.auto_redraw().map(|interval| AutoRedraw::start(interval, tx.clone()));
    drop(tx);

    deck.redraw();
    run_event_loop(&mut deck, &rx);

    //  Shutdown, in order
    if let Some(ticker) = auto_redraw.as_mut() {
        ticker.cancel();
        info!("auto-redraw stopped");
    }
    deck.shutdown();
    if std::fs::remove_file(&socket).is_ok() {
        debug!("removed {}", socket.display());
    }
    info!("deckgrd stopped");
}

fn run_event_loop<S, W, A, L>(deck: &mut Deck<S, W, A, L>, rx: &mpsc::Receiver<Event>)
where
    S: deckgrd::traits::DisplaySink,
    W: WindowManager,
    A: AudioControl,
    L: Launcher,
{
    info!("deckgrd running");
    loop {
        let wait = deck
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()).min(TICK))
            .unwrap_or(TICK);
        match rx.recv_timeout(wait) {
            Ok(Event::Command(Command::Shutdown, reply)) => {
                info!("shutdown requested");
                if let Some(reply) = reply {
                    let _ = reply.send(Reply::Ok);
                }
                return;
            }
            Ok(Event::Command(cmd, reply)) => {
                let answer = match deck.handle(cmd, Instant::now()) {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!("command failed: {}", e);
                        Reply::Error(e.to_string())
                    }
                };
                if let Some(reply) = reply {
                    // the client may have timed out already
                    let _ = reply.send(answer);
                }
            }
            Ok(Event::Redraw) => {
                deck.redraw();
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("all event sources closed");
                return;
            }
        }
        deck.tick(Instant::now());
    }
}

//  Helpers

fn spawn_socket_listener(path: PathBuf, tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || {
        let mut source = UnixSocketListener::new(&path);
        if let Err(e) = source.run(tx) {
            error!("socket listener error: {}", e);
        }
    });
}
