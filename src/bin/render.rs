//! Render a page to a PPM image without a device attached.
//!
//! Run with:
//!     cargo run --bin deckgrd-render -- [--config <path>] [--page <id>] [--overlays] [-o <file.ppm>]
//!
//! Without `-o` the image is written to stdout.  `--overlays` draws every
//! overlay as if it had just been triggered.

use deckgrd::component::{DrawContext, OverlayKind};
use deckgrd::compositor::Compositor;
use deckgrd::config::{default_config_path, Config};
use deckgrd::geometry::Geometry;
use deckgrd::pages::PageStore;
use deckgrd::registry::ComponentRegistry;
use deckgrd::sink::PipeSink;
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let mut config_path = None;
    let mut page_id = None;
    let mut output = None;
    let mut overlays = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "--page" => page_id = args.next(),
            "-o" | "--output" => output = args.next().map(PathBuf::from),
            "--overlays" => overlays = true,
            other => {
                error!("unknown argument {:?}", other);
                std::process::exit(2);
            }
        }
    }

    let config_path = config_path.unwrap_or_else(default_config_path);
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) if e.is_not_found() => Config::default(),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&config, page_id.as_deref(), overlays, output) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(
    config: &Config,
    page_id: Option<&str>,
    overlays: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = Geometry::new(config.device)?;
    let store = PageStore::open(config.pages_path())?;
    let pages = &store.pages().pages;
    let index = match page_id {
        Some(id) => store
            .pages()
            .index_of(id)
            .ok_or_else(|| format!("no page with id {:?}", id))?,
        None => 0,
    };
    let page = pages.get(index).ok_or("no pages")?;

    let mut registry = ComponentRegistry::from_page(page, &geometry);
    if overlays {
        let now = Instant::now();
        for kind in [OverlayKind::Volume, OverlayKind::Page, OverlayKind::Workspace] {
            registry.trigger(kind, now, Duration::from_secs(60));
        }
    }

    let ctx = DrawContext {
        page_index: index,
        page_count: pages.len(),
        page_title: page.title.clone(),
        volume: Some(Default::default()),
        workspace: Some(1),
    };
    let mut compositor = Compositor::new(geometry, config.layout.style(), PipeSink::new(None));
    compositor.replace_registry(registry);
    let frame = compositor.render(&ctx);

    match output {
        Some(path) => {
            let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
            frame.write_ppm(&mut file)?;
            file.flush()?;
            info!("wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            frame.write_ppm(&mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}
