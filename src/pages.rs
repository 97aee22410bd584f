//! The page layout document and its on-disk store.
//!
//! A [`PageSet`] is an ordered list of pages; each page maps component keys
//! to [`ComponentDescriptor`]s.  It is stored as JSON (by default in
//! `$XDG_CONFIG_HOME/deckgrd/pages.json`) and edited at runtime through the
//! command socket.  Every successful edit is written back immediately; the
//! last write wins.
//!
//! # Example
//!
//! ```json
//! {
//!   "pages": [
//!     {
//!       "id": "home",
//!       "title": "Home",
//!       "description": "Launchers",
//!       "components": {
//!         "terminal": {
//!           "type": "button",
//!           "position": {"col": 0, "row": 0},
//!           "options": {"label": "Term"},
//!           "command": "kitty"
//!         },
//!         "volume": { "type": "volume", "position": "3 0" }
//!       }
//!     }
//!   ]
//! }
//! ```

use crate::command::{NewPage, PageMeta};
use crate::geometry::GridPosition;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How to build one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Component type: `button`, `text`, `volume`, `page` or `workspace`.
    #[serde(rename = "type")]
    pub kind: String,
    pub position: GridPosition,
    /// Type-specific options; missing means defaults.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// One screenful of components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentDescriptor>,
}

/// All pages, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSet {
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Default for PageSet {
    /// A single page with a few launchers and the volume overlay.
    fn default() -> Self {
        let button = |col, row, label: &str, command: &str| ComponentDescriptor {
            kind: "button".into(),
            position: GridPosition::new(col, row),
            options: json!({ "label": label }),
            command: Some(command.into()),
        };
        let mut components = BTreeMap::new();
        components.insert("terminal".into(), button(0, 0, "Terminal", "kitty"));
        components.insert("browser".into(), button(1, 0, "Browser", "firefox"));
        components.insert("files".into(), button(2, 0, "Files", "nautilus"));
        components.insert(
            "play".into(),
            ComponentDescriptor {
                kind: "button".into(),
                position: GridPosition::new(3, 0),
                options: json!({ "label": "Play/Pause", "media": "play-pause" }),
                command: None,
            },
        );
        components.insert(
            "volume".into(),
            ComponentDescriptor {
                kind: "volume".into(),
                position: GridPosition::new(3, 0),
                options: serde_json::Value::Null,
                command: None,
            },
        );
        components.insert(
            "page".into(),
            ComponentDescriptor {
                kind: "page".into(),
                position: GridPosition::new(0, 2),
                options: serde_json::Value::Null,
                command: None,
            },
        );
        Self {
            pages: vec![Page {
                id: "home".into(),
                title: "Home".into(),
                description: "Default launchers".into(),
                components,
            }],
        }
    }
}

impl PageSet {
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }
}

/// Errors from loading, saving or editing pages.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no page with id {0:?}")]
    NotFound(String),
    #[error("page {0:?} already exists")]
    Duplicate(String),
    #[error("page title must not be empty")]
    EmptyTitle,
    #[error("cannot delete the last page")]
    LastPage,
    #[error("a page set needs at least one page")]
    NoPages,
}

/// The page set plus the file it persists to.
#[derive(Debug)]
pub struct PageStore {
    path: PathBuf,
    set: PageSet,
}

impl PageStore {
    /// Load `path`, falling back to [`PageSet::default`] when the file does
    /// not exist.  Any other read or parse failure is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PageError> {
        let path = path.as_ref().to_path_buf();
        let set = match Self::read(&path) {
            Ok(set) => set,
            Err(PageError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!("no pages file at {}, using built-in pages", path.display());
                PageSet::default()
            }
            Err(e) => return Err(e),
        };
        Ok(Self { path, set })
    }

    fn read(path: &Path) -> Result<PageSet, PageError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let set: PageSet = serde_json::from_str(&contents).map_err(|source| PageError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if set.pages.is_empty() {
            return Err(PageError::NoPages);
        }
        Ok(set)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pages(&self) -> &PageSet {
        &self.set
    }

    /// Re-read the file.  On failure the current pages are kept.
    pub fn reload(&mut self) -> Result<(), PageError> {
        self.set = Self::read(&self.path)?;
        info!("reloaded {} page(s) from {}", self.set.pages.len(), self.path.display());
        Ok(())
    }

    /// Write the current pages to disk.
    pub fn save(&self) -> Result<(), PageError> {
        Self::write(&self.path, &self.set)
    }

    fn write(path: &Path, set: &PageSet) -> Result<(), PageError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| PageError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let contents = serde_json::to_string_pretty(set)?;
        std::fs::write(path, contents).map_err(|source| PageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("saved {} page(s) to {}", set.pages.len(), path.display());
        Ok(())
    }

    /// Persist `set` and adopt it.  The in-memory pages only change once
    /// the write succeeded.
    fn commit(&mut self, set: PageSet) -> Result<(), PageError> {
        Self::write(&self.path, &set)?;
        self.set = set;
        Ok(())
    }

    /// Append a new, empty page and return its id.
    ///
    /// Without an explicit id one is derived from the title (`"My Media"` →
    /// `"my-media"`, `"my-media-2"` if taken).  An explicit id that already
    /// exists is an error.
    pub fn create(&mut self, new: NewPage) -> Result<String, PageError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(PageError::EmptyTitle);
        }
        let id = match new.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) if self.set.index_of(id).is_some() => {
                return Err(PageError::Duplicate(id.to_string()))
            }
            Some(id) => id.to_string(),
            None => self.unique_id(&slugify(title)),
        };
        let mut set = self.set.clone();
        set.pages.push(Page {
            id: id.clone(),
            title: title.to_string(),
            description: new.description,
            components: BTreeMap::new(),
        });
        self.commit(set)?;
        info!("created page {}", id);
        Ok(id)
    }

    /// Remove a page.  The last remaining page cannot be deleted.
    pub fn delete(&mut self, id: &str) -> Result<Page, PageError> {
        let idx = self
            .set
            .index_of(id)
            .ok_or_else(|| PageError::NotFound(id.to_string()))?;
        if self.set.pages.len() == 1 {
            return Err(PageError::LastPage);
        }
        let mut set = self.set.clone();
        let page = set.pages.remove(idx);
        self.commit(set)?;
        info!("deleted page {}", id);
        Ok(page)
    }

    /// Change a page's title and/or description.
    pub fn update_meta(&mut self, meta: PageMeta) -> Result<(), PageError> {
        if matches!(&meta.title, Some(t) if t.trim().is_empty()) {
            return Err(PageError::EmptyTitle);
        }
        let mut set = self.set.clone();
        let page = set
            .pages
            .iter_mut()
            .find(|p| p.id == meta.id)
            .ok_or_else(|| PageError::NotFound(meta.id.clone()))?;
        if let Some(title) = meta.title {
            page.title = title.trim().to_string();
        }
        if let Some(description) = meta.description {
            page.description = description;
        }
        self.commit(set)?;
        info!("updated page {}", meta.id);
        Ok(())
    }

    /// Replace every page with `set` and persist it.
    pub fn replace(&mut self, set: PageSet) -> Result<(), PageError> {
        if set.pages.is_empty() {
            return Err(PageError::NoPages);
        }
        for (i, page) in set.pages.iter().enumerate() {
            if set.pages[..i].iter().any(|p| p.id == page.id) {
                return Err(PageError::Duplicate(page.id.clone()));
            }
        }
        self.commit(set)
    }

    fn unique_id(&self, base: &str) -> String {
        let base = if base.is_empty() { "page" } else { base };
        if self.set.index_of(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|id| self.set.index_of(id).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

/// Lowercase ASCII alphanumerics, everything else collapsed to `-`.
fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    /// A unique, not-yet-existing pages file path per test.
    fn tmp_pages_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir()
            .join(format!("deckgrd-pages-{}-{}", std::process::id(), id))
            .join("pages.json")
    }

    fn new_page(title: &str) -> NewPage {
        NewPage {
            id: None,
            title: title.into(),
            description: String::new(),
        }
    }

    #[test]
    fn missing_file_uses_defaults() {
        let store = PageStore::open(tmp_pages_path()).unwrap();
        assert_eq!(store.pages(), &PageSet::default());
    }

    #[test]
    fn default_pages_parse_back() {
        let json = serde_json::to_string(&PageSet::default()).unwrap();
        let set: PageSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, PageSet::default());
    }

    #[test]
    fn descriptor_accepts_minimal_form() {
        let d: ComponentDescriptor = serde_json::from_str(r#"{"type":"volume","position":"3 0"}"#).unwrap();
        assert_eq!(d.kind, "volume");
        assert_eq!(d.position, GridPosition::new(3, 0));
        assert!(d.options.is_null());
        assert_eq!(d.command, None);
    }

    #[test]
    fn create_persists_and_derives_id() {
        let path = tmp_pages_path();
        let mut store = PageStore::open(&path).unwrap();
        let id = store.create(new_page("My Media!")).unwrap();
        assert_eq!(id, "my-media");
        let again = store.create(new_page("My Media")).unwrap();
        assert_eq!(again, "my-media-2");

        let reopened = PageStore::open(&path).unwrap();
        assert_eq!(reopened.pages().pages.len(), 3);
        assert_eq!(reopened.pages().get("my-media").unwrap().title, "My Media!");
    }

    #[test]
    fn create_rejects_duplicate_explicit_id_and_empty_title() {
        let mut store = PageStore::open(tmp_pages_path()).unwrap();
        let err = store
            .create(NewPage {
                id: Some("home".into()),
                title: "Again".into(),
                description: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, PageError::Duplicate(id) if id == "home"));
        assert!(matches!(store.create(new_page("  ")), Err(PageError::EmptyTitle)));
    }

    #[test]
    fn delete_keeps_at_least_one_page() {
        let mut store = PageStore::open(tmp_pages_path()).unwrap();
        assert!(matches!(store.delete("home"), Err(PageError::LastPage)));
        store.create(new_page("Two")).unwrap();
        assert_eq!(store.delete("home").unwrap().id, "home");
        assert!(matches!(store.delete("home"), Err(PageError::NotFound(_))));
    }

    #[test]
    fn update_meta_changes_only_given_fields() {
        let mut store = PageStore::open(tmp_pages_path()).unwrap();
        store
            .update_meta(PageMeta {
                id: "home".into(),
                title: None,
                description: Some("Everyday".into()),
            })
            .unwrap();
        let page = store.pages().get("home").unwrap();
        assert_eq!(page.title, "Home");
        assert_eq!(page.description, "Everyday");
        assert!(matches!(
            store.update_meta(PageMeta {
                id: "nope".into(),
                title: Some("x".into()),
                description: None
            }),
            Err(PageError::NotFound(_))
        ));
    }

    #[test]
    fn replace_validates_and_persists() {
        let path = tmp_pages_path();
        let mut store = PageStore::open(&path).unwrap();
        assert!(matches!(store.replace(PageSet { pages: vec![] }), Err(PageError::NoPages)));

        let page = |id: &str| Page {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            components: BTreeMap::new(),
        };
        assert!(matches!(
            store.replace(PageSet { pages: vec![page("a"), page("a")] }),
            Err(PageError::Duplicate(_))
        ));
        store.replace(PageSet { pages: vec![page("a"), page("b")] }).unwrap();
        let reopened = PageStore::open(&path).unwrap();
        assert_eq!(reopened.pages().index_of("b"), Some(1));
    }

    #[test]
    fn reload_failure_keeps_current_pages() {
        let path = tmp_pages_path();
        let mut store = PageStore::open(&path).unwrap();
        store.save().unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(store.reload(), Err(PageError::Parse { .. })));
        assert_eq!(store.pages(), &PageSet::default());
    }

    #[test]
    fn failed_write_leaves_pages_untouched() {
        let path = tmp_pages_path();
        let mut store = PageStore::open(&path).unwrap();
        store.create(new_page("Two")).unwrap();
        let before = store.pages().clone();

        // a directory where the file should be makes every write fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir_all(&path).unwrap();

        assert!(matches!(store.create(new_page("Three")), Err(PageError::Write { .. })));
        assert!(matches!(store.delete("two"), Err(PageError::Write { .. })));
        assert!(matches!(
            store.update_meta(PageMeta {
                id: "home".into(),
                title: Some("Renamed".into()),
                description: None,
            }),
            Err(PageError::Write { .. })
        ));
        assert!(matches!(
            store.replace(PageSet::default()),
            Err(PageError::Write { .. })
        ));
        assert_eq!(store.pages(), &before);
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Media Keys"), "media-keys");
        assert_eq!(slugify("  OBS / Stream  "), "obs-stream");
        assert_eq!(slugify("!!!"), "");
    }
}
