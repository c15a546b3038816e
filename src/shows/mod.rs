//! The tree of tracked shows.
//!
//! Shows, seasons and episodes are addressed by path ids: `(title)`,
//! `(title, season)` and `(title, season, episode)`. The tree resolves those
//! ids back to live entities, which is what lets scheduled tasks keep
//! referencing a show across restarts.

mod types;

pub use types::*;

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tvnab_common::{EntityId, Error, Result};

use crate::scheduler::{Entity, EntityResolver};

#[derive(Debug, Default)]
pub struct ShowTree {
    shows: RwLock<BTreeMap<String, Arc<Show>>>,
    path: Option<PathBuf>,
}

impl ShowTree {
    /// An empty tree that is never written to disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the tree from `path`. A missing file gives an empty tree that
    /// will be saved to `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tree = Self {
            shows: RwLock::new(BTreeMap::new()),
            path: Some(path.clone()),
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let file: ShowsFile = serde_json::from_str(&content)?;
                for record in &file.shows {
                    tree.insert(record);
                }
                tracing::debug!(path = %path.display(), shows = tree.len(), "Loaded shows");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No shows file, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(tree)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the tree to its file, replacing it atomically.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let file = ShowsFile {
            shows: self.shows.read().values().map(|s| s.to_record()).collect(),
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &file)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(path = %path.display(), shows = file.shows.len(), "Saved shows");
        Ok(())
    }

    /// Add or replace a show.
    pub fn insert(&self, record: &ShowRecord) -> Arc<Show> {
        let show = Arc::new(Show::from_record(record));
        self.shows
            .write()
            .insert(record.title.clone(), Arc::clone(&show));
        show
    }

    pub fn remove(&self, title: &str) -> Option<Arc<Show>> {
        self.shows.write().remove(title)
    }

    pub fn get(&self, title: &str) -> Option<Arc<Show>> {
        self.shows.read().get(title).cloned()
    }

    pub fn titles(&self) -> Vec<String> {
        self.shows.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.read().is_empty()
    }

    /// Find the entity with `id` by walking down from its show.
    pub fn find(&self, id: &EntityId) -> Option<Arc<dyn Entity>> {
        let segments = id.segments();
        let (title, rest) = segments.split_first()?;
        let show = self.get(&title.to_string())?;

        match rest {
            [] => Some(show as Arc<dyn Entity>),
            [season] => {
                let season = show.season(types::segment_number(season)?)?;
                Some(Arc::clone(season) as Arc<dyn Entity>)
            }
            [season, episode] => {
                let season = show.season(types::segment_number(season)?)?;
                let episode = season.episode(types::segment_number(episode)?)?;
                Some(Arc::clone(episode) as Arc<dyn Entity>)
            }
            _ => None,
        }
    }
}

impl EntityResolver for ShowTree {
    fn resolve(&self, id: &EntityId) -> Option<Arc<dyn Entity>> {
        self.find(id)
    }
}
