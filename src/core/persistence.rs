//! Session snapshots and the stores that hold them.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::session::{Checkpoint, Session};

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Durable key/value storage for serialized snapshots.
pub trait SaveStore {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// Volatile store, for tests and hosts that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: FxHashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStore for MemoryStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveStore for FileStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves a truncated save.
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, self.path_for(key))
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Session state plus the cursor it was saved at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(flatten)]
    pub session: Session,
    #[serde(rename = "currentChapterId")]
    pub chapter_id: String,
    #[serde(rename = "currentSceneIndex")]
    pub scene_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: SnapshotData,
}

impl Snapshot {
    pub fn new(session: Session, chapter_id: impl Into<String>, scene_index: usize) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            timestamp: chrono::Utc::now().timestamp_millis(),
            data: SnapshotData {
                session,
                chapter_id: chapter_id.into(),
                scene_index,
            },
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.data.chapter_id.clone(), self.data.scene_index)
    }

    pub fn into_parts(self) -> (Session, Checkpoint) {
        let checkpoint = Checkpoint::new(self.data.chapter_id, self.data.scene_index);
        (self.data.session, checkpoint)
    }
}

/// Saves and restores snapshots under one fixed key.
pub struct Persistence {
    store: Box<dyn SaveStore>,
    key: String,
}

impl Persistence {
    pub fn new(store: Box<dyn SaveStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn try_save(
        &mut self,
        session: &Session,
        chapter_id: &str,
        scene_index: usize,
    ) -> Result<(), PersistenceError> {
        let snapshot = Snapshot::new(session.clone(), chapter_id, scene_index);
        let json = serde_json::to_string(&snapshot)?;
        self.store.write(&self.key, &json)?;
        Ok(())
    }

    /// Autosave. Failures are logged; play continues without durability.
    pub fn save(&mut self, session: &Session, chapter_id: &str, scene_index: usize) {
        match self.try_save(session, chapter_id, scene_index) {
            Ok(()) => log::debug!("autosave complete at {}:{}", chapter_id, scene_index),
            Err(e) => log::error!("save failed: {}", e),
        }
    }

    pub fn try_load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let Some(json) = self.store.read(&self.key)? else {
            return Ok(None);
        };
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }

    /// Load the saved snapshot, treating any failure as "no save".
    pub fn load(&self) -> Option<Snapshot> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("load failed: {}", e);
                None
            }
        }
    }

    pub fn has_save(&self) -> bool {
        matches!(self.store.read(&self.key), Ok(Some(_)))
    }

    /// Hard reset: remove the saved snapshot.
    pub fn clear(&mut self) {
        match self.store.remove(&self.key) {
            Ok(()) => log::info!("save data wiped"),
            Err(e) => log::error!("failed to wipe save data: {}", e),
        }
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").field("key", &self.key).finish()
    }
}
