use crate::semantic::{NoteSearchRecord, PendingEmbedding};
use crate::storage::{BackendLocal, StorageManager};
use anyhow::{anyhow, Context};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::{Instant, SystemTime},
};

/// Where notes live. Search reads them; the only write is the embedding
/// upsert proposed by a search call.
pub trait NoteStore: Send + Sync {
    /// All notes, or only those in `folder_id` when given.
    fn list(&self, folder_id: Option<&str>) -> anyhow::Result<Vec<NoteSearchRecord>>;

    /// Keyed upsert of the vector and its generation time. Other fields are
    /// left untouched. Returns how many notes were updated.
    fn save_embeddings(&self, pending: &[PendingEmbedding]) -> anyhow::Result<usize>;
}

/// Identifies one version of the notes file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug, Default)]
struct Snapshot {
    notes: Vec<NoteSearchRecord>,
    stamp: Option<FileStamp>,
}

/// Notes kept in a single JSON file owned by another application.
///
/// The file is re-read whenever it changed on disk, and every embedding
/// upsert is applied to the current file contents, so concurrent edits
/// made by the owner are never overwritten.
#[derive(Debug, Clone)]
pub struct BackendJson {
    cache: Arc<RwLock<Snapshot>>,
    store: BackendLocal,
    ident: String,
    path: PathBuf,
}

impl BackendJson {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let path = Path::new(path);
        let dir = path
            .parent()
            .and_then(|p| p.to_str())
            .filter(|p| !p.is_empty())
            .unwrap_or(".");
        let ident = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("invalid notes path: {}", path.display()))?
            .to_string();

        let store = BackendLocal::new(dir)?;

        if !store.exists(&ident) {
            log::info!("Creating new notes file at {}", path.display());
            store.write(&ident, b"[]")?;
        }

        let backend = BackendJson {
            cache: Arc::new(RwLock::new(Snapshot::default())),
            store,
            ident,
            path: path.to_path_buf(),
        };

        let snapshot = backend.read_file()?;
        *backend
            .cache
            .write()
            .map_err(|e| anyhow!("notes lock poisoned: {e}"))? = snapshot;

        Ok(backend)
    }

    fn stamp(&self) -> anyhow::Result<FileStamp> {
        let meta = self
            .store
            .metadata(&self.ident)
            .with_context(|| format!("failed to stat {}", self.path.display()))?;

        Ok(FileStamp {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }

    fn read_file(&self) -> anyhow::Result<Snapshot> {
        let now = Instant::now();
        let stamp = self.stamp()?;
        let data = self.store.read(&self.ident)?;
        let notes: Vec<NoteSearchRecord> = serde_json::from_slice(&data)
            .with_context(|| format!("notes file {} is malformed", self.path.display()))?;

        log::debug!(
            "took {}ms to read {} notes",
            now.elapsed().as_micros() as f64 / 1000.0,
            notes.len()
        );

        Ok(Snapshot {
            notes,
            stamp: Some(stamp),
        })
    }

    /// Reload the cached notes if the file changed since the last read.
    fn lazy_refresh(&self) -> anyhow::Result<()> {
        let stamp = self.stamp()?;

        let mut cache = self
            .cache
            .write()
            .map_err(|e| anyhow!("notes lock poisoned: {e}"))?;

        if cache.stamp != Some(stamp) {
            log::info!("notes file changed on disk, reloading");
            *cache = self.read_file()?;
        }

        Ok(())
    }
}

impl NoteStore for BackendJson {
    fn list(&self, folder_id: Option<&str>) -> anyhow::Result<Vec<NoteSearchRecord>> {
        self.lazy_refresh()?;

        let cache = self
            .cache
            .read()
            .map_err(|e| anyhow!("notes lock poisoned: {e}"))?;

        Ok(cache
            .notes
            .iter()
            .filter(|note| folder_id.map_or(true, |id| note.folder_id.as_deref() == Some(id)))
            .cloned()
            .collect())
    }

    fn save_embeddings(&self, pending: &[PendingEmbedding]) -> anyhow::Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }

        let mut cache = self
            .cache
            .write()
            .map_err(|e| anyhow!("notes lock poisoned: {e}"))?;

        // upsert into what is on disk now, not into the cached copy
        let mut snapshot = self.read_file()?;

        let mut updated = 0;
        for entry in pending {
            match snapshot.notes.iter_mut().find(|note| note.id == entry.id) {
                Some(note) => {
                    note.embedding = Some(entry.embedding.clone());
                    note.embedding_generated_at = Some(entry.embedding_generated_at);
                    updated += 1;
                }
                None => log::warn!("note {} no longer exists, dropping its embedding", entry.id),
            }
        }

        if updated > 0 {
            let data = serde_json::to_vec_pretty(&snapshot.notes)?;
            self.store.write(&self.ident, &data)?;
            snapshot.stamp = Some(self.stamp()?);
        }

        *cache = snapshot;

        log::debug!("persisted {updated} of {} embeddings", pending.len());

        Ok(updated)
    }
}
