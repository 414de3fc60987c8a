//! What of the session store survives a restart, and where it is kept.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::preferences::ViewerPreferences;
use crate::recent::RecentFile;
use crate::session::DocumentSession;
use crate::DocumentId;

pub const SESSION_SCHEMA_VERSION: u32 = 1;
pub const STORAGE_KEY: &str = "readium-session";

/// The allow-listed subset of the session store. Missing keys deserialize to
/// the compiled-in defaults, so loading merges persisted values over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedSession {
    pub version: u32,
    pub recent_files: Vec<RecentFile>,
    pub preferences: ViewerPreferences,
    pub zoom: f32,
    pub documents: BTreeMap<DocumentId, DocumentSession>,
    pub active_document_id: Option<DocumentId>,
    pub session_order: Vec<DocumentId>,
}

impl Default for PersistedSession {
    fn default() -> Self {
        Self {
            version: SESSION_SCHEMA_VERSION,
            recent_files: Vec::new(),
            preferences: ViewerPreferences::default(),
            zoom: 1.0,
            documents: BTreeMap::new(),
            active_document_id: None,
            session_order: Vec::new(),
        }
    }
}

pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSession>>;
    fn save(&self, state: &PersistedSession) -> Result<()>;
}

pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self { root })
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(format!("{STORAGE_KEY}.json"))
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let mut file =
            File::open(&path).with_context(|| format!("failed to open state file {:?}", path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let state: PersistedSession = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode state file {:?}", path))?;
        if state.version > SESSION_SCHEMA_VERSION {
            warn!(
                version = state.version,
                supported = SESSION_SCHEMA_VERSION,
                "state file written by a newer version, loading best effort"
            );
        }
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedSession) -> Result<()> {
        let path = self.state_path();
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(state)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp state file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Option<PersistedSession>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, state: &PersistedSession) -> Result<()> {
        *self.inner.lock() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trips_blob() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state")).unwrap();
        assert!(store.load().unwrap().is_none());

        let mut state = PersistedSession::default();
        state.zoom = 1.5;
        state.preferences.dark_mode = true;
        state
            .documents
            .insert("doc-a".to_string(), DocumentSession::default());
        state.active_document_id = Some("doc-a".to_string());
        store.save(&state).unwrap();

        let restored = store.load().unwrap().unwrap();
        assert_eq!(restored, state);
        assert!(store.state_path().ends_with("readium-session.json"));
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).unwrap();
        fs::write(store.state_path(), r#"{"zoom":2.0,"preferences":{"darkMode":true}}"#).unwrap();
        let restored = store.load().unwrap().unwrap();
        assert_eq!(restored.zoom, 2.0);
        assert!(restored.preferences.dark_mode);
        assert_eq!(restored.preferences.sidebar_width, 280);
        assert_eq!(restored.version, SESSION_SCHEMA_VERSION);
        assert!(restored.documents.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).unwrap();
        fs::write(store.state_path(), "{").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemoryStateStore::new();
        assert!(store.load().unwrap().is_none());
        let state = PersistedSession {
            zoom: 3.0,
            ..Default::default()
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap().unwrap().zoom, 3.0);
    }
}
