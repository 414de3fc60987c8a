use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod annotation;
pub mod config;
pub mod error;
pub mod history;
pub mod pages;
pub mod persist;
pub mod preferences;
pub mod recent;
pub mod search;
pub mod session;
pub mod store;
pub mod transfer;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationPatch, Bookmark, NewAnnotation,
    NormalizedPoint, NormalizedRect, StampKind,
};
pub use config::SessionConfig;
pub use error::SessionError;
pub use history::AnnotationHistory;
pub use pages::{PageLayout, PagePlacement, Rotation};
pub use persist::{FileStateStore, MemoryStateStore, PersistedSession, StateStore};
pub use preferences::{
    FitMode, ScrollSettings, Theme, ViewMode, ViewerPreferences, WatermarkSettings,
};
pub use recent::{RecentFile, RecentFiles};
pub use search::{SearchResult, SearchState};
pub use session::{DocumentSession, ViewState};
pub use store::{Command, SessionEvent, SessionStore};
pub use transfer::AnnotationExport;

pub type DocumentId = String;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0c9a52-6d1e-5b7a-9c44-1e2b8d7f6a10").expect("valid namespace UUID")
});

/// Stable session id for a file, derived from its canonical path.
pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&*DOCUMENT_NAMESPACE, rendered.as_bytes()).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Vec<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineItem {
    pub title: String,
    /// Original page number the entry points at.
    pub page_number: u32,
    #[serde(default)]
    pub children: Vec<OutlineItem>,
}

/// What the engine needs to know about a file it did not parse itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub url: String,
    pub page_count: u32,
    pub size: Option<u64>,
    pub metadata: DocumentMetadata,
    pub outline: Vec<OutlineItem>,
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<DocumentInfo>;
}

/// Draws or exports a single page. Only ever handed original page numbers and
/// the rotation already composed from the global and per-page values.
pub trait PageRenderer {
    type Output;

    fn render_page(&mut self, original_page: u32, rotation: Rotation) -> Result<Self::Output>;
}
