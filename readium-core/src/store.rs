use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::annotation::{AnnotationPatch, NewAnnotation, NormalizedRect, StampKind};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::pages::Rotation;
use crate::persist::{PersistedSession, StateStore, SESSION_SCHEMA_VERSION};
use crate::preferences::{FitMode, ScrollSettings, Theme, ViewMode, WatermarkSettings};
use crate::recent::{RecentFile, RecentFiles};
use crate::search::SearchResult;
use crate::session::DocumentSession;
use crate::{DocumentId, DocumentProvider};

/// Every mutation the UI can request. Deserializable so a sequence of edits
/// can be replayed from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    OpenSession { id: DocumentId },
    CloseSession { id: DocumentId },
    ResetPdf,
    SetNumPages { num_pages: u32 },
    SetCurrentPage { page: u32 },
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    SetZoom { zoom: f32 },
    ZoomIn,
    ZoomOut,
    ResetZoom,
    SetRotation { rotation: Rotation },
    RotateClockwise,
    RotateCounterClockwise,
    SetViewMode { mode: ViewMode },
    SetFitMode { mode: FitMode },
    ToggleThumbnails,
    ToggleOutline,
    ToggleAnnotations,
    SetPresentationMode { enabled: bool },
    ToggleDarkMode,
    SetTheme { theme: Theme },
    SetReadingProgress { progress: f32 },
    InitializePageOrder { num_pages: u32 },
    ReorderPages { order: Vec<u32> },
    RemovePage { index: usize },
    RotatePage { page: u32 },
    AddAnnotation { annotation: NewAnnotation },
    AddStampAnnotation {
        stamp: StampKind,
        page_number: u32,
        position: NormalizedRect,
    },
    AddImageAnnotation {
        page_number: u32,
        image_data: String,
        position: NormalizedRect,
    },
    RemoveAnnotation { id: String },
    UpdateAnnotation { id: String, patch: AnnotationPatch },
    UndoAnnotation,
    RedoAnnotation,
    ImportAnnotations { json: String },
    AddBookmark { page_number: u32, title: String },
    RemoveBookmark { id: String },
    RenameBookmark { id: String, title: String },
    GoToBookmark { id: String },
    SetSearchQuery { query: String },
    SetSearchResults { results: Vec<SearchResult> },
    SetCaseSensitive { case_sensitive: bool },
    SetSearching { searching: bool },
    ClearSearch,
    NextSearchResult,
    PreviousSearchResult,
    GoToSearchResult { index: usize },
    SetAnnotationColor { color: String },
    SetStrokeWidth { width: f32 },
    SetWatermark { watermark: WatermarkSettings },
    SetScrollSettings { scroll: ScrollSettings },
    SetSidebarWidth { width: u32 },
    SetZoomStep { step: f32 },
    AddRecentFile { file: RecentFile },
    RemoveRecentFile { url: String },
    ClearRecentFiles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    DocumentOpened(DocumentId),
    DocumentClosed(DocumentId),
    ActiveDocumentChanged(Option<DocumentId>),
    RedrawNeeded(Option<DocumentId>),
    AnnotationsChanged(Option<DocumentId>),
    PageOrderChanged(Option<DocumentId>),
}

enum Effect {
    Unchanged,
    Changed,
    Redraw,
    Annotations,
    PageOrder,
}

impl Effect {
    fn redraw_if(changed: bool) -> Self {
        if changed {
            Effect::Redraw
        } else {
            Effect::Unchanged
        }
    }

    fn annotations_if(changed: bool) -> Self {
        if changed {
            Effect::Annotations
        } else {
            Effect::Unchanged
        }
    }
}

/// Owns every open document session. Exactly one session is live and
/// mutable; the rest are detached snapshots until reactivated.
pub struct SessionStore {
    config: SessionConfig,
    active: Option<DocumentId>,
    live: DocumentSession,
    /// Snapshots of the inactive sessions. The active session is never in here.
    documents: HashMap<DocumentId, DocumentSession>,
    /// Open sessions, most recently active first.
    session_order: Vec<DocumentId>,
    recent_files: RecentFiles,
    store: Arc<dyn StateStore>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl SessionStore {
    pub fn new(config: SessionConfig, store: Arc<dyn StateStore>) -> Self {
        let mut live = DocumentSession::default();
        live.set_history_limit(config.history_limit);
        Self {
            active: None,
            live,
            documents: HashMap::new(),
            session_order: Vec::new(),
            recent_files: RecentFiles::with_capacity(config.recent_files_limit),
            config,
            store,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Builds a store and merges whatever `store` has persisted over the
    /// defaults. Unreadable state is logged and discarded.
    pub fn restore(config: SessionConfig, store: Arc<dyn StateStore>) -> Self {
        let mut session = Self::new(config, store);
        match session.store.load() {
            Ok(Some(persisted)) => session.merge_persisted(persisted),
            Ok(None) => debug!("no persisted session state"),
            Err(err) => warn!(error = %err, "discarding unreadable session state"),
        }
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<Mutex<Vec<SessionEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn active_document_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The live session.
    pub fn document(&self) -> &DocumentSession {
        &self.live
    }

    pub fn document_mut(&mut self) -> &mut DocumentSession {
        &mut self.live
    }

    /// Live state for the active id, the stored snapshot for any other.
    pub fn session(&self, id: &str) -> Option<&DocumentSession> {
        if self.active.as_deref() == Some(id) {
            Some(&self.live)
        } else {
            self.documents.get(id)
        }
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.session(id).is_some()
    }

    /// Open session ids, most recently active first.
    pub fn open_documents(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self
            .session_order
            .iter()
            .filter(|id| self.is_open(id))
            .cloned()
            .collect();
        let mut stragglers: Vec<DocumentId> = self
            .documents
            .keys()
            .filter(|id| !ids.contains(id))
            .cloned()
            .collect();
        stragglers.sort();
        ids.extend(stragglers);
        ids
    }

    pub fn recent_files(&self) -> &RecentFiles {
        &self.recent_files
    }

    pub fn recent_files_mut(&mut self) -> &mut RecentFiles {
        &mut self.recent_files
    }

    fn emit(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }

    fn touch(&mut self, id: &str) {
        self.session_order.retain(|existing| existing != id);
        self.session_order.insert(0, id.to_string());
    }

    /// Makes `id` the live session, snapshotting the outgoing one first.
    /// A never-seen id starts blank but inherits the outgoing viewer preferences.
    #[instrument(skip(self))]
    pub fn open_session(&mut self, id: &str) {
        if self.active.as_deref() == Some(id) {
            return;
        }
        let preferences = self.live.preferences.clone();
        if let Some(current) = self.active.take() {
            let snapshot = std::mem::take(&mut self.live);
            self.documents.insert(current, snapshot);
        }

        let resumed = self.documents.remove(id);
        let is_new = resumed.is_none();
        self.live = resumed.unwrap_or_else(|| {
            let mut fresh = DocumentSession::with_preferences(preferences);
            fresh.set_history_limit(self.config.history_limit);
            fresh
        });
        self.active = Some(id.to_string());
        self.touch(id);

        if is_new {
            self.emit(SessionEvent::DocumentOpened(id.to_string()));
        }
        self.emit(SessionEvent::ActiveDocumentChanged(Some(id.to_string())));
        debug!(resumed = !is_new, "activated document session");
    }

    /// Activates a session that is already open. Unknown ids are an error
    /// rather than a fresh session.
    pub fn switch_session(&mut self, id: &str) -> Result<(), SessionError> {
        if !self.is_open(id) {
            return Err(SessionError::UnknownDocument(id.to_string()));
        }
        self.open_session(id);
        self.autosave();
        Ok(())
    }

    /// Drops the session for `id`. Closing the active session activates the
    /// most recently used remaining one, or clears the live state when none
    /// remain. Unknown ids are ignored.
    #[instrument(skip(self))]
    pub fn close_session(&mut self, id: &str) {
        if self.active.as_deref() != Some(id) {
            if self.documents.remove(id).is_some() {
                self.session_order.retain(|existing| existing != id);
                self.emit(SessionEvent::DocumentClosed(id.to_string()));
                debug!("closed inactive document session");
            }
            return;
        }

        self.session_order.retain(|existing| existing != id);
        self.active = None;
        self.emit(SessionEvent::DocumentClosed(id.to_string()));

        let next = self
            .session_order
            .iter()
            .find(|candidate| self.documents.contains_key(*candidate))
            .cloned()
            .or_else(|| self.documents.keys().min().cloned());
        match next.and_then(|next| self.documents.remove(&next).map(|doc| (next, doc))) {
            Some((next, doc)) => {
                self.live = doc;
                self.active = Some(next.clone());
                self.touch(&next);
                debug!(next = %next, "restored next document session");
                self.emit(SessionEvent::ActiveDocumentChanged(Some(next)));
            }
            None => {
                self.live.reset();
                debug!("closed last document session");
                self.emit(SessionEvent::ActiveDocumentChanged(None));
            }
        }
    }

    /// Clears the live view, annotation and search state. Stored snapshots
    /// and recent files are left alone.
    pub fn reset_pdf(&mut self) {
        self.live.reset();
        self.emit(SessionEvent::RedrawNeeded(self.active.clone()));
    }

    /// Opens `path` through `provider`, activates its session and records
    /// the file as recently opened.
    #[instrument(skip(self, provider))]
    pub async fn open_with<P: DocumentProvider>(
        &mut self,
        provider: &P,
        path: PathBuf,
    ) -> Result<()> {
        let info = provider.open(&path).await?;
        self.open_session(&info.id);
        self.live.load_document(&info);

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| info.url.clone());
        let mut recent = RecentFile::new(info.url.clone(), name);
        recent.num_pages = Some(info.page_count);
        recent.size = info.size;
        self.recent_files.add(recent);
        self.emit(SessionEvent::RedrawNeeded(Some(info.id.clone())));
        self.autosave();
        Ok(())
    }

    /// Runs one command against the store. Rejected input is logged and
    /// leaves state untouched. Returns whether anything changed.
    pub fn apply(&mut self, command: Command) -> bool {
        let effect = self.dispatch(command);
        let active = self.active.clone();
        let changed = match effect {
            Effect::Unchanged => false,
            Effect::Changed => true,
            Effect::Redraw => {
                self.emit(SessionEvent::RedrawNeeded(active));
                true
            }
            Effect::Annotations => {
                self.emit(SessionEvent::AnnotationsChanged(active));
                true
            }
            Effect::PageOrder => {
                self.emit(SessionEvent::PageOrderChanged(active));
                true
            }
        };
        if changed {
            self.autosave();
        }
        changed
    }

    fn dispatch(&mut self, command: Command) -> Effect {
        let doc = &mut self.live;
        match command {
            Command::OpenSession { id } => {
                self.open_session(&id);
                Effect::Changed
            }
            Command::CloseSession { id } => {
                let was_open = self.is_open(&id);
                self.close_session(&id);
                if was_open {
                    Effect::Changed
                } else {
                    Effect::Unchanged
                }
            }
            Command::ResetPdf => {
                self.reset_pdf();
                Effect::Changed
            }
            Command::SetNumPages { num_pages } => {
                doc.set_num_pages(num_pages);
                Effect::Redraw
            }
            Command::SetCurrentPage { page } => Effect::redraw_if(doc.set_current_page(page)),
            Command::NextPage => Effect::redraw_if(doc.next_page()),
            Command::PreviousPage => Effect::redraw_if(doc.previous_page()),
            Command::FirstPage => Effect::redraw_if(doc.first_page()),
            Command::LastPage => Effect::redraw_if(doc.last_page()),
            Command::SetZoom { zoom } => {
                doc.set_zoom(zoom);
                Effect::Redraw
            }
            Command::ZoomIn => {
                doc.zoom_in();
                Effect::Redraw
            }
            Command::ZoomOut => {
                doc.zoom_out();
                Effect::Redraw
            }
            Command::ResetZoom => {
                doc.reset_zoom();
                Effect::Redraw
            }
            Command::SetRotation { rotation } => {
                doc.set_rotation(rotation);
                Effect::Redraw
            }
            Command::RotateClockwise => {
                doc.rotate_clockwise();
                Effect::Redraw
            }
            Command::RotateCounterClockwise => {
                doc.rotate_counter_clockwise();
                Effect::Redraw
            }
            Command::SetViewMode { mode } => {
                doc.set_view_mode(mode);
                Effect::Redraw
            }
            Command::SetFitMode { mode } => {
                doc.set_fit_mode(mode);
                Effect::Redraw
            }
            Command::ToggleThumbnails => {
                doc.toggle_thumbnails();
                Effect::Redraw
            }
            Command::ToggleOutline => {
                doc.toggle_outline();
                Effect::Redraw
            }
            Command::ToggleAnnotations => {
                doc.toggle_annotations();
                Effect::Redraw
            }
            Command::SetPresentationMode { enabled } => {
                doc.set_presentation_mode(enabled);
                Effect::Redraw
            }
            Command::ToggleDarkMode => {
                doc.toggle_dark_mode();
                Effect::Redraw
            }
            Command::SetTheme { theme } => {
                doc.set_theme(theme);
                Effect::Redraw
            }
            Command::SetReadingProgress { progress } => {
                doc.set_reading_progress(progress);
                Effect::Changed
            }
            Command::InitializePageOrder { num_pages } => {
                if doc.initialize_page_order(num_pages) {
                    Effect::PageOrder
                } else {
                    Effect::Unchanged
                }
            }
            Command::ReorderPages { order } => match doc.reorder_pages(order) {
                Ok(()) => Effect::PageOrder,
                Err(err) => {
                    warn!(error = %err, "rejected page reorder");
                    Effect::Unchanged
                }
            },
            Command::RemovePage { index } => match doc.remove_page(index) {
                Ok(_) => Effect::PageOrder,
                Err(err) => {
                    warn!(error = %err, "rejected page removal");
                    Effect::Unchanged
                }
            },
            Command::RotatePage { page } => {
                doc.rotate_page(page);
                Effect::Redraw
            }
            Command::AddAnnotation { annotation } => {
                doc.add_annotation(annotation);
                Effect::Annotations
            }
            Command::AddStampAnnotation {
                stamp,
                page_number,
                position,
            } => {
                doc.add_stamp_annotation(stamp, page_number, position);
                Effect::Annotations
            }
            Command::AddImageAnnotation {
                page_number,
                image_data,
                position,
            } => {
                doc.add_image_annotation(page_number, image_data, position);
                Effect::Annotations
            }
            Command::RemoveAnnotation { id } => Effect::annotations_if(doc.remove_annotation(&id)),
            Command::UpdateAnnotation { id, patch } => {
                Effect::annotations_if(doc.update_annotation(&id, &patch))
            }
            Command::UndoAnnotation => Effect::annotations_if(doc.undo_annotation()),
            Command::RedoAnnotation => Effect::annotations_if(doc.redo_annotation()),
            Command::ImportAnnotations { json } => {
                Effect::annotations_if(doc.import_annotations(&json).is_ok())
            }
            Command::AddBookmark { page_number, title } => {
                doc.add_bookmark(page_number, title);
                Effect::Changed
            }
            Command::RemoveBookmark { id } => {
                if doc.remove_bookmark(&id) {
                    Effect::Changed
                } else {
                    Effect::Unchanged
                }
            }
            Command::RenameBookmark { id, title } => {
                if doc.rename_bookmark(&id, title) {
                    Effect::Changed
                } else {
                    Effect::Unchanged
                }
            }
            Command::GoToBookmark { id } => Effect::redraw_if(doc.go_to_bookmark(&id)),
            Command::SetSearchQuery { query } => {
                doc.set_search_query(query);
                Effect::Changed
            }
            Command::SetSearchResults { results } => {
                doc.set_search_results(results);
                Effect::Redraw
            }
            Command::SetCaseSensitive { case_sensitive } => {
                doc.set_case_sensitive(case_sensitive);
                Effect::Changed
            }
            Command::SetSearching { searching } => {
                doc.set_searching(searching);
                Effect::Changed
            }
            Command::ClearSearch => {
                doc.clear_search();
                Effect::Redraw
            }
            Command::NextSearchResult => Effect::redraw_if(doc.next_search_result().is_some()),
            Command::PreviousSearchResult => {
                Effect::redraw_if(doc.previous_search_result().is_some())
            }
            Command::GoToSearchResult { index } => {
                Effect::redraw_if(doc.go_to_search_result(index).is_some())
            }
            Command::SetAnnotationColor { color } => {
                doc.preferences.annotation_color = color;
                Effect::Changed
            }
            Command::SetStrokeWidth { width } => {
                doc.preferences.set_stroke_width(width);
                Effect::Changed
            }
            Command::SetWatermark { watermark } => {
                doc.preferences.watermark = watermark;
                let opacity = doc.preferences.watermark.opacity;
                doc.preferences.set_watermark_opacity(opacity);
                Effect::Redraw
            }
            Command::SetScrollSettings { scroll } => {
                doc.preferences.scroll = scroll;
                Effect::Changed
            }
            Command::SetSidebarWidth { width } => {
                doc.preferences.set_sidebar_width(width);
                Effect::Redraw
            }
            Command::SetZoomStep { step } => {
                if step.is_finite() && step > 0.0 {
                    doc.preferences.zoom_step = step;
                    Effect::Changed
                } else {
                    Effect::Unchanged
                }
            }
            Command::AddRecentFile { file } => {
                self.recent_files.add(file);
                Effect::Changed
            }
            Command::RemoveRecentFile { url } => {
                if self.recent_files.remove(&url) {
                    Effect::Changed
                } else {
                    Effect::Unchanged
                }
            }
            Command::ClearRecentFiles => {
                self.recent_files.clear();
                Effect::Changed
            }
        }
    }

    /// The allow-listed view of this store that is written to storage.
    /// Search scans in flight are not part of it.
    pub fn to_persisted(&self) -> PersistedSession {
        let mut documents: BTreeMap<DocumentId, DocumentSession> = self
            .documents
            .iter()
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();
        if let Some(id) = &self.active {
            documents.insert(id.clone(), self.live.clone());
        }
        for doc in documents.values_mut() {
            doc.search.is_searching = false;
        }
        PersistedSession {
            version: SESSION_SCHEMA_VERSION,
            recent_files: self.recent_files.files().to_vec(),
            preferences: self.live.preferences.clone(),
            zoom: self.live.view().zoom,
            documents,
            active_document_id: self.active.clone(),
            session_order: self.session_order.clone(),
        }
    }

    fn merge_persisted(&mut self, persisted: PersistedSession) {
        let limit = self.config.history_limit;
        self.recent_files =
            RecentFiles::from_files(persisted.recent_files, self.config.recent_files_limit);
        self.documents = persisted
            .documents
            .into_iter()
            .map(|(id, mut doc)| {
                doc.set_history_limit(limit);
                (id, doc)
            })
            .collect();
        self.session_order = persisted
            .session_order
            .into_iter()
            .filter(|id| self.documents.contains_key(id))
            .collect();

        let resumed = persisted
            .active_document_id
            .and_then(|id| self.documents.remove(&id).map(|doc| (id, doc)));
        match resumed {
            Some((id, doc)) => {
                self.live = doc;
                self.active = Some(id);
            }
            None => {
                let mut live = DocumentSession::with_preferences(persisted.preferences);
                live.set_history_limit(limit);
                live.restore_zoom(persisted.zoom);
                self.live = live;
                self.active = None;
            }
        }
        debug!(
            documents = self.documents.len() + usize::from(self.active.is_some()),
            active = ?self.active,
            "restored session state"
        );
    }

    pub fn persist(&self) -> Result<()> {
        self.store.save(&self.to_persisted())
    }

    fn autosave(&self) {
        if !self.config.autosave {
            return;
        }
        if let Err(err) = self.persist() {
            warn!(error = %err, "failed to persist session state");
        }
    }
}
