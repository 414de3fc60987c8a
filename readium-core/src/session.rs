use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::{
    image_annotation, new_id, Annotation, AnnotationId, AnnotationPatch, Bookmark, BookmarkId,
    NewAnnotation, NormalizedRect, StampKind,
};
use crate::error::SessionError;
use crate::history::{AnnotationHistory, DEFAULT_HISTORY_LIMIT};
use crate::pages::{PageLayout, PagePlacement, Rotation};
use crate::preferences::{FitMode, Theme, ViewMode, ViewerPreferences};
use crate::search::{visual_page_for_hit, SearchResult, SearchState};
use crate::{DocumentInfo, DocumentMetadata, OutlineItem, PageRenderer};

pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewState {
    pub num_pages: u32,
    /// Visual page number, 1-based.
    pub current_page: u32,
    pub zoom: f32,
    pub rotation: Rotation,
    pub is_presentation_mode: bool,
    pub reading_progress: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            num_pages: 0,
            current_page: 1,
            zoom: 1.0,
            rotation: Rotation::Deg0,
            is_presentation_mode: false,
            reading_progress: 0.0,
        }
    }
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Complete state of one open document. The active document's copy is live;
/// every other open document is held as a detached snapshot of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentSession {
    view: ViewState,
    pub preferences: ViewerPreferences,
    pub outline: Vec<OutlineItem>,
    pub metadata: DocumentMetadata,
    pub search: SearchState,
    history: AnnotationHistory,
    bookmarks: Vec<Bookmark>,
    layout: PageLayout,
    pub source_url: Option<String>,
    #[serde(skip, default = "default_history_limit")]
    history_limit: usize,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::with_preferences(ViewerPreferences::default())
    }
}

impl DocumentSession {
    /// A blank session that keeps the given viewer preferences.
    pub fn with_preferences(preferences: ViewerPreferences) -> Self {
        Self {
            view: ViewState::default(),
            preferences,
            outline: Vec::new(),
            metadata: DocumentMetadata::default(),
            search: SearchState::default(),
            history: AnnotationHistory::default(),
            bookmarks: Vec::new(),
            layout: PageLayout::default(),
            source_url: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn history(&self) -> &AnnotationHistory {
        &self.history
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit;
    }

    /// Clears document, annotation and search state; preferences survive.
    pub fn reset(&mut self) {
        let preferences = std::mem::take(&mut self.preferences);
        let limit = self.history_limit;
        *self = Self::with_preferences(preferences);
        self.history_limit = limit;
    }

    pub fn load_document(&mut self, info: &DocumentInfo) {
        self.source_url = Some(info.url.clone());
        self.metadata = info.metadata.clone();
        self.outline = info.outline.clone();
        self.set_num_pages(info.page_count);
        self.initialize_page_order(info.page_count);
    }

    pub fn set_num_pages(&mut self, num_pages: u32) {
        self.view.num_pages = num_pages;
        self.clamp_current_page();
    }

    fn clamp_current_page(&mut self) {
        let max = self.page_count().max(1);
        if self.view.current_page > max {
            self.view.current_page = max;
        }
        self.update_reading_progress();
    }

    // Navigation. Page numbers here are visual.

    /// Number of pages navigation is bounded by.
    pub fn page_count(&self) -> u32 {
        self.layout.page_count(self.view.num_pages)
    }

    pub fn current_page(&self) -> u32 {
        self.view.current_page
    }

    /// Moves to `page`; out-of-range input is ignored.
    pub fn set_current_page(&mut self, page: u32) -> bool {
        if page < 1 || page > self.page_count() {
            debug!(page, max = self.page_count(), "ignoring out-of-range page");
            return false;
        }
        if page == self.view.current_page {
            return false;
        }
        self.view.current_page = page;
        self.update_reading_progress();
        true
    }

    pub fn go_to_page(&mut self, page: u32) -> bool {
        self.set_current_page(page)
    }

    pub fn next_page(&mut self) -> bool {
        self.set_current_page(self.view.current_page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> bool {
        self.set_current_page(self.view.current_page.saturating_sub(1))
    }

    pub fn first_page(&mut self) -> bool {
        self.set_current_page(1)
    }

    pub fn last_page(&mut self) -> bool {
        self.set_current_page(self.page_count())
    }

    pub fn set_reading_progress(&mut self, progress: f32) {
        if progress.is_finite() {
            self.view.reading_progress = progress.clamp(0.0, 100.0);
        }
    }

    fn update_reading_progress(&mut self) {
        let total = self.page_count();
        if total > 0 {
            self.set_reading_progress(self.view.current_page as f32 / total as f32 * 100.0);
        }
    }

    // View.

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.view.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
            self.preferences.fit_mode = FitMode::Custom;
        }
    }

    /// Sets zoom without leaving the current fit mode.
    pub(crate) fn restore_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.view.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.view.zoom + self.preferences.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.view.zoom - self.preferences.zoom_step);
    }

    pub fn reset_zoom(&mut self) {
        self.set_zoom(1.0);
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.view.rotation = rotation;
    }

    pub fn rotate_clockwise(&mut self) {
        self.view.rotation = self.view.rotation.clockwise();
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.view.rotation = self.view.rotation.counter_clockwise();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.preferences.view_mode = mode;
    }

    pub fn set_fit_mode(&mut self, mode: FitMode) {
        self.preferences.fit_mode = mode;
    }

    pub fn toggle_thumbnails(&mut self) {
        self.preferences.show_thumbnails = !self.preferences.show_thumbnails;
    }

    pub fn toggle_outline(&mut self) {
        self.preferences.show_outline = !self.preferences.show_outline;
    }

    pub fn toggle_annotations(&mut self) {
        self.preferences.show_annotations = !self.preferences.show_annotations;
    }

    pub fn set_presentation_mode(&mut self, enabled: bool) {
        self.view.is_presentation_mode = enabled;
    }

    pub fn toggle_dark_mode(&mut self) {
        self.preferences.dark_mode = !self.preferences.dark_mode;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.preferences.theme = theme;
        if theme != Theme::Auto {
            self.preferences.dark_mode = theme == Theme::Dark;
        }
    }

    // Page virtualization.

    /// Builds the identity page order. The length is capped at the document's
    /// page count once that is known.
    pub fn initialize_page_order(&mut self, num_pages: u32) -> bool {
        let num_pages = match self.view.num_pages {
            0 => num_pages,
            known => num_pages.min(known),
        };
        let changed = self.layout.initialize(num_pages);
        if changed {
            self.clamp_current_page();
        }
        changed
    }

    pub fn reorder_pages(&mut self, new_order: Vec<u32>) -> Result<(), SessionError> {
        self.layout.reorder(new_order)
    }

    /// Removes the page in visual slot `visual_index` (0-based) and keeps the
    /// current page pointed at a neighbouring page.
    pub fn remove_page(&mut self, visual_index: usize) -> Result<u32, SessionError> {
        let removed = self.layout.remove(visual_index)?;
        let new_len = self.layout.order().len() as u32;
        let removed_page = visual_index as u32 + 1;
        let current = self.view.current_page;
        self.view.current_page = if current > new_len {
            new_len
        } else if current > removed_page {
            current - 1
        } else if current == removed_page {
            current.min(new_len)
        } else {
            current
        };
        self.update_reading_progress();
        debug!(removed, visual_index, current = self.view.current_page, "removed page");
        Ok(removed)
    }

    pub fn rotate_page(&mut self, original_page: u32) -> Rotation {
        self.layout.rotate(original_page)
    }

    pub fn page_order(&self) -> &[u32] {
        self.layout.order()
    }

    pub fn placements(&self) -> Vec<PagePlacement> {
        self.layout.placements(self.view.num_pages, self.view.rotation)
    }

    /// Feeds every visible page, in visual order, to `renderer`.
    pub fn render_with<R: PageRenderer>(&self, renderer: &mut R) -> Result<Vec<R::Output>> {
        self.placements()
            .into_iter()
            .map(|placement| renderer.render_page(placement.original_page, placement.rotation))
            .collect()
    }

    // Annotations.

    pub fn annotations(&self) -> &[Annotation] {
        self.history.present()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub(crate) fn commit_annotations(&mut self, next: Vec<Annotation>) {
        self.history.commit(next, self.history_limit);
    }

    pub fn add_annotation(&mut self, annotation: NewAnnotation) -> AnnotationId {
        let annotation = annotation.into_annotation();
        let id = annotation.id.clone();
        let mut next = self.annotations().to_vec();
        next.push(annotation);
        self.commit_annotations(next);
        id
    }

    pub fn add_stamp_annotation(
        &mut self,
        stamp: StampKind,
        page_number: u32,
        position: NormalizedRect,
    ) -> AnnotationId {
        self.add_annotation(stamp.annotation(page_number, position))
    }

    pub fn add_image_annotation(
        &mut self,
        page_number: u32,
        image_data: String,
        position: NormalizedRect,
    ) -> AnnotationId {
        self.add_annotation(image_annotation(page_number, image_data, position))
    }

    /// Returns false, without touching history, when `id` is unknown.
    pub fn remove_annotation(&mut self, id: &str) -> bool {
        if !self.annotations().iter().any(|a| a.id == id) {
            return false;
        }
        let next = self
            .annotations()
            .iter()
            .filter(|a| a.id != id)
            .cloned()
            .collect();
        self.commit_annotations(next);
        true
    }

    pub fn update_annotation(&mut self, id: &str, patch: &AnnotationPatch) -> bool {
        if patch.is_empty() || !self.annotations().iter().any(|a| a.id == id) {
            return false;
        }
        let next = self
            .annotations()
            .iter()
            .map(|a| if a.id == id { patch.apply_to(a) } else { a.clone() })
            .collect();
        self.commit_annotations(next);
        true
    }

    pub fn undo_annotation(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo_annotation(&mut self) -> bool {
        self.history.redo()
    }

    /// Annotations grouped by the visual page they currently appear on.
    /// Annotations on removed pages are left out.
    pub fn annotations_by_visual_page(&self) -> BTreeMap<u32, Vec<&Annotation>> {
        let mut grouped: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
        for annotation in self.annotations() {
            if let Some(visual) = self.layout.visual_page(annotation.page_number) {
                grouped.entry(visual).or_default().push(annotation);
            }
        }
        grouped
    }

    // Bookmarks. Page numbers are original.

    pub fn add_bookmark(&mut self, page_number: u32, title: impl Into<String>) -> BookmarkId {
        let bookmark = Bookmark::new(page_number, title);
        let id = bookmark.id.clone();
        self.bookmarks.push(bookmark);
        id
    }

    /// Appends imported bookmarks, giving fresh ids to any that collide.
    pub(crate) fn append_bookmarks(&mut self, bookmarks: Vec<Bookmark>) {
        let mut seen: HashSet<BookmarkId> = self.bookmarks.iter().map(|b| b.id.clone()).collect();
        for mut bookmark in bookmarks {
            if !seen.insert(bookmark.id.clone()) {
                bookmark.id = new_id();
                seen.insert(bookmark.id.clone());
            }
            self.bookmarks.push(bookmark);
        }
    }

    pub fn remove_bookmark(&mut self, id: &str) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.id != id);
        self.bookmarks.len() != before
    }

    pub fn rename_bookmark(&mut self, id: &str, title: impl Into<String>) -> bool {
        match self.bookmarks.iter_mut().find(|b| b.id == id) {
            Some(bookmark) => {
                bookmark.title = title.into();
                true
            }
            None => false,
        }
    }

    pub fn go_to_bookmark(&mut self, id: &str) -> bool {
        let Some(original) = self.bookmarks.iter().find(|b| b.id == id).map(|b| b.page_number)
        else {
            return false;
        };
        match self.layout.visual_page(original) {
            Some(visual) => self.set_current_page(visual),
            None => false,
        }
    }

    // Search.

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search.query = query.into();
    }

    pub fn set_search_results(&mut self, results: Vec<SearchResult>) {
        self.search.set_results(results);
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.search.case_sensitive = case_sensitive;
    }

    pub fn set_searching(&mut self, searching: bool) {
        self.search.is_searching = searching;
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
    }

    /// Advances to the next hit and jumps to its visual page. Returns that page.
    pub fn next_search_result(&mut self) -> Option<u32> {
        let original = self.search.step(true)?.page_number;
        Some(self.jump_to_hit(original))
    }

    pub fn previous_search_result(&mut self) -> Option<u32> {
        let original = self.search.step(false)?.page_number;
        Some(self.jump_to_hit(original))
    }

    pub fn go_to_search_result(&mut self, index: usize) -> Option<u32> {
        let original = self.search.select(index)?.page_number;
        Some(self.jump_to_hit(original))
    }

    fn jump_to_hit(&mut self, original_page: u32) -> u32 {
        let visual = visual_page_for_hit(original_page, &self.layout);
        self.go_to_page(visual);
        visual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;

    fn session(pages: u32) -> DocumentSession {
        let mut session = DocumentSession::default();
        session.set_num_pages(pages);
        session.initialize_page_order(pages);
        session
    }

    fn highlight(page: u32) -> NewAnnotation {
        NewAnnotation::new(AnnotationKind::Highlight, page, "#ff0")
    }

    #[test]
    fn navigation_ignores_out_of_range_pages() {
        let mut session = session(5);
        assert!(session.set_current_page(5));
        assert!(!session.set_current_page(6));
        assert!(!session.set_current_page(0));
        assert_eq!(session.current_page(), 5);
        assert!(!session.next_page());
        assert!(session.first_page());
        assert!(!session.previous_page());
        assert!(session.last_page());
        assert_eq!(session.view().reading_progress, 100.0);
    }

    #[test]
    fn navigation_is_bounded_by_page_order_once_initialized() {
        let mut session = DocumentSession::default();
        session.set_num_pages(5);
        assert!(session.go_to_page(5));
        session.initialize_page_order(5);
        session.remove_page(0).unwrap();
        assert_eq!(session.page_count(), 4);
        assert!(!session.go_to_page(5));
    }

    #[test]
    fn reloading_with_fewer_pages_clamps_current_page() {
        let mut session = session(5);
        assert!(session.go_to_page(5));
        session.load_document(&DocumentInfo {
            id: "doc".into(),
            path: "/tmp/doc.pdf".into(),
            url: "file:///tmp/doc.pdf".into(),
            page_count: 3,
            size: None,
            metadata: DocumentMetadata::default(),
            outline: Vec::new(),
        });
        assert_eq!(session.page_order(), &[1, 2, 3]);
        assert_eq!(session.current_page(), 3);
        assert_eq!(session.view().reading_progress, 100.0);
        assert!(session.previous_page());
        assert_eq!(session.current_page(), 2);
    }

    #[test]
    fn page_order_never_exceeds_document_pages() {
        let mut session = DocumentSession::default();
        session.set_num_pages(5);
        session.initialize_page_order(20);
        assert_eq!(session.page_order(), &[1, 2, 3, 4, 5]);
        assert_eq!(session.page_count(), 5);
    }

    #[test]
    fn removing_page_adjusts_current_page() {
        let mut session = session(5);
        session.go_to_page(3);
        assert_eq!(session.remove_page(2).unwrap(), 3);
        assert_eq!(session.page_order(), &[1, 2, 4, 5]);
        assert!(session.current_page() <= 4);
        assert_eq!(session.current_page(), 3);

        session.go_to_page(4);
        session.remove_page(0).unwrap();
        assert_eq!(session.page_order(), &[2, 4, 5]);
        assert_eq!(session.current_page(), 3);

        session.remove_page(2).unwrap();
        assert_eq!(session.current_page(), 2);

        session.go_to_page(1);
        session.remove_page(1).unwrap();
        assert_eq!(session.current_page(), 1);
        assert!(matches!(session.remove_page(0), Err(SessionError::LastPage)));
    }

    #[test]
    fn page_rotation_is_independent_of_global_rotation() {
        let mut session = session(4);
        session.rotate_page(3);
        assert_eq!(session.view().rotation, Rotation::Deg0);
        session.rotate_clockwise();
        session.reorder_pages(vec![4, 3, 2, 1]).unwrap();
        assert_eq!(session.layout().rotation_of(3), Rotation::Deg90);
        let placement = session.placements()[1];
        assert_eq!(placement.original_page, 3);
        assert_eq!(placement.rotation, Rotation::Deg180);
    }

    #[test]
    fn rejected_reorder_leaves_state() {
        let mut session = session(3);
        assert!(session.reorder_pages(vec![1, 2, 2]).is_err());
        assert_eq!(session.page_order(), &[1, 2, 3]);
    }

    #[test]
    fn annotation_edits_are_undoable() {
        let mut session = session(3);
        let first = session.add_annotation(highlight(1));
        session.add_annotation(highlight(2));
        assert!(session.update_annotation(
            &first,
            &AnnotationPatch {
                color: Some("#0f0".into()),
                ..Default::default()
            }
        ));
        assert!(session.remove_annotation(&first));
        assert_eq!(session.annotations().len(), 1);

        for _ in 0..4 {
            assert!(session.undo_annotation());
        }
        assert!(session.annotations().is_empty());
        assert!(!session.can_undo());

        for _ in 0..4 {
            assert!(session.redo_annotation());
        }
        assert_eq!(session.annotations().len(), 1);
        assert_eq!(session.annotations()[0].page_number, 2);
    }

    #[test]
    fn unknown_annotation_edits_do_not_touch_history() {
        let mut session = session(1);
        session.add_annotation(highlight(1));
        session.undo_annotation();
        assert!(!session.remove_annotation("missing"));
        assert!(!session.update_annotation("missing", &AnnotationPatch::default()));
        assert!(session.can_redo());
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut session = session(2);
        let id = session.add_annotation(highlight(1));
        session.add_annotation(highlight(2));
        session.undo_annotation();
        assert!(session.can_redo());
        session.remove_annotation(&id);
        assert!(!session.can_redo());

        session.undo_annotation();
        assert!(session.can_redo());
        let patch = AnnotationPatch {
            content: Some("revised".into()),
            ..Default::default()
        };
        assert!(session.update_annotation(&id, &patch));
        assert!(!session.can_redo());
    }

    #[test]
    fn stamp_and_image_annotations_enter_history() {
        let mut session = session(2);
        session.add_stamp_annotation(StampKind::Draft, 1, NormalizedRect::at(0.1, 0.1));
        session.add_image_annotation(
            2,
            "data:image/png;base64,AAAA".to_string(),
            NormalizedRect::sized(0.2, 0.2, 0.3, 0.3),
        );
        assert_eq!(session.annotations().len(), 2);
        assert_eq!(session.history().past().len(), 2);
        assert_eq!(session.annotations()[1].kind, AnnotationKind::Image);
    }

    #[test]
    fn search_navigation_remaps_to_visual_pages() {
        let mut session = session(3);
        session.reorder_pages(vec![3, 1, 2]).unwrap();
        session.set_search_results(vec![SearchResult::on_page(3), SearchResult::on_page(1)]);
        assert_eq!(session.next_search_result(), Some(2));
        assert_eq!(session.current_page(), 2);
        assert_eq!(session.previous_search_result(), Some(1));
        assert_eq!(session.current_page(), 1);
        assert_eq!(session.go_to_search_result(5), None);
    }

    #[test]
    fn annotations_group_by_visual_page() {
        let mut session = session(3);
        session.add_annotation(highlight(1));
        session.add_annotation(highlight(3));
        session.reorder_pages(vec![3, 2, 1]).unwrap();
        session.remove_page(1).unwrap();
        let grouped = session.annotations_by_visual_page();
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(grouped[&1][0].page_number, 3);
        assert_eq!(grouped[&2][0].page_number, 1);
    }

    #[test]
    fn bookmarks_resolve_through_page_order() {
        let mut session = session(3);
        let id = session.add_bookmark(3, "Conclusion");
        session.reorder_pages(vec![3, 1, 2]).unwrap();
        session.go_to_page(3);
        assert!(session.go_to_bookmark(&id));
        assert_eq!(session.current_page(), 1);
        assert!(session.rename_bookmark(&id, "End"));
        assert_eq!(session.bookmarks()[0].title, "End");
        assert!(session.remove_bookmark(&id));
        assert!(!session.go_to_bookmark(&id));
    }

    #[test]
    fn zoom_is_clamped_and_steps() {
        let mut session = session(1);
        session.zoom_in();
        assert!((session.view().zoom - 1.1).abs() < 1e-6);
        session.set_zoom(100.0);
        assert_eq!(session.view().zoom, MAX_ZOOM);
        session.set_zoom(f32::NAN);
        assert_eq!(session.view().zoom, MAX_ZOOM);
        session.reset_zoom();
        assert_eq!(session.view().zoom, 1.0);
    }

    #[test]
    fn reset_keeps_preferences() {
        let mut session = session(4);
        session.toggle_dark_mode();
        session.add_annotation(highlight(1));
        session.go_to_page(2);
        session.reset();
        assert!(session.preferences.dark_mode);
        assert!(session.annotations().is_empty());
        assert_eq!(session.current_page(), 1);
        assert!(session.page_order().is_empty());
    }

    struct RecordingRenderer(Vec<(u32, Rotation)>);

    impl PageRenderer for RecordingRenderer {
        type Output = u32;

        fn render_page(&mut self, original_page: u32, rotation: Rotation) -> Result<u32> {
            self.0.push((original_page, rotation));
            Ok(original_page)
        }
    }

    #[test]
    fn renderer_receives_original_pages_in_visual_order() {
        let mut session = session(3);
        session.reorder_pages(vec![2, 3, 1]).unwrap();
        session.rotate_page(1);
        let mut renderer = RecordingRenderer(Vec::new());
        let rendered = session.render_with(&mut renderer).unwrap();
        assert_eq!(rendered, vec![2, 3, 1]);
        assert_eq!(renderer.0[2], (1, Rotation::Deg90));
    }
}
