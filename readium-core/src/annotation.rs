//! Annotation and bookmark records owned by a document session.
//!
//! Page numbers on both records are original page numbers: they name a page of
//! the source file, never a slot in the reordered view.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

pub type AnnotationId = String;
pub type BookmarkId = String;

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Comment,
    Shape,
    Text,
    Drawing,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Rectangle in page-relative coordinates, each axis in `0.0..=1.0`.
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

impl NormalizedRect {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
            width: None,
            height: None,
        }
    }

    pub fn sized(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            width: Some(width.clamp(0.0, 1.0)),
            height: Some(height.clamp(0.0, 1.0)),
            ..Self::at(x, y)
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub page_number: u32,
    pub content: Option<String>,
    pub color: String,
    pub position: NormalizedRect,
    pub path: Option<Vec<NormalizedPoint>>,
    pub stroke_width: Option<f32>,
    pub created_at: i64,
}

/// An annotation as submitted by the UI; the engine assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub page_number: u32,
    #[serde(default)]
    pub content: Option<String>,
    pub color: String,
    #[serde(default)]
    pub position: NormalizedRect,
    #[serde(default)]
    pub path: Option<Vec<NormalizedPoint>>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
}

impl NewAnnotation {
    pub fn new(kind: AnnotationKind, page_number: u32, color: impl Into<String>) -> Self {
        Self {
            kind,
            page_number,
            content: None,
            color: color.into(),
            position: NormalizedRect::default(),
            path: None,
            stroke_width: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_position(mut self, position: NormalizedRect) -> Self {
        self.position = position;
        self
    }

    pub fn with_path(mut self, path: Vec<NormalizedPoint>, stroke_width: f32) -> Self {
        self.path = Some(path);
        self.stroke_width = Some(stroke_width);
        self
    }

    pub(crate) fn into_annotation(self) -> Annotation {
        Annotation {
            id: new_id(),
            kind: self.kind,
            page_number: self.page_number,
            content: self.content,
            color: self.color,
            position: self.position,
            path: self.path,
            stroke_width: self.stroke_width,
            created_at: now_millis(),
        }
    }
}

/// Field-wise update for an existing annotation. `id` and `created_at` are fixed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationPatch {
    pub kind: Option<AnnotationKind>,
    pub page_number: Option<u32>,
    pub content: Option<String>,
    pub color: Option<String>,
    pub position: Option<NormalizedRect>,
    pub path: Option<Vec<NormalizedPoint>>,
    pub stroke_width: Option<f32>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, annotation: &Annotation) -> Annotation {
        let mut next = annotation.clone();
        if let Some(kind) = self.kind {
            next.kind = kind;
        }
        if let Some(page) = self.page_number {
            next.page_number = page;
        }
        if let Some(content) = &self.content {
            next.content = Some(content.clone());
        }
        if let Some(color) = &self.color {
            next.color = color.clone();
        }
        if let Some(position) = self.position {
            next.position = position;
        }
        if let Some(path) = &self.path {
            next.path = Some(path.clone());
        }
        if let Some(width) = self.stroke_width {
            next.stroke_width = Some(width);
        }
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StampKind {
    Approved,
    Rejected,
    Draft,
    Confidential,
    Final,
    Reviewed,
}

impl StampKind {
    pub fn label(self) -> &'static str {
        match self {
            StampKind::Approved => "APPROVED",
            StampKind::Rejected => "REJECTED",
            StampKind::Draft => "DRAFT",
            StampKind::Confidential => "CONFIDENTIAL",
            StampKind::Final => "FINAL",
            StampKind::Reviewed => "REVIEWED",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            StampKind::Approved | StampKind::Final => "#16a34a",
            StampKind::Rejected | StampKind::Confidential => "#dc2626",
            StampKind::Draft => "#6b7280",
            StampKind::Reviewed => "#2563eb",
        }
    }

    pub(crate) fn annotation(self, page_number: u32, position: NormalizedRect) -> NewAnnotation {
        NewAnnotation::new(AnnotationKind::Text, page_number, self.color())
            .with_content(self.label())
            .with_position(position)
    }
}

pub(crate) fn image_annotation(
    page_number: u32,
    image_data: String,
    position: NormalizedRect,
) -> NewAnnotation {
    NewAnnotation::new(AnnotationKind::Image, page_number, "transparent")
        .with_content(image_data)
        .with_position(position)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: BookmarkId,
    pub page_number: u32,
    pub title: String,
    pub created_at: i64,
}

impl Bookmark {
    pub fn new(page_number: u32, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            page_number,
            title: title.into(),
            created_at: now_millis(),
        }
    }
}
