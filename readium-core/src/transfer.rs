//! JSON export and import of a session's annotations and bookmarks.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotation::{new_id, Annotation, Bookmark};
use crate::error::SessionError;
use crate::session::DocumentSession;

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationExport {
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
    #[serde(default)]
    pub export_date: String,
    #[serde(default)]
    pub version: String,
}

impl DocumentSession {
    pub fn export_annotations(&self) -> Result<String> {
        let export = AnnotationExport {
            annotations: self.annotations().to_vec(),
            bookmarks: self.bookmarks().to_vec(),
            export_date: chrono::Utc::now().to_rfc3339(),
            version: EXPORT_VERSION.to_string(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    pub fn export_annotations_to_file(&self, path: &Path) -> Result<u64> {
        let payload = self.export_annotations()?;
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp export file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to move export into place at {:?}", path))?;
        Ok(payload.len() as u64)
    }

    /// Appends the annotations (and bookmarks, when present) from an export
    /// as a single undoable step. Malformed input is logged and leaves the
    /// session untouched. Returns the number of annotations added.
    pub fn import_annotations(&mut self, json: &str) -> Result<usize, SessionError> {
        let export: AnnotationExport = match serde_json::from_str(json) {
            Ok(export) => export,
            Err(err) => {
                warn!(error = %err, "failed to import annotations");
                return Err(err.into());
            }
        };

        let mut seen: HashSet<String> = self.annotations().iter().map(|a| a.id.clone()).collect();
        let mut next = self.annotations().to_vec();
        let added = export.annotations.len();
        for mut annotation in export.annotations {
            if !seen.insert(annotation.id.clone()) {
                annotation.id = new_id();
                seen.insert(annotation.id.clone());
            }
            next.push(annotation);
        }
        self.commit_annotations(next);
        self.append_bookmarks(export.bookmarks);
        debug!(added, "imported annotations");
        Ok(added)
    }
}
