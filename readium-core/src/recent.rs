use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::annotation::now_millis;

pub const MAX_RECENT_FILES: usize = 10;

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFile {
    pub url: String,
    pub name: String,
    pub last_opened: i64,
    #[serde(default)]
    pub num_pages: Option<u32>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl RecentFile {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            last_opened: now_millis(),
            num_pages: None,
            size: None,
        }
    }
}

/// Most-recent-first list of opened files, unique by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentFiles {
    files: Vec<RecentFile>,
    capacity: usize,
}

impl Default for RecentFiles {
    fn default() -> Self {
        Self::with_capacity(MAX_RECENT_FILES)
    }
}

impl RecentFiles {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            files: Vec::new(),
            capacity,
        }
    }

    /// Rebuilds a list from persisted entries, re-applying the URL
    /// uniqueness and capacity rules.
    pub fn from_files(files: Vec<RecentFile>, capacity: usize) -> Self {
        let mut recent = Self::with_capacity(capacity);
        for file in files.into_iter().rev() {
            recent.add(file);
        }
        recent
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.files.truncate(capacity);
    }

    /// Moves `file` to the front, replacing any entry with the same URL.
    pub fn add(&mut self, file: RecentFile) {
        self.files.retain(|existing| existing.url != file.url);
        self.files.insert(0, file);
        self.files.truncate(self.capacity);
    }

    pub fn remove(&mut self, url: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|existing| existing.url != url);
        self.files.len() != before
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[RecentFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
