use serde::{Deserialize, Serialize};

use crate::annotation::NormalizedRect;
use crate::pages::PageLayout;

/// One hit, located by original page number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub page_number: u32,
    #[serde(default)]
    pub match_index: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rects: Vec<NormalizedRect>,
}

impl SearchResult {
    pub fn on_page(page_number: u32) -> Self {
        Self {
            page_number,
            match_index: 0,
            text: String::new(),
            rects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    results: Vec<SearchResult>,
    current_index: usize,
    pub case_sensitive: bool,
    /// Set while an external scan is running; never persisted.
    #[serde(skip)]
    pub is_searching: bool,
}

impl SearchState {
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.results.is_empty()).then_some(self.current_index)
    }

    pub fn current(&self) -> Option<&SearchResult> {
        self.results.get(self.current_index)
    }

    pub fn set_results(&mut self, results: Vec<SearchResult>) {
        self.results = results;
        self.current_index = 0;
        self.is_searching = false;
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.results.clear();
        self.current_index = 0;
        self.is_searching = false;
    }

    /// Moves one hit forward or backward, wrapping at either end.
    pub fn step(&mut self, forward: bool) -> Option<&SearchResult> {
        let len = self.results.len();
        if len == 0 {
            return None;
        }
        self.current_index = if forward {
            (self.current_index + 1) % len
        } else {
            (self.current_index + len - 1) % len
        };
        self.results.get(self.current_index)
    }

    pub fn select(&mut self, index: usize) -> Option<&SearchResult> {
        if index >= self.results.len() {
            return None;
        }
        self.current_index = index;
        self.results.get(index)
    }
}

/// Visual page to show for a hit on `original_page`. A hit on a removed page
/// falls back to its original number.
pub fn visual_page_for_hit(original_page: u32, layout: &PageLayout) -> u32 {
    layout.visual_page(original_page).unwrap_or(original_page)
}
