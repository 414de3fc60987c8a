use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Whole-list undo/redo history for a document's annotations.
///
/// `present` is the live annotation list; there is no second copy to drift from it.
/// `past` is oldest first, `future` is nearest-redo first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationHistory {
    past: VecDeque<Vec<Annotation>>,
    present: Vec<Annotation>,
    future: VecDeque<Vec<Annotation>>,
}

impl AnnotationHistory {
    pub fn present(&self) -> &[Annotation] {
        &self.present
    }

    pub fn past(&self) -> impl ExactSizeIterator<Item = &Vec<Annotation>> {
        self.past.iter()
    }

    pub fn future(&self) -> impl ExactSizeIterator<Item = &Vec<Annotation>> {
        self.future.iter()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Records `next` as a new edit. Clears the redo stack and keeps at most
    /// `limit` undo entries (`0` keeps none).
    pub fn commit(&mut self, next: Vec<Annotation>, limit: usize) {
        let previous = std::mem::replace(&mut self.present, next);
        self.past.push_back(previous);
        while self.past.len() > limit {
            self.past.pop_front();
        }
        self.future.clear();
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        true
    }
}
