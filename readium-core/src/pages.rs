//! Visual page ordering layered over the immutable page numbering of the source file.
//!
//! A visual page number is the 1-based slot a page occupies on screen; an
//! original page number is its 1-based position in the file. Rotations are
//! keyed by original page so they travel with the page through reorders.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalizes any multiple of 90, negative values included.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Rotation::Deg0,
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            _ => Rotation::Deg270,
        })
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn clockwise(self) -> Self {
        self.compose(Rotation::Deg90)
    }

    pub fn counter_clockwise(self) -> Self {
        self.compose(Rotation::Deg270)
    }

    pub fn compose(self, other: Rotation) -> Self {
        let sum = i32::from(self.degrees()) + i32::from(other.degrees());
        Rotation::from_degrees(sum).unwrap_or_default()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Rotation::from_degrees(i32::from(value))
            .ok_or_else(|| format!("rotation must be a multiple of 90, got {value}"))
    }
}

impl From<Rotation> for u16 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// What a page renderer is asked to draw for one visual slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlacement {
    pub visual_page: u32,
    pub original_page: u32,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageLayout {
    page_order: Vec<u32>,
    page_rotations: BTreeMap<u32, Rotation>,
}

impl PageLayout {
    pub fn order(&self) -> &[u32] {
        &self.page_order
    }

    pub fn rotations(&self) -> &BTreeMap<u32, Rotation> {
        &self.page_rotations
    }

    /// Whether a page order has been established. Until then visual and
    /// original numbering are the same.
    pub fn is_virtualized(&self) -> bool {
        !self.page_order.is_empty()
    }

    /// Upper bound for navigation: the visible page count once virtualized,
    /// the raw document page count before that.
    pub fn page_count(&self, num_pages: u32) -> u32 {
        if self.is_virtualized() {
            self.page_order.len() as u32
        } else {
            num_pages
        }
    }

    /// Resets the order to `1..=num_pages` unless an order of that length is
    /// already in place. Returns whether anything changed.
    pub fn initialize(&mut self, num_pages: u32) -> bool {
        if self.page_order.len() == num_pages as usize {
            return false;
        }
        self.page_order = (1..=num_pages).collect();
        true
    }

    pub fn reorder(&mut self, new_order: Vec<u32>) -> Result<(), SessionError> {
        let mut proposed = new_order.clone();
        let mut current = self.page_order.clone();
        proposed.sort_unstable();
        current.sort_unstable();
        if proposed != current {
            return Err(SessionError::InvalidPageOrder {
                proposed: new_order,
                current: self.page_order.clone(),
            });
        }
        self.page_order = new_order;
        Ok(())
    }

    /// Drops the page in visual slot `visual_index` (0-based) and returns its
    /// original page number.
    pub fn remove(&mut self, visual_index: usize) -> Result<u32, SessionError> {
        let len = self.page_order.len();
        if visual_index >= len {
            return Err(SessionError::PageIndexOutOfRange {
                index: visual_index,
                len,
            });
        }
        if len == 1 {
            return Err(SessionError::LastPage);
        }
        Ok(self.page_order.remove(visual_index))
    }

    pub fn rotate(&mut self, original_page: u32) -> Rotation {
        let next = self.rotation_of(original_page).clockwise();
        if next == Rotation::Deg0 {
            self.page_rotations.remove(&original_page);
        } else {
            self.page_rotations.insert(original_page, next);
        }
        next
    }

    pub fn rotation_of(&self, original_page: u32) -> Rotation {
        self.page_rotations
            .get(&original_page)
            .copied()
            .unwrap_or_default()
    }

    /// Original page shown in visual slot `visual_page` (1-based).
    pub fn original_page(&self, visual_page: u32) -> Option<u32> {
        if !self.is_virtualized() {
            return (visual_page >= 1).then_some(visual_page);
        }
        let index = (visual_page as usize).checked_sub(1)?;
        self.page_order.get(index).copied()
    }

    /// Visual slot currently holding `original_page`, `None` if it was removed.
    pub fn visual_page(&self, original_page: u32) -> Option<u32> {
        if !self.is_virtualized() {
            return Some(original_page);
        }
        self.page_order
            .iter()
            .position(|&page| page == original_page)
            .map(|index| index as u32 + 1)
    }

    /// Pages in visual order with the global rotation composed onto each
    /// page's own rotation.
    pub fn placements(&self, num_pages: u32, global: Rotation) -> Vec<PagePlacement> {
        let originals: Vec<u32> = if self.is_virtualized() {
            self.page_order.clone()
        } else {
            (1..=num_pages).collect()
        };
        originals
            .into_iter()
            .enumerate()
            .map(|(index, original_page)| PagePlacement {
                visual_page: index as u32 + 1,
                original_page,
                rotation: global.compose(self.rotation_of(original_page)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(pages: u32) -> PageLayout {
        let mut layout = PageLayout::default();
        layout.initialize(pages);
        layout
    }

    #[test]
    fn initialize_keeps_existing_order_of_same_length() {
        let mut layout = layout(3);
        layout.reorder(vec![3, 1, 2]).unwrap();
        assert!(!layout.initialize(3));
        assert_eq!(layout.order(), &[3, 1, 2]);
        assert!(layout.initialize(4));
        assert_eq!(layout.order(), &[1, 2, 3, 4]);
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let mut layout = layout(3);
        assert!(matches!(
            layout.reorder(vec![1, 1, 2]),
            Err(SessionError::InvalidPageOrder { .. })
        ));
        assert!(layout.reorder(vec![1, 2, 4]).is_err());
        assert!(layout.reorder(vec![1, 2]).is_err());
        assert_eq!(layout.order(), &[1, 2, 3]);
    }

    #[test]
    fn remove_rejects_out_of_range_and_last_page() {
        let mut layout = layout(2);
        assert!(matches!(
            layout.remove(2),
            Err(SessionError::PageIndexOutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(layout.remove(0).unwrap(), 1);
        assert!(matches!(layout.remove(0), Err(SessionError::LastPage)));
        assert_eq!(layout.order(), &[2]);
    }

    #[test]
    fn rotation_follows_original_page_through_reorder() {
        let mut layout = layout(3);
        layout.rotate(3);
        layout.rotate(3);
        layout.reorder(vec![3, 2, 1]).unwrap();
        assert_eq!(layout.rotation_of(3), Rotation::Deg180);
        assert_eq!(layout.rotation_of(1), Rotation::Deg0);
    }

    #[test]
    fn rotate_wraps_after_full_turn() {
        let mut layout = layout(1);
        for _ in 0..4 {
            layout.rotate(1);
        }
        assert_eq!(layout.rotation_of(1), Rotation::Deg0);
        assert!(layout.rotations().is_empty());
    }

    #[test]
    fn visual_and_original_lookup() {
        let mut layout = PageLayout::default();
        assert_eq!(layout.visual_page(7), Some(7));
        assert_eq!(layout.page_count(9), 9);

        layout.initialize(3);
        layout.reorder(vec![3, 1, 2]).unwrap();
        assert_eq!(layout.visual_page(1), Some(2));
        assert_eq!(layout.original_page(1), Some(3));
        assert_eq!(layout.original_page(4), None);
        assert_eq!(layout.page_count(9), 3);
    }

    #[test]
    fn placements_compose_global_rotation() {
        let mut layout = layout(2);
        layout.rotate(2);
        layout.reorder(vec![2, 1]).unwrap();
        let placements = layout.placements(2, Rotation::Deg270);
        assert_eq!(
            placements,
            vec![
                PagePlacement {
                    visual_page: 1,
                    original_page: 2,
                    rotation: Rotation::Deg0,
                },
                PagePlacement {
                    visual_page: 2,
                    original_page: 1,
                    rotation: Rotation::Deg270,
                },
            ]
        );
    }

    #[test]
    fn rotation_serializes_as_degrees() {
        let mut layout = layout(2);
        layout.rotate(2);
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["pageRotations"]["2"], 90);
        assert!(serde_json::from_str::<Rotation>("45").is_err());
        assert_eq!(serde_json::from_str::<Rotation>("270").unwrap(), Rotation::Deg270);
    }
}
