//! Window guard: page offset and result size, bounded by the search window.

use super::QueryDocument;
use crate::config::SearchConfig;
use std::num::IntErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGuard {
    pub preview_size: u64,
    pub max_search_window: u64,
}

impl WindowGuard {
    pub fn new(preview_size: u64, max_search_window: u64) -> Self {
        Self {
            preview_size,
            max_search_window,
        }
    }

    pub fn from_config(search: &SearchConfig) -> Self {
        Self::new(search.preview_size, search.max_search_window)
    }

    /// Offset for a 1-based `page`. Non-integer and non-positive pages give
    /// no offset rather than an error. Pages too large to represent saturate,
    /// like offsets that overflow, so the clamp leaves an empty window.
    pub fn offset_for(&self, page: Option<&str>) -> Option<u64> {
        let page: u64 = match page?.trim().parse() {
            Ok(page) => page,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => return Some(u64::MAX),
            Err(_) => return None,
        };
        if page == 0 {
            return None;
        }
        Some((page - 1).saturating_mul(self.preview_size))
    }

    /// Size allowed at `from` so that `from + size` stays inside the window.
    pub fn clamp(&self, from: u64, size: u64) -> u64 {
        if from.saturating_add(size) > self.max_search_window {
            self.max_search_window.saturating_sub(from)
        } else {
            size
        }
    }

    /// Set `size` (when not already set) and `from`, then clamp `size`.
    /// `from` is never changed by the clamp.
    pub fn apply(&self, doc: &mut QueryDocument, page: Option<&str>) {
        let size = doc.size.unwrap_or(self.preview_size);
        let from = self.offset_for(page).unwrap_or(0);
        if from > 0 {
            doc.from = Some(from);
        }

        let clamped = self.clamp(from, size);
        if clamped != size {
            tracing::warn!(from, size, clamped, max = self.max_search_window, "result window clamped");
        }
        doc.size = Some(clamped);
    }
}
