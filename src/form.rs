//! Listing Form State
//! Draft item + ordered image sequence for one add/edit session, with the
//! analysis merge policy and a sequence number that discards stale
//! analysis responses instead of letting the last arrival win.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DraftItem, DraftPatch, ListingSuggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    Empty,
    Editing,
    Analyzing,
    Submitting,
    Saved,
    Failed,
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("image index {0} out of range")]
    ImageIndexOutOfRange(usize),
    #[error("order must be a permutation of 0..{0}")]
    InvalidOrder(usize),
    #[error("draft has no images")]
    NoImages,
}

/// One form session. Owns its images exclusively until submit.
#[derive(Debug, Clone, Serialize)]
pub struct ListingForm {
    pub draft: DraftItem,
    /// Normalized data-URIs; display order is list index.
    pub images: Vec<String>,
    pub phase: FormPhase,
    next_analysis_seq: u64,
    applied_analysis_seq: u64,
}

impl ListingForm {
    pub fn new() -> Self {
        Self {
            draft: DraftItem::empty(),
            images: Vec::new(),
            phase: FormPhase::Empty,
            next_analysis_seq: 0,
            applied_analysis_seq: 0,
        }
    }

    // ========================================
    // Manual edits
    // ========================================

    pub fn apply_patch(&mut self, patch: DraftPatch) {
        if let Some(v) = patch.name {
            self.draft.name = v;
        }
        if let Some(v) = patch.description {
            self.draft.description = v;
        }
        if let Some(v) = patch.price {
            self.draft.price = v;
        }
        if let Some(v) = patch.category {
            self.draft.category = v;
        }
        if let Some(v) = patch.subcategory1 {
            self.draft.subcategory1 = v;
        }
        if let Some(v) = patch.subcategory2 {
            self.draft.subcategory2 = v;
        }
        if let Some(v) = patch.condition {
            self.draft.condition = Some(v);
        }
        if let Some(v) = patch.size {
            self.draft.size = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = patch.available_in_store {
            self.draft.available_in_store = v;
        }
        if let Some(v) = patch.list_on_paperclip {
            self.draft.list_on_paperclip = v;
        }
        self.mark_editing();
    }

    fn mark_editing(&mut self) {
        if matches!(self.phase, FormPhase::Empty | FormPhase::Failed) {
            self.phase = FormPhase::Editing;
        }
    }

    // ========================================
    // Image sequence
    // ========================================

    pub fn add_image(&mut self, data_uri: String) {
        self.images.push(data_uri);
        self.mark_editing();
    }

    /// Remove the image at `index`; everything after it shifts down by one.
    pub fn remove_image(&mut self, index: usize) -> Result<(), FormError> {
        if index >= self.images.len() {
            return Err(FormError::ImageIndexOutOfRange(index));
        }
        self.images.remove(index);
        Ok(())
    }

    /// Reorder by old-index permutation: `order[new_pos] = old_pos`.
    pub fn reorder_images(&mut self, order: &[usize]) -> Result<(), FormError> {
        let n = self.images.len();
        if order.len() != n {
            return Err(FormError::InvalidOrder(n));
        }
        let mut seen = vec![false; n];
        for &old in order {
            if old >= n || seen[old] {
                return Err(FormError::InvalidOrder(n));
            }
            seen[old] = true;
        }
        self.images = order.iter().map(|&old| self.images[old].clone()).collect();
        Ok(())
    }

    // ========================================
    // Analysis lifecycle
    // ========================================

    /// Issue a ticket for a new analysis request. Overlapping requests each
    /// get their own ticket; only the newest applied one sticks.
    pub fn begin_analysis(&mut self, image_index: usize) -> Result<u64, FormError> {
        if self.images.is_empty() {
            return Err(FormError::NoImages);
        }
        if image_index >= self.images.len() {
            return Err(FormError::ImageIndexOutOfRange(image_index));
        }
        self.next_analysis_seq += 1;
        self.phase = FormPhase::Analyzing;
        Ok(self.next_analysis_seq)
    }

    /// Apply a finished analysis. Returns false (and leaves the draft
    /// untouched) when a newer response has already been applied.
    pub fn apply_analysis(&mut self, ticket: u64, suggestion: &ListingSuggestion) -> bool {
        if self.phase == FormPhase::Analyzing {
            self.phase = FormPhase::Editing;
        }
        if ticket <= self.applied_analysis_seq {
            return false;
        }
        self.applied_analysis_seq = ticket;
        self.merge_suggestion(suggestion);
        true
    }

    pub fn fail_analysis(&mut self, _ticket: u64) {
        if self.phase == FormPhase::Analyzing {
            self.phase = FormPhase::Editing;
        }
    }

    /// Merge policy: title/description/price/category overwrite the draft
    /// unconditionally; condition only when recognized; images, size and
    /// flags are never touched. Category replacement resets subcategories.
    fn merge_suggestion(&mut self, s: &ListingSuggestion) {
        self.draft.name = s.title.clone();
        self.draft.description = s.description.clone();
        self.draft.price = format_price(s.price_avg);
        self.draft.category = s.category_id.clone();
        self.draft.subcategory1.clear();
        self.draft.subcategory2.clear();
        if let Some(cond) = s.condition {
            self.draft.condition = Some(cond);
        }
    }

    // ========================================
    // Submission lifecycle
    // ========================================

    pub fn begin_submit(&mut self) {
        self.phase = FormPhase::Submitting;
    }

    pub fn mark_saved(&mut self) {
        self.phase = FormPhase::Saved;
    }

    pub fn mark_failed(&mut self) {
        self.phase = FormPhase::Failed;
    }
}

impl Default for ListingForm {
    fn default() -> Self {
        Self::new()
    }
}

// ========================================
// Draft sessions
// ========================================

/// All live form sessions, keyed by draft id. A draft exists from page
/// entry until submit succeeds or the user discards it.
#[derive(Debug, Default)]
pub struct DraftSessions {
    sessions: Mutex<HashMap<String, ListingForm>>,
}

impl DraftSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .lock()
            .unwrap()
            .insert(id.clone(), ListingForm::new());
        id
    }

    pub fn get(&self, id: &str) -> Option<ListingForm> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Run a closure against a draft while holding the store lock. Keep
    /// the closure free of I/O.
    pub fn with<R>(&self, id: &str, f: impl FnOnce(&mut ListingForm) -> R) -> Option<R> {
        self.sessions.lock().unwrap().get_mut(id).map(f)
    }

    pub fn remove(&self, id: &str) -> Option<ListingForm> {
        self.sessions.lock().unwrap().remove(id)
    }
}

/// Integral prices render without a trailing ".0" (matches the form's
/// decimal-string field).
fn format_price(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Condition;

    fn suggestion(condition: Option<Condition>) -> ListingSuggestion {
        ListingSuggestion {
            title: "Red Swatch".to_string(),
            description: "A small red square".to_string(),
            price_avg: 5.0,
            category_id: "Accessories".to_string(),
            condition,
        }
    }

    #[test]
    fn merge_overwrites_fields_and_preserves_images_and_flags() {
        let mut form = ListingForm::new();
        form.add_image("data:a".to_string());
        form.draft.name = "old".to_string();
        form.draft.available_in_store = false;

        let ticket = form.begin_analysis(0).unwrap();
        assert!(form.apply_analysis(ticket, &suggestion(None)));

        assert_eq!(form.draft.name, "Red Swatch");
        assert_eq!(form.draft.price, "5");
        assert_eq!(form.draft.category, "Accessories");
        assert_eq!(form.images, vec!["data:a".to_string()]);
        assert!(!form.draft.available_in_store);
        assert_eq!(form.phase, FormPhase::Editing);
    }

    #[test]
    fn merge_keeps_condition_when_suggestion_has_none() {
        let mut form = ListingForm::new();
        form.add_image("data:a".to_string());
        form.draft.condition = Some(Condition::Good);
        let ticket = form.begin_analysis(0).unwrap();
        form.apply_analysis(ticket, &suggestion(None));
        assert_eq!(form.draft.condition, Some(Condition::Good));
    }

    #[test]
    fn merge_sets_recognized_condition_exactly() {
        let mut form = ListingForm::new();
        form.add_image("data:a".to_string());
        let ticket = form.begin_analysis(0).unwrap();
        form.apply_analysis(ticket, &suggestion(Some(Condition::Fair)));
        assert_eq!(form.draft.condition, Some(Condition::Fair));
    }

    #[test]
    fn stale_analysis_response_is_discarded() {
        let mut form = ListingForm::new();
        form.add_image("data:a".to_string());
        let first = form.begin_analysis(0).unwrap();
        let second = form.begin_analysis(0).unwrap();

        let mut newer = suggestion(None);
        newer.title = "Newer".to_string();
        assert!(form.apply_analysis(second, &newer));

        // First request finishes late; it must not clobber the newer merge.
        assert!(!form.apply_analysis(first, &suggestion(None)));
        assert_eq!(form.draft.name, "Newer");
    }

    #[test]
    fn remove_image_shifts_following_indices_down() {
        let mut form = ListingForm::new();
        for s in ["a", "b", "c", "d"] {
            form.add_image(s.to_string());
        }
        form.remove_image(1).unwrap();
        assert_eq!(form.images, vec!["a", "c", "d"]);
        assert!(form.remove_image(3).is_err());
    }

    #[test]
    fn reorder_requires_a_permutation() {
        let mut form = ListingForm::new();
        for s in ["a", "b", "c"] {
            form.add_image(s.to_string());
        }
        form.reorder_images(&[2, 0, 1]).unwrap();
        assert_eq!(form.images, vec!["c", "a", "b"]);

        assert!(form.reorder_images(&[0, 0, 1]).is_err());
        assert!(form.reorder_images(&[0, 1]).is_err());
        assert!(form.reorder_images(&[0, 1, 3]).is_err());
    }

    #[test]
    fn analysis_requires_an_image() {
        let mut form = ListingForm::new();
        assert!(matches!(form.begin_analysis(0), Err(FormError::NoImages)));
        form.add_image("a".to_string());
        assert!(matches!(
            form.begin_analysis(5),
            Err(FormError::ImageIndexOutOfRange(5))
        ));
    }

    #[test]
    fn phase_walk_through_submit() {
        let mut form = ListingForm::new();
        assert_eq!(form.phase, FormPhase::Empty);
        form.add_image("a".to_string());
        assert_eq!(form.phase, FormPhase::Editing);
        form.begin_submit();
        assert_eq!(form.phase, FormPhase::Submitting);
        form.mark_saved();
        assert_eq!(form.phase, FormPhase::Saved);
    }
}
