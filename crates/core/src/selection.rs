//! Selection store for list screens.
//!
//! Tracks which row identifiers the operator has checked. The store itself
//! is unconstrained; the owning list view calls [`SelectionStore::keep_only`]
//! every time its visible rows change so the selection never refers to a
//! row the operator cannot see.

use std::collections::HashSet;
use std::hash::Hash;

/// State of a "select all" header checkbox for the visible rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAllState {
    None,
    Some,
    All,
}

/// Set of identifiers currently checked in one list view.
#[derive(Debug, Clone)]
pub struct SelectionStore<Id> {
    selected: HashSet<Id>,
}

impl<Id> Default for SelectionStore<Id> {
    fn default() -> Self {
        Self {
            selected: HashSet::new(),
        }
    }
}

impl<Id: Eq + Hash + Clone> SelectionStore<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`.
    pub fn toggle(&mut self, id: Id) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Select every visible id, or deselect them all if they already are.
    ///
    /// Ids outside `visible` are dropped either way, so the selection is a
    /// subset of `visible` afterwards.
    pub fn toggle_all(&mut self, visible: &[Id]) {
        let all_selected =
            !visible.is_empty() && visible.iter().all(|id| self.selected.contains(id));
        self.keep_only(visible);
        if all_selected {
            for id in visible {
                self.selected.remove(id);
            }
        } else {
            self.selected.extend(visible.iter().cloned());
        }
    }

    /// Intersect the selection with `visible`.
    pub fn keep_only(&mut self, visible: &[Id]) {
        let visible: HashSet<&Id> = visible.iter().collect();
        self.selected.retain(|id| visible.contains(id));
    }

    /// Replace the selection wholesale.
    pub fn set_selected(&mut self, ids: impl IntoIterator<Item = Id>) {
        self.selected = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, id: &Id) -> bool {
        self.selected.contains(id)
    }

    /// Header checkbox state for the given visible ids.
    pub fn select_all_state(&self, visible: &[Id]) -> SelectAllState {
        let hits = visible.iter().filter(|id| self.selected.contains(id)).count();
        match hits {
            0 => SelectAllState::None,
            n if n == visible.len() => SelectAllState::All,
            _ => SelectAllState::Some,
        }
    }

    /// True when `visible` is non-empty and every visible id is selected.
    pub fn all_selected(&self, visible: &[Id]) -> bool {
        self.select_all_state(visible) == SelectAllState::All && !visible.is_empty()
    }
}

impl<Id: Eq + Hash + Clone + Ord> SelectionStore<Id> {
    /// Sorted snapshot of the selected ids.
    pub fn ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }
}
