//! Bounded per-page undo/redo history.
//!
//! Each page keeps its own pair of snapshot stacks, so switching pages
//! mid-edit never disturbs another page's history. The undo stack always
//! holds the baseline plus every accepted change (current state last);
//! pushing a snapshot identical to the current top is a no-op so spurious
//! modify events cannot pollute the stack.

use std::collections::HashMap;

const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone)]
struct PageHistory {
    undo_stack: Vec<String>,
    redo_stack: Vec<String>,
}

impl PageHistory {
    fn seeded(snapshot: String) -> Self {
        Self {
            undo_stack: vec![snapshot],
            redo_stack: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HistoryStore {
    pages: HashMap<u32, PageHistory>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or reseed) a page's history with a baseline snapshot.
    pub fn initialize(&mut self, page_number: u32, snapshot: String) {
        self.pages.insert(page_number, PageHistory::seeded(snapshot));
    }

    /// Drop every page's history (new document loaded).
    pub fn clear_all(&mut self) {
        self.pages.clear();
    }

    /// Record a new state for a page. Initializes the page when absent,
    /// dedups against the current top, caps the stack at 50 entries and
    /// clears any pending redo.
    pub fn push(&mut self, page_number: u32, snapshot: String) {
        let Some(history) = self.pages.get_mut(&page_number) else {
            self.initialize(page_number, snapshot);
            return;
        };

        if history.undo_stack.last() == Some(&snapshot) {
            return;
        }

        history.undo_stack.push(snapshot);
        if history.undo_stack.len() > MAX_HISTORY {
            let excess = history.undo_stack.len() - MAX_HISTORY;
            history.undo_stack.drain(..excess);
        }
        history.redo_stack.clear();
    }

    /// Step a page back one state, returning the snapshot to restore.
    /// The baseline cannot be undone past.
    pub fn undo(&mut self, page_number: u32) -> Option<String> {
        let history = self.pages.get_mut(&page_number)?;
        if history.undo_stack.len() <= 1 {
            return None;
        }

        let current = history.undo_stack.pop()?;
        history.redo_stack.insert(0, current);
        history.redo_stack.truncate(MAX_HISTORY);

        history.undo_stack.last().cloned()
    }

    /// Step a page forward one state, returning the snapshot to restore.
    pub fn redo(&mut self, page_number: u32) -> Option<String> {
        let history = self.pages.get_mut(&page_number)?;
        if history.redo_stack.is_empty() {
            return None;
        }

        let next = history.redo_stack.remove(0);
        history.undo_stack.push(next.clone());
        if history.undo_stack.len() > MAX_HISTORY {
            let excess = history.undo_stack.len() - MAX_HISTORY;
            history.undo_stack.drain(..excess);
        }

        Some(next)
    }

    pub fn can_undo(&self, page_number: u32) -> bool {
        self.pages
            .get(&page_number)
            .map(|history| history.undo_stack.len() > 1)
            .unwrap_or(false)
    }

    pub fn can_redo(&self, page_number: u32) -> bool {
        self.pages
            .get(&page_number)
            .map(|history| !history.redo_stack.is_empty())
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn undo_depth(&self, page_number: u32) -> usize {
        self.pages
            .get(&page_number)
            .map(|history| history.undo_stack.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(n: usize) -> String {
        format!(r#"{{"version":"1.0","objects":[{n}]}}"#)
    }

    #[test]
    fn test_initialized_page_cannot_undo() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        assert!(!store.can_undo(1));
        assert!(!store.can_redo(1));
        assert_eq!(store.undo(1), None);
    }

    #[test]
    fn test_undo_walks_back_in_order() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        for n in 1..=4 {
            store.push(1, state(n));
        }

        assert_eq!(store.undo(1), Some(state(3)));
        assert_eq!(store.undo(1), Some(state(2)));
        assert_eq!(store.undo(1), Some(state(1)));
        assert_eq!(store.undo(1), Some(state(0)));
        assert_eq!(store.undo(1), None);
    }

    #[test]
    fn test_redo_returns_undone_state() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        store.push(1, state(1));
        store.push(1, state(2));

        assert_eq!(store.undo(1), Some(state(1)));
        assert_eq!(store.redo(1), Some(state(2)));
        assert_eq!(store.redo(1), None);
    }

    #[test]
    fn test_push_after_undo_clears_redo() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        store.push(1, state(1));
        store.push(1, state(2));

        store.undo(1);
        assert!(store.can_redo(1));

        store.push(1, state(3));
        assert!(!store.can_redo(1));
        assert_eq!(store.redo(1), None);
    }

    #[test]
    fn test_duplicate_push_is_noop() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        store.push(1, state(1));
        store.undo(1);
        let depth = store.undo_depth(1);

        // Pushing the current top again must not grow the stack or clear redo.
        store.push(1, state(0));
        assert_eq!(store.undo_depth(1), depth);
        assert!(store.can_redo(1));
    }

    #[test]
    fn test_push_without_initialize_seeds_baseline() {
        let mut store = HistoryStore::new();
        store.push(7, state(0));
        assert!(!store.can_undo(7));
        store.push(7, state(1));
        assert!(store.can_undo(7));
    }

    #[test]
    fn test_history_is_capped() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        for n in 1..200 {
            store.push(1, state(n));
        }
        assert_eq!(store.undo_depth(1), 50);

        let mut undos = 0;
        while store.undo(1).is_some() {
            undos += 1;
        }
        assert_eq!(undos, 49);
    }

    #[test]
    fn test_pages_are_independent() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        store.initialize(2, state(100));
        store.push(1, state(1));

        assert!(store.can_undo(1));
        assert!(!store.can_undo(2));
        assert_eq!(store.undo(2), None);
        assert_eq!(store.undo(1), Some(state(0)));
    }

    #[test]
    fn test_clear_all() {
        let mut store = HistoryStore::new();
        store.initialize(1, state(0));
        store.push(1, state(1));
        store.clear_all();
        assert!(!store.can_undo(1));
        assert_eq!(store.undo(1), None);
    }
}
