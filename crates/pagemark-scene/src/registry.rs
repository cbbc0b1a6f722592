//! The per-document scene registry.
//!
//! One registry lives for the duration of a document session. It owns the
//! live scene per page, the latest-snapshot cache used to seed remounted
//! scenes, the per-page history, pointer cache, selection and active-page
//! tracking, the signature workflow, and the restore-request channel that
//! renderers consume after an undo/redo.

use crate::geometry::Point;
use crate::history::HistoryStore;
use crate::object::ObjectId;
use crate::scene::PageScene;
use std::collections::HashMap;

/// An instruction to replace a scene's contents with a historical
/// snapshot. The id is monotonically increasing so a renderer can ignore a
/// stale request that was queued behind a newer one.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreRequest {
    pub page_number: u32,
    pub snapshot: String,
    pub request_id: u64,
}

/// The signature pad workflow: closed, or open for one page with an
/// optional placement point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SignatureState {
    #[default]
    Closed,
    Open {
        page_number: u32,
        point: Option<Point>,
    },
}

#[derive(Debug, Default)]
pub struct SceneRegistry {
    scenes: HashMap<u32, PageScene>,
    snapshots: HashMap<u32, String>,
    pointers: HashMap<u32, Point>,
    history: HistoryStore,
    active_page: Option<u32>,
    selection: Option<(u32, ObjectId)>,
    restore_request: Option<RestoreRequest>,
    next_request_id: u64,
    signature: SignatureState,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page's scene, replacing any prior scene for that page.
    pub fn register_scene(&mut self, scene: PageScene) {
        self.scenes.insert(scene.page_number(), scene);
    }

    /// Drop a page's scene. Selection and active-page state referring to it
    /// are cleared so nothing dangles.
    pub fn unregister_scene(&mut self, page_number: u32) -> Option<PageScene> {
        let removed = self.scenes.remove(&page_number);

        if self.selection.map(|(page, _)| page) == Some(page_number) {
            self.selection = None;
        }
        if self.active_page == Some(page_number) {
            self.active_page = None;
        }

        removed
    }

    pub fn scene(&self, page_number: u32) -> Option<&PageScene> {
        self.scenes.get(&page_number)
    }

    pub fn scene_mut(&mut self, page_number: u32) -> Option<&mut PageScene> {
        self.scenes.get_mut(&page_number)
    }

    /// Registered page numbers in ascending order (export walks these).
    pub fn registered_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.scenes.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    pub fn active_page(&self) -> Option<u32> {
        self.active_page
    }

    pub fn set_active_page(&mut self, page_number: Option<u32>) {
        self.active_page = page_number;
    }

    pub fn selection(&self) -> Option<(u32, ObjectId)> {
        self.selection
    }

    /// Track the single selected object. Selecting on a page makes that
    /// page active and implicitly clears any other page's selection.
    pub fn set_selection(&mut self, selection: Option<(u32, ObjectId)>) {
        self.selection = selection;
        if let Some((page_number, _)) = selection {
            self.active_page = Some(page_number);
        }
    }

    pub fn set_snapshot(&mut self, page_number: u32, snapshot: String) {
        self.snapshots.insert(page_number, snapshot);
    }

    pub fn snapshot(&self, page_number: u32) -> Option<&str> {
        self.snapshots.get(&page_number).map(String::as_str)
    }

    /// Seed a page's history with a baseline, caching it as the latest
    /// snapshot.
    pub fn initialize_history(&mut self, page_number: u32, snapshot: String) {
        self.snapshots.insert(page_number, snapshot.clone());
        self.history.initialize(page_number, snapshot);
    }

    /// Record a new state for a page's history and snapshot cache.
    pub fn push_history_state(&mut self, page_number: u32, snapshot: String) {
        self.snapshots.insert(page_number, snapshot.clone());
        self.history.push(page_number, snapshot);
    }

    pub fn can_undo(&self) -> bool {
        self.active_page
            .map(|page| self.history.can_undo(page))
            .unwrap_or(false)
    }

    pub fn can_redo(&self) -> bool {
        self.active_page
            .map(|page| self.history.can_redo(page))
            .unwrap_or(false)
    }

    /// Undo on the active page; on success a restore request is issued.
    pub fn undo(&mut self) -> Option<&RestoreRequest> {
        let page_number = self.active_page?;
        let snapshot = self.history.undo(page_number)?;
        Some(self.issue_restore(page_number, snapshot))
    }

    /// Redo on the active page; on success a restore request is issued.
    pub fn redo(&mut self) -> Option<&RestoreRequest> {
        let page_number = self.active_page?;
        let snapshot = self.history.redo(page_number)?;
        Some(self.issue_restore(page_number, snapshot))
    }

    fn issue_restore(&mut self, page_number: u32, snapshot: String) -> &RestoreRequest {
        self.next_request_id += 1;
        self.snapshots.insert(page_number, snapshot.clone());
        self.restore_request.insert(RestoreRequest {
            page_number,
            snapshot,
            request_id: self.next_request_id,
        })
    }

    /// The most recent restore request, if any.
    pub fn restore_request(&self) -> Option<&RestoreRequest> {
        self.restore_request.as_ref()
    }

    pub fn set_last_pointer(&mut self, page_number: u32, point: Point) {
        self.pointers.insert(page_number, point);
    }

    pub fn last_pointer(&self, page_number: u32) -> Option<Point> {
        self.pointers.get(&page_number).copied()
    }

    /// Open the signature pad for a page, defaulting the placement point to
    /// the page's cached last pointer. The page becomes active.
    pub fn open_signature_pad(&mut self, page_number: u32, point: Option<Point>) {
        let resolved = point.or_else(|| self.last_pointer(page_number));
        self.signature = SignatureState::Open {
            page_number,
            point: resolved,
        };
        self.active_page = Some(page_number);
    }

    pub fn close_signature_pad(&mut self) {
        self.signature = SignatureState::Closed;
    }

    pub fn signature_state(&self) -> SignatureState {
        self.signature
    }

    /// Remap every page-indexed store after a reorder. `new_order[i]` names
    /// the old page number that supplies new page `i + 1`. Scene handles
    /// are dropped (the document reloads and re-registers them); snapshot
    /// and pointer caches are re-keyed, selection is cleared, the active
    /// page follows the permutation, and history is rebuilt from the
    /// remapped snapshots so no store disagrees with another.
    pub fn remap_pages(&mut self, new_order: &[u32]) {
        let mut next_snapshots = HashMap::new();
        let mut next_pointers = HashMap::new();

        for (index, old_page_number) in new_order.iter().enumerate() {
            let new_page_number = index as u32 + 1;
            if let Some(snapshot) = self.snapshots.get(old_page_number) {
                next_snapshots.insert(new_page_number, snapshot.clone());
            }
            if let Some(pointer) = self.pointers.get(old_page_number) {
                next_pointers.insert(new_page_number, *pointer);
            }
        }

        self.scenes.clear();
        self.snapshots = next_snapshots;
        self.pointers = next_pointers;
        self.selection = None;
        self.restore_request = None;
        self.active_page = self.active_page.and_then(|previous| {
            new_order
                .iter()
                .position(|&old| old == previous)
                .map(|index| index as u32 + 1)
        });

        self.history.clear_all();
        for (page_number, snapshot) in &self.snapshots {
            self.history.initialize(*page_number, snapshot.clone());
        }
    }

    /// Remove pages, expressed as a remap over the surviving order.
    pub fn remove_pages(&mut self, removed_page_numbers: &[u32], total_pages: u32) {
        if removed_page_numbers.is_empty() {
            return;
        }

        let surviving: Vec<u32> = (1..=total_pages)
            .filter(|page| !removed_page_numbers.contains(page))
            .collect();
        self.remap_pages(&surviving);
    }

    /// Tear down all per-document state (new document loaded).
    pub fn reset_session(&mut self) {
        self.scenes.clear();
        self.snapshots.clear();
        self.pointers.clear();
        self.history.clear_all();
        self.active_page = None;
        self.selection = None;
        self.restore_request = None;
        self.signature = SignatureState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(n: usize) -> String {
        format!(r#"{{"version":"1.0","objects":[{n}]}}"#)
    }

    fn registry_with_pages(pages: u32) -> SceneRegistry {
        let mut registry = SceneRegistry::new();
        for page in 1..=pages {
            registry.register_scene(PageScene::new(page, 600.0, 800.0));
            registry.initialize_history(page, state(page as usize * 10));
            registry.set_last_pointer(page, Point::new(page as f64, page as f64));
        }
        registry
    }

    #[test]
    fn test_initialize_history_seeds_snapshot() {
        let mut registry = SceneRegistry::new();
        registry.initialize_history(1, state(0));
        assert_eq!(registry.snapshot(1), Some(state(0).as_str()));
        registry.set_active_page(Some(1));
        assert!(!registry.can_undo());
    }

    #[test]
    fn test_unregister_clears_dependent_state() {
        let mut registry = registry_with_pages(2);
        registry.set_selection(Some((2, 7)));
        assert_eq!(registry.active_page(), Some(2));

        registry.unregister_scene(2);
        assert!(registry.selection().is_none());
        assert!(registry.active_page().is_none());
        assert!(registry.scene(2).is_none());
        // Page 1 is untouched.
        assert!(registry.scene(1).is_some());
    }

    #[test]
    fn test_undo_issues_restore_request_with_increasing_ids() {
        let mut registry = registry_with_pages(1);
        registry.set_active_page(Some(1));
        registry.push_history_state(1, state(1));
        registry.push_history_state(1, state(2));

        let first_id = registry.undo().expect("undo").request_id;
        let second_id = registry.undo().expect("undo").request_id;
        assert!(second_id > first_id);

        let request = registry.restore_request().unwrap();
        assert_eq!(request.page_number, 1);
        assert_eq!(request.snapshot, state(10));
    }

    #[test]
    fn test_undo_without_active_page_is_noop() {
        let mut registry = registry_with_pages(1);
        registry.push_history_state(1, state(1));
        registry.set_active_page(None);
        assert!(registry.undo().is_none());
        assert!(registry.restore_request().is_none());
    }

    #[test]
    fn test_redo_after_undo() {
        let mut registry = registry_with_pages(1);
        registry.set_active_page(Some(1));
        registry.push_history_state(1, state(1));

        registry.undo().unwrap();
        let request = registry.redo().expect("redo").clone();
        assert_eq!(request.snapshot, state(1));
        assert_eq!(registry.snapshot(1), Some(state(1).as_str()));
    }

    #[test]
    fn test_signature_workflow_defaults_to_cached_pointer() {
        let mut registry = registry_with_pages(1);
        registry.open_signature_pad(1, None);
        match registry.signature_state() {
            SignatureState::Open { page_number, point } => {
                assert_eq!(page_number, 1);
                assert_eq!(point, Some(Point::new(1.0, 1.0)));
            }
            SignatureState::Closed => panic!("signature pad should be open"),
        }
        assert_eq!(registry.active_page(), Some(1));

        registry.close_signature_pad();
        assert_eq!(registry.signature_state(), SignatureState::Closed);
    }

    #[test]
    fn test_remap_pages_permutes_all_stores() {
        let mut registry = registry_with_pages(3);
        registry.set_active_page(Some(2));

        // New page 1 comes from old page 3, new 2 from old 1, new 3 from old 2.
        registry.remap_pages(&[3, 1, 2]);

        assert_eq!(registry.snapshot(1), Some(state(30).as_str()));
        assert_eq!(registry.snapshot(2), Some(state(10).as_str()));
        assert_eq!(registry.snapshot(3), Some(state(20).as_str()));
        assert_eq!(registry.last_pointer(1), Some(Point::new(3.0, 3.0)));
        assert_eq!(registry.last_pointer(2), Some(Point::new(1.0, 1.0)));
        assert_eq!(registry.active_page(), Some(3));
        assert!(registry.selection().is_none());
    }

    #[test]
    fn test_remap_rebuilds_history_baselines() {
        let mut registry = registry_with_pages(2);
        registry.set_active_page(Some(1));
        registry.push_history_state(1, state(1));
        assert!(registry.can_undo());

        registry.remap_pages(&[2, 1]);

        // History was rebuilt from snapshots: old page 1's latest state is
        // now page 2's baseline, with nothing to undo.
        registry.set_active_page(Some(2));
        assert!(!registry.can_undo());
        assert_eq!(registry.snapshot(2), Some(state(1).as_str()));
    }

    #[test]
    fn test_remove_pages_rekeys_survivors() {
        let mut registry = registry_with_pages(3);
        registry.remove_pages(&[2], 3);

        assert_eq!(registry.snapshot(1), Some(state(10).as_str()));
        assert_eq!(registry.snapshot(2), Some(state(30).as_str()));
        assert_eq!(registry.snapshot(3), None);
    }

    #[test]
    fn test_remove_active_page_clears_active() {
        let mut registry = registry_with_pages(3);
        registry.set_active_page(Some(2));
        registry.remove_pages(&[2], 3);
        assert_eq!(registry.active_page(), None);
    }

    #[test]
    fn test_remove_pages_empty_is_noop() {
        let mut registry = registry_with_pages(2);
        registry.set_active_page(Some(2));
        registry.remove_pages(&[], 2);
        assert_eq!(registry.active_page(), Some(2));
        assert!(registry.scene(1).is_some());
    }

    #[test]
    fn test_reset_session_clears_everything() {
        let mut registry = registry_with_pages(2);
        registry.set_active_page(Some(1));
        registry.set_selection(Some((1, 3)));
        registry.open_signature_pad(1, None);
        registry.push_history_state(1, state(1));
        registry.undo();

        registry.reset_session();
        assert!(registry.scene(1).is_none());
        assert!(registry.snapshot(1).is_none());
        assert!(registry.selection().is_none());
        assert!(registry.active_page().is_none());
        assert!(registry.restore_request().is_none());
        assert_eq!(registry.signature_state(), SignatureState::Closed);
    }
}
