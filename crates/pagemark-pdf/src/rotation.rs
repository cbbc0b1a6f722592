//! Sparse per-page rotation metadata.
//!
//! Rotation is stored mod 360 and a value of 0 means "no entry", keeping
//! the map sparse. The map is remapped alongside the scene stores whenever
//! pages are deleted or reordered.

use std::collections::BTreeMap;

/// Normalize rotation to 0, 90, 180 or 270 (any multiple of 90 in, signed).
pub fn normalize_rotation(angle: i32) -> i32 {
    let normalized = angle % 360;
    if normalized < 0 {
        normalized + 360
    } else {
        normalized
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRotations {
    rotations: BTreeMap<u32, i32>,
}

impl PageRotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page_number: u32) -> i32 {
        self.rotations.get(&page_number).copied().unwrap_or(0)
    }

    pub fn set(&mut self, page_number: u32, degrees: i32) {
        let normalized = normalize_rotation(degrees);
        if normalized == 0 {
            self.rotations.remove(&page_number);
        } else {
            self.rotations.insert(page_number, normalized);
        }
    }

    /// Add a delta to a page's current rotation.
    pub fn rotate_by(&mut self, page_number: u32, degrees: i32) -> i32 {
        let next = normalize_rotation(self.get(page_number) + degrees);
        self.set(page_number, next);
        next
    }

    pub fn clear(&mut self, page_number: u32) {
        self.rotations.remove(&page_number);
    }

    pub fn clear_all(&mut self) {
        self.rotations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    /// Re-key after a reorder; `new_order[i]` is the old page number that
    /// becomes new page `i + 1`.
    pub fn remap(&mut self, new_order: &[u32]) {
        let mut next = BTreeMap::new();
        for (index, old_page_number) in new_order.iter().enumerate() {
            if let Some(rotation) = self.rotations.get(old_page_number) {
                next.insert(index as u32 + 1, *rotation);
            }
        }
        self.rotations = next;
    }

    /// Re-key after deleting pages from a document of `total_pages`.
    pub fn remove_pages(&mut self, removed_page_numbers: &[u32], total_pages: u32) {
        if removed_page_numbers.is_empty() {
            return;
        }

        let surviving: Vec<u32> = (1..=total_pages)
            .filter(|page| !removed_page_numbers.contains(page))
            .collect();
        self.remap(&surviving);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(90), 90);
        assert_eq!(normalize_rotation(360), 0);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(-360), 0);
    }

    #[test]
    fn test_zero_rotation_is_absent() {
        let mut rotations = PageRotations::new();
        rotations.set(1, 90);
        assert!(!rotations.is_empty());

        rotations.set(1, 360);
        assert!(rotations.is_empty());
        assert_eq!(rotations.get(1), 0);
    }

    #[test]
    fn test_rotate_by_accumulates() {
        let mut rotations = PageRotations::new();
        assert_eq!(rotations.rotate_by(1, 90), 90);
        assert_eq!(rotations.rotate_by(1, 90), 180);
        assert_eq!(rotations.rotate_by(1, 180), 0);
        assert!(rotations.is_empty());
    }

    #[test]
    fn test_remap_follows_permutation() {
        let mut rotations = PageRotations::new();
        rotations.set(1, 90);
        rotations.set(3, 270);

        rotations.remap(&[3, 1, 2]);
        assert_eq!(rotations.get(1), 270);
        assert_eq!(rotations.get(2), 90);
        assert_eq!(rotations.get(3), 0);
    }

    #[test]
    fn test_remove_pages_rekeys_survivors() {
        let mut rotations = PageRotations::new();
        rotations.set(1, 90);
        rotations.set(3, 180);

        rotations.remove_pages(&[2], 3);
        assert_eq!(rotations.get(1), 90);
        assert_eq!(rotations.get(2), 180);
        assert_eq!(rotations.get(3), 0);
    }
}
