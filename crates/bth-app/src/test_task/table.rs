//! Ordered element storage with dense indices

use std::collections::HashMap;

use super::{Element, ElementId};

/// Elements of one test-task model, in render order.
///
/// `index` values of the stored elements are always exactly `0..len`:
/// inserting or removing renumbers the affected tail.
#[derive(Default)]
pub struct ElementTable {
    order: Vec<ElementId>,
    elements: HashMap<ElementId, Element>,
    next_id: u64,
}

impl ElementTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> ElementId {
        self.next_id += 1;
        ElementId(self.next_id)
    }

    /// Append at the end; returns the new id.
    pub fn push(&mut self, element: Element) -> ElementId {
        let index = self.order.len();
        self.insert(index, element)
    }

    /// Insert at `index` (clamped to the end), shifting the tail down.
    pub fn insert(&mut self, index: usize, mut element: Element) -> ElementId {
        let index = index.min(self.order.len());
        let id = self.allocate_id();
        element.id = id;
        element.index = index;
        for later in &self.order[index..] {
            if let Some(e) = self.elements.get_mut(later) {
                e.index += 1;
            }
        }
        self.order.insert(index, id);
        self.elements.insert(id, element);
        id
    }

    /// Remove and shift the tail up.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        let element = self.elements.remove(&id)?;
        self.order.remove(element.index);
        for later in &self.order[element.index..] {
            if let Some(e) = self.elements.get_mut(later) {
                e.index -= 1;
            }
        }
        Some(element)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    pub fn id_at(&self, index: usize) -> Option<ElementId> {
        self.order.get(index).copied()
    }

    pub fn ids(&self) -> Vec<ElementId> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.order.iter().filter_map(|id| self.elements.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_task::ElementKind;

    fn indices(table: &ElementTable) -> Vec<usize> {
        table.iter().map(|e| e.index).collect()
    }

    fn names(table: &ElementTable) -> Vec<String> {
        table.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_push_assigns_dense_indices() {
        let mut table = ElementTable::new();
        let a = table.push(Element::new(ElementKind::Attribute, "a"));
        let b = table.push(Element::new(ElementKind::Attribute, "b"));
        assert_ne!(a, b);
        assert_eq!(indices(&table), vec![0, 1]);
        assert_eq!(table.get(b).unwrap().index, 1);
    }

    #[test]
    fn test_insert_and_remove_renumber_tail() {
        let mut table = ElementTable::new();
        table.push(Element::new(ElementKind::MethodCall, "m"));
        let last = table.push(Element::new(ElementKind::Attribute, "z"));
        let r0 = table.insert(1, Element::new(ElementKind::RemovableValue, "r0"));
        let r1 = table.insert(1, Element::new(ElementKind::RemovableValue, "r1"));
        assert_eq!(names(&table), vec!["m", "r1", "r0", "z"]);
        assert_eq!(indices(&table), vec![0, 1, 2, 3]);
        assert_eq!(table.get(last).unwrap().index, 3);

        table.remove(r1);
        assert_eq!(names(&table), vec!["m", "r0", "z"]);
        assert_eq!(indices(&table), vec![0, 1, 2]);
        assert_eq!(table.get(r0).unwrap().index, 1);
        assert!(table.remove(r1).is_none());
    }

    #[test]
    fn test_density_under_random_edits() {
        let mut table = ElementTable::new();
        let mut live = Vec::new();
        for step in 0..60usize {
            if step % 3 == 2 && !live.is_empty() {
                let victim = live.remove((step * 7) % live.len());
                table.remove(victim);
            } else {
                let at = if table.is_empty() { 0 } else { (step * 5) % (table.len() + 1) };
                live.push(table.insert(at, Element::new(ElementKind::Attribute, "e")));
            }
            let mut seen = indices(&table);
            seen.sort_unstable();
            assert_eq!(seen, (0..table.len()).collect::<Vec<_>>());
            for (position, id) in table.ids().iter().enumerate() {
                assert_eq!(table.get(*id).unwrap().index, position);
            }
        }
    }
}
