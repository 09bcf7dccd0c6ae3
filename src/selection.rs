use indexmap::IndexSet;

use crate::model::{ChapterId, ChapterList, ChapterRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: IndexSet<ChapterId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ChapterId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: ChapterId) -> bool {
        self.ids.shift_remove(&id)
    }

    pub fn toggle(&mut self, id: ChapterId) -> bool {
        if self.remove(id) {
            false
        } else {
            self.add(id)
        }
    }

    pub fn contains(&self, id: ChapterId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_list(&self) -> Vec<ChapterId> {
        self.ids.iter().copied().collect()
    }

    pub fn last(&self) -> Option<ChapterId> {
        self.ids.last().copied()
    }

    pub fn reconcile(&mut self, list: &ChapterList) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| list.contains(*id));
        before - self.ids.len()
    }

    pub fn records(&self, list: &ChapterList) -> Vec<ChapterRecord> {
        self.ids
            .iter()
            .filter_map(|id| list.find(*id).cloned())
            .collect()
    }

    pub fn is_index_selected(&self, list: &ChapterList, index: usize) -> bool {
        list.get(index)
            .map(|record| self.contains(record.id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[i64]) -> ChapterList {
        ChapterList::new(
            ids.iter()
                .map(|id| ChapterRecord::new(*id, format!("Chapter {id}"), *id as i32))
                .collect(),
        )
    }

    #[test]
    fn reconcile_drops_removed_ids() {
        let mut selection = SelectionSet::new();
        selection.add(ChapterId(1));
        selection.add(ChapterId(3));

        let dropped = selection.reconcile(&list(&[1, 2]));

        assert_eq!(dropped, 1);
        assert_eq!(selection.to_list(), vec![ChapterId(1)]);
    }

    #[test]
    fn toggle_flips_membership() {
        let mut selection = SelectionSet::new();
        assert!(selection.toggle(ChapterId(7)));
        assert!(selection.contains(ChapterId(7)));
        assert!(!selection.toggle(ChapterId(7)));
        assert!(selection.is_empty());
    }

    #[test]
    fn last_follows_insertion_order() {
        let mut selection = SelectionSet::new();
        selection.add(ChapterId(5));
        selection.add(ChapterId(2));
        selection.add(ChapterId(9));
        selection.remove(ChapterId(9));
        assert_eq!(selection.last(), Some(ChapterId(2)));
    }

    #[test]
    fn records_resolve_in_selection_order() {
        let mut selection = SelectionSet::new();
        selection.add(ChapterId(3));
        selection.add(ChapterId(1));
        let names: Vec<String> = selection
            .records(&list(&[1, 2, 3]))
            .into_iter()
            .map(|record| record.name)
            .collect();
        assert_eq!(names, vec!["Chapter 3", "Chapter 1"]);
    }
}
