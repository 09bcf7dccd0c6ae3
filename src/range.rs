use crate::model::{ChapterId, ChapterList};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeAnchor {
    slot: Option<(usize, ChapterId)>,
}

impl RangeAnchor {
    pub const NONE: RangeAnchor = RangeAnchor { slot: None };

    pub fn at(index: usize, id: ChapterId) -> Self {
        Self {
            slot: Some((index, id)),
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.slot.map(|(index, _)| index)
    }

    /// The anchor as a plain index, `-1` when unset.
    pub fn raw(&self) -> i64 {
        self.index().map_or(-1, |index| index as i64)
    }

    pub fn reset(&mut self) {
        self.slot = None;
    }

    pub fn reconcile(&mut self, list: &ChapterList) {
        self.slot = self
            .slot
            .and_then(|(_, id)| list.position(id).map(|index| (index, id)));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOutcome {
    Select(Vec<usize>),
    Toggle(usize),
}

pub struct RangeSelector;

impl RangeSelector {
    pub fn apply(
        anchor: Option<usize>,
        pressed: usize,
        is_selected: impl Fn(usize) -> bool,
    ) -> RangeOutcome {
        match anchor {
            None => {
                let indices = if is_selected(pressed) {
                    Vec::new()
                } else {
                    vec![pressed]
                };
                RangeOutcome::Select(indices)
            }
            Some(anchor) if anchor > pressed => RangeOutcome::Select(
                (pressed..anchor).filter(|idx| !is_selected(*idx)).collect(),
            ),
            Some(anchor) if anchor < pressed => RangeOutcome::Select(
                (anchor + 1..=pressed)
                    .filter(|idx| !is_selected(*idx))
                    .collect(),
            ),
            Some(_) => RangeOutcome::Toggle(pressed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::model::ChapterRecord;

    #[test]
    fn no_anchor_selects_only_pressed() {
        let outcome = RangeSelector::apply(None, 4, |_| false);
        assert_eq!(outcome, RangeOutcome::Select(vec![4]));
    }

    #[test]
    fn anchor_above_selects_half_open_range_below() {
        let outcome = RangeSelector::apply(Some(5), 2, |_| false);
        assert_eq!(outcome, RangeOutcome::Select(vec![2, 3, 4]));
    }

    #[test]
    fn anchor_below_selects_half_open_range_above() {
        let outcome = RangeSelector::apply(Some(2), 5, |_| false);
        assert_eq!(outcome, RangeOutcome::Select(vec![3, 4, 5]));
    }

    #[test]
    fn already_selected_indices_are_skipped() {
        let selected: HashSet<usize> = [3].into_iter().collect();
        let outcome = RangeSelector::apply(Some(2), 5, |idx| selected.contains(&idx));
        assert_eq!(outcome, RangeOutcome::Select(vec![4, 5]));
    }

    #[test]
    fn pressing_the_anchor_toggles_it() {
        let outcome = RangeSelector::apply(Some(3), 3, |_| true);
        assert_eq!(outcome, RangeOutcome::Toggle(3));
    }

    #[test]
    fn anchor_follows_chapter_identity() {
        let list = ChapterList::new(vec![
            ChapterRecord::new(1, "one", 0),
            ChapterRecord::new(2, "two", 1),
        ]);
        let mut anchor = RangeAnchor::at(0, ChapterId(2));
        anchor.reconcile(&list);
        assert_eq!(anchor.index(), Some(1));

        let shrunk = ChapterList::new(vec![ChapterRecord::new(1, "one", 0)]);
        anchor.reconcile(&shrunk);
        assert_eq!(anchor.raw(), -1);
    }
}
