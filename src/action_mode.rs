use tracing::debug;

use crate::dispatch::BatchCommand;
use crate::model::{ChapterId, ChapterList, ChapterRecord};
use crate::range::{RangeAnchor, RangeOutcome, RangeSelector};
use crate::selection::SelectionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Inactive,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Click(usize),
    LongPress(usize),
    Dismiss,
    Detach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    OpenChapter(ChapterId),
    Entered,
    SelectionChanged,
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandVisibility {
    pub download: bool,
    pub delete: bool,
    pub bookmark: bool,
    pub remove_bookmark: bool,
    pub mark_read: bool,
    pub mark_unread: bool,
}

impl CommandVisibility {
    pub fn compute(selected: &[ChapterRecord], local_only: bool) -> Self {
        if selected.is_empty() {
            return Self::default();
        }
        Self {
            download: !local_only && selected.iter().any(|c| !c.is_downloaded()),
            delete: !local_only && selected.iter().any(|c| c.is_downloaded()),
            bookmark: selected.iter().any(|c| !c.bookmark),
            remove_bookmark: selected.iter().all(|c| c.bookmark),
            mark_read: selected.iter().any(|c| !c.read),
            mark_unread: selected.iter().all(|c| c.read),
        }
    }

    pub fn allows(&self, command: BatchCommand) -> bool {
        match command {
            BatchCommand::Download => self.download,
            BatchCommand::Delete => self.delete,
            BatchCommand::Bookmark(true) => self.bookmark,
            BatchCommand::Bookmark(false) => self.remove_bookmark,
            BatchCommand::MarkRead(true) => self.mark_read,
            BatchCommand::MarkRead(false) => self.mark_unread,
            BatchCommand::MarkPreviousAsRead
            | BatchCommand::SelectAll
            | BatchCommand::SelectInverse => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionModeController {
    phase: Phase,
    anchor: RangeAnchor,
    visibility: CommandVisibility,
    local_only: bool,
}

impl ActionModeController {
    pub fn new(local_only: bool) -> Self {
        Self {
            local_only,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn anchor(&self) -> RangeAnchor {
        self.anchor
    }

    pub fn visibility(&self) -> CommandVisibility {
        self.visibility
    }

    pub fn title(&self, selection: &SelectionSet) -> Option<String> {
        self.is_active().then(|| selection.len().to_string())
    }

    pub fn handle(
        &mut self,
        gesture: Gesture,
        list: &ChapterList,
        selection: &mut SelectionSet,
    ) -> Effect {
        match (self.phase, gesture) {
            (_, Gesture::Dismiss | Gesture::Detach) => {
                if self.is_active() || !selection.is_empty() {
                    self.finish(selection);
                    Effect::Exited
                } else {
                    self.anchor.reset();
                    Effect::None
                }
            }
            (Phase::Inactive, Gesture::Click(index)) => match list.get(index) {
                Some(record) => Effect::OpenChapter(record.id),
                None => Effect::None,
            },
            (Phase::Active, Gesture::Click(index)) => {
                let Some(record) = list.get(index) else {
                    return Effect::None;
                };
                self.anchor = RangeAnchor::at(index, record.id);
                selection.toggle(record.id);
                self.settle(list, selection, Effect::SelectionChanged)
            }
            (phase, Gesture::LongPress(index)) => {
                let Some(record) = list.get(index) else {
                    return Effect::None;
                };
                let entering = phase == Phase::Inactive;
                if entering {
                    self.phase = Phase::Active;
                    self.anchor.reset();
                    debug!(index, "action mode entered");
                }
                let outcome = RangeSelector::apply(self.anchor.index(), index, |idx| {
                    selection.is_index_selected(list, idx)
                });
                match outcome {
                    RangeOutcome::Select(indices) => {
                        for idx in indices {
                            if let Some(target) = list.get(idx) {
                                selection.add(target.id);
                            }
                        }
                    }
                    RangeOutcome::Toggle(idx) => {
                        if let Some(target) = list.get(idx) {
                            selection.toggle(target.id);
                        }
                    }
                }
                self.anchor = RangeAnchor::at(index, record.id);
                let effect = if entering {
                    Effect::Entered
                } else {
                    Effect::SelectionChanged
                };
                self.settle(list, selection, effect)
            }
        }
    }

    pub fn invalidate(&mut self, list: &ChapterList, selection: &mut SelectionSet) -> bool {
        if !self.is_active() {
            self.visibility = CommandVisibility::default();
            return false;
        }
        if selection.is_empty() {
            self.finish(selection);
            return false;
        }
        self.visibility = CommandVisibility::compute(&selection.records(list), self.local_only);
        true
    }

    pub fn finish(&mut self, selection: &mut SelectionSet) {
        if self.is_active() {
            debug!(selected = selection.len(), "action mode finished");
        }
        self.phase = Phase::Inactive;
        self.anchor.reset();
        self.visibility = CommandVisibility::default();
        selection.clear();
    }

    pub fn reconcile(&mut self, list: &ChapterList, selection: &mut SelectionSet) -> Effect {
        let dropped = selection.reconcile(list);
        self.anchor.reconcile(list);
        if dropped > 0 {
            debug!(dropped, "selection entries vanished with list replacement");
        }
        if selection.is_empty() {
            if self.is_active() {
                self.finish(selection);
                return Effect::Exited;
            }
            self.anchor.reset();
            return Effect::None;
        }
        let entering = !self.is_active();
        self.phase = Phase::Active;
        self.invalidate(list, selection);
        if entering {
            Effect::Entered
        } else {
            Effect::SelectionChanged
        }
    }

    pub fn refresh_after_bulk(
        &mut self,
        list: &ChapterList,
        selection: &mut SelectionSet,
    ) -> Effect {
        if selection.is_empty() {
            let was_active = self.is_active();
            self.finish(selection);
            return if was_active { Effect::Exited } else { Effect::None };
        }
        self.phase = Phase::Active;
        self.invalidate(list, selection);
        Effect::SelectionChanged
    }

    fn settle(&mut self, list: &ChapterList, selection: &mut SelectionSet, effect: Effect) -> Effect {
        if self.invalidate(list, selection) {
            effect
        } else {
            Effect::Exited
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DownloadStatus;

    fn list(len: i64) -> ChapterList {
        ChapterList::new(
            (0..len)
                .map(|id| ChapterRecord::new(id, format!("Chapter {id}"), id as i32))
                .collect(),
        )
    }

    #[test]
    fn click_while_inactive_opens_chapter() {
        let list = list(3);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);

        let effect = controller.handle(Gesture::Click(1), &list, &mut selection);

        assert_eq!(effect, Effect::OpenChapter(ChapterId(1)));
        assert_eq!(controller.phase(), Phase::Inactive);
        assert!(selection.is_empty());
    }

    #[test]
    fn long_press_enters_and_selects_pressed_item() {
        let list = list(3);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);

        let effect = controller.handle(Gesture::LongPress(2), &list, &mut selection);

        assert_eq!(effect, Effect::Entered);
        assert!(controller.is_active());
        assert_eq!(selection.to_list(), vec![ChapterId(2)]);
        assert_eq!(controller.anchor().raw(), 2);
        assert_eq!(controller.title(&selection).as_deref(), Some("1"));
    }

    #[test]
    fn deselecting_sole_item_exits_and_clears_anchor() {
        let list = list(3);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);
        controller.handle(Gesture::LongPress(1), &list, &mut selection);

        let effect = controller.handle(Gesture::Click(1), &list, &mut selection);

        assert_eq!(effect, Effect::Exited);
        assert_eq!(controller.phase(), Phase::Inactive);
        assert_eq!(controller.anchor().raw(), -1);
        assert!(selection.is_empty());
    }

    #[test]
    fn long_press_extends_range_from_anchor() {
        let list = list(8);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);
        controller.handle(Gesture::LongPress(5), &list, &mut selection);

        controller.handle(Gesture::LongPress(2), &list, &mut selection);

        let mut ids: Vec<i64> = selection.to_list().into_iter().map(|id| id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![2, 3, 4, 5]);
        assert_eq!(controller.anchor().raw(), 2);
    }

    #[test]
    fn long_press_on_anchor_toggles_sole_selection_off() {
        let list = list(4);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);
        controller.handle(Gesture::LongPress(2), &list, &mut selection);
        assert_eq!(selection.to_list(), vec![ChapterId(2)]);

        let effect = controller.handle(Gesture::LongPress(2), &list, &mut selection);

        assert_eq!(effect, Effect::Exited);
        assert_eq!(controller.phase(), Phase::Inactive);
        assert_eq!(controller.anchor().raw(), -1);
        assert!(selection.is_empty());
    }

    #[test]
    fn long_press_on_anchor_keeps_rest_of_selection() {
        let list = list(4);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);
        controller.handle(Gesture::LongPress(0), &list, &mut selection);
        controller.handle(Gesture::Click(3), &list, &mut selection);

        let effect = controller.handle(Gesture::LongPress(3), &list, &mut selection);

        assert_eq!(effect, Effect::SelectionChanged);
        assert!(controller.is_active());
        assert_eq!(selection.to_list(), vec![ChapterId(0)]);
        assert_eq!(controller.anchor().raw(), 3);
    }

    #[test]
    fn dismiss_clears_everything() {
        let list = list(4);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);
        controller.handle(Gesture::LongPress(0), &list, &mut selection);
        controller.handle(Gesture::LongPress(3), &list, &mut selection);

        let effect = controller.handle(Gesture::Dismiss, &list, &mut selection);

        assert_eq!(effect, Effect::Exited);
        assert!(selection.is_empty());
        assert_eq!(controller.anchor().raw(), -1);
        assert_eq!(controller.visibility(), CommandVisibility::default());
    }

    #[test]
    fn empty_selection_while_active_forces_inactive() {
        let list = list(2);
        let mut selection = SelectionSet::new();
        let mut controller = ActionModeController::new(false);
        controller.handle(Gesture::LongPress(0), &list, &mut selection);
        selection.clear();

        assert!(!controller.invalidate(&list, &mut selection));
        assert_eq!(controller.phase(), Phase::Inactive);
    }

    #[test]
    fn mixed_download_state_shows_download_and_delete() {
        let mut downloaded = ChapterRecord::new(1, "one", 0);
        downloaded.download = DownloadStatus::Downloaded;
        let remote = ChapterRecord::new(2, "two", 1);

        let visibility = CommandVisibility::compute(&[downloaded, remote], false);

        assert!(visibility.download);
        assert!(visibility.delete);
    }

    #[test]
    fn local_only_source_hides_download_and_delete() {
        let mut downloaded = ChapterRecord::new(1, "one", 0);
        downloaded.download = DownloadStatus::Downloaded;
        let visibility = CommandVisibility::compute(&[downloaded], true);
        assert!(!visibility.download);
        assert!(!visibility.delete);
    }

    #[test]
    fn bookmark_and_read_predicates() {
        let mut a = ChapterRecord::new(1, "one", 0);
        a.bookmark = true;
        a.read = true;
        let mut b = ChapterRecord::new(2, "two", 1);
        b.bookmark = true;

        let visibility = CommandVisibility::compute(&[a.clone(), b], false);
        assert!(!visibility.bookmark);
        assert!(visibility.remove_bookmark);
        assert!(visibility.mark_read);
        assert!(!visibility.mark_unread);

        let only_read = CommandVisibility::compute(&[a], false);
        assert!(only_read.mark_unread);
        assert!(!only_read.mark_read);
    }

    #[test]
    fn reconcile_enters_when_selection_survives_replacement() {
        let mut selection = SelectionSet::new();
        selection.add(ChapterId(1));
        selection.add(ChapterId(3));
        let mut controller = ActionModeController::new(false);
        controller.handle(Gesture::LongPress(1), &list(4), &mut selection);

        let replaced = ChapterList::new(vec![
            ChapterRecord::new(0, "zero", 0),
            ChapterRecord::new(1, "one", 1),
        ]);
        let effect = controller.reconcile(&replaced, &mut selection);

        assert_eq!(effect, Effect::SelectionChanged);
        assert_eq!(selection.to_list(), vec![ChapterId(1)]);
        assert!(controller.is_active());
    }
}
