use std::collections::HashSet;

use anyhow::Result;
use tracing::debug;

use crate::action_mode::{ActionModeController, Effect};
use crate::data::ChapterService;
use crate::model::{ChapterId, ChapterList, ChapterRecord, DownloadStatus, ItemId};
use crate::selection::SelectionSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchCommand {
    Download,
    Delete,
    Bookmark(bool),
    MarkRead(bool),
    MarkPreviousAsRead,
    SelectAll,
    SelectInverse,
}

impl BatchCommand {
    pub fn label(self) -> &'static str {
        match self {
            BatchCommand::Download => "download",
            BatchCommand::Delete => "delete",
            BatchCommand::Bookmark(true) => "bookmark",
            BatchCommand::Bookmark(false) => "remove bookmark",
            BatchCommand::MarkRead(true) => "mark as read",
            BatchCommand::MarkRead(false) => "mark as unread",
            BatchCommand::MarkPreviousAsRead => "mark previous as read",
            BatchCommand::SelectAll => "select all",
            BatchCommand::SelectInverse => "select inverse",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Download(Vec<ChapterRecord>),
    Delete(Vec<ChapterRecord>),
    Bookmark(Vec<ChapterRecord>, bool),
    MarkRead(Vec<ChapterRecord>, bool),
}

impl ServiceCall {
    pub fn records(&self) -> &[ChapterRecord] {
        match self {
            ServiceCall::Download(records)
            | ServiceCall::Delete(records)
            | ServiceCall::Bookmark(records, _)
            | ServiceCall::MarkRead(records, _) => records,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ServiceCall::Delete(_))
    }

    pub fn is_download(&self) -> bool {
        matches!(self, ServiceCall::Download(_))
    }

    pub fn run(&self, service: &dyn ChapterService, item: ItemId) -> Result<()> {
        match self {
            ServiceCall::Download(records) => service.download_chapters(item, records),
            ServiceCall::Delete(records) => service.delete_chapters(item, records),
            ServiceCall::Bookmark(records, flag) => service.bookmark_chapters(records, *flag),
            ServiceCall::MarkRead(records, flag) => service.mark_read(records, *flag),
        }
    }

    pub fn deleted_view(&self) -> Vec<ChapterRecord> {
        self.records()
            .iter()
            .cloned()
            .map(|mut record| {
                record.download = DownloadStatus::NotDownloaded;
                record
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Noop,
    Call(ServiceCall),
    Selection(Effect),
}

pub struct BatchCommandDispatcher;

impl BatchCommandDispatcher {
    pub fn dispatch(
        command: BatchCommand,
        list: &ChapterList,
        sort_descending: bool,
        controller: &mut ActionModeController,
        selection: &mut SelectionSet,
    ) -> Dispatch {
        match command {
            BatchCommand::SelectAll => {
                for id in list.ids() {
                    selection.add(id);
                }
                Dispatch::Selection(controller.refresh_after_bulk(list, selection))
            }
            BatchCommand::SelectInverse => {
                for index in 0..list.len() {
                    if let Some(record) = list.get(index) {
                        selection.toggle(record.id);
                    }
                }
                selection.reconcile(list);
                Dispatch::Selection(controller.refresh_after_bulk(list, selection))
            }
            _ => {
                let selected = selection.records(list);
                if selected.is_empty() {
                    debug!(command = command.label(), "ignoring command on empty selection");
                    controller.finish(selection);
                    return Dispatch::Noop;
                }
                let call = match command {
                    BatchCommand::Download => Some(ServiceCall::Download(selected)),
                    BatchCommand::Delete => Some(ServiceCall::Delete(selected)),
                    BatchCommand::Bookmark(flag) => Some(ServiceCall::Bookmark(selected, flag)),
                    BatchCommand::MarkRead(flag) => Some(ServiceCall::MarkRead(selected, flag)),
                    BatchCommand::MarkPreviousAsRead => selection
                        .last()
                        .and_then(|last| previous_chapters(list, sort_descending, last))
                        .filter(|previous| !previous.is_empty())
                        .map(|previous| ServiceCall::MarkRead(previous, true)),
                    BatchCommand::SelectAll | BatchCommand::SelectInverse => None,
                };
                controller.finish(selection);
                call.map_or(Dispatch::Noop, Dispatch::Call)
            }
        }
    }
}

// Every chapter that comes before `target` in reading order.
// Reading order is the visible order, reversed when the list is sorted
// descending. Returns `None` when `target` is not in the list.
pub fn previous_chapters(
    list: &ChapterList,
    sort_descending: bool,
    target: ChapterId,
) -> Option<Vec<ChapterRecord>> {
    let ordered: Vec<&ChapterRecord> = if sort_descending {
        list.iter().rev().collect()
    } else {
        list.iter().collect()
    };
    let position = ordered.iter().position(|record| record.id == target)?;
    Some(ordered[..position].iter().map(|record| (*record).clone()).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPreset {
    Next,
    Next5,
    Next10,
    Custom(usize),
    Unread,
    All,
}

impl DownloadPreset {
    pub fn label(self) -> String {
        match self {
            DownloadPreset::Next => "next chapter".to_string(),
            DownloadPreset::Next5 => "next 5 chapters".to_string(),
            DownloadPreset::Next10 => "next 10 chapters".to_string(),
            DownloadPreset::Custom(amount) => format!("next {amount} chapters"),
            DownloadPreset::Unread => "unread chapters".to_string(),
            DownloadPreset::All => "all chapters".to_string(),
        }
    }

    pub fn plan(self, all: &[ChapterRecord]) -> Vec<ChapterRecord> {
        match self {
            DownloadPreset::Next => take_candidates(all, 1),
            DownloadPreset::Next5 => take_candidates(all, 5),
            DownloadPreset::Next10 => take_candidates(all, 10),
            DownloadPreset::Custom(amount) => take_candidates(all, amount),
            DownloadPreset::Unread => all.iter().filter(|c| !c.read).cloned().collect(),
            DownloadPreset::All => all.to_vec(),
        }
    }
}

/// Unread, not yet downloaded chapters, first occurrence per name, newest
/// source order first.
///
/// The filter, dedupe, sort sequence decides which duplicate survives and
/// must not be reordered.
pub fn download_candidates(all: &[ChapterRecord]) -> Vec<ChapterRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut candidates: Vec<ChapterRecord> = all
        .iter()
        .filter(|c| !c.read && c.download == DownloadStatus::NotDownloaded)
        .filter(|c| seen.insert(c.name.as_str()))
        .cloned()
        .collect();
    candidates.sort_by(|a, b| b.source_order.cmp(&a.source_order));
    candidates
}

fn take_candidates(all: &[ChapterRecord], amount: usize) -> Vec<ChapterRecord> {
    let mut candidates = download_candidates(all);
    candidates.truncate(amount);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_mode::Gesture;

    fn record(id: i64, name: &str, order: i32) -> ChapterRecord {
        ChapterRecord::new(id, name, order)
    }

    fn numbered(len: i64) -> ChapterList {
        ChapterList::new(
            (0..len)
                .map(|id| record(id, &format!("Chapter {id}"), id as i32))
                .collect(),
        )
    }

    fn active_with(list: &ChapterList, presses: &[usize]) -> (ActionModeController, SelectionSet) {
        let mut controller = ActionModeController::new(false);
        let mut selection = SelectionSet::new();
        for (n, index) in presses.iter().enumerate() {
            let gesture = if n == 0 {
                Gesture::LongPress(*index)
            } else {
                Gesture::Click(*index)
            };
            controller.handle(gesture, list, &mut selection);
        }
        (controller, selection)
    }

    #[test]
    fn preset_pipeline_dedupes_before_sorting() {
        let all = vec![record(1, "A", 3), record(2, "A", 1), record(3, "B", 2)];

        let planned = DownloadPreset::Custom(2).plan(&all);

        let summary: Vec<(&str, i32)> = planned
            .iter()
            .map(|c| (c.name.as_str(), c.source_order))
            .collect();
        assert_eq!(summary, vec![("A", 3), ("B", 2)]);
    }

    #[test]
    fn preset_pipeline_skips_read_and_downloaded() {
        let mut read = record(1, "A", 5);
        read.read = true;
        let mut queued = record(2, "B", 4);
        queued.download = DownloadStatus::Queued;
        let fresh = record(3, "C", 3);

        let planned = DownloadPreset::Next5.plan(&[read, queued, fresh]);

        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].id, ChapterId(3));
    }

    #[test]
    fn unread_and_all_presets_ignore_download_state() {
        let mut read = record(1, "A", 1);
        read.read = true;
        let mut downloaded = record(2, "B", 2);
        downloaded.download = DownloadStatus::Downloaded;
        let all = vec![read, downloaded];

        assert_eq!(DownloadPreset::Unread.plan(&all).len(), 1);
        assert_eq!(DownloadPreset::All.plan(&all).len(), 2);
    }

    #[test]
    fn download_forwards_selection_and_ends_action_mode() {
        let list = numbered(4);
        let (mut controller, mut selection) = active_with(&list, &[1, 3]);

        let dispatch = BatchCommandDispatcher::dispatch(
            BatchCommand::Download,
            &list,
            true,
            &mut controller,
            &mut selection,
        );

        let Dispatch::Call(ServiceCall::Download(records)) = dispatch else {
            panic!("expected download call, got {dispatch:?}");
        };
        let ids: Vec<i64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(!controller.is_active());
        assert!(selection.is_empty());
    }

    #[test]
    fn empty_selection_is_a_noop() {
        let list = numbered(2);
        let mut controller = ActionModeController::new(false);
        let mut selection = SelectionSet::new();

        let dispatch = BatchCommandDispatcher::dispatch(
            BatchCommand::MarkRead(true),
            &list,
            false,
            &mut controller,
            &mut selection,
        );

        assert_eq!(dispatch, Dispatch::Noop);
    }

    #[test]
    fn mark_previous_as_read_with_descending_sort() {
        // Visible list sorted descending: newest (id 5) first.
        let list = ChapterList::new((0..6).rev().map(|id| record(id, "c", id as i32)).collect());
        // Reading order is ids 0..=5; id 4 sits at ordered position 4.
        let index = list.position(ChapterId(4)).unwrap();
        let (mut controller, mut selection) = active_with(&list, &[index]);

        let dispatch = BatchCommandDispatcher::dispatch(
            BatchCommand::MarkPreviousAsRead,
            &list,
            true,
            &mut controller,
            &mut selection,
        );

        let Dispatch::Call(ServiceCall::MarkRead(records, true)) = dispatch else {
            panic!("expected mark read call, got {dispatch:?}");
        };
        let ids: Vec<i64> = records.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert!(!controller.is_active());
    }

    #[test]
    fn mark_previous_uses_last_selected_record() {
        let list = numbered(6);
        let (mut controller, mut selection) = active_with(&list, &[4, 2]);

        let dispatch = BatchCommandDispatcher::dispatch(
            BatchCommand::MarkPreviousAsRead,
            &list,
            false,
            &mut controller,
            &mut selection,
        );

        let Dispatch::Call(ServiceCall::MarkRead(records, true)) = dispatch else {
            panic!("expected mark read call, got {dispatch:?}");
        };
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn mark_previous_on_first_chapter_only_ends_action_mode() {
        let list = numbered(3);
        let (mut controller, mut selection) = active_with(&list, &[0]);

        let dispatch = BatchCommandDispatcher::dispatch(
            BatchCommand::MarkPreviousAsRead,
            &list,
            false,
            &mut controller,
            &mut selection,
        );

        assert_eq!(dispatch, Dispatch::Noop);
        assert!(!controller.is_active());
    }

    #[test]
    fn select_all_then_inverse_exits() {
        let list = numbered(3);
        let (mut controller, mut selection) = active_with(&list, &[1]);

        BatchCommandDispatcher::dispatch(
            BatchCommand::SelectAll,
            &list,
            false,
            &mut controller,
            &mut selection,
        );
        assert_eq!(selection.len(), 3);
        assert!(controller.is_active());

        let dispatch = BatchCommandDispatcher::dispatch(
            BatchCommand::SelectInverse,
            &list,
            false,
            &mut controller,
            &mut selection,
        );
        assert_eq!(dispatch, Dispatch::Selection(Effect::Exited));
        assert!(!controller.is_active());
    }

    #[test]
    fn select_inverse_flips_membership() {
        let list = numbered(4);
        let (mut controller, mut selection) = active_with(&list, &[0, 2]);

        BatchCommandDispatcher::dispatch(
            BatchCommand::SelectInverse,
            &list,
            false,
            &mut controller,
            &mut selection,
        );

        let mut ids: Vec<i64> = selection.to_list().into_iter().map(|id| id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
        assert!(controller.visibility().mark_read);
    }

    #[test]
    fn deleted_view_clears_download_status() {
        let mut downloaded = record(1, "A", 1);
        downloaded.download = DownloadStatus::Downloaded;
        let call = ServiceCall::Delete(vec![downloaded]);
        assert_eq!(call.deleted_view()[0].download, DownloadStatus::NotDownloaded);
    }
}
