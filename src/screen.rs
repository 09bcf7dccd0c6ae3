use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, warn};

use crate::action_mode::{ActionModeController, Effect, Gesture};
use crate::data::ChapterService;
use crate::dispatch::{BatchCommand, BatchCommandDispatcher, Dispatch, DownloadPreset, ServiceCall};
use crate::error::{DeleteError, FetchError, FetchSource, MergeError};
use crate::merge::{self, CancelToken};
use crate::model::{
    Category, ChapterFilters, ChapterList, ChapterRecord, DisplayMode, Item, ItemId, SortMode,
};
use crate::refresh::RefreshStateTracker;
use crate::selection::SelectionSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    FetchFailed(String),
    CommandFailed(String),
    NoNextChapter,
    NothingToDownload,
    SuggestAddToLibrary,
    AddedToLibrary,
    RemovedFromLibrary,
    NoCategories,
    OfferDeleteDownloads,
    ChooseCategories {
        categories: Vec<Category>,
        preselected: Vec<usize>,
    },
    Merged(Item),
    MergeFailed(String),
}

#[allow(unused_variables)]
pub trait ScreenHost {
    fn on_metadata_fetch_started(&mut self) {}
    fn on_metadata_fetch_done(&mut self) {}
    fn on_metadata_fetch_error(&mut self, err: &FetchError) {}
    fn on_chapters_fetch_started(&mut self) {}
    fn on_chapters_fetch_done(&mut self) {}
    fn on_chapters_fetch_error(&mut self, err: &FetchError) {}
    fn on_chapters_deleted(&mut self, chapters: &[ChapterRecord]) {}
    fn on_chapters_deleted_error(&mut self, err: &DeleteError) {}
    fn on_busy_changed(&mut self, busy: bool) {}
    fn on_open_chapter(&mut self, chapter: &ChapterRecord) {}
    fn on_notice(&mut self, notice: Notice) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Read,
    Unread,
    Downloaded,
    Bookmarked,
}

#[derive(Debug, Clone, Default)]
pub struct ScreenOptions {
    pub local_only: bool,
    pub downloaded_only: bool,
    // Category for new favorites. `0` means no category, a negative value
    // means ask every time.
    pub default_category: i64,
}

enum AsyncResponse {
    Metadata {
        result: Result<Item>,
    },
    Chapters {
        result: Result<Vec<ChapterRecord>>,
    },
    Command {
        call: ServiceCall,
        result: Result<Vec<ChapterRecord>>,
    },
}

pub struct ChapterScreen {
    service: Arc<dyn ChapterService>,
    item: Item,
    chapters: Vec<ChapterRecord>,
    visible: ChapterList,
    selection: SelectionSet,
    controller: ActionModeController,
    refresh: RefreshStateTracker,
    options: ScreenOptions,
    has_requested_chapters: bool,
    cancel: CancelToken,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl ChapterScreen {
    pub fn open(
        service: Arc<dyn ChapterService>,
        item: ItemId,
        options: ScreenOptions,
    ) -> Result<Self> {
        let item = service.load_item(item)?;
        let chapters = service.unread_candidates(item.id)?;
        let (response_tx, response_rx) = unbounded();
        let visible = item.visible_chapters(&chapters, options.downloaded_only);
        Ok(Self {
            controller: ActionModeController::new(options.local_only),
            service,
            item,
            chapters,
            visible,
            selection: SelectionSet::new(),
            refresh: RefreshStateTracker::new(),
            options,
            has_requested_chapters: false,
            cancel: CancelToken::new(),
            response_tx,
            response_rx,
        })
    }

    pub fn start(&mut self, host: &mut dyn ScreenHost) {
        let item = self.item.clone();
        let chapters = self.chapters.clone();
        self.on_next_item(item, host);
        self.on_list_replaced(chapters, host);
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn chapters(&self) -> &[ChapterRecord] {
        &self.chapters
    }

    pub fn visible(&self) -> &ChapterList {
        &self.visible
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn controller(&self) -> &ActionModeController {
        &self.controller
    }

    pub fn busy(&self) -> bool {
        self.refresh.busy()
    }

    pub fn options(&self) -> &ScreenOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn action_title(&self) -> Option<String> {
        self.controller.title(&self.selection)
    }

    pub fn has_read_any(&self) -> bool {
        self.visible.iter().any(|chapter| chapter.read)
    }

    pub fn filters_forced(&self) -> bool {
        self.options.downloaded_only
    }

    // Fetching

    pub fn refresh(&mut self, host: &mut dyn ScreenHost) {
        self.fetch_metadata(true, host);
        self.fetch_chapters(true, host);
    }

    pub fn fetch_metadata(&mut self, manual: bool, host: &mut dyn ScreenHost) {
        let busy = self.refresh.start(FetchSource::Metadata);
        host.on_metadata_fetch_started();
        host.on_busy_changed(busy);
        debug!(item = self.item.id.0, manual, "fetching metadata");

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let item = self.item.id;
        thread::spawn(move || {
            let result = service.fetch_metadata(item, manual);
            let _ = tx.send(AsyncResponse::Metadata { result });
        });
    }

    pub fn fetch_chapters(&mut self, manual: bool, host: &mut dyn ScreenHost) {
        self.has_requested_chapters = true;
        let busy = self.refresh.start(FetchSource::Chapters);
        host.on_chapters_fetch_started();
        host.on_busy_changed(busy);
        debug!(item = self.item.id.0, manual, "fetching chapters");

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let item = self.item.id;
        thread::spawn(move || {
            let result = service.fetch_chapters(item, manual);
            let _ = tx.send(AsyncResponse::Chapters { result });
        });
    }

    pub fn poll_async(&mut self, host: &mut dyn ScreenHost) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message, host);
            changed = true;
        }
        changed
    }

    pub fn wait_async(&mut self, host: &mut dyn ScreenHost, timeout: Duration) -> bool {
        match self.response_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.handle_async_response(message, host);
                true
            }
            Err(_) => false,
        }
    }

    fn handle_async_response(&mut self, message: AsyncResponse, host: &mut dyn ScreenHost) {
        match message {
            AsyncResponse::Metadata { result } => {
                let busy = self.refresh.finish(FetchSource::Metadata);
                match result {
                    Ok(item) => {
                        host.on_metadata_fetch_done();
                        host.on_busy_changed(busy);
                        self.on_next_item(item, host);
                    }
                    Err(err) => {
                        let err = FetchError::new(FetchSource::Metadata, &err);
                        warn!(error = %err, "metadata fetch failed");
                        host.on_metadata_fetch_error(&err);
                        host.on_busy_changed(busy);
                        host.on_notice(Notice::FetchFailed(err.to_string()));
                    }
                }
            }
            AsyncResponse::Chapters { result } => {
                let busy = self.refresh.finish(FetchSource::Chapters);
                match result {
                    Ok(chapters) => {
                        host.on_chapters_fetch_done();
                        host.on_busy_changed(busy);
                        self.on_list_replaced(chapters, host);
                    }
                    Err(err) => {
                        let err = FetchError::new(FetchSource::Chapters, &err);
                        warn!(error = %err, "chapter fetch failed");
                        host.on_chapters_fetch_error(&err);
                        host.on_busy_changed(busy);
                        host.on_notice(Notice::FetchFailed(err.to_string()));
                    }
                }
            }
            AsyncResponse::Command { call, result } => match result {
                Ok(chapters) => {
                    if call.is_delete() {
                        host.on_chapters_deleted(&call.deleted_view());
                    }
                    self.on_list_replaced(chapters, host);
                }
                Err(err) if call.is_delete() => {
                    // No rollback: the data layer resyncs on its own.
                    let err = DeleteError {
                        message: format!("{err:#}"),
                    };
                    error!(error = %err, "chapter deletion failed");
                    host.on_chapters_deleted_error(&err);
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "chapter update failed");
                    host.on_notice(Notice::CommandFailed(format!("{err:#}")));
                }
            },
        }
    }

    pub fn on_next_item(&mut self, item: Item, host: &mut dyn ScreenHost) {
        let initialized = item.initialized;
        let reorder = item.sorting != self.item.sorting
            || item.sort_descending != self.item.sort_descending
            || item.filters != self.item.filters;
        self.item = item;
        if reorder {
            self.rebuild_visible();
        }
        if !initialized {
            self.fetch_metadata(false, host);
        }
    }

    pub fn on_list_replaced(
        &mut self,
        chapters: Vec<ChapterRecord>,
        host: &mut dyn ScreenHost,
    ) -> Effect {
        if !self.has_requested_chapters && chapters.is_empty() {
            self.fetch_chapters(false, host);
        }
        self.chapters = chapters;
        self.rebuild_visible()
    }

    fn rebuild_visible(&mut self) -> Effect {
        self.visible = self
            .item
            .visible_chapters(&self.chapters, self.options.downloaded_only);
        self.controller.reconcile(&self.visible, &mut self.selection)
    }

    // Selection

    pub fn gesture(&mut self, gesture: Gesture, host: &mut dyn ScreenHost) -> Effect {
        let effect = self
            .controller
            .handle(gesture, &self.visible, &mut self.selection);
        if let Effect::OpenChapter(id) = effect {
            if let Some(chapter) = self.visible.find(id) {
                host.on_open_chapter(chapter);
            }
        }
        effect
    }

    pub fn close(&mut self) {
        self.cancel.cancel();
        self.controller
            .handle(Gesture::Detach, &self.visible, &mut self.selection);
    }

    pub fn run_command(&mut self, command: BatchCommand, host: &mut dyn ScreenHost) -> Dispatch {
        let dispatch = BatchCommandDispatcher::dispatch(
            command,
            &self.visible,
            self.item.sort_descending,
            &mut self.controller,
            &mut self.selection,
        );
        if let Dispatch::Call(call) = &dispatch {
            self.execute(call.clone(), host);
        }
        dispatch
    }

    pub fn download_preset(&mut self, preset: DownloadPreset, host: &mut dyn ScreenHost) {
        let chapters = preset.plan(&self.chapters);
        if !chapters.is_empty() {
            self.execute(ServiceCall::Download(chapters), host);
        } else {
            host.on_notice(Notice::NothingToDownload);
        }
        self.controller
            .handle(Gesture::Dismiss, &self.visible, &mut self.selection);
    }

    pub fn custom_download_limit(&self) -> usize {
        self.chapters.len()
    }

    fn execute(&mut self, call: ServiceCall, host: &mut dyn ScreenHost) {
        if call.is_download() && !self.item.favorite {
            host.on_notice(Notice::SuggestAddToLibrary);
        }
        debug!(records = call.records().len(), "dispatching chapter update");
        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let item = self.item.id;
        thread::spawn(move || {
            let result = call
                .run(service.as_ref(), item)
                .and_then(|_| service.unread_candidates(item));
            let _ = tx.send(AsyncResponse::Command { call, result });
        });
    }

    // Reading

    pub fn next_unread(&self) -> Option<ChapterRecord> {
        let mut unfiltered = self.item.clone();
        unfiltered.filters.clear();
        let ordered = unfiltered.visible_chapters(&self.chapters, false);
        let found = if self.item.sort_descending {
            ordered.iter().rev().find(|chapter| !chapter.read)
        } else {
            ordered.iter().find(|chapter| !chapter.read)
        };
        found.cloned()
    }

    pub fn open_next_unread(&mut self, host: &mut dyn ScreenHost) {
        match self.next_unread() {
            Some(chapter) => host.on_open_chapter(&chapter),
            None => host.on_notice(Notice::NoNextChapter),
        }
    }

    // Sorting, filtering and display

    pub fn set_sorting(&mut self, mode: SortMode) -> Result<()> {
        self.service
            .set_sort_order(self.item.id, mode, self.item.sort_descending)?;
        self.item.sorting = mode;
        self.rebuild_visible();
        Ok(())
    }

    pub fn reverse_sort_order(&mut self) -> Result<()> {
        let descending = !self.item.sort_descending;
        self.service
            .set_sort_order(self.item.id, self.item.sorting, descending)?;
        self.item.sort_descending = descending;
        self.rebuild_visible();
        Ok(())
    }

    pub fn set_filter(&mut self, kind: FilterKind, enabled: bool) -> Result<()> {
        if kind == FilterKind::Downloaded && self.filters_forced() {
            return Ok(());
        }
        let mut filters = self.item.filters;
        match kind {
            FilterKind::Read => filters.read = enabled,
            FilterKind::Unread => filters.unread = enabled,
            FilterKind::Downloaded => filters.downloaded = enabled,
            FilterKind::Bookmarked => filters.bookmarked = enabled,
        }
        self.apply_filters(filters)
    }

    pub fn remove_filters(&mut self) -> Result<()> {
        self.apply_filters(ChapterFilters::default())
    }

    fn apply_filters(&mut self, filters: ChapterFilters) -> Result<()> {
        self.service.set_filters(self.item.id, filters)?;
        self.item.filters = filters;
        self.rebuild_visible();
        Ok(())
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) -> Result<()> {
        self.service.set_display_mode(self.item.id, mode)?;
        self.item.display_mode = mode;
        Ok(())
    }

    // Library

    pub fn on_favorite_click(&mut self, host: &mut dyn ScreenHost) -> Result<()> {
        if self.item.favorite {
            self.toggle_favorite(host)?;
            host.on_notice(Notice::RemovedFromLibrary);
            Ok(())
        } else {
            self.add_to_library(host)
        }
    }

    fn toggle_favorite(&mut self, host: &mut dyn ScreenHost) -> Result<bool> {
        let favorite = !self.item.favorite;
        self.service.set_favorite(self.item.id, favorite)?;
        self.item.favorite = favorite;
        if !favorite && self.service.has_downloads(self.item.id)? {
            host.on_notice(Notice::OfferDeleteDownloads);
        }
        Ok(favorite)
    }

    pub fn add_to_library(&mut self, host: &mut dyn ScreenHost) -> Result<()> {
        let categories = self.service.categories()?;
        let default_id = self.options.default_category;

        if let Some(category) = categories.iter().find(|c| c.id == default_id) {
            self.toggle_favorite(host)?;
            self.service
                .move_to_category(self.item.id, Some(category.id))?;
            host.on_notice(Notice::AddedToLibrary);
        } else if default_id == 0 || categories.is_empty() {
            self.toggle_favorite(host)?;
            self.service.move_to_category(self.item.id, None)?;
            host.on_notice(Notice::AddedToLibrary);
        } else {
            let current = self.service.item_category_ids(self.item.id)?;
            host.on_notice(choose_categories(categories, &current));
        }
        Ok(())
    }

    pub fn edit_categories(&mut self, host: &mut dyn ScreenHost) -> Result<()> {
        let categories = self.service.categories()?;
        if categories.is_empty() {
            host.on_notice(Notice::NoCategories);
            return Ok(());
        }
        let current = self.service.item_category_ids(self.item.id)?;
        host.on_notice(choose_categories(categories, &current));
        Ok(())
    }

    pub fn update_categories(&mut self, categories: &[i64], host: &mut dyn ScreenHost) -> Result<()> {
        if !self.item.favorite {
            self.toggle_favorite(host)?;
            host.on_notice(Notice::AddedToLibrary);
        }
        self.service.move_to_categories(self.item.id, categories)
    }

    pub fn delete_downloads(&mut self, host: &mut dyn ScreenHost) -> Result<()> {
        self.service.delete_downloads(self.item.id)?;
        let chapters = self.service.unread_candidates(self.item.id)?;
        self.on_list_replaced(chapters, host);
        Ok(())
    }

    pub fn merge_with(
        &mut self,
        other: ItemId,
        host: &mut dyn ScreenHost,
    ) -> Result<Option<Item>, MergeError> {
        let service = self.service.clone();
        let item = self.item.id;
        match merge::run_shielded(&self.cancel, move || service.merge_items(item, other)) {
            Ok(merged) => {
                self.on_next_item(merged.clone(), host);
                match self.service.unread_candidates(merged.id) {
                    Ok(chapters) => {
                        self.on_list_replaced(chapters, host);
                    }
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "reloading merged chapters failed");
                        host.on_notice(Notice::CommandFailed(format!("{err:#}")));
                    }
                }
                host.on_notice(Notice::Merged(merged.clone()));
                Ok(Some(merged))
            }
            Err(MergeError::Cancelled) => Err(MergeError::Cancelled),
            Err(MergeError::Failed(message)) => {
                host.on_notice(Notice::MergeFailed(message));
                Ok(None)
            }
        }
    }
}

fn choose_categories(categories: Vec<Category>, current: &[i64]) -> Notice {
    let preselected = current
        .iter()
        .filter_map(|id| categories.iter().position(|c| c.id == *id))
        .collect();
    Notice::ChooseCategories {
        categories,
        preselected,
    }
}
