use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterId(pub i64);

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[default]
    NotDownloaded,
    Queued,
    Downloading,
    Downloaded,
    Error,
}

impl DownloadStatus {
    pub fn is_downloaded(self) -> bool {
        matches!(self, DownloadStatus::Downloaded)
    }

    pub fn as_i64(self) -> i64 {
        match self {
            DownloadStatus::NotDownloaded => 0,
            DownloadStatus::Queued => 1,
            DownloadStatus::Downloading => 2,
            DownloadStatus::Downloaded => 3,
            DownloadStatus::Error => 4,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => DownloadStatus::Queued,
            2 => DownloadStatus::Downloading,
            3 => DownloadStatus::Downloaded,
            4 => DownloadStatus::Error,
            _ => DownloadStatus::NotDownloaded,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DownloadStatus::NotDownloaded => "",
            DownloadStatus::Queued => "queued",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub id: ChapterId,
    pub source_order: i32,
    pub chapter_number: f32,
    pub name: String,
    pub read: bool,
    pub bookmark: bool,
    #[serde(default)]
    pub download: DownloadStatus,
    #[serde(default)]
    pub date_upload: i64,
    #[serde(default)]
    pub last_page_read: i32,
}

impl ChapterRecord {
    pub fn new(id: i64, name: impl Into<String>, source_order: i32) -> Self {
        Self {
            id: ChapterId(id),
            source_order,
            chapter_number: -1.0,
            name: name.into(),
            read: false,
            bookmark: false,
            download: DownloadStatus::NotDownloaded,
            date_upload: 0,
            last_page_read: 0,
        }
    }

    pub fn is_downloaded(&self) -> bool {
        self.download.is_downloaded()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterList {
    records: Vec<ChapterRecord>,
}

impl ChapterList {
    pub fn new(records: Vec<ChapterRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChapterRecord> {
        self.records.get(index)
    }

    pub fn position(&self, id: ChapterId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    pub fn find(&self, id: ChapterId) -> Option<&ChapterRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn contains(&self, id: ChapterId) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = ChapterId> + '_ {
        self.records.iter().map(|record| record.id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChapterRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[ChapterRecord] {
        &self.records
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortMode {
    #[default]
    Source,
    Number,
    UploadDate,
}

impl SortMode {
    pub fn as_i64(self) -> i64 {
        match self {
            SortMode::Source => 0,
            SortMode::Number => 1,
            SortMode::UploadDate => 2,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => SortMode::Number,
            2 => SortMode::UploadDate,
            _ => SortMode::Source,
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortMode::Source => SortMode::Number,
            SortMode::Number => SortMode::UploadDate,
            SortMode::UploadDate => SortMode::Source,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::Source => "source",
            SortMode::Number => "number",
            SortMode::UploadDate => "upload date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    #[default]
    Name,
    Number,
}

impl DisplayMode {
    pub fn as_i64(self) -> i64 {
        match self {
            DisplayMode::Name => 0,
            DisplayMode::Number => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            DisplayMode::Number
        } else {
            DisplayMode::Name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChapterFilters {
    pub read: bool,
    pub unread: bool,
    pub downloaded: bool,
    pub bookmarked: bool,
}

impl ChapterFilters {
    pub fn is_active(&self) -> bool {
        self.read || self.unread || self.downloaded || self.bookmarked
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, record: &ChapterRecord) -> bool {
        if self.read && !record.read {
            return false;
        }
        if self.unread && record.read {
            return false;
        }
        if self.downloaded && !record.is_downloaded() {
            return false;
        }
        if self.bookmarked && !record.bookmark {
            return false;
        }
        true
    }

    pub fn apply(&self, records: &[ChapterRecord]) -> Vec<ChapterRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub source_id: i64,
    pub favorite: bool,
    pub initialized: bool,
    pub sorting: SortMode,
    pub sort_descending: bool,
    pub display_mode: DisplayMode,
    pub filters: ChapterFilters,
}

impl Item {
    pub fn new(id: i64, title: impl Into<String>, source_id: i64) -> Self {
        Self {
            id: ItemId(id),
            title: title.into(),
            source_id,
            favorite: false,
            initialized: false,
            sorting: SortMode::Source,
            sort_descending: true,
            display_mode: DisplayMode::Name,
            filters: ChapterFilters::default(),
        }
    }

    pub fn visible_chapters(&self, all: &[ChapterRecord], force_downloaded: bool) -> ChapterList {
        let mut filters = self.filters;
        if force_downloaded {
            filters.downloaded = true;
        }
        let mut visible = filters.apply(all);
        let descending = self.sort_descending;
        visible.sort_by(|a, b| {
            let ord = match self.sorting {
                // Source order 0 is the newest chapter.
                SortMode::Source => b.source_order.cmp(&a.source_order),
                SortMode::Number => a
                    .chapter_number
                    .partial_cmp(&b.chapter_number)
                    .unwrap_or(Ordering::Equal),
                SortMode::UploadDate => a.date_upload.cmp(&b.date_upload),
            };
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        ChapterList::new(visible)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub order: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: i64, order: i32, number: f32) -> ChapterRecord {
        let mut record = ChapterRecord::new(id, format!("Ch. {number}"), order);
        record.chapter_number = number;
        record
    }

    #[test]
    fn source_sort_descending_puts_newest_first() {
        let item = Item::new(1, "Item", 1);
        let all = vec![chapter(10, 2, 1.0), chapter(11, 0, 3.0), chapter(12, 1, 2.0)];
        let visible = item.visible_chapters(&all, false);
        let ids: Vec<i64> = visible.ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![11, 12, 10]);
    }

    #[test]
    fn number_sort_ascending() {
        let mut item = Item::new(1, "Item", 1);
        item.sorting = SortMode::Number;
        item.sort_descending = false;
        let all = vec![chapter(10, 2, 3.0), chapter(11, 0, 1.0), chapter(12, 1, 2.0)];
        let visible = item.visible_chapters(&all, false);
        let ids: Vec<i64> = visible.ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![11, 12, 10]);
    }

    #[test]
    fn forced_downloaded_filter_hides_remote_chapters() {
        let item = Item::new(1, "Item", 1);
        let mut downloaded = chapter(10, 0, 1.0);
        downloaded.download = DownloadStatus::Downloaded;
        let all = vec![downloaded, chapter(11, 1, 2.0)];
        let visible = item.visible_chapters(&all, true);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible.get(0).map(|r| r.id), Some(ChapterId(10)));
    }

    #[test]
    fn unread_filter() {
        let mut filters = ChapterFilters::default();
        filters.unread = true;
        let mut read = chapter(1, 0, 1.0);
        read.read = true;
        assert!(!filters.matches(&read));
        assert!(filters.matches(&chapter(2, 1, 2.0)));
        assert!(filters.is_active());
        filters.clear();
        assert!(!filters.is_active());
    }
}
