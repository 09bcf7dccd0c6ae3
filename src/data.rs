use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::model::{
    Category, ChapterFilters, ChapterId, ChapterRecord, DisplayMode, DownloadStatus, Item, ItemId,
    SortMode,
};
use crate::storage;

pub trait ChapterService: Send + Sync {
    fn load_item(&self, item: ItemId) -> Result<Item>;
    fn fetch_metadata(&self, item: ItemId, manual: bool) -> Result<Item>;
    fn fetch_chapters(&self, item: ItemId, manual: bool) -> Result<Vec<ChapterRecord>>;

    fn download_chapters(&self, item: ItemId, chapters: &[ChapterRecord]) -> Result<()>;
    fn delete_chapters(&self, item: ItemId, chapters: &[ChapterRecord]) -> Result<()>;
    fn bookmark_chapters(&self, chapters: &[ChapterRecord], bookmarked: bool) -> Result<()>;
    fn mark_read(&self, chapters: &[ChapterRecord], read: bool) -> Result<()>;

    fn unread_candidates(&self, item: ItemId) -> Result<Vec<ChapterRecord>>;

    fn move_to_category(&self, item: ItemId, category: Option<i64>) -> Result<()>;
    fn move_to_categories(&self, item: ItemId, categories: &[i64]) -> Result<()>;
    fn set_sort_order(&self, item: ItemId, mode: SortMode, descending: bool) -> Result<()>;
    fn set_filters(&self, item: ItemId, filters: ChapterFilters) -> Result<()>;
    fn set_display_mode(&self, item: ItemId, mode: DisplayMode) -> Result<()>;
    fn set_favorite(&self, item: ItemId, favorite: bool) -> Result<()>;

    fn categories(&self) -> Result<Vec<Category>>;
    fn item_category_ids(&self, item: ItemId) -> Result<Vec<i64>>;
    fn has_downloads(&self, item: ItemId) -> Result<bool>;
    fn delete_downloads(&self, item: ItemId) -> Result<()>;

    fn merge_items(&self, item: ItemId, other: ItemId) -> Result<Item>;
}

pub struct LibraryService {
    store: Arc<storage::Store>,
}

impl LibraryService {
    pub fn new(store: Arc<storage::Store>) -> Self {
        Self { store }
    }

    fn update_item(&self, id: ItemId, apply: impl FnOnce(&mut Item)) -> Result<()> {
        let mut item = self.load_item(id)?;
        apply(&mut item);
        self.store.update_item(&item)
    }
}

fn ids(chapters: &[ChapterRecord]) -> Vec<ChapterId> {
    chapters.iter().map(|chapter| chapter.id).collect()
}

impl ChapterService for LibraryService {
    fn load_item(&self, item: ItemId) -> Result<Item> {
        self.store
            .get_item(item)?
            .with_context(|| format!("item {} not found", item.0))
    }

    fn fetch_metadata(&self, item: ItemId, _manual: bool) -> Result<Item> {
        let mut loaded = self.load_item(item)?;
        if !loaded.initialized {
            loaded.initialized = true;
            self.store
                .update_item(&loaded)
                .context("mark item initialized")?;
        }
        Ok(loaded)
    }

    fn fetch_chapters(&self, item: ItemId, _manual: bool) -> Result<Vec<ChapterRecord>> {
        self.store.list_chapters(item).context("fetch chapters")
    }

    fn download_chapters(&self, _item: ItemId, chapters: &[ChapterRecord]) -> Result<()> {
        self.store
            .set_download_status(&ids(chapters), DownloadStatus::Downloaded)
            .context("enqueue downloads")
    }

    fn delete_chapters(&self, _item: ItemId, chapters: &[ChapterRecord]) -> Result<()> {
        self.store
            .set_download_status(&ids(chapters), DownloadStatus::NotDownloaded)
            .context("delete chapters")
    }

    fn bookmark_chapters(&self, chapters: &[ChapterRecord], bookmarked: bool) -> Result<()> {
        self.store
            .set_bookmark(&ids(chapters), bookmarked)
            .context("bookmark chapters")
    }

    fn mark_read(&self, chapters: &[ChapterRecord], read: bool) -> Result<()> {
        self.store
            .set_read(&ids(chapters), read)
            .context("mark chapters read")
    }

    fn unread_candidates(&self, item: ItemId) -> Result<Vec<ChapterRecord>> {
        self.store.list_chapters(item)
    }

    fn move_to_category(&self, item: ItemId, category: Option<i64>) -> Result<()> {
        let categories: Vec<i64> = category.into_iter().collect();
        self.store.set_item_categories(item, &categories)
    }

    fn move_to_categories(&self, item: ItemId, categories: &[i64]) -> Result<()> {
        self.store.set_item_categories(item, categories)
    }

    fn set_sort_order(&self, item: ItemId, mode: SortMode, descending: bool) -> Result<()> {
        self.update_item(item, |item| {
            item.sorting = mode;
            item.sort_descending = descending;
        })
    }

    fn set_filters(&self, item: ItemId, filters: ChapterFilters) -> Result<()> {
        self.update_item(item, |item| item.filters = filters)
    }

    fn set_display_mode(&self, item: ItemId, mode: DisplayMode) -> Result<()> {
        self.update_item(item, |item| item.display_mode = mode)
    }

    fn set_favorite(&self, item: ItemId, favorite: bool) -> Result<()> {
        self.update_item(item, |item| item.favorite = favorite)
    }

    fn categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories()
    }

    fn item_category_ids(&self, item: ItemId) -> Result<Vec<i64>> {
        self.store.item_category_ids(item)
    }

    fn has_downloads(&self, item: ItemId) -> Result<bool> {
        Ok(self.store.count_downloaded(item)? > 0)
    }

    fn delete_downloads(&self, item: ItemId) -> Result<()> {
        self.store.clear_downloads(item)?;
        Ok(())
    }

    fn merge_items(&self, item: ItemId, other: ItemId) -> Result<Item> {
        if item == other {
            bail!("cannot merge an item with itself");
        }
        let target = self.load_item(item)?;
        self.load_item(other)?;
        self.store
            .merge_items(other, item)
            .with_context(|| format!("merge item {} into {}", other.0, item.0))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn service() -> (tempfile::TempDir, LibraryService, ItemId) {
        let dir = tempdir().unwrap();
        let store = storage::Store::open(storage::Options {
            path: Some(dir.path().join("library.db")),
        })
        .unwrap();
        let item = store.insert_item(&Item::new(0, "Item", 0)).unwrap();
        for (order, name) in ["One", "Two", "Three"].iter().enumerate() {
            store
                .insert_chapter(item, &ChapterRecord::new(0, *name, order as i32))
                .unwrap();
        }
        (dir, LibraryService::new(Arc::new(store)), item)
    }

    #[test]
    fn fetch_metadata_initializes_item() {
        let (_dir, service, item) = service();
        assert!(!service.load_item(item).unwrap().initialized);
        assert!(service.fetch_metadata(item, false).unwrap().initialized);
        assert!(service.load_item(item).unwrap().initialized);
    }

    #[test]
    fn download_then_delete_round_trip() {
        let (_dir, service, item) = service();
        let chapters = service.fetch_chapters(item, true).unwrap();

        service.download_chapters(item, &chapters[..2]).unwrap();
        assert!(service.has_downloads(item).unwrap());

        service.delete_chapters(item, &chapters[..2]).unwrap();
        assert!(!service.has_downloads(item).unwrap());
    }

    #[test]
    fn merge_moves_chapters_after_existing_ones() {
        let (_dir, service, item) = service();
        let other = service
            .store
            .insert_item(&Item::new(0, "Other", 0))
            .unwrap();
        service
            .store
            .insert_chapter(other, &ChapterRecord::new(0, "Extra", 0))
            .unwrap();

        let merged = service.merge_items(item, other).unwrap();

        assert_eq!(merged.id, item);
        let chapters = service.unread_candidates(item).unwrap();
        assert_eq!(chapters.len(), 4);
        assert_eq!(chapters[3].name, "Extra");
        assert_eq!(chapters[3].source_order, 3);
        assert!(service.load_item(other).is_err());
    }

    #[test]
    fn sort_preferences_persist() {
        let (_dir, service, item) = service();
        service.set_sort_order(item, SortMode::Number, false).unwrap();
        let loaded = service.load_item(item).unwrap();
        assert_eq!(loaded.sorting, SortMode::Number);
        assert!(!loaded.sort_descending);
    }
}
