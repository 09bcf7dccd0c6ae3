use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::model::{
    Category, ChapterFilters, ChapterId, ChapterRecord, DisplayMode, DownloadStatus, Item, ItemId,
    SortMode,
};

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

const ITEM_COLUMNS: &str = "id, title, source_id, favorite, initialized, sorting, sort_descending, \
     display_mode, filter_read, filter_unread, filter_downloaded, filter_bookmarked";

const CHAPTER_COLUMNS: &str =
    "id, name, source_order, chapter_number, read, bookmark, download_status, date_upload, last_page_read";

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("storage: enable foreign keys")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    pub fn insert_item(&self, item: &Item) -> Result<ItemId> {
        if item.title.trim().is_empty() {
            bail!("storage: item title required");
        }
        let conn = self.conn.lock();
        let id: i64 = conn.query_row(
            r#"
INSERT INTO items (title, source_id, favorite, initialized, sorting, sort_descending,
                   display_mode, filter_read, filter_unread, filter_downloaded,
                   filter_bookmarked, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
RETURNING id
"#,
            params![
                item.title,
                item.source_id,
                item.favorite,
                item.initialized,
                item.sorting.as_i64(),
                item.sort_descending,
                item.display_mode.as_i64(),
                item.filters.read,
                item.filters.unread,
                item.filters.downloaded,
                item.filters.bookmarked,
                Utc::now().timestamp(),
            ],
            |row| row.get(0),
        )?;
        Ok(ItemId(id))
    }

    pub fn update_item(&self, item: &Item) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            r#"
UPDATE items SET
  title = ?2,
  source_id = ?3,
  favorite = ?4,
  initialized = ?5,
  sorting = ?6,
  sort_descending = ?7,
  display_mode = ?8,
  filter_read = ?9,
  filter_unread = ?10,
  filter_downloaded = ?11,
  filter_bookmarked = ?12,
  updated_at = ?13
WHERE id = ?1
"#,
            params![
                item.id.0,
                item.title,
                item.source_id,
                item.favorite,
                item.initialized,
                item.sorting.as_i64(),
                item.sort_descending,
                item.display_mode.as_i64(),
                item.filters.read,
                item.filters.unread,
                item.filters.downloaded,
                item.filters.bookmarked,
                Utc::now().timestamp(),
            ],
        )?;
        if changed == 0 {
            bail!("storage: item {} not found", item.id.0);
        }
        Ok(())
    }

    pub fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
            params![id.0],
            item_from_row,
        )
        .optional()
        .context("storage: query item")
    }

    pub fn list_items(&self) -> Result<Vec<Item>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY title COLLATE NOCASE"
        ))?;
        let rows = stmt
            .query_map([], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn insert_chapter(&self, item: ItemId, chapter: &ChapterRecord) -> Result<ChapterId> {
        let conn = self.conn.lock();
        let id: i64 = conn.query_row(
            r#"
INSERT INTO chapters (item_id, name, source_order, chapter_number, read, bookmark,
                      download_status, date_upload, last_page_read, date_fetch)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
RETURNING id
"#,
            params![
                item.0,
                chapter.name,
                chapter.source_order,
                chapter.chapter_number as f64,
                chapter.read,
                chapter.bookmark,
                chapter.download.as_i64(),
                chapter.date_upload,
                chapter.last_page_read,
                Utc::now().timestamp(),
            ],
            |row| row.get(0),
        )?;
        Ok(ChapterId(id))
    }

    pub fn list_chapters(&self, item: ItemId) -> Result<Vec<ChapterRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE item_id = ?1 ORDER BY source_order ASC"
        ))?;
        let rows = stmt
            .query_map(params![item.0], chapter_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_read(&self, ids: &[ChapterId], read: bool) -> Result<()> {
        self.update_chapters("read", read as i64, ids)
    }

    pub fn set_bookmark(&self, ids: &[ChapterId], bookmark: bool) -> Result<()> {
        self.update_chapters("bookmark", bookmark as i64, ids)
    }

    pub fn set_download_status(&self, ids: &[ChapterId], status: DownloadStatus) -> Result<()> {
        self.update_chapters("download_status", status.as_i64(), ids)
    }

    pub fn clear_downloads(&self, item: ItemId) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE chapters SET download_status = ?2 WHERE item_id = ?1 AND download_status <> ?2",
            params![item.0, DownloadStatus::NotDownloaded.as_i64()],
        )?;
        Ok(changed)
    }

    pub fn count_downloaded(&self, item: ItemId) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chapters WHERE item_id = ?1 AND download_status = ?2",
            params![item.0, DownloadStatus::Downloaded.as_i64()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn merge_items(&self, from: ItemId, into: ItemId) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let max: Option<i32> = tx.query_row(
            "SELECT MAX(source_order) FROM chapters WHERE item_id = ?1",
            params![into.0],
            |row| row.get(0),
        )?;
        let offset = max.map_or(0, |max| max + 1);
        let moved = tx.execute(
            "UPDATE chapters SET item_id = ?2, source_order = source_order + ?3 WHERE item_id = ?1",
            params![from.0, into.0, offset],
        )?;
        let deleted = tx.execute("DELETE FROM items WHERE id = ?1", params![from.0])?;
        if deleted == 0 {
            bail!("storage: item {} not found", from.0);
        }
        tx.commit()?;
        Ok(moved)
    }

    pub fn insert_category(&self, name: &str) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            bail!("storage: category name required");
        }
        let conn = self.conn.lock();
        let id: i64 = conn.query_row(
            r#"
INSERT INTO categories (name, sort_order)
VALUES (?1, COALESCE((SELECT MAX(sort_order) + 1 FROM categories), 0))
RETURNING id
"#,
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, sort_order FROM categories ORDER BY sort_order ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    order: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn item_category_ids(&self, item: ItemId) -> Result<Vec<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT category_id FROM item_categories WHERE item_id = ?1 ORDER BY category_id",
        )?;
        let rows = stmt
            .query_map(params![item.0], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
    }

    pub fn set_item_categories(&self, item: ItemId, categories: &[i64]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM item_categories WHERE item_id = ?1",
            params![item.0],
        )?;
        for category in categories {
            tx.execute(
                "INSERT INTO item_categories (item_id, category_id) VALUES (?1, ?2)",
                params![item.0, category],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn update_chapters(&self, column: &str, value: i64, ids: &[ChapterId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = ids
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(",");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "UPDATE chapters SET {column} = ?1 WHERE id IN ({placeholders})"
        ))?;
        let values = std::iter::once(value).chain(ids.iter().map(|id| id.0));
        stmt.execute(params_from_iter(values))
            .with_context(|| format!("storage: update chapters.{column}"))?;
        Ok(())
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    let sorting: i64 = row.get(5)?;
    let display: i64 = row.get(7)?;
    Ok(Item {
        id: ItemId(row.get(0)?),
        title: row.get(1)?,
        source_id: row.get(2)?,
        favorite: row.get(3)?,
        initialized: row.get(4)?,
        sorting: SortMode::from_i64(sorting),
        sort_descending: row.get(6)?,
        display_mode: DisplayMode::from_i64(display),
        filters: ChapterFilters {
            read: row.get(8)?,
            unread: row.get(9)?,
            downloaded: row.get(10)?,
            bookmarked: row.get(11)?,
        },
    })
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<ChapterRecord> {
    let number: f64 = row.get(3)?;
    let status: i64 = row.get(6)?;
    Ok(ChapterRecord {
        id: ChapterId(row.get(0)?),
        name: row.get(1)?,
        source_order: row.get(2)?,
        chapter_number: number as f32,
        read: row.get(4)?,
        bookmark: row.get(5)?,
        download: DownloadStatus::from_i64(status),
        date_upload: row.get(7)?,
        last_page_read: row.get(8)?,
    })
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let migrations = migrations();
    for (idx, sql) in migrations.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS items (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  source_id INTEGER NOT NULL DEFAULT 0,
  favorite INTEGER NOT NULL DEFAULT 0,
  initialized INTEGER NOT NULL DEFAULT 0,
  sorting INTEGER NOT NULL DEFAULT 0,
  sort_descending INTEGER NOT NULL DEFAULT 1,
  display_mode INTEGER NOT NULL DEFAULT 0,
  filter_read INTEGER NOT NULL DEFAULT 0,
  filter_unread INTEGER NOT NULL DEFAULT 0,
  filter_downloaded INTEGER NOT NULL DEFAULT 0,
  filter_bookmarked INTEGER NOT NULL DEFAULT 0,
  updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chapters (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  item_id INTEGER NOT NULL,
  name TEXT NOT NULL,
  source_order INTEGER NOT NULL,
  chapter_number REAL NOT NULL DEFAULT -1,
  read INTEGER NOT NULL DEFAULT 0,
  bookmark INTEGER NOT NULL DEFAULT 0,
  download_status INTEGER NOT NULL DEFAULT 0,
  date_upload INTEGER NOT NULL DEFAULT 0,
  last_page_read INTEGER NOT NULL DEFAULT 0,
  date_fetch INTEGER NOT NULL,
  FOREIGN KEY(item_id) REFERENCES items(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS categories (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  sort_order INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS item_categories (
  item_id INTEGER NOT NULL,
  category_id INTEGER NOT NULL,
  PRIMARY KEY (item_id, category_id),
  FOREIGN KEY(item_id) REFERENCES items(id) ON DELETE CASCADE,
  FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chapters_item ON chapters(item_id, source_order);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("chapter-deck").join("library.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(Options {
            path: Some(dir.path().join("library.db")),
        })
        .unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("library.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn item_round_trips_preferences() {
        let (_dir, store) = open_temp();
        let mut item = Item::new(0, "Blue Period", 3);
        item.id = store.insert_item(&item).unwrap();
        item.sorting = SortMode::UploadDate;
        item.sort_descending = false;
        item.filters.bookmarked = true;
        store.update_item(&item).unwrap();

        let loaded = store.get_item(item.id).unwrap().unwrap();
        assert_eq!(loaded, item);
    }

    #[test]
    fn chapter_flags_update_by_id() {
        let (_dir, store) = open_temp();
        let item = store.insert_item(&Item::new(0, "Item", 0)).unwrap();
        let first = store
            .insert_chapter(item, &ChapterRecord::new(0, "One", 0))
            .unwrap();
        let second = store
            .insert_chapter(item, &ChapterRecord::new(0, "Two", 1))
            .unwrap();

        store.set_read(&[first, second], true).unwrap();
        store.set_bookmark(&[second], true).unwrap();
        store
            .set_download_status(&[first], DownloadStatus::Downloaded)
            .unwrap();

        let chapters = store.list_chapters(item).unwrap();
        assert!(chapters.iter().all(|c| c.read));
        assert!(chapters[1].bookmark && !chapters[0].bookmark);
        assert_eq!(store.count_downloaded(item).unwrap(), 1);
        assert_eq!(store.clear_downloads(item).unwrap(), 1);
        assert_eq!(store.count_downloaded(item).unwrap(), 0);
    }

    #[test]
    fn categories_assign_and_replace() {
        let (_dir, store) = open_temp();
        let item = store.insert_item(&Item::new(0, "Item", 0)).unwrap();
        let reading = store.insert_category("Reading").unwrap();
        let later = store.insert_category("Later").unwrap();

        store.set_item_categories(item, &[reading, later]).unwrap();
        assert_eq!(store.item_category_ids(item).unwrap().len(), 2);

        store.set_item_categories(item, &[later]).unwrap();
        assert_eq!(store.item_category_ids(item).unwrap(), vec![later]);
        assert_eq!(store.list_categories().unwrap()[0].name, "Reading");
    }

    #[test]
    fn merge_items_moves_chapters_and_drops_source() {
        let (_dir, store) = open_temp();
        let into = store.insert_item(&Item::new(0, "Into", 0)).unwrap();
        let from = store.insert_item(&Item::new(0, "From", 0)).unwrap();
        store
            .insert_chapter(into, &ChapterRecord::new(0, "a1", 0))
            .unwrap();
        store
            .insert_chapter(from, &ChapterRecord::new(0, "b1", 0))
            .unwrap();
        store
            .insert_chapter(from, &ChapterRecord::new(0, "b2", 1))
            .unwrap();

        assert_eq!(store.merge_items(from, into).unwrap(), 2);

        let chapters = store.list_chapters(into).unwrap();
        let orders: Vec<i32> = chapters.iter().map(|c| c.source_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(store.get_item(from).unwrap().is_none());
    }

    #[test]
    fn merge_items_rolls_back_when_source_is_missing() {
        let (_dir, store) = open_temp();
        let into = store.insert_item(&Item::new(0, "Into", 0)).unwrap();
        store
            .insert_chapter(into, &ChapterRecord::new(0, "a1", 0))
            .unwrap();

        assert!(store.merge_items(ItemId(into.0 + 100), into).is_err());
        assert_eq!(store.list_chapters(into).unwrap().len(), 1);
    }
}
