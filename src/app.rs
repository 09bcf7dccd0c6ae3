use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::config;
use crate::data::{ChapterService, LibraryService};
use crate::logging;
use crate::model::{ChapterRecord, DownloadStatus, Item, ItemId};
use crate::screen::ScreenOptions;
use crate::storage;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub db_path: Option<PathBuf>,
    pub item: Option<ItemId>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let display_path = friendly_path(config::default_path().as_ref());

    let db_path = resolve_db_path(options.db_path)?;
    let log_path = db_path.with_file_name("chapter-deck.log");
    logging::init(&log_path)?;

    let store = Arc::new(open_store(&db_path)?);
    let item = match options.item {
        Some(item) => item,
        None => store
            .list_items()?
            .first()
            .map(|item| item.id)
            .context("library is empty; add items with --import <file>")?,
    };
    let loaded = store
        .get_item(item)?
        .with_context(|| format!("item {} not found", item.0))?;
    info!(item = item.0, title = %loaded.title, "opening item");

    let service: Arc<dyn ChapterService> = Arc::new(LibraryService::new(store.clone()));
    let screen = ScreenOptions {
        local_only: cfg.is_local_source(loaded.source_id),
        downloaded_only: cfg.downloads.downloaded_only,
        default_category: cfg.library.default_category,
    };

    let mut model = ui::Model::new(ui::Options {
        service,
        item,
        screen,
        jump_to_chapters: cfg.library.jump_to_chapters,
        tick_rate: cfg.ui.tick_rate,
        config_path: display_path,
    })?;
    model.run()
}

fn resolve_db_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => storage::default_path().context("storage: resolve default path"),
    }
}

fn open_store(path: &Path) -> Result<storage::Store> {
    storage::Store::open(storage::Options {
        path: Some(path.to_path_buf()),
    })
    .context("open storage")
}

#[derive(Debug, Deserialize)]
struct ImportFile {
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    items: Vec<ImportItem>,
}

#[derive(Debug, Deserialize)]
struct ImportItem {
    title: String,
    #[serde(default)]
    source_id: i64,
    #[serde(default)]
    favorite: bool,
    #[serde(default)]
    categories: Vec<String>,
    // Source order, newest first.
    #[serde(default)]
    chapters: Vec<ImportChapter>,
}

#[derive(Debug, Deserialize)]
struct ImportChapter {
    name: String,
    #[serde(default)]
    number: f32,
    #[serde(default)]
    read: bool,
    #[serde(default)]
    bookmark: bool,
    #[serde(default)]
    downloaded: bool,
    #[serde(default)]
    date_upload: i64,
}

pub fn import(db_path: Option<PathBuf>, file: &Path) -> Result<Vec<ItemId>> {
    let data = fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file at {}", file.display()))?;
    let parsed: ImportFile = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse import file at {}", file.display()))?;
    if parsed.items.is_empty() && parsed.categories.is_empty() {
        bail!("import file {} contains nothing to import", file.display());
    }

    let store = open_store(&resolve_db_path(db_path)?)?;

    let mut category_ids: HashMap<String, i64> = store
        .list_categories()?
        .into_iter()
        .map(|category| (category.name, category.id))
        .collect();
    for name in &parsed.categories {
        if !category_ids.contains_key(name) {
            let id = store.insert_category(name)?;
            category_ids.insert(name.clone(), id);
        }
    }

    let mut imported = Vec::with_capacity(parsed.items.len());
    for entry in parsed.items {
        let mut item = Item::new(0, entry.title, entry.source_id);
        item.favorite = entry.favorite;
        let id = store.insert_item(&item)?;
        for (order, chapter) in entry.chapters.into_iter().enumerate() {
            let mut record = ChapterRecord::new(0, chapter.name, order as i32);
            record.chapter_number = chapter.number;
            record.read = chapter.read;
            record.bookmark = chapter.bookmark;
            record.date_upload = chapter.date_upload;
            if chapter.downloaded {
                record.download = DownloadStatus::Downloaded;
            }
            store.insert_chapter(id, &record)?;
        }
        let categories: Vec<i64> = entry
            .categories
            .iter()
            .map(|name| {
                category_ids
                    .get(name)
                    .copied()
                    .with_context(|| format!("unknown category {name:?}"))
            })
            .collect::<Result<_>>()?;
        store.set_item_categories(id, &categories)?;
        imported.push(id);
    }
    Ok(imported)
}

pub fn list(db_path: Option<PathBuf>) -> Result<String> {
    let store = open_store(&resolve_db_path(db_path)?)?;
    let mut out = String::new();
    for item in store.list_items()? {
        let chapters = store.list_chapters(item.id)?;
        let unread = chapters.iter().filter(|chapter| !chapter.read).count();
        let marker = if item.favorite { "*" } else { " " };
        let _ = writeln!(
            out,
            "{:>4} {marker} {}  ({} chapters, {} unread)",
            item.id.0,
            item.title,
            chapters.len(),
            unread
        );
    }
    Ok(out)
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/chapter-deck/config.yaml".to_string()
    }
}
