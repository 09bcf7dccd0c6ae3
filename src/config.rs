use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "CHAPTERDECK";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    // Category for new favorites. `0` files them under no category, a
    // negative value asks every time.
    #[serde(default)]
    pub default_category: i64,
    #[serde(default = "default_jump_to_chapters")]
    pub jump_to_chapters: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            default_category: 0,
            jump_to_chapters: default_jump_to_chapters(),
        }
    }
}

fn default_jump_to_chapters() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DownloadsConfig {
    #[serde(default)]
    pub downloaded_only: bool,
    #[serde(default)]
    pub local_source_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_tick_rate", with = "humantime_serde")]
    pub tick_rate: Duration,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
        }
    }
}

fn default_tick_rate() -> Duration {
    Duration::from_millis(120)
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_env(cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    base.library.default_category = other.library.default_category;
    base.library.jump_to_chapters = other.library.jump_to_chapters;

    base.downloads.downloaded_only = other.downloads.downloaded_only;
    if !other.downloads.local_source_ids.is_empty() {
        base.downloads.local_source_ids = other.downloads.local_source_ids;
    }

    if !other.ui.tick_rate.is_zero() {
        base.ui.tick_rate = other.ui.tick_rate;
    }

    base
}

fn merge_env(mut base: Config, prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(&mut base, &key, value);
    }

    base
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "library.default_category" => {
            if let Ok(parsed) = value.trim().parse::<i64>() {
                cfg.library.default_category = parsed;
            }
        }
        "library.jump_to_chapters" => cfg.library.jump_to_chapters = parse_flag(&value),
        "downloads.downloaded_only" => cfg.downloads.downloaded_only = parse_flag(&value),
        "downloads.local_source_ids" => {
            cfg.downloads.local_source_ids = value
                .split(',')
                .filter_map(|s| s.trim().parse::<i64>().ok())
                .collect();
        }
        "ui.tick_rate" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.tick_rate = duration;
            }
        }
        _ => {}
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

impl Config {
    pub fn is_local_source(&self, source_id: i64) -> bool {
        self.downloads.local_source_ids.contains(&source_id)
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chapter-deck").join("config.yaml"))
}
