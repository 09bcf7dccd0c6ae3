#![allow(clippy::uninlined_format_args)]

pub mod action_mode;
pub mod app;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod merge;
pub mod model;
pub mod range;
pub mod refresh;
pub mod screen;
pub mod selection;
pub mod storage;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
