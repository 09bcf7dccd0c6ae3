use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::action_mode::Gesture;
use crate::data::ChapterService;
use crate::dispatch::{BatchCommand, Dispatch, DownloadPreset};
use crate::error::{DeleteError, FetchError};
use crate::model::{Category, ChapterRecord, DisplayMode, ItemId};
use crate::screen::{ChapterScreen, FilterKind, Notice, ScreenHost, ScreenOptions};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct Options {
    pub service: Arc<dyn ChapterService>,
    pub item: ItemId,
    pub screen: ScreenOptions,
    pub jump_to_chapters: bool,
    pub tick_rate: Duration,
    pub config_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Header,
    Chapters,
}

#[derive(Debug, Clone, PartialEq)]
enum Prompt {
    ConfirmDelete,
    Downloads,
    CustomDownload { input: String, limit: usize },
    Filters,
    Categories {
        categories: Vec<Category>,
        checked: Vec<bool>,
        cursor: usize,
    },
    DeleteDownloads,
    Merge { input: String },
}

#[derive(Default)]
struct StatusHost {
    status_message: String,
    is_error: bool,
    prompt: Option<Prompt>,
}

impl StatusHost {
    fn info<S: Into<String>>(&mut self, message: S) {
        self.status_message = message.into();
        self.is_error = false;
    }

    fn error<S: Into<String>>(&mut self, message: S) {
        self.status_message = message.into();
        self.is_error = true;
    }
}

impl ScreenHost for StatusHost {
    fn on_metadata_fetch_started(&mut self) {
        self.info("Refreshing item details…");
    }

    fn on_chapters_fetch_started(&mut self) {
        self.info("Refreshing chapters…");
    }

    fn on_chapters_fetch_done(&mut self) {
        self.info("Chapters up to date.");
    }

    fn on_metadata_fetch_error(&mut self, err: &FetchError) {
        self.error(format!("Failed to refresh details: {err}"));
    }

    fn on_chapters_fetch_error(&mut self, err: &FetchError) {
        self.error(format!("Failed to refresh chapters: {err}"));
    }

    fn on_chapters_deleted(&mut self, chapters: &[ChapterRecord]) {
        self.info(format!("Deleted {} chapter(s).", chapters.len()));
    }

    fn on_chapters_deleted_error(&mut self, err: &DeleteError) {
        self.error(format!("Error: {err}"));
    }

    fn on_open_chapter(&mut self, chapter: &ChapterRecord) {
        self.info(format!("Opening {}", chapter.name));
    }

    fn on_notice(&mut self, notice: Notice) {
        match notice {
            // Fetch errors are already reported by the typed callbacks.
            Notice::FetchFailed(_) => {}
            Notice::CommandFailed(message) => self.error(format!("Error: {message}")),
            Notice::NoNextChapter => self.info("No next chapter."),
            Notice::NothingToDownload => self.info("Nothing to download."),
            Notice::SuggestAddToLibrary => {
                self.info("Downloading. Press L to add this item to your library.")
            }
            Notice::AddedToLibrary => self.info("Added to library."),
            Notice::NoCategories => self.info("No categories yet."),
            Notice::RemovedFromLibrary => {
                if self.prompt.is_none() {
                    self.info("Removed from library.");
                }
            }
            Notice::OfferDeleteDownloads => {
                self.info("Removed from library.");
                self.prompt = Some(Prompt::DeleteDownloads);
            }
            Notice::ChooseCategories {
                categories,
                preselected,
            } => {
                let mut checked = vec![false; categories.len()];
                for index in preselected {
                    if let Some(slot) = checked.get_mut(index) {
                        *slot = true;
                    }
                }
                self.prompt = Some(Prompt::Categories {
                    categories,
                    checked,
                    cursor: 0,
                });
            }
            Notice::Merged(item) => self.info(format!("Merged into {}.", item.title)),
            Notice::MergeFailed(message) => self.error(format!("Failed to merge item: {message}")),
        }
    }
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Model {
    screen: ChapterScreen,
    host: StatusHost,
    focus: Focus,
    cursor: usize,
    list_state: ListState,
    spinner: Spinner,
    tick_rate: Duration,
    help_visible: bool,
    needs_redraw: bool,
}

impl Model {
    pub fn new(options: Options) -> Result<Self> {
        let mut screen = ChapterScreen::open(options.service, options.item, options.screen)?;
        let mut host = StatusHost::default();
        host.info(format!(
            "{} loaded. Press ? for keys. Config: {}",
            screen.item().title,
            options.config_path
        ));
        screen.start(&mut host);
        Ok(Self {
            screen,
            host,
            focus: if options.jump_to_chapters {
                Focus::Chapters
            } else {
                Focus::Header
            },
            cursor: 0,
            list_state: ListState::default(),
            spinner: Spinner::new(),
            tick_rate: options.tick_rate,
            help_visible: false,
            needs_redraw: true,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        self.screen.close();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = self.tick_rate;

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => self.host.error(format!("Error: {err:#}")),
                        }
                        self.mark_dirty();
                    }
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.screen.busy() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn poll_async(&mut self) -> bool {
        let changed = self.screen.poll_async(&mut self.host);
        if changed {
            self.clamp_cursor();
        }
        changed
    }

    fn clamp_cursor(&mut self) {
        let len = self.screen.visible().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.host.prompt.is_some() {
            self.handle_prompt_key(code)?;
            return Ok(false);
        }

        if self.help_visible {
            if matches!(code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                self.help_visible = false;
            }
            return Ok(false);
        }

        let action_mode = self.screen.controller().is_active();
        match code {
            KeyCode::Char('q') => {
                self.screen.close();
                return Ok(true);
            }
            KeyCode::Char('?') => self.help_visible = true,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Header => Focus::Chapters,
                    Focus::Chapters => Focus::Header,
                };
            }
            KeyCode::Esc => {
                self.screen.gesture(Gesture::Dismiss, &mut self.host);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.focus = Focus::Chapters;
                if self.cursor + 1 < self.screen.visible().len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.cursor == 0 {
                    self.focus = Focus::Header;
                } else {
                    self.cursor -= 1;
                }
            }
            KeyCode::Char('g') => self.cursor = 0,
            KeyCode::Char('G') => {
                self.cursor = self.screen.visible().len().saturating_sub(1);
            }
            KeyCode::Enter => match self.focus {
                Focus::Header => self.screen.open_next_unread(&mut self.host),
                Focus::Chapters => {
                    self.screen.gesture(Gesture::Click(self.cursor), &mut self.host);
                }
            },
            KeyCode::Char(' ') | KeyCode::Char('v') => {
                self.focus = Focus::Chapters;
                self.screen
                    .gesture(Gesture::LongPress(self.cursor), &mut self.host);
            }
            KeyCode::Char('r') => self.screen.open_next_unread(&mut self.host),
            KeyCode::Char('R') => self.screen.refresh(&mut self.host),
            KeyCode::Char('L') => self.screen.on_favorite_click(&mut self.host)?,
            KeyCode::Char('C') => {
                if self.screen.item().favorite {
                    self.screen.edit_categories(&mut self.host)?;
                } else {
                    self.host.info("Add this item to your library first.");
                }
            }
            KeyCode::Char('s') => {
                let next = self.screen.item().sorting.next();
                self.screen.set_sorting(next)?;
                self.host.info(format!("Sorted by {}.", next.label()));
            }
            KeyCode::Char('S') => {
                self.screen.reverse_sort_order()?;
                self.host.info("Sort order reversed.");
            }
            KeyCode::Char('n') => {
                let mode = match self.screen.item().display_mode {
                    DisplayMode::Name => DisplayMode::Number,
                    DisplayMode::Number => DisplayMode::Name,
                };
                self.screen.set_display_mode(mode)?;
            }
            KeyCode::Char('f') => self.host.prompt = Some(Prompt::Filters),
            KeyCode::Char('M') => {
                self.host.prompt = Some(Prompt::Merge {
                    input: String::new(),
                })
            }
            KeyCode::Char('D') if !action_mode => {
                if self.screen.options().local_only {
                    self.host.info("Downloads are not available for local items.");
                } else {
                    self.host.prompt = Some(Prompt::Downloads);
                }
            }
            KeyCode::Char(ch) if action_mode => {
                if let Some(command) = action_command(ch) {
                    self.run_command(command);
                }
            }
            _ => {}
        }
        self.clamp_cursor();
        Ok(false)
    }

    fn run_command(&mut self, command: BatchCommand) {
        if !self.screen.controller().visibility().allows(command) {
            self.host
                .info(format!("Cannot {} the selected chapters.", command.label()));
            return;
        }
        if command == BatchCommand::Delete {
            self.host.prompt = Some(Prompt::ConfirmDelete);
            return;
        }
        let dispatch = self.screen.run_command(command, &mut self.host);
        if dispatch == Dispatch::Noop && command == BatchCommand::MarkPreviousAsRead {
            self.host.info("No previous chapters to mark.");
        }
    }

    fn handle_prompt_key(&mut self, code: KeyCode) -> Result<()> {
        let Some(prompt) = self.host.prompt.take() else {
            return Ok(());
        };
        match prompt {
            Prompt::ConfirmDelete => {
                if matches!(code, KeyCode::Char('y') | KeyCode::Enter) {
                    self.screen.run_command(BatchCommand::Delete, &mut self.host);
                }
            }
            Prompt::Downloads => {
                let preset = match code {
                    KeyCode::Char('1') => Some(DownloadPreset::Next),
                    KeyCode::Char('5') => Some(DownloadPreset::Next5),
                    KeyCode::Char('0') => Some(DownloadPreset::Next10),
                    KeyCode::Char('u') => Some(DownloadPreset::Unread),
                    KeyCode::Char('a') => Some(DownloadPreset::All),
                    KeyCode::Char('c') => {
                        self.host.prompt = Some(Prompt::CustomDownload {
                            input: String::new(),
                            limit: self.screen.custom_download_limit(),
                        });
                        None
                    }
                    _ => None,
                };
                if let Some(preset) = preset {
                    self.host.info(format!("Downloading {}.", preset.label()));
                    self.screen.download_preset(preset, &mut self.host);
                }
            }
            Prompt::CustomDownload { mut input, limit } => match code {
                KeyCode::Char(ch) if ch.is_ascii_digit() => {
                    input.push(ch);
                    self.host.prompt = Some(Prompt::CustomDownload { input, limit });
                }
                KeyCode::Backspace => {
                    input.pop();
                    self.host.prompt = Some(Prompt::CustomDownload { input, limit });
                }
                KeyCode::Enter => {
                    let amount = input.parse::<usize>().unwrap_or(0).min(limit);
                    if amount > 0 {
                        self.screen
                            .download_preset(DownloadPreset::Custom(amount), &mut self.host);
                    }
                }
                KeyCode::Esc => {}
                _ => self.host.prompt = Some(Prompt::CustomDownload { input, limit }),
            },
            Prompt::Filters => {
                let filters = self.screen.item().filters;
                match code {
                    KeyCode::Char('r') => self.screen.set_filter(FilterKind::Read, !filters.read)?,
                    KeyCode::Char('u') => {
                        self.screen.set_filter(FilterKind::Unread, !filters.unread)?
                    }
                    KeyCode::Char('d') => self
                        .screen
                        .set_filter(FilterKind::Downloaded, !filters.downloaded)?,
                    KeyCode::Char('b') => self
                        .screen
                        .set_filter(FilterKind::Bookmarked, !filters.bookmarked)?,
                    KeyCode::Char('c') => self.screen.remove_filters()?,
                    _ => return Ok(()),
                }
                self.host.prompt = Some(Prompt::Filters);
            }
            Prompt::Categories {
                categories,
                mut checked,
                mut cursor,
            } => match code {
                KeyCode::Char('j') | KeyCode::Down => {
                    if cursor + 1 < categories.len() {
                        cursor += 1;
                    }
                    self.host.prompt = Some(Prompt::Categories {
                        categories,
                        checked,
                        cursor,
                    });
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    cursor = cursor.saturating_sub(1);
                    self.host.prompt = Some(Prompt::Categories {
                        categories,
                        checked,
                        cursor,
                    });
                }
                KeyCode::Char(' ') => {
                    if let Some(slot) = checked.get_mut(cursor) {
                        *slot = !*slot;
                    }
                    self.host.prompt = Some(Prompt::Categories {
                        categories,
                        checked,
                        cursor,
                    });
                }
                KeyCode::Enter => {
                    let ids: Vec<i64> = categories
                        .iter()
                        .zip(checked.iter())
                        .filter(|(_, checked)| **checked)
                        .map(|(category, _)| category.id)
                        .collect();
                    self.screen.update_categories(&ids, &mut self.host)?;
                }
                _ => {}
            },
            Prompt::DeleteDownloads => {
                if matches!(code, KeyCode::Char('y') | KeyCode::Enter) {
                    self.screen.delete_downloads(&mut self.host)?;
                    self.host.info("Downloads deleted.");
                }
            }
            Prompt::Merge { mut input } => match code {
                KeyCode::Char(ch) if ch.is_ascii_digit() => {
                    input.push(ch);
                    self.host.prompt = Some(Prompt::Merge { input });
                }
                KeyCode::Backspace => {
                    input.pop();
                    self.host.prompt = Some(Prompt::Merge { input });
                }
                KeyCode::Enter => {
                    if let Ok(other) = input.parse::<i64>() {
                        self.screen.merge_with(ItemId(other), &mut self.host)?;
                    }
                }
                KeyCode::Esc => {}
                _ => self.host.prompt = Some(Prompt::Merge { input }),
            },
        }
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(5),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.screen.busy() {
            format!("{} {}", self.spinner.frame(), self.host.status_message)
                .trim()
                .to_string()
        } else {
            self.host.status_message.clone()
        };
        let status_fg = if self.host.is_error {
            COLOR_ERROR
        } else {
            COLOR_TEXT_PRIMARY
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(status_fg)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        self.draw_header(frame, layout[1]);
        self.draw_chapters(frame, layout[2]);

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[3]);

        if let Some(prompt) = &self.host.prompt {
            draw_prompt(frame, layout[2], prompt);
        } else if self.help_visible {
            draw_help(frame, layout[2]);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let item = self.screen.item();
        let favorite = if item.favorite {
            Span::styled("★ In library", Style::default().fg(COLOR_SUCCESS))
        } else {
            Span::styled("☆ Not in library", Style::default().fg(COLOR_TEXT_SECONDARY))
        };
        let resume = if self.screen.has_read_any() {
            "Resume"
        } else {
            "Start"
        };
        let order = if item.sort_descending { "↓" } else { "↑" };
        let filters = self.filter_summary();
        let lines = vec![
            Line::from(vec![
                Span::styled(
                    item.title.clone(),
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                favorite,
            ]),
            Line::from(Span::styled(
                format!(
                    "Sort: {} {order} · Filters: {filters} · {} chapters",
                    item.sorting.label(),
                    self.screen.chapters().len()
                ),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
            Line::from(Span::styled(
                format!("[Enter] {resume}"),
                Style::default().fg(COLOR_ACCENT),
            )),
        ];
        let header = Paragraph::new(lines).block(panel_block(
            "Item",
            self.focus == Focus::Header,
        ));
        frame.render_widget(header, area);
    }

    fn filter_summary(&self) -> String {
        let filters = self.screen.item().filters;
        let mut parts = Vec::new();
        if filters.read {
            parts.push("read");
        }
        if filters.unread {
            parts.push("unread");
        }
        if filters.downloaded || self.screen.filters_forced() {
            parts.push("downloaded");
        }
        if filters.bookmarked {
            parts.push("bookmarked");
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(", ")
        }
    }

    fn draw_chapters(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let width = area.width.saturating_sub(2);
        let display = self.screen.item().display_mode;
        let visible = self.screen.visible();
        let selection = self.screen.selection();
        let items: Vec<ListItem> = visible
            .iter()
            .map(|chapter| {
                let marker = if selection.contains(chapter.id) {
                    "[x] "
                } else if self.screen.controller().is_active() {
                    "[ ] "
                } else {
                    ""
                };
                let title = match display {
                    DisplayMode::Name => chapter.name.clone(),
                    DisplayMode::Number => format!("Chapter {}", chapter.chapter_number),
                };
                let mut flags = String::new();
                if chapter.bookmark {
                    flags.push_str(" ⚑");
                }
                if chapter.download.is_downloaded() {
                    flags.push_str(" ⤓");
                }
                let text = format!("{marker}{title}");
                let text = truncate_to_width(&text, (width as usize).saturating_sub(flags.width()));
                let fg = if chapter.read {
                    COLOR_TEXT_SECONDARY
                } else {
                    COLOR_TEXT_PRIMARY
                };
                let mut style = Style::default().fg(fg);
                if selection.contains(chapter.id) {
                    style = style.bg(COLOR_PANEL_SELECTED_BG);
                }
                ListItem::new(Line::from(vec![
                    Span::styled(text, style),
                    Span::styled(flags, Style::default().fg(COLOR_ACCENT)),
                ]))
            })
            .collect();

        let title = match self.screen.action_title() {
            Some(count) => format!("Chapters · {count} selected"),
            None => "Chapters".to_string(),
        };
        let list = List::new(items)
            .block(panel_block(&title, self.focus == Focus::Chapters))
            .highlight_style(
                Style::default()
                    .bg(COLOR_PANEL_FOCUSED_BG)
                    .add_modifier(Modifier::BOLD),
            );
        let selected = (self.focus == Focus::Chapters && !visible.is_empty()).then_some(self.cursor);
        self.list_state.select(selected);
        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn footer_text(&self) -> String {
        if self.screen.controller().is_active() {
            let visibility = self.screen.controller().visibility();
            let mut parts = vec!["Space range", "Enter toggle"];
            if visibility.download {
                parts.push("d download");
            }
            if visibility.delete {
                parts.push("x delete");
            }
            if visibility.bookmark {
                parts.push("b bookmark");
            }
            if visibility.remove_bookmark {
                parts.push("B unbookmark");
            }
            if visibility.mark_read {
                parts.push("m read");
            }
            if visibility.mark_unread {
                parts.push("u unread");
            }
            parts.extend(["p previous read", "a all", "i invert", "Esc done"]);
            return parts.join(" · ");
        }
        "j/k move · Enter open · Space select · D download · f filter · s sort · L library · R refresh · ? help · q quit"
            .to_string()
    }
}

fn action_command(ch: char) -> Option<BatchCommand> {
    match ch {
        'd' => Some(BatchCommand::Download),
        'x' => Some(BatchCommand::Delete),
        'b' => Some(BatchCommand::Bookmark(true)),
        'B' => Some(BatchCommand::Bookmark(false)),
        'm' => Some(BatchCommand::MarkRead(true)),
        'u' => Some(BatchCommand::MarkRead(false)),
        'p' => Some(BatchCommand::MarkPreviousAsRead),
        'a' => Some(BatchCommand::SelectAll),
        'i' => Some(BatchCommand::SelectInverse),
        _ => None,
    }
}

fn panel_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        COLOR_BORDER_FOCUSED
    } else {
        COLOR_BORDER_IDLE
    };
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(COLOR_PANEL_BG))
}

fn draw_prompt(frame: &mut Frame<'_>, area: Rect, prompt: &Prompt) {
    let (title, lines) = prompt_body(prompt);
    let popup_area = centered_rect(60, 50, area);
    frame.render_widget(Clear, popup_area);
    let body = Paragraph::new(lines)
        .block(panel_block(title, true))
        .wrap(Wrap { trim: false });
    frame.render_widget(body, popup_area);
}

fn prompt_body(prompt: &Prompt) -> (&'static str, Vec<Line<'static>>) {
    match prompt {
        Prompt::ConfirmDelete => (
            "Delete chapters",
            vec![Line::from("Delete the selected chapters? [y/N]")],
        ),
        Prompt::Downloads => (
            "Download",
            vec![
                Line::from("1  next chapter"),
                Line::from("5  next 5 chapters"),
                Line::from("0  next 10 chapters"),
                Line::from("c  custom amount"),
                Line::from("u  unread chapters"),
                Line::from("a  all chapters"),
            ],
        ),
        Prompt::CustomDownload { input, limit } => (
            "Download custom amount",
            vec![
                Line::from(format!("How many chapters? (max {limit})")),
                Line::from(format!("> {input}")),
            ],
        ),
        Prompt::Filters => (
            "Filters",
            vec![
                Line::from("r  read"),
                Line::from("u  unread"),
                Line::from("d  downloaded"),
                Line::from("b  bookmarked"),
                Line::from("c  clear all"),
            ],
        ),
        Prompt::Categories {
            categories,
            checked,
            cursor,
        } => {
            let lines = categories
                .iter()
                .zip(checked.iter())
                .enumerate()
                .map(|(index, (category, checked))| {
                    let mark = if *checked { "[x]" } else { "[ ]" };
                    let style = if index == *cursor {
                        Style::default().bg(COLOR_PANEL_SELECTED_BG)
                    } else {
                        Style::default()
                    };
                    Line::from(Span::styled(format!("{mark} {}", category.name), style))
                })
                .collect();
            ("Move to categories", lines)
        }
        Prompt::DeleteDownloads => (
            "Remove from library",
            vec![Line::from("Also delete downloaded chapters? [y/N]")],
        ),
        Prompt::Merge { input } => (
            "Merge item",
            vec![
                Line::from("Item id to merge into this one:"),
                Line::from(format!("> {input}")),
            ],
        ),
    }
}

fn draw_help(frame: &mut Frame<'_>, area: Rect) {
    let lines = vec![
        Line::from("j/k, g/G      move"),
        Line::from("Enter         open chapter, toggle in selection mode"),
        Line::from("Space, v      start selection, select range"),
        Line::from("Esc           leave selection mode"),
        Line::from("r             resume reading"),
        Line::from("D             download menu"),
        Line::from("f             filters"),
        Line::from("s / S         cycle sort / reverse order"),
        Line::from("n             toggle chapter names and numbers"),
        Line::from("L             add to or remove from library"),
        Line::from("C             edit library categories"),
        Line::from("M             merge another item"),
        Line::from("R             refresh"),
        Line::from("q             quit"),
    ];
    let popup_area = centered_rect(70, 70, area);
    frame.render_widget(Clear, popup_area);
    let help = Paragraph::new(lines)
        .block(panel_block("Keys", true))
        .wrap(Wrap { trim: false });
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width + 1 > width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push('…');
    out
}
