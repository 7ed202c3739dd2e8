use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use time::OffsetDateTime;

use crate::client::AnalysisClient;
use crate::core::{AnalysisResult, ComplianceLabel, Finding, ReviewStatus, Severity};
use crate::export;
use crate::history::{HistoryEntry, HistoryFile};
use crate::view::{self, FilterState};

pub fn run(
    client: Arc<dyn AnalysisClient>,
    home_dir: PathBuf,
    color: bool,
    page_size: usize,
    truncate_chars: usize,
    keep_history: bool,
) -> Result<()> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;

    let mut tui = Tui {
        terminal: Terminal::new(CrosstermBackend::new(stdout)).context("initializing terminal")?,
    };
    tui.terminal.clear().ok();

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        run_app(
            &mut tui.terminal,
            client,
            home_dir,
            color,
            page_size,
            truncate_chars,
            keep_history,
        )
    }));

    let _ = tui.terminal.show_cursor();
    let _ = disable_raw_mode();
    let mut stdout = io::stdout();
    let _ = execute!(stdout, LeaveAlternateScreen);

    match res {
        Ok(res) => res,
        Err(_) => Err(anyhow::anyhow!(
            "panic inside the TUI (terminal state should be restored)"
        )),
    }
}

struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Prompt,
    Running,
    ReportView,
    Filters,
    HistoryList,
    HistoryDetail,
    Error,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Findings = 0,
    Summary = 1,
    Geos = 2,
}

impl Tab {
    fn next(self) -> Self {
        match self {
            Tab::Findings => Tab::Summary,
            Tab::Summary => Tab::Geos,
            Tab::Geos => Tab::Findings,
        }
    }

    fn prev(self) -> Self {
        match self {
            Tab::Findings => Tab::Geos,
            Tab::Summary => Tab::Findings,
            Tab::Geos => Tab::Summary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Analyze,
    History,
    Help,
}

#[derive(Debug, Clone)]
struct CommandItem {
    title: &'static str,
    description: &'static str,
    kind: CommandKind,
}

struct PendingAnalysis {
    rx: mpsc::Receiver<Result<AnalysisResult>>,
    started_at: Instant,
    started_wall: OffsetDateTime,
    prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterRow {
    Geo(String),
    Label(ComplianceLabel),
    Severity(Severity),
}

struct App {
    color: bool,
    home_dir: PathBuf,
    page_size: usize,
    truncate_chars: usize,
    keep_history: bool,

    screen: Screen,
    help_return_to: Screen,
    error_return_to: Screen,
    tab: Tab,

    commands: Vec<CommandItem>,
    query: String,
    query_mode: bool,
    command_state: ListState,

    prompt_input: String,
    last_prompt: String,

    result: Option<AnalysisResult>,
    filters: FilterState,
    search_mode: bool,
    findings_state: ListState,

    filter_rows: Vec<FilterRow>,
    filter_state: ListState,

    history_entries: Vec<HistoryFile>,
    history_state: ListState,
    history_view: Option<HistoryEntry>,
    history_scroll: u16,

    error: Option<String>,
    status: Option<String>,
    pending: Option<PendingAnalysis>,

    tick: u64,
}

impl App {
    fn new(
        home_dir: PathBuf,
        color: bool,
        page_size: usize,
        truncate_chars: usize,
        keep_history: bool,
    ) -> Self {
        let commands = vec![
            CommandItem {
                title: "Analyze feature",
                description: "Type a feature description and screen it for geo-compliance findings.",
                kind: CommandKind::Analyze,
            },
            CommandItem {
                title: "History",
                description: "Browse saved analyses (~/.config/geoscreen/history/).",
                kind: CommandKind::History,
            },
            CommandItem {
                title: "Help",
                description: "Key bindings and a short tour.",
                kind: CommandKind::Help,
            },
        ];

        let mut command_state = ListState::default();
        command_state.select(Some(0));

        let mut findings_state = ListState::default();
        findings_state.select(Some(0));

        let mut filter_state = ListState::default();
        filter_state.select(Some(0));

        let mut history_state = ListState::default();
        history_state.select(Some(0));

        Self {
            color,
            home_dir,
            page_size,
            truncate_chars,
            keep_history,
            screen: Screen::Home,
            help_return_to: Screen::Home,
            error_return_to: Screen::Home,
            tab: Tab::Findings,
            commands,
            query: String::new(),
            query_mode: false,
            command_state,
            prompt_input: String::new(),
            last_prompt: String::new(),
            result: None,
            filters: FilterState::new(),
            search_mode: false,
            findings_state,
            filter_rows: Vec::new(),
            filter_state,
            history_entries: Vec::new(),
            history_state,
            history_view: None,
            history_scroll: 0,
            error: None,
            status: None,
            pending: None,
            tick: 0,
        }
    }

    fn filtered_command_indices(&self) -> Vec<usize> {
        let q = self.query.trim().to_ascii_lowercase();
        if q.is_empty() {
            return (0..self.commands.len()).collect();
        }
        self.commands
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let hay = format!("{} {}", c.title, c.description).to_ascii_lowercase();
                hay.contains(&q)
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn selected_command_kind(&self) -> Option<CommandKind> {
        let indices = self.filtered_command_indices();
        let selected = self.command_state.selected().unwrap_or(0);
        let idx = indices.get(selected).copied()?;
        Some(self.commands.get(idx)?.kind)
    }

    fn ensure_command_selection_in_range(&mut self) {
        let n = self.filtered_command_indices().len();
        if n == 0 {
            self.command_state.select(None);
            return;
        }
        let selected = self.command_state.selected().unwrap_or(0);
        self.command_state.select(Some(selected.min(n - 1)));
    }

    fn move_command_selection(&mut self, delta: i32) {
        self.ensure_command_selection_in_range();
        let n = self.filtered_command_indices().len();
        if n == 0 {
            return;
        }
        let selected = self.command_state.selected().unwrap_or(0) as i32;
        let next = (selected + delta).clamp(0, (n as i32).saturating_sub(1));
        self.command_state.select(Some(next as usize));
    }

    fn move_list_selection(state: &mut ListState, len: usize, delta: i32) {
        if len == 0 {
            state.select(None);
            return;
        }
        let selected = state.selected().unwrap_or(0) as i32;
        let next = (selected + delta).clamp(0, (len as i32).saturating_sub(1));
        state.select(Some(next as usize));
    }

    // Replacing the result resets the whole view state: a fresh analysis
    // never inherits filters, search, page, or expansion from the old one.
    fn install_result(&mut self, result: AnalysisResult) {
        self.result = Some(result);
        self.filters.reset();
        self.findings_state.select(Some(0));
        self.rebuild_filter_rows();
        self.tab = Tab::Findings;
        self.status = None;
    }

    fn rebuild_filter_rows(&mut self) {
        let mut rows = Vec::new();
        if let Some(result) = &self.result {
            let mut geos: Vec<&str> = Vec::new();
            for f in &result.findings {
                if !geos.contains(&f.geo.as_str()) {
                    geos.push(&f.geo);
                }
            }
            rows.extend(geos.into_iter().map(|g| FilterRow::Geo(g.to_string())));
            rows.extend(ComplianceLabel::ALL.into_iter().map(FilterRow::Label));
            rows.extend(Severity::ALL.into_iter().map(FilterRow::Severity));
        }
        self.filter_rows = rows;
        self.filter_state.select(Some(0));
    }

    fn selected_visible_finding_id(&self) -> Option<String> {
        let result = self.result.as_ref()?;
        let visible = view::visible_page(&result.findings, &self.filters, self.page_size);
        let selected = self.findings_state.selected().unwrap_or(0);
        visible.findings.get(selected).map(|f| f.id.clone())
    }

    fn clamp_findings_selection(&mut self) {
        let Some(result) = self.result.as_ref() else {
            self.findings_state.select(None);
            return;
        };
        let visible = view::visible_page(&result.findings, &self.filters, self.page_size);
        if visible.findings.is_empty() {
            self.findings_state.select(None);
            return;
        }
        let selected = self.findings_state.selected().unwrap_or(0);
        self.findings_state
            .select(Some(selected.min(visible.findings.len() - 1)));
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    client: Arc<dyn AnalysisClient>,
    home_dir: PathBuf,
    color: bool,
    page_size: usize,
    truncate_chars: usize,
    keep_history: bool,
) -> Result<()> {
    let mut app = App::new(home_dir, color, page_size, truncate_chars, keep_history);

    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| draw(f, &mut app)).context("drawing frame")?;

        if let Some(pending) = app.pending.take() {
            match pending.rx.try_recv() {
                Ok(res) => match res {
                    Ok(result) => {
                        let finished_wall = OffsetDateTime::now_utc();
                        let mut history_note = None;
                        if app.keep_history {
                            // Best-effort; surfaced as a status note, never
                            // as a failure of the analysis itself.
                            if let Err(err) = crate::history::write_analysis(
                                &app.home_dir,
                                pending.started_wall,
                                finished_wall,
                                &client.mode().to_string(),
                                &pending.prompt,
                                &result,
                            ) {
                                history_note =
                                    Some(format!("history: could not save analysis: {err}"));
                            }
                        }
                        app.last_prompt = pending.prompt;
                        app.install_result(result);
                        app.status = history_note;
                        app.error = None;
                        app.screen = Screen::ReportView;
                    }
                    Err(err) => {
                        open_error_return_to(&mut app, err.to_string(), Screen::Home);
                    }
                },
                Err(mpsc::TryRecvError::Empty) => {
                    if pending.started_at.elapsed() > Duration::from_secs(120) {
                        open_error_return_to(
                            &mut app,
                            "timed out waiting for the analysis to finish.".to_string(),
                            Screen::Home,
                        );
                    } else {
                        app.pending = Some(pending);
                    }
                }
                Err(mpsc::TryRecvError::Disconnected) => {
                    open_error_return_to(
                        &mut app,
                        "lost the background analysis task.".to_string(),
                        Screen::Home,
                    );
                }
            }
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        if event::poll(timeout).context("polling for events")? {
            match event::read().context("reading event")? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press && handle_key(&mut app, &client, key)? {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick = app.tick.wrapping_add(1);
            last_tick = Instant::now();
        }
    }

    Ok(())
}

fn open_help(app: &mut App) {
    app.help_return_to = app.screen;
    app.screen = Screen::Help;
}

fn open_error_return_to(app: &mut App, msg: impl Into<String>, return_to: Screen) {
    app.error = Some(msg.into());
    app.error_return_to = match return_to {
        Screen::Running | Screen::Error => Screen::Home,
        other => other,
    };
    app.screen = Screen::Error;
}

fn start_analysis(app: &mut App, client: &Arc<dyn AnalysisClient>) {
    let prompt = app.prompt_input.trim().to_string();
    if prompt.is_empty() {
        open_error_return_to(app, "the feature description is empty.", Screen::Prompt);
        return;
    }
    // The trigger is inert while a request is pending; there is no second
    // in-flight request to race with.
    if app.pending.is_some() {
        return;
    }

    let (tx, rx) = mpsc::channel();
    let client = Arc::clone(client);
    let text = prompt.clone();
    thread::spawn(move || {
        let _ = tx.send(client.analyze(&text));
    });

    app.pending = Some(PendingAnalysis {
        rx,
        started_at: Instant::now(),
        started_wall: OffsetDateTime::now_utc(),
        prompt,
    });
    app.screen = Screen::Running;
}

fn open_history(app: &mut App) {
    match crate::history::list(&app.home_dir) {
        Ok(entries) => {
            app.history_entries = entries;
            app.history_state.select(if app.history_entries.is_empty() {
                None
            } else {
                Some(0)
            });
            app.screen = Screen::HistoryList;
        }
        Err(err) => open_error_return_to(app, err.to_string(), Screen::Home),
    }
}

fn open_history_detail(app: &mut App) {
    let Some(selected) = app.history_state.selected() else {
        return;
    };
    let Some(file) = app.history_entries.get(selected) else {
        return;
    };
    match crate::history::load(&file.path) {
        Ok(entry) => {
            app.history_view = Some(entry);
            app.history_scroll = 0;
            app.screen = Screen::HistoryDetail;
        }
        Err(err) => open_error_return_to(app, err.to_string(), Screen::HistoryList),
    }
}

fn export_current(app: &mut App, format: crate::cli::ExportFormat) {
    let Some(result) = app.result.as_ref() else {
        return;
    };

    // Always the full result, regardless of the active filters.
    let (payload, ext) = match format {
        crate::cli::ExportFormat::Csv => (Ok(export::build_csv(result)), "csv"),
        crate::cli::ExportFormat::Json => (export::build_json(result), "json"),
    };
    let payload = match payload {
        Ok(p) => p,
        Err(err) => {
            app.status = Some(format!("export failed: {err}"));
            return;
        }
    };

    let dir = crate::history::exports_dir(&app.home_dir);
    if let Err(err) = std::fs::create_dir_all(&dir) {
        app.status = Some(format!("export failed: {err}"));
        return;
    }
    let ts = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let path = dir.join(format!("findings-{}-{ts}.{ext}", result.feature_id));
    match std::fs::write(&path, payload) {
        Ok(()) => {
            let hint = path
                .strip_prefix(&app.home_dir)
                .map(|p| format!("~/{}", p.display()))
                .unwrap_or_else(|_| path.display().to_string());
            app.status = Some(format!("exported {hint}"));
        }
        Err(err) => {
            app.status = Some(format!("export failed: {err}"));
        }
    }
}

fn handle_key(app: &mut App, client: &Arc<dyn AnalysisClient>, key: KeyEvent) -> Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }

    if app.search_mode {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                app.search_mode = false;
                let term = app.filters.search.trim().to_string();
                app.filters.set_search(term);
                app.clamp_findings_selection();
            }
            KeyCode::Backspace => {
                let mut term = app.filters.search.clone();
                term.pop();
                app.filters.set_search(term);
                app.clamp_findings_selection();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.filters.set_search("");
                app.clamp_findings_selection();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let mut term = app.filters.search.clone();
                term.push(c);
                app.filters.set_search(term);
                app.clamp_findings_selection();
            }
            _ => {}
        }
        return Ok(false);
    }

    match app.screen {
        Screen::Home => match key.code {
            KeyCode::Char(':') => {
                app.query_mode = !app.query_mode;
                if !app.query_mode {
                    app.query = app.query.trim().to_string();
                }
            }
            KeyCode::Esc if app.query_mode => {
                app.query_mode = false;
                app.query.clear();
                app.ensure_command_selection_in_range();
            }
            KeyCode::Backspace if app.query_mode => {
                app.query.pop();
                app.ensure_command_selection_in_range();
            }
            KeyCode::Char(c)
                if app.query_mode && !key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                app.query.push(c);
                app.ensure_command_selection_in_range();
            }
            KeyCode::Up => app.move_command_selection(-1),
            KeyCode::Down => app.move_command_selection(1),
            KeyCode::Char('k') if !app.query_mode => app.move_command_selection(-1),
            KeyCode::Char('j') if !app.query_mode => app.move_command_selection(1),
            KeyCode::Enter => match app.selected_command_kind() {
                Some(CommandKind::Analyze) => {
                    app.prompt_input = app.last_prompt.clone();
                    app.screen = Screen::Prompt;
                }
                Some(CommandKind::History) => open_history(app),
                Some(CommandKind::Help) => open_help(app),
                None => {}
            },
            KeyCode::Char('q') if !app.query_mode => return Ok(true),
            KeyCode::Char('?') if !app.query_mode => open_help(app),
            _ => {}
        },
        Screen::Prompt => match key.code {
            KeyCode::Esc => {
                app.screen = Screen::Home;
            }
            KeyCode::Enter => start_analysis(app, client),
            KeyCode::Backspace => {
                app.prompt_input.pop();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.prompt_input.clear();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.prompt_input.push(c);
            }
            _ => {}
        },
        Screen::Running => match key.code {
            // The request itself is not cancelled; the response is dropped.
            KeyCode::Esc => {
                app.pending = None;
                app.screen = Screen::Home;
            }
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('?') => open_help(app),
            _ => {}
        },
        Screen::ReportView => match key.code {
            KeyCode::Tab => {
                app.tab = app.tab.next();
            }
            KeyCode::BackTab => {
                app.tab = app.tab.prev();
            }
            KeyCode::Char('/') if app.tab == Tab::Findings => {
                app.search_mode = true;
            }
            KeyCode::Char('f') if app.tab == Tab::Findings => {
                if !app.filter_rows.is_empty() {
                    app.filter_state.select(Some(0));
                    app.screen = Screen::Filters;
                }
            }
            KeyCode::Char('c') if app.tab == Tab::Findings => {
                app.filters.clear_filters();
                app.clamp_findings_selection();
                app.status = Some("filters cleared".to_string());
            }
            KeyCode::Char('[') if app.tab == Tab::Findings => {
                view::prev_page(&mut app.filters);
                app.findings_state.select(Some(0));
            }
            KeyCode::Char(']') if app.tab == Tab::Findings => {
                if let Some(result) = app.result.as_ref() {
                    let total =
                        view::visible_page(&result.findings, &app.filters, app.page_size)
                            .total_pages;
                    view::next_page(&mut app.filters, total);
                    app.findings_state.select(Some(0));
                }
            }
            KeyCode::Up | KeyCode::Char('k') if app.tab == Tab::Findings => {
                let len = app
                    .result
                    .as_ref()
                    .map(|r| {
                        view::visible_page(&r.findings, &app.filters, app.page_size)
                            .findings
                            .len()
                    })
                    .unwrap_or(0);
                App::move_list_selection(&mut app.findings_state, len, -1);
            }
            KeyCode::Down | KeyCode::Char('j') if app.tab == Tab::Findings => {
                let len = app
                    .result
                    .as_ref()
                    .map(|r| {
                        view::visible_page(&r.findings, &app.filters, app.page_size)
                            .findings
                            .len()
                    })
                    .unwrap_or(0);
                App::move_list_selection(&mut app.findings_state, len, 1);
            }
            KeyCode::Char('e') if app.tab == Tab::Findings => {
                if let Some(id) = app.selected_visible_finding_id() {
                    app.filters.toggle_expanded(&id);
                }
            }
            KeyCode::Char('v') if app.tab == Tab::Findings => {
                if let Some(id) = app.selected_visible_finding_id() {
                    if let Some(result) = app.result.as_mut() {
                        let current = result
                            .findings
                            .iter()
                            .find(|f| f.id == id)
                            .map(Finding::effective_review)
                            .unwrap_or(ReviewStatus::Confirm);
                        view::set_review(&mut result.findings, &id, current.next());
                    }
                }
            }
            KeyCode::Char('x') => export_current(app, crate::cli::ExportFormat::Csv),
            KeyCode::Char('X') => export_current(app, crate::cli::ExportFormat::Json),
            KeyCode::Char('r') => {
                if !app.last_prompt.is_empty() {
                    app.prompt_input = app.last_prompt.clone();
                    start_analysis(app, client);
                }
            }
            KeyCode::Char('b') | KeyCode::Esc => {
                app.screen = Screen::Home;
            }
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('?') => open_help(app),
            _ => {}
        },
        Screen::Filters => match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                App::move_list_selection(&mut app.filter_state, app.filter_rows.len(), -1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                App::move_list_selection(&mut app.filter_state, app.filter_rows.len(), 1);
            }
            KeyCode::Char(' ') => {
                if let Some(row) = app
                    .filter_state
                    .selected()
                    .and_then(|i| app.filter_rows.get(i))
                    .cloned()
                {
                    match row {
                        FilterRow::Geo(geo) => app.filters.toggle_geo(&geo),
                        FilterRow::Label(label) => app.filters.toggle_label(label),
                        FilterRow::Severity(sev) => app.filters.toggle_severity(sev),
                    }
                    app.clamp_findings_selection();
                }
            }
            KeyCode::Char('c') => {
                app.filters.clear_filters();
                app.clamp_findings_selection();
            }
            KeyCode::Enter | KeyCode::Char('b') | KeyCode::Esc => {
                app.screen = Screen::ReportView;
            }
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('?') => open_help(app),
            _ => {}
        },
        Screen::HistoryList => match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                App::move_list_selection(&mut app.history_state, app.history_entries.len(), -1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                App::move_list_selection(&mut app.history_state, app.history_entries.len(), 1);
            }
            KeyCode::Enter => open_history_detail(app),
            KeyCode::Char('r') => open_history(app),
            KeyCode::Char('b') | KeyCode::Esc => {
                app.screen = Screen::Home;
            }
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('?') => open_help(app),
            _ => {}
        },
        Screen::HistoryDetail => match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                app.history_scroll = app.history_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.history_scroll = app.history_scroll.saturating_add(1);
            }
            KeyCode::Char('o') => {
                if let Some(entry) = app.history_view.take() {
                    app.last_prompt = entry.prompt_excerpt.clone();
                    app.install_result(entry.result);
                    app.screen = Screen::ReportView;
                }
            }
            KeyCode::Char('b') | KeyCode::Esc => {
                app.screen = Screen::HistoryList;
            }
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('?') => open_help(app),
            _ => {}
        },
        Screen::Error => match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('b') => {
                app.error = None;
                app.screen = app.error_return_to;
            }
            KeyCode::Char('q') => return Ok(true),
            _ => {}
        },
        Screen::Help => match key.code {
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('?') | KeyCode::Enter => {
                app.screen = app.help_return_to;
            }
            KeyCode::Char('q') => return Ok(true),
            _ => {}
        },
    }

    Ok(false)
}

fn draw(f: &mut ratatui::Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(f.size());

    draw_header(f, chunks[0], app);

    match app.screen {
        Screen::Home => draw_home(f, chunks[1], app),
        Screen::Prompt => draw_prompt(f, chunks[1], app),
        Screen::Running => draw_running(f, chunks[1], app),
        Screen::ReportView => draw_report(f, chunks[1], app),
        Screen::Filters => draw_filters(f, chunks[1], app),
        Screen::HistoryList => draw_history_list(f, chunks[1], app),
        Screen::HistoryDetail => draw_history_detail(f, chunks[1], app),
        Screen::Error => draw_error(f, chunks[1], app),
        Screen::Help => draw_help(f, chunks[1]),
    }

    draw_footer(f, chunks[2], app);
}

fn draw_header(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let left = "geoscreen";
    let right = if app.pending.is_some() {
        let dots = ".".repeat((app.tick % 4) as usize);
        format!("analyzing{dots}")
    } else if let Some(status) = &app.status {
        status.clone()
    } else {
        String::new()
    };

    let line = Line::from(vec![
        Span::styled(left, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(right, Style::default().fg(Color::DarkGray)),
    ]);
    let w = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(w, area);
}

fn draw_home(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let query = if app.query_mode {
        format!(":{}", app.query)
    } else if app.query.trim().is_empty() {
        "press : to search commands".to_string()
    } else {
        format!(":{}", app.query)
    };
    let search =
        Paragraph::new(query).block(Block::default().borders(Borders::ALL).title("Search"));
    f.render_widget(search, chunks[0]);

    let indices = app.filtered_command_indices();
    let items: Vec<ListItem> = indices
        .iter()
        .filter_map(|&i| app.commands.get(i))
        .map(|c| {
            ListItem::new(Text::from(vec![
                Line::from(Span::styled(
                    c.title,
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    c.description,
                    Style::default().fg(Color::DarkGray),
                )),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Commands"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[1], &mut app.command_state);
}

fn draw_prompt(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let input = Paragraph::new(app.prompt_input.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Feature description"),
        );
    f.render_widget(input, chunks[0]);

    let count = Paragraph::new(format!("{} characters", app.prompt_input.chars().count()))
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(count, chunks[1]);
}

fn draw_running(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let dots = ".".repeat((app.tick % 4) as usize);
    let lines = vec![
        Line::from(""),
        Line::from(format!("analyzing feature description{dots}")),
        Line::from(""),
        Line::from(Span::styled(
            "the backend call has no cancellation; Esc discards the response",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let w = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Running"));
    f.render_widget(w, area);
}

fn severity_style(severity: Severity, enabled: bool) -> Style {
    if !enabled {
        return Style::default();
    }
    match severity {
        Severity::High => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Severity::Med => Style::default().fg(Color::Yellow),
        Severity::Ok => Style::default().fg(Color::Green),
    }
}

fn label_style(label: ComplianceLabel, enabled: bool) -> Style {
    if !enabled {
        return Style::default();
    }
    match label {
        ComplianceLabel::Compliant => Style::default().fg(Color::Green),
        ComplianceLabel::Prohibited => Style::default().fg(Color::Red),
        ComplianceLabel::NeedsControls => Style::default().fg(Color::Yellow),
    }
}

fn review_style(review: ReviewStatus, enabled: bool) -> Style {
    if !enabled {
        return Style::default();
    }
    match review {
        ReviewStatus::Confirm => Style::default().fg(Color::Green),
        ReviewStatus::Reject => Style::default().fg(Color::Red),
        ReviewStatus::NeedsFollowUp => Style::default().fg(Color::Yellow),
    }
}

fn draw_report(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    if app.result.is_none() {
        let w = Paragraph::new("no analysis yet. run one from the home screen.")
            .block(Block::default().borders(Borders::ALL).title("Report"));
        f.render_widget(w, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let tab_titles = ["Findings", "Summary", "Geos"];
    let tabs = Tabs::new(tab_titles.to_vec())
        .select(app.tab as usize)
        .block(Block::default().borders(Borders::ALL).title("Report"))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[0]);

    match app.tab {
        Tab::Findings => draw_findings_tab(f, chunks[1], app),
        Tab::Summary => draw_summary_tab(f, chunks[1], app),
        Tab::Geos => draw_geos_tab(f, chunks[1], app),
    }
}

fn draw_findings_tab(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    let Some(result) = app.result.as_ref() else {
        return;
    };
    let color = app.color;
    let visible = view::visible_page(&result.findings, &app.filters, app.page_size);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(area);

    let (from, to) = visible.display_range();
    let mut status = format!(
        "page {} of {} | showing {from}-{to} of {}",
        visible.page, visible.total_pages, visible.filtered_len
    );
    if app.search_mode {
        status.push_str(&format!(" | search: {}_", app.filters.search));
    } else if app.filters.has_active_filters() {
        status.push_str(" | filters active (c clears)");
    }
    let status = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    f.render_widget(status, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    let items: Vec<ListItem> = visible
        .findings
        .iter()
        .map(|finding| {
            let review = finding.effective_review();
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<4}", finding.severity.as_str()),
                    severity_style(finding.severity, color),
                ),
                Span::raw(format!("{:<6}", finding.geo)),
                Span::raw(view::truncate_text(&finding.law, 38)),
                Span::raw("  "),
                Span::styled(format!("[{}]", review.as_str()), review_style(review, color)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Findings"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    let selected_finding = app
        .findings_state
        .selected()
        .and_then(|i| visible.findings.get(i))
        .copied()
        .cloned();

    f.render_stateful_widget(list, body[0], &mut app.findings_state);

    let detail = match selected_finding {
        Some(finding) => finding_detail_text(&finding, &app.filters, app.truncate_chars, color),
        None => Text::from("no findings match the current search/filters."),
    };
    let detail = Paragraph::new(detail)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Detail"));
    f.render_widget(detail, body[1]);
}

fn finding_detail_text(
    finding: &Finding,
    filters: &FilterState,
    truncate_chars: usize,
    color: bool,
) -> Text<'static> {
    let review = finding.effective_review();
    let reasoning = if filters.is_expanded(&finding.id) {
        finding.reasoning.clone()
    } else {
        view::truncate_text(&finding.reasoning, truncate_chars)
    };
    let expanded_hint = if finding.reasoning.chars().count() > truncate_chars {
        if filters.is_expanded(&finding.id) {
            " (e collapses)"
        } else {
            " (e expands)"
        }
    } else {
        ""
    };

    let mut lines = vec![
        Line::from(Span::styled(
            finding.law.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::raw(format!("{}  ", finding.geo)),
            Span::styled(
                finding.label.as_str().to_string(),
                label_style(finding.label, color),
            ),
            Span::raw("  "),
            Span::styled(
                finding.severity.as_str().to_string(),
                severity_style(finding.severity, color),
            ),
            Span::raw(format!("  {}%", finding.confidence)),
        ]),
        Line::from(vec![
            Span::raw("review: "),
            Span::styled(review.as_str().to_string(), review_style(review, color)),
            Span::styled(" (v cycles)", Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!("reasoning{expanded_hint}:"),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(reasoning),
        Line::from(""),
        Line::from(Span::styled(
            "controls:",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(finding.controls.clone()),
        Line::from(""),
        Line::from(Span::styled(
            "evidence:",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(finding.evidence_snippet.clone()),
    ];

    if !finding.citations.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "citations:",
            Style::default().fg(Color::DarkGray),
        )));
        for citation in &finding.citations {
            lines.push(Line::from(format!("- {citation}")));
        }
    }

    Text::from(lines)
}

fn draw_summary_tab(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let Some(result) = app.result.as_ref() else {
        return;
    };
    let color = app.color;

    let mut confirmed = 0usize;
    let mut rejected = 0usize;
    let mut follow_up = 0usize;
    for finding in &result.findings {
        match finding.effective_review() {
            ReviewStatus::Confirm => confirmed += 1,
            ReviewStatus::Reject => rejected += 1,
            ReviewStatus::NeedsFollowUp => follow_up += 1,
        }
    }

    let mut lines = vec![
        Line::from(format!("feature: {}", result.feature_id)),
        Line::from(""),
        Line::from(vec![
            Span::styled("HIGH", severity_style(Severity::High, color)),
            Span::raw(format!(" {}   ", result.summary.high)),
            Span::styled("MED", severity_style(Severity::Med, color)),
            Span::raw(format!(" {}   ", result.summary.med)),
            Span::styled("OK", severity_style(Severity::Ok, color)),
            Span::raw(format!(" {}", result.summary.ok)),
        ]),
        Line::from(format!("findings: {}", result.findings.len())),
    ];
    if let Some(ms) = result.latency_ms {
        lines.push(Line::from(format!("analysis latency: {ms} ms")));
    }
    if !result.summary_matches_findings() {
        lines.push(Line::from(Span::styled(
            "note: summary counts do not match the findings list (backend inconsistency)",
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "review: {confirmed} confirmed, {rejected} rejected, {follow_up} follow-up"
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "x exports CSV, X exports JSON (full result, filters ignored)",
        Style::default().fg(Color::DarkGray),
    )));

    let w = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Summary"));
    f.render_widget(w, area);
}

fn draw_geos_tab(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let Some(result) = app.result.as_ref() else {
        return;
    };

    let mut lines = Vec::new();
    for geo in &result.detected_geos {
        let count = result.findings.iter().filter(|f| &f.geo == geo).count();
        let worst = result
            .findings
            .iter()
            .filter(|f| &f.geo == geo)
            .map(|f| f.severity)
            .max();
        let worst = match worst {
            Some(sev) => format!("worst {}", sev.as_str()),
            None => "no findings".to_string(),
        };
        lines.push(Line::from(format!("{geo:<8} {count} findings  ({worst})")));
    }
    if lines.is_empty() {
        lines.push(Line::from("no geos detected."));
    }

    let w = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Detected geos"));
    f.render_widget(w, area);
}

fn filter_row_line(row: &FilterRow, filters: &FilterState) -> String {
    match row {
        FilterRow::Geo(geo) => {
            let mark = if filters.geos.contains(geo) { "x" } else { " " };
            format!("[{mark}] geo      {geo}")
        }
        FilterRow::Label(label) => {
            let mark = if filters.labels.contains(label) { "x" } else { " " };
            format!("[{mark}] label    {label}")
        }
        FilterRow::Severity(sev) => {
            let mark = if filters.severities.contains(sev) { "x" } else { " " };
            format!("[{mark}] severity {sev}")
        }
    }
}

fn draw_filters(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1)])
        .split(area);

    let note = Paragraph::new(
        "empty selection in a dimension means no filter for that dimension",
    )
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(note, chunks[0]);

    let items: Vec<ListItem> = app
        .filter_rows
        .iter()
        .map(|row| ListItem::new(filter_row_line(row, &app.filters)))
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Filters"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[1], &mut app.filter_state);
}

fn draw_history_list(f: &mut ratatui::Frame, area: Rect, app: &mut App) {
    if app.history_entries.is_empty() {
        let w = Paragraph::new("no saved analyses.")
            .block(Block::default().borders(Borders::ALL).title("History"));
        f.render_widget(w, area);
        return;
    }

    let items: Vec<ListItem> = app
        .history_entries
        .iter()
        .map(|file| {
            ListItem::new(Line::from(format!(
                "{}  ({} bytes)",
                file.file_name, file.size
            )))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("History"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut app.history_state);
}

fn draw_history_detail(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let Some(entry) = app.history_view.as_ref() else {
        return;
    };

    let mut lines = vec![
        Line::from(format!("finished: {}", entry.finished_at)),
        Line::from(format!("mode: {}", entry.mode)),
        Line::from(format!(
            "prompt ({} chars): {}",
            entry.prompt_chars, entry.prompt_excerpt
        )),
        Line::from(format!("feature: {}", entry.result.feature_id)),
        Line::from(format!(
            "findings: {} (HIGH {}, MED {}, OK {})",
            entry.result.findings.len(),
            entry.result.summary.high,
            entry.result.summary.med,
            entry.result.summary.ok
        )),
        Line::from(""),
        Line::from(Span::styled(
            "o opens this result in the report view",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];
    for finding in &entry.result.findings {
        lines.push(Line::from(format!(
            "- [{}] {} {} ({}%)",
            finding.severity.as_str(),
            finding.geo,
            finding.law,
            finding.confidence
        )));
    }

    let w = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((app.history_scroll, 0))
        .block(Block::default().borders(Borders::ALL).title("Saved analysis"));
    f.render_widget(w, area);
}

fn draw_error(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let msg = app.error.as_deref().unwrap_or("unknown error");
    let popup = centered_rect(70, 50, area);
    let lines = vec![
        Line::from(Span::styled(
            "the analysis was not applied; the previous result is untouched.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(msg.to_string()),
        Line::from(""),
        Line::from("Enter/Esc dismiss | retry from where you were"),
    ];
    let w = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Error")
                .style(Style::default().fg(Color::Red)),
        );
    f.render_widget(ratatui::widgets::Clear, popup);
    f.render_widget(w, popup);
}

fn draw_help(f: &mut ratatui::Frame, area: Rect) {
    let lines = vec![
        Line::from("Home:     Enter run | up/down or j/k select | : search | q quit"),
        Line::from("Prompt:   type text | Enter analyze | Ctrl-U clear | Esc back"),
        Line::from("Report:   Tab tabs | / search law+reasoning | f filters | c clear"),
        Line::from("          [ ] pages | e expand reasoning | v cycle review"),
        Line::from("          x export CSV | X export JSON | r re-run | b back"),
        Line::from("Filters:  Space toggle | c clear | Enter/Esc done"),
        Line::from("History:  Enter open | o open as report | r refresh | b back"),
        Line::from(""),
        Line::from("Ctrl-C force-quits from anywhere."),
    ];
    let w = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(w, area);
}

fn draw_footer(f: &mut ratatui::Frame, area: Rect, app: &App) {
    if app.search_mode {
        let line1 = Line::from(vec![
            Span::styled("search: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                if app.filters.search.is_empty() {
                    "(empty)"
                } else {
                    app.filters.search.as_str()
                },
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
        ]);
        let line2 = Line::from("Backspace delete | Ctrl-U clear | Enter/Esc done | Ctrl-C quit");
        let w = Paragraph::new(Text::from(vec![line1, line2]))
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        f.render_widget(w, area);
        return;
    }

    let (line1, line2) = match app.screen {
        Screen::Home => (
            "Enter run | up/down or j/k select | : search",
            "q quit | ? help | Ctrl-C force quit",
        ),
        Screen::Prompt => (
            "type text | Enter analyze | Ctrl-U clear | Esc back",
            "Ctrl-C force quit",
        ),
        Screen::Running => ("Esc discard | (running)", "q quit | Ctrl-C force quit"),
        Screen::ReportView => (
            "Tab tabs | / search | f filters | c clear | [ ] pages | e expand | v review",
            "x CSV | X JSON | r re-run | b back | q quit | ? help",
        ),
        Screen::Filters => (
            "Space toggle | up/down or j/k select | c clear",
            "Enter/Esc done | q quit | ? help",
        ),
        Screen::HistoryList => (
            "Enter open | up/down or j/k select | r refresh | b back",
            "q quit | ? help",
        ),
        Screen::HistoryDetail => (
            "up/down or j/k scroll | o open as report | b back",
            "q quit | ? help",
        ),
        Screen::Error => ("Enter/Esc dismiss", "q quit"),
        Screen::Help => ("Esc/b back", "q quit"),
    };

    let w = Paragraph::new(Text::from(vec![Line::from(line1), Line::from(line2)]))
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(w, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
