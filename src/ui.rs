use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

use event_checkin::{DraftField, Registry, ValidationError, CODE_LEN};

// ============================================================================
// FOCUS
// ============================================================================

/// Where keystrokes land: one of the form inputs, the search box, or the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    FirstName,
    LastName,
    Code,
    Search,
    List,
}

impl Focus {
    pub fn next(&self) -> Self {
        match self {
            Focus::FirstName => Focus::LastName,
            Focus::LastName => Focus::Code,
            Focus::Code => Focus::Search,
            Focus::Search => Focus::List,
            Focus::List => Focus::FirstName,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Focus::FirstName => Focus::List,
            Focus::LastName => Focus::FirstName,
            Focus::Code => Focus::LastName,
            Focus::Search => Focus::Code,
            Focus::List => Focus::Search,
        }
    }

    fn draft_field(&self) -> Option<DraftField> {
        match self {
            Focus::FirstName => Some(DraftField::FirstName),
            Focus::LastName => Some(DraftField::LastName),
            Focus::Code => Some(DraftField::Code),
            Focus::Search | Focus::List => None,
        }
    }
}

// ============================================================================
// APP STATE
// ============================================================================

pub struct App {
    pub registry: Registry,
    pub focus: Focus,
    pub state: TableState,
    /// Pending delete awaiting the blocking yes/no confirmation
    pub confirm_delete: Option<u64>,
    pub errors: Vec<ValidationError>,
    pub flash: Option<String>,
}

impl App {
    pub fn new(registry: Registry) -> Self {
        let mut state = TableState::default();
        if !registry.attendees().is_empty() {
            state.select(Some(0));
        }

        Self {
            registry,
            focus: Focus::FirstName,
            state,
            confirm_delete: None,
            errors: Vec::new(),
            flash: None,
        }
    }

    pub fn selected_id(&self) -> Option<u64> {
        let filtered = self.registry.filtered();
        self.state
            .selected()
            .and_then(|i| filtered.get(i))
            .map(|a| a.id)
    }

    pub fn next(&mut self) {
        let len = self.registry.filtered().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.registry.filtered().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    /// Keep the selection inside the filtered view after it shrinks or grows
    fn clamp_selection(&mut self) {
        let len = self.registry.filtered().len();
        if len == 0 {
            self.state.select(None);
        } else {
            let i = self.state.selected().unwrap_or(0).min(len - 1);
            self.state.select(Some(i));
        }
    }

    fn input_char(&mut self, c: char) {
        if let Some(field) = self.focus.draft_field() {
            let mut value = self.draft_value(field).to_string();
            value.push(c);
            self.registry.set_draft_field(field, value);
            self.errors.clear();
        } else if self.focus == Focus::Search {
            let mut term = self.registry.search_term().to_string();
            term.push(c);
            self.registry.set_search_term(term);
            self.clamp_selection();
        }
    }

    fn backspace(&mut self) {
        if let Some(field) = self.focus.draft_field() {
            let mut value = self.draft_value(field).to_string();
            value.pop();
            self.registry.set_draft_field(field, value);
            self.errors.clear();
        } else if self.focus == Focus::Search {
            let mut term = self.registry.search_term().to_string();
            term.pop();
            self.registry.set_search_term(term);
            self.clamp_selection();
        }
    }

    fn draft_value(&self, field: DraftField) -> &str {
        let draft = self.registry.draft();
        match field {
            DraftField::FirstName => &draft.first_name,
            DraftField::LastName => &draft.last_name,
            DraftField::Code => &draft.code,
        }
    }

    fn submit(&mut self) {
        match self.registry.register() {
            Ok(id) => {
                self.errors.clear();
                if let Some(attendee) = self.registry.attendees().iter().find(|a| a.id == id) {
                    self.flash = Some(format!(
                        "✓ Checked in {} at {}",
                        attendee.full_name(),
                        attendee.check_in_time.as_deref().unwrap_or("--:--")
                    ));
                }
                self.clamp_selection();
            }
            Err(errors) => {
                self.flash = None;
                self.errors = errors;
            }
        }
    }

    fn request_delete(&mut self) {
        self.confirm_delete = self.selected_id();
    }

    fn confirm(&mut self) {
        if let Some(id) = self.confirm_delete.take() {
            if self.registry.delete(id) {
                self.flash = Some("Attendee removed".to_string());
            }
            self.clamp_selection();
        }
    }

    /// Declining the confirmation is a no-op
    fn cancel(&mut self) {
        self.confirm_delete = None;
    }
}

// ============================================================================
// EVENT LOOP
// ============================================================================

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Ok(());
            }

            // The confirmation modal is blocking: it swallows every key
            if app.confirm_delete.is_some() {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm(),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel(),
                    _ => {}
                }
                continue;
            }

            match key.code {
                KeyCode::Esc => return Ok(()),
                KeyCode::Tab => app.focus = app.focus.next(),
                KeyCode::BackTab => app.focus = app.focus.previous(),
                KeyCode::Enter => {
                    // Enter submits from any form field, like the paper form
                    // the desk replaces
                    if app.focus.draft_field().is_some() {
                        app.submit();
                    }
                }
                KeyCode::Down => app.next(),
                KeyCode::Up => app.previous(),
                KeyCode::Delete => app.request_delete(),
                KeyCode::Backspace => app.backspace(),
                KeyCode::Char(c) => {
                    if app.focus == Focus::List {
                        match c {
                            'q' => return Ok(()),
                            'd' => app.request_delete(),
                            'j' => app.next(),
                            'k' => app.previous(),
                            _ => {}
                        }
                    } else {
                        app.input_char(c);
                    }
                }
                _ => {}
            }
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(38), // Registration form
            Constraint::Percentage(62), // Attendee list
        ])
        .split(chunks[1]);

    render_form(f, content_chunks[0], app);
    render_list(f, content_chunks[1], app);

    render_status_bar(f, chunks[2], app);

    if app.confirm_delete.is_some() {
        render_confirm_modal(f, app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.registry.stats();

    let spans = vec![
        Span::styled(
            " Event Check-in Desk ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Total: {}", stats.total),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("✔ Checked in: {}", stats.checked_in),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Pending: {}", stats.pending),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let draft = app.registry.draft();
    let code_len = draft.code.chars().count();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // First name
            Constraint::Length(3), // Last name
            Constraint::Length(3), // Code
            Constraint::Length(1), // Code length hint
            Constraint::Min(0),    // Flash / validation messages
        ])
        .split(area);

    render_input(
        f,
        chunks[0],
        "First name",
        &draft.first_name,
        app.focus == Focus::FirstName,
    );
    render_input(
        f,
        chunks[1],
        "Last name",
        &draft.last_name,
        app.focus == Focus::LastName,
    );
    render_input(
        f,
        chunks[2],
        &format!("Code ({} chars)", CODE_LEN),
        &draft.code,
        app.focus == Focus::Code,
    );

    // Live length hint while the code is being typed
    if code_len > 0 && code_len != CODE_LEN {
        let hint = Paragraph::new(Line::from(Span::styled(
            format!(
                "  code must be {} characters (currently {})",
                CODE_LEN, code_len
            ),
            Style::default().fg(Color::Red),
        )));
        f.render_widget(hint, chunks[3]);
    }

    render_messages(f, chunks[4], app);
}

fn render_input(f: &mut Frame, area: Rect, label: &str, value: &str, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };

    let text = if focused {
        format!("{}█", value)
    } else {
        value.to_string()
    };

    let input = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(format!(" {} ", label)),
    );

    f.render_widget(input, area);
}

fn render_messages(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();

    for error in &app.errors {
        lines.push(Line::from(Span::styled(
            format!("✗ {}", error),
            Style::default().fg(Color::Red),
        )));
    }

    if let Some(flash) = &app.flash {
        lines.push(Line::from(Span::styled(
            flash.clone(),
            Style::default().fg(Color::Green),
        )));
    }

    f.render_widget(Paragraph::new(lines), area);
}

fn render_list(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search box
            Constraint::Min(0),    // Attendee table
        ])
        .split(area);

    let term = app.registry.search_term();
    if term.is_empty() && app.focus != Focus::Search {
        let placeholder = Paragraph::new(Span::styled(
            "name or code...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Search "),
        );
        f.render_widget(placeholder, chunks[0]);
    } else {
        render_input(f, chunks[0], "Search", term, app.focus == Focus::Search);
    }

    let filtered = app.registry.filtered();

    if filtered.is_empty() {
        let message = if app.registry.attendees().is_empty() {
            "No attendees yet - fill in the form on the left to check someone in"
        } else {
            "No attendees match the search"
        };

        let empty = Paragraph::new(Span::styled(message, Style::default().fg(Color::DarkGray)))
            .block(Block::default().borders(Borders::ALL).title(" Attendees "));
        f.render_widget(empty, chunks[1]);
        return;
    }

    let header_cells = ["", "Name", "Code", "Checked in"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = filtered.iter().map(|attendee| {
        let badge = match attendee.check_in_time.as_deref() {
            Some(time) => format!("✔ {}", time),
            None => String::new(),
        };

        let cells = vec![
            Cell::from(attendee.initials()).style(Style::default().fg(Color::Cyan)),
            Cell::from(truncate(&attendee.full_name(), 28)),
            Cell::from(attendee.code.clone()),
            Cell::from(badge).style(Style::default().fg(Color::Green)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(30),
            Constraint::Length(11),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Attendees ({}) ", filtered.len())),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.registry.filtered().len();

    let mut spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    // Non-blocking persistence warning: the in-memory roster is still
    // correct, but it will not survive a restart until a save succeeds
    if let Some(err) = app.registry.last_store_error() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("⚠ not saved: {}", truncate(err, 40)),
            Style::default().fg(Color::Red),
        ));
    }

    spans.push(Span::raw(" | "));
    spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Field | "));
    spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Check in | "));
    spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Nav | "));
    spans.push(Span::styled("Del", Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(" Remove | "));
    spans.push(Span::styled("Esc", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_confirm_modal(f: &mut Frame, app: &App) {
    let Some(id) = app.confirm_delete else {
        return;
    };

    let name = app
        .registry
        .attendees()
        .iter()
        .find(|a| a.id == id)
        .map(|a| a.full_name())
        .unwrap_or_else(|| format!("attendee #{}", id));

    let area = centered_rect(50, 5, f.size());

    let lines = vec![
        Line::from(format!("Remove {} from the roster?", name)),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Green)),
            Span::raw(" remove  "),
            Span::styled("n", Style::default().fg(Color::Red)),
            Span::raw(" keep"),
        ]),
    ];

    let modal = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Confirm removal "),
    );

    f.render_widget(Clear, area);
    f.render_widget(modal, area);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
