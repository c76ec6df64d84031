use chrono::{DateTime, Datelike, Local, Utc};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, StatefulWidget, Table, TableState, Widget, Wrap},
};

use crate::app::{App, Notice, NoticeLevel};
use crate::compose::{Compose, ComposeField};
use crate::email::Email;
use crate::mailbox::Mailbox;
use crate::session::{AuthField, Session, View};

/// Warning indicator character for error notices
pub const WARNING_CHAR: char = '⚠';

/// Format a date for display in email lists
/// Shows time for current year, year for older emails
pub fn format_date(date: Option<&DateTime<Utc>>) -> String {
    let Some(date) = date else {
        return "-".to_string();
    };
    let local: DateTime<Local> = date.with_timezone(&Local);
    let now = Local::now();

    if local.year() == now.year() {
        // Current year: "Jan 15 10:30"
        local.format("%b %d %H:%M").to_string()
    } else {
        // Previous years: "Jan 15  2024"
        local.format("%b %d  %Y").to_string()
    }
}

/// Spinner frames for animated busy indicator
const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// UI state that supplements App state
#[derive(Debug, Default)]
pub struct UiState {
    /// Frame counter for spinner animation
    pub spinner_frame: usize,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the spinner animation frame
    pub fn tick_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
    }

    /// Get the current spinner character
    pub fn spinner_char(&self) -> char {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }
}

fn clear(area: Rect, buf: &mut Buffer) {
    for row in area.y..area.y + area.height {
        for col in area.x..area.x + area.width {
            buf[(col, row)].set_char(' ');
            buf[(col, row)].set_style(Style::default());
        }
    }
}

fn highlight() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

/// Widget for the busy/loading indicator in the top-right corner
pub struct BusyIndicatorWidget<'a> {
    message: &'a str,
    spinner: char,
}

impl<'a> BusyIndicatorWidget<'a> {
    pub fn new(message: &'a str, spinner: char) -> Self {
        Self { message, spinner }
    }
}

impl Widget for BusyIndicatorWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let display_msg = format!(" {} {} ", self.spinner, self.message);
        let width = (display_msg.chars().count() as u16).min(area.width);
        let x = area.x + area.width.saturating_sub(width);

        buf.set_line(
            x,
            area.y,
            &Line::from(Span::styled(
                display_msg,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            width,
        );
    }
}

/// Widget for the transient notice toast
pub struct NoticeWidget<'a> {
    notice: &'a Notice,
}

impl<'a> NoticeWidget<'a> {
    pub fn new(notice: &'a Notice) -> Self {
        Self { notice }
    }

    fn color(&self) -> Color {
        match self.notice.level {
            NoticeLevel::Info => Color::Green,
            NoticeLevel::Error => Color::Yellow,
        }
    }

    fn title_line(&self) -> String {
        match self.notice.level {
            NoticeLevel::Info => self.notice.title.clone(),
            NoticeLevel::Error => format!("{} {}", WARNING_CHAR, self.notice.title),
        }
    }
}

impl Widget for NoticeWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = self.title_line();
        let longest = title
            .chars()
            .count()
            .max(self.notice.description.chars().count()) as u16;
        let box_width = (longest + 4).max(24).min(area.width.saturating_sub(2));
        let box_height = if self.notice.description.is_empty() { 3 } else { 4 };

        // Bottom-right corner, above the help bar
        let x = area.x + area.width.saturating_sub(box_width + 1);
        let y = area.y + area.height.saturating_sub(box_height + 1);
        let toast_area = Rect::new(x, y, box_width, box_height.min(area.height));

        clear(toast_area, buf);

        let color = self.color();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));
        let inner = block.inner(toast_area);
        block.render(toast_area, buf);

        buf.set_line(
            inner.x + 1,
            inner.y,
            &Line::from(Span::styled(
                title,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            inner.width.saturating_sub(1),
        );
        if inner.height > 1 {
            buf.set_line(
                inner.x + 1,
                inner.y + 1,
                &Line::from(Span::raw(self.notice.description.as_str())),
                inner.width.saturating_sub(1),
            );
        }
    }
}

/// Widget for the register/login form
pub struct AuthFormWidget<'a> {
    session: &'a Session,
}

impl<'a> AuthFormWidget<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    fn field_line(&self, field: AuthField, label: &str, value: String) -> Line<'static> {
        let focused = self.session.focus == field;
        let cursor = if focused { "_" } else { "" };
        let style = if focused { highlight() } else { Style::default() };
        Line::from(vec![
            Span::styled(format!("{:<10}", label), style),
            Span::raw(format!("{}{}", value, cursor)),
        ])
    }
}

impl Widget for AuthFormWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        clear(area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" mailterm: {} ", self.session.mode.label()));
        let inner = block.inner(area);
        block.render(area, buf);

        let masked = "*".repeat(self.session.password.chars().count());
        let lines = vec![
            self.field_line(AuthField::Username, "Username", self.session.username.clone()),
            Line::default(),
            self.field_line(AuthField::Password, "Password", masked),
            Line::default(),
            Line::from(Span::styled(
                format!(
                    "Enter: {} | Ctrl+T: switch to {}",
                    self.session.mode.label(),
                    self.session.mode.toggled().label()
                ),
                Style::default().fg(Color::DarkGray),
            )),
        ];

        for (i, line) in lines.iter().enumerate() {
            if i >= inner.height as usize {
                break;
            }
            buf.set_line(inner.x + 1, inner.y + i as u16, line, inner.width.saturating_sub(1));
        }
    }
}

/// Widget for the mailbox sidebar
pub struct MailboxListWidget {
    selected: Mailbox,
}

impl MailboxListWidget {
    pub fn new(selected: Mailbox) -> Self {
        Self { selected }
    }
}

impl Widget for MailboxListWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title(" Mailboxes ");
        let inner = block.inner(area);
        block.render(area, buf);

        for (i, mailbox) in Mailbox::ALL.iter().enumerate() {
            if i >= inner.height as usize {
                break;
            }
            let is_selected = *mailbox == self.selected;
            let style = if is_selected { highlight() } else { Style::default() };
            let marker = if is_selected { ">" } else { " " };
            let line = format!("{} {} {}", marker, i + 1, mailbox.label());
            buf.set_line(
                inner.x,
                inner.y + i as u16,
                &Line::from(Span::styled(line, style)),
                inner.width,
            );
        }
    }
}

/// Widget for rendering the message list of the active mailbox
pub struct EmailListWidget<'a> {
    app: &'a App,
}

impl<'a> EmailListWidget<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

impl StatefulWidget for EmailListWidget<'_> {
    type State = TableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let mailbox = self.app.mailbox.selected_mailbox();
        let emails = self.app.mailbox.emails();
        let title = match self.app.session.identity() {
            Some(identity) => format!(
                " {} ({}) - {} ",
                mailbox.label(),
                emails.len(),
                identity.email
            ),
            None => format!(" {} ", mailbox.label()),
        };

        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        if emails.is_empty() {
            let msg = if self.app.mailbox.is_loading() {
                "Loading..."
            } else {
                "No messages"
            };
            let x = inner.x + (inner.width.saturating_sub(msg.len() as u16)) / 2;
            let y = inner.y + inner.height / 2;
            buf.set_line(
                x,
                y,
                &Line::from(Span::styled(msg, Style::default().fg(Color::DarkGray))),
                inner.width,
            );
            return;
        }

        let rows: Vec<Row> = emails
            .iter()
            .map(|email| {
                let unread = if email.is_unread_incoming() { "●" } else { " " };
                let style = if email.is_unread_incoming() {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    unread.to_string(),
                    format_date(email.sent_at.as_ref()),
                    format!(
                        "{} {}",
                        email.correspondent.label(),
                        email.correspondent_email()
                    ),
                    email.subject.clone(),
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(1),  // Unread marker
                Constraint::Length(12), // Date column
                Constraint::Length(32), // Correspondent
                Constraint::Min(20),    // Subject
            ],
        )
        .row_highlight_style(highlight());

        StatefulWidget::render(table, inner, buf, state);
    }
}

/// Widget for a single opened message
pub struct EmailDetailWidget<'a> {
    email: &'a Email,
}

impl<'a> EmailDetailWidget<'a> {
    pub fn new(email: &'a Email) -> Self {
        Self { email }
    }
}

impl Widget for EmailDetailWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        clear(area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", self.email.subject));

        let dim = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(vec![
                Span::styled(format!("{:<9}", self.email.correspondent.label()), dim),
                Span::raw(self.email.correspondent.address().to_string()),
            ]),
            Line::from(vec![
                Span::styled(format!("{:<9}", "Date"), dim),
                Span::raw(format_date(self.email.sent_at.as_ref())),
            ]),
            Line::default(),
        ];
        lines.extend(
            self.email
                .body
                .lines()
                .map(|line| Line::from(line.to_string())),
        );

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

/// Widget for the compose dialog
pub struct ComposeDialogWidget<'a> {
    compose: &'a Compose,
}

impl<'a> ComposeDialogWidget<'a> {
    pub fn new(compose: &'a Compose) -> Self {
        Self { compose }
    }

    fn label_style(&self, field: ComposeField) -> Style {
        if self.compose.focus == field {
            highlight()
        } else {
            Style::default().fg(Color::DarkGray)
        }
    }

    fn value(&self, field: ComposeField) -> String {
        let cursor = if self.compose.focus == field { "_" } else { "" };
        format!("{}{}", self.compose.draft().field(field), cursor)
    }
}

impl Widget for ComposeDialogWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        clear(area, buf);

        let title = match self.compose.in_flight() {
            Some(kind) => format!(" New message ({}) ", kind.progress_label()),
            None => " New message ".to_string(),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title);

        let mut lines = vec![
            Line::from(vec![
                Span::styled("To:      ", self.label_style(ComposeField::Recipient)),
                Span::raw(self.value(ComposeField::Recipient)),
            ]),
            Line::from(vec![
                Span::styled("Subject: ", self.label_style(ComposeField::Subject)),
                Span::raw(self.value(ComposeField::Subject)),
            ]),
            Line::from(Span::styled("Body:", self.label_style(ComposeField::Body))),
        ];
        lines.extend(
            self.value(ComposeField::Body)
                .split('\n')
                .map(|line| Line::from(line.to_string())),
        );

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

/// Returns the key hints for the current screen
pub fn help_text(app: &App) -> &'static str {
    if app.compose.is_open() {
        return "Tab: next field | Ctrl+S: send | Ctrl+D: save draft | Esc: cancel";
    }
    match app.view() {
        View::Unauthenticated => "Tab: switch field | Enter: submit | Ctrl+T: toggle mode | Esc: quit",
        View::Dashboard if app.mailbox.is_detail_open() => "q/Esc: back | c: compose | L: sign out",
        View::Dashboard => {
            "1-3/Tab: mailbox | j/↓: next | k/↑: prev | Enter: open | c: compose | r: refresh | n: check | L: sign out | q: quit"
        }
    }
}

/// Widget for the help bar at the bottom
pub struct HelpBarWidget<'a> {
    app: &'a App,
}

impl<'a> HelpBarWidget<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

impl Widget for HelpBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let paragraph =
            Paragraph::new(help_text(self.app)).style(Style::default().fg(Color::DarkGray));

        paragraph.render(area, buf);
    }
}
