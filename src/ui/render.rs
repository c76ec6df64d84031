use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::TableState,
};

use crate::app::App;
use crate::session::View;
use crate::ui::widgets::{
    AuthFormWidget, BusyIndicatorWidget, ComposeDialogWidget, EmailDetailWidget, EmailListWidget,
    HelpBarWidget, MailboxListWidget, NoticeWidget, UiState,
};

/// Width of the mailbox sidebar
const SIDEBAR_WIDTH: u16 = 16;

/// Renders the entire application UI
pub fn render(frame: &mut Frame, app: &App, ui_state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Main content
            Constraint::Length(1), // Help bar
        ])
        .split(frame.area());

    match app.view() {
        View::Unauthenticated => {
            let form_area = centered_rect(50, 40, chunks[0]);
            frame.render_widget(AuthFormWidget::new(&app.session), form_area);
        }
        View::Dashboard => render_dashboard(frame, app, chunks[0]),
    }

    // Render help bar
    let help = HelpBarWidget::new(app);
    frame.render_widget(help, chunks[1]);

    if app.compose.is_open() {
        let dialog_area = centered_rect(70, 60, chunks[0]);
        frame.render_widget(ComposeDialogWidget::new(&app.compose), dialog_area);
    }

    if let Some(notice) = app.notice() {
        frame.render_widget(NoticeWidget::new(notice), chunks[0]);
    }

    if let Some(msg) = app.busy_status() {
        let indicator = BusyIndicatorWidget::new(msg, ui_state.spinner_char());
        frame.render_widget(indicator, chunks[1]);
    }
}

fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)])
        .split(area);

    frame.render_widget(
        MailboxListWidget::new(app.mailbox.selected_mailbox()),
        columns[0],
    );

    let widget = EmailListWidget::new(app);
    let mut table_state = TableState::default().with_selected(app.mailbox.selected_email);
    frame.render_stateful_widget(widget, columns[1], &mut table_state);

    if app.mailbox.is_detail_open()
        && let Some(email) = app.mailbox.current_email()
    {
        let detail_area = centered_rect(80, 80, columns[1]);
        frame.render_widget(EmailDetailWidget::new(email), detail_area);
    }
}

/// Creates a centered rectangle for dialogs
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
