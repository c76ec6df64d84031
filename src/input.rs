use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{Action, App};
use crate::compose::{ComposeField, SubmitKind};
use crate::mailbox::Mailbox;
use crate::session::View;

/// Maps a key press to an action for the current screen
pub fn action_for(app: &App, key: KeyEvent) -> Option<Action> {
    if app.compose.is_open() {
        compose_action(app, key)
    } else {
        match app.view() {
            View::Unauthenticated => auth_action(key),
            View::Dashboard => dashboard_action(app, key),
        }
    }
}

fn is_ctrl(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
}

fn auth_action(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('c') if is_ctrl(&key) => Some(Action::Quit),
        KeyCode::Char('t') if is_ctrl(&key) => Some(Action::ToggleAuthMode),
        KeyCode::F(2) => Some(Action::ToggleAuthMode),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            Some(Action::AuthNextField)
        }
        KeyCode::Enter => Some(Action::SubmitAuth),
        KeyCode::Backspace => Some(Action::AuthBackspace),
        KeyCode::Char(c) if !is_ctrl(&key) => Some(Action::AuthInput(c)),
        _ => None,
    }
}

fn compose_action(app: &App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CloseCompose),
        KeyCode::Char('s') if is_ctrl(&key) => Some(Action::SubmitCompose(SubmitKind::Send)),
        KeyCode::Char('d') if is_ctrl(&key) => {
            Some(Action::SubmitCompose(SubmitKind::SaveDraft))
        }
        KeyCode::Tab => Some(Action::ComposeNextField),
        KeyCode::BackTab => Some(Action::ComposePreviousField),
        KeyCode::Enter if app.compose.focus == ComposeField::Body => {
            Some(Action::ComposeInput('\n'))
        }
        KeyCode::Enter => Some(Action::ComposeNextField),
        KeyCode::Backspace => Some(Action::ComposeBackspace),
        KeyCode::Char(c) if !is_ctrl(&key) => Some(Action::ComposeInput(c)),
        _ => None,
    }
}

fn dashboard_action(app: &App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') if app.mailbox.is_detail_open() => Some(Action::CloseEmail),
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('c') if is_ctrl(&key) => Some(Action::Quit),
        KeyCode::Esc => Some(Action::CloseEmail),
        KeyCode::Char('1') => Some(Action::SelectMailbox(Mailbox::Inbox)),
        KeyCode::Char('2') => Some(Action::SelectMailbox(Mailbox::Sent)),
        KeyCode::Char('3') => Some(Action::SelectMailbox(Mailbox::Drafts)),
        KeyCode::Tab => Some(Action::NextMailbox),
        KeyCode::BackTab => Some(Action::PreviousMailbox),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::NextEmail),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::PreviousEmail),
        KeyCode::Enter => Some(Action::OpenEmail),
        KeyCode::Char('c') => Some(Action::OpenCompose),
        KeyCode::Char('r') => Some(Action::Refresh),
        KeyCode::Char('n') => Some(Action::CheckInbox),
        KeyCode::Char('L') => Some(Action::SignOut),
        _ => None,
    }
}
