use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::compose::{Compose, SubmitKind};
use crate::error::MailError;
use crate::mailbox::{FetchOutcome, Mailbox, MailboxState};
use crate::session::{AuthMode, Session, View};
use crate::worker::{Command, Response};

/// How long a notice stays on screen
pub const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient notification shown to the user
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
    raised_at: Instant,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
            raised_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.raised_at) >= NOTICE_TTL
    }
}

/// Everything the user can ask for, independent of key bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AuthInput(char),
    AuthBackspace,
    AuthNextField,
    ToggleAuthMode,
    SubmitAuth,
    SelectMailbox(Mailbox),
    NextMailbox,
    PreviousMailbox,
    NextEmail,
    PreviousEmail,
    OpenEmail,
    CloseEmail,
    Refresh,
    CheckInbox,
    OpenCompose,
    ComposeInput(char),
    ComposeBackspace,
    ComposeNextField,
    ComposePreviousField,
    SubmitCompose(SubmitKind),
    CloseCompose,
    SignOut,
    Quit,
}

/// The main application state
#[derive(Debug, Default)]
pub struct App {
    pub session: Session,
    pub mailbox: MailboxState,
    pub compose: Compose,
    notice: Option<Notice>,
    should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> View {
        self.session.view()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Drops the notice once it has been visible long enough
    pub fn expire_notice(&mut self, now: Instant) {
        if self.notice.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notice = None;
        }
    }

    /// Label for an outstanding request, if any
    pub fn busy_status(&self) -> Option<&'static str> {
        if let Some(mode) = self.session.pending_mode() {
            Some(match mode {
                AuthMode::Register => "Creating account...",
                AuthMode::Login => "Signing in...",
            })
        } else if let Some(kind) = self.compose.in_flight() {
            Some(kind.progress_label())
        } else if self.mailbox.is_loading() {
            Some("Loading messages...")
        } else {
            None
        }
    }

    fn info(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.notice = Some(Notice::new(NoticeLevel::Info, title, description));
    }

    fn report(&mut self, title: &str, error: &MailError) {
        self.notice = Some(Notice::new(NoticeLevel::Error, title, error.user_message()));
    }

    fn user_id(&self) -> Option<i64> {
        self.session.identity().map(|identity| identity.id)
    }

    /// Issues a fetch if the (identity, mailbox) pair changed
    fn sync_mailbox(&mut self) -> Vec<Command> {
        self.mailbox
            .sync(self.session.identity())
            .map(Command::FetchEmails)
            .into_iter()
            .collect()
    }

    /// Refetches the active mailbox for the signed-in user
    fn refresh_mailbox(&mut self) -> Vec<Command> {
        match self.session.identity() {
            Some(identity) => vec![Command::FetchEmails(self.mailbox.refresh(identity))],
            None => Vec::new(),
        }
    }

    /// Applies a user action and returns the network effects it requires
    pub fn handle(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Action::AuthInput(c) => {
                self.session.push_char(c);
                Vec::new()
            }
            Action::AuthBackspace => {
                self.session.pop_char();
                Vec::new()
            }
            Action::AuthNextField => {
                self.session.focus_next();
                Vec::new()
            }
            Action::ToggleAuthMode => {
                self.session.toggle_mode();
                Vec::new()
            }
            Action::SubmitAuth => match self.session.submit_auth() {
                Ok(request) => vec![Command::Authenticate(request)],
                Err(e) => {
                    self.report(self.session.mode.label(), &e);
                    Vec::new()
                }
            },
            Action::SignOut => self.sign_out(),
            _ if self.view() != View::Dashboard => Vec::new(),
            Action::SelectMailbox(mailbox) => {
                self.mailbox.select_mailbox(mailbox);
                self.sync_mailbox()
            }
            Action::NextMailbox => {
                self.mailbox.select_mailbox(self.mailbox.selected_mailbox().next());
                self.sync_mailbox()
            }
            Action::PreviousMailbox => {
                self.mailbox
                    .select_mailbox(self.mailbox.selected_mailbox().previous());
                self.sync_mailbox()
            }
            Action::NextEmail => {
                self.mailbox.select_next();
                Vec::new()
            }
            Action::PreviousEmail => {
                self.mailbox.select_previous();
                Vec::new()
            }
            Action::OpenEmail => self.open_email(),
            Action::CloseEmail => {
                self.mailbox.close_detail();
                Vec::new()
            }
            Action::Refresh => self.refresh_mailbox(),
            Action::CheckInbox => match self.user_id() {
                Some(user_id) => vec![Command::CheckInbox { user_id }],
                None => Vec::new(),
            },
            Action::OpenCompose => {
                self.compose.open();
                Vec::new()
            }
            Action::ComposeInput(c) => {
                self.compose.push_char(c);
                Vec::new()
            }
            Action::ComposeBackspace => {
                self.compose.pop_char();
                Vec::new()
            }
            Action::ComposeNextField => {
                self.compose.focus_next();
                Vec::new()
            }
            Action::ComposePreviousField => {
                self.compose.focus_previous();
                Vec::new()
            }
            Action::SubmitCompose(kind) => self.submit_compose(kind),
            Action::CloseCompose => {
                self.compose.close();
                Vec::new()
            }
        }
    }

    fn open_email(&mut self) -> Vec<Command> {
        let Some(user_id) = self.user_id() else {
            return Vec::new();
        };
        match self.mailbox.open_detail() {
            Some(email) if email.is_unread_incoming() => vec![Command::MarkRead {
                user_id,
                email_id: email.id,
            }],
            _ => Vec::new(),
        }
    }

    fn submit_compose(&mut self, kind: SubmitKind) -> Vec<Command> {
        let Some(user_id) = self.user_id() else {
            return Vec::new();
        };
        match self.compose.submit(kind) {
            Ok(request) => vec![Command::Submit { user_id, request }],
            Err(e) => {
                self.report("Cannot send", &e);
                Vec::new()
            }
        }
    }

    fn sign_out(&mut self) -> Vec<Command> {
        if let Some(identity) = self.session.identity() {
            info!(user = %identity.email, "signing out");
        }
        self.session.sign_out();
        self.mailbox.reset();
        self.compose.reset();
        self.info("Signed out", "See you soon");
        Vec::new()
    }

    /// Applies a command result and returns any follow-up effects
    pub fn apply(&mut self, response: Response) -> Vec<Command> {
        match response {
            Response::Authenticated(result) => {
                let Some((mode, outcome)) = self.session.apply_auth(result) else {
                    debug!("ignoring auth response with no request outstanding");
                    return Vec::new();
                };
                match outcome {
                    Ok(identity) => {
                        info!(user = %identity.email, action = mode.action(), "authenticated");
                        match mode {
                            AuthMode::Register => self.info(
                                "Account created successfully",
                                format!("Your email {} is ready to use", identity.email),
                            ),
                            AuthMode::Login => {
                                self.info("Signed in", format!("Welcome back, {}", identity.username))
                            }
                        }
                        self.sync_mailbox()
                    }
                    Err(e) => {
                        warn!(error = %e, action = mode.action(), "authentication failed");
                        self.report(mode.label(), &e);
                        Vec::new()
                    }
                }
            }
            Response::Emails { ticket, result } => {
                match self.mailbox.apply_fetch(ticket, result) {
                    Ok(FetchOutcome::Applied(count)) => {
                        debug!(count, mailbox = ticket.mailbox.as_str(), "mailbox loaded");
                    }
                    Ok(FetchOutcome::Stale) => {}
                    Err(e) => {
                        warn!(error = %e, mailbox = ticket.mailbox.as_str(), "mailbox fetch failed");
                        self.report("Could not load messages", &e);
                    }
                }
                Vec::new()
            }
            Response::Submitted(result) => {
                let Some(outcome) = self.compose.apply_submit(result) else {
                    debug!("ignoring submit response with no submission outstanding");
                    return Vec::new();
                };
                match outcome {
                    Ok(ack) => {
                        info!(action = ack.kind.action(), "message submitted");
                        self.info(ack.kind.success_title(), ack.message);
                        self.refresh_mailbox()
                    }
                    Err(e) => {
                        warn!(error = %e, "submit failed");
                        self.report("Could not send", &e);
                        Vec::new()
                    }
                }
            }
            Response::MarkedRead { user_id, result } => {
                if self.user_id() != Some(user_id) {
                    return Vec::new();
                }
                match result {
                    Ok(()) => self.refresh_mailbox(),
                    Err(e) => {
                        let e = MailError::Update(e);
                        warn!(error = %e, "mark read failed");
                        self.report("Could not update message", &e);
                        Vec::new()
                    }
                }
            }
            Response::InboxChecked { user_id, result } => {
                if self.user_id() != Some(user_id) {
                    return Vec::new();
                }
                match result {
                    Ok(count) => {
                        self.info("Mail checked", format!("{count} new message(s)"));
                        self.refresh_mailbox()
                    }
                    Err(e) => {
                        let e = MailError::Fetch(e);
                        warn!(error = %e, "inbox check failed");
                        self.report("Could not check mail", &e);
                        Vec::new()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{ComposeField, Draft, SubmitRequest};
    use crate::email::{Email, EmailBuilder};
    use crate::error::{ApiError, CONNECTIVITY_MESSAGE};
    use crate::mailbox::FetchTicket;
    use crate::session::Identity;

    fn alice() -> Identity {
        Identity {
            id: 1,
            username: "alice".to_string(),
            email: "alice@skzry.ru".to_string(),
        }
    }

    fn inbox_email(id: i64, read: bool) -> Email {
        EmailBuilder::new()
            .id(id)
            .from("team@skzry.ru")
            .subject(format!("Message {id}"))
            .body("Hello")
            .read(read)
            .build()
    }

    fn fetch_ticket(commands: &[Command]) -> FetchTicket {
        match commands {
            [Command::FetchEmails(ticket)] => *ticket,
            other => panic!("expected a single fetch, got {other:?}"),
        }
    }

    /// Registers alice and returns the app with its first inbox fetch outstanding
    fn signed_in() -> (App, FetchTicket) {
        let mut app = App::new();
        for c in "alice".chars() {
            app.handle(Action::AuthInput(c));
        }
        app.handle(Action::AuthNextField);
        app.handle(Action::AuthInput('x'));

        let commands = app.handle(Action::SubmitAuth);
        assert!(matches!(commands.as_slice(), [Command::Authenticate(_)]));

        let commands = app.apply(Response::Authenticated(Ok(alice())));
        let ticket = fetch_ticket(&commands);
        (app, ticket)
    }

    fn with_inbox(emails: Vec<Email>) -> App {
        let (mut app, ticket) = signed_in();
        app.apply(Response::Emails {
            ticket,
            result: Ok(emails),
        });
        app
    }

    fn fill_compose(app: &mut App) {
        app.handle(Action::OpenCompose);
        app.compose
            .update_draft_field(ComposeField::Recipient, "bob@domain");
        app.compose.update_draft_field(ComposeField::Subject, "Hi");
        app.compose.update_draft_field(ComposeField::Body, "Hello");
    }

    #[test]
    fn test_app_default_state() {
        let app = App::new();
        assert_eq!(app.view(), View::Unauthenticated);
        assert!(app.notice().is_none());
        assert!(app.busy_status().is_none());
        assert!(!app.should_quit());
    }

    #[test]
    fn test_register_scenario() {
        let (app, ticket) = signed_in();

        assert_eq!(app.view(), View::Dashboard);
        let identity = app.session.identity().unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.email, "alice@skzry.ru");
        assert_eq!(ticket.user_id, 1);
        assert_eq!(ticket.mailbox, Mailbox::Inbox);

        let notice = app.notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(notice.description.contains("alice@skzry.ru"));
    }

    #[test]
    fn test_auth_failure_surfaces_server_message() {
        let mut app = App::new();
        app.session.username = "alice".to_string();
        app.session.password = "x".to_string();
        app.handle(Action::SubmitAuth);

        let commands = app.apply(Response::Authenticated(Err(ApiError::Rejected {
            status: 409,
            message: Some("User already exists".to_string()),
        })));

        assert!(commands.is_empty());
        assert_eq!(app.view(), View::Unauthenticated);
        let notice = app.notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.description, "User already exists");
    }

    #[test]
    fn test_auth_unreachable_reports_connectivity() {
        let mut app = App::new();
        app.session.username = "alice".to_string();
        app.session.password = "x".to_string();
        app.handle(Action::SubmitAuth);

        app.apply(Response::Authenticated(Err(ApiError::Unreachable(
            "dns error".to_string(),
        ))));
        assert_eq!(app.notice().unwrap().description, CONNECTIVITY_MESSAGE);
        assert_eq!(app.view(), View::Unauthenticated);
    }

    #[test]
    fn test_empty_auth_form_sends_nothing() {
        let mut app = App::new();
        let commands = app.handle(Action::SubmitAuth);
        assert!(commands.is_empty());
        assert_eq!(app.notice().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn test_dashboard_actions_ignored_before_sign_in() {
        let mut app = App::new();
        assert!(app.handle(Action::Refresh).is_empty());
        assert!(app.handle(Action::SelectMailbox(Mailbox::Sent)).is_empty());
        app.handle(Action::OpenCompose);
        assert!(!app.compose.is_open());
    }

    #[test]
    fn test_rapid_mailbox_switch_shows_latest_selection() {
        let (mut app, inbox_ticket) = signed_in();

        let drafts_ticket = fetch_ticket(&app.handle(Action::SelectMailbox(Mailbox::Drafts)));

        app.apply(Response::Emails {
            ticket: drafts_ticket,
            result: Ok(vec![EmailBuilder::new().id(9).to("bob@domain").subject("draft").build()]),
        });
        app.apply(Response::Emails {
            ticket: inbox_ticket,
            result: Ok(vec![inbox_email(1, false)]),
        });

        assert_eq!(app.mailbox.selected_mailbox(), Mailbox::Drafts);
        assert_eq!(app.mailbox.emails().len(), 1);
        assert_eq!(app.mailbox.emails()[0].subject, "draft");
        assert!(app.busy_status().is_none());
    }

    #[test]
    fn test_selecting_active_mailbox_does_not_refetch() {
        let (mut app, _) = signed_in();
        assert!(app.handle(Action::SelectMailbox(Mailbox::Inbox)).is_empty());
    }

    #[test]
    fn test_mailbox_cycling_fetches() {
        let (mut app, _) = signed_in();
        let ticket = fetch_ticket(&app.handle(Action::NextMailbox));
        assert_eq!(ticket.mailbox, Mailbox::Sent);
        let ticket = fetch_ticket(&app.handle(Action::PreviousMailbox));
        assert_eq!(ticket.mailbox, Mailbox::Inbox);
    }

    #[test]
    fn test_failed_fetch_keeps_list_and_notifies() {
        let mut app = with_inbox(vec![inbox_email(1, true), inbox_email(2, true)]);

        let ticket = fetch_ticket(&app.handle(Action::Refresh));
        app.apply(Response::Emails {
            ticket,
            result: Err(ApiError::Unreachable("reset".to_string())),
        });

        assert_eq!(app.mailbox.emails().len(), 2);
        assert_eq!(app.notice().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn test_empty_compose_field_sends_nothing() {
        let mut app = with_inbox(Vec::new());
        fill_compose(&mut app);
        app.compose.update_draft_field(ComposeField::Body, "");

        let commands = app.handle(Action::SubmitCompose(SubmitKind::Send));
        assert!(commands.is_empty());
        assert!(app.compose.is_open());
        assert_eq!(app.notice().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn test_send_scenario_refetches_and_clears() {
        let mut app = with_inbox(vec![inbox_email(1, true)]);
        fill_compose(&mut app);

        let commands = app.handle(Action::SubmitCompose(SubmitKind::Send));
        assert_eq!(
            commands,
            vec![Command::Submit {
                user_id: 1,
                request: SubmitRequest {
                    kind: SubmitKind::Send,
                    recipient_email: "bob@domain".to_string(),
                    subject: "Hi".to_string(),
                    body: "Hello".to_string(),
                },
            }]
        );
        assert_eq!(app.busy_status(), Some("Sending..."));

        // A second click while in flight sends nothing
        assert!(app.handle(Action::SubmitCompose(SubmitKind::Send)).is_empty());

        let commands = app.apply(Response::Submitted(Ok("Email sent via SMTP".to_string())));
        let ticket = fetch_ticket(&commands);
        assert_eq!(ticket.mailbox, Mailbox::Inbox);
        assert!(!app.compose.is_open());
        assert_eq!(app.compose.draft(), &Draft::default());
        assert_eq!(app.notice().unwrap().title, "Message sent");
    }

    #[test]
    fn test_failed_send_keeps_draft() {
        let mut app = with_inbox(Vec::new());
        fill_compose(&mut app);
        app.handle(Action::SubmitCompose(SubmitKind::SaveDraft));

        let commands = app.apply(Response::Submitted(Err(ApiError::Rejected {
            status: 400,
            message: Some("recipient_email, subject, and body are required".to_string()),
        })));

        assert!(commands.is_empty());
        assert!(app.compose.is_open());
        assert_eq!(app.compose.draft().recipient_email, "bob@domain");
        assert_eq!(
            app.notice().unwrap().description,
            "recipient_email, subject, and body are required"
        );
    }

    #[test]
    fn test_late_send_ack_keeps_new_draft() {
        let mut app = with_inbox(Vec::new());
        fill_compose(&mut app);
        app.handle(Action::SubmitCompose(SubmitKind::Send));
        app.handle(Action::CloseCompose);

        app.handle(Action::OpenCompose);
        app.compose
            .update_draft_field(ComposeField::Subject, "Second message in progress");

        let commands = app.apply(Response::Submitted(Ok("Email sent".to_string())));
        assert_eq!(fetch_ticket(&commands).mailbox, Mailbox::Inbox);
        assert_eq!(app.notice().unwrap().title, "Message sent");
        assert!(app.compose.is_open());
        assert_eq!(app.compose.draft().subject, "Second message in progress");
    }

    #[test]
    fn test_auth_notice_follows_submitted_mode() {
        let mut app = App::new();
        app.session.username = "alice".to_string();
        app.session.password = "x".to_string();
        app.handle(Action::SubmitAuth);
        app.handle(Action::ToggleAuthMode);
        assert_eq!(app.busy_status(), Some("Creating account..."));

        app.apply(Response::Authenticated(Ok(alice())));
        assert_eq!(app.notice().unwrap().title, "Account created successfully");
    }

    #[test]
    fn test_mark_read_failure_uses_update_text() {
        let mut app = with_inbox(vec![inbox_email(5, false)]);
        app.handle(Action::OpenEmail);

        let commands = app.apply(Response::MarkedRead {
            user_id: 1,
            result: Err(ApiError::Rejected {
                status: 500,
                message: None,
            }),
        });
        assert!(commands.is_empty());
        let notice = app.notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.title, "Could not update message");
        assert_eq!(notice.description, "Could not update message");
    }

    #[test]
    fn test_opening_unread_message_marks_read() {
        let mut app = with_inbox(vec![inbox_email(5, false), inbox_email(6, true)]);

        let commands = app.handle(Action::OpenEmail);
        assert_eq!(
            commands,
            vec![Command::MarkRead {
                user_id: 1,
                email_id: 5
            }]
        );
        assert!(app.mailbox.is_detail_open());

        let commands = app.apply(Response::MarkedRead {
            user_id: 1,
            result: Ok(()),
        });
        assert_eq!(fetch_ticket(&commands).mailbox, Mailbox::Inbox);

        // Already read: no request
        app.handle(Action::CloseEmail);
        app.handle(Action::NextEmail);
        assert!(app.handle(Action::OpenEmail).is_empty());
    }

    #[test]
    fn test_check_inbox_refetches() {
        let mut app = with_inbox(Vec::new());
        let commands = app.handle(Action::CheckInbox);
        assert_eq!(commands, vec![Command::CheckInbox { user_id: 1 }]);

        let commands = app.apply(Response::InboxChecked {
            user_id: 1,
            result: Ok(3),
        });
        fetch_ticket(&commands);
        assert_eq!(app.notice().unwrap().description, "3 new message(s)");
    }

    #[test]
    fn test_sign_out_resets_everything() {
        let (mut app, ticket) = signed_in();
        fill_compose(&mut app);
        app.handle(Action::SubmitCompose(SubmitKind::Send));

        app.handle(Action::SignOut);
        assert_eq!(app.view(), View::Unauthenticated);
        assert!(app.session.identity().is_none());
        assert!(!app.compose.is_open());

        // Late responses from the old session change nothing
        app.apply(Response::Emails {
            ticket,
            result: Ok(vec![inbox_email(1, false)]),
        });
        assert!(app.mailbox.emails().is_empty());
        assert!(app.apply(Response::Submitted(Ok("sent".to_string()))).is_empty());
        assert!(app
            .apply(Response::InboxChecked {
                user_id: 1,
                result: Ok(1)
            })
            .is_empty());
    }

    #[test]
    fn test_notice_expires() {
        let mut app = App::new();
        app.handle(Action::SubmitAuth);
        assert!(app.notice().is_some());

        app.expire_notice(Instant::now());
        assert!(app.notice().is_some());

        app.expire_notice(Instant::now() + NOTICE_TTL);
        assert!(app.notice().is_none());
    }

    #[test]
    fn test_quit() {
        let mut app = App::new();
        app.handle(Action::Quit);
        assert!(app.should_quit());
    }
}
