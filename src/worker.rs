use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::api::MailApi;
use crate::compose::SubmitRequest;
use crate::email::Email;
use crate::error::ApiError;
use crate::mailbox::FetchTicket;
use crate::session::{AuthRequest, Identity};

/// Network effects requested by the controllers
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Authenticate(AuthRequest),
    FetchEmails(FetchTicket),
    Submit { user_id: i64, request: SubmitRequest },
    MarkRead { user_id: i64, email_id: i64 },
    CheckInbox { user_id: i64 },
}

/// Results of commands, fed back into the controllers
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Authenticated(Result<Identity, ApiError>),
    Emails {
        ticket: FetchTicket,
        result: Result<Vec<Email>, ApiError>,
    },
    Submitted(Result<String, ApiError>),
    MarkedRead {
        user_id: i64,
        result: Result<(), ApiError>,
    },
    InboxChecked {
        user_id: i64,
        result: Result<usize, ApiError>,
    },
}

/// Runs a single command against the API
pub async fn execute<A: MailApi>(api: &A, command: Command) -> Response {
    match command {
        Command::Authenticate(request) => Response::Authenticated(api.authenticate(request).await),
        Command::FetchEmails(ticket) => Response::Emails {
            ticket,
            result: api.fetch_emails(ticket.user_id, ticket.mailbox).await,
        },
        Command::Submit { user_id, request } => {
            Response::Submitted(api.submit(user_id, request).await)
        }
        Command::MarkRead { user_id, email_id } => Response::MarkedRead {
            user_id,
            result: api.mark_read(user_id, email_id).await,
        },
        Command::CheckInbox { user_id } => Response::InboxChecked {
            user_id,
            result: api.check_inbox(user_id).await,
        },
    }
}

/// Spawns one task per command; results arrive on the response channel
pub struct Dispatcher<A> {
    api: Arc<A>,
    responses: mpsc::UnboundedSender<Response>,
}

impl<A: MailApi + 'static> Dispatcher<A> {
    pub fn new(api: A) -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                api: Arc::new(api),
                responses: tx,
            },
            rx,
        )
    }

    pub fn dispatch(&self, command: Command) {
        let api = Arc::clone(&self.api);
        let responses = self.responses.clone();
        tokio::spawn(async move {
            let response = execute(api.as_ref(), command).await;
            if responses.send(response).is_err() {
                debug!("response channel closed; dropping response");
            }
        });
    }

    pub fn dispatch_all(&self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }
}
