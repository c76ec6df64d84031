use tracing::debug;

use crate::email::Email;
use crate::error::{ApiError, MailError};
use crate::session::Identity;

/// Which subset of messages is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mailbox {
    #[default]
    Inbox,
    Sent,
    Drafts,
}

impl Mailbox {
    pub const ALL: [Mailbox; 3] = [Mailbox::Inbox, Mailbox::Sent, Mailbox::Drafts];

    /// Value of the `box` query parameter
    pub fn as_str(self) -> &'static str {
        match self {
            Mailbox::Inbox => "inbox",
            Mailbox::Sent => "sent",
            Mailbox::Drafts => "drafts",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mailbox::Inbox => "Inbox",
            Mailbox::Sent => "Sent",
            Mailbox::Drafts => "Drafts",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Mailbox::Inbox => Mailbox::Sent,
            Mailbox::Sent => Mailbox::Drafts,
            Mailbox::Drafts => Mailbox::Inbox,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Mailbox::Inbox => Mailbox::Drafts,
            Mailbox::Sent => Mailbox::Inbox,
            Mailbox::Drafts => Mailbox::Sent,
        }
    }
}

/// Tags a fetch with what it was issued for.
/// Only the ticket with the latest sequence number may update the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub user_id: i64,
    pub mailbox: Mailbox,
}

/// What happened to a fetch response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The list was replaced with this many messages
    Applied(usize),
    /// A newer fetch was issued after this one; the response was dropped
    Stale,
}

/// Mailbox state: active selector, loaded messages and selection
#[derive(Debug, Default)]
pub struct MailboxState {
    selected_mailbox: Mailbox,
    emails: Vec<Email>,
    loading: bool,
    pub selected_email: Option<usize>,
    detail_open: bool,
    /// Sequence number of the most recently issued fetch
    latest_seq: u64,
    /// The (user id, mailbox) pair the current list is subscribed to
    subscribed: Option<(i64, Mailbox)>,
}

impl MailboxState {
    pub fn selected_mailbox(&self) -> Mailbox {
        self.selected_mailbox
    }

    pub fn emails(&self) -> &[Email] {
        &self.emails
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_detail_open(&self) -> bool {
        self.detail_open
    }

    /// Changes the active mailbox. The refetch happens on the next `sync`.
    /// Returns false if the mailbox was already active.
    pub fn select_mailbox(&mut self, mailbox: Mailbox) -> bool {
        if self.selected_mailbox == mailbox {
            return false;
        }
        self.selected_mailbox = mailbox;
        self.selected_email = None;
        self.detail_open = false;
        true
    }

    /// Issues a fetch whenever the (identity, mailbox) pair differs from the
    /// one last fetched. Without an identity the state is cleared.
    pub fn sync(&mut self, identity: Option<&Identity>) -> Option<FetchTicket> {
        let Some(identity) = identity else {
            if self.subscribed.is_some() {
                self.reset();
            }
            return None;
        };

        let key = (identity.id, self.selected_mailbox);
        if self.subscribed == Some(key) {
            return None;
        }
        Some(self.issue(key))
    }

    /// Forces a fetch for the current mailbox
    pub fn refresh(&mut self, identity: &Identity) -> FetchTicket {
        self.issue((identity.id, self.selected_mailbox))
    }

    fn issue(&mut self, (user_id, mailbox): (i64, Mailbox)) -> FetchTicket {
        self.latest_seq += 1;
        self.subscribed = Some((user_id, mailbox));
        self.loading = true;
        FetchTicket {
            seq: self.latest_seq,
            user_id,
            mailbox,
        }
    }

    /// Applies a fetch response.
    /// Superseded responses are dropped. On error the previous list is kept.
    pub fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Email>, ApiError>,
    ) -> Result<FetchOutcome, MailError> {
        if ticket.seq != self.latest_seq {
            debug!(
                seq = ticket.seq,
                latest = self.latest_seq,
                mailbox = ticket.mailbox.as_str(),
                "dropping superseded fetch response"
            );
            return Ok(FetchOutcome::Stale);
        }
        self.loading = false;

        let emails = result.map_err(MailError::Fetch)?;
        let opened_id = self
            .detail_open
            .then(|| self.current_email().map(|e| e.id))
            .flatten();

        self.emails = emails;
        self.clamp_selection();

        // Keep the detail view only if the same message is still selected
        if self.detail_open && self.current_email().map(|e| e.id) != opened_id {
            self.detail_open = false;
        }

        Ok(FetchOutcome::Applied(self.emails.len()))
    }

    fn clamp_selection(&mut self) {
        self.selected_email = match (self.selected_email, self.emails.len()) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(idx), len) if idx >= len => Some(len - 1),
            (Some(idx), _) => Some(idx),
        };
    }

    /// Clears everything. In-flight fetches become stale.
    pub fn reset(&mut self) {
        self.latest_seq += 1;
        self.selected_mailbox = Mailbox::default();
        self.emails.clear();
        self.loading = false;
        self.selected_email = None;
        self.detail_open = false;
        self.subscribed = None;
    }

    /// Sets the message selection for the detail view
    pub fn select_message(&mut self, index: Option<usize>) {
        self.selected_email = index.filter(|&idx| idx < self.emails.len());
        if self.selected_email.is_none() {
            self.detail_open = false;
        }
    }

    /// Selects the next message in the list
    pub fn select_next(&mut self) {
        if self.emails.is_empty() {
            return;
        }
        let next = match self.selected_email {
            Some(idx) if idx < self.emails.len() - 1 => idx + 1,
            Some(idx) => idx,
            None => 0,
        };
        self.select_message(Some(next));
    }

    /// Selects the previous message in the list
    pub fn select_previous(&mut self) {
        if let Some(idx) = self.selected_email {
            self.select_message(Some(idx.saturating_sub(1)));
        }
    }

    /// Gets the currently selected message, if any
    pub fn current_email(&self) -> Option<&Email> {
        self.selected_email.and_then(|idx| self.emails.get(idx))
    }

    /// Opens the detail view for the selected message
    pub fn open_detail(&mut self) -> Option<&Email> {
        if self.current_email().is_some() {
            self.detail_open = true;
        }
        self.current_email()
    }

    pub fn close_detail(&mut self) {
        self.detail_open = false;
    }
}
