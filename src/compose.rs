use crate::error::{ApiError, MailError};

/// Input field of the compose dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposeField {
    #[default]
    Recipient,
    Subject,
    Body,
}

impl ComposeField {
    pub fn next(self) -> Self {
        match self {
            ComposeField::Recipient => ComposeField::Subject,
            ComposeField::Subject => ComposeField::Body,
            ComposeField::Body => ComposeField::Recipient,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            ComposeField::Recipient => ComposeField::Body,
            ComposeField::Subject => ComposeField::Recipient,
            ComposeField::Body => ComposeField::Subject,
        }
    }
}

/// The unsaved message being written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
}

impl Draft {
    pub fn field(&self, field: ComposeField) -> &str {
        match field {
            ComposeField::Recipient => &self.recipient_email,
            ComposeField::Subject => &self.subject,
            ComposeField::Body => &self.body,
        }
    }

    fn field_mut(&mut self, field: ComposeField) -> &mut String {
        match field {
            ComposeField::Recipient => &mut self.recipient_email,
            ComposeField::Subject => &mut self.subject,
            ComposeField::Body => &mut self.body,
        }
    }

    /// Whitespace-only fields count as empty, as the server strips them
    fn is_complete(&self) -> bool {
        [&self.recipient_email, &self.subject, &self.body]
            .iter()
            .all(|value| !value.trim().is_empty())
    }
}

/// Send the message, or store it as a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKind {
    Send,
    SaveDraft,
}

impl SubmitKind {
    /// Value of the `action` field sent to the mailbox endpoint
    pub fn action(self) -> &'static str {
        match self {
            SubmitKind::Send => "send",
            SubmitKind::SaveDraft => "draft",
        }
    }

    pub fn progress_label(self) -> &'static str {
        match self {
            SubmitKind::Send => "Sending...",
            SubmitKind::SaveDraft => "Saving draft...",
        }
    }

    pub fn success_title(self) -> &'static str {
        match self {
            SubmitKind::Send => "Message sent",
            SubmitKind::SaveDraft => "Draft saved",
        }
    }
}

/// A validated compose submission, ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub kind: SubmitKind,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
}

/// Server acknowledgement of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub kind: SubmitKind,
    pub message: String,
}

/// Compose dialog state
#[derive(Debug, Default)]
pub struct Compose {
    open: bool,
    draft: Draft,
    pub focus: ComposeField,
    /// Set while a submission is outstanding
    in_flight: Option<SubmitKind>,
    /// The outstanding submission's dialog was closed before it resolved
    detached: bool,
}

impl Compose {

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn in_flight(&self) -> Option<SubmitKind> {
        self.in_flight
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Closes the dialog and discards the draft.
    /// An outstanding submission no longer owns the dialog.
    pub fn close(&mut self) {
        self.detached = self.in_flight.is_some();
        self.open = false;
        self.draft = Draft::default();
        self.focus = ComposeField::default();
    }

    /// Closes the dialog and forgets any outstanding submission
    pub fn reset(&mut self) {
        self.close();
        self.in_flight = None;
        self.detached = false;
    }

    pub fn update_draft_field(&mut self, field: ComposeField, value: impl Into<String>) {
        *self.draft.field_mut(field) = value.into();
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_previous(&mut self) {
        self.focus = self.focus.previous();
    }

    /// Appends a character to the focused field. Only the body takes newlines.
    pub fn push_char(&mut self, c: char) {
        if c == '\n' && self.focus != ComposeField::Body {
            return;
        }
        let mut value = self.draft.field(self.focus).to_string();
        value.push(c);
        self.update_draft_field(self.focus, value);
    }

    pub fn pop_char(&mut self) {
        let mut value = self.draft.field(self.focus).to_string();
        if value.pop().is_some() {
            self.update_draft_field(self.focus, value);
        }
    }

    /// Validates the draft and marks the submission in flight.
    /// Fails without a request if any field is empty.
    pub fn submit(&mut self, kind: SubmitKind) -> Result<SubmitRequest, MailError> {
        if self.in_flight.is_some() {
            return Err(MailError::InFlight);
        }
        if !self.draft.is_complete() {
            return Err(MailError::Validation(
                "Recipient, subject and body are required".to_string(),
            ));
        }

        self.in_flight = Some(kind);
        Ok(SubmitRequest {
            kind,
            recipient_email: self.draft.recipient_email.trim().to_string(),
            subject: self.draft.subject.trim().to_string(),
            body: self.draft.body.clone(),
        })
    }

    /// Applies the server's answer to the outstanding submission.
    /// Success closes the dialog and clears the draft; failure keeps both.
    /// A detached submission leaves whatever dialog is open now untouched.
    /// Returns None if nothing was outstanding.
    pub fn apply_submit(
        &mut self,
        result: Result<String, ApiError>,
    ) -> Option<Result<Ack, MailError>> {
        let kind = self.in_flight.take()?;
        let detached = std::mem::take(&mut self.detached);

        Some(match result {
            Ok(message) => {
                if !detached {
                    self.close();
                }
                Ok(Ack { kind, message })
            }
            Err(e) => Err(MailError::Send(e)),
        })
    }
}
