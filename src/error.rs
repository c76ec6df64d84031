//! Error types for mailterm.

use thiserror::Error;

/// Message shown when the mail server cannot be reached at all.
pub const CONNECTIVITY_MESSAGE: &str = "Unable to reach the mail server";

/// Failure talking to one of the remote endpoints.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The server answered with a non-2xx status.
    #[error("server rejected request ({status}): {}", .message.as_deref().unwrap_or("no details"))]
    Rejected { status: u16, message: Option<String> },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Text suitable for the user, falling back when the server gave none.
    fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Unreachable(_) => CONNECTIVITY_MESSAGE.to_string(),
            ApiError::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            ApiError::Rejected { .. } | ApiError::Malformed(_) => fallback.to_string(),
        }
    }
}

/// Errors surfaced by the session, mailbox and compose controllers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MailError {
    /// A required field was empty; no request was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// Register or login failed.
    #[error("authentication error: {0}")]
    Auth(ApiError),

    /// Loading a mailbox or checking for new mail failed.
    #[error("fetch error: {0}")]
    Fetch(ApiError),

    /// Sending a message or saving a draft failed.
    #[error("send error: {0}")]
    Send(ApiError),

    /// Changing a stored message (marking it read) failed.
    #[error("update error: {0}")]
    Update(ApiError),

    /// A request of the same kind is already outstanding.
    #[error("a request is already in progress")]
    InFlight,
}

impl MailError {
    /// Human-readable notification text for this error.
    pub fn user_message(&self) -> String {
        match self {
            MailError::Validation(message) => message.clone(),
            MailError::Auth(e) => e.user_message("Authentication failed"),
            MailError::Fetch(e) => e.user_message("Could not load messages"),
            MailError::Send(e) => e.user_message("Could not send message"),
            MailError::Update(e) => e.user_message("Could not update message"),
            MailError::InFlight => "Please wait for the current request to finish".to_string(),
        }
    }
}
