use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::ApiError;

/// The other party of a message, relative to the signed-in user.
/// Inbox messages carry a sender; sent messages and drafts carry a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correspondent {
    From(String),
    To(String),
}

impl Correspondent {
    /// Column label for this kind of correspondent
    pub fn label(&self) -> &'static str {
        match self {
            Correspondent::From(_) => "From",
            Correspondent::To(_) => "To",
        }
    }

    /// The raw address (possibly "Name <addr>") as delivered by the server
    pub fn address(&self) -> &str {
        match self {
            Correspondent::From(addr) | Correspondent::To(addr) => addr,
        }
    }
}

/// Represents an email message as returned by the mailbox endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub id: i64,
    pub correspondent: Correspondent,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    /// None when the server has no timestamp for the row
    pub sent_at: Option<DateTime<Utc>>,
}

impl Email {
    /// Bare email address of the correspondent, without a display name
    pub fn correspondent_email(&self) -> String {
        extract_email(self.correspondent.address())
    }

    /// True for unread messages that the user received
    pub fn is_unread_incoming(&self) -> bool {
        !self.is_read && matches!(self.correspondent, Correspondent::From(_))
    }
}

/// Message shape on the wire. Exactly one of `from`/`to` must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEmail {
    pub id: i64,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, alias = "isRead")]
    pub is_read: bool,
    #[serde(default, alias = "sentAt")]
    pub sent_at: Option<String>,
}

impl TryFrom<WireEmail> for Email {
    type Error = ApiError;

    fn try_from(wire: WireEmail) -> Result<Self, Self::Error> {
        let correspondent = match (wire.from, wire.to) {
            (Some(from), None) => Correspondent::From(from),
            (None, Some(to)) => Correspondent::To(to),
            (Some(_), Some(_)) => {
                return Err(ApiError::Malformed(format!(
                    "message {} has both sender and recipient",
                    wire.id
                )));
            }
            (None, None) => {
                return Err(ApiError::Malformed(format!(
                    "message {} has neither sender nor recipient",
                    wire.id
                )));
            }
        };

        Ok(Email {
            id: wire.id,
            correspondent,
            subject: wire.subject,
            body: wire.body,
            is_read: wire.is_read,
            sent_at: wire.sent_at.as_deref().and_then(parse_sent_at),
        })
    }
}

/// Builder for creating Email instances
#[derive(Default)]
pub struct EmailBuilder {
    id: i64,
    from: Option<String>,
    to: Option<String>,
    subject: String,
    body: String,
    is_read: bool,
    sent_at: Option<DateTime<Utc>>,
}

impl EmailBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.to = None;
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self.from = None;
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    pub fn sent_at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = Some(sent_at);
        self
    }

    pub fn build(self) -> Email {
        let correspondent = match (self.from, self.to) {
            (_, Some(to)) => Correspondent::To(to),
            (Some(from), None) => Correspondent::From(from),
            (None, None) => Correspondent::From(String::new()),
        };

        Email {
            id: self.id,
            correspondent,
            subject: self.subject,
            body: self.body,
            is_read: self.is_read,
            sent_at: self.sent_at,
        }
    }
}

fn angle_address() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([^>]+)>").expect("valid address regex"))
}

/// Extracts the email address from a "Name <email>" format string
/// If no angle brackets are present, returns the string trimmed as-is
pub fn extract_email(from: &str) -> String {
    if let Some(captures) = angle_address().captures(from) {
        captures
            .get(1)
            .map_or_else(String::new, |m| m.as_str().to_string())
    } else {
        from.trim().to_string()
    }
}

/// Parses the server's `sent_at` value.
/// The server emits ISO-8601 without an offset, which is taken as UTC.
pub fn parse_sent_at(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    for fmt in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn wire(json: &str) -> WireEmail {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_inbox_message_decodes_sender() {
        let email = Email::try_from(wire(
            r#"{"id":7,"from":"bob@skzry.ru","subject":"Hi","body":"Hello","is_read":false,"sent_at":"2025-03-01T09:15:00.123456"}"#,
        ))
        .unwrap();

        assert_eq!(email.id, 7);
        assert_eq!(email.correspondent, Correspondent::From("bob@skzry.ru".to_string()));
        assert!(email.is_unread_incoming());
        let sent = email.sent_at.unwrap();
        assert_eq!(sent.month(), 3);
        assert_eq!(sent.hour(), 9);
    }

    #[test]
    fn test_sent_message_decodes_recipient() {
        let email = Email::try_from(wire(
            r#"{"id":3,"to":"carol@example.com","subject":"Report","body":"Attached","is_read":true,"sent_at":null}"#,
        ))
        .unwrap();

        assert_eq!(email.correspondent.label(), "To");
        assert_eq!(email.correspondent.address(), "carol@example.com");
        assert!(email.sent_at.is_none());
        assert!(!email.is_unread_incoming());
    }

    #[test]
    fn test_camel_case_aliases_accepted() {
        let email = Email::try_from(wire(
            r#"{"id":1,"to":"a@b.c","subject":"s","body":"b","isRead":true,"sentAt":"2025-01-02T03:04:05Z"}"#,
        ))
        .unwrap();
        assert!(email.is_read);
        assert_eq!(email.sent_at.unwrap().year(), 2025);
    }

    #[test]
    fn test_message_with_both_parties_is_malformed() {
        let result = Email::try_from(wire(
            r#"{"id":1,"from":"a@b.c","to":"d@e.f","subject":"s","body":"b"}"#,
        ));
        assert!(matches!(result, Err(ApiError::Malformed(_))));
    }

    #[test]
    fn test_message_with_no_party_is_malformed() {
        let result = Email::try_from(wire(r#"{"id":1,"subject":"s","body":"b"}"#));
        assert!(matches!(result, Err(ApiError::Malformed(_))));
    }

    #[test]
    fn test_extract_email_with_name() {
        assert_eq!(extract_email("Bob Smith <bob@example.com>"), "bob@example.com");
    }

    #[test]
    fn test_extract_email_without_brackets() {
        assert_eq!(extract_email("  bob@example.com "), "bob@example.com");
    }

    #[test]
    fn test_correspondent_email_strips_display_name() {
        let email = EmailBuilder::new()
            .id(1)
            .from("Alice <alice@skzry.ru>")
            .build();
        assert_eq!(email.correspondent_email(), "alice@skzry.ru");
    }

    #[test]
    fn test_parse_sent_at_space_separator() {
        let dt = parse_sent_at("2024-12-31 23:59:58").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.second(), 58);
    }

    #[test]
    fn test_parse_sent_at_invalid() {
        assert!(parse_sent_at("yesterday").is_none());
    }

    #[test]
    fn test_builder_to_overrides_from() {
        let email = EmailBuilder::new().from("x@y.z").to("q@r.s").build();
        assert_eq!(email.correspondent, Correspondent::To("q@r.s".to_string()));
    }
}
