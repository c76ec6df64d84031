//! In-memory mail backend for `--demo` runs, screenshots and tests.
//! Mirrors the server's rules for accounts, delivery and drafts.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::api::MailApi;
use crate::compose::{SubmitKind, SubmitRequest};
use crate::email::{Email, EmailBuilder};
use crate::error::ApiError;
use crate::mailbox::Mailbox;
use crate::session::{AuthMode, AuthRequest, Identity};

/// Domain assigned to accounts created in demo mode
pub const DEMO_DOMAIN: &str = "skzry.ru";

/// Account seeded for `login` in demo mode
pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo";

const TEAM_ADDRESS: &str = "team@skzry.ru";

#[derive(Debug, Clone)]
struct User {
    id: i64,
    username: String,
    email: String,
    /// None for external recipients created on delivery
    password: Option<String>,
}

impl User {
    fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredEmail {
    id: i64,
    sender_id: i64,
    recipient_email: String,
    subject: String,
    body: String,
    is_draft: bool,
    is_read: bool,
    sent_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Store {
    users: Vec<User>,
    emails: Vec<StoredEmail>,
    next_user_id: i64,
    next_email_id: i64,
}

fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Rejected {
        status,
        message: Some(message.to_string()),
    }
}

impl Store {
    fn add_user(&mut self, username: &str, email: &str, password: Option<&str>) -> User {
        self.next_user_id += 1;
        let user = User {
            id: self.next_user_id,
            username: username.to_string(),
            email: email.to_string(),
            password: password.map(str::to_string),
        };
        self.users.push(user.clone());
        user
    }

    fn user(&self, id: i64) -> Result<&User, ApiError> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| rejected(404, "User not found"))
    }

    fn store_email(
        &mut self,
        sender_id: i64,
        recipient_email: &str,
        subject: &str,
        body: &str,
        is_draft: bool,
        sent_at: DateTime<Utc>,
    ) -> i64 {
        self.next_email_id += 1;
        self.emails.push(StoredEmail {
            id: self.next_email_id,
            sender_id,
            recipient_email: recipient_email.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            is_draft,
            is_read: false,
            sent_at,
        });
        self.next_email_id
    }

    /// Welcome mail for a freshly created account
    fn greet(&mut self, recipient: &str) {
        let Some(team_id) = self.users.iter().find(|u| u.email == TEAM_ADDRESS).map(|u| u.id)
        else {
            return;
        };
        let now = Utc::now();
        self.store_email(
            team_id,
            recipient,
            "Welcome to your new mailbox",
            "Your account is ready. Press c to write your first message.",
            false,
            now - ChronoDuration::minutes(5),
        );
        self.store_email(
            team_id,
            recipient,
            "Getting started",
            "Use 1, 2 and 3 to switch between Inbox, Sent and Drafts.\nPress r to refresh.",
            false,
            now - ChronoDuration::minutes(4),
        );
    }

    fn authenticate(&mut self, request: &AuthRequest) -> Result<Identity, ApiError> {
        let username = request.username.trim();
        if username.is_empty() || request.password.is_empty() {
            return Err(rejected(400, "Username and password are required"));
        }

        match request.mode {
            AuthMode::Register => {
                let email = format!("{username}@{DEMO_DOMAIN}");
                if self
                    .users
                    .iter()
                    .any(|u| u.username == username || u.email == email)
                {
                    return Err(rejected(409, "User already exists"));
                }
                let user = self.add_user(username, &email, Some(&request.password));
                self.greet(&email);
                Ok(user.identity())
            }
            AuthMode::Login => self
                .users
                .iter()
                .find(|u| {
                    u.username == username && u.password.as_deref() == Some(request.password.as_str())
                })
                .map(User::identity)
                .ok_or_else(|| rejected(401, "Invalid credentials")),
        }
    }

    fn list(&self, user_id: i64, mailbox: Mailbox) -> Result<Vec<Email>, ApiError> {
        let user = self.user(user_id)?;

        let mut rows: Vec<&StoredEmail> = self
            .emails
            .iter()
            .filter(|e| match mailbox {
                Mailbox::Inbox => e.recipient_email == user.email && !e.is_draft,
                Mailbox::Sent => e.sender_id == user.id && !e.is_draft,
                Mailbox::Drafts => e.sender_id == user.id && e.is_draft,
            })
            .collect();
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));

        rows.into_iter()
            .map(|row| {
                let builder = EmailBuilder::new()
                    .id(row.id)
                    .subject(row.subject.clone())
                    .body(row.body.clone())
                    .read(row.is_read)
                    .sent_at(row.sent_at);
                let builder = match mailbox {
                    Mailbox::Inbox => builder.from(self.user(row.sender_id)?.email.clone()),
                    Mailbox::Sent | Mailbox::Drafts => builder.to(row.recipient_email.clone()),
                };
                Ok(builder.build())
            })
            .collect()
    }

    fn submit(&mut self, user_id: i64, request: &SubmitRequest) -> Result<String, ApiError> {
        self.user(user_id)?;

        let recipient = request.recipient_email.trim();
        let subject = request.subject.trim();
        let body = request.body.trim();
        if recipient.is_empty() || subject.is_empty() || body.is_empty() {
            return Err(rejected(
                400,
                "recipient_email, subject, and body are required",
            ));
        }

        if !self.users.iter().any(|u| u.email == recipient) {
            let username = recipient.split('@').next().unwrap_or(recipient);
            self.add_user(username, recipient, None);
        }

        let is_draft = request.kind == SubmitKind::SaveDraft;
        self.store_email(user_id, recipient, subject, body, is_draft, Utc::now());

        let message = if is_draft { "Draft saved" } else { "Email sent" };
        Ok(message.to_string())
    }

    fn mark_read(&mut self, user_id: i64, email_id: i64) -> Result<(), ApiError> {
        self.user(user_id)?;
        if let Some(email) = self.emails.iter_mut().find(|e| e.id == email_id) {
            email.is_read = true;
        }
        Ok(())
    }
}

/// Mail backend held entirely in memory
pub struct DemoMailApi {
    store: Mutex<Store>,
    latency: Duration,
}

impl DemoMailApi {
    /// Creates a backend with the team sender and the demo login account
    pub fn new(latency: Duration) -> Self {
        let mut store = Store::default();
        store.add_user("team", TEAM_ADDRESS, None);
        let demo_email = format!("{DEMO_USERNAME}@{DEMO_DOMAIN}");
        store.add_user(DEMO_USERNAME, &demo_email, Some(DEMO_PASSWORD));
        store.greet(&demo_email);

        Self {
            store: Mutex::new(store),
            latency,
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> Result<T, ApiError>) -> Result<T, ApiError> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| ApiError::Unreachable("demo store poisoned".to_string()))?;
        f(&mut store)
    }
}

impl Default for DemoMailApi {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl MailApi for DemoMailApi {
    async fn authenticate(&self, request: AuthRequest) -> Result<Identity, ApiError> {
        self.simulate_latency().await;
        self.with_store(|store| store.authenticate(&request))
    }

    async fn fetch_emails(&self, user_id: i64, mailbox: Mailbox) -> Result<Vec<Email>, ApiError> {
        self.simulate_latency().await;
        self.with_store(|store| store.list(user_id, mailbox))
    }

    async fn submit(&self, user_id: i64, request: SubmitRequest) -> Result<String, ApiError> {
        self.simulate_latency().await;
        self.with_store(|store| store.submit(user_id, &request))
    }

    async fn mark_read(&self, user_id: i64, email_id: i64) -> Result<(), ApiError> {
        self.simulate_latency().await;
        self.with_store(|store| store.mark_read(user_id, email_id))
    }

    async fn check_inbox(&self, user_id: i64) -> Result<usize, ApiError> {
        self.simulate_latency().await;
        // No external mail source in demo mode
        self.with_store(|store| store.user(user_id).map(|_| 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::Correspondent;

    fn auth(mode: AuthMode, username: &str, password: &str) -> AuthRequest {
        AuthRequest {
            mode,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn message(kind: SubmitKind, to: &str) -> SubmitRequest {
        SubmitRequest {
            kind,
            recipient_email: to.to_string(),
            subject: "Hi".to_string(),
            body: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_assigns_domain_address() {
        let api = DemoMailApi::default();
        let identity = api
            .authenticate(auth(AuthMode::Register, "alice", "x"))
            .await
            .unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.email, format!("alice@{DEMO_DOMAIN}"));
    }

    #[tokio::test]
    async fn test_register_duplicate_rejected() {
        let api = DemoMailApi::default();
        api.authenticate(auth(AuthMode::Register, "alice", "x"))
            .await
            .unwrap();
        let err = api
            .authenticate(auth(AuthMode::Register, "alice", "y"))
            .await
            .unwrap_err();
        assert_eq!(err, rejected(409, "User already exists"));
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let api = DemoMailApi::default();
        assert!(
            api.authenticate(auth(AuthMode::Login, DEMO_USERNAME, DEMO_PASSWORD))
                .await
                .is_ok()
        );
        let err = api
            .authenticate(auth(AuthMode::Login, DEMO_USERNAME, "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, rejected(401, "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_external_recipient_cannot_log_in() {
        let api = DemoMailApi::default();
        let sender = api
            .authenticate(auth(AuthMode::Login, DEMO_USERNAME, DEMO_PASSWORD))
            .await
            .unwrap();
        api.submit(sender.id, message(SubmitKind::Send, "outside@example.com"))
            .await
            .unwrap();

        assert!(
            api.authenticate(auth(AuthMode::Login, "outside", "anything"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_new_account_has_welcome_mail() {
        let api = DemoMailApi::default();
        let identity = api
            .authenticate(auth(AuthMode::Register, "carol", "pw"))
            .await
            .unwrap();

        let inbox = api.fetch_emails(identity.id, Mailbox::Inbox).await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert!(inbox.iter().all(|e| e.correspondent == Correspondent::From(TEAM_ADDRESS.to_string())));
        // Newest first
        assert_eq!(inbox[0].subject, "Getting started");
    }

    #[tokio::test]
    async fn test_send_delivers_to_local_recipient() {
        let api = DemoMailApi::default();
        let alice = api
            .authenticate(auth(AuthMode::Register, "alice", "x"))
            .await
            .unwrap();
        let bob = api
            .authenticate(auth(AuthMode::Register, "bob", "y"))
            .await
            .unwrap();

        let ack = api
            .submit(alice.id, message(SubmitKind::Send, &bob.email))
            .await
            .unwrap();
        assert_eq!(ack, "Email sent");

        let sent = api.fetch_emails(alice.id, Mailbox::Sent).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].correspondent, Correspondent::To(bob.email.clone()));

        let inbox = api.fetch_emails(bob.id, Mailbox::Inbox).await.unwrap();
        assert!(inbox.iter().any(|e| e.correspondent == Correspondent::From(alice.email.clone())));
    }

    #[tokio::test]
    async fn test_draft_is_not_delivered() {
        let api = DemoMailApi::default();
        let alice = api
            .authenticate(auth(AuthMode::Register, "alice", "x"))
            .await
            .unwrap();

        let ack = api
            .submit(alice.id, message(SubmitKind::SaveDraft, "bob@domain"))
            .await
            .unwrap();
        assert_eq!(ack, "Draft saved");

        assert_eq!(api.fetch_emails(alice.id, Mailbox::Drafts).await.unwrap().len(), 1);
        assert!(api.fetch_emails(alice.id, Mailbox::Sent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_requires_all_fields() {
        let api = DemoMailApi::default();
        let mut request = message(SubmitKind::Send, "bob@domain");
        request.body = "  ".to_string();

        let err = api.submit(2, request).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_mark_read() {
        let api = DemoMailApi::default();
        let demo = api
            .authenticate(auth(AuthMode::Login, DEMO_USERNAME, DEMO_PASSWORD))
            .await
            .unwrap();
        let inbox = api.fetch_emails(demo.id, Mailbox::Inbox).await.unwrap();
        assert!(!inbox[0].is_read);

        api.mark_read(demo.id, inbox[0].id).await.unwrap();
        let inbox = api.fetch_emails(demo.id, Mailbox::Inbox).await.unwrap();
        assert!(inbox[0].is_read);
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let api = DemoMailApi::default();
        let err = api.fetch_emails(999, Mailbox::Inbox).await.unwrap_err();
        assert_eq!(err, rejected(404, "User not found"));
        assert!(api.check_inbox(999).await.is_err());
        assert_eq!(api.check_inbox(1).await.unwrap(), 0);
    }
}
