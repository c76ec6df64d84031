use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compose::{SubmitKind, SubmitRequest};
use crate::config::ServerConfig;
use crate::email::{Email, WireEmail};
use crate::error::ApiError;
use crate::mailbox::Mailbox;
use crate::session::{AuthRequest, Identity};

/// Header carrying the signed-in user's id on every mailbox request
pub const USER_ID_HEADER: &str = "X-User-Id";

const DEFAULT_USER_AGENT: &str = concat!("mailterm/", env!("CARGO_PKG_VERSION"));

/// Trait for the remote auth and mailbox endpoints - allows mocking in tests
#[cfg_attr(test, mockall::automock)]
pub trait MailApi: Send + Sync {
    /// Registers a new account or signs into an existing one
    fn authenticate(
        &self,
        request: AuthRequest,
    ) -> impl std::future::Future<Output = Result<Identity, ApiError>> + Send;

    /// Lists the messages of one mailbox
    fn fetch_emails(
        &self,
        user_id: i64,
        mailbox: Mailbox,
    ) -> impl std::future::Future<Output = Result<Vec<Email>, ApiError>> + Send;

    /// Sends a message or saves a draft; returns the server's confirmation text
    fn submit(
        &self,
        user_id: i64,
        request: SubmitRequest,
    ) -> impl std::future::Future<Output = Result<String, ApiError>> + Send;

    /// Flags a received message as read
    fn mark_read(
        &self,
        user_id: i64,
        email_id: i64,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    /// Asks the server to import new external mail; returns how many arrived
    fn check_inbox(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<usize, ApiError>> + Send;
}

#[derive(Debug, Serialize)]
struct AuthBody<'a> {
    action: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthReply {
    user: Identity,
}

#[derive(Debug, Deserialize)]
struct EmailsReply {
    #[serde(default)]
    emails: Vec<WireEmail>,
}

#[derive(Debug, Deserialize)]
struct SubmitReply {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CheckInboxReply {
    #[serde(default)]
    new_emails: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

/// POST bodies accepted by the mailbox endpoint
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum EmailsAction<'a> {
    Send {
        recipient_email: &'a str,
        subject: &'a str,
        body: &'a str,
    },
    Draft {
        recipient_email: &'a str,
        subject: &'a str,
        body: &'a str,
    },
    MarkRead {
        email_id: i64,
    },
    CheckInbox,
}

impl<'a> From<&'a SubmitRequest> for EmailsAction<'a> {
    fn from(request: &'a SubmitRequest) -> Self {
        let (recipient_email, subject, body) = (
            request.recipient_email.as_str(),
            request.subject.as_str(),
            request.body.as_str(),
        );
        match request.kind {
            SubmitKind::Send => EmailsAction::Send {
                recipient_email,
                subject,
                body,
            },
            SubmitKind::SaveDraft => EmailsAction::Draft {
                recipient_email,
                subject,
                body,
            },
        }
    }
}

/// Interprets a finished HTTP exchange.
/// Non-2xx answers become `Rejected`, carrying the body's `error` field if any.
fn interpret<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ApiError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_slice::<ErrorReply>(body)
            .ok()
            .map(|reply| reply.error);
        return Err(ApiError::Rejected { status, message });
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Malformed(e.to_string()))
}

fn decode_emails(reply: EmailsReply) -> Result<Vec<Email>, ApiError> {
    reply.emails.into_iter().map(Email::try_from).collect()
}

/// HTTP client for the remote auth and mailbox endpoints
pub struct HttpMailApi {
    client: Client,
    auth_url: String,
    emails_url: String,
}

impl HttpMailApi {
    /// Creates a client for the configured endpoints
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            auth_url: config.auth_url.clone(),
            emails_url: config.emails_url.clone(),
        })
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Unreachable(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Unreachable(e.to_string()))?;
        debug!(status, bytes = body.len(), "response received");
        interpret(status, &body)
    }

    async fn post_action<T: DeserializeOwned>(
        &self,
        user_id: i64,
        action: &EmailsAction<'_>,
    ) -> Result<T, ApiError> {
        self.exchange(
            self.client
                .post(&self.emails_url)
                .header(USER_ID_HEADER, user_id.to_string())
                .json(action),
        )
        .await
    }
}

impl MailApi for HttpMailApi {
    async fn authenticate(&self, request: AuthRequest) -> Result<Identity, ApiError> {
        info!(action = request.mode.action(), username = %request.username, "authenticating");
        let body = AuthBody {
            action: request.mode.action(),
            username: &request.username,
            password: &request.password,
        };
        let reply: AuthReply = self
            .exchange(self.client.post(&self.auth_url).json(&body))
            .await?;
        Ok(reply.user)
    }

    async fn fetch_emails(&self, user_id: i64, mailbox: Mailbox) -> Result<Vec<Email>, ApiError> {
        debug!(user_id, mailbox = mailbox.as_str(), "fetching mailbox");
        let reply: EmailsReply = self
            .exchange(
                self.client
                    .get(&self.emails_url)
                    .query(&[("box", mailbox.as_str())])
                    .header(USER_ID_HEADER, user_id.to_string()),
            )
            .await?;
        decode_emails(reply)
    }

    async fn submit(&self, user_id: i64, request: SubmitRequest) -> Result<String, ApiError> {
        info!(user_id, action = request.kind.action(), "submitting message");
        let reply: SubmitReply = self
            .post_action(user_id, &EmailsAction::from(&request))
            .await?;
        Ok(reply.message)
    }

    async fn mark_read(&self, user_id: i64, email_id: i64) -> Result<(), ApiError> {
        debug!(user_id, email_id, "marking message read");
        let _: serde_json::Value = self
            .post_action(user_id, &EmailsAction::MarkRead { email_id })
            .await?;
        Ok(())
    }

    async fn check_inbox(&self, user_id: i64) -> Result<usize, ApiError> {
        debug!(user_id, "checking for new mail");
        let reply: CheckInboxReply = self
            .post_action(user_id, &EmailsAction::CheckInbox)
            .await?;
        Ok(reply.new_emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::Correspondent;

    #[test]
    fn test_interpret_auth_success() {
        let reply: AuthReply = interpret(
            201,
            br#"{"success":true,"user":{"id":4,"username":"alice","email":"alice@skzry.ru"},"token":"abc"}"#,
        )
        .unwrap();
        assert_eq!(reply.user.id, 4);
        assert_eq!(reply.user.email, "alice@skzry.ru");
    }

    #[test]
    fn test_interpret_error_body() {
        let result: Result<AuthReply, _> = interpret(409, br#"{"error":"User already exists"}"#);
        assert_eq!(
            result.unwrap_err(),
            ApiError::Rejected {
                status: 409,
                message: Some("User already exists".to_string()),
            }
        );
    }

    #[test]
    fn test_interpret_error_without_json_body() {
        let result: Result<AuthReply, _> = interpret(502, b"Bad Gateway");
        assert_eq!(
            result.unwrap_err(),
            ApiError::Rejected {
                status: 502,
                message: None,
            }
        );
    }

    #[test]
    fn test_interpret_malformed_success_body() {
        let result: Result<AuthReply, _> = interpret(200, br#"{"user":null}"#);
        assert!(matches!(result, Err(ApiError::Malformed(_))));
    }

    #[test]
    fn test_decode_emails_for_sent_box() {
        let reply: EmailsReply = interpret(
            200,
            br#"{"emails":[{"id":2,"to":"bob@domain","subject":"Hi","body":"Hello","is_read":false,"sent_at":"2025-05-01T08:00:00"}]}"#,
        )
        .unwrap();
        let emails = decode_emails(reply).unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].correspondent, Correspondent::To("bob@domain".to_string()));
    }

    #[test]
    fn test_decode_emails_rejects_ambiguous_message() {
        let reply: EmailsReply = interpret(
            200,
            br#"{"emails":[{"id":2,"subject":"Hi","body":"Hello"}]}"#,
        )
        .unwrap();
        assert!(matches!(decode_emails(reply), Err(ApiError::Malformed(_))));
    }

    #[test]
    fn test_submit_body_shapes() {
        let request = SubmitRequest {
            kind: SubmitKind::SaveDraft,
            recipient_email: "bob@domain".to_string(),
            subject: "Hi".to_string(),
            body: "Hello".to_string(),
        };
        let value = serde_json::to_value(EmailsAction::from(&request)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "action": "draft",
                "recipient_email": "bob@domain",
                "subject": "Hi",
                "body": "Hello",
            })
        );

        let value = serde_json::to_value(EmailsAction::CheckInbox).unwrap();
        assert_eq!(value, serde_json::json!({"action": "check_inbox"}));

        let value = serde_json::to_value(EmailsAction::MarkRead { email_id: 9 }).unwrap();
        assert_eq!(value, serde_json::json!({"action": "mark_read", "email_id": 9}));
    }

    #[test]
    fn test_auth_body_shape() {
        let body = AuthBody {
            action: "login",
            username: "alice",
            password: "x",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"action": "login", "username": "alice", "password": "x"})
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_unreachable() {
        // Port 9 (discard) is not served on loopback in test environments
        let config = ServerConfig {
            auth_url: "http://127.0.0.1:9/auth".to_string(),
            emails_url: "http://127.0.0.1:9/emails".to_string(),
            request_timeout_secs: 5,
            user_agent: None,
        };
        let api = HttpMailApi::new(&config).unwrap();

        let result = api.fetch_emails(1, Mailbox::Inbox).await;
        assert!(matches!(result, Err(ApiError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_mock_api_authenticate() {
        let mut mock = MockMailApi::new();
        mock.expect_authenticate()
            .withf(|request| request.username == "alice")
            .returning(|request| {
                Box::pin(async move {
                    Ok(Identity {
                        id: 1,
                        email: format!("{}@skzry.ru", request.username),
                        username: request.username,
                    })
                })
            });

        let identity = mock
            .authenticate(AuthRequest {
                mode: crate::session::AuthMode::Register,
                username: "alice".to_string(),
                password: "x".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(identity.email, "alice@skzry.ru");
    }
}
