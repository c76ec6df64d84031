use serde::{Deserialize, Serialize};

use crate::error::{ApiError, MailError};

/// The authenticated user, as returned by the auth endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// The current top-level view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Unauthenticated,
    Dashboard,
}

/// Whether the auth form creates an account or signs into an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Register,
    Login,
}

impl AuthMode {
    /// Value of the `action` field sent to the auth endpoint
    pub fn action(self) -> &'static str {
        match self {
            AuthMode::Register => "register",
            AuthMode::Login => "login",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AuthMode::Register => "Create account",
            AuthMode::Login => "Sign in",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            AuthMode::Register => AuthMode::Login,
            AuthMode::Login => AuthMode::Register,
        }
    }
}

/// Input field with focus on the auth form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthField {
    #[default]
    Username,
    Password,
}

/// A validated register/login request, ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub mode: AuthMode,
    pub username: String,
    pub password: String,
}

/// Session state: which view is active, who is signed in, and the auth form
#[derive(Debug, Default)]
pub struct Session {
    view: View,
    identity: Option<Identity>,
    pub mode: AuthMode,
    pub username: String,
    pub password: String,
    pub focus: AuthField,
    /// Mode of the outstanding auth request, if any
    pending: Option<AuthMode>,
}

impl Session {
    pub fn view(&self) -> View {
        self.view
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Mode the outstanding request was sent with
    pub fn pending_mode(&self) -> Option<AuthMode> {
        self.pending
    }

    /// Switches between register and login
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn focus_next(&mut self) {
        self.focus = match self.focus {
            AuthField::Username => AuthField::Password,
            AuthField::Password => AuthField::Username,
        };
    }

    /// Appends a character to the focused field
    pub fn push_char(&mut self, c: char) {
        match self.focus {
            AuthField::Username => self.username.push(c),
            AuthField::Password => self.password.push(c),
        }
    }

    /// Removes the last character of the focused field
    pub fn pop_char(&mut self) {
        match self.focus {
            AuthField::Username => self.username.pop(),
            AuthField::Password => self.password.pop(),
        };
    }

    /// Builds the auth request from the form and marks it in flight.
    /// Both fields are required; nothing is sent if either is empty.
    pub fn submit_auth(&mut self) -> Result<AuthRequest, MailError> {
        if self.pending.is_some() {
            return Err(MailError::InFlight);
        }

        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return Err(MailError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        self.pending = Some(self.mode);
        Ok(AuthRequest {
            mode: self.mode,
            username: username.to_string(),
            password: self.password.clone(),
        })
    }

    /// Applies the auth endpoint's answer, paired with the mode it was sent in.
    /// Returns None when no request was outstanding (the answer is ignored).
    pub fn apply_auth(
        &mut self,
        result: Result<Identity, ApiError>,
    ) -> Option<(AuthMode, Result<Identity, MailError>)> {
        let mode = self.pending.take()?;

        let outcome = match result {
            Ok(identity) => {
                self.identity = Some(identity.clone());
                self.view = View::Dashboard;
                self.password.clear();
                Ok(identity)
            }
            Err(e) => Err(MailError::Auth(e)),
        };
        Some((mode, outcome))
    }

    /// Forgets the identity and the form contents. No network call.
    pub fn sign_out(&mut self) {
        self.identity = None;
        self.view = View::Unauthenticated;
        self.username.clear();
        self.password.clear();
        self.focus = AuthField::Username;
        self.pending = None;
    }
}
