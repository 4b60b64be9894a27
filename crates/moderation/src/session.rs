//! Moderator credentials and per-chat conversation state.

use crate::types::ExchangeId;

/// Where a chat is in its conversation with the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatState {
    #[default]
    Idle,
    AwaitingLogin,
    AwaitingPassword,
    /// The moderator's next text replaces the generated answer
    EditingExchange(ExchangeId),
}

/// Moderator login and password.
#[derive(Clone)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    pub fn login_matches(&self, candidate: &str) -> bool {
        constant_time_eq::constant_time_eq(candidate.as_bytes(), self.login.as_bytes())
    }

    pub fn password_matches(&self, candidate: &str) -> bool {
        constant_time_eq::constant_time_eq(candidate.as_bytes(), self.password.as_bytes())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_match() {
        let creds = Credentials::new("moderator", "password123");
        assert!(creds.login_matches("moderator"));
        assert!(!creds.login_matches("moderator "));
        assert!(!creds.login_matches("Moderator"));
        assert!(creds.password_matches("password123"));
        assert!(!creds.password_matches("password12"));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("moderator", "password123");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("moderator"));
        assert!(!debug.contains("password123"));
    }
}
