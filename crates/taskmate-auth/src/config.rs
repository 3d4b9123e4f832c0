//! Authentication configuration
//!
//! Built once at startup, then shared read-only (usually behind an `Arc`) by
//! the token issuer, verifier, admin resolver and authenticator.

use std::fmt;
use std::num::NonZeroU32;

use chrono::Duration;
use thiserror::Error;

use crate::admin::{normalize_email, AdminAllowList};
use crate::password::{PasswordHasher, DEFAULT_ITERATIONS};

/// Placeholder secret used when none is configured
pub const DEFAULT_SECRET: &str = "change-this-auth-secret";

/// Token validity when not configured
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Longest accepted token validity (100 years)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 100;

/// Display name given to the bootstrap admin account
pub const DEFAULT_ADMIN_NAME: &str = "Admin";

/// Rejected configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Token lifetime must be between 1 and {max} hours, got {0}", max = MAX_TOKEN_TTL_HOURS)]
    InvalidTokenTtl(i64),
}

/// First-run admin account authenticated by a configured plaintext password
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    email: String,
    password: String,
    name: String,
}

impl BootstrapAdmin {
    /// Returns `None` when the email is blank, which disables the bootstrap path
    pub fn new(email: &str, password: impl Into<String>, name: Option<&str>) -> Option<Self> {
        let email = normalize_email(email);
        if email.is_empty() {
            return None;
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_ADMIN_NAME)
            .to_string();

        Some(Self {
            email,
            password: password.into(),
            name,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Exact match of a normalized email and the plaintext password
    ///
    /// An empty configured password never matches.
    pub fn matches(&self, email: &str, password: &str) -> bool {
        !self.password.is_empty() && email == self.email && password == self.password
    }
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable settings for the authentication core
#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    token_ttl: Duration,
    admin_emails: AdminAllowList,
    bootstrap_admin: Option<BootstrapAdmin>,
    password_iterations: NonZeroU32,
}

impl AuthConfig {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            admin_emails: AdminAllowList::new(),
            bootstrap_admin: None,
            password_iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Set the token validity; must lie in `1..=MAX_TOKEN_TTL_HOURS`
    pub fn with_token_ttl_hours(mut self, hours: i64) -> Result<Self, ConfigError> {
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
            return Err(ConfigError::InvalidTokenTtl(hours));
        }
        self.token_ttl = Duration::try_hours(hours).ok_or(ConfigError::InvalidTokenTtl(hours))?;
        Ok(self)
    }

    /// Add emails to the admin allow-list
    pub fn with_admin_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin_emails.extend(emails);
        self
    }

    /// Add a comma separated list of emails to the admin allow-list
    pub fn with_admin_emails_csv(self, csv: &str) -> Self {
        self.with_admin_emails(csv.split(','))
    }

    /// Configure the bootstrap admin; its email always joins the allow-list
    pub fn with_bootstrap_admin(mut self, admin: BootstrapAdmin) -> Self {
        self.admin_emails.insert(admin.email());
        self.bootstrap_admin = Some(admin);
        self
    }

    pub fn with_password_iterations(mut self, iterations: NonZeroU32) -> Self {
        self.password_iterations = iterations;
        self
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn is_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET.as_bytes()
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn admin_emails(&self) -> &AdminAllowList {
        &self.admin_emails
    }

    pub fn bootstrap_admin(&self) -> Option<&BootstrapAdmin> {
        self.bootstrap_admin.as_ref()
    }

    pub fn password_hasher(&self) -> PasswordHasher {
        PasswordHasher::with_iterations(self.password_iterations)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl.num_hours())
            .field("admin_emails", &self.admin_emails.len())
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("password_iterations", &self.password_iterations)
            .finish()
    }
}
