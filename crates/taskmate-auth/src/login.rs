//! Login, registration and request authentication over a [`UserStore`]
//!
//! Login picks one of two strategies before touching any credential:
//!
//! - [`LoginStrategy::BootstrapAdmin`]: the submitted email and plaintext
//!   password equal the configured bootstrap admin pair. The account is created
//!   on first use and the stored hash is never consulted.
//! - [`LoginStrategy::Credentials`]: everything else, checked against the
//!   stored credential.

use std::sync::Arc;

use tracing::{debug, info};

use crate::admin::{normalize_email, AdminResolver};
use crate::bearer::extract_bearer_token;
use crate::config::{AuthConfig, BootstrapAdmin};
use crate::error::AuthError;
use crate::password::PasswordHasher;
use crate::store::{StoreError, UserRecord, UserStore};
use crate::token::{TokenIssuer, TokenVerifier};

/// How a login attempt will be authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStrategy<'a> {
    BootstrapAdmin(&'a BootstrapAdmin),
    Credentials,
}

/// Outcome of a successful login or registration
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: UserRecord,
    pub is_admin: bool,
}

/// Entry point for the authentication flows
#[derive(Clone)]
pub struct Authenticator {
    config: Arc<AuthConfig>,
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    admin: AdminResolver,
}

impl Authenticator {
    pub fn new(config: Arc<AuthConfig>, store: Arc<dyn UserStore>) -> Self {
        Self {
            hasher: config.password_hasher(),
            issuer: TokenIssuer::new(&config),
            verifier: TokenVerifier::new(&config),
            admin: AdminResolver::new(Arc::clone(&config)),
            config,
            store,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn admin(&self) -> &AdminResolver {
        &self.admin
    }

    /// Decide how to authenticate a login; `email` must already be normalized
    pub fn select_strategy(&self, email: &str, password: &str) -> LoginStrategy<'_> {
        match self.config.bootstrap_admin() {
            Some(admin) if admin.matches(email, password) => LoginStrategy::BootstrapAdmin(admin),
            _ => LoginStrategy::Credentials,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);

        match self.select_strategy(&email, password) {
            LoginStrategy::BootstrapAdmin(admin) => self.login_bootstrap_admin(admin).await,
            LoginStrategy::Credentials => self.login_with_credentials(&email, password).await,
        }
    }

    async fn login_bootstrap_admin(
        &self,
        admin: &BootstrapAdmin,
    ) -> Result<AuthSession, AuthError> {
        let user = match self.store.find_user_by_email(admin.email()).await? {
            Some(user) => user,
            None => {
                let password_hash = self.hash_password(admin.password()).await?;
                match self
                    .store
                    .create_user(admin.name(), admin.email(), &password_hash)
                    .await
                {
                    Ok(user) => {
                        info!(user_id = user.id, "Created bootstrap admin account");
                        user
                    }
                    // Lost a race with a concurrent first login
                    Err(StoreError::DuplicateEmail) => self
                        .store
                        .find_user_by_email(admin.email())
                        .await?
                        .ok_or(AuthError::UnknownUser)?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        info!(user_id = user.id, "Bootstrap admin logged in");
        self.session_for(user)
    }

    async fn login_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            debug!("Login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        debug!(user_id = user.id, "User logged in");
        self.session_for(user)
    }

    /// Create an account and log it in
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);

        if let Some(admin) = self.config.bootstrap_admin() {
            if admin.email() == email {
                return Err(AuthError::EmailReserved);
            }
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hash_password(password).await?;
        let user = self
            .store
            .create_user(name.trim(), &email, &password_hash)
            .await?;

        info!(user_id = user.id, "Registered new user");
        self.session_for(user)
    }

    /// Resolve the caller of a request from its `Authorization` header
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<UserRecord, AuthError> {
        let token = extract_bearer_token(authorization)?;
        let identity = self.verifier.verify(token)?;

        self.store
            .find_user_by_id(identity.subject_id)
            .await?
            .ok_or_else(|| {
                debug!(subject_id = identity.subject_id, "Token subject no longer exists");
                AuthError::UnknownUser
            })
    }

    /// Like [`Self::authenticate`], additionally requiring admin privilege
    pub async fn authenticate_admin(
        &self,
        authorization: Option<&str>,
    ) -> Result<UserRecord, AuthError> {
        let user = self.authenticate(authorization).await?;
        self.admin.require_admin(&user.identity())?;
        Ok(user)
    }

    fn session_for(&self, user: UserRecord) -> Result<AuthSession, AuthError> {
        let token = self.issuer.issue(user.id, &user.email)?;
        let is_admin = self.admin.is_admin_email(&user.email);
        Ok(AuthSession {
            token,
            user,
            is_admin,
        })
    }

    // PBKDF2 runs on the blocking pool, never on an async worker
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let credential = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))??;
        Ok(credential.to_string())
    }

    async fn verify_password(&self, password: &str, stored: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| AuthError::Internal(format!("Password check task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;

    fn authenticator(config: AuthConfig) -> Authenticator {
        Authenticator::new(Arc::new(config), Arc::new(MemoryUserStore::new()))
    }

    #[test]
    fn test_strategy_without_bootstrap_admin() {
        let auth = authenticator(AuthConfig::new("s"));
        assert_eq!(
            auth.select_strategy("root@x.com", "s3cret"),
            LoginStrategy::Credentials
        );
    }

    #[test]
    fn test_strategy_requires_exact_pair() {
        let admin = BootstrapAdmin::new("root@x.com", "s3cret", None).unwrap();
        let auth = authenticator(AuthConfig::new("s").with_bootstrap_admin(admin));

        assert!(matches!(
            auth.select_strategy("root@x.com", "s3cret"),
            LoginStrategy::BootstrapAdmin(a) if a.email() == "root@x.com"
        ));
        assert_eq!(
            auth.select_strategy("root@x.com", "wrong"),
            LoginStrategy::Credentials
        );
        assert_eq!(
            auth.select_strategy("other@x.com", "s3cret"),
            LoginStrategy::Credentials
        );
    }

    #[test]
    fn test_strategy_disabled_by_empty_password() {
        let admin = BootstrapAdmin::new("root@x.com", "", None).unwrap();
        let auth = authenticator(AuthConfig::new("s").with_bootstrap_admin(admin));
        assert_eq!(
            auth.select_strategy("root@x.com", ""),
            LoginStrategy::Credentials
        );
    }
}
