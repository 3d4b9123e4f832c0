//! Authentication and authorization core for the TaskMate backend
//!
//! - [`password`]: salted PBKDF2 credentials
//! - [`token`]: HMAC-signed identity tokens
//! - [`admin`]: admin allow-list resolution
//! - [`login`]: login, registration and request authentication over a [`UserStore`]

pub mod admin;
pub mod bearer;
pub mod codec;
pub mod config;
pub mod error;
pub mod login;
pub mod password;
pub mod store;
pub mod token;

pub use admin::{normalize_email, AdminAllowList, AdminResolver};
pub use bearer::extract_bearer_token;
pub use codec::CodecError;
pub use config::{
    AuthConfig, BootstrapAdmin, ConfigError, DEFAULT_SECRET, DEFAULT_TOKEN_TTL_HOURS,
    MAX_TOKEN_TTL_HOURS,
};
pub use error::{AuthError, AuthFailureKind};
pub use login::{AuthSession, Authenticator, LoginStrategy};
pub use password::{hash_password, verify_password, Credential, PasswordError, PasswordHasher};
pub use store::{MemoryUserStore, StoreError, UserRecord, UserStore};
pub use token::{Claims, Identity, TokenIssuer, TokenVerifier};

// Re-export useful types
pub use async_trait::async_trait;
