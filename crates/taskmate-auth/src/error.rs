//! Authentication and authorization errors

use thiserror::Error;

use crate::password::PasswordError;
use crate::store::StoreError;

/// How a failure should surface to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    /// Caller could not be authenticated (HTTP 401 equivalent)
    NotAuthenticated,
    /// Caller is authenticated but lacks admin privilege (HTTP 403 equivalent)
    Forbidden,
    /// Request conflicts with existing state, e.g. a taken email
    Conflict,
    Internal,
}

/// Error types for the authentication core
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token is not three non-empty dot-separated segments
    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    BadSignature,

    /// Signature matched but the claims could not be decoded
    #[error("Invalid token payload")]
    MalformedPayload,

    #[error("Token expired")]
    Expired,

    #[error("Admin access required")]
    ForbiddenNotAdmin,

    /// No bearer token was presented
    #[error("Missing bearer token")]
    MissingCredentials,

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Token was valid but the account no longer exists
    #[error("User not found")]
    UnknownUser,

    #[error("This email is reserved for admin login")]
    EmailReserved,

    #[error("Email already registered")]
    EmailTaken,

    #[error("User store error: {0}")]
    Store(String),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> AuthFailureKind {
        match self {
            AuthError::MalformedToken
            | AuthError::BadSignature
            | AuthError::MalformedPayload
            | AuthError::Expired
            | AuthError::MissingCredentials
            | AuthError::InvalidCredentials
            | AuthError::UnknownUser => AuthFailureKind::NotAuthenticated,
            AuthError::ForbiddenNotAdmin | AuthError::EmailReserved => AuthFailureKind::Forbidden,
            AuthError::EmailTaken => AuthFailureKind::Conflict,
            AuthError::Store(_) | AuthError::Password(_) | AuthError::Internal(_) => {
                AuthFailureKind::Internal
            }
        }
    }

    /// Message safe to show to the caller
    ///
    /// Every token failure maps to the same generic text.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MalformedToken
            | AuthError::BadSignature
            | AuthError::MalformedPayload
            | AuthError::Expired
            | AuthError::MissingCredentials
            | AuthError::UnknownUser => "Not authenticated",
            AuthError::InvalidCredentials => "Invalid email or password",
            AuthError::ForbiddenNotAdmin => "Admin access required",
            AuthError::EmailReserved => "This email is reserved for admin login",
            AuthError::EmailTaken => "Email already registered",
            AuthError::Store(_) | AuthError::Password(_) | AuthError::Internal(_) => {
                "An internal error occurred"
            }
        }
    }

    /// True for failures of the token itself
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::BadSignature
                | AuthError::MalformedPayload
                | AuthError::Expired
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::EmailTaken,
            StoreError::Backend(msg) => AuthError::Store(msg),
        }
    }
}
