//! Bearer token extraction (RFC 6750)
//!
//! ```text
//! Authorization: Bearer <token>
//! ```

use crate::error::AuthError;

const SCHEME: &str = "bearer";

/// Pull the token out of an `Authorization` header value
///
/// The scheme is matched case-insensitively. A missing header, another
/// scheme, or an empty token all yield `MissingCredentials`.
///
/// ```
/// use taskmate_auth::extract_bearer_token;
///
/// assert_eq!(extract_bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
/// assert!(extract_bearer_token(Some("Basic dXNlcjpwYXNz")).is_err());
/// assert!(extract_bearer_token(None).is_err());
/// ```
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingCredentials)?.trim();

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or(AuthError::MissingCredentials)?;

    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return Err(AuthError::MissingCredentials);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}
