//! Password hashing and verification using PBKDF2-HMAC-SHA256
//!
//! Stored credentials have the form `base64url(salt)$base64url(digest)` with a
//! 16-byte random salt and a 32-byte digest.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use ring::{
    pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

use crate::codec;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Salt length in bytes for newly created credentials
pub const SALT_LEN: usize = 16;

/// Digest length in bytes (SHA-256 output)
pub const DIGEST_LEN: usize = 32;

/// Iteration count used unless the hasher is configured otherwise
pub const DEFAULT_ITERATIONS: NonZeroU32 = match NonZeroU32::new(150_000) {
    Some(n) => n,
    None => unreachable!(),
};

const SEPARATOR: char = '$';

/// Error types for password operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordError {
    /// The system RNG could not produce a salt
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    /// Stored credential is not `salt$digest`
    #[error("Invalid credential format: {0}")]
    InvalidCredentialFormat(String),
}

/// A salted password digest, safe to persist
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    salt: Vec<u8>,
    digest: [u8; DIGEST_LEN],
}

impl Credential {
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }
}

// Keep digests out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("salt_len", &self.salt.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            codec::encode(&self.salt),
            SEPARATOR,
            codec::encode(self.digest)
        )
    }
}

impl FromStr for Credential {
    type Err = PasswordError;

    fn from_str(stored: &str) -> Result<Self, Self::Err> {
        let (salt_b64, digest_b64) = stored.split_once(SEPARATOR).ok_or_else(|| {
            PasswordError::InvalidCredentialFormat("missing separator".to_string())
        })?;

        let salt = codec::decode(salt_b64)
            .map_err(|e| PasswordError::InvalidCredentialFormat(format!("salt: {}", e)))?;
        let digest = codec::decode(digest_b64)
            .map_err(|e| PasswordError::InvalidCredentialFormat(format!("digest: {}", e)))?;

        let digest: [u8; DIGEST_LEN] = digest.try_into().map_err(|d: Vec<u8>| {
            PasswordError::InvalidCredentialFormat(format!(
                "digest is {} bytes, expected {}",
                d.len(),
                DIGEST_LEN
            ))
        })?;

        Ok(Self { salt, digest })
    }
}

/// Salted, iterated password hasher
#[derive(Clone)]
pub struct PasswordHasher {
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn with_iterations(iterations: NonZeroU32) -> Self {
        Self {
            iterations,
            rng: SystemRandom::new(),
        }
    }

    pub fn iterations(&self) -> NonZeroU32 {
        self.iterations
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<Credential, PasswordError> {
        let mut salt = vec![0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| PasswordError::HashingFailed("system RNG unavailable".to_string()))?;

        let digest = self.derive(password, &salt);
        Ok(Credential { salt, digest })
    }

    /// Check a plaintext password against a stored credential string
    ///
    /// Never fails: a malformed stored value simply does not match.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match stored.parse::<Credential>() {
            Ok(credential) => self.verify_credential(password, &credential),
            Err(e) => {
                debug!("Rejecting password check: {}", e);
                false
            }
        }
    }

    pub fn verify_credential(&self, password: &str, credential: &Credential) -> bool {
        let actual = self.derive(password, &credential.salt);
        actual[..].ct_eq(&credential.digest[..]).into()
    }

    fn derive(&self, password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
        let mut digest = [0u8; DIGEST_LEN];
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            salt,
            password.as_bytes(),
            &mut digest,
        );
        digest
    }
}

/// Hash a password with the default iteration count
///
/// # Example
/// ```
/// use taskmate_auth::password::{hash_password, verify_password};
///
/// let stored = hash_password("MyPassword123!").unwrap();
/// assert!(verify_password("MyPassword123!", &stored));
/// assert!(!verify_password("WrongPassword", &stored));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    Ok(PasswordHasher::default().hash(password)?.to_string())
}

/// Verify a password against a stored credential with the default iteration count
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHasher::default().verify(password, stored)
}
