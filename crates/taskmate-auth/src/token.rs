//! Signed, time-bounded identity tokens
//!
//! Wire format: `base64url(header).base64url(claims).base64url(signature)`
//! where the signature is HMAC-SHA256 over the first two segments exactly as
//! they appear in the token. The header is constant and never interpreted on
//! verification; only the signature over it matters.

use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::codec;
use crate::config::AuthConfig;
use crate::error::AuthError;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims embedded in every token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: i64,
    pub email: String,
    /// Expiration time (unix seconds)
    pub exp: i64,
}

impl Claims {
    /// Fails when `issued_at + ttl` is past the representable date range
    pub fn new(
        subject_id: i64,
        email: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, AuthError> {
        let expires_at = issued_at.checked_add_signed(ttl).ok_or_else(|| {
            AuthError::Internal(format!(
                "Token expiry overflows: issued at {} with a {}h lifetime",
                issued_at.timestamp(),
                ttl.num_hours()
            ))
        })?;

        Ok(Self {
            sub: subject_id,
            email: email.into(),
            exp: expires_at.timestamp(),
        })
    }

    /// Expired once the current second reaches `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Caller identity recovered from an authenticated token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: i64,
    pub email: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.sub,
            email: claims.email,
        }
    }
}

fn signing_key(config: &AuthConfig) -> hmac::Key {
    hmac::Key::new(hmac::HMAC_SHA256, config.secret())
}

/// Mints tokens signed with the configured secret
#[derive(Clone)]
pub struct TokenIssuer {
    key: hmac::Key,
    ttl: Duration,
    encoded_header: String,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            key: signing_key(config),
            ttl: config.token_ttl(),
            encoded_header: codec::encode(HEADER_JSON),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid from now for the configured TTL
    pub fn issue(&self, subject_id: i64, email: &str) -> Result<String, AuthError> {
        self.issue_at(subject_id, email, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject_id: i64,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims::new(subject_id, email, now, self.ttl)?;
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AuthError::Internal(format!("Failed to encode claims: {}", e)))?;

        let signing_input = format!("{}.{}", self.encoded_header, codec::encode(payload));
        let signature = hmac::sign(&self.key, signing_input.as_bytes());

        Ok(format!("{}.{}", signing_input, codec::encode(signature.as_ref())))
    }
}

/// Authenticates tokens and recovers the embedded identity
#[derive(Clone)]
pub struct TokenVerifier {
    key: hmac::Key,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            key: signing_key(config),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let claims = self.decode_claims(token)?;

        if claims.is_expired_at(now) {
            debug!(subject_id = claims.sub, exp = claims.exp, "Token rejected: expired");
            return Err(AuthError::Expired);
        }

        Ok(claims.into())
    }

    /// Check structure and signature, then decode the claims without an expiry check
    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let (signing_input, payload_b64, signature_b64) = split_token(token).ok_or_else(|| {
            debug!("Token rejected: malformed");
            AuthError::MalformedToken
        })?;

        // Nothing from the payload is read until the signature checks out
        if !self.signature_matches(signing_input, signature_b64) {
            debug!("Token rejected: bad signature");
            return Err(AuthError::BadSignature);
        }

        let payload = codec::decode(payload_b64).map_err(|_| AuthError::MalformedPayload)?;
        serde_json::from_slice(&payload).map_err(|e| {
            debug!("Token rejected: invalid payload: {}", e);
            AuthError::MalformedPayload
        })
    }

    fn signature_matches(&self, signing_input: &str, signature_b64: &str) -> bool {
        let Ok(provided) = codec::decode(signature_b64) else {
            return false;
        };
        let expected = hmac::sign(&self.key, signing_input.as_bytes());
        expected.as_ref().ct_eq(provided.as_slice()).into()
    }
}

/// Returns `(header.payload, payload, signature)` for a three-segment token
fn split_token(token: &str) -> Option<(&str, &str, &str)> {
    let (signing_input, signature) = token.rsplit_once('.')?;
    let (header, payload) = signing_input.split_once('.')?;

    if header.is_empty() || payload.is_empty() || signature.is_empty() || payload.contains('.') {
        return None;
    }

    Some((signing_input, payload, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_TOKEN_TTL_HOURS;
    use chrono::TimeZone;
    use std::sync::Arc;

    const TEST_SECRET: &str = "test-secret";

    fn config() -> AuthConfig {
        AuthConfig::new(TEST_SECRET)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Build a token from raw segment contents, signed with `secret`
    fn sign_raw(secret: &str, header: &[u8], payload: &[u8]) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let input = format!("{}.{}", codec::encode(header), codec::encode(payload));
        let tag = hmac::sign(&key, input.as_bytes());
        format!("{}.{}", input, codec::encode(tag.as_ref()))
    }

    #[test]
    fn test_issue_then_verify() {
        let config = config();
        let token = TokenIssuer::new(&config).issue(42, "user@example.com").unwrap();

        let identity = TokenVerifier::new(&config).verify(&token).unwrap();
        assert_eq!(identity.subject_id, 42);
        assert_eq!(identity.email, "user@example.com");
    }

    #[test]
    fn test_wire_format() {
        let issuer = TokenIssuer::new(&config());
        let token = issuer.issue_at(7, "a@b.com", at(1_700_000_000)).unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(!token.contains('='));

        let header = codec::decode(parts[0]).unwrap();
        assert_eq!(header, br#"{"alg":"HS256","typ":"JWT"}"#);

        let payload = codec::decode(parts[1]).unwrap();
        assert_eq!(payload, br#"{"sub":7,"email":"a@b.com","exp":1700086400}"#);

        assert_eq!(codec::decode(parts[2]).unwrap().len(), 32);
    }

    #[test]
    fn test_issuance_is_deterministic() {
        let issuer = TokenIssuer::new(&config());
        let first = issuer.issue_at(7, "a@b.com", at(1_700_000_000)).unwrap();
        let second = issuer.issue_at(7, "a@b.com", at(1_700_000_000)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expiry_truncates_subsecond_instant() {
        let issuer = TokenIssuer::new(&config());
        let now = Utc.timestamp_opt(1_700_000_000, 999_999_999).unwrap();
        let token = issuer.issue_at(1, "a@b.com", now).unwrap();

        let claims = TokenVerifier::new(&config()).decode_claims(&token).unwrap();
        assert_eq!(claims.exp, 1_700_000_000 + 24 * 3600);
    }

    #[test]
    fn test_day_long_token_scenario() {
        let config = config();
        let t = 1_700_000_000;
        let token = TokenIssuer::new(&config).issue_at(7, "a@b.com", at(t)).unwrap();
        let verifier = TokenVerifier::new(&config);

        let identity = verifier.verify_at(&token, at(t + 1)).unwrap();
        assert_eq!(
            identity,
            Identity {
                subject_id: 7,
                email: "a@b.com".to_string()
            }
        );

        let result = verifier.verify_at(&token, at(t + 24 * 3600 + 1));
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[test]
    fn test_expiry_boundary() {
        let config = config().with_token_ttl_hours(1).unwrap();
        let t = 1_700_000_000;
        let exp = t + 3600;
        let token = TokenIssuer::new(&config).issue_at(3, "b@c.com", at(t)).unwrap();
        let verifier = TokenVerifier::new(&config);

        assert!(verifier.verify_at(&token, at(exp - 1)).is_ok());
        assert!(matches!(
            verifier.verify_at(&token, at(exp)),
            Err(AuthError::Expired)
        ));
        assert!(matches!(
            verifier.verify_at(&token, at(exp + 3600)),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_expiry_past_date_range_is_an_error() {
        let config = config().with_token_ttl_hours(MAX_TOKEN_TTL_HOURS).unwrap();
        let issuer = TokenIssuer::new(&config);

        let result = issuer.issue_at(1, "a@b.com", DateTime::<Utc>::MAX_UTC);
        assert!(matches!(result, Err(AuthError::Internal(_))));

        let claims = Claims::new(1, "a@b.com", DateTime::<Utc>::MAX_UTC, Duration::hours(1));
        assert!(claims.is_err());

        // The longest accepted lifetime still issues from the present
        let token = issuer.issue(1, "a@b.com").unwrap();
        assert!(TokenVerifier::new(&config).verify(&token).is_ok());
    }

    #[test]
    fn test_split_token_segments() {
        assert_eq!(split_token("h.p.s"), Some(("h.p", "p", "s")));
        assert_eq!(split_token("h.p.s.x"), None);
        assert_eq!(split_token("h.p"), None);
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let token = TokenIssuer::new(&AuthConfig::new("secret-a"))
            .issue(1, "a@b.com")
            .unwrap();
        let result = TokenVerifier::new(&AuthConfig::new("secret-b")).verify(&token);
        assert!(matches!(result, Err(AuthError::BadSignature)));
    }

    #[test]
    fn test_malformed_structure() {
        let verifier = TokenVerifier::new(&config());
        for token in ["", "abc", "a.b", "a..c", ".b.c", "a.b.", "a.b.c.d", "..", "..."] {
            assert!(
                matches!(verifier.verify(token), Err(AuthError::MalformedToken)),
                "{token:?} was not rejected as malformed"
            );
        }
    }

    #[test]
    fn test_undecodable_signature_is_bad_signature() {
        let token = TokenIssuer::new(&config()).issue(1, "a@b.com").unwrap();
        let (input, _) = token.rsplit_once('.').unwrap();
        let forged = format!("{}.!!!!", input);
        assert!(matches!(
            TokenVerifier::new(&config()).verify(&forged),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn test_signed_garbage_payload_is_malformed_payload() {
        let verifier = TokenVerifier::new(&config());
        let header = HEADER_JSON.as_bytes();

        let payloads: [&[u8]; 5] = [
            b"not json",
            br#"{"sub":"7","email":"a@b.com","exp":4102444800}"#,
            br#"{"sub":7,"exp":4102444800}"#,
            br#"{"sub":7,"email":"a@b.com"}"#,
            br#"[7,"a@b.com",4102444800]"#,
        ];

        for payload in payloads {
            let token = sign_raw(TEST_SECRET, header, payload);
            assert!(
                matches!(verifier.verify(&token), Err(AuthError::MalformedPayload)),
                "payload {:?} was accepted",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_unsigned_payload_is_never_parsed() {
        // Invalid payload under a wrong signature reports the signature, not the payload
        let token = sign_raw("another-secret", b"{}", b"not json");
        assert!(matches!(
            TokenVerifier::new(&config()).verify(&token),
            Err(AuthError::BadSignature)
        ));
    }

    #[test]
    fn test_accepts_tokens_with_spaced_json() {
        // Same format produced by a JSON encoder that inserts spaces after separators
        let token = "eyJhbGciOiAiSFMyNTYiLCAidHlwIjogIkpXVCJ9.\
                     eyJzdWIiOiA3LCAiZW1haWwiOiAiYUBiLmNvbSIsICJleHAiOiA0MTAyNDQ0ODAwfQ.\
                     5HNwN2Mr-8DqSMZDq7y8vsHzu_9m8x7T4rFWMFlQOqs";
        let identity = TokenVerifier::new(&config())
            .verify_at(token, at(1_700_000_000))
            .unwrap();
        assert_eq!(identity.subject_id, 7);
        assert_eq!(identity.email, "a@b.com");
    }

    #[test]
    fn test_every_single_bit_flip_is_rejected() {
        let config = config();
        let token = TokenIssuer::new(&config)
            .issue_at(7, "a@b.com", at(1_700_000_000))
            .unwrap();
        let verifier = TokenVerifier::new(&config);
        let now = at(1_700_000_001);
        assert!(verifier.verify_at(&token, now).is_ok());

        let bytes = token.as_bytes();
        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.to_vec();
                flipped[index] ^= 1 << bit;
                let Ok(candidate) = String::from_utf8(flipped) else {
                    continue;
                };

                match verifier.verify_at(&candidate, now) {
                    Err(AuthError::MalformedToken)
                    | Err(AuthError::BadSignature)
                    | Err(AuthError::MalformedPayload) => {}
                    other => panic!("flip at byte {index} bit {bit} gave {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_verifier_shared_across_threads() {
        let config = config();
        let issuer = TokenIssuer::new(&config);
        let verifier = Arc::new(TokenVerifier::new(&config));

        let tokens: Vec<String> = (0..8)
            .map(|id| issuer.issue(id, &format!("user{id}@x.com")).unwrap())
            .collect();

        std::thread::scope(|scope| {
            for (id, token) in tokens.iter().enumerate() {
                let verifier = Arc::clone(&verifier);
                scope.spawn(move || {
                    let identity = verifier.verify(token).unwrap();
                    assert_eq!(identity.subject_id, id as i64);
                });
            }
        });
    }
}
