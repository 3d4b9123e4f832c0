//! Base64url helpers shared by credentials and tokens
//!
//! Output never carries `=` padding. Input is accepted with or without it, so
//! values produced by other base64url implementations still decode.

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurposeConfig, DecodePaddingMode, GeneralPurpose},
    Engine as _,
};
use thiserror::Error;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Error returned when a segment is not valid base64url
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid base64url data: {0}")]
pub struct CodecError(#[from] base64::DecodeError);

/// Encode bytes as unpadded base64url
pub fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_LENIENT.encode(data)
}

/// Decode base64url, tolerating missing padding
pub fn decode(data: &str) -> Result<Vec<u8>, CodecError> {
    Ok(URL_SAFE_LENIENT.decode(data)?)
}
