//! One-time pad codec for root token generation
//!
//! The server XORs a freshly generated root token with the pad supplied when
//! the generation attempt started and returns the result base64 encoded, so
//! the plaintext token only ever exists on the side holding the pad.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use thiserror::Error;

/// Pad length used when the server does not report one
pub const DEFAULT_OTP_LENGTH: usize = 26;

/// Standard alphabet, no padding on output, padding optional on input
const TOKEN_ENCODING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors decoding an OTP-masked token. Never carries token bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("encoded token is not valid base64: {0}")]
    Base64(String),

    #[error("one-time pad is shorter than the encoded token ({pad} < {payload} bytes)")]
    PadTooShort { pad: usize, payload: usize },

    #[error("decoded token is not valid UTF-8")]
    Utf8,
}

/// Generate a random base62 pad of `length` characters from the OS RNG
pub fn generate_pad(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Mask `token` with `pad` and base64 encode the result
pub fn encode(token: &str, pad: &str) -> Result<String, OtpError> {
    let masked = xor(token.as_bytes(), pad.as_bytes())?;
    Ok(TOKEN_ENCODING.encode(masked))
}

/// Recover the token from its base64, OTP-masked form
pub fn decode(encoded: &str, pad: &str) -> Result<String, OtpError> {
    let payload = TOKEN_ENCODING
        .decode(encoded.trim())
        .map_err(|e| OtpError::Base64(e.to_string()))?;
    let token = xor(&payload, pad.as_bytes())?;
    String::from_utf8(token).map_err(|_| OtpError::Utf8)
}

fn xor(payload: &[u8], pad: &[u8]) -> Result<Vec<u8>, OtpError> {
    if pad.len() < payload.len() {
        return Err(OtpError::PadTooShort {
            pad: pad.len(),
            payload: payload.len(),
        });
    }

    Ok(payload.iter().zip(pad).map(|(p, k)| p ^ k).collect())
}
