use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("hub.mode must be `subscribe`")]
    WrongMode,
    #[error("hub.verify_token does not match")]
    TokenMismatch,
    #[error("hub.challenge is missing")]
    MissingChallenge,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("X-Hub-Signature-256 header is missing")]
    Missing,
    #[error("X-Hub-Signature-256 header is malformed")]
    Malformed,
    #[error("payload signature does not match")]
    Mismatch,
}

/// Answers the webhook subscription handshake with the challenge to echo back.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &SecretString,
) -> Result<String, SubscriptionError> {
    if mode != Some("subscribe") {
        return Err(SubscriptionError::WrongMode);
    }
    let expected = expected_token.expose_secret();
    if expected.is_empty() || token != Some(expected) {
        return Err(SubscriptionError::TokenMismatch);
    }
    challenge.map(str::to_string).ok_or(SubscriptionError::MissingChallenge)
}

/// Checks an `X-Hub-Signature-256: sha256=<hex>` header against the raw request body.
pub fn verify_signature(
    app_secret: &SecretString,
    body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let hex = header.trim().strip_prefix(SIGNATURE_PREFIX).ok_or(SignatureError::Malformed)?;
    let expected = decode_hex(hex).ok_or(SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(app_secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Header value for `body`, as Messenger would send it.
pub fn sign_payload(app_secret: &SecretString, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret.expose_secret().as_bytes()).ok()?;
    mac.update(body);
    Some(format!("{SIGNATURE_PREFIX}{}", encode_hex(mac.finalize().into_bytes().as_slice())))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len()).step_by(2).map(|index| u8::from_str_radix(&hex[index..index + 2], 16).ok()).collect()
}
