//! Slack request signing.
//!
//! Slack signs every request with HMAC-SHA256 over `v0:{timestamp}:{body}`
//! using the app's signing secret and sends `v0=<hex digest>` in
//! `X-Slack-Signature`. Requests older than the replay window are refused.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Version prefix of the signature scheme.
const VERSION: &str = "v0";

/// Replay window, in seconds.
pub const DEFAULT_MAX_AGE_SECS: i64 = 60 * 5;

/// Verifies and produces Slack-style request signatures.
pub struct SignatureVerifier {
    secret: SecretString,
    max_age_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
        }
    }

    /// Builder: change the replay window.
    pub fn with_max_age_secs(mut self, secs: i64) -> Self {
        self.max_age_secs = secs;
        self
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }

    /// `v0=<hex>` signature for a request body sent at `timestamp`.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{VERSION}={}", hex::encode(digest)))
    }

    /// Check a request's timestamp and signature headers against its raw
    /// body. `now` is unix seconds. The digest comparison is constant time.
    pub fn verify(
        &self,
        timestamp: &str,
        signature: &str,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        let age_secs = now - sent_at;
        if age_secs.abs() > self.max_age_secs {
            return Err(SignatureError::StaleTimestamp { age_secs });
        }

        let hex_digest = signature
            .strip_prefix(VERSION)
            .and_then(|s| s.strip_prefix('='))
            .ok_or(SignatureError::Malformed)?;
        let expected = hex::decode(hex_digest).map_err(|_| SignatureError::Malformed)?;

        self.mac(timestamp, body)?
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}
