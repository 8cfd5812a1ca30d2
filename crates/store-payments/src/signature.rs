//! Webhook Signature Verification
//!
//! Stripe signs each delivery with `Stripe-Signature: t=<unix>,v1=<hex>[,v1=...]`
//! where `v1 = HMAC-SHA256(secret, "<t>.<raw body>")`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signature timestamp, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// How deliveries are checked
#[derive(Clone, Debug)]
enum Mode {
    /// Verify against the signing secret
    Enforce(String),
    /// No secret, non-production: accept unsigned payloads
    Unsigned,
    /// No secret in production: refuse everything
    RejectAll,
}

/// Verifies webhook signatures
#[derive(Clone, Debug)]
pub struct WebhookVerifier {
    mode: Mode,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    /// Build a verifier. Unsigned deliveries are only ever accepted when no
    /// secret is configured *and* `production` is false.
    pub fn new(secret: Option<String>, production: bool) -> Self {
        let mode = match secret.filter(|s| !s.is_empty()) {
            Some(secret) => Mode::Enforce(secret),
            None if production => Mode::RejectAll,
            None => Mode::Unsigned,
        };
        Self {
            mode,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, secs: i64) -> Self {
        self.tolerance_secs = secs;
        self
    }

    /// Whether signatures are actually checked
    pub fn is_enforcing(&self) -> bool {
        matches!(self.mode, Mode::Enforce(_))
    }

    /// Verify `payload` against the signature header at time `now` (unix seconds)
    pub fn verify_at(&self, payload: &[u8], header: Option<&str>, now: i64) -> Result<()> {
        let secret = match &self.mode {
            Mode::Enforce(secret) => secret,
            Mode::Unsigned => {
                warn!("Accepting unsigned webhook (no signing secret, non-production mode)");
                return Ok(());
            }
            Mode::RejectAll => {
                return Err(PaymentError::InvalidSignature(
                    "webhook signing secret not configured".into(),
                ));
            }
        };

        let header = header.ok_or_else(|| PaymentError::InvalidSignature("missing signature header".into()))?;

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in header.split(',') {
            if let Some((key, value)) = part.trim().split_once('=') {
                match key {
                    "t" => timestamp = value.parse().ok(),
                    "v1" => candidates.push(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".into()))?;
        if candidates.is_empty() {
            return Err(PaymentError::InvalidSignature("missing v1 signature".into()));
        }
        if now.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() {
            return Err(PaymentError::InvalidSignature("timestamp outside tolerance".into()));
        }

        let matched = candidates.iter().any(|candidate| {
            match (hex::decode(candidate), signed_mac(secret, timestamp, payload)) {
                (Ok(expected), Some(mac)) => mac.verify_slice(&expected).is_ok(),
                _ => false,
            }
        });

        if matched {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature("no matching signature".into()))
        }
    }

    /// Verify against the current clock
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<()> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

/// Produce a `Stripe-Signature` header value (used by tests and local tooling)
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = signed_mac(secret, timestamp, payload)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("t={},v1={}", timestamp, signature)
}
