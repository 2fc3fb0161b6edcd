//! HMAC-SHA512 request signing.
//!
//! REST writes and private WebSocket channels are authenticated with the
//! venue's v4 signature scheme: `SIGN` is an HMAC-SHA512 over a
//! newline-joined signature string keyed by the API secret, sent alongside
//! the `KEY` and `Timestamp` headers.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};

use crate::error::{GateError, Result};

type HmacSha512 = Hmac<Sha512>;

/// API key pair. Loaded once from the environment by the launcher.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Signed headers for one REST request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub key: String,
    pub timestamp: String,
    pub sign: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read `gateio_api_key` / `gateio_secret_key` from the environment.
    ///
    /// Missing credentials are fatal at startup, per the launcher's error
    /// handling.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("gateio_api_key")
            .map_err(|_| GateError::Config("gateio_api_key not set".into()))?;
        let api_secret = std::env::var("gateio_secret_key")
            .map_err(|_| GateError::Config("gateio_secret_key not set".into()))?;
        Ok(Self::new(api_key, api_secret))
    }

    /// Sign one REST request.
    ///
    /// The signature string is
    /// `METHOD\nPATH\nQUERY\nhex(SHA512(body))\nTIMESTAMP`, and the
    /// timestamp is unix seconds.
    pub fn sign_rest(&self, method: &str, path: &str, query: &str, body: &str) -> SignedHeaders {
        let timestamp = unix_seconds().to_string();
        self.sign_rest_at(method, path, query, body, &timestamp)
    }

    /// Same as [`sign_rest`](Self::sign_rest) with an explicit timestamp
    /// (deterministic, used by tests).
    pub fn sign_rest_at(
        &self,
        method: &str,
        path: &str,
        query: &str,
        body: &str,
        timestamp: &str,
    ) -> SignedHeaders {
        let hashed_body = hex::encode(Sha512::digest(body.as_bytes()));
        let payload = format!("{method}\n{path}\n{query}\n{hashed_body}\n{timestamp}");
        SignedHeaders {
            key: self.api_key.clone(),
            timestamp: timestamp.to_string(),
            sign: self.hmac_hex(&payload),
        }
    }

    /// Sign a private WebSocket subscription for `channel` at time `t`.
    pub fn sign_ws(&self, channel: &str, t: u64) -> String {
        let payload = format!("channel={channel}&event=subscribe&time={t}");
        self.hmac_hex(&payload)
    }

    fn hmac_hex(&self, payload: &str) -> String {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = HmacSha512::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Current wall-clock time in unix seconds.
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
