//! HMAC-signed URL grants.
//!
//! Instead of proxying file bytes through authenticated endpoints, the API
//! hands out short-lived grants: `(key, expires, signature)` where the
//! signature is HMAC-SHA256 over `"{key}:{expires}"`.  The file route
//! verifies the signature and the expiry before touching the store.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use shift_core::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// A signed, time-limited grant for one object key.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignedGrant {
    /// Object key the grant is valid for.
    pub key: String,
    /// Unix timestamp (seconds) after which the grant is invalid.
    pub expires: i64,
    /// Hex-encoded HMAC-SHA256 signature.
    pub signature: String,
}

/// Issues and verifies [`SignedGrant`]s with a shared secret.
#[derive(Debug, Clone)]
pub struct UrlSigner {
    secret: String,
    ttl_secs: u64,
}

impl UrlSigner {
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Internal(format!("invalid signing secret: {e}")))
    }

    /// Issue a grant for `key` expiring `ttl_secs` after `now_unix`.
    pub fn grant(&self, key: &str, now_unix: i64) -> Result<SignedGrant> {
        let expires = now_unix + self.ttl_secs as i64;
        let mut mac = self.mac()?;
        mac.update(format!("{key}:{expires}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(SignedGrant {
            key: key.to_string(),
            expires,
            signature,
        })
    }

    /// Verify a presented grant against the current time.
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now_unix: i64) -> Result<()> {
        if now_unix > expires {
            return Err(Error::Validation("signed URL has expired".into()));
        }

        let expected = match hex::decode(signature) {
            Ok(b) => b,
            Err(_) => return Err(Error::Validation("malformed signature".into())),
        };

        let mut mac = self.mac()?;
        mac.update(format!("{key}:{expires}").as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| Error::Validation("invalid signature".into()))
    }
}
