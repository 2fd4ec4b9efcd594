//! Stateless session tokens.
//!
//! A token is `base64url(claims_json) "." base64url(hmac_sha256(key, first_part))`.
//! Nothing is stored server side, so a token stays valid until `exp` regardless of
//! what happens to the account; there is no logout or revocation list.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{AuthError, Principal};
use crate::tprintln;

pub type SessionToken = String;

/// Random key length used when no secret is configured.
const KEY_LENGTH: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Signed claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id.
    pub sub: String,
    pub email: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl SessionClaims {
    pub fn principal(&self) -> Principal {
        Principal { account_id: self.sub.clone(), email: self.email.clone() }
    }
}

pub struct SessionManager {
    key: Vec<u8>,
    pub ttl: Duration,
}

impl SessionManager {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(secret: &[u8]) -> Self {
        Self { key: secret.to_vec(), ttl: Self::DEFAULT_TTL }
    }

    /// Key drawn from the OS at startup. Tokens do not survive a restart.
    pub fn with_random_key() -> anyhow::Result<Self> {
        let mut key = vec![0u8; KEY_LENGTH];
        getrandom::getrandom(&mut key).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(Self { key, ttl: Self::DEFAULT_TTL })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn mac(&self) -> Option<HmacSha256> {
        // HMAC accepts keys of any length; this only fails for fixed-size MACs.
        HmacSha256::new_from_slice(&self.key).ok()
    }

    pub fn issue(&self, principal: &Principal) -> SessionToken {
        self.issue_at(principal, Utc::now())
    }

    pub fn issue_at(&self, principal: &Principal, now: DateTime<Utc>) -> SessionToken {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: principal.account_id.clone(),
            email: principal.email.clone(),
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };
        // Serializing a struct of strings and integers cannot fail; an empty payload
        // would simply never verify.
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
        let Some(mut mac) = self.mac() else { return String::new(); };
        mac.update(payload.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        tprintln!("session.issue account={} ttl_secs={}", principal.account_id, self.ttl.as_secs());
        format!("{payload}.{sig}")
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Signature is checked before the claims are parsed; expiry last.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let (payload, sig) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let sig = URL_SAFE_NO_PAD.decode(sig).map_err(|_| AuthError::InvalidToken)?;
        let mut mac = self.mac().ok_or(AuthError::InvalidToken)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig).map_err(|_| AuthError::InvalidToken)?;

        let raw = URL_SAFE_NO_PAD.decode(payload).map_err(|_| AuthError::InvalidToken)?;
        let claims: SessionClaims = serde_json::from_slice(&raw).map_err(|_| AuthError::InvalidToken)?;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

/// Extract `<token>` from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        (Some(_), Some(_)) => Err(AuthError::InvalidToken),
        _ => Err(AuthError::MissingToken),
    }
}
