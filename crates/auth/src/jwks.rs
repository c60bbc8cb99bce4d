//! JWKS-backed JWT verification (§4.6), grounded on
//! `policies/auth.py`'s `_resolve_jwks_signing_key`/`_get_jwks_payload` in
//! the original implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::claims::{JwtClaims, TokenValidationError};

const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
    #[allow(dead_code)]
    kty: Option<String>,
}

#[derive(Clone)]
struct CachedJwks {
    document: JwksDocument,
    expires_at: DateTime<Utc>,
}

/// Caches JWKS documents per URL, honoring a TTL (`JWT_JWKS_CACHE_TTL_SECONDS`).
///
/// Concurrent refreshes of the same (now-expired) URL are not coalesced: two
/// requests racing a cache miss will both fetch. This mirrors the original
/// implementation's module-level `_JWKS_CACHE` and is an accepted trade-off
/// for a low-cardinality set of URLs, not an oversight (§4.6, §9).
pub struct JwksCache {
    entries: Mutex<HashMap<String, CachedJwks>>,
    ttl: chrono::Duration,
    client: reqwest::Client,
}

impl JwksCache {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::seconds(ttl_seconds.max(0)),
            client: reqwest::Client::builder()
                .timeout(JWKS_FETCH_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn cached(&self, url: &str, now: DateTime<Utc>) -> Option<JwksDocument> {
        let entries = self.entries.lock().expect("jwks cache poisoned");
        entries
            .get(url)
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.document.clone())
    }

    async fn fetch(&self, url: &str, now: DateTime<Utc>) -> Result<JwksDocument, TokenValidationError> {
        if let Some(doc) = self.cached(url, now) {
            return Ok(doc);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TokenValidationError::InvalidToken(format!("jwks fetch failed: {e}")))?;

        let document: JwksDocument = response
            .json()
            .await
            .map_err(|e| TokenValidationError::InvalidToken(format!("jwks decode failed: {e}")))?;

        // Failed fetches never overwrite an existing cache entry; only
        // successful responses are stored.
        let mut entries = self.entries.lock().expect("jwks cache poisoned");
        entries.insert(
            url.to_string(),
            CachedJwks {
                document: document.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(document)
    }
}

/// Verifies RS256 tokens against a JWKS endpoint.
///
/// All three of `jwks_url`, `issuer`, and `audience` must be non-empty for
/// this verifier to be usable; a partially configured instance reports a
/// misconfiguration rather than silently accepting tokens.
pub struct JwksJwtValidator {
    jwks_url: String,
    issuer: String,
    audience: String,
    cache: JwksCache,
}

impl JwksJwtValidator {
    pub fn new(jwks_url: impl Into<String>, issuer: impl Into<String>, audience: impl Into<String>, cache_ttl_seconds: i64) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            cache: JwksCache::new(cache_ttl_seconds),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.jwks_url.is_empty() && !self.issuer.is_empty() && !self.audience.is_empty()
    }

    pub async fn validate(&self, token: &str) -> Result<JwtClaims, TokenValidationError> {
        if token.trim().is_empty() {
            return Err(TokenValidationError::MissingToken);
        }
        if !self.is_configured() {
            return Err(TokenValidationError::InvalidToken(
                "jwks validator missing jwks_url/issuer/audience".to_string(),
            ));
        }

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| TokenValidationError::InvalidToken(format!("invalid header: {e}")))?;
        let kid = header.kid.ok_or(TokenValidationError::InvalidFormat)?;

        let now = Utc::now();
        let document = self.cache.fetch(&self.jwks_url, now).await?;
        let key = document
            .keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid.as_str()))
            .ok_or_else(|| TokenValidationError::InvalidToken(format!("no jwks key for kid '{kid}'")))?;

        let (n, e) = match (&key.n, &key.e) {
            (Some(n), Some(e)) => (n, e),
            _ => return Err(TokenValidationError::InvalidToken("jwks key missing rsa components".to_string())),
        };

        let decoding_key = jsonwebtoken::DecodingKey::from_rsa_components(n, e)
            .map_err(|err| TokenValidationError::InvalidToken(err.to_string()))?;

        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let decoded = jsonwebtoken::decode::<Value>(token, &decoding_key, &validation)
            .map_err(|e| TokenValidationError::InvalidToken(e.to_string()))?;

        Ok(JwtClaims(decoded.claims))
    }
}
