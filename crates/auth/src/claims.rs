//! JWT claims: kept as a loosely-typed JSON map rather than a rigid struct,
//! since the two consumers (tenant verifier, admin verifier) each only read
//! a handful of claims and the accepted claim names vary by issuer (Azure AD
//! emits `tid`/`oid`, many others emit `tenant_id`/`sub`) — grounded on
//! `policies/auth.py`'s dict-based claims in the original implementation.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

/// Decoded (and signature-verified) token claims.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtClaims(pub Value);

impl JwtClaims {
    /// `tenant_id` claim, falling back to `tid` (§4.3, §9: Azure-style token shape).
    pub fn tenant_claim(&self) -> Option<String> {
        string_claim(&self.0, &["tenant_id", "tid"])
    }

    /// `sub` claim, falling back to `oid` then `upn` (§4.3).
    pub fn subject_claim(&self) -> Option<String> {
        string_claim(&self.0, &["sub", "oid", "upn"])
    }

    /// Admin-verifier subject: same fallback order as the original
    /// implementation's `AdminAuthService.authenticate` (`sub`, `oid`, `upn`),
    /// defaulting to `"unknown"` rather than failing the whole decode.
    pub fn admin_subject(&self) -> String {
        string_claim(&self.0, &["sub", "oid", "upn"]).unwrap_or_else(|| "unknown".to_string())
    }

    pub fn roles(&self) -> HashSet<String> {
        let mut roles = crate::admin::extract_string_set(self.0.get("roles"));
        roles.extend(crate::admin::extract_string_set(self.0.get("role")));
        roles
    }

    pub fn scopes(&self) -> HashSet<String> {
        let mut scopes = crate::admin::extract_string_set(self.0.get("scp"));
        scopes.extend(crate::admin::extract_string_set(self.0.get("scope")));
        scopes
    }

    pub fn tenant_ids(&self) -> HashSet<String> {
        let mut tenant_ids = crate::admin::extract_string_set(self.0.get("tenant_ids"));
        if let Some(direct) = self.tenant_claim() {
            tenant_ids.insert(direct);
        }
        tenant_ids
    }
}

fn string_claim(value: &Value, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(found) = value.get(*name).and_then(Value::as_str) {
            if !found.is_empty() {
                return Some(found.to_string());
            }
        }
    }
    None
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("missing token")]
    MissingToken,

    #[error("invalid token format")]
    InvalidFormat,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Abstraction over a verified token source, decoupling callers from the
/// signing scheme (shared secret vs. JWKS).
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenValidationError>;
}

/// Verifies tokens signed with a shared HMAC secret (`JWT_SHARED_SECRET` /
/// `JWT_ALGORITHM`, default `HS256`).
#[derive(Debug, Clone)]
pub struct Hs256JwtValidator {
    secret: Vec<u8>,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenValidationError> {
        if token.trim().is_empty() {
            return Err(TokenValidationError::MissingToken);
        }

        let validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        let decoded = jsonwebtoken::decode::<Value>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|e| TokenValidationError::InvalidToken(e.to_string()))?;

        Ok(JwtClaims(decoded.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_claim_falls_back_to_tid() {
        let claims = JwtClaims(serde_json::json!({"tid": "t-1"}));
        assert_eq!(claims.tenant_claim(), Some("t-1".to_string()));
    }

    #[test]
    fn subject_claim_prefers_sub_over_oid() {
        let claims = JwtClaims(serde_json::json!({"sub": "user-1", "oid": "user-2"}));
        assert_eq!(claims.subject_claim(), Some("user-1".to_string()));
    }

    #[test]
    fn roles_merge_singular_and_plural_claims() {
        let claims = JwtClaims(serde_json::json!({"roles": ["a"], "role": "b c"}));
        let roles = claims.roles();
        assert!(roles.contains("a") && roles.contains("b") && roles.contains("c"));
    }
}
