//! Tenant request authentication: static API key or bearer JWT (§4.3, §4.6).
//!
//! Grounded on `policies/auth.py`'s `TenantAuthService` in the original
//! implementation: a request is authenticated if either a configured static
//! API key matches, or a bearer token verifies (via JWKS or shared secret)
//! and its subject claim matches the caller-supplied customer-user id. In
//! non-production environments with no auth configured at all, requests
//! pass through unauthenticated so local development does not require
//! standing up an identity provider.

use std::collections::HashMap;

use saas_core::TenantId;

use crate::claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
use crate::jwks::JwksJwtValidator;

/// The result of a successful authentication.
#[derive(Debug, Clone)]
pub enum AuthenticatedTenant {
    /// Authenticated via a configured static API key.
    ApiKey { tenant_id: TenantId, customer_user_id: String },
    /// Authenticated via a verified JWT.
    Jwt { claims: JwtClaims, customer_user_id: String },
}

impl AuthenticatedTenant {
    pub fn customer_user_id(&self) -> &str {
        match self {
            AuthenticatedTenant::ApiKey { customer_user_id, .. } => customer_user_id,
            AuthenticatedTenant::Jwt { customer_user_id, .. } => customer_user_id,
        }
    }
}

/// Case-insensitive "Bearer " prefix extraction.
///
/// Returns `None` if the header is absent, malformed, or the token portion is
/// empty once trimmed.
pub fn extract_bearer_token(header_value: Option<&str>) -> Option<&str> {
    let raw = header_value?;
    let rest = if raw.len() >= 7 && raw[..7].eq_ignore_ascii_case("bearer ") {
        &raw[7..]
    } else {
        return None;
    };
    let trimmed = rest.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Constant-time byte comparison for the static API key check (§4.3): avoids
/// leaking key length/prefix through early-exit comparison timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantAuthError {
    /// No credential matched and auth is configured (or required in production).
    Unauthenticated,
    /// A bearer token verified, but its subject does not match the header's
    /// customer-user id (§4.3 stage 3b).
    SubjectMismatch,
    /// No auth mechanism configured and the environment is production (§4.3 stage 3).
    Misconfigured,
}

/// Authenticates tenant-scoped requests against a static key map and/or a
/// JWT verifier (shared secret or JWKS).
pub struct TenantAuthenticator {
    api_keys: HashMap<TenantId, String>,
    shared_secret_validator: Option<Hs256JwtValidator>,
    jwks_validator: Option<JwksJwtValidator>,
    is_production: bool,
}

impl TenantAuthenticator {
    pub fn new(
        api_keys: HashMap<TenantId, String>,
        shared_secret_validator: Option<Hs256JwtValidator>,
        jwks_validator: Option<JwksJwtValidator>,
        is_production: bool,
    ) -> Self {
        Self {
            api_keys,
            shared_secret_validator,
            jwks_validator,
            is_production,
        }
    }

    pub fn auth_configured(&self) -> bool {
        !self.api_keys.is_empty()
            || self.shared_secret_validator.is_some()
            || self.jwks_validator.as_ref().is_some_and(JwksJwtValidator::is_configured)
    }

    /// Authenticate a request addressed to `tenant_id`, carrying the given
    /// `X-Api-Key` and `Authorization` header values and the caller-supplied
    /// `X-Customer-User-Id`. Order of checks follows §4.3 stage 3: static
    /// key first, then bearer JWT, in that order.
    pub async fn authenticate(
        &self,
        tenant_id: TenantId,
        api_key_header: Option<&str>,
        authorization_header: Option<&str>,
        customer_user_id: &str,
    ) -> Result<AuthenticatedTenant, TenantAuthError> {
        if !self.auth_configured() {
            return if self.is_production {
                Err(TenantAuthError::Misconfigured)
            } else {
                Ok(AuthenticatedTenant::ApiKey {
                    tenant_id,
                    customer_user_id: customer_user_id.to_string(),
                })
            };
        }

        if let Some(expected) = self.api_keys.get(&tenant_id) {
            if let Some(provided) = api_key_header {
                if !provided.is_empty() && constant_time_eq(provided, expected) {
                    return Ok(AuthenticatedTenant::ApiKey {
                        tenant_id,
                        customer_user_id: customer_user_id.to_string(),
                    });
                }
            }
        }

        if let Some(token) = extract_bearer_token(authorization_header) {
            if let Some(claims) = self.verify_bearer(token).await {
                if claims.tenant_claim().as_deref() == Some(tenant_id.to_string().as_str()) {
                    let subject = claims.subject_claim();
                    return match subject {
                        Some(subject) if subject == customer_user_id => Ok(AuthenticatedTenant::Jwt {
                            claims,
                            customer_user_id: subject,
                        }),
                        Some(_) => Err(TenantAuthError::SubjectMismatch),
                        None => Err(TenantAuthError::Unauthenticated),
                    };
                }
            }
        }

        Err(TenantAuthError::Unauthenticated)
    }

    async fn verify_bearer(&self, token: &str) -> Option<JwtClaims> {
        if let Some(jwks) = &self.jwks_validator {
            if jwks.is_configured() {
                if let Ok(claims) = jwks.validate(token).await {
                    return Some(claims);
                }
            }
        }
        if let Some(shared) = &self.shared_secret_validator {
            if let Ok(claims) = shared.validate(token) {
                return Some(claims);
            }
        }
        None
    }
}

impl From<TokenValidationError> for TenantAuthError {
    fn from(_: TokenValidationError) -> Self {
        TenantAuthError::Unauthenticated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction_is_case_insensitive() {
        assert_eq!(extract_bearer_token(Some("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(Some("Bearer ")), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[tokio::test]
    async fn static_key_match_authenticates() {
        let tenant_id = TenantId::new();
        let mut keys = HashMap::new();
        keys.insert(tenant_id, "secret-key".to_string());
        let auth = TenantAuthenticator::new(keys, None, None, true);
        let result = auth.authenticate(tenant_id, Some("secret-key"), None, "user-1").await;
        assert!(matches!(result, Ok(AuthenticatedTenant::ApiKey { .. })));
    }

    #[tokio::test]
    async fn wrong_key_is_unauthenticated() {
        let tenant_id = TenantId::new();
        let mut keys = HashMap::new();
        keys.insert(tenant_id, "secret-key".to_string());
        let auth = TenantAuthenticator::new(keys, None, None, true);
        let result = auth.authenticate(tenant_id, Some("wrong"), None, "user-1").await;
        assert_eq!(result.err(), Some(TenantAuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn dev_passthrough_without_any_auth_configured() {
        let auth = TenantAuthenticator::new(HashMap::new(), None, None, false);
        let tenant_id = TenantId::new();
        let result = auth.authenticate(tenant_id, None, None, "user-1").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn production_without_auth_is_misconfigured() {
        let auth = TenantAuthenticator::new(HashMap::new(), None, None, true);
        let tenant_id = TenantId::new();
        let result = auth.authenticate(tenant_id, None, None, "user-1").await;
        assert_eq!(result.err(), Some(TenantAuthError::Misconfigured));
    }
}
