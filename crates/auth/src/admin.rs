//! Admin RBAC: platform-operator tokens carry roles, scopes, and a set of
//! tenant ids they may act on (or the wildcard `"*"` for platform admins).
//!
//! Grounded on `policies/auth.py`'s `AdminPrincipal`/`AdminAuthService` in
//! the original implementation. Not part of the core admission pipeline
//! (§4.3); this gates the admin RBAC endpoints listed in §6, sharing the
//! JWT verification machinery in `claims`/`jwks` (§4.6).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use saas_core::TenantId;

use crate::claims::{JwtClaims, TokenValidationError};
use crate::jwks::JwksJwtValidator;
use crate::tenant_auth::extract_bearer_token;
use crate::Hs256JwtValidator;
use crate::JwtValidator;

/// A principal extracted from an admin bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPrincipal {
    pub subject: String,
    pub roles: HashSet<String>,
    pub scopes: HashSet<String>,
    /// Tenant ids this principal may act on, as their string form. The
    /// literal value `"*"` grants access to every tenant.
    pub tenant_ids: HashSet<String>,
}

impl AdminPrincipal {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            subject: claims.admin_subject(),
            roles: claims.roles(),
            scopes: claims.scopes(),
            tenant_ids: claims.tenant_ids(),
        }
    }

    /// `"*"` in `tenant_ids` or the `platform-admin` role bypasses the
    /// per-tenant containment check (§4.6). Open question (§9a): whether the
    /// wildcard remains a permitted grant form, or is deprecated in favor of
    /// explicit per-tenant grants — see DESIGN.md.
    pub fn is_platform_admin(&self) -> bool {
        self.tenant_ids.contains("*") || self.roles.contains("platform-admin") || self.roles.contains("platform_admin")
    }

    pub fn can_access_tenant(&self, tenant_id: TenantId) -> bool {
        self.is_platform_admin() || self.tenant_ids.contains(&tenant_id.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminAuthzError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid admin token: {0}")]
    InvalidToken(String),

    #[error("forbidden: missing required role or scope")]
    MissingRoleOrScope,

    #[error("forbidden: tenant not in principal's scope")]
    TenantNotInScope,
}

impl From<TokenValidationError> for AdminAuthzError {
    fn from(err: TokenValidationError) -> Self {
        match err {
            TokenValidationError::MissingToken => AdminAuthzError::MissingToken,
            other => AdminAuthzError::InvalidToken(other.to_string()),
        }
    }
}

/// Decodes an admin bearer token (JWKS or shared secret, whichever is
/// configured) into an `AdminPrincipal`.
pub struct AdminAuthService {
    jwks_validator: Option<JwksJwtValidator>,
    shared_secret_validator: Option<Hs256JwtValidator>,
}

impl AdminAuthService {
    pub fn new(jwks_validator: Option<JwksJwtValidator>, shared_secret_validator: Option<Hs256JwtValidator>) -> Self {
        Self { jwks_validator, shared_secret_validator }
    }

    pub async fn authenticate(&self, authorization_header: Option<&str>) -> Result<AdminPrincipal, AdminAuthzError> {
        let token = extract_bearer_token(authorization_header).ok_or(AdminAuthzError::MissingToken)?;

        if let Some(jwks) = &self.jwks_validator {
            if jwks.is_configured() {
                let claims = jwks.validate(token).await?;
                return Ok(AdminPrincipal::from_claims(&claims));
            }
        }
        if let Some(shared) = &self.shared_secret_validator {
            let claims = shared.validate(token)?;
            return Ok(AdminPrincipal::from_claims(&claims));
        }
        Err(AdminAuthzError::InvalidToken("admin JWT auth is not configured".to_string()))
    }
}

/// Require that the principal holds at least one of `required_roles` or at
/// least one of `required_scopes` (a union, not an intersection: either
/// credential is sufficient), and — if `tenant_id` is given — that the
/// principal may act on that tenant.
pub fn authorize_admin(
    principal: &AdminPrincipal,
    required_roles: &[&str],
    required_scopes: &[&str],
    tenant_id: Option<TenantId>,
) -> Result<(), AdminAuthzError> {
    let has_role = required_roles.iter().any(|r| principal.roles.contains(*r));
    let has_scope = required_scopes.iter().any(|s| principal.scopes.contains(*s));

    if !required_roles.is_empty() || !required_scopes.is_empty() {
        if !(has_role || has_scope) {
            return Err(AdminAuthzError::MissingRoleOrScope);
        }
    }

    if let Some(tenant_id) = tenant_id {
        if !principal.can_access_tenant(tenant_id) {
            return Err(AdminAuthzError::TenantNotInScope);
        }
    }

    Ok(())
}

/// Parses a claim value that may be a JSON array of strings or a single
/// space/comma-delimited string, mirroring `_extract_string_set` in the
/// original implementation.
pub fn extract_string_set(value: Option<&serde_json::Value>) -> HashSet<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        Some(serde_json::Value::String(s)) => s
            .split([' ', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        _ => HashSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&str], tenant_ids: &[&str]) -> AdminPrincipal {
        AdminPrincipal {
            subject: "op-1".to_string(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            scopes: HashSet::new(),
            tenant_ids: tenant_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn wildcard_tenant_grants_any_tenant() {
        let p = principal(&[], &["*"]);
        assert!(p.can_access_tenant(TenantId::new()));
    }

    #[test]
    fn missing_role_and_scope_is_forbidden() {
        let p = principal(&["viewer"], &[]);
        assert_eq!(
            authorize_admin(&p, &["billing-admin"], &["billing:write"], None),
            Err(AdminAuthzError::MissingRoleOrScope)
        );
    }

    #[test]
    fn explicit_tenant_grant_is_sufficient() {
        let tenant_id = TenantId::new();
        let p = principal(&[], &[&tenant_id.to_string()]);
        assert!(authorize_admin(&p, &[], &[], Some(tenant_id)).is_ok());
    }
}
