//! Authentication and authorization: JWT claims, JWKS verification, static
//! API keys, and admin principal checks.

pub mod admin;
pub mod claims;
pub mod jwks;
pub mod tenant_auth;

pub use admin::{authorize_admin, AdminAuthService, AdminAuthzError, AdminPrincipal};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError};
pub use jwks::JwksJwtValidator;
pub use tenant_auth::{AuthenticatedTenant, TenantAuthError, TenantAuthenticator};
