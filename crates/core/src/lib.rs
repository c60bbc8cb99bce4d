//! Core domain: shared identifiers and error model the rest of the
//! workspace builds on.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, RequestId, TenantId};
