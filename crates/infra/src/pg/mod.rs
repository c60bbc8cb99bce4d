//! Postgres-backed implementations of the catalog, provisioning queue, and
//! usage meter contracts. Schema per spec §6; `claim_next` uses `FOR UPDATE
//! SKIP LOCKED`, grounded on
//! `examples/crcn-seesaw-rs/crates/seesaw-job-postgres`.

pub mod plans;
pub mod provisioning;
pub mod tenants;
pub mod usage;

pub use plans::PgPlanCatalog;
pub use provisioning::PgProvisioningQueue;
pub use tenants::PgTenantCatalog;
pub use usage::PgUsageMeter;
