//! Runtime configuration shared by the processors.
//!
//! These are validated runtime types. Loading and parsing the TOML file is
//! done by the server crate.

mod processing;
mod tenant;

pub use processing::{ProcessingConfig, RetryPolicy};
pub use tenant::{CrmCredentials, DocumentCredentials, Tenant, TenantDirectory, TenantRegistry};

#[cfg(test)]
pub(crate) use tenant::tests;
