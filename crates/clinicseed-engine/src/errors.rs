use thiserror::Error;

use clinicseed_core::{CoreError, GraphError, ValidationError};
use clinicseed_store::StoreError;

use crate::fixtures::FixtureError;

/// Failure of a single seeder. Always recovered into a `SeederResult`.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid schema: {0}")]
    Schema(#[from] CoreError),
    /// Rows this seeder builds on are not present in the store.
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("{0}")]
    Invalid(String),
}

/// Configuration problems that abort a run before any mutation.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("unknown variant '{name}' (available: {})", available.join(", "))]
    UnknownVariant {
        name: String,
        available: Vec<String>,
    },
    #[error("variant '{variant}' has an invalid seeder graph: {source}")]
    InvalidDependencies {
        variant: String,
        #[source]
        source: GraphError,
    },
    #[error("variant '{variant}': global seeder '{seeder}' depends on per-tenant seeder '{dependency}'")]
    GlobalDependsOnTenant {
        variant: String,
        seeder: String,
        dependency: String,
    },
    #[error("variant '{variant}' seeds per-tenant data but no tenants were given")]
    NoTenants { variant: String },
    #[error("table catalog cannot be ordered: {0}")]
    Catalog(#[from] GraphError),
}
