//! Seeding engine for the clinic platform.
//!
//! A run picks a [`Variant`], optionally clears the target tenants, then
//! drives each configured [`Seeder`] against a [`clinicseed_store::Store`]
//! and folds their outcomes into a [`clinicseed_report::SeedReport`].

pub mod cleanup;
pub mod context;
pub mod errors;
pub mod fixtures;
pub mod idempotency;
pub mod orchestrator;
pub mod seeder;
pub mod seeders;
#[cfg(test)]
mod testing;
pub mod variants;
pub mod verification;

pub use cleanup::{CleanupReport, cleanup, cleanup_tracked};
pub use context::{DEFAULT_BATCH_SIZE, RunCache, RunContext, SeedContext};
pub use errors::{OrchestratorError, SeedError};
pub use fixtures::{FixtureError, Fixtures, FsFixtures, MemoryFixtures};
pub use idempotency::{KeyField, UniqueKeyPolicy, UpsertOutcome, exists, policy_for, upsert, upsert_batched};
pub use orchestrator::{Orchestrator, RunOptions, RunState};
pub use seeder::{Pipeline, Seeder, TableSeeder};
pub use variants::{
    SeederConfig, SeederFactory, SeederOptions, Variant, get_variant, resolve_execution_order,
    variant_names,
};
pub use verification::verify;
