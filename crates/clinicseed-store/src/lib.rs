//! Store adapters used by the seeding engine.
//!
//! Every backend speaks the same small row API: filtered select, insert
//! returning the stored row, filtered update and filtered delete. Rows are
//! untyped [`Record`]s so seeders can move fixture data straight through.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod rest;

pub use adapter::Store;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MutationKind};
pub use postgres::PgStore;
pub use query::{Direction, Filter, Query, validate_identifier};
pub use rest::RestStore;

pub use clinicseed_core::Record;
