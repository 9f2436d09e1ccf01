//! Core contracts and helpers for clinicseed.
//!
//! This crate defines the untyped record model, the table catalog with its
//! tenant scopes and foreign keys, dependency ordering, and the record
//! validation engine shared by the store adapters, the seeding engine and
//! the CLI.

pub mod error;
pub mod graph;
pub mod record;
pub mod redaction;
pub mod schema;
pub mod validation;

pub use error::{CoreError, Result};
pub use graph::{DependencyGraph, GraphError, cleanup_order, insertion_order};
pub use record::{Record, project, record_id, str_field};
pub use redaction::{RedactedEndpoint, mask_secret, redact_endpoint};
pub use schema::{CATALOG, ForeignRef, Scope, TableDef, table_def};
pub use validation::{
    BatchValidation, InvalidRecord, RecordSchema, ValidationError, validate_batch,
    validate_batch_strict,
};

/// Column used to scope most tables by tenant.
pub const TENANT_COLUMN: &str = "tenant_id";
