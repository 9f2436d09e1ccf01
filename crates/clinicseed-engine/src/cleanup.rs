//! Tenant teardown in an order that never breaks a foreign key.
//!
//! The order comes from the table catalog: tables are sorted parents-first
//! by their declared references, then reversed. Tables scoped by a parent
//! entity rather than by tenant are emptied first, through the ids of the
//! tenant's parent rows.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, info, warn};

use clinicseed_core::{CATALOG, GraphError, Scope, TableDef, cleanup_order, table_def};
use clinicseed_report::TrackedResource;
use clinicseed_store::{Filter, Query, Store, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: u64,
    /// Tables with at least one failed delete.
    pub failed_tables: Vec<String>,
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, table: &str, outcome: Result<u64, StoreError>) {
        match outcome {
            Ok(count) => {
                self.deleted += count;
                if count > 0 {
                    debug!(event = "cleanup_table", table, deleted = count);
                }
            }
            Err(err) if err.is_missing_relation() => {
                debug!(event = "cleanup_table_missing", table, error = %err);
            }
            Err(err) => {
                warn!(event = "cleanup_table_failed", table, error = %err);
                if !self.failed_tables.iter().any(|failed| failed == table) {
                    self.failed_tables.push(table.to_string());
                }
                self.errors.push(format!("{table}: {err}"));
            }
        }
    }
}

/// Catalog tables children-first.
fn ordered_tables() -> Result<Vec<&'static TableDef>, GraphError> {
    Ok(cleanup_order(CATALOG)?
        .iter()
        .filter_map(|name| table_def(name))
        .collect())
}

/// Delete every tenant-owned row of `tenants`, skipping `preserve`.
///
/// Shared tables are never touched. Tables that do not exist in the target
/// store are ignored; any other failure is recorded and cleanup moves on.
pub async fn cleanup(
    store: &dyn Store,
    tenants: &[String],
    preserve: &BTreeSet<String>,
) -> Result<CleanupReport, GraphError> {
    let tables = ordered_tables()?;
    let mut report = CleanupReport::default();

    for tenant in tenants {
        info!(event = "cleanup_tenant", tenant = %tenant);
        for table in &tables {
            if preserve.contains(table.name) {
                continue;
            }
            let Scope::Entity { column, parent } = table.scope else {
                continue;
            };
            match parent_ids(store, parent, tenant).await {
                Ok(ids) if ids.is_empty() => {}
                Ok(ids) => {
                    let outcome = store.delete(table.name, &[Filter::In(column.to_string(), ids)]).await;
                    report.record(table.name, outcome);
                }
                Err(err) => report.record(table.name, Err(err)),
            }
        }

        for table in &tables {
            if preserve.contains(table.name) {
                continue;
            }
            let Scope::Tenant { column } = table.scope else {
                continue;
            };
            let outcome = store.delete(table.name, &[Filter::eq(column, tenant.as_str())]).await;
            report.record(table.name, outcome);
        }
    }

    info!(
        event = "cleanup_finished",
        deleted = report.deleted,
        failed_tables = report.failed_tables.len(),
    );
    Ok(report)
}

async fn parent_ids(store: &dyn Store, parent: &str, tenant: &str) -> Result<Vec<Value>, StoreError> {
    let column = match table_def(parent).map(|def| def.scope) {
        Some(Scope::Tenant { column }) => column,
        _ => clinicseed_core::TENANT_COLUMN,
    };
    let query = Query::new().eq(column, tenant).columns(&["id"]);
    Ok(store
        .select(parent, &query)
        .await?
        .into_iter()
        .filter_map(|row| row.get("id").cloned())
        .collect())
}

/// Delete exactly the rows a `test` mode run created.
pub async fn cleanup_tracked(
    store: &dyn Store,
    resources: &[TrackedResource],
) -> Result<CleanupReport, GraphError> {
    let mut by_table: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for resource in resources {
        by_table
            .entry(resource.table.as_str())
            .or_default()
            .push(Value::String(resource.id.clone()));
    }

    let mut report = CleanupReport::default();
    for table in ordered_tables()? {
        if let Some(ids) = by_table.remove(table.name) {
            let outcome = store.delete(table.name, &[Filter::In("id".into(), ids)]).await;
            report.record(table.name, outcome);
        }
    }
    // Tables outside the catalog have no known dependents.
    for (table, ids) in by_table {
        let outcome = store.delete(table, &[Filter::In("id".into(), ids)]).await;
        report.record(table, outcome);
    }
    info!(event = "cleanup_tracked_finished", deleted = report.deleted, resources = resources.len());
    Ok(report)
}
