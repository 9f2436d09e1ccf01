//! Cached reads of rows that earlier seeders created.

use std::collections::BTreeMap;

use serde_json::Value;

use clinicseed_core::{Record, record_id, str_field};
use clinicseed_store::{Direction, Query};

use crate::context::SeedContext;
use crate::errors::SeedError;

/// Rows of `table` belonging to `tenant`, ordered by `order`.
///
/// Ordering keeps generated data stable between runs: generators walk these
/// rows in sequence and draw from one random stream.
pub async fn tenant_rows(
    ctx: &mut SeedContext<'_>,
    table: &str,
    tenant: &str,
    order: &str,
) -> Result<Vec<Record>, SeedError> {
    let query = Query::new()
        .eq("tenant_id", tenant)
        .order_by(order, Direction::Asc);
    let name = format!("tenant={tenant}:order={order}");
    Ok(ctx.cache.rows(ctx.store, table, &name, query).await?)
}

/// Profiles of the tenant with one of `roles`, ordered by email.
pub async fn profiles_with_role(
    ctx: &mut SeedContext<'_>,
    tenant: &str,
    roles: &[&str],
) -> Result<Vec<Record>, SeedError> {
    Ok(tenant_rows(ctx, "profiles", tenant, "email")
        .await?
        .into_iter()
        .filter(|profile| str_field(profile, "role").is_some_and(|role| roles.contains(&role)))
        .collect())
}

/// Id of the tenant's first veterinarian.
pub async fn first_vet(ctx: &mut SeedContext<'_>, tenant: &str) -> Result<Option<Value>, SeedError> {
    Ok(profiles_with_role(ctx, tenant, &["vet"])
        .await?
        .first()
        .and_then(|vet| vet.get("id").cloned()))
}

pub fn id_of(record: &Record) -> Value {
    record.get("id").cloned().unwrap_or(Value::Null)
}

/// Rows keyed by their id.
pub fn index_by_id(rows: Vec<Record>) -> BTreeMap<String, Record> {
    rows.into_iter()
        .filter_map(|row| Some((record_id(&row)?, row)))
        .collect()
}

/// Id-like value as a map key.
pub fn id_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
