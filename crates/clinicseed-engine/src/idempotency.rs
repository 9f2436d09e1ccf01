//! Insert-if-absent keyed on a logical identity.
//!
//! Each table declares which columns identify a row independently of its
//! storage id. Before inserting, the store is queried for a row with the
//! same logical key; a match is skipped. The check and the insert are two
//! separate round trips, so two concurrent runs can both miss and both
//! insert. Storage-level unique constraints turn that race into a per-record
//! error instead of a duplicate.

use serde_json::Value;
use tracing::debug;

use clinicseed_core::Record;
use clinicseed_store::{Filter, Query, Store, StoreResult};

/// One component of a logical key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyField {
    /// The column is absent: the key cannot be known.
    Undefined,
    /// The column is present and null; matched with "is null".
    Null,
    /// Compared with exact equality.
    Exact(Value),
    /// Compared ignoring case; holds the trimmed, lowercased text.
    Folded(String),
}

pub type LogicalKey = Vec<(String, KeyField)>;

/// Logical identity of a table's rows.
#[derive(Debug, Clone, Copy)]
pub struct UniqueKeyPolicy {
    pub columns: &'static [&'static str],
    pub extract_key: Option<fn(&Record) -> LogicalKey>,
}

impl UniqueKeyPolicy {
    pub const fn on(columns: &'static [&'static str]) -> Self {
        Self {
            columns,
            extract_key: None,
        }
    }

    pub const fn with_extractor(
        columns: &'static [&'static str],
        extract_key: fn(&Record) -> LogicalKey,
    ) -> Self {
        Self {
            columns,
            extract_key: Some(extract_key),
        }
    }

    pub fn key(&self, record: &Record) -> LogicalKey {
        match self.extract_key {
            Some(extract) => extract(record),
            None => project_key(self.columns, record),
        }
    }
}

/// Key built from the listed columns as they are.
pub fn project_key(columns: &[&str], record: &Record) -> LogicalKey {
    columns
        .iter()
        .map(|column| (column.to_string(), exact_field(record.get(*column))))
        .collect()
}

fn exact_field(value: Option<&Value>) -> KeyField {
    match value {
        None => KeyField::Undefined,
        Some(Value::Null) => KeyField::Null,
        Some(value) => KeyField::Exact(value.clone()),
    }
}

fn folded_field(value: Option<&Value>) -> KeyField {
    match value {
        Some(Value::String(text)) => KeyField::Folded(text.trim().to_lowercase()),
        other => exact_field(other),
    }
}

/// `tenant_id` exact, `email` case-insensitive.
fn tenant_email_key(record: &Record) -> LogicalKey {
    vec![
        ("tenant_id".to_string(), exact_field(record.get("tenant_id"))),
        ("email".to_string(), folded_field(record.get("email"))),
    ]
}

/// Static unique-key policy of a table, if it has one.
pub fn policy_for(table: &str) -> Option<UniqueKeyPolicy> {
    let policy = match table {
        "tenants" => UniqueKeyPolicy::on(&["id"]),
        "document_sequences" => UniqueKeyPolicy::on(&["tenant_id", "document_type"]),
        "diagnosis_codes" | "lab_test_catalog" | "consent_templates" => {
            UniqueKeyPolicy::on(&["code"])
        }
        "drug_dosages" => UniqueKeyPolicy::on(&["name", "species"]),
        "growth_standards" => UniqueKeyPolicy::on(&[
            "species",
            "breed_category",
            "gender",
            "age_weeks",
            "percentile",
        ]),
        "vaccine_protocols" => UniqueKeyPolicy::on(&["vaccine_code", "species"]),
        "insurance_providers" | "suppliers" => UniqueKeyPolicy::on(&["name"]),
        "store_brands" | "store_categories" => UniqueKeyPolicy::on(&["slug"]),
        "store_products" => UniqueKeyPolicy::on(&["sku"]),
        "services" | "payment_methods" | "message_templates" | "time_off_types" => {
            UniqueKeyPolicy::on(&["tenant_id", "name"])
        }
        "kennels" => UniqueKeyPolicy::on(&["tenant_id", "code"]),
        "store_inventory" => UniqueKeyPolicy::on(&["tenant_id", "product_id"]),
        "profiles" => UniqueKeyPolicy::with_extractor(&["tenant_id", "email"], tenant_email_key),
        "staff_profiles" => UniqueKeyPolicy::on(&["tenant_id", "profile_id"]),
        "pets" => UniqueKeyPolicy::on(&["tenant_id", "owner_id", "name"]),
        "weight_records" => UniqueKeyPolicy::on(&["pet_id", "recorded_at"]),
        "appointments" => UniqueKeyPolicy::on(&["tenant_id", "pet_id", "start_time"]),
        "medical_records" => UniqueKeyPolicy::on(&["tenant_id", "appointment_id"]),
        "vaccines" => UniqueKeyPolicy::on(&["pet_id", "vaccine_code", "administered_date"]),
        "invoices" => UniqueKeyPolicy::on(&["tenant_id", "appointment_id"]),
        "invoice_items" => UniqueKeyPolicy::on(&["invoice_id", "description"]),
        "payments" => UniqueKeyPolicy::on(&["tenant_id", "invoice_id"]),
        "prescriptions" => UniqueKeyPolicy::on(&["tenant_id", "pet_id", "prescribed_date"]),
        "lab_orders" => UniqueKeyPolicy::on(&["tenant_id", "pet_id", "ordered_at"]),
        "lab_order_items" => UniqueKeyPolicy::on(&["lab_order_id", "test_id"]),
        "lab_results" => UniqueKeyPolicy::on(&["lab_order_item_id"]),
        "hospitalizations" => UniqueKeyPolicy::on(&["tenant_id", "pet_id", "admitted_at"]),
        "hospitalization_vitals" => UniqueKeyPolicy::on(&["hospitalization_id", "recorded_at"]),
        "store_orders" => UniqueKeyPolicy::on(&["tenant_id", "customer_id", "placed_at"]),
        "store_order_items" => UniqueKeyPolicy::on(&["order_id", "product_id"]),
        "loyalty_points" => UniqueKeyPolicy::on(&["tenant_id", "user_id"]),
        "loyalty_transactions" => UniqueKeyPolicy::on(&["tenant_id", "user_id", "description"]),
        _ => return None,
    };
    Some(policy)
}

/// Equality lookup for a key, or `None` when any field is undefined.
pub fn key_filters(key: &LogicalKey) -> Option<Vec<Filter>> {
    key.iter()
        .map(|(column, field)| match field {
            KeyField::Undefined => None,
            KeyField::Null => Some(Filter::IsNull(column.clone())),
            KeyField::Exact(value) => Some(Filter::Eq(column.clone(), value.clone())),
            KeyField::Folded(text) => Some(Filter::EqIgnoreCase(column.clone(), text.clone())),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExistsResult {
    pub exists: bool,
    pub existing_id: Option<Value>,
}

/// Whether a row with the record's logical key is already stored.
///
/// An incomplete key never matches.
pub async fn exists(
    store: &dyn Store,
    table: &str,
    record: &Record,
    policy: &UniqueKeyPolicy,
) -> StoreResult<ExistsResult> {
    let Some(filters) = key_filters(&policy.key(record)) else {
        return Ok(ExistsResult::default());
    };
    let query = Query::new().filters(filters).columns(&["id"]).limit(1);
    let rows = store.select(table, &query).await?;
    Ok(match rows.first() {
        Some(row) => ExistsResult {
            exists: true,
            existing_id: row.get("id").cloned(),
        },
        None => ExistsResult::default(),
    })
}

/// Outcome of an idempotent insert batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    pub created: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Rows as stored, in input order.
    pub created_records: Vec<Record>,
    /// Ids of the rows that matched skipped candidates.
    pub existing_ids: Vec<Value>,
    pub error_details: Vec<String>,
}

impl UpsertOutcome {
    fn merge(&mut self, other: UpsertOutcome) {
        self.created += other.created;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.created_records.extend(other.created_records);
        self.existing_ids.extend(other.existing_ids);
        self.error_details.extend(other.error_details);
    }
}

/// Insert every record whose logical key is not yet stored.
///
/// Failures are collected per record; the batch always runs to the end.
/// Without a policy every record is inserted.
pub async fn upsert(
    store: &dyn Store,
    table: &str,
    records: Vec<Record>,
    policy: Option<&UniqueKeyPolicy>,
) -> UpsertOutcome {
    upsert_from(store, table, records, policy, 0).await
}

async fn upsert_from(
    store: &dyn Store,
    table: &str,
    records: Vec<Record>,
    policy: Option<&UniqueKeyPolicy>,
    offset: usize,
) -> UpsertOutcome {
    let mut outcome = UpsertOutcome::default();

    for (index, record) in records.into_iter().enumerate() {
        let index = offset + index;
        if let Some(policy) = policy {
            match exists(store, table, &record, policy).await {
                Ok(found) if found.exists => {
                    outcome.skipped += 1;
                    if let Some(id) = found.existing_id {
                        outcome.existing_ids.push(id);
                    }
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    outcome.errors += 1;
                    outcome.error_details.push(format!("record {index}: lookup failed: {err}"));
                    continue;
                }
            }
        }

        match store.insert(table, &record).await {
            Ok(stored) => {
                outcome.created += 1;
                outcome.created_records.push(stored);
            }
            Err(err) => {
                outcome.errors += 1;
                outcome.error_details.push(format!("record {index}: {err}"));
            }
        }
    }

    outcome
}

/// [`upsert`] in fixed-size chunks, logging progress per chunk.
pub async fn upsert_batched(
    store: &dyn Store,
    table: &str,
    records: Vec<Record>,
    policy: Option<&UniqueKeyPolicy>,
    batch_size: usize,
) -> UpsertOutcome {
    let batch_size = batch_size.max(1);
    let total = records.len();
    let mut outcome = UpsertOutcome::default();
    let mut remaining = records.into_iter().peekable();
    let mut offset = 0;
    let mut batch = 0;

    while remaining.peek().is_some() {
        let chunk: Vec<Record> = remaining.by_ref().take(batch_size).collect();
        let size = chunk.len();
        batch += 1;
        let chunk_outcome = upsert_from(store, table, chunk, policy, offset).await;
        debug!(
            event = "upsert_batch",
            table,
            batch,
            size,
            created = chunk_outcome.created,
            skipped = chunk_outcome.skipped,
            errors = chunk_outcome.errors,
            progress = offset + size,
            total,
        );
        outcome.merge(chunk_outcome);
        offset += size;
    }

    outcome
}
