//! Concrete seeders, one per logical table.
//!
//! Most tables come straight from a fixture document and only need light
//! reshaping; those are expressed as a [`FileSeeder`]. Tables that resolve
//! foreign keys, fan out, number documents or generate rows have their own
//! [`TableSeeder`] implementations.

use async_trait::async_trait;
use serde_json::Value;

use clinicseed_core::{Record, TENANT_COLUMN, project};

use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::fixtures::load_records;
use crate::seeder::{Pipeline, Seeder, TableSeeder};
use crate::variants::SeederOptions;

pub mod clinic;
pub mod clinical;
pub mod commerce;
pub mod finance;
pub mod generate;
pub mod hospital;
pub mod lab;
pub mod lookup;
pub mod people;
pub mod reference;
pub mod schemas;
pub mod store;
pub mod tenants;

/// Per-record reshaping applied before whitelisting. `None` drops the record.
pub type Shape = fn(Record) -> Option<Record>;

/// A table loaded from one fixture document.
#[derive(Debug, Clone)]
pub struct FileSeeder {
    table: &'static str,
    path: String,
    keys: &'static [&'static str],
    tenant: Option<String>,
    columns: Option<&'static [&'static str]>,
    schema: Option<fn() -> Value>,
    shape: Option<Shape>,
}

impl FileSeeder {
    pub fn new(table: &'static str, path: impl Into<String>, keys: &'static [&'static str]) -> Self {
        Self {
            table,
            path: path.into(),
            keys,
            tenant: None,
            columns: None,
            schema: None,
            shape: None,
        }
    }

    /// Stamp every record with `tenant_id`.
    pub fn for_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Keep only these columns.
    pub fn columns(mut self, columns: &'static [&'static str]) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn schema(mut self, schema: fn() -> Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn boxed(self) -> Box<dyn Seeder> {
        Pipeline::boxed(self)
    }

    fn reshape(&self, record: Record) -> Option<Record> {
        let record = match self.shape {
            Some(shape) => shape(record)?,
            None => record,
        };
        let mut record = match self.columns {
            Some(columns) => project(&record, columns),
            None => record,
        };
        if let Some(tenant) = &self.tenant {
            record.insert(TENANT_COLUMN.to_string(), Value::String(tenant.clone()));
        }
        Some(record)
    }
}

#[async_trait]
impl TableSeeder for FileSeeder {
    fn table(&self) -> &'static str {
        self.table
    }

    fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    fn schema(&self) -> Option<Value> {
        self.schema.map(|schema| schema())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        Ok(load_records(ctx.fixtures, &self.path, self.keys)?)
    }

    async fn pre_process(
        &self,
        _ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        // Non-objects pass through untouched so validation reports them.
        Ok(raw
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(record) => self.reshape(record).map(Value::Object),
                other => Some(other),
            })
            .collect())
    }
}

/// Tenant a per-tenant factory is bound to.
pub(crate) fn tenant_of(options: &SeederOptions) -> String {
    options.tenant.clone().unwrap_or_default()
}

/// Box a seeder that carries nothing but its tenant.
pub(crate) fn bound<T: TableSeeder + 'static>(
    options: &SeederOptions,
    build: fn(String) -> T,
) -> Box<dyn Seeder> {
    Pipeline::boxed(build(tenant_of(options)))
}

/// Move `from` to `to` when present and `to` is not already set.
pub(crate) fn rename(record: &mut Record, from: &str, to: &str) {
    if let Some(value) = record.remove(from) {
        record.entry(to.to_string()).or_insert(value);
    }
}

/// Object literal as a record; anything else becomes an empty record.
pub(crate) fn to_record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        _ => Record::new(),
    }
}

/// Objects only; anything else is dropped.
pub(crate) fn objects(raw: Vec<Value>) -> impl Iterator<Item = Record> {
    raw.into_iter().filter_map(|value| match value {
        Value::Object(record) => Some(record),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::fixtures::MemoryFixtures;
    use clinicseed_store::MemoryStore;
    use serde_json::json;

    fn drop_inactive(record: Record) -> Option<Record> {
        (record.get("active") != Some(&json!(false))).then_some(record)
    }

    #[tokio::test]
    async fn file_seeder_shapes_whitelists_and_stamps() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new().with(
            "02-clinic/adris/payment-methods.json",
            json!({"payment_methods": [
                {"name": "Efectivo", "active": true, "icon": "cash"},
                {"name": "Cheque", "active": false},
            ]}),
        );
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let seeder = FileSeeder::new(
            "payment_methods",
            "02-clinic/adris/payment-methods.json",
            &["payment_methods"],
        )
        .for_tenant("adris")
        .columns(&["name"])
        .shape(drop_inactive)
        .schema(schemas::named_tenant_row);

        let result = Pipeline(seeder).seed(&mut ctx).await;
        assert_eq!(result.created, 1);
        let rows = store.rows("payment_methods");
        assert_eq!(rows[0].get("tenant_id"), Some(&json!("adris")));
        assert_eq!(rows[0].get("icon"), None);
    }

    #[tokio::test]
    async fn missing_document_is_zero_records() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new();
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let result = FileSeeder::new("kennels", "02-clinic/ghost/kennels.json", &["kennels"])
            .for_tenant("ghost")
            .boxed()
            .seed(&mut ctx)
            .await;
        assert_eq!((result.created, result.skipped, result.errors), (0, 0, 0));
        assert!(result.is_success());
    }

    #[test]
    fn rename_keeps_existing_targets() {
        let mut record = json!({"ruc": "80012345-6", "tax_id": "kept"})
            .as_object()
            .cloned()
            .unwrap();
        rename(&mut record, "ruc", "tax_id");
        assert_eq!(record.get("tax_id"), Some(&json!("kept")));
        assert!(!record.contains_key("ruc"));
    }
}
