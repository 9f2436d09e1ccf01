use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};

use clinicseed_core::{Record, record_id, str_field};
use clinicseed_report::SeederResult;

use super::{objects, schemas, to_record};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::fixtures::load_records;
use crate::seeder::{Pipeline, Seeder, TableSeeder, cascade};
use crate::variants::SeederOptions;

/// Numbered documents every tenant needs a sequence for.
const DOCUMENT_TYPES: &[(&str, &str)] = &[
    ("invoice", "INV"),
    ("payment", "PAY"),
    ("lab_order", "LAB"),
    ("store_order", "ORD"),
    ("hospitalization", "HOSP"),
];

/// Tenants of the run, from `00-core/tenants.json`.
pub struct TenantSeeder {
    tenants: Vec<String>,
}

pub fn tenants(options: &SeederOptions) -> Box<dyn Seeder> {
    Pipeline::boxed(TenantSeeder {
        tenants: options.tenants.clone(),
    })
}

#[async_trait]
impl TableSeeder for TenantSeeder {
    fn table(&self) -> &'static str {
        "tenants"
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::tenant())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        Ok(load_records(ctx.fixtures, "00-core/tenants.json", &["tenants"])?)
    }

    async fn pre_process(
        &self,
        _ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        Ok(objects(raw)
            .filter(|tenant| {
                str_field(tenant, "id").is_some_and(|id| self.tenants.iter().any(|t| t == id))
            })
            .map(Value::Object)
            .collect())
    }

    async fn post_process(
        &self,
        ctx: &mut SeedContext<'_>,
        created: &[Record],
        result: &mut SeederResult,
    ) -> Result<(), SeedError> {
        let started = Instant::now();
        let sequences: Vec<Record> = created
            .iter()
            .filter_map(record_id)
            .flat_map(|tenant| {
                DOCUMENT_TYPES.iter().map(move |(document_type, prefix)| {
                    to_record(json!({
                        "tenant_id": tenant,
                        "document_type": document_type,
                        "prefix": prefix,
                        "current_sequence": 0,
                    }))
                })
            })
            .collect();

        cascade(ctx, result, "document_sequences", None, sequences, started).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::fixtures::MemoryFixtures;
    use clinicseed_store::MemoryStore;

    #[tokio::test]
    async fn only_run_tenants_are_seeded_with_their_sequences() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new().with(
            "00-core/tenants.json",
            json!({"tenants": [
                {"id": "adris", "name": "Veterinaria Adris"},
                {"id": "petlife", "name": "PetLife"},
            ]}),
        );
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);
        let options = SeederOptions {
            tenant: None,
            tenants: vec!["adris".into()],
        };

        let result = tenants(&options).seed(&mut ctx).await;
        assert_eq!(result.created, 1);
        assert_eq!(result.cascades.len(), 1);
        assert_eq!(result.cascades[0].created, DOCUMENT_TYPES.len() as u64);
        assert_eq!(store.count("document_sequences"), DOCUMENT_TYPES.len());

        let again = tenants(&options).seed(&mut ctx).await;
        assert_eq!((again.created, again.skipped), (0, 1));
        assert!(again.cascades.is_empty());
    }
}
