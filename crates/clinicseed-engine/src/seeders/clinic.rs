//! Per-tenant clinic configuration: `02-clinic/<tenant>/` and the shared
//! templates under `02-templates/`. Message templates and time-off types
//! are copied into every tenant; consent templates are stored once with a
//! null tenant.

use serde_json::Value;

use clinicseed_core::{Record, TENANT_COLUMN};

use super::{FileSeeder, schemas, tenant_of};
use crate::seeder::Seeder;
use crate::variants::SeederOptions;

const SERVICE_COLUMNS: &[&str] = &[
    "name",
    "description",
    "category",
    "base_price",
    "duration_minutes",
    "is_active",
    "requires_appointment",
    "currency",
];

const PAYMENT_METHOD_COLUMNS: &[&str] =
    &["name", "type", "is_active", "processing_fee_percent", "notes"];

const KENNEL_COLUMNS: &[&str] = &[
    "code",
    "name",
    "kennel_type",
    "size",
    "daily_rate",
    "current_status",
    "notes",
];

fn clinic_file(tenant: &str, file: &str) -> String {
    format!("02-clinic/{tenant}/{file}")
}

pub fn services(options: &SeederOptions) -> Box<dyn Seeder> {
    let tenant = tenant_of(options);
    FileSeeder::new("services", clinic_file(&tenant, "services.json"), &["services"])
        .columns(SERVICE_COLUMNS)
        .for_tenant(tenant)
        .schema(schemas::service)
        .boxed()
}

pub fn payment_methods(options: &SeederOptions) -> Box<dyn Seeder> {
    let tenant = tenant_of(options);
    FileSeeder::new(
        "payment_methods",
        clinic_file(&tenant, "payment-methods.json"),
        &["payment_methods"],
    )
    .columns(PAYMENT_METHOD_COLUMNS)
    .for_tenant(tenant)
    .schema(schemas::named_tenant_row)
    .boxed()
}

pub fn kennels(options: &SeederOptions) -> Box<dyn Seeder> {
    let tenant = tenant_of(options);
    FileSeeder::new("kennels", clinic_file(&tenant, "kennels.json"), &["kennels"])
        .columns(KENNEL_COLUMNS)
        .for_tenant(tenant)
        .schema(schemas::kennel)
        .boxed()
}

pub fn message_templates(options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "message_templates",
        "02-templates/message-templates.json",
        &["message_templates"],
    )
    .for_tenant(tenant_of(options))
    .schema(schemas::named_tenant_row)
    .boxed()
}

pub fn time_off_types(options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "time_off_types",
        "02-templates/time-off-types.json",
        &["time_off_types"],
    )
    .for_tenant(tenant_of(options))
    .schema(schemas::named_tenant_row)
    .boxed()
}

pub fn consent_templates(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "consent_templates",
        "02-templates/consent-templates.json",
        &["consent_templates"],
    )
    .schema(schemas::consent_template)
    .shape(shared_template)
    .boxed()
}

fn shared_template(mut record: Record) -> Option<Record> {
    record.insert(TENANT_COLUMN.to_string(), Value::Null);
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunContext, SeedContext};
    use crate::fixtures::MemoryFixtures;
    use crate::testing::adris;
    use clinicseed_store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn templates_are_copied_into_each_tenant() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new().with(
            "02-templates/time-off-types.json",
            json!({"time_off_types": [{"name": "Vacaciones"}, {"name": "Enfermedad"}]}),
        );
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        for tenant in ["adris", "petlife"] {
            let options = SeederOptions {
                tenant: Some(tenant.into()),
                tenants: vec!["adris".into(), "petlife".into()],
            };
            let result = time_off_types(&options).seed(&mut ctx).await;
            assert_eq!(result.created, 2);
        }
        assert_eq!(store.count("time_off_types"), 4);
    }

    #[tokio::test]
    async fn consent_templates_are_shared_by_all_tenants() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new().with(
            "02-templates/consent-templates.json",
            json!({"consent_templates": [
                {"code": "SURGERY_GENERAL", "name": "Cirugía", "category": "surgery", "content": "Autorizo...", "tenant_id": "adris"},
                {"code": "EUTHANASIA", "name": "Eutanasia", "category": "euthanasia", "content": "Autorizo...", "requires_witness": true}
            ]}),
        );
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);
        let options = SeederOptions::global(&["adris".into(), "petlife".into()]);

        let first = consent_templates(&options).seed(&mut ctx).await;
        assert_eq!((first.created, first.errors), (2, 0), "{:?}", first.error_details);
        assert!(store.rows("consent_templates").iter().all(|row| row.get("tenant_id") == Some(&Value::Null)));

        let again = consent_templates(&options).seed(&mut ctx).await;
        assert_eq!((again.created, again.skipped), (0, 2));
    }

    #[tokio::test]
    async fn services_drop_unknown_columns() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new().with(
            "02-clinic/adris/services.json",
            json!({"services": [{
                "name": "Consulta general",
                "category": "consultation",
                "base_price": 80000,
                "internal_code": "C-01"
            }]}),
        );
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);
        let options = adris();

        let result = services(&options).seed(&mut ctx).await;
        assert_eq!(result.created, 1);
        let row = &store.rows("services")[0];
        assert!(row.get("internal_code").is_none());
        assert_eq!(row.get("duration_minutes"), Some(&json!(30)));
    }
}
