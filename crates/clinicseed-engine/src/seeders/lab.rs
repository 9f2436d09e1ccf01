//! Laboratory orders with their tests and, once completed, results.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{Datelike, Duration};
use rand::Rng;
use serde_json::{Value, json};
use tracing::debug;

use clinicseed_core::{Record, str_field};
use clinicseed_report::SeederResult;
use clinicseed_store::{Direction, Filter, Query};

use super::generate::{at, current_max_sequence, document_number, pick, rng_for, timestamp};
use super::lookup::{first_vet, id_of, tenant_rows};
use super::{bound, schemas, to_record};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::seeder::{Seeder, TableSeeder, cascade};
use crate::variants::SeederOptions;

const PETS_WITH_LAB_ORDERS: usize = 6;
const PANEL_CODES: &[&str] = &["CBC", "CHEM10", "UA", "HW", "FECAL"];
const STATUSES: &[&str] = &["completed", "completed", "completed", "in_progress", "pending"];

pub fn lab_orders(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| LabOrderSeeder { tenant })
}

pub struct LabOrderSeeder {
    tenant: String,
}

impl LabOrderSeeder {
    async fn panel(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Record>, SeedError> {
        let codes = PANEL_CODES.iter().map(|code| json!(code)).collect();
        let query = Query::new()
            .filter(Filter::In("code".into(), codes))
            .order_by("code", Direction::Asc);
        Ok(ctx.cache.rows(ctx.store, "lab_test_catalog", "panel", query).await?)
    }

    async fn seed_items(
        &self,
        ctx: &mut SeedContext<'_>,
        orders: &[Record],
        result: &mut SeederResult,
    ) -> Result<Vec<Record>, SeedError> {
        let started = Instant::now();
        let tests = self.panel(ctx).await?;
        if tests.is_empty() {
            return Ok(Vec::new());
        }
        let items: Vec<Record> = orders
            .iter()
            .map(|order| {
                let number = str_field(order, "order_number").unwrap_or_default();
                let mut rng = rng_for(&self.tenant, &format!("lab_order_items/{number}"));
                let test = pick(&mut rng, &tests);
                to_record(json!({
                    "tenant_id": self.tenant,
                    "lab_order_id": id_of(order),
                    "test_id": id_of(test),
                    "status": order.get("status").cloned().unwrap_or(Value::Null),
                    "price": 45_000 + rng.random_range(0..40) * 1_000,
                }))
            })
            .collect();
        Ok(cascade(ctx, result, "lab_order_items", Some(&self.tenant), items, started).await)
    }

    async fn seed_results(
        &self,
        ctx: &mut SeedContext<'_>,
        items: &[Record],
        result: &mut SeederResult,
    ) -> Result<(), SeedError> {
        let started = Instant::now();
        let vet = first_vet(ctx, &self.tenant).await?;
        let results: Vec<Record> = items
            .iter()
            .filter(|item| str_field(item, "status") == Some("completed"))
            .map(|item| {
                let key = item.get("lab_order_id").map(Value::to_string).unwrap_or_default();
                let mut rng = rng_for(&self.tenant, &format!("lab_results/{key}"));
                let abnormal = rng.random_bool(0.3);
                let value = if abnormal { 10.5 } else { 14.2 };
                to_record(json!({
                    "tenant_id": self.tenant,
                    "lab_order_id": item.get("lab_order_id").cloned().unwrap_or(Value::Null),
                    "lab_order_item_id": id_of(item),
                    "value": value.to_string(),
                    "numeric_value": value,
                    "unit": "g/dL",
                    "reference_min": 12.0,
                    "reference_max": 18.0,
                    "flag": if abnormal { "low" } else { "normal" },
                    "is_abnormal": abnormal,
                    "entered_by": vet,
                }))
            })
            .collect();
        cascade(ctx, result, "lab_results", Some(&self.tenant), results, started).await;
        Ok(())
    }
}

#[async_trait]
impl TableSeeder for LabOrderSeeder {
    fn table(&self) -> &'static str {
        "lab_orders"
    }

    fn owner_column(&self) -> Option<&'static str> {
        Some("pet_id")
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::lab_order())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let Some(vet) = first_vet(ctx, &self.tenant).await? else {
            debug!(event = "prerequisite_missing", table = "lab_orders", tenant = %self.tenant, missing = "vet");
            return Ok(Vec::new());
        };
        if self.panel(ctx).await?.is_empty() {
            debug!(event = "prerequisite_missing", table = "lab_orders", tenant = %self.tenant, missing = "lab_test_catalog");
            return Ok(Vec::new());
        }

        let pets = tenant_rows(ctx, "pets", &self.tenant, "name").await?;
        let mut rng = rng_for(&self.tenant, "lab_orders");
        Ok(pets
            .iter()
            .take(PETS_WITH_LAB_ORDERS)
            .enumerate()
            .map(|(index, pet)| {
                let ordered = at(ctx.run, -(5 + 9 * index as i64), 8, 15);
                let status = *pick(&mut rng, STATUSES);
                let priority = match rng.random_range(0..10) {
                    0..=1 => "stat",
                    2..=4 => "urgent",
                    _ => "routine",
                };
                let collected = (status != "pending").then(|| timestamp(ordered + Duration::hours(1)));
                let completed = (status == "completed").then(|| timestamp(ordered + Duration::days(1)));
                json!({
                    "tenant_id": self.tenant,
                    "pet_id": id_of(pet),
                    "ordered_by": vet,
                    "ordered_at": timestamp(ordered),
                    "status": status,
                    "priority": priority,
                    "lab_type": "in_house",
                    "collected_at": collected,
                    "completed_at": completed,
                    "clinical_notes": format!("Análisis para {}", str_field(pet, "name").unwrap_or_default()),
                })
            })
            .collect())
    }

    /// Order numbers continue from the tenant's highest existing one.
    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let year = ctx.run.reference_date.year();
        let mut sequence =
            current_max_sequence(ctx.store, "lab_orders", "order_number", &self.tenant, "LAB", year)
                .await?;
        Ok(raw
            .into_iter()
            .map(|mut order| {
                sequence += 1;
                if let Value::Object(record) = &mut order {
                    record.insert("order_number".into(), json!(document_number("LAB", year, sequence)));
                }
                order
            })
            .collect())
    }

    async fn post_process(
        &self,
        ctx: &mut SeedContext<'_>,
        created: &[Record],
        result: &mut SeederResult,
    ) -> Result<(), SeedError> {
        let items = self.seed_items(ctx, created, result).await?;
        self.seed_results(ctx, &items, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::MemoryFixtures;
    use crate::testing::{adris, row, run};
    use clinicseed_core::CATALOG;
    use clinicseed_store::MemoryStore;

    #[tokio::test]
    async fn orders_cascade_items_and_results_once() {
        let store = MemoryStore::new().with_foreign_keys(CATALOG);
        store.preload("tenants", vec![row(json!({"id": "adris"}))]);
        store.preload("profiles", vec![row(json!({"id": "vet-1", "tenant_id": "adris", "email": "vet@adris.com.py", "role": "vet"}))]);
        store.preload(
            "pets",
            (1..=3)
                .map(|i| row(json!({"id": format!("pet-{i}"), "tenant_id": "adris", "name": format!("Pet {i}")})))
                .collect(),
        );
        store.preload(
            "lab_test_catalog",
            vec![
                row(json!({"id": "t-cbc", "code": "CBC", "name": "Hemograma"})),
                row(json!({"id": "t-ua", "code": "UA", "name": "Urianálisis"})),
            ],
        );
        let fixtures = MemoryFixtures::new();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);
        let options = adris();

        let result = lab_orders(&options).seed(&mut ctx).await;
        assert_eq!((result.created, result.errors), (3, 0), "{:?}", result.error_details);
        assert_eq!(result.cascades[0].table, "lab_order_items");
        assert_eq!(result.cascades[0].created, 3);
        let completed = store
            .rows("lab_orders")
            .iter()
            .filter(|order| order.get("status") == Some(&json!("completed")))
            .count() as u64;
        assert_eq!(result.cascades[1].created, completed);

        let mut numbers: Vec<_> = store
            .rows("lab_orders")
            .iter()
            .map(|order| str_field(order, "order_number").unwrap().to_string())
            .collect();
        numbers.sort();
        assert_eq!(numbers, vec!["LAB-2026-000001", "LAB-2026-000002", "LAB-2026-000003"]);

        let again = lab_orders(&options).seed(&mut ctx).await;
        assert_eq!((again.created, again.skipped), (0, 3));
        assert_eq!(store.count("lab_order_items"), 3);
    }
}
