//! Invoices for completed appointments, with their line items and
//! payments.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Datelike;
use serde_json::{Value, json};

use clinicseed_core::{Record, str_field};
use clinicseed_report::SeederResult;

use super::generate::{current_max_sequence, document_number, number_field, round2};
use super::lookup::{id_key, id_of, index_by_id, tenant_rows};
use super::{bound, objects, schemas, to_record};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::seeder::{Seeder, TableSeeder, cascade};
use crate::variants::SeederOptions;

const TAX_RATE: f64 = 0.10;

pub fn invoices(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| InvoiceSeeder { tenant })
}

/// One paid invoice per completed appointment, numbered after the
/// tenant's highest existing invoice number.
pub struct InvoiceSeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for InvoiceSeeder {
    fn table(&self) -> &'static str {
        "invoices"
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::invoice())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        Ok(tenant_rows(ctx, "appointments", &self.tenant, "start_time")
            .await?
            .into_iter()
            .filter(|appointment| str_field(appointment, "status") == Some("completed"))
            .map(Value::Object)
            .collect())
    }

    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let pets = index_by_id(tenant_rows(ctx, "pets", &self.tenant, "name").await?);
        let services = index_by_id(tenant_rows(ctx, "services", &self.tenant, "name").await?);
        let year = ctx.run.reference_date.year();
        let mut sequence =
            current_max_sequence(ctx.store, "invoices", "invoice_number", &self.tenant, "INV", year)
                .await?;

        Ok(objects(raw)
            .map(|appointment| {
                let client = id_key(appointment.get("pet_id"))
                    .and_then(|pet| pets.get(&pet))
                    .and_then(|pet| pet.get("owner_id").cloned());
                let price = id_key(appointment.get("service_id"))
                    .and_then(|service| services.get(&service))
                    .and_then(|service| number_field(service, "base_price"))
                    .unwrap_or(0.0);
                let tax = round2(price * TAX_RATE);
                sequence += 1;

                let mut invoice = to_record(json!({
                    "tenant_id": self.tenant,
                    "appointment_id": id_of(&appointment),
                    "invoice_number": document_number("INV", year, sequence),
                    "subtotal": price,
                    "tax_amount": tax,
                    "total": round2(price + tax),
                    "status": "paid",
                    "issued_at": appointment.get("start_time").cloned().unwrap_or(Value::Null),
                }));
                if let Some(client) = client {
                    invoice.insert("client_id".into(), client);
                }
                Value::Object(invoice)
            })
            .collect())
    }

    async fn post_process(
        &self,
        ctx: &mut SeedContext<'_>,
        created: &[Record],
        result: &mut SeederResult,
    ) -> Result<(), SeedError> {
        let started = Instant::now();
        let appointments =
            index_by_id(tenant_rows(ctx, "appointments", &self.tenant, "start_time").await?);
        let services = index_by_id(tenant_rows(ctx, "services", &self.tenant, "name").await?);

        let items: Vec<Record> = created
            .iter()
            .map(|invoice| {
                let service = id_key(invoice.get("appointment_id"))
                    .and_then(|id| appointments.get(&id))
                    .and_then(|appointment| id_key(appointment.get("service_id")))
                    .and_then(|id| services.get(&id));
                let description = service
                    .and_then(|service| str_field(service, "name"))
                    .unwrap_or("Servicio veterinario");
                let price = number_field(invoice, "subtotal").unwrap_or(0.0);
                to_record(json!({
                    "tenant_id": self.tenant,
                    "invoice_id": id_of(invoice),
                    "service_id": service.map(id_of),
                    "description": description,
                    "quantity": 1,
                    "unit_price": price,
                    "total": price,
                }))
            })
            .collect();
        cascade(ctx, result, "invoice_items", Some(&self.tenant), items, started).await;

        let started = Instant::now();
        let method = tenant_rows(ctx, "payment_methods", &self.tenant, "name")
            .await?
            .first()
            .map(id_of);
        let year = ctx.run.reference_date.year();
        let mut sequence =
            current_max_sequence(ctx.store, "payments", "payment_number", &self.tenant, "PAY", year)
                .await?;
        let payments: Vec<Record> = created
            .iter()
            .map(|invoice| {
                sequence += 1;
                to_record(json!({
                    "tenant_id": self.tenant,
                    "invoice_id": id_of(invoice),
                    "payment_method_id": method,
                    "payment_number": document_number("PAY", year, sequence),
                    "amount": invoice.get("total").cloned().unwrap_or(Value::Null),
                    "paid_at": invoice.get("issued_at").cloned().unwrap_or(Value::Null),
                    "status": "completed",
                }))
            })
            .collect();
        cascade(ctx, result, "payments", Some(&self.tenant), payments, started).await;
        Ok(())
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
    async fn invoices_continue_numbering_and_cascade() {
        let store = MemoryStore::new().with_foreign_keys(CATALOG);
        store.preload("tenants", vec![row(json!({"id": "adris"}))]);
        store.preload("profiles", vec![row(json!({"id": "own-1", "tenant_id": "adris"}))]);
        store.preload("pets", vec![row(json!({"id": "pet-1", "tenant_id": "adris", "name": "Firulais", "owner_id": "own-1"}))]);
        store.preload("services", vec![row(json!({"id": "svc-1", "tenant_id": "adris", "name": "Consulta", "base_price": 80000}))]);
        store.preload("payment_methods", vec![row(json!({"id": "pm-1", "tenant_id": "adris", "name": "Efectivo"}))]);
        store.preload(
            "appointments",
            vec![
                row(json!({"id": "ap-1", "tenant_id": "adris", "pet_id": "pet-1", "service_id": "svc-1", "status": "completed", "start_time": "2026-02-01T09:00:00Z"})),
                row(json!({"id": "ap-2", "tenant_id": "adris", "pet_id": "pet-1", "service_id": "svc-1", "status": "confirmed", "start_time": "2026-03-20T09:00:00Z"})),
            ],
        );
        store.preload("invoices", vec![row(json!({"id": "inv-0", "tenant_id": "adris", "invoice_number": "INV-2026-000007"}))]);

        let fixtures = MemoryFixtures::new();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);
        let options = adris();

        let result = invoices(&options).seed(&mut ctx).await;
        assert_eq!((result.created, result.errors), (1, 0), "{:?}", result.error_details);
        let created = store
            .rows("invoices")
            .into_iter()
            .find(|invoice| invoice.get("appointment_id") == Some(&json!("ap-1")))
            .unwrap();
        assert_eq!(created.get("invoice_number"), Some(&json!("INV-2026-000008")));
        assert_eq!(created.get("client_id"), Some(&json!("own-1")));
        assert_eq!(created.get("total"), Some(&json!(88000.0)));

        let tables: Vec<_> = result.cascades.iter().map(|c| (c.table.as_str(), c.created)).collect();
        assert_eq!(tables, vec![("invoice_items", 1), ("payments", 1)]);
        assert_eq!(
            store.rows("invoice_items")[0].get("description"),
            Some(&json!("Consulta"))
        );
    }
}
