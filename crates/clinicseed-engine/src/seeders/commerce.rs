//! Store orders placed by pet owners, and loyalty balances.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Datelike, Duration};
use rand::Rng;
use serde_json::{Value, json};
use tracing::debug;

use clinicseed_core::{Record, str_field};
use clinicseed_report::SeederResult;
use clinicseed_store::{Direction, Filter, Query};

use super::generate::{
    at, current_max_sequence, document_number, number_field, pick, rng_for, round2, timestamp,
};
use super::lookup::{id_key, id_of, profiles_with_role};
use super::{bound, objects, schemas, to_record};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::seeder::{Seeder, TableSeeder, cascade};
use crate::variants::SeederOptions;

const CUSTOMERS_WITH_ORDERS: usize = 4;
const ORDERS_PER_CUSTOMER: usize = 2;
const MAX_LINES: usize = 3;
const SHIPPING: f64 = 15_000.0;
const ORDER_STATUSES: &[&str] = &["delivered", "delivered", "shipped", "confirmed", "pending"];

pub fn store_orders(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| StoreOrderSeeder { tenant })
}

pub fn loyalty_points(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| LoyaltySeeder { tenant })
}

pub struct StoreOrderSeeder {
    tenant: String,
}

impl StoreOrderSeeder {
    /// Active products, shared by every tenant of the run.
    async fn products(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Record>, SeedError> {
        let query = Query::new()
            .filter(Filter::eq("is_active", true))
            .order_by("sku", Direction::Asc)
            .limit(50);
        Ok(ctx.cache.rows(ctx.store, "store_products", "active", query).await?)
    }

    /// Lines of one order, drawn from the order's own random stream.
    fn lines(&self, placed_at: &str, products: &[Record]) -> Vec<(Record, u32)> {
        let mut rng = rng_for(&self.tenant, &format!("store_orders/{placed_at}"));
        let count = rng.random_range(1..=MAX_LINES.min(products.len()));
        let mut lines: Vec<(Record, u32)> = Vec::with_capacity(count);
        while lines.len() < count {
            let product = pick(&mut rng, products);
            if lines.iter().any(|(chosen, _)| chosen.get("id") == product.get("id")) {
                continue;
            }
            lines.push((product.clone(), rng.random_range(1..=3)));
        }
        lines
    }
}

fn line_total(product: &Record, quantity: u32) -> f64 {
    round2(number_field(product, "base_price").unwrap_or(0.0) * f64::from(quantity))
}

#[async_trait]
impl TableSeeder for StoreOrderSeeder {
    fn table(&self) -> &'static str {
        "store_orders"
    }

    fn owner_column(&self) -> Option<&'static str> {
        Some("customer_id")
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::store_order())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let products = self.products(ctx).await?;
        if products.is_empty() {
            debug!(event = "prerequisite_missing", table = "store_orders", tenant = %self.tenant, missing = "store_products");
            return Ok(Vec::new());
        }
        let customers = profiles_with_role(ctx, &self.tenant, &["owner"]).await?;

        let mut orders = Vec::new();
        for (index, customer) in customers.iter().take(CUSTOMERS_WITH_ORDERS).enumerate() {
            for round in 0..ORDERS_PER_CUSTOMER {
                let days_ago = 3 + 11 * round as i64 + 2 * index as i64;
                let placed = at(ctx.run, -days_ago, 10 + index as u32, 15);
                let placed_at = timestamp(placed);
                let subtotal: f64 = self
                    .lines(&placed_at, &products)
                    .iter()
                    .map(|(product, quantity)| line_total(product, *quantity))
                    .sum();
                let status = ORDER_STATUSES[(index + round) % ORDER_STATUSES.len()];
                orders.push(json!({
                    "tenant_id": self.tenant,
                    "customer_id": id_of(customer),
                    "placed_at": placed_at,
                    "status": status,
                    "subtotal": round2(subtotal),
                    "shipping_cost": SHIPPING,
                    "total": round2(subtotal + SHIPPING),
                    "payment_method": "cash",
                    "delivered_at": (status == "delivered").then(|| timestamp(placed + Duration::days(2))),
                }));
            }
        }
        Ok(orders)
    }

    /// Order numbers continue from the tenant's highest existing one.
    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let year = ctx.run.reference_date.year();
        let mut sequence =
            current_max_sequence(ctx.store, "store_orders", "order_number", &self.tenant, "ORD", year)
                .await?;
        Ok(objects(raw)
            .map(|mut order| {
                sequence += 1;
                order.insert("order_number".into(), json!(document_number("ORD", year, sequence)));
                Value::Object(order)
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
        let products = self.products(ctx).await?;
        let items: Vec<Record> = created
            .iter()
            .flat_map(|order| {
                let placed_at = str_field(order, "placed_at").unwrap_or_default();
                self.lines(placed_at, &products)
                    .into_iter()
                    .map(|(product, quantity)| {
                        to_record(json!({
                            "tenant_id": self.tenant,
                            "order_id": id_of(order),
                            "product_id": id_of(&product),
                            "quantity": quantity,
                            "unit_price": number_field(&product, "base_price").unwrap_or(0.0),
                            "total": line_total(&product, quantity),
                        }))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        cascade(ctx, result, "store_order_items", Some(&self.tenant), items, started).await;
        Ok(())
    }
}

/// Spending profile of a loyalty member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    Vip,
    New,
    Budget,
    Loyal,
    Standard,
}

impl Persona {
    pub const ROTATION: [Persona; 5] = [
        Persona::Vip,
        Persona::New,
        Persona::Budget,
        Persona::Loyal,
        Persona::Standard,
    ];

    /// Points earned per purchase and number of purchases.
    fn earnings(self) -> (i64, usize) {
        match self {
            Persona::Vip => (800, 6),
            Persona::New => (50, 1),
            Persona::Budget => (60, 3),
            Persona::Loyal => (300, 8),
            Persona::Standard => (150, 4),
        }
    }

    /// Share of earned points already redeemed, in percent.
    fn redeemed_percent(self) -> i64 {
        match self {
            Persona::Vip => 40,
            Persona::Loyal => 25,
            Persona::Standard => 20,
            Persona::New | Persona::Budget => 0,
        }
    }
}

pub fn tier_for(lifetime_earned: i64) -> &'static str {
    match lifetime_earned {
        4_000.. => "platinum",
        2_000.. => "gold",
        500.. => "silver",
        _ => "bronze",
    }
}

pub struct LoyaltySeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for LoyaltySeeder {
    fn table(&self) -> &'static str {
        "loyalty_points"
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::loyalty_points())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let owners = profiles_with_role(ctx, &self.tenant, &["owner"]).await?;
        Ok(owners
            .iter()
            .zip(Persona::ROTATION)
            .map(|(owner, persona)| {
                let (per_purchase, purchases) = persona.earnings();
                let earned = per_purchase * purchases as i64;
                let redeemed = earned * persona.redeemed_percent() / 100;
                json!({
                    "tenant_id": self.tenant,
                    "user_id": id_of(owner),
                    "balance": earned - redeemed,
                    "lifetime_earned": earned,
                    "tier": tier_for(earned),
                })
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
        let personas: BTreeMap<String, Persona> = profiles_with_role(ctx, &self.tenant, &["owner"])
            .await?
            .iter()
            .zip(Persona::ROTATION)
            .filter_map(|(owner, persona)| Some((id_key(owner.get("id"))?, persona)))
            .collect();
        let mut transactions = Vec::new();
        for member in created {
            let user = member.get("user_id").cloned().unwrap_or(Value::Null);
            let Some(persona) = id_key(Some(&user)).and_then(|id| personas.get(&id).copied()) else {
                continue;
            };
            let (per_purchase, purchases) = persona.earnings();
            for purchase in 0..purchases {
                let earned_at = at(ctx.run, -7 * (purchases - purchase) as i64, 12, 0);
                transactions.push(to_record(json!({
                    "tenant_id": self.tenant,
                    "user_id": user,
                    "type": "earn",
                    "points": per_purchase,
                    "description": format!("Compra #{}", purchase + 1),
                    "created_at": timestamp(earned_at),
                })));
            }
            let redeemed = per_purchase * purchases as i64 * persona.redeemed_percent() / 100;
            if redeemed > 0 {
                transactions.push(to_record(json!({
                    "tenant_id": self.tenant,
                    "user_id": user,
                    "type": "redeem",
                    "points": -redeemed,
                    "description": "Canje de puntos",
                    "created_at": timestamp(at(ctx.run, -1, 16, 0)),
                })));
            }
        }
        cascade(ctx, result, "loyalty_transactions", Some(&self.tenant), transactions, started).await;
        Ok(())
    }
}
