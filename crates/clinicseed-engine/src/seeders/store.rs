//! Commerce catalog under `03-store/`: brands, the category tree,
//! suppliers, products and each tenant's inventory.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use clinicseed_core::{Record, project, str_field};
use clinicseed_report::SeederResult;
use clinicseed_store::Filter;

use super::generate::number_field;
use super::{FileSeeder, bound, objects, schemas};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::fixtures::{extract_records, load_records};
use crate::seeder::{Pipeline, Seeder, TableSeeder};
use crate::variants::SeederOptions;

const BRAND_COLUMNS: &[&str] = &[
    "slug",
    "name",
    "logo_url",
    "website",
    "description",
    "country_origin",
    "is_active",
    "is_global_catalog",
];

const CATEGORY_COLUMNS: &[&str] = &[
    "slug",
    "name",
    "description",
    "level",
    "display_order",
    "image_url",
    "icon",
    "is_active",
    "is_global_catalog",
];

const PRODUCT_COLUMNS: &[&str] = &[
    "sku",
    "barcode",
    "name",
    "description",
    "short_description",
    "category_id",
    "brand_id",
    "purchase_unit",
    "sale_unit",
    "conversion_factor",
    "purchase_price",
    "base_price",
    "sale_price",
    "cost_price",
    "image_url",
    "images",
    "weight_grams",
    "dimensions",
    "attributes",
    "target_species",
    "is_active",
    "is_featured",
    "requires_prescription",
    "display_order",
    "is_global_catalog",
];

const CATEGORIES_PATH: &str = "03-store/categories.json";
const PRODUCTS_DIR: &str = "03-store/products";
const DEFAULT_MIN_STOCK: i64 = 5;

pub fn store_brands(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new("store_brands", "03-store/brands.json", &["brands"])
        .columns(BRAND_COLUMNS)
        .schema(schemas::store_brand)
        .boxed()
}

pub fn suppliers(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new("suppliers", "03-store/suppliers.json", &["suppliers"])
        .shape(shape_supplier)
        .schema(schemas::supplier)
        .boxed()
}

pub fn store_categories(_options: &SeederOptions) -> Box<dyn Seeder> {
    Pipeline::boxed(CategorySeeder)
}

pub fn store_products(_options: &SeederOptions) -> Box<dyn Seeder> {
    Pipeline::boxed(ProductSeeder)
}

pub fn store_inventory(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| InventorySeeder { tenant })
}

/// Flat contact fields fold into `contact_info`; Spanish supplier types
/// map onto the store's enum.
fn shape_supplier(record: Record) -> Option<Record> {
    let field = |names: &[&str]| names.iter().find_map(|name| record.get(*name).cloned());

    let mut contact = Map::new();
    for (from, to) in [
        ("phone", "phone"),
        ("whatsapp", "whatsapp"),
        ("email", "email"),
        ("address", "address"),
        ("city", "city"),
        ("contact_name", "contact_person"),
        ("contact_position", "contact_position"),
    ] {
        if let Some(value) = record.get(from).filter(|value| !value.is_null()) {
            contact.insert(to.to_string(), value.clone());
        }
    }

    let supplier_type = match str_field(&record, "type") {
        Some("Servicios") => "services",
        Some("Ambos") | Some("Both") => "both",
        _ => "products",
    };
    let is_active = record.get("active") != Some(&Value::Bool(false))
        && record.get("is_active") != Some(&Value::Bool(false));

    let mut shaped = Record::new();
    shaped.insert("name".into(), field(&["name"]).unwrap_or(Value::Null));
    shaped.insert("supplier_type".into(), json!(supplier_type));
    shaped.insert("is_active".into(), json!(is_active));
    if !contact.is_empty() {
        shaped.insert("contact_info".into(), Value::Object(contact));
    }
    for (column, sources) in [
        ("legal_name", &["legal_name"][..]),
        ("tax_id", &["ruc", "tax_id"][..]),
        ("website", &["website"][..]),
        ("minimum_order_amount", &["min_order_gs", "minimum_order_amount"][..]),
        ("payment_terms", &["payment_terms"][..]),
        ("delivery_time_days", &["delivery_days", "delivery_time_days"][..]),
    ] {
        if let Some(value) = field(sources) {
            shaped.insert(column.into(), value);
        }
    }
    Some(shaped)
}

/// One flattened node of the category tree.
#[derive(Debug, Clone, PartialEq)]
struct CategoryNode {
    record: Record,
    parent_slug: Option<String>,
}

/// Depth-first flattening; `level` defaults to the depth (1 for roots).
fn flatten_categories(nodes: Vec<Value>, parent: Option<&str>, depth: u64, out: &mut Vec<CategoryNode>) {
    for mut record in objects(nodes) {
        let children = match record.remove("subcategories") {
            Some(Value::Array(children)) => children,
            _ => Vec::new(),
        };
        record.entry("level").or_insert(json!(depth));
        let slug = str_field(&record, "slug").map(str::to_string);
        let parent_slug = str_field(&record, "parent_slug")
            .map(str::to_string)
            .or_else(|| parent.map(str::to_string));
        out.push(CategoryNode {
            record,
            parent_slug,
        });
        flatten_categories(children, slug.as_deref(), depth + 1, out);
    }
}

fn category_nodes(raw: Vec<Value>) -> Vec<CategoryNode> {
    let mut nodes = Vec::new();
    flatten_categories(raw, None, 1, &mut nodes);
    nodes.sort_by_key(|node| node.record.get("level").and_then(Value::as_u64).unwrap_or(0));
    nodes
}

/// Category tree. Parents are linked after insert, once every slug has an
/// id.
pub struct CategorySeeder;

#[async_trait]
impl TableSeeder for CategorySeeder {
    fn table(&self) -> &'static str {
        "store_categories"
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::store_category())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        Ok(load_records(ctx.fixtures, CATEGORIES_PATH, &["categories"])?)
    }

    async fn pre_process(
        &self,
        _ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        Ok(category_nodes(raw)
            .into_iter()
            .map(|node| Value::Object(project(&node.record, CATEGORY_COLUMNS)))
            .collect())
    }

    async fn post_process(
        &self,
        ctx: &mut SeedContext<'_>,
        _created: &[Record],
        result: &mut SeederResult,
    ) -> Result<(), SeedError> {
        let raw = load_records(ctx.fixtures, CATEGORIES_PATH, &["categories"])?;
        let ids = ctx
            .cache
            .id_map(ctx.store, "store_categories", "slug", Vec::new())
            .await?;

        let mut linked = 0u64;
        for node in category_nodes(raw) {
            let (Some(slug), Some(parent_slug)) =
                (str_field(&node.record, "slug"), node.parent_slug.as_deref())
            else {
                continue;
            };
            let (Some(id), Some(parent_id)) = (ids.get(slug), ids.get(parent_slug)) else {
                result
                    .warnings
                    .push(format!("category '{slug}': parent '{parent_slug}' not found"));
                continue;
            };
            let filters = [Filter::eq("id", id.clone()), Filter::IsNull("parent_id".into())];
            let mut patch = Record::new();
            patch.insert("parent_id".into(), parent_id.clone());
            match ctx.store.update("store_categories", &filters, &patch).await {
                Ok(count) => linked += count,
                Err(err) => {
                    result.errors += 1;
                    result
                        .error_details
                        .push(format!("category '{slug}': linking parent failed: {err}"));
                }
            }
        }
        ctx.cache.invalidate("store_categories");
        debug!(event = "categories_linked", linked);
        Ok(())
    }
}

/// Global product catalog, spread over every document in
/// `03-store/products/`.
pub struct ProductSeeder;

impl ProductSeeder {
    /// Product rows with variants expanded, de-duplicated by SKU with later
    /// definitions replacing earlier ones.
    fn expand(
        raw: Vec<Value>,
        brands: &BTreeMap<String, Value>,
        categories: &BTreeMap<String, Value>,
    ) -> Vec<Record> {
        let mut order: Vec<String> = Vec::new();
        let mut by_sku: BTreeMap<String, Record> = BTreeMap::new();

        for mut product in objects(raw) {
            let variants = match product.remove("variants") {
                Some(Value::Array(variants)) => variants,
                _ => Vec::new(),
            };
            let mut base = project(&product, PRODUCT_COLUMNS);
            base.entry("is_global_catalog").or_insert(json!(true));
            if let Some(id) = str_field(&product, "brand_slug").and_then(|slug| brands.get(slug)) {
                base.insert("brand_id".into(), id.clone());
            }
            if let Some(id) = str_field(&product, "category_slug").and_then(|slug| categories.get(slug)) {
                base.insert("category_id".into(), id.clone());
            }

            let rows = if variants.is_empty() {
                vec![base]
            } else {
                objects(variants).map(|variant| apply_variant(&base, &variant)).collect()
            };

            for row in rows {
                let Some(sku) = str_field(&row, "sku").map(str::to_string) else {
                    continue;
                };
                if by_sku.insert(sku.clone(), row).is_none() {
                    order.push(sku);
                }
            }
        }

        order
            .into_iter()
            .filter_map(|sku| by_sku.remove(&sku))
            .collect()
    }
}

fn apply_variant(base: &Record, variant: &Record) -> Record {
    let mut row = base.clone();
    for column in ["base_price", "cost_price", "sale_price"] {
        if let Some(value) = variant.get(column).filter(|value| !value.is_null()) {
            row.insert(column.into(), value.clone());
        }
    }
    if let (Some(sku), Some(suffix)) = (str_field(base, "sku"), str_field(variant, "sku_suffix")) {
        row.insert("sku".into(), json!(format!("{sku}-{suffix}")));
    }
    if let (Some(name), Some(label)) = (str_field(base, "name"), str_field(variant, "name")) {
        row.insert("name".into(), json!(format!("{name} {label}")));
    }
    row
}

#[async_trait]
impl TableSeeder for ProductSeeder {
    fn table(&self) -> &'static str {
        "store_products"
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::store_product())
    }

    fn batch_size(&self, ctx: &SeedContext<'_>) -> Option<usize> {
        Some(ctx.run.batch_size)
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let mut products = Vec::new();
        for path in ctx.fixtures.list(PRODUCTS_DIR)? {
            let Some(document) = ctx.fixtures.read(&path)? else {
                continue;
            };
            let brand_slug = document.get("brand_slug").cloned();
            for mut product in objects(extract_records(&path, document, &["products"])?) {
                if let Some(slug) = &brand_slug {
                    product.entry("brand_slug").or_insert(slug.clone());
                }
                products.push(Value::Object(product));
            }
        }
        Ok(products)
    }

    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let brands = ctx
            .cache
            .id_map(ctx.store, "store_brands", "slug", Vec::new())
            .await?;
        let categories = ctx
            .cache
            .id_map(ctx.store, "store_categories", "slug", Vec::new())
            .await?;
        Ok(Self::expand(raw, &brands, &categories)
            .into_iter()
            .map(Value::Object)
            .collect())
    }
}

/// Stock of catalog products for one tenant, from
/// `03-store/tenant-products/<tenant>.json`.
pub struct InventorySeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for InventorySeeder {
    fn table(&self) -> &'static str {
        "store_inventory"
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::store_inventory())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let path = format!("03-store/tenant-products/{}.json", self.tenant);
        Ok(load_records(ctx.fixtures, &path, &["products"])?)
    }

    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let products = ctx
            .cache
            .id_map(ctx.store, "store_products", "sku", Vec::new())
            .await?;

        let mut rows = Vec::new();
        let mut unknown = 0usize;
        for assignment in objects(raw) {
            let Some(product_id) = str_field(&assignment, "sku").and_then(|sku| products.get(sku)) else {
                unknown += 1;
                continue;
            };
            let stock = number_field(&assignment, "initial_stock").unwrap_or(0.0) as i64;
            let min_stock = number_field(&assignment, "min_stock_level")
                .map(|value| value as i64)
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_MIN_STOCK);
            rows.push(json!({
                "tenant_id": self.tenant,
                "product_id": product_id,
                "stock_quantity": stock,
                "min_stock_level": min_stock,
                "reorder_quantity": min_stock * 2,
                "location": assignment.get("location").cloned().unwrap_or(Value::Null),
            }));
        }
        if unknown > 0 {
            debug!(event = "inventory_unknown_skus", tenant = %self.tenant, unknown);
        }
        Ok(rows)
    }
}
