//! Static table catalog: tenancy scope and declared foreign keys.
//!
//! The catalog is the single place that knows how tables relate. Cleanup
//! order and dependency checks are derived from it instead of being
//! maintained by hand.

/// How a table's rows are attached to a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Shared by every tenant; never removed by tenant cleanup.
    Global,
    /// Rows carry the tenant identifier in `column`.
    Tenant { column: &'static str },
    /// Rows carry the identifier of a parent entity that is tenant scoped.
    Entity {
        column: &'static str,
        parent: &'static str,
    },
}

/// Foreign key from `column` to the primary key of `table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignRef {
    pub column: &'static str,
    pub table: &'static str,
}

/// Catalog entry for a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub scope: Scope,
    pub references: &'static [ForeignRef],
}

impl TableDef {
    pub fn is_global(&self) -> bool {
        matches!(self.scope, Scope::Global)
    }
}

const fn fk(column: &'static str, table: &'static str) -> ForeignRef {
    ForeignRef { column, table }
}

const fn global(name: &'static str, references: &'static [ForeignRef]) -> TableDef {
    TableDef {
        name,
        scope: Scope::Global,
        references,
    }
}

const fn tenant(name: &'static str, references: &'static [ForeignRef]) -> TableDef {
    TableDef {
        name,
        scope: Scope::Tenant {
            column: crate::TENANT_COLUMN,
        },
        references,
    }
}

const TENANT_FK: ForeignRef = fk("tenant_id", "tenants");

/// Every table the engine seeds or cleans.
pub const CATALOG: &[TableDef] = &[
    // clinic configuration
    TableDef {
        name: "tenants",
        scope: Scope::Tenant { column: "id" },
        references: &[],
    },
    tenant("document_sequences", &[TENANT_FK]),
    tenant("services", &[TENANT_FK]),
    tenant("payment_methods", &[TENANT_FK]),
    tenant("kennels", &[TENANT_FK]),
    tenant("message_templates", &[TENANT_FK]),
    tenant("time_off_types", &[TENANT_FK]),
    // Shared templates carry a null tenant and survive tenant cleanup.
    tenant("consent_templates", &[TENANT_FK]),
    // reference data
    global("diagnosis_codes", &[]),
    global("drug_dosages", &[]),
    global("growth_standards", &[]),
    global("vaccine_protocols", &[]),
    global("insurance_providers", &[]),
    global("lab_test_catalog", &[]),
    // commerce catalog
    global("store_brands", &[]),
    global("store_categories", &[fk("parent_id", "store_categories")]),
    global("suppliers", &[]),
    global(
        "store_products",
        &[fk("brand_id", "store_brands"), fk("category_id", "store_categories")],
    ),
    tenant(
        "store_inventory",
        &[TENANT_FK, fk("product_id", "store_products")],
    ),
    // people
    tenant("profiles", &[TENANT_FK]),
    tenant("staff_profiles", &[TENANT_FK, fk("profile_id", "profiles")]),
    tenant("pets", &[TENANT_FK, fk("owner_id", "profiles")]),
    TableDef {
        name: "weight_records",
        scope: Scope::Entity {
            column: "pet_id",
            parent: "pets",
        },
        references: &[fk("pet_id", "pets")],
    },
    // medical records
    tenant(
        "appointments",
        &[
            TENANT_FK,
            fk("pet_id", "pets"),
            fk("service_id", "services"),
            fk("vet_id", "profiles"),
        ],
    ),
    tenant(
        "medical_records",
        &[
            TENANT_FK,
            fk("pet_id", "pets"),
            fk("appointment_id", "appointments"),
            fk("vet_id", "profiles"),
        ],
    ),
    tenant(
        "vaccines",
        &[
            TENANT_FK,
            fk("pet_id", "pets"),
            fk("protocol_id", "vaccine_protocols"),
        ],
    ),
    tenant(
        "vaccine_reactions",
        &[TENANT_FK, fk("pet_id", "pets"), fk("vaccine_id", "vaccines")],
    ),
    tenant(
        "prescriptions",
        &[TENANT_FK, fk("pet_id", "pets"), fk("vet_id", "profiles")],
    ),
    tenant(
        "consent_documents",
        &[
            TENANT_FK,
            fk("pet_id", "pets"),
            fk("owner_id", "profiles"),
            fk("template_id", "consent_templates"),
        ],
    ),
    // finance
    tenant(
        "invoices",
        &[
            TENANT_FK,
            fk("client_id", "profiles"),
            fk("appointment_id", "appointments"),
        ],
    ),
    tenant(
        "invoice_items",
        &[
            TENANT_FK,
            fk("invoice_id", "invoices"),
            fk("service_id", "services"),
        ],
    ),
    tenant(
        "payments",
        &[
            TENANT_FK,
            fk("invoice_id", "invoices"),
            fk("payment_method_id", "payment_methods"),
        ],
    ),
    // laboratory
    tenant(
        "lab_orders",
        &[TENANT_FK, fk("pet_id", "pets"), fk("ordered_by", "profiles")],
    ),
    tenant(
        "lab_order_items",
        &[
            TENANT_FK,
            fk("lab_order_id", "lab_orders"),
            fk("test_id", "lab_test_catalog"),
        ],
    ),
    tenant(
        "lab_results",
        &[
            TENANT_FK,
            fk("lab_order_id", "lab_orders"),
            fk("lab_order_item_id", "lab_order_items"),
        ],
    ),
    // hospitalization
    tenant(
        "hospitalizations",
        &[TENANT_FK, fk("pet_id", "pets"), fk("kennel_id", "kennels")],
    ),
    tenant(
        "hospitalization_vitals",
        &[TENANT_FK, fk("hospitalization_id", "hospitalizations")],
    ),
    // commerce
    tenant("store_orders", &[TENANT_FK, fk("customer_id", "profiles")]),
    tenant(
        "store_order_items",
        &[
            TENANT_FK,
            fk("order_id", "store_orders"),
            fk("product_id", "store_products"),
        ],
    ),
    tenant(
        "store_carts",
        &[TENANT_FK, fk("customer_id", "profiles")],
    ),
    // loyalty
    tenant("loyalty_points", &[TENANT_FK, fk("user_id", "profiles")]),
    tenant(
        "loyalty_transactions",
        &[TENANT_FK, fk("user_id", "profiles")],
    ),
];

/// Look up a table in the catalog.
pub fn table_def(name: &str) -> Option<&'static TableDef> {
    CATALOG.iter().find(|table| table.name == name)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn catalog_names_are_unique() {
        let mut seen = BTreeSet::new();
        for table in CATALOG {
            assert!(seen.insert(table.name), "duplicate table {}", table.name);
        }
    }

    #[test]
    fn references_point_at_catalog_tables() {
        for table in CATALOG {
            for reference in table.references {
                assert!(
                    table_def(reference.table).is_some(),
                    "{}.{} references unknown table {}",
                    table.name,
                    reference.column,
                    reference.table
                );
            }
            if let Scope::Entity { parent, .. } = table.scope {
                let parent = table_def(parent).expect("entity parent in catalog");
                assert!(matches!(parent.scope, Scope::Tenant { .. }));
            }
        }
    }

    #[test]
    fn global_tables_never_reference_tenant_tables() {
        for table in CATALOG.iter().filter(|table| table.is_global()) {
            for reference in table.references {
                let target = table_def(reference.table).unwrap();
                assert!(target.is_global(), "{} -> {}", table.name, target.name);
            }
        }
    }
}
