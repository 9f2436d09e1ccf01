//! Named seeding presets.
//!
//! A variant is an ordered list of seeder configurations. Larger variants
//! are built from smaller ones by value, so `demo` always contains
//! everything `integration` seeds, which contains everything `basic` seeds.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use clinicseed_core::{CATALOG, DependencyGraph};

use crate::errors::OrchestratorError;
use crate::seeder::Seeder;
use crate::seeders::{
    clinic, clinical, commerce, finance, hospital, lab, people, reference, store, tenants,
};

/// What a factory needs to build one seeder instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeederOptions {
    /// Tenant a per-tenant seeder is bound to.
    pub tenant: Option<String>,
    /// Every tenant of the run.
    pub tenants: Vec<String>,
}

impl SeederOptions {
    pub fn global(tenants: &[String]) -> Self {
        Self {
            tenant: None,
            tenants: tenants.to_vec(),
        }
    }

    pub fn for_tenant(tenant: &str, tenants: &[String]) -> Self {
        Self {
            tenant: Some(tenant.to_string()),
            tenants: tenants.to_vec(),
        }
    }
}

pub type SeederFactory = fn(&SeederOptions) -> Box<dyn Seeder>;

#[derive(Clone, Copy)]
pub struct SeederConfig {
    pub name: &'static str,
    pub factory: SeederFactory,
    pub requires_tenant: bool,
    /// Seeders that must have run first.
    pub dependencies: &'static [&'static str],
}

impl fmt::Debug for SeederConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeederConfig")
            .field("name", &self.name)
            .field("requires_tenant", &self.requires_tenant)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

const fn global(
    name: &'static str,
    factory: SeederFactory,
    dependencies: &'static [&'static str],
) -> SeederConfig {
    SeederConfig {
        name,
        factory,
        requires_tenant: false,
        dependencies,
    }
}

const fn per_tenant(
    name: &'static str,
    factory: SeederFactory,
    dependencies: &'static [&'static str],
) -> SeederConfig {
    SeederConfig {
        name,
        factory,
        requires_tenant: true,
        dependencies,
    }
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub name: &'static str,
    pub description: &'static str,
    pub seeder_configs: Vec<SeederConfig>,
    /// Wipe tenant data before seeding, even without `--clear`.
    pub cleanup_on_run: bool,
    /// Tables cleanup never touches.
    pub preserve_tables: BTreeSet<String>,
}

impl Variant {
    pub fn has_tenant_seeders(&self) -> bool {
        self.seeder_configs.iter().any(|config| config.requires_tenant)
    }

    fn extend(mut self, name: &'static str, description: &'static str, configs: &[SeederConfig]) -> Self {
        self.name = name;
        self.description = description;
        self.seeder_configs.extend_from_slice(configs);
        self
    }
}

const BASIC: &[SeederConfig] = &[
    global("tenants", tenants::tenants, &[]),
    per_tenant("services", clinic::services, &["tenants"]),
    per_tenant("payment_methods", clinic::payment_methods, &["tenants"]),
];

const INTEGRATION: &[SeederConfig] = &[
    global("diagnosis_codes", reference::diagnosis_codes, &[]),
    global("drug_dosages", reference::drug_dosages, &[]),
    global("growth_standards", reference::growth_standards, &[]),
    global("vaccine_protocols", reference::vaccine_protocols, &[]),
    global("insurance_providers", reference::insurance_providers, &[]),
    global("lab_test_catalog", reference::lab_test_catalog, &[]),
    per_tenant("kennels", clinic::kennels, &["tenants"]),
    global("consent_templates", clinic::consent_templates, &[]),
    per_tenant("message_templates", clinic::message_templates, &["tenants"]),
    per_tenant("time_off_types", clinic::time_off_types, &["tenants"]),
];

const DEMO: &[SeederConfig] = &[
    global("store_brands", store::store_brands, &[]),
    global("store_categories", store::store_categories, &[]),
    global("suppliers", store::suppliers, &[]),
    global("store_products", store::store_products, &["store_brands", "store_categories"]),
    per_tenant("store_inventory", store::store_inventory, &["tenants", "store_products"]),
    per_tenant("profiles", people::profiles, &["tenants"]),
    per_tenant("staff_profiles", people::staff_profiles, &["profiles"]),
    per_tenant("pets", people::pets, &["profiles"]),
    per_tenant("weight_records", people::weight_records, &["pets"]),
    per_tenant("appointments", clinical::appointments, &["pets", "services", "staff_profiles"]),
    per_tenant("medical_records", clinical::medical_records, &["appointments"]),
    per_tenant("vaccines", clinical::vaccines, &["pets", "vaccine_protocols"]),
    per_tenant("prescriptions", clinical::prescriptions, &["pets", "staff_profiles"]),
    per_tenant("invoices", finance::invoices, &["appointments", "payment_methods"]),
    per_tenant("lab_orders", lab::lab_orders, &["pets", "lab_test_catalog"]),
    per_tenant("hospitalizations", hospital::hospitalizations, &["pets", "kennels"]),
    per_tenant("store_orders", commerce::store_orders, &["profiles", "store_products"]),
    per_tenant("loyalty_points", commerce::loyalty_points, &["profiles"]),
];

pub fn basic() -> Variant {
    Variant {
        name: "basic",
        description: "Tenants with their services and payment methods",
        seeder_configs: BASIC.to_vec(),
        cleanup_on_run: false,
        preserve_tables: BTreeSet::new(),
    }
}

pub fn integration() -> Variant {
    basic().extend(
        "integration",
        "Basic plus clinical reference catalogs and clinic templates",
        INTEGRATION,
    )
}

pub fn demo() -> Variant {
    integration().extend(
        "demo",
        "Integration plus store catalog and a full clinical history per tenant",
        DEMO,
    )
}

/// `demo` after wiping tenant data; shared catalogs, the tenants and their
/// document counters survive.
pub fn reset() -> Variant {
    let mut preserve: BTreeSet<String> = CATALOG
        .iter()
        .filter(|table| table.is_global())
        .map(|table| table.name.to_string())
        .collect();
    preserve.insert("tenants".to_string());
    // Only created tenants get counters, and reset keeps the tenant rows.
    preserve.insert("document_sequences".to_string());
    Variant {
        name: "reset",
        description: "Clean tenant data, then seed demo",
        cleanup_on_run: true,
        preserve_tables: preserve,
        ..demo()
    }
}

const VARIANTS: &[(&str, fn() -> Variant)] = &[
    ("basic", basic),
    ("integration", integration),
    ("demo", demo),
    ("reset", reset),
];

pub fn get_variant(name: &str) -> Option<Variant> {
    VARIANTS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, build)| build())
}

pub fn variant_names() -> Vec<&'static str> {
    VARIANTS.iter().map(|(name, _)| *name).collect()
}

/// Seeder configurations in an order that satisfies every dependency.
///
/// Declaration order is kept wherever the dependencies allow it. Unknown
/// dependency names, cycles and global seeders that depend on per-tenant
/// ones are rejected.
pub fn resolve_execution_order(variant: &Variant) -> Result<Vec<SeederConfig>, OrchestratorError> {
    let invalid = |source| OrchestratorError::InvalidDependencies {
        variant: variant.name.to_string(),
        source,
    };
    let by_name: BTreeMap<&str, &SeederConfig> = variant
        .seeder_configs
        .iter()
        .map(|config| (config.name, config))
        .collect();

    let mut graph = DependencyGraph::new();
    for config in &variant.seeder_configs {
        graph.add_node(config.name);
    }
    for config in &variant.seeder_configs {
        for dependency in config.dependencies {
            graph.add_edge(dependency, config.name).map_err(invalid)?;
            if let Some(parent) = by_name.get(dependency) {
                if !config.requires_tenant && parent.requires_tenant {
                    return Err(OrchestratorError::GlobalDependsOnTenant {
                        variant: variant.name.to_string(),
                        seeder: config.name.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }
    }

    let order = graph.toposort().map_err(invalid)?;
    Ok(order
        .iter()
        .filter_map(|name| by_name.get(name.as_str()).map(|config| **config))
        .collect())
}
