//! Post-seed row counts.
//!
//! Each rule applies only when the variant runs the seeder that fills its
//! table, so `basic` is never blamed for an empty store catalog.

use serde_json::Value;
use tracing::warn;

use clinicseed_core::TENANT_COLUMN;
use clinicseed_report::{CheckStatus, Expectation, Verification, VerificationCheck};
use clinicseed_store::{Query, Store, StoreResult};

use crate::variants::Variant;

#[derive(Debug, Clone, Copy)]
enum Scope {
    Global,
    /// One count per tenant, matching the tenant on this column.
    Tenant(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    seeder: &'static str,
    label: &'static str,
    table: &'static str,
    scope: Scope,
    role: Option<&'static str>,
    expected: Expectation,
    on_miss: CheckStatus,
}

const fn rule(seeder: &'static str, scope: Scope, on_miss: CheckStatus) -> Rule {
    Rule {
        seeder,
        label: seeder,
        table: seeder,
        scope,
        role: None,
        expected: Expectation::MoreThan(0),
        on_miss,
    }
}

const PER_TENANT: Scope = Scope::Tenant(TENANT_COLUMN);

const RULES: &[Rule] = &[
    rule("diagnosis_codes", Scope::Global, CheckStatus::Fail),
    rule("growth_standards", Scope::Global, CheckStatus::Fail),
    Rule {
        expected: Expectation::Exactly(1),
        ..rule("tenants", Scope::Tenant("id"), CheckStatus::Fail)
    },
    rule("services", PER_TENANT, CheckStatus::Warn),
    rule("payment_methods", PER_TENANT, CheckStatus::Warn),
    rule("store_products", Scope::Global, CheckStatus::Fail),
    rule("store_brands", Scope::Global, CheckStatus::Fail),
    rule("store_inventory", PER_TENANT, CheckStatus::Warn),
    Rule {
        label: "owners",
        role: Some("owner"),
        ..rule("profiles", PER_TENANT, CheckStatus::Warn)
    },
    rule("pets", PER_TENANT, CheckStatus::Warn),
    rule("vaccines", Scope::Global, CheckStatus::Warn),
];

/// Count the rows the variant should have left behind.
pub async fn verify(store: &dyn Store, variant: &Variant, tenants: &[String]) -> Verification {
    let mut checks = Vec::new();
    for rule in RULES {
        if !variant.seeder_configs.iter().any(|config| config.name == rule.seeder) {
            continue;
        }
        match rule.scope {
            Scope::Global => checks.push(check(store, rule, rule.label.to_string(), Query::new()).await),
            Scope::Tenant(column) => {
                for tenant in tenants {
                    let query = Query::new().eq(column, Value::String(tenant.clone()));
                    checks.push(check(store, rule, format!("{}({tenant})", rule.label), query).await);
                }
            }
        }
    }
    Verification { checks }
}

async fn check(store: &dyn Store, rule: &Rule, name: String, mut query: Query) -> VerificationCheck {
    if let Some(role) = rule.role {
        query = query.eq("role", role);
    }
    match count(store, rule.table, &query).await {
        Ok(actual) => VerificationCheck::evaluate(name, rule.expected, actual, rule.on_miss),
        Err(error) => {
            warn!(event = "verification_failed", check = %name, error = %error);
            VerificationCheck::unavailable(name, rule.expected, error.to_string())
        }
    }
}

async fn count(store: &dyn Store, table: &str, query: &Query) -> StoreResult<u64> {
    let query = query.clone().columns(&["id"]);
    Ok(store.select(table, &query).await?.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::row;
    use crate::variants::{basic, demo};
    use clinicseed_store::MemoryStore;
    use serde_json::json;

    fn tenants() -> Vec<String> {
        vec!["adris".into()]
    }

    #[tokio::test]
    async fn basic_only_checks_its_own_tables() {
        let store = MemoryStore::new();
        store.preload("tenants", vec![row(json!({"id": "adris"}))]);
        store.preload("services", vec![row(json!({"tenant_id": "adris", "name": "Consulta"}))]);

        let verification = verify(&store, &basic(), &tenants()).await;
        let names: Vec<&str> = verification.checks.iter().map(|check| check.name.as_str()).collect();
        assert_eq!(names, vec!["tenants(adris)", "services(adris)", "payment_methods(adris)"]);
        assert_eq!(verification.count(CheckStatus::Pass), 2);
        assert_eq!(verification.checks[2].status, CheckStatus::Warn);
        assert!(!verification.has_failures());
    }

    #[tokio::test]
    async fn owners_count_only_owner_profiles() {
        let store = MemoryStore::new();
        store.preload(
            "profiles",
            vec![
                row(json!({"tenant_id": "adris", "role": "vet"})),
                row(json!({"tenant_id": "petlife", "role": "owner"})),
            ],
        );

        let verification = verify(&store, &demo(), &tenants()).await;
        let owners = verification
            .checks
            .iter()
            .find(|check| check.name == "owners(adris)")
            .unwrap();
        assert_eq!((owners.actual, owners.status), (0, CheckStatus::Warn));
    }

    #[tokio::test]
    async fn missing_tables_fail_the_check() {
        let store = MemoryStore::new().with_known_tables(["tenants", "services"]);
        let verification = verify(&store, &basic(), &tenants()).await;
        let payment = &verification.checks[2];
        assert_eq!(payment.status, CheckStatus::Fail);
        assert!(payment.detail.is_some());
        assert_eq!(verification.checks[0].status, CheckStatus::Fail);
    }
}
