//! Runs a variant against a store: optional cleanup, global seeders, then
//! per-tenant seeders, then the report.

use std::fmt;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use clinicseed_report::{CheckStatus, RunHeader, RunMode, SeedReport, SeederResult, create_report};
use clinicseed_store::Store;

use crate::cleanup::cleanup;
use crate::context::{DEFAULT_BATCH_SIZE, RunContext, SeedContext};
use crate::errors::OrchestratorError;
use crate::fixtures::Fixtures;
use crate::variants::{SeederConfig, SeederOptions, Variant, get_variant, resolve_execution_order, variant_names};
use crate::verification::verify;

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub variant: String,
    pub tenants: Vec<String>,
    pub mode: RunMode,
    pub dry_run: bool,
    pub verbose: bool,
    /// Wipe tenant data first, whatever the variant says.
    pub clear: bool,
    /// Anchor of generated timelines; today when unset.
    pub reference_date: Option<NaiveDate>,
    pub batch_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            variant: "basic".to_string(),
            tenants: Vec::new(),
            mode: RunMode::Seed,
            dry_run: false,
            verbose: false,
            clear: false,
            reference_date: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Cleaning,
    SeedingGlobal,
    SeedingPerTenant,
    Reporting,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Cleaning => "cleaning",
            Self::SeedingGlobal => "seeding_global",
            Self::SeedingPerTenant => "seeding_per_tenant",
            Self::Reporting => "reporting",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// A variant resolved and checked before anything is written.
#[derive(Debug)]
struct Plan {
    variant: Variant,
    tenants: Vec<String>,
    global: Vec<SeederConfig>,
    per_tenant: Vec<SeederConfig>,
}

pub struct Orchestrator<'a> {
    store: &'a dyn Store,
    fixtures: &'a dyn Fixtures,
    state: RunState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(store: &'a dyn Store, fixtures: &'a dyn Fixtures) -> Self {
        Self {
            store,
            fixtures,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        info!(event = "state_changed", from = %self.state, to = %next);
        self.state = next;
    }

    fn plan(options: &RunOptions) -> Result<Plan, OrchestratorError> {
        let variant = get_variant(&options.variant).ok_or_else(|| OrchestratorError::UnknownVariant {
            name: options.variant.clone(),
            available: variant_names().iter().map(|name| name.to_string()).collect(),
        })?;
        let order = resolve_execution_order(&variant)?;

        let mut tenants: Vec<String> = Vec::with_capacity(options.tenants.len());
        for tenant in &options.tenants {
            let tenant = tenant.trim();
            if !tenant.is_empty() && !tenants.iter().any(|seen| seen == tenant) {
                tenants.push(tenant.to_string());
            }
        }
        if tenants.is_empty() && variant.has_tenant_seeders() {
            return Err(OrchestratorError::NoTenants {
                variant: variant.name.to_string(),
            });
        }

        let (per_tenant, global): (Vec<SeederConfig>, Vec<SeederConfig>) =
            order.into_iter().partition(|config| config.requires_tenant);
        Ok(Plan {
            variant,
            tenants,
            global,
            per_tenant,
        })
    }

    /// Execute one run. Configuration problems fail before any write;
    /// seeder failures are recorded in the report and never abort the run.
    pub async fn run(&mut self, options: &RunOptions) -> Result<SeedReport, OrchestratorError> {
        let plan = Self::plan(options)?;
        let header = RunHeader::start(plan.variant.name, plan.tenants.clone(), options.mode, options.dry_run);
        info!(
            event = "run_started",
            variant = plan.variant.name,
            tenants = %plan.tenants.join(","),
            mode = %options.mode,
            dry_run = options.dry_run,
            seeders = plan.global.len() + plan.per_tenant.len(),
        );

        if options.clear || plan.variant.cleanup_on_run {
            if options.dry_run {
                warn!(event = "cleanup_skipped", reason = "dry_run");
            } else {
                self.transition(RunState::Cleaning);
                let report = cleanup(self.store, &plan.tenants, &plan.variant.preserve_tables).await?;
                if !report.is_clean() {
                    warn!(
                        event = "cleanup_incomplete",
                        failed_tables = %report.failed_tables.join(","),
                        errors = report.errors.len(),
                    );
                }
            }
        }

        let run = RunContext {
            mode: options.mode,
            dry_run: options.dry_run,
            verbose: options.verbose,
            reference_date: options.reference_date.unwrap_or_else(|| Utc::now().date_naive()),
            batch_size: options.batch_size.max(1),
        };
        let mut ctx = SeedContext::new(self.store, self.fixtures, &run);
        let mut results = Vec::new();

        self.transition(RunState::SeedingGlobal);
        let global = SeederOptions::global(&plan.tenants);
        for config in &plan.global {
            let result = (config.factory)(&global).seed(&mut ctx).await;
            report_result(&run, None, &result);
            results.push(result);
        }

        if !plan.per_tenant.is_empty() {
            self.transition(RunState::SeedingPerTenant);
            for tenant in &plan.tenants {
                info!(event = "tenant_started", tenant = %tenant);
                let options = SeederOptions::for_tenant(tenant, &plan.tenants);
                for config in &plan.per_tenant {
                    let result = (config.factory)(&options).seed(&mut ctx).await;
                    report_result(&run, Some(tenant.as_str()), &result);
                    results.push(result);
                }
            }
        }

        self.transition(RunState::Reporting);
        let mut report = create_report(header, results, ctx.into_tracked());
        if !options.dry_run {
            let verification = verify(self.store, &plan.variant, &plan.tenants).await;
            if verification.has_failures() {
                warn!(
                    event = "verification_failed",
                    failed = verification.count(CheckStatus::Fail),
                    checks = verification.checks.len(),
                );
            }
            report.verification = Some(verification);
        }
        info!(
            event = "run_finished",
            created = report.summary.total_created,
            skipped = report.summary.total_skipped,
            errors = report.summary.total_errors,
        );
        self.transition(RunState::Done);
        Ok(report)
    }
}

fn report_result(run: &RunContext, tenant: Option<&str>, result: &SeederResult) {
    if !run.verbose {
        return;
    }
    for warning in &result.warnings {
        info!(event = "seeder_warning", table = %result.table, tenant = tenant.unwrap_or(""), warning = %warning);
    }
    for detail in &result.error_details {
        debug!(event = "seeder_error_detail", table = %result.table, tenant = tenant.unwrap_or(""), detail = %detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::MemoryFixtures;
    use clinicseed_store::MemoryStore;
    use serde_json::json;

    fn fixtures() -> MemoryFixtures {
        MemoryFixtures::new()
            .with("00-core/tenants.json", json!({"tenants": [{"id": "adris", "name": "Veterinaria Adris"}]}))
            .with("02-clinic/adris/services.json", json!({"services": [{"name": "Consulta", "category": "consultation", "base_price": 80000}]}))
    }

    fn options(variant: &str) -> RunOptions {
        RunOptions {
            variant: variant.to_string(),
            tenants: vec!["adris".into()],
            ..RunOptions::default()
        }
    }

    #[tokio::test]
    async fn unknown_variant_fails_before_writing() {
        let store = MemoryStore::new();
        let fixtures = fixtures();
        let mut orchestrator = Orchestrator::new(&store, &fixtures);
        let err = orchestrator.run(&options("nope")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownVariant { .. }));
        assert!(err.to_string().contains("basic, integration, demo, reset"));
        assert_eq!(orchestrator.state(), RunState::Idle);
        assert_eq!(store.total_mutations(), 0);
    }

    #[tokio::test]
    async fn tenant_variants_need_tenants() {
        let store = MemoryStore::new();
        let fixtures = fixtures();
        let mut orchestrator = Orchestrator::new(&store, &fixtures);
        let err = orchestrator
            .run(&RunOptions {
                tenants: vec![" ".into()],
                ..options("basic")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NoTenants { .. }));
    }

    #[tokio::test]
    async fn globals_run_before_tenants_and_missing_files_are_empty() {
        let store = MemoryStore::new();
        let fixtures = fixtures();
        let mut orchestrator = Orchestrator::new(&store, &fixtures);
        let report = orchestrator
            .run(&RunOptions {
                tenants: vec!["adris".into(), "adris".into()],
                ..options("basic")
            })
            .await
            .unwrap();

        assert_eq!(orchestrator.state(), RunState::Done);
        assert_eq!(report.tenants, vec!["adris"]);
        let tables: Vec<_> = report.results.iter().map(|result| result.table.as_str()).collect();
        assert_eq!(tables[0], "tenants");
        assert!(tables.contains(&"services"));
        // No payment-methods fixture for this tenant.
        let methods = report.results.iter().find(|result| result.table == "payment_methods").unwrap();
        assert_eq!((methods.created, methods.errors), (0, 0));
        assert_eq!(report.summary.total_errors, 0);
        assert_eq!(store.count("services"), 1);
    }

    #[tokio::test]
    async fn dry_run_never_cleans_or_writes() {
        let store = MemoryStore::new();
        store.preload("services", vec![json!({"tenant_id": "adris", "name": "Vieja"}).as_object().cloned().unwrap()]);
        let fixtures = fixtures();
        let mut orchestrator = Orchestrator::new(&store, &fixtures);
        let report = orchestrator
            .run(&RunOptions {
                dry_run: true,
                clear: true,
                ..options("basic")
            })
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.summary.total_created, 0);
        assert_eq!(store.total_mutations(), 0);
        assert_eq!(store.count("services"), 1);
    }
}
