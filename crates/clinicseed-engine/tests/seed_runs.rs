use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;

use clinicseed_core::CATALOG;
use clinicseed_engine::{
    FsFixtures, MemoryFixtures, Orchestrator, RunOptions, cleanup, cleanup_tracked, get_variant,
};
use clinicseed_report::{CheckStatus, RunMode, SeedReport, SeederResult};
use clinicseed_store::{MemoryStore, MutationKind};

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

fn options(variant: &str) -> RunOptions {
    RunOptions {
        variant: variant.to_string(),
        tenants: vec!["adris".into(), "petlife".into()],
        reference_date: NaiveDate::from_ymd_opt(2026, 3, 15),
        ..RunOptions::default()
    }
}

async fn run(store: &MemoryStore, options: &RunOptions) -> Result<SeedReport> {
    let fixtures = FsFixtures::new(data_dir());
    let mut orchestrator = Orchestrator::new(store, &fixtures);
    Ok(orchestrator.run(options).await?)
}

fn errors(report: &SeedReport) -> Vec<String> {
    report
        .results
        .iter()
        .flat_map(|result| {
            result
                .error_details
                .iter()
                .map(move |detail| format!("{}: {detail}", result.table))
        })
        .collect()
}

fn sum(report: &SeedReport, table: &str, field: fn(&SeederResult) -> u64) -> u64 {
    report
        .results
        .iter()
        .filter(|result| result.table == table)
        .map(field)
        .sum()
}

#[tokio::test]
async fn demo_seeds_both_tenants_without_errors() -> Result<()> {
    let store = MemoryStore::new().with_foreign_keys(CATALOG);
    let report = run(&store, &options("demo")).await?;

    assert_eq!(report.summary.total_errors, 0, "{:#?}", errors(&report));
    assert_eq!(report.exit_code(), 0);
    assert_eq!(store.count("tenants"), 2);
    assert_eq!(store.count("pets"), 13);
    // The rabbit protocol is not a species the store accepts.
    assert_eq!(store.count("vaccine_protocols"), 5);
    assert_eq!(store.count("consent_templates"), 5);
    for table in ["appointments", "prescriptions", "invoices", "lab_results", "hospitalization_vitals", "store_order_items", "loyalty_transactions"] {
        assert!(store.count(table) > 0, "{table} is empty");
    }

    let created = store.mutation_count(MutationKind::Insert) as u64;
    assert_eq!(report.summary.total_created, created);

    let verification = report.verification.as_ref().expect("verified after seeding");
    assert_eq!(verification.count(CheckStatus::Pass), verification.checks.len(), "{verification:#?}");
    assert!(verification.checks.iter().any(|check| check.name == "owners(petlife)"));
    Ok(())
}

#[tokio::test]
async fn rerunning_creates_nothing_new() -> Result<()> {
    let store = MemoryStore::new().with_foreign_keys(CATALOG);
    let first = run(&store, &options("demo")).await?;
    let rows = store.total_rows();

    let second = run(&store, &options("demo")).await?;
    assert_eq!(second.summary.total_created, 0, "{:#?}", errors(&second));
    assert_eq!(second.summary.total_errors, 0);
    assert_eq!(store.total_rows(), rows);

    let demo = get_variant("demo").expect("demo variant");
    for config in &demo.seeder_configs {
        assert_eq!(
            sum(&second, config.name, |result| result.skipped),
            sum(&first, config.name, |result| result.created),
            "{}",
            config.name
        );
    }
    Ok(())
}

#[tokio::test]
async fn dry_run_leaves_the_store_untouched() -> Result<()> {
    let store = MemoryStore::new().with_foreign_keys(CATALOG);
    let dry = run(
        &store,
        &RunOptions {
            dry_run: true,
            ..options("integration")
        },
    )
    .await?;
    assert!(dry.dry_run);
    assert!(dry.verification.is_none());
    assert_eq!(dry.summary.total_created, 0);
    assert_eq!(dry.summary.total_errors, 0);
    assert_eq!(store.total_mutations(), 0);

    let real = run(&store, &options("integration")).await?;
    assert_eq!(real.summary.total_errors, 0, "{:#?}", errors(&real));
    assert!(real.summary.total_created > 0);
    assert_eq!(sum(&real, "services", |result| result.created), 10);
    Ok(())
}

#[tokio::test]
async fn profile_emails_match_ignoring_case() -> Result<()> {
    let store = MemoryStore::new();
    store.preload(
        "profiles",
        vec![
            json!({"tenant_id": "adris", "full_name": "Roberto Villalba", "email": "roberto.villalba@correo.com.py", "role": "owner"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ],
    );
    let report = run(
        &store,
        &RunOptions {
            tenants: vec!["adris".into()],
            ..options("demo")
        },
    )
    .await?;

    assert_eq!(report.summary.total_errors, 0, "{:#?}", errors(&report));
    assert_eq!(sum(&report, "profiles", |result| result.skipped), 1);
    assert_eq!(store.count("profiles"), 10);
    // Roberto's pet still finds its owner through the stored row.
    let pets = store.rows("pets");
    assert_eq!(pets.len(), 8);
    assert!(pets.iter().all(|pet| pet.get("owner_id").is_some()));
    Ok(())
}

#[tokio::test]
async fn invalid_records_do_not_block_their_batch() -> Result<()> {
    let services: Vec<_> = (0..5)
        .map(|index| {
            if index == 2 {
                json!({"name": "Sin precio", "category": "consultation"})
            } else {
                json!({"name": format!("Servicio {index}"), "category": "consultation", "base_price": 50000})
            }
        })
        .collect();
    let fixtures = MemoryFixtures::new()
        .with("00-core/tenants.json", json!({"tenants": [{"id": "adris", "name": "Veterinaria Adris"}]}))
        .with("02-clinic/adris/services.json", json!({"services": services}));
    let store = MemoryStore::new();
    let mut orchestrator = Orchestrator::new(&store, &fixtures);
    let report = orchestrator
        .run(&RunOptions {
            tenants: vec!["adris".into()],
            ..RunOptions::default()
        })
        .await?;

    let result = report
        .results
        .iter()
        .find(|result| result.table == "services")
        .expect("services result");
    assert_eq!((result.created, result.errors), (4, 0));
    assert!(!result.warnings.is_empty());
    assert_eq!(store.count("services"), 4);
    Ok(())
}

#[tokio::test]
async fn cleanup_after_demo_never_breaks_a_reference() -> Result<()> {
    let store = MemoryStore::new().with_foreign_keys(CATALOG);
    let report = run(&store, &options("demo")).await?;
    assert_eq!(report.summary.total_errors, 0, "{:#?}", errors(&report));

    let products = store.count("store_products");
    let tenants = vec!["adris".to_string(), "petlife".to_string()];
    let cleaned = cleanup(&store, &tenants, &BTreeSet::new()).await?;
    assert!(cleaned.is_clean(), "{:?}", cleaned.errors);
    assert_eq!(store.count("tenants"), 0);
    assert_eq!(store.count("pets"), 0);
    assert_eq!(store.count("store_orders"), 0);
    assert_eq!(store.count("store_products"), products);
    Ok(())
}

#[tokio::test]
async fn reset_keeps_tenants_and_reseeds() -> Result<()> {
    let store = MemoryStore::new().with_foreign_keys(CATALOG);
    run(&store, &options("demo")).await?;
    store.preload(
        "pets",
        vec![json!({"tenant_id": "adris", "name": "Huérfano"}).as_object().cloned().unwrap_or_default()],
    );
    let tenant_ids: Vec<_> = store.rows("tenants").iter().map(|row| row.get("id").cloned()).collect();
    let sequences = store.count("document_sequences");
    assert!(sequences > 0);

    let report = run(&store, &options("reset")).await?;
    assert_eq!(report.summary.total_errors, 0, "{:#?}", errors(&report));
    let after: Vec<_> = store.rows("tenants").iter().map(|row| row.get("id").cloned()).collect();
    assert_eq!(after, tenant_ids);
    assert_eq!(store.count("pets"), 13);
    assert!(store.rows("pets").iter().all(|pet| pet.get("name") != Some(&json!("Huérfano"))));
    assert_eq!(store.count("document_sequences"), sequences);
    Ok(())
}

#[tokio::test]
async fn rerunning_on_a_later_day_keeps_the_generated_history() -> Result<()> {
    let store = MemoryStore::new().with_foreign_keys(CATALOG);
    let first = run(&store, &options("demo")).await?;
    assert_eq!(first.summary.total_errors, 0, "{:#?}", errors(&first));
    let generated = ["weight_records", "appointments", "vaccines", "prescriptions", "lab_orders", "hospitalizations", "store_orders"];
    let counts: Vec<usize> = generated.iter().map(|table| store.count(table)).collect();
    let rows = store.total_rows();

    let next_day = run(
        &store,
        &RunOptions {
            reference_date: NaiveDate::from_ymd_opt(2026, 3, 16),
            ..options("demo")
        },
    )
    .await?;
    assert_eq!(next_day.summary.total_errors, 0, "{:#?}", errors(&next_day));
    assert_eq!(next_day.summary.total_created, 0);
    let after: Vec<usize> = generated.iter().map(|table| store.count(table)).collect();
    assert_eq!(after, counts);
    assert_eq!(store.total_rows(), rows);
    Ok(())
}

#[tokio::test]
async fn test_mode_tracks_every_row_for_teardown() -> Result<()> {
    let store = MemoryStore::new().with_foreign_keys(CATALOG);
    let report = run(
        &store,
        &RunOptions {
            mode: RunMode::Test,
            ..options("demo")
        },
    )
    .await?;
    assert_eq!(report.summary.total_errors, 0, "{:#?}", errors(&report));
    assert_eq!(report.tracked.len() as u64, report.summary.total_created);

    let cleaned = cleanup_tracked(&store, &report.tracked).await?;
    assert!(cleaned.is_clean(), "{:?}", cleaned.errors);
    assert_eq!(cleaned.deleted, report.summary.total_created);
    assert_eq!(store.total_rows(), 0);
    Ok(())
}

#[tokio::test]
async fn summary_adds_up_to_attempted_records() -> Result<()> {
    let store = MemoryStore::new();
    let report = run(&store, &options("demo")).await?;
    let attempted: u64 = report.results.iter().map(SeederResult::attempted).sum();
    let summary = report.summary;
    assert_eq!(summary.total_created + summary.total_skipped + summary.total_errors, attempted);
    assert!(report.results.iter().all(|result| result.cascades.is_empty()));
    Ok(())
}
