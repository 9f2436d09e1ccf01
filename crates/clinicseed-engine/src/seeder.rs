//! Seeder contract and the table-seeding template.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use clinicseed_core::{Record, RecordSchema, validate_batch};
use clinicseed_report::SeederResult;
use clinicseed_store::Query;

use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::idempotency::{UniqueKeyPolicy, policy_for, upsert, upsert_batched};

/// A unit that populates one logical table.
///
/// `seed` never fails: every error is folded into the returned result.
#[async_trait]
pub trait Seeder: Send + Sync {
    fn table(&self) -> &str;

    async fn seed(&self, ctx: &mut SeedContext<'_>) -> SeederResult;
}

/// Steps of a table seeder. Wrap an implementation in [`Pipeline`] to get
/// a [`Seeder`] that runs load, pre-process, validate, upsert and
/// post-process in order.
#[async_trait]
pub trait TableSeeder: Send + Sync {
    fn table(&self) -> &'static str;

    /// Tenant this instance is bound to, if any.
    fn tenant(&self) -> Option<&str> {
        None
    }

    /// JSON Schema for processed records.
    fn schema(&self) -> Option<Value> {
        None
    }

    fn policy(&self) -> Option<UniqueKeyPolicy> {
        policy_for(self.table())
    }

    /// Column naming the entity a generated history belongs to, such as a
    /// pet or a customer. Candidates whose owner already has rows in the
    /// table are skipped as a group, so a history generated against another
    /// reference date is not generated a second time.
    fn owner_column(&self) -> Option<&'static str> {
        None
    }

    /// Chunk size for bulk inserts; `None` inserts in one pass.
    fn batch_size(&self, _ctx: &SeedContext<'_>) -> Option<usize> {
        None
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError>;

    async fn pre_process(
        &self,
        _ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        Ok(raw)
    }

    /// Runs after a successful upsert with the rows it created.
    async fn post_process(
        &self,
        _ctx: &mut SeedContext<'_>,
        _created: &[Record],
        _result: &mut SeederResult,
    ) -> Result<(), SeedError> {
        Ok(())
    }
}

/// Adapts a [`TableSeeder`] into a [`Seeder`].
pub struct Pipeline<T>(pub T);

impl<T: TableSeeder> Pipeline<T> {
    pub fn boxed(inner: T) -> Box<dyn Seeder>
    where
        T: 'static,
    {
        Box::new(Self(inner))
    }

    async fn run(&self, ctx: &mut SeedContext<'_>) -> Result<SeederResult, SeedError> {
        let seeder = &self.0;
        let table = seeder.table();
        let mut result = SeederResult::new(table);

        let raw = seeder.load_data(ctx).await?;
        if raw.is_empty() {
            debug!(event = "seeder_empty", table, tenant = seeder.tenant().unwrap_or(""));
            return Ok(result);
        }
        let processed = seeder.pre_process(ctx, raw).await?;

        let valid = match seeder.schema() {
            Some(schema) => {
                let schema = RecordSchema::compile(table, &schema)?;
                let batch = validate_batch(&schema, processed);
                if let Some(summary) = batch.summary(table) {
                    warn!(event = "validation_failed", table, invalid = batch.total_invalid);
                    result.warnings.push(summary);
                }
                batch.valid
            }
            None => into_records(table, processed)?,
        };

        if ctx.run.dry_run {
            result.skipped = valid.len() as u64;
            result
                .warnings
                .push(format!("dry run: {} records would be inserted", valid.len()));
            return Ok(result);
        }

        let (valid, seeded) = match seeder.owner_column() {
            Some(column) => without_seeded_owners(ctx, table, column, valid).await?,
            None => (valid, 0),
        };

        let policy = seeder.policy();
        let outcome = match seeder.batch_size(ctx) {
            Some(size) => upsert_batched(ctx.store, table, valid, policy.as_ref(), size).await,
            None => upsert(ctx.store, table, valid, policy.as_ref()).await,
        };
        result.created = outcome.created;
        result.skipped = outcome.skipped + seeded;
        result.errors = outcome.errors;
        result.error_details = outcome.error_details;

        if outcome.created > 0 {
            ctx.cache.invalidate(table);
            ctx.track(table, &outcome.created_records, seeder.tenant());
            seeder
                .post_process(ctx, &outcome.created_records, &mut result)
                .await?;
        }
        Ok(result)
    }
}

#[async_trait]
impl<T: TableSeeder> Seeder for Pipeline<T> {
    fn table(&self) -> &str {
        self.0.table()
    }

    async fn seed(&self, ctx: &mut SeedContext<'_>) -> SeederResult {
        let start = Instant::now();
        let table = self.0.table();
        let tenant = self.0.tenant().unwrap_or("").to_string();

        let outcome = AssertUnwindSafe(self.run(ctx)).catch_unwind().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(mut result)) => {
                result.duration_ms = duration_ms;
                info!(
                    event = "seeder_finished",
                    table,
                    tenant = %tenant,
                    created = result.created,
                    skipped = result.skipped,
                    errors = result.errors,
                    duration_ms,
                );
                result
            }
            Ok(Err(err)) => {
                warn!(event = "seeder_failed", table, tenant = %tenant, error = %err, duration_ms);
                SeederResult::failed(table, err.to_string(), duration_ms)
            }
            Err(panic) => {
                let message = panic_message(panic);
                warn!(event = "seeder_panicked", table, tenant = %tenant, error = %message);
                SeederResult::failed(table, format!("panic: {message}"), duration_ms)
            }
        }
    }
}

/// Drop candidates whose owner already has rows in `table`; returns the
/// remaining candidates and how many were dropped.
async fn without_seeded_owners(
    ctx: &mut SeedContext<'_>,
    table: &str,
    column: &str,
    records: Vec<Record>,
) -> Result<(Vec<Record>, u64), SeedError> {
    let mut owners: Vec<Value> = Vec::new();
    for owner in records.iter().filter_map(|record| record.get(column)) {
        if !owner.is_null() && !owners.contains(owner) {
            owners.push(owner.clone());
        }
    }
    if owners.is_empty() {
        return Ok((records, 0));
    }

    let query = Query::new().is_in(column, owners).columns(&[column]);
    let seeded: Vec<Value> = ctx
        .store
        .select(table, &query)
        .await?
        .into_iter()
        .filter_map(|row| row.get(column).cloned())
        .collect();
    if seeded.is_empty() {
        return Ok((records, 0));
    }

    let (kept, dropped): (Vec<Record>, Vec<Record>) = records
        .into_iter()
        .partition(|record| record.get(column).is_none_or(|owner| !seeded.contains(owner)));
    debug!(event = "history_exists", table, column, skipped = dropped.len());
    Ok((kept, dropped.len() as u64))
}

fn into_records(table: &str, values: Vec<Value>) -> Result<Vec<Record>, SeedError> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(record) => Ok(record),
            _ => Err(SeedError::Invalid(format!(
                "{table}: record {index} is not an object"
            ))),
        })
        .collect()
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during seeding".to_string()
    }
}

/// Upsert a child table's rows and record them as a cascade of `parent`.
/// Returns the rows that were created.
pub(crate) async fn cascade(
    ctx: &mut SeedContext<'_>,
    parent: &mut SeederResult,
    table: &str,
    tenant: Option<&str>,
    rows: Vec<Record>,
    started: Instant,
) -> Vec<Record> {
    let outcome = upsert(ctx.store, table, rows, policy_for(table).as_ref()).await;
    if outcome.created > 0 {
        ctx.cache.invalidate(table);
        ctx.track(table, &outcome.created_records, tenant);
    }
    parent.push_cascade(SeederResult {
        created: outcome.created,
        skipped: outcome.skipped,
        errors: outcome.errors,
        error_details: outcome.error_details,
        duration_ms: started.elapsed().as_millis() as u64,
        ..SeederResult::new(table)
    });
    outcome.created_records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::fixtures::MemoryFixtures;
    use clinicseed_store::MemoryStore;
    use serde_json::json;

    struct Fixed {
        rows: Vec<Value>,
        fail_post: bool,
        panic_load: bool,
    }

    #[async_trait]
    impl TableSeeder for Fixed {
        fn table(&self) -> &'static str {
            "kennels"
        }

        fn schema(&self) -> Option<Value> {
            Some(json!({
                "type": "object",
                "required": ["code"],
                "properties": {"code": {"type": "string"}}
            }))
        }

        async fn load_data(&self, _ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
            if self.panic_load {
                panic!("fixture generator exploded");
            }
            Ok(self.rows.clone())
        }

        async fn post_process(
            &self,
            _ctx: &mut SeedContext<'_>,
            _created: &[Record],
            _result: &mut SeederResult,
        ) -> Result<(), SeedError> {
            if self.fail_post {
                return Err(SeedError::Invalid("cascade failed".into()));
            }
            Ok(())
        }
    }

    fn fixed(rows: Vec<Value>) -> Fixed {
        Fixed {
            rows,
            fail_post: false,
            panic_load: false,
        }
    }

    #[tokio::test]
    async fn invalid_records_become_a_warning() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new();
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let rows = vec![json!({"code": "K1"}), json!({"code": 2}), json!({"code": "K3"})];
        let result = Pipeline(fixed(rows)).seed(&mut ctx).await;
        assert_eq!((result.created, result.errors), (2, 0));
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("1/3 records failed validation"));
    }

    #[tokio::test]
    async fn dry_run_counts_valid_records_as_skipped() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new();
        let run = RunContext {
            dry_run: true,
            ..RunContext::default()
        };
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let result = Pipeline(fixed(vec![json!({"code": "K1"}), json!({"code": "K2"})]))
            .seed(&mut ctx)
            .await;
        assert_eq!((result.created, result.skipped), (0, 2));
        assert_eq!(result.warnings, vec!["dry run: 2 records would be inserted"]);
        assert_eq!(store.total_mutations(), 0);
    }

    struct History {
        rows: Vec<Value>,
    }

    #[async_trait]
    impl TableSeeder for History {
        fn table(&self) -> &'static str {
            "weight_records"
        }

        fn owner_column(&self) -> Option<&'static str> {
            Some("pet_id")
        }

        async fn load_data(&self, _ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
            Ok(self.rows.clone())
        }
    }

    #[tokio::test]
    async fn owners_with_a_history_are_skipped_whole() {
        let store = MemoryStore::new();
        store.preload(
            "weight_records",
            vec![json!({"pet_id": "pet-1", "recorded_at": "2026-03-14T10:00:00Z"})
                .as_object()
                .cloned()
                .unwrap()],
        );
        let fixtures = MemoryFixtures::new();
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        // Same pets, timestamps shifted by a day.
        let rows = vec![
            json!({"pet_id": "pet-1", "recorded_at": "2026-03-15T10:00:00Z"}),
            json!({"pet_id": "pet-1", "recorded_at": "2026-02-13T10:00:00Z"}),
            json!({"pet_id": "pet-2", "recorded_at": "2026-03-15T10:00:00Z"}),
        ];
        let result = Pipeline(History { rows }).seed(&mut ctx).await;
        assert_eq!((result.created, result.skipped), (1, 2));
        assert_eq!(store.count("weight_records"), 2);
    }

    #[tokio::test]
    async fn errors_and_panics_become_single_errors() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new();
        let run = RunContext::default();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let failing = Fixed {
            fail_post: true,
            ..fixed(vec![json!({"code": "K1"})])
        };
        let result = Pipeline(failing).seed(&mut ctx).await;
        assert_eq!(result.errors, 1);
        assert_eq!(result.error_details, vec!["cascade failed"]);

        let panicking = Fixed {
            panic_load: true,
            ..fixed(Vec::new())
        };
        let result = Pipeline(panicking).seed(&mut ctx).await;
        assert_eq!(result.errors, 1);
        assert!(result.error_details[0].contains("fixture generator exploded"));
    }
}
