use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use clinicseed_core::{Record, record_id, str_field};
use clinicseed_report::{RunMode, TrackedResource};
use clinicseed_store::{Filter, Query, Store, StoreResult};

use crate::fixtures::Fixtures;

/// Default chunk size for bulk inserts.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Settings shared by every seeder of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub mode: RunMode,
    pub dry_run: bool,
    pub verbose: bool,
    /// Day that generated timelines are anchored on. Re-running on the same
    /// reference date produces the same generated rows.
    pub reference_date: NaiveDate,
    pub batch_size: usize,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            mode: RunMode::Seed,
            dry_run: false,
            verbose: false,
            reference_date: Utc::now().date_naive(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RunContext {
    /// Midnight UTC of the reference date.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_date.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Lookups reused across seeders within one run.
///
/// Entries are keyed by table so that a write to a table drops everything
/// derived from it.
#[derive(Debug, Default)]
pub struct RunCache {
    id_maps: BTreeMap<String, BTreeMap<String, Value>>,
    rows: BTreeMap<String, Vec<Record>>,
}

impl RunCache {
    /// Map from `key_column` to `id` for rows of `table` matching `filters`.
    pub async fn id_map(
        &mut self,
        store: &dyn Store,
        table: &str,
        key_column: &str,
        filters: Vec<Filter>,
    ) -> StoreResult<BTreeMap<String, Value>> {
        let cache_key = format!("{table}:{key_column}:{filters:?}");
        if let Some(map) = self.id_maps.get(&cache_key) {
            return Ok(map.clone());
        }

        let query = Query::new()
            .filters(filters)
            .columns(&["id", key_column]);
        let rows = store.select(table, &query).await?;
        let map: BTreeMap<String, Value> = rows
            .iter()
            .filter_map(|row| {
                let key = str_field(row, key_column)?;
                let id = row.get("id")?.clone();
                Some((key.to_string(), id))
            })
            .collect();

        self.id_maps.insert(cache_key, map.clone());
        Ok(map)
    }

    /// Rows of `table` matching `query`, cached under `name`.
    pub async fn rows(
        &mut self,
        store: &dyn Store,
        table: &str,
        name: &str,
        query: Query,
    ) -> StoreResult<Vec<Record>> {
        let cache_key = format!("{table}:{name}");
        if let Some(rows) = self.rows.get(&cache_key) {
            return Ok(rows.clone());
        }
        let rows = store.select(table, &query).await?;
        self.rows.insert(cache_key, rows.clone());
        Ok(rows)
    }

    /// Forget everything loaded from `table`.
    pub fn invalidate(&mut self, table: &str) {
        let prefix = format!("{table}:");
        self.id_maps.retain(|key, _| !key.starts_with(&prefix));
        self.rows.retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn is_empty(&self) -> bool {
        self.id_maps.is_empty() && self.rows.is_empty()
    }
}

/// Everything a seeder can reach during a run.
pub struct SeedContext<'a> {
    pub store: &'a dyn Store,
    pub fixtures: &'a dyn Fixtures,
    pub run: &'a RunContext,
    pub cache: RunCache,
    tracked: Vec<TrackedResource>,
}

impl<'a> SeedContext<'a> {
    pub fn new(store: &'a dyn Store, fixtures: &'a dyn Fixtures, run: &'a RunContext) -> Self {
        Self {
            store,
            fixtures,
            run,
            cache: RunCache::default(),
            tracked: Vec::new(),
        }
    }

    /// Remember created rows when the run mode asks for it.
    pub fn track(&mut self, table: &str, created: &[Record], tenant: Option<&str>) {
        if !self.run.mode.tracks_resources() {
            return;
        }
        for row in created {
            if let Some(id) = record_id(row) {
                self.tracked.push(TrackedResource {
                    table: table.to_string(),
                    id,
                    tenant: tenant.map(str::to_string),
                });
            }
        }
    }

    pub fn tracked(&self) -> &[TrackedResource] {
        &self.tracked
    }

    pub fn into_tracked(self) -> Vec<TrackedResource> {
        self.tracked
    }
}
