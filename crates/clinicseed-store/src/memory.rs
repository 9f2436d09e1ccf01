use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::adapter::Store;
use crate::error::{StoreError, StoreResult};
use crate::query::{Direction, Filter, Query, compare_values, validate_identifier, values_equal};
use clinicseed_core::{Record, TableDef, project, record_id};

/// Mutation recorded by [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, Vec<Record>>,
    mutations: Vec<(MutationKind, String)>,
}

/// In-process store used by tests and dry experiments.
///
/// Rows get a generated UUID `id` when they have none. Constraint checks are
/// opt-in: foreign keys from a table catalog, unique column sets, and a
/// closed set of known tables that makes every other table "missing".
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    foreign_keys: BTreeMap<String, Vec<(String, String)>>,
    unique: BTreeMap<String, Vec<Vec<String>>>,
    known_tables: Option<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce the foreign keys declared by `catalog` on insert and delete.
    pub fn with_foreign_keys(mut self, catalog: &[TableDef]) -> Self {
        for table in catalog {
            let refs = self.foreign_keys.entry(table.name.to_string()).or_default();
            for reference in table.references {
                refs.push((reference.column.to_string(), reference.table.to_string()));
            }
        }
        self
    }

    /// Reject inserts that duplicate `columns` of an existing row.
    pub fn with_unique(mut self, table: &str, columns: &[&str]) -> Self {
        self.unique
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|column| column.to_string()).collect());
        self
    }

    /// Only these tables exist; touching any other one fails with
    /// [`StoreError::MissingRelation`].
    pub fn with_known_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    /// Place rows directly, bypassing constraint checks and the mutation log.
    pub fn preload(&self, table: &str, rows: Vec<Record>) {
        let mut state = self.lock();
        let stored = state.tables.entry(table.to_string()).or_default();
        for mut row in rows {
            ensure_id(&mut row);
            stored.push(row);
        }
    }

    /// Snapshot of every row in `table`.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map(Vec::len).unwrap_or(0)
    }

    /// Total rows across every table.
    pub fn total_rows(&self) -> usize {
        self.lock().tables.values().map(Vec::len).sum()
    }

    /// Number of successful writes of the given kind.
    pub fn mutation_count(&self, kind: MutationKind) -> usize {
        self.lock()
            .mutations
            .iter()
            .filter(|(recorded, _)| *recorded == kind)
            .count()
    }

    /// Number of successful writes of any kind.
    pub fn total_mutations(&self) -> usize {
        self.lock().mutations.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-write; the rows are
        // still usable for inspection.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_table(&self, table: &str) -> StoreResult<()> {
        validate_identifier(table)?;
        match &self.known_tables {
            Some(known) if !known.contains(table) => Err(StoreError::MissingRelation {
                table: table.to_string(),
                message: format!("relation \"{table}\" does not exist"),
            }),
            _ => Ok(()),
        }
    }

    fn check_foreign_keys(&self, state: &MemoryState, table: &str, row: &Record) -> StoreResult<()> {
        let Some(refs) = self.foreign_keys.get(table) else {
            return Ok(());
        };
        for (column, target) in refs {
            let Some(value) = row.get(column).filter(|value| !value.is_null()) else {
                continue;
            };
            let exists = state.tables.get(target).is_some_and(|rows| {
                rows.iter()
                    .any(|candidate| candidate.get("id").is_some_and(|id| values_equal(id, value)))
            });
            if !exists {
                return Err(StoreError::ForeignKey {
                    table: table.to_string(),
                    message: format!("{column}={value} is not present in {target}"),
                });
            }
        }
        Ok(())
    }

    fn check_unique(&self, state: &MemoryState, table: &str, row: &Record) -> StoreResult<()> {
        let Some(constraints) = self.unique.get(table) else {
            return Ok(());
        };
        let Some(rows) = state.tables.get(table) else {
            return Ok(());
        };
        for columns in constraints {
            let duplicate = rows.iter().any(|existing| {
                columns.iter().all(|column| match (existing.get(column), row.get(column)) {
                    (Some(left), Some(right)) if !left.is_null() => values_equal(left, right),
                    _ => false,
                })
            });
            if duplicate {
                return Err(StoreError::Conflict {
                    table: table.to_string(),
                    message: format!("duplicate key on ({})", columns.join(", ")),
                });
            }
        }
        Ok(())
    }

    /// Rows in other tables that still point at one of `ids`.
    fn referencing_table(&self, state: &MemoryState, table: &str, ids: &[Value]) -> Option<String> {
        for (child, refs) in &self.foreign_keys {
            let Some(rows) = state.tables.get(child) else {
                continue;
            };
            for (column, target) in refs {
                if target != table {
                    continue;
                }
                let referenced = rows.iter().any(|row| {
                    row.get(column)
                        .is_some_and(|value| ids.iter().any(|id| values_equal(id, value)))
                });
                if referenced && child != table {
                    return Some(child.clone());
                }
            }
        }
        None
    }
}

fn ensure_id(row: &mut Record) {
    if record_id(row).is_none() {
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
}

fn matches_all(filters: &[Filter], row: &Record) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Record>> {
        self.check_table(table)?;
        query.validate()?;

        let state = self.lock();
        let mut rows: Vec<Record> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(&query.filters, row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|left, right| {
                let ordering = compare_values(left.get(column), right.get(column));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if !query.columns.is_empty() {
            let columns: Vec<&str> = query.columns.iter().map(String::as_str).collect();
            rows = rows.iter().map(|row| project(row, &columns)).collect();
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, record: &Record) -> StoreResult<Record> {
        self.check_table(table)?;
        for column in record.keys() {
            validate_identifier(column)?;
        }

        let mut row = record.clone();
        ensure_id(&mut row);

        let mut state = self.lock();
        self.check_foreign_keys(&state, table, &row)?;
        self.check_unique(&state, table, &row)?;
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        state.mutations.push((MutationKind::Insert, table.to_string()));
        Ok(row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: &Record) -> StoreResult<u64> {
        self.check_table(table)?;
        let mut state = self.lock();

        let mut staged = Vec::new();
        if let Some(rows) = state.tables.get(table) {
            for (index, row) in rows.iter().enumerate() {
                if matches_all(filters, row) {
                    let mut updated = row.clone();
                    for (key, value) in patch {
                        updated.insert(key.clone(), value.clone());
                    }
                    staged.push((index, updated));
                }
            }
        }
        for (_, updated) in &staged {
            self.check_foreign_keys(&state, table, updated)?;
        }

        let touched = staged.len() as u64;
        if let Some(rows) = state.tables.get_mut(table) {
            for (index, updated) in staged {
                rows[index] = updated;
            }
        }
        if touched > 0 {
            state.mutations.push((MutationKind::Update, table.to_string()));
        }
        Ok(touched)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        self.check_table(table)?;
        let mut state = self.lock();

        let doomed: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(filters, row))
                    .filter_map(|row| row.get("id").cloned())
                    .collect()
            })
            .unwrap_or_default();
        if doomed.is_empty() {
            return Ok(0);
        }

        if let Some(child) = self.referencing_table(&state, table, &doomed) {
            return Err(StoreError::ForeignKey {
                table: table.to_string(),
                message: format!("rows are still referenced from {child}"),
            });
        }

        let mut removed = 0u64;
        if let Some(rows) = state.tables.get_mut(table) {
            let before = rows.len();
            rows.retain(|row| !matches_all(filters, row));
            removed = (before - rows.len()) as u64;
        }
        state.mutations.push((MutationKind::Delete, table.to_string()));
        Ok(removed)
    }
}
