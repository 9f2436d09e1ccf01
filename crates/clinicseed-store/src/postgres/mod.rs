use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::types::Json;
use tracing::debug;

use crate::adapter::Store;
use crate::error::{StoreError, StoreResult};
use crate::query::{Filter, Query};
use clinicseed_core::Record;

mod sql;

pub use sql::{Bind, Statement};

/// Store backed by a direct PostgreSQL connection.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url`; the service key is used as the password when the
    /// URL does not carry one.
    pub async fn connect(url: &str, service_key: &str) -> StoreResult<Self> {
        let mut options =
            PgConnectOptions::from_str(url).map_err(|err| StoreError::Config(err.to_string()))?;
        if !url_has_password(url) {
            options = options.password(service_key);
        }
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|err| map_sqlx_error("<connect>", err))?;
        Ok(Self { pool })
    }

    async fn fetch_rows(&self, table: &str, statement: Statement) -> StoreResult<Vec<Record>> {
        let mut query = sqlx::query_scalar::<_, Json<Value>>(&statement.sql);
        for bind in statement.binds {
            query = match bind {
                Bind::Json(value) => query.bind(Json(value)),
                Bind::Text(text) => query.bind(text),
            };
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| map_sqlx_error(table, err))?;

        rows.into_iter()
            .map(|Json(row)| match row {
                Value::Object(record) => Ok(record),
                other => Err(StoreError::InvalidResponse(format!(
                    "expected row object from {table}, got {other}"
                ))),
            })
            .collect()
    }

    async fn execute(&self, table: &str, statement: Statement) -> StoreResult<u64> {
        let mut query = sqlx::query(&statement.sql);
        for bind in statement.binds {
            query = match bind {
                Bind::Json(value) => query.bind(Json(value)),
                Bind::Text(text) => query.bind(text),
            };
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx_error(table, err))?;
        Ok(result.rows_affected())
    }
}

fn url_has_password(url: &str) -> bool {
    let Some((_, rest)) = url.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?']).next().unwrap_or("");
    authority
        .rsplit_once('@')
        .is_some_and(|(credentials, _)| credentials.contains(':'))
}

fn map_sqlx_error(table: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.to_string());
            StoreError::from_code(code.as_deref(), table, db.message())
        }
        other => StoreError::Db {
            table: table.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Record>> {
        let statement = sql::select(table, query)?;
        debug!(event = "store_select", backend = "postgres", table, filters = query.filters.len());
        let rows = self.fetch_rows(table, statement).await?;
        if query.columns.is_empty() {
            return Ok(rows);
        }
        let columns: Vec<&str> = query.columns.iter().map(String::as_str).collect();
        Ok(rows
            .iter()
            .map(|row| clinicseed_core::project(row, &columns))
            .collect())
    }

    async fn insert(&self, table: &str, record: &Record) -> StoreResult<Record> {
        let statement = sql::insert(table, record)?;
        let mut rows = self.fetch_rows(table, statement).await?;
        if rows.is_empty() {
            return Err(StoreError::InvalidResponse(format!(
                "insert into {table} returned no row"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: &Record) -> StoreResult<u64> {
        if patch.is_empty() {
            return Ok(0);
        }
        let statement = sql::update(table, filters, patch)?;
        self.execute(table, statement).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        let statement = sql::delete(table, filters)?;
        self.execute(table, statement).await
    }
}
