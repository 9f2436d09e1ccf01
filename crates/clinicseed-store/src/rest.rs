use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::adapter::Store;
use crate::error::{StoreError, StoreResult};
use crate::query::{Direction, Filter, Query, escape_like, validate_identifier};
use clinicseed_core::Record;

/// Store backed by a PostgREST endpoint (`{url}/rest/v1/{table}`).
///
/// The service key is sent both as `apikey` and as a bearer token, which is
/// what hosted PostgREST gateways expect for privileged access.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(url: &str, service_key: impl Into<String>) -> StoreResult<Self> {
        Self::build(url, service_key.into(), None)
    }

    /// Like [`RestStore::new`], failing any request that takes longer than
    /// `timeout`.
    pub fn with_timeout(
        url: &str,
        service_key: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        Self::build(url, service_key.into(), Some(timeout))
    }

    fn build(url: &str, service_key: String, timeout: Option<Duration>) -> StoreResult<Self> {
        let trimmed = url.trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(StoreError::Config(format!(
                "REST store URL must be http(s), got '{url}'"
            )));
        }
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| StoreError::Config(err.to_string()))?;
        Ok(Self {
            client,
            base_url: format!("{trimmed}/rest/v1"),
            service_key,
        })
    }

    fn request(&self, method: Method, table: &str) -> StoreResult<RequestBuilder> {
        validate_identifier(table)?;
        Ok(self
            .client
            .request(method, format!("{}/{table}", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key))
    }

    async fn rows(&self, table: &str, request: RequestBuilder) -> StoreResult<Vec<Record>> {
        let response = request
            .send()
            .await
            .map_err(|err| StoreError::Http(err.to_string()))?;
        let response = check_status(table, response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(StoreError::InvalidResponse(format!(
                        "expected row object, got {other}"
                    ))),
                })
                .collect(),
            other => Err(StoreError::InvalidResponse(format!(
                "expected row array, got {other}"
            ))),
        }
    }
}

async fn check_status(table: &str, response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let parsed: Option<Value> = serde_json::from_str(&text).ok();
    let code = parsed
        .as_ref()
        .and_then(|body| body.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = parsed
        .as_ref()
        .and_then(|body| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{status}: {text}"));
    Err(StoreError::from_code(code.as_deref(), table, message))
}

/// Render a scalar the way PostgREST expects it inside a filter.
fn filter_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Quote a member of an `in.(...)` list.
fn quote_list_item(value: &Value) -> String {
    let literal = filter_literal(value);
    format!("\"{}\"", literal.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Escape LIKE metacharacters so `ilike` behaves as case-insensitive equality.
/// Translate filters into PostgREST query parameters.
pub(crate) fn filter_params(filters: &[Filter]) -> StoreResult<Vec<(String, String)>> {
    filters
        .iter()
        .map(|filter| {
            validate_identifier(filter.column())?;
            let param = match filter {
                Filter::Eq(column, Value::Null) | Filter::IsNull(column) => {
                    (column.clone(), "is.null".to_string())
                }
                Filter::Eq(column, value) => (column.clone(), format!("eq.{}", filter_literal(value))),
                Filter::EqIgnoreCase(column, value) => {
                    (column.clone(), format!("ilike.{}", escape_like(value)))
                }
                Filter::In(column, values) => {
                    let items: Vec<String> = values.iter().map(quote_list_item).collect();
                    (column.clone(), format!("in.({})", items.join(",")))
                }
                Filter::StartsWith(column, prefix) => {
                    (column.clone(), format!("like.{}*", escape_like(prefix)))
                }
            };
            Ok(param)
        })
        .collect()
}

pub(crate) fn select_params(query: &Query) -> StoreResult<Vec<(String, String)>> {
    query.validate()?;
    let mut params = vec![(
        "select".to_string(),
        if query.columns.is_empty() {
            "*".to_string()
        } else {
            query.columns.join(",")
        },
    )];
    params.extend(filter_params(&query.filters)?);
    if let Some((column, direction)) = &query.order {
        let direction = match direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{direction}")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    Ok(params)
}

#[async_trait]
impl Store for RestStore {
    fn backend(&self) -> &'static str {
        "rest"
    }

    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Record>> {
        let params = select_params(query)?;
        debug!(event = "store_select", backend = "rest", table, filters = query.filters.len());
        let request = self.request(Method::GET, table)?.query(&params);
        self.rows(table, request).await
    }

    async fn insert(&self, table: &str, record: &Record) -> StoreResult<Record> {
        let request = self
            .request(Method::POST, table)?
            .header("Prefer", "return=representation")
            .json(&[record]);
        let mut rows = self.rows(table, request).await?;
        if rows.is_empty() {
            return Err(StoreError::InvalidResponse(format!(
                "insert into {table} returned no row"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: &Record) -> StoreResult<u64> {
        let params = filter_params(filters)?;
        let request = self
            .request(Method::PATCH, table)?
            .query(&params)
            .header("Prefer", "return=representation")
            .json(patch);
        Ok(self.rows(table, request).await?.len() as u64)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        let params = filter_params(filters)?;
        let request = self
            .request(Method::DELETE, table)?
            .query(&params)
            .header("Prefer", "return=representation");
        Ok(self.rows(table, request).await?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_filters_as_postgrest_operators() {
        let params = filter_params(&[
            Filter::eq("tenant_id", "adris"),
            Filter::eq("owner_id", Value::Null),
            Filter::EqIgnoreCase("email".into(), "ana_b@x.com".into()),
            Filter::In("id".into(), vec![json!("a"), json!("b,c")]),
            Filter::StartsWith("order_number".into(), "LAB-2026-".into()),
        ])
        .unwrap();

        assert_eq!(
            params,
            vec![
                ("tenant_id".to_string(), "eq.adris".to_string()),
                ("owner_id".to_string(), "is.null".to_string()),
                ("email".to_string(), "ilike.ana\\_b@x.com".to_string()),
                ("id".to_string(), "in.(\"a\",\"b,c\")".to_string()),
                ("order_number".to_string(), "like.LAB-2026-*".to_string()),
            ]
        );
    }

    #[test]
    fn select_params_include_projection_order_and_limit() {
        let params = select_params(
            &Query::new()
                .columns(&["id", "order_number"])
                .order_by("order_number", Direction::Desc)
                .limit(1),
        )
        .unwrap();
        assert_eq!(params[0], ("select".to_string(), "id,order_number".to_string()));
        assert!(params.contains(&("order".to_string(), "order_number.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "1".to_string())));
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            RestStore::new("postgres://localhost/db", "key"),
            Err(StoreError::Config(_))
        ));
        assert!(RestStore::new("https://abc.example.co/", "key").is_ok());
    }
}
