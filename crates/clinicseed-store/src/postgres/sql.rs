//! Dynamic SQL for the row API.
//!
//! Filter values are never spliced into the statement. Equality values are
//! collected into one JSON object and turned into a typed row with
//! `jsonb_populate_record`, so every comparison happens with the column's
//! native type (timestamps, uuids, enums) instead of through text.

use serde_json::{Map, Value};

use crate::error::StoreResult;
use crate::query::{Direction, Filter, Query, escape_like, validate_identifier};
use clinicseed_core::Record;

/// Value bound to a positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Json(Value),
    Text(String),
}

/// A statement and its parameters in positional order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Bind>,
}

pub fn quote_ident(name: &str) -> StoreResult<String> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Conditions over alias `t`, with the key row available as alias `k`.
///
/// The key object is always parameter `$1`; further parameters follow.
struct Conditions {
    clauses: Vec<String>,
    key: Map<String, Value>,
    binds: Vec<Bind>,
}

fn conditions(table: &str, filters: &[Filter], first_param: usize) -> StoreResult<Conditions> {
    let table = quote_ident(table)?;
    let mut clauses = Vec::new();
    let mut key = Map::new();
    let mut binds = Vec::new();

    for filter in filters {
        let column = quote_ident(filter.column())?;
        match filter {
            Filter::Eq(_, Value::Null) | Filter::IsNull(_) => {
                clauses.push(format!("t.{column} is null"));
            }
            Filter::Eq(name, value) => {
                key.insert(name.clone(), value.clone());
                clauses.push(format!("t.{column} = k.{column}"));
            }
            Filter::EqIgnoreCase(_, value) => {
                binds.push(Bind::Text(value.clone()));
                let index = first_param + binds.len();
                clauses.push(format!("lower(t.{column}::text) = lower(${index})"));
            }
            Filter::In(name, values) => {
                binds.push(Bind::Json(Value::Array(values.clone())));
                let index = first_param + binds.len();
                clauses.push(format!(
                    "t.{column} in (select (jsonb_populate_record(null::{table}, \
                     jsonb_build_object('{name}', e.value))).{column} \
                     from jsonb_array_elements(${index}::jsonb) as e)"
                ));
            }
            Filter::StartsWith(_, prefix) => {
                binds.push(Bind::Text(format!("{}%", escape_like(prefix))));
                let index = first_param + binds.len();
                clauses.push(format!("t.{column}::text like ${index}"));
            }
        }
    }

    Ok(Conditions {
        clauses,
        key,
        binds,
    })
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" where {}", clauses.join(" and "))
    }
}

pub fn select(table: &str, query: &Query) -> StoreResult<Statement> {
    query.validate()?;
    let quoted = quote_ident(table)?;
    let conds = conditions(table, &query.filters, 1)?;

    let mut sql = format!(
        "select to_jsonb(t.*) as row from {quoted} as t, \
         jsonb_populate_record(null::{quoted}, $1::jsonb) as k{}",
        where_clause(&conds.clauses)
    );
    if let Some((column, direction)) = &query.order {
        let direction = match direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        sql.push_str(&format!(" order by t.{} {direction}", quote_ident(column)?));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" limit {limit}"));
    }

    let mut binds = vec![Bind::Json(Value::Object(conds.key))];
    binds.extend(conds.binds);
    Ok(Statement { sql, binds })
}

pub fn insert(table: &str, record: &Record) -> StoreResult<Statement> {
    let quoted = quote_ident(table)?;
    let columns = record
        .keys()
        .map(|column| quote_ident(column))
        .collect::<StoreResult<Vec<_>>>()?;

    let sql = if columns.is_empty() {
        format!("insert into {quoted} as t default values returning to_jsonb(t.*) as row")
    } else {
        let list = columns.join(", ");
        let source: Vec<String> = columns.iter().map(|column| format!("p.{column}")).collect();
        format!(
            "insert into {quoted} as t ({list}) \
             select {} from jsonb_populate_record(null::{quoted}, $1::jsonb) as p \
             returning to_jsonb(t.*) as row",
            source.join(", ")
        )
    };

    Ok(Statement {
        sql,
        binds: vec![Bind::Json(Value::Object(record.clone()))],
    })
}

pub fn update(table: &str, filters: &[Filter], patch: &Record) -> StoreResult<Statement> {
    let quoted = quote_ident(table)?;
    let conds = conditions(table, filters, 2)?;
    let columns = patch
        .keys()
        .map(|column| quote_ident(column))
        .collect::<StoreResult<Vec<_>>>()?;
    let assignments: Vec<String> = columns
        .iter()
        .map(|column| format!("{column} = p.{column}"))
        .collect();

    let sql = format!(
        "update {quoted} as t set {} \
         from jsonb_populate_record(null::{quoted}, $1::jsonb) as k, \
         jsonb_populate_record(null::{quoted}, $2::jsonb) as p{}",
        assignments.join(", "),
        where_clause(&conds.clauses)
    );

    let mut binds = vec![
        Bind::Json(Value::Object(conds.key)),
        Bind::Json(Value::Object(patch.clone())),
    ];
    binds.extend(conds.binds);
    Ok(Statement { sql, binds })
}

pub fn delete(table: &str, filters: &[Filter]) -> StoreResult<Statement> {
    let quoted = quote_ident(table)?;
    let conds = conditions(table, filters, 1)?;
    let sql = format!(
        "delete from {quoted} as t \
         using jsonb_populate_record(null::{quoted}, $1::jsonb) as k{}",
        where_clause(&conds.clauses)
    );
    let mut binds = vec![Bind::Json(Value::Object(conds.key))];
    binds.extend(conds.binds);
    Ok(Statement { sql, binds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_binds_equality_through_key_row() {
        let statement = select(
            "appointments",
            &Query::new()
                .eq("tenant_id", "adris")
                .eq("start_time", "2026-03-01T10:00:00Z")
                .filter(Filter::IsNull("deleted_at".into()))
                .order_by("start_time", Direction::Asc)
                .limit(5),
        )
        .unwrap();

        assert!(statement.sql.contains("t.\"tenant_id\" = k.\"tenant_id\""));
        assert!(statement.sql.contains("t.\"deleted_at\" is null"));
        assert!(statement.sql.ends_with("order by t.\"start_time\" asc limit 5"));
        assert_eq!(
            statement.binds,
            vec![Bind::Json(json!({
                "tenant_id": "adris",
                "start_time": "2026-03-01T10:00:00Z"
            }))]
        );
    }

    #[test]
    fn extra_parameters_are_numbered_after_the_key() {
        let statement = select(
            "profiles",
            &Query::new()
                .filter(Filter::EqIgnoreCase("email".into(), "A@B.C".into()))
                .is_in("role", vec![json!("vet"), json!("admin")]),
        )
        .unwrap();
        assert!(statement.sql.contains("lower($2)"));
        assert!(statement.sql.contains("jsonb_array_elements($3::jsonb)"));
        assert_eq!(statement.binds.len(), 3);

        let statement = select(
            "invoices",
            &Query::new()
                .eq("tenant_id", "adris")
                .filter(Filter::StartsWith("invoice_number".into(), "INV-2026-".into())),
        )
        .unwrap();
        assert!(statement.sql.contains("t.\"invoice_number\"::text like $2"));
        assert_eq!(statement.binds[1], Bind::Text("INV-2026-%".into()));
    }

    #[test]
    fn update_reserves_two_leading_parameters() {
        let mut patch = Record::new();
        patch.insert("parent_id".into(), json!("p-1"));
        let statement = update(
            "store_categories",
            &[Filter::EqIgnoreCase("slug".into(), "Perros".into())],
            &patch,
        )
        .unwrap();
        assert!(statement.sql.contains("set \"parent_id\" = p.\"parent_id\""));
        assert!(statement.sql.contains("lower($3)"));
    }

    #[test]
    fn insert_projects_typed_columns() {
        let mut record = Record::new();
        record.insert("name".into(), json!("Rex"));
        let statement = insert("pets", &record).unwrap();
        assert!(statement.sql.starts_with("insert into \"pets\" as t (\"name\") select p.\"name\""));
    }

    #[test]
    fn identifiers_are_validated() {
        assert!(delete("pets; drop table x", &[]).is_err());
        assert!(select("pets", &Query::new().eq("Name", "x")).is_err());
    }
}
