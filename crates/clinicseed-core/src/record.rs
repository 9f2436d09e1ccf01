use serde_json::{Map, Value};

/// An untyped row: column name to JSON value.
///
/// An absent key and an explicit `null` are different things: the former
/// means "unknown", the latter "known to be empty".
pub type Record = Map<String, Value>;

/// Storage identifier of a row, rendered as a string.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Borrow a string column.
pub fn str_field<'a>(record: &'a Record, column: &str) -> Option<&'a str> {
    record.get(column).and_then(Value::as_str)
}

/// Keep only the listed columns that are present on the record.
pub fn project(record: &Record, columns: &[&str]) -> Record {
    let mut projected = Map::new();
    for column in columns {
        if let Some(value) = record.get(*column) {
            projected.insert((*column).to_string(), value.clone());
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn record_id_accepts_strings_and_numbers() {
        assert_eq!(record_id(&record(json!({"id": "abc"}))).as_deref(), Some("abc"));
        assert_eq!(record_id(&record(json!({"id": 42}))).as_deref(), Some("42"));
        assert_eq!(record_id(&record(json!({"id": null}))), None);
    }

    #[test]
    fn project_drops_unknown_columns() {
        let source = record(json!({"name": "Rex", "nickname": "R", "age": null}));
        let projected = project(&source, &["name", "age", "weight"]);
        assert_eq!(Value::Object(projected), json!({"name": "Rex", "age": null}));
    }
}
