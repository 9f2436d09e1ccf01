use std::fmt;

use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;

use crate::error::{CoreError, Result};
use crate::record::Record;

/// Number of offending records spelled out in summaries.
pub const MAX_REPORTED_INVALID: usize = 3;

/// A compiled JSON Schema describing one entity's records.
///
/// `default` values declared under `properties` are applied to records that
/// pass validation but omit the property.
pub struct RecordSchema {
    name: String,
    compiled: JSONSchema,
    defaults: Vec<(String, Value)>,
}

impl fmt::Debug for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl RecordSchema {
    /// Compile a schema document.
    pub fn compile(name: impl Into<String>, schema: &Value) -> Result<Self> {
        let name = name.into();
        let compiled = JSONSchema::compile(schema).map_err(|err| CoreError::InvalidSchema {
            name: name.clone(),
            message: err.to_string(),
        })?;

        let defaults = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .filter_map(|(key, property)| {
                        property
                            .get("default")
                            .map(|value| (key.clone(), value.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name,
            compiled,
            defaults,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate a single value, returning the record with defaults applied.
    pub fn validate(&self, value: Value) -> std::result::Result<Record, (Value, Vec<String>)> {
        let messages: Vec<String> = match self.compiled.validate(&value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    let path = path.trim_start_matches('/');
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path.replace('/', "."), error)
                    }
                })
                .collect(),
        };

        if !messages.is_empty() {
            return Err((value, messages));
        }

        match value {
            Value::Object(mut record) => {
                for (key, default) in &self.defaults {
                    if !record.contains_key(key) {
                        record.insert(key.clone(), default.clone());
                    }
                }
                Ok(record)
            }
            other => Err((other, vec!["expected an object".to_string()])),
        }
    }
}

/// A record rejected by validation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRecord {
    pub index: usize,
    pub record: Value,
    pub errors: Vec<String>,
}

/// Partition of a batch into valid and invalid records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchValidation {
    pub valid: Vec<Record>,
    pub invalid: Vec<InvalidRecord>,
    pub total_valid: usize,
    pub total_invalid: usize,
}

impl BatchValidation {
    /// One-line summary of the first few invalid records, if any.
    pub fn summary(&self, context: &str) -> Option<String> {
        if self.invalid.is_empty() {
            return None;
        }

        let total = self.total_valid + self.total_invalid;
        let mut parts: Vec<String> = self
            .invalid
            .iter()
            .take(MAX_REPORTED_INVALID)
            .map(|invalid| format!("record {}: {}", invalid.index, invalid.errors.join(", ")))
            .collect();
        if self.invalid.len() > MAX_REPORTED_INVALID {
            parts.push(format!(
                "... and {} more",
                self.invalid.len() - MAX_REPORTED_INVALID
            ));
        }

        Some(format!(
            "{context}: {}/{total} records failed validation ({})",
            self.total_invalid,
            parts.join("; ")
        ))
    }
}

/// Raised by [`validate_batch_strict`] when any record is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{summary}")]
    Batch {
        schema: String,
        total_invalid: usize,
        summary: String,
    },
}

/// Validate every record; invalid ones never discard valid siblings.
pub fn validate_batch(schema: &RecordSchema, records: Vec<Value>) -> BatchValidation {
    let mut result = BatchValidation::default();

    for (index, value) in records.into_iter().enumerate() {
        match schema.validate(value) {
            Ok(record) => result.valid.push(record),
            Err((record, errors)) => result.invalid.push(InvalidRecord {
                index,
                record,
                errors,
            }),
        }
    }

    result.total_valid = result.valid.len();
    result.total_invalid = result.invalid.len();
    result
}

/// Like [`validate_batch`] but fails when any record is invalid.
pub fn validate_batch_strict(
    schema: &RecordSchema,
    records: Vec<Value>,
) -> std::result::Result<Vec<Record>, ValidationError> {
    let result = validate_batch(schema, records);
    match result.summary(schema.name()) {
        None => Ok(result.valid),
        Some(summary) => Err(ValidationError::Batch {
            schema: schema.name().to_string(),
            total_invalid: result.total_invalid,
            summary,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pet_schema() -> RecordSchema {
        RecordSchema::compile(
            "pets",
            &json!({
                "type": "object",
                "required": ["name", "species"],
                "properties": {
                    "name": {"type": "string", "minLength": 1},
                    "species": {"type": "string", "enum": ["dog", "cat"]},
                    "is_active": {"type": "boolean", "default": true}
                }
            }),
        )
        .expect("compile schema")
    }

    #[test]
    fn invalid_record_does_not_discard_siblings() {
        let records = vec![
            json!({"name": "Rex", "species": "dog"}),
            json!({"name": "Mia", "species": "cat"}),
            json!({"name": "", "species": "dog"}),
            json!({"name": "Bobby", "species": "dog"}),
            json!({"name": "Luna", "species": "cat"}),
        ];

        let result = validate_batch(&pet_schema(), records);
        assert_eq!(result.total_valid, 4);
        assert_eq!(result.total_invalid, 1);
        assert_eq!(result.invalid[0].index, 2);
        assert!(result.invalid[0].errors[0].starts_with("name:"));
    }

    #[test]
    fn defaults_are_applied_to_valid_records() {
        let result = validate_batch(&pet_schema(), vec![json!({"name": "Rex", "species": "dog"})]);
        assert_eq!(result.valid[0].get("is_active"), Some(&json!(true)));
    }

    #[test]
    fn non_objects_are_invalid() {
        let result = validate_batch(&pet_schema(), vec![json!("Rex"), json!(null)]);
        assert_eq!(result.total_invalid, 2);
        assert_eq!(result.total_valid, 0);
    }

    #[test]
    fn strict_summarizes_first_three() {
        let records = (0..5).map(|_| json!({"species": "cow"})).collect();
        let err = validate_batch_strict(&pet_schema(), records).unwrap_err();
        let ValidationError::Batch {
            total_invalid,
            summary,
            ..
        } = err;
        assert_eq!(total_invalid, 5);
        assert!(summary.contains("5/5 records failed validation"));
        assert!(summary.contains("record 2"));
        assert!(!summary.contains("record 3"));
        assert!(summary.contains("... and 2 more"));
    }

    #[test]
    fn strict_passes_clean_batches() {
        let valid = validate_batch_strict(&pet_schema(), vec![json!({"name": "Rex", "species": "dog"})])
            .expect("valid batch");
        assert_eq!(valid.len(), 1);
    }

    #[test]
    fn malformed_schemas_are_core_errors() {
        let err = RecordSchema::compile("pets", &json!({"type": "not-a-type"})).unwrap_err();
        let CoreError::InvalidSchema { name, .. } = &err;
        assert_eq!(name, "pets");
        assert!(err.to_string().starts_with("invalid record schema 'pets'"));
    }
}
