//! Fixture documents.
//!
//! Fixtures are JSON files under a data directory, addressed by relative
//! path (`02-clinic/adris/services.json`). A missing document is not an
//! error: it means there is nothing to seed for that table or tenant.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("fixture {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("fixture {path}: {message}")]
    Shape { path: String, message: String },
}

/// Read-only access to fixture documents.
pub trait Fixtures: Send + Sync {
    /// Parsed document at `path`, or `None` when it does not exist.
    fn read(&self, path: &str) -> Result<Option<Value>, FixtureError>;

    /// Sorted `.json` document paths directly under `dir`; empty when the
    /// directory does not exist.
    fn list(&self, dir: &str) -> Result<Vec<String>, FixtureError>;
}

/// Fixtures read from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsFixtures {
    root: PathBuf,
}

impl FsFixtures {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Fixtures for FsFixtures {
    fn read(&self, path: &str) -> Result<Option<Value>, FixtureError> {
        let full = self.root.join(path);
        let text = match std::fs::read_to_string(&full) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FixtureError::Io {
                    path: path.to_string(),
                    source,
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| FixtureError::Json {
                path: path.to_string(),
                source,
            })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, FixtureError> {
        let entries = match std::fs::read_dir(self.root.join(dir)) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(FixtureError::Io {
                    path: dir.to_string(),
                    source,
                });
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| FixtureError::Io {
                path: dir.to_string(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                paths.push(format!("{}/{name}", dir.trim_end_matches('/')));
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Fixtures held in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryFixtures {
    documents: BTreeMap<String, Value>,
}

impl MemoryFixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, document: Value) -> Self {
        self.documents.insert(path.into(), document);
        self
    }
}

impl Fixtures for MemoryFixtures {
    fn read(&self, path: &str) -> Result<Option<Value>, FixtureError> {
        Ok(self.documents.get(path).cloned())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, FixtureError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .documents
            .keys()
            .filter(|path| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('/') && rest.ends_with(".json"))
            })
            .cloned()
            .collect())
    }
}

/// Pull the record array out of a document.
///
/// Documents are either a bare array or an object holding the array under
/// one of `keys` (first match wins).
pub fn extract_records(path: &str, document: Value, keys: &[&str]) -> Result<Vec<Value>, FixtureError> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => {
            for key in keys {
                match object.remove(*key) {
                    Some(Value::Array(items)) => return Ok(items),
                    Some(other) => {
                        return Err(FixtureError::Shape {
                            path: path.to_string(),
                            message: format!("'{key}' must be an array, got {}", type_name(&other)),
                        });
                    }
                    None => continue,
                }
            }
            Ok(Vec::new())
        }
        other => Err(FixtureError::Shape {
            path: path.to_string(),
            message: format!("expected an array or object, got {}", type_name(&other)),
        }),
    }
}

/// Records of an optional document; absent documents yield no records.
pub fn load_records(
    fixtures: &dyn Fixtures,
    path: &str,
    keys: &[&str],
) -> Result<Vec<Value>, FixtureError> {
    match fixtures.read(path)? {
        Some(document) => extract_records(path, document, keys),
        None => Ok(Vec::new()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_files_are_absent_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let fixtures = FsFixtures::new(dir.path());
        assert!(fixtures.read("02-clinic/ghost/services.json").unwrap().is_none());
        assert!(fixtures.list("03-store/products").unwrap().is_empty());
        assert!(load_records(&fixtures, "nope.json", &["x"]).unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let err = FsFixtures::new(dir.path()).read("bad.json").unwrap_err();
        assert!(matches!(err, FixtureError::Json { .. }));
    }

    #[test]
    fn lists_json_documents_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let products = dir.path().join("products");
        std::fs::create_dir_all(&products).unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(products.join(name), "[]").unwrap();
        }
        let listed = FsFixtures::new(dir.path()).list("products").unwrap();
        assert_eq!(listed, vec!["products/a.json", "products/b.json"]);
    }

    #[test]
    fn extracts_first_matching_key() {
        let doc = json!({"codes": [{"code": "A"}], "diagnosis_codes": [{"code": "B"}]});
        let records = extract_records("x.json", doc, &["diagnosis_codes", "codes"]).unwrap();
        assert_eq!(records, vec![json!({"code": "B"})]);

        let err = extract_records("x.json", json!({"codes": 3}), &["codes"]).unwrap_err();
        assert!(matches!(err, FixtureError::Shape { .. }));
    }

    #[test]
    fn memory_fixtures_list_direct_children() {
        let fixtures = MemoryFixtures::new()
            .with("03-store/products/a.json", json!([]))
            .with("03-store/products/nested/b.json", json!([]))
            .with("03-store/brands.json", json!([]));
        assert_eq!(
            fixtures.list("03-store/products").unwrap(),
            vec!["03-store/products/a.json"]
        );
    }
}
