use thiserror::Error;

/// SQLSTATE and PostgREST codes that mean the table or column is absent.
const MISSING_RELATION_CODES: &[&str] = &["42P01", "42703", "PGRST204", "PGRST205"];
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors raised by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The table or one of the referenced columns does not exist.
    #[error("missing relation on {table}: {message}")]
    MissingRelation { table: String, message: String },
    /// A unique constraint rejected the write.
    #[error("unique violation on {table}: {message}")]
    Conflict { table: String, message: String },
    /// A foreign key rejected the write or the delete.
    #[error("foreign key violation on {table}: {message}")]
    ForeignKey { table: String, message: String },
    /// Any other database failure.
    #[error("database error on {table}: {message}")]
    Db { table: String, message: String },
    /// Transport failure talking to a remote store.
    #[error("http error: {0}")]
    Http(String),
    /// The store answered with something that is not a row set.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// A table or column name that cannot be used as an identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    /// The adapter cannot be built from the given settings.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Map a backend error code onto the matching variant.
    pub fn from_code(code: Option<&str>, table: &str, message: impl Into<String>) -> Self {
        let table = table.to_string();
        let message = message.into();
        match code {
            Some(code) if MISSING_RELATION_CODES.contains(&code) => {
                Self::MissingRelation { table, message }
            }
            Some(UNIQUE_VIOLATION) => Self::Conflict { table, message },
            Some(FOREIGN_KEY_VIOLATION) => Self::ForeignKey { table, message },
            _ => Self::Db { table, message },
        }
    }

    /// True when the failure means "this table or column is not deployed".
    pub fn is_missing_relation(&self) -> bool {
        matches!(self, Self::MissingRelation { .. })
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
