use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::summary::Summary;
use crate::verification::Verification;

/// Whether created rows are tracked for targeted teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Seed,
    Test,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Test => "test",
        }
    }

    pub fn tracks_resources(self) -> bool {
        matches!(self, Self::Test)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode '{0}' (expected 'seed' or 'test')")]
pub struct ModeParseError(pub String);

impl FromStr for RunMode {
    type Err = ModeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "seed" => Ok(Self::Seed),
            "test" => Ok(Self::Test),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

/// Outcome of one seeder invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeederResult {
    pub table: String,
    pub created: u64,
    pub skipped: u64,
    pub errors: u64,
    #[serde(default)]
    pub error_details: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub duration_ms: u64,
    /// Child tables written while post-processing this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascades: Vec<SeederResult>,
}

impl SeederResult {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// A result standing for a seeder that failed as a whole.
    pub fn failed(table: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            table: table.into(),
            errors: 1,
            error_details: vec![message.into()],
            duration_ms,
            ..Self::default()
        }
    }

    /// Records this result accounted for, cascades excluded.
    pub fn attempted(&self) -> u64 {
        self.created + self.skipped + self.errors
    }

    pub fn is_success(&self) -> bool {
        self.errors == 0
    }

    pub fn push_cascade(&mut self, cascade: SeederResult) {
        self.cascades.push(cascade);
    }
}

/// Row created during a `test` mode run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedResource {
    pub table: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// Fields fixed when a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHeader {
    pub variant: String,
    pub tenants: Vec<String>,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
}

impl RunHeader {
    pub fn start(variant: impl Into<String>, tenants: Vec<String>, mode: RunMode, dry_run: bool) -> Self {
        Self {
            variant: variant.into(),
            tenants,
            mode,
            dry_run,
            started_at: Utc::now(),
        }
    }
}

/// Immutable record of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedReport {
    pub variant: String,
    pub tenants: Vec<String>,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub results: Vec<SeederResult>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracked: Vec<TrackedResource>,
    /// Row counts taken after seeding; absent for dry runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl SeedReport {
    pub fn is_success(&self) -> bool {
        self.summary.total_errors == 0
    }

    /// Process exit status for this report.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_case_insensitively() {
        assert_eq!("TEST".parse::<RunMode>().unwrap(), RunMode::Test);
        assert_eq!(" seed ".parse::<RunMode>().unwrap(), RunMode::Seed);
        assert!("prod".parse::<RunMode>().is_err());
    }

    #[test]
    fn failed_results_count_one_error() {
        let result = SeederResult::failed("pets", "boom", 12);
        assert_eq!(result.errors, 1);
        assert_eq!(result.attempted(), 1);
        assert_eq!(result.error_details, vec!["boom"]);
        assert!(!result.is_success());
    }

    #[test]
    fn cascades_are_omitted_from_json_when_empty() {
        let json = serde_json::to_value(SeederResult::new("tenants")).unwrap();
        assert!(json.get("cascades").is_none());
        assert_eq!(json["created"], 0);
    }
}
