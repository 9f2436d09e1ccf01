use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Pass => "✓",
            Self::Warn => "!",
            Self::Fail => "✗",
        }
    }
}

/// Row count a check expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum Expectation {
    Exactly(u64),
    MoreThan(u64),
}

impl Expectation {
    pub fn is_met(self, actual: u64) -> bool {
        match self {
            Self::Exactly(expected) => actual == expected,
            Self::MoreThan(floor) => actual > floor,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(expected) => write!(f, "{expected}"),
            Self::MoreThan(floor) => write!(f, ">{floor}"),
        }
    }
}

/// One post-seed row count, e.g. `pets(adris)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub name: String,
    pub expected: Expectation,
    pub actual: u64,
    pub status: CheckStatus,
    /// Why the count could not be taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VerificationCheck {
    /// Pass when the count meets the expectation, `on_miss` otherwise.
    pub fn evaluate(
        name: impl Into<String>,
        expected: Expectation,
        actual: u64,
        on_miss: CheckStatus,
    ) -> Self {
        Self {
            name: name.into(),
            expected,
            actual,
            status: if expected.is_met(actual) { CheckStatus::Pass } else { on_miss },
            detail: None,
        }
    }

    pub fn unavailable(name: impl Into<String>, expected: Expectation, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected,
            actual: 0,
            status: CheckStatus::Fail,
            detail: Some(detail.into()),
        }
    }
}

/// Row counts taken after a run. Informational: the exit status follows
/// seeder errors only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub checks: Vec<VerificationCheck>,
}

impl Verification {
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|check| check.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(CheckStatus::Fail) > 0
    }
}
