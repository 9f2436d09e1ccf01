//! Builders shared by the unit tests.

use chrono::NaiveDate;
use serde_json::Value;

use clinicseed_core::Record;

use crate::context::RunContext;
use crate::variants::SeederOptions;

pub fn row(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

/// A seeder bound to `adris`, the only tenant of the run.
pub fn adris() -> SeederOptions {
    SeederOptions::for_tenant("adris", &["adris".to_string()])
}

pub fn run_on(year: i32, month: u32, day: u32) -> RunContext {
    RunContext {
        reference_date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
        ..RunContext::default()
    }
}

/// Run anchored on 2026-03-15.
pub fn run() -> RunContext {
    run_on(2026, 3, 15)
}
