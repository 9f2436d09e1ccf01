use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::{RunHeader, SeedReport, SeederResult, TrackedResource};

/// Aggregate counters over every result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_created: u64,
    pub total_skipped: u64,
    pub total_errors: u64,
    pub success_rate_percent: f64,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            total_created: 0,
            total_skipped: 0,
            total_errors: 0,
            success_rate_percent: 100.0,
        }
    }
}

/// Sum counters; the success rate is 100 when nothing was attempted.
pub fn summarize(results: &[SeederResult]) -> Summary {
    let mut summary = Summary::default();
    for result in results {
        summary.total_created += result.created;
        summary.total_skipped += result.skipped;
        summary.total_errors += result.errors;
    }

    let ok = summary.total_created + summary.total_skipped;
    let attempted = ok + summary.total_errors;
    if attempted > 0 {
        summary.success_rate_percent = ok as f64 / attempted as f64 * 100.0;
    }
    summary
}

/// Move cascaded child results next to their parent, depth first.
pub fn flatten_results(results: Vec<SeederResult>) -> Vec<SeederResult> {
    let mut flat = Vec::with_capacity(results.len());
    for mut result in results {
        let cascades = std::mem::take(&mut result.cascades);
        flat.push(result);
        flat.extend(flatten_results(cascades));
    }
    flat
}

/// Close a run: flatten results, compute the summary, stamp the end time.
pub fn create_report(
    header: RunHeader,
    results: Vec<SeederResult>,
    tracked: Vec<TrackedResource>,
) -> SeedReport {
    let results = flatten_results(results);
    let summary = summarize(&results);
    SeedReport {
        variant: header.variant,
        tenants: header.tenants,
        mode: header.mode,
        dry_run: header.dry_run,
        started_at: header.started_at,
        ended_at: Utc::now(),
        results,
        summary,
        tracked,
        verification: None,
    }
}
