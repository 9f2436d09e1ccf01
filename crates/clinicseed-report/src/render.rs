use crate::model::{SeedReport, SeederResult};
use crate::verification::CheckStatus;

/// Error details shown per table before truncating.
pub const MAX_RENDERED_ERRORS: usize = 3;

const RULE: &str = "==============================================";

fn glyph(result: &SeederResult) -> &'static str {
    if result.errors > 0 {
        "✗"
    } else if result.created > 0 {
        "✓"
    } else {
        "○"
    }
}

/// Render a human-readable, line-oriented report.
pub fn render_report(report: &SeedReport) -> String {
    let mut lines = Vec::new();

    lines.push(RULE.to_string());
    lines.push(format!("   Seed report: {}", report.variant));
    lines.push(RULE.to_string());
    lines.push(format!("Mode: {}", report.mode));
    lines.push(format!(
        "Tenants: {}",
        if report.tenants.is_empty() {
            "-".to_string()
        } else {
            report.tenants.join(", ")
        }
    ));
    if report.dry_run {
        lines.push("Dry run: no changes were written".to_string());
    }
    lines.push(format!("Duration: {} ms", report.duration_ms()));
    lines.push(String::new());

    for result in &report.results {
        lines.push(format!(
            "  {} {}: {} created, {} skipped, {} errors ({} ms)",
            glyph(result),
            result.table,
            result.created,
            result.skipped,
            result.errors,
            result.duration_ms
        ));
        for warning in &result.warnings {
            lines.push(format!("      ! {warning}"));
        }
        for detail in result.error_details.iter().take(MAX_RENDERED_ERRORS) {
            lines.push(format!("      - {detail}"));
        }
        if result.error_details.len() > MAX_RENDERED_ERRORS {
            lines.push(format!(
                "      ... and {} more",
                result.error_details.len() - MAX_RENDERED_ERRORS
            ));
        }
    }
    lines.push(String::new());

    let summary = &report.summary;
    lines.push(format!(
        "Summary: {} created, {} skipped, {} errors ({:.1}% success)",
        summary.total_created,
        summary.total_skipped,
        summary.total_errors,
        summary.success_rate_percent
    ));
    if report.mode.tracks_resources() {
        lines.push(format!("Tracked resources: {}", report.tracked.len()));
    }
    if let Some(verification) = &report.verification {
        lines.push(String::new());
        lines.push("Verification:".to_string());
        for check in &verification.checks {
            let mut line = format!(
                "  {} {}: {} (expected {})",
                check.status.glyph(),
                check.name,
                check.actual,
                check.expected
            );
            if let Some(detail) = &check.detail {
                line.push_str(&format!(" - {detail}"));
            }
            lines.push(line);
        }
        lines.push(format!(
            "Verification: {} passed, {} warnings, {} failed",
            verification.count(CheckStatus::Pass),
            verification.count(CheckStatus::Warn),
            verification.count(CheckStatus::Fail)
        ));
    }
    lines.push(RULE.to_string());
    if report.is_success() {
        lines.push("   ✓ Seeding completed successfully".to_string());
    } else {
        lines.push(format!(
            "   ✗ Seeding finished with {} errors",
            summary.total_errors
        ));
    }
    lines.push(RULE.to_string());

    lines.join("\n")
}

/// Print the rendered report to stdout.
pub fn print_report(report: &SeedReport) {
    println!("{}", render_report(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunHeader, RunMode};
    use crate::summary::create_report;
    use crate::verification::{Expectation, Verification, VerificationCheck};

    fn report(results: Vec<SeederResult>) -> SeedReport {
        let header = RunHeader::start("basic", vec!["adris".into()], RunMode::Seed, false);
        create_report(header, results, Vec::new())
    }

    #[test]
    fn glyphs_follow_outcome() {
        let created = SeederResult {
            created: 2,
            ..SeederResult::new("services")
        };
        let skipped = SeederResult {
            skipped: 2,
            ..SeederResult::new("payment_methods")
        };
        let failed = SeederResult::failed("kennels", "boom", 1);

        let text = render_report(&report(vec![created, skipped, failed]));
        assert!(text.contains("✓ services: 2 created"));
        assert!(text.contains("○ payment_methods: 0 created, 2 skipped"));
        assert!(text.contains("✗ kennels: 0 created, 0 skipped, 1 errors"));
        assert!(text.contains("Seeding finished with 1 errors"));
    }

    #[test]
    fn error_lists_are_truncated() {
        let mut result = SeederResult::new("pets");
        result.errors = 5;
        result.error_details = (0..5).map(|i| format!("record {i} failed")).collect();

        let text = render_report(&report(vec![result]));
        assert!(text.contains("record 2 failed"));
        assert!(!text.contains("record 3 failed"));
        assert!(text.contains("... and 2 more"));
    }

    #[test]
    fn verification_counts_follow_the_summary() {
        let mut report = report(Vec::new());
        report.verification = Some(Verification {
            checks: vec![
                VerificationCheck::evaluate("tenants(adris)", Expectation::Exactly(1), 1, CheckStatus::Fail),
                VerificationCheck::evaluate("pets(adris)", Expectation::MoreThan(0), 0, CheckStatus::Warn),
            ],
        });

        let text = render_report(&report);
        assert!(text.contains("✓ tenants(adris): 1 (expected 1)"));
        assert!(text.contains("! pets(adris): 0 (expected >0)"));
        assert!(text.contains("Verification: 1 passed, 1 warnings, 0 failed"));
        assert!(text.contains("Seeding completed successfully"));
    }

    #[test]
    fn clean_runs_end_with_success_banner() {
        let text = render_report(&report(Vec::new()));
        assert!(text.contains("0 created, 0 skipped, 0 errors (100.0% success)"));
        assert!(text.contains("Seeding completed successfully"));
    }
}
