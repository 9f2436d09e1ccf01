use anyhow::Result;
use clinicseed_report::{RunHeader, RunMode, SeederResult, TrackedResource, create_report};

#[test]
fn report_serializes_with_stable_field_names() -> Result<()> {
    let header = RunHeader::start("demo", vec!["adris".into(), "petlife".into()], RunMode::Test, true);
    let mut tenants = SeederResult::new("tenants");
    tenants.skipped = 2;
    tenants.push_cascade(SeederResult {
        skipped: 12,
        ..SeederResult::new("document_sequences")
    });

    let report = create_report(
        header,
        vec![tenants],
        vec![TrackedResource {
            table: "pets".into(),
            id: "p-1".into(),
            tenant: Some("adris".into()),
        }],
    );
    let json = serde_json::to_value(&report)?;

    assert_eq!(json["mode"], "test");
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["results"][1]["table"], "document_sequences");
    assert_eq!(json["summary"]["total_skipped"], 14);
    assert_eq!(json["summary"]["success_rate_percent"], 100.0);
    assert_eq!(json["tracked"][0]["tenant"], "adris");
    assert!(json["started_at"].as_str().is_some());
    Ok(())
}
