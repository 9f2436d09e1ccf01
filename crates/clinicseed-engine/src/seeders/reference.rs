//! Global clinical reference catalogs under `01-reference/`.

use serde_json::Value;

use clinicseed_core::Record;

use super::{FileSeeder, rename, schemas};
use crate::seeder::Seeder;
use crate::variants::SeederOptions;

const DRUG_DOSAGE_COLUMNS: &[&str] = &[
    "name",
    "generic_name",
    "species",
    "category",
    "min_dose_mg_kg",
    "max_dose_mg_kg",
    "concentration_mg_ml",
    "route",
    "frequency",
    "max_daily_dose_mg_kg",
    "contraindications",
    "side_effects",
    "notes",
    "requires_prescription",
];

const VACCINE_PROTOCOL_COLUMNS: &[&str] = &[
    "vaccine_name",
    "vaccine_code",
    "species",
    "protocol_type",
    "diseases_prevented",
    "first_dose_weeks",
    "booster_weeks",
    "booster_intervals_months",
    "revaccination_months",
    "duration_years",
    "manufacturer",
    "notes",
];

const PROTOCOL_SPECIES: &[&str] = &["dog", "cat", "all"];

pub fn diagnosis_codes(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "diagnosis_codes",
        "01-reference/diagnosis-codes.json",
        &["codes", "diagnosis_codes"],
    )
    .schema(schemas::diagnosis_code)
    .boxed()
}

pub fn drug_dosages(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "drug_dosages",
        "01-reference/drug-dosages.json",
        &["dosages", "drug_dosages"],
    )
    .columns(DRUG_DOSAGE_COLUMNS)
    .shape(shape_drug_dosage)
    .schema(schemas::drug_dosage)
    .boxed()
}

pub fn growth_standards(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "growth_standards",
        "01-reference/growth-standards.json",
        &["standards", "growth_standards"],
    )
    .shape(shape_growth_standard)
    .schema(schemas::growth_standard)
    .boxed()
}

pub fn vaccine_protocols(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "vaccine_protocols",
        "01-reference/vaccine-protocols.json",
        &["protocols", "vaccine_protocols"],
    )
    .shape(shape_vaccine_protocol)
    .columns(VACCINE_PROTOCOL_COLUMNS)
    .schema(schemas::vaccine_protocol)
    .boxed()
}

pub fn insurance_providers(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "insurance_providers",
        "01-reference/insurance-providers.json",
        &["providers", "insurance_providers"],
    )
    .schema(schemas::insurance_provider)
    .boxed()
}

pub fn lab_test_catalog(_options: &SeederOptions) -> Box<dyn Seeder> {
    FileSeeder::new(
        "lab_test_catalog",
        "01-reference/lab-tests.json",
        &["lab_tests", "tests"],
    )
    .schema(schemas::lab_test)
    .boxed()
}

/// Single strings become one-element arrays.
fn shape_drug_dosage(mut record: Record) -> Option<Record> {
    for column in ["contraindications", "side_effects"] {
        if let Some(Value::String(text)) = record.get(column) {
            let list = Value::Array(vec![Value::String(text.clone())]);
            record.insert(column.to_string(), list);
        }
    }
    Some(record)
}

/// Percentile `50` or `"50"` becomes `"P50"`; absent nullable key parts
/// become explicit nulls so the logical key is complete.
fn shape_growth_standard(mut record: Record) -> Option<Record> {
    let percentile = match record.get("percentile") {
        Some(Value::Number(number)) => Some(format!("P{number}")),
        Some(Value::String(text)) if !text.starts_with('P') => Some(format!("P{text}")),
        _ => None,
    };
    if let Some(percentile) = percentile {
        record.insert("percentile".to_string(), Value::String(percentile));
    }
    for column in ["breed_category", "gender"] {
        record.entry(column).or_insert(Value::Null);
    }
    Some(record)
}

/// `type` maps onto `protocol_type` (`optional` meaning `lifestyle`);
/// species the store does not accept are dropped.
fn shape_vaccine_protocol(mut record: Record) -> Option<Record> {
    if let Some(Value::String(species)) = record.get("species") {
        if !PROTOCOL_SPECIES.contains(&species.as_str()) {
            return None;
        }
    }
    if let Some(Value::String(kind)) = record.get("type") {
        let kind = if kind == "optional" { "lifestyle" } else { kind.as_str() };
        let kind = Value::String(kind.to_string());
        record.entry("protocol_type").or_insert(kind);
    }
    rename(&mut record, "code", "vaccine_code");
    record
        .entry("protocol_type")
        .or_insert_with(|| Value::String("non-core".to_string()));
    record
        .entry("species")
        .or_insert_with(|| Value::String("all".to_string()));
    Some(record)
}
