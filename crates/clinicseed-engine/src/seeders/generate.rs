//! Deterministic generation helpers.
//!
//! Generated rows must come out identical on a re-run against the same
//! reference date, otherwise their logical keys (timestamps mostly) would
//! differ and nothing would be skipped. Every generator therefore draws
//! from a ChaCha stream seeded by tenant and table, and anchors dates on
//! the run's reference date instead of the wall clock.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use fake::Fake;
use fake::faker::phone_number::en::PhoneNumber;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;

use clinicseed_core::{Record, str_field};
use clinicseed_store::{Direction, Filter, Query, Store, StoreResult};

use crate::context::RunContext;

const BASE_SEED: u64 = 0x5eed_c11c;

/// FNV-1a over `key`, mixed with `seed`.
pub fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Random stream for one tenant's rows of one table.
pub fn rng_for(tenant: &str, stream: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(hash_seed(BASE_SEED, &format!("{tenant}/{stream}")))
}

/// Reference time shifted by whole days and set to `hour:minute` UTC.
pub fn at(run: &RunContext, days: i64, hour: u32, minute: u32) -> DateTime<Utc> {
    run.reference_time()
        + Duration::days(days)
        + Duration::hours(hour as i64)
        + Duration::minutes(minute as i64)
}

/// RFC 3339 with second precision and a `Z` suffix.
pub fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn date(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

pub fn pick<'a, T>(rng: &mut ChaCha8Rng, items: &'a [T]) -> &'a T {
    &items[rng.random_range(0..items.len())]
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn phone_number(rng: &mut ChaCha8Rng) -> String {
    PhoneNumber().fake_with_rng(rng)
}

/// `PREFIX-YEAR-000001` style document numbers.
pub fn document_number(prefix: &str, year: i32, sequence: u64) -> String {
    format!("{prefix}-{year}-{sequence:06}")
}

/// Trailing numeric part of a document number.
pub fn parse_sequence(number: &str) -> Option<u64> {
    number.rsplit('-').next()?.parse().ok()
}

/// Highest sequence a tenant already used for `PREFIX-YEAR-` numbers in
/// `column`, 0 when none. Each year starts over.
///
/// Numbers are zero padded, so ordering the text descending finds the
/// maximum within one prefix and year.
pub async fn current_max_sequence(
    store: &dyn Store,
    table: &str,
    column: &str,
    tenant: &str,
    prefix: &str,
    year: i32,
) -> StoreResult<u64> {
    let query = Query::new()
        .eq("tenant_id", tenant)
        .filter(Filter::StartsWith(column.to_string(), format!("{prefix}-{year}-")))
        .columns(&[column])
        .order_by(column, Direction::Desc)
        .limit(1);
    let rows = store.select(table, &query).await?;
    Ok(rows
        .first()
        .and_then(|row| str_field(row, column))
        .and_then(parse_sequence)
        .unwrap_or(0))
}

/// Numeric column as `f64`, accepting numbers and numeric strings.
pub fn number_field(record: &Record, column: &str) -> Option<f64> {
    match record.get(column)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::run;
    use clinicseed_store::MemoryStore;
    use serde_json::json;

    #[test]
    fn streams_are_stable_and_distinct() {
        let draw = |tenant: &str| -> Vec<u32> {
            let mut rng = rng_for(tenant, "pets");
            (0..4).map(|_| rng.random()).collect()
        };
        assert_eq!(draw("adris"), draw("adris"));
        assert_ne!(draw("adris"), draw("petlife"));
    }

    #[test]
    fn timestamps_are_anchored_on_the_reference_date() {
        let time = at(&run(), -2, 9, 30);
        assert_eq!(timestamp(time), "2026-03-13T09:30:00Z");
        assert_eq!(date(time), "2026-03-13");
    }

    #[test]
    fn document_numbers_round_trip_their_sequence() {
        let number = document_number("LAB", 2026, 42);
        assert_eq!(number, "LAB-2026-000042");
        assert_eq!(parse_sequence(&number), Some(42));
        assert_eq!(parse_sequence("garbage"), None);
    }

    #[tokio::test]
    async fn current_max_is_scoped_by_tenant_and_year() {
        let store = MemoryStore::new();
        for (tenant, number) in [
            ("adris", "INV-2025-000340"),
            ("adris", "INV-2026-000002"),
            ("adris", "INV-2026-000011"),
            ("petlife", "INV-2026-000090"),
        ] {
            let row = json!({"tenant_id": tenant, "invoice_number": number});
            store.preload("invoices", vec![row.as_object().cloned().unwrap()]);
        }
        let max = current_max_sequence(&store, "invoices", "invoice_number", "adris", "INV", 2026)
            .await
            .unwrap();
        assert_eq!(max, 11);
        let new_year =
            current_max_sequence(&store, "invoices", "invoice_number", "adris", "INV", 2027)
                .await
                .unwrap();
        assert_eq!(new_year, 0);
        let none =
            current_max_sequence(&store, "invoices", "invoice_number", "vetcare", "INV", 2026)
                .await
                .unwrap();
        assert_eq!(none, 0);
    }
}
