//! Hospital stays in the tenant's kennels, with vital-sign readings.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::{Value, json};
use tracing::debug;

use clinicseed_core::{Record, str_field};
use clinicseed_report::SeederResult;

use super::generate::{at, rng_for, round2, timestamp};
use super::lookup::{first_vet, id_of, tenant_rows};
use super::{bound, schemas, to_record};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::seeder::{Seeder, TableSeeder, cascade};
use crate::variants::SeederOptions;

const MAX_STAYS: usize = 3;
const REASONS: &[&str] = &["Cirugía programada", "Observación post-operatoria", "Tratamiento IV"];
const DIAGNOSES: &[&str] = &["Piometra", "Fractura tibial", "Gastroenteritis"];
const ACUITY: &[&str] = &["normal", "moderate", "critical"];
/// Hours after admission at which vitals are taken.
const VITALS_HOURS: &[i64] = &[2, 10, 18];

pub fn hospitalizations(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| HospitalizationSeeder { tenant })
}

/// `HOSP-YYYYMMDD-NNN`, numbered within the admission day.
pub fn admission_number(admitted: DateTime<Utc>, sequence: usize) -> String {
    format!("HOSP-{}-{sequence:03}", admitted.format("%Y%m%d"))
}

pub struct HospitalizationSeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for HospitalizationSeeder {
    fn table(&self) -> &'static str {
        "hospitalizations"
    }

    fn owner_column(&self) -> Option<&'static str> {
        Some("pet_id")
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::hospitalization())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let Some(vet) = first_vet(ctx, &self.tenant).await? else {
            debug!(event = "prerequisite_missing", table = "hospitalizations", tenant = %self.tenant, missing = "vet");
            return Ok(Vec::new());
        };
        let kennels = tenant_rows(ctx, "kennels", &self.tenant, "code").await?;
        let pets = tenant_rows(ctx, "pets", &self.tenant, "name").await?;

        Ok(pets
            .iter()
            .zip(kennels.iter())
            .take(MAX_STAYS)
            .enumerate()
            .map(|(index, (pet, kennel))| {
                let admitted = at(ctx.run, -(1 + 2 * index as i64), 7 + index as u32, 0);
                let discharged = index != 0;
                json!({
                    "tenant_id": self.tenant,
                    "pet_id": id_of(pet),
                    "kennel_id": id_of(kennel),
                    "admission_number": admission_number(admitted, index + 1),
                    "admitted_at": timestamp(admitted),
                    "admitted_by": vet,
                    "primary_vet_id": vet,
                    "reason": REASONS[index % REASONS.len()],
                    "diagnosis": DIAGNOSES[index % DIAGNOSES.len()],
                    "status": if discharged { "discharged" } else { "admitted" },
                    "acuity_level": ACUITY[index % ACUITY.len()],
                    "actual_discharge": discharged.then(|| timestamp(admitted + Duration::days(1))),
                    "discharged_by": if discharged { vet.clone() } else { Value::Null },
                    "notes": format!("Paciente {} ingresado", str_field(pet, "name").unwrap_or_default()),
                })
            })
            .collect())
    }

    async fn post_process(
        &self,
        ctx: &mut SeedContext<'_>,
        created: &[Record],
        result: &mut SeederResult,
    ) -> Result<(), SeedError> {
        let started = Instant::now();
        let vet = first_vet(ctx, &self.tenant).await?;
        let mut vitals = Vec::new();
        for stay in created {
            let Some(admitted) = str_field(stay, "admitted_at")
                .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
                .map(|time| time.with_timezone(&Utc))
            else {
                continue;
            };
            let number = str_field(stay, "admission_number").unwrap_or_default();
            let mut rng = rng_for(&self.tenant, &format!("hospitalization_vitals/{number}"));
            for hours in VITALS_HOURS {
                vitals.push(to_record(json!({
                    "tenant_id": self.tenant,
                    "hospitalization_id": id_of(stay),
                    "recorded_at": timestamp(admitted + Duration::hours(*hours)),
                    "temperature": round2(rng.random_range(38.5..40.0)),
                    "heart_rate": rng.random_range(80..120),
                    "respiratory_rate": rng.random_range(15..25),
                    "blood_pressure_systolic": rng.random_range(110..140),
                    "blood_pressure_diastolic": rng.random_range(70..90),
                    "pain_score": rng.random_range(0..4),
                    "notes": "Signos vitales estables",
                    "recorded_by": vet,
                })));
            }
        }
        cascade(ctx, result, "hospitalization_vitals", Some(&self.tenant), vitals, started).await;
        Ok(())
    }
}
