//! Generated clinical history: appointments, the medical records of
//! completed visits, vaccinations following the reference protocols and
//! prescriptions.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use serde_json::{Value, json};
use tracing::debug;

use clinicseed_core::{Record, str_field};
use clinicseed_store::{Direction, Query};

use super::generate::{
    at, current_max_sequence, date, document_number, number_field, pick, rng_for, round2,
    timestamp,
};
use super::lookup::{first_vet, id_of, tenant_rows};
use super::{bound, objects, schemas};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::seeder::{Seeder, TableSeeder};
use crate::variants::SeederOptions;

/// Pets that get a generated visit history.
const PETS_WITH_APPOINTMENTS: usize = 5;
/// Core protocols applied per pet.
const VACCINES_PER_PET: usize = 3;
const DEFAULT_DURATION_MINUTES: i64 = 30;

const REASONS: &[&str] = &[
    "Control de rutina",
    "Rascado excesivo",
    "Vómitos y diarrea",
    "Se rasca las orejas",
    "Ojos llorosos",
    "Control de peso",
];

const DIAGNOSES: &[(&str, &str)] = &[
    ("Paciente saludable", "Control de rutina"),
    ("Dermatitis alérgica", "Rascado excesivo"),
    ("Gastroenteritis leve", "Vómitos y diarrea"),
    ("Otitis externa", "Se rasca las orejas"),
    ("Conjuntivitis", "Ojos llorosos"),
    ("Gingivitis", "Mal aliento"),
    ("Sobrepeso", "Control de peso"),
];

const RECORD_TYPES: &[&str] = &["consultation", "checkup", "dental", "emergency"];

/// Pets that get a prescription.
const PETS_WITH_PRESCRIPTIONS: usize = 8;

/// Name, dose, frequency and duration.
const MEDICATIONS: &[(&str, &str, &str, &str)] = &[
    ("Amoxicilina-Clavulánico", "12.5 mg/kg", "Cada 12 horas", "7 días"),
    ("Meloxicam", "0.1 mg/kg", "Una vez al día", "5 días"),
    ("Metronidazol", "15 mg/kg", "Cada 12 horas", "7 días"),
    ("Cetirizina", "10 mg", "Una vez al día", "14 días"),
    ("Omeprazol", "1 mg/kg", "Una vez al día", "10 días"),
];

pub fn appointments(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| AppointmentSeeder { tenant })
}

pub fn medical_records(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| MedicalRecordSeeder { tenant })
}

pub fn vaccines(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| VaccineSeeder { tenant })
}

pub fn prescriptions(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| PrescriptionSeeder { tenant })
}

/// Two completed past visits and one confirmed upcoming visit for the
/// first pets of the tenant.
pub struct AppointmentSeeder {
    tenant: String,
}

impl AppointmentSeeder {
    fn visit(
        &self,
        pet: &Record,
        service: &Record,
        vet: &Value,
        start: DateTime<Utc>,
        status: &str,
        reason: &str,
    ) -> Value {
        let minutes = number_field(service, "duration_minutes")
            .map(|minutes| minutes as i64)
            .unwrap_or(DEFAULT_DURATION_MINUTES);
        json!({
            "tenant_id": self.tenant,
            "pet_id": id_of(pet),
            "service_id": id_of(service),
            "vet_id": vet,
            "start_time": timestamp(start),
            "end_time": timestamp(start + Duration::minutes(minutes)),
            "status": status,
            "reason": reason,
        })
    }
}

#[async_trait]
impl TableSeeder for AppointmentSeeder {
    fn table(&self) -> &'static str {
        "appointments"
    }

    fn owner_column(&self) -> Option<&'static str> {
        Some("pet_id")
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::appointment())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let Some(vet) = first_vet(ctx, &self.tenant).await? else {
            debug!(event = "prerequisite_missing", table = "appointments", tenant = %self.tenant, missing = "vet");
            return Ok(Vec::new());
        };
        let services = tenant_rows(ctx, "services", &self.tenant, "name").await?;
        let service = services
            .iter()
            .find(|service| str_field(service, "category") == Some("consultation"))
            .or_else(|| services.first())
            .cloned();
        let Some(service) = service else {
            debug!(event = "prerequisite_missing", table = "appointments", tenant = %self.tenant, missing = "service");
            return Ok(Vec::new());
        };

        let pets = tenant_rows(ctx, "pets", &self.tenant, "name").await?;
        let mut rng = rng_for(&self.tenant, "appointments");
        let mut visits = Vec::new();
        for (index, pet) in pets.iter().take(PETS_WITH_APPOINTMENTS).enumerate() {
            let index = index as i64;
            for weeks_ago in [6, 2] {
                let start = at(ctx.run, -7 * weeks_ago - index, 9 + (index % 8) as u32, 0);
                let reason = pick(&mut rng, REASONS);
                visits.push(self.visit(pet, &service, &vet, start, "completed", reason));
            }
            let start = at(ctx.run, 3 + index, 10 + (index % 6) as u32, 30);
            visits.push(self.visit(pet, &service, &vet, start, "confirmed", "Control de seguimiento"));
        }
        Ok(visits)
    }
}

/// One medical record per completed appointment.
pub struct MedicalRecordSeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for MedicalRecordSeeder {
    fn table(&self) -> &'static str {
        "medical_records"
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::medical_record())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let completed: Vec<Record> = tenant_rows(ctx, "appointments", &self.tenant, "start_time")
            .await?
            .into_iter()
            .filter(|appointment| str_field(appointment, "status") == Some("completed"))
            .collect();
        Ok(completed.into_iter().map(Value::Object).collect())
    }

    async fn pre_process(
        &self,
        _ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let mut rng = rng_for(&self.tenant, "medical_records");
        Ok(objects(raw)
            .map(|appointment| {
                let (diagnosis, complaint) = *pick(&mut rng, DIAGNOSES);
                let record_type = *pick(&mut rng, RECORD_TYPES);
                let temperature = round2(rng.random_range(38.0..39.5));
                json!({
                    "tenant_id": self.tenant,
                    "pet_id": appointment.get("pet_id").cloned().unwrap_or(Value::Null),
                    "appointment_id": id_of(&appointment),
                    "vet_id": appointment.get("vet_id").cloned().unwrap_or(Value::Null),
                    "record_type": record_type,
                    "visit_date": appointment.get("start_time").cloned().unwrap_or(Value::Null),
                    "chief_complaint": complaint,
                    "diagnosis_text": diagnosis,
                    "clinical_notes": format!("Examen realizado. {diagnosis}. Paciente en condición estable."),
                    "temperature_celsius": temperature,
                    "treatment_plan": "Seguimiento según indicaciones",
                    "is_emergency": record_type == "emergency",
                })
            })
            .collect())
    }
}

/// Core vaccinations for every pet of the tenant, from the global protocols.
pub struct VaccineSeeder {
    tenant: String,
}

fn applies_to(protocol: &Record, species: Option<&str>) -> bool {
    let protocol_species = str_field(protocol, "species").unwrap_or("all");
    protocol_species == "all" || Some(protocol_species) == species
}

#[async_trait]
impl TableSeeder for VaccineSeeder {
    fn table(&self) -> &'static str {
        "vaccines"
    }

    fn owner_column(&self) -> Option<&'static str> {
        Some("pet_id")
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::vaccine())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let query = Query::new()
            .eq("protocol_type", "core")
            .order_by("vaccine_code", Direction::Asc);
        let protocols = ctx
            .cache
            .rows(ctx.store, "vaccine_protocols", "core", query)
            .await?;
        if protocols.is_empty() {
            debug!(event = "prerequisite_missing", table = "vaccines", tenant = %self.tenant, missing = "vaccine_protocols");
            return Ok(Vec::new());
        }
        let vet = first_vet(ctx, &self.tenant).await?;
        let pets = tenant_rows(ctx, "pets", &self.tenant, "name").await?;

        let mut vaccines = Vec::new();
        for (index, pet) in pets.iter().enumerate() {
            let species = str_field(pet, "species");
            let applicable = protocols
                .iter()
                .filter(|protocol| applies_to(protocol, species))
                .take(VACCINES_PER_PET);
            for (dose, protocol) in applicable.enumerate() {
                let administered = at(ctx.run, -(60 + 30 * dose as i64 + 7 * index as i64), 0, 0);
                let months = number_field(protocol, "revaccination_months").unwrap_or(12.0);
                let next_due = administered + Duration::days((months * 30.0) as i64);
                vaccines.push(json!({
                    "tenant_id": self.tenant,
                    "pet_id": id_of(pet),
                    "protocol_id": id_of(protocol),
                    "vaccine_code": protocol.get("vaccine_code").cloned().unwrap_or(Value::Null),
                    "name": protocol.get("vaccine_name").cloned().unwrap_or(Value::Null),
                    "administered_date": date(administered),
                    "next_due_date": date(next_due),
                    "status": "completed",
                    "batch_number": format!("VAC-{}-{:03}", administered.format("%Y"), dose + 1),
                    "administered_by": vet,
                }));
            }
        }
        Ok(vaccines)
    }
}

/// One prescription for each of the first pets, written by the first vet.
pub struct PrescriptionSeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for PrescriptionSeeder {
    fn table(&self) -> &'static str {
        "prescriptions"
    }

    fn owner_column(&self) -> Option<&'static str> {
        Some("pet_id")
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::prescription())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let Some(vet) = first_vet(ctx, &self.tenant).await? else {
            debug!(event = "prerequisite_missing", table = "prescriptions", tenant = %self.tenant, missing = "vet");
            return Ok(Vec::new());
        };
        let pets = tenant_rows(ctx, "pets", &self.tenant, "name").await?;
        let mut rng = rng_for(&self.tenant, "prescriptions");

        Ok(pets
            .iter()
            .take(PETS_WITH_PRESCRIPTIONS)
            .map(|pet| {
                let days_ago: i64 = rng.random_range(0..60);
                let valid_days: i64 = rng.random_range(10..30);
                let (name, dose, frequency, duration) = *pick(&mut rng, MEDICATIONS);
                let prescribed = at(ctx.run, -days_ago, 0, 0);
                json!({
                    "tenant_id": self.tenant,
                    "pet_id": id_of(pet),
                    "vet_id": vet,
                    "prescribed_date": date(prescribed),
                    "valid_until": date(prescribed + Duration::days(valid_days)),
                    "medications": [{
                        "name": name,
                        "dose": dose,
                        "frequency": frequency,
                        "duration": duration,
                        "instructions": "Administrar con comida",
                    }],
                    "status": if days_ago > valid_days { "expired" } else { "active" },
                    "notes": format!("Tratamiento para {}", str_field(pet, "name").unwrap_or_default()),
                })
            })
            .collect())
    }

    /// `RX-YEAR-NNNNNN`, continuing from the tenant's highest number.
    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let year = ctx.run.reference_date.year();
        let mut sequence = current_max_sequence(
            ctx.store,
            "prescriptions",
            "prescription_number",
            &self.tenant,
            "RX",
            year,
        )
        .await?;
        Ok(objects(raw)
            .map(|mut prescription| {
                sequence += 1;
                prescription.insert(
                    "prescription_number".into(),
                    json!(document_number("RX", year, sequence)),
                );
                Value::Object(prescription)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::MemoryFixtures;
    use crate::testing::{adris, row, run, run_on};
    use clinicseed_store::MemoryStore;

    fn store_with_clinic() -> MemoryStore {
        let store = MemoryStore::new();
        store.preload(
            "profiles",
            vec![row(json!({"id": "vet-1", "tenant_id": "adris", "email": "vet@adris.com.py", "role": "vet"}))],
        );
        store.preload(
            "services",
            vec![row(json!({"id": "svc-1", "tenant_id": "adris", "name": "Consulta", "category": "consultation", "duration_minutes": 45}))],
        );
        store.preload(
            "pets",
            vec![
                row(json!({"id": "pet-1", "tenant_id": "adris", "name": "Firulais", "species": "dog"})),
                row(json!({"id": "pet-2", "tenant_id": "adris", "name": "Michi", "species": "cat"})),
            ],
        );
        store.preload(
            "vaccine_protocols",
            vec![
                row(json!({"id": "vp-1", "vaccine_code": "DHPP", "vaccine_name": "Séxtuple", "species": "dog", "protocol_type": "core", "revaccination_months": 12})),
                row(json!({"id": "vp-2", "vaccine_code": "FVRCP", "vaccine_name": "Triple Felina", "species": "cat", "protocol_type": "core"})),
                row(json!({"id": "vp-3", "vaccine_code": "RAB", "vaccine_name": "Antirrábica", "species": "all", "protocol_type": "core"})),
                row(json!({"id": "vp-4", "vaccine_code": "LEPTO", "vaccine_name": "Leptospirosis", "species": "dog", "protocol_type": "non-core"})),
            ],
        );
        store
    }

    #[tokio::test]
    async fn appointments_and_records_are_idempotent() {
        let store = store_with_clinic();
        let fixtures = MemoryFixtures::new();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let first = appointments(&adris()).seed(&mut ctx).await;
        assert_eq!(first.created, 6);
        let records = medical_records(&adris()).seed(&mut ctx).await;
        assert_eq!(records.created, 4);

        let again = appointments(&adris()).seed(&mut ctx).await;
        assert_eq!((again.created, again.skipped), (0, 6));
        let records = medical_records(&adris()).seed(&mut ctx).await;
        assert_eq!((records.created, records.skipped), (0, 4));

        let upcoming = store
            .rows("appointments")
            .into_iter()
            .find(|row| row.get("status") == Some(&json!("confirmed")))
            .unwrap();
        assert_eq!(upcoming.get("start_time"), Some(&json!("2026-03-18T10:30:00Z")));
        assert_eq!(upcoming.get("end_time"), Some(&json!("2026-03-18T11:15:00Z")));
    }

    #[tokio::test]
    async fn appointments_need_a_vet() {
        let store = MemoryStore::new();
        let fixtures = MemoryFixtures::new();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let result = appointments(&adris()).seed(&mut ctx).await;
        assert_eq!((result.created, result.errors), (0, 0));
    }

    #[tokio::test]
    async fn prescriptions_are_numbered_per_year_and_not_repeated() {
        let store = store_with_clinic();
        store.preload(
            "prescriptions",
            vec![row(json!({"tenant_id": "adris", "prescription_number": "RX-2025-000077"}))],
        );
        let fixtures = MemoryFixtures::new();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let result = prescriptions(&adris()).seed(&mut ctx).await;
        assert_eq!((result.created, result.errors), (2, 0), "{:?}", result.error_details);
        let mut numbers: Vec<String> = store
            .rows("prescriptions")
            .iter()
            .filter_map(|row| str_field(row, "prescription_number").map(str::to_string))
            .collect();
        numbers.sort();
        assert_eq!(numbers, vec!["RX-2025-000077", "RX-2026-000001", "RX-2026-000002"]);

        let later = run_on(2026, 4, 2);
        let mut ctx = SeedContext::new(&store, &fixtures, &later);
        let again = prescriptions(&adris()).seed(&mut ctx).await;
        assert_eq!((again.created, again.skipped), (0, 2));
    }

    #[tokio::test]
    async fn vaccines_follow_core_protocols_per_species() {
        let store = store_with_clinic();
        let fixtures = MemoryFixtures::new();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let result = vaccines(&adris()).seed(&mut ctx).await;
        assert_eq!(result.created, 4);
        let codes: Vec<_> = store
            .rows("vaccines")
            .iter()
            .map(|row| str_field(row, "vaccine_code").unwrap().to_string())
            .collect();
        assert_eq!(codes, vec!["DHPP", "RAB", "FVRCP", "RAB"]);
        assert!(!codes.contains(&"LEPTO".to_string()));
    }
}
