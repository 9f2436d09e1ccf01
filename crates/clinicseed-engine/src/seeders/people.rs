//! Clinic people and their animals: profiles, staff records, pets and the
//! pets' weight history.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Value, json};
use tracing::debug;

use clinicseed_core::{Record, project, str_field};

use super::generate::{at, number_field, phone_number, rng_for, round2, timestamp};
use super::lookup::{id_of, profiles_with_role, tenant_rows};
use super::{bound, objects, schemas};
use crate::context::SeedContext;
use crate::errors::SeedError;
use crate::fixtures::load_records;
use crate::seeder::{Seeder, TableSeeder};
use crate::variants::SeederOptions;

const PROFILE_COLUMNS: &[&str] = &[
    "full_name",
    "email",
    "phone",
    "role",
    "document_number",
    "address",
    "city",
    "avatar_url",
];

const PET_COLUMNS: &[&str] = &[
    "name",
    "species",
    "breed",
    "birth_date",
    "weight_kg",
    "sex",
    "is_neutered",
    "color",
    "microchip_id",
    "notes",
];

const STAFF_ROLES: &[&str] = &["vet", "admin", "receptionist"];

/// Months of weight history generated per pet.
const WEIGHT_HISTORY_MONTHS: i64 = 4;

pub fn profiles(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| ProfileSeeder { tenant })
}

pub fn staff_profiles(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| StaffProfileSeeder { tenant })
}

pub fn pets(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| PetSeeder { tenant })
}

pub fn weight_records(options: &SeederOptions) -> Box<dyn Seeder> {
    bound(options, |tenant| WeightRecordSeeder { tenant })
}

/// Owners and staff from `02-clinic/<tenant>/profiles.json`.
pub struct ProfileSeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for ProfileSeeder {
    fn table(&self) -> &'static str {
        "profiles"
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::profile())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let path = format!("02-clinic/{}/profiles.json", self.tenant);
        Ok(load_records(ctx.fixtures, &path, &["profiles"])?)
    }

    async fn pre_process(
        &self,
        _ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let mut rng = rng_for(&self.tenant, "profiles");
        Ok(objects(raw)
            .map(|profile| {
                let mut row = project(&profile, PROFILE_COLUMNS);
                if let Some(email) = str_field(&row, "email") {
                    let email = email.trim().to_string();
                    row.insert("email".into(), Value::String(email));
                }
                // Drawn for every row so one missing phone does not shift the rest.
                let phone = phone_number(&mut rng);
                if row.get("phone").is_none_or(Value::is_null) {
                    row.insert("phone".into(), Value::String(phone));
                }
                row.insert("tenant_id".into(), json!(self.tenant));
                Value::Object(row)
            })
            .collect())
    }
}

/// Employment records for every staff profile of the tenant.
pub struct StaffProfileSeeder {
    tenant: String,
}

fn job_title(role: &str) -> &'static str {
    match role {
        "vet" => "Médico Veterinario",
        "admin" => "Administrador",
        _ => "Recepcionista",
    }
}

#[async_trait]
impl TableSeeder for StaffProfileSeeder {
    fn table(&self) -> &'static str {
        "staff_profiles"
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::staff_profile())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let staff = profiles_with_role(ctx, &self.tenant, STAFF_ROLES).await?;
        Ok(staff.into_iter().map(Value::Object).collect())
    }

    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let hire_date = ctx.run.reference_date.format("%Y-01-02").to_string();
        Ok(objects(raw)
            .enumerate()
            .map(|(index, profile)| {
                let role = str_field(&profile, "role").unwrap_or("receptionist");
                let is_vet = role == "vet";
                let license = is_vet.then(|| {
                    format!("VET-{}-{:03}", self.tenant.to_uppercase(), index + 1)
                });
                json!({
                    "tenant_id": self.tenant,
                    "profile_id": id_of(&profile),
                    "job_title": job_title(role),
                    "can_prescribe": is_vet,
                    "license_number": license,
                    "hire_date": hire_date,
                    "employment_type": "full_time",
                    "is_active": true,
                })
            })
            .collect())
    }
}

/// Pets from `02-clinic/<tenant>/pets.json`, linked to owners by email.
pub struct PetSeeder {
    tenant: String,
}

#[async_trait]
impl TableSeeder for PetSeeder {
    fn table(&self) -> &'static str {
        "pets"
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::pet())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let path = format!("02-clinic/{}/pets.json", self.tenant);
        Ok(load_records(ctx.fixtures, &path, &["pets"])?)
    }

    async fn pre_process(
        &self,
        ctx: &mut SeedContext<'_>,
        raw: Vec<Value>,
    ) -> Result<Vec<Value>, SeedError> {
        let owners: BTreeMap<String, Value> = tenant_rows(ctx, "profiles", &self.tenant, "email")
            .await?
            .iter()
            .filter_map(|profile| {
                let email = str_field(profile, "email")?.trim().to_lowercase();
                Some((email, profile.get("id")?.clone()))
            })
            .collect();

        let mut unresolved = 0usize;
        let rows = objects(raw)
            .map(|pet| {
                let mut row = project(&pet, PET_COLUMNS);
                let owner = str_field(&pet, "owner_email")
                    .and_then(|email| owners.get(&email.trim().to_lowercase()));
                match owner {
                    Some(id) => {
                        row.insert("owner_id".into(), id.clone());
                    }
                    None => unresolved += 1,
                }
                row.insert("tenant_id".into(), json!(self.tenant));
                Value::Object(row)
            })
            .collect();
        if unresolved > 0 {
            debug!(event = "pet_owner_unresolved", tenant = %self.tenant, unresolved);
        }
        Ok(rows)
    }
}

/// Monthly weight history ending at each pet's current weight.
pub struct WeightRecordSeeder {
    tenant: String,
}

impl WeightRecordSeeder {
    fn history(&self, ctx: &SeedContext<'_>, pet: &Record) -> Vec<Value> {
        let Some(current) = number_field(pet, "weight_kg").filter(|weight| *weight > 0.0) else {
            return Vec::new();
        };
        let pet_id = id_of(pet);
        let stream = format!("weight_records/{}", str_field(pet, "name").unwrap_or_default());
        let mut rng = rng_for(&self.tenant, &stream);

        (0..WEIGHT_HISTORY_MONTHS)
            .rev()
            .map(|months_ago| {
                let trend = 1.0 - 0.03 * months_ago as f64;
                let jitter: f64 = rng.random_range(-0.02..0.02);
                let weight = round2((current * (trend + jitter)).max(0.1));
                let recorded = if months_ago == 0 {
                    current
                } else {
                    weight
                };
                json!({
                    "pet_id": pet_id,
                    "weight_kg": recorded,
                    "recorded_at": timestamp(at(ctx.run, -30 * months_ago, 10, 0)),
                    "notes": if months_ago == 0 { "Peso actual" } else { "Control de peso" },
                })
            })
            .collect()
    }
}

#[async_trait]
impl TableSeeder for WeightRecordSeeder {
    fn table(&self) -> &'static str {
        "weight_records"
    }

    fn owner_column(&self) -> Option<&'static str> {
        Some("pet_id")
    }

    fn tenant(&self) -> Option<&str> {
        Some(&self.tenant)
    }

    fn schema(&self) -> Option<Value> {
        Some(schemas::weight_record())
    }

    async fn load_data(&self, ctx: &mut SeedContext<'_>) -> Result<Vec<Value>, SeedError> {
        let pets = tenant_rows(ctx, "pets", &self.tenant, "name").await?;
        Ok(pets.iter().flat_map(|pet| self.history(ctx, pet)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::MemoryFixtures;
    use crate::testing::{adris, run};
    use clinicseed_store::MemoryStore;

    fn fixtures() -> MemoryFixtures {
        MemoryFixtures::new()
            .with(
                "02-clinic/adris/profiles.json",
                json!({"profiles": [
                    {"full_name": "Dra. Laura Benítez", "email": " laura@adris.com.py ", "role": "vet"},
                    {"full_name": "Carlos Gómez", "email": "Carlos@Example.com", "role": "owner", "phone": "+595 981 000 111"}
                ]}),
            )
            .with(
                "02-clinic/adris/pets.json",
                json!({"pets": [
                    {"name": "Firulais", "species": "dog", "weight_kg": 12.5, "owner_email": "carlos@example.com"},
                    {"name": "Michi", "species": "cat", "owner_email": "nobody@example.com"}
                ]}),
            )
    }

    #[tokio::test]
    async fn profiles_trim_emails_and_fill_phones() {
        let store = MemoryStore::new();
        let fixtures = fixtures();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        let result = profiles(&adris()).seed(&mut ctx).await;
        assert_eq!(result.created, 2);
        let rows = store.rows("profiles");
        assert_eq!(rows[0].get("email"), Some(&json!("laura@adris.com.py")));
        assert!(str_field(&rows[0], "phone").is_some_and(|phone| !phone.is_empty()));
        assert_eq!(rows[1].get("phone"), Some(&json!("+595 981 000 111")));
    }

    #[tokio::test]
    async fn pets_resolve_owners_case_insensitively() {
        let store = MemoryStore::new();
        let fixtures = fixtures();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        profiles(&adris()).seed(&mut ctx).await;
        let result = pets(&adris()).seed(&mut ctx).await;
        assert_eq!(result.created, 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("owner_id"));

        let staff = staff_profiles(&adris()).seed(&mut ctx).await;
        assert_eq!(staff.created, 1);
        assert_eq!(
            store.rows("staff_profiles")[0].get("license_number"),
            Some(&json!("VET-ADRIS-001"))
        );
    }

    #[tokio::test]
    async fn weight_history_is_stable_across_runs() {
        let store = MemoryStore::new();
        let fixtures = fixtures();
        let run = run();
        let mut ctx = SeedContext::new(&store, &fixtures, &run);

        profiles(&adris()).seed(&mut ctx).await;
        pets(&adris()).seed(&mut ctx).await;

        let first = weight_records(&adris()).seed(&mut ctx).await;
        assert_eq!(first.created, WEIGHT_HISTORY_MONTHS as u64);
        let again = weight_records(&adris()).seed(&mut ctx).await;
        assert_eq!((again.created, again.skipped), (0, WEIGHT_HISTORY_MONTHS as u64));

        let latest = store
            .rows("weight_records")
            .into_iter()
            .find(|row| row.get("recorded_at") == Some(&json!("2026-03-15T10:00:00Z")))
            .unwrap();
        assert_eq!(latest.get("weight_kg"), Some(&json!(12.5)));
    }
}
