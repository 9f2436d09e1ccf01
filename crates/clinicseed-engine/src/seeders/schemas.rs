//! Record schemas applied after pre-processing.

use serde_json::{Value, json};

const ID: &str = "^.+$";

fn id() -> Value {
    json!({"type": ["string", "integer"], "pattern": ID})
}

fn timestamp() -> Value {
    json!({"type": "string", "pattern": "^\\d{4}-\\d{2}-\\d{2}T\\d{2}:\\d{2}"})
}

fn date() -> Value {
    json!({"type": "string", "pattern": "^\\d{4}-\\d{2}-\\d{2}$"})
}

pub fn tenant() -> Value {
    json!({
        "type": "object",
        "required": ["id", "name"],
        "properties": {
            "id": {"type": "string", "pattern": "^[a-z0-9][a-z0-9_-]*$"},
            "name": {"type": "string", "minLength": 1},
            "email": {"type": ["string", "null"]},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn diagnosis_code() -> Value {
    json!({
        "type": "object",
        "required": ["code", "term"],
        "properties": {
            "code": {"type": "string", "minLength": 2},
            "term": {"type": "string", "minLength": 2},
            "standard": {"enum": ["venom", "snomed", "custom"], "default": "venom"},
            "category": {"type": ["string", "null"]},
            "severity": {"enum": ["mild", "moderate", "severe", "critical", null]},
            "species": {"type": "array", "items": {"type": "string"}, "default": ["all"]},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn drug_dosage() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "species": {"enum": ["dog", "cat", "bird", "rabbit", "all"], "default": "all"},
            "min_dose_mg_kg": {"type": ["number", "null"], "minimum": 0},
            "max_dose_mg_kg": {"type": ["number", "null"], "minimum": 0},
            "concentration_mg_ml": {"type": ["number", "null"], "exclusiveMinimum": 0},
            "contraindications": {"type": ["array", "null"], "items": {"type": "string"}},
            "side_effects": {"type": ["array", "null"], "items": {"type": "string"}},
            "requires_prescription": {"type": "boolean", "default": true}
        }
    })
}

pub fn growth_standard() -> Value {
    json!({
        "type": "object",
        "required": ["species", "age_weeks", "weight_kg", "percentile"],
        "properties": {
            "species": {"enum": ["dog", "cat"]},
            "breed_category": {"type": ["string", "null"]},
            "gender": {"enum": ["male", "female", null]},
            "age_weeks": {"type": "integer", "minimum": 0},
            "weight_kg": {"type": "number", "exclusiveMinimum": 0},
            "percentile": {"enum": ["P3", "P10", "P25", "P50", "P75", "P90", "P97"]}
        }
    })
}

pub fn vaccine_protocol() -> Value {
    json!({
        "type": "object",
        "required": ["vaccine_name", "vaccine_code", "species", "protocol_type", "diseases_prevented"],
        "properties": {
            "vaccine_name": {"type": "string", "minLength": 1},
            "vaccine_code": {"type": "string", "minLength": 1},
            "species": {"enum": ["dog", "cat", "all"]},
            "protocol_type": {"enum": ["core", "non-core", "lifestyle"]},
            "diseases_prevented": {"type": "array", "minItems": 1, "items": {"type": "string"}},
            "first_dose_weeks": {"type": ["integer", "null"], "minimum": 0},
            "revaccination_months": {"type": ["number", "null"]}
        }
    })
}

pub fn insurance_provider() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn lab_test() -> Value {
    json!({
        "type": "object",
        "required": ["code", "name"],
        "properties": {
            "code": {"type": "string", "minLength": 1},
            "name": {"type": "string", "minLength": 1},
            "category": {"type": ["string", "null"]},
            "base_price": {"type": ["number", "null"], "minimum": 0},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

/// Rows of a per-tenant table that carries a display name.
pub fn named_tenant_row() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "name"],
        "properties": {
            "tenant_id": {"type": "string", "minLength": 1},
            "name": {"type": "string", "minLength": 1},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn service() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "name", "category", "base_price"],
        "properties": {
            "tenant_id": {"type": "string", "minLength": 1},
            "name": {"type": "string", "minLength": 1},
            "category": {"type": "string"},
            "base_price": {"type": "number", "minimum": 0},
            "duration_minutes": {"type": "integer", "minimum": 5, "default": 30},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn kennel() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "code", "name"],
        "properties": {
            "tenant_id": {"type": "string", "minLength": 1},
            "code": {"type": "string", "minLength": 1},
            "name": {"type": "string", "minLength": 1},
            "kennel_type": {"enum": ["standard", "isolation", "icu", "recovery", "large", "small"]},
            "current_status": {"enum": ["available", "occupied", "cleaning", "maintenance"], "default": "available"}
        }
    })
}

pub fn store_brand() -> Value {
    json!({
        "type": "object",
        "required": ["slug", "name"],
        "properties": {
            "slug": {"type": "string", "pattern": "^[a-z0-9-]+$"},
            "name": {"type": "string", "minLength": 1},
            "is_global_catalog": {"type": "boolean", "default": true}
        }
    })
}

pub fn store_category() -> Value {
    json!({
        "type": "object",
        "required": ["slug", "name", "level"],
        "properties": {
            "slug": {"type": "string", "pattern": "^[a-z0-9-]+$"},
            "name": {"type": "string", "minLength": 1},
            "level": {"type": "integer", "minimum": 1},
            "is_global_catalog": {"type": "boolean", "default": true}
        }
    })
}

pub fn supplier() -> Value {
    json!({
        "type": "object",
        "required": ["name", "supplier_type"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "supplier_type": {"enum": ["products", "services", "both"]},
            "contact_info": {"type": "object"},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn store_product() -> Value {
    json!({
        "type": "object",
        "required": ["sku", "name", "base_price"],
        "properties": {
            "sku": {"type": "string", "minLength": 1},
            "name": {"type": "string", "minLength": 1},
            "base_price": {"type": "number", "minimum": 0},
            "brand_id": id(),
            "category_id": id(),
            "target_species": {"type": "array", "items": {"type": "string"}},
            "is_active": {"type": "boolean", "default": true},
            "is_global_catalog": {"type": "boolean", "default": true}
        }
    })
}

pub fn store_inventory() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "product_id", "stock_quantity", "min_stock_level"],
        "properties": {
            "tenant_id": {"type": "string"},
            "product_id": id(),
            "stock_quantity": {"type": "integer", "minimum": 0},
            "min_stock_level": {"type": "integer", "minimum": 0},
            "reorder_quantity": {"type": "integer", "minimum": 0}
        }
    })
}

pub fn profile() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "full_name", "email", "role"],
        "properties": {
            "tenant_id": {"type": "string"},
            "full_name": {"type": "string", "minLength": 2},
            "email": {"type": "string", "pattern": "^[^@\\s]+@[^@\\s]+\\.[^@\\s]+$"},
            "role": {"enum": ["owner", "vet", "admin", "receptionist"]},
            "phone": {"type": ["string", "null"]}
        }
    })
}

pub fn staff_profile() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "profile_id", "job_title"],
        "properties": {
            "tenant_id": {"type": "string"},
            "profile_id": id(),
            "job_title": {"type": "string", "minLength": 1},
            "can_prescribe": {"type": "boolean", "default": false},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn pet() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "owner_id", "name", "species"],
        "properties": {
            "tenant_id": {"type": "string"},
            "owner_id": id(),
            "name": {"type": "string", "minLength": 1},
            "species": {"enum": ["dog", "cat"]},
            "sex": {"enum": ["male", "female", null]},
            "birth_date": {"oneOf": [date(), {"type": "null"}]},
            "weight_kg": {"type": ["number", "null"], "exclusiveMinimum": 0},
            "is_neutered": {"type": "boolean", "default": false}
        }
    })
}

pub fn weight_record() -> Value {
    json!({
        "type": "object",
        "required": ["pet_id", "weight_kg", "recorded_at"],
        "properties": {
            "pet_id": id(),
            "weight_kg": {"type": "number", "exclusiveMinimum": 0},
            "recorded_at": timestamp()
        }
    })
}

pub fn appointment() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "pet_id", "service_id", "start_time", "end_time", "status"],
        "properties": {
            "tenant_id": {"type": "string"},
            "pet_id": id(),
            "service_id": id(),
            "vet_id": id(),
            "start_time": timestamp(),
            "end_time": timestamp(),
            "status": {"enum": ["scheduled", "confirmed", "checked_in", "in_progress", "completed", "cancelled", "no_show"]}
        }
    })
}

pub fn medical_record() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "pet_id", "appointment_id", "record_type", "visit_date"],
        "properties": {
            "tenant_id": {"type": "string"},
            "pet_id": id(),
            "appointment_id": id(),
            "record_type": {"enum": ["consultation", "checkup", "vaccination", "dental", "surgery", "emergency"]},
            "visit_date": timestamp(),
            "temperature_celsius": {"type": "number", "minimum": 35, "maximum": 43}
        }
    })
}

pub fn vaccine() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "pet_id", "vaccine_code", "name", "administered_date", "status"],
        "properties": {
            "tenant_id": {"type": "string"},
            "pet_id": id(),
            "vaccine_code": {"type": "string"},
            "name": {"type": "string", "minLength": 1},
            "administered_date": date(),
            "next_due_date": date(),
            "status": {"enum": ["completed", "scheduled", "missed"]}
        }
    })
}

pub fn prescription() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "pet_id", "vet_id", "prescription_number", "prescribed_date", "medications", "status"],
        "properties": {
            "tenant_id": {"type": "string"},
            "pet_id": id(),
            "vet_id": id(),
            "prescription_number": {"type": "string", "pattern": "^RX-\\d{4}-\\d{6}$"},
            "prescribed_date": date(),
            "valid_until": date(),
            "medications": {
                "type": "array",
                "minItems": 1,
                "items": {"type": "object", "required": ["name", "dose"]}
            },
            "status": {"enum": ["active", "dispensed", "expired", "cancelled"]}
        }
    })
}

pub fn consent_template() -> Value {
    json!({
        "type": "object",
        "required": ["code", "name", "category", "content"],
        "properties": {
            "tenant_id": {"type": "null"},
            "code": {"type": "string", "pattern": "^[A-Z0-9_]+$"},
            "name": {"type": "string", "minLength": 1},
            "category": {"enum": ["surgery", "anesthesia", "euthanasia", "treatment", "hospitalization", "general"]},
            "content": {"type": "string", "minLength": 1},
            "requires_witness": {"type": "boolean", "default": false},
            "is_active": {"type": "boolean", "default": true}
        }
    })
}

pub fn invoice() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "client_id", "appointment_id", "invoice_number", "total", "status"],
        "properties": {
            "tenant_id": {"type": "string"},
            "client_id": id(),
            "appointment_id": id(),
            "invoice_number": {"type": "string", "pattern": "^INV-\\d{4}-\\d{6}$"},
            "subtotal": {"type": "number", "minimum": 0},
            "tax_amount": {"type": "number", "minimum": 0},
            "total": {"type": "number", "minimum": 0},
            "status": {"enum": ["draft", "sent", "paid", "partial", "overdue", "void"]}
        }
    })
}

pub fn lab_order() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "pet_id", "order_number", "ordered_at", "status", "priority"],
        "properties": {
            "tenant_id": {"type": "string"},
            "pet_id": id(),
            "ordered_by": id(),
            "order_number": {"type": "string", "pattern": "^LAB-\\d{4}-\\d{6}$"},
            "ordered_at": timestamp(),
            "status": {"enum": ["pending", "in_progress", "completed", "cancelled"]},
            "priority": {"enum": ["routine", "urgent", "stat"]}
        }
    })
}

pub fn hospitalization() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "pet_id", "kennel_id", "admission_number", "admitted_at", "status"],
        "properties": {
            "tenant_id": {"type": "string"},
            "pet_id": id(),
            "kennel_id": id(),
            "admission_number": {"type": "string", "pattern": "^HOSP-\\d{8}-\\d{3}$"},
            "admitted_at": timestamp(),
            "status": {"enum": ["admitted", "discharged", "transferred", "deceased"]},
            "acuity_level": {"enum": ["normal", "moderate", "critical"]}
        }
    })
}

pub fn store_order() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "customer_id", "order_number", "placed_at", "status", "total"],
        "properties": {
            "tenant_id": {"type": "string"},
            "customer_id": id(),
            "order_number": {"type": "string", "pattern": "^ORD-\\d{4}-\\d{6}$"},
            "placed_at": timestamp(),
            "status": {"enum": ["pending", "confirmed", "shipped", "delivered", "cancelled"]},
            "total": {"type": "number", "minimum": 0}
        }
    })
}

pub fn loyalty_points() -> Value {
    json!({
        "type": "object",
        "required": ["tenant_id", "user_id", "balance", "tier"],
        "properties": {
            "tenant_id": {"type": "string"},
            "user_id": id(),
            "balance": {"type": "integer", "minimum": 0},
            "lifetime_earned": {"type": "integer", "minimum": 0},
            "tier": {"enum": ["bronze", "silver", "gold", "platinum"]}
        }
    })
}
