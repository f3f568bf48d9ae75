use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    Clinic, ClinicError, CreateClinicRequest, UpdateClinicRequest, WorkingHours, MAX_SLOT_MINUTES,
    MIN_SLOT_MINUTES,
};

const DEFAULT_SLOT_MINUTES: i32 = 30;

/// Booking slug from a clinic name: lowercase ASCII alphanumerics joined by `-`.
/// Names without any ASCII letters (e.g. Arabic names) get a random suffix slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();

    if slug.is_empty() {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("clinic-{}", &suffix[..8])
    } else {
        slug
    }
}

fn validate_slot_minutes(minutes: i32) -> Result<(), ClinicError> {
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&minutes) {
        return Err(ClinicError::Validation(format!(
            "Slot duration must be between {} and {} minutes",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String, ClinicError> {
    let trimmed = name.trim();
    if trimmed.chars().count() < 2 {
        return Err(ClinicError::Validation("Clinic name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

pub struct ClinicService {
    supabase: SupabaseClient,
}

impl ClinicService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_clinic(
        &self,
        owner: &User,
        request: CreateClinicRequest,
        auth_token: &str,
    ) -> Result<Clinic, ClinicError> {
        let name = validate_name(&request.name)?;
        let slot_minutes = request.slot_duration_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
        validate_slot_minutes(slot_minutes)?;
        let working_hours = request.working_hours.unwrap_or_else(WorkingHours::standard);
        working_hours.validate().map_err(ClinicError::Validation)?;

        let existing_path = format!("/rest/v1/clinics?owner_id=eq.{}&select=id", owner.id);
        if self.supabase.select_one(&existing_path, Some(auth_token)).await?.is_some() {
            return Err(ClinicError::AlreadyExists);
        }

        let booking_slug = request
            .booking_slug
            .as_deref()
            .map(slugify)
            .unwrap_or_else(|| slugify(&name));

        let now = Utc::now().to_rfc3339();
        let clinic_data = json!({
            "owner_id": owner.id,
            "name": name,
            "booking_slug": booking_slug,
            "phone": request.phone,
            "address": request.address,
            "specialty": request.specialty,
            "booking_enabled": true,
            "slot_duration_minutes": slot_minutes,
            "working_hours": working_hours,
            "created_at": now,
            "updated_at": now
        });

        let row = self
            .supabase
            .insert_returning("clinics", clinic_data, Some(auth_token))
            .await?;
        let clinic: Clinic =
            serde_json::from_value(row).map_err(|e| ClinicError::Validation(e.to_string()))?;

        info!("Clinic {} created for owner {}", clinic.id, owner.id);
        Ok(clinic)
    }

    pub async fn get_clinic(&self, clinic_id: Uuid, auth_token: &str) -> Result<Clinic, ClinicError> {
        debug!("Fetching clinic {}", clinic_id);
        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let row = self
            .supabase
            .select_one(&path, Some(auth_token))
            .await?
            .ok_or(ClinicError::NotFound)?;
        serde_json::from_value(row).map_err(|e| ClinicError::Validation(e.to_string()))
    }

    /// Public lookup for the online booking page; only clinics with booking enabled.
    pub async fn get_by_booking_slug(&self, slug: &str) -> Result<Clinic, ClinicError> {
        let path = format!(
            "/rest/v1/clinics?booking_slug=eq.{}&booking_enabled=eq.true",
            sanitize_slug(slug)
        );
        let row = self
            .supabase
            .select_one(&path, None)
            .await?
            .ok_or(ClinicError::NotFound)?;
        serde_json::from_value(row).map_err(|e| ClinicError::Validation(e.to_string()))
    }

    pub async fn update_clinic(
        &self,
        clinic_id: Uuid,
        request: UpdateClinicRequest,
        auth_token: &str,
    ) -> Result<Clinic, ClinicError> {
        let mut update_data = Map::new();

        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(validate_name(&name)?));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(enabled) = request.booking_enabled {
            update_data.insert("booking_enabled".to_string(), json!(enabled));
        }
        if let Some(minutes) = request.slot_duration_minutes {
            validate_slot_minutes(minutes)?;
            update_data.insert("slot_duration_minutes".to_string(), json!(minutes));
        }
        if let Some(hours) = request.working_hours {
            hours.validate().map_err(ClinicError::Validation)?;
            update_data.insert("working_hours".to_string(), json!(hours));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let row = self
            .supabase
            .patch_returning(
                "clinics",
                &format!("id=eq.{}", clinic_id),
                Value::Object(update_data),
                Some(auth_token),
            )
            .await?;
        serde_json::from_value(row).map_err(|e| ClinicError::Validation(e.to_string()))
    }

    /// Raw JSON column holding the clinic's medical fields configuration.
    pub async fn get_medical_fields_config(
        &self,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<Value, ClinicError> {
        let path = format!("/rest/v1/clinics?id=eq.{}&select=medical_fields_config", clinic_id);
        let row = self
            .supabase
            .select_one(&path, Some(auth_token))
            .await?
            .ok_or(ClinicError::NotFound)?;
        Ok(row.get("medical_fields_config").cloned().unwrap_or(Value::Null))
    }

    pub async fn save_medical_fields_config(
        &self,
        clinic_id: Uuid,
        config: Value,
        auth_token: &str,
    ) -> Result<(), ClinicError> {
        self.supabase
            .patch_returning(
                "clinics",
                &format!("id=eq.{}", clinic_id),
                json!({
                    "medical_fields_config": config,
                    "updated_at": Utc::now().to_rfc3339()
                }),
                Some(auth_token),
            )
            .await?;
        Ok(())
    }
}

/// Slugs only ever contain `[a-z0-9-]`; anything else cannot match a row.
fn sanitize_slug(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}
