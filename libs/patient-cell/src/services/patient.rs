use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{CreatePatientRequest, Gender, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest};
use crate::services::validation::{canonical_phone, validate_create, validate_update};

fn decode_patient(row: Value) -> Result<Patient, PatientError> {
    serde_json::from_value(row).map_err(|e| PatientError::Validation(e.to_string()))
}

/// Clinic-scoped patient records. Every query is filtered by `clinic_id`.
pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// `auth_token` is `None` for the public booking flow.
    #[instrument(skip(self, request, auth_token))]
    pub async fn create_patient(
        &self,
        clinic_id: Uuid,
        request: CreatePatientRequest,
        auth_token: Option<&str>,
    ) -> Result<Patient, PatientError> {
        let now = Utc::now();
        validate_create(&request, now.date_naive()).map_err(|errors| PatientError::Validation(errors.join("; ")))?;

        let gender = request.gender.as_deref().and_then(Gender::parse);
        let row = json!({
            "clinic_id": clinic_id,
            "full_name": request.full_name.trim(),
            "phone": canonical_phone(&request.phone),
            "gender": gender,
            "date_of_birth": request.date_of_birth,
            "address": request.address,
            "notes": request.notes,
            "medical_history": request.medical_history,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let created = self.supabase.insert_returning("patients", row, auth_token).await?;
        let patient = decode_patient(created)?;
        info!("Patient {} created in clinic {}", patient.id, clinic_id);
        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        clinic_id: Uuid,
        patient_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Patient, PatientError> {
        let path = format!(
            "/rest/v1/patients?id=eq.{}&clinic_id=eq.{}",
            patient_id, clinic_id
        );
        let row = self
            .supabase
            .select_one(&path, auth_token)
            .await?
            .ok_or(PatientError::NotFound)?;
        decode_patient(row)
    }

    pub async fn update_patient(
        &self,
        clinic_id: Uuid,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        validate_update(&request, Utc::now().date_naive())
            .map_err(|errors| PatientError::Validation(errors.join("; ")))?;

        let mut update_data = Map::new();
        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(canonical_phone(&phone)));
        }
        if let Some(gender) = request.gender.as_deref().and_then(Gender::parse) {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(dob) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(dob));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(history) = request.medical_history {
            update_data.insert("medical_history".to_string(), json!(history));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}&clinic_id=eq.{}", patient_id, clinic_id);
        let row = self
            .supabase
            .patch_returning("patients", &filter, Value::Object(update_data), Some(auth_token))
            .await
            .map_err(|e| match e {
                SupabaseError::Empty(_) => PatientError::NotFound,
                other => other.into(),
            })?;
        decode_patient(row)
    }

    pub async fn delete_patient(
        &self,
        clinic_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        // DELETE on a missing row succeeds silently.
        self.get_patient(clinic_id, patient_id, Some(auth_token)).await?;

        let path = format!(
            "/rest/v1/patients?id=eq.{}&clinic_id=eq.{}",
            patient_id, clinic_id
        );
        self.supabase.delete(&path, Some(auth_token)).await?;
        info!("Patient {} deleted from clinic {}", patient_id, clinic_id);
        Ok(())
    }

    pub async fn search_patients(
        &self,
        clinic_id: Uuid,
        query: &PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let (limit, offset) = query.page();
        let mut path = format!("/rest/v1/patients?clinic_id=eq.{}", clinic_id);

        if let Some(term) = query.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            // PostgREST reserves `,()` inside or-filters.
            let term: String = term.chars().filter(|c| !matches!(c, ',' | '(' | ')' | '*')).collect();
            let encoded = urlencoding::encode(&term);
            path.push_str(&format!(
                "&or=(full_name.ilike.*{0}*,phone.ilike.*{0}*)",
                encoded
            ));
        }
        path.push_str(&format!("&order=full_name.asc&limit={}&offset={}", limit, offset));
        debug!("Searching patients: {}", path);

        let rows = self.supabase.select(&path, Some(auth_token)).await?;
        rows.into_iter().map(decode_patient).collect()
    }

    /// Exact phone lookup used to match online bookings to existing records.
    pub async fn find_by_phone(
        &self,
        clinic_id: Uuid,
        phone: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<Patient>, PatientError> {
        let path = format!(
            "/rest/v1/patients?clinic_id=eq.{}&phone=eq.{}&limit=1",
            clinic_id,
            urlencoding::encode(&canonical_phone(phone))
        );
        self.supabase
            .select_one(&path, auth_token)
            .await?
            .map(decode_patient)
            .transpose()
    }
}
