use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use clinic_cell::ClinicService;
use medical_fields_cell::{normalize, validate_record};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{CreateVisitRequest, PatientError, Visit};
use crate::services::patient::PatientService;

fn decode_visit(row: Value) -> Result<Visit, PatientError> {
    serde_json::from_value(row).map_err(|e| PatientError::Validation(e.to_string()))
}

pub struct VisitService {
    supabase: SupabaseClient,
    patients: PatientService,
    clinics: ClinicService,
}

impl VisitService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: PatientService::new(config),
            clinics: ClinicService::new(config),
        }
    }

    /// Most recent first.
    pub async fn list_visits(
        &self,
        clinic_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Visit>, PatientError> {
        let path = format!(
            "/rest/v1/visits?clinic_id=eq.{}&patient_id=eq.{}&order=visit_date.desc,created_at.desc",
            clinic_id, patient_id
        );
        let rows = self.supabase.select(&path, Some(auth_token)).await?;
        rows.into_iter().map(decode_visit).collect()
    }

    /// Record a visit after checking its data against the clinic's current
    /// medical-fields layout.
    pub async fn create_visit(
        &self,
        clinic_id: Uuid,
        patient_id: Uuid,
        request: CreateVisitRequest,
        auth_token: &str,
    ) -> Result<Visit, PatientError> {
        self.patients
            .get_patient(clinic_id, patient_id, Some(auth_token))
            .await?;

        let raw_config = self
            .clinics
            .get_medical_fields_config(clinic_id, auth_token)
            .await?;
        let layout = normalize(&raw_config);

        if let Err(problems) = validate_record(&layout, &request.data) {
            warn!("Rejected visit for patient {}: {} problem(s)", patient_id, problems.len());
            return Err(PatientError::InvalidRecord(problems));
        }

        let data = if request.data.is_null() { json!({}) } else { request.data };
        let row = json!({
            "clinic_id": clinic_id,
            "patient_id": patient_id,
            "appointment_id": request.appointment_id,
            "visit_date": request.visit_date.unwrap_or_else(|| Utc::now().date_naive()),
            "data": data,
            "created_at": Utc::now().to_rfc3339()
        });

        let created = self.supabase.insert_returning("visits", row, Some(auth_token)).await?;
        let visit = decode_visit(created)?;
        info!("Visit {} recorded for patient {}", visit.id, patient_id);
        Ok(visit)
    }
}
