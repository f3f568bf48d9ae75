use chrono::NaiveDate;
use uuid::Uuid;

use clinic_cell::ClinicService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AssistantError, ClinicContext};

/// System instruction for the clinic assistant.
pub fn system_instruction(context: &ClinicContext, today: NaiveDate) -> String {
    let specialty = context
        .specialty
        .as_deref()
        .map(|s| format!(" ({})", s))
        .unwrap_or_default();
    format!(
        "You are Tabibi's assistant for the clinic \"{}\"{}. \
         You help doctors and secretaries with scheduling, patient communication and general medical knowledge. \
         You never give a definitive diagnosis; clinical decisions belong to the doctor. \
         Answer in the language the user writes in (Arabic or English), concisely.\n\
         Today is {}. The clinic has {} appointment(s) today and {} registered patient(s).",
        context.clinic_name,
        specialty,
        today.format("%Y-%m-%d"),
        context.today_appointments,
        context.patient_count
    )
}

pub struct ContextService {
    supabase: SupabaseClient,
    clinics: ClinicService,
}

impl ContextService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clinics: ClinicService::new(config),
        }
    }

    pub async fn load(
        &self,
        clinic_id: Uuid,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<ClinicContext, AssistantError> {
        let clinic = self.clinics.get_clinic(clinic_id, auth_token).await?;

        let appointments_path = format!(
            "/rest/v1/appointments?clinic_id=eq.{}&appointment_date=eq.{}&status=neq.cancelled&select=id",
            clinic_id, today
        );
        let today_appointments = self.supabase.select(&appointments_path, Some(auth_token)).await?.len();

        let patients_path = format!("/rest/v1/patients?clinic_id=eq.{}&select=id", clinic_id);
        let patient_count = self.supabase.select(&patients_path, Some(auth_token)).await?.len();

        Ok(ClinicContext {
            clinic_name: clinic.name,
            specialty: clinic.specialty,
            today_appointments,
            patient_count,
        })
    }
}
